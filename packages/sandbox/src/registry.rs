// ABOUTME: Process-wide registry owning the lifecycle of the single sandbox instance
// ABOUTME: absent -> booting -> ready state machine with conflict back-off and adoption

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Notify, RwLock};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use atelier_config::SandboxConfig;

use crate::error::{Result, SandboxError};
use crate::runtime::SandboxRuntime;
use crate::storage::InstanceStore;
use crate::types::{InstanceStatus, SandboxInstance};

enum RegistryState {
    Absent,
    Booting { project_id: String },
    Ready(SandboxInstance),
}

/// Owns boot and teardown of the single sandbox instance.
///
/// The underlying runtime permits one live instance process-wide, so the
/// registry is shared mutable state guarding one external resource. Only the
/// registry initiates boot/teardown; everything else works through an acquired
/// handle. While a boot is in flight, concurrent callers wait for it to settle
/// instead of starting a second one.
pub struct InstanceRegistry {
    runtime: Arc<dyn SandboxRuntime>,
    store: InstanceStore,
    state: RwLock<RegistryState>,
    boot_settled: Notify,
    config: SandboxConfig,
}

impl InstanceRegistry {
    pub fn new(runtime: Arc<dyn SandboxRuntime>, store: InstanceStore, config: SandboxConfig) -> Self {
        Self {
            runtime,
            store,
            state: RwLock::new(RegistryState::Absent),
            boot_settled: Notify::new(),
            config,
        }
    }

    /// Return the ready instance for this project, booting one when absent.
    ///
    /// Idempotent reuse: a ready instance for the same project is returned
    /// unchanged. A boot conflict (another instance live anywhere in the
    /// process) is not retried blindly; after a brief back-off the registry
    /// re-checks for a now-available instance and adopts it when it belongs to
    /// this project.
    pub async fn acquire(&self, project_id: &str) -> Result<SandboxInstance> {
        if project_id.is_empty() {
            return Err(SandboxError::Validation("projectId is required".to_string()));
        }

        let deadline =
            Instant::now() + Duration::from_millis(self.config.boot_wait_timeout_ms);

        enum Decision {
            Reuse(SandboxInstance),
            HeldByOther { id: String, project_id: String },
            Wait,
            TryClaim,
        }

        loop {
            // Arm and register the waiter before inspecting state so a settle
            // between the read and the await is not missed
            let settled = self.boot_settled.notified();
            tokio::pin!(settled);
            settled.as_mut().enable();

            let decision = {
                let state = self.state.read().await;
                match &*state {
                    RegistryState::Ready(instance) if instance.project_id == project_id => {
                        Decision::Reuse(instance.clone())
                    }
                    RegistryState::Ready(other) => Decision::HeldByOther {
                        id: other.id.clone(),
                        project_id: other.project_id.clone(),
                    },
                    RegistryState::Booting { project_id: booting_for } => {
                        debug!("Boot in flight for project {}; waiting", booting_for);
                        Decision::Wait
                    }
                    RegistryState::Absent => Decision::TryClaim,
                }
            };

            match decision {
                Decision::Reuse(mut instance) => {
                    instance.last_activity = Utc::now();
                    self.store.set_status(&instance.id, InstanceStatus::Ready).await?;
                    debug!("Reusing ready instance {} for project {}", instance.id, project_id);
                    return Ok(instance);
                }
                Decision::HeldByOther { id, project_id: holder } => {
                    return Err(SandboxError::BootFailed(format!(
                        "instance {} is held by project {}; release it before acquiring for {}",
                        id, holder, project_id
                    )));
                }
                Decision::TryClaim => {
                    let mut state = self.state.write().await;
                    if matches!(&*state, RegistryState::Absent) {
                        *state = RegistryState::Booting {
                            project_id: project_id.to_string(),
                        };
                        drop(state);
                        return self.boot_and_settle(project_id).await;
                    }
                    // Someone claimed the boot between our locks; re-check
                    continue;
                }
                Decision::Wait => {
                    if timeout_at(deadline, settled).await.is_err() {
                        return Err(SandboxError::BootFailed(format!(
                            "timed out waiting for in-flight boot (project {})",
                            project_id
                        )));
                    }
                }
            }
        }
    }

    /// Run the boot, then settle the registry state and wake waiters
    async fn boot_and_settle(&self, project_id: &str) -> Result<SandboxInstance> {
        let result = self.try_boot(project_id).await;

        match result {
            Ok(instance) => {
                *self.state.write().await = RegistryState::Ready(instance.clone());
                self.boot_settled.notify_waiters();
                Ok(instance)
            }
            Err(e) => {
                *self.state.write().await = RegistryState::Absent;
                self.boot_settled.notify_waiters();
                Err(e)
            }
        }
    }

    async fn try_boot(&self, project_id: &str) -> Result<SandboxInstance> {
        let now = Utc::now();
        let mut instance = SandboxInstance {
            id: nanoid::nanoid!(),
            project_id: project_id.to_string(),
            status: InstanceStatus::Booting,
            runtime_id: None,
            port: None,
            preview_url: None,
            last_activity: now,
            created_at: now,
        };
        self.store.upsert(&instance).await?;

        match self.runtime.boot(project_id).await {
            Ok(booted) => {
                instance.status = InstanceStatus::Ready;
                instance.runtime_id = Some(booted.runtime_id);
                instance.last_activity = Utc::now();
                self.store.upsert(&instance).await?;
                info!("Booted instance {} for project {}", instance.id, project_id);
                Ok(instance)
            }
            Err(SandboxError::InstanceActive) => {
                // Another boot won the race, possibly outside this registry.
                // Back off, then adopt what is live instead of retrying the
                // boot; a retry loop here is exactly the crash loop the
                // conflict signal exists to prevent.
                warn!(
                    "Boot conflict for project {}; backing off {}ms before re-check",
                    project_id, self.config.boot_backoff_ms
                );
                tokio::time::sleep(Duration::from_millis(self.config.boot_backoff_ms)).await;

                match self.runtime.find_active().await? {
                    Some(found) => {
                        let owner = found
                            .project_id
                            .clone()
                            .unwrap_or_else(|| project_id.to_string());
                        if owner != project_id {
                            self.store.set_status(&instance.id, InstanceStatus::Error).await?;
                            return Err(SandboxError::BootFailed(format!(
                                "live instance belongs to project {}",
                                owner
                            )));
                        }

                        instance.status = InstanceStatus::Ready;
                        instance.runtime_id = Some(found.runtime_id);
                        instance.last_activity = Utc::now();
                        self.store.upsert(&instance).await?;
                        info!(
                            "Adopted externally created instance for project {} as {}",
                            project_id, instance.id
                        );
                        Ok(instance)
                    }
                    None => {
                        self.store.set_status(&instance.id, InstanceStatus::Error).await?;
                        Err(SandboxError::BootFailed(
                            "no usable instance after conflict back-off".to_string(),
                        ))
                    }
                }
            }
            Err(e) => {
                self.store.set_status(&instance.id, InstanceStatus::Error).await?;
                Err(SandboxError::BootFailed(e.to_string()))
            }
        }
    }

    /// Drop the registry's reference to an instance.
    ///
    /// The runtime offers no force-stop primitive, so this cannot kill the
    /// underlying process; it only allows a later `acquire` to attempt a fresh
    /// boot.
    pub async fn release(&self, instance_id: &str) -> Result<()> {
        self.store
            .get(instance_id)
            .await?
            .ok_or_else(|| SandboxError::InstanceNotFound(instance_id.to_string()))?;

        {
            let mut state = self.state.write().await;
            if matches!(&*state, RegistryState::Ready(instance) if instance.id == instance_id) {
                *state = RegistryState::Absent;
            }
        }

        self.store.set_status(instance_id, InstanceStatus::Terminated).await?;
        self.boot_settled.notify_waiters();
        info!("Released instance {}", instance_id);
        Ok(())
    }

    /// Instance metadata by id
    pub async fn get(&self, instance_id: &str) -> Result<SandboxInstance> {
        self.store
            .get(instance_id)
            .await?
            .ok_or_else(|| SandboxError::InstanceNotFound(instance_id.to_string()))
    }

    /// The instance the registry currently considers authoritative
    pub async fn current(&self) -> Option<SandboxInstance> {
        match &*self.state.read().await {
            RegistryState::Ready(instance) => Some(instance.clone()),
            _ => None,
        }
    }

    /// Record a preview URL / port reported for an instance
    pub async fn update_preview(
        &self,
        instance_id: &str,
        preview_url: Option<&str>,
        port: Option<u16>,
    ) -> Result<SandboxInstance> {
        self.store.update_preview(instance_id, preview_url, port).await?;

        let updated = self
            .store
            .get(instance_id)
            .await?
            .ok_or_else(|| SandboxError::InstanceNotFound(instance_id.to_string()))?;

        let mut state = self.state.write().await;
        if matches!(&*state, RegistryState::Ready(instance) if instance.id == instance_id) {
            *state = RegistryState::Ready(updated.clone());
        }

        Ok(updated)
    }

    /// Runtime id backing a registry instance id, for components that need to
    /// reach into the sandbox (terminal sessions, file I/O)
    pub async fn runtime_id(&self, instance_id: &str) -> Result<String> {
        let instance = self.get(instance_id).await?;
        match (instance.status, instance.runtime_id) {
            (InstanceStatus::Ready, Some(runtime_id)) => Ok(runtime_id),
            _ => Err(SandboxError::InstanceNotFound(instance_id.to_string())),
        }
    }
}
