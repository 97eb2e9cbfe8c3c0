// ABOUTME: Sandbox execution package for Atelier
// ABOUTME: Instance registry, terminal sessions and output streaming over a Docker runtime

pub mod error;
pub mod registry;
pub mod runtime;
pub mod storage;
pub mod stream;
pub mod terminal;
pub mod types;

pub use error::{Result, SandboxError};
pub use registry::InstanceRegistry;
pub use runtime::{
    DockerRuntime, ProcessInput, ProcessOutput, RuntimeInstance, SandboxRuntime, SpawnedProcess,
};
pub use storage::{InstanceStore, SessionStore};
pub use stream::{forward_output, OutputLease, TerminalEvent};
pub use terminal::TerminalSessionManager;
pub use types::{InstanceStatus, SandboxInstance, SessionStatus, TerminalSession, TerminalSize};
