// ABOUTME: Storage placement policy
// ABOUTME: Pure size-based decision between the inline and blob tiers

use crate::types::StorageTier;

/// Decides, per file, which tier holds the content.
///
/// Small content stays inline so frequent edits cost a single round trip;
/// anything above the threshold goes to the blob store to bound row size.
/// Directories are never assigned a tier (callers skip the policy for them).
#[derive(Debug, Clone, Copy)]
pub struct PlacementPolicy {
    threshold_bytes: u64,
}

impl PlacementPolicy {
    pub fn new(threshold_bytes: u64) -> Self {
        Self { threshold_bytes }
    }

    pub fn threshold_bytes(&self) -> u64 {
        self.threshold_bytes
    }

    /// Pure and deterministic: content at or below the threshold is inline,
    /// anything larger goes to the blob store.
    pub fn decide(&self, size: u64) -> StorageTier {
        if size <= self.threshold_bytes {
            StorageTier::Inline
        } else {
            StorageTier::Blob
        }
    }
}

impl Default for PlacementPolicy {
    fn default() -> Self {
        Self::new(atelier_config::DEFAULT_INLINE_THRESHOLD_BYTES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_at_or_below_threshold_are_inline() {
        let policy = PlacementPolicy::new(100 * 1024);
        assert_eq!(policy.decide(0), StorageTier::Inline);
        assert_eq!(policy.decide(51_200), StorageTier::Inline);
        assert_eq!(policy.decide(100 * 1024), StorageTier::Inline);
    }

    #[test]
    fn sizes_above_threshold_go_to_blob() {
        let policy = PlacementPolicy::new(100 * 1024);
        assert_eq!(policy.decide(100 * 1024 + 1), StorageTier::Blob);
        assert_eq!(policy.decide(200 * 1024), StorageTier::Blob);
    }

    #[test]
    fn threshold_is_configurable() {
        let policy = PlacementPolicy::new(10);
        assert_eq!(policy.decide(10), StorageTier::Inline);
        assert_eq!(policy.decide(11), StorageTier::Blob);
    }
}
