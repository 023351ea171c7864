//! Resource tiers and the fixed limit table they map to.

use serde::{Deserialize, Serialize};

/// Symbolic resource class an environment selects per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceTier {
    /// 512 CPU shares, 1024 MiB memory.
    Small,
    /// 1024 CPU shares, 2048 MiB memory.
    Medium,
    /// 2048 CPU shares, 4096 MiB memory.
    Large,
}

/// Concrete CPU-share and memory-cap pair a tier resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceLimits {
    /// CPU shares (relative weight, not a hard core count).
    pub cpu_shares: u32,
    /// Memory cap in mebibytes.
    pub memory_mib: u32,
}

impl ResourceTier {
    /// Resolve this tier to its concrete limits per the fixed table in the
    /// sandbox provider contract.
    #[must_use]
    pub fn limits(&self) -> ResourceLimits {
        match self {
            Self::Small => ResourceLimits {
                cpu_shares: 512,
                memory_mib: 1024,
            },
            Self::Medium => ResourceLimits {
                cpu_shares: 1024,
                memory_mib: 2048,
            },
            Self::Large => ResourceLimits {
                cpu_shares: 2048,
                memory_mib: 4096,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_table_matches_spec() {
        assert_eq!(
            ResourceTier::Small.limits(),
            ResourceLimits {
                cpu_shares: 512,
                memory_mib: 1024
            }
        );
        assert_eq!(
            ResourceTier::Medium.limits(),
            ResourceLimits {
                cpu_shares: 1024,
                memory_mib: 2048
            }
        );
        assert_eq!(
            ResourceTier::Large.limits(),
            ResourceLimits {
                cpu_shares: 2048,
                memory_mib: 4096
            }
        );
    }
}
