//! Quota Guard
//!
//! Advisory admission check against a freshly fetched quota. The backend can
//! still refuse the create call on its own.

use crate::domain::ports::QuotaSnapshot;
use crate::error::Error;

/// Outcome of a quota check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaDecision {
    Admit,
    CapacityExceeded {
        requested_gb: u64,
        available_gb: i64,
        shortfall_gb: i64,
    },
    CountExceeded {
        limit: i64,
        usage: i64,
    },
}

impl QuotaDecision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, QuotaDecision::Admit)
    }

    /// Convert a rejection into its error; `None` when admitted
    pub fn into_error(self) -> Option<Error> {
        match self {
            QuotaDecision::Admit => None,
            QuotaDecision::CapacityExceeded {
                requested_gb,
                available_gb,
                shortfall_gb,
            } => Some(Error::QuotaCapacityExceeded {
                requested_gb,
                available_gb,
                shortfall_gb,
            }),
            QuotaDecision::CountExceeded { limit, usage } => {
                Some(Error::QuotaVolumeCountExceeded { limit, usage })
            }
        }
    }
}

/// Decide whether a volume of `size_gb` fits in the quota.
///
/// Disk space is checked before volume count.
pub fn admit(size_gb: u64, quota: &QuotaSnapshot) -> QuotaDecision {
    let available_gb = quota.available_gb();
    let requested = size_gb as i64;

    if requested > available_gb {
        return QuotaDecision::CapacityExceeded {
            requested_gb: size_gb,
            available_gb,
            shortfall_gb: requested - available_gb,
        };
    }

    if quota.volume_count_usage >= quota.volume_count_limit {
        return QuotaDecision::CountExceeded {
            limit: quota.volume_count_limit,
            usage: quota.volume_count_usage,
        };
    }

    QuotaDecision::Admit
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn quota(disk_limit: i64, disk_usage: i64, count_limit: i64, count_usage: i64) -> QuotaSnapshot {
        QuotaSnapshot {
            disk_gb_limit: disk_limit,
            disk_gb_usage: disk_usage,
            volume_count_limit: count_limit,
            volume_count_usage: count_usage,
        }
    }

    #[test]
    fn test_admit_within_quota() {
        assert!(admit(10, &quota(100, 50, 10, 2)).is_admitted());
        // Exactly filling the remaining space is fine
        assert!(admit(50, &quota(100, 50, 10, 2)).is_admitted());
    }

    #[test]
    fn test_capacity_shortfall() {
        let decision = admit(10, &quota(100, 95, 10, 2));
        assert_eq!(
            decision,
            QuotaDecision::CapacityExceeded {
                requested_gb: 10,
                available_gb: 5,
                shortfall_gb: 5,
            }
        );
        assert_matches!(
            decision.into_error(),
            Some(Error::QuotaCapacityExceeded { shortfall_gb: 5, .. })
        );
    }

    #[test]
    fn test_count_exceeded() {
        let decision = admit(1, &quota(100, 0, 5, 5));
        assert_eq!(decision, QuotaDecision::CountExceeded { limit: 5, usage: 5 });
    }

    #[test]
    fn test_capacity_checked_first() {
        assert_matches!(
            admit(20, &quota(10, 0, 1, 1)),
            QuotaDecision::CapacityExceeded { shortfall_gb: 10, .. }
        );
    }
}
