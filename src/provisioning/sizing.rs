//! Size Negotiator
//!
//! Turns a protocol capacity range into a whole number of gigabytes.

use crate::domain::ports::{CapacityRange, BYTES_PER_GB, DEFAULT_VOLUME_SIZE_GB};
use crate::error::{Error, Result};

/// Largest size whose byte count still fits the protocol's i64
pub const MAX_VOLUME_SIZE_GB: u64 = (i64::MAX / BYTES_PER_GB) as u64;

/// Concrete size chosen for a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityDecision {
    pub size_gb: u64,
}

impl CapacityDecision {
    /// Size in bytes, as reported back to the orchestrator
    pub fn capacity_bytes(&self) -> i64 {
        i64::try_from(self.size_gb)
            .ok()
            .and_then(|gb| gb.checked_mul(BYTES_PER_GB))
            .unwrap_or(i64::MAX)
    }
}

/// Resolve the volume size for an optional capacity range.
///
/// An absent or all-zero range gets the default size. Otherwise the required
/// bytes win over the limit, and any remainder rounds up to the next GB.
pub fn resolve_size(range: Option<&CapacityRange>) -> Result<CapacityDecision> {
    let range = match range {
        Some(r) if !r.is_unset() => r,
        _ => {
            return Ok(CapacityDecision {
                size_gb: DEFAULT_VOLUME_SIZE_GB,
            })
        }
    };

    if range.required_bytes < 0 || range.limit_bytes < 0 {
        return Err(Error::InvalidArgument(format!(
            "capacity range must not be negative (required {}, limit {})",
            range.required_bytes, range.limit_bytes
        )));
    }
    if range.limit_bytes != 0 && range.required_bytes > range.limit_bytes {
        return Err(Error::InvalidArgument(format!(
            "required bytes {} exceed limit bytes {}",
            range.required_bytes, range.limit_bytes
        )));
    }

    let bytes = if range.required_bytes != 0 {
        range.required_bytes
    } else {
        range.limit_bytes
    };

    let mut size_gb = bytes / BYTES_PER_GB;
    if bytes % BYTES_PER_GB != 0 {
        size_gb += 1;
    }

    let size_gb = size_gb as u64;
    if size_gb > MAX_VOLUME_SIZE_GB {
        return Err(Error::InvalidArgument(format!(
            "requested {} bytes is larger than the maximum volume size of {} GB",
            bytes, MAX_VOLUME_SIZE_GB
        )));
    }

    Ok(CapacityDecision { size_gb })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn size_of(range: CapacityRange) -> u64 {
        resolve_size(Some(&range)).unwrap().size_gb
    }

    #[test]
    fn test_default_size() {
        assert_eq!(resolve_size(None).unwrap().size_gb, 10);
        assert_eq!(size_of(CapacityRange::default()), 10);
    }

    #[test]
    fn test_rounds_up() {
        assert_eq!(size_of(CapacityRange::required(1)), 1);
        assert_eq!(size_of(CapacityRange::required(BYTES_PER_GB)), 1);
        assert_eq!(size_of(CapacityRange::required(BYTES_PER_GB + 1)), 2);
        assert_eq!(size_of(CapacityRange::required(5 * BYTES_PER_GB)), 5);
    }

    #[test]
    fn test_limit_used_when_required_unset() {
        let range = CapacityRange {
            required_bytes: 0,
            limit_bytes: 3 * BYTES_PER_GB,
        };
        assert_eq!(size_of(range), 3);

        let range = CapacityRange {
            required_bytes: 2 * BYTES_PER_GB,
            limit_bytes: 8 * BYTES_PER_GB,
        };
        assert_eq!(size_of(range), 2);
    }

    #[test]
    fn test_invalid_ranges() {
        assert_matches!(
            resolve_size(Some(&CapacityRange::required(-1))),
            Err(Error::InvalidArgument(_))
        );

        let inverted = CapacityRange {
            required_bytes: 4 * BYTES_PER_GB,
            limit_bytes: BYTES_PER_GB,
        };
        assert_matches!(resolve_size(Some(&inverted)), Err(Error::InvalidArgument(_)));
    }

    #[test]
    fn test_capacity_bytes() {
        let decision = CapacityDecision { size_gb: 2 };
        assert_eq!(decision.capacity_bytes(), 2_147_483_648);

        let huge = CapacityDecision { size_gb: u64::MAX };
        assert_eq!(huge.capacity_bytes(), i64::MAX);
    }

    #[test]
    fn test_size_limited_to_byte_range() {
        assert_matches!(
            resolve_size(Some(&CapacityRange::required(i64::MAX))),
            Err(Error::InvalidArgument(_))
        );

        let largest = resolve_size(Some(&CapacityRange::required(
            MAX_VOLUME_SIZE_GB as i64 * BYTES_PER_GB,
        )))
        .unwrap();
        assert_eq!(largest.size_gb, MAX_VOLUME_SIZE_GB);
        assert!(largest.capacity_bytes() > 0);
    }
}
