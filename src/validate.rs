//! Parameter validators: pure predicates run before any allocation.
//!
//! Each check either passes or names the offending field. Nothing is clamped.

use crate::config::Limits;
use crate::error::InvalidReason;
use std::path::Path;

pub type Outcome = Result<(), InvalidReason>;

/// `value` must be strictly positive.
pub fn positive(field: &'static str, value: usize) -> Outcome {
    if value == 0 {
        return Err(InvalidReason::NonPositive { field });
    }
    Ok(())
}

/// A buffer length: strictly positive and no larger than `limits.max_len`.
pub fn length(field: &'static str, value: usize, limits: &Limits) -> Outcome {
    positive(field, value)?;
    within(field, value, 1, limits.max_len)
}

/// `min <= value <= max`.
pub fn within(field: &'static str, value: usize, min: usize, max: usize) -> Outcome {
    if value < min || value > max {
        return Err(InvalidReason::OutOfRange {
            field,
            value: value as f64,
            min: min as f64,
            max: max as f64,
        });
    }
    Ok(())
}

/// `value` must not exceed a related size, e.g. hop size against window size.
pub fn not_exceeding(
    field: &'static str,
    value: usize,
    limit: &'static str,
    limit_value: usize,
) -> Outcome {
    if value > limit_value {
        return Err(InvalidReason::Incompatible { field, limit });
    }
    Ok(())
}

pub fn power_of_two(field: &'static str, value: usize) -> Outcome {
    if !value.is_power_of_two() {
        return Err(InvalidReason::NotPowerOfTwo { field, value });
    }
    Ok(())
}

/// A sample rate in Hz: strictly positive and below `limits.max_samplerate`.
pub fn samplerate(field: &'static str, value: u32, limits: &Limits) -> Outcome {
    if value == 0 {
        return Err(InvalidReason::NonPositive { field });
    }
    if value > limits.max_samplerate {
        return Err(InvalidReason::OutOfRange {
            field,
            value: value as f64,
            min: 1.0,
            max: limits.max_samplerate as f64,
        });
    }
    Ok(())
}

/// `value` must be one of the rates a table was derived for.
pub fn supported_rate(field: &'static str, value: u32, table: &[u32]) -> Outcome {
    if !table.contains(&value) {
        return Err(InvalidReason::Unsupported {
            field,
            value: value as f64,
        });
    }
    Ok(())
}

pub fn finite(field: &'static str, value: f64) -> Outcome {
    if !value.is_finite() {
        return Err(InvalidReason::NotFinite { field });
    }
    Ok(())
}

/// Both ends finite and `low < high`.
pub fn ordered(low_field: &'static str, low: f64, high_field: &'static str, high: f64) -> Outcome {
    finite(low_field, low)?;
    finite(high_field, high)?;
    if low >= high {
        return Err(InvalidReason::Unordered {
            low: low_field,
            high: high_field,
        });
    }
    Ok(())
}

pub fn path(value: &Path) -> Outcome {
    if value.as_os_str().is_empty() {
        return Err(InvalidReason::EmptyPath);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes() {
        let limits = Limits::default();
        assert_eq!(
            length("length", 0, &limits),
            Err(InvalidReason::NonPositive { field: "length" })
        );
        assert!(length("length", 16, &limits).is_ok());
        assert!(matches!(
            length("length", limits.max_len + 1, &limits),
            Err(InvalidReason::OutOfRange { field: "length", .. })
        ));
    }

    #[test]
    fn relationships_are_rejected_not_clamped() {
        assert_eq!(
            not_exceeding("hop_size", 1024, "buf_size", 512),
            Err(InvalidReason::Incompatible {
                field: "hop_size",
                limit: "buf_size"
            })
        );
        assert!(not_exceeding("hop_size", 512, "buf_size", 512).is_ok());
    }

    #[test]
    fn ranges() {
        assert!(ordered("min", 0.0, "max", 1.0).is_ok());
        assert_eq!(
            ordered("min", 1.0, "max", 1.0),
            Err(InvalidReason::Unordered {
                low: "min",
                high: "max"
            })
        );
        assert_eq!(
            ordered("min", f64::NAN, "max", 1.0),
            Err(InvalidReason::NotFinite { field: "min" })
        );
    }

    #[test]
    fn rates_and_powers() {
        let limits = Limits::default();
        assert!(samplerate("samplerate", 44_100, &limits).is_ok());
        assert!(samplerate("samplerate", 0, &limits).is_err());
        assert!(samplerate("samplerate", limits.max_samplerate + 1, &limits).is_err());
        assert!(supported_rate("samplerate", 48_000, &[44_100, 48_000]).is_ok());
        assert!(supported_rate("samplerate", 12_345, &[44_100, 48_000]).is_err());
        assert!(power_of_two("size", 512).is_ok());
        assert!(power_of_two("size", 500).is_err());
        assert_eq!(path(Path::new("")), Err(InvalidReason::EmptyPath));
    }
}
