//! Policy limits applied by the validators.
//!
//! Defaults can be overridden from `SIGKIT_*` environment variables.
//! Invalid or zero values fall back to the default with a warning.
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `SIGKIT_MAX_FILTER_ORDER` | 512 | Largest accepted filter order |
//! | `SIGKIT_MAX_LEN` | 16777216 | Largest single buffer, in elements |
//! | `SIGKIT_MAX_SAMPLERATE` | 1536000 | Largest accepted sample rate (Hz) |
//! | `SIGKIT_SINK_MAX_FRAMES` | 4096 | Scratch frames held by a file sink |

pub const DEFAULT_MAX_FILTER_ORDER: usize = 512;
pub const DEFAULT_MAX_LEN: usize = 1 << 24;
pub const DEFAULT_MAX_SAMPLERATE: u32 = 1_536_000;
pub const DEFAULT_SINK_MAX_FRAMES: usize = 4096;

/// Admissible domain for construction requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    pub max_filter_order: usize,
    pub max_len: usize,
    pub max_samplerate: u32,
    pub sink_max_frames: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_filter_order: DEFAULT_MAX_FILTER_ORDER,
            max_len: DEFAULT_MAX_LEN,
            max_samplerate: DEFAULT_MAX_SAMPLERATE,
            sink_max_frames: DEFAULT_SINK_MAX_FRAMES,
        }
    }
}

impl Limits {
    /// Load limits from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            max_filter_order: parse_or(
                &lookup,
                "SIGKIT_MAX_FILTER_ORDER",
                DEFAULT_MAX_FILTER_ORDER,
            ),
            max_len: parse_or(&lookup, "SIGKIT_MAX_LEN", DEFAULT_MAX_LEN),
            max_samplerate: parse_or(&lookup, "SIGKIT_MAX_SAMPLERATE", DEFAULT_MAX_SAMPLERATE),
            sink_max_frames: parse_or(&lookup, "SIGKIT_SINK_MAX_FRAMES", DEFAULT_SINK_MAX_FRAMES),
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: std::str::FromStr + PartialEq + Default + Copy + std::fmt::Display,
{
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) if value != T::default() => value,
            _ => {
                log::warn!("ignoring {}={:?}, using {}", key, raw, default);
                default
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_overrides() {
        assert_eq!(Limits::from_lookup(|_| None), Limits::default());
    }

    #[test]
    fn overrides_are_applied() {
        let limits = Limits::from_lookup(lookup_from(&[
            ("SIGKIT_MAX_FILTER_ORDER", "64"),
            ("SIGKIT_MAX_SAMPLERATE", " 96000 "),
        ]));
        assert_eq!(limits.max_filter_order, 64);
        assert_eq!(limits.max_samplerate, 96_000);
        assert_eq!(limits.max_len, DEFAULT_MAX_LEN);
    }

    #[test]
    fn garbage_and_zero_fall_back() {
        let limits = Limits::from_lookup(lookup_from(&[
            ("SIGKIT_MAX_FILTER_ORDER", "lots"),
            ("SIGKIT_MAX_LEN", "0"),
        ]));
        assert_eq!(limits, Limits::default());
    }
}
