//! Type registry: selector strings to closed variant enums, per family.
//!
//! Lookup is exact and case-sensitive. Tables are built once and are
//! read-only afterwards.

use crate::error::ConstructionError;
use crate::invariant_ppt::{assert_invariant, REGISTRY_REJECTS_UNKNOWN};
use crate::notes::NotesMethod;
use crate::pitch::PitchMethod;
use crate::spectral::SpecdescMethod;
use crate::window::WindowType;
use lazy_static::lazy_static;
use std::collections::HashMap;

/// Selector table for one type family.
#[derive(Debug)]
pub struct Registry<V: 'static> {
    family: &'static str,
    entries: HashMap<&'static str, V>,
}

impl<V: Copy> Registry<V> {
    pub fn new(family: &'static str, entries: &[(&'static str, V)]) -> Self {
        Self {
            family,
            entries: entries.iter().copied().collect(),
        }
    }

    pub fn family(&self) -> &'static str {
        self.family
    }

    /// Resolve `selector`; a miss is `UnrecognizedVariant`, never a default.
    pub fn lookup(&self, selector: &str) -> Result<V, ConstructionError> {
        match self.entries.get(selector) {
            Some(&variant) => Ok(variant),
            None => {
                assert_invariant(
                    REGISTRY_REJECTS_UNKNOWN,
                    !self.entries.contains_key(selector),
                    "unknown selector rejected",
                    Some(self.family),
                );
                Err(ConstructionError::UnrecognizedVariant {
                    family: self.family,
                    selector: selector.to_string(),
                })
            }
        }
    }

    pub fn contains(&self, selector: &str) -> bool {
        self.entries.contains_key(selector)
    }

    /// Registered selector names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.entries.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

const SPECDESC_ENTRIES: &[(&str, SpecdescMethod)] = &[
    ("energy", SpecdescMethod::Energy),
    ("hfc", SpecdescMethod::Hfc),
    ("complex", SpecdescMethod::Complex),
    ("phase", SpecdescMethod::Phase),
    ("wphase", SpecdescMethod::WPhase),
    ("specdiff", SpecdescMethod::SpecDiff),
    ("kl", SpecdescMethod::Kl),
    ("mkl", SpecdescMethod::Mkl),
    ("specflux", SpecdescMethod::SpecFlux),
    ("centroid", SpecdescMethod::Centroid),
    ("spread", SpecdescMethod::Spread),
    ("skewness", SpecdescMethod::Skewness),
    ("kurtosis", SpecdescMethod::Kurtosis),
    ("slope", SpecdescMethod::Slope),
    ("decrease", SpecdescMethod::Decrease),
    ("rolloff", SpecdescMethod::Rolloff),
];

fn with_default(default: SpecdescMethod) -> Vec<(&'static str, SpecdescMethod)> {
    let mut entries = SPECDESC_ENTRIES.to_vec();
    entries.push(("default", default));
    entries
}

lazy_static! {
    pub static ref SPECDESC_METHODS: Registry<SpecdescMethod> =
        Registry::new("specdesc", SPECDESC_ENTRIES);
    pub static ref ONSET_METHODS: Registry<SpecdescMethod> =
        Registry::new("onset", &with_default(SpecdescMethod::Hfc));
    pub static ref TEMPO_METHODS: Registry<SpecdescMethod> =
        Registry::new("tempo", &with_default(SpecdescMethod::SpecFlux));
    pub static ref PITCH_METHODS: Registry<PitchMethod> = Registry::new(
        "pitch",
        &[
            ("default", PitchMethod::YinFft),
            ("yin", PitchMethod::Yin),
            ("mcomb", PitchMethod::Mcomb),
            ("fcomb", PitchMethod::Fcomb),
            ("schmitt", PitchMethod::Schmitt),
            ("yinfft", PitchMethod::YinFft),
            ("yinfast", PitchMethod::YinFast),
            ("specacf", PitchMethod::SpecAcf),
        ],
    );
    pub static ref NOTES_METHODS: Registry<NotesMethod> =
        Registry::new("notes", &[("default", NotesMethod::Default)]);
    pub static ref WINDOW_TYPES: Registry<WindowType> = Registry::new(
        "window",
        &[
            ("ones", WindowType::Ones),
            ("rectangle", WindowType::Rectangle),
            ("hamming", WindowType::Hamming),
            ("hanning", WindowType::Hanning),
            ("hanningz", WindowType::HanningZ),
            ("blackman", WindowType::Blackman),
            ("blackman_harris", WindowType::BlackmanHarris),
            ("gaussian", WindowType::Gaussian),
            ("welch", WindowType::Welch),
            ("parzen", WindowType::Parzen),
            ("default", WindowType::HanningZ),
        ],
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_only() {
        assert_eq!(PITCH_METHODS.lookup("yin").unwrap(), PitchMethod::Yin);
        assert!(PITCH_METHODS.lookup("YIN").is_err());
        assert!(PITCH_METHODS.lookup(" yin").is_err());
        assert!(PITCH_METHODS.lookup("").is_err());
    }

    #[test]
    fn defaults_resolve_per_family() {
        assert_eq!(PITCH_METHODS.lookup("default").unwrap(), PitchMethod::YinFft);
        assert_eq!(ONSET_METHODS.lookup("default").unwrap(), SpecdescMethod::Hfc);
        assert_eq!(
            TEMPO_METHODS.lookup("default").unwrap(),
            SpecdescMethod::SpecFlux
        );
        assert_eq!(WINDOW_TYPES.lookup("default").unwrap(), WindowType::HanningZ);
        assert!(!SPECDESC_METHODS.contains("default"));
    }

    #[test]
    fn miss_names_family_and_selector() {
        let err = NOTES_METHODS.lookup("not-a-real-method").unwrap_err();
        assert_eq!(
            err,
            ConstructionError::UnrecognizedVariant {
                family: "notes",
                selector: "not-a-real-method".to_string()
            }
        );
    }

    #[test]
    fn names_are_sorted() {
        let names = ONSET_METHODS.names();
        assert_eq!(names.len(), SPECDESC_ENTRIES.len() + 1);
        assert!(names.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn shared_across_threads() {
        let handles: Vec<_> = (0..4)
            .map(|_| std::thread::spawn(|| SPECDESC_METHODS.lookup("hfc").is_ok()))
            .collect();
        for h in handles {
            assert!(h.join().unwrap());
        }
    }
}
