//! Rejection of out-of-domain requests and unknown selectors.

use sigkit::filter::Filter;
use sigkit::notes::Notes;
use sigkit::onset::Onset;
use sigkit::pitch::Pitch;
use sigkit::spectral::Specdesc;
use sigkit::tempo::Tempo;
use sigkit::utils::Parameter;
use sigkit::vector::Fvec;
use sigkit::onset::DetectorRequest;
use sigkit::pitch::PitchRequest;
use sigkit::spectral::{FrameRequest, Mfcc, MfccRequest, Pvoc};
use sigkit::{ConstructionError, Factory, InvalidReason, Limits, Probe, Resource};

#[test]
fn fvec_zero_is_rejected() {
    assert_eq!(
        Fvec::new(0).unwrap_err(),
        ConstructionError::InvalidParameter(InvalidReason::NonPositive { field: "length" })
    );
    assert_eq!(Fvec::new(16).unwrap().len(), 16);
}

#[test]
fn filter_order_bounds() {
    assert!(matches!(
        Filter::new(0).unwrap_err(),
        ConstructionError::InvalidParameter(InvalidReason::NonPositive { field: "order" })
    ));
    assert_eq!(
        Filter::new(1024).unwrap_err(),
        ConstructionError::InvalidParameter(InvalidReason::OutOfRange {
            field: "order",
            value: 1024.0,
            min: 1.0,
            max: Limits::default().max_filter_order as f64,
        })
    );
    assert_eq!(Filter::new(5).unwrap().order(), 5);
    assert_eq!(Filter::new(512).unwrap().order(), 512);
}

#[test]
fn weighting_needs_a_tabulated_rate() {
    assert!(Filter::a_weighting(44_100).is_ok());
    assert_eq!(
        Filter::c_weighting(12_345).unwrap_err(),
        ConstructionError::InvalidParameter(InvalidReason::Unsupported {
            field: "samplerate",
            value: 12_345.0
        })
    );
    assert!(Filter::biquad(f64::NAN, 0.0, 0.0, 0.0, 0.0).is_err());
}

#[test]
fn unknown_methods_are_unrecognized() {
    let selector = "not-a-real-method";
    let families = [
        ("specdesc", Specdesc::new(selector, 512).map(|_| ())),
        ("pitch", Pitch::new(selector, 512, 256, 44_100).map(|_| ())),
        ("onset", Onset::new(selector, 512, 256, 44_100).map(|_| ())),
        ("tempo", Tempo::new(selector, 512, 256, 44_100).map(|_| ())),
        ("notes", Notes::new(selector, 512, 256, 44_100).map(|_| ())),
    ];
    for (family, outcome) in families {
        assert_eq!(
            outcome.unwrap_err(),
            ConstructionError::UnrecognizedVariant {
                family,
                selector: selector.to_string(),
            }
        );
    }
}

#[test]
fn selectors_are_case_sensitive() {
    assert!(Pitch::new("YIN", 512, 256, 44_100).is_err());
    assert!(Pitch::new("yin", 512, 256, 44_100).is_ok());
    assert!(Specdesc::new("", 512).is_err());
}

#[test]
fn parameter_range_must_be_ordered() {
    assert_eq!(
        Parameter::new(0.5, 0.0, 1).unwrap_err(),
        ConstructionError::InvalidParameter(InvalidReason::Unordered {
            low: "min",
            high: "max"
        })
    );
}

#[test]
fn caller_errors_are_classified() {
    let err = Fvec::new(0).unwrap_err();
    assert!(err.is_caller_error());
    assert!(!err.is_exhaustion());
    assert!(Pitch::new("nope", 512, 256, 44_100)
        .unwrap_err()
        .is_caller_error());
}

/// Build `T` through a probed factory and return the error with the number
/// of allocation attempts made before it.
fn rejected<T: Resource>(factory: Factory, req: &T::Request) -> (ConstructionError, usize) {
    let probe = Probe::new();
    let factory = factory.with_probe(probe.clone());
    match factory.construct::<T>(req) {
        Ok(_) => panic!("{} accepted", T::KIND),
        Err(err) => (err, probe.attempts()),
    }
}

#[test]
fn nested_part_rejections_come_before_any_allocation() {
    let odd = |err: &ConstructionError| {
        matches!(
            err,
            ConstructionError::InvalidParameter(InvalidReason::NotPowerOfTwo { .. })
        )
    };
    let cases = [
        rejected::<Pvoc>(
            Factory::default(),
            &FrameRequest {
                buf_size: 1000,
                hop_size: 250,
            },
        ),
        rejected::<Onset>(
            Factory::default(),
            &DetectorRequest::new("default", 1000, 250, 44_100),
        ),
        rejected::<Tempo>(
            Factory::default(),
            &DetectorRequest::new("default", 1000, 250, 44_100),
        ),
        rejected::<Notes>(
            Factory::default(),
            &DetectorRequest::new("default", 1000, 250, 44_100),
        ),
        rejected::<Pitch>(
            Factory::default(),
            &PitchRequest::new("fcomb", 1000, 250, 44_100),
        ),
    ];
    for (err, attempts) in &cases {
        assert!(odd(err), "unexpected {}", err);
        assert_eq!(*attempts, 0, "{} after {} attempts", err, attempts);
    }

    let (err, attempts) = rejected::<Pitch>(
        Factory::default(),
        &PitchRequest::new("mcomb", 512, 256, 12_345),
    );
    assert!(matches!(
        err,
        ConstructionError::InvalidParameter(InvalidReason::Unsupported { .. })
    ));
    assert_eq!(attempts, 0);
}

#[test]
fn mfcc_dct_matrix_is_checked_against_limits() {
    let limits = Limits {
        max_len: 1024,
        ..Limits::default()
    };
    let (err, attempts) = rejected::<Mfcc>(
        Factory::new(limits),
        &MfccRequest {
            win_size: 16,
            n_filters: 40,
            n_coefs: 13,
            samplerate: 44_100,
        },
    );
    assert!(matches!(
        err,
        ConstructionError::InvalidParameter(InvalidReason::OutOfRange {
            field: "size * size",
            ..
        })
    ));
    assert_eq!(attempts, 0);
}
