use proptest::prelude::*;
use sigkit::filter::{Filter, FilterRequest};
use sigkit::spectral::{FrameRequest, Pvoc};
use sigkit::vector::{Fmat, FmatRequest, Fvec, VecRequest};
use sigkit::{ConstructionError, Factory, Limits, Probe};

proptest! {
    #[test]
    fn fvec_accepts_exactly_positive_lengths(length in 0usize..4096) {
        let (factory, probe) = Factory::instrumented();
        match factory.construct::<Fvec>(&VecRequest::new(length)) {
            Ok(v) => {
                prop_assert!(length > 0);
                prop_assert_eq!(v.len(), length);
                prop_assert!(v.data().iter().all(|&s| s == 0.0));
            }
            Err(err) => {
                prop_assert_eq!(length, 0);
                prop_assert!(err.is_caller_error());
                prop_assert_eq!(probe.attempts(), 0);
            }
        }
        prop_assert_eq!(probe.live(), 0);
    }

    #[test]
    fn filter_order_window(order in 0usize..2048) {
        let limits = Limits::default();
        let outcome = Factory::new(limits.clone()).construct::<Filter>(&FilterRequest::Order(order));
        prop_assert_eq!(outcome.is_ok(), order >= 1 && order <= limits.max_filter_order);
    }

    #[test]
    fn construction_is_deterministic(height in 1usize..16, length in 1usize..64) {
        let req = FmatRequest { height, length };
        let (fa, pa) = Factory::instrumented();
        let (fb, pb) = Factory::instrumented();
        let a = fa.construct::<Fmat>(&req).unwrap();
        let b = fb.construct::<Fmat>(&req).unwrap();
        prop_assert_eq!((a.height(), a.length()), (b.height(), b.length()));
        prop_assert_eq!(pa.events(), pb.events());
    }

    #[test]
    fn any_failed_step_leaves_nothing_live(step in 1usize..16, hop_exp in 0u32..9) {
        let req = FrameRequest { buf_size: 512, hop_size: 1 << hop_exp };
        let probe = Probe::failing_at(step);
        let factory = Factory::default().with_probe(probe.clone());
        match factory.construct::<Pvoc>(&req) {
            Ok(pv) => {
                prop_assert!(step > probe.attempts());
                drop(pv);
            }
            Err(ConstructionError::ResourceExhausted { .. }) => {
                prop_assert_eq!(probe.attempts(), step);
            }
            Err(other) => prop_assert!(false, "unexpected {}", other),
        }
        prop_assert_eq!(probe.live(), 0);
    }
}
