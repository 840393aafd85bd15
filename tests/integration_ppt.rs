//! Contract tests: lifecycle invariants fire on the paths that should trigger them.

use sigkit::harness::ExhaustionHarness;
use sigkit::invariant_ppt::{
    contract_test, DESTROY_ABSENT_NOOP, DESTROY_RELEASES_ALL, EXHAUSTION_REPORTED,
    HANDLE_COMPLETE, REGISTRY_REJECTS_UNKNOWN, UNWIND_COMPLETE, VALIDATION_GATE,
};
use sigkit::pitch::Pitch;
use sigkit::spectral::{FrameRequest, Pvoc};
use sigkit::vector::Fvec;
use sigkit::destroy;

#[test]
fn contract_validation_gate() {
    assert!(Fvec::new(0).is_err());
    contract_test("validation gate", &[VALIDATION_GATE]);
}

#[test]
fn contract_successful_construction() {
    destroy(Some(Fvec::new(8).unwrap()));
    destroy::<Fvec>(None);
    contract_test("construct and destroy", &[HANDLE_COMPLETE, DESTROY_ABSENT_NOOP]);
}

#[test]
fn contract_unknown_selector() {
    assert!(Pitch::new("not-a-real-method", 512, 256, 44_100).is_err());
    contract_test("unknown selector", &[REGISTRY_REJECTS_UNKNOWN]);
}

#[test]
fn contract_exhaustion_unwinds() {
    ExhaustionHarness::default().sweep::<Pvoc>(&FrameRequest {
        buf_size: 256,
        hop_size: 64,
    });
    contract_test(
        "exhaustion sweep",
        &[UNWIND_COMPLETE, EXHAUSTION_REPORTED, DESTROY_RELEASES_ALL],
    );
}
