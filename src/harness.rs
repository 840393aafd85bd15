//! Exhaustion sweep harness: fails each allocation step of a construction in
//! turn and checks that nothing stays allocated.

use crate::alloc::Probe;
use crate::error::ConstructionError;
use crate::invariant_ppt::{assert_invariant, DESTROY_RELEASES_ALL};
use crate::protocol::{destroy, Factory, Resource};
use crate::Limits;

/// Outcome of a sweep over one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepReport {
    /// Allocation steps of a successful construction.
    pub steps: usize,
    /// Labels acquired by the successful construction, in order.
    pub labels: Vec<&'static str>,
}

/// Drives one request through every possible exhaustion point.
pub struct ExhaustionHarness {
    limits: Limits,
}

impl Default for ExhaustionHarness {
    fn default() -> Self {
        Self::new(Limits::default())
    }
}

impl ExhaustionHarness {
    pub fn new(limits: Limits) -> Self {
        Self { limits }
    }

    fn factory(&self, probe: std::sync::Arc<Probe>) -> Factory {
        Factory::new(self.limits.clone()).with_probe(probe)
    }

    /// Construct once to count its steps, then fail step 1..=steps.
    ///
    /// Panics with a description of the first violated expectation.
    pub fn sweep<T: Resource>(&self, req: &T::Request) -> SweepReport {
        let probe = Probe::new();
        let handle = match self.factory(probe.clone()).construct::<T>(req) {
            Ok(handle) => handle,
            Err(err) => panic!("{} did not construct: {}", T::KIND, err),
        };
        let steps = probe.attempts();
        let labels = probe.acquired();
        destroy(Some(handle));
        assert_invariant(
            DESTROY_RELEASES_ALL,
            probe.live() == 0,
            "destroy released every block",
            Some(T::KIND.name()),
        );

        for step in 1..=steps {
            let probe = Probe::failing_at(step);
            match self.factory(probe.clone()).construct::<T>(req) {
                Err(ConstructionError::ResourceExhausted { what, .. }) => {
                    assert_eq!(what, labels[step - 1], "{} step {}", T::KIND, step);
                }
                Err(other) => panic!("{} step {}: unexpected {}", T::KIND, step, other),
                Ok(_) => panic!("{} step {}: constructed despite exhaustion", T::KIND, step),
            }
            assert_eq!(probe.live(), 0, "{} step {} leaked", T::KIND, step);

            let mut expected = labels[..step - 1].to_vec();
            assert_eq!(probe.acquired(), expected, "{} step {}", T::KIND, step);
            expected.reverse();
            assert_eq!(
                probe.released(),
                expected,
                "{} step {}: not released in reverse order",
                T::KIND,
                step
            );
        }

        SweepReport { steps, labels }
    }
}
