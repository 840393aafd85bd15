//! Constructor and destructor protocol shared by every resource type.
//!
//! `Factory::construct` is the only way a handle comes into existence:
//! the request is validated first, with no allocator in reach, then the
//! type acquires its state step by step. A step that fails returns through
//! `?`, dropping every block and sub-resource acquired so far in reverse
//! order, so no partially built handle is ever observable.
//!
//! Destruction is an ownership transfer. `destroy` consumes the handle,
//! which turns a second call on the same handle into a compile error.
//!
//! Working buffers a type holds but never reads are owned fields under
//! `#[allow(dead_code)]`.

#![forbid(unsafe_code)]

use crate::alloc::{Allocator, Block, Probe};
use crate::config::Limits;
use crate::error::ConstructionError;
use crate::invariant_ppt::{
    assert_invariant, DESTROY_ABSENT_NOOP, EXHAUSTION_REPORTED, HANDLE_COMPLETE, UNWIND_COMPLETE,
    VALIDATION_GATE,
};
use lazy_static::lazy_static;
use std::fmt;
use std::sync::Arc;

/// Type tag carried by every handle.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Fvec,
    Lvec,
    Cvec,
    Fmat,
    Filter,
    Window,
    Fft,
    Dct,
    Pvoc,
    Filterbank,
    Mfcc,
    SpectralWhitening,
    Tss,
    Specdesc,
    PeakPicker,
    Onset,
    BeatTracking,
    Tempo,
    Notes,
    Pitch,
    PitchYin,
    PitchYinFft,
    PitchYinFast,
    PitchMcomb,
    PitchFcomb,
    PitchSchmitt,
    PitchSpecAcf,
    Sampler,
    Wavetable,
    Hist,
    Scale,
    Parameter,
    WavSink,
    WavSource,
}

impl ResourceKind {
    pub fn name(self) -> &'static str {
        match self {
            ResourceKind::Fvec => "fvec",
            ResourceKind::Lvec => "lvec",
            ResourceKind::Cvec => "cvec",
            ResourceKind::Fmat => "fmat",
            ResourceKind::Filter => "filter",
            ResourceKind::Window => "window",
            ResourceKind::Fft => "fft",
            ResourceKind::Dct => "dct",
            ResourceKind::Pvoc => "pvoc",
            ResourceKind::Filterbank => "filterbank",
            ResourceKind::Mfcc => "mfcc",
            ResourceKind::SpectralWhitening => "spectral_whitening",
            ResourceKind::Tss => "tss",
            ResourceKind::Specdesc => "specdesc",
            ResourceKind::PeakPicker => "peakpicker",
            ResourceKind::Onset => "onset",
            ResourceKind::BeatTracking => "beattracking",
            ResourceKind::Tempo => "tempo",
            ResourceKind::Notes => "notes",
            ResourceKind::Pitch => "pitch",
            ResourceKind::PitchYin => "pitchyin",
            ResourceKind::PitchYinFft => "pitchyinfft",
            ResourceKind::PitchYinFast => "pitchyinfast",
            ResourceKind::PitchMcomb => "pitchmcomb",
            ResourceKind::PitchFcomb => "pitchfcomb",
            ResourceKind::PitchSchmitt => "pitchschmitt",
            ResourceKind::PitchSpecAcf => "pitchspecacf",
            ResourceKind::Sampler => "sampler",
            ResourceKind::Wavetable => "wavetable",
            ResourceKind::Hist => "hist",
            ResourceKind::Scale => "scale",
            ResourceKind::Parameter => "parameter",
            ResourceKind::WavSink => "sink_wavwrite",
            ResourceKind::WavSource => "source_wavread",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A constructible resource type.
///
/// Implementors acquire their state in a fixed order inside `acquire` and
/// declare their fields in reverse acquisition order, so that dropping a
/// handle releases the last acquired part first.
pub trait Resource: Sized {
    const KIND: ResourceKind;

    /// Caller-supplied parameters. Never mutated by the protocol.
    type Request;

    /// Pure admissibility check. Must not allocate.
    fn validate(req: &Self::Request, limits: &Limits) -> Result<(), ConstructionError>;

    /// Acquire all state for an already validated request.
    fn acquire(req: &Self::Request, factory: &Factory) -> Result<Self, ConstructionError>;

    fn kind(&self) -> ResourceKind {
        Self::KIND
    }
}

/// Entry point of the constructor protocol: an allocator plus policy limits.
///
/// A probe attached here observes one construction at a time; share a
/// probed factory across threads only if its counters are not asserted on.
#[derive(Debug, Clone, Default)]
pub struct Factory {
    allocator: Allocator,
    limits: Limits,
}

lazy_static! {
    static ref GLOBAL_FACTORY: Factory = Factory::new(Limits::from_env());
}

impl Factory {
    pub fn new(limits: Limits) -> Self {
        Self {
            allocator: Allocator::system(),
            limits,
        }
    }

    /// Process-wide factory with limits read from the environment once.
    pub fn global() -> &'static Factory {
        &GLOBAL_FACTORY
    }

    /// A default-limits factory with a fresh probe attached.
    pub fn instrumented() -> (Self, Arc<Probe>) {
        let probe = Probe::new();
        (Self::default().with_probe(probe.clone()), probe)
    }

    pub fn with_probe(mut self, probe: Arc<Probe>) -> Self {
        self.allocator = Allocator::instrumented(probe);
        self
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    pub fn allocator(&self) -> &Allocator {
        &self.allocator
    }

    /// Acquire one zeroed buffer through this factory's allocator.
    pub fn zeroed<T: Clone + Default>(
        &self,
        what: &'static str,
        len: usize,
    ) -> Result<Block<T>, ConstructionError> {
        self.allocator.zeroed(what, len)
    }

    /// Validate `req`, then build a `T` all-or-nothing.
    pub fn construct<T: Resource>(&self, req: &T::Request) -> Result<T, ConstructionError> {
        let attempts_before = self.attempts();
        if let Err(err) = T::validate(req, &self.limits) {
            assert_invariant(
                VALIDATION_GATE,
                self.attempts() == attempts_before,
                "validation performed no allocation",
                Some(T::KIND.name()),
            );
            log::warn!("{} rejected: {}", T::KIND, err);
            return Err(err);
        }

        let live_before = self.live();
        match T::acquire(req, self) {
            Ok(handle) => {
                assert_invariant(
                    HANDLE_COMPLETE,
                    self.live() >= live_before,
                    "returned handle owns its state",
                    Some(T::KIND.name()),
                );
                log::debug!("constructed {}", T::KIND);
                Ok(handle)
            }
            Err(err) => {
                assert_invariant(
                    VALIDATION_GATE,
                    !err.is_caller_error() || self.attempts() == attempts_before,
                    "caller error raised before any allocation",
                    Some(T::KIND.name()),
                );
                assert_invariant(
                    UNWIND_COMPLETE,
                    self.live() == live_before,
                    "failed construction released its partial state",
                    Some(T::KIND.name()),
                );
                if err.is_exhaustion() {
                    assert_invariant(
                        EXHAUSTION_REPORTED,
                        true,
                        "exhaustion surfaced as ResourceExhausted",
                        Some(T::KIND.name()),
                    );
                }
                log::warn!("{} construction failed: {}", T::KIND, err);
                Err(err)
            }
        }
    }

    fn attempts(&self) -> usize {
        self.allocator.probe().map_or(0, |p| p.attempts())
    }

    fn live(&self) -> usize {
        self.allocator.probe().map_or(0, |p| p.live())
    }
}

/// Construct a `T` through the process-wide factory.
pub fn construct<T: Resource>(req: &T::Request) -> Result<T, ConstructionError> {
    Factory::global().construct::<T>(req)
}

/// Release a handle and everything it owns. `None` is a no-op.
pub fn destroy<T: Resource>(handle: Option<T>) {
    match handle {
        Some(handle) => {
            log::trace!("destroying {}", handle.kind());
            drop(handle);
        }
        None => {
            assert_invariant(DESTROY_ABSENT_NOOP, true, "destroy(None) is a no-op", None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InvalidReason;
    use crate::validate;

    /// Two buffers plus a nested pair of buffers.
    #[derive(Debug)]
    #[allow(dead_code)]
    struct Pair {
        second: Block<f32>,
        first: Block<f32>,
    }

    impl Resource for Pair {
        const KIND: ResourceKind = ResourceKind::Fvec;
        type Request = usize;

        fn validate(req: &usize, limits: &Limits) -> Result<(), ConstructionError> {
            Ok(validate::length("length", *req, limits)?)
        }

        fn acquire(req: &usize, factory: &Factory) -> Result<Self, ConstructionError> {
            let first = factory.zeroed("pair.first", *req)?;
            let second = factory.zeroed("pair.second", *req)?;
            Ok(Self { second, first })
        }
    }

    #[derive(Debug)]
    #[allow(dead_code)]
    struct Outer {
        inner: Pair,
        own: Block<f32>,
    }

    impl Resource for Outer {
        const KIND: ResourceKind = ResourceKind::Fmat;
        type Request = usize;

        fn validate(req: &usize, limits: &Limits) -> Result<(), ConstructionError> {
            validate::positive("length", *req)?;
            Pair::validate(req, limits)
        }

        fn acquire(req: &usize, factory: &Factory) -> Result<Self, ConstructionError> {
            let own = factory.zeroed("outer.own", *req)?;
            let inner = factory.construct::<Pair>(req)?;
            Ok(Self { inner, own })
        }
    }

    /// Leaves the nested Pair's checks to the nested construction.
    #[derive(Debug)]
    #[allow(dead_code)]
    struct Lax {
        inner: Pair,
        own: Block<f32>,
    }

    impl Resource for Lax {
        const KIND: ResourceKind = ResourceKind::Fmat;
        type Request = usize;

        fn validate(req: &usize, _limits: &Limits) -> Result<(), ConstructionError> {
            Ok(validate::positive("length", *req)?)
        }

        fn acquire(req: &usize, factory: &Factory) -> Result<Self, ConstructionError> {
            let own = factory.zeroed("lax.own", *req)?;
            let inner = factory.construct::<Pair>(req)?;
            Ok(Self { inner, own })
        }
    }

    #[test]
    fn validation_failure_allocates_nothing() {
        let (factory, probe) = Factory::instrumented();
        let err = factory.construct::<Pair>(&0).unwrap_err();
        assert_eq!(
            err,
            ConstructionError::InvalidParameter(InvalidReason::NonPositive { field: "length" })
        );
        assert_eq!(probe.attempts(), 0);
        assert!(probe.events().is_empty());
    }

    #[test]
    fn nested_failure_unwinds_in_reverse() {
        let probe = Probe::failing_at(3);
        let factory = Factory::default().with_probe(probe.clone());
        let err = factory.construct::<Outer>(&8).unwrap_err();
        assert!(err.is_exhaustion());
        assert_eq!(probe.live(), 0);
        assert_eq!(probe.acquired(), vec!["outer.own", "pair.first"]);
        assert_eq!(probe.released(), vec!["pair.first", "outer.own"]);
    }

    #[test]
    fn destroy_releases_in_reverse_acquisition_order() {
        let (factory, probe) = Factory::instrumented();
        let outer = factory.construct::<Outer>(&8).unwrap();
        assert_eq!(outer.kind(), ResourceKind::Fmat);
        assert_eq!(probe.live(), 3);
        destroy(Some(outer));
        assert_eq!(probe.live(), 0);
        assert_eq!(
            probe.released(),
            vec!["pair.second", "pair.first", "outer.own"]
        );
    }

    #[test]
    fn destroy_absent_is_noop() {
        destroy::<Pair>(None);
    }

    #[test]
    fn nested_limits_are_checked_before_acquiring() {
        let limits = Limits {
            max_len: 4,
            ..Limits::default()
        };
        let (factory, probe) = Factory::instrumented();
        let factory = factory.with_limits(limits);
        let err = factory.construct::<Outer>(&8).unwrap_err();
        assert!(matches!(
            err,
            ConstructionError::InvalidParameter(InvalidReason::OutOfRange { .. })
        ));
        assert_eq!(probe.attempts(), 0);
    }

    #[test]
    #[should_panic(expected = "caller error raised before any allocation")]
    fn caller_error_after_allocation_is_an_invariant_failure() {
        let limits = Limits {
            max_len: 4,
            ..Limits::default()
        };
        let (factory, _probe) = Factory::instrumented();
        let _ = factory.with_limits(limits).construct::<Lax>(&8);
    }

    #[test]
    fn kind_names() {
        assert_eq!(ResourceKind::WavSink.to_string(), "sink_wavwrite");
        assert_eq!(ResourceKind::PitchYinFast.name(), "pitchyinfast");
    }
}
