//! Beat tracking and tempo estimation.

use crate::config::Limits;
use crate::error::ConstructionError;
use crate::onset::{validate_analysis, validate_frame, DetectorRequest, PeakPicker};
use crate::protocol::{Factory, Resource, ResourceKind};
use crate::registry::TEMPO_METHODS;
use crate::spectral::{Pvoc, Specdesc, SpecdescMethod, SpecdescRequest};
use crate::validate;
use crate::vector::{Cvec, Fvec, VecRequest};
use std::borrow::Cow;

/// Shortest detection-function window the tracker accepts.
pub const MIN_WINLEN: usize = 4;

/// Seconds of detection function kept by the tempo estimator.
pub const TEMPO_HISTORY_S: f64 = 5.8;

/// Detection-function window length for a given rate and hop.
pub fn tempo_winlen(samplerate: u32, hop_size: usize) -> usize {
    let raw = (TEMPO_HISTORY_S * samplerate as f64 / hop_size.max(1) as f64) as usize;
    raw.checked_next_power_of_two()
        .unwrap_or(usize::MAX)
        .max(MIN_WINLEN)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeatTrackingRequest {
    pub winlen: usize,
    pub hop_size: usize,
    pub samplerate: u32,
}

/// Autocorrelation beat tracker over a window of detection-function values.
#[derive(Debug)]
#[allow(dead_code)]
pub struct BeatTracking {
    winlen: usize,
    hop_size: usize,
    samplerate: u32,
    phwv: Fvec,
    acfout: Fvec,
    acf: Fvec,
    dfrev: Fvec,
    dfwv: Fvec,
    gwv: Fvec,
    rwv: Fvec,
}

impl BeatTracking {
    pub fn new(winlen: usize, hop_size: usize, samplerate: u32) -> Result<Self, ConstructionError> {
        crate::construct::<Self>(&BeatTrackingRequest {
            winlen,
            hop_size,
            samplerate,
        })
    }

    pub fn winlen(&self) -> usize {
        self.winlen
    }

    /// Number of lags searched, a quarter of the window.
    pub fn laglen(&self) -> usize {
        self.rwv.len()
    }

    pub fn hop_size(&self) -> usize {
        self.hop_size
    }

    pub fn samplerate(&self) -> u32 {
        self.samplerate
    }
}

impl Resource for BeatTracking {
    const KIND: ResourceKind = ResourceKind::BeatTracking;
    type Request = BeatTrackingRequest;

    fn validate(req: &BeatTrackingRequest, limits: &Limits) -> Result<(), ConstructionError> {
        validate::within("winlen", req.winlen, MIN_WINLEN, limits.max_len)?;
        validate::positive("hop_size", req.hop_size)?;
        Ok(validate::samplerate("samplerate", req.samplerate, limits)?)
    }

    fn acquire(req: &BeatTrackingRequest, factory: &Factory) -> Result<Self, ConstructionError> {
        let laglen = req.winlen / 4;
        let rwv = factory.construct::<Fvec>(&VecRequest::labelled("beattracking.rwv", laglen))?;
        let gwv = factory.construct::<Fvec>(&VecRequest::labelled("beattracking.gwv", laglen))?;
        let dfwv =
            factory.construct::<Fvec>(&VecRequest::labelled("beattracking.dfwv", req.winlen))?;
        let dfrev =
            factory.construct::<Fvec>(&VecRequest::labelled("beattracking.dfrev", req.winlen))?;
        let acf = factory.construct::<Fvec>(&VecRequest::labelled("beattracking.acf", req.winlen))?;
        let acfout =
            factory.construct::<Fvec>(&VecRequest::labelled("beattracking.acfout", laglen))?;
        let phwv =
            factory.construct::<Fvec>(&VecRequest::labelled("beattracking.phwv", 2 * laglen))?;
        Ok(Self {
            winlen: req.winlen,
            hop_size: req.hop_size,
            samplerate: req.samplerate,
            phwv,
            acfout,
            acf,
            dfrev,
            dfwv,
            gwv,
            rwv,
        })
    }
}

impl DetectorRequest {
    fn beat_tracking(&self, winlen: usize) -> BeatTrackingRequest {
        BeatTrackingRequest {
            winlen,
            hop_size: self.hop_size,
            samplerate: self.samplerate,
        }
    }
}

#[derive(Debug)]
#[allow(dead_code)]
pub struct Tempo {
    method: SpecdescMethod,
    buf_size: usize,
    hop_size: usize,
    samplerate: u32,
    onset: Fvec,
    bt: BeatTracking,
    of: Fvec,
    od: Specdesc,
    pp: PeakPicker,
    pv: Pvoc,
    out: Fvec,
    fftgrain: Cvec,
    dfframe: Fvec,
}

impl Tempo {
    pub fn new(
        method: impl Into<Cow<'static, str>>,
        buf_size: usize,
        hop_size: usize,
        samplerate: u32,
    ) -> Result<Self, ConstructionError> {
        crate::construct::<Self>(&DetectorRequest::new(method, buf_size, hop_size, samplerate))
    }

    pub fn method(&self) -> SpecdescMethod {
        self.method
    }

    pub fn buf_size(&self) -> usize {
        self.buf_size
    }

    pub fn hop_size(&self) -> usize {
        self.hop_size
    }

    pub fn samplerate(&self) -> u32 {
        self.samplerate
    }

    pub fn winlen(&self) -> usize {
        self.dfframe.len()
    }

    /// Hops between two beat predictions.
    pub fn step(&self) -> usize {
        self.out.len()
    }

    pub fn beat_tracker(&self) -> &BeatTracking {
        &self.bt
    }
}

impl Resource for Tempo {
    const KIND: ResourceKind = ResourceKind::Tempo;
    type Request = DetectorRequest;

    fn validate(req: &DetectorRequest, limits: &Limits) -> Result<(), ConstructionError> {
        validate_frame(req, limits)?;
        let winlen = tempo_winlen(req.samplerate, req.hop_size);
        validate::within("winlen", winlen, MIN_WINLEN, limits.max_len)?;
        let method = TEMPO_METHODS.lookup(&req.method)?;
        validate_analysis(req, method, limits)?;
        BeatTracking::validate(&req.beat_tracking(winlen), limits)
    }

    fn acquire(req: &DetectorRequest, factory: &Factory) -> Result<Self, ConstructionError> {
        let method = TEMPO_METHODS.lookup(&req.method)?;
        let winlen = tempo_winlen(req.samplerate, req.hop_size);
        let dfframe = factory.construct::<Fvec>(&VecRequest::labelled("tempo.dfframe", winlen))?;
        let fftgrain = factory.construct::<Cvec>(&VecRequest::new(req.buf_size))?;
        let out = factory.construct::<Fvec>(&VecRequest::labelled("tempo.out", winlen / 4))?;
        let pv = factory.construct::<Pvoc>(&req.frame())?;
        let pp = factory.construct::<PeakPicker>(&())?;
        let od =
            factory.construct::<Specdesc>(&SpecdescRequest::new(method.name(), req.buf_size))?;
        let of = factory.construct::<Fvec>(&VecRequest::labelled("tempo.of", 1))?;
        let bt = factory.construct::<BeatTracking>(&req.beat_tracking(winlen))?;
        let onset = factory.construct::<Fvec>(&VecRequest::labelled("tempo.onset", 1))?;
        Ok(Self {
            method,
            buf_size: req.buf_size,
            hop_size: req.hop_size,
            samplerate: req.samplerate,
            onset,
            bt,
            of,
            od,
            pp,
            pv,
            out,
            fftgrain,
            dfframe,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InvalidReason;

    #[test]
    fn winlen_follows_rate_and_hop() {
        // 5.8 * 44100 / 256 = 999.1
        assert_eq!(tempo_winlen(44_100, 256), 1024);
        assert_eq!(tempo_winlen(1, 4096), MIN_WINLEN);
    }

    #[test]
    fn beattracking_sizes() {
        let bt = BeatTracking::new(256, 256, 44_100).unwrap();
        assert_eq!((bt.winlen(), bt.laglen()), (256, 64));
        assert_eq!(
            BeatTracking::new(3, 256, 44_100).unwrap_err(),
            ConstructionError::InvalidParameter(InvalidReason::OutOfRange {
                field: "winlen",
                value: 3.0,
                min: 4.0,
                max: crate::config::DEFAULT_MAX_LEN as f64,
            })
        );
        assert!(BeatTracking::new(256, 0, 44_100).is_err());
    }

    #[test]
    fn default_tempo_uses_specflux() {
        let t = Tempo::new("default", 1024, 512, 44_100).unwrap();
        assert_eq!(t.method(), SpecdescMethod::SpecFlux);
        assert_eq!(t.winlen(), 512);
        assert_eq!(t.step(), 128);
        assert_eq!(t.beat_tracker().laglen(), 128);
    }

    #[test]
    fn window_beyond_limit_is_rejected_up_front() {
        let limits = Limits {
            max_len: 256,
            ..Limits::default()
        };
        let (factory, probe) = Factory::instrumented();
        let factory = factory.with_limits(limits);
        let err = factory
            .construct::<Tempo>(&DetectorRequest::new("default", 256, 64, 44_100))
            .unwrap_err();
        assert!(matches!(
            err,
            ConstructionError::InvalidParameter(InvalidReason::OutOfRange { field: "winlen", .. })
        ));
        assert_eq!(probe.attempts(), 0);
    }

    #[test]
    fn unknown_method_allocates_nothing() {
        let (factory, probe) = Factory::instrumented();
        let err = factory
            .construct::<Tempo>(&DetectorRequest::new("not-a-real-method", 1024, 512, 44_100))
            .unwrap_err();
        assert!(matches!(err, ConstructionError::UnrecognizedVariant { family: "tempo", .. }));
        assert_eq!(probe.attempts(), 0);
        assert!(Tempo::new("default", 512, 1024, 44_100).is_err());
    }
}
