//! Onset detection: phase vocoder, spectral description and peak picking.

use crate::config::Limits;
use crate::error::ConstructionError;
use crate::filter::{Filter, FilterRequest};
use crate::protocol::{Factory, Resource, ResourceKind};
use crate::registry::ONSET_METHODS;
use crate::spectral::{
    FrameRequest, Pvoc, SpecdescMethod, SpecdescRequest, Specdesc, SpectralWhitening,
    WhiteningRequest,
};
use crate::validate;
use crate::vector::{Cvec, Fvec, VecRequest};
use std::borrow::Cow;

pub const PEAKPICKER_WIN_PRE: usize = 1;
pub const PEAKPICKER_WIN_POST: usize = 5;
pub const PEAKPICKER_THRESHOLD: f32 = 0.1;

/// Smoothing biquad applied to the detection function before thresholding.
const PEAKPICKER_BIQUAD: FilterRequest = FilterRequest::Biquad {
    b0: 0.159_987_89,
    b1: 0.319_975_77,
    b2: 0.159_987_89,
    a1: -0.594_888_94,
    a2: 0.234_840_48,
};

/// Adaptive-threshold peak picker.
#[derive(Debug)]
#[allow(dead_code)]
pub struct PeakPicker {
    threshold: f32,
    biquad: Filter,
    thresholded: Fvec,
    onset_peek: Fvec,
    onset_proc: Fvec,
    onset_keep: Fvec,
    scratch: Fvec,
}

impl PeakPicker {
    pub fn new() -> Result<Self, ConstructionError> {
        crate::construct::<Self>(&())
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Length of the median window around each candidate.
    pub fn window_len(&self) -> usize {
        self.onset_keep.len()
    }
}

impl Resource for PeakPicker {
    const KIND: ResourceKind = ResourceKind::PeakPicker;
    type Request = ();

    fn validate(_req: &(), limits: &Limits) -> Result<(), ConstructionError> {
        Filter::validate(&PEAKPICKER_BIQUAD, limits)
    }

    fn acquire(_req: &(), factory: &Factory) -> Result<Self, ConstructionError> {
        let window = PEAKPICKER_WIN_POST + PEAKPICKER_WIN_PRE + 1;
        let scratch =
            factory.construct::<Fvec>(&VecRequest::labelled("peakpicker.scratch", window))?;
        let onset_keep =
            factory.construct::<Fvec>(&VecRequest::labelled("peakpicker.onset_keep", window))?;
        let onset_proc =
            factory.construct::<Fvec>(&VecRequest::labelled("peakpicker.onset_proc", window))?;
        let onset_peek =
            factory.construct::<Fvec>(&VecRequest::labelled("peakpicker.onset_peek", 3))?;
        let thresholded =
            factory.construct::<Fvec>(&VecRequest::labelled("peakpicker.thresholded", 1))?;
        let biquad = factory.construct::<Filter>(&PEAKPICKER_BIQUAD)?;
        Ok(Self {
            threshold: PEAKPICKER_THRESHOLD,
            biquad,
            thresholded,
            onset_peek,
            onset_proc,
            onset_keep,
            scratch,
        })
    }
}

/// Request shared by the frame-based detectors (onset, tempo, notes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectorRequest {
    pub method: Cow<'static, str>,
    pub buf_size: usize,
    pub hop_size: usize,
    pub samplerate: u32,
}

impl DetectorRequest {
    pub fn new(
        method: impl Into<Cow<'static, str>>,
        buf_size: usize,
        hop_size: usize,
        samplerate: u32,
    ) -> Self {
        Self {
            method: method.into(),
            buf_size,
            hop_size,
            samplerate,
        }
    }

    pub(crate) fn frame(&self) -> FrameRequest {
        FrameRequest {
            buf_size: self.buf_size,
            hop_size: self.hop_size,
        }
    }

    fn whitening(&self) -> WhiteningRequest {
        WhiteningRequest {
            buf_size: self.buf_size,
            hop_size: self.hop_size,
            samplerate: self.samplerate,
        }
    }
}

/// Checks common to every detector running a phase vocoder.
pub(crate) fn validate_frame(
    req: &DetectorRequest,
    limits: &Limits,
) -> Result<(), ConstructionError> {
    validate::positive("hop_size", req.hop_size)?;
    validate::positive("buf_size", req.buf_size)?;
    validate::within("buf_size", req.buf_size, 2, limits.max_len)?;
    validate::not_exceeding("hop_size", req.hop_size, "buf_size", req.buf_size)?;
    Ok(validate::samplerate("samplerate", req.samplerate, limits)?)
}

/// Phase vocoder, peak picker and descriptor checks shared by onset and tempo.
pub(crate) fn validate_analysis(
    req: &DetectorRequest,
    method: SpecdescMethod,
    limits: &Limits,
) -> Result<(), ConstructionError> {
    Pvoc::validate(&req.frame(), limits)?;
    PeakPicker::validate(&(), limits)?;
    Specdesc::validate(&SpecdescRequest::new(method.name(), req.buf_size), limits)
}

pub const ONSET_THRESHOLD: f32 = 0.3;
pub const ONSET_SILENCE_DB: f32 = -70.0;
pub const ONSET_MINIOI_S: f32 = 0.02;

#[derive(Debug)]
#[allow(dead_code)]
pub struct Onset {
    method: SpecdescMethod,
    buf_size: usize,
    hop_size: usize,
    samplerate: u32,
    threshold: f32,
    silence_db: f32,
    minioi_s: f32,
    delay: f32,
    whitening: SpectralWhitening,
    desc: Fvec,
    fftgrain: Cvec,
    od: Specdesc,
    pp: PeakPicker,
    pv: Pvoc,
}

impl Onset {
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

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn silence_db(&self) -> f32 {
        self.silence_db
    }

    /// Minimum inter-onset interval, in seconds.
    pub fn minioi_s(&self) -> f32 {
        self.minioi_s
    }

    /// Reporting delay, in samples.
    pub fn delay(&self) -> f32 {
        self.delay
    }

    pub fn specdesc(&self) -> &Specdesc {
        &self.od
    }

    pub fn peakpicker(&self) -> &PeakPicker {
        &self.pp
    }
}

impl Resource for Onset {
    const KIND: ResourceKind = ResourceKind::Onset;
    type Request = DetectorRequest;

    fn validate(req: &DetectorRequest, limits: &Limits) -> Result<(), ConstructionError> {
        validate_frame(req, limits)?;
        let method = ONSET_METHODS.lookup(&req.method)?;
        validate_analysis(req, method, limits)?;
        SpectralWhitening::validate(&req.whitening(), limits)
    }

    fn acquire(req: &DetectorRequest, factory: &Factory) -> Result<Self, ConstructionError> {
        let method = ONSET_METHODS.lookup(&req.method)?;
        let pv = factory.construct::<Pvoc>(&req.frame())?;
        let pp = factory.construct::<PeakPicker>(&())?;
        let od =
            factory.construct::<Specdesc>(&SpecdescRequest::new(method.name(), req.buf_size))?;
        let fftgrain = factory.construct::<Cvec>(&VecRequest::new(req.buf_size))?;
        let desc = factory.construct::<Fvec>(&VecRequest::labelled("onset.desc", 1))?;
        let whitening = factory.construct::<SpectralWhitening>(&req.whitening())?;
        Ok(Self {
            method,
            buf_size: req.buf_size,
            hop_size: req.hop_size,
            samplerate: req.samplerate,
            threshold: ONSET_THRESHOLD,
            silence_db: ONSET_SILENCE_DB,
            minioi_s: ONSET_MINIOI_S,
            delay: 4.3 * req.hop_size as f32,
            whitening,
            desc,
            fftgrain,
            od,
            pp,
            pv,
        })
    }
}
