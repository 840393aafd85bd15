//! Pitch detection: one front object dispatching to a selected detector.

use crate::alloc::Block;
use crate::config::Limits;
use crate::error::ConstructionError;
use crate::filter::{Filter, FilterRequest};
use crate::protocol::{Factory, Resource, ResourceKind};
use crate::registry::PITCH_METHODS;
use crate::spectral::{spectrum_bins, Fft, FrameRequest, Pvoc, SizeRequest};
use crate::validate;
use crate::vector::{Cvec, Fmat, FmatRequest, Fvec, VecRequest};
use crate::window::{Window, WindowRequest};
use std::borrow::Cow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PitchMethod {
    Yin,
    Mcomb,
    Fcomb,
    Schmitt,
    YinFft,
    YinFast,
    SpecAcf,
}

impl PitchMethod {
    /// Default confidence threshold, for detectors that have one.
    pub fn default_tolerance(self) -> Option<f32> {
        match self {
            PitchMethod::Yin | PitchMethod::YinFast => Some(0.15),
            PitchMethod::YinFft => Some(0.85),
            PitchMethod::SpecAcf => Some(0.85),
            PitchMethod::Mcomb | PitchMethod::Fcomb | PitchMethod::Schmitt => None,
        }
    }
}

fn fvec(
    factory: &Factory,
    label: &'static str,
    length: usize,
) -> Result<Fvec, ConstructionError> {
    factory.construct::<Fvec>(&VecRequest::labelled(label, length))
}

/// Time-domain YIN.
#[derive(Debug)]
#[allow(dead_code)]
pub struct PitchYin {
    yin: Fvec,
}

impl Resource for PitchYin {
    const KIND: ResourceKind = ResourceKind::PitchYin;
    type Request = SizeRequest;

    fn validate(req: &SizeRequest, limits: &Limits) -> Result<(), ConstructionError> {
        validate::positive("buf_size", req.size)?;
        Ok(validate::within("buf_size", req.size, 2, limits.max_len)?)
    }

    fn acquire(req: &SizeRequest, factory: &Factory) -> Result<Self, ConstructionError> {
        Ok(Self {
            yin: fvec(factory, "pitchyin.yin", req.size / 2)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YinFftRequest {
    pub samplerate: u32,
    pub buf_size: usize,
}

/// Spectral YIN with perceptual weighting.
#[derive(Debug)]
#[allow(dead_code)]
pub struct PitchYinFft {
    samplerate: u32,
    win: Window,
    yinfft: Fvec,
    fft: Fft,
    fftout: Cvec,
    weight: Fvec,
    sqrmag: Fvec,
    winput: Fvec,
}

impl Resource for PitchYinFft {
    const KIND: ResourceKind = ResourceKind::PitchYinFft;
    type Request = YinFftRequest;

    fn validate(req: &YinFftRequest, limits: &Limits) -> Result<(), ConstructionError> {
        validate::samplerate("samplerate", req.samplerate, limits)?;
        validate::length("buf_size", req.buf_size, limits)?;
        Fft::validate(&SizeRequest { size: req.buf_size }, limits)?;
        Window::validate(&WindowRequest::new("hanningz", req.buf_size), limits)
    }

    fn acquire(req: &YinFftRequest, factory: &Factory) -> Result<Self, ConstructionError> {
        let n = req.buf_size;
        let winput = fvec(factory, "pitchyinfft.winput", n)?;
        let sqrmag = fvec(factory, "pitchyinfft.sqrmag", n)?;
        let weight = fvec(factory, "pitchyinfft.weight", spectrum_bins(n))?;
        let fftout = factory.construct::<Cvec>(&VecRequest::new(n))?;
        let fft = factory.construct::<Fft>(&SizeRequest { size: n })?;
        let yinfft = fvec(factory, "pitchyinfft.yinfft", spectrum_bins(n))?;
        let win = factory.construct::<Window>(&WindowRequest::new("hanningz", n))?;
        Ok(Self {
            samplerate: req.samplerate,
            win,
            yinfft,
            fft,
            fftout,
            weight,
            sqrmag,
            winput,
        })
    }
}

/// YIN computed through FFT-based autocorrelation.
#[derive(Debug)]
#[allow(dead_code)]
pub struct PitchYinFast {
    fft: Fft,
    kernel_fft: Fvec,
    samples_fft: Fvec,
    kernel: Fvec,
    sqdiff: Fvec,
    tmpdata: Fvec,
    yin: Fvec,
}

impl Resource for PitchYinFast {
    const KIND: ResourceKind = ResourceKind::PitchYinFast;
    type Request = SizeRequest;

    fn validate(req: &SizeRequest, limits: &Limits) -> Result<(), ConstructionError> {
        validate::positive("buf_size", req.size)?;
        validate::within("buf_size", req.size, 2, limits.max_len)?;
        Fft::validate(req, limits)
    }

    fn acquire(req: &SizeRequest, factory: &Factory) -> Result<Self, ConstructionError> {
        let n = req.size;
        let yin = fvec(factory, "pitchyinfast.yin", n / 2)?;
        let tmpdata = fvec(factory, "pitchyinfast.tmpdata", n)?;
        let sqdiff = fvec(factory, "pitchyinfast.sqdiff", n / 2)?;
        let kernel = fvec(factory, "pitchyinfast.kernel", n)?;
        let samples_fft = fvec(factory, "pitchyinfast.samples_fft", n)?;
        let kernel_fft = fvec(factory, "pitchyinfast.kernel_fft", n)?;
        let fft = factory.construct::<Fft>(&SizeRequest { size: n })?;
        Ok(Self {
            fft,
            kernel_fft,
            samples_fft,
            kernel,
            sqdiff,
            tmpdata,
            yin,
        })
    }
}

pub const MCOMB_CANDIDATES: usize = 5;

fn mcomb_candidates(buf_size: usize) -> FmatRequest {
    FmatRequest {
        height: MCOMB_CANDIDATES,
        length: spectrum_bins(buf_size),
    }
}

/// Multiple-comb harmonic matching on spectral peaks.
#[derive(Debug)]
#[allow(dead_code)]
pub struct PitchMcomb {
    peaks: Block<usize>,
    candidates: Fmat,
    theta: Fvec,
    scratch2: Fvec,
    scratch: Fvec,
    newmag: Fvec,
}

impl Resource for PitchMcomb {
    const KIND: ResourceKind = ResourceKind::PitchMcomb;
    type Request = FrameRequest;

    fn validate(req: &FrameRequest, limits: &Limits) -> Result<(), ConstructionError> {
        validate::length("buf_size", req.buf_size, limits)?;
        validate::positive("hop_size", req.hop_size)?;
        Fmat::validate(&mcomb_candidates(req.buf_size), limits)
    }

    fn acquire(req: &FrameRequest, factory: &Factory) -> Result<Self, ConstructionError> {
        let bins = spectrum_bins(req.buf_size);
        let newmag = fvec(factory, "pitchmcomb.newmag", bins)?;
        let scratch = fvec(factory, "pitchmcomb.scratch", bins)?;
        let scratch2 = fvec(factory, "pitchmcomb.scratch2", bins)?;
        let theta = fvec(factory, "pitchmcomb.theta", bins)?;
        let candidates = factory.construct::<Fmat>(&mcomb_candidates(req.buf_size))?;
        let peaks = factory.zeroed("pitchmcomb.peaks", bins)?;
        Ok(Self {
            peaks,
            candidates,
            theta,
            scratch2,
            scratch,
            newmag,
        })
    }
}

/// Fast harmonic comb on the windowed spectrum.
#[derive(Debug)]
#[allow(dead_code)]
pub struct PitchFcomb {
    last_phase: Fvec,
    fft: Fft,
    win: Window,
    fftout: Cvec,
    winput: Fvec,
}

impl Resource for PitchFcomb {
    const KIND: ResourceKind = ResourceKind::PitchFcomb;
    type Request = FrameRequest;

    fn validate(req: &FrameRequest, limits: &Limits) -> Result<(), ConstructionError> {
        validate::length("buf_size", req.buf_size, limits)?;
        validate::positive("hop_size", req.hop_size)?;
        Fft::validate(&SizeRequest { size: req.buf_size }, limits)?;
        Window::validate(&WindowRequest::new("hanning", req.buf_size), limits)
    }

    fn acquire(req: &FrameRequest, factory: &Factory) -> Result<Self, ConstructionError> {
        let n = req.buf_size;
        let winput = fvec(factory, "pitchfcomb.winput", n)?;
        let fftout = factory.construct::<Cvec>(&VecRequest::new(n))?;
        let win = factory.construct::<Window>(&WindowRequest::new("hanning", n))?;
        let fft = factory.construct::<Fft>(&SizeRequest { size: n })?;
        let last_phase = fvec(factory, "pitchfcomb.last_phase", spectrum_bins(n))?;
        Ok(Self {
            last_phase,
            fft,
            win,
            fftout,
            winput,
        })
    }
}

/// Schmitt trigger on integer samples.
#[derive(Debug)]
#[allow(dead_code)]
pub struct PitchSchmitt {
    buf: Block<i16>,
}

impl Resource for PitchSchmitt {
    const KIND: ResourceKind = ResourceKind::PitchSchmitt;
    type Request = SizeRequest;

    fn validate(req: &SizeRequest, limits: &Limits) -> Result<(), ConstructionError> {
        Ok(validate::length("buf_size", req.size, limits)?)
    }

    fn acquire(req: &SizeRequest, factory: &Factory) -> Result<Self, ConstructionError> {
        Ok(Self {
            buf: factory.zeroed("pitchschmitt.buf", req.size)?,
        })
    }
}

/// Spectral autocorrelation.
#[derive(Debug)]
#[allow(dead_code)]
pub struct PitchSpecAcf {
    acf: Fvec,
    sqrmag: Fvec,
    fftout: Cvec,
    fft: Fft,
    winput: Fvec,
    win: Window,
}

impl Resource for PitchSpecAcf {
    const KIND: ResourceKind = ResourceKind::PitchSpecAcf;
    type Request = SizeRequest;

    fn validate(req: &SizeRequest, limits: &Limits) -> Result<(), ConstructionError> {
        validate::length("buf_size", req.size, limits)?;
        Fft::validate(req, limits)?;
        Window::validate(&WindowRequest::new("hanningz", req.size), limits)
    }

    fn acquire(req: &SizeRequest, factory: &Factory) -> Result<Self, ConstructionError> {
        let n = req.size;
        let win = factory.construct::<Window>(&WindowRequest::new("hanningz", n))?;
        let winput = fvec(factory, "pitchspecacf.winput", n)?;
        let fft = factory.construct::<Fft>(&SizeRequest { size: n })?;
        let fftout = factory.construct::<Cvec>(&VecRequest::new(n))?;
        let sqrmag = fvec(factory, "pitchspecacf.sqrmag", n)?;
        let acf = fvec(factory, "pitchspecacf.acf", spectrum_bins(n))?;
        Ok(Self {
            acf,
            sqrmag,
            fftout,
            fft,
            winput,
            win,
        })
    }
}

/// The detector a pitch object dispatches to.
#[derive(Debug)]
pub enum Detector {
    Yin(PitchYin),
    Mcomb(PitchMcomb),
    Fcomb(PitchFcomb),
    Schmitt(PitchSchmitt),
    YinFft(PitchYinFft),
    YinFast(PitchYinFast),
    SpecAcf(PitchSpecAcf),
}

impl Detector {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Detector::Yin(d) => d.kind(),
            Detector::Mcomb(d) => d.kind(),
            Detector::Fcomb(d) => d.kind(),
            Detector::Schmitt(d) => d.kind(),
            Detector::YinFft(d) => d.kind(),
            Detector::YinFast(d) => d.kind(),
            Detector::SpecAcf(d) => d.kind(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PitchRequest {
    pub method: Cow<'static, str>,
    pub buf_size: usize,
    pub hop_size: usize,
    pub samplerate: u32,
}

impl PitchRequest {
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
}

/// Spectral front end used by the multi-comb detector.
#[derive(Debug)]
#[allow(dead_code)]
struct McombFront {
    filter: Filter,
    fftgrain: Cvec,
    pv: Pvoc,
    filtered: Fvec,
}

pub const DEFAULT_SILENCE_DB: f32 = -50.0;

/// Checks every part `method` will build, so nothing is acquired for a
/// request some nested part would refuse.
fn validate_detector(
    method: PitchMethod,
    req: &PitchRequest,
    limits: &Limits,
) -> Result<(), ConstructionError> {
    let size = SizeRequest { size: req.buf_size };
    let frame = FrameRequest {
        buf_size: req.buf_size,
        hop_size: req.hop_size,
    };
    match method {
        PitchMethod::Yin => PitchYin::validate(&size, limits),
        PitchMethod::Mcomb => {
            Pvoc::validate(&frame, limits)?;
            Filter::validate(
                &FilterRequest::CWeighting {
                    samplerate: req.samplerate,
                },
                limits,
            )?;
            PitchMcomb::validate(&frame, limits)
        }
        PitchMethod::Fcomb => PitchFcomb::validate(&frame, limits),
        PitchMethod::Schmitt => PitchSchmitt::validate(&size, limits),
        PitchMethod::YinFft => PitchYinFft::validate(
            &YinFftRequest {
                samplerate: req.samplerate,
                buf_size: req.buf_size,
            },
            limits,
        ),
        PitchMethod::YinFast => PitchYinFast::validate(&size, limits),
        PitchMethod::SpecAcf => PitchSpecAcf::validate(&size, limits),
    }
}

#[derive(Debug)]
#[allow(dead_code)]
pub struct Pitch {
    method: PitchMethod,
    buf_size: usize,
    hop_size: usize,
    samplerate: u32,
    tolerance: Option<f32>,
    silence_db: f32,
    detector: Detector,
    front: Option<McombFront>,
    buf: Option<Fvec>,
}

impl Pitch {
    pub fn new(
        method: impl Into<Cow<'static, str>>,
        buf_size: usize,
        hop_size: usize,
        samplerate: u32,
    ) -> Result<Self, ConstructionError> {
        crate::construct::<Self>(&PitchRequest::new(method, buf_size, hop_size, samplerate))
    }

    pub fn method(&self) -> PitchMethod {
        self.method
    }

    pub fn detector(&self) -> &Detector {
        &self.detector
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

    pub fn tolerance(&self) -> Option<f32> {
        self.tolerance
    }

    pub fn silence_db(&self) -> f32 {
        self.silence_db
    }
}

impl Resource for Pitch {
    const KIND: ResourceKind = ResourceKind::Pitch;
    type Request = PitchRequest;

    fn validate(req: &PitchRequest, limits: &Limits) -> Result<(), ConstructionError> {
        validate::positive("hop_size", req.hop_size)?;
        validate::length("buf_size", req.buf_size, limits)?;
        validate::samplerate("samplerate", req.samplerate, limits)?;
        validate::not_exceeding("hop_size", req.hop_size, "buf_size", req.buf_size)?;
        let method = PITCH_METHODS.lookup(&req.method)?;
        validate_detector(method, req, limits)
    }

    fn acquire(req: &PitchRequest, factory: &Factory) -> Result<Self, ConstructionError> {
        let method = PITCH_METHODS.lookup(&req.method)?;
        let n = req.buf_size;
        let size = SizeRequest { size: n };
        let frame = FrameRequest {
            buf_size: n,
            hop_size: req.hop_size,
        };

        let (buf, front) = if method == PitchMethod::Mcomb {
            let filtered = fvec(factory, "pitch.filtered", req.hop_size)?;
            let pv = factory.construct::<Pvoc>(&frame)?;
            let fftgrain = factory.construct::<Cvec>(&VecRequest::new(n))?;
            let filter = factory.construct::<Filter>(&FilterRequest::CWeighting {
                samplerate: req.samplerate,
            })?;
            (
                None,
                Some(McombFront {
                    filter,
                    fftgrain,
                    pv,
                    filtered,
                }),
            )
        } else {
            (Some(fvec(factory, "pitch.buf", n)?), None)
        };

        let detector = match method {
            PitchMethod::Yin => Detector::Yin(factory.construct(&size)?),
            PitchMethod::Mcomb => Detector::Mcomb(factory.construct(&frame)?),
            PitchMethod::Fcomb => Detector::Fcomb(factory.construct(&frame)?),
            PitchMethod::Schmitt => Detector::Schmitt(factory.construct(&size)?),
            PitchMethod::YinFft => Detector::YinFft(factory.construct(&YinFftRequest {
                samplerate: req.samplerate,
                buf_size: n,
            })?),
            PitchMethod::YinFast => Detector::YinFast(factory.construct(&size)?),
            PitchMethod::SpecAcf => Detector::SpecAcf(factory.construct(&size)?),
        };

        Ok(Self {
            method,
            buf_size: n,
            hop_size: req.hop_size,
            samplerate: req.samplerate,
            tolerance: method.default_tolerance(),
            silence_db: DEFAULT_SILENCE_DB,
            detector,
            front,
            buf,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InvalidReason;

    #[test]
    fn every_method_builds() {
        for name in PITCH_METHODS.names() {
            let (factory, probe) = Factory::instrumented();
            let p = factory
                .construct::<Pitch>(&PitchRequest::new(name, 512, 256, 44_100))
                .unwrap();
            assert_eq!(p.buf_size(), 512);
            drop(p);
            assert_eq!(probe.live(), 0, "{} leaked", name);
        }
    }

    #[test]
    fn default_is_yinfft() {
        let p = Pitch::new("default", 512, 256, 44_100).unwrap();
        assert_eq!(p.method(), PitchMethod::YinFft);
        assert_eq!(p.detector().kind(), ResourceKind::PitchYinFft);
        assert_eq!(p.tolerance(), Some(0.85));
        assert_eq!(p.silence_db(), DEFAULT_SILENCE_DB);
    }

    #[test]
    fn unknown_method_is_unrecognized() {
        let (factory, probe) = Factory::instrumented();
        let err = factory
            .construct::<Pitch>(&PitchRequest::new("not-a-real-method", 512, 256, 44_100))
            .unwrap_err();
        assert_eq!(
            err,
            ConstructionError::UnrecognizedVariant {
                family: "pitch",
                selector: "not-a-real-method".to_string()
            }
        );
        assert_eq!(probe.attempts(), 0);
    }

    #[test]
    fn frame_checks() {
        assert!(Pitch::new("yin", 256, 512, 44_100).is_err());
        assert!(Pitch::new("yin", 512, 0, 44_100).is_err());
        assert!(Pitch::new("yin", 512, 256, 0).is_err());
    }

    #[test]
    fn mcomb_rejects_weighting_rate_before_acquiring() {
        let (factory, probe) = Factory::instrumented();
        let err = factory
            .construct::<Pitch>(&PitchRequest::new("mcomb", 512, 256, 12_345))
            .unwrap_err();
        assert_eq!(
            err,
            ConstructionError::InvalidParameter(InvalidReason::Unsupported {
                field: "samplerate",
                value: 12_345.0
            })
        );
        assert_eq!(probe.attempts(), 0);
    }

    #[test]
    fn fft_methods_reject_odd_sizes_before_acquiring() {
        for name in ["yinfft", "fcomb", "specacf", "yinfast"] {
            let (factory, probe) = Factory::instrumented();
            let err = factory
                .construct::<Pitch>(&PitchRequest::new(name, 1000, 250, 44_100))
                .unwrap_err();
            assert!(
                matches!(
                    err,
                    ConstructionError::InvalidParameter(InvalidReason::NotPowerOfTwo { .. })
                ),
                "{}: {}",
                name,
                err
            );
            assert_eq!(probe.attempts(), 0, "{} allocated before rejecting", name);
        }
    }

    #[test]
    fn yin_rejects_single_sample_buffer_before_acquiring() {
        let (factory, probe) = Factory::instrumented();
        let err = factory
            .construct::<Pitch>(&PitchRequest::new("yin", 1, 1, 44_100))
            .unwrap_err();
        assert!(matches!(
            err,
            ConstructionError::InvalidParameter(InvalidReason::OutOfRange {
                field: "buf_size",
                ..
            })
        ));
        assert_eq!(probe.attempts(), 0);
    }

    #[test]
    fn schmitt_accepts_any_length() {
        let p = Pitch::new("schmitt", 1000, 250, 44_100).unwrap();
        assert_eq!(p.detector().kind(), ResourceKind::PitchSchmitt);
    }
}
