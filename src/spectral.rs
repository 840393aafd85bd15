//! Spectral analysis objects: transforms, phase vocoder, filterbanks,
//! spectral descriptors.

use crate::alloc::Block;
use crate::config::Limits;
use crate::error::{ConstructionError, InvalidReason};
use crate::protocol::{Factory, Resource, ResourceKind};
use crate::registry::SPECDESC_METHODS;
use crate::utils::{Hist, HistRequest};
use crate::validate;
use crate::vector::{Fmat, FmatRequest, Fvec, Smpl, VecRequest};
use crate::window::{Window, WindowRequest};
use std::borrow::Cow;

/// Number of bins in the half spectrum of a `size`-point transform.
pub fn spectrum_bins(size: usize) -> usize {
    size / 2 + 1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeRequest {
    pub size: usize,
}

/// Real FFT workspace. Sizes are powers of two, at least 2.
#[derive(Debug)]
#[allow(dead_code)]
pub struct Fft {
    size: usize,
    twiddle: Block<Smpl>,
    bitrev: Block<usize>,
    compspec: Fvec,
    output: Block<Smpl>,
    input: Block<Smpl>,
}

impl Fft {
    pub fn new(size: usize) -> Result<Self, ConstructionError> {
        crate::construct::<Self>(&SizeRequest { size })
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

impl Resource for Fft {
    const KIND: ResourceKind = ResourceKind::Fft;
    type Request = SizeRequest;

    fn validate(req: &SizeRequest, limits: &Limits) -> Result<(), ConstructionError> {
        validate::positive("size", req.size)?;
        validate::within("size", req.size, 2, limits.max_len)?;
        Ok(validate::power_of_two("size", req.size)?)
    }

    fn acquire(req: &SizeRequest, factory: &Factory) -> Result<Self, ConstructionError> {
        let input = factory.zeroed("fft.in", req.size)?;
        let output = factory.zeroed("fft.out", req.size)?;
        let compspec =
            factory.construct::<Fvec>(&VecRequest::labelled("fft.compspec", req.size))?;
        let bitrev = factory.zeroed("fft.ip", req.size / 2 + 2)?;
        let twiddle = factory.zeroed("fft.w", req.size / 2)?;
        Ok(Self {
            size: req.size,
            twiddle,
            bitrev,
            compspec,
            output,
            input,
        })
    }
}

/// Type-II DCT with precomputed forward and inverse matrices.
#[derive(Debug)]
#[allow(dead_code)]
pub struct Dct {
    size: usize,
    idct_coeffs: Fmat,
    dct_coeffs: Fmat,
}

impl Dct {
    pub fn new(size: usize) -> Result<Self, ConstructionError> {
        crate::construct::<Self>(&SizeRequest { size })
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

impl Resource for Dct {
    const KIND: ResourceKind = ResourceKind::Dct;
    type Request = SizeRequest;

    fn validate(req: &SizeRequest, limits: &Limits) -> Result<(), ConstructionError> {
        validate::length("size", req.size, limits)?;
        let cells = req.size.checked_mul(req.size).ok_or(InvalidReason::Incompatible {
            field: "size * size",
            limit: "max_len",
        })?;
        Ok(validate::length("size * size", cells, limits)?)
    }

    fn acquire(req: &SizeRequest, factory: &Factory) -> Result<Self, ConstructionError> {
        let square = FmatRequest {
            height: req.size,
            length: req.size,
        };
        let dct_coeffs = factory.construct::<Fmat>(&square)?;
        let idct_coeffs = factory.construct::<Fmat>(&square)?;
        Ok(Self {
            size: req.size,
            idct_coeffs,
            dct_coeffs,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRequest {
    pub buf_size: usize,
    pub hop_size: usize,
}

/// Phase vocoder: overlapping analysis and synthesis frames around an FFT.
#[derive(Debug)]
#[allow(dead_code)]
pub struct Pvoc {
    win_size: usize,
    hop_size: usize,
    window: Window,
    synthold: Fvec,
    dataold: Fvec,
    synth: Fvec,
    data: Fvec,
    fft: Fft,
}

impl Pvoc {
    pub fn new(win_size: usize, hop_size: usize) -> Result<Self, ConstructionError> {
        crate::construct::<Self>(&FrameRequest {
            buf_size: win_size,
            hop_size,
        })
    }

    pub fn win_size(&self) -> usize {
        self.win_size
    }

    pub fn hop_size(&self) -> usize {
        self.hop_size
    }

    pub fn fft(&self) -> &Fft {
        &self.fft
    }
}

impl Resource for Pvoc {
    const KIND: ResourceKind = ResourceKind::Pvoc;
    type Request = FrameRequest;

    fn validate(req: &FrameRequest, limits: &Limits) -> Result<(), ConstructionError> {
        validate::positive("hop_size", req.hop_size)?;
        validate::positive("win_size", req.buf_size)?;
        validate::within("win_size", req.buf_size, 2, limits.max_len)?;
        validate::not_exceeding("hop_size", req.hop_size, "win_size", req.buf_size)?;
        Fft::validate(&SizeRequest { size: req.buf_size }, limits)?;
        Window::validate(&WindowRequest::new("hanningz", req.buf_size), limits)
    }

    fn acquire(req: &FrameRequest, factory: &Factory) -> Result<Self, ConstructionError> {
        let win = req.buf_size;
        // Overlap buffers keep at least one sample when hop equals the window.
        let overlap = (win - req.hop_size).max(1);
        let fft = factory.construct::<Fft>(&SizeRequest { size: win })?;
        let data = factory.construct::<Fvec>(&VecRequest::labelled("pvoc.data", win))?;
        let synth = factory.construct::<Fvec>(&VecRequest::labelled("pvoc.synth", win))?;
        let dataold = factory.construct::<Fvec>(&VecRequest::labelled("pvoc.dataold", overlap))?;
        let synthold = factory.construct::<Fvec>(&VecRequest::labelled("pvoc.synthold", overlap))?;
        let window = factory.construct::<Window>(&WindowRequest::new("hanningz", win))?;
        Ok(Self {
            win_size: win,
            hop_size: req.hop_size,
            window,
            synthold,
            dataold,
            synth,
            data,
            fft,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterbankRequest {
    pub n_filters: usize,
    pub win_size: usize,
}

impl FilterbankRequest {
    fn coefficients(&self) -> FmatRequest {
        FmatRequest {
            height: self.n_filters,
            length: spectrum_bins(self.win_size),
        }
    }
}

#[derive(Debug)]
pub struct Filterbank {
    filters: Fmat,
}

impl Filterbank {
    pub fn new(n_filters: usize, win_size: usize) -> Result<Self, ConstructionError> {
        crate::construct::<Self>(&FilterbankRequest { n_filters, win_size })
    }

    pub fn n_filters(&self) -> usize {
        self.filters.height()
    }

    pub fn bins(&self) -> usize {
        self.filters.length()
    }
}

impl Resource for Filterbank {
    const KIND: ResourceKind = ResourceKind::Filterbank;
    type Request = FilterbankRequest;

    fn validate(req: &FilterbankRequest, limits: &Limits) -> Result<(), ConstructionError> {
        validate::length("n_filters", req.n_filters, limits)?;
        validate::length("win_size", req.win_size, limits)?;
        Fmat::validate(&req.coefficients(), limits)
    }

    fn acquire(req: &FilterbankRequest, factory: &Factory) -> Result<Self, ConstructionError> {
        Ok(Self {
            filters: factory.construct::<Fmat>(&req.coefficients())?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MfccRequest {
    pub win_size: usize,
    pub n_filters: usize,
    pub n_coefs: usize,
    pub samplerate: u32,
}

/// Mel-frequency cepstral coefficients: filterbank followed by a DCT.
#[derive(Debug)]
#[allow(dead_code)]
pub struct Mfcc {
    samplerate: u32,
    output: Fvec,
    dct: Dct,
    in_dct: Fvec,
    filterbank: Filterbank,
}

impl Mfcc {
    pub fn new(
        win_size: usize,
        n_filters: usize,
        n_coefs: usize,
        samplerate: u32,
    ) -> Result<Self, ConstructionError> {
        crate::construct::<Self>(&MfccRequest {
            win_size,
            n_filters,
            n_coefs,
            samplerate,
        })
    }

    pub fn n_coefs(&self) -> usize {
        self.output.len()
    }

    pub fn n_filters(&self) -> usize {
        self.filterbank.n_filters()
    }

    pub fn samplerate(&self) -> u32 {
        self.samplerate
    }
}

impl Resource for Mfcc {
    const KIND: ResourceKind = ResourceKind::Mfcc;
    type Request = MfccRequest;

    fn validate(req: &MfccRequest, limits: &Limits) -> Result<(), ConstructionError> {
        validate::length("win_size", req.win_size, limits)?;
        validate::length("n_filters", req.n_filters, limits)?;
        validate::positive("n_coefs", req.n_coefs)?;
        validate::samplerate("samplerate", req.samplerate, limits)?;
        validate::not_exceeding("n_coefs", req.n_coefs, "n_filters", req.n_filters)?;
        Filterbank::validate(
            &FilterbankRequest {
                n_filters: req.n_filters,
                win_size: req.win_size,
            },
            limits,
        )?;
        Dct::validate(
            &SizeRequest {
                size: req.n_filters,
            },
            limits,
        )
    }

    fn acquire(req: &MfccRequest, factory: &Factory) -> Result<Self, ConstructionError> {
        let filterbank = factory.construct::<Filterbank>(&FilterbankRequest {
            n_filters: req.n_filters,
            win_size: req.win_size,
        })?;
        let in_dct =
            factory.construct::<Fvec>(&VecRequest::labelled("mfcc.in_dct", req.n_filters))?;
        let dct = factory.construct::<Dct>(&SizeRequest {
            size: req.n_filters,
        })?;
        let output =
            factory.construct::<Fvec>(&VecRequest::labelled("mfcc.output", req.n_coefs))?;
        Ok(Self {
            samplerate: req.samplerate,
            output,
            dct,
            in_dct,
            filterbank,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WhiteningRequest {
    pub buf_size: usize,
    pub hop_size: usize,
    pub samplerate: u32,
}

pub const WHITENING_RELAX_TIME_S: f32 = 250.0;
pub const WHITENING_FLOOR: f32 = 1.0e-4;

/// Adaptive spectral whitening with a per-bin peak memory.
#[derive(Debug)]
#[allow(dead_code)]
pub struct SpectralWhitening {
    buf_size: usize,
    hop_size: usize,
    samplerate: u32,
    decay: f32,
    peak_values: Fvec,
}

impl SpectralWhitening {
    pub fn new(
        buf_size: usize,
        hop_size: usize,
        samplerate: u32,
    ) -> Result<Self, ConstructionError> {
        crate::construct::<Self>(&WhiteningRequest {
            buf_size,
            hop_size,
            samplerate,
        })
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

    /// Per-hop decay factor of the peak memory.
    pub fn decay(&self) -> f32 {
        self.decay
    }
}

impl Resource for SpectralWhitening {
    const KIND: ResourceKind = ResourceKind::SpectralWhitening;
    type Request = WhiteningRequest;

    fn validate(req: &WhiteningRequest, limits: &Limits) -> Result<(), ConstructionError> {
        validate::length("buf_size", req.buf_size, limits)?;
        validate::positive("hop_size", req.hop_size)?;
        validate::samplerate("samplerate", req.samplerate, limits)?;
        Ok(validate::not_exceeding(
            "hop_size",
            req.hop_size,
            "buf_size",
            req.buf_size,
        )?)
    }

    fn acquire(req: &WhiteningRequest, factory: &Factory) -> Result<Self, ConstructionError> {
        let mut peak_values = factory.construct::<Fvec>(&VecRequest::labelled(
            "whitening.peak_values",
            spectrum_bins(req.buf_size),
        ))?;
        peak_values.data_mut().fill(WHITENING_FLOOR);
        let hops_per_relax = WHITENING_RELAX_TIME_S * req.samplerate as f32 / req.hop_size as f32;
        Ok(Self {
            buf_size: req.buf_size,
            hop_size: req.hop_size,
            samplerate: req.samplerate,
            decay: 0.001f32.powf(1.0 / hops_per_relax),
            peak_values,
        })
    }
}

/// Transient / steady-state separation.
#[derive(Debug)]
#[allow(dead_code)]
pub struct Tss {
    buf_size: usize,
    hop_size: usize,
    dev: Fvec,
    oft2: Fvec,
    oft1: Fvec,
    theta2: Fvec,
    theta1: Fvec,
}

impl Tss {
    pub fn new(buf_size: usize, hop_size: usize) -> Result<Self, ConstructionError> {
        crate::construct::<Self>(&FrameRequest { buf_size, hop_size })
    }

    pub fn buf_size(&self) -> usize {
        self.buf_size
    }

    pub fn hop_size(&self) -> usize {
        self.hop_size
    }
}

impl Resource for Tss {
    const KIND: ResourceKind = ResourceKind::Tss;
    type Request = FrameRequest;

    fn validate(req: &FrameRequest, limits: &Limits) -> Result<(), ConstructionError> {
        validate::length("buf_size", req.buf_size, limits)?;
        validate::positive("hop_size", req.hop_size)?;
        Ok(validate::not_exceeding(
            "hop_size",
            req.hop_size,
            "buf_size",
            req.buf_size,
        )?)
    }

    fn acquire(req: &FrameRequest, factory: &Factory) -> Result<Self, ConstructionError> {
        let bins = spectrum_bins(req.buf_size);
        let part = |label| factory.construct::<Fvec>(&VecRequest::labelled(label, bins));
        let theta1 = part("tss.theta1")?;
        let theta2 = part("tss.theta2")?;
        let oft1 = part("tss.oft1")?;
        let oft2 = part("tss.oft2")?;
        let dev = part("tss.dev")?;
        Ok(Self {
            buf_size: req.buf_size,
            hop_size: req.hop_size,
            dev,
            oft2,
            oft1,
            theta2,
            theta1,
        })
    }
}

/// Onset detection functions and spectral statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecdescMethod {
    Energy,
    Hfc,
    Complex,
    Phase,
    WPhase,
    SpecDiff,
    Kl,
    Mkl,
    SpecFlux,
    Centroid,
    Spread,
    Skewness,
    Kurtosis,
    Slope,
    Decrease,
    Rolloff,
}

impl SpecdescMethod {
    /// Canonical selector name in the `specdesc` registry.
    pub fn name(self) -> &'static str {
        match self {
            Self::Energy => "energy",
            Self::Hfc => "hfc",
            Self::Complex => "complex",
            Self::Phase => "phase",
            Self::WPhase => "wphase",
            Self::SpecDiff => "specdiff",
            Self::Kl => "kl",
            Self::Mkl => "mkl",
            Self::SpecFlux => "specflux",
            Self::Centroid => "centroid",
            Self::Spread => "spread",
            Self::Skewness => "skewness",
            Self::Kurtosis => "kurtosis",
            Self::Slope => "slope",
            Self::Decrease => "decrease",
            Self::Rolloff => "rolloff",
        }
    }

    fn keeps_previous_magnitude(self) -> bool {
        matches!(
            self,
            Self::Complex | Self::SpecDiff | Self::Kl | Self::Mkl | Self::SpecFlux
        )
    }

    fn keeps_deviation(self) -> bool {
        matches!(
            self,
            Self::Complex | Self::Phase | Self::WPhase | Self::SpecDiff
        )
    }

    fn keeps_phase_history(self) -> bool {
        matches!(self, Self::Complex | Self::Phase | Self::WPhase)
    }

    fn keeps_histogram(self) -> bool {
        matches!(self, Self::Phase | Self::WPhase)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecdescRequest {
    pub method: Cow<'static, str>,
    pub size: usize,
}

impl SpecdescRequest {
    pub fn new(method: impl Into<Cow<'static, str>>, size: usize) -> Self {
        Self {
            method: method.into(),
            size,
        }
    }
}

pub const PHASE_HIST_BINS: usize = 10;

const PHASE_HISTOGRAM: HistRequest = HistRequest {
    low: 0.0,
    high: std::f64::consts::PI,
    nelems: PHASE_HIST_BINS,
};

/// Spectral description function. Internal memory depends on the method.
#[derive(Debug)]
pub struct Specdesc {
    method: SpecdescMethod,
    size: usize,
    histog: Option<Hist>,
    theta2: Option<Fvec>,
    theta1: Option<Fvec>,
    dev1: Option<Fvec>,
    oldmag: Option<Fvec>,
}

fn optional_fvec(
    factory: &Factory,
    wanted: bool,
    label: &'static str,
    length: usize,
) -> Result<Option<Fvec>, ConstructionError> {
    wanted
        .then(|| factory.construct::<Fvec>(&VecRequest::labelled(label, length)))
        .transpose()
}

impl Specdesc {
    pub fn new(
        method: impl Into<Cow<'static, str>>,
        size: usize,
    ) -> Result<Self, ConstructionError> {
        crate::construct::<Self>(&SpecdescRequest::new(method, size))
    }

    pub fn method(&self) -> SpecdescMethod {
        self.method
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of internal buffers and sub-objects held beyond the handle itself.
    pub fn held_parts(&self) -> usize {
        [
            self.oldmag.is_some(),
            self.dev1.is_some(),
            self.theta1.is_some(),
            self.theta2.is_some(),
            self.histog.is_some(),
        ]
        .iter()
        .filter(|&&held| held)
        .count()
    }
}

impl Resource for Specdesc {
    const KIND: ResourceKind = ResourceKind::Specdesc;
    type Request = SpecdescRequest;

    fn validate(req: &SpecdescRequest, limits: &Limits) -> Result<(), ConstructionError> {
        validate::length("size", req.size, limits)?;
        let method = SPECDESC_METHODS.lookup(&req.method)?;
        if method.keeps_histogram() {
            Hist::validate(&PHASE_HISTOGRAM, limits)?;
        }
        Ok(())
    }

    fn acquire(req: &SpecdescRequest, factory: &Factory) -> Result<Self, ConstructionError> {
        let method = SPECDESC_METHODS.lookup(&req.method)?;
        let bins = spectrum_bins(req.size);
        let oldmag = optional_fvec(
            factory,
            method.keeps_previous_magnitude(),
            "specdesc.oldmag",
            bins,
        )?;
        let dev1 = optional_fvec(factory, method.keeps_deviation(), "specdesc.dev1", bins)?;
        let theta1 = optional_fvec(factory, method.keeps_phase_history(), "specdesc.theta1", bins)?;
        let theta2 = optional_fvec(factory, method.keeps_phase_history(), "specdesc.theta2", bins)?;
        let histog = method
            .keeps_histogram()
            .then(|| factory.construct::<Hist>(&PHASE_HISTOGRAM))
            .transpose()?;
        Ok(Self {
            method,
            size: req.size,
            histog,
            theta2,
            theta1,
            dev1,
            oldmag,
        })
    }
}
