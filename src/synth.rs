//! Synthesis objects: sample player and wavetable oscillator.

use crate::config::Limits;
use crate::error::ConstructionError;
use crate::protocol::{Factory, Resource, ResourceKind};
use crate::utils::{Parameter, ParameterRequest};
use crate::validate;
use crate::vector::{Fvec, VecRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SynthRequest {
    pub samplerate: u32,
    pub hop_size: usize,
}

fn validate_synth(req: &SynthRequest, limits: &Limits) -> Result<(), ConstructionError> {
    validate::samplerate("samplerate", req.samplerate, limits)?;
    Ok(validate::length("hop_size", req.hop_size, limits)?)
}

/// Plays back a loaded source, one hop at a time.
#[derive(Debug)]
#[allow(dead_code)]
pub struct Sampler {
    samplerate: u32,
    mix: Fvec,
    source_output: Fvec,
}

impl Sampler {
    pub fn new(samplerate: u32, hop_size: usize) -> Result<Self, ConstructionError> {
        crate::construct::<Self>(&SynthRequest {
            samplerate,
            hop_size,
        })
    }

    pub fn samplerate(&self) -> u32 {
        self.samplerate
    }

    pub fn hop_size(&self) -> usize {
        self.source_output.len()
    }
}

impl Resource for Sampler {
    const KIND: ResourceKind = ResourceKind::Sampler;
    type Request = SynthRequest;

    fn validate(req: &SynthRequest, limits: &Limits) -> Result<(), ConstructionError> {
        validate_synth(req, limits)
    }

    fn acquire(req: &SynthRequest, factory: &Factory) -> Result<Self, ConstructionError> {
        let source_output = factory.construct::<Fvec>(&VecRequest::labelled(
            "sampler.source_output",
            req.hop_size,
        ))?;
        let mix = factory.construct::<Fvec>(&VecRequest::labelled("sampler.mix", req.hop_size))?;
        Ok(Self {
            samplerate: req.samplerate,
            mix,
            source_output,
        })
    }
}

pub const WAVETABLE_LEN: usize = 4096;
/// Guard samples past the table end, for interpolation.
pub const WAVETABLE_GUARD: usize = 3;

const AMPLITUDE_RANGE: ParameterRequest = ParameterRequest {
    min: 0.0,
    max: 1.0,
    steps: 100,
};

/// Oscillator frequency, up to Nyquist.
fn frequency_range(samplerate: u32) -> ParameterRequest {
    ParameterRequest {
        min: 0.0,
        max: f64::from(samplerate) / 2.0,
        steps: 10,
    }
}

#[derive(Debug)]
pub struct Wavetable {
    samplerate: u32,
    hop_size: usize,
    amp: Parameter,
    freq: Parameter,
    table: Fvec,
}

impl Wavetable {
    pub fn new(samplerate: u32, hop_size: usize) -> Result<Self, ConstructionError> {
        crate::construct::<Self>(&SynthRequest {
            samplerate,
            hop_size,
        })
    }

    pub fn samplerate(&self) -> u32 {
        self.samplerate
    }

    pub fn hop_size(&self) -> usize {
        self.hop_size
    }

    pub fn table(&self) -> &[f32] {
        self.table.data()
    }

    pub fn freq(&self) -> &Parameter {
        &self.freq
    }

    pub fn amp(&self) -> &Parameter {
        &self.amp
    }
}

impl Resource for Wavetable {
    const KIND: ResourceKind = ResourceKind::Wavetable;
    type Request = SynthRequest;

    fn validate(req: &SynthRequest, limits: &Limits) -> Result<(), ConstructionError> {
        validate_synth(req, limits)?;
        Parameter::validate(&frequency_range(req.samplerate), limits)?;
        Parameter::validate(&AMPLITUDE_RANGE, limits)
    }

    fn acquire(req: &SynthRequest, factory: &Factory) -> Result<Self, ConstructionError> {
        let mut table = factory.construct::<Fvec>(&VecRequest::labelled(
            "wavetable.table",
            WAVETABLE_LEN + WAVETABLE_GUARD,
        ))?;
        let step = std::f32::consts::TAU / WAVETABLE_LEN as f32;
        for (i, s) in table.data_mut().iter_mut().enumerate() {
            *s = (i as f32 * step).sin();
        }
        let freq = factory.construct::<Parameter>(&frequency_range(req.samplerate))?;
        let amp = factory.construct::<Parameter>(&AMPLITUDE_RANGE)?;
        Ok(Self {
            samplerate: req.samplerate,
            hop_size: req.hop_size,
            amp,
            freq,
            table,
        })
    }
}
