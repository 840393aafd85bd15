//! WAV file sink and source.
//!
//! Opening the file is the external capability step. A failure there is
//! reported as `ExternalCapability` after any memory already acquired is
//! released.

use crate::alloc::Block;
use crate::config::Limits;
use crate::error::{ConstructionError, InvalidReason};
use crate::protocol::{Factory, Resource, ResourceKind};
use crate::validate;
use crate::vector::Smpl;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

pub const SINK_BITS_PER_SAMPLE: u16 = 16;
pub const SINK_CHANNELS: u16 = 1;

fn external(path: &Path, err: hound::Error) -> ConstructionError {
    ConstructionError::ExternalCapability {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkRequest {
    pub path: PathBuf,
    pub samplerate: u32,
}

/// Mono 16-bit WAV writer. The header is finalized when the handle drops.
#[allow(dead_code)]
pub struct WavSink {
    path: PathBuf,
    samplerate: u32,
    spec: hound::WavSpec,
    writer: hound::WavWriter<BufWriter<File>>,
    scratch: Block<Smpl>,
}

impl WavSink {
    pub fn new(path: impl Into<PathBuf>, samplerate: u32) -> Result<Self, ConstructionError> {
        crate::construct::<Self>(&SinkRequest {
            path: path.into(),
            samplerate,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn samplerate(&self) -> u32 {
        self.samplerate
    }

    /// Frames that can be staged before a write.
    pub fn max_frames(&self) -> usize {
        self.scratch.len()
    }

    pub fn spec(&self) -> hound::WavSpec {
        self.spec
    }
}

impl fmt::Debug for WavSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WavSink")
            .field("path", &self.path)
            .field("samplerate", &self.samplerate)
            .field("max_frames", &self.scratch.len())
            .finish()
    }
}

impl Resource for WavSink {
    const KIND: ResourceKind = ResourceKind::WavSink;
    type Request = SinkRequest;

    fn validate(req: &SinkRequest, limits: &Limits) -> Result<(), ConstructionError> {
        validate::path(&req.path)?;
        Ok(validate::samplerate("samplerate", req.samplerate, limits)?)
    }

    fn acquire(req: &SinkRequest, factory: &Factory) -> Result<Self, ConstructionError> {
        let scratch = factory.zeroed("sink.scratch", factory.limits().sink_max_frames)?;
        let spec = hound::WavSpec {
            channels: SINK_CHANNELS,
            sample_rate: req.samplerate,
            bits_per_sample: SINK_BITS_PER_SAMPLE,
            sample_format: hound::SampleFormat::Int,
        };
        let writer =
            hound::WavWriter::create(&req.path, spec).map_err(|e| external(&req.path, e))?;
        log::debug!("opened {} for writing", req.path.display());
        Ok(Self {
            path: req.path.clone(),
            samplerate: req.samplerate,
            spec,
            writer,
            scratch,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRequest {
    pub path: PathBuf,
    /// Expected rate; 0 accepts the file's own rate.
    pub samplerate: u32,
    pub hop_size: usize,
}

/// WAV reader delivering `hop_size` frames per read.
#[allow(dead_code)]
pub struct WavSource {
    path: PathBuf,
    samplerate: u32,
    hop_size: usize,
    output: Block<Smpl>,
    reader: hound::WavReader<BufReader<File>>,
}

impl WavSource {
    pub fn new(
        path: impl Into<PathBuf>,
        samplerate: u32,
        hop_size: usize,
    ) -> Result<Self, ConstructionError> {
        crate::construct::<Self>(&SourceRequest {
            path: path.into(),
            samplerate,
            hop_size,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn samplerate(&self) -> u32 {
        self.samplerate
    }

    pub fn hop_size(&self) -> usize {
        self.hop_size
    }

    pub fn channels(&self) -> u16 {
        self.reader.spec().channels
    }

    /// Length of the file, in frames.
    pub fn duration(&self) -> u32 {
        self.reader.duration()
    }
}

impl fmt::Debug for WavSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WavSource")
            .field("path", &self.path)
            .field("samplerate", &self.samplerate)
            .field("hop_size", &self.hop_size)
            .field("channels", &self.channels())
            .finish()
    }
}

impl Resource for WavSource {
    const KIND: ResourceKind = ResourceKind::WavSource;
    type Request = SourceRequest;

    fn validate(req: &SourceRequest, limits: &Limits) -> Result<(), ConstructionError> {
        validate::path(&req.path)?;
        validate::length("hop_size", req.hop_size, limits)?;
        if req.samplerate != 0 {
            validate::samplerate("samplerate", req.samplerate, limits)?;
        }
        Ok(())
    }

    fn acquire(req: &SourceRequest, factory: &Factory) -> Result<Self, ConstructionError> {
        let reader = hound::WavReader::open(&req.path).map_err(|e| external(&req.path, e))?;
        let spec = reader.spec();
        if req.samplerate != 0 && req.samplerate != spec.sample_rate {
            return Err(InvalidReason::Unsupported {
                field: "samplerate",
                value: f64::from(req.samplerate),
            }
            .into());
        }
        let limits = factory.limits();
        let frames = req
            .hop_size
            .checked_mul(usize::from(spec.channels))
            .unwrap_or(usize::MAX);
        validate::length("hop_size", frames, limits)?;
        let output = factory.zeroed("source.output", frames)?;
        log::debug!(
            "opened {} ({} Hz, {} channels)",
            req.path.display(),
            spec.sample_rate,
            spec.channels
        );
        Ok(Self {
            path: req.path.clone(),
            samplerate: spec.sample_rate,
            hop_size: req.hop_size,
            output,
            reader,
        })
    }
}
