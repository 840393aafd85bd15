//! Note segmentation: onset detector paired with a pitch tracker.

use crate::config::Limits;
use crate::error::{ConstructionError, InvalidReason};
use crate::onset::{validate_frame, DetectorRequest, Onset};
use crate::pitch::{Pitch, PitchRequest};
use crate::protocol::{Factory, Resource, ResourceKind};
use crate::registry::NOTES_METHODS;
use crate::validate;
use crate::vector::{Fvec, VecRequest};
use std::borrow::Cow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotesMethod {
    Default,
}

/// The pitch tracker sees this many analysis buffers at once.
pub const PITCH_BUF_FACTOR: usize = 4;
pub const NOTES_MEDIAN: usize = 6;

#[derive(Debug)]
#[allow(dead_code)]
pub struct Notes {
    method: NotesMethod,
    note_buffer2: Fvec,
    note_buffer: Fvec,
    pitch_output: Fvec,
    onset_output: Fvec,
    pitch: Pitch,
    onset: Onset,
}

impl Notes {
    pub fn new(
        method: impl Into<Cow<'static, str>>,
        buf_size: usize,
        hop_size: usize,
        samplerate: u32,
    ) -> Result<Self, ConstructionError> {
        crate::construct::<Self>(&DetectorRequest::new(method, buf_size, hop_size, samplerate))
    }

    pub fn method(&self) -> NotesMethod {
        self.method
    }

    pub fn onset(&self) -> &Onset {
        &self.onset
    }

    pub fn pitch(&self) -> &Pitch {
        &self.pitch
    }

    /// Frames of pitch history used for the median.
    pub fn median(&self) -> usize {
        self.note_buffer.len()
    }
}

fn pitch_buf_size(buf_size: usize) -> Option<usize> {
    buf_size.checked_mul(PITCH_BUF_FACTOR)
}

fn onset_request(req: &DetectorRequest) -> DetectorRequest {
    DetectorRequest::new("default", req.buf_size, req.hop_size, req.samplerate)
}

fn pitch_request(req: &DetectorRequest, pitch_buf: usize) -> PitchRequest {
    PitchRequest::new("default", pitch_buf, req.hop_size, req.samplerate)
}

impl Resource for Notes {
    const KIND: ResourceKind = ResourceKind::Notes;
    type Request = DetectorRequest;

    fn validate(req: &DetectorRequest, limits: &Limits) -> Result<(), ConstructionError> {
        validate_frame(req, limits)?;
        let pitch_buf = pitch_buf_size(req.buf_size).ok_or(InvalidReason::OutOfRange {
            field: "buf_size",
            value: req.buf_size as f64,
            min: 2.0,
            max: (limits.max_len / PITCH_BUF_FACTOR) as f64,
        })?;
        validate::length("pitch_buf_size", pitch_buf, limits)?;
        NOTES_METHODS.lookup(&req.method)?;
        Onset::validate(&onset_request(req), limits)?;
        Pitch::validate(&pitch_request(req, pitch_buf), limits)
    }

    fn acquire(req: &DetectorRequest, factory: &Factory) -> Result<Self, ConstructionError> {
        let method = NOTES_METHODS.lookup(&req.method)?;
        let onset = factory.construct::<Onset>(&onset_request(req))?;
        let pitch_buf = req.buf_size * PITCH_BUF_FACTOR;
        let pitch = factory.construct::<Pitch>(&pitch_request(req, pitch_buf))?;
        let onset_output =
            factory.construct::<Fvec>(&VecRequest::labelled("notes.onset_output", 1))?;
        let pitch_output =
            factory.construct::<Fvec>(&VecRequest::labelled("notes.pitch_output", 1))?;
        let note_buffer =
            factory.construct::<Fvec>(&VecRequest::labelled("notes.note_buffer", NOTES_MEDIAN))?;
        let note_buffer2 =
            factory.construct::<Fvec>(&VecRequest::labelled("notes.note_buffer2", NOTES_MEDIAN))?;
        Ok(Self {
            method,
            note_buffer2,
            note_buffer,
            pitch_output,
            onset_output,
            pitch,
            onset,
        })
    }
}
