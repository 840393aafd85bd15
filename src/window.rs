//! Analysis windows selected by name.

use crate::alloc::Block;
use crate::config::Limits;
use crate::error::ConstructionError;
use crate::protocol::{Factory, Resource, ResourceKind};
use crate::registry::WINDOW_TYPES;
use crate::validate;
use crate::vector::Smpl;
use std::borrow::Cow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowType {
    Ones,
    Rectangle,
    Hamming,
    Hanning,
    HanningZ,
    Blackman,
    BlackmanHarris,
    Gaussian,
    Welch,
    Parzen,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowRequest {
    pub window_type: Cow<'static, str>,
    pub size: usize,
}

impl WindowRequest {
    pub fn new(window_type: impl Into<Cow<'static, str>>, size: usize) -> Self {
        Self {
            window_type: window_type.into(),
            size,
        }
    }
}

#[derive(Debug)]
pub struct Window {
    window_type: WindowType,
    taps: Block<Smpl>,
}

impl Window {
    pub fn window_type(&self) -> WindowType {
        self.window_type
    }

    pub fn size(&self) -> usize {
        self.taps.len()
    }

    pub fn taps(&self) -> &[Smpl] {
        &self.taps
    }
}

impl Resource for Window {
    const KIND: ResourceKind = ResourceKind::Window;
    type Request = WindowRequest;

    fn validate(req: &WindowRequest, limits: &Limits) -> Result<(), ConstructionError> {
        validate::length("size", req.size, limits)?;
        WINDOW_TYPES.lookup(&req.window_type)?;
        Ok(())
    }

    fn acquire(req: &WindowRequest, factory: &Factory) -> Result<Self, ConstructionError> {
        let window_type = WINDOW_TYPES.lookup(&req.window_type)?;
        Ok(Self {
            window_type,
            taps: factory.allocator().filled("window.taps", req.size, 1.0)?,
        })
    }
}
