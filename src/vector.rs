//! Buffer containers: real, long, complex (polar) vectors and matrices.

use crate::alloc::Block;
use crate::config::Limits;
use crate::error::{ConstructionError, InvalidReason};
use crate::protocol::{Factory, Resource, ResourceKind};
use crate::validate;

/// Sample type of real-valued buffers.
pub type Smpl = f32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VecRequest {
    pub length: usize,
    /// Block label reported on exhaustion. Single-block vectors fall back
    /// to their own name when `None`.
    pub label: Option<&'static str>,
}

impl VecRequest {
    pub const fn new(length: usize) -> Self {
        Self {
            length,
            label: None,
        }
    }

    /// A request whose block is reported as `label`, for parts of a composite.
    pub const fn labelled(label: &'static str, length: usize) -> Self {
        Self {
            length,
            label: Some(label),
        }
    }
}

/// Real-valued vector.
#[derive(Debug)]
pub struct Fvec {
    data: Block<Smpl>,
}

impl Fvec {
    pub fn new(length: usize) -> Result<Self, ConstructionError> {
        crate::construct::<Self>(&VecRequest::new(length))
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[Smpl] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [Smpl] {
        &mut self.data
    }
}

impl Resource for Fvec {
    const KIND: ResourceKind = ResourceKind::Fvec;
    type Request = VecRequest;

    fn validate(req: &VecRequest, limits: &Limits) -> Result<(), ConstructionError> {
        Ok(validate::length("length", req.length, limits)?)
    }

    fn acquire(req: &VecRequest, factory: &Factory) -> Result<Self, ConstructionError> {
        Ok(Self {
            data: factory.zeroed(req.label.unwrap_or("fvec.data"), req.length)?,
        })
    }
}

/// Double precision vector.
#[derive(Debug)]
pub struct Lvec {
    data: Block<f64>,
}

impl Lvec {
    pub fn new(length: usize) -> Result<Self, ConstructionError> {
        crate::construct::<Self>(&VecRequest::new(length))
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }
}

impl Resource for Lvec {
    const KIND: ResourceKind = ResourceKind::Lvec;
    type Request = VecRequest;

    fn validate(req: &VecRequest, limits: &Limits) -> Result<(), ConstructionError> {
        Ok(validate::length("length", req.length, limits)?)
    }

    fn acquire(req: &VecRequest, factory: &Factory) -> Result<Self, ConstructionError> {
        Ok(Self {
            data: factory.zeroed(req.label.unwrap_or("lvec.data"), req.length)?,
        })
    }
}

/// Spectral frame in polar form. `length` is the transform size; each half
/// holds `length / 2 + 1` bins.
#[derive(Debug)]
pub struct Cvec {
    length: usize,
    phas: Block<Smpl>,
    norm: Block<Smpl>,
}

impl Cvec {
    pub fn new(length: usize) -> Result<Self, ConstructionError> {
        crate::construct::<Self>(&VecRequest::new(length))
    }

    /// Transform size this frame was built for.
    pub fn length(&self) -> usize {
        self.length
    }

    pub fn bins(&self) -> usize {
        self.norm.len()
    }

    pub fn norm(&self) -> &[Smpl] {
        &self.norm
    }

    pub fn phas(&self) -> &[Smpl] {
        &self.phas
    }
}

impl Resource for Cvec {
    const KIND: ResourceKind = ResourceKind::Cvec;
    type Request = VecRequest;

    fn validate(req: &VecRequest, limits: &Limits) -> Result<(), ConstructionError> {
        Ok(validate::length("length", req.length, limits)?)
    }

    fn acquire(req: &VecRequest, factory: &Factory) -> Result<Self, ConstructionError> {
        let bins = req.length / 2 + 1;
        let norm = factory.zeroed("cvec.norm", bins)?;
        let phas = factory.zeroed("cvec.phas", bins)?;
        Ok(Self {
            length: req.length,
            phas,
            norm,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FmatRequest {
    pub height: usize,
    pub length: usize,
}

/// Row-major real matrix, stored in a single block.
#[derive(Debug)]
pub struct Fmat {
    height: usize,
    length: usize,
    data: Block<Smpl>,
}

impl Fmat {
    pub fn new(height: usize, length: usize) -> Result<Self, ConstructionError> {
        crate::construct::<Self>(&FmatRequest { height, length })
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn row(&self, index: usize) -> Option<&[Smpl]> {
        if index >= self.height {
            return None;
        }
        let start = index * self.length;
        Some(&self.data[start..start + self.length])
    }
}

impl Resource for Fmat {
    const KIND: ResourceKind = ResourceKind::Fmat;
    type Request = FmatRequest;

    fn validate(req: &FmatRequest, limits: &Limits) -> Result<(), ConstructionError> {
        validate::positive("height", req.height)?;
        validate::positive("length", req.length)?;
        let total = req
            .height
            .checked_mul(req.length)
            .ok_or(InvalidReason::Incompatible {
                field: "height * length",
                limit: "max_len",
            })?;
        Ok(validate::length("height * length", total, limits)?)
    }

    fn acquire(req: &FmatRequest, factory: &Factory) -> Result<Self, ConstructionError> {
        Ok(Self {
            height: req.height,
            length: req.length,
            data: factory.zeroed("fmat.data", req.height * req.length)?,
        })
    }
}
