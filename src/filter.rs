//! Direct form filters of bounded order.

use crate::config::Limits;
use crate::error::ConstructionError;
use crate::protocol::{Factory, Resource, ResourceKind};
use crate::validate;
use crate::vector::{Lvec, VecRequest};

/// Rates the weighting coefficient tables exist for.
pub const WEIGHTING_RATES: &[u32] = &[
    8000, 11025, 16000, 22050, 24000, 32000, 44100, 48000, 88200, 96000, 192000,
];

pub const A_WEIGHTING_ORDER: usize = 7;
pub const C_WEIGHTING_ORDER: usize = 5;
pub const BIQUAD_ORDER: usize = 3;

/// How a filter should be set up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterRequest {
    /// Blank filter with identity feedback.
    Order(usize),
    AWeighting { samplerate: u32 },
    CWeighting { samplerate: u32 },
    Biquad {
        b0: f64,
        b1: f64,
        b2: f64,
        a1: f64,
        a2: f64,
    },
}

impl FilterRequest {
    pub fn order(&self) -> usize {
        match self {
            FilterRequest::Order(order) => *order,
            FilterRequest::AWeighting { .. } => A_WEIGHTING_ORDER,
            FilterRequest::CWeighting { .. } => C_WEIGHTING_ORDER,
            FilterRequest::Biquad { .. } => BIQUAD_ORDER,
        }
    }
}

#[derive(Debug)]
#[allow(dead_code)]
pub struct Filter {
    order: usize,
    samplerate: Option<u32>,
    b: Lvec,
    a: Lvec,
    y: Lvec,
    x: Lvec,
}

impl Filter {
    pub fn new(order: usize) -> Result<Self, ConstructionError> {
        crate::construct::<Self>(&FilterRequest::Order(order))
    }

    pub fn a_weighting(samplerate: u32) -> Result<Self, ConstructionError> {
        crate::construct::<Self>(&FilterRequest::AWeighting { samplerate })
    }

    pub fn c_weighting(samplerate: u32) -> Result<Self, ConstructionError> {
        crate::construct::<Self>(&FilterRequest::CWeighting { samplerate })
    }

    pub fn biquad(b0: f64, b1: f64, b2: f64, a1: f64, a2: f64) -> Result<Self, ConstructionError> {
        crate::construct::<Self>(&FilterRequest::Biquad { b0, b1, b2, a1, a2 })
    }

    pub fn order(&self) -> usize {
        self.order
    }

    /// Rate the coefficients were designed for, if any.
    pub fn samplerate(&self) -> Option<u32> {
        self.samplerate
    }

    pub fn feedforward(&self) -> &[f64] {
        self.b.data()
    }

    pub fn feedback(&self) -> &[f64] {
        self.a.data()
    }
}

impl Resource for Filter {
    const KIND: ResourceKind = ResourceKind::Filter;
    type Request = FilterRequest;

    fn validate(req: &FilterRequest, limits: &Limits) -> Result<(), ConstructionError> {
        match *req {
            FilterRequest::Order(order) => {
                validate::positive("order", order)?;
                validate::within("order", order, 1, limits.max_filter_order)?;
            }
            FilterRequest::AWeighting { samplerate } | FilterRequest::CWeighting { samplerate } => {
                validate::samplerate("samplerate", samplerate, limits)?;
                validate::supported_rate("samplerate", samplerate, WEIGHTING_RATES)?;
            }
            FilterRequest::Biquad { b0, b1, b2, a1, a2 } => {
                validate::finite("b0", b0)?;
                validate::finite("b1", b1)?;
                validate::finite("b2", b2)?;
                validate::finite("a1", a1)?;
                validate::finite("a2", a2)?;
            }
        }
        Lvec::validate(&VecRequest::new(req.order()), limits)
    }

    fn acquire(req: &FilterRequest, factory: &Factory) -> Result<Self, ConstructionError> {
        let order = req.order();
        let x = factory.construct::<Lvec>(&VecRequest::labelled("filter.x", order))?;
        let y = factory.construct::<Lvec>(&VecRequest::labelled("filter.y", order))?;
        let mut a = factory.construct::<Lvec>(&VecRequest::labelled("filter.a", order))?;
        let mut b = factory.construct::<Lvec>(&VecRequest::labelled("filter.b", order))?;
        a.data_mut()[0] = 1.0;

        let samplerate = match *req {
            FilterRequest::AWeighting { samplerate } | FilterRequest::CWeighting { samplerate } => {
                Some(samplerate)
            }
            FilterRequest::Biquad { b0, b1, b2, a1, a2 } => {
                b.data_mut().copy_from_slice(&[b0, b1, b2]);
                a.data_mut()[1..].copy_from_slice(&[a1, a2]);
                None
            }
            FilterRequest::Order(_) => None,
        };

        Ok(Self {
            order,
            samplerate,
            b,
            a,
            y,
            x,
        })
    }
}
