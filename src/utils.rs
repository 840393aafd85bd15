//! Small helper objects: histogram, linear scaler, smoothed parameter.

use crate::config::Limits;
use crate::error::ConstructionError;
use crate::protocol::{Factory, Resource, ResourceKind};
use crate::validate;
use crate::vector::{Fvec, VecRequest};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleRequest {
    pub ilow: f64,
    pub ihig: f64,
    pub olow: f64,
    pub ohig: f64,
}

/// Linear map from `[ilow, ihig]` onto `[olow, ohig]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Scale {
    ilow: f64,
    ihig: f64,
    olow: f64,
    ohig: f64,
    scaler: f64,
}

impl Scale {
    pub fn new(ilow: f64, ihig: f64, olow: f64, ohig: f64) -> Result<Self, ConstructionError> {
        crate::construct::<Self>(&ScaleRequest {
            ilow,
            ihig,
            olow,
            ohig,
        })
    }

    pub fn input_range(&self) -> (f64, f64) {
        (self.ilow, self.ihig)
    }

    pub fn output_range(&self) -> (f64, f64) {
        (self.olow, self.ohig)
    }

    pub fn map(&self, x: f64) -> f64 {
        (x - self.ilow) * self.scaler + self.olow
    }
}

impl Resource for Scale {
    const KIND: ResourceKind = ResourceKind::Scale;
    type Request = ScaleRequest;

    fn validate(req: &ScaleRequest, _limits: &Limits) -> Result<(), ConstructionError> {
        validate::ordered("ilow", req.ilow, "ihig", req.ihig)?;
        Ok(validate::ordered("olow", req.olow, "ohig", req.ohig)?)
    }

    fn acquire(req: &ScaleRequest, _factory: &Factory) -> Result<Self, ConstructionError> {
        Ok(Self {
            ilow: req.ilow,
            ihig: req.ihig,
            olow: req.olow,
            ohig: req.ohig,
            scaler: (req.ohig - req.olow) / (req.ihig - req.ilow),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistRequest {
    pub low: f64,
    pub high: f64,
    pub nelems: usize,
}

/// Fixed-bin histogram over `[low, high]`.
#[derive(Debug)]
pub struct Hist {
    scaler: Scale,
    cent: Fvec,
    hist: Fvec,
}

impl Hist {
    pub fn new(low: f64, high: f64, nelems: usize) -> Result<Self, ConstructionError> {
        crate::construct::<Self>(&HistRequest { low, high, nelems })
    }

    pub fn nelems(&self) -> usize {
        self.hist.len()
    }

    pub fn range(&self) -> (f64, f64) {
        self.scaler.input_range()
    }

    /// Bin centres, in input units.
    pub fn centers(&self) -> &[f32] {
        self.cent.data()
    }
}

impl Resource for Hist {
    const KIND: ResourceKind = ResourceKind::Hist;
    type Request = HistRequest;

    fn validate(req: &HistRequest, limits: &Limits) -> Result<(), ConstructionError> {
        validate::length("nelems", req.nelems, limits)?;
        Ok(validate::ordered("low", req.low, "high", req.high)?)
    }

    fn acquire(req: &HistRequest, factory: &Factory) -> Result<Self, ConstructionError> {
        let hist = factory.construct::<Fvec>(&VecRequest::labelled("hist.hist", req.nelems))?;
        let mut cent = factory.construct::<Fvec>(&VecRequest::labelled("hist.cent", req.nelems))?;
        let scaler = factory.construct::<Scale>(&ScaleRequest {
            ilow: req.low,
            ihig: req.high,
            olow: 0.0,
            ohig: req.nelems as f64,
        })?;

        let step = (req.high - req.low) / req.nelems as f64;
        for (i, c) in cent.data_mut().iter_mut().enumerate() {
            *c = (req.low + step * (i as f64 + 0.5)) as f32;
        }

        Ok(Self { scaler, cent, hist })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterRequest {
    pub min: f64,
    pub max: f64,
    pub steps: usize,
}

/// Value bounded to `[min, max]`, moved towards its target over `steps` calls.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    min: f64,
    max: f64,
    steps: usize,
    current: f64,
}

impl Parameter {
    pub fn new(min: f64, max: f64, steps: usize) -> Result<Self, ConstructionError> {
        crate::construct::<Self>(&ParameterRequest { min, max, steps })
    }

    pub fn bounds(&self) -> (f64, f64) {
        (self.min, self.max)
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn current(&self) -> f64 {
        self.current
    }
}

impl Resource for Parameter {
    const KIND: ResourceKind = ResourceKind::Parameter;
    type Request = ParameterRequest;

    fn validate(req: &ParameterRequest, _limits: &Limits) -> Result<(), ConstructionError> {
        validate::ordered("min", req.min, "max", req.max)?;
        Ok(validate::positive("steps", req.steps)?)
    }

    fn acquire(req: &ParameterRequest, _factory: &Factory) -> Result<Self, ConstructionError> {
        Ok(Self {
            min: req.min,
            max: req.max,
            steps: req.steps,
            current: req.min,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InvalidReason;

    #[test]
    fn scale_requires_ordered_ranges() {
        let s = Scale::new(0.0, 1.0, 0.0, 10.0).unwrap();
        assert_eq!(s.map(0.5), 5.0);
        assert_eq!(
            Scale::new(1.0, 0.0, 0.0, 1.0).unwrap_err(),
            ConstructionError::InvalidParameter(InvalidReason::Unordered {
                low: "ilow",
                high: "ihig"
            })
        );
        assert!(Scale::new(0.0, 1.0, 1.0, 1.0).is_err());
    }

    #[test]
    fn hist_owns_buffers_and_scaler() {
        let (factory, probe) = Factory::instrumented();
        let h = factory
            .construct::<Hist>(&HistRequest {
                low: 0.0,
                high: 1.0,
                nelems: 10,
            })
            .unwrap();
        assert_eq!(h.nelems(), 10);
        assert_eq!(h.range(), (0.0, 1.0));
        assert!((h.centers()[0] - 0.05).abs() < 1e-6);
        assert_eq!(probe.live(), 2);
        drop(h);
        assert_eq!(probe.live(), 0);
        assert!(Hist::new(0.0, 1.0, 0).is_err());
        assert!(Hist::new(1.0, 0.0, 10).is_err());
    }

    #[test]
    fn parameter_bounds() {
        let p = Parameter::new(0.0, 1.0, 10).unwrap();
        assert_eq!((p.bounds(), p.steps(), p.current()), ((0.0, 1.0), 10, 0.0));
        assert!(Parameter::new(0.0, 1.0, 0).is_err());
        assert!(Parameter::new(0.5, 0.0, 1).is_err());
        assert!(Parameter::new(0.0, f64::INFINITY, 1).is_err());
    }
}
