//! Signal-processing objects with an all-or-nothing construction protocol.
//!
//! Every object is built by [`construct`] (or [`Factory::construct`]): the
//! request is validated without allocating, then each internal part is
//! acquired in order. A failure at any step releases the parts already held
//! and returns a [`ConstructionError`]. Handles release everything they own
//! when dropped or passed to [`destroy`].

pub mod alloc;
pub mod config;
pub mod error;
pub mod filter;
#[doc(hidden)]
pub mod harness;
#[doc(hidden)]
pub mod invariant_ppt;
pub mod io;
pub mod notes;
pub mod onset;
pub mod pitch;
pub mod protocol;
pub mod registry;
pub mod spectral;
pub mod synth;
pub mod tempo;
pub mod utils;
pub mod validate;
pub mod vector;
pub mod window;

pub use alloc::{Allocator, Block, Event, Probe};
pub use config::Limits;
pub use error::{ConstructionError, InvalidReason};
pub use protocol::{construct, destroy, Factory, Resource, ResourceKind};
