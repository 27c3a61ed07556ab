//! Concrete module implementations.
//!
//! One file per module type. Each file exports a `SPEC` catalogue entry
//! (ports, parameters, factory) consumed by [`crate::registry`], and a
//! processor implementing [`crate::module::ModuleProcessor`].

pub mod filter;
pub mod friction;
pub mod gain;
pub mod grit;
pub mod impulse;
pub mod lfo;
pub mod output;
pub mod string;
