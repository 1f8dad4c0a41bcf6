#![allow(non_snake_case)]

//! Rate-equation simulations of optically detected magnetic resonance in
//! NV-like spin defects.
//!
//! A [`RateModel`][model::RateModel] describes a sparse graph of transition
//! rates between discrete states and builds conservative generator matrices
//! `W` for the population dynamics `dP/dt = W P`. The [`solver`] module
//! propagates populations in time and finds stationary distributions, and
//! [`contrast`] compares a fluorescence-like observable between two
//! configurations. [`simulations`] collects the initialization, readout, and
//! ODMR experiments built on top.

pub mod error;
pub mod utils;
pub mod model;
pub mod seven_level;
pub mod solver;
pub mod contrast;
pub mod simulations;

pub use error::{ Error, RateResult };
pub use model::{ RateBuild, RateModel, RateParams };
pub use seven_level::{ GroundState, SevenLevelModel, SevenLevelRates };
