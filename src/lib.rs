//! Vanilla option pricing: Black-Scholes closed form, Cox-Ross-Rubinstein
//! lattice (European and American), lattice Greeks and price surfaces over
//! spot x volatility, plus the HTTP service that exposes them.

pub mod config;
pub mod engine;
pub mod errors;
pub mod limits;
pub mod models;
pub mod server;
pub mod state;

pub use engine::{PricerSelector, PricingEngine};
pub use errors::{DomainError, DomainResult, EngineError, EngineResult};
pub use limits::ComputeLimits;
pub use models::{ExerciseStyle, OptionContract, OptionKind, PricingResult};
