//! qtiscore-core — Expression evaluation engine for QTI scoring.
//!
//! This crate holds the typed value model, the rule-tree interpreter and the
//! two processing drivers (per-item response processing, per-test outcome
//! processing) that the rest of qtiscore builds on.

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod logging;
pub mod model;
pub mod node;
pub mod operators;
pub mod outcome;
pub mod parser;
pub mod prepare;
pub mod registry;
pub mod report;
pub mod resolve;
pub mod response;
pub mod results;
pub mod traits;

pub use engine::{ScoringContext, ScoringEngine, ScoringEngineConfig};
pub use error::ScoringError;
pub use registry::OperatorRegistry;
