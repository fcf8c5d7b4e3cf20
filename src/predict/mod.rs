pub mod engine;
pub mod h2h;
pub mod power;
pub mod service;

pub use service::{FixtureRequest, PredictionService};
