//! Use cases
//!
//! This module contains the application use cases that orchestrate
//! domain logic and port interactions.

mod fitness_api;
mod session;

pub use fitness_api::FitnessApi;
pub use session::Session;
