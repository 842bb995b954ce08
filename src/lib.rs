// Re-export modules
pub mod aggregator;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod orchestrator;
pub mod providers;
pub mod reputation;
pub mod scoring;
pub mod store;
pub mod utils;

pub use aggregator::ComprehensiveVerifier;
pub use error::{Result, VerificationError};
pub use orchestrator::VerificationOrchestrator;
