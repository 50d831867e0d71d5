pub mod connectors;
pub mod context;
pub mod error;
pub mod finalize;
pub mod metrics;
pub mod retry;
pub mod transform;
