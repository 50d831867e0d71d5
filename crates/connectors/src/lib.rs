pub mod adapter;
pub mod error;
pub mod lakehouse;
pub mod servicenow;
