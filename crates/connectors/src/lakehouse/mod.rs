pub mod catalog;
pub mod config;
pub mod encoder;
pub mod error;
pub mod merge;
pub mod metadata;
pub mod sink;
