pub mod adapter;
pub mod decode;
pub mod error;
pub mod params;
pub mod source;
