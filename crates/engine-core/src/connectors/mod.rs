pub mod destination;
pub mod source;
