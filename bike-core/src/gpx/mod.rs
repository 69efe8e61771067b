// gpx/mod.rs
pub mod logger;
pub mod writer;

pub use logger::*;
pub use writer::*;
