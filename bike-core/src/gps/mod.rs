// gps/mod.rs
pub mod parser;
pub mod receiver;
pub mod snapshot;
pub mod types;

pub use parser::*;
pub use receiver::*;
pub use snapshot::*;
pub use types::*;
