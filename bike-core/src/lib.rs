// lib.rs
#![no_std]

#[macro_use]
mod macros;

pub mod blackboard;
pub mod buffer;
pub mod config;
pub mod datacells;
pub mod gps;
pub mod gpx;
pub mod lights;
pub mod sensors;
pub mod speed;
pub mod state_machine;
pub mod types;

pub use config::*;
pub use gps::parser::{Sentences, decode_sentence, validate_checksum};
pub use gps::receiver::{NavBuffer, RX_BUFFER_SIZE};
pub use gps::snapshot::{GsvTable, NavSnapshot};
pub use gps::types::*;
pub use gpx::*;
pub use lights::Lights;
pub use sensors::SensorSource;
pub use speed::*;
pub use state_machine::*;
pub use types::*;
