#![doc = include_str!("../README.md")]

mod decoder;
mod error;

pub mod bbframe;
pub mod gse;
pub mod integrity;
pub mod modeadapt;

pub use decoder::{decode, DecodeOpts, Decoder, Dissection};
pub use error::{Error, Reason, Result};
