#![warn(rust_2018_idioms)]

mod error;
pub mod extension;
pub mod header;
pub mod sequence;

pub use error::Error;
