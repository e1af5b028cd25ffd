#![warn(rust_2018_idioms)]

pub mod bits;
mod error;
pub mod marshal;
pub mod padding;
pub mod seqnum;

pub use crate::error::Error;
pub use crate::marshal::{Marshal, MarshalSize, Unmarshal};
pub use crate::seqnum::SeqNum;
