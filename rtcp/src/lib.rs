#![warn(rust_2018_idioms)]

mod error;
pub mod header;
pub mod packet;
pub mod raw_packet;
pub mod transport_feedbacks;

pub use error::Error;
