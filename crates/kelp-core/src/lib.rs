//! Kelp Core - Core types for the Kelp peer-to-peer overlay.
//!
//! This crate provides:
//! - 160-bit peer identifiers with the XOR distance metric
//! - Millisecond timestamps

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod identifiers;
pub mod time;

pub use identifiers::PeerId;
pub use time::Timestamp;
