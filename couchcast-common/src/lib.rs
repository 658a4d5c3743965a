//! Shared library for Couchcast
//!
//! Holds the pieces both the service crate and its tests need: the common
//! error type, configuration resolution, and the natural-sort ordering used
//! for catalog listings.

pub mod config;
pub mod error;
pub mod natsort;

pub use error::{Error, Result};
