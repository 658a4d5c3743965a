//! # Couchcast service library (couchcast-srv)
//!
//! Browse a media library over HTTP and direct playback to networked
//! receivers. The cast session manager owns the single active receiver
//! connection and serializes transport commands against it; the catalog,
//! thumbnail, and HTTP modules are plumbing around it.

pub mod api;
pub mod error;
pub mod library;
pub mod receiver;
pub mod session;
pub mod thumbs;

pub use error::{CastError, Result};
pub use session::SessionManager;
