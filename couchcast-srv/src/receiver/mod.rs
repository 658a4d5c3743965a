//! Receiver client abstraction
//!
//! The session manager never speaks the receiver wire protocol itself; it
//! depends on this capability surface. The production implementation
//! ([`chromecast::ChromecastClient`]) delegates to the `rust_cast` crate with
//! mDNS discovery. Tests substitute [`fake::FakeReceiverClient`].

pub mod chromecast;
pub mod fake;

use crate::error::Result;
use async_trait::async_trait;

/// Receiver reports it can pause (bit in the supported-commands mask)
pub const MEDIA_COMMAND_PAUSE: u32 = 0x1;
/// Receiver reports it can seek
pub const MEDIA_COMMAND_SEEK: u32 = 0x2;

/// Snapshot of receiver-reported playback state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaStatus {
    /// Receiver is actively playing
    pub playing: bool,
    /// Receiver is paused
    pub paused: bool,
    /// Current playback offset in fractional seconds
    pub position: Option<f64>,
    /// Total duration of the loaded media in fractional seconds
    pub duration: Option<f64>,
    /// Receiver supports pause/resume for the loaded media
    pub can_pause: bool,
    /// Receiver supports seeking within the loaded media
    pub can_seek: bool,
}

/// Discovers receivers by friendly name and opens connections to them
#[async_trait]
pub trait ReceiverClient: Send + Sync {
    /// Scan for addressable receivers. Re-run on every call; no caching.
    async fn discover(&self) -> Result<Vec<String>>;

    /// Open a connection to the named receiver, blocking until it is ready.
    async fn open(&self, name: &str) -> Result<Box<dyn ReceiverConnection>>;
}

/// An open connection to a single receiver
#[async_trait]
pub trait ReceiverConnection: Send + Sync {
    /// Obtain the media control channel for this connection
    async fn media_channel(&self) -> Result<Box<dyn MediaChannel>>;

    /// Ask the receiver to quit its remote application
    async fn quit_remote_app(&self) -> Result<()>;

    /// Close the connection
    async fn close(&self) -> Result<()>;
}

/// Control handle for issuing transport commands against a receiver
#[async_trait]
pub trait MediaChannel: Send + Sync {
    /// Load the given URL and start playback (fire-and-forget: returns once
    /// the command is dispatched, not once playback visibly starts)
    async fn load_and_play(&self, url: &str, content_type: &str) -> Result<()>;

    /// Resume playback
    async fn play(&self) -> Result<()>;

    /// Pause playback
    async fn pause(&self) -> Result<()>;

    /// Seek to an absolute offset in seconds
    async fn seek(&self, seconds: f64) -> Result<()>;

    /// Stop playback
    async fn stop(&self) -> Result<()>;

    /// Fetch the receiver's current status snapshot
    async fn status(&self) -> Result<MediaStatus>;
}
