//! In-memory receiver used by the test suite
//!
//! Records every call in an event log so tests can assert ordering (e.g.
//! stop + quit + close before a new open), and serves a scripted
//! [`MediaStatus`] snapshot.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{CastError, Result};
use crate::receiver::{MediaChannel, MediaStatus, ReceiverClient, ReceiverConnection};

/// Shared state behind one fake network of receivers
#[derive(Default)]
pub struct FakeState {
    log: Mutex<Vec<String>>,
    status: Mutex<MediaStatus>,
    open_count: AtomicUsize,
    open_delay: Mutex<Option<Duration>>,
}

impl FakeState {
    fn record(&self, event: impl Into<String>) {
        self.log.lock().unwrap().push(event.into());
    }
}

/// Scripted receiver client
pub struct FakeReceiverClient {
    names: Vec<String>,
    state: Arc<FakeState>,
}

impl FakeReceiverClient {
    /// Create a fake network with the given discoverable receiver names
    pub fn new(names: &[&str]) -> Self {
        Self {
            names: names.iter().map(|s| s.to_string()).collect(),
            state: Arc::new(FakeState::default()),
        }
    }

    /// Snapshot of the recorded event log
    pub fn log(&self) -> Vec<String> {
        self.state.log.lock().unwrap().clone()
    }

    /// Script the status every bound channel reports
    pub fn set_status(&self, status: MediaStatus) {
        *self.state.status.lock().unwrap() = status;
    }

    /// Number of successful opens so far
    pub fn open_count(&self) -> usize {
        self.state.open_count.load(Ordering::SeqCst)
    }

    /// Make every subsequent open stall for the given duration
    pub fn delay_opens(&self, delay: Duration) {
        *self.state.open_delay.lock().unwrap() = Some(delay);
    }
}

#[async_trait]
impl ReceiverClient for FakeReceiverClient {
    async fn discover(&self) -> Result<Vec<String>> {
        self.state.record("discover");
        Ok(self.names.clone())
    }

    async fn open(&self, name: &str) -> Result<Box<dyn ReceiverConnection>> {
        let delay = *self.state.open_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if !self.names.iter().any(|n| n == name) {
            return Err(CastError::Discovery(name.to_string()));
        }
        self.state.record(format!("open:{}", name));
        self.state.open_count.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeConnection {
            name: name.to_string(),
            state: Arc::clone(&self.state),
        }))
    }
}

struct FakeConnection {
    name: String,
    state: Arc<FakeState>,
}

#[async_trait]
impl ReceiverConnection for FakeConnection {
    async fn media_channel(&self) -> Result<Box<dyn MediaChannel>> {
        self.state.record(format!("channel:{}", self.name));
        Ok(Box::new(FakeChannel {
            state: Arc::clone(&self.state),
        }))
    }

    async fn quit_remote_app(&self) -> Result<()> {
        self.state.record(format!("quit:{}", self.name));
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.state.record(format!("close:{}", self.name));
        Ok(())
    }
}

struct FakeChannel {
    state: Arc<FakeState>,
}

#[async_trait]
impl MediaChannel for FakeChannel {
    async fn load_and_play(&self, url: &str, content_type: &str) -> Result<()> {
        self.state.record(format!("load:{}:{}", url, content_type));
        Ok(())
    }

    async fn play(&self) -> Result<()> {
        self.state.record("play");
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        self.state.record("pause");
        Ok(())
    }

    async fn seek(&self, seconds: f64) -> Result<()> {
        self.state.record(format!("seek:{}", seconds));
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.state.record("stop");
        Ok(())
    }

    async fn status(&self) -> Result<MediaStatus> {
        Ok(self.state.status.lock().unwrap().clone())
    }
}
