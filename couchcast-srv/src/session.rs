//! Cast session manager
//!
//! Owns the single active receiver connection and serializes every transport
//! operation against it. All state lives in one [`Session`] behind a
//! `tokio::sync::Mutex`; mutating operations and status reads take the same
//! lock, so a poll can never observe a half-switched session.
//!
//! State machine: `Idle` (no receiver, no channel) and `Connected` (receiver
//! plus channel bound). A failed connect always lands back in `Idle`; there is
//! no locally cached Playing/Paused state, that is read live from the
//! receiver.

use std::sync::Arc;
use std::time::Duration;

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::{CastError, Result};
use crate::library::content_type;
use crate::receiver::{MediaChannel, MediaStatus, ReceiverClient, ReceiverConnection};

/// Characters escaped in media URL path segments
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// The process-wide session record.
///
/// Invariant: `channel` is Some iff `connection` is Some; `now_playing` is
/// Some only while `channel` is Some.
#[derive(Default)]
struct Session {
    receiver_name: Option<String>,
    connection: Option<Box<dyn ReceiverConnection>>,
    channel: Option<Box<dyn MediaChannel>>,
    now_playing: Option<String>,
}

/// Point-in-time view of the session for the browser UI
#[derive(Debug, Clone, Default)]
pub struct SessionSnapshot {
    pub receiver: Option<String>,
    pub now_playing: Option<String>,
    pub playing: bool,
    pub position: Option<f64>,
    pub duration: Option<f64>,
}

/// Serializes and mediates every transport operation against at most one
/// receiver connection.
pub struct SessionManager {
    client: Arc<dyn ReceiverClient>,
    stream_base_url: String,
    connect_timeout: Duration,
    session: Mutex<Session>,
}

impl SessionManager {
    pub fn new(
        client: Arc<dyn ReceiverClient>,
        stream_base_url: impl Into<String>,
        connect_timeout: Duration,
    ) -> Self {
        Self {
            client,
            stream_base_url: stream_base_url.into(),
            connect_timeout,
            session: Mutex::new(Session::default()),
        }
    }

    /// Fresh discovery scan; order is whatever the discovery mechanism
    /// returns, no caching.
    pub async fn list_receivers(&self) -> Result<Vec<String>> {
        self.client.discover().await
    }

    /// Connect to the named receiver.
    ///
    /// Idempotent when the name matches the active receiver. A different
    /// name first releases the current connection, then opens the new one.
    /// Failure leaves the session fully `Idle`.
    pub async fn connect(&self, receiver_name: &str) -> Result<()> {
        let mut session = self.session.lock().await;

        if session.receiver_name.as_deref() == Some(receiver_name) {
            return Ok(());
        }

        disconnect_locked(&mut session).await;

        let connection =
            match tokio::time::timeout(self.connect_timeout, self.client.open(receiver_name)).await
            {
                Ok(Ok(connection)) => connection,
                Ok(Err(e)) => return Err(e),
                Err(_) => return Err(CastError::ConnectionTimeout(receiver_name.to_string())),
            };

        let channel = match connection.media_channel().await {
            Ok(channel) => channel,
            Err(e) => {
                let _ = connection.close().await;
                return Err(e);
            }
        };

        info!("Receiver connected: {}", receiver_name);
        session.receiver_name = Some(receiver_name.to_string());
        session.connection = Some(connection);
        session.channel = Some(channel);
        Ok(())
    }

    /// Load and start the given media on the connected receiver.
    ///
    /// Fire-and-forget: returns once the command is dispatched. Requires a
    /// prior successful [`connect`](Self::connect).
    pub async fn cast(&self, media_ref: &str) -> Result<()> {
        let mut session = self.session.lock().await;
        let channel = session
            .channel
            .as_ref()
            .ok_or_else(|| CastError::Precondition("cast requires a connected receiver".into()))?;

        let url = self.media_url(media_ref);
        channel.load_and_play(&url, content_type(media_ref)).await?;

        info!("Casting {}", media_ref);
        session.now_playing = Some(media_ref.to_string());
        Ok(())
    }

    /// True when the receiver reports playing and not paused. Never errors;
    /// false when no channel is bound.
    pub async fn is_playing(&self) -> bool {
        let session = self.session.lock().await;
        match &session.channel {
            Some(channel) => channel
                .status()
                .await
                .map(|s| s.playing && !s.paused)
                .unwrap_or(false),
            None => false,
        }
    }

    /// Current playback offset in fractional seconds, None when unbound or
    /// unavailable.
    pub async fn position(&self) -> Option<f64> {
        let session = self.session.lock().await;
        match &session.channel {
            Some(channel) => channel.status().await.ok().and_then(|s| s.position),
            None => None,
        }
    }

    /// Total duration in fractional seconds, None when unbound or
    /// unavailable.
    pub async fn duration(&self) -> Option<f64> {
        let session = self.session.lock().await;
        match &session.channel {
            Some(channel) => channel.status().await.ok().and_then(|s| s.duration),
            None => None,
        }
    }

    /// Snapshot for the browser UI, taken under a single lock and a single
    /// status fetch.
    pub async fn snapshot(&self) -> SessionSnapshot {
        let session = self.session.lock().await;
        let status = match &session.channel {
            Some(channel) => channel.status().await.unwrap_or_default(),
            None => MediaStatus::default(),
        };
        SessionSnapshot {
            receiver: session.receiver_name.clone(),
            now_playing: session.now_playing.clone(),
            playing: status.playing && !status.paused,
            position: status.position,
            duration: status.duration,
        }
    }

    /// Resume playback. Silent no-op unless a channel is bound and the
    /// receiver reports pause capability.
    pub async fn play(&self) -> Result<()> {
        let session = self.session.lock().await;
        if let Some(channel) = &session.channel {
            if pause_capable(channel.as_ref()).await {
                channel.play().await?;
            }
        }
        Ok(())
    }

    /// Pause playback. Same capability gating as [`play`](Self::play).
    pub async fn pause(&self) -> Result<()> {
        let session = self.session.lock().await;
        if let Some(channel) = &session.channel {
            if pause_capable(channel.as_ref()).await {
                channel.pause().await?;
            }
        }
        Ok(())
    }

    /// If playing, pause and report "pause"; otherwise play and report
    /// "play". Runs under one lock so the decision and the command cannot
    /// interleave with a switch.
    pub async fn toggle_play_pause(&self) -> Result<&'static str> {
        let session = self.session.lock().await;
        let Some(channel) = &session.channel else {
            // No receiver: report the play intent, nothing to command
            return Ok("play");
        };
        let status = channel.status().await.unwrap_or_default();
        if status.playing && !status.paused {
            if status.can_pause {
                channel.pause().await?;
            }
            Ok("pause")
        } else {
            if status.can_pause {
                channel.play().await?;
            }
            Ok("play")
        }
    }

    /// Seek to an absolute offset in seconds. Silent no-op unless bound and
    /// seek-capable.
    pub async fn seek(&self, seconds: f64) -> Result<()> {
        let session = self.session.lock().await;
        if let Some(channel) = &session.channel {
            let capable = channel
                .status()
                .await
                .map(|s| s.can_seek)
                .unwrap_or(false);
            if capable {
                channel.seek(seconds).await?;
            }
        }
        Ok(())
    }

    /// Stop playback and clear `now_playing`. Always safe to call.
    pub async fn stop(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        let result = match &session.channel {
            Some(channel) => channel.stop().await,
            None => Ok(()),
        };
        session.now_playing = None;
        result
    }

    /// Release the channel and the receiver connection. Fully idempotent.
    pub async fn disconnect(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        disconnect_locked(&mut session).await;
        Ok(())
    }

    /// Name of the currently connected receiver, if any
    pub async fn receiver_name(&self) -> Option<String> {
        self.session.lock().await.receiver_name.clone()
    }

    /// Media reference believed to be loaded, if any
    pub async fn now_playing(&self) -> Option<String> {
        self.session.lock().await.now_playing.clone()
    }

    /// Compose the playable URL handed to the receiver. The receiver
    /// dereferences this over the network independently, so the media route
    /// must keep serving this exact path while a cast is active.
    fn media_url(&self, media_ref: &str) -> String {
        let encoded: Vec<String> = media_ref
            .split('/')
            .map(|segment| utf8_percent_encode(segment, PATH_SEGMENT).to_string())
            .collect();
        format!(
            "{}/media/{}",
            self.stream_base_url.trim_end_matches('/'),
            encoded.join("/")
        )
    }

    #[cfg(test)]
    async fn invariant_holds(&self) -> bool {
        let session = self.session.lock().await;
        let bound = session.channel.is_some() == session.connection.is_some();
        let playing_needs_channel = session.now_playing.is_none() || session.channel.is_some();
        bound && playing_needs_channel
    }
}

async fn pause_capable(channel: &dyn MediaChannel) -> bool {
    channel
        .status()
        .await
        .map(|s| s.can_pause)
        .unwrap_or(false)
}

/// Release channel and connection in order: stop, quit remote app, close.
/// Best-effort; failures are logged, never propagated, and the session always
/// ends up `Idle`.
async fn disconnect_locked(session: &mut Session) {
    if let Some(channel) = session.channel.take() {
        if let Err(e) = channel.stop().await {
            warn!("Stop during disconnect failed: {}", e);
        }
        session.now_playing = None;
    }
    if let Some(connection) = session.connection.take() {
        if let Err(e) = connection.quit_remote_app().await {
            warn!("Quit remote app failed: {}", e);
        }
        if let Err(e) = connection.close().await {
            warn!("Connection close failed: {}", e);
        }
    }
    if let Some(name) = session.receiver_name.take() {
        info!("Receiver disconnected: {}", name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::receiver::fake::FakeReceiverClient;
    use crate::receiver::MediaStatus;

    fn manager(names: &[&str]) -> (Arc<FakeReceiverClient>, SessionManager) {
        let client = Arc::new(FakeReceiverClient::new(names));
        let manager = SessionManager::new(
            client.clone(),
            "http://192.168.100.102:5120",
            Duration::from_secs(5),
        );
        (client, manager)
    }

    #[tokio::test]
    async fn connect_same_name_is_idempotent() {
        let (client, manager) = manager(&["LivingRoom"]);

        manager.connect("LivingRoom").await.unwrap();
        manager.connect("LivingRoom").await.unwrap();

        assert_eq!(client.open_count(), 1);
        assert!(manager.invariant_holds().await);
    }

    #[tokio::test]
    async fn switch_releases_old_receiver_before_opening_new() {
        let (client, manager) = manager(&["LivingRoom", "Bedroom"]);

        manager.connect("LivingRoom").await.unwrap();
        manager.connect("Bedroom").await.unwrap();

        let log = client.log();
        let quit = log.iter().position(|e| e == "quit:LivingRoom").unwrap();
        let close = log.iter().position(|e| e == "close:LivingRoom").unwrap();
        let reopen = log.iter().position(|e| e == "open:Bedroom").unwrap();
        assert!(quit < close && close < reopen);
        assert_eq!(manager.receiver_name().await.as_deref(), Some("Bedroom"));
        assert!(manager.invariant_holds().await);
    }

    #[tokio::test]
    async fn connect_unknown_receiver_fails_and_stays_idle() {
        let (_, manager) = manager(&["LivingRoom"]);

        let err = manager.connect("Unknown").await.unwrap_err();
        assert!(matches!(err, CastError::Discovery(_)));
        assert!(manager.receiver_name().await.is_none());
        assert!(manager.invariant_holds().await);
    }

    #[tokio::test(start_paused = true)]
    async fn connect_times_out_and_stays_idle() {
        let client = Arc::new(FakeReceiverClient::new(&["LivingRoom"]));
        client.delay_opens(Duration::from_secs(60));
        let manager = SessionManager::new(
            client.clone(),
            "http://127.0.0.1:5120",
            Duration::from_millis(200),
        );

        let err = manager.connect("LivingRoom").await.unwrap_err();
        assert!(matches!(err, CastError::ConnectionTimeout(_)));
        assert!(manager.receiver_name().await.is_none());
        assert!(manager.invariant_holds().await);
    }

    #[tokio::test]
    async fn cast_without_connect_is_a_precondition_error() {
        let (_, manager) = manager(&["LivingRoom"]);

        let err = manager.cast("Movies/x.mp4").await.unwrap_err();
        assert!(matches!(err, CastError::Precondition(_)));
        assert!(manager.now_playing().await.is_none());
    }

    #[tokio::test]
    async fn cast_composes_url_and_sets_now_playing() {
        let (client, manager) = manager(&["LivingRoom"]);

        manager.connect("LivingRoom").await.unwrap();
        manager.cast("Movies/Old Show/ep 1.mp4").await.unwrap();

        assert_eq!(
            manager.now_playing().await.as_deref(),
            Some("Movies/Old Show/ep 1.mp4")
        );
        let log = client.log();
        assert!(log.contains(
            &"load:http://192.168.100.102:5120/media/Movies/Old%20Show/ep%201.mp4:video/mp4"
                .to_string()
        ));
    }

    #[tokio::test]
    async fn cast_derives_content_type_from_container() {
        let (client, manager) = manager(&["LivingRoom"]);

        manager.connect("LivingRoom").await.unwrap();
        manager.cast("Shows/pilot.mkv").await.unwrap();

        let log = client.log();
        assert!(log
            .iter()
            .any(|e| e.starts_with("load:") && e.ends_with(":video/x-matroska")));
    }

    #[tokio::test]
    async fn stop_clears_now_playing_but_keeps_receiver_bound() {
        let (_, manager) = manager(&["LivingRoom"]);

        manager.connect("LivingRoom").await.unwrap();
        manager.cast("Movies/x.mp4").await.unwrap();
        manager.stop().await.unwrap();

        assert!(manager.now_playing().await.is_none());
        assert_eq!(manager.receiver_name().await.as_deref(), Some("LivingRoom"));
        assert!(manager.invariant_holds().await);
    }

    #[tokio::test]
    async fn disconnect_clears_everything_and_is_idempotent() {
        let (_, manager) = manager(&["LivingRoom"]);

        manager.connect("LivingRoom").await.unwrap();
        manager.cast("Movies/x.mp4").await.unwrap();
        manager.disconnect().await.unwrap();

        assert!(manager.receiver_name().await.is_none());
        assert!(manager.now_playing().await.is_none());

        // Already idle: still a no-op, never an error
        manager.disconnect().await.unwrap();
        assert!(manager.invariant_holds().await);
    }

    #[tokio::test]
    async fn status_reads_degrade_when_idle() {
        let (_, manager) = manager(&[]);

        assert!(!manager.is_playing().await);
        assert!(manager.position().await.is_none());
        assert!(manager.duration().await.is_none());
    }

    #[tokio::test]
    async fn seek_issues_exactly_one_command_when_capable() {
        let (client, manager) = manager(&["LivingRoom"]);
        manager.connect("LivingRoom").await.unwrap();
        client.set_status(MediaStatus {
            playing: true,
            can_seek: true,
            can_pause: true,
            ..Default::default()
        });

        manager.seek(3661.0).await.unwrap();

        let seeks: Vec<_> = client
            .log()
            .into_iter()
            .filter(|e| e.starts_with("seek:"))
            .collect();
        assert_eq!(seeks, vec!["seek:3661".to_string()]);
    }

    #[tokio::test]
    async fn seek_is_a_silent_noop_without_capability() {
        let (client, manager) = manager(&["LivingRoom"]);
        manager.connect("LivingRoom").await.unwrap();
        client.set_status(MediaStatus {
            playing: true,
            can_seek: false,
            ..Default::default()
        });

        manager.seek(30.0).await.unwrap();

        assert!(!client.log().iter().any(|e| e.starts_with("seek:")));
    }

    #[tokio::test]
    async fn play_and_pause_respect_pause_capability() {
        let (client, manager) = manager(&["LivingRoom"]);
        manager.connect("LivingRoom").await.unwrap();

        client.set_status(MediaStatus::default());
        manager.play().await.unwrap();
        manager.pause().await.unwrap();
        assert!(!client.log().iter().any(|e| e == "play" || e == "pause"));

        client.set_status(MediaStatus {
            playing: true,
            can_pause: true,
            ..Default::default()
        });
        manager.pause().await.unwrap();
        assert!(client.log().iter().any(|e| e == "pause"));
    }

    #[tokio::test]
    async fn toggle_reports_the_action_it_took() {
        let (client, manager) = manager(&["LivingRoom"]);
        manager.connect("LivingRoom").await.unwrap();

        client.set_status(MediaStatus {
            playing: true,
            can_pause: true,
            ..Default::default()
        });
        assert_eq!(manager.toggle_play_pause().await.unwrap(), "pause");

        client.set_status(MediaStatus {
            playing: false,
            paused: true,
            can_pause: true,
            ..Default::default()
        });
        assert_eq!(manager.toggle_play_pause().await.unwrap(), "play");
    }

    #[tokio::test]
    async fn is_playing_requires_playing_and_not_paused() {
        let (client, manager) = manager(&["LivingRoom"]);
        manager.connect("LivingRoom").await.unwrap();

        client.set_status(MediaStatus {
            playing: true,
            paused: true,
            ..Default::default()
        });
        assert!(!manager.is_playing().await);

        client.set_status(MediaStatus {
            playing: true,
            paused: false,
            ..Default::default()
        });
        assert!(manager.is_playing().await);
    }
}
