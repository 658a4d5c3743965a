//! Chromecast receiver client
//!
//! Discovery uses mDNS (`_googlecast._tcp.local.`, friendly name in the `fn`
//! TXT property). Transport commands go through the `rust_cast` crate, whose
//! device handle is blocking and not `Send`; each command therefore runs on a
//! blocking thread with a short-lived protocol connection of its own. The
//! default media receiver app is launched on load and stopped on disconnect.

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use mdns_sd::{ServiceDaemon, ServiceEvent};
use rust_cast::channels::media::{Media, PlayerState, StreamType};
use rust_cast::channels::receiver::CastDeviceApp;
use rust_cast::CastDevice;
use tracing::{debug, info, warn};

use crate::error::{CastError, Result};
use crate::receiver::{
    MediaChannel, MediaStatus, ReceiverClient, ReceiverConnection, MEDIA_COMMAND_PAUSE,
    MEDIA_COMMAND_SEEK,
};

const CHROMECAST_SERVICE: &str = "_googlecast._tcp.local.";

/// A receiver located by discovery
#[derive(Debug, Clone)]
struct DiscoveredReceiver {
    name: String,
    host: String,
    port: u16,
}

/// Production receiver client backed by rust_cast + mDNS
pub struct ChromecastClient {
    discovery_timeout: Duration,
}

impl ChromecastClient {
    pub fn new(discovery_timeout: Duration) -> Self {
        Self { discovery_timeout }
    }

    /// Run one mDNS scan for the configured window.
    async fn scan(&self) -> Result<Vec<DiscoveredReceiver>> {
        let mdns = ServiceDaemon::new()
            .map_err(|e| CastError::Receiver(format!("mDNS daemon: {}", e)))?;
        let browser = mdns
            .browse(CHROMECAST_SERVICE)
            .map_err(|e| CastError::Receiver(format!("mDNS browse: {}", e)))?;

        let mut found: Vec<DiscoveredReceiver> = Vec::new();
        let deadline = tokio::time::Instant::now() + self.discovery_timeout;

        while tokio::time::Instant::now() < deadline {
            match browser.try_recv() {
                Ok(ServiceEvent::ServiceResolved(svc)) => {
                    let name = svc
                        .get_property_val_str("fn")
                        .unwrap_or_else(|| svc.get_fullname())
                        .to_string();
                    let addr = svc.get_addresses().iter().find_map(|a| match a {
                        IpAddr::V4(v4) => Some(v4.to_string()),
                        IpAddr::V6(_) => None,
                    });
                    if let Some(host) = addr {
                        if !found.iter().any(|r| r.name == name) {
                            debug!("Discovered receiver {} at {}:{}", name, host, svc.get_port());
                            found.push(DiscoveredReceiver {
                                name,
                                host,
                                port: svc.get_port(),
                            });
                        }
                    }
                }
                Ok(_) => {}
                Err(_) => tokio::time::sleep(Duration::from_millis(100)).await,
            }
        }

        let _ = mdns.stop_browse(CHROMECAST_SERVICE);
        let _ = mdns.shutdown();

        Ok(found)
    }
}

#[async_trait]
impl ReceiverClient for ChromecastClient {
    async fn discover(&self) -> Result<Vec<String>> {
        Ok(self.scan().await?.into_iter().map(|r| r.name).collect())
    }

    async fn open(&self, name: &str) -> Result<Box<dyn ReceiverConnection>> {
        let target = self
            .scan()
            .await?
            .into_iter()
            .find(|r| r.name == name)
            .ok_or_else(|| CastError::Discovery(name.to_string()))?;

        // Probe the control connection so a bad address fails here, not on
        // the first transport command.
        let host = target.host.clone();
        let port = target.port;
        run_blocking(move || {
            let device = connect_device(&host, port)?;
            device
                .receiver
                .get_status()
                .map_err(|e| CastError::Receiver(format!("receiver status: {}", e)))?;
            Ok(())
        })
        .await?;

        info!("Connected to receiver {} at {}:{}", name, target.host, target.port);
        Ok(Box::new(ChromecastConnection { target }))
    }
}

/// Open connection to one Chromecast device
struct ChromecastConnection {
    target: DiscoveredReceiver,
}

#[async_trait]
impl ReceiverConnection for ChromecastConnection {
    async fn media_channel(&self) -> Result<Box<dyn MediaChannel>> {
        Ok(Box::new(ChromecastChannel {
            host: self.target.host.clone(),
            port: self.target.port,
        }))
    }

    async fn quit_remote_app(&self) -> Result<()> {
        let host = self.target.host.clone();
        let port = self.target.port;
        run_blocking(move || {
            let device = connect_device(&host, port)?;
            let status = device
                .receiver
                .get_status()
                .map_err(|e| CastError::Receiver(format!("receiver status: {}", e)))?;
            for app in &status.applications {
                if let Err(e) = device.receiver.stop_app(app.session_id.as_str()) {
                    warn!("Failed to stop app {}: {}", app.app_id, e);
                }
            }
            Ok(())
        })
        .await
    }

    async fn close(&self) -> Result<()> {
        // Protocol connections are per-command; nothing is held open here.
        Ok(())
    }
}

/// Media control channel for one Chromecast device
struct ChromecastChannel {
    host: String,
    port: u16,
}

impl ChromecastChannel {
    /// Issue a transport command against the current media session, if any.
    async fn media_command<F>(&self, command: F) -> Result<()>
    where
        F: FnOnce(&CastDevice<'_>, &str, i32) -> std::result::Result<(), rust_cast::errors::Error>
            + Send
            + 'static,
    {
        let host = self.host.clone();
        let port = self.port;
        run_blocking(move || {
            let device = connect_device(&host, port)?;
            let Some((transport_id, media_session_id)) = current_media_session(&device)? else {
                // Nothing loaded: transport commands degrade to no-ops
                return Ok(());
            };
            command(&device, &transport_id, media_session_id)
                .map_err(|e| CastError::Receiver(format!("media command: {}", e)))
        })
        .await
    }
}

#[async_trait]
impl MediaChannel for ChromecastChannel {
    async fn load_and_play(&self, url: &str, content_type: &str) -> Result<()> {
        let host = self.host.clone();
        let port = self.port;
        let media = Media {
            content_id: url.to_string(),
            content_type: content_type.to_string(),
            stream_type: StreamType::Buffered,
            duration: None,
            metadata: None,
        };
        run_blocking(move || {
            let device = connect_device(&host, port)?;
            let app = device
                .receiver
                .launch_app(&CastDeviceApp::DefaultMediaReceiver)
                .map_err(|e| CastError::Receiver(format!("launch app: {}", e)))?;
            device
                .connection
                .connect(app.transport_id.as_str())
                .map_err(|e| CastError::Receiver(format!("connect transport: {}", e)))?;
            device
                .media
                .load(app.transport_id.as_str(), app.session_id.as_str(), &media)
                .map_err(|e| CastError::Receiver(format!("load media: {}", e)))?;
            Ok(())
        })
        .await
    }

    async fn play(&self) -> Result<()> {
        self.media_command(|device, transport_id, session| {
            device.media.play(transport_id, session).map(|_| ())
        })
        .await
    }

    async fn pause(&self) -> Result<()> {
        self.media_command(|device, transport_id, session| {
            device.media.pause(transport_id, session).map(|_| ())
        })
        .await
    }

    async fn seek(&self, seconds: f64) -> Result<()> {
        self.media_command(move |device, transport_id, session| {
            device
                .media
                .seek(transport_id, session, Some(seconds as f32), None)
                .map(|_| ())
        })
        .await
    }

    async fn stop(&self) -> Result<()> {
        self.media_command(|device, transport_id, session| {
            device.media.stop(transport_id, session).map(|_| ())
        })
        .await
    }

    async fn status(&self) -> Result<MediaStatus> {
        let host = self.host.clone();
        let port = self.port;
        run_blocking(move || {
            let device = connect_device(&host, port)?;
            let Some((transport_id, _)) = current_media_session(&device)? else {
                return Ok(MediaStatus::default());
            };
            let status = device
                .media
                .get_status(transport_id.as_str(), None)
                .map_err(|e| CastError::Receiver(format!("media status: {}", e)))?;
            let Some(entry) = status.entries.first() else {
                return Ok(MediaStatus::default());
            };
            Ok(MediaStatus {
                playing: matches!(entry.player_state, PlayerState::Playing),
                paused: matches!(entry.player_state, PlayerState::Paused),
                position: entry.current_time.map(|t| t as f64),
                duration: entry
                    .media
                    .as_ref()
                    .and_then(|m| m.duration)
                    .map(|d| d as f64),
                can_pause: entry.supported_media_commands & MEDIA_COMMAND_PAUSE != 0,
                can_seek: entry.supported_media_commands & MEDIA_COMMAND_SEEK != 0,
            })
        })
        .await
    }
}

/// Open a device handle and its platform connection
fn connect_device(host: &str, port: u16) -> Result<CastDevice<'static>> {
    let device = CastDevice::connect_without_host_verification(host.to_string(), port)
        .map_err(|e| CastError::Receiver(format!("connect {}:{}: {}", host, port, e)))?;
    device
        .connection
        .connect("receiver-0")
        .map_err(|e| CastError::Receiver(format!("connect receiver: {}", e)))?;
    Ok(device)
}

/// Locate the running app and its current media session, if any
fn current_media_session(device: &CastDevice<'_>) -> Result<Option<(String, i32)>> {
    let status = device
        .receiver
        .get_status()
        .map_err(|e| CastError::Receiver(format!("receiver status: {}", e)))?;
    let Some(app) = status.applications.first() else {
        return Ok(None);
    };
    let transport_id = app.transport_id.to_string();
    device
        .connection
        .connect(transport_id.as_str())
        .map_err(|e| CastError::Receiver(format!("connect transport: {}", e)))?;
    let media_status = device
        .media
        .get_status(transport_id.as_str(), None)
        .map_err(|e| CastError::Receiver(format!("media status: {}", e)))?;
    Ok(media_status
        .entries
        .first()
        .map(|entry| (transport_id, entry.media_session_id)))
}

/// Run a blocking receiver call off the async runtime
async fn run_blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| CastError::Receiver(format!("blocking task: {}", e)))?
}
