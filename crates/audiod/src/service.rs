//! Forwarding card events to the audio service.
//!
//! The watcher thread must never block on the service endpoint, so its
//! sink only pushes events onto a bounded channel; a separate notifier
//! thread drains the channel, formats the `SND_CARD_STATUS` parameter
//! string, and sends it as a datagram to the configured service socket.
//! Send failures are logged and dropped; the service boundary is
//! best-effort.

use std::os::unix::net::UnixDatagram;
use std::path::PathBuf;
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender};

use card_monitor::{CardEvent, STATUS_PARAM_KEY, StatusSink};
use str_params::Params;

/// Channel-backed [`StatusSink`] handed to the watcher.
pub struct ChannelSink {
    tx: Sender<CardEvent>,
}

impl ChannelSink {
    pub fn new(tx: Sender<CardEvent>) -> Self {
        Self { tx }
    }
}

impl StatusSink for ChannelSink {
    fn card_status(&self, event: CardEvent) {
        if let Err(e) = self.tx.send(event) {
            tracing::warn!("card event dropped: {e}");
        }
    }
}

/// Format one event as the service notification string.
pub fn notification(event: &CardEvent) -> String {
    let mut parms = Params::new();
    parms.set(STATUS_PARAM_KEY, &format!("{},{}", event.card, event.state));
    parms.to_string()
}

/// Spawn the notifier thread; it exits when the channel disconnects.
pub fn spawn_notifier(
    rx: Receiver<CardEvent>,
    socket: Option<PathBuf>,
) -> Result<JoinHandle<()>> {
    let link = match socket {
        Some(path) => match UnixDatagram::unbound() {
            Ok(sock) => Some((sock, path)),
            Err(e) => {
                tracing::warn!("audio service socket unavailable, logging only: {e}");
                None
            }
        },
        None => None,
    };

    thread::Builder::new()
        .name("audiod-notify".into())
        .spawn(move || {
            for event in rx {
                let msg = notification(&event);
                tracing::info!(%msg, "audio service notification");
                if let Some((sock, path)) = &link {
                    if let Err(e) = sock.send_to(msg.as_bytes(), path) {
                        tracing::warn!(path = ?path, "audio service send failed: {e}");
                    }
                }
            }
        })
        .context("spawn notifier thread")
}
