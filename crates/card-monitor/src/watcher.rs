//! Blocking watch loop over the card state nodes.
//!
//! The watcher owns every discovered [`CardHandle`] and blocks in a single
//! `poll(2)` call covering all of them (the kernel raises `POLLPRI` when a
//! sysfs attribute changes). A `UnixStream` pair serves as the stop handle:
//! its read end sits in the same poll set, so a stop request (or the stop
//! handle being dropped) wakes a pending wait immediately instead of
//! leaving the thread parked until the next card event.

use std::io::Write;
use std::os::fd::AsRawFd;
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result, bail};

use crate::cards::{CardHandle, discover_cards};
use crate::state::CardState;

/// A classified card transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardEvent {
    pub card: u32,
    pub state: CardState,
}

/// Receives card transitions once boot-up has completed.
///
/// Implementations must be cheap or hand off quickly; the watcher calls
/// them from the poll thread.
pub trait StatusSink: Send {
    fn card_status(&self, event: CardEvent);
}

/// Tracks the one-shot boot-up transition to online.
///
/// Until the first `Online` classification, nothing is forwarded. The
/// triggering event itself is swallowed too: it marks boot-up complete and
/// only events after it reach the sink.
#[derive(Debug, Default)]
pub struct BootGate {
    complete: bool,
}

impl BootGate {
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Record a classified state; returns whether the event is forwarded.
    fn observe(&mut self, state: CardState) -> bool {
        let forward = self.complete;
        if state == CardState::Online && !self.complete {
            self.complete = true;
            tracing::debug!("dsp online, device boot-up complete");
        }
        forward
    }
}

/// Where to find the card listing and the per-card state nodes.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub cards_file: PathBuf,
    pub cards_root: PathBuf,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            cards_file: PathBuf::from("/proc/asound/cards"),
            cards_root: PathBuf::from("/proc/asound"),
        }
    }
}

/// Wakes a blocked watcher and asks it to exit.
#[derive(Debug)]
pub struct StopHandle {
    tx: UnixStream,
}

impl StopHandle {
    /// Request a stop. Safe to call more than once.
    pub fn stop(&self) {
        // A failed write means the watcher is already gone.
        let _ = (&self.tx).write_all(b"q");
    }

    pub fn try_clone(&self) -> Result<StopHandle> {
        let tx = self.tx.try_clone().context("clone stop handle")?;
        Ok(StopHandle { tx })
    }
}

/// A spawned watcher thread plus its stop handle.
pub struct WatcherHandle {
    stop: StopHandle,
    join: JoinHandle<Result<()>>,
}

impl WatcherHandle {
    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn stop_handle(&self) -> Result<StopHandle> {
        self.stop.try_clone()
    }

    /// Wait for the watch loop to finish and return its final status.
    pub fn join(self) -> Result<()> {
        match self.join.join() {
            Ok(result) => result,
            Err(_) => bail!("watcher thread panicked"),
        }
    }
}

/// Watches every card state node and reports transitions to a sink.
pub struct CardWatcher {
    config: WatcherConfig,
    handles: Vec<CardHandle>,
    boot: BootGate,
    sink: Box<dyn StatusSink>,
    stop_rx: UnixStream,
}

impl CardWatcher {
    /// Build a watcher; the returned [`StopHandle`] wakes [`run`](Self::run).
    pub fn new(config: WatcherConfig, sink: Box<dyn StatusSink>) -> Result<(Self, StopHandle)> {
        let (tx, rx) = UnixStream::pair().context("create stop channel")?;
        let watcher = Self {
            config,
            handles: Vec::new(),
            boot: BootGate::default(),
            sink,
            stop_rx: rx,
        };
        Ok((watcher, StopHandle { tx }))
    }

    /// Spawn the watch loop on its own named thread.
    pub fn spawn(config: WatcherConfig, sink: Box<dyn StatusSink>) -> Result<WatcherHandle> {
        let (mut watcher, stop) = Self::new(config, sink)?;
        let join = thread::Builder::new()
            .name("card-watch".into())
            .spawn(move || watcher.run())
            .context("spawn watcher thread")?;
        Ok(WatcherHandle { stop, join })
    }

    /// Run the watch loop until stopped or a fatal error.
    ///
    /// Discovery failure and a `poll` failure are fatal. Individual read
    /// errors skip that card for the wakeup but are remembered: the final
    /// status is `Err` if any occurred.
    pub fn run(&mut self) -> Result<()> {
        if self.handles.is_empty() {
            self.handles = discover_cards(&self.config.cards_file, &self.config.cards_root)?;
            if self.handles.is_empty() {
                bail!("no sound card detected");
            }
        }

        let mut had_read_error = false;
        loop {
            let mut pfds: Vec<libc::pollfd> = Vec::with_capacity(self.handles.len() + 1);
            pfds.push(libc::pollfd {
                fd: self.stop_rx.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            });
            for handle in &self.handles {
                pfds.push(libc::pollfd {
                    fd: handle.as_raw_fd(),
                    events: libc::POLLPRI,
                    revents: 0,
                });
            }

            tracing::debug!("waiting for dsp state change");
            let rc = unsafe { libc::poll(pfds.as_mut_ptr(), pfds.len() as libc::nfds_t, -1) };
            if rc < 0 {
                let err = std::io::Error::last_os_error();
                if err.kind() == std::io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(err).context("poll on card state nodes");
            }

            if pfds[0].revents & (libc::POLLIN | libc::POLLHUP | libc::POLLERR) != 0 {
                tracing::debug!("stop requested, leaving watch loop");
                break;
            }

            for (i, pfd) in pfds.iter().enumerate().skip(1) {
                if pfd.revents & libc::POLLPRI == 0 {
                    continue;
                }
                let handle = &mut self.handles[i - 1];
                if let Err(e) = service_wakeup(handle, &mut self.boot, self.sink.as_ref()) {
                    tracing::error!(card = handle.card, "state event lost: {e:#}");
                    had_read_error = true;
                }
            }
        }

        if had_read_error {
            bail!("one or more card state reads failed");
        }
        Ok(())
    }
}

/// Re-read one card's state node and forward the transition if classified.
fn service_wakeup(
    handle: &mut CardHandle,
    boot: &mut BootGate,
    sink: &dyn StatusSink,
) -> Result<()> {
    match handle.read_state()? {
        Some(state) => {
            tracing::debug!(card = handle.card, %state, "card state event");
            if boot.observe(state) {
                sink.card_status(CardEvent {
                    card: handle.card,
                    state,
                });
            }
        }
        None => tracing::debug!(card = handle.card, "unrecognized state text, no transition"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<CardEvent>>,
    }

    impl RecordingSink {
        fn events(&self) -> Vec<CardEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    impl StatusSink for RecordingSink {
        fn card_status(&self, event: CardEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    impl StatusSink for Arc<RecordingSink> {
        fn card_status(&self, event: CardEvent) {
            self.as_ref().card_status(event);
        }
    }

    fn fixture(states: &[&str]) -> (TempDir, WatcherConfig) {
        let dir = TempDir::new().unwrap();
        let mut listing = String::new();
        for (card, state) in states.iter().enumerate() {
            listing.push_str(&format!(" {card} [fake ]: fake - Fake {card}\n"));
            listing.push_str("                      description\n");
            let node_dir = dir.path().join(format!("card{card}"));
            fs::create_dir_all(&node_dir).unwrap();
            fs::write(node_dir.join("state"), state).unwrap();
        }
        let cards_file = dir.path().join("cards");
        fs::write(&cards_file, listing).unwrap();
        let config = WatcherConfig {
            cards_file,
            cards_root: dir.path().to_path_buf(),
        };
        (dir, config)
    }

    fn set_state(dir: &TempDir, card: u32, state: &str) {
        fs::write(dir.path().join(format!("card{card}")).join("state"), state).unwrap();
    }

    #[test]
    fn boot_gate_swallows_events_until_after_first_online() {
        let (dir, config) = fixture(&["OFFLINE\n"]);
        let sink = RecordingSink::default();
        let mut boot = BootGate::default();
        let mut handles = discover_cards(&config.cards_file, &config.cards_root).unwrap();
        let handle = &mut handles[0];

        // Offline before boot-up: nothing forwarded.
        service_wakeup(handle, &mut boot, &sink).unwrap();
        assert!(!boot.is_complete());
        assert!(sink.events().is_empty());

        // First online completes boot-up but is itself swallowed.
        set_state(&dir, 0, "ONLINE\n");
        service_wakeup(handle, &mut boot, &sink).unwrap();
        assert!(boot.is_complete());
        assert!(sink.events().is_empty());

        // Everything classified afterwards is forwarded.
        set_state(&dir, 0, "OFFLINE\n");
        service_wakeup(handle, &mut boot, &sink).unwrap();
        set_state(&dir, 0, "ONLINE\n");
        service_wakeup(handle, &mut boot, &sink).unwrap();
        assert_eq!(
            sink.events(),
            vec![
                CardEvent {
                    card: 0,
                    state: CardState::Offline
                },
                CardEvent {
                    card: 0,
                    state: CardState::Online
                },
            ]
        );
    }

    #[test]
    fn unrecognized_text_emits_nothing_even_after_boot() {
        let (dir, config) = fixture(&["ONLINE\n"]);
        let sink = RecordingSink::default();
        let mut boot = BootGate::default();
        let mut handles = discover_cards(&config.cards_file, &config.cards_root).unwrap();
        let handle = &mut handles[0];

        service_wakeup(handle, &mut boot, &sink).unwrap();
        assert!(boot.is_complete());

        set_state(&dir, 0, "RESET\n");
        service_wakeup(handle, &mut boot, &sink).unwrap();
        assert!(sink.events().is_empty());
    }

    #[test]
    fn read_error_is_reported_per_wakeup() {
        let (dir, config) = fixture(&["ONLINE\n"]);
        let sink = RecordingSink::default();
        let mut boot = BootGate::default();
        let mut handles = discover_cards(&config.cards_file, &config.cards_root).unwrap();
        let handle = &mut handles[0];

        set_state(&dir, 0, "");
        assert!(service_wakeup(handle, &mut boot, &sink).is_err());
        assert!(sink.events().is_empty());
    }

    #[test]
    fn stop_unblocks_a_pending_wait() {
        let (_dir, config) = fixture(&["ONLINE\n"]);
        let sink = Arc::new(RecordingSink::default());
        let watcher = CardWatcher::spawn(config, Box::new(sink.clone())).unwrap();
        // Regular files never raise POLLPRI, so the loop is parked in poll
        // until the stop handle fires.
        watcher.stop();
        watcher.join().unwrap();
        assert!(sink.events().is_empty());
    }

    #[test]
    fn discovery_failure_is_fatal() {
        let dir = TempDir::new().unwrap();
        let config = WatcherConfig {
            cards_file: dir.path().join("missing"),
            cards_root: dir.path().to_path_buf(),
        };
        let sink = RecordingSink::default();
        let (mut watcher, _stop) = CardWatcher::new(config, Box::new(sink)).unwrap();
        assert!(watcher.run().is_err());
    }

    #[test]
    fn empty_discovery_is_fatal() {
        let dir = TempDir::new().unwrap();
        let cards_file = dir.path().join("cards");
        fs::write(&cards_file, "").unwrap();
        let config = WatcherConfig {
            cards_file,
            cards_root: dir.path().to_path_buf(),
        };
        let sink = RecordingSink::default();
        let (mut watcher, _stop) = CardWatcher::new(config, Box::new(sink)).unwrap();
        assert!(watcher.run().is_err());
    }
}
