//! Sound-card state monitoring.
//!
//! The kernel exposes one `state` attribute per sound card under the cards
//! root (`/proc/asound/card<N>/state`) and signals DSP online/offline
//! transitions as priority data on that file. This crate discovers the
//! cards from the listing file, watches every state node from a single
//! blocking `poll(2)` loop, and forwards classified transitions to a
//! [`StatusSink`] once the device has completed its first boot-up
//! transition to online.

pub mod cards;
pub mod state;
pub mod watcher;

pub use cards::{CardHandle, discover_cards};
pub use state::CardState;
pub use watcher::{BootGate, CardEvent, CardWatcher, StatusSink, StopHandle, WatcherConfig, WatcherHandle};

/// Parameter key used when reporting card transitions to the audio service.
///
/// The value format is `<card>,ONLINE` or `<card>,OFFLINE`.
pub const STATUS_PARAM_KEY: &str = "SND_CARD_STATUS";
