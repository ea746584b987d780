//! Daemon configuration: TOML file, CLI overrides, defaults.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use card_monitor::WatcherConfig;

use crate::cli::Args;

/// Daemon configuration loaded from TOML. Every field is optional; the
/// defaults point at the kernel's standard locations.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    pub cards: Option<CardsConfig>,
    pub service: Option<ServiceConfig>,
}

/// Card listing and state-node locations.
#[derive(Debug, Deserialize)]
pub struct CardsConfig {
    /// Card listing file (default `/proc/asound/cards`).
    pub listing: Option<PathBuf>,
    /// Directory holding `card<N>/state` nodes (default `/proc/asound`).
    pub root: Option<PathBuf>,
}

/// Audio service notification settings.
#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    /// Datagram socket the service listens on; notifications are log-only
    /// when unset.
    pub socket: Option<PathBuf>,
}

impl Config {
    /// Load configuration from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let raw =
            std::fs::read_to_string(path).with_context(|| format!("read config {:?}", path))?;
        let cfg = toml::from_str::<Config>(&raw)
            .with_context(|| format!("parse config {:?}", path))?;
        Ok(cfg)
    }
}

/// Effective settings after applying CLI flags over the config file.
#[derive(Debug)]
pub struct Settings {
    pub watcher: WatcherConfig,
    pub service_socket: Option<PathBuf>,
}

/// Resolve precedence: CLI flag, then config file, then default.
pub fn resolve(cfg: &Config, args: &Args) -> Settings {
    let defaults = WatcherConfig::default();
    let cards_file = args
        .cards_file
        .clone()
        .or_else(|| cfg.cards.as_ref().and_then(|c| c.listing.clone()))
        .unwrap_or(defaults.cards_file);
    let cards_root = args
        .cards_root
        .clone()
        .or_else(|| cfg.cards.as_ref().and_then(|c| c.root.clone()))
        .unwrap_or(defaults.cards_root);
    let service_socket = args
        .service_socket
        .clone()
        .or_else(|| cfg.service.as_ref().and_then(|s| s.socket.clone()));

    Settings {
        watcher: WatcherConfig {
            cards_file,
            cards_root,
        },
        service_socket,
    }
}
