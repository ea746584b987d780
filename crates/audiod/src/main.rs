//! audiod: watches kernel sound-card state nodes and reports DSP
//! online/offline transitions to the system audio service.
//!
//! ## Structure
//! 1. **Watch**: a dedicated thread blocks in `poll(2)` across every card's
//!    state node (`card-monitor`) and classifies transitions.
//! 2. **Notify**: a second thread drains classified events from a bounded
//!    channel and forwards `SND_CARD_STATUS=<card>,<STATE>` to the audio
//!    service socket, so a slow endpoint never stalls the poll loop.
//!
//! Nothing is reported until the DSP first comes online; the audio service
//! does not want early boot churn.

mod cli;
mod config;
mod service;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use card_monitor::{CardWatcher, discover_cards};

fn main() -> Result<()> {
    let args = cli::Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,audiod=info")),
        )
        .init();

    let cfg = match args.config.as_ref() {
        Some(path) => config::Config::load(path)?,
        None => config::Config::default(),
    };
    let settings = config::resolve(&cfg, &args);

    if args.list_cards {
        return list_cards(&settings);
    }

    tracing::info!(
        cards_file = ?settings.watcher.cards_file,
        service_socket = ?settings.service_socket,
        "starting sound card watcher"
    );

    let (tx, rx) = crossbeam_channel::bounded(64);
    let notifier = service::spawn_notifier(rx, settings.service_socket.clone())?;

    let watcher = CardWatcher::spawn(
        settings.watcher.clone(),
        Box::new(service::ChannelSink::new(tx)),
    )?;

    let stop = watcher.stop_handle()?;
    ctrlc::set_handler(move || {
        tracing::info!("shutdown requested");
        stop.stop();
    })
    .context("install signal handler")?;

    let result = watcher.join();
    // The watcher owned the only sender; the notifier drains and exits.
    if notifier.join().is_err() {
        tracing::warn!("notifier thread panicked");
    }
    result
}

/// CLI UX: print every detected card with its current classified state.
fn list_cards(settings: &config::Settings) -> Result<()> {
    let mut handles = discover_cards(&settings.watcher.cards_file, &settings.watcher.cards_root)?;
    if handles.is_empty() {
        bail!("no sound card detected");
    }
    for handle in handles.iter_mut() {
        match handle.read_state() {
            Ok(Some(state)) => println!("card {}: {state}", handle.card),
            Ok(None) => println!("card {}: unknown", handle.card),
            Err(e) => println!("card {}: unreadable ({e})", handle.card),
        }
    }
    Ok(())
}
