//! Vendor DSP effect parameter plumbing.
//!
//! Effect parameters arrive as flat key/value strings (see `str-params`)
//! and leave as raw binary writes to per-stream mixer controls named
//! `"Audio Effects Config <pcm-device-id>"`. This crate marshals between
//! the two:
//! - [`descriptor`] defines the binary record and its wire codec
//! - [`mixer`] is the seam to the platform mixer-control subsystem
//! - [`session`] parses set/get requests, validates them, holds the two
//!   deferred fade buffers, and dispatches to active playback streams

pub mod descriptor;
pub mod mixer;
pub mod session;

pub use descriptor::{EFFECT_MODULE_ID, EffectParams};
pub use mixer::{Mixer, StreamInfo, StreamUse, effect_control_name};
pub use session::{EFFECT_PARAM_KEY, EffectSession, FadeDirection};
