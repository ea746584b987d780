//! Seam to the platform mixer-control subsystem.

use anyhow::Result;

/// Named binary-array mixer controls.
///
/// The platform implementation talks to the sound driver; tests substitute
/// an in-memory store.
pub trait Mixer: Send + Sync {
    /// Write `data` to the control named `name`.
    fn set_array(&self, name: &str, data: &[u8]) -> Result<()>;

    /// Read back `len` bytes from the control named `name`.
    fn get_array(&self, name: &str, len: usize) -> Result<Vec<u8>>;
}

/// Control name carrying effect parameters for one PCM device.
pub fn effect_control_name(pcm_device_id: u32) -> String {
    format!("Audio Effects Config {pcm_device_id}")
}

/// What a registered stream is used for; only playback streams receive
/// effect parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamUse {
    Playback,
    Capture,
}

/// One registered stream: the PCM device behind an active usecase.
#[derive(Debug, Clone, Copy)]
pub struct StreamInfo {
    pub pcm_device_id: u32,
    pub role: StreamUse,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_name_embeds_pcm_device_id() {
        assert_eq!(effect_control_name(0), "Audio Effects Config 0");
        assert_eq!(effect_control_name(13), "Audio Effects Config 13");
    }
}
