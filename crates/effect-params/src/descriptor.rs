//! Binary layout of an effect parameter record.
//!
//! Mixer control format:
//! - header: 5 little-endian `i32` words
//!   `[module, param id, size, offset, device]`
//! - then `size` bytes of little-endian `i32` payload
//!
//! `size` counts payload bytes only. The top bit of `device` marks a
//! retrieval request rather than an assignment.

use std::io;

/// DSP module word written as the first header field.
pub const EFFECT_MODULE_ID: i32 = 0x0000_5000;

/// Header length in bytes (5 × i32).
pub const HEADER_LEN: usize = 20;

/// Top bit of `device`: the request retrieves instead of assigns.
pub const DEVICE_GET_FLAG: i32 = i32::MIN;

/// One effect parameter record: fixed header fields plus integer payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectParams {
    /// Parameter id (written as hex by callers).
    pub id: u32,
    /// Payload byte count; must equal `payload.len() * 4`.
    pub size: i32,
    pub offset: i32,
    pub device: i32,
    pub payload: Vec<i32>,
}

impl EffectParams {
    /// Total encoded length: header plus payload bytes.
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + self.payload.len() * 4
    }

    /// Encode header + payload into a single mixer-control buffer.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        out.extend_from_slice(&EFFECT_MODULE_ID.to_le_bytes());
        out.extend_from_slice(&self.id.to_le_bytes());
        out.extend_from_slice(&self.size.to_le_bytes());
        out.extend_from_slice(&self.offset.to_le_bytes());
        out.extend_from_slice(&self.device.to_le_bytes());
        for value in &self.payload {
            out.extend_from_slice(&value.to_le_bytes());
        }
        out
    }

    /// Decode a mixer-control buffer back into a record.
    ///
    /// Used on the get read-back path. The declared `size` must be
    /// non-negative, a multiple of 4, and covered by the buffer.
    pub fn decode(raw: &[u8]) -> io::Result<EffectParams> {
        if raw.len() < HEADER_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("short effect record ({} bytes)", raw.len()),
            ));
        }
        let module = read_i32(raw, 0);
        if module != EFFECT_MODULE_ID {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("effect module mismatch ({module:#x})"),
            ));
        }
        let id = read_i32(raw, 4) as u32;
        let size = read_i32(raw, 8);
        let offset = read_i32(raw, 12);
        let device = read_i32(raw, 16);

        if size < 0 || size % 4 != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("bad payload size {size}"),
            ));
        }
        let size_bytes = size as usize;
        if raw.len() - HEADER_LEN < size_bytes {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "truncated payload ({} bytes after header, size {size})",
                    raw.len() - HEADER_LEN
                ),
            ));
        }

        let payload = raw[HEADER_LEN..HEADER_LEN + size_bytes]
            .chunks_exact(4)
            .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();

        Ok(EffectParams {
            id,
            size,
            offset,
            device,
            payload,
        })
    }
}

fn read_i32(raw: &[u8], at: usize) -> i32 {
    i32::from_le_bytes([raw[at], raw[at + 1], raw[at + 2], raw[at + 3]])
}
