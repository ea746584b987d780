//! Flat key/value parameter strings shared by the daemon and the effect HAL.
//!
//! The platform passes configuration around as `key1=value1;key2=value2`
//! strings. This crate parses and formats that convention:
//! - entries are separated by `;`
//! - each entry is split on the first `=`
//! - entries with no `=` or an empty key are ignored
//! - duplicate keys keep the last value
//!
//! Order is preserved so a formatted set reads the way it was built.

use std::fmt;

/// An ordered set of string parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    entries: Vec<(String, String)>,
}

impl Params {
    /// Create an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `key=value;key=value` string.
    ///
    /// Malformed entries are dropped rather than failing the whole set; a
    /// caller that needs a specific key will notice its absence.
    pub fn parse(raw: &str) -> Self {
        let mut params = Self::new();
        for entry in raw.split(';') {
            let Some((key, value)) = entry.split_once('=') else {
                continue;
            };
            if key.is_empty() {
                continue;
            }
            params.set(key, value);
        }
        params
    }

    /// Look up a value by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Look up a key and parse its value as a signed decimal integer.
    pub fn get_int(&self, key: &str) -> Option<i32> {
        self.get(key)?.trim().parse().ok()
    }

    /// Look up a key and parse its value as hexadecimal (optional `0x` prefix).
    pub fn get_hex(&self, key: &str) -> Option<u32> {
        let value = self.get(key)?.trim();
        let digits = value
            .strip_prefix("0x")
            .or_else(|| value.strip_prefix("0X"))
            .unwrap_or(value);
        u32::from_str_radix(digits, 16).ok()
    }

    /// Insert or replace a value, preserving insertion order.
    pub fn set(&mut self, key: &str, value: &str) {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value.to_string(),
            None => self.entries.push((key.to_string(), value.to_string())),
        }
    }

    /// Remove a key, returning its value if it was present.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl fmt::Display for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(";")?;
            }
            write!(f, "{key}={value}")?;
        }
        Ok(())
    }
}

/// Parse a generic integer literal: optional sign, `0x`/`0X` hex, otherwise
/// decimal.
///
/// Hex literals cover the full 32-bit range and map onto `i32` by bit
/// pattern, so `0xffffffff` parses as `-1` the way effect payload values are
/// written by vendor tooling.
pub fn parse_int_lit(raw: &str) -> Option<i32> {
    let raw = raw.trim();
    if let Some(digits) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        return u32::from_str_radix(digits, 16).ok().map(|v| v as i32);
    }
    if let Some(rest) = raw.strip_prefix("-0x").or_else(|| raw.strip_prefix("-0X")) {
        return u32::from_str_radix(rest, 16)
            .ok()
            .and_then(|v| i32::try_from(v).ok())
            .and_then(i32::checked_neg);
    }
    raw.parse().ok()
}
