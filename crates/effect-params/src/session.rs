//! Set/get marshalling and dispatch for effect parameters.
//!
//! A request is a flat parameter set carrying the [`EFFECT_PARAM_KEY`]
//! marker (its value is the payload), the required `id`/`size`/`offset`/
//! `device` fields, and the optional `count` and `fade` fields. The session
//! validates the request, builds an [`EffectParams`] record, and either
//! caches it in a fade slot or writes it to every active playback stream's
//! mixer control.

use std::sync::Mutex;

use anyhow::{Result, anyhow, bail};
use str_params::{Params, parse_int_lit};

use crate::descriptor::{DEVICE_GET_FLAG, EffectParams};
use crate::mixer::{Mixer, StreamInfo, StreamUse, effect_control_name};

/// Marker key identifying an effect parameter set; its value is the payload.
pub const EFFECT_PARAM_KEY: &str = "DTS_EAGLE";

/// Which deferred fade slot a set request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeDirection {
    In,
    Out,
}

enum Destination {
    Immediate,
    Fade(FadeDirection),
}

/// Owns the mixer seam, the registered streams, and the two fade buffers.
///
/// Each fade buffer has its own lock; concurrent set and fade-dispatch
/// calls must not race.
pub struct EffectSession {
    mixer: Box<dyn Mixer>,
    streams: Mutex<Vec<StreamInfo>>,
    fade_in: Mutex<Option<EffectParams>>,
    fade_out: Mutex<Option<EffectParams>>,
}

impl EffectSession {
    pub fn new(mixer: Box<dyn Mixer>) -> Self {
        Self {
            mixer,
            streams: Mutex::new(Vec::new()),
            fade_in: Mutex::new(None),
            fade_out: Mutex::new(None),
        }
    }

    /// Record an active stream as a dispatch target.
    ///
    /// Re-registering an existing PCM device updates its role.
    pub fn register_stream(&self, pcm_device_id: u32, role: StreamUse) {
        let mut streams = self.streams.lock().unwrap();
        match streams.iter_mut().find(|s| s.pcm_device_id == pcm_device_id) {
            Some(existing) => existing.role = role,
            None => streams.push(StreamInfo {
                pcm_device_id,
                role,
            }),
        }
    }

    pub fn unregister_stream(&self, pcm_device_id: u32) {
        self.streams
            .lock()
            .unwrap()
            .retain(|s| s.pcm_device_id != pcm_device_id);
    }

    /// Handle a set request.
    ///
    /// Returns `Ok(false)` when `parms` does not carry the marker key (not
    /// an effect parameter set), `Ok(true)` when the request was stored or
    /// dispatched. Malformed requests and dispatch failures are errors; a
    /// per-stream write failure is logged, the remaining streams are still
    /// attempted, and the last failure becomes the result.
    pub fn set_parameters(&self, parms: &Params) -> Result<bool> {
        let Some(marker) = parms.get(EFFECT_PARAM_KEY) else {
            return Ok(false);
        };
        tracing::debug!(parms = %parms, "effect set request");

        let destination = match parms.get_int("fade") {
            Some(1) => Destination::Fade(FadeDirection::In),
            Some(n) if n > 1 => Destination::Fade(FadeDirection::Out),
            _ => Destination::Immediate,
        };

        let payload = parse_payload(marker, parms)?;
        let desc = parse_descriptor(parms, payload)?;

        match destination {
            Destination::Fade(direction) => {
                tracing::debug!(?direction, id = desc.id, "fade buffer stored");
                *self.fade_slot(direction).lock().unwrap() = Some(desc);
            }
            Destination::Immediate => self.dispatch(&desc)?,
        }
        Ok(true)
    }

    /// Handle a get request.
    ///
    /// Returns `Ok(None)` when `query` does not carry the marker key.
    /// On success the payload read back from the mixer is formatted as a
    /// comma-separated decimal list. A query that parses but reaches no
    /// playback stream is an error.
    pub fn get_parameters(&self, query: &Params) -> Result<Option<String>> {
        if query.get(EFFECT_PARAM_KEY).is_none() {
            return Ok(None);
        }
        tracing::debug!(query = %query, "effect get request");

        let count = query.get_int("count").map_or(1, |c| c.max(1)) as usize;
        let mut desc = parse_descriptor(query, vec![0; count])?;
        desc.device |= DEVICE_GET_FLAG;

        let raw = desc.encode();
        let total = raw.len();
        let streams = self.playback_streams();
        let mut readback: Option<EffectParams> = None;
        for stream in &streams {
            let name = effect_control_name(stream.pcm_device_id);
            let result = self
                .mixer
                .set_array(&name, &raw)
                .and_then(|()| self.mixer.get_array(&name, total));
            match result {
                Ok(bytes) => match EffectParams::decode(&bytes) {
                    Ok(decoded) => readback = Some(decoded),
                    Err(e) => tracing::warn!(control = %name, "undecodable effect readback: {e}"),
                },
                Err(e) => tracing::warn!(control = %name, "effect get failed: {e:#}"),
            }
        }

        let Some(decoded) = readback else {
            bail!("no playback stream produced effect data");
        };
        let values: Vec<String> = decoded
            .payload
            .iter()
            .take(count)
            .map(|v| v.to_string())
            .collect();
        let reply = values.join(",");
        tracing::debug!(%reply, "effect get result");
        Ok(Some(reply))
    }

    /// Snapshot a cached fade descriptor, if any.
    pub fn fade_descriptor(&self, direction: FadeDirection) -> Option<EffectParams> {
        self.fade_slot(direction).lock().unwrap().clone()
    }

    /// Send a cached fade descriptor to the active playback streams.
    pub fn dispatch_fade(&self, direction: FadeDirection) -> Result<()> {
        let Some(desc) = self.fade_descriptor(direction) else {
            bail!("no cached {direction:?} fade descriptor");
        };
        self.dispatch(&desc)
    }

    fn fade_slot(&self, direction: FadeDirection) -> &Mutex<Option<EffectParams>> {
        match direction {
            FadeDirection::In => &self.fade_in,
            FadeDirection::Out => &self.fade_out,
        }
    }

    fn playback_streams(&self) -> Vec<StreamInfo> {
        self.streams
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.role == StreamUse::Playback)
            .copied()
            .collect()
    }

    /// Write the record to every playback stream; last failure wins.
    fn dispatch(&self, desc: &EffectParams) -> Result<()> {
        let raw = desc.encode();
        let mut last_err = None;
        for stream in self.playback_streams() {
            let name = effect_control_name(stream.pcm_device_id);
            match self.mixer.set_array(&name, &raw) {
                Ok(()) => tracing::debug!(control = %name, "effect params applied"),
                Err(e) => {
                    tracing::warn!(control = %name, "effect params write failed: {e:#}");
                    last_err = Some(e);
                }
            }
        }
        match last_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Parse the marker value into the integer payload.
///
/// With `count > 1` the value is a comma-separated list of exactly `count`
/// integer literals; otherwise it is a single literal.
fn parse_payload(marker: &str, parms: &Params) -> Result<Vec<i32>> {
    let count = parms.get_int("count").unwrap_or(1);
    if count > 1 {
        let values: Vec<i32> = marker
            .split(',')
            .map(|token| {
                parse_int_lit(token)
                    .ok_or_else(|| anyhow!("bad integer literal {token:?} in payload"))
            })
            .collect::<Result<_>>()?;
        if values.len() != count as usize {
            bail!(
                "malformed multi value string ({} elements, count {count})",
                values.len()
            );
        }
        Ok(values)
    } else {
        let value =
            parse_int_lit(marker).ok_or_else(|| anyhow!("bad integer literal {marker:?}"))?;
        Ok(vec![value])
    }
}

/// Parse the required descriptor fields and validate size against payload.
fn parse_descriptor(parms: &Params, payload: Vec<i32>) -> Result<EffectParams> {
    let id = parms
        .get_hex("id")
        .ok_or_else(|| anyhow!("missing or malformed id"))?;
    let size = parms
        .get_int("size")
        .ok_or_else(|| anyhow!("missing or malformed size"))?;
    let offset = parms
        .get_int("offset")
        .ok_or_else(|| anyhow!("missing or malformed offset"))?;
    let device = parms
        .get_int("device")
        .ok_or_else(|| anyhow!("missing or malformed device"))?;

    let count = payload.len();
    if size != (count * 4) as i32 {
        bail!(
            "size/count mismatch (size = {size} bytes, count = {count} integers/{} bytes)",
            count * 4
        );
    }

    Ok(EffectParams {
        id,
        size,
        offset,
        device,
        payload,
    })
}
