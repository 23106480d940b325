//! Instrument envelope playback on a voice.
//!
//! Two position models exist. FT2-style envelopes advance after the
//! value is read, loop on `position == loop end`, and stop at the sustain
//! end + 1. IT-style envelopes are pre-incremented so that a paused
//! envelope reports the node it is paused on, and the sustain loop is
//! checked against the key-off state of the previous tick.

use rtk_ir::{Envelope, ModuleType, PlayBehaviour, Song};

use crate::channel::{ChannelFlags, ModChannel};
use crate::tables::{LINEAR_SLIDE_DOWN, LINEAR_SLIDE_UP};

/// Playback cursor of one instrument envelope on a voice.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EnvelopeCursor {
    /// Position in ticks
    pub position: u32,
    /// Enable override from `S7x`, `None` follows the instrument
    pub enabled: Option<bool>,
    /// Envelope value (0..=256) when the release node was jumped to
    pub release_value: Option<i32>,
}

impl EnvelopeCursor {
    pub fn reset(&mut self) {
        self.position = 0;
        self.release_value = None;
    }

    /// Is `env` running on this voice?
    pub fn is_active(&self, env: &Envelope) -> bool {
        !env.is_empty() && self.enabled.unwrap_or(env.enabled)
    }
}

/// Which of an instrument's envelopes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnvelopeKind {
    Volume,
    Panning,
    Pitch,
}

fn cursor_mut(chn: &mut ModChannel, kind: EnvelopeKind) -> &mut EnvelopeCursor {
    match kind {
        EnvelopeKind::Volume => &mut chn.volume_env,
        EnvelopeKind::Panning => &mut chn.pan_env,
        EnvelopeKind::Pitch => &mut chn.pitch_env,
    }
}

fn envelope_of<'s>(song: &'s Song, chn: &ModChannel, kind: EnvelopeKind) -> Option<&'s Envelope> {
    let ins = song.instrument(chn.instrument)?;
    Some(match kind {
        EnvelopeKind::Volume => &ins.volume_envelope,
        EnvelopeKind::Panning => &ins.panning_envelope,
        EnvelopeKind::Pitch => &ins.pitch_envelope,
    })
}

/// Position the value is read at, undoing the IT pre-increment.
fn read_position(song: &Song, cursor: &EnvelopeCursor) -> u32 {
    if song.behaviour.test(PlayBehaviour::IT_ENVELOPE_POSITION_HANDLING) {
        cursor.position.saturating_sub(1)
    } else {
        cursor.position
    }
}

/// Advance one envelope by a tick, honoring loops and sustain.
pub fn increment_position(song: &Song, chn: &mut ModChannel, kind: EnvelopeKind) {
    let Some(env) = envelope_of(song, chn, kind) else {
        return;
    };
    let it_style = song.behaviour.test(PlayBehaviour::IT_ENVELOPE_POSITION_HANDLING);
    let key_off = chn.flags.contains(ChannelFlags::KEY_OFF);
    let key_off_prev = chn.prev_flags.contains(ChannelFlags::KEY_OFF);
    let cursor = *cursor_mut(chn, kind);
    if !cursor.is_active(env) {
        return;
    }

    let mut position = cursor.position + u32::from(!it_style);
    let mut end_reached = false;

    if !it_style {
        if let (Some(ls), Some(le)) = (env.loop_start, env.loop_end) {
            let mut end = env.tick_of(le) as u32;
            if song.module_type != ModuleType::Xm {
                end += 1;
            }
            let escape = Some(le) == env.sustain_end && env.sustain_start.is_some() && key_off;
            if position == end && !escape {
                position = env.tick_of(ls) as u32;
            }
        }
        match (env.sustain_start, env.sustain_end) {
            (Some(ss), Some(se)) if !key_off => {
                if position == env.tick_of(se) as u32 + 1 {
                    position = env.tick_of(ss) as u32;
                }
            }
            _ => {
                if position > env.last_tick() as u32 {
                    position = env.last_tick() as u32;
                    end_reached = true;
                }
            }
        }
    } else {
        let (start, end) = match (env.sustain_start, env.sustain_end, env.loop_start, env.loop_end) {
            (Some(ss), Some(se), _, _) if !key_off_prev && cursor.release_value.is_none() => {
                (env.tick_of(ss) as u32, env.tick_of(se) as u32 + 1)
            }
            (_, _, Some(ls), Some(le)) => (env.tick_of(ls) as u32, env.tick_of(le) as u32 + 1),
            _ => {
                let last = env.last_tick() as u32;
                if position > last {
                    end_reached = true;
                }
                (last, last)
            }
        };
        if position >= end {
            position = start;
        }
    }

    if kind == EnvelopeKind::Volume && end_reached {
        let last_silent = env.nodes.last().map(|n| n.value == 0).unwrap_or(false);
        let it_family = song.module_type.is_it_family()
            || song.behaviour.test(PlayBehaviour::IT_ENVELOPE_END_FADES);
        if it_family || key_off {
            chn.flags.insert(ChannelFlags::NOTE_FADE);
        }
        if last_silent && (chn.master_channel > 0 || it_family) {
            chn.flags.insert(ChannelFlags::NOTE_FADE);
            chn.fadeout_volume = 0;
            chn.real_volume = 0;
            chn.calc_volume = 0;
        }
    }

    cursor_mut(chn, kind).position = position + u32::from(it_style);
}

/// Advance all three envelopes.
pub fn increment_positions(song: &Song, chn: &mut ModChannel) {
    increment_position(song, chn, EnvelopeKind::Volume);
    increment_position(song, chn, EnvelopeKind::Panning);
    increment_position(song, chn, EnvelopeKind::Pitch);
}

/// Scale a 14-bit volume by the volume envelope.
pub fn apply_volume_envelope(song: &Song, chn: &ModChannel, vol: i32) -> i32 {
    let Some(env) = envelope_of(song, chn, EnvelopeKind::Volume) else {
        return vol;
    };
    if !chn.volume_env.is_active(env) {
        return vol;
    }
    let pos = read_position(song, &chn.volume_env);
    let mut value = env.value_at(pos, 256);

    if let (Some(node), Some(at_jump)) = (env.release_node, chn.volume_env.release_value) {
        let at_node = env.nodes.get(node as usize).map(|n| n.value as i32 * 4).unwrap_or(0);
        if pos == env.tick_of(node) as u32 {
            value = at_node;
        }
        value = if song.behaviour.test(PlayBehaviour::LEGACY_RELEASE_NODE) {
            at_jump + (value - at_node) * 2
        } else if at_node > 0 {
            at_jump * value / at_node
        } else {
            0
        };
    }
    vol * value.clamp(0, 512) / 256
}

/// Panning after the panning envelope, 0..=256.
pub fn apply_panning_envelope(song: &Song, chn: &ModChannel, pan: i32) -> i32 {
    let Some(env) = envelope_of(song, chn, EnvelopeKind::Panning) else {
        return pan;
    };
    if !chn.pan_env.is_active(env) {
        return pan;
    }
    let value = env.value_at(read_position(song, &chn.pan_env), 64) - 32;
    let pan = if pan >= 128 {
        pan + value * (256 - pan) / 32
    } else {
        pan + value * pan / 32
    };
    pan.clamp(0, 256)
}

/// Result of the pitch/filter envelope for this tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PitchEnvelopeOutput {
    /// Envelope is off
    None,
    /// Period after the pitch envelope
    Period(u32),
    /// Filter cutoff (0..=127) after the filter envelope
    Cutoff(u8),
}

/// Run the pitch envelope, or the filter envelope when the instrument
/// uses it as one.
pub fn apply_pitch_envelope(song: &Song, chn: &ModChannel, period: u32) -> PitchEnvelopeOutput {
    let Some(env) = envelope_of(song, chn, EnvelopeKind::Pitch) else {
        return PitchEnvelopeOutput::None;
    };
    if !chn.pitch_env.is_active(env) {
        return PitchEnvelopeOutput::None;
    }
    let value = env.value_at(read_position(song, &chn.pitch_env), 512).clamp(0, 512) - 256;
    if env.filter {
        let cutoff = chn.cutoff as i32 * (value + 256) / 256;
        return PitchEnvelopeOutput::Cutoff(cutoff.clamp(0, 127) as u8);
    }
    let steps = value.unsigned_abs().min(255) as usize;
    // Positive values raise the pitch; periods fall as pitch rises.
    let raise = value > 0;
    let table = if raise == song.periods_are_frequencies() {
        &LINEAR_SLIDE_UP
    } else {
        &LINEAR_SLIDE_DOWN
    };
    let shifted = (period as u64 * table[steps] as u64 + 0x8000) >> 16;
    PitchEnvelopeOutput::Period(shifted.min(u32::MAX as u64) as u32)
}

/// Key-off handling for the release node: capture the current value and
/// jump to the node.
pub fn release(song: &Song, chn: &mut ModChannel) {
    let Some(env) = envelope_of(song, chn, EnvelopeKind::Volume) else {
        return;
    };
    let Some(node) = env.release_node else {
        return;
    };
    if chn.volume_env.release_value.is_some() {
        return;
    }
    let value = env.value_at(chn.volume_env.position, 256);
    let tick = env.tick_of(node) as u32;
    chn.volume_env.release_value = Some(value);
    chn.volume_env.position = tick;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtk_ir::Instrument;

    fn song_with_env(module_type: ModuleType, build: impl FnOnce(&mut Envelope)) -> Song {
        let mut song = Song::with_channels(module_type, 1);
        let mut ins = Instrument::new("env");
        build(&mut ins.volume_envelope);
        ins.volume_envelope.enabled = true;
        song.instruments.push(ins);
        song
    }

    fn voice() -> ModChannel {
        ModChannel {
            instrument: 1,
            ..ModChannel::default()
        }
    }

    #[test]
    fn ft2_envelope_stops_at_last_node() {
        let song = song_with_env(ModuleType::Xm, |e| {
            e.add_node(0, 64);
            e.add_node(4, 0);
        });
        let mut chn = voice();
        for _ in 0..10 {
            increment_positions(&song, &mut chn);
        }
        assert_eq!(chn.volume_env.position, 4);
        assert_eq!(apply_volume_envelope(&song, &chn, 16384), 0);
    }

    #[test]
    fn ft2_sustain_holds_until_key_off() {
        let song = song_with_env(ModuleType::Xm, |e| {
            e.add_node(0, 64);
            e.add_node(2, 32);
            e.add_node(6, 0);
            e.sustain_start = Some(1);
            e.sustain_end = Some(1);
        });
        let mut chn = voice();
        for _ in 0..8 {
            increment_positions(&song, &mut chn);
        }
        assert_eq!(chn.volume_env.position, 2);
        chn.flags.insert(ChannelFlags::KEY_OFF);
        increment_positions(&song, &mut chn);
        assert_eq!(chn.volume_env.position, 3);
    }

    #[test]
    fn it_envelope_loops() {
        let song = song_with_env(ModuleType::It, |e| {
            e.add_node(0, 0);
            e.add_node(2, 64);
            e.add_node(4, 0);
            e.loop_start = Some(1);
            e.loop_end = Some(2);
        });
        let mut chn = voice();
        let mut seen = alloc::vec::Vec::new();
        for _ in 0..8 {
            increment_positions(&song, &mut chn);
            seen.push(chn.volume_env.position - 1);
        }
        assert_eq!(seen, [0, 1, 2, 3, 4, 2, 3, 4]);
    }

    #[test]
    fn it_silent_end_kills_voice() {
        let song = song_with_env(ModuleType::It, |e| {
            e.add_node(0, 64);
            e.add_node(1, 0);
        });
        let mut chn = voice();
        for _ in 0..4 {
            increment_positions(&song, &mut chn);
        }
        assert!(chn.flags.contains(ChannelFlags::NOTE_FADE));
        assert_eq!(chn.fadeout_volume, 0);
    }

    #[test]
    fn release_node_scales_relative_to_capture() {
        let song = song_with_env(ModuleType::Xm, |e| {
            e.add_node(0, 32);
            e.add_node(10, 64);
            e.add_node(20, 32);
            e.release_node = Some(1);
            e.sustain_start = Some(0);
            e.sustain_end = Some(0);
        });
        let mut chn = voice();
        // Sustained at node 0, value 32/64 = 128 of 256.
        chn.volume_env.position = 0;
        release(&song, &mut chn);
        assert_eq!(chn.volume_env.release_value, Some(128));
        assert_eq!(chn.volume_env.position, 10);
        // At the release node: the captured value.
        assert_eq!(apply_volume_envelope(&song, &chn, 256), 128);
        // Halfway down the release: half of the captured value.
        chn.volume_env.position = 20;
        assert_eq!(apply_volume_envelope(&song, &chn, 256), 64);
    }

    #[test]
    fn s7x_override_disables_envelope() {
        let song = song_with_env(ModuleType::It, |e| {
            e.add_node(0, 0);
        });
        let mut chn = voice();
        chn.volume_env.enabled = Some(false);
        assert_eq!(apply_volume_envelope(&song, &chn, 1000), 1000);
    }

    #[test]
    fn pan_envelope_extremes() {
        let mut song = Song::with_channels(ModuleType::It, 1);
        let mut ins = Instrument::new("pan");
        ins.panning_envelope.add_node(0, 64);
        ins.panning_envelope.enabled = true;
        song.instruments.push(ins);
        let chn = voice();
        assert_eq!(apply_panning_envelope(&song, &chn, 128), 256);
        assert_eq!(apply_panning_envelope(&song, &chn, 0), 0);
    }
}
