//! MIDI macro expansion and dispatch (`Zxx`, `\xx`) and parameter
//! control notes.
//!
//! A macro string expands into at most [`MACRO_BUFFER`] bytes. Messages
//! starting with `F0 F0` or `F0 F1` address the engine itself (filter,
//! dry/wet, plugin parameters); everything else is split into MIDI
//! messages and sent to the channel's plugin.

use heapless::Vec;
use rtk_ir::{PcEvent, Song};

use crate::channel::{ChannelFlags, ModChannel};
use crate::sequencer::Sequencer;

/// Longest expanded macro.
pub const MACRO_BUFFER: usize = 64;

pub type MacroBytes = Vec<u8, MACRO_BUFFER>;

/// Values substituted for the placeholder letters of a macro.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MacroContext {
    /// `c`: MIDI channel, one nibble
    pub channel: u8,
    /// `n`
    pub note: u8,
    /// `v`: note velocity
    pub velocity: u8,
    /// `u`: volume after envelopes
    pub computed_volume: u8,
    /// `x`
    pub pan: u8,
    /// `y`: pan after envelopes
    pub computed_pan: u8,
    /// `a` / `b`
    pub bank_high: u8,
    pub bank_low: u8,
    /// `o`: high byte of the last sample offset
    pub offset: u8,
    /// `h`: pattern channel
    pub host_channel: u8,
    /// `m`: 1 while the sample plays backwards
    pub loop_direction: u8,
    /// `p`
    pub program: u8,
    /// `z`: the command parameter
    pub param: u8,
}

impl MacroContext {
    /// Placeholder values for `chn`, which plays on pattern channel `nchn`.
    pub fn for_channel(song: &Song, chn: &ModChannel, nchn: usize, param: u8) -> Self {
        let host = if chn.master_channel > 0 {
            chn.master_channel as usize - 1
        } else {
            nchn
        };
        let ins = song.instrument(chn.instrument);
        let midi_channel = ins.map(|i| i.midi_channel).unwrap_or(0);
        let channel = match midi_channel {
            1..=16 => midi_channel - 1,
            _ => host as u8 & 0x0F,
        };
        let bank = ins.map(|i| i.midi_bank.saturating_sub(1)).unwrap_or(0);
        let to7 = |v: i32| v.clamp(0, 127) as u8;
        Self {
            channel,
            note: chn.new_note.saturating_sub(1) & 0x7F,
            velocity: to7(chn.volume / 2),
            computed_volume: to7(((chn.calc_volume as i64 * 127) >> 14) as i32),
            pan: to7(chn.pan / 2),
            computed_pan: to7(chn.real_pan / 2),
            bank_high: ((bank >> 7) & 0x7F) as u8,
            bank_low: (bank & 0x7F) as u8,
            offset: ((chn.old_offset >> 8) & 0x7F) as u8,
            host_channel: host as u8 & 0x7F,
            loop_direction: u8::from(chn.flags.contains(ChannelFlags::PINGPONG_FLAG)),
            program: ins.map(|i| i.midi_program.saturating_sub(1) & 0x7F).unwrap_or(0),
            param: param & 0x7F,
        }
    }
}

/// Roland SysEx checksum over the bytes after the last `F0` and its
/// four header bytes.
fn sysex_checksum(bytes: &[u8]) -> u8 {
    let Some(start) = bytes.iter().rposition(|&b| b == 0xF0) else {
        return 0;
    };
    let sum = bytes
        .iter()
        .skip(start + 5)
        .fold(0u32, |acc, &b| acc.wrapping_add(b as u32));
    (0x80 - (sum & 0x7F) as u8) & 0x7F
}

/// Expand a macro string. Unknown characters are skipped; expansion
/// stops when the buffer is full.
pub fn expand_macro(text: &str, ctx: &MacroContext) -> MacroBytes {
    let mut out = MacroBytes::new();
    let mut pending: Option<u8> = None;
    for c in text.chars() {
        let nibble = match c {
            '0'..='9' | 'A'..='F' => c.to_digit(16).map(|d| d as u8),
            'c' => Some(ctx.channel & 0x0F),
            _ => None,
        };
        if let Some(n) = nibble {
            let full = match pending.take() {
                Some(high) => out.push((high << 4) | n),
                None => {
                    pending = Some(n);
                    Ok(())
                }
            };
            if full.is_err() {
                return out;
            }
            continue;
        }
        let byte = match c {
            'n' => ctx.note,
            'v' => ctx.velocity,
            'u' => ctx.computed_volume,
            'x' => ctx.pan,
            'y' => ctx.computed_pan,
            'a' => ctx.bank_high,
            'b' => ctx.bank_low,
            'o' => ctx.offset,
            'h' => ctx.host_channel,
            'm' => ctx.loop_direction,
            'p' => ctx.program,
            'z' => ctx.param,
            's' => sysex_checksum(&out),
            _ => continue,
        };
        if let Some(high) = pending.take() {
            if out.push(high).is_err() {
                return out;
            }
        }
        if out.push(byte).is_err() {
            return out;
        }
    }
    if let Some(high) = pending {
        let _ = out.push(high);
    }
    out
}

/// Length of a MIDI message starting with `status`.
fn message_len(status: u8) -> usize {
    match status & 0xF0 {
        0xC0 | 0xD0 => 2,
        0x80..=0xE0 => 3,
        _ => match status {
            0xF1 | 0xF3 => 2,
            0xF2 => 3,
            _ => 1,
        },
    }
}

/// Split expanded bytes into MIDI messages, honouring running status and
/// variable-length SysEx.
pub fn split_messages(bytes: &[u8], mut send: impl FnMut(&[u8])) {
    let mut status = 0u8;
    let mut pos = 0;
    while pos < bytes.len() {
        let b = bytes[pos];
        if b == 0xF0 {
            let end = bytes[pos..]
                .iter()
                .position(|&x| x == 0xF7)
                .map(|e| pos + e + 1)
                .unwrap_or(bytes.len());
            send(&bytes[pos..end]);
            pos = end;
            continue;
        }
        if b & 0x80 != 0 {
            status = b;
            let end = (pos + message_len(b)).min(bytes.len());
            send(&bytes[pos..end]);
            pos = end;
            continue;
        }
        if status == 0 || status >= 0xF0 {
            // Data byte without a status to run on.
            pos += 1;
            continue;
        }
        let data_len = message_len(status) - 1;
        let end = (pos + data_len).min(bytes.len());
        let mut msg: Vec<u8, 3> = Vec::new();
        let _ = msg.push(status);
        let _ = msg.extend_from_slice(&bytes[pos..end]);
        send(&msg);
        pos = end;
    }
}

/// Step `current` toward `target` so that it lands on the last tick of
/// the row.
fn smooth_step(current: f32, target: f32, ticks_left: u32) -> f32 {
    current + (target - current) / ticks_left.max(1) as f32
}

impl Sequencer<'_> {
    /// Ticks left in this row, the current one included.
    fn ticks_left_in_row(&self) -> u32 {
        let per_row = self.state.speed + self.state.frame_delay;
        per_row.saturating_sub(self.state.tick_in_row()).max(1)
    }

    /// `PC` / `PCs` pseudo note: set a plugin parameter. Smooth events
    /// glide over the row; plain ones apply on its first tick.
    pub(crate) fn parameter_control(&mut self, plugin: u8, event: PcEvent) {
        if !self.is_render() || plugin == 0 {
            return;
        }
        let row_start = self.state.is_first_tick() && self.state.tick_count == 0;
        if !event.smooth && !row_start {
            return;
        }
        let ticks_left = self.ticks_left_in_row();
        let Some(backend) = self.backends.plugin.as_mut() else {
            return;
        };
        let index = event.param as u32;
        let target = event.value.min(999) as f32 / 999.0;
        let value = if event.smooth {
            smooth_step(backend.parameter(plugin, index), target, ticks_left)
        } else {
            target
        };
        backend.set_parameter(plugin, index, value);
    }

    /// `Zxx` and, with `smooth`, `\xx`.
    pub(crate) fn midi_macro_command(&mut self, nchn: usize, param: u8, smooth: bool) {
        let song = self.song;
        let bytes = {
            let chn = &mut self.state.channels[nchn];
            let text = song.midi_macros.for_param(chn.active_macro, param);
            if param < 0x80 && text.contains('z') {
                chn.last_zxx_param = param;
            }
            let ctx = MacroContext::for_channel(song, chn, nchn, param);
            expand_macro(text, &ctx)
        };
        self.send_macro(nchn, &bytes, smooth);
    }

    fn send_macro(&mut self, nchn: usize, bytes: &[u8], smooth: bool) {
        if let [0xF0, bank @ (0xF0 | 0xF1), cmd, value, ..] = *bytes {
            self.internal_macro(nchn, bank == 0xF1, cmd, value & 0x7F, smooth);
            return;
        }
        if !self.is_render() {
            return;
        }
        let plugin = self.plugin_for(nchn);
        if let Some(backend) = self.backends.plugin.as_mut() {
            split_messages(bytes, |msg| backend.midi_send(plugin, nchn as u16, msg));
        }
    }

    /// Commands the engine handles itself.
    fn internal_macro(&mut self, nchn: usize, high_params: bool, cmd: u8, value: u8, smooth: bool) {
        let ticks_left = self.ticks_left_in_row();
        match (high_params, cmd) {
            (false, 0x00) | (false, 0x01) => {
                let chn = &mut self.state.channels[nchn];
                let current = if cmd == 0 { chn.cutoff } else { chn.resonance };
                let next = if smooth {
                    smooth_step(current as f32, value as f32, ticks_left) as u8
                } else {
                    value
                };
                if cmd == 0 {
                    chn.cutoff = next;
                } else {
                    chn.resonance = next;
                }
                chn.flags.insert(ChannelFlags::FILTER);
            }
            (false, 0x02) => {
                let chn = &mut self.state.channels[nchn];
                match value >> 4 {
                    0 => chn.flags.remove(ChannelFlags::HIGHPASS),
                    8 => chn.flags.insert(ChannelFlags::HIGHPASS),
                    _ => {}
                }
            }
            (false, 0x03) => {
                if !self.is_render() {
                    return;
                }
                let plugin = self.plugin_for(nchn);
                if plugin == 0 {
                    return;
                }
                if let Some(backend) = self.backends.plugin.as_mut() {
                    let target = 1.0 - value as f32 / 127.0;
                    let ratio = if smooth {
                        smooth_step(backend.dry_ratio(plugin), target, ticks_left)
                    } else {
                        target
                    };
                    backend.set_dry_ratio(plugin, ratio);
                }
            }
            (_, 0x80..=0xFF) => {
                if !self.is_render() {
                    return;
                }
                let plugin = self.plugin_for(nchn);
                if plugin == 0 {
                    return;
                }
                let index = (cmd - 0x80) as u32 + if high_params { 128 } else { 0 };
                if let Some(backend) = self.backends.plugin.as_mut() {
                    let target = value as f32 / 127.0;
                    let v = if smooth {
                        smooth_step(backend.parameter(plugin, index), target, ticks_left)
                    } else {
                        target
                    };
                    backend.set_parameter(plugin, index, v);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec as StdVec;

    fn ctx() -> MacroContext {
        MacroContext {
            channel: 3,
            note: 60,
            velocity: 100,
            param: 0x40,
            ..MacroContext::default()
        }
    }

    #[test]
    fn nibbles_and_placeholders() {
        let out = expand_macro("9c n v", &ctx());
        assert_eq!(out.as_slice(), &[0x93, 60, 100]);
    }

    #[test]
    fn lowercase_letters_are_placeholders() {
        let ctx = MacroContext {
            bank_high: 0x12,
            bank_low: 0x34,
            ..ctx()
        };
        let out = expand_macro("Bc a b", &ctx);
        assert_eq!(out.as_slice(), &[0xB3, 0x12, 0x34]);
    }

    #[test]
    fn default_cutoff_macro_is_internal() {
        let out = expand_macro("F0F000z", &ctx());
        assert_eq!(out.as_slice(), &[0xF0, 0xF0, 0x00, 0x40]);
    }

    #[test]
    fn lone_nibble_before_byte_is_flushed() {
        let out = expand_macro("Bz", &ctx());
        assert_eq!(out.as_slice(), &[0x0B, 0x40]);
    }

    #[test]
    fn checksum_covers_bytes_after_header() {
        // F0 41 10 42 12 | 40 00 7F 00 | checksum
        let out = expand_macro("F0411042124000 7F00 s F7", &ctx());
        assert_eq!(out[out.len() - 2], 0x41);
        assert_eq!(out[out.len() - 1], 0xF7);
    }

    #[test]
    fn overlong_macro_is_truncated() {
        let mut text = alloc::string::String::new();
        for _ in 0..100 {
            text.push_str("7F");
        }
        assert_eq!(expand_macro(&text, &ctx()).len(), MACRO_BUFFER);
    }

    #[test]
    fn running_status_is_expanded() {
        let mut seen: StdVec<StdVec<u8>> = StdVec::new();
        split_messages(&[0x90, 60, 100, 62, 90, 0xC1, 5], |m| seen.push(m.to_vec()));
        assert_eq!(seen, [
            alloc::vec![0x90, 60, 100],
            alloc::vec![0x90, 62, 90],
            alloc::vec![0xC1, 5],
        ]);
    }

    #[test]
    fn sysex_is_sent_whole() {
        let mut seen: StdVec<StdVec<u8>> = StdVec::new();
        split_messages(&[0xF0, 1, 2, 3, 0xF7, 0xB0, 7, 64], |m| seen.push(m.to_vec()));
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], [0xF0, 1, 2, 3, 0xF7]);
        assert_eq!(seen[1], [0xB0, 7, 64]);
    }

    #[test]
    fn smoothing_lands_on_last_tick() {
        let mut v = 0.0;
        for left in (1..=4).rev() {
            v = smooth_step(v, 1.0, left);
        }
        assert!((v - 1.0).abs() < 1e-6);
    }
}
