//! Per-tick voice update.
//!
//! After the row and its effects ran, every sounding voice gets its final
//! volume, panning and playback increment for the tick. Oscillators
//! (vibrato, tremolo, panbrello, auto-vibrato) and envelopes are applied
//! here on top of the channel state, without modifying the base values
//! the effects slide.

use core::cmp::Reverse;

use rtk_ir::{AutoVibratoType, Effect, ModuleType, PlayBehaviour, Song, SongFlags, Tuning, NOTE_MAX};

use crate::channel::{ChannelFlags, ModChannel, MAX_CHANNELS};
use crate::effects::linear_pitch_shift;
use crate::envelope::{self, PitchEnvelopeOutput};
use crate::frequency::{freq_from_period, increment_from_freq, note_from_period, period_from_note, FREQ_FRACBITS};
use crate::mixer::VOLUME_UNITY;
use crate::sequencer::Sequencer;
use crate::tables::{IT_SINUS, MOD_RAMP_DOWN, MOD_RANDOM, MOD_SINUS, MOD_SQUARE};

/// Highest note ProTracker can play (B-3).
const PT_HIGHEST_NOTE: u8 = 84;

/// Oscillator value at `pos`. IT oscillators run over 256 steps with
/// amplitude 64, the others over 64 steps with amplitude 127. `random`
/// is used by the random waveform of IT oscillators.
fn oscillator(waveform: u8, pos: u8, it: bool, random: i32) -> i32 {
    let idx = if it { (pos >> 2) as usize } else { (pos & 0x3F) as usize };
    let value = match waveform & 3 {
        0 if it => return IT_SINUS[pos as usize] as i32,
        0 => MOD_SINUS[idx],
        1 => MOD_RAMP_DOWN[idx],
        2 => MOD_SQUARE[idx],
        _ if it => return random / 2,
        _ => MOD_RANDOM[idx],
    } as i32;
    if it {
        value / 2
    } else {
        value
    }
}

/// Next oscillator position after a tick at `speed`.
fn advance_oscillator(pos: u8, speed: u8, it: bool) -> u8 {
    if it {
        pos.wrapping_add(speed.wrapping_mul(4))
    } else {
        pos.wrapping_add(speed) & 0x3F
    }
}

/// Pitch moves multiplicatively through the slide tables rather than by
/// adding to the period.
fn uses_pitch_tables(song: &Song) -> bool {
    song.periods_are_frequencies()
        || (song.flags.contains(SongFlags::LINEAR_SLIDES) && song.module_type != ModuleType::Xm)
}

/// Frequencies are computed from `period` with a 1/256 fraction.
fn uses_period_frac(song: &Song) -> bool {
    !uses_pitch_tables(song)
        && song.module_type != ModuleType::Xm
        && !song.module_type.uses_finetune_and_transpose()
}

/// Move `period` by `delta` quarter-period units, positive = lower pitch.
fn offset_period(song: &Song, period: u32, delta: i32) -> u32 {
    if delta == 0 || period == 0 {
        return period;
    }
    if uses_pitch_tables(song) {
        linear_pitch_shift(song, period, -delta)
    } else {
        (period as i64 + delta as i64).clamp(1, u32::MAX as i64) as u32
    }
}

/// Auto-vibrato offset with 8 fractional bits. Returns the new period
/// and its fraction.
fn auto_vibrato_period(song: &Song, period: u32, fx: i32) -> (u32, i32) {
    if uses_period_frac(song) {
        let total = ((period as i64) << 8) + ((fx as i64) << 2);
        let total = total.max(1 << 8);
        return ((total >> 8) as u32, (total & 0xFF) as i32);
    }
    (offset_period(song, period, fx >> 6), 0)
}

/// Arpeggio step of this tick: 0 for the base note, else the nibble.
/// `tick_in_row` restarts with each repetition of a delayed row.
fn arpeggio_step(song: &Song, param: u8, tick_count: u32, tick_in_row: u32, speed: u32) -> u8 {
    let behaviour = song.behaviour;
    let pos = if behaviour.test(PlayBehaviour::FT2_ARPEGGIO) {
        let speed = speed.max(1);
        match tick_count % speed {
            0 => 0,
            t => (speed - t) % 3,
        }
    } else if behaviour.test(PlayBehaviour::IT_ARPEGGIO) {
        tick_in_row % 3
    } else {
        tick_count % 3
    };
    match pos {
        0 => 0,
        1 => param >> 4,
        _ => param & 0x0F,
    }
}

/// Frequency in Hz of `note` plus `steps` fine steps on a custom tuning.
fn tuned_frequency(tuning: &Tuning, c5_speed: u32, note: u8, steps: i32) -> f64 {
    let per_note = tuning.fine_steps as i32 + 1;
    let note = (note as i32 + steps.div_euclid(per_note)).clamp(1, NOTE_MAX as i32) as u8;
    let frac = steps.rem_euclid(per_note);
    let lo = tuning.ratio(note) as f64;
    let ratio = if frac == 0 || lo <= 0.0 {
        lo
    } else {
        let hi = tuning.ratio(note.saturating_add(1)) as f64;
        lo * libm::pow(hi / lo, frac as f64 / per_note as f64)
    };
    c5_speed as f64 * ratio
}

/// Per-tick pitch modulation collected before the frequency is computed.
#[derive(Clone, Copy, Debug, Default)]
struct PitchMods {
    arpeggio: u8,
    /// Vibrato in quarter-period units, positive = lower pitch
    vibrato: i32,
    /// Auto-vibrato, 1/64 quarter-period units
    auto_vibrato: i32,
}

impl Sequencer<'_> {
    /// Advance one tick and prepare every voice for mixing. Returns `false`
    /// when the song ended.
    pub(crate) fn read_note(&mut self) -> bool {
        if !self.process_row() {
            return false;
        }
        self.process_effects();
        let song = self.song;
        self.state.samples_per_tick = self.state.frames_per_tick(song, self.settings.sample_rate);
        if self.state.samples_per_tick == 0 {
            return false;
        }
        self.state.elapsed += self.state.tick_duration(song);
        if self.tracks_voices() {
            self.update_voices();
        }
        true
    }

    /// Compute volume, panning and increment of all voices for this tick.
    pub(crate) fn update_voices(&mut self) {
        let render = self.is_render();
        for nchn in 0..MAX_CHANNELS {
            let chn = &self.state.channels[nchn];
            if chn.length == 0 && chn.plugin_note == 0 {
                continue;
            }
            self.update_volume(nchn);
            self.update_pan(nchn);
            self.update_pitch(nchn);
            if render {
                self.update_gains(nchn);
                self.update_opl(nchn);
            }
            let song = self.song;
            let chn = &mut self.state.channels[nchn];
            envelope::increment_positions(song, chn);
            chn.prev_flags = chn.flags;
            self.retire_if_faded(nchn);
        }
        if render {
            self.collect_mix_channels();
        }
    }

    fn update_volume(&mut self, nchn: usize) {
        let song = self.song;
        let it_osc = song.behaviour.test(PlayBehaviour::IT_VIBRATO_TREMOLO_PANBRELLO);
        let advance = it_osc || !self.state.is_first_tick();
        let random = if self.state.channels[nchn].tremolo_waveform & 3 == 3 {
            self.state.random_i8()
        } else {
            0
        };
        let global_volume = self.state.global_volume.clamp(0, 256) as i64;
        let chn = &mut self.state.channels[nchn];

        let mut vol = chn.volume + chn.volume_swing;
        if chn.flags.contains(ChannelFlags::TREMOLO) {
            let value = oscillator(chn.tremolo_waveform, chn.tremolo_pos, it_osc, random);
            let shift = if it_osc { 5 } else { 6 };
            vol += (value * chn.tremolo_depth as i32) >> shift;
            if advance {
                chn.tremolo_pos = advance_oscillator(chn.tremolo_pos, chn.tremolo_speed, it_osc);
            }
        }
        if chn.flags.contains(ChannelFlags::TREMOR_OFF) {
            vol = 0;
        }
        let mut vol = vol.clamp(0, 256) << 6;
        vol = envelope::apply_volume_envelope(song, chn, vol);

        if chn.flags.contains(ChannelFlags::NOTE_FADE) {
            match song.instrument(chn.instrument) {
                Some(ins) if ins.fadeout != 0 => {
                    let step = (ins.fadeout.min(65536) as i32) << 1;
                    chn.fadeout_volume = (chn.fadeout_volume - step).max(0);
                }
                Some(_) => {}
                None => chn.fadeout_volume = 0,
            }
            vol = ((vol as i64 * chn.fadeout_volume as i64) >> 16) as i32;
        }
        chn.calc_volume = vol.clamp(0, VOLUME_UNITY);

        let real = chn.calc_volume as i64
            * chn.channel_volume.clamp(0, 64) as i64
            * chn.instrument_volume.clamp(0, 64) as i64
            * global_volume;
        chn.real_volume = (real >> 20) as i32;
    }

    fn update_pan(&mut self, nchn: usize) {
        let song = self.song;
        let it_osc = song.behaviour.test(PlayBehaviour::IT_VIBRATO_TREMOLO_PANBRELLO);
        let advance = it_osc || !self.state.is_first_tick();
        let hold = song.behaviour.test(PlayBehaviour::IT_PANBRELLO_HOLD);
        let (panbrello, needs_random) = {
            let chn = &self.state.channels[nchn];
            let active = matches!(chn.command, Effect::Panbrello(_));
            let reroll = chn.panbrello_waveform & 3 == 3
                && (chn.panbrello_pos == 0 || chn.panbrello_pos >= chn.panbrello_speed);
            (active, active && reroll)
        };
        if needs_random {
            let value = self.state.random_i8();
            let chn = &mut self.state.channels[nchn];
            chn.panbrello_random = value;
            chn.panbrello_pos = 0;
        }
        let chn = &mut self.state.channels[nchn];

        let mut pan = (chn.pan + chn.pan_swing).clamp(0, 256);
        pan = envelope::apply_panning_envelope(song, chn, pan);

        if panbrello {
            let value = if chn.panbrello_waveform & 3 == 3 {
                if it_osc {
                    chn.panbrello_random / 2
                } else {
                    chn.panbrello_random
                }
            } else {
                oscillator(chn.panbrello_waveform, chn.panbrello_pos, it_osc, 0)
            };
            chn.panbrello_offset = if it_osc {
                (value * chn.panbrello_depth as i32 + 2) >> 3
            } else {
                (value * chn.panbrello_depth as i32 + 4) >> 4
            };
            if advance {
                chn.panbrello_pos = if chn.panbrello_waveform & 3 == 3 {
                    chn.panbrello_pos.wrapping_add(1)
                } else {
                    advance_oscillator(chn.panbrello_pos, chn.panbrello_speed, it_osc)
                };
            }
        } else if !hold {
            chn.panbrello_offset = 0;
        }
        pan += chn.panbrello_offset;

        if let Some(ins) = song.instrument(chn.instrument) {
            if ins.pitch_pan_separation != 0 && chn.note != 0 {
                let distance = chn.note as i32 - ins.pitch_pan_center as i32 - 1;
                pan += distance * ins.pitch_pan_separation as i32 / 2;
            }
        }
        chn.real_pan = pan.clamp(0, 256);
    }

    fn update_pitch(&mut self, nchn: usize) {
        let song = self.song;
        let mods = self.pitch_mods(nchn);
        let tempo = self.state.tempo;
        let sample_rate = self.settings.sample_rate;
        let chn = &mut self.state.channels[nchn];
        let ins = song.instrument(chn.instrument);

        let mut freq = if let Some(tuning) = ins.and_then(|i| i.tuning.as_ref()) {
            let note = chn.note.saturating_add(mods.arpeggio);
            let mut hz = tuned_frequency(tuning, chn.c5_speed, note, chn.tuning_steps);
            let vibrato = -(mods.vibrato as f64) - mods.auto_vibrato as f64 / 64.0;
            hz *= libm::exp2(vibrato / 768.0);
            (hz * (1 << FREQ_FRACBITS) as f64).clamp(0.0, u32::MAX as f64) as u32
        } else {
            let mut period = chn.period;
            if period == 0 {
                chn.increment = 0;
                return;
            }
            if mods.arpeggio != 0 {
                period = if uses_pitch_tables(song) {
                    linear_pitch_shift(song, period, mods.arpeggio as i32 * 64)
                } else {
                    let mut note = chn.note.saturating_add(mods.arpeggio);
                    if song.behaviour.test(PlayBehaviour::PT_ARPEGGIO_WRAP) && note > PT_HIGHEST_NOTE {
                        note -= 36;
                    }
                    match period_from_note(song, note.min(NOTE_MAX), chn.fine_tune, chn.c5_speed) {
                        0 => period,
                        p => p,
                    }
                };
            }
            if chn.flags.contains(ChannelFlags::GLISSANDO | ChannelFlags::PORTAMENTO) {
                let note = note_from_period(song, period, chn.fine_tune, chn.c5_speed);
                let snapped = period_from_note(song, note, chn.fine_tune, chn.c5_speed);
                if snapped != 0 {
                    period = snapped;
                }
            }
            if song.flags.contains(SongFlags::AMIGA_LIMITS) {
                period = period.clamp(song.min_period, song.max_period.max(song.min_period));
            }
            match envelope::apply_pitch_envelope(song, chn, period) {
                PitchEnvelopeOutput::Period(p) => period = p.max(1),
                PitchEnvelopeOutput::Cutoff(c) => chn.filter_cutoff = c,
                PitchEnvelopeOutput::None => chn.filter_cutoff = chn.cutoff,
            }
            period = offset_period(song, period, mods.vibrato);
            let (period, frac) = auto_vibrato_period(song, period, mods.auto_vibrato);
            chn.period_frac = frac;
            freq_from_period(song, period, chn.c5_speed, frac)
        };

        if let Some(lock) = ins.and_then(|i| i.pitch_to_tempo_lock) {
            if lock.raw() != 0 {
                freq = ((freq as u64 * tempo.raw() as u64) / lock.raw() as u64).min(u32::MAX as u64) as u32;
            }
        }
        chn.increment = increment_from_freq(freq, sample_rate).min(i64::MAX as u64) as i64;
    }

    /// Arpeggio, vibrato and auto-vibrato of this tick. Advances the
    /// oscillators.
    fn pitch_mods(&mut self, nchn: usize) -> PitchMods {
        let song = self.song;
        let it_osc = song.behaviour.test(PlayBehaviour::IT_VIBRATO_TREMOLO_PANBRELLO);
        let advance = it_osc || !self.state.is_first_tick();
        let (tick_count, tick_in_row, speed) =
            (self.state.tick_count, self.state.tick_in_row(), self.state.speed);
        let needs_random = {
            let chn = &self.state.channels[nchn];
            (chn.flags.contains(ChannelFlags::VIBRATO) && chn.vibrato_waveform & 3 == 3)
                || song
                    .sample(chn.sample)
                    .map(|s| s.vibrato.kind == AutoVibratoType::Random)
                    .unwrap_or(false)
        };
        let random = if needs_random { self.state.random_i8() } else { 0 };
        let chn = &mut self.state.channels[nchn];
        let mut mods = PitchMods::default();

        if let Effect::Arpeggio(_) = chn.command {
            if chn.arpeggio != 0 {
                mods.arpeggio = arpeggio_step(song, chn.arpeggio, tick_count, tick_in_row, speed);
            }
        }

        if chn.flags.contains(ChannelFlags::VIBRATO) {
            let value = oscillator(chn.vibrato_waveform, chn.vibrato_pos, it_osc, random);
            let shift = if !it_osc {
                7
            } else if song.flags.contains(SongFlags::IT_OLD_EFFECTS) {
                5
            } else {
                6
            };
            mods.vibrato = (value * chn.vibrato_depth as i32) >> shift;
            if song.flags.contains(SongFlags::S3M_OLD_VIBRATO) {
                mods.vibrato *= 2;
            }
            if advance {
                chn.vibrato_pos = advance_oscillator(chn.vibrato_pos, chn.vibrato_speed, it_osc);
            }
        }

        let Some(vib) = song.sample(chn.sample).map(|s| s.vibrato) else {
            return mods;
        };
        if vib.depth == 0 || vib.rate == 0 {
            return mods;
        }
        let full = (vib.depth as i32) << 8;
        if song.module_type.is_it_family() {
            chn.auto_vibrato_depth += vib.sweep.max(1) as i32;
        } else if vib.sweep == 0 {
            chn.auto_vibrato_depth = full;
        } else {
            chn.auto_vibrato_depth += full / vib.sweep as i32;
        }
        chn.auto_vibrato_depth = chn.auto_vibrato_depth.min(full);
        let pos = chn.auto_vibrato_pos as u8;
        let value = match vib.kind {
            AutoVibratoType::Sine => IT_SINUS[pos as usize] as i32,
            AutoVibratoType::Square => {
                if pos < 128 {
                    64
                } else {
                    -64
                }
            }
            AutoVibratoType::RampUp => ((pos as i32 + 128) & 0xFF) / 2 - 64,
            AutoVibratoType::RampDown => 64 - ((pos as i32 + 128) & 0xFF) / 2,
            AutoVibratoType::Random => random / 2,
        };
        chn.auto_vibrato_pos = (chn.auto_vibrato_pos + vib.rate as u32) & 0xFF;
        mods.auto_vibrato = value * (chn.auto_vibrato_depth >> 8);
        mods
    }

    /// Target gains for the mixer and the ramp toward them.
    fn update_gains(&mut self, nchn: usize) {
        let settings = self.settings;
        let samples_per_tick = self.state.samples_per_tick;
        let chn = &mut self.state.channels[nchn];

        let separation = settings.stereo_separation as i32;
        let pan = (128 + (chn.real_pan - 128) * separation / 100).clamp(0, 256);
        let vol = chn.real_volume;
        let (mut left, mut right) = if chn.flags.contains(ChannelFlags::SURROUND) {
            (vol, -vol)
        } else {
            ((vol * (256 - pan)) >> 7, (vol * pan) >> 7)
        };
        if chn.flags.contains(ChannelFlags::MUTE) {
            left = 0;
            right = 0;
        }
        left = left.clamp(-2 * VOLUME_UNITY, 2 * VOLUME_UNITY);
        right = right.clamp(-2 * VOLUME_UNITY, 2 * VOLUME_UNITY);

        chn.new_left_vol = left;
        chn.new_right_vol = right;
        if left != chn.left_vol || right != chn.right_vol || chn.ramp_length != 0 {
            let rising = left.abs() > chn.left_vol.abs() || right.abs() > chn.right_vol.abs();
            let us = if rising || chn.flags.contains(ChannelFlags::FAST_VOL_RAMP) {
                settings.ramp_up_us
            } else {
                settings.ramp_down_us
            };
            chn.start_ramp(settings.ramp_frames(us).min(samples_per_tick.max(1)));
        }
        chn.flags.remove(ChannelFlags::FAST_VOL_RAMP);
    }

    /// Forward pitch, volume and panning of an OPL voice to the backend.
    fn update_opl(&mut self, nchn: usize) {
        let song = self.song;
        let (freq, key_on, retrigger, volume, pan) = {
            let chn = &self.state.channels[nchn];
            if !chn.flags.contains(ChannelFlags::ADLIB) {
                return;
            }
            let freq = freq_from_period(song, chn.period, chn.c5_speed, chn.period_frac);
            let retrigger = self.state.is_first_tick() && chn.row.note.is_note();
            (
                freq,
                !chn.flags.contains(ChannelFlags::KEY_OFF),
                retrigger,
                (chn.real_volume >> 8).clamp(0, 63) as u8,
                chn.real_pan,
            )
        };
        let Some(opl) = self.backends.opl.as_mut() else {
            return;
        };
        let milli_hertz = ((freq as u64 * 1000) >> FREQ_FRACBITS).min(u32::MAX as u64) as u32;
        opl.frequency(nchn as u16, milli_hertz, key_on, retrigger);
        opl.volume(nchn as u16, volume, false);
        opl.pan(nchn as u16, pan);
    }

    /// Stop a voice whose fade-out reached silence.
    fn retire_if_faded(&mut self, nchn: usize) {
        let faded = {
            let chn = &self.state.channels[nchn];
            chn.flags.contains(ChannelFlags::NOTE_FADE)
                && chn.fadeout_volume == 0
                && chn.left_vol == 0
                && chn.right_vol == 0
                && chn.ramp_length == 0
        };
        if !faded {
            return;
        }
        self.plugin_note_off(nchn);
        let adlib = self.state.channels[nchn].flags.contains(ChannelFlags::ADLIB);
        if adlib && self.is_render() {
            if let Some(opl) = self.backends.opl.as_mut() {
                opl.note_cut(nchn as u16);
            }
        }
        self.state.channels[nchn].stop();
    }

    /// Sample voices to mix this tick, the loudest kept when there are
    /// more than the mixer allows.
    fn collect_mix_channels(&mut self) {
        let max_voices = self.settings.max_voices.max(1);
        let state = &mut *self.state;
        state.mix_channels.clear();
        for (nchn, chn) in state.channels.iter().enumerate() {
            if chn.length != 0 && !chn.flags.contains(ChannelFlags::ADLIB) {
                state.mix_channels.push(nchn as u16);
            }
        }
        if state.mix_channels.len() > max_voices {
            let channels = &state.channels;
            state
                .mix_channels
                .sort_unstable_by_key(|&n| Reverse(channels[n as usize].real_volume));
            state.mix_channels.truncate(max_voices);
        }
    }
}

/// Voice is sounding for the purpose of the length calculator's sample
/// sync: a sample voice with data left.
pub(crate) fn is_sample_voice(chn: &ModChannel) -> bool {
    chn.length != 0 && !chn.flags.contains(ChannelFlags::ADLIB)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{make_song, Rig};
    use rtk_ir::{Cell, Instrument, Sample, SampleData};

    fn render_rig(module_type: ModuleType, cells: &[(u16, u16, Cell)]) -> Rig {
        Rig::new(make_song(module_type, 4, cells))
    }

    fn read(rig: &mut Rig) -> bool {
        rig.seq().read_note()
    }

    #[test]
    fn arpeggio_returns_to_base_every_third_tick() {
        for module_type in [ModuleType::Mod, ModuleType::S3m, ModuleType::It] {
            let cell = Cell::note(49, 1).with_effect(Effect::Arpeggio(0x37));
            let mut rig = render_rig(module_type, &[(0, 0, cell)]);
            let mut increments = alloc::vec::Vec::new();
            for _ in 0..6 {
                assert!(read(&mut rig));
                increments.push(rig.chn(0).increment);
            }
            assert_eq!(increments[0], increments[3], "{module_type:?}");
            assert!(increments[1] > increments[0], "{module_type:?}");
            assert!(increments[2] > increments[1], "{module_type:?}");
            assert_eq!(increments[1], increments[4], "{module_type:?}");
        }
    }

    #[test]
    fn ft2_arpeggio_counts_down_from_speed() {
        let xm = make_song(ModuleType::Xm, 1, &[]);
        // Speed 6: tick 0 is the base note, tick 1 plays the low nibble.
        assert_eq!(arpeggio_step(&xm, 0x37, 0, 0, 6), 0);
        assert_eq!(arpeggio_step(&xm, 0x37, 1, 1, 6), 7);
        let it = make_song(ModuleType::It, 1, &[]);
        assert_eq!(arpeggio_step(&it, 0x37, 1, 1, 6), 3);
        // A repeated row starts over on the base note.
        assert_eq!(arpeggio_step(&it, 0x37, 7, 0, 6), 0);
    }

    #[test]
    fn ft2_arpeggio_starts_on_base_note_at_any_speed() {
        let xm = make_song(ModuleType::Xm, 1, &[]);
        // Speed 5: the base note first, then the countdown 4, 3, 2, 1 mod 3.
        let steps: alloc::vec::Vec<u8> = (0..5).map(|t| arpeggio_step(&xm, 0x37, t, t, 5)).collect();
        assert_eq!(steps, [0, 3, 0, 7, 3]);
    }

    #[test]
    fn real_volume_stays_in_range() {
        let cell = Cell::note(49, 1).with_effect(Effect::Tremolo(0xFF));
        let mut rig = render_rig(ModuleType::Mod, &[(0, 0, cell)]);
        for _ in 0..12 {
            read(&mut rig);
            let chn = rig.chn(0);
            assert!((0..=VOLUME_UNITY).contains(&chn.calc_volume));
            assert!((0..=VOLUME_UNITY).contains(&chn.real_volume));
            assert!((0..=256).contains(&chn.real_pan));
        }
    }

    #[test]
    fn centre_pan_splits_evenly() {
        let mut rig = render_rig(ModuleType::It, &[(0, 0, Cell::note(61, 1))]);
        rig.state.channels[0].pan = 128;
        read(&mut rig);
        let chn = rig.chn(0);
        assert_eq!(chn.new_left_vol, chn.new_right_vol);
        assert!(chn.new_left_vol > 0);
        assert!(chn.flags.contains(ChannelFlags::VOLUME_RAMP));
    }

    #[test]
    fn surround_inverts_right_gain() {
        let mut rig = render_rig(ModuleType::It, &[(0, 0, Cell::note(61, 1))]);
        rig.state.channels[0].flags.insert(ChannelFlags::SURROUND);
        read(&mut rig);
        let chn = rig.chn(0);
        assert_eq!(chn.new_right_vol, -chn.new_left_vol);
    }

    #[test]
    fn muted_channel_keeps_playing_silently() {
        let mut rig = render_rig(ModuleType::It, &[(0, 0, Cell::note(61, 1))]);
        rig.state.channels[0].flags.insert(ChannelFlags::MUTE);
        read(&mut rig);
        let chn = rig.chn(0);
        assert_eq!((chn.new_left_vol, chn.new_right_vol), (0, 0));
        assert!(chn.increment > 0);
        assert!(rig.state.mix_channels.contains(&0));
    }

    #[test]
    fn voices_beyond_limit_drop_quietest() {
        let cells = [
            (0, 0, Cell::note(61, 1)),
            (0, 1, Cell::note(61, 1).with_effect(Effect::Volume(0x10))),
            (0, 2, Cell::note(61, 1).with_effect(Effect::Volume(0x20))),
        ];
        let mut rig = render_rig(ModuleType::S3m, &cells);
        rig.settings.max_voices = 2;
        read(&mut rig);
        assert_eq!(rig.state.mix_channels.len(), 2);
        assert!(!rig.state.mix_channels.contains(&1));
    }

    #[test]
    fn faded_voice_is_stopped() {
        let mut song = make_song(ModuleType::It, 1, &[(0, 0, Cell::note(61, 1))]);
        let mut ins = Instrument::new("fade");
        ins.set_single_sample(1);
        ins.fadeout = 32768;
        song.instruments.push(ins);
        let mut rig = Rig::new(song);
        read(&mut rig);
        rig.state.channels[0].flags.insert(ChannelFlags::NOTE_FADE);
        read(&mut rig);
        // Nothing was mixed yet, so the gains are already at zero.
        assert_eq!(rig.chn(0).fadeout_volume, 0);
        assert_eq!(rig.chn(0).length, 0);
    }

    #[test]
    fn pitch_to_tempo_lock_follows_tempo() {
        let mut song = make_song(ModuleType::It, 1, &[(0, 0, Cell::note(61, 1))]);
        let mut ins = Instrument::new("lock");
        ins.set_single_sample(1);
        ins.pitch_to_tempo_lock = Some(rtk_ir::Tempo::new(125, 0));
        song.instruments.push(ins);
        let mut rig = Rig::new(song);
        read(&mut rig);
        let base = rig.chn(0).increment;
        rig.state.tempo = rtk_ir::Tempo::new(250, 0);
        read(&mut rig);
        assert!((rig.chn(0).increment - base * 2).abs() <= 1);
    }

    #[test]
    fn tuned_instrument_ignores_periods() {
        let mut song = make_song(ModuleType::Mpt, 1, &[(0, 0, Cell::note(73, 1))]);
        let mut ins = Instrument::new("tuned");
        ins.set_single_sample(1);
        ins.tuning = Some(Tuning::equal_temperament(12, 61, 0));
        song.instruments.push(ins);
        let mut sample = Sample::new("c5");
        sample.data = SampleData::Mono16(alloc::vec![0; 4000]);
        sample.c5_speed = 22050;
        song.samples[0] = sample;
        let mut rig = Rig::new(song);
        rig.settings.sample_rate = 44100;
        read(&mut rig);
        // One octave above middle C at 22050 Hz plays at the output rate.
        let one = 1i64 << 32;
        assert!((rig.chn(0).increment - one).abs() < one / 1000);
    }

    #[test]
    fn oscillator_shapes() {
        assert_eq!(oscillator(0, 64, true, 0), 64);
        assert_eq!(oscillator(0, 16, false, 0), 127);
        assert_eq!(oscillator(2, 0, false, 0), 127);
        assert_eq!(oscillator(3, 0, true, -100), -50);
        assert_eq!(advance_oscillator(60, 8, false), 4);
        assert_eq!(advance_oscillator(250, 2, true), 2);
    }
}
