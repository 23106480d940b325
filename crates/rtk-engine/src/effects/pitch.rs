//! Portamento, vibrato and period arithmetic.
//!
//! Slide amounts are in quarter-period units, which are also 1/64
//! semitone steps under linear slides. Positive amounts raise the pitch.

use rtk_ir::{ModuleType, PlayBehaviour, Song, SongFlags};

use crate::channel::ChannelFlags;
use crate::frequency::period_from_note;
use crate::sequencer::Sequencer;
use crate::tables::{
    FINE_LINEAR_SLIDE_DOWN, FINE_LINEAR_SLIDE_UP, LINEAR_SLIDE_DOWN, LINEAR_SLIDE_UP,
};

/// Shift `period` by `steps` 1/64-semitone steps, positive = higher pitch.
/// Never returns 0 for a non-zero period, and always moves by at least
/// one unit.
pub(crate) fn linear_pitch_shift(song: &Song, period: u32, steps: i32) -> u32 {
    if steps == 0 || period == 0 {
        return period;
    }
    let grow = (steps > 0) == song.periods_are_frequencies();
    let n = steps.unsigned_abs() as usize;
    let (coarse, fine) = if grow {
        (&LINEAR_SLIDE_UP, &FINE_LINEAR_SLIDE_UP)
    } else {
        (&LINEAR_SLIDE_DOWN, &FINE_LINEAR_SLIDE_DOWN)
    };
    let mut value = period as u64;
    value = (value * coarse[(n / 4).min(255)] as u64 + 0x8000) >> 16;
    value = (value * fine[n % 4] as u64 + 0x8000) >> 16;
    let mut value = value.min(u32::MAX as u64) as u32;
    if value == period {
        value = if grow { period.saturating_add(1) } else { period - 1 };
    }
    value.max(1)
}

impl Sequencer<'_> {
    fn uses_linear_tables(&self) -> bool {
        let song = self.song;
        song.flags.contains(SongFlags::LINEAR_SLIDES) && song.module_type != ModuleType::Xm
    }

    /// Slides run on every tick but the first.
    pub(super) fn slide_tick(&self) -> bool {
        !self.state.is_first_tick()
            || (self.song.behaviour.test(PlayBehaviour::SLIDES_AT_SPEED_1) && self.state.speed == 1)
    }

    /// The tick that runs fine effects: the very first tick of the row,
    /// and the first tick of each repetition on formats that repeat it.
    pub(super) fn fine_tick(&self) -> bool {
        self.state.is_first_tick()
    }

    /// Move the pitch by `amount` (positive = up).
    pub(super) fn freq_slide(&mut self, nchn: usize, amount: i32) {
        let song = self.song;
        let linear = self.uses_linear_tables();
        let chn = &mut self.state.channels[nchn];
        if chn.period == 0 || amount == 0 {
            return;
        }
        if let Some(tuning) = song.instrument(chn.instrument).and_then(|i| i.tuning.as_ref()) {
            let per_note = tuning.fine_steps as i32 + 1;
            let steps = amount * per_note / 64;
            chn.tuning_steps += if steps == 0 { amount.signum() } else { steps };
            return;
        }
        let period = chn.period as i64;
        let new = if linear {
            linear_pitch_shift(song, chn.period, amount) as i64
        } else if song.periods_are_frequencies() {
            period + amount as i64
        } else {
            period - amount as i64
        };
        if new < 1 {
            chn.period = 1;
            if song.module_type == ModuleType::S3m {
                chn.fadeout_volume = 0;
                chn.flags.insert(ChannelFlags::NOTE_FADE | ChannelFlags::FAST_VOL_RAMP);
            }
        } else {
            chn.period = new.min(u32::MAX as i64) as u32;
        }
    }

    pub(super) fn porta_up(&mut self, nchn: usize, param: u8, vol_col: bool) {
        if let Some(param) = self.porta_memory(nchn, param, true, vol_col) {
            self.porta(nchn, param, 1, vol_col);
        }
    }

    pub(super) fn porta_down(&mut self, nchn: usize, param: u8, vol_col: bool) {
        if let Some(param) = self.porta_memory(nchn, param, false, vol_col) {
            self.porta(nchn, param, -1, vol_col);
        }
    }

    /// Resolve the parameter of `Exx`/`Fxx`, updating shared memories.
    fn porta_memory(&mut self, nchn: usize, param: u8, up: bool, vol_col: bool) -> Option<u8> {
        let song = self.song;
        let chn = &mut self.state.channels[nchn];
        if song.module_type == ModuleType::Mod && param == 0 {
            return None;
        }
        let separate = song.behaviour.test(PlayBehaviour::FT2_PORTA_UP_DOWN_MEMORY);
        if param == 0 {
            return Some(if up || !separate {
                chn.old_porta_up
            } else {
                chn.old_porta_down
            });
        }
        if up || !separate {
            chn.old_porta_up = param;
        }
        if !up || !separate {
            chn.old_porta_down = param;
        }
        if !vol_col
            && song.behaviour.test(PlayBehaviour::IT_PORTA_MEMORY_SHARE)
            && !song.flags.contains(SongFlags::IT_COMPAT_GXX)
        {
            chn.porta_speed = param as u32 * 4;
        }
        Some(param)
    }

    fn porta(&mut self, nchn: usize, param: u8, sign: i32, vol_col: bool) {
        let song = self.song;
        if song.module_type.has_fine_slide_encoding() && !vol_col {
            match param & 0xF0 {
                0xF0 => {
                    if self.fine_tick() {
                        self.freq_slide(nchn, sign * (param & 0x0F) as i32 * 4);
                    }
                    return;
                }
                0xE0 => {
                    if self.fine_tick() {
                        self.freq_slide(nchn, sign * (param & 0x0F) as i32);
                    }
                    return;
                }
                _ => {}
            }
        }
        if self.slide_tick() {
            self.freq_slide(nchn, sign * param as i32 * 4);
        }
    }

    /// `E1x`/`E2x`.
    pub(super) fn fine_porta(&mut self, nchn: usize, up: bool, param: u8) {
        let song = self.song;
        let chn = &mut self.state.channels[nchn];
        let mut param = param & 0x0F;
        if song.module_type == ModuleType::Xm {
            if param == 0 {
                param = if up { chn.old_fine_porta >> 4 } else { chn.old_fine_porta & 0x0F };
            } else if up {
                chn.old_fine_porta = (chn.old_fine_porta & 0x0F) | (param << 4);
            } else {
                chn.old_fine_porta = (chn.old_fine_porta & 0xF0) | param;
            }
        }
        if param != 0 && self.fine_tick() {
            let sign = if up { 1 } else { -1 };
            self.freq_slide(nchn, sign * param as i32 * 4);
        }
    }

    /// FT2 `X1x`/`X2x`.
    pub(super) fn extra_fine_porta(&mut self, nchn: usize, param: u8) {
        let chn = &mut self.state.channels[nchn];
        let mut amount = param & 0x0F;
        if amount == 0 {
            amount = chn.old_extra_fine_porta;
        } else {
            chn.old_extra_fine_porta = amount;
        }
        match param >> 4 {
            1 => self.freq_slide(nchn, amount as i32),
            2 => self.freq_slide(nchn, -(amount as i32)),
            _ => {}
        }
    }

    /// Slide toward the portamento target.
    pub(super) fn tone_portamento(&mut self, nchn: usize, param: u8) {
        let song = self.song;
        let linear = self.uses_linear_tables();
        let slide = self.slide_tick();
        let shared = song.behaviour.test(PlayBehaviour::IT_PORTA_MEMORY_SHARE)
            && !song.flags.contains(SongFlags::IT_COMPAT_GXX);
        let chn = &mut self.state.channels[nchn];

        let mut param = param;
        if shared {
            if param == 0 {
                param = chn.old_porta_up;
            } else {
                chn.old_porta_up = param;
                chn.old_porta_down = param;
            }
        }
        if param != 0 {
            chn.porta_speed = param as u32 * 4;
        }
        chn.flags.insert(ChannelFlags::PORTAMENTO);
        if !slide {
            return;
        }

        if let Some(tuning) = song.instrument(chn.instrument).and_then(|i| i.tuning.as_ref()) {
            let per_note = tuning.fine_steps as i32 + 1;
            let step = ((chn.porta_speed as i32) * per_note / 64).max(1);
            let diff = chn.tuning_porta_target - chn.tuning_steps;
            chn.tuning_steps += diff.clamp(-step, step);
            return;
        }

        if chn.period == 0 || chn.porta_target == 0 {
            return;
        }
        let (period, target) = (chn.period, chn.porta_target);
        let delta = if linear {
            let n = (chn.porta_speed / 4).min(255) as usize;
            let table = if period < target { &LINEAR_SLIDE_UP } else { &LINEAR_SLIDE_DOWN };
            let scaled = (period as u64 * table[n] as u64) >> 16;
            (scaled as i64 - period as i64).unsigned_abs().max(1) as u32
        } else {
            chn.porta_speed
        };
        chn.period = if period < target {
            period.saturating_add(delta).min(target)
        } else {
            period.saturating_sub(delta).max(target)
        };
        if chn.period == target && song.behaviour.test(PlayBehaviour::IT_PORTA_TARGET_REACHED) {
            chn.porta_target = 0;
        }
    }

    /// `Hxy` (`depth_scale` 4) and `Uxy` (`depth_scale` 1).
    pub(super) fn vibrato(&mut self, nchn: usize, param: u8, depth_scale: u8) {
        let chn = &mut self.state.channels[nchn];
        if param & 0x0F != 0 {
            chn.vibrato_depth = (param & 0x0F) * depth_scale;
        }
        if param >> 4 != 0 {
            chn.vibrato_speed = param >> 4;
        }
        chn.flags.insert(ChannelFlags::VIBRATO);
    }

    /// Recompute the period of the sounding note after a finetune change.
    pub(super) fn refresh_note_period(&mut self, nchn: usize) {
        let song = self.song;
        let chn = &mut self.state.channels[nchn];
        if chn.note == 0 {
            return;
        }
        let period = period_from_note(song, chn.note, chn.fine_tune, chn.c5_speed);
        if period != 0 {
            chn.period = period;
        }
    }
}
