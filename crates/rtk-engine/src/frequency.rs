//! Note, period and frequency conversion.
//!
//! Internal periods are Amiga periods times four, so that fine slides can
//! move by a quarter of an Amiga period. Which table and formula applies
//! depends on the module type and the song's slide mode:
//!
//! - MOD/MTM: ProTracker period tables indexed by finetune.
//! - XM: FastTracker 2 linear periods or its interpolated Amiga table.
//! - S3M/IT: S3M periods scaled by the sample's middle-C frequency, or
//!   the same periods run through the linear slide tables.
//! - Hertz mode: the "period" is the playback frequency itself.

use rtk_ir::{ModuleType, PlayBehaviour, Song, SongFlags, NOTE_MAX, NOTE_MIN};

use crate::tables::{
    FREQ_S3M, LINEAR_SLIDE_UP, PROTRACKER_PERIODS, PROTRACKER_TUNED_PERIODS, XM_LINEAR_FREQ,
    XM_PERIODS,
};

/// Fractional bits of frequencies returned by [`freq_from_period`].
pub const FREQ_FRACBITS: u32 = 4;

/// Amiga PAL clock times four, matching the internal period scale.
const AMIGA_CLOCK_X4: u64 = 3_546_895 * 4;

/// Convert an XM finetune (-128..=127) to a ProTracker finetune row (0..=15).
pub fn xm_to_mod_finetune(fine_tune: i32) -> usize {
    ((fine_tune >> 4) & 0x0F) as usize
}

/// Period of `note` (1-based) for a sample with the given finetune and
/// middle-C frequency. Returns 0 for anything that is not a playable note.
pub fn period_from_note(song: &Song, note: u8, fine_tune: i32, c5_speed: u32) -> u32 {
    if !(NOTE_MIN..=NOTE_MAX).contains(&note) {
        return 0;
    }
    let idx = (note - NOTE_MIN) as u32;
    let (octave, semitone) = (idx / 12, (idx % 12) as usize);

    match song.module_type {
        ModuleType::Xm => xm_period(song, idx, fine_tune),
        t if t.uses_finetune_and_transpose() => {
            let ft = xm_to_mod_finetune(fine_tune);
            if ft != 0 || !(36..36 + PROTRACKER_PERIODS.len() as u32).contains(&idx) {
                ((PROTRACKER_TUNED_PERIODS[ft * 12 + semitone] as u32) << 5) >> octave
            } else {
                (PROTRACKER_PERIODS[(idx - 36) as usize] as u32) << 2
            }
        }
        _ => {
            let c5 = if c5_speed == 0 { 8363 } else { c5_speed };
            if song.periods_are_frequencies() {
                let freq = (c5 as u64 * ((LINEAR_SLIDE_UP[semitone * 16] as u64) << octave))
                    / (65536u64 << 5);
                freq.min(i32::MAX as u64) as u32
            } else if song.flags.contains(SongFlags::LINEAR_SLIDES) {
                ((FREQ_S3M[semitone] as u32) << 5) >> octave
            } else {
                let denom = (c5 as u64) << octave;
                ((8363u64 * ((FREQ_S3M[semitone] as u64) << 5)) / denom.max(1)) as u32
            }
        }
    }
}

fn xm_period(song: &Song, idx: u32, mut fine_tune: i32) -> u32 {
    let note = idx.max(12) - 12;
    if song.behaviour.test(PlayBehaviour::FT2_FINETUNE_PRECISION) {
        fine_tune &= !7;
    }
    if song.flags.contains(SongFlags::LINEAR_SLIDES) {
        let l = ((NOTE_MAX as i32 - note as i32) << 6) - fine_tune / 2;
        return l.max(1) as u32;
    }
    let rnote = ((note % 12) << 3) as i32;
    let roct = note / 12;
    let mut rfine = fine_tune / 16;
    let per1 = XM_PERIODS[(rnote + rfine + 8).clamp(0, 103) as usize] as u32;
    let mut finetune = fine_tune;
    if finetune < 0 {
        rfine -= 1;
        finetune = -finetune;
    } else {
        rfine += 1;
    }
    let per2 = XM_PERIODS[(rnote + rfine + 8).clamp(0, 103) as usize] as u32;
    let rfine = (finetune & 0x0F) as u32;
    ((per1 * (16 - rfine) + per2 * rfine) << 1) >> roct
}

/// Playback frequency in Hz with [`FREQ_FRACBITS`] fractional bits.
/// `period_frac` carries 1/256 period precision from fine linear slides.
pub fn freq_from_period(song: &Song, period: u32, c5_speed: u32, period_frac: i32) -> u32 {
    if period == 0 {
        return 0;
    }
    match song.module_type {
        ModuleType::Xm => {
            let mut period = period;
            if song.behaviour.test(PlayBehaviour::FT2_PERIODS) {
                period &= 0xFFFF;
            }
            if song.flags.contains(SongFlags::LINEAR_SLIDES) {
                let octave = if song.behaviour.test(PlayBehaviour::FT2_PERIODS) {
                    let div = (9216 + 767u32).saturating_sub(period) / 768;
                    (14u32.wrapping_sub(div)) & 0x1F
                } else {
                    period / 768 + 2
                };
                let freq = (XM_LINEAR_FREQ[(period % 768) as usize] as u64)
                    << (FREQ_FRACBITS + 2);
                (freq >> octave.min(63)) as u32
            } else {
                (((8363u64 * 1712) << FREQ_FRACBITS) / period.max(1) as u64) as u32
            }
        }
        t if t.uses_finetune_and_transpose() => {
            ((AMIGA_CLOCK_X4 << FREQ_FRACBITS) / period as u64) as u32
        }
        _ => {
            if song.periods_are_frequencies() {
                return period.min(u32::MAX >> FREQ_FRACBITS) << FREQ_FRACBITS;
            }
            let c5 = if c5_speed == 0 { 8363 } else { c5_speed } as u64;
            let denom = ((period as i64) << 8) + period_frac as i64;
            if denom <= 0 {
                return 0;
            }
            let base = if song.flags.contains(SongFlags::LINEAR_SLIDES) {
                c5
            } else {
                8363
            };
            ((base * ((1712u64 << 8) << FREQ_FRACBITS)) / denom as u64).min(u32::MAX as u64)
                as u32
        }
    }
}

/// Nearest note for `period`: the lowest note whose period is not above
/// it (or whose frequency is not below it in Hertz mode).
pub fn note_from_period(song: &Song, period: u32, fine_tune: i32, c5_speed: u32) -> u8 {
    if period == 0 {
        return 0;
    }
    let as_freq = song.periods_are_frequencies();
    let mut min_note = NOTE_MIN as i32;
    let mut count = (NOTE_MAX - NOTE_MIN) as i32 + 1;
    while count > 0 {
        let step = count / 2;
        let mid = min_note + step;
        let n = period_from_note(song, mid as u8, fine_tune, c5_speed);
        if n == 0 || (!as_freq && n > period) || (as_freq && n < period) {
            min_note = mid + 1;
            count -= step + 1;
        } else {
            count = step;
        }
    }
    min_note.clamp(NOTE_MIN as i32, NOTE_MAX as i32) as u8
}

/// Mixer increment (32.32 fixed point, source frames per output frame).
pub fn increment_from_freq(freq: u32, sample_rate: u32) -> u64 {
    if sample_rate == 0 {
        return 0;
    }
    ((freq as u64) << (32 - FREQ_FRACBITS)) / sample_rate as u64
}
