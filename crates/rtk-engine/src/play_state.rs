//! Song position, timing and the channel array.
//!
//! Everything the sequencer mutates while playing lives here, so that
//! the song-length calculator can run on a clone without touching the
//! live playback.

use alloc::vec::Vec;

use bitflags::bitflags;
use rtk_ir::{OrderEntry, Song, Tempo, TempoMode};

use crate::channel::{ModChannel, MAX_CHANNELS};

/// Tick counter value meaning "the current row is finished".
pub const ROW_FINISHED: u32 = u32::MAX;

/// Lowest and highest tempo a song can reach through commands.
pub const TEMPO_MIN: Tempo = Tempo::new(32, 0);
pub const TEMPO_MAX: Tempo = Tempo::new(512, 0);

bitflags! {
    /// Sequencer state flags.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct PlayFlags: u16 {
        /// Processing the first tick of a row
        const FIRST_TICK = 1 << 0;
        /// A pattern break or jump moved the position this row
        const POSITION_CHANGED = 1 << 1;
        /// The song played to its end
        const END_REACHED = 1 << 2;
        /// Master fade-out in progress
        const FADING = 1 << 3;
        /// Next row comes from a pattern loop jump
        const PATTERN_LOOP = 1 << 4;
    }
}

/// Mutable playback state of a song.
#[derive(Clone, Debug)]
pub struct PlayState {
    pub order: u16,
    pub row: u16,
    /// Pattern of the current order
    pub pattern: u16,
    pub next_order: u16,
    pub next_row: u16,
    /// Row the next pattern starts at (FT2 `E60` quirk)
    pub next_pattern_start_row: u16,
    /// Ticks elapsed on the current row, or [`ROW_FINISHED`]
    pub tick_count: u32,
    /// Row repetitions from `EEx`/`SEx` (0 = none)
    pub pattern_delay: u32,
    /// Extra ticks from `S6x`
    pub frame_delay: u32,
    pub speed: u32,
    pub tempo: Tempo,
    /// Global volume, 0..=256
    pub global_volume: i32,
    pub samples_per_tick: u32,
    /// Frames left to render in the current tick
    pub buffer_count: u32,
    /// Playback time in seconds
    pub elapsed: f64,
    pub flags: PlayFlags,
    /// Times the song may still restart (-1 = forever)
    pub repeat_count: i32,
    rng: u32,
    /// Pattern channels followed by background voices
    pub channels: Vec<ModChannel>,
    /// Channels to mix this tick, loudest first when truncated
    pub mix_channels: Vec<u16>,
}

impl PlayState {
    /// State at the start of the song's current order list.
    pub fn new(song: &Song) -> Self {
        let mut channels = Vec::with_capacity(MAX_CHANNELS);
        for settings in song.channels.iter().take(MAX_CHANNELS) {
            channels.push(ModChannel::with_settings(
                settings.initial_pan,
                settings.initial_volume,
                settings.surround,
                settings.muted,
            ));
        }
        channels.resize_with(MAX_CHANNELS, ModChannel::default);

        let order = song.order();
        let mut state = Self {
            order: 0,
            row: 0,
            pattern: 0,
            next_order: 0,
            next_row: 0,
            next_pattern_start_row: 0,
            tick_count: ROW_FINISHED,
            pattern_delay: 0,
            frame_delay: 0,
            speed: order.default_speed.unwrap_or(song.initial_speed).max(1),
            tempo: order.default_tempo.unwrap_or(song.initial_tempo),
            global_volume: song.initial_global_volume.min(256) as i32,
            samples_per_tick: 0,
            buffer_count: 0,
            elapsed: 0.0,
            flags: PlayFlags::empty(),
            repeat_count: 0,
            rng: 0x1234_5678,
            channels,
            mix_channels: Vec::with_capacity(MAX_CHANNELS),
        };
        state.next_order = first_playable_order(song, 0).unwrap_or(0);
        state.order = state.next_order;
        state
    }

    /// Ticks the current row lasts, including row and tick delays.
    pub fn ticks_on_row(&self) -> u32 {
        (self.speed + self.frame_delay) * self.pattern_delay.max(1)
    }

    /// Is this the first tick of the row?
    #[inline]
    pub fn is_first_tick(&self) -> bool {
        self.flags.contains(PlayFlags::FIRST_TICK)
    }

    /// Tick within one repetition of a delayed row.
    pub fn tick_in_row(&self) -> u32 {
        self.tick_count % (self.speed + self.frame_delay).max(1)
    }

    /// Length of a tick in seconds for the current tempo.
    pub fn tick_duration(&self, song: &Song) -> f64 {
        let tempo = self.tempo.as_f64();
        if tempo <= 0.0 {
            return 0.0;
        }
        match song.tempo_mode {
            TempoMode::Classic => 2.5 / tempo,
            TempoMode::Alternative => 1.0 / tempo,
            TempoMode::Modern => {
                60.0 / (tempo * (self.speed.max(1) * song.rows_per_beat.max(1)) as f64)
            }
        }
    }

    /// Frames in a tick at `sample_rate`, 0 for a zero tempo.
    pub fn frames_per_tick(&self, song: &Song, sample_rate: u32) -> u32 {
        let raw = self.tempo.raw() as u64;
        if raw == 0 {
            return 0;
        }
        let rate = sample_rate as u64 * Tempo::FRACT as u64;
        let frames = match song.tempo_mode {
            TempoMode::Classic => rate * 5 / (raw * 2),
            TempoMode::Alternative => rate / raw,
            TempoMode::Modern => {
                rate * 60 / (raw * (self.speed.max(1) * song.rows_per_beat.max(1)) as u64)
            }
        };
        frames.min(u32::MAX as u64) as u32
    }

    /// Next value of the playback PRNG (xorshift), for swing and random
    /// waveforms. Seeded identically on every start so renders repeat.
    pub fn random(&mut self) -> u32 {
        let mut x = self.rng;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.rng = x;
        x
    }

    /// Random value in `-128..=127`.
    pub fn random_i8(&mut self) -> i32 {
        (self.random() >> 24) as u8 as i8 as i32
    }

    /// Pattern channels of the song, without background voices.
    pub fn pattern_channels(&self, song: &Song) -> usize {
        song.num_channels().min(MAX_CHANNELS)
    }
}

/// First order at or after `from` that holds a pattern, skipping `+++`
/// markers. `None` if a stop marker or the end comes first.
pub fn first_playable_order(song: &Song, from: u16) -> Option<u16> {
    let order = song.order();
    let mut ord = from;
    loop {
        match order.get(ord) {
            OrderEntry::Pattern(p) if song.pattern(p).is_some() => return Some(ord),
            OrderEntry::Pattern(_) | OrderEntry::Skip => ord = ord.checked_add(1)?,
            OrderEntry::Stop => return None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtk_ir::{ModuleType, OrderList, Pattern};

    fn song() -> Song {
        let mut song = Song::with_channels(ModuleType::Mod, 4);
        song.patterns.push(Pattern::new(64, 4));
        let mut order = OrderList::new(&[]);
        order.entries.push(OrderEntry::Skip);
        order.entries.push(OrderEntry::Pattern(0));
        song.sequences.push(order);
        song
    }

    #[test]
    fn starts_on_first_pattern_order() {
        let state = PlayState::new(&song());
        assert_eq!(state.next_order, 1);
        assert_eq!(state.speed, 6);
        assert_eq!(state.channels.len(), MAX_CHANNELS);
        assert_eq!(state.channels[1].pan, 192);
        assert_eq!(state.tick_count, ROW_FINISHED);
    }

    #[test]
    fn classic_tick_at_125_bpm() {
        let state = PlayState::new(&song());
        assert_eq!(state.frames_per_tick(&song(), 44100), 882);
        assert!((state.tick_duration(&song()) - 0.02).abs() < 1e-9);
    }

    #[test]
    fn modern_tempo_is_real_bpm() {
        let mut s = song();
        s.tempo_mode = TempoMode::Modern;
        let mut state = PlayState::new(&s);
        state.tempo = Tempo::new(120, 0);
        state.speed = 6;
        // 120 BPM, 4 rows per beat, 6 ticks per row: 1/48 s per tick.
        assert_eq!(state.frames_per_tick(&s, 48000), 1000);
    }

    #[test]
    fn delays_extend_row() {
        let mut state = PlayState::new(&song());
        state.speed = 6;
        state.frame_delay = 2;
        state.pattern_delay = 3;
        assert_eq!(state.ticks_on_row(), 24);
        state.tick_count = 9;
        assert_eq!(state.tick_in_row(), 1);
    }

    #[test]
    fn random_is_deterministic() {
        let mut a = PlayState::new(&song());
        let mut b = PlayState::new(&song());
        assert_eq!(a.random(), b.random());
        assert!((-128..=127).contains(&a.random_i8()));
    }

    #[test]
    fn stop_marker_ends_search() {
        let mut s = song();
        s.sequences[0].entries.insert(0, OrderEntry::Stop);
        assert_eq!(first_playable_order(&s, 0), None);
        assert_eq!(first_playable_order(&s, 1), Some(2));
    }
}
