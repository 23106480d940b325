//! Song structure: the root of the module data model.

use alloc::vec::Vec;
use core::fmt;

use arrayvec::ArrayString;
use bitflags::bitflags;

use crate::behaviour::PlayBehaviour;
use crate::instrument::Instrument;
use crate::midi_macro::MidiMacroConfig;
use crate::module_type::ModuleType;
use crate::order::{OrderEntry, OrderList};
use crate::pattern::{Cell, Pattern, EMPTY_CELL};
use crate::sample::Sample;
use crate::tempo::{Tempo, TempoMode};

/// Most pattern channels a song may have.
pub const MAX_PATTERN_CHANNELS: usize = 127;

bitflags! {
    /// Song-wide switches stored in the module header.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SongFlags: u32 {
        /// Pitch slides are logarithmic in frequency
        const LINEAR_SLIDES = 1 << 0;
        /// Volume slides also run on the first tick (ST3 fast slides)
        const FAST_VOL_SLIDES = 1 << 1;
        /// IT "old effects": vibrato on tick 0, offset clipping, doubled depth
        const IT_OLD_EFFECTS = 1 << 2;
        /// IT "compatible Gxx": tone portamento has its own memory
        const IT_COMPAT_GXX = 1 << 3;
        /// Periods are clamped to the Amiga range
        const AMIGA_LIMITS = 1 << 4;
        /// Strict ProTracker mode
        const PT_MODE = 1 << 5;
        /// Filter cutoff uses the extended range
        const EXT_FILTER_RANGE = 1 << 6;
        /// Vibrato and tremolo in S3M skip the first tick of each row
        const S3M_OLD_VIBRATO = 1 << 7;
    }
}

/// A complete song.
#[derive(Clone, Debug)]
pub struct Song {
    /// Song title
    pub title: ArrayString<32>,
    pub module_type: ModuleType,
    pub flags: SongFlags,
    /// Compatibility quirks, usually `PlayBehaviour::defaults_for(module_type)`
    pub behaviour: PlayBehaviour,
    /// Initial speed (ticks per row)
    pub initial_speed: u32,
    /// Initial tempo
    pub initial_tempo: Tempo,
    /// Initial global volume (0-256)
    pub initial_global_volume: u16,
    /// Sample pre-amplification (default 48)
    pub sample_preamp: u16,
    pub tempo_mode: TempoMode,
    /// Rows per beat (used by modern tempo mode)
    pub rows_per_beat: u32,
    pub rows_per_measure: u32,
    /// Smallest internal period allowed
    pub min_period: u32,
    /// Largest internal period allowed
    pub max_period: u32,
    /// Per-channel settings; its length is the pattern channel count
    pub channels: Vec<ChannelSettings>,
    pub patterns: Vec<Pattern>,
    /// Order lists, one per subsong
    pub sequences: Vec<OrderList>,
    /// Sequence being played
    pub current_sequence: usize,
    /// Instruments (index 0 is instrument 1)
    pub instruments: Vec<Instrument>,
    /// Samples (index 0 is sample 1)
    pub samples: Vec<Sample>,
    pub midi_macros: MidiMacroConfig,
}

static EMPTY_ORDER: OrderList = OrderList {
    name: ArrayString::new_const(),
    entries: Vec::new(),
    restart_pos: 0,
    default_speed: None,
    default_tempo: None,
};

impl Default for Song {
    fn default() -> Self {
        Self {
            title: ArrayString::new(),
            module_type: ModuleType::Mod,
            flags: SongFlags::empty(),
            behaviour: PlayBehaviour::defaults_for(ModuleType::Mod),
            initial_speed: 6,
            initial_tempo: Tempo::new(125, 0),
            initial_global_volume: 256,
            sample_preamp: 48,
            tempo_mode: TempoMode::Classic,
            rows_per_beat: 4,
            rows_per_measure: 16,
            min_period: 16,
            max_period: 32767,
            channels: Vec::new(),
            patterns: Vec::new(),
            sequences: Vec::new(),
            current_sequence: 0,
            instruments: Vec::new(),
            samples: Vec::new(),
            midi_macros: MidiMacroConfig::default(),
        }
    }
}

impl Song {
    /// Create a new empty song.
    pub fn new(title: &str) -> Self {
        let mut song = Self::default();
        let _ = song.title.try_push_str(title);
        song
    }

    /// Create a song of the given type with `num_channels` pattern channels
    /// and that type's default quirks.
    pub fn with_channels(module_type: ModuleType, num_channels: u16) -> Self {
        let mut song = Self {
            module_type,
            behaviour: PlayBehaviour::defaults_for(module_type),
            ..Self::default()
        };
        if matches!(module_type, ModuleType::It | ModuleType::Mpt) {
            song.flags |= SongFlags::LINEAR_SLIDES;
        }
        for i in 0..num_channels {
            let pan = match module_type {
                // Classic Amiga panning: L R R L pattern
                ModuleType::Mod => {
                    if i % 4 == 0 || i % 4 == 3 {
                        64
                    } else {
                        192
                    }
                }
                _ => 128,
            };
            song.channels.push(ChannelSettings {
                initial_pan: pan,
                ..ChannelSettings::default()
            });
        }
        song
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// The order list being played (empty if the song has none).
    pub fn order(&self) -> &OrderList {
        self.sequences.get(self.current_sequence).unwrap_or(&EMPTY_ORDER)
    }

    /// Pattern by index, `None` if it does not exist.
    pub fn pattern(&self, index: u16) -> Option<&Pattern> {
        self.patterns.get(index as usize)
    }

    /// Cell lookup that never fails: missing patterns yield the empty cell.
    pub fn cell(&self, pattern: u16, row: u16, channel: u16) -> &Cell {
        match self.pattern(pattern) {
            Some(p) => p.cell(row, channel),
            None => &EMPTY_CELL,
        }
    }

    /// Sample by 1-based index.
    pub fn sample(&self, index: u16) -> Option<&Sample> {
        index.checked_sub(1).and_then(|i| self.samples.get(i as usize))
    }

    /// Instrument by 1-based index.
    pub fn instrument(&self, index: u16) -> Option<&Instrument> {
        index.checked_sub(1).and_then(|i| self.instruments.get(i as usize))
    }

    /// Whether cells address instruments (true) or samples directly.
    pub fn uses_instruments(&self) -> bool {
        !self.instruments.is_empty()
    }

    /// Periods are Hertz values rather than Amiga-style periods.
    pub fn periods_are_frequencies(&self) -> bool {
        self.behaviour.test(PlayBehaviour::PERIODS_ARE_HERTZ)
    }

    /// Check the data model for inconsistencies playback will have to
    /// work around. Each issue is also logged.
    pub fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        if self.channels.is_empty() {
            issues.push(ValidationIssue::NoChannels);
        } else if self.channels.len() > MAX_PATTERN_CHANNELS {
            issues.push(ValidationIssue::TooManyChannels(self.channels.len()));
        }
        if self.sequences.get(self.current_sequence).is_none() {
            issues.push(ValidationIssue::MissingSequence(self.current_sequence));
        }
        for (seq_idx, seq) in self.sequences.iter().enumerate() {
            for (ord, entry) in seq.entries.iter().enumerate() {
                if let OrderEntry::Pattern(p) = *entry {
                    if self.pattern(p).is_none() {
                        issues.push(ValidationIssue::MissingPattern {
                            sequence: seq_idx,
                            order: ord as u16,
                            pattern: p,
                        });
                    }
                }
            }
            if seq.restart_pos as usize >= seq.entries.len() && seq.restart_pos != 0 {
                issues.push(ValidationIssue::RestartOutOfRange {
                    sequence: seq_idx,
                    restart: seq.restart_pos,
                });
            }
        }
        for (i, pat) in self.patterns.iter().enumerate() {
            if pat.channels() as usize != self.channels.len() {
                issues.push(ValidationIssue::PatternWidth {
                    pattern: i as u16,
                    channels: pat.channels(),
                });
            }
        }
        for (i, s) in self.samples.iter().enumerate() {
            if s.flags.contains(crate::sample::SampleFlags::LOOP) && s.loop_end > s.len() {
                issues.push(ValidationIssue::LoopOutOfRange { sample: i as u16 + 1 });
            }
        }
        for (i, inst) in self.instruments.iter().enumerate() {
            for env in [&inst.volume_envelope, &inst.panning_envelope, &inst.pitch_envelope] {
                if env.nodes.windows(2).any(|w| w[1].tick < w[0].tick) {
                    issues.push(ValidationIssue::UnsortedEnvelope {
                        instrument: i as u16 + 1,
                    });
                }
            }
        }
        for issue in &issues {
            log::warn!("{}: {}", self.title, issue);
        }
        issues
    }
}

/// Per-channel settings.
#[derive(Clone, Copy, Debug)]
pub struct ChannelSettings {
    /// Initial panning (0-256, 128 = center)
    pub initial_pan: u16,
    /// Initial channel volume (0-64)
    pub initial_volume: u8,
    pub muted: bool,
    pub surround: bool,
    /// Channel plugin (0 = none)
    pub plugin: u8,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            initial_pan: 128,
            initial_volume: 64,
            muted: false,
            surround: false,
            plugin: 0,
        }
    }
}

/// A problem found by [`Song::validate`]. None of these stop playback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValidationIssue {
    NoChannels,
    TooManyChannels(usize),
    MissingSequence(usize),
    MissingPattern { sequence: usize, order: u16, pattern: u16 },
    RestartOutOfRange { sequence: usize, restart: u16 },
    PatternWidth { pattern: u16, channels: u16 },
    LoopOutOfRange { sample: u16 },
    UnsortedEnvelope { instrument: u16 },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::NoChannels => write!(f, "song has no channels"),
            ValidationIssue::TooManyChannels(n) => {
                write!(f, "{n} channels, only {MAX_PATTERN_CHANNELS} are played")
            }
            ValidationIssue::MissingSequence(s) => write!(f, "sequence {s} does not exist"),
            ValidationIssue::MissingPattern { sequence, order, pattern } => write!(
                f,
                "sequence {sequence} order {order} references missing pattern {pattern}"
            ),
            ValidationIssue::RestartOutOfRange { sequence, restart } => {
                write!(f, "sequence {sequence} restart position {restart} is past the end")
            }
            ValidationIssue::PatternWidth { pattern, channels } => {
                write!(f, "pattern {pattern} has {channels} channels")
            }
            ValidationIssue::LoopOutOfRange { sample } => {
                write!(f, "sample {sample} loop extends past its data")
            }
            ValidationIssue::UnsortedEnvelope { instrument } => {
                write!(f, "instrument {instrument} has an envelope with unsorted nodes")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::SampleData;

    #[test]
    fn with_channels_uses_amiga_panning_for_mod() {
        let song = Song::with_channels(ModuleType::Mod, 4);
        let pans: Vec<u16> = song.channels.iter().map(|c| c.initial_pan).collect();
        assert_eq!(pans, [64, 192, 192, 64]);
    }

    #[test]
    fn one_based_lookups() {
        let mut song = Song::with_channels(ModuleType::S3m, 2);
        song.samples.push(Sample::new("kick"));
        assert!(song.sample(0).is_none());
        assert_eq!(song.sample(1).map(|s| s.name.as_str()), Some("kick"));
        assert!(song.instrument(1).is_none());
    }

    #[test]
    fn missing_pattern_cell_is_empty() {
        let song = Song::with_channels(ModuleType::Xm, 2);
        assert!(song.cell(9, 0, 0).is_empty());
        assert!(song.order().is_empty());
    }

    #[test]
    fn validate_reports_without_failing() {
        let mut song = Song::with_channels(ModuleType::It, 2);
        song.sequences.push(OrderList::new(&[0, 3]));
        song.patterns.push(Pattern::new(64, 2));
        let mut s = Sample::new("short");
        s.data = SampleData::Mono8(alloc::vec![0; 10]);
        s.flags |= crate::sample::SampleFlags::LOOP;
        s.loop_end = 20;
        song.samples.push(s);
        let issues = song.validate();
        assert!(issues.contains(&ValidationIssue::MissingPattern {
            sequence: 0,
            order: 1,
            pattern: 3
        }));
        assert!(issues.contains(&ValidationIssue::LoopOutOfRange { sample: 1 }));
    }
}
