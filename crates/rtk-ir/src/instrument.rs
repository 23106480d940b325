//! Instrument and envelope types.

use alloc::vec::Vec;
use arrayvec::ArrayString;

use crate::tempo::Tempo;
use crate::tuning::Tuning;

/// Number of notes an instrument maps.
pub const NOTE_MAP_SIZE: usize = 120;

/// Envelope node values range from 0 to this value. Panning and pitch
/// envelopes are centered at half of it.
pub const ENVELOPE_MAX: u8 = 64;

/// An instrument definition.
#[derive(Clone, Debug)]
pub struct Instrument {
    /// Instrument name
    pub name: ArrayString<32>,
    /// Sample mapping: note (0-119) -> 1-based sample index (0 = none)
    pub keyboard: [u16; NOTE_MAP_SIZE],
    /// Note translation: note (0-119) -> played note (1-120)
    pub note_map: [u8; NOTE_MAP_SIZE],
    /// Volume envelope
    pub volume_envelope: Envelope,
    /// Panning envelope
    pub panning_envelope: Envelope,
    /// Pitch envelope, or filter envelope when `filter` is set on it
    pub pitch_envelope: Envelope,
    /// Fadeout speed per tick, out of 65536 (0 = no fade)
    pub fadeout: u32,
    /// Instrument global volume (0-64)
    pub global_volume: u8,
    /// Default panning (0-256), `None` keeps the channel's panning
    pub default_pan: Option<u16>,
    /// What happens when a new note is played on a channel already playing this instrument
    pub new_note_action: NewNoteAction,
    /// Duplicate note checking mode
    pub duplicate_check: DuplicateCheck,
    /// What happens to a detected duplicate
    pub duplicate_action: DuplicateAction,
    /// Pitch/pan separation (-32 to +32)
    pub pitch_pan_separation: i8,
    /// Note around which pitch/pan separation is centered
    pub pitch_pan_center: u8,
    /// Random volume variation, percent (0-100)
    pub volume_swing: u8,
    /// Random panning variation (0-64)
    pub pan_swing: u8,
    /// Initial filter cutoff (0-127)
    pub cutoff: Option<u8>,
    /// Initial filter resonance (0-127)
    pub resonance: Option<u8>,
    /// MIDI channel (0 = none, 1-16, 17 = follow pattern channel)
    pub midi_channel: u8,
    /// MIDI program (0 = none, 1-128)
    pub midi_program: u8,
    /// MIDI bank (0 = none, 1-16384)
    pub midi_bank: u16,
    /// Instrument plugin slot (0 = none, 1-based)
    pub plugin: u8,
    /// Playback speed follows tempo relative to this value
    pub pitch_to_tempo_lock: Option<Tempo>,
    /// Custom tuning, replaces period math when set
    pub tuning: Option<Tuning>,
}

impl Default for Instrument {
    fn default() -> Self {
        let mut note_map = [0u8; NOTE_MAP_SIZE];
        for (i, n) in note_map.iter_mut().enumerate() {
            *n = i as u8 + 1;
        }
        Self {
            name: ArrayString::new(),
            keyboard: [0; NOTE_MAP_SIZE],
            note_map,
            volume_envelope: Envelope::default(),
            panning_envelope: Envelope::default(),
            pitch_envelope: Envelope::default(),
            fadeout: 0,
            global_volume: 64,
            default_pan: None,
            new_note_action: NewNoteAction::Cut,
            duplicate_check: DuplicateCheck::Off,
            duplicate_action: DuplicateAction::Cut,
            pitch_pan_separation: 0,
            pitch_pan_center: 61,
            volume_swing: 0,
            pan_swing: 0,
            cutoff: None,
            resonance: None,
            midi_channel: 0,
            midi_program: 0,
            midi_bank: 0,
            plugin: 0,
            pitch_to_tempo_lock: None,
            tuning: None,
        }
    }
}

impl Instrument {
    /// Create a new instrument with default settings.
    pub fn new(name: &str) -> Self {
        let mut inst = Self::default();
        let _ = inst.name.try_push_str(name);
        inst
    }

    /// Set all notes to map to a single sample.
    pub fn set_single_sample(&mut self, sample_index: u16) {
        self.keyboard.fill(sample_index);
    }

    /// Sample mapped to `note` (1-based note), 0 when unmapped.
    pub fn sample_for(&self, note: u8) -> u16 {
        note.checked_sub(1)
            .and_then(|n| self.keyboard.get(n as usize))
            .copied()
            .unwrap_or(0)
    }

    /// Translated note for `note` (1-based note), unchanged when out of range.
    pub fn translate_note(&self, note: u8) -> u8 {
        note.checked_sub(1)
            .and_then(|n| self.note_map.get(n as usize))
            .copied()
            .unwrap_or(note)
    }

    /// The instrument drives an external plugin or MIDI device.
    pub fn has_plugin(&self) -> bool {
        self.plugin != 0 || self.midi_channel != 0
    }
}

/// Action when a new note triggers on a channel already playing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NewNoteAction {
    /// Cut the previous note immediately
    #[default]
    Cut,
    /// Continue the previous note (background)
    Continue,
    /// Send note-off to previous note
    NoteOff,
    /// Fade out the previous note
    NoteFade,
}

/// Duplicate note checking mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DuplicateCheck {
    /// No duplicate checking
    #[default]
    Off,
    /// Check for duplicate notes
    Note,
    /// Check for duplicate samples
    Sample,
    /// Check for duplicate instruments
    Instrument,
    /// Check for duplicate plugins
    Plugin,
}

/// What to do with a background voice found to be a duplicate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DuplicateAction {
    #[default]
    Cut,
    NoteOff,
    NoteFade,
}

/// An envelope (volume, panning, or pitch).
#[derive(Clone, Debug, Default)]
pub struct Envelope {
    /// Envelope nodes, ticks ascending
    pub nodes: Vec<EnvelopeNode>,
    /// Sustain loop start node index (None = no sustain)
    pub sustain_start: Option<u8>,
    /// Sustain loop end node index
    pub sustain_end: Option<u8>,
    /// Regular loop start node index (None = no loop)
    pub loop_start: Option<u8>,
    /// Regular loop end node index
    pub loop_end: Option<u8>,
    /// Node whose value is captured at key-off and used to rescale the rest
    pub release_node: Option<u8>,
    /// Is the envelope enabled?
    pub enabled: bool,
    /// Keep the position when a new note is played
    pub carry: bool,
    /// Pitch envelope drives the filter instead
    pub filter: bool,
}

impl Envelope {
    /// Create a new empty envelope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node to the envelope.
    pub fn add_node(&mut self, tick: u16, value: u8) {
        self.nodes.push(EnvelopeNode {
            tick,
            value: value.min(ENVELOPE_MAX),
        });
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Is the envelope enabled and non-empty?
    pub fn is_active(&self) -> bool {
        self.enabled && !self.nodes.is_empty()
    }

    /// Tick of node `index`, clamped to the last node.
    pub fn tick_of(&self, index: u8) -> u16 {
        self.nodes
            .get(index as usize)
            .or_else(|| self.nodes.last())
            .map(|n| n.tick)
            .unwrap_or(0)
    }

    /// Tick of the last node.
    pub fn last_tick(&self) -> u16 {
        self.nodes.last().map(|n| n.tick).unwrap_or(0)
    }

    /// Interpolated value at `position`, scaled to `0..=range_out`.
    pub fn value_at(&self, position: u32, range_out: i32) -> i32 {
        const PRECISION: i64 = 1 << 16;
        if self.nodes.is_empty() {
            return 0;
        }
        let scale = |v: u8| v as i64 * PRECISION / ENVELOPE_MAX as i64;
        let position = position as i64;

        let mut pt = self.nodes.len() - 1;
        for (i, node) in self.nodes[..self.nodes.len() - 1].iter().enumerate() {
            if position <= node.tick as i64 {
                pt = i;
                break;
            }
        }

        let x2 = self.nodes[pt].tick as i64;
        let mut value;
        if position >= x2 {
            value = scale(self.nodes[pt].value);
        } else {
            let mut x1 = 0;
            value = 0;
            if pt > 0 {
                value = scale(self.nodes[pt - 1].value);
                x1 = self.nodes[pt - 1].tick as i64;
            }
            if x2 > x1 && position > x1 {
                value += (position - x1) * (scale(self.nodes[pt].value) - value) / (x2 - x1);
            }
        }
        let value = value.clamp(0, PRECISION);
        ((value * range_out as i64 + PRECISION / 2) / PRECISION) as i32
    }
}

/// A node in an envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EnvelopeNode {
    /// Tick position
    pub tick: u16,
    /// Value (0 to `ENVELOPE_MAX`)
    pub value: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> Envelope {
        let mut env = Envelope::new();
        env.add_node(0, 0);
        env.add_node(10, 64);
        env.add_node(20, 32);
        env.enabled = true;
        env
    }

    #[test]
    fn value_on_nodes() {
        let env = ramp();
        assert_eq!(env.value_at(0, 64), 0);
        assert_eq!(env.value_at(10, 64), 64);
        assert_eq!(env.value_at(20, 64), 32);
    }

    #[test]
    fn value_interpolates_between_nodes() {
        let env = ramp();
        assert_eq!(env.value_at(5, 64), 32);
        assert_eq!(env.value_at(15, 64), 48);
    }

    #[test]
    fn value_holds_after_last_node() {
        let env = ramp();
        assert_eq!(env.value_at(1000, 256), 128);
    }

    #[test]
    fn empty_envelope_is_zero() {
        assert_eq!(Envelope::new().value_at(3, 64), 0);
        assert!(!Envelope::new().is_active());
    }

    #[test]
    fn keyboard_lookup_is_one_based() {
        let mut inst = Instrument::new("lead");
        inst.set_single_sample(3);
        assert_eq!(inst.sample_for(1), 3);
        assert_eq!(inst.sample_for(0), 0);
        assert_eq!(inst.sample_for(200), 0);
        assert_eq!(inst.translate_note(61), 61);
    }
}
