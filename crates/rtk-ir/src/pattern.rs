//! Pattern, cell, and note types.

use alloc::vec;
use alloc::vec::Vec;

use crate::effects::{Effect, VolumeCommand};

/// Lowest playable note (C-0).
pub const NOTE_MIN: u8 = 1;
/// Highest playable note (B-9).
pub const NOTE_MAX: u8 = 120;
/// Middle C (C-5), the note a sample's base frequency refers to.
pub const NOTE_MIDDLE_C: u8 = 61;

/// Parameter control event carried by a pseudo-note.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PcEvent {
    /// Plugin parameter index
    pub param: u16,
    /// Value, 0-999 maps to 0.0-1.0
    pub value: u16,
    /// Interpolate across the row instead of jumping
    pub smooth: bool,
}

/// A note event in a pattern cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Note {
    #[default]
    None,
    /// Note on (`NOTE_MIN..=NOTE_MAX`)
    On(u8),
    /// Key off (release)
    Off,
    /// Note cut (immediate silence)
    Cut,
    /// Note fade (start instrument fadeout)
    Fade,
    /// Plugin parameter control, never reaches the note pipeline
    Pc(PcEvent),
}

impl Note {
    /// The note number if this is a valid playable note.
    pub fn value(&self) -> Option<u8> {
        match *self {
            Note::On(n) if (NOTE_MIN..=NOTE_MAX).contains(&n) => Some(n),
            _ => None,
        }
    }

    pub fn is_note(&self) -> bool {
        self.value().is_some()
    }

    /// Off, cut, and fade.
    pub fn is_special(&self) -> bool {
        matches!(self, Note::Off | Note::Cut | Note::Fade)
    }

    pub fn is_pc(&self) -> bool {
        matches!(self, Note::Pc(_))
    }
}

/// A single cell in a pattern (one channel, one row).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Cell {
    pub note: Note,
    /// Instrument number (0 = none, 1-based otherwise; plugin number for PC notes)
    pub instrument: u8,
    pub volume: VolumeCommand,
    pub effect: Effect,
}

/// Shared sentinel handed out for out-of-range lookups.
pub static EMPTY_CELL: Cell = Cell::empty();

impl Cell {
    /// Create an empty cell.
    pub const fn empty() -> Self {
        Self {
            note: Note::None,
            instrument: 0,
            volume: VolumeCommand::None,
            effect: Effect::None,
        }
    }

    /// Check if the cell is empty.
    pub fn is_empty(&self) -> bool {
        self.note == Note::None
            && self.instrument == 0
            && self.volume.is_none()
            && self.effect.is_none()
    }

    /// Convenience constructor used by loaders and tests.
    pub fn note(note: u8, instrument: u8) -> Self {
        Self {
            note: Note::On(note),
            instrument,
            ..Self::empty()
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effect = effect;
        self
    }

    pub fn with_volume(mut self, volume: VolumeCommand) -> Self {
        self.volume = volume;
        self
    }
}

/// A pattern: a grid of cells, `rows` x `channels`, stored row-major.
#[derive(Clone, Debug)]
pub struct Pattern {
    rows: u16,
    channels: u16,
    data: Vec<Cell>,
}

impl Pattern {
    /// Create a new empty pattern.
    pub fn new(rows: u16, channels: u16) -> Self {
        Self {
            rows,
            channels,
            data: vec![Cell::empty(); rows as usize * channels as usize],
        }
    }

    pub fn rows(&self) -> u16 {
        self.rows
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Cell at (row, channel). Out-of-range lookups yield the empty cell.
    pub fn cell(&self, row: u16, channel: u16) -> &Cell {
        if row >= self.rows || channel >= self.channels {
            return &EMPTY_CELL;
        }
        &self.data[row as usize * self.channels as usize + channel as usize]
    }

    /// Mutable cell at (row, channel), `None` when out of range.
    pub fn cell_mut(&mut self, row: u16, channel: u16) -> Option<&mut Cell> {
        if row >= self.rows || channel >= self.channels {
            return None;
        }
        let idx = row as usize * self.channels as usize + channel as usize;
        self.data.get_mut(idx)
    }

    /// Store a cell, ignoring out-of-range coordinates.
    pub fn set(&mut self, row: u16, channel: u16, cell: Cell) {
        if let Some(c) = self.cell_mut(row, channel) {
            *c = cell;
        }
    }

    /// All cells of a row (empty slice when out of range).
    pub fn row(&self, row: u16) -> &[Cell] {
        if row >= self.rows {
            return &[];
        }
        let start = row as usize * self.channels as usize;
        &self.data[start..start + self.channels as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_lookups_return_empty_cell() {
        let p = Pattern::new(4, 2);
        assert!(p.cell(4, 0).is_empty());
        assert!(p.cell(0, 2).is_empty());
        assert!(p.row(9).is_empty());
    }

    #[test]
    fn set_and_read_back() {
        let mut p = Pattern::new(8, 4);
        p.set(3, 2, Cell::note(49, 1).with_effect(Effect::Speed(3)));
        assert_eq!(p.cell(3, 2).note, Note::On(49));
        assert_eq!(p.row(3)[2].effect, Effect::Speed(3));
        // ignored, no panic
        p.set(8, 0, Cell::note(1, 1));
    }

    #[test]
    fn note_validity() {
        assert!(Note::On(NOTE_MIN).is_note());
        assert!(Note::On(NOTE_MAX).is_note());
        assert!(!Note::On(0).is_note());
        assert!(!Note::On(121).is_note());
        assert!(Note::Fade.is_special());
        assert!(!Note::Pc(PcEvent::default()).is_note());
    }
}
