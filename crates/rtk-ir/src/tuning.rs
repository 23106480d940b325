//! Custom tunings: explicit frequency ratios per note.

use alloc::vec::Vec;
use arrayvec::ArrayString;

/// A tuning table. Notes on an instrument with a tuning ignore periods;
/// pitch is `c5_speed * ratio(note)`, refined by fine steps between notes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Tuning {
    pub name: ArrayString<32>,
    /// Frequency ratio relative to middle C, indexed by note - 1
    pub ratios: Vec<f32>,
    /// Fine steps between two adjacent notes (0 = none)
    pub fine_steps: u16,
}

impl Tuning {
    /// Equal temperament with `notes_per_octave` steps per doubling.
    pub fn equal_temperament(notes_per_octave: u16, middle_c: u8, fine_steps: u16) -> Self {
        let n = notes_per_octave.max(1) as f64;
        let ratios = (1..=120u16)
            .map(|note| libm::exp2((note as f64 - middle_c as f64) / n) as f32)
            .collect();
        Self {
            name: ArrayString::new(),
            ratios,
            fine_steps,
        }
    }

    /// Ratio of `note` (1-based). Notes outside the table extend the nearest end.
    pub fn ratio(&self, note: u8) -> f32 {
        match self.ratios.len() {
            0 => 1.0,
            len => self.ratios[(note.max(1) as usize - 1).min(len - 1)],
        }
    }
}
