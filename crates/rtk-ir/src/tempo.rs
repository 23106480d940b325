//! Fixed-point tempo and the tempo modes that map it to tick length.

/// Tempo in BPM with four decimal digits of fraction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tempo(u32);

impl Tempo {
    /// Fractional units per whole BPM.
    pub const FRACT: u32 = 10_000;

    /// Build a tempo from an integer part and a fractional part in 1/10000 BPM.
    pub const fn new(bpm: u32, fract: u32) -> Self {
        Self(bpm * Self::FRACT + fract % Self::FRACT)
    }

    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Whole BPM, fraction truncated.
    pub const fn bpm(self) -> u32 {
        self.0 / Self::FRACT
    }

    pub fn as_f64(self) -> f64 {
        self.0 as f64 / Self::FRACT as f64
    }

    pub fn saturating_add(self, other: Tempo) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    pub fn saturating_sub(self, other: Tempo) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    pub fn clamp(self, min: Tempo, max: Tempo) -> Self {
        Self(self.0.clamp(min.0, max.0))
    }
}

/// How tempo and speed translate into the length of a tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TempoMode {
    /// `tick = 2.5 / tempo` seconds (Amiga CIA timing).
    #[default]
    Classic,
    /// `tick = 1 / tempo` seconds.
    Alternative,
    /// Tempo is real BPM: `tick = 60 / (tempo * speed * rows_per_beat)` seconds.
    Modern,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_and_fraction() {
        let t = Tempo::new(125, 5000);
        assert_eq!(t.bpm(), 125);
        assert_eq!(t.raw(), 1_255_000);
        assert!((t.as_f64() - 125.5).abs() < 1e-9);
    }

    #[test]
    fn saturating_sub_floors_at_zero() {
        let t = Tempo::new(1, 0).saturating_sub(Tempo::new(5, 0));
        assert_eq!(t.raw(), 0);
    }
}
