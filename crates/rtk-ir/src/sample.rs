//! Sample data types.

use alloc::vec::Vec;
use arrayvec::ArrayString;
use bitflags::bitflags;

bitflags! {
    /// Loop and panning flags of a sample.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SampleFlags: u16 {
        /// Regular loop enabled
        const LOOP = 1 << 0;
        /// Regular loop is bidirectional
        const PINGPONG_LOOP = 1 << 1;
        /// Sustain loop enabled (left on key-off)
        const SUSTAIN_LOOP = 1 << 2;
        /// Sustain loop is bidirectional
        const PINGPONG_SUSTAIN = 1 << 3;
        /// `default_pan` overrides the channel panning
        const SET_PANNING = 1 << 4;
    }
}

/// A sample definition.
#[derive(Clone, Debug)]
pub struct Sample {
    /// Sample name
    pub name: ArrayString<32>,
    /// Audio data
    pub data: SampleData,
    pub flags: SampleFlags,
    /// Loop start position (in frames)
    pub loop_start: u32,
    /// Loop end position (in frames, exclusive)
    pub loop_end: u32,
    pub sustain_start: u32,
    pub sustain_end: u32,
    /// Default volume (0-256)
    pub default_volume: u16,
    /// Sample global volume (0-64)
    pub global_volume: u8,
    /// Default panning (0-256), used when `SET_PANNING` is set
    pub default_pan: u16,
    /// Frequency of middle C in Hz (typically 8363)
    pub c5_speed: u32,
    /// Transpose in semitones (MOD/XM)
    pub relative_tone: i8,
    /// Finetune in 1/128 semitones (MOD/XM)
    pub fine_tune: i8,
    /// Auto-vibrato settings
    pub vibrato: AutoVibrato,
    /// Cue points for `o`-style offsets
    pub cues: [u32; 9],
    /// FM patch registers; an OPL voice instead of PCM when set
    pub opl_patch: Option<[u8; 12]>,
}

impl Default for Sample {
    fn default() -> Self {
        Self {
            name: ArrayString::new(),
            data: SampleData::Mono8(Vec::new()),
            flags: SampleFlags::empty(),
            loop_start: 0,
            loop_end: 0,
            sustain_start: 0,
            sustain_end: 0,
            default_volume: 256,
            global_volume: 64,
            default_pan: 128,
            c5_speed: 8363,
            relative_tone: 0,
            fine_tune: 0,
            vibrato: AutoVibrato::default(),
            cues: [0; 9],
            opl_patch: None,
        }
    }
}

impl Sample {
    /// Create a new empty sample.
    pub fn new(name: &str) -> Self {
        let mut sample = Self::default();
        let _ = sample.name.try_push_str(name);
        sample
    }

    /// Get the length of the sample in frames.
    pub fn len(&self) -> u32 {
        self.data.len() as u32
    }

    /// Returns true if the sample has no data.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty() && self.opl_patch.is_none()
    }

    /// Returns true if the sample has a usable regular loop.
    pub fn has_loop(&self) -> bool {
        self.flags.contains(SampleFlags::LOOP) && self.loop_end > self.loop_start
    }

    /// Returns true if the sample has a usable sustain loop.
    pub fn has_sustain_loop(&self) -> bool {
        self.flags.contains(SampleFlags::SUSTAIN_LOOP) && self.sustain_end > self.sustain_start
    }

    pub fn is_opl(&self) -> bool {
        self.opl_patch.is_some()
    }

    /// Enable a loop over `start..end`, clamped to the data.
    pub fn set_loop(&mut self, start: u32, end: u32, pingpong: bool) {
        let len = self.len();
        self.loop_end = end.min(len);
        self.loop_start = start.min(self.loop_end);
        self.flags.insert(SampleFlags::LOOP);
        self.flags.set(SampleFlags::PINGPONG_LOOP, pingpong);
    }
}

/// Sample audio data.
#[derive(Clone, Debug)]
pub enum SampleData {
    /// 8-bit mono samples
    Mono8(Vec<i8>),
    /// 16-bit mono samples
    Mono16(Vec<i16>),
    /// 8-bit stereo samples (left, right)
    Stereo8(Vec<i8>, Vec<i8>),
    /// 16-bit stereo samples (left, right)
    Stereo16(Vec<i16>, Vec<i16>),
}

impl SampleData {
    /// Get the number of sample frames.
    pub fn len(&self) -> usize {
        match self {
            SampleData::Mono8(v) => v.len(),
            SampleData::Mono16(v) => v.len(),
            SampleData::Stereo8(l, r) => l.len().min(r.len()),
            SampleData::Stereo16(l, r) => l.len().min(r.len()),
        }
    }

    /// Returns true if empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_stereo(&self) -> bool {
        matches!(self, SampleData::Stereo8(..) | SampleData::Stereo16(..))
    }

    /// Left (or mono) value at `pos`, scaled to 16 bits. Zero past the end.
    pub fn left(&self, pos: usize) -> i16 {
        match self {
            SampleData::Mono8(v) | SampleData::Stereo8(v, _) => {
                v.get(pos).copied().unwrap_or(0) as i16 * 256
            }
            SampleData::Mono16(v) | SampleData::Stereo16(v, _) => v.get(pos).copied().unwrap_or(0),
        }
    }

    /// Right value at `pos` (left for mono), scaled to 16 bits.
    pub fn right(&self, pos: usize) -> i16 {
        match self {
            SampleData::Mono8(v) | SampleData::Stereo8(_, v) => {
                v.get(pos).copied().unwrap_or(0) as i16 * 256
            }
            SampleData::Mono16(v) | SampleData::Stereo16(_, v) => v.get(pos).copied().unwrap_or(0),
        }
    }
}

/// Auto-vibrato waveform.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AutoVibratoType {
    #[default]
    Sine,
    Square,
    RampUp,
    RampDown,
    Random,
}

/// Auto-vibrato settings for a sample.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AutoVibrato {
    pub kind: AutoVibratoType,
    /// Ticks (XM) or rate (IT) until full depth
    pub sweep: u8,
    /// Depth (0-64)
    pub depth: u8,
    /// Speed (0-64)
    pub rate: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eight_bit_is_scaled_to_sixteen() {
        let data = SampleData::Mono8(alloc::vec![0, 100, -50]);
        assert_eq!(data.left(1), 25600);
        assert_eq!(data.right(2), -12800);
        assert_eq!(data.left(9), 0);
    }

    #[test]
    fn stereo_len_is_shorter_channel() {
        let data = SampleData::Stereo16(alloc::vec![1, 2, 3], alloc::vec![1, 2]);
        assert_eq!(data.len(), 2);
        assert!(data.is_stereo());
    }

    #[test]
    fn set_loop_clamps_to_data() {
        let mut s = Sample::new("pad");
        s.data = SampleData::Mono16(alloc::vec![0; 100]);
        s.set_loop(90, 500, false);
        assert_eq!(s.loop_end, 100);
        assert!(s.has_loop());
        s.set_loop(120, 130, true);
        assert!(!s.has_loop());
    }
}
