//! Audio frame type.

/// A stereo audio frame (16-bit integer).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Frame {
    pub left: i16,
    pub right: i16,
}

impl Frame {
    /// Create a silent frame.
    pub const fn silence() -> Self {
        Self { left: 0, right: 0 }
    }

    /// Clamp a mix accumulator to 16 bits.
    pub fn from_accumulator(left: i32, right: i32) -> Self {
        Self {
            left: left.clamp(i16::MIN as i32, i16::MAX as i32) as i16,
            right: right.clamp(i16::MIN as i32, i16::MAX as i32) as i16,
        }
    }

    /// Mix another frame into this one, saturating.
    pub fn mix(&mut self, other: Frame) {
        *self = Self::from_accumulator(
            self.left as i32 + other.left as i32,
            self.right as i32 + other.right as i32,
        );
    }

    /// Scale by `gain / 2^16`.
    pub fn apply_gain(&mut self, gain: u32) {
        self.left = ((self.left as i64 * gain as i64) >> 16) as i16;
        self.right = ((self.right as i64 * gain as i64) >> 16) as i16;
    }

    pub fn is_silent(&self) -> bool {
        self.left == 0 && self.right == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mix_saturates() {
        let mut f = Frame { left: 30000, right: -30000 };
        f.mix(Frame { left: 10000, right: -10000 });
        assert_eq!(f, Frame { left: 32767, right: -32768 });
    }

    #[test]
    fn half_gain() {
        let mut f = Frame { left: 1000, right: -1000 };
        f.apply_gain(1 << 15);
        assert_eq!(f, Frame { left: 500, right: -500 });
    }
}
