//! Mixer and playback settings.

use crate::channel::MAX_CHANNELS;
use crate::error::{ConfigError, Result};

/// Lowest supported output rate.
pub const MIN_SAMPLE_RATE: u32 = 4000;
/// Highest supported output rate.
pub const MAX_SAMPLE_RATE: u32 = 192_000;
/// Longest end-of-song fade.
pub const MAX_END_FADE_MS: u32 = 60_000;
const MAX_PREAMP: u32 = 2000;

/// Settings the engine renders with. Changing them never changes the
/// song's timing, only how it sounds.
#[derive(Clone, Debug, PartialEq)]
pub struct MixerSettings {
    /// Output sample rate in Hz
    pub sample_rate: u32,
    /// Voices mixed per tick; quieter voices beyond this are skipped
    pub max_voices: usize,
    /// Fade applied when the song ends, in milliseconds
    pub end_fade_ms: u32,
    /// Volume ramp for rising volumes, in microseconds
    pub ramp_up_us: u32,
    /// Volume ramp for falling volumes, in microseconds
    pub ramp_down_us: u32,
    /// Stereo separation in percent (100 = unchanged, 0 = mono)
    pub stereo_separation: u32,
    /// Master gain, 128 = unity
    pub preamp: u32,
    /// Pattern loop jumps the song-length calculator may take before it
    /// reports the song as infinite
    pub loop_budget: u64,
}

impl Default for MixerSettings {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            max_voices: MAX_CHANNELS,
            end_fade_ms: 100,
            ramp_up_us: 363,
            ramp_down_us: 952,
            stereo_separation: 100,
            preamp: 128,
            loop_budget: 1 << 20,
        }
    }
}

impl MixerSettings {
    /// Settings at the given output rate, everything else default.
    pub fn with_sample_rate(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            ..Self::default()
        }
    }

    /// Reject settings the engine cannot render with.
    pub fn validate(&self) -> Result<()> {
        if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&self.sample_rate) {
            return Err(ConfigError::SampleRate {
                rate: self.sample_rate,
                min: MIN_SAMPLE_RATE,
                max: MAX_SAMPLE_RATE,
            });
        }
        if self.max_voices == 0 || self.max_voices > MAX_CHANNELS {
            return Err(ConfigError::MaxVoices {
                got: self.max_voices,
                max: MAX_CHANNELS,
            });
        }
        if self.stereo_separation > 200 {
            return Err(ConfigError::StereoSeparation(self.stereo_separation));
        }
        if self.preamp > MAX_PREAMP {
            return Err(ConfigError::Preamp(self.preamp));
        }
        if self.end_fade_ms > MAX_END_FADE_MS {
            return Err(ConfigError::EndFade(self.end_fade_ms));
        }
        if self.loop_budget == 0 {
            return Err(ConfigError::LoopBudget);
        }
        Ok(())
    }

    /// The nearest settings that pass [`validate`](Self::validate).
    pub fn clamped(mut self) -> Self {
        self.sample_rate = self.sample_rate.clamp(MIN_SAMPLE_RATE, MAX_SAMPLE_RATE);
        self.max_voices = self.max_voices.clamp(1, MAX_CHANNELS);
        self.stereo_separation = self.stereo_separation.min(200);
        self.preamp = self.preamp.min(MAX_PREAMP);
        self.end_fade_ms = self.end_fade_ms.min(MAX_END_FADE_MS);
        self.loop_budget = self.loop_budget.max(1);
        self
    }

    /// Frames in a ramp of `us` microseconds.
    pub(crate) fn ramp_frames(&self, us: u32) -> u32 {
        ((self.sample_rate as u64 * us as u64) / 1_000_000).max(1) as u32
    }

    /// Frames in the end-of-song fade.
    pub(crate) fn end_fade_frames(&self) -> u32 {
        ((self.sample_rate as u64 * self.end_fade_ms as u64) / 1000) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert_eq!(MixerSettings::default().validate(), Ok(()));
    }

    #[test]
    fn out_of_range_rate_rejected() {
        let err = MixerSettings::with_sample_rate(1000).validate().unwrap_err();
        assert!(matches!(err, ConfigError::SampleRate { rate: 1000, .. }));
    }

    #[test]
    fn zero_voices_rejected() {
        let settings = MixerSettings {
            max_voices: 0,
            ..MixerSettings::default()
        };
        assert!(matches!(settings.validate(), Err(ConfigError::MaxVoices { got: 0, .. })));
    }

    #[test]
    fn clamped_settings_validate() {
        let settings = MixerSettings {
            sample_rate: 0,
            max_voices: 10_000,
            stereo_separation: 500,
            loop_budget: 0,
            ..MixerSettings::default()
        }
        .clamped();
        assert_eq!(settings.validate(), Ok(()));
        assert_eq!(settings.sample_rate, MIN_SAMPLE_RATE);
        assert_eq!(settings.max_voices, MAX_CHANNELS);
    }

    #[test]
    fn ramp_lengths_scale_with_rate() {
        let settings = MixerSettings::with_sample_rate(48000);
        assert_eq!(settings.ramp_frames(1000), 48);
        assert_eq!(settings.end_fade_frames(), 4800);
        assert_eq!(settings.ramp_frames(0), 1);
    }
}
