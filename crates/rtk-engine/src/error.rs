//! Error handling for engine configuration.

use thiserror::Error;

/// Convenient result alias for engine setup.
pub type Result<T> = core::result::Result<T, ConfigError>;

/// Rejected mixer settings.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Output sample rate outside the supported range.
    #[error("sample rate {rate} Hz is outside {min}..={max} Hz")]
    SampleRate {
        /// Requested rate.
        rate: u32,
        /// Lowest supported rate.
        min: u32,
        /// Highest supported rate.
        max: u32,
    },
    /// No voices could ever be mixed.
    #[error("max_voices must be between 1 and {max}, got {got}")]
    MaxVoices {
        /// Requested voice count.
        got: usize,
        /// Channel slot count.
        max: usize,
    },
    /// Stereo separation above 200%.
    #[error("stereo separation {0}% is above 200%")]
    StereoSeparation(u32),
    /// Master gain above 2000 (about 24 dB).
    #[error("preamp {0} is above 2000")]
    Preamp(u32),
    /// End-of-song fade longer than a minute.
    #[error("end fade of {0} ms is too long")]
    EndFade(u32),
    /// The song-length calculator needs at least one loop jump of budget.
    #[error("loop budget must be non-zero")]
    LoopBudget,
}
