//! Tracker module playback.
//!
//! The module data model lives in [`ir`], the player in [`engine`]. The
//! types most applications need are re-exported at the top level.
//!
//! ```no_run
//! use retracker::{Engine, Frame, Song};
//!
//! # fn load() -> Song { Song::new("demo") }
//! let mut engine = Engine::new(load(), 48000);
//! let mut buf = [Frame::silence(); 1024];
//! while engine.read(&mut buf) > 0 {
//!     // hand `buf` to the audio device
//! }
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

pub use rtk_engine as engine;
pub use rtk_ir as ir;

pub use rtk_engine::{
    ConfigError, Engine, Frame, GetLengthResult, GetLengthTarget, InstrumentPlugin, Mixer,
    MixerSettings, OplBackend, SeekMode,
};
pub use rtk_ir::{ModuleType, Song};
