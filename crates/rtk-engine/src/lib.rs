//! Playback engine for retracker.
//!
//! Plays a [`rtk_ir::Song`] tick by tick: navigates orders and rows,
//! runs the effect column, envelopes and new-note actions of every
//! channel, and hands the sounding voices to a [`Mixer`]. Instrument
//! plugins and OPL synthesis are reached through optional backends.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod backend;
mod channel;
mod effects;
mod engine;
mod envelope;
mod error;
mod frame;
pub mod frequency;
mod length;
pub mod midi_macro;
mod mixer;
mod navigation;
mod nna;
mod play_state;
mod render;
mod sequencer;
mod settings;
pub mod tables;
mod visited;

#[cfg(test)]
mod testing;

pub use backend::{InstrumentPlugin, OplBackend};
pub use channel::{AutoSlide, ChannelFlags, ModChannel, MAX_CHANNELS, POSITION_FRACBITS};
pub use engine::{Engine, SeekMode};
pub use envelope::{EnvelopeCursor, EnvelopeKind};
pub use error::{ConfigError, Result};
pub use frame::Frame;
pub use length::{GetLengthResult, GetLengthTarget};
pub use mixer::{advance, Mixer, SampleMixer, VOLUME_UNITY};
pub use play_state::{PlayFlags, PlayState, ROW_FINISHED, TEMPO_MAX, TEMPO_MIN};
pub use settings::{MixerSettings, MAX_END_FADE_MS, MAX_SAMPLE_RATE, MIN_SAMPLE_RATE};
pub use visited::RowVisitor;
