//! Module data model for the retracker playback engine.
//!
//! This crate defines the in-memory representation of a tracker module:
//! patterns, cells, samples, instruments and order lists, plus the
//! per-format flag sets that select playback quirks. Format loaders
//! populate it, and the playback engine only ever reads it.
//!
//! Designed to be `no_std` compatible with the `alloc` crate.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod behaviour;
mod effects;
mod instrument;
mod midi_macro;
mod module_type;
mod order;
mod pattern;
mod sample;
pub mod song;
mod tempo;
mod tuning;

pub use behaviour::PlayBehaviour;
pub use effects::{Effect, VolumeCommand};
pub use instrument::{
    DuplicateAction, DuplicateCheck, Envelope, EnvelopeNode, Instrument,
    NewNoteAction, ENVELOPE_MAX, NOTE_MAP_SIZE,
};
pub use midi_macro::{MacroString, MidiMacroConfig, GlobalMacro};
pub use module_type::ModuleType;
pub use order::{OrderEntry, OrderList};
pub use pattern::{Cell, Note, Pattern, PcEvent, NOTE_MAX, NOTE_MIDDLE_C, NOTE_MIN};
pub use sample::{AutoVibrato, AutoVibratoType, Sample, SampleData, SampleFlags};
pub use song::{ChannelSettings, Song, SongFlags, ValidationIssue, MAX_PATTERN_CHANNELS};
pub use tempo::{Tempo, TempoMode};
pub use tuning::Tuning;
