//! Output backends the engine drives besides its own sample mixer.
//!
//! Both are optional. Without a plugin backend, plugin instruments are
//! silent and macros that target plugins are dropped. Without an OPL
//! backend, OPL samples are silent.

/// Instrument plugins and external MIDI devices.
///
/// `plugin` is the 1-based plugin slot, `channel` the 0-based pattern
/// channel the event originates from.
pub trait InstrumentPlugin {
    fn note_on(&mut self, plugin: u8, channel: u16, note: u8, velocity: u8);
    fn note_off(&mut self, plugin: u8, channel: u16, note: u8);
    /// A complete MIDI message: one short message or one SysEx block.
    fn midi_send(&mut self, plugin: u8, channel: u16, message: &[u8]);
    /// Set parameter `index` to a normalized value in `0.0..=1.0`.
    fn set_parameter(&mut self, plugin: u8, index: u32, value: f32);
    /// Current value of parameter `index`, for interpolated changes.
    fn parameter(&self, plugin: u8, index: u32) -> f32;
    /// Dry/wet balance, 1.0 = fully dry.
    fn set_dry_ratio(&mut self, plugin: u8, ratio: f32);
    fn dry_ratio(&self, plugin: u8) -> f32;
}

/// An FM synthesizer for OPL (AdLib) samples. `channel` is the engine's
/// channel slot, background voices included.
pub trait OplBackend {
    /// Load the 12 operator registers of a patch.
    fn set_patch(&mut self, channel: u16, patch: &[u8; 12]);
    /// Set the frequency; `key_on` starts or holds the note, `retrigger`
    /// restarts its envelope.
    fn frequency(&mut self, channel: u16, milli_hertz: u32, key_on: bool, retrigger: bool);
    /// Set carrier volume (0..=63), or modulator intensity with `modulator`.
    fn volume(&mut self, channel: u16, volume: u8, modulator: bool);
    /// Panning, 0..=256.
    fn pan(&mut self, channel: u16, pan: i32);
    /// Enter the release phase.
    fn note_off(&mut self, channel: u16);
    /// Silence immediately.
    fn note_cut(&mut self, channel: u16);
    /// A voice moved to a background slot.
    fn move_channel(&mut self, from: u16, to: u16);
    fn is_active(&self, channel: u16) -> bool;
}
