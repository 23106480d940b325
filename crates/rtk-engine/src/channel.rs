//! Per-channel playback state.
//!
//! A [`ModChannel`] is both a pattern channel (the first
//! `song.num_channels()` slots of the channel array) and a background voice
//! (the remaining slots, filled by new-note actions). Background voices are
//! plain copies of a pattern channel that no longer receive row data.

use bitflags::bitflags;
use rtk_ir::{Cell, Effect, NewNoteAction};

use crate::envelope::EnvelopeCursor;

/// Total number of channel slots, pattern channels plus background voices.
pub const MAX_CHANNELS: usize = 256;

/// Fractional bits of [`ModChannel::position`] and [`ModChannel::increment`].
pub const POSITION_FRACBITS: u32 = 32;

bitflags! {
    /// Playback flags of a channel.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct ChannelFlags: u32 {
        /// Active loop bounds apply
        const LOOP = 1 << 0;
        /// Active loop is ping-pong
        const PINGPONG_LOOP = 1 << 1;
        /// Currently playing backwards
        const PINGPONG_FLAG = 1 << 2;
        /// Sample sustain loop is in effect (cleared on key-off)
        const SUSTAIN_LOOP = 1 << 3;
        const PINGPONG_SUSTAIN = 1 << 4;
        const KEY_OFF = 1 << 5;
        const NOTE_FADE = 1 << 6;
        const MUTE = 1 << 7;
        const SURROUND = 1 << 8;
        /// Tone portamento active on this row
        const PORTAMENTO = 1 << 9;
        const GLISSANDO = 1 << 10;
        const VIBRATO = 1 << 11;
        const TREMOLO = 1 << 12;
        /// Next volume change ramps over the short ramp
        const FAST_VOL_RAMP = 1 << 13;
        /// Volume ramp in progress
        const VOLUME_RAMP = 1 << 14;
        /// Resonant filter parameters are set
        const FILTER = 1 << 15;
        /// Filter runs as high-pass
        const HIGHPASS = 1 << 16;
        /// Voice is rendered by the OPL backend
        const ADLIB = 1 << 17;
        /// Tremor gate currently closed
        const TREMOR_OFF = 1 << 18;
        /// Amiga LED filter (`E0x`)
        const AMIGA_FILTER = 1 << 19;
    }
}

impl ChannelFlags {
    /// Flags that survive a note or sample change.
    pub const PERSISTENT: ChannelFlags = ChannelFlags::MUTE
        .union(ChannelFlags::SURROUND)
        .union(ChannelFlags::GLISSANDO)
        .union(ChannelFlags::AMIGA_FILTER)
        .union(ChannelFlags::HIGHPASS);
}

bitflags! {
    /// Slides that keep running on later rows without a command
    /// (669/Farandole style continuous effects).
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct AutoSlide: u8 {
        const PORTA_UP = 1 << 0;
        const PORTA_DOWN = 1 << 1;
        const TONE_PORTA = 1 << 2;
        const VOLUME = 1 << 3;
        const VIBRATO = 1 << 4;
    }
}

/// Playback state of one channel or background voice.
#[derive(Clone, Debug)]
pub struct ModChannel {
    // === Mixer interface ===
    /// Sample position, 32.32 fixed point
    pub position: i64,
    /// Position increment per output frame, 32.32 fixed point
    pub increment: i64,
    /// Playable length in frames (the loop end while a loop is active),
    /// 0 when the voice is stopped
    pub length: u32,
    pub loop_start: u32,
    pub loop_end: u32,
    /// Current left/right gain, 14-bit (negative for surround)
    pub left_vol: i32,
    pub right_vol: i32,
    /// Target left/right gain for this tick
    pub new_left_vol: i32,
    pub new_right_vol: i32,
    /// Ramp accumulators, gain << 12
    pub ramp_left: i32,
    pub ramp_right: i32,
    pub left_ramp_step: i32,
    pub right_ramp_step: i32,
    /// Frames left in the current volume ramp
    pub ramp_length: u32,
    pub flags: ChannelFlags,
    /// Flags as they were at the end of the previous tick
    pub prev_flags: ChannelFlags,

    // === Current note ===
    /// Sample index (1-based, 0 = none)
    pub sample: u16,
    /// Instrument index (1-based, 0 = none)
    pub instrument: u16,
    /// Note being played after note map and transpose
    pub note: u8,
    /// Last pattern note, used for retrigger and macros
    pub new_note: u8,
    /// Last note sent to a plugin
    pub plugin_note: u8,
    pub period: u32,
    /// Sub-period fraction from auto-vibrato, 8 bits
    pub period_frac: i32,
    pub porta_target: u32,
    /// Tone portamento speed in period units
    pub porta_speed: u32,
    pub c5_speed: u32,
    /// Finetune, XM scale (-128..=127)
    pub fine_tune: i32,
    /// Relative tone of the sample, for formats that transpose
    pub transpose: i8,
    /// Fine steps above `note` for custom tunings
    pub tuning_steps: i32,
    /// Target of a tone portamento on a custom tuning, in fine steps from `note`
    pub tuning_porta_target: i32,

    // === Volume and panning ===
    /// Note volume, 0..=256
    pub volume: i32,
    /// Channel volume, 0..=64
    pub channel_volume: i32,
    /// Sample global volume times instrument global volume, 0..=64
    pub instrument_volume: i32,
    pub fadeout_volume: i32,
    /// Panning, 0..=256
    pub pan: i32,
    pub volume_swing: i32,
    pub pan_swing: i32,
    /// Volume after envelopes and fade, 14-bit
    pub calc_volume: i32,
    /// Final volume including global and channel volume, 14-bit
    pub real_volume: i32,
    /// Panning after envelopes and panbrello
    pub real_pan: i32,

    // === Envelopes ===
    pub volume_env: EnvelopeCursor,
    pub pan_env: EnvelopeCursor,
    pub pitch_env: EnvelopeCursor,
    pub auto_vibrato_depth: i32,
    pub auto_vibrato_pos: u32,

    // === Oscillators ===
    pub vibrato_speed: u8,
    pub vibrato_depth: u8,
    pub vibrato_waveform: u8,
    pub vibrato_pos: u8,
    pub tremolo_speed: u8,
    pub tremolo_depth: u8,
    pub tremolo_waveform: u8,
    pub tremolo_pos: u8,
    pub panbrello_speed: u8,
    pub panbrello_depth: u8,
    pub panbrello_waveform: u8,
    pub panbrello_pos: u8,
    /// Held panbrello offset (IT keeps it until the next note or pan command)
    pub panbrello_offset: i32,
    pub panbrello_random: i32,
    pub tremor_param: u8,
    pub tremor_count: u8,
    pub retrig_param: u8,
    pub retrig_count: u8,
    pub arpeggio: u8,

    // === Effect memory ===
    pub old_porta_up: u8,
    pub old_porta_down: u8,
    /// Fine portamento memory, up in the high nibble, down in the low
    pub old_fine_porta: u8,
    pub old_extra_fine_porta: u8,
    pub old_vol_slide: u8,
    pub old_vol_col_param: u8,
    pub old_fine_vol: u8,
    pub old_chn_vol_slide: u8,
    pub old_global_vol_slide: u8,
    pub old_pan_slide: u8,
    pub old_offset: u32,
    pub old_high_offset: u8,
    pub old_cmd_ex: u8,
    pub old_tempo: u8,
    /// ST3 shared slide memory
    pub st3_memory: u8,
    /// Offset used when the next note starts without an instrument
    pub prev_note_offset: u32,

    // === Row data ===
    /// The cell this channel is executing
    pub row: Cell,
    /// Effect still running on later ticks (arpeggio, tremor, panbrello)
    pub command: Effect,
    pub pattern_loop_row: u16,
    pub pattern_loop_count: u8,
    pub auto_slide: AutoSlide,
    /// Active `SFx` macro
    pub active_macro: u8,
    pub last_zxx_param: u8,
    pub new_note_action: NewNoteAction,

    // === Filter ===
    pub cutoff: u8,
    pub resonance: u8,
    /// Cutoff after the filter envelope, as handed to the mixer
    pub filter_cutoff: u8,

    /// Pattern channel (1-based) this background voice was moved from
    pub master_channel: u16,
}

impl Default for ModChannel {
    fn default() -> Self {
        Self {
            position: 0,
            increment: 0,
            length: 0,
            loop_start: 0,
            loop_end: 0,
            left_vol: 0,
            right_vol: 0,
            new_left_vol: 0,
            new_right_vol: 0,
            ramp_left: 0,
            ramp_right: 0,
            left_ramp_step: 0,
            right_ramp_step: 0,
            ramp_length: 0,
            flags: ChannelFlags::empty(),
            prev_flags: ChannelFlags::empty(),
            sample: 0,
            instrument: 0,
            note: 0,
            new_note: 0,
            plugin_note: 0,
            period: 0,
            period_frac: 0,
            porta_target: 0,
            porta_speed: 0,
            c5_speed: 8363,
            fine_tune: 0,
            transpose: 0,
            tuning_steps: 0,
            tuning_porta_target: 0,
            volume: 256,
            channel_volume: 64,
            instrument_volume: 64,
            fadeout_volume: 65536,
            pan: 128,
            volume_swing: 0,
            pan_swing: 0,
            calc_volume: 0,
            real_volume: 0,
            real_pan: 128,
            volume_env: EnvelopeCursor::default(),
            pan_env: EnvelopeCursor::default(),
            pitch_env: EnvelopeCursor::default(),
            auto_vibrato_depth: 0,
            auto_vibrato_pos: 0,
            vibrato_speed: 0,
            vibrato_depth: 0,
            vibrato_waveform: 0,
            vibrato_pos: 0,
            tremolo_speed: 0,
            tremolo_depth: 0,
            tremolo_waveform: 0,
            tremolo_pos: 0,
            panbrello_speed: 0,
            panbrello_depth: 0,
            panbrello_waveform: 0,
            panbrello_pos: 0,
            panbrello_offset: 0,
            panbrello_random: 0,
            tremor_param: 0,
            tremor_count: 0,
            retrig_param: 0,
            retrig_count: 0,
            arpeggio: 0,
            old_porta_up: 0,
            old_porta_down: 0,
            old_fine_porta: 0,
            old_extra_fine_porta: 0,
            old_vol_slide: 0,
            old_vol_col_param: 0,
            old_fine_vol: 0,
            old_chn_vol_slide: 0,
            old_global_vol_slide: 0,
            old_pan_slide: 0,
            old_offset: 0,
            old_high_offset: 0,
            old_cmd_ex: 0,
            old_tempo: 0,
            st3_memory: 0,
            prev_note_offset: 0,
            row: Cell::empty(),
            command: Effect::None,
            pattern_loop_row: 0,
            pattern_loop_count: 0,
            auto_slide: AutoSlide::empty(),
            active_macro: 0,
            last_zxx_param: 0xFF,
            new_note_action: NewNoteAction::Cut,
            cutoff: 0x7F,
            resonance: 0,
            filter_cutoff: 0x7F,
            master_channel: 0,
        }
    }
}

impl ModChannel {
    /// A pattern channel with its initial volume and panning.
    pub fn with_settings(pan: u16, volume: u8, surround: bool, muted: bool) -> Self {
        let mut chn = Self {
            pan: pan.min(256) as i32,
            real_pan: pan.min(256) as i32,
            channel_volume: volume.min(64) as i32,
            ..Self::default()
        };
        chn.flags.set(ChannelFlags::SURROUND, surround);
        chn.flags.set(ChannelFlags::MUTE, muted);
        chn
    }

    /// The voice has sample data left to play.
    #[inline]
    pub fn is_sample_playing(&self) -> bool {
        self.length != 0 && self.increment != 0
    }

    /// Integer part of the sample position.
    #[inline]
    pub fn position_frames(&self) -> u32 {
        (self.position >> POSITION_FRACBITS).max(0) as u32
    }

    /// Move to `frame` with no fractional part.
    #[inline]
    pub fn set_position_frames(&mut self, frame: u32) {
        self.position = (frame as i64) << POSITION_FRACBITS;
    }

    /// Stop the voice immediately.
    pub fn stop(&mut self) {
        self.length = 0;
        self.position = 0;
        self.increment = 0;
        self.left_vol = 0;
        self.right_vol = 0;
        self.ramp_length = 0;
    }

    /// Rewind all three envelopes.
    pub fn reset_envelopes(&mut self) {
        self.volume_env.reset();
        self.pan_env.reset();
        self.pitch_env.reset();
    }

    /// Clear the oscillator and effect state a background voice must not
    /// inherit from its pattern channel.
    pub(crate) fn detach_from_row(&mut self, master: u16) {
        self.flags
            .remove(ChannelFlags::VIBRATO | ChannelFlags::TREMOLO | ChannelFlags::PORTAMENTO);
        self.panbrello_offset = 0;
        self.master_channel = master;
        self.command = Effect::None;
        self.row = Cell::empty();
        self.auto_slide = AutoSlide::empty();
    }

    /// Start a volume ramp toward `new_left_vol`/`new_right_vol`.
    pub(crate) fn start_ramp(&mut self, frames: u32) {
        let frames = frames.max(1);
        let (dl, dr) = (
            self.new_left_vol - self.left_vol,
            self.new_right_vol - self.right_vol,
        );
        if dl == 0 && dr == 0 {
            self.ramp_length = 0;
            self.flags.remove(ChannelFlags::VOLUME_RAMP);
            return;
        }
        self.ramp_left = self.left_vol << 12;
        self.ramp_right = self.right_vol << 12;
        self.left_ramp_step = (dl << 12) / frames as i32;
        self.right_ramp_step = (dr << 12) / frames as i32;
        self.ramp_length = frames;
        self.flags.insert(ChannelFlags::VOLUME_RAMP);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_channel_takes_settings() {
        let chn = ModChannel::with_settings(300, 80, true, false);
        assert_eq!(chn.pan, 256);
        assert_eq!(chn.channel_volume, 64);
        assert!(chn.flags.contains(ChannelFlags::SURROUND));
        assert!(!chn.is_sample_playing());
    }

    #[test]
    fn position_is_32_32() {
        let mut chn = ModChannel::default();
        chn.set_position_frames(1234);
        assert_eq!(chn.position_frames(), 1234);
        chn.position += 1 << 31;
        assert_eq!(chn.position_frames(), 1234);
    }

    #[test]
    fn detached_voice_forgets_row() {
        let mut chn = ModChannel::default();
        chn.flags.insert(ChannelFlags::VIBRATO | ChannelFlags::KEY_OFF);
        chn.command = Effect::Arpeggio(0x37);
        chn.detach_from_row(3);
        assert_eq!(chn.master_channel, 3);
        assert!(chn.command.is_none());
        assert!(!chn.flags.contains(ChannelFlags::VIBRATO));
        assert!(chn.flags.contains(ChannelFlags::KEY_OFF));
    }

    #[test]
    fn ramp_reaches_target_step_sum() {
        let mut chn = ModChannel::default();
        chn.new_left_vol = 4096;
        chn.new_right_vol = 0;
        chn.start_ramp(64);
        assert_eq!(chn.ramp_length, 64);
        assert_eq!(chn.ramp_left + chn.left_ramp_step * 64, 4096 << 12);
    }
}
