//! Effect command types for tracker patterns.
//!
//! Every command carries its raw parameter byte. Parameters are kept raw
//! because a zero parameter means "recall the last one" for most commands,
//! and the nibble layout is interpreted differently per format.

/// Volume column command (XM/IT style).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VolumeCommand {
    #[default]
    None,
    /// Set volume (0-64)
    Volume(u8),
    /// Set panning (0-64, 32 = center)
    Panning(u8),
    VolSlideUp(u8),
    VolSlideDown(u8),
    FineVolUp(u8),
    FineVolDown(u8),
    VibratoSpeed(u8),
    VibratoDepth(u8),
    PanSlideLeft(u8),
    PanSlideRight(u8),
    /// Tone portamento, speed index into the IT volume column table
    TonePortamento(u8),
    PortaUp(u8),
    PortaDown(u8),
    /// Sample offset from cue point (0 = none)
    Offset(u8),
}

impl VolumeCommand {
    /// Returns the variant name as a static string (ignoring parameters).
    pub fn name(&self) -> &'static str {
        match self {
            VolumeCommand::None => "None",
            VolumeCommand::Volume(_) => "Volume",
            VolumeCommand::Panning(_) => "Panning",
            VolumeCommand::VolSlideUp(_) => "VolSlideUp",
            VolumeCommand::VolSlideDown(_) => "VolSlideDown",
            VolumeCommand::FineVolUp(_) => "FineVolUp",
            VolumeCommand::FineVolDown(_) => "FineVolDown",
            VolumeCommand::VibratoSpeed(_) => "VibratoSpeed",
            VolumeCommand::VibratoDepth(_) => "VibratoDepth",
            VolumeCommand::PanSlideLeft(_) => "PanSlideLeft",
            VolumeCommand::PanSlideRight(_) => "PanSlideRight",
            VolumeCommand::TonePortamento(_) => "TonePortamento",
            VolumeCommand::PortaUp(_) => "PortaUp",
            VolumeCommand::PortaDown(_) => "PortaDown",
            VolumeCommand::Offset(_) => "Offset",
        }
    }

    /// The raw parameter, 0 for `None`.
    pub fn param(&self) -> u8 {
        match *self {
            VolumeCommand::None => 0,
            VolumeCommand::Volume(p)
            | VolumeCommand::Panning(p)
            | VolumeCommand::VolSlideUp(p)
            | VolumeCommand::VolSlideDown(p)
            | VolumeCommand::FineVolUp(p)
            | VolumeCommand::FineVolDown(p)
            | VolumeCommand::VibratoSpeed(p)
            | VolumeCommand::VibratoDepth(p)
            | VolumeCommand::PanSlideLeft(p)
            | VolumeCommand::PanSlideRight(p)
            | VolumeCommand::TonePortamento(p)
            | VolumeCommand::PortaUp(p)
            | VolumeCommand::PortaDown(p)
            | VolumeCommand::Offset(p) => p,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, VolumeCommand::None)
    }
}

/// Effect column command.
///
/// This enum covers effects from MOD, S3M, XM, and IT formats. Loaders
/// map each format's letters onto these variants; commands a format
/// does not have simply never appear in its patterns.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Effect {
    #[default]
    None,

    // === Arpeggio & Portamento ===
    /// Arpeggio: cycle between note, note+x, note+y each tick
    Arpeggio(u8),
    PortamentoUp(u8),
    PortamentoDown(u8),
    TonePortamento(u8),
    /// Tone portamento continues, parameter is a volume slide
    TonePortaVol(u8),
    /// XM `X1x`/`X2x` extra fine portamento
    ExtraFinePorta(u8),

    // === Oscillators ===
    Vibrato(u8),
    /// Vibrato continues, parameter is a volume slide
    VibratoVol(u8),
    /// Vibrato with 4x finer depth
    FineVibrato(u8),
    Tremolo(u8),
    Panbrello(u8),
    /// Volume on/off gate
    Tremor(u8),

    // === Volume & Panning ===
    /// Set volume (0-64)
    Volume(u8),
    VolumeSlide(u8),
    /// Set channel volume (0-64)
    ChannelVolume(u8),
    ChannelVolSlide(u8),
    GlobalVolume(u8),
    GlobalVolSlide(u8),
    /// Set panning (0-255)
    Panning8(u8),
    PanningSlide(u8),

    // === Sample control ===
    Offset(u8),
    /// Offset as a fraction of the sample length (0x00-0xFF)
    OffsetPercentage(u8),
    /// Play backwards starting `param * 256` samples before the end
    ReverseOffset(u8),
    /// Multi-retrigger: high nibble volume change, low nibble interval
    Retrigger(u8),
    /// Key off after `param` ticks
    KeyOff(u8),
    /// Set finetune
    FineTune(u8),
    /// Set envelope position
    SetEnvPosition(u8),

    // === Timing & Navigation ===
    PositionJump(u8),
    PatternBreak(u8),
    Speed(u8),
    /// Tempo (>= 0x20), or slide down (`0x0y`) / up (`0x1y`)
    Tempo(u8),
    /// Extends the previous command's parameter by another byte
    Xparam(u8),

    // === Extended command families ===
    /// ProTracker / FastTracker `Exy`
    ModCmdEx(u8),
    /// Scream Tracker / Impulse Tracker `Sxy`
    S3mCmdEx(u8),
    /// Note delay (high nibble) and cut (low nibble) in one command
    DelayCut(u8),

    // === MIDI ===
    /// Send the active parameterised (`SFx`) or fixed (`Zxx >= 0x80`) macro
    MidiMacro(u8),
    /// Like `MidiMacro`, but interpolated across the row's ticks
    SmoothMidi(u8),
}

impl Effect {
    /// Returns the variant name as a static string (ignoring parameters).
    pub fn name(&self) -> &'static str {
        match self {
            Effect::None => "None",
            Effect::Arpeggio(_) => "Arpeggio",
            Effect::PortamentoUp(_) => "PortamentoUp",
            Effect::PortamentoDown(_) => "PortamentoDown",
            Effect::TonePortamento(_) => "TonePortamento",
            Effect::TonePortaVol(_) => "TonePortaVol",
            Effect::ExtraFinePorta(_) => "ExtraFinePorta",
            Effect::Vibrato(_) => "Vibrato",
            Effect::VibratoVol(_) => "VibratoVol",
            Effect::FineVibrato(_) => "FineVibrato",
            Effect::Tremolo(_) => "Tremolo",
            Effect::Panbrello(_) => "Panbrello",
            Effect::Tremor(_) => "Tremor",
            Effect::Volume(_) => "Volume",
            Effect::VolumeSlide(_) => "VolumeSlide",
            Effect::ChannelVolume(_) => "ChannelVolume",
            Effect::ChannelVolSlide(_) => "ChannelVolSlide",
            Effect::GlobalVolume(_) => "GlobalVolume",
            Effect::GlobalVolSlide(_) => "GlobalVolSlide",
            Effect::Panning8(_) => "Panning8",
            Effect::PanningSlide(_) => "PanningSlide",
            Effect::Offset(_) => "Offset",
            Effect::OffsetPercentage(_) => "OffsetPercentage",
            Effect::ReverseOffset(_) => "ReverseOffset",
            Effect::Retrigger(_) => "Retrigger",
            Effect::KeyOff(_) => "KeyOff",
            Effect::FineTune(_) => "FineTune",
            Effect::SetEnvPosition(_) => "SetEnvPosition",
            Effect::PositionJump(_) => "PositionJump",
            Effect::PatternBreak(_) => "PatternBreak",
            Effect::Speed(_) => "Speed",
            Effect::Tempo(_) => "Tempo",
            Effect::Xparam(_) => "Xparam",
            Effect::ModCmdEx(_) => "ModCmdEx",
            Effect::S3mCmdEx(_) => "S3mCmdEx",
            Effect::DelayCut(_) => "DelayCut",
            Effect::MidiMacro(_) => "MidiMacro",
            Effect::SmoothMidi(_) => "SmoothMidi",
        }
    }

    /// The raw parameter byte, 0 for `None`.
    pub fn param(&self) -> u8 {
        match *self {
            Effect::None => 0,
            Effect::Arpeggio(p)
            | Effect::PortamentoUp(p)
            | Effect::PortamentoDown(p)
            | Effect::TonePortamento(p)
            | Effect::TonePortaVol(p)
            | Effect::ExtraFinePorta(p)
            | Effect::Vibrato(p)
            | Effect::VibratoVol(p)
            | Effect::FineVibrato(p)
            | Effect::Tremolo(p)
            | Effect::Panbrello(p)
            | Effect::Tremor(p)
            | Effect::Volume(p)
            | Effect::VolumeSlide(p)
            | Effect::ChannelVolume(p)
            | Effect::ChannelVolSlide(p)
            | Effect::GlobalVolume(p)
            | Effect::GlobalVolSlide(p)
            | Effect::Panning8(p)
            | Effect::PanningSlide(p)
            | Effect::Offset(p)
            | Effect::OffsetPercentage(p)
            | Effect::ReverseOffset(p)
            | Effect::Retrigger(p)
            | Effect::KeyOff(p)
            | Effect::FineTune(p)
            | Effect::SetEnvPosition(p)
            | Effect::PositionJump(p)
            | Effect::PatternBreak(p)
            | Effect::Speed(p)
            | Effect::Tempo(p)
            | Effect::Xparam(p)
            | Effect::ModCmdEx(p)
            | Effect::S3mCmdEx(p)
            | Effect::DelayCut(p)
            | Effect::MidiMacro(p)
            | Effect::SmoothMidi(p) => p,
        }
    }

    /// Same command with a different parameter. `None` stays `None`.
    pub fn with_param(&self, param: u8) -> Effect {
        match *self {
            Effect::None => Effect::None,
            Effect::Arpeggio(_) => Effect::Arpeggio(param),
            Effect::PortamentoUp(_) => Effect::PortamentoUp(param),
            Effect::PortamentoDown(_) => Effect::PortamentoDown(param),
            Effect::TonePortamento(_) => Effect::TonePortamento(param),
            Effect::TonePortaVol(_) => Effect::TonePortaVol(param),
            Effect::ExtraFinePorta(_) => Effect::ExtraFinePorta(param),
            Effect::Vibrato(_) => Effect::Vibrato(param),
            Effect::VibratoVol(_) => Effect::VibratoVol(param),
            Effect::FineVibrato(_) => Effect::FineVibrato(param),
            Effect::Tremolo(_) => Effect::Tremolo(param),
            Effect::Panbrello(_) => Effect::Panbrello(param),
            Effect::Tremor(_) => Effect::Tremor(param),
            Effect::Volume(_) => Effect::Volume(param),
            Effect::VolumeSlide(_) => Effect::VolumeSlide(param),
            Effect::ChannelVolume(_) => Effect::ChannelVolume(param),
            Effect::ChannelVolSlide(_) => Effect::ChannelVolSlide(param),
            Effect::GlobalVolume(_) => Effect::GlobalVolume(param),
            Effect::GlobalVolSlide(_) => Effect::GlobalVolSlide(param),
            Effect::Panning8(_) => Effect::Panning8(param),
            Effect::PanningSlide(_) => Effect::PanningSlide(param),
            Effect::Offset(_) => Effect::Offset(param),
            Effect::OffsetPercentage(_) => Effect::OffsetPercentage(param),
            Effect::ReverseOffset(_) => Effect::ReverseOffset(param),
            Effect::Retrigger(_) => Effect::Retrigger(param),
            Effect::KeyOff(_) => Effect::KeyOff(param),
            Effect::FineTune(_) => Effect::FineTune(param),
            Effect::SetEnvPosition(_) => Effect::SetEnvPosition(param),
            Effect::PositionJump(_) => Effect::PositionJump(param),
            Effect::PatternBreak(_) => Effect::PatternBreak(param),
            Effect::Speed(_) => Effect::Speed(param),
            Effect::Tempo(_) => Effect::Tempo(param),
            Effect::Xparam(_) => Effect::Xparam(param),
            Effect::ModCmdEx(_) => Effect::ModCmdEx(param),
            Effect::S3mCmdEx(_) => Effect::S3mCmdEx(param),
            Effect::DelayCut(_) => Effect::DelayCut(param),
            Effect::MidiMacro(_) => Effect::MidiMacro(param),
            Effect::SmoothMidi(_) => Effect::SmoothMidi(param),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Effect::None)
    }

    /// True for the same command kind, ignoring parameters.
    pub fn same_kind(&self, other: &Effect) -> bool {
        core::mem::discriminant(self) == core::mem::discriminant(other)
    }

    /// Commands whose parameter can be widened by following `Xparam` rows.
    pub fn accepts_xparam(&self) -> bool {
        matches!(
            self,
            Effect::PositionJump(_)
                | Effect::PatternBreak(_)
                | Effect::Tempo(_)
                | Effect::Offset(_)
        )
    }

    /// Commands that bring a tone portamento with them.
    pub fn is_tone_porta(&self) -> bool {
        matches!(self, Effect::TonePortamento(_) | Effect::TonePortaVol(_))
    }

    /// Note delay as encoded by this command (`EDx`, `SDx`, `DelayCut`), if any.
    pub fn note_delay(&self) -> Option<u8> {
        match *self {
            Effect::ModCmdEx(p) | Effect::S3mCmdEx(p) if p & 0xF0 == 0xD0 => Some(p & 0x0F),
            Effect::DelayCut(p) => Some(p >> 4),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn param_round_trips_through_with_param() {
        let e = Effect::VolumeSlide(0x0F).with_param(0xF3);
        assert_eq!(e, Effect::VolumeSlide(0xF3));
        assert_eq!(e.param(), 0xF3);
        assert_eq!(Effect::None.with_param(4), Effect::None);
    }

    #[test]
    fn note_delay_only_for_delay_encodings() {
        assert_eq!(Effect::S3mCmdEx(0xD3).note_delay(), Some(3));
        assert_eq!(Effect::ModCmdEx(0xC3).note_delay(), None);
        assert_eq!(Effect::DelayCut(0x21).note_delay(), Some(2));
    }

    #[test]
    fn same_kind_ignores_param() {
        assert!(Effect::Vibrato(1).same_kind(&Effect::Vibrato(0x44)));
        assert!(!Effect::Vibrato(1).same_kind(&Effect::Tremolo(1)));
    }
}
