//! Per-format playback quirks.
//!
//! Historic trackers disagree on dozens of small details. Each
//! disagreement is a single bit here, tested where it matters.

use bitflags::bitflags;

use crate::module_type::ModuleType;

bitflags! {
    /// Compatibility flags consulted throughout the effect processor.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PlayBehaviour: u128 {
        // Navigation
        /// Position jumps and pattern breaks apply even while a pattern loop jumps back (FT2).
        const FT2_PATTERN_LOOP_WITH_JUMPS = 1 << 0;
        /// Position jumps (but not breaks) apply even while a pattern loop jumps back (IT).
        const IT_PATTERN_LOOP_WITH_JUMPS = 1 << 1;
        /// A pattern break does not reset running pattern loop counters.
        const IT_PATTERN_LOOP_BREAK = 1 << 2;
        /// After a loop finishes, the next loop starts on the row after it.
        const IT_PATTERN_LOOP_TARGET_RESET = 1 << 3;
        /// Pattern loops on different channels run independently.
        const IT_FT2_PATTERN_LOOP = 1 << 4;
        /// `E60` makes the next pattern start at the loop row (FT2 bug).
        const FT2_LOOP_E60_RESTART = 1 << 5;
        /// `Fxx` tempo changes take effect on the second tick (ProTracker).
        const MOD_TEMPO_ON_SECOND_TICK = 1 << 7;
        /// Row repetitions caused by pattern delay re-run first-tick effects.
        const ROW_DELAY_REPEATS_FIRST_TICK = 1 << 8;
        /// Pattern breaks with parameter >= 64 are dropped (ST3).
        const S3M_IGNORE_INVALID_BREAK = 1 << 9;
        /// A position jump after a pattern break on the same row resets the break row.
        const JUMP_RESETS_BREAK_ROW = 1 << 10;

        // Pitch
        /// Periods wrap at 16 bits and octaves are derived the FT2 way.
        const FT2_PERIODS = 1 << 16;
        /// Lower three bits of finetune are ignored.
        const FT2_FINETUNE_PRECISION = 1 << 17;
        /// Pitch is kept in Hertz instead of periods.
        const PERIODS_ARE_HERTZ = 1 << 18;
        /// Portamento up and down keep separate memories (FT2).
        const FT2_PORTA_UP_DOWN_MEMORY = 1 << 19;
        /// Portamento up, down and tone portamento share one memory unless compatible Gxx is set.
        const IT_PORTA_MEMORY_SHARE = 1 << 20;
        /// Almost every effect shares a single parameter memory (ST3).
        const ST3_EFFECT_MEMORY = 1 << 21;
        /// Slides also run at speed 1.
        const SLIDES_AT_SPEED_1 = 1 << 22;
        /// Reaching the tone portamento target clears it.
        const IT_PORTA_TARGET_REACHED = 1 << 23;
        /// Tone portamento target survives a note without tone portamento (FT2).
        const FT2_PORTA_TARGET_NO_RESET = 1 << 24;
        /// Arpeggio is computed from the tick counter backwards with the FT2 table overflow.
        const FT2_ARPEGGIO = 1 << 26;
        /// Arpeggio scales the current pitch instead of replacing the note.
        const IT_ARPEGGIO = 1 << 27;
        /// ProTracker arpeggio wraps past the top of the period table.
        const PT_ARPEGGIO_WRAP = 1 << 28;

        // Modulation
        /// 256-entry sine and IT depth shifts for vibrato, tremolo and panbrello.
        const IT_VIBRATO_TREMOLO_PANBRELLO = 1 << 32;
        /// Random panbrello holds each value for `speed` ticks.
        const IT_PANBRELLO_HOLD = 1 << 33;
        /// Tremor on/off times are stored one tick shorter (IT).
        const IT_TREMOR = 1 << 34;
        /// Oscillator phase is reset on every new note unless the waveform says otherwise.
        const RESET_OSCILLATOR_ON_NOTE = 1 << 35;

        // Volume
        /// Volume slides with both nibbles non-zero are ignored (IT); otherwise they slide down.
        const IT_VOLSLIDE_BOTH_NIBBLES_IGNORED = 1 << 40;
        /// Volume slide nibbles are resolved by "up wins" (MOD, XM).
        const VOLSLIDE_NIBBLE_PRIORITY = 1 << 41;
        /// A volume column volume overrides the retrigger volume change (FT2).
        const FT2_RETRIGGER = 1 << 42;
        /// The retrigger counter keeps running across rows (IT).
        const IT_RETRIGGER = 1 << 43;
        /// Retrigger does not restart a voice whose sample already ended.
        const SHORT_SAMPLE_RETRIG_PROTECTION = 1 << 44;
        /// Setting a panning position cancels surround.
        const PAN_OVERRIDES_SURROUND = 1 << 45;
        /// Key-off without an active volume envelope silences the voice (FT2).
        const FT2_KEY_OFF_WITHOUT_ENVELOPE_CUTS = 1 << 46;
        /// `SC0`/`EC0` behaves like a cut on tick 1 (IT).
        const IT_NOTE_CUT_ZERO_AS_ONE = 1 << 47;

        // Sample offset
        /// An offset past the sample end silences the note (FT2, ST3).
        const FT2_ST3_OFFSET_OUT_OF_RANGE = 1 << 52;
        /// An offset past the sample end restarts at 0, or clips to the end with old effects (IT).
        const IT_OFFSET = 1 << 53;

        // Envelopes
        /// Envelope positions are incremented before evaluation (IT).
        const IT_ENVELOPE_POSITION_HANDLING = 1 << 56;
        /// Release node rescaling uses the old absolute formula.
        const LEGACY_RELEASE_NODE = 1 << 57;
        /// Instrument fade starts when a non-looping volume envelope ends (IT).
        const IT_ENVELOPE_END_FADES = 1 << 58;

        // Continuations
        /// Slides keep running on following rows until stopped (669, FAR).
        const CONTINUOUS_SLIDES = 1 << 64;
    }
}

impl PlayBehaviour {
    /// Quirks a module of the given type plays with by default.
    pub fn defaults_for(module_type: ModuleType) -> Self {
        match module_type {
            ModuleType::Mod => {
                Self::MOD_TEMPO_ON_SECOND_TICK
                    | Self::JUMP_RESETS_BREAK_ROW
                    | Self::VOLSLIDE_NIBBLE_PRIORITY
                    | Self::IT_FT2_PATTERN_LOOP
                    | Self::ROW_DELAY_REPEATS_FIRST_TICK
                    | Self::RESET_OSCILLATOR_ON_NOTE
                    | Self::PT_ARPEGGIO_WRAP
            }
            ModuleType::Xm => {
                Self::FT2_PATTERN_LOOP_WITH_JUMPS
                    | Self::IT_FT2_PATTERN_LOOP
                    | Self::FT2_LOOP_E60_RESTART
                    | Self::JUMP_RESETS_BREAK_ROW
                    | Self::FT2_PERIODS
                    | Self::FT2_FINETUNE_PRECISION
                    | Self::FT2_PORTA_UP_DOWN_MEMORY
                    | Self::FT2_PORTA_TARGET_NO_RESET
                    | Self::FT2_ARPEGGIO
                    | Self::VOLSLIDE_NIBBLE_PRIORITY
                    | Self::FT2_RETRIGGER
                    | Self::FT2_KEY_OFF_WITHOUT_ENVELOPE_CUTS
                    | Self::FT2_ST3_OFFSET_OUT_OF_RANGE
                    | Self::RESET_OSCILLATOR_ON_NOTE
            }
            ModuleType::S3m => Self::st3_quirks(),
            ModuleType::Stm | ModuleType::Psm => Self::st3_quirks() | Self::IT_FT2_PATTERN_LOOP,
            ModuleType::It | ModuleType::Mpt => {
                Self::IT_PATTERN_LOOP_WITH_JUMPS
                    | Self::IT_PATTERN_LOOP_BREAK
                    | Self::IT_PATTERN_LOOP_TARGET_RESET
                    | Self::IT_FT2_PATTERN_LOOP
                    | Self::ROW_DELAY_REPEATS_FIRST_TICK
                    | Self::IT_PORTA_MEMORY_SHARE
                    | Self::IT_PORTA_TARGET_REACHED
                    | Self::IT_ARPEGGIO
                    | Self::IT_VIBRATO_TREMOLO_PANBRELLO
                    | Self::IT_PANBRELLO_HOLD
                    | Self::IT_TREMOR
                    | Self::IT_VOLSLIDE_BOTH_NIBBLES_IGNORED
                    | Self::IT_RETRIGGER
                    | Self::SHORT_SAMPLE_RETRIG_PROTECTION
                    | Self::PAN_OVERRIDES_SURROUND
                    | Self::IT_NOTE_CUT_ZERO_AS_ONE
                    | Self::IT_OFFSET
                    | Self::IT_ENVELOPE_POSITION_HANDLING
                    | Self::IT_ENVELOPE_END_FADES
            }
            ModuleType::Mtm | ModuleType::Gt2 => {
                Self::VOLSLIDE_NIBBLE_PRIORITY
                    | Self::RESET_OSCILLATOR_ON_NOTE
                    | Self::IT_FT2_PATTERN_LOOP
            }
            ModuleType::Six69 | ModuleType::Far => {
                Self::CONTINUOUS_SLIDES | Self::SLIDES_AT_SPEED_1 | Self::IT_FT2_PATTERN_LOOP
            }
        }
    }

    /// Scream Tracker 3 rules. Pattern loop memory is global there.
    fn st3_quirks() -> Self {
        Self::S3M_IGNORE_INVALID_BREAK
            | Self::ST3_EFFECT_MEMORY
            | Self::ROW_DELAY_REPEATS_FIRST_TICK
            | Self::FT2_ST3_OFFSET_OUT_OF_RANGE
            | Self::RESET_OSCILLATOR_ON_NOTE
    }

    /// Shorthand for `contains`, reads like a flag query at call sites.
    #[inline]
    pub fn test(&self, flag: PlayBehaviour) -> bool {
        self.contains(flag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jump_arbitration_flags_are_format_specific() {
        let xm = PlayBehaviour::defaults_for(ModuleType::Xm);
        let it = PlayBehaviour::defaults_for(ModuleType::It);
        assert!(xm.test(PlayBehaviour::FT2_PATTERN_LOOP_WITH_JUMPS));
        assert!(!xm.test(PlayBehaviour::IT_PATTERN_LOOP_WITH_JUMPS));
        assert!(it.test(PlayBehaviour::IT_PATTERN_LOOP_WITH_JUMPS));
        assert!(!it.test(PlayBehaviour::FT2_PATTERN_LOOP_WITH_JUMPS));
    }

    #[test]
    fn only_st3_shares_pattern_loop_memory() {
        use ModuleType::*;
        for module_type in [Mod, Xm, It, Mpt, Stm, Psm, Mtm, Gt2, Six69, Far] {
            let b = PlayBehaviour::defaults_for(module_type);
            assert!(b.test(PlayBehaviour::IT_FT2_PATTERN_LOOP), "{module_type:?}");
        }
        assert!(!PlayBehaviour::defaults_for(S3m).test(PlayBehaviour::IT_FT2_PATTERN_LOOP));
    }

    #[test]
    fn flags_above_64_bits_survive() {
        let b = PlayBehaviour::CONTINUOUS_SLIDES | PlayBehaviour::FT2_PERIODS;
        assert!(b.test(PlayBehaviour::CONTINUOUS_SLIDES));
        assert!(!b.test(PlayBehaviour::IT_OFFSET));
    }
}
