//! MIDI macro configuration.
//!
//! Macros are short strings of hex nibbles and placeholder letters. The
//! engine expands them into MIDI bytes when a `Zxx` command or a note
//! event on a plugin instrument needs them.

use core::fmt::Write;

use arrayvec::ArrayString;

/// One macro string, at most 31 characters plus terminator in the file formats.
pub type MacroString = ArrayString<32>;

/// Macros sent on engine events rather than from pattern commands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GlobalMacro {
    Start = 0,
    Stop,
    Tick,
    NoteOn,
    NoteOff,
    Volume,
    Pan,
    BankSelect,
    ProgramChange,
}

/// Complete macro set of a song.
#[derive(Clone, Debug)]
pub struct MidiMacroConfig {
    pub global: [MacroString; 9],
    /// Parameterised macros, selected by `SFx`, sent by `Z00-Z7F`
    pub sfx: [MacroString; 16],
    /// Fixed macros sent by `Z80-ZFF`
    pub zxx: [MacroString; 128],
}

fn macro_str(s: &str) -> MacroString {
    let mut m = MacroString::new();
    let _ = m.try_push_str(s);
    m
}

impl Default for MidiMacroConfig {
    fn default() -> Self {
        let mut global = [MacroString::new(); 9];
        global[GlobalMacro::Start as usize] = macro_str("FF");
        global[GlobalMacro::Stop as usize] = macro_str("FC");
        global[GlobalMacro::NoteOn as usize] = macro_str("9c n v");
        global[GlobalMacro::NoteOff as usize] = macro_str("9c n 0");
        global[GlobalMacro::ProgramChange as usize] = macro_str("Cc p");

        let mut sfx = [MacroString::new(); 16];
        sfx[0] = macro_str("F0F000z");

        let mut zxx = [MacroString::new(); 128];
        for (i, z) in zxx.iter_mut().enumerate().take(16) {
            let _ = write!(z, "F0F001{:02X}", i * 8);
        }
        Self { global, sfx, zxx }
    }
}

impl MidiMacroConfig {
    /// A configuration with every macro empty.
    pub fn empty() -> Self {
        Self {
            global: [MacroString::new(); 9],
            sfx: [MacroString::new(); 16],
            zxx: [MacroString::new(); 128],
        }
    }

    pub fn global(&self, which: GlobalMacro) -> &str {
        self.global[which as usize].as_str()
    }

    /// Macro string for a `Zxx` parameter given the active `SFx` slot.
    pub fn for_param(&self, active_sfx: u8, param: u8) -> &str {
        if param < 0x80 {
            self.sfx[(active_sfx & 0x0F) as usize].as_str()
        } else {
            self.zxx[(param & 0x7F) as usize].as_str()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_fixed_macros_set_resonance() {
        let cfg = MidiMacroConfig::default();
        assert_eq!(cfg.for_param(0, 0x81), "F0F00108");
        assert_eq!(cfg.for_param(0, 0x8F), "F0F00178");
        assert_eq!(cfg.for_param(0, 0x90), "");
    }

    #[test]
    fn parameterised_macro_follows_active_slot() {
        let mut cfg = MidiMacroConfig::default();
        cfg.sfx[2] = macro_str("F0F002z");
        assert_eq!(cfg.for_param(0, 0x10), "F0F000z");
        assert_eq!(cfg.for_param(2, 0x10), "F0F002z");
    }
}
