//! New note actions: moving a sounding note to a background voice before
//! a new note takes over its pattern channel.
//!
//! Background voices live in the channel slots after the pattern
//! channels. Allocation takes a silent slot first and otherwise steals the
//! quietest voice.

use rtk_ir::{DuplicateAction, DuplicateCheck, Instrument, NewNoteAction};

use crate::channel::{ChannelFlags, ModChannel, MAX_CHANNELS};
use crate::sequencer::Sequencer;

/// What happens to the voice a new note replaces.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Handoff {
    /// Keep sounding in the background, untouched
    Continue,
    /// Keep sounding, released
    NoteOff,
    /// Keep sounding while the instrument fades out
    NoteFade,
    /// Ramp to silence in the background
    QuickFade,
}

impl From<NewNoteAction> for Handoff {
    fn from(action: NewNoteAction) -> Self {
        match action {
            NewNoteAction::Cut => Handoff::QuickFade,
            NewNoteAction::Continue => Handoff::Continue,
            NewNoteAction::NoteOff => Handoff::NoteOff,
            NewNoteAction::NoteFade => Handoff::NoteFade,
        }
    }
}

/// Weight a voice by how audible it is. Looping and plugin-held voices
/// count half.
fn steal_weight(chn: &ModChannel) -> u64 {
    let mut weight = ((chn.real_volume.max(0) as u64) << 9) | chn.volume.max(0) as u64;
    if chn.flags.contains(ChannelFlags::LOOP) {
        weight >>= 1;
    }
    if chn.plugin_note != 0 {
        weight >>= 1;
    }
    weight
}

/// Does `old`, playing under `old_ins`, duplicate the incoming note?
fn is_duplicate(
    old: &ModChannel,
    old_ins: &Instrument,
    instr: u16,
    new_ins: Option<&Instrument>,
    note: u8,
) -> bool {
    if old.instrument != instr && old_ins.duplicate_check != DuplicateCheck::Plugin {
        return false;
    }
    match old_ins.duplicate_check {
        DuplicateCheck::Off => false,
        DuplicateCheck::Note => old.note == new_ins.map(|i| i.translate_note(note)).unwrap_or(note),
        DuplicateCheck::Sample => new_ins.map(|i| i.sample_for(note)) == Some(old.sample),
        DuplicateCheck::Instrument => true,
        DuplicateCheck::Plugin => {
            old_ins.plugin != 0 && new_ins.map(|i| i.plugin) == Some(old_ins.plugin)
        }
    }
}

impl Sequencer<'_> {
    /// Resolve duplicate and new note actions before `note` starts on
    /// `nchn` with instrument `instr`. `force_cut` treats the old note as
    /// if its action were a cut.
    pub(crate) fn check_nna(&mut self, nchn: usize, instr: u16, note: u8, force_cut: bool) {
        if !self.is_render() {
            return;
        }
        let song = self.song;
        let it_nna = song.module_type.is_it_family() && song.uses_instruments() && !force_cut;

        if it_nna {
            self.duplicate_note_action(nchn, instr, note);
        }

        let handoff = {
            let chn = &self.state.channels[nchn];
            if chn.length == 0 && chn.plugin_note == 0 {
                return;
            }
            if it_nna && chn.instrument != 0 {
                Handoff::from(chn.new_note_action)
            } else {
                Handoff::QuickFade
            }
        };

        if let Some(slot) = self.nna_channel(nchn) {
            self.evict(slot);
            let mut voice = self.state.channels[nchn].clone();
            voice.detach_from_row(nchn as u16 + 1);
            if handoff == Handoff::QuickFade {
                voice.fadeout_volume = 0;
                voice.flags.insert(ChannelFlags::NOTE_FADE | ChannelFlags::FAST_VOL_RAMP);
                voice.new_left_vol = 0;
                voice.new_right_vol = 0;
            }
            if handoff == Handoff::NoteFade {
                voice.flags.insert(ChannelFlags::NOTE_FADE);
            }
            let adlib = voice.flags.contains(ChannelFlags::ADLIB);
            self.state.channels[slot] = voice;
            if adlib {
                if let Some(opl) = self.backends.opl.as_mut() {
                    opl.move_channel(nchn as u16, slot as u16);
                }
            }
            if handoff == Handoff::NoteOff {
                self.key_off(slot);
            }
            self.state.channels[nchn].plugin_note = 0;
        } else {
            self.plugin_note_off(nchn);
        }

        let chn = &mut self.state.channels[nchn];
        chn.length = 0;
        chn.position = 0;
        chn.left_vol = 0;
        chn.right_vol = 0;
        chn.new_left_vol = 0;
        chn.new_right_vol = 0;
        chn.ramp_length = 0;
        chn.flags.remove(ChannelFlags::VOLUME_RAMP);
    }

    /// Stop background voices of `nchn` that duplicate the incoming note,
    /// judged by each voice's own instrument.
    fn duplicate_note_action(&mut self, nchn: usize, instr: u16, note: u8) {
        let song = self.song;
        let num = self.state.pattern_channels(song);
        let new_ins = song.instrument(instr);
        let master = nchn as u16 + 1;
        for voice in core::iter::once(nchn).chain(num..MAX_CHANNELS) {
            let action = {
                let old = &self.state.channels[voice];
                if voice != nchn && old.master_channel != master {
                    continue;
                }
                if old.length == 0 && old.plugin_note == 0 {
                    continue;
                }
                let Some(old_ins) = song.instrument(old.instrument) else {
                    continue;
                };
                if !is_duplicate(old, old_ins, instr, new_ins, note) {
                    continue;
                }
                old_ins.duplicate_action
            };
            match action {
                DuplicateAction::Cut => {
                    let chn = &mut self.state.channels[voice];
                    chn.fadeout_volume = 0;
                    chn.flags.insert(ChannelFlags::NOTE_FADE | ChannelFlags::FAST_VOL_RAMP);
                    self.plugin_note_off(voice);
                }
                DuplicateAction::NoteOff => self.key_off(voice),
                DuplicateAction::NoteFade => {
                    self.state.channels[voice].flags.insert(ChannelFlags::NOTE_FADE);
                }
            }
        }
    }

    /// Background slot for the voice leaving `nchn`: a silent one, else
    /// the least audible. `None` when the song has no room for
    /// background voices.
    pub(crate) fn nna_channel(&self, nchn: usize) -> Option<usize> {
        let num = self.state.pattern_channels(self.song);
        let slots = &self.state.channels[num.min(MAX_CHANNELS)..];
        if let Some(free) = slots
            .iter()
            .position(|chn| chn.length == 0 && chn.plugin_note == 0)
        {
            return Some(num + free);
        }
        slots
            .iter()
            .enumerate()
            .filter(|(i, _)| num + i != nchn)
            .min_by_key(|(_, chn)| steal_weight(chn))
            .map(|(i, _)| num + i)
    }

    /// Silence whatever still plays in `slot` before it is reused.
    fn evict(&mut self, slot: usize) {
        if self.state.channels[slot].length == 0 && self.state.channels[slot].plugin_note == 0 {
            return;
        }
        self.plugin_note_off(slot);
        if self.state.channels[slot].flags.contains(ChannelFlags::ADLIB) {
            if let Some(opl) = self.backends.opl.as_mut() {
                opl.note_cut(slot as u16);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{make_song, Rig};
    use rtk_ir::{Cell, ModuleType};

    /// One pattern channel and an instrument playing sample 1, with
    /// notes on the given rows.
    fn nna_rig(ins: Instrument, notes: &[(u16, u8)]) -> Rig {
        let cells: alloc::vec::Vec<_> = notes.iter().map(|&(row, n)| (row, 0, Cell::note(n, 1))).collect();
        let mut song = make_song(ModuleType::It, 1, &cells);
        let mut ins = ins;
        ins.set_single_sample(1);
        song.instruments.push(ins);
        Rig::new(song)
    }

    fn with_nna(action: NewNoteAction) -> Instrument {
        Instrument {
            new_note_action: action,
            ..Instrument::default()
        }
    }

    /// The voice that played row 0 after row 1's note took over.
    fn background_after_second_note(action: NewNoteAction) -> ModChannel {
        let mut rig = nna_rig(with_nna(action), &[(0, 49), (1, 52)]);
        rig.ticks(7);
        assert_eq!(rig.chn(0).note, 52);
        assert_ne!(rig.chn(0).length, 0);
        let voice = rig.chn(1).clone();
        assert_eq!(voice.master_channel, 1);
        assert_eq!(voice.note, 49);
        assert_ne!(voice.length, 0);
        voice
    }

    #[test]
    fn continue_leaves_background_voice_untouched() {
        let voice = background_after_second_note(NewNoteAction::Continue);
        assert!(!voice.flags.intersects(ChannelFlags::KEY_OFF | ChannelFlags::NOTE_FADE));
        assert_eq!(voice.fadeout_volume, 65536);
    }

    #[test]
    fn note_off_releases_background_voice() {
        let voice = background_after_second_note(NewNoteAction::NoteOff);
        assert!(voice.flags.contains(ChannelFlags::KEY_OFF));
    }

    #[test]
    fn note_fade_fades_without_release() {
        let voice = background_after_second_note(NewNoteAction::NoteFade);
        assert!(voice.flags.contains(ChannelFlags::NOTE_FADE));
        assert!(!voice.flags.contains(ChannelFlags::KEY_OFF));
        assert_eq!(voice.fadeout_volume, 65536);
    }

    #[test]
    fn cut_ramps_background_voice_out() {
        let voice = background_after_second_note(NewNoteAction::Cut);
        assert_eq!(voice.fadeout_volume, 0);
        assert_eq!((voice.new_left_vol, voice.new_right_vol), (0, 0));
    }

    #[test]
    fn duplicate_cut_stops_earlier_copy_of_note() {
        let ins = Instrument {
            duplicate_check: DuplicateCheck::Note,
            duplicate_action: DuplicateAction::Cut,
            ..with_nna(NewNoteAction::Continue)
        };
        let mut rig = nna_rig(ins, &[(0, 49), (1, 52), (2, 49)]);
        rig.ticks(13);
        // Row 0's C-4 went to slot 1 and is cut by row 2's C-4.
        assert_eq!(rig.chn(1).note, 49);
        assert_eq!(rig.chn(1).fadeout_volume, 0);
        // Row 1's note is no duplicate and keeps playing in slot 2.
        assert_eq!(rig.chn(2).note, 52);
        assert_eq!(rig.chn(2).fadeout_volume, 65536);
        assert_eq!(rig.chn(2).master_channel, 1);
    }

    #[test]
    fn quietest_voice_is_stolen_when_slots_are_full() {
        let mut rig = nna_rig(Instrument::default(), &[]);
        for chn in rig.state.channels[1..].iter_mut() {
            chn.length = 100;
            chn.real_volume = 4000;
            chn.volume = 256;
        }
        rig.state.channels[9].real_volume = 10;
        assert_eq!(rig.seq().nna_channel(0), Some(9));

        rig.state.channels[20].length = 0;
        assert_eq!(rig.seq().nna_channel(0), Some(20));
    }

    #[test]
    fn looping_voices_weigh_less() {
        let mut a = ModChannel {
            real_volume: 1000,
            volume: 64,
            length: 10,
            ..ModChannel::default()
        };
        let plain = steal_weight(&a);
        a.flags.insert(ChannelFlags::LOOP);
        assert_eq!(steal_weight(&a), plain >> 1);
        a.plugin_note = 60;
        assert_eq!(steal_weight(&a), plain >> 2);
    }

    #[test]
    fn duplicate_by_note_compares_translated_note() {
        let ins = Instrument {
            duplicate_check: DuplicateCheck::Note,
            ..Instrument::default()
        };
        let old = ModChannel {
            instrument: 1,
            note: 49,
            ..ModChannel::default()
        };
        assert!(is_duplicate(&old, &ins, 1, Some(&ins), 49));
        assert!(!is_duplicate(&old, &ins, 1, Some(&ins), 50));
        assert!(!is_duplicate(&old, &ins, 2, Some(&ins), 49));
    }

    #[test]
    fn duplicate_check_off_never_matches() {
        let ins = Instrument::default();
        let old = ModChannel {
            instrument: 1,
            note: 49,
            ..ModChannel::default()
        };
        assert!(!is_duplicate(&old, &ins, 1, Some(&ins), 49));
    }
}
