//! The `Exy` (ProTracker/FT2) and `Sxy` (ST3/IT) extended command
//! families. Note delay, pattern delay and tick delay are handled with
//! the row timing and never reach these dispatchers.

use rtk_ir::{ModuleType, NewNoteAction, PlayBehaviour};

use crate::channel::{ChannelFlags, MAX_CHANNELS};
use crate::navigation::RowJumps;
use crate::sequencer::Sequencer;
use crate::tables::S3M_FINETUNE;

/// Past-note actions of `S70`..`S72`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PastNote {
    Cut,
    Off,
    Fade,
}

impl Sequencer<'_> {
    pub(super) fn mod_extended(&mut self, nchn: usize, param: u8, jumps: &mut RowJumps) {
        let song = self.song;
        let row_start = self.state.is_first_tick() && self.state.tick_count == 0;
        let x = param & 0x0F;
        match param >> 4 {
            0x0 if row_start => self.set_amiga_filter(nchn, x),
            0x1 => self.fine_porta(nchn, true, x),
            0x2 => self.fine_porta(nchn, false, x),
            0x3 if row_start => {
                self.state.channels[nchn].flags.set(ChannelFlags::GLISSANDO, x != 0);
            }
            0x4 if row_start => self.state.channels[nchn].vibrato_waveform = x & 0x07,
            0x5 if row_start => {
                let chn = &mut self.state.channels[nchn];
                chn.fine_tune = if song.module_type == ModuleType::Xm {
                    ((x as i32) << 4) - 128
                } else {
                    // Signed nibble, scaled to 1/128 semitones.
                    ((x << 4) as i8) as i32
                };
                if chn.row.note.is_note() {
                    self.refresh_note_period(nchn);
                }
            }
            0x6 if row_start => {
                if let Some(row) = self.pattern_loop(nchn, x) {
                    jumps.loop_row = Some(row);
                }
            }
            0x7 if row_start => self.state.channels[nchn].tremolo_waveform = x & 0x07,
            0x8 if row_start => self.set_pan(nchn, x as i32 * 17),
            0x9 => {
                let has_note = self.state.channels[nchn].row.note.is_note();
                self.retrigger_note(nchn, x as u32 | 0x100, has_note);
            }
            0xA | 0xB => self.fine_volume(nchn, param),
            0xC => self.cut_on_tick(nchn, x, false),
            // EFx inverts loop data in place on the Amiga; samples are
            // read-only here.
            _ => {}
        }
    }

    pub(super) fn s3m_extended(&mut self, nchn: usize, param: u8, jumps: &mut RowJumps) {
        let song = self.song;
        let it = song.module_type.is_it_family();
        let param = {
            let chn = &mut self.state.channels[nchn];
            if param == 0 && it {
                chn.old_cmd_ex
            } else {
                if param != 0 {
                    chn.old_cmd_ex = param;
                }
                param
            }
        };
        let row_start = self.state.is_first_tick() && self.state.tick_count == 0;
        let x = param & 0x0F;
        match param >> 4 {
            0x0 if row_start => self.set_amiga_filter(nchn, x),
            0x1 if row_start => {
                self.state.channels[nchn].flags.set(ChannelFlags::GLISSANDO, x != 0);
            }
            0x2 if row_start => {
                let chn = &mut self.state.channels[nchn];
                chn.c5_speed = S3M_FINETUNE[x as usize];
                if chn.row.note.is_note() {
                    self.refresh_note_period(nchn);
                }
            }
            0x3 if row_start => self.state.channels[nchn].vibrato_waveform = x & 0x07,
            0x4 if row_start => self.state.channels[nchn].tremolo_waveform = x & 0x07,
            0x5 if row_start => {
                let chn = &mut self.state.channels[nchn];
                chn.panbrello_waveform = x & 0x07;
                chn.panbrello_pos = 0;
            }
            0x7 if row_start => self.instrument_control(nchn, x),
            0x8 if row_start => self.set_pan(nchn, x as i32 * 17),
            0x9 if row_start => self.sound_control(nchn, x),
            0xA if row_start => self.state.channels[nchn].old_high_offset = x,
            0xB if row_start => {
                if let Some(row) = self.pattern_loop(nchn, x) {
                    jumps.loop_row = Some(row);
                }
            }
            0xC => self.cut_on_tick(nchn, x, it),
            0xF if row_start => self.state.channels[nchn].active_macro = x,
            _ => {}
        }
    }

    fn set_amiga_filter(&mut self, nchn: usize, x: u8) {
        self.state.channels[nchn]
            .flags
            .set(ChannelFlags::AMIGA_FILTER, x & 1 == 0);
    }

    /// `EAx` / `EBx`. FT2 remembers both directions separately.
    fn fine_volume(&mut self, nchn: usize, param: u8) {
        if !self.fine_tick() {
            return;
        }
        let song = self.song;
        let up = param >> 4 == 0xA;
        let chn = &mut self.state.channels[nchn];
        let mut x = param & 0x0F;
        if song.module_type == ModuleType::Xm {
            if x == 0 {
                x = if up { chn.old_fine_vol >> 4 } else { chn.old_fine_vol & 0x0F };
            } else if up {
                chn.old_fine_vol = (chn.old_fine_vol & 0x0F) | (x << 4);
            } else {
                chn.old_fine_vol = (chn.old_fine_vol & 0xF0) | x;
            }
        }
        let delta = x as i32 * 4;
        let delta = if up { delta } else { -delta };
        chn.volume = (chn.volume + delta).clamp(0, 256);
    }

    fn cut_on_tick(&mut self, nchn: usize, x: u8, cut_sample: bool) {
        let mut at = x as u32;
        if at == 0 && self.song.behaviour.test(PlayBehaviour::IT_NOTE_CUT_ZERO_AS_ONE) {
            at = 1;
        }
        if self.state.tick_in_row() == at {
            self.note_cut_now(nchn, cut_sample);
        }
    }

    /// `S7x`: past-note actions, NNA override and envelope switches.
    fn instrument_control(&mut self, nchn: usize, x: u8) {
        match x {
            0x0 => self.past_note_action(nchn, PastNote::Cut),
            0x1 => self.past_note_action(nchn, PastNote::Off),
            0x2 => self.past_note_action(nchn, PastNote::Fade),
            0x3..=0x6 => {
                self.state.channels[nchn].new_note_action = match x {
                    0x3 => NewNoteAction::Cut,
                    0x4 => NewNoteAction::Continue,
                    0x5 => NewNoteAction::NoteOff,
                    _ => NewNoteAction::NoteFade,
                };
            }
            0x7..=0xC => {
                let chn = &mut self.state.channels[nchn];
                let on = x & 1 == 0;
                let cursor = match x {
                    0x7 | 0x8 => &mut chn.volume_env,
                    0x9 | 0xA => &mut chn.pan_env,
                    _ => &mut chn.pitch_env,
                };
                cursor.enabled = Some(on);
            }
            _ => {}
        }
    }

    /// Apply `action` to every background voice spawned by this channel.
    fn past_note_action(&mut self, nchn: usize, action: PastNote) {
        let num = self.state.pattern_channels(self.song);
        let master = nchn as u16 + 1;
        for voice in num..MAX_CHANNELS {
            if self.state.channels[voice].master_channel != master {
                continue;
            }
            match action {
                PastNote::Cut => {
                    let chn = &mut self.state.channels[voice];
                    chn.fadeout_volume = 0;
                    chn.flags.insert(ChannelFlags::NOTE_FADE | ChannelFlags::FAST_VOL_RAMP);
                }
                PastNote::Off => self.key_off(voice),
                PastNote::Fade => {
                    self.state.channels[voice].flags.insert(ChannelFlags::NOTE_FADE);
                }
            }
        }
    }

    /// `S9x`: surround and playback direction.
    fn sound_control(&mut self, nchn: usize, x: u8) {
        let chn = &mut self.state.channels[nchn];
        match x {
            0x0 => chn.flags.remove(ChannelFlags::SURROUND),
            0x1 => {
                chn.flags.insert(ChannelFlags::SURROUND);
                chn.pan = 128;
            }
            0xE => chn.flags.remove(ChannelFlags::PINGPONG_FLAG),
            0xF => {
                chn.flags.insert(ChannelFlags::PINGPONG_FLAG);
                if chn.position == 0 && chn.length > 0 {
                    chn.set_position_frames(chn.length - 1);
                }
            }
            _ => {}
        }
    }
}
