//! Note triggers, instrument changes, key-off, cut, retrigger and
//! sample offsets.

use rtk_ir::{
    ModuleType, PlayBehaviour, Sample, SampleFlags, SongFlags, VolumeCommand, NOTE_MAX,
};

use crate::channel::{ChannelFlags, ModChannel};
use crate::envelope;
use crate::frequency::period_from_note;
use crate::sequencer::Sequencer;
use crate::tables::{RETRIG_ADD, RETRIG_MULTIPLY};

/// Load the loop bounds of the channel's sample. The sustain loop wins
/// until the note is released.
pub(crate) fn apply_sample_loop(chn: &mut ModChannel, sample: &Sample) {
    chn.flags.remove(
        ChannelFlags::LOOP
            | ChannelFlags::PINGPONG_LOOP
            | ChannelFlags::SUSTAIN_LOOP
            | ChannelFlags::PINGPONG_SUSTAIN,
    );
    let released = chn.flags.contains(ChannelFlags::KEY_OFF);
    if sample.has_sustain_loop() && !released {
        chn.flags.insert(ChannelFlags::SUSTAIN_LOOP | ChannelFlags::LOOP);
        chn.flags.set(
            ChannelFlags::PINGPONG_LOOP | ChannelFlags::PINGPONG_SUSTAIN,
            sample.flags.contains(SampleFlags::PINGPONG_SUSTAIN),
        );
        chn.loop_start = sample.sustain_start;
        chn.loop_end = sample.sustain_end;
        chn.length = sample.sustain_end;
    } else if sample.has_loop() {
        chn.flags.insert(ChannelFlags::LOOP);
        chn.flags.set(
            ChannelFlags::PINGPONG_LOOP,
            sample.flags.contains(SampleFlags::PINGPONG_LOOP),
        );
        chn.loop_start = sample.loop_start;
        chn.loop_end = sample.loop_end;
        chn.length = sample.loop_end;
    } else {
        chn.loop_start = 0;
        chn.loop_end = 0;
        chn.length = sample.len();
    }
    if sample.is_opl() {
        // OPL voices have no sample data; a non-zero length marks them live.
        chn.length = 1;
    }
}

impl Sequencer<'_> {
    /// Apply an instrument (or, without instruments, a sample) number.
    pub(super) fn instrument_change(
        &mut self,
        nchn: usize,
        instr: u16,
        porta: bool,
        note: Option<u8>,
    ) {
        let song = self.song;
        let swing_roll = (self.state.random_i8(), self.state.random_i8());
        let chn = &mut self.state.channels[nchn];

        let (ins, sample_idx) = if song.uses_instruments() {
            let Some(ins) = song.instrument(instr) else {
                return;
            };
            let mapped = note.map(|n| ins.sample_for(n)).unwrap_or(chn.sample);
            (Some(ins), mapped)
        } else {
            (None, instr)
        };
        let Some(sample) = song.sample(sample_idx) else {
            if ins.is_none() {
                return;
            }
            chn.instrument = instr;
            return;
        };

        let playing = chn.is_sample_playing();
        chn.instrument = if ins.is_some() { instr } else { 0 };
        chn.volume = sample.default_volume.min(256) as i32;
        let ins_volume = ins.map(|i| i.global_volume.min(64) as i32).unwrap_or(64);
        chn.instrument_volume = (sample.global_volume.min(64) as i32 * ins_volume) >> 6;

        if let Some(pan) = ins.and_then(|i| i.default_pan) {
            chn.pan = pan.min(256) as i32;
        }
        if sample.flags.contains(SampleFlags::SET_PANNING) {
            chn.pan = sample.default_pan.min(256) as i32;
        }

        if let Some(ins) = ins {
            chn.new_note_action = ins.new_note_action;
            if let Some(cutoff) = ins.cutoff {
                chn.cutoff = cutoff.min(127);
                chn.flags.insert(ChannelFlags::FILTER);
            }
            if let Some(resonance) = ins.resonance {
                chn.resonance = resonance.min(127);
                chn.flags.insert(ChannelFlags::FILTER);
            }
            chn.volume_swing = swing_roll.0 * ins.volume_swing.min(100) as i32 * 256 / (128 * 100);
            chn.pan_swing = swing_roll.1 * ins.pan_swing.min(64) as i32 * 4 / 128;
        }

        // A tone portamento keeps the running sample.
        if porta && playing {
            return;
        }
        chn.sample = sample_idx;
        if song.module_type.uses_finetune_and_transpose() {
            chn.fine_tune = sample.fine_tune as i32;
            chn.transpose = sample.relative_tone;
        }
        chn.c5_speed = sample.c5_speed;
    }

    /// Start `note` on the channel, or retarget the tone portamento.
    pub(super) fn note_change(&mut self, nchn: usize, note: u8, porta: bool, retrig: bool) {
        let song = self.song;
        if note == 0 || note > NOTE_MAX {
            return;
        }
        let ins = song.instrument(self.state.channels[nchn].instrument);
        if let Some(ins) = ins {
            let mapped = ins.sample_for(note);
            if mapped == 0 {
                return;
            }
            if !porta || !self.state.channels[nchn].is_sample_playing() {
                self.state.channels[nchn].sample = mapped;
            }
        }
        let chn = &mut self.state.channels[nchn];
        let Some(sample) = song.sample(chn.sample) else {
            return;
        };

        let mut played = ins.map(|i| i.translate_note(note)).unwrap_or(note);
        if song.module_type.uses_finetune_and_transpose() {
            played = (played as i32 + chn.transpose as i32).clamp(1, NOTE_MAX as i32) as u8;
        }
        let period = period_from_note(song, played, chn.fine_tune, chn.c5_speed);
        let tuning = ins.and_then(|i| i.tuning.as_ref());

        if porta && chn.is_sample_playing() && chn.period != 0 {
            chn.porta_target = period;
            if let Some(tuning) = tuning {
                let per_note = tuning.fine_steps as i32 + 1;
                chn.tuning_porta_target = (played as i32 - chn.note as i32) * per_note;
            }
            return;
        }

        chn.note = played;
        chn.period = period;
        chn.period_frac = 0;
        if porta {
            chn.porta_target = period;
        } else if !song.behaviour.test(PlayBehaviour::FT2_PORTA_TARGET_NO_RESET) {
            chn.porta_target = 0;
        }
        chn.tuning_steps = 0;
        chn.tuning_porta_target = 0;

        chn.flags &= ChannelFlags::PERSISTENT | ChannelFlags::FILTER;
        apply_sample_loop(chn, sample);
        let offset = if retrig { chn.prev_note_offset } else { 0 };
        chn.set_position_frames(offset.min(chn.length.saturating_sub(1)));
        chn.fadeout_volume = 65536;
        chn.auto_vibrato_depth = 0;
        chn.auto_vibrato_pos = 0;
        chn.tremor_count = 0;
        if !retrig {
            chn.prev_note_offset = 0;
        }

        if let Some(ins) = ins {
            if !ins.volume_envelope.carry {
                chn.volume_env.reset();
            }
            if !ins.panning_envelope.carry {
                chn.pan_env.reset();
            }
            if !ins.pitch_envelope.carry {
                chn.pitch_env.reset();
            }
        }

        let keep_phase = |waveform: u8| waveform & 4 != 0;
        if song.behaviour.test(PlayBehaviour::RESET_OSCILLATOR_ON_NOTE) {
            if !keep_phase(chn.vibrato_waveform) {
                chn.vibrato_pos = 0;
            }
            if !keep_phase(chn.tremolo_waveform) {
                chn.tremolo_pos = 0;
            }
        }
        if !keep_phase(chn.panbrello_waveform) {
            chn.panbrello_pos = 0;
        }
        chn.panbrello_offset = 0;

        if let Some(patch) = sample.opl_patch.as_ref() {
            chn.flags.insert(ChannelFlags::ADLIB);
            if self.is_render() {
                if let Some(opl) = self.backends.opl.as_mut() {
                    opl.set_patch(nchn as u16, patch);
                }
            }
        }
        self.plugin_note_on(nchn, played);
    }

    /// Send the note to the channel's plugin, releasing the previous one.
    fn plugin_note_on(&mut self, nchn: usize, note: u8) {
        if !self.is_render() {
            return;
        }
        let song = self.song;
        let has_plugin = song
            .instrument(self.state.channels[nchn].instrument)
            .map(|i| i.has_plugin())
            .unwrap_or(false);
        if !has_plugin {
            return;
        }
        let plugin = self.plugin_for(nchn);
        let chn = &mut self.state.channels[nchn];
        let velocity = (chn.volume / 2).clamp(0, 127) as u8;
        let old = core::mem::replace(&mut chn.plugin_note, note);
        if let Some(backend) = self.backends.plugin.as_mut() {
            if old != 0 {
                backend.note_off(plugin, nchn as u16, old);
            }
            backend.note_on(plugin, nchn as u16, note, velocity);
        }
    }

    pub(crate) fn plugin_note_off(&mut self, nchn: usize) {
        if !self.is_render() {
            return;
        }
        let plugin = self.plugin_for(nchn);
        let note = core::mem::take(&mut self.state.channels[nchn].plugin_note);
        if note == 0 {
            return;
        }
        if let Some(backend) = self.backends.plugin.as_mut() {
            backend.note_off(plugin, nchn as u16, note);
        }
    }

    /// Release the note: leave the sustain loop and envelope sustain.
    pub(crate) fn key_off(&mut self, nchn: usize) {
        let song = self.song;
        {
            let chn = &mut self.state.channels[nchn];
            let was_released = chn.flags.contains(ChannelFlags::KEY_OFF);
            chn.flags.insert(ChannelFlags::KEY_OFF);

            if chn.flags.contains(ChannelFlags::SUSTAIN_LOOP) {
                if let Some(sample) = song.sample(chn.sample) {
                    let frames = chn.position_frames();
                    apply_sample_loop(chn, sample);
                    if chn.loop_end <= chn.loop_start && frames >= chn.length {
                        chn.length = 0;
                    }
                }
            }

            if let Some(ins) = song.instrument(chn.instrument) {
                let env_on = chn.volume_env.is_active(&ins.volume_envelope);
                if !env_on {
                    if song.behaviour.test(PlayBehaviour::FT2_KEY_OFF_WITHOUT_ENVELOPE_CUTS) {
                        chn.volume = 0;
                        chn.flags.insert(ChannelFlags::FAST_VOL_RAMP);
                    } else {
                        chn.flags.insert(ChannelFlags::NOTE_FADE);
                    }
                } else if !song.module_type.is_it_family() || !was_released {
                    if song.module_type == ModuleType::Xm {
                        chn.flags.insert(ChannelFlags::NOTE_FADE);
                    }
                    envelope::release(song, chn);
                }
            } else if song.uses_instruments() || song.module_type == ModuleType::Xm {
                chn.volume = 0;
            }
        }
        self.plugin_note_off(nchn);
        if self.is_render() && self.state.channels[nchn].flags.contains(ChannelFlags::ADLIB) {
            if let Some(opl) = self.backends.opl.as_mut() {
                opl.note_off(nchn as u16);
            }
        }
    }

    /// Silence the note now. `cut_sample` also stops the sample instead of
    /// only zeroing the volume.
    pub(super) fn note_cut_now(&mut self, nchn: usize, cut_sample: bool) {
        {
            let chn = &mut self.state.channels[nchn];
            chn.volume = 0;
            chn.flags.insert(ChannelFlags::FAST_VOL_RAMP);
            if cut_sample {
                chn.increment = 0;
                chn.length = 0;
                chn.position = 0;
            }
        }
        self.plugin_note_off(nchn);
        if self.is_render() && self.state.channels[nchn].flags.contains(ChannelFlags::ADLIB) {
            if let Some(opl) = self.backends.opl.as_mut() {
                opl.note_cut(nchn as u16);
            }
        }
    }

    /// Jump to `offset` frames into the sample of the note on this row.
    pub(super) fn sample_offset(&mut self, nchn: usize, offset: u32, has_note: bool) {
        let song = self.song;
        if !has_note {
            return;
        }
        let chn = &mut self.state.channels[nchn];
        chn.prev_note_offset = offset;
        let Some(sample) = song.sample(chn.sample) else {
            return;
        };
        if sample.is_opl() || chn.length == 0 {
            return;
        }
        let len = sample.len();
        let mut offset = offset;
        if offset >= len {
            if song.behaviour.test(PlayBehaviour::IT_OFFSET) {
                offset = if song.flags.contains(SongFlags::IT_OLD_EFFECTS) {
                    len.saturating_sub(1)
                } else {
                    0
                };
            } else if song.behaviour.test(PlayBehaviour::FT2_ST3_OFFSET_OUT_OF_RANGE) {
                chn.length = 0;
                chn.position = 0;
                return;
            } else if chn.flags.contains(ChannelFlags::LOOP) {
                offset = chn.loop_start;
            } else {
                chn.length = 0;
                chn.position = 0;
                return;
            }
        }
        chn.set_position_frames(offset);
    }

    /// Play backwards from `param * 256` frames before the sample end.
    pub(super) fn reverse_offset(&mut self, nchn: usize, param: u8) {
        let chn = &mut self.state.channels[nchn];
        if chn.length == 0 {
            return;
        }
        let from_end = (param as u32) << 8;
        if from_end < chn.length {
            chn.set_position_frames(chn.length - 1 - from_end);
            chn.flags.insert(ChannelFlags::PINGPONG_FLAG);
        }
    }

    /// `Qxy` / `E9x` / `Rxy`. `param` carries `0x100` for FT2 semantics.
    pub(super) fn retrigger_note(&mut self, nchn: usize, param: u32, has_note: bool) {
        let song = self.song;
        let behaviour = song.behaviour;
        let tick = self.state.tick_in_row();
        let row_start = self.state.is_first_tick() && self.state.tick_count == 0;
        let interval = (param & 0x0F) as u8;
        let code = ((param >> 4) & 0x0F) as usize;
        let ft2 = param & 0x100 != 0;

        let fire = {
            let chn = &mut self.state.channels[nchn];
            if interval == 0 {
                false
            } else if behaviour.test(PlayBehaviour::IT_RETRIGGER) {
                if has_note && row_start {
                    chn.retrig_count = interval;
                    false
                } else if chn.retrig_count <= 1 {
                    chn.retrig_count = interval;
                    true
                } else {
                    chn.retrig_count -= 1;
                    false
                }
            } else if ft2 {
                tick % interval as u32 == 0 && !(tick == 0 && has_note)
            } else {
                if row_start && has_note {
                    chn.retrig_count = 0;
                }
                let due = chn.retrig_count % interval == 0 && !(row_start && has_note);
                chn.retrig_count = (chn.retrig_count % interval) + 1;
                due
            }
        };
        if !fire {
            return;
        }

        {
            let chn = &mut self.state.channels[nchn];
            let vol_set = matches!(chn.row.volume, VolumeCommand::Volume(_));
            if code != 0 && !(behaviour.test(PlayBehaviour::FT2_RETRIGGER) && vol_set) {
                let (mul, div) = RETRIG_MULTIPLY[code];
                chn.volume = if mul != div {
                    chn.volume * mul as i32 / div as i32
                } else {
                    chn.volume + RETRIG_ADD[code] as i32 * 4
                }
                .clamp(0, 256);
                chn.flags.insert(ChannelFlags::FAST_VOL_RAMP);
            }
        }

        let (length, note, instrument) = {
            let chn = &self.state.channels[nchn];
            (chn.length, chn.new_note, chn.instrument)
        };
        if length == 0 && behaviour.test(PlayBehaviour::SHORT_SAMPLE_RETRIG_PROTECTION) {
            return;
        }
        if note == 0 {
            return;
        }
        self.check_nna(nchn, instrument, note, false);
        self.note_change(nchn, note, false, true);
    }
}
