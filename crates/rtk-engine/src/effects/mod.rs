//! Per-tick interpretation of the pattern row.
//!
//! Every tick each pattern channel runs its row: note and instrument
//! triggers on the trigger tick, then the volume column, then the
//! effect column. Channels are processed in ascending order, which
//! matters for commands that touch shared state (global volume, tempo,
//! jumps).

mod extended;
mod note;
mod pitch;
mod volume;

pub(crate) use pitch::linear_pitch_shift;

use rtk_ir::{Effect, ModuleType, Note, PlayBehaviour, SongFlags, Tempo, VolumeCommand};

use crate::channel::{AutoSlide, ChannelFlags};
use crate::navigation::RowJumps;
use crate::play_state::{TEMPO_MAX, TEMPO_MIN};
use crate::sequencer::Sequencer;
use crate::tables::IT_VOLCOL_PORTA;

impl Sequencer<'_> {
    /// Run the effects of the current row for this tick.
    pub(crate) fn process_effects(&mut self) {
        let num = self.state.pattern_channels(self.song);
        let mut jumps = RowJumps::default();
        for nchn in 0..num {
            self.process_channel(nchn, &mut jumps);
        }
        // Row repetitions re-run first-tick effects but never jump.
        if self.state.is_first_tick() && self.state.tick_count == 0 {
            self.apply_jumps(jumps);
        }
    }

    fn process_channel(&mut self, nchn: usize, jumps: &mut RowJumps) {
        let song = self.song;
        let tick = self.state.tick_count;
        let first_tick = self.state.is_first_tick();
        let cell = self.state.channels[nchn].row;

        if let Note::Pc(event) = cell.note {
            self.parameter_control(cell.instrument, event);
            return;
        }

        let mut effect = cell.effect;
        let mut vol_cmd = cell.volume;
        let mut note = cell.note;
        let mut instr = cell.instrument as u16;

        // FT2 drops the effect column tone portamento when the volume
        // column already has one.
        if song.module_type == ModuleType::Xm
            && matches!(vol_cmd, VolumeCommand::TonePortamento(_))
            && effect.is_tone_porta()
        {
            effect = Effect::None;
        }

        // Note delay
        let speed = self.state.speed + self.state.frame_delay;
        let mut start_tick = 0u32;
        if let Some(delay) = effect.note_delay() {
            let delay = match delay {
                0 if song.module_type.is_it_family() => 1,
                d => d as u32,
            };
            if delay >= speed {
                note = Note::None;
                instr = 0;
                vol_cmd = VolumeCommand::None;
            } else {
                start_tick = delay;
            }
        }

        if first_tick && tick == 0 {
            self.row_timing(effect, jumps);
        }

        let trigger = tick == start_tick;
        if trigger {
            self.trigger_note(nchn, note, instr, vol_cmd, effect);
        }

        self.continue_auto_slides(nchn, effect, note);
        self.volume_column(nchn, vol_cmd, trigger, note);
        self.effect_column(nchn, effect, trigger, jumps);
    }

    /// Pattern delay and tick delay, evaluated once per row.
    fn row_timing(&mut self, effect: Effect, jumps: &mut RowJumps) {
        let song = self.song;
        let (Effect::ModCmdEx(p) | Effect::S3mCmdEx(p)) = effect else {
            return;
        };
        match p >> 4 {
            0xE => {
                let first_only = matches!(
                    song.module_type,
                    ModuleType::S3m | ModuleType::It | ModuleType::Mpt
                );
                if !(first_only && jumps.pattern_delay_set) {
                    self.state.pattern_delay = (p & 0x0F) as u32 + 1;
                    jumps.pattern_delay_set = true;
                }
            }
            0x6 if matches!(effect, Effect::S3mCmdEx(_)) => {
                self.state.frame_delay += (p & 0x0F) as u32;
            }
            _ => {}
        }
    }

    /// Note, instrument and volume column trigger of a row.
    fn trigger_note(
        &mut self,
        nchn: usize,
        note: Note,
        instr: u16,
        vol_cmd: VolumeCommand,
        effect: Effect,
    ) {
        let song = self.song;
        let porta = effect.is_tone_porta() || matches!(vol_cmd, VolumeCommand::TonePortamento(_));
        if note.is_note() || instr != 0 {
            self.state.channels[nchn].auto_slide = AutoSlide::empty();
        }

        match note {
            Note::On(n) if note.is_note() => {
                self.state.channels[nchn].new_note = n;
                if !porta {
                    let check_instr = if instr != 0 {
                        instr
                    } else {
                        self.state.channels[nchn].instrument
                    };
                    self.check_nna(nchn, check_instr, n, false);
                }
                if instr != 0 {
                    self.instrument_change(nchn, instr, porta, Some(n));
                } else if !song.uses_instruments() && self.state.channels[nchn].sample == 0 {
                    return;
                }
                self.note_change(nchn, n, porta, false);
            }
            Note::Off => {
                if instr != 0 && song.module_type == ModuleType::Xm {
                    self.instrument_change(nchn, instr, true, None);
                }
                self.key_off(nchn);
            }
            Note::Cut => self.note_cut_now(nchn, true),
            Note::Fade => {
                let chn = &mut self.state.channels[nchn];
                chn.flags.insert(ChannelFlags::NOTE_FADE);
            }
            _ => {
                if instr != 0 {
                    self.instrument_change(nchn, instr, porta, None);
                }
            }
        }

        let chn = &mut self.state.channels[nchn];
        match vol_cmd {
            VolumeCommand::Volume(v) => {
                chn.volume = (v.min(64) as i32) * 4;
                chn.flags.insert(ChannelFlags::FAST_VOL_RAMP);
            }
            VolumeCommand::Panning(p) => {
                chn.pan = (p.min(64) as i32) * 4;
                if song.behaviour.test(PlayBehaviour::PAN_OVERRIDES_SURROUND) {
                    chn.flags.remove(ChannelFlags::SURROUND);
                }
            }
            _ => {}
        }
    }

    /// Slides that keep running on rows that do not restate them.
    fn continue_auto_slides(&mut self, nchn: usize, effect: Effect, note: Note) {
        let song = self.song;
        if !song.behaviour.test(PlayBehaviour::CONTINUOUS_SLIDES) {
            return;
        }
        if note.is_note() {
            self.state.channels[nchn].auto_slide = AutoSlide::empty();
            return;
        }
        if !effect.is_none() || self.state.is_first_tick() {
            return;
        }
        let (slides, up, down, vol) = {
            let chn = &self.state.channels[nchn];
            (chn.auto_slide, chn.old_porta_up, chn.old_porta_down, chn.old_vol_slide)
        };
        if slides.contains(AutoSlide::PORTA_UP) {
            self.porta_up(nchn, up, false);
        }
        if slides.contains(AutoSlide::PORTA_DOWN) {
            self.porta_down(nchn, down, false);
        }
        if slides.contains(AutoSlide::TONE_PORTA) {
            self.tone_portamento(nchn, 0);
        }
        if slides.contains(AutoSlide::VOLUME) {
            self.volume_slide(nchn, vol);
        }
        if slides.contains(AutoSlide::VIBRATO) {
            self.state.channels[nchn].flags.insert(ChannelFlags::VIBRATO);
        }
    }

    fn volume_column(&mut self, nchn: usize, cmd: VolumeCommand, trigger: bool, note: Note) {
        let song = self.song;
        let first_tick = self.state.is_first_tick();
        let fast = song.flags.contains(SongFlags::FAST_VOL_SLIDES);
        let it = song.module_type.is_it_family();

        // Volume column parameters share one memory on IT.
        let remember = |chn: &mut crate::channel::ModChannel, p: u8| -> u8 {
            if !it {
                return p;
            }
            if p == 0 {
                chn.old_vol_col_param
            } else {
                chn.old_vol_col_param = p;
                p
            }
        };

        match cmd {
            VolumeCommand::None | VolumeCommand::Volume(_) | VolumeCommand::Panning(_) => {}
            VolumeCommand::VolSlideUp(p) | VolumeCommand::VolSlideDown(p) => {
                let chn = &mut self.state.channels[nchn];
                let p = remember(chn, p) as i32;
                if !first_tick || fast {
                    let delta = if matches!(cmd, VolumeCommand::VolSlideUp(_)) { p } else { -p };
                    chn.volume = (chn.volume + delta * 4).clamp(0, 256);
                }
            }
            VolumeCommand::FineVolUp(p) | VolumeCommand::FineVolDown(p) => {
                let chn = &mut self.state.channels[nchn];
                let p = remember(chn, p) as i32;
                if trigger {
                    let delta = if matches!(cmd, VolumeCommand::FineVolUp(_)) { p } else { -p };
                    chn.volume = (chn.volume + delta * 4).clamp(0, 256);
                }
            }
            VolumeCommand::VibratoSpeed(p) => {
                let chn = &mut self.state.channels[nchn];
                if p != 0 {
                    chn.vibrato_speed = p.min(15);
                }
            }
            VolumeCommand::VibratoDepth(p) => {
                let chn = &mut self.state.channels[nchn];
                if p != 0 {
                    chn.vibrato_depth = p.min(15) * 4;
                }
                chn.flags.insert(ChannelFlags::VIBRATO);
            }
            VolumeCommand::PanSlideLeft(p) | VolumeCommand::PanSlideRight(p) => {
                if !first_tick {
                    let chn = &mut self.state.channels[nchn];
                    let delta = p.min(15) as i32 * 4;
                    let delta = if matches!(cmd, VolumeCommand::PanSlideLeft(_)) { -delta } else { delta };
                    chn.pan = (chn.pan + delta).clamp(0, 256);
                }
            }
            VolumeCommand::TonePortamento(p) => {
                let speed = if it {
                    IT_VOLCOL_PORTA[(p as usize).min(IT_VOLCOL_PORTA.len() - 1)]
                } else {
                    p.min(15) << 4
                };
                self.tone_portamento(nchn, speed);
            }
            VolumeCommand::PortaUp(p) => {
                let p = remember(&mut self.state.channels[nchn], p);
                self.porta_up(nchn, p, true);
            }
            VolumeCommand::PortaDown(p) => {
                let p = remember(&mut self.state.channels[nchn], p);
                self.porta_down(nchn, p, true);
            }
            VolumeCommand::Offset(p) => {
                if trigger && p != 0 {
                    let cue = song
                        .sample(self.state.channels[nchn].sample)
                        .and_then(|s| s.cues.get(p as usize - 1).copied())
                        .unwrap_or(0);
                    self.sample_offset(nchn, cue, note.is_note());
                }
            }
        }
    }

    fn effect_column(&mut self, nchn: usize, effect: Effect, trigger: bool, jumps: &mut RowJumps) {
        let song = self.song;
        let first_tick = self.state.is_first_tick();
        let row_start = first_tick && self.state.tick_count == 0;
        let it = song.module_type.is_it_family();
        let has_note = self.state.channels[nchn].row.note.is_note();
        let effect = self.st3_shared_memory(nchn, effect);

        {
            let chn = &mut self.state.channels[nchn];
            chn.command = effect;
            if first_tick {
                chn.flags.remove(
                    ChannelFlags::VIBRATO
                        | ChannelFlags::TREMOLO
                        | ChannelFlags::PORTAMENTO
                        | ChannelFlags::TREMOR_OFF,
                );
            }
        }

        match effect {
            Effect::None | Effect::Xparam(_) => {}
            Effect::Arpeggio(p) => {
                let chn = &mut self.state.channels[nchn];
                if p != 0 || !matches!(song.module_type, ModuleType::It | ModuleType::Mpt | ModuleType::S3m) {
                    chn.arpeggio = p;
                }
            }
            Effect::PortamentoUp(p) => {
                self.porta_up(nchn, p, false);
                self.mark_auto_slide(nchn, AutoSlide::PORTA_UP);
            }
            Effect::PortamentoDown(p) => {
                self.porta_down(nchn, p, false);
                self.mark_auto_slide(nchn, AutoSlide::PORTA_DOWN);
            }
            Effect::ExtraFinePorta(p) => {
                if row_start {
                    self.extra_fine_porta(nchn, p);
                }
            }
            Effect::TonePortamento(p) => {
                self.tone_portamento(nchn, p);
                self.mark_auto_slide(nchn, AutoSlide::TONE_PORTA);
            }
            Effect::TonePortaVol(p) => {
                self.tone_portamento(nchn, 0);
                self.volume_slide(nchn, p);
            }
            Effect::Vibrato(p) => {
                self.vibrato(nchn, p, 4);
                self.mark_auto_slide(nchn, AutoSlide::VIBRATO);
            }
            Effect::FineVibrato(p) => self.vibrato(nchn, p, 1),
            Effect::VibratoVol(p) => {
                self.vibrato(nchn, 0, 4);
                self.volume_slide(nchn, p);
            }
            Effect::Tremolo(p) => self.tremolo(nchn, p),
            Effect::Panbrello(p) => self.panbrello(nchn, p),
            Effect::Tremor(p) => self.tremor(nchn, p),
            Effect::Volume(p) => {
                if row_start {
                    let chn = &mut self.state.channels[nchn];
                    chn.volume = (p.min(64) as i32) * 4;
                    chn.flags.insert(ChannelFlags::FAST_VOL_RAMP);
                }
            }
            Effect::VolumeSlide(p) => {
                self.volume_slide(nchn, p);
                self.mark_auto_slide(nchn, AutoSlide::VOLUME);
            }
            Effect::ChannelVolume(p) => {
                if row_start && p <= 64 {
                    self.state.channels[nchn].channel_volume = p as i32;
                }
            }
            Effect::ChannelVolSlide(p) => self.channel_volume_slide(nchn, p),
            Effect::GlobalVolume(p) => {
                if row_start {
                    self.set_global_volume(p);
                }
            }
            Effect::GlobalVolSlide(p) => self.global_volume_slide(nchn, p),
            Effect::Panning8(p) => {
                if row_start {
                    let pan = if song.module_type == ModuleType::S3m {
                        if p > 0x80 {
                            return;
                        }
                        p as i32 * 2
                    } else if p == 0xFF {
                        256
                    } else {
                        p as i32
                    };
                    self.set_pan(nchn, pan);
                }
            }
            Effect::PanningSlide(p) => self.panning_slide(nchn, p),
            Effect::Offset(p) => {
                if trigger {
                    if song.module_type == ModuleType::Xm && self.state.channels[nchn].row.effect.is_tone_porta() {
                        return;
                    }
                    let chn = &mut self.state.channels[nchn];
                    let mut value = p as u32;
                    if value == 0 {
                        value = (chn.old_offset >> 8) & 0xFF;
                    } else {
                        chn.old_offset = value << 8;
                    }
                    let high = chn.old_high_offset as u32;
                    let value = self.xparam(nchn, value);
                    let offset = (value << 8) + (high << 16);
                    self.sample_offset(nchn, offset, has_note);
                }
            }
            Effect::OffsetPercentage(p) => {
                if trigger {
                    let len = song
                        .sample(self.state.channels[nchn].sample)
                        .map(|s| s.len())
                        .unwrap_or(0);
                    let offset = (len as u64 * p as u64 / 256) as u32;
                    self.sample_offset(nchn, offset, has_note);
                }
            }
            Effect::ReverseOffset(p) => {
                if trigger {
                    self.reverse_offset(nchn, p);
                }
            }
            Effect::Retrigger(p) => {
                let chn = &mut self.state.channels[nchn];
                let mut param = p;
                if song.module_type == ModuleType::Xm {
                    // FT2 keeps each nibble separately.
                    if param & 0xF0 == 0 {
                        param |= chn.retrig_param & 0xF0;
                    }
                    if param & 0x0F == 0 {
                        param |= chn.retrig_param & 0x0F;
                    }
                } else if param == 0 {
                    param = chn.retrig_param;
                }
                chn.retrig_param = param;
                let merged = if song.module_type == ModuleType::Xm {
                    param as u32 | 0x100
                } else {
                    param as u32
                };
                self.retrigger_note(nchn, merged, has_note);
            }
            Effect::KeyOff(p) => {
                if self.state.tick_in_row() == p as u32 {
                    self.key_off(nchn);
                }
            }
            Effect::FineTune(p) => {
                if row_start {
                    let chn = &mut self.state.channels[nchn];
                    chn.fine_tune = p as i8 as i32;
                    if has_note {
                        self.refresh_note_period(nchn);
                    }
                }
            }
            Effect::SetEnvPosition(p) => {
                if row_start {
                    let chn = &mut self.state.channels[nchn];
                    chn.volume_env.position = p as u32;
                    if song.module_type == ModuleType::Xm {
                        chn.pan_env.position = p as u32;
                    }
                }
            }
            Effect::PositionJump(p) => {
                if row_start {
                    jumps.position_jump = self.position_jump_target(nchn, p);
                    if song.behaviour.test(PlayBehaviour::JUMP_RESETS_BREAK_ROW) {
                        jumps.break_row = None;
                    }
                }
            }
            Effect::PatternBreak(p) => {
                if row_start {
                    if let Some(row) = self.pattern_break_row(nchn, p) {
                        jumps.break_row = Some(row);
                    }
                }
            }
            Effect::Speed(p) => {
                if row_start && p != 0 {
                    self.state.speed = p as u32;
                }
            }
            Effect::Tempo(p) => self.tempo_command(nchn, p),
            Effect::ModCmdEx(p) => self.mod_extended(nchn, p, jumps),
            Effect::S3mCmdEx(p) => self.s3m_extended(nchn, p, jumps),
            Effect::DelayCut(p) => {
                let (delay, cut) = ((p >> 4) as u32, (p & 0x0F) as u32);
                if cut != 0 && self.state.tick_in_row() == delay + cut {
                    self.note_cut_now(nchn, it);
                }
            }
            Effect::MidiMacro(p) => {
                if row_start {
                    self.midi_macro_command(nchn, p, false);
                }
            }
            Effect::SmoothMidi(p) => self.midi_macro_command(nchn, p, true),
        }
    }

    /// ST3 keeps one parameter memory for most slide commands.
    fn st3_shared_memory(&mut self, nchn: usize, effect: Effect) -> Effect {
        if !self.song.behaviour.test(PlayBehaviour::ST3_EFFECT_MEMORY) {
            return effect;
        }
        let shared = matches!(
            effect,
            Effect::PortamentoUp(_)
                | Effect::PortamentoDown(_)
                | Effect::VolumeSlide(_)
                | Effect::VibratoVol(_)
                | Effect::TonePortaVol(_)
                | Effect::Tremor(_)
                | Effect::Retrigger(_)
                | Effect::Tremolo(_)
        );
        if !shared {
            return effect;
        }
        let chn = &mut self.state.channels[nchn];
        match effect.param() {
            0 => effect.with_param(chn.st3_memory),
            p => {
                chn.st3_memory = p;
                effect
            }
        }
    }

    fn mark_auto_slide(&mut self, nchn: usize, slide: AutoSlide) {
        if self.song.behaviour.test(PlayBehaviour::CONTINUOUS_SLIDES) {
            self.state.channels[nchn].auto_slide.insert(slide);
        }
    }

    /// `Txx`: set tempo, or slide it with `T0x`/`T1x`.
    fn tempo_command(&mut self, nchn: usize, param: u8) {
        let song = self.song;
        let first_tick = self.state.is_first_tick();
        let mut param = param;
        if matches!(song.module_type, ModuleType::S3m | ModuleType::It | ModuleType::Mpt) {
            let chn = &mut self.state.channels[nchn];
            if param == 0 {
                param = chn.old_tempo;
            } else {
                chn.old_tempo = param;
            }
        }
        if param >= 0x20 {
            let apply_tick = if song.behaviour.test(PlayBehaviour::MOD_TEMPO_ON_SECOND_TICK) {
                self.state.tick_in_row() == 1 || (self.state.speed == 1 && first_tick)
            } else {
                first_tick && self.state.tick_count == 0
            };
            if apply_tick {
                let bpm = self.xparam(nchn, param as u32);
                self.state.tempo = Tempo::new(bpm, 0).clamp(TEMPO_MIN, TEMPO_MAX);
            }
        } else if !first_tick
            || (song.behaviour.test(PlayBehaviour::SLIDES_AT_SPEED_1) && self.state.speed == 1)
        {
            let step = Tempo::new((param & 0x0F) as u32, 0);
            self.state.tempo = if param & 0xF0 == 0x10 {
                self.state.tempo.saturating_add(step)
            } else {
                self.state.tempo.saturating_sub(step)
            }
            .clamp(TEMPO_MIN, TEMPO_MAX);
        }
    }
}
