//! Main playback engine.

use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;

use rtk_ir::{Song, Tempo};

use crate::backend::{InstrumentPlugin, OplBackend};
use crate::channel::ChannelFlags;
use crate::error::Result;
use crate::frame::Frame;
use crate::length::{self, GetLengthResult, GetLengthTarget};
use crate::mixer::{Mixer, SampleMixer};
use crate::play_state::{first_playable_order, PlayFlags, PlayState};
use crate::sequencer::{Backends, ProcessMode, Sequencer};
use crate::settings::MixerSettings;
use crate::visited::RowVisitor;

/// How [`Engine::set_position_by_time`] treats voices that started
/// before the target time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SeekMode {
    /// Voices are silenced; playback resumes with the next notes.
    #[default]
    Fast,
    /// Voices keep sounding from where playback would have them.
    SampleAccurate,
}

/// Linear fade to silence over a fixed number of frames.
#[derive(Clone, Copy, Debug)]
struct Fade {
    total: u32,
    left: u32,
}

impl Fade {
    fn new(frames: u32) -> Self {
        let frames = frames.max(1);
        Self {
            total: frames,
            left: frames,
        }
    }

    /// Scale `frames` along the fade. Returns how many were rendered
    /// before it reached silence.
    fn apply(&mut self, frames: &mut [Frame]) -> usize {
        for (i, frame) in frames.iter_mut().enumerate() {
            if self.left == 0 {
                return i;
            }
            let gain = ((self.left as u64) << 16) / self.total as u64;
            frame.apply_gain(gain as u32);
            self.left -= 1;
        }
        frames.len()
    }
}

/// The main playback engine.
pub struct Engine {
    /// The song being played
    song: Song,
    /// Position, timing and channels
    state: PlayState,
    /// Rows played since the last loop-back
    visitor: RowVisitor,
    backends: Backends,
    settings: MixerSettings,
    mixer: Box<dyn Mixer>,
    /// Pattern loop jumps the length calculator may take
    loop_budget: u64,
    fade: Option<Fade>,
    /// No more frames will be rendered
    ended: bool,
}

impl Engine {
    /// Create a new engine for the given song.
    pub fn new(song: Song, sample_rate: u32) -> Self {
        Self::with_settings(song, MixerSettings::with_sample_rate(sample_rate))
    }

    /// Create an engine, clamping out-of-range settings.
    pub fn with_settings(song: Song, settings: MixerSettings) -> Self {
        let settings = settings.clamped();
        for issue in song.validate() {
            log::warn!("{issue}");
        }
        let state = PlayState::new(&song);
        let visitor = RowVisitor::new(&song);
        Self {
            mixer: Box::new(SampleMixer::new(settings.preamp)),
            loop_budget: settings.loop_budget,
            song,
            state,
            visitor,
            backends: Backends::default(),
            settings,
            fade: None,
            ended: false,
        }
    }

    /// Create an engine, rejecting out-of-range settings.
    pub fn try_with_settings(song: Song, settings: MixerSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self::with_settings(song, settings))
    }

    pub fn set_plugin_backend(&mut self, plugin: Box<dyn InstrumentPlugin>) {
        self.backends.plugin = Some(plugin);
    }

    pub fn set_opl_backend(&mut self, opl: Box<dyn OplBackend>) {
        self.backends.opl = Some(opl);
    }

    /// Replace the built-in [`SampleMixer`].
    pub fn set_mixer(&mut self, mixer: Box<dyn Mixer>) {
        self.mixer = mixer;
    }

    fn sequencer(&mut self, mode: ProcessMode) -> Sequencer<'_> {
        Sequencer::new(
            &self.song,
            &mut self.state,
            &mut self.visitor,
            &mut self.backends,
            &self.settings,
            mode,
        )
    }

    /// Render up to `out.len()` frames. Returns how many were written,
    /// 0 once the song ended and its fade-out finished.
    ///
    /// With the `alloc_check` feature, rendering runs inside
    /// `assert_no_alloc` and aborts on a heap allocation when the
    /// application installs its `AllocDisabler`.
    pub fn read(&mut self, out: &mut [Frame]) -> usize {
        #[cfg(feature = "alloc_check")]
        return assert_no_alloc::assert_no_alloc(|| self.render_into(out));
        #[cfg(not(feature = "alloc_check"))]
        self.render_into(out)
    }

    fn render_into(&mut self, out: &mut [Frame]) -> usize {
        let mut done = 0;
        while done < out.len() && !self.ended {
            if self.state.buffer_count == 0 {
                if self.state.flags.contains(PlayFlags::END_REACHED) {
                    self.ended = true;
                    break;
                }
                if !self.next_tick() {
                    self.begin_end_fade();
                    continue;
                }
            }

            let n = (out.len() - done).min(self.state.buffer_count as usize);
            let chunk = &mut out[done..done + n];
            self.mixer.mix(
                &self.song,
                &mut self.state.channels,
                &self.state.mix_channels,
                chunk,
            );
            let mut rendered = n;
            if let Some(fade) = self.fade.as_mut() {
                rendered = fade.apply(chunk);
                if fade.left == 0 {
                    chunk[rendered..].fill(Frame::silence());
                    self.ended = true;
                }
            }
            self.state.buffer_count -= n as u32;
            done += rendered;
        }
        done
    }

    /// Render `frames` frames, fewer if the song ends first.
    pub fn render_frames(&mut self, frames: usize) -> Vec<Frame> {
        let mut out = vec![Frame::silence(); frames];
        let n = self.read(&mut out);
        out.truncate(n);
        out
    }

    /// Process the next tick. `false` when the song is over.
    fn next_tick(&mut self) -> bool {
        if !self.sequencer(ProcessMode::Render).read_note() {
            return false;
        }
        self.state.buffer_count = self.state.samples_per_tick;
        true
    }

    /// Let the voices that are still sounding fade out.
    fn begin_end_fade(&mut self) {
        self.state.flags.insert(PlayFlags::END_REACHED);
        if self.fade.is_none() {
            let frames = self.settings.end_fade_frames();
            if frames == 0 || self.state.mix_channels.is_empty() {
                self.ended = true;
                return;
            }
            self.fade = Some(Fade::new(frames));
        }
        self.state.buffer_count = self.fade.map_or(0, |f| f.left);
    }

    /// Fade out over `ms` milliseconds, then end.
    pub fn fade_song(&mut self, ms: u32) {
        let frames = (self.settings.sample_rate as u64 * ms as u64 / 1000).min(u32::MAX as u64);
        self.fade = Some(Fade::new(frames as u32));
        self.state.flags.insert(PlayFlags::FADING);
    }

    /// Times the song restarts after its end: -1 forever, 0 play once.
    pub fn set_repeat_count(&mut self, count: i32) {
        self.state.repeat_count = count.max(-1);
    }

    /// Mute or unmute a pattern channel and the voices it left playing
    /// in the background. Muted voices keep advancing silently.
    pub fn set_channel_mute(&mut self, channel: u16, muted: bool) {
        if channel as usize >= self.state.pattern_channels(&self.song) {
            return;
        }
        for (nchn, chn) in self.state.channels.iter_mut().enumerate() {
            if nchn == channel as usize || chn.master_channel == channel + 1 {
                chn.flags.set(ChannelFlags::MUTE, muted);
            }
        }
    }

    /// Song duration, or the time until a position or time target.
    /// [`GetLengthTarget::AllSubsongs`] returns one result per subsong,
    /// the other targets a single one for the subsong being played.
    ///
    /// A result whose pattern loops ran out of budget reports an infinite
    /// duration, and the budget for later calls is halved.
    pub fn get_length(&mut self, target: GetLengthTarget) -> Vec<GetLengthResult> {
        if matches!(target, GetLengthTarget::AllSubsongs) {
            return length::all_subsongs(&self.song, &self.settings, &mut self.loop_budget);
        }
        let start = self.subsong_start();
        let visitor = RowVisitor::new(&self.song);
        let run = length::replay(&self.song, &self.settings, start, target, self.loop_budget, false, visitor);
        if run.result.is_infinite() {
            self.loop_budget = (self.loop_budget / 2).max(1);
        }
        vec![run.result]
    }

    /// First order of the subsong the current order belongs to.
    fn subsong_start(&self) -> u16 {
        let starts = self.song.order().subsong_starts();
        starts
            .iter()
            .rev()
            .copied()
            .find(|&s| s <= self.state.order)
            .or_else(|| first_playable_order(&self.song, 0))
            .unwrap_or(0)
    }

    /// Continue playback `seconds` into the current subsong. Returns
    /// `false` if the song is shorter; playback then ends.
    pub fn set_position_by_time(&mut self, seconds: f64, mode: SeekMode) -> bool {
        let start = self.subsong_start();
        let target = GetLengthTarget::Time(seconds.max(0.0));
        let sync = mode == SeekMode::SampleAccurate;
        let visitor = RowVisitor::new(&self.song);
        let run = length::replay(&self.song, &self.settings, start, target, self.loop_budget, sync, visitor);
        if run.result.target_reached {
            log::debug!(
                "seek to {seconds:.3}s lands on order {}, row {}",
                run.state.order,
                run.state.row
            );
        } else {
            log::debug!(
                "seek to {seconds:.3}s is past the end of the song ({:.3}s)",
                run.result.duration
            );
        }
        self.adopt(run.state, run.visitor, mode);
        if !run.result.target_reached {
            self.sequencer(ProcessMode::Render).silence_all();
            self.state.flags.insert(PlayFlags::END_REACHED);
            self.ended = true;
        }
        run.result.target_reached
    }

    /// Continue playback at `order` and `row`. Returns `false` if no
    /// pattern plays at or after `order`.
    pub fn set_position(&mut self, order: u16, row: u16) -> bool {
        let Some(target) = first_playable_order(&self.song, order) else {
            log::debug!("no pattern to play at or after order {order}");
            return false;
        };
        log::debug!("position set to order {target}, row {row}");
        {
            let mut seq = self.sequencer(ProcessMode::Render);
            seq.silence_all();
            seq.jump_to(target, row);
        }
        let num = self.state.pattern_channels(&self.song);
        for chn in self.state.channels.iter_mut().take(num) {
            chn.pattern_loop_count = 0;
            chn.pattern_loop_row = 0;
        }
        self.state.buffer_count = 0;
        self.state.flags.remove(PlayFlags::END_REACHED | PlayFlags::FADING);
        self.visitor.clear();
        self.fade = None;
        self.ended = false;
        true
    }

    /// Switch to a replayed state, keeping runtime mutes and the repeat
    /// count of the live one.
    fn adopt(&mut self, mut state: PlayState, visitor: RowVisitor, mode: SeekMode) {
        self.sequencer(ProcessMode::Render).silence_all();
        state.repeat_count = self.state.repeat_count;
        for (new, old) in state.channels.iter_mut().zip(&self.state.channels) {
            new.flags
                .set(ChannelFlags::MUTE, old.flags.contains(ChannelFlags::MUTE));
        }
        if mode == SeekMode::Fast {
            state.channels.iter_mut().for_each(|chn| chn.stop());
        }
        state.buffer_count = 0;
        state.flags.remove(PlayFlags::END_REACHED | PlayFlags::FADING);
        self.state = state;
        self.visitor = visitor;
        self.fade = None;
        self.ended = false;
    }

    pub fn play_state(&self) -> &PlayState {
        &self.state
    }

    pub fn song(&self) -> &Song {
        &self.song
    }

    pub fn settings(&self) -> &MixerSettings {
        &self.settings
    }

    pub fn current_order(&self) -> u16 {
        self.state.order
    }

    pub fn current_row(&self) -> u16 {
        self.state.row
    }

    /// Ticks per row
    pub fn current_speed(&self) -> u32 {
        self.state.speed
    }

    pub fn current_tempo(&self) -> Tempo {
        self.state.tempo
    }

    /// The song and its fade-out are over.
    pub fn song_ended(&self) -> bool {
        self.ended
    }

    /// Pattern loop jumps left to the length calculator.
    pub fn loop_budget(&self) -> u64 {
        self.loop_budget
    }
}

impl Sequencer<'_> {
    /// Stop every voice and release the notes held by the backends.
    fn silence_all(&mut self) {
        for nchn in 0..self.state.channels.len() {
            self.plugin_note_off(nchn);
            if self.state.channels[nchn].flags.contains(ChannelFlags::ADLIB) {
                if let Some(opl) = self.backends.opl.as_mut() {
                    opl.note_cut(nchn as u16);
                }
            }
            self.state.channels[nchn].stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use crate::testing::make_song;
    use rtk_ir::{Cell, Effect, ModuleType};

    const RATE: u32 = 44100;
    /// Frames per tick at 125 BPM.
    const TICK: usize = 882;

    fn note_song() -> Song {
        make_song(ModuleType::Mod, 1, &[(0, 0, Cell::note(49, 1))])
    }

    fn render_all(engine: &mut Engine) -> usize {
        let mut buf = [Frame::silence(); 1000];
        let mut total = 0;
        loop {
            let n = engine.read(&mut buf);
            if n == 0 {
                return total;
            }
            total += n;
        }
    }

    #[test]
    fn renders_whole_song() {
        let mut engine = Engine::new(note_song(), RATE);
        let first = engine.render_frames(200);
        assert!(first.iter().any(|f| !f.is_silent()));
        // The sample ended long before the song, so there is nothing to fade.
        assert_eq!(200 + render_all(&mut engine), 64 * 6 * TICK);
        assert!(engine.song_ended());
        assert_eq!(engine.read(&mut [Frame::silence(); 4]), 0);
    }

    #[test]
    fn fade_song_ends_playback() {
        let mut engine = Engine::new(note_song(), RATE);
        engine.fade_song(10);
        let frames = engine.render_frames(1000);
        assert_eq!(frames.len(), 441);
        assert!(engine.song_ended());
    }

    #[test]
    fn repeat_count_plays_twice() {
        let mut engine = Engine::new(note_song(), RATE);
        engine.set_repeat_count(1);
        assert_eq!(render_all(&mut engine), 2 * 64 * 6 * TICK);
    }

    #[test]
    fn muted_channel_is_silent() {
        let mut engine = Engine::new(note_song(), RATE);
        engine.set_channel_mute(0, true);
        let frames = engine.render_frames(400);
        assert!(frames.iter().all(Frame::is_silent));
    }

    #[test]
    fn seek_by_time_resumes_on_next_tick() {
        let mut engine = Engine::new(note_song(), RATE);
        // Rows last 0.12 s, so 1.21 s falls in the first tick of row 10.
        assert!(engine.set_position_by_time(1.21, SeekMode::Fast));
        assert_eq!(engine.current_row(), 10);
        engine.render_frames(1);
        assert_eq!(engine.current_row(), 10);
        assert_eq!(engine.play_state().tick_count, 1);
    }

    #[test]
    fn seek_past_end_ends_song() {
        let mut engine = Engine::new(note_song(), RATE);
        assert!(!engine.set_position_by_time(1000.0, SeekMode::Fast));
        assert_eq!(render_all(&mut engine), 0);
        assert!(engine.song_ended());

        let mut engine = Engine::new(note_song(), RATE);
        assert!(!engine.set_position_by_time(1000.0, SeekMode::SampleAccurate));
        assert_eq!(engine.read(&mut [Frame::silence(); 64]), 0);
    }

    #[test]
    fn seek_back_after_seeking_past_end_resumes() {
        let mut engine = Engine::new(note_song(), RATE);
        engine.set_position_by_time(1000.0, SeekMode::Fast);
        assert!(engine.set_position_by_time(0.5, SeekMode::Fast));
        assert!(!engine.song_ended());
        assert_eq!(engine.read(&mut [Frame::silence(); 64]), 64);
    }

    #[test]
    fn sample_accurate_seek_keeps_voice() {
        let mut engine = Engine::new(note_song(), RATE);
        engine.set_position_by_time(0.001, SeekMode::SampleAccurate);
        assert_ne!(engine.play_state().channels[0].length, 0);
        assert!(engine.play_state().channels[0].position_frames() > 0);

        let mut fast = Engine::new(note_song(), RATE);
        fast.set_position_by_time(0.001, SeekMode::Fast);
        assert_eq!(fast.play_state().channels[0].length, 0);
    }

    #[test]
    fn set_position_jumps_to_row() {
        let mut engine = Engine::new(note_song(), RATE);
        engine.render_frames(TICK * 7);
        assert!(engine.set_position(0, 32));
        engine.render_frames(1);
        assert_eq!((engine.current_order(), engine.current_row()), (0, 32));
        assert!(!engine.set_position(9, 0));
    }

    #[test]
    fn length_of_whole_song() {
        let mut engine = Engine::new(note_song(), RATE);
        let results = engine.get_length(GetLengthTarget::End);
        assert_eq!(results.len(), 1);
        assert!((results[0].duration - 64.0 * 0.12).abs() < 1e-9);
    }

    #[test]
    fn loop_budget_halves_after_overflow() {
        let song = make_song(
            ModuleType::Mod,
            1,
            &[(2, 0, Cell::empty().with_effect(Effect::ModCmdEx(0x63)))],
        );
        let settings = MixerSettings {
            loop_budget: 2,
            ..MixerSettings::default()
        };
        let mut engine = Engine::with_settings(song, settings);
        let result = engine.get_length(GetLengthTarget::End)[0];
        assert!(result.is_infinite());
        assert!(!result.target_reached);
        assert_eq!(engine.loop_budget(), 1);
    }

    #[test]
    fn invalid_settings_rejected() {
        let settings = MixerSettings::with_sample_rate(0);
        let err = Engine::try_with_settings(note_song(), settings.clone()).err();
        assert!(matches!(err, Some(ConfigError::SampleRate { rate: 0, .. })));
        assert_eq!(Engine::with_settings(note_song(), settings).settings().sample_rate, 4000);
    }
}
