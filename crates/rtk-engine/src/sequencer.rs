//! The playback context threaded through row, effect and tick processing.
//!
//! `Sequencer` borrows the song, the playback state and the backends for
//! the duration of one tick. Its methods are spread over the
//! `navigation`, `effects`, `nna`, `midi_macro` and `render` modules.

use alloc::boxed::Box;

use rtk_ir::Song;

use crate::backend::{InstrumentPlugin, OplBackend};
use crate::play_state::PlayState;
use crate::settings::MixerSettings;
use crate::visited::RowVisitor;

/// Optional external backends. Either may be absent.
#[derive(Default)]
pub(crate) struct Backends {
    pub plugin: Option<Box<dyn InstrumentPlugin>>,
    pub opl: Option<Box<dyn OplBackend>>,
}

/// What a tick is processed for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ProcessMode {
    /// Audible playback: backends, NNA and volume ramps are live.
    Render,
    /// Duration and seek replay. Voices are only tracked when
    /// `sync_samples` asks for sample positions to follow the song.
    Length { sync_samples: bool },
}

pub(crate) struct Sequencer<'a> {
    pub song: &'a Song,
    pub state: &'a mut PlayState,
    pub visitor: &'a mut RowVisitor,
    pub backends: &'a mut Backends,
    pub settings: &'a MixerSettings,
    pub mode: ProcessMode,
    /// Pattern loop jumps taken so far, for the length calculator's budget
    pub loop_jumps: u64,
}

impl<'a> Sequencer<'a> {
    pub fn new(
        song: &'a Song,
        state: &'a mut PlayState,
        visitor: &'a mut RowVisitor,
        backends: &'a mut Backends,
        settings: &'a MixerSettings,
        mode: ProcessMode,
    ) -> Self {
        Self {
            song,
            state,
            visitor,
            backends,
            settings,
            mode,
            loop_jumps: 0,
        }
    }

    #[inline]
    pub fn is_render(&self) -> bool {
        self.mode == ProcessMode::Render
    }

    /// Voices are simulated: rendering, or seeking with sample sync.
    #[inline]
    pub fn tracks_voices(&self) -> bool {
        matches!(
            self.mode,
            ProcessMode::Render | ProcessMode::Length { sync_samples: true }
        )
    }

    /// Plugin slot a pattern channel's events go to: the instrument's
    /// plugin, else the channel's, 0 for none.
    pub fn plugin_for(&self, nchn: usize) -> u8 {
        let song = self.song;
        let chn = &self.state.channels[nchn];
        let master = if chn.master_channel > 0 {
            chn.master_channel as usize - 1
        } else {
            nchn
        };
        song.instrument(chn.instrument)
            .map(|ins| ins.plugin)
            .filter(|&p| p != 0)
            .or_else(|| song.channels.get(master).map(|c| c.plugin))
            .unwrap_or(0)
    }
}
