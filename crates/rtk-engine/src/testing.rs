//! Programmatic songs and a sequencer rig for unit tests.

use alloc::vec;

use rtk_ir::{Cell, ModuleType, OrderList, Pattern, Sample, SampleData, Song};

use crate::channel::ModChannel;
use crate::play_state::PlayState;
use crate::sequencer::{Backends, ProcessMode, Sequencer};
use crate::settings::MixerSettings;
use crate::visited::RowVisitor;

/// A song with one 64-row pattern and one 1000-frame sample. `cells` are
/// `(row, channel, cell)`.
pub(crate) fn make_song(module_type: ModuleType, channels: u16, cells: &[(u16, u16, Cell)]) -> Song {
    let mut song = Song::with_channels(module_type, channels);
    let mut pattern = Pattern::new(64, channels);
    for &(row, chn, cell) in cells {
        pattern.set(row, chn, cell);
    }
    song.patterns.push(pattern);
    song.sequences.push(OrderList::new(&[0]));
    let mut sample = Sample::new("square");
    sample.data = SampleData::Mono16(vec![8000; 1000]);
    song.samples.push(sample);
    song
}

/// Everything a [`Sequencer`] borrows, owned in one place.
pub(crate) struct Rig {
    pub song: Song,
    pub state: PlayState,
    pub visitor: RowVisitor,
    pub backends: Backends,
    pub settings: MixerSettings,
}

impl Rig {
    pub fn new(song: Song) -> Self {
        let state = PlayState::new(&song);
        let visitor = RowVisitor::new(&song);
        Self {
            song,
            state,
            visitor,
            backends: Backends::default(),
            settings: MixerSettings::default(),
        }
    }

    pub fn seq(&mut self) -> Sequencer<'_> {
        Sequencer::new(
            &self.song,
            &mut self.state,
            &mut self.visitor,
            &mut self.backends,
            &self.settings,
            ProcessMode::Render,
        )
    }

    /// Advance one tick and run its effects. `false` once the song ended.
    pub fn tick(&mut self) -> bool {
        let mut seq = self.seq();
        if !seq.process_row() {
            return false;
        }
        seq.process_effects();
        true
    }

    pub fn ticks(&mut self, n: usize) {
        for _ in 0..n {
            self.tick();
        }
    }

    pub fn chn(&self, nchn: usize) -> &ModChannel {
        &self.state.channels[nchn]
    }

    pub fn chn_mut(&mut self, nchn: usize) -> &mut ModChannel {
        &mut self.state.channels[nchn]
    }
}
