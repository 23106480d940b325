//! Allocation-free render path tests.
//!
//! These tests verify that `Engine::read()` does not allocate once the
//! engine is built. They render programmatic modules for several seconds
//! to catch allocations triggered by new-note actions, MIDI macros,
//! pattern loops or sample edge cases.
//!
//! Just run `cargo test`, no feature flags needed.

use assert_no_alloc::{assert_no_alloc, AllocDisabler};

#[cfg(debug_assertions)]
#[global_allocator]
static A: AllocDisabler = AllocDisabler;

use retracker::ir::{
    Cell, Effect, Instrument, NewNoteAction, OrderList, Pattern, Sample, SampleData, VolumeCommand,
};
use retracker::{Engine, Frame, ModuleType, Song};

fn looping_sample() -> Sample {
    let mut sample = Sample::new("tri");
    let data = (0..2048).map(|i: i32| ((i % 512) - 256) as i16 * 64).collect();
    sample.data = SampleData::Mono16(data);
    sample.set_loop(256, 2048, true);
    sample
}

/// Four channels of notes with continuing NNA, so background voices
/// pile up, plus loops, macros and delays.
fn busy_song() -> Song {
    let mut song = Song::with_channels(ModuleType::It, 4);
    let mut ins = Instrument::new("pad");
    ins.set_single_sample(1);
    ins.new_note_action = NewNoteAction::Continue;
    ins.fadeout = 256;
    song.instruments.push(ins);
    song.samples.push(looping_sample());

    let mut pattern = Pattern::new(32, 4);
    for row in 0..32u16 {
        let note = 40 + (row % 12) as u8;
        pattern.set(row, 0, Cell::note(note, 1).with_effect(Effect::Vibrato(0x48)));
        if row % 2 == 0 {
            let cell = Cell::note(note + 7, 1).with_volume(VolumeCommand::Volume(40));
            pattern.set(row, 1, cell.with_effect(Effect::MidiMacro(0x20)));
        }
    }
    pattern.set(0, 2, Cell::empty().with_effect(Effect::S3mCmdEx(0xB0)));
    pattern.set(15, 2, Cell::empty().with_effect(Effect::S3mCmdEx(0xB2)));
    pattern.set(8, 3, Cell::note(60, 1).with_effect(Effect::S3mCmdEx(0xD2)));
    pattern.set(20, 3, Cell::note(64, 1).with_effect(Effect::Retrigger(0x02)));
    song.patterns.push(pattern);
    song.sequences.push(OrderList::new(&[0, 0, 0]));
    song
}

/// Render a song for `duration_frames`, aborting on any heap allocation.
fn assert_render_alloc_free(song: Song, duration_frames: usize) {
    let mut engine = Engine::new(song, 44100);
    engine.set_repeat_count(-1);
    let mut buf = [Frame::silence(); 512];

    assert_no_alloc(|| {
        let mut rendered = 0;
        while rendered < duration_frames {
            rendered += engine.read(&mut buf);
        }
    });
}

#[test]
fn busy_song_alloc_free() {
    assert_render_alloc_free(busy_song(), 44100 * 5);
}

#[test]
fn fade_out_alloc_free() {
    let mut engine = Engine::new(busy_song(), 44100);
    let mut buf = [Frame::silence(); 512];
    engine.read(&mut buf);
    engine.fade_song(200);
    assert_no_alloc(|| while engine.read(&mut buf) > 0 {});
    assert!(engine.song_ended());
}
