//! End-to-end playback through the `retracker` facade.

use retracker::ir::{Cell, Effect, OrderList, Pattern, Sample, SampleData};
use retracker::{Engine, Frame, GetLengthTarget, ModuleType, SeekMode, Song};

const RATE: u32 = 44100;

/// Two channels playing a square wave for four 16-row patterns.
fn square_song(module_type: ModuleType) -> Song {
    let mut song = Song::with_channels(module_type, 2);
    let mut sample = Sample::new("square");
    let data = (0..64).map(|i| if i < 32 { 96i8 } else { -96 }).collect();
    sample.data = SampleData::Mono8(data);
    sample.set_loop(0, 64, false);
    song.samples.push(sample);

    let mut pattern = Pattern::new(16, 2);
    for row in (0..16u16).step_by(4) {
        pattern.set(row, 0, Cell::note(49 + row as u8, 1));
        pattern.set(row + 2, 1, Cell::note(37, 1).with_effect(Effect::VolumeSlide(0x01)));
    }
    song.patterns.push(pattern);
    song.sequences.push(OrderList::new(&[0, 0, 0, 0]));
    song
}

fn render_all(engine: &mut Engine) -> Vec<Frame> {
    let mut out = Vec::new();
    let mut buf = [Frame::silence(); 1000];
    loop {
        let n = engine.read(&mut buf);
        if n == 0 {
            break;
        }
        out.extend_from_slice(&buf[..n]);
    }
    out
}

#[test]
fn every_format_makes_sound() {
    for module_type in [ModuleType::Mod, ModuleType::S3m, ModuleType::Xm, ModuleType::It] {
        let mut engine = Engine::new(square_song(module_type), RATE);
        let frames = render_all(&mut engine);
        assert!(frames.iter().any(|f| !f.is_silent()), "{module_type:?} is silent");
        assert!(engine.song_ended());
    }
}

#[test]
fn rendered_frames_match_calculated_length() {
    let mut engine = Engine::new(square_song(ModuleType::Xm), RATE);
    let length = engine.get_length(GetLengthTarget::End)[0];
    assert!(length.target_reached);
    // 64 rows at speed 6 and 125 BPM.
    assert!((length.duration - 7.68).abs() < 1e-9);

    // The looping voices fade out over the default 100 ms after the end.
    let frames = render_all(&mut engine);
    let song_frames = (length.duration * RATE as f64).round() as usize;
    assert_eq!(frames.len(), song_frames + RATE as usize / 10);
}

#[test]
fn length_calculation_leaves_playback_alone() {
    let mut engine = Engine::new(square_song(ModuleType::It), RATE);
    let mut buf = [Frame::silence(); 4410];
    engine.read(&mut buf);
    let (order, row) = (engine.current_order(), engine.current_row());
    engine.get_length(GetLengthTarget::End);
    assert_eq!((engine.current_order(), engine.current_row()), (order, row));
}

#[test]
fn seek_matches_straight_playback() {
    let mut seeked = Engine::new(square_song(ModuleType::It), RATE);
    assert!(seeked.set_position_by_time(2.01, SeekMode::SampleAccurate));

    let mut played = Engine::new(square_song(ModuleType::It), RATE);
    let mut buf = [Frame::silence(); 882];
    // 101 ticks of 20 ms, the first boundary at or after 2.01 s.
    for _ in 0..101 {
        played.read(&mut buf);
    }

    assert_eq!(seeked.current_order(), played.current_order());
    assert_eq!(seeked.current_row(), played.current_row());
    let tail_seeked = render_all(&mut seeked);
    let tail_played = render_all(&mut played);
    assert_eq!(tail_seeked.len(), tail_played.len());
}

#[test]
fn looping_forever_keeps_rendering() {
    let mut engine = Engine::new(square_song(ModuleType::Mod), RATE);
    engine.set_repeat_count(-1);
    let mut buf = [Frame::silence(); 4410];
    // Twice the song length.
    for _ in 0..160 {
        assert_eq!(engine.read(&mut buf), buf.len());
    }
    assert!(!engine.song_ended());
}
