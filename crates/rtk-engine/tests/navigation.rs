//! Row and order navigation through the public engine API.
//!
//! Songs run at speed 1, so every tick is a row and 882 frames at
//! 44.1 kHz and 125 BPM render exactly one of them.

use rtk_engine::{Engine, Frame, GetLengthTarget, MixerSettings};
use rtk_ir::{Cell, Effect, ModuleType, OrderList, Pattern, PlayBehaviour, Song};

const RATE: u32 = 44100;
const TICK: usize = 882;

/// A song with one pattern per entry of `rows`, played in that order.
/// `cells` are `(pattern, row, channel, effect)`.
fn song(module_type: ModuleType, rows: &[u16], cells: &[(usize, u16, u16, Effect)]) -> Song {
    let mut song = Song::with_channels(module_type, 2);
    song.initial_speed = 1;
    for &n in rows {
        song.patterns.push(Pattern::new(n, 2));
    }
    for &(pat, row, chn, effect) in cells {
        song.patterns[pat].set(row, chn, Cell::empty().with_effect(effect));
    }
    let orders: Vec<u16> = (0..rows.len() as u16).collect();
    song.sequences.push(OrderList::new(&orders));
    song
}

/// `(order, row)` of every row played until the song ends.
fn trace(song: Song) -> Vec<(u16, u16)> {
    let mut engine = Engine::new(song, RATE);
    let mut buf = [Frame::silence(); TICK];
    let mut rows = Vec::new();
    while rows.len() < 1000 && engine.read(&mut buf) != 0 {
        rows.push((engine.current_order(), engine.current_row()));
    }
    rows
}

fn rows_of(order: u16, rows: impl IntoIterator<Item = u16>) -> Vec<(u16, u16)> {
    rows.into_iter().map(|r| (order, r)).collect()
}

#[test]
fn pattern_loop_body_plays_repeat_count_plus_one_times() {
    let s = song(
        ModuleType::It,
        &[12],
        &[
            (0, 4, 0, Effect::S3mCmdEx(0xB0)),
            (0, 9, 0, Effect::S3mCmdEx(0xB2)),
        ],
    );
    let mut expected = rows_of(0, 0..=9);
    expected.extend(rows_of(0, 4..=9));
    expected.extend(rows_of(0, 4..=9));
    expected.extend(rows_of(0, 10..=11));
    assert_eq!(trace(s), expected);
}

fn loop_and_break_song(behaviour_kept: bool) -> Song {
    let mut s = song(
        ModuleType::Xm,
        &[4, 2],
        &[
            (0, 0, 0, Effect::ModCmdEx(0x60)),
            (0, 2, 0, Effect::ModCmdEx(0x61)),
            (0, 2, 1, Effect::PatternBreak(0x00)),
        ],
    );
    if !behaviour_kept {
        s.behaviour.remove(PlayBehaviour::FT2_PATTERN_LOOP_WITH_JUMPS);
    }
    s
}

#[test]
fn ft2_break_wins_over_loop_on_same_row() {
    let mut expected = rows_of(0, 0..=2);
    expected.extend(rows_of(1, 0..=1));
    assert_eq!(trace(loop_and_break_song(true)), expected);
}

#[test]
fn loop_wins_over_break_without_ft2_rule() {
    let mut expected = rows_of(0, 0..=2);
    expected.extend(rows_of(0, 0..=2));
    expected.extend(rows_of(1, 0..=1));
    assert_eq!(trace(loop_and_break_song(false)), expected);
}

fn loop_and_jump_song(remove: PlayBehaviour) -> Song {
    let mut s = song(
        ModuleType::It,
        &[2, 2],
        &[
            (0, 1, 0, Effect::S3mCmdEx(0xB2)),
            (0, 1, 1, Effect::PositionJump(1)),
        ],
    );
    s.behaviour.remove(remove);
    s
}

#[test]
fn it_position_jump_overrides_loop() {
    let s = loop_and_jump_song(PlayBehaviour::empty());
    let mut expected = rows_of(0, 0..=1);
    expected.extend(rows_of(1, 0..=1));
    assert_eq!(trace(s), expected);
}

#[test]
fn loop_runs_out_before_jump_without_it_rule() {
    let s = loop_and_jump_song(PlayBehaviour::IT_PATTERN_LOOP_WITH_JUMPS);
    let mut expected = Vec::new();
    for _ in 0..3 {
        expected.extend(rows_of(0, 0..=1));
    }
    expected.extend(rows_of(1, 0..=1));
    assert_eq!(trace(s), expected);
}

/// Loop counter of channel 0 right after the row that loops and jumps.
fn loop_count_after_jump(remove: PlayBehaviour) -> u8 {
    let mut engine = Engine::new(loop_and_jump_song(remove), RATE);
    let mut buf = [Frame::silence(); TICK];
    engine.read(&mut buf);
    engine.read(&mut buf);
    assert_eq!(engine.current_row(), 1);
    engine.play_state().channels[0].pattern_loop_count
}

#[test]
fn it_loop_count_survives_jump_to_other_order() {
    assert_eq!(loop_count_after_jump(PlayBehaviour::empty()), 2);
}

#[test]
fn loop_count_resets_on_jump_without_it_break_rule() {
    assert_eq!(loop_count_after_jump(PlayBehaviour::IT_PATTERN_LOOP_BREAK), 0);
}

#[test]
fn s3m_break_past_row_63_is_ignored() {
    let s = song(ModuleType::S3m, &[4, 2], &[(0, 1, 0, Effect::PatternBreak(0x40))]);
    let mut expected = rows_of(0, 0..=3);
    expected.extend(rows_of(1, 0..=1));
    assert_eq!(trace(s), expected);
}

#[test]
fn break_past_pattern_end_lands_on_first_row() {
    let mut s = song(ModuleType::S3m, &[4, 2], &[(0, 1, 0, Effect::PatternBreak(0x40))]);
    s.behaviour.remove(PlayBehaviour::S3M_IGNORE_INVALID_BREAK);
    let mut expected = rows_of(0, 0..=1);
    expected.extend(rows_of(1, 0..=1));
    assert_eq!(trace(s), expected);
}

#[test]
fn jump_past_order_list_restarts_and_ends() {
    let s = song(ModuleType::It, &[2], &[(0, 0, 0, Effect::PositionJump(9))]);
    assert_eq!(trace(s), rows_of(0, 0..=0));
}

/// Two loop commands sharing channel 0's counter keep re-arming each
/// other, so the song never ends.
fn endless_song() -> Song {
    song(
        ModuleType::Mod,
        &[4],
        &[
            (0, 0, 0, Effect::ModCmdEx(0x60)),
            (0, 1, 0, Effect::ModCmdEx(0x62)),
            (0, 2, 0, Effect::ModCmdEx(0x61)),
        ],
    )
}

#[test]
fn endless_loops_report_infinite_length_and_halve_budget() {
    let settings = MixerSettings {
        loop_budget: 1000,
        ..MixerSettings::default()
    };
    let mut engine = Engine::with_settings(endless_song(), settings);

    let first = engine.get_length(GetLengthTarget::End)[0];
    assert!(first.duration.is_infinite());
    assert_eq!(first.loop_jumps, 1001);
    assert_eq!(engine.loop_budget(), 500);

    let second = engine.get_length(GetLengthTarget::End)[0];
    assert!(second.duration.is_infinite());
    assert_eq!(second.loop_jumps, 501);
    assert_eq!(engine.loop_budget(), 250);
}

#[test]
fn all_subsongs_reported_in_order() {
    let mut s = song(ModuleType::It, &[2, 3, 4], &[]);
    s.sequences[0] = {
        let mut order = OrderList::new(&[0, 1]);
        order.entries.push(rtk_ir::OrderEntry::Stop);
        order.entries.push(rtk_ir::OrderEntry::Pattern(2));
        order
    };
    let mut engine = Engine::new(s, RATE);
    let results = engine.get_length(GetLengthTarget::AllSubsongs);
    let starts: Vec<u16> = results.iter().map(|r| r.start_order).collect();
    assert_eq!(starts, [0, 3]);
    // Speed 1 at 125 BPM: 20 ms per row.
    assert!((results[0].duration - 0.1).abs() < 1e-9);
    assert!((results[1].duration - 0.08).abs() < 1e-9);
}
