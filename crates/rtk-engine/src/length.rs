//! Song duration and seeking.
//!
//! The calculator replays the song on a throwaway [`PlayState`] through
//! the same row and effect processing as playback, with backends, volume
//! ramps and new-note actions switched off. Voices are only simulated
//! when a seek asks for sample positions to land where playback would
//! have put them.

use alloc::vec::Vec;

use rtk_ir::Song;

use crate::mixer;
use crate::play_state::{first_playable_order, PlayState};
use crate::render::is_sample_voice;
use crate::sequencer::{Backends, ProcessMode, Sequencer};
use crate::settings::MixerSettings;
use crate::visited::RowVisitor;

/// What [`Engine::get_length`](crate::Engine::get_length) measures.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GetLengthTarget {
    /// Play the current subsong to its end.
    End,
    /// One result per subsong of the current order list.
    AllSubsongs,
    /// Stop once playback time reaches the given seconds.
    Time(f64),
    /// Stop when the given order and row start playing.
    Position { order: u16, row: u16 },
}

/// Outcome of one length calculation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GetLengthResult {
    /// Seconds until the end or the target, `f64::INFINITY` when pattern
    /// loops exhausted the loop budget
    pub duration: f64,
    /// The time or position target was reached (always `true` for
    /// [`GetLengthTarget::End`] unless the budget ran out)
    pub target_reached: bool,
    /// Order the calculation started at
    pub start_order: u16,
    /// Last order and row that were played
    pub last_order: u16,
    pub last_row: u16,
    /// Pattern loop jumps taken on the way
    pub loop_jumps: u64,
}

impl GetLengthResult {
    pub fn is_infinite(&self) -> bool {
        self.duration.is_infinite()
    }
}

/// A finished replay: the result and the state playback would be in.
pub(crate) struct Replay {
    pub result: GetLengthResult,
    pub state: PlayState,
    pub visitor: RowVisitor,
}

/// Replay `song` from `start_order` until `target` or the song end.
/// `budget` caps the pattern loop jumps before the duration is reported
/// as infinite. Rows already marked in `visitor` end the replay when
/// reached.
pub(crate) fn replay(
    song: &Song,
    settings: &MixerSettings,
    start_order: u16,
    target: GetLengthTarget,
    budget: u64,
    sync_samples: bool,
    mut visitor: RowVisitor,
) -> Replay {
    let mut state = PlayState::new(song);
    state.order = start_order;
    state.next_order = start_order;
    let mut backends = Backends::default();

    let mut result = GetLengthResult {
        duration: 0.0,
        target_reached: false,
        start_order,
        last_order: start_order,
        last_row: 0,
        loop_jumps: 0,
    };

    {
        let mut seq = Sequencer::new(
            song,
            &mut state,
            &mut visitor,
            &mut backends,
            settings,
            ProcessMode::Length { sync_samples },
        );
        loop {
            if let GetLengthTarget::Time(seconds) = target {
                if seq.state.elapsed >= seconds {
                    result.target_reached = true;
                    break;
                }
            }
            let before = seq.state.elapsed;
            if !seq.read_note() {
                result.target_reached = target == GetLengthTarget::End;
                break;
            }
            if let GetLengthTarget::Position { order, row } = target {
                let state = &seq.state;
                if state.order == order && state.row == row && state.tick_count == 0 {
                    // Reached as the row starts, before its first tick counts.
                    result.duration = before;
                    result.target_reached = true;
                    break;
                }
            }
            result.last_order = seq.state.order;
            result.last_row = seq.state.row;
            if seq.loop_jumps > budget {
                log::warn!(
                    "pattern loops exceeded the budget of {budget} jumps at order {}, row {}",
                    seq.state.order,
                    seq.state.row
                );
                result.duration = f64::INFINITY;
                result.target_reached = false;
                break;
            }
            if sync_samples {
                let frames = seq.state.samples_per_tick;
                for chn in seq.state.channels.iter_mut().filter(|c| is_sample_voice(c)) {
                    mixer::advance(chn, frames);
                }
            }
        }
        result.loop_jumps = seq.loop_jumps;
    }

    let position_hit = result.target_reached && matches!(target, GetLengthTarget::Position { .. });
    if result.duration.is_finite() && !position_hit {
        result.duration = state.elapsed;
    }
    Replay {
        result,
        state,
        visitor,
    }
}

/// Length of every subsong. Each subsong starts at the first order no
/// earlier subsong played; the budget halves after each one whose loops
/// exhausted it.
pub(crate) fn all_subsongs(song: &Song, settings: &MixerSettings, budget: &mut u64) -> Vec<GetLengthResult> {
    let mut results = Vec::new();
    let mut played = RowVisitor::new(song);
    let mut next = first_playable_order(song, 0);
    while let Some(start) = next {
        // Rows of earlier subsongs stop a subsong that restarts into them.
        let seed = played.clone();
        let run = replay(song, settings, start, GetLengthTarget::End, *budget, false, seed);
        if run.result.is_infinite() {
            *budget = (*budget / 2).max(1);
        }
        played.merge(&run.visitor);
        // A replay that never got to a row leaves nothing to merge.
        played.visit(start, 0);
        results.push(run.result);
        next = played.first_unvisited_order(song);
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtk_ir::{Cell, Effect, ModuleType, OrderEntry, OrderList, Pattern};

    fn song(patterns: &[u16], rows: u16) -> Song {
        let mut song = Song::with_channels(ModuleType::Mod, 1);
        for _ in 0..=patterns.iter().copied().max().unwrap_or(0) {
            song.patterns.push(Pattern::new(rows, 1));
        }
        song.sequences.push(OrderList::new(patterns));
        song
    }

    fn replay_song(s: &Song, target: GetLengthTarget, sync: bool) -> Replay {
        replay(s, &MixerSettings::default(), 0, target, 1000, sync, RowVisitor::new(s))
    }

    #[test]
    fn plain_song_duration() {
        // 2 orders x 4 rows x 6 ticks at 125 BPM = 48 ticks of 20 ms.
        let s = song(&[0, 0], 4);
        let run = replay_song(&s, GetLengthTarget::End, false);
        assert!((run.result.duration - 0.96).abs() < 1e-9);
        assert!(run.result.target_reached);
        assert_eq!((run.result.last_order, run.result.last_row), (1, 3));
    }

    #[test]
    fn position_target_reports_row_start() {
        let s = song(&[0, 0], 4);
        let target = GetLengthTarget::Position { order: 1, row: 0 };
        let run = replay_song(&s, target, false);
        assert!(run.result.target_reached);
        assert!((run.result.duration - 0.48).abs() < 1e-9);
    }

    #[test]
    fn time_target_stops_on_tick_boundary() {
        let s = song(&[0, 0], 4);
        let run = replay_song(&s, GetLengthTarget::Time(0.51), false);
        assert!(run.result.target_reached);
        assert!(run.state.elapsed >= 0.51 && run.state.elapsed < 0.53);
        assert_eq!(run.state.order, 1);
    }

    #[test]
    fn unreachable_position_is_not_reached() {
        let s = song(&[0], 4);
        let target = GetLengthTarget::Position { order: 5, row: 0 };
        let run = replay_song(&s, target, false);
        assert!(!run.result.target_reached);
        assert!((run.result.duration - 0.48).abs() < 1e-9);
    }

    #[test]
    fn speed_change_shortens_song() {
        let mut s = song(&[0], 4);
        s.patterns[0].set(0, 0, Cell::empty().with_effect(Effect::Speed(3)));
        let run = replay_song(&s, GetLengthTarget::End, false);
        assert!((run.result.duration - 0.24).abs() < 1e-9);
    }

    #[test]
    fn subsongs_split_at_stop_marker() {
        let mut s = song(&[0, 0], 4);
        s.sequences[0].entries.push(OrderEntry::Stop);
        s.sequences[0].entries.push(OrderEntry::Pattern(0));
        let mut budget = 1000;
        let results = all_subsongs(&s, &MixerSettings::default(), &mut budget);
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].start_order, 3);
        assert!((results[1].duration - 0.48).abs() < 1e-9);
        assert_eq!(budget, 1000);
    }

    #[test]
    fn sample_sync_moves_voices() {
        let s = crate::testing::make_song(ModuleType::Mod, 1, &[(0, 0, Cell::note(49, 1))]);
        let synced = replay_song(&s, GetLengthTarget::Time(0.05), true);
        let plain = replay_song(&s, GetLengthTarget::Time(0.05), false);
        assert!(synced.state.channels[0].position_frames() > 0);
        assert_eq!(plain.state.channels[0].position_frames(), 0);
    }
}
