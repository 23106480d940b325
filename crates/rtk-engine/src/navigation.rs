//! Order, row and tick advancement.
//!
//! Jumps requested by the effect column are collected for the whole row
//! and arbitrated once all channels ran, because trackers disagree on
//! what wins when a pattern loop, a position jump and a pattern break
//! appear on the same row.

use rtk_ir::{Effect, ModuleType, OrderEntry, PlayBehaviour};

use crate::play_state::{first_playable_order, PlayFlags, ROW_FINISHED};
use crate::sequencer::Sequencer;

/// Jump requests collected while processing one row.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct RowJumps {
    pub break_row: Option<u16>,
    pub position_jump: Option<u16>,
    pub loop_row: Option<u16>,
    /// A pattern delay was already set on this row
    pub pattern_delay_set: bool,
}

impl Sequencer<'_> {
    /// Advance the tick counter, moving to the next row when the current
    /// one is finished. Returns `false` when the song ended.
    pub(crate) fn process_row(&mut self) -> bool {
        let row_finished = self.state.tick_count == ROW_FINISHED;
        self.state.tick_count = self.state.tick_count.wrapping_add(1);
        if !row_finished && self.state.tick_count < self.state.ticks_on_row() {
            let repeat_first = self.song.behaviour.test(PlayBehaviour::ROW_DELAY_REPEATS_FIRST_TICK)
                && self.state.pattern_delay > 1
                && self.state.tick_in_row() == 0;
            self.state.flags.set(PlayFlags::FIRST_TICK, repeat_first);
            return true;
        }

        self.state.tick_count = 0;
        self.state.pattern_delay = 0;
        self.state.frame_delay = 0;
        self.state.flags.insert(PlayFlags::FIRST_TICK);
        self.state
            .flags
            .remove(PlayFlags::POSITION_CHANGED | PlayFlags::PATTERN_LOOP);

        let song = self.song;
        let mut order = self.state.next_order;
        let mut row = self.state.next_row;
        let mut restarted = false;

        let pattern = loop {
            match song.order().get(order) {
                OrderEntry::Pattern(p) if song.pattern(p).is_some() => break p,
                OrderEntry::Pattern(_) | OrderEntry::Skip => order = order.saturating_add(1),
                OrderEntry::Stop => {
                    // The end of the order list continues at the restart position.
                    if restarted {
                        return false;
                    }
                    restarted = true;
                    let restart = song.order().restart_pos();
                    order = match first_playable_order(song, restart) {
                        Some(o) => o,
                        None => return false,
                    };
                    row = 0;
                }
            }
            if order == u16::MAX {
                return false;
            }
        };

        let rows = song.pattern(pattern).map(|p| p.rows()).unwrap_or(0);
        if row >= rows {
            row = 0;
        }

        if self.visitor.visit(order, row) {
            // Back on a row we already played: the song loops here.
            if self.state.repeat_count == 0 {
                return false;
            }
            if self.state.repeat_count > 0 {
                self.state.repeat_count -= 1;
            }
            self.visitor.clear();
            self.visitor.visit(order, row);
        }

        if order != self.state.order {
            self.state.flags.insert(PlayFlags::POSITION_CHANGED);
        }
        self.state.order = order;
        self.state.row = row;
        self.state.pattern = pattern;
        self.state.next_order = order;
        self.state.next_row = row + 1;
        if self.state.next_row >= rows {
            self.state.next_row = self.state.next_pattern_start_row;
            self.state.next_pattern_start_row = 0;
            self.state.next_order = order.saturating_add(1);
        }

        let num = self.state.pattern_channels(song);
        for (nchn, chn) in self.state.channels.iter_mut().take(num).enumerate() {
            chn.row = *song.cell(pattern, row, nchn as u16);
        }
        true
    }

    /// Apply the jumps collected on the first tick of a row.
    pub(crate) fn apply_jumps(&mut self, jumps: RowJumps) {
        let song = self.song;
        let behaviour = song.behaviour;
        let do_loop = jumps.loop_row.is_some();
        let do_break = jumps.break_row.is_some();
        let do_jump = jumps.position_jump.is_some();

        let jump_allowed = !do_loop
            || behaviour.test(PlayBehaviour::FT2_PATTERN_LOOP_WITH_JUMPS)
            || (behaviour.test(PlayBehaviour::IT_PATTERN_LOOP_WITH_JUMPS) && do_jump);
        let jumping = (do_break || do_jump) && jump_allowed;

        if let Some(loop_row) = jumps.loop_row {
            self.state.next_order = self.state.order;
            self.state.next_row = loop_row;
            // A loop overridden by a jump leaves its rows visited.
            if !jumping {
                self.state.flags.insert(PlayFlags::PATTERN_LOOP);
                self.visitor
                    .reset_pattern_loop(self.state.order, loop_row, self.state.row);
                self.loop_jumps += 1;
            }
        }
        if !jumping {
            return;
        }

        let mut target = jumps
            .position_jump
            .unwrap_or_else(|| self.state.order.saturating_add(1));
        if target as usize >= song.order().len() {
            target = song.order().restart_pos();
        }
        if target != self.state.order
            && !behaviour.test(PlayBehaviour::IT_PATTERN_LOOP_BREAK)
            && !behaviour.test(PlayBehaviour::FT2_PATTERN_LOOP_WITH_JUMPS)
            && song.module_type != ModuleType::Mod
        {
            let num = self.state.pattern_channels(song);
            for chn in self.state.channels.iter_mut().take(num) {
                chn.pattern_loop_count = 0;
            }
        }
        self.state.next_order = target;
        self.state.next_row = jumps.break_row.unwrap_or(0);
        self.state.flags.insert(PlayFlags::POSITION_CHANGED);
    }

    /// `E6x` / `SBx`. Returns the row to jump back to, if any.
    pub(crate) fn pattern_loop(&mut self, nchn: usize, param: u8) -> Option<u16> {
        let song = self.song;
        let row = self.state.row;
        let idx = if song.behaviour.test(PlayBehaviour::IT_FT2_PATTERN_LOOP) {
            nchn
        } else {
            0
        };
        if param == 0 {
            self.state.channels[idx].pattern_loop_row = row;
            if song.behaviour.test(PlayBehaviour::FT2_LOOP_E60_RESTART) {
                self.state.next_pattern_start_row = row;
            }
            return None;
        }
        let chn = &mut self.state.channels[idx];
        if chn.pattern_loop_count > 0 {
            chn.pattern_loop_count -= 1;
            if chn.pattern_loop_count == 0 {
                if song.behaviour.test(PlayBehaviour::IT_PATTERN_LOOP_TARGET_RESET) {
                    chn.pattern_loop_row = row + 1;
                }
                return None;
            }
        } else {
            chn.pattern_loop_count = param;
        }
        Some(chn.pattern_loop_row)
    }

    /// Widen `value` with `Xparam` commands on the following rows of the
    /// same channel.
    pub(crate) fn xparam(&self, nchn: usize, value: u32) -> u32 {
        let song = self.song;
        let mut value = value;
        for offset in 1..=2u16 {
            let cell = song.cell(self.state.pattern, self.state.row + offset, nchn as u16);
            match cell.effect {
                Effect::Xparam(x) => value = (value << 8) | x as u32,
                _ => break,
            }
        }
        value
    }

    /// Position jump target, `None` when ignored.
    pub(crate) fn position_jump_target(&self, nchn: usize, param: u8) -> Option<u16> {
        let target = self.xparam(nchn, param as u32);
        u16::try_from(target).ok()
    }

    /// Pattern break row, `None` when ignored.
    pub(crate) fn pattern_break_row(&self, nchn: usize, param: u8) -> Option<u16> {
        let song = self.song;
        let row = match song.module_type {
            ModuleType::Mod | ModuleType::Xm | ModuleType::Mtm => {
                // Decimal coded
                (param >> 4) as u32 * 10 + (param & 0x0F) as u32
            }
            _ => self.xparam(nchn, param as u32),
        };
        if song.behaviour.test(PlayBehaviour::S3M_IGNORE_INVALID_BREAK) && row >= 64 {
            return None;
        }
        u16::try_from(row).ok()
    }

    /// Force playback to continue at `order`/`row` on the next tick.
    pub(crate) fn jump_to(&mut self, order: u16, row: u16) {
        self.state.next_order = order;
        self.state.next_row = row;
        self.state.next_pattern_start_row = 0;
        self.state.tick_count = ROW_FINISHED;
        self.state.pattern_delay = 0;
        self.state.frame_delay = 0;
    }
}

#[cfg(test)]
mod tests {
    use rtk_ir::{Cell, Effect, ModuleType, OrderList, Pattern};

    use crate::testing::{make_song, Rig};

    fn fx(effect: Effect) -> Cell {
        Cell::empty().with_effect(effect)
    }

    /// Ticks spent on row 0 before row 1 starts.
    fn ticks_on_first_row(rig: &mut Rig) -> u32 {
        let mut ticks = 0;
        while rig.tick() && rig.state.row == 0 {
            ticks += 1;
        }
        ticks
    }

    #[test]
    fn pattern_delay_repeats_row() {
        let mut rig = Rig::new(make_song(ModuleType::S3m, 1, &[(0, 0, fx(Effect::S3mCmdEx(0xE2)))]));
        assert_eq!(ticks_on_first_row(&mut rig), 18);
    }

    #[test]
    fn first_pattern_delay_wins_on_it() {
        let cells = [
            (0, 0, fx(Effect::S3mCmdEx(0xE1))),
            (0, 1, fx(Effect::S3mCmdEx(0xE3))),
        ];
        let mut it = Rig::new(make_song(ModuleType::It, 2, &cells));
        assert_eq!(ticks_on_first_row(&mut it), 12);

        let cells = [
            (0, 0, fx(Effect::ModCmdEx(0xE1))),
            (0, 1, fx(Effect::ModCmdEx(0xE3))),
        ];
        let mut xm = Rig::new(make_song(ModuleType::Xm, 2, &cells));
        assert_eq!(ticks_on_first_row(&mut xm), 24);
    }

    #[test]
    fn tick_delay_adds_to_speed() {
        let mut rig = Rig::new(make_song(ModuleType::It, 1, &[(0, 0, fx(Effect::S3mCmdEx(0x63)))]));
        assert_eq!(ticks_on_first_row(&mut rig), 9);
    }

    #[test]
    fn ft2_e60_moves_next_pattern_start() {
        let mut song = make_song(ModuleType::Xm, 1, &[]);
        let mut pattern = Pattern::new(4, 1);
        pattern.set(2, 0, fx(Effect::ModCmdEx(0x60)));
        song.patterns[0] = pattern;
        song.sequences[0] = OrderList::new(&[0, 0]);
        let mut rig = Rig::new(song);
        rig.ticks(4 * 6 + 1);
        assert_eq!((rig.state.order, rig.state.row), (1, 2));
    }

    #[test]
    fn xparam_widens_break_row() {
        let cells = [
            (0, 0, fx(Effect::PatternBreak(0x01))),
            (1, 0, fx(Effect::Xparam(0x02))),
        ];
        let mut song = make_song(ModuleType::Mpt, 1, &cells);
        song.patterns.push(Pattern::new(512, 1));
        song.sequences[0] = OrderList::new(&[0, 1]);
        let mut rig = Rig::new(song);
        rig.ticks(7);
        assert_eq!((rig.state.order, rig.state.row), (1, 0x102));
    }

    #[test]
    fn song_ends_when_rows_repeat() {
        let mut rig = Rig::new(make_song(ModuleType::Mod, 1, &[]));
        rig.ticks(64 * 6);
        assert!(!rig.tick());
    }

    #[test]
    fn repeat_count_replays_song() {
        let mut rig = Rig::new(make_song(ModuleType::Mod, 1, &[]));
        rig.state.repeat_count = 1;
        rig.ticks(64 * 6);
        assert!(rig.tick());
        assert_eq!((rig.state.order, rig.state.row), (0, 0));
        assert_eq!(rig.state.repeat_count, 0);
    }

    #[test]
    fn jump_to_restarts_row_processing() {
        let mut rig = Rig::new(make_song(ModuleType::It, 1, &[]));
        rig.ticks(3);
        rig.seq().jump_to(0, 40);
        rig.tick();
        assert_eq!(rig.state.row, 40);
        assert_eq!(rig.state.tick_count, 0);
    }
}
