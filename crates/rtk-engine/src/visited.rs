//! Row visit tracking for song-end detection.
//!
//! Reaching a row that was already played (outside of a pattern loop)
//! means the song has looped. The table is sized once per order list so
//! that marking rows never allocates.

use alloc::vec;
use alloc::vec::Vec;

use rtk_ir::{OrderEntry, Song};

#[derive(Clone, Debug, Default)]
pub struct RowVisitor {
    /// Start of each order's rows in `visited`, plus one past the end
    offsets: Vec<usize>,
    visited: Vec<bool>,
}

impl RowVisitor {
    /// Tracking table for the song's current order list.
    pub fn new(song: &Song) -> Self {
        let order = song.order();
        let mut offsets = Vec::with_capacity(order.len() + 1);
        let mut total = 0;
        for entry in &order.entries {
            offsets.push(total);
            if let OrderEntry::Pattern(p) = *entry {
                total += song.pattern(p).map(|p| p.rows() as usize).unwrap_or(0);
            }
        }
        offsets.push(total);
        Self {
            offsets,
            visited: vec![false; total],
        }
    }

    /// Forget every visit.
    pub fn clear(&mut self) {
        self.visited.fill(false);
    }

    fn index(&self, order: u16, row: u16) -> Option<usize> {
        let order = order as usize;
        let start = *self.offsets.get(order)?;
        let end = *self.offsets.get(order + 1)?;
        let idx = start + row as usize;
        (idx < end).then_some(idx)
    }

    pub fn is_visited(&self, order: u16, row: u16) -> bool {
        self.index(order, row)
            .map(|i| self.visited[i])
            .unwrap_or(false)
    }

    /// Mark a row, returning whether it had been visited before.
    pub fn visit(&mut self, order: u16, row: u16) -> bool {
        match self.index(order, row) {
            Some(i) => core::mem::replace(&mut self.visited[i], true),
            None => false,
        }
    }

    /// Unmark `start..=end` of an order so a pattern loop can replay them.
    pub fn reset_pattern_loop(&mut self, order: u16, start: u16, end: u16) {
        for row in start..=end {
            if let Some(i) = self.index(order, row) {
                self.visited[i] = false;
            }
        }
    }

    /// Add the visits recorded by `other`, a visitor of the same order list.
    pub fn merge(&mut self, other: &RowVisitor) {
        for (mine, theirs) in self.visited.iter_mut().zip(&other.visited) {
            *mine |= *theirs;
        }
    }

    /// First pattern order none of whose rows has been played, which is
    /// where the next hidden subsong starts.
    pub fn first_unvisited_order(&self, song: &Song) -> Option<u16> {
        let order = song.order();
        (0..order.len() as u16).find(|&o| {
            matches!(order.get(o), OrderEntry::Pattern(_))
                && self.offsets[o as usize] < self.offsets[o as usize + 1]
                && !self.visited[self.offsets[o as usize]..self.offsets[o as usize + 1]]
                    .iter()
                    .any(|&v| v)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtk_ir::{ModuleType, OrderList, Pattern};

    fn song() -> Song {
        let mut song = Song::with_channels(ModuleType::Mod, 1);
        song.patterns.push(Pattern::new(4, 1));
        song.patterns.push(Pattern::new(2, 1));
        let mut order = OrderList::new(&[0, 1]);
        order.entries.push(OrderEntry::Stop);
        order.entries.push(OrderEntry::Pattern(1));
        song.sequences.push(order);
        song
    }

    #[test]
    fn second_visit_is_reported() {
        let mut v = RowVisitor::new(&song());
        assert!(!v.visit(0, 3));
        assert!(v.visit(0, 3));
        assert!(v.is_visited(0, 3));
        assert!(!v.is_visited(1, 3));
    }

    #[test]
    fn rows_outside_pattern_are_ignored() {
        let mut v = RowVisitor::new(&song());
        assert!(!v.visit(1, 9));
        assert!(!v.visit(1, 9));
        assert!(!v.visit(2, 0));
    }

    #[test]
    fn loop_reset_unmarks_range() {
        let mut v = RowVisitor::new(&song());
        for row in 0..4 {
            v.visit(0, row);
        }
        v.reset_pattern_loop(0, 1, 2);
        assert!(v.is_visited(0, 0));
        assert!(!v.is_visited(0, 1));
        assert!(!v.is_visited(0, 2));
        assert!(v.is_visited(0, 3));
    }

    #[test]
    fn finds_hidden_subsong() {
        let s = song();
        let mut v = RowVisitor::new(&s);
        assert_eq!(v.first_unvisited_order(&s), Some(0));
        v.visit(0, 0);
        v.visit(1, 1);
        assert_eq!(v.first_unvisited_order(&s), Some(3));
    }

    #[test]
    fn merge_keeps_both_sides() {
        let s = song();
        let mut a = RowVisitor::new(&s);
        let mut b = RowVisitor::new(&s);
        a.visit(0, 1);
        b.visit(3, 0);
        a.merge(&b);
        assert!(a.is_visited(0, 1));
        assert!(a.is_visited(3, 0));
        assert!(!b.is_visited(0, 1));
    }
}
