//! Order lists (sequences) and their sentinel entries.

use alloc::vec::Vec;
use arrayvec::ArrayString;

use crate::tempo::Tempo;

/// One slot of an order list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderEntry {
    Pattern(u16),
    /// "+++": skipped during playback
    Skip,
    /// "---": end of the (sub)song
    Stop,
}

/// An order list plus its playback defaults. A song may hold several
/// of these (subsongs).
#[derive(Clone, Debug, Default)]
pub struct OrderList {
    pub name: ArrayString<32>,
    pub entries: Vec<OrderEntry>,
    /// Order to continue at once the end is reached
    pub restart_pos: u16,
    /// Overrides the song's initial speed when set
    pub default_speed: Option<u32>,
    /// Overrides the song's initial tempo when set
    pub default_tempo: Option<Tempo>,
}

impl OrderList {
    pub fn new(patterns: &[u16]) -> Self {
        Self {
            entries: patterns.iter().map(|&p| OrderEntry::Pattern(p)).collect(),
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry at `order`, treating the end of the list as a stop marker.
    pub fn get(&self, order: u16) -> OrderEntry {
        self.entries
            .get(order as usize)
            .copied()
            .unwrap_or(OrderEntry::Stop)
    }

    /// Pattern index at `order`, if the entry is a pattern.
    pub fn pattern_at(&self, order: u16) -> Option<u16> {
        match self.get(order) {
            OrderEntry::Pattern(p) => Some(p),
            _ => None,
        }
    }

    /// Restart position clamped into the list.
    pub fn restart_pos(&self) -> u16 {
        if (self.restart_pos as usize) < self.entries.len() {
            self.restart_pos
        } else {
            0
        }
    }

    /// First order of every subsong: order 0 and each order after a stop marker.
    pub fn subsong_starts(&self) -> Vec<u16> {
        let mut starts = Vec::new();
        let mut at_start = true;
        for (i, e) in self.entries.iter().enumerate() {
            match e {
                OrderEntry::Stop => at_start = true,
                OrderEntry::Skip => {}
                OrderEntry::Pattern(_) => {
                    if at_start {
                        starts.push(i as u16);
                        at_start = false;
                    }
                }
            }
        }
        starts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_past_end_is_stop() {
        let o = OrderList::new(&[0, 1]);
        assert_eq!(o.get(1), OrderEntry::Pattern(1));
        assert_eq!(o.get(2), OrderEntry::Stop);
        assert_eq!(o.pattern_at(5), None);
    }

    #[test]
    fn restart_pos_out_of_range_falls_back_to_zero() {
        let mut o = OrderList::new(&[0, 1]);
        o.restart_pos = 7;
        assert_eq!(o.restart_pos(), 0);
    }

    #[test]
    fn subsongs_split_at_stop_markers() {
        let mut o = OrderList::new(&[0, 1]);
        o.entries.push(OrderEntry::Stop);
        o.entries.push(OrderEntry::Skip);
        o.entries.push(OrderEntry::Pattern(2));
        assert_eq!(o.subsong_starts(), [0, 4]);
    }
}
