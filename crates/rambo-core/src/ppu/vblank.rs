//! VBlank ledger: dot-stamped set/clear history for the `$2002` race.
//!
//! The flag itself lives in the status register; the ledger keeps the master
//! dot at which it was last set and cleared so the visible value at any CPU
//! cycle can be reconstructed, and so a read landing inside the set window
//! can suppress the flag and the NMI for that frame.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VblankLedger {
    /// Master dot of the most recent VBlank-set edge.
    pub set_dot: Option<u64>,
    /// Master dot of the most recent clear (pre-render line or `$2002` read).
    pub clear_dot: Option<u64>,
    /// A `$2002` read landed one dot before the set edge; the flag and NMI
    /// are withheld for this frame.
    pub suppress_this_frame: bool,
}

impl VblankLedger {
    pub fn record_set(&mut self, dot: u64) {
        self.set_dot = Some(dot);
    }

    pub fn record_clear(&mut self, dot: u64) {
        self.clear_dot = Some(dot);
    }

    /// Reconstructs the flag value as observable at `dot`: the latest
    /// recorded event at or before `dot` wins.
    pub fn visible_at(&self, dot: u64) -> bool {
        let set = match self.set_dot {
            Some(set) if set <= dot => set,
            _ => return false,
        };
        match self.clear_dot {
            Some(clear) if clear <= dot => clear < set,
            _ => true,
        }
    }

    pub fn start_frame(&mut self) {
        self.suppress_this_frame = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_event_wins() {
        let mut ledger = VblankLedger::default();
        ledger.record_set(100);
        assert!(!ledger.visible_at(99));
        assert!(ledger.visible_at(100));
        ledger.record_clear(150);
        assert!(ledger.visible_at(149));
        assert!(!ledger.visible_at(150));
        // A later set re-raises the flag.
        ledger.record_set(200);
        assert!(ledger.visible_at(201));
    }
}
