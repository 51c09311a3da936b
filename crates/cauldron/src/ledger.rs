//! Per-savage consumption counters.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::event::SavageId;

/// Servings eaten by each savage.
///
/// Entries are independent atomics so the ledger can be read while savages
/// are still eating. The pot only records under its lock, which keeps
/// [`crate::Pot::snapshot`] consistent across entries.
#[derive(Debug)]
pub struct Ledger {
    entries: Box<[AtomicU64]>,
}

impl Ledger {
    pub fn new(savages: usize) -> Self {
        Self {
            entries: (0..savages).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    /// Count one serving for `savage`, returning its new total.
    pub(crate) fn record(&self, savage: SavageId) -> u64 {
        self.entries[savage].fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn snapshot(&self) -> Vec<u64> {
        self.entries
            .iter()
            .map(|e| e.load(Ordering::Acquire))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_zero() {
        assert_eq!(Ledger::new(3).snapshot(), vec![0, 0, 0]);
    }

    #[test]
    fn record_returns_running_total() {
        let ledger = Ledger::new(2);
        assert_eq!(ledger.record(1), 1);
        assert_eq!(ledger.record(1), 2);
        assert_eq!(ledger.record(0), 1);
        assert_eq!(ledger.snapshot(), vec![1, 2]);
    }
}
