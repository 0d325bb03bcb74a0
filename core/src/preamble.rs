use std::collections::VecDeque;

use crate::config::ModemConfig;

/// Delivery priority, signalled by which preamble pattern opens a burst.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    Normal,
    Urgent,
}

/// The preamble symbol sequence announcing a burst of the given priority.
///
/// Normal counts up through the alphabet (`0,1,2,…` mod M); urgent
/// alternates the extreme tones (`M−1,0,M−1,0,…`). With the binary
/// alphabet these degenerate to the legacy `0101…` and `1010…` bit
/// preambles.
pub fn preamble_symbols(config: &ModemConfig, priority: Priority) -> Vec<u8> {
    let m = config.mode.num_symbols();
    (0..config.preamble_symbols)
        .map(|i| match priority {
            Priority::Normal => (i % m) as u8,
            Priority::Urgent => {
                if i % 2 == 0 {
                    (m - 1) as u8
                } else {
                    0
                }
            }
        })
        .collect()
}

/// Sliding-window preamble matcher over the most recent symbol
/// decisions. The history is bounded at twice the preamble length;
/// urgent is tested before normal and the first match wins.
pub struct SyncDetector {
    history: VecDeque<u8>,
    capacity: usize,
    normal: Vec<u8>,
    urgent: Vec<u8>,
}

impl SyncDetector {
    pub fn new(config: &ModemConfig) -> Self {
        let capacity = config.preamble_symbols * 2;
        Self {
            history: VecDeque::with_capacity(capacity),
            capacity,
            normal: preamble_symbols(config, Priority::Normal),
            urgent: preamble_symbols(config, Priority::Urgent),
        }
    }

    /// Record one decided symbol; reports the matched priority when the
    /// history tail now equals a preamble pattern exactly.
    pub fn push(&mut self, symbol: u8) -> Option<Priority> {
        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(symbol);

        if self.tail_matches(&self.urgent) {
            Some(Priority::Urgent)
        } else if self.tail_matches(&self.normal) {
            Some(Priority::Normal)
        } else {
            None
        }
    }

    fn tail_matches(&self, pattern: &[u8]) -> bool {
        if self.history.len() < pattern.len() {
            return false;
        }
        self.history
            .iter()
            .skip(self.history.len() - pattern.len())
            .eq(pattern.iter())
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }
}
