use crate::config::{ModemConfig, ModemMode};

/// Turns a bank power vector into a symbol decision, or `None` when the
/// slice is too weak or too ambiguous to trust. A `None` simply drops the
/// slice; the stream slicer advances regardless.
pub struct SymbolDecider {
    power_gate: f32,
    confidence_ratio: f32,
    binary: bool,
}

impl SymbolDecider {
    pub fn new(config: &ModemConfig) -> Self {
        Self {
            power_gate: config.power_gate,
            confidence_ratio: config.confidence_ratio,
            binary: matches!(config.mode, ModemMode::Bfsk { .. }),
        }
    }

    pub fn decide(&self, powers: &[f32]) -> Option<u8> {
        let total: f32 = powers.iter().sum();
        if total < self.power_gate {
            return None;
        }
        if self.binary {
            self.decide_binary(powers[0], powers[1])
        } else {
            self.decide_mary(powers)
        }
    }

    /// Tone ratio test: strong preference for f1 reads as 1, strong
    /// preference for f0 as 0, anything in between is dropped.
    fn decide_binary(&self, p0: f32, p1: f32) -> Option<u8> {
        let ratio = if p0 > 0.0 { p1 / p0 } else { f32::INFINITY };
        if ratio > self.confidence_ratio {
            Some(1)
        } else if ratio < 1.0 / self.confidence_ratio {
            Some(0)
        } else {
            None
        }
    }

    /// Strongest tone wins, but only if it dominates the runner-up.
    fn decide_mary(&self, powers: &[f32]) -> Option<u8> {
        let mut best = 0usize;
        let mut best_power = powers[0];
        for (i, &p) in powers.iter().enumerate().skip(1) {
            if p > best_power {
                best_power = p;
                best = i;
            }
        }

        let runner_up = powers
            .iter()
            .enumerate()
            .filter(|&(i, _)| i != best)
            .map(|(_, &p)| p)
            .fold(0.0f32, f32::max);
        if runner_up > 0.0 && best_power / runner_up < self.confidence_ratio {
            return None;
        }
        Some(best as u8)
    }
}
