use std::f32::consts::PI;

use crate::config::ModemConfig;

/// Goertzel filter bank over the configured tone alphabet.
///
/// Each target frequency is snapped to the nearest DFT bin of the symbol
/// block (k = round(N·f/fs)) and evaluated with the two-tap recurrence;
/// the per-tone coefficients only depend on the config, so they are
/// computed once and reused for every block.
pub struct GoertzelBank {
    coeffs: Vec<f32>,
}

impl GoertzelBank {
    pub fn new(config: &ModemConfig) -> Self {
        let n = config.samples_per_symbol() as f32;
        let fs = config.sample_rate as f32;
        let coeffs = config
            .mode
            .frequencies()
            .iter()
            .map(|&freq| {
                let k = (n * freq / fs).round();
                2.0 * (2.0 * PI * k / n).cos()
            })
            .collect();
        Self { coeffs }
    }

    /// Signal power at every bank frequency across one symbol block.
    pub fn powers(&self, samples: &[f32]) -> Vec<f32> {
        self.coeffs
            .iter()
            .map(|&coeff| {
                let mut s_prev = 0.0f32;
                let mut s_prev2 = 0.0f32;
                for &sample in samples {
                    let s = sample + coeff * s_prev - s_prev2;
                    s_prev2 = s_prev;
                    s_prev = s;
                }
                s_prev * s_prev + s_prev2 * s_prev2 - coeff * s_prev * s_prev2
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.coeffs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coeffs.is_empty()
    }
}
