use std::f32::consts::PI;

use crate::config::{ModemConfig, ModemMode};

/// Edge window limits. BFSK keeps the original wide linear ramp; MFSK
/// uses a shorter half-Hann rise that suppresses splatter without eating
/// into the shorter symbol period.
const BFSK_RAMP_MAX: usize = 100;
const BFSK_RAMP_DIVISOR: usize = 10;
const MFSK_RAMP_MAX: usize = 50;
const MFSK_RAMP_DIVISOR: usize = 20;

/// Peak magnitude the assembled burst is scaled down to when exceeded.
const PEAK_LIMIT: f32 = 0.95;

/// Nominal silence bracketing a burst, before symbol alignment.
const SILENCE_SECS: f32 = 0.2;

/// Synthesize the windowed sine block for one symbol. The block is
/// exactly one symbol period long and bounded by the configured volume.
pub fn symbol_tone(config: &ModemConfig, symbol: u8) -> Vec<f32> {
    let frequencies = config.mode.frequencies();
    debug_assert!((symbol as usize) < frequencies.len());
    let freq = frequencies[symbol as usize];

    let n = config.samples_per_symbol();
    let step = 2.0 * PI * freq / config.sample_rate as f32;
    let mut samples: Vec<f32> = (0..n)
        .map(|i| config.volume * (step * i as f32).sin())
        .collect();
    apply_edge_window(&mut samples, &config.mode);
    samples
}

fn ramp_len(mode: &ModemMode, symbol_samples: usize) -> usize {
    match mode {
        ModemMode::Bfsk { .. } => (symbol_samples / BFSK_RAMP_DIVISOR).min(BFSK_RAMP_MAX),
        ModemMode::Mfsk { .. } => (symbol_samples / MFSK_RAMP_DIVISOR).min(MFSK_RAMP_MAX),
    }
}

/// Attenuate both symbol edges: a linear 0→1 ramp in BFSK, the rising
/// half of a Hann window in MFSK, mirrored at the tail.
fn apply_edge_window(samples: &mut [f32], mode: &ModemMode) {
    let w = ramp_len(mode, samples.len());
    if w == 0 {
        return;
    }
    let n = samples.len();
    for i in 0..w {
        let weight = match mode {
            ModemMode::Bfsk { .. } => i as f32 / (w - 1).max(1) as f32,
            ModemMode::Mfsk { .. } => {
                0.5 * (1.0 - (2.0 * PI * i as f32 / (2 * w - 1) as f32).cos())
            }
        };
        samples[i] *= weight;
        samples[n - 1 - i] *= weight;
    }
}

/// Silence rounded up to whole symbol periods, so the receiver's
/// drift-free slicer enters the preamble symbol-aligned.
pub fn aligned_silence(config: &ModemConfig) -> Vec<f32> {
    let spb = config.samples_per_symbol();
    let nominal = (config.sample_rate as f32 * SILENCE_SECS).ceil() as usize;
    let periods = (nominal + spb - 1) / spb;
    vec![0.0; periods * spb]
}

/// Render a complete burst: leading silence, one tone per symbol,
/// trailing silence. If any sample would exceed `PEAK_LIMIT`, the whole
/// burst is scaled uniformly so the peak lands on it.
pub fn render_burst(config: &ModemConfig, symbols: &[u8]) -> Vec<f32> {
    let silence = aligned_silence(config);
    let mut samples =
        Vec::with_capacity(silence.len() * 2 + symbols.len() * config.samples_per_symbol());
    samples.extend_from_slice(&silence);
    for &symbol in symbols {
        samples.extend_from_slice(&symbol_tone(config, symbol));
    }
    samples.extend_from_slice(&silence);
    normalize_peak(&mut samples);
    samples
}

fn normalize_peak(samples: &mut [f32]) {
    let peak = samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
    if peak > PEAK_LIMIT {
        let scale = PEAK_LIMIT / peak;
        for sample in samples.iter_mut() {
            *sample *= scale;
        }
    }
}
