use crate::error::{ModemError, Result};

/// Nominal sample rate shared by both ends of the link.
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// Output amplitude; kept well below full scale to avoid speaker clipping.
pub const DEFAULT_VOLUME: f32 = 0.3;

/// Preamble length in symbols (MFSK) or bits (BFSK).
pub const DEFAULT_PREAMBLE_SYMBOLS: usize = 16;

/// Minimum summed bank power before a symbol slice is considered present.
/// Tuned against typical laptop microphones; adjust per deployment.
pub const DEFAULT_POWER_GATE: f32 = 1000.0;

/// MFSK defaults: 16 tones of 100 Hz spacing from 1 kHz, 45 baud.
pub const MFSK_BAUD: u32 = 45;
pub const MFSK_TONES: usize = 16;
pub const MFSK_BASE_FREQ: f32 = 1000.0;
pub const MFSK_FREQ_SPACING: f32 = 100.0;
pub const MFSK_CONFIDENCE_RATIO: f32 = 1.3;

/// Legacy BFSK defaults: 1 kHz / 2 kHz tones at 40 baud.
pub const BFSK_BAUD: u32 = 40;
pub const BFSK_F0: f32 = 1000.0;
pub const BFSK_F1: f32 = 2000.0;
pub const BFSK_CONFIDENCE_RATIO: f32 = 1.5;

/// Modulation scheme. Both ends of a link must be configured identically:
/// the mode fixes the tone alphabet, the preamble format, and whether
/// Hamming(7,4) protection is applied to the frame bits.
#[derive(Debug, Clone, PartialEq)]
pub enum ModemMode {
    /// Legacy binary FSK: one bit per symbol, no forward error correction.
    Bfsk { f0: f32, f1: f32 },

    /// M-ary FSK with Hamming(7,4) on the frame bits. `tones` must be a
    /// power of two; each symbol carries log2(tones) bits.
    Mfsk {
        base_freq: f32,
        freq_spacing: f32,
        tones: usize,
    },
}

impl ModemMode {
    /// Size of the symbol alphabet.
    pub fn num_symbols(&self) -> usize {
        match self {
            ModemMode::Bfsk { .. } => 2,
            ModemMode::Mfsk { tones, .. } => *tones,
        }
    }

    /// Bits carried by one symbol.
    pub fn bits_per_symbol(&self) -> usize {
        match self {
            ModemMode::Bfsk { .. } => 1,
            ModemMode::Mfsk { tones, .. } => tones.trailing_zeros() as usize,
        }
    }

    /// Whether the frame bits are Hamming(7,4) encoded on the air.
    pub fn uses_hamming(&self) -> bool {
        matches!(self, ModemMode::Mfsk { .. })
    }

    /// Tone frequency for every symbol index, in order.
    pub fn frequencies(&self) -> Vec<f32> {
        match self {
            ModemMode::Bfsk { f0, f1 } => vec![*f0, *f1],
            ModemMode::Mfsk {
                base_freq,
                freq_spacing,
                tones,
            } => (0..*tones)
                .map(|i| base_freq + i as f32 * freq_spacing)
                .collect(),
        }
    }
}

/// Immutable per-session modem parameters. Construct through `mfsk()` or
/// `bfsk()` and override fields as needed; `Modem::new` validates the
/// result before any audio is produced or consumed.
#[derive(Debug, Clone, PartialEq)]
pub struct ModemConfig {
    pub sample_rate: u32,
    /// Symbols per second.
    pub baud: u32,
    pub mode: ModemMode,
    /// Output amplitude in (0, 1].
    pub volume: f32,
    /// Length of the synchronization preamble, in symbols.
    pub preamble_symbols: usize,
    /// Minimum summed bank power for a slice to count as a symbol.
    pub power_gate: f32,
    /// Minimum dominance ratio for a decision to be accepted: f1/f0 (or
    /// its inverse) in BFSK, strongest/runner-up in MFSK.
    pub confidence_ratio: f32,
}

impl ModemConfig {
    /// The current deployment profile: 16-tone MFSK with Hamming(7,4).
    pub fn mfsk() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            baud: MFSK_BAUD,
            mode: ModemMode::Mfsk {
                base_freq: MFSK_BASE_FREQ,
                freq_spacing: MFSK_FREQ_SPACING,
                tones: MFSK_TONES,
            },
            volume: DEFAULT_VOLUME,
            preamble_symbols: DEFAULT_PREAMBLE_SYMBOLS,
            power_gate: DEFAULT_POWER_GATE,
            confidence_ratio: MFSK_CONFIDENCE_RATIO,
        }
    }

    /// Compatibility profile for peers still running the binary link.
    pub fn bfsk() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            baud: BFSK_BAUD,
            mode: ModemMode::Bfsk {
                f0: BFSK_F0,
                f1: BFSK_F1,
            },
            volume: DEFAULT_VOLUME,
            preamble_symbols: DEFAULT_PREAMBLE_SYMBOLS,
            power_gate: DEFAULT_POWER_GATE,
            confidence_ratio: BFSK_CONFIDENCE_RATIO,
        }
    }

    /// Samples in one symbol period (floor of sample_rate / baud).
    pub fn samples_per_symbol(&self) -> usize {
        (self.sample_rate / self.baud) as usize
    }

    pub fn validate(&self) -> Result<()> {
        if self.baud == 0 || self.baud > self.sample_rate {
            return Err(ModemError::InvalidConfig(format!(
                "baud {} must be in 1..={}",
                self.baud, self.sample_rate
            )));
        }
        if !(self.volume > 0.0 && self.volume <= 1.0) {
            return Err(ModemError::InvalidConfig(format!(
                "volume {} outside (0, 1]",
                self.volume
            )));
        }
        if self.preamble_symbols < 2 {
            return Err(ModemError::InvalidConfig(
                "preamble must be at least 2 symbols".into(),
            ));
        }
        if self.power_gate <= 0.0 {
            return Err(ModemError::InvalidConfig(
                "power gate must be positive".into(),
            ));
        }
        if self.confidence_ratio <= 1.0 {
            return Err(ModemError::InvalidConfig(
                "confidence ratio must exceed 1.0".into(),
            ));
        }
        if let ModemMode::Mfsk { tones, .. } = self.mode {
            if tones < 2 || tones > 256 || !tones.is_power_of_two() {
                return Err(ModemError::InvalidConfig(format!(
                    "tone count {tones} must be a power of two in 2..=256"
                )));
            }
        }
        let nyquist = self.sample_rate as f32 / 2.0;
        for freq in self.mode.frequencies() {
            if freq <= 0.0 || freq >= nyquist {
                return Err(ModemError::InvalidConfig(format!(
                    "tone at {freq} Hz outside (0, {nyquist}) Hz"
                )));
            }
        }
        Ok(())
    }
}
