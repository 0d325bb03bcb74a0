use log::{debug, info, warn};

use crate::config::ModemConfig;
use crate::crypto;
use crate::decider::SymbolDecider;
use crate::error::ModemError;
use crate::framing::{self, ETX, STX};
use crate::goertzel::GoertzelBank;
use crate::hamming;
use crate::preamble::{Priority, SyncDetector};

/// Receive-side counters, exposed through `Modem::stats`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub msgs_ok: u64,
    pub msgs_fail: u64,
    pub crc_fail: u64,
    pub hamming_fail: u64,
    pub sym_fail: u64,
}

/// A message recovered from the air. `crc_ok` is always true: frames that
/// fail the checksum never surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedMessage {
    pub plaintext: String,
    pub priority: Priority,
    pub crc_ok: bool,
}

/// Streaming receive pipeline.
///
/// All state lives here and is mutated only inside `push_block`, which
/// the audio callback drives with each captured buffer. The slicer takes
/// exactly one symbol period per decision with no mid-frame clock
/// recovery, which bounds the tolerable clock drift between peers.
pub struct Receiver {
    config: ModemConfig,
    bank: GoertzelBank,
    decider: SymbolDecider,
    sync: SyncDetector,
    /// Captured samples not yet sliced into a symbol block.
    sample_accum: Vec<f32>,
    /// False before preamble lock, true while a frame is in flight.
    receiving: bool,
    priority: Priority,
    /// FEC-encoded bits accumulated since lock (raw data bits in BFSK).
    raw_bits: Vec<bool>,
    /// Bits after Hamming decoding, awaiting byte assembly.
    decoded_bits: Vec<bool>,
    /// Frame bytes collected between STX and ETX.
    text_buf: Vec<u8>,
    stats: Stats,
}

impl Receiver {
    pub fn new(config: ModemConfig) -> Self {
        Self {
            bank: GoertzelBank::new(&config),
            decider: SymbolDecider::new(&config),
            sync: SyncDetector::new(&config),
            sample_accum: Vec::new(),
            receiving: false,
            priority: Priority::Normal,
            raw_bits: Vec::new(),
            decoded_bits: Vec::new(),
            text_buf: Vec::new(),
            stats: Stats::default(),
            config,
        }
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    /// Drop buffered samples and any frame in flight. Counters survive.
    pub fn reset(&mut self) {
        self.sample_accum.clear();
        self.abort_frame();
    }

    fn abort_frame(&mut self) {
        self.receiving = false;
        self.raw_bits.clear();
        self.decoded_bits.clear();
        self.text_buf.clear();
        self.sync.clear();
    }

    /// Feed one captured PCM block; returns any messages it completed.
    ///
    /// Every full symbol period available after appending the block is
    /// sliced and decided in this single pass, so the work per callback
    /// is bounded by the block size.
    pub fn push_block(&mut self, block: &[f32], passphrase: &str) -> Vec<DecodedMessage> {
        self.sample_accum.extend_from_slice(block);

        let spb = self.config.samples_per_symbol();
        let mut messages = Vec::new();
        let mut offset = 0;
        while self.sample_accum.len() - offset >= spb {
            let powers = self.bank.powers(&self.sample_accum[offset..offset + spb]);
            offset += spb;
            if let Some(symbol) = self.decider.decide(&powers) {
                self.on_symbol(symbol, passphrase, &mut messages);
            }
        }
        self.sample_accum.drain(..offset);
        messages
    }

    fn on_symbol(&mut self, symbol: u8, passphrase: &str, out: &mut Vec<DecodedMessage>) {
        if !self.receiving {
            if let Some(priority) = self.sync.push(symbol) {
                info!("preamble lock ({priority:?})");
                self.abort_frame();
                self.receiving = true;
                self.priority = priority;
            }
            return;
        }

        let alphabet = self.config.mode.num_symbols() as u8;
        if symbol >= alphabet {
            warn!("{}", ModemError::Symbol(symbol));
            self.stats.sym_fail += 1;
            self.abort_frame();
            return;
        }

        let bits_per_symbol = self.config.mode.bits_per_symbol();
        for shift in (0..bits_per_symbol).rev() {
            self.raw_bits.push((symbol >> shift) & 1 == 1);
        }

        if self.config.mode.uses_hamming() {
            while self.raw_bits.len() >= hamming::CODEWORD_BITS {
                let codeword: Vec<bool> = self.raw_bits.drain(..hamming::CODEWORD_BITS).collect();
                match hamming::decode(&codeword) {
                    Ok(nibble) => {
                        for shift in (0..hamming::DATA_BITS).rev() {
                            self.decoded_bits.push((nibble >> shift) & 1 == 1);
                        }
                    }
                    Err(err) => {
                        warn!("{err}");
                        self.stats.hamming_fail += 1;
                        self.abort_frame();
                        return;
                    }
                }
            }
        } else {
            // Legacy path: the air bits are the data bits.
            self.decoded_bits.append(&mut self.raw_bits);
        }

        while self.decoded_bits.len() >= 8 {
            let byte_bits: Vec<bool> = self.decoded_bits.drain(..8).collect();
            let byte = framing::bits_to_byte(&byte_bits);
            match byte {
                STX => {
                    debug!("start of frame");
                    self.text_buf.clear();
                }
                ETX => {
                    self.finish_frame(passphrase, out);
                    return;
                }
                _ => self.text_buf.push(byte),
            }
        }
    }

    /// ETX seen: validate the collected payload, decrypt, report. The
    /// receiver returns to idle whatever the outcome.
    fn finish_frame(&mut self, passphrase: &str, out: &mut Vec<DecodedMessage>) {
        let outcome = framing::finalize_payload(&self.text_buf)
            .and_then(|cipher| crypto::decrypt(&cipher, passphrase));

        match outcome {
            Ok(plaintext) => {
                info!("message received ({} bytes, {:?})", plaintext.len(), self.priority);
                self.stats.msgs_ok += 1;
                out.push(DecodedMessage {
                    plaintext,
                    priority: self.priority,
                    crc_ok: true,
                });
            }
            Err(err) => {
                warn!("frame rejected: {err}");
                if matches!(err, ModemError::CrcMismatch) {
                    self.stats.crc_fail += 1;
                }
                self.stats.msgs_fail += 1;
            }
        }
        self.abort_frame();
    }
}
