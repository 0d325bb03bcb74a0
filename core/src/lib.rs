//! Encrypted acoustic data link.
//!
//! Short text messages travel speaker-to-microphone as FSK tone bursts:
//! AES-256-CBC under a shared passphrase, CRC-16 integrity over the
//! ciphertext, Hamming(7,4) forward error correction on the MFSK path,
//! STX/ETX framing, and a streaming Goertzel receiver that decodes in
//! real time from fixed-size capture blocks.

pub mod audio;
pub mod config;
pub mod crypto;
pub mod decider;
pub mod error;
pub mod framing;
pub mod goertzel;
pub mod hamming;
pub mod modem;
pub mod preamble;
pub mod receiver;
pub mod tone;

pub use audio::{AudioSink, AudioStatus};
pub use config::{ModemConfig, ModemMode};
pub use error::{ModemError, Result};
pub use framing::{CRC_DELIMITER, ETX, STX};
pub use modem::Modem;
pub use preamble::Priority;
pub use receiver::{DecodedMessage, Stats};
