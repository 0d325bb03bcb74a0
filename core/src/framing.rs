use log::warn;

use crate::config::ModemConfig;
use crate::crypto;
use crate::error::{ModemError, Result};
use crate::hamming;

/// Start-of-text sentinel opening every frame.
pub const STX: u8 = 0x02;
/// End-of-text sentinel closing every frame.
pub const ETX: u8 = 0x03;
/// Separates the ciphertext from its CRC field inside the frame.
pub const CRC_DELIMITER: u8 = b'|';

/// Serialize bytes into bits, MSB first.
pub fn bytes_to_bits(bytes: &[u8]) -> Vec<bool> {
    let mut bits = Vec::with_capacity(bytes.len() * 8);
    for &byte in bytes {
        for shift in (0..8).rev() {
            bits.push((byte >> shift) & 1 == 1);
        }
    }
    bits
}

/// Pack exactly eight bits, MSB first, into a byte.
pub fn bits_to_byte(bits: &[bool]) -> u8 {
    debug_assert_eq!(bits.len(), 8);
    bits.iter().fold(0u8, |acc, &bit| (acc << 1) | bit as u8)
}

/// Build the on-air symbol sequence for an encrypted payload: append the
/// CRC field, frame with STX/ETX, and serialize per the configured mode.
pub fn frame_symbols(config: &ModemConfig, cipher_b64: &str) -> Vec<u8> {
    let payload = format!(
        "{}{}{}",
        cipher_b64,
        CRC_DELIMITER as char,
        crypto::crc16_hex(cipher_b64)
    );
    symbols_for_payload(config, payload.as_bytes())
}

/// Frame an arbitrary payload between STX and ETX and turn it into
/// symbols: MSB-first bit serialization, Hamming(7,4) per nibble on the
/// MFSK path, then MSB-first grouping into symbol indices. Both padding
/// steps append zero bits.
pub fn symbols_for_payload(config: &ModemConfig, payload: &[u8]) -> Vec<u8> {
    let mut framed = Vec::with_capacity(payload.len() + 2);
    framed.push(STX);
    framed.extend_from_slice(payload);
    framed.push(ETX);

    let mut bits = bytes_to_bits(&framed);

    if config.mode.uses_hamming() {
        while bits.len() % hamming::DATA_BITS != 0 {
            bits.push(false);
        }
        let mut fec_bits = Vec::with_capacity(bits.len() / hamming::DATA_BITS * hamming::CODEWORD_BITS);
        for chunk in bits.chunks(hamming::DATA_BITS) {
            let nibble = chunk.iter().fold(0u8, |acc, &bit| (acc << 1) | bit as u8);
            fec_bits.extend_from_slice(&hamming::encode(nibble));
        }
        bits = fec_bits;
    }

    let bits_per_symbol = config.mode.bits_per_symbol();
    while bits.len() % bits_per_symbol != 0 {
        bits.push(false);
    }
    bits.chunks(bits_per_symbol)
        .map(|chunk| chunk.iter().fold(0u8, |acc, &bit| (acc << 1) | bit as u8))
        .collect()
}

/// Validate a received STX..ETX payload and return the ciphertext string.
///
/// The CRC field is everything after the last `'|'`; the checksum check
/// is case-insensitive. Decryption is the caller's business.
pub fn finalize_payload(payload: &[u8]) -> Result<String> {
    let text = std::str::from_utf8(payload)
        .map_err(|_| ModemError::Cipher("frame payload is not valid UTF-8".into()))?;

    let Some((cipher, crc_hex)) = text.rsplit_once(CRC_DELIMITER as char) else {
        return Err(ModemError::Framing("missing CRC delimiter".into()));
    };

    if !crypto::verify_crc(cipher, crc_hex) {
        warn!(
            "CRC mismatch: field {crc_hex:?}, computed {}",
            crypto::crc16_hex(cipher)
        );
        return Err(ModemError::CrcMismatch);
    }
    Ok(cipher.to_string())
}
