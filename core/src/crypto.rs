use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;

use crate::error::{ModemError, Result};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

pub const SALT_LEN: usize = 16;
pub const IV_LEN: usize = 16;

const KEY_LEN: usize = 32;
const PBKDF2_ITERATIONS: u32 = 100_000;
const AES_BLOCK: usize = 16;

fn derive_key(passphrase: &str, salt: &[u8]) -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    pbkdf2::pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), salt, PBKDF2_ITERATIONS, &mut key);
    key
}

/// Encrypt a message under a passphrase.
///
/// A fresh 16-byte salt and IV are drawn from the OS RNG per call; the key
/// is PBKDF2-HMAC-SHA256 over the passphrase and salt. The result is
/// Base64(salt ‖ iv ‖ AES-256-CBC(PKCS#7(plaintext))) with no line breaks.
/// Encryption alone does not authenticate; the frame CRC covers integrity.
pub fn encrypt(plaintext: &str, passphrase: &str) -> Result<String> {
    if passphrase.is_empty() {
        return Err(ModemError::EmptyPassphrase);
    }

    let mut salt = [0u8; SALT_LEN];
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut salt);
    OsRng.fill_bytes(&mut iv);

    let key = derive_key(passphrase, &salt);
    let ciphertext =
        Aes256CbcEnc::new(&key.into(), &iv.into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

    let mut envelope = Vec::with_capacity(SALT_LEN + IV_LEN + ciphertext.len());
    envelope.extend_from_slice(&salt);
    envelope.extend_from_slice(&iv);
    envelope.extend_from_slice(&ciphertext);
    Ok(BASE64.encode(envelope))
}

/// Invert `encrypt`. Fails on malformed Base64, a truncated envelope, a
/// bad PKCS#7 tail, or non-UTF-8 plaintext (a wrong passphrase surfaces
/// as one of the last two).
pub fn decrypt(encoded: &str, passphrase: &str) -> Result<String> {
    if passphrase.is_empty() {
        return Err(ModemError::EmptyPassphrase);
    }

    let envelope = BASE64
        .decode(encoded)
        .map_err(|e| ModemError::Cipher(format!("base64: {e}")))?;
    if envelope.len() < SALT_LEN + IV_LEN
        || (envelope.len() - SALT_LEN - IV_LEN) % AES_BLOCK != 0
    {
        return Err(ModemError::Cipher(format!(
            "envelope of {} bytes is not salt + iv + whole blocks",
            envelope.len()
        )));
    }

    let (salt, rest) = envelope.split_at(SALT_LEN);
    let (iv, ciphertext) = rest.split_at(IV_LEN);
    let key = derive_key(passphrase, salt);

    let padded = Aes256CbcDec::new_from_slices(&key, iv)
        .map_err(|e| ModemError::Cipher(e.to_string()))?
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| ModemError::Cipher("PKCS#7 padding check failed".into()))?;

    String::from_utf8(padded).map_err(|_| ModemError::Cipher("plaintext is not valid UTF-8".into()))
}

/// CRC-16 with polynomial 0x1021, initial value 0xFFFF, no reflection and
/// no final XOR, as the link has always computed it.
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u32 = 0xFFFF;
    for &byte in data {
        crc ^= (byte as u32) << 8;
        for _ in 0..8 {
            crc <<= 1;
            if crc & 0x10000 != 0 {
                crc ^= 0x1021;
            }
        }
    }
    (crc & 0xFFFF) as u16
}

/// CRC of a string's UTF-8 bytes as exactly four uppercase hex digits.
pub fn crc16_hex(data: &str) -> String {
    format!("{:04X}", crc16(data.as_bytes()))
}

/// Case-insensitive check of a received CRC field.
pub fn verify_crc(data: &str, crc_hex: &str) -> bool {
    crc16_hex(data).eq_ignore_ascii_case(crc_hex)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let cases = [
            ("hello", "pw"),
            ("", "secret"),
            ("exactly sixteen!", "k"),
            ("längere Nachricht mit Umlauten und 日本語", "pässwörd"),
        ];
        for (plaintext, passphrase) in cases {
            let encoded = encrypt(plaintext, passphrase).unwrap();
            let decoded = decrypt(&encoded, passphrase).unwrap();
            assert_eq!(decoded, plaintext, "roundtrip failed for {plaintext:?}");
        }
    }

    #[test]
    fn test_ciphertext_unique_per_call() {
        let a = encrypt("same message", "same key").unwrap();
        let b = encrypt("same message", "same key").unwrap();
        let raw_a = BASE64.decode(&a).unwrap();
        let raw_b = BASE64.decode(&b).unwrap();
        // Salt and IV are drawn fresh, so the first 32 bytes must differ.
        assert_ne!(&raw_a[..SALT_LEN + IV_LEN], &raw_b[..SALT_LEN + IV_LEN]);
    }

    #[test]
    fn test_envelope_layout() {
        let encoded = encrypt("payload", "pw").unwrap();
        let raw = BASE64.decode(&encoded).unwrap();
        assert!(raw.len() >= SALT_LEN + IV_LEN + AES_BLOCK);
        assert_eq!((raw.len() - SALT_LEN - IV_LEN) % AES_BLOCK, 0);
    }

    #[test]
    fn test_wrong_passphrase_fails() {
        let encoded = encrypt("abc", "k1").unwrap();
        assert!(decrypt(&encoded, "k2").is_err());
    }

    #[test]
    fn test_empty_passphrase_rejected() {
        assert!(matches!(encrypt("x", ""), Err(ModemError::EmptyPassphrase)));
        assert!(matches!(decrypt("x", ""), Err(ModemError::EmptyPassphrase)));
    }

    #[test]
    fn test_truncated_envelope_rejected() {
        let short = BASE64.encode([0u8; 31]);
        assert!(decrypt(&short, "pw").is_err());

        let ragged = BASE64.encode([0u8; 41]);
        assert!(decrypt(&ragged, "pw").is_err());
    }

    #[test]
    fn test_crc16_vector() {
        // Check value for poly 0x1021 / init 0xFFFF over "123456789".
        assert_eq!(crc16(b"123456789"), 0x29B1);
        assert_eq!(crc16_hex("123456789"), "29B1");
    }

    #[test]
    fn test_crc16_stable_and_four_digits() {
        let one = crc16_hex("some payload");
        let two = crc16_hex("some payload");
        assert_eq!(one, two);
        assert_eq!(one.len(), 4);
        assert!(one.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_verify_crc_case_insensitive() {
        let crc = crc16_hex("data");
        assert!(verify_crc("data", &crc));
        assert!(verify_crc("data", &crc.to_lowercase()));
        assert!(!verify_crc("data", "0000"));
    }
}
