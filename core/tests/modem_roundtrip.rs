// Full acoustic loopback tests: the transmit pipeline's PCM output is fed
// straight back into the streaming receiver, in capture-sized blocks, the
// way a live microphone callback would deliver it.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use tonelink_core::preamble::preamble_symbols;
use tonelink_core::{crypto, framing, tone};
use tonelink_core::{Modem, ModemConfig, Priority};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Deliver samples in fixed-size blocks, as an audio driver would.
fn feed(modem: &mut Modem, samples: &[f32], block: usize) -> Vec<tonelink_core::DecodedMessage> {
    let mut out = Vec::new();
    for chunk in samples.chunks(block) {
        out.extend(modem.on_audio(chunk));
    }
    out
}

#[test]
fn test_mfsk_loopback() {
    init_logging();
    let mut modem = Modem::new(ModemConfig::mfsk(), "pw").unwrap();
    let burst = modem.render("hello", Priority::Normal).unwrap();

    let messages = feed(&mut modem, &burst, 1024);
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].plaintext, "hello");
    assert_eq!(messages[0].priority, Priority::Normal);
    assert!(messages[0].crc_ok);

    let stats = modem.stats();
    assert_eq!(stats.msgs_ok, 1);
    assert_eq!(stats.msgs_fail, 0);
    assert_eq!(stats.crc_fail, 0);
    assert_eq!(stats.hamming_fail, 0);
}

#[test]
fn test_loopback_across_block_sizes() {
    let spb = ModemConfig::mfsk().samples_per_symbol();
    for block in [256, 1024, spb, spb - 1] {
        let mut modem = Modem::new(ModemConfig::mfsk(), "pw").unwrap();
        let burst = modem.render("block size test", Priority::Normal).unwrap();
        let messages = feed(&mut modem, &burst, block);
        assert_eq!(messages.len(), 1, "block size {block}");
        assert_eq!(messages[0].plaintext, "block size test");
    }
}

#[test]
fn test_urgent_loopback() {
    let mut modem = Modem::new(ModemConfig::mfsk(), "pw").unwrap();
    let burst = modem.render("ping", Priority::Urgent).unwrap();
    let messages = feed(&mut modem, &burst, 512);
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].plaintext, "ping");
    assert_eq!(messages[0].priority, Priority::Urgent);
}

#[test]
fn test_bfsk_loopback() {
    init_logging();
    let mut modem = Modem::new(ModemConfig::bfsk(), "pw").unwrap();
    let burst = modem.render("legacy link", Priority::Normal).unwrap();
    let messages = feed(&mut modem, &burst, 1024);
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].plaintext, "legacy link");
}

#[test]
fn test_two_bursts_back_to_back() {
    let mut modem = Modem::new(ModemConfig::mfsk(), "pw").unwrap();
    let first = modem.render("first", Priority::Normal).unwrap();
    let second = modem.render("second", Priority::Urgent).unwrap();

    let mut messages = feed(&mut modem, &first, 1024);
    messages.extend(feed(&mut modem, &second, 1024));

    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].plaintext, "first");
    assert_eq!(messages[1].plaintext, "second");
    assert_eq!(messages[1].priority, Priority::Urgent);
    assert_eq!(modem.stats().msgs_ok, 2);
}

#[test]
fn test_wrong_passphrase_yields_nothing() {
    let sender = Modem::new(ModemConfig::mfsk(), "k1").unwrap();
    let burst = sender.render("abc", Priority::Normal).unwrap();

    let mut receiver = Modem::new(ModemConfig::mfsk(), "k2").unwrap();
    let messages = feed(&mut receiver, &burst, 1024);
    assert!(messages.is_empty());

    // The CRC covers the ciphertext, so it passes; decryption is what fails.
    let stats = receiver.stats();
    assert_eq!(stats.msgs_fail, 1);
    assert_eq!(stats.crc_fail, 0);
}

#[test]
fn test_tampered_ciphertext_is_rejected_over_the_air() {
    let config = ModemConfig::mfsk();
    let cipher = crypto::encrypt("data", "pw").unwrap();
    let crc = crypto::crc16_hex(&cipher);

    // Corrupt one ciphertext byte but keep the original CRC field.
    let mut tampered = cipher.into_bytes();
    tampered[10] = if tampered[10] == b'A' { b'B' } else { b'A' };
    tampered.push(framing::CRC_DELIMITER);
    tampered.extend_from_slice(crc.as_bytes());

    let mut symbols = preamble_symbols(&config, Priority::Normal);
    symbols.extend(framing::symbols_for_payload(&config, &tampered));
    let burst = tone::render_burst(&config, &symbols);

    let mut modem = Modem::new(config, "pw").unwrap();
    let messages = feed(&mut modem, &burst, 1024);
    assert!(messages.is_empty());

    let stats = modem.stats();
    assert_eq!(stats.crc_fail, 1);
    assert_eq!(stats.msgs_fail, 1);
}

#[test]
fn test_truncated_burst_produces_no_false_positive() {
    let mut modem = Modem::new(ModemConfig::mfsk(), "pw").unwrap();
    let burst = modem.render("cut off", Priority::Normal).unwrap();

    // Stop transmitting well before ETX, then go quiet.
    let spb = modem.config().samples_per_symbol();
    let cut = burst.len() - burst.len() / 3;
    let mut truncated = burst[..cut].to_vec();
    truncated.extend(std::iter::repeat(0.0).take(spb * 20));

    let messages = feed(&mut modem, &truncated, 1024);
    assert!(messages.is_empty());
    assert_eq!(modem.stats().msgs_ok, 0);
}

#[test]
fn test_silence_produces_no_decisions() {
    let mut modem = Modem::new(ModemConfig::mfsk(), "pw").unwrap();
    let silence = vec![0.0f32; 44_100];
    let messages = feed(&mut modem, &silence, 1024);
    assert!(messages.is_empty());

    let stats = modem.stats();
    assert_eq!(stats.msgs_ok, 0);
    assert_eq!(stats.msgs_fail, 0);
    assert_eq!(stats.sym_fail, 0);
}

#[test]
fn test_preamble_followed_by_noise_never_decodes() {
    let config = ModemConfig::mfsk();
    let mut rng = StdRng::seed_from_u64(0x5EED);

    let mut symbols = preamble_symbols(&config, Priority::Normal);
    symbols.extend((0..200).map(|_| rng.gen_range(0u8..16)));
    let burst = tone::render_burst(&config, &symbols);

    let mut modem = Modem::new(config, "pw").unwrap();
    let messages = feed(&mut modem, &burst, 1024);
    assert!(messages.is_empty());
    assert_eq!(modem.stats().msgs_ok, 0);
}

#[test]
fn test_sign_flipped_block_still_decodes() {
    // Inverting a symbol period's polarity leaves its tone power intact.
    let mut modem = Modem::new(ModemConfig::mfsk(), "pw").unwrap();
    let mut burst = modem.render("data", Priority::Normal).unwrap();

    let spb = modem.config().samples_per_symbol();
    let silence = tone::aligned_silence(modem.config()).len();
    let start = silence + (16 + 4) * spb; // a data symbol past the preamble
    for sample in &mut burst[start..start + spb] {
        *sample = -*sample;
    }

    let messages = feed(&mut modem, &burst, 1024);
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].plaintext, "data");
}

#[test]
fn test_single_bit_symbol_error_is_healed_over_the_air() {
    let config = ModemConfig::mfsk();
    let cipher = crypto::encrypt("data", "pw").unwrap();

    let preamble = preamble_symbols(&config, Priority::Normal);
    let mut symbols = preamble.clone();
    symbols.extend(framing::frame_symbols(&config, &cipher));

    // One wrong bit in one data symbol: a single FEC-stream bit flips,
    // and one Hamming codeword corrects it.
    let victim = preamble.len() + 7;
    symbols[victim] ^= 1;
    let burst = tone::render_burst(&config, &symbols);

    let mut modem = Modem::new(config, "pw").unwrap();
    let messages = feed(&mut modem, &burst, 1024);
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].plaintext, "data");
    assert_eq!(modem.stats().hamming_fail, 0);
    assert_eq!(modem.stats().msgs_ok, 1);
}

#[test]
fn test_reset_drops_partial_frame() {
    let mut modem = Modem::new(ModemConfig::mfsk(), "pw").unwrap();
    let burst = modem.render("interrupted", Priority::Normal).unwrap();

    feed(&mut modem, &burst[..burst.len() / 2], 1024);
    modem.reset();
    // The tail alone has no preamble, so nothing should come out.
    let messages = feed(&mut modem, &burst[burst.len() / 2..], 1024);
    assert!(messages.is_empty());
    assert_eq!(modem.stats().msgs_ok, 0);
}
