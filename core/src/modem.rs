use log::debug;

use crate::audio::{AudioSink, AudioStatus};
use crate::config::ModemConfig;
use crate::crypto;
use crate::error::{ModemError, Result};
use crate::framing;
use crate::preamble::{self, Priority};
use crate::receiver::{DecodedMessage, Receiver, Stats};
use crate::tone;

/// A configured modem endpoint: the transmit pipeline and the streaming
/// receiver, sharing one session passphrase.
///
/// The receive path expects to be driven from an audio callback that
/// never overlaps itself, so no locking happens here.
pub struct Modem {
    config: ModemConfig,
    passphrase: String,
    receiver: Receiver,
}

impl Modem {
    /// Build a modem for one session. The passphrase encrypts outgoing
    /// messages and decrypts incoming ones.
    pub fn new(config: ModemConfig, passphrase: impl Into<String>) -> Result<Self> {
        config.validate()?;
        let passphrase = passphrase.into();
        if passphrase.is_empty() {
            return Err(ModemError::EmptyPassphrase);
        }
        Ok(Self {
            receiver: Receiver::new(config.clone()),
            config,
            passphrase,
        })
    }

    pub fn config(&self) -> &ModemConfig {
        &self.config
    }

    /// Run the whole transmit pipeline short of the speaker: encrypt,
    /// frame, modulate. Returns the PCM burst `transmit` would play.
    pub fn render(&self, message: &str, priority: Priority) -> Result<Vec<f32>> {
        let cipher = crypto::encrypt(message, &self.passphrase)?;
        let mut symbols = preamble::preamble_symbols(&self.config, priority);
        symbols.extend(framing::frame_symbols(&self.config, &cipher));
        debug!(
            "rendered {} symbols for a {} byte message",
            symbols.len(),
            message.len()
        );
        Ok(tone::render_burst(&self.config, &symbols))
    }

    /// Encrypt, frame, modulate and play one message, blocking until the
    /// sink has drained.
    pub fn transmit<S: AudioSink>(
        &self,
        sink: &mut S,
        message: &str,
        priority: Priority,
    ) -> Result<()> {
        let samples = self.render(message, priority)?;
        sink.play(&samples, self.config.sample_rate)?;
        sink.wait()
    }

    /// Feed one captured PCM block into the receive pipeline and collect
    /// any messages it completed.
    pub fn on_audio(&mut self, block: &[f32]) -> Vec<DecodedMessage> {
        self.receiver.push_block(block, &self.passphrase)
    }

    /// Like `on_audio`, honoring the driver status: an overflowed block
    /// is dropped whole so the symbol slicer can restabilize.
    pub fn on_audio_with_status(
        &mut self,
        block: &[f32],
        status: AudioStatus,
    ) -> Vec<DecodedMessage> {
        match status {
            AudioStatus::Ok => self.on_audio(block),
            AudioStatus::Overflow => {
                log::warn!("input overflow, dropping {} samples", block.len());
                Vec::new()
            }
        }
    }

    /// Abort any frame in flight and clear buffered samples.
    pub fn reset(&mut self) {
        self.receiver.reset();
    }

    pub fn stats(&self) -> Stats {
        self.receiver.stats()
    }
}
