use crate::error::Result;

/// Driver-reported condition accompanying a captured block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioStatus {
    Ok,
    /// The driver dropped samples; the current block is unreliable.
    Overflow,
}

/// Blocking playback sink for rendered bursts.
///
/// `play` hands the mono signal to the device (implementations may fan it
/// out to N identical channels); `wait` returns once playback has
/// drained. The core never talks to audio hardware itself.
pub trait AudioSink {
    fn play(&mut self, samples: &[f32], sample_rate: u32) -> Result<()>;
    fn wait(&mut self) -> Result<()>;
}
