use std::io::BufRead;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};
use log::warn;
use tonelink_core::{AudioSink, Modem, ModemConfig, ModemError, Priority};

#[derive(Parser)]
#[command(name = "tonelink")]
#[command(about = "Encrypted text messaging over an audio channel")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Modulation mode; must match the peer
    #[arg(long, value_enum, default_value = "mfsk", global = true)]
    mode: Mode,

    /// Override symbols per second
    #[arg(long, global = true)]
    baud: Option<u32>,

    /// Output amplitude in (0, 1]
    #[arg(long, global = true)]
    volume: Option<f32>,

    /// Minimum summed tone power for a slice to count as a symbol
    #[arg(long, global = true)]
    power_gate: Option<f32>,

    /// Minimum dominance ratio for accepting a symbol decision
    #[arg(long, global = true)]
    confidence: Option<f32>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    /// 16-tone FSK with Hamming(7,4) error correction
    Mfsk,
    /// Legacy two-tone link without error correction
    Bfsk,
}

#[derive(Subcommand)]
enum Commands {
    /// Transmit a message through an output device
    Send {
        /// Message text; omit to read lines from stdin until EOF or "exit"
        message: Option<String>,

        /// Shared session passphrase
        #[arg(short, long)]
        passphrase: String,

        /// Announce the message with the urgent preamble
        #[arg(long)]
        urgent: bool,

        /// Output device index from `tonelink devices`
        #[arg(short, long)]
        device: Option<usize>,
    },

    /// Listen on an input device and print decoded messages
    Listen {
        /// Shared session passphrase
        #[arg(short, long)]
        passphrase: String,

        /// Input device index from `tonelink devices`
        #[arg(short, long)]
        device: Option<usize>,
    },

    /// Render a message into a WAV file instead of playing it
    Encode {
        message: String,

        /// Output WAV file
        #[arg(value_name = "OUTPUT.WAV")]
        output: PathBuf,

        #[arg(short, long)]
        passphrase: String,

        #[arg(long)]
        urgent: bool,
    },

    /// Decode messages from a WAV file
    Decode {
        /// Input WAV file
        #[arg(value_name = "INPUT.WAV")]
        input: PathBuf,

        #[arg(short, long)]
        passphrase: String,
    },

    /// List capture and playback devices with their indices
    Devices,
}

fn build_config(cli: &Cli) -> ModemConfig {
    let mut config = match cli.mode {
        Mode::Mfsk => ModemConfig::mfsk(),
        Mode::Bfsk => ModemConfig::bfsk(),
    };
    if let Some(baud) = cli.baud {
        config.baud = baud;
    }
    if let Some(volume) = cli.volume {
        config.volume = volume;
    }
    if let Some(gate) = cli.power_gate {
        config.power_gate = gate;
    }
    if let Some(ratio) = cli.confidence {
        config.confidence_ratio = ratio;
    }
    config
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();
    let config = build_config(&cli);

    match cli.command {
        Commands::Send {
            ref message,
            ref passphrase,
            urgent,
            device,
        } => {
            let modem = Modem::new(config, passphrase.clone())?;
            let priority = if urgent { Priority::Urgent } else { Priority::Normal };
            let mut sink = CpalSink::new(device)?;
            match message {
                Some(text) => send_one(&modem, &mut sink, text, priority)?,
                None => send_loop(&modem, &mut sink, priority)?,
            }
        }
        Commands::Listen {
            ref passphrase,
            device,
        } => listen(config, passphrase.clone(), device)?,
        Commands::Encode {
            ref message,
            ref output,
            ref passphrase,
            urgent,
        } => {
            let modem = Modem::new(config, passphrase.clone())?;
            let priority = if urgent { Priority::Urgent } else { Priority::Normal };
            encode_wav(&modem, message, priority, output)?;
        }
        Commands::Decode {
            ref input,
            ref passphrase,
        } => decode_wav(config, passphrase.clone(), input)?,
        Commands::Devices => list_devices()?,
    }
    Ok(())
}

fn send_one(
    modem: &Modem,
    sink: &mut CpalSink,
    message: &str,
    priority: Priority,
) -> Result<(), Box<dyn std::error::Error>> {
    println!(
        "transmitting {} bytes ({})",
        message.len(),
        if priority == Priority::Urgent { "urgent" } else { "normal" }
    );
    modem.transmit(sink, message, priority)?;
    println!("done");
    Ok(())
}

fn send_loop(
    modem: &Modem,
    sink: &mut CpalSink,
    priority: Priority,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("enter messages, one per line (\"exit\" quits):");
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if text.eq_ignore_ascii_case("exit") {
            break;
        }
        send_one(modem, sink, text, priority)?;
    }
    Ok(())
}

fn listen(
    config: ModemConfig,
    passphrase: String,
    device_index: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let sample_rate = config.sample_rate;
    let modem = Arc::new(Mutex::new(Modem::new(config, passphrase)?));

    let host = cpal::default_host();
    let device = match device_index {
        Some(index) => host
            .input_devices()?
            .nth(index)
            .ok_or_else(|| ModemError::Sink(format!("no input device at index {index}")))?,
        None => host
            .default_input_device()
            .ok_or_else(|| ModemError::Sink("no default input device".into()))?,
    };
    println!("listening on {:?}...", device.name()?);

    let channels = device.default_input_config()?.channels() as usize;
    let stream_config = StreamConfig {
        channels: channels as u16,
        sample_rate: SampleRate(sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let callback_modem = Arc::clone(&modem);
    let stream = device.build_input_stream(
        &stream_config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            // Channel 0 only; the link is mono.
            let mono: Vec<f32> = data.iter().step_by(channels).copied().collect();
            let messages = callback_modem.lock().unwrap().on_audio(&mono);
            for message in messages {
                let tag = if message.priority == Priority::Urgent {
                    "URGENT"
                } else {
                    "normal"
                };
                println!("[{tag}] {}", message.plaintext);
            }
        },
        |err| warn!("input stream error: {err}"),
        None,
    )?;
    stream.play()?;

    println!("press Ctrl+C to stop");
    loop {
        std::thread::sleep(Duration::from_secs(1));
    }
}

fn encode_wav(
    modem: &Modem,
    message: &str,
    priority: Priority,
    output: &PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
    let samples = modem.render(message, priority)?;
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: modem.config().sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(output, spec)?;
    for &sample in &samples {
        writer.write_sample((sample * i16::MAX as f32) as i16)?;
    }
    writer.finalize()?;
    println!("wrote {} samples to {}", samples.len(), output.display());
    Ok(())
}

fn decode_wav(
    config: ModemConfig,
    passphrase: String,
    input: &PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut reader = hound::WavReader::open(input)?;
    let spec = reader.spec();
    if spec.sample_rate != config.sample_rate {
        return Err(Box::new(ModemError::InvalidConfig(format!(
            "WAV is {} Hz but the modem is configured for {} Hz",
            spec.sample_rate, config.sample_rate
        ))));
    }

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()?
        }
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
    };
    let mono: Vec<f32> = samples
        .iter()
        .step_by(spec.channels as usize)
        .copied()
        .collect();

    let mut modem = Modem::new(config, passphrase)?;
    let mut count = 0usize;
    for block in mono.chunks(1024) {
        for message in modem.on_audio(block) {
            let tag = if message.priority == Priority::Urgent {
                "URGENT"
            } else {
                "normal"
            };
            println!("[{tag}] {}", message.plaintext);
            count += 1;
        }
    }
    let stats = modem.stats();
    println!(
        "{count} message(s); ok={} fail={} crc_fail={} hamming_fail={}",
        stats.msgs_ok, stats.msgs_fail, stats.crc_fail, stats.hamming_fail
    );
    Ok(())
}

fn list_devices() -> Result<(), Box<dyn std::error::Error>> {
    let host = cpal::default_host();

    println!("input devices:");
    for (index, device) in host.input_devices()?.enumerate() {
        println!("  {index}: {}", device.name()?);
    }
    println!("output devices:");
    for (index, device) in host.output_devices()?.enumerate() {
        println!("  {index}: {}", device.name()?);
    }
    Ok(())
}

/// Playback state shared with the output callback.
struct PlaybackShared {
    samples: Vec<f32>,
    position: usize,
    done: bool,
}

/// Blocking cpal-backed sink: `play` starts an output stream fanning the
/// mono burst across the device's channels, `wait` returns once the
/// buffer has drained.
struct CpalSink {
    device: cpal::Device,
    shared: Arc<Mutex<PlaybackShared>>,
    stream: Option<cpal::Stream>,
}

impl CpalSink {
    fn new(device_index: Option<usize>) -> Result<Self, Box<dyn std::error::Error>> {
        let host = cpal::default_host();
        let device = match device_index {
            Some(index) => host
                .output_devices()?
                .nth(index)
                .ok_or_else(|| ModemError::Sink(format!("no output device at index {index}")))?,
            None => host
                .default_output_device()
                .ok_or_else(|| ModemError::Sink("no default output device".into()))?,
        };
        Ok(Self {
            device,
            shared: Arc::new(Mutex::new(PlaybackShared {
                samples: Vec::new(),
                position: 0,
                done: true,
            })),
            stream: None,
        })
    }
}

impl AudioSink for CpalSink {
    fn play(&mut self, samples: &[f32], sample_rate: u32) -> tonelink_core::Result<()> {
        let channels = self
            .device
            .default_output_config()
            .map_err(|e| ModemError::Sink(e.to_string()))?
            .channels() as usize;
        let stream_config = StreamConfig {
            channels: channels as u16,
            sample_rate: SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        {
            let mut shared = self.shared.lock().unwrap();
            shared.samples = samples.to_vec();
            shared.position = 0;
            shared.done = false;
        }

        let callback_shared = Arc::clone(&self.shared);
        let stream = self
            .device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut shared = callback_shared.lock().unwrap();
                    for frame in data.chunks_mut(channels) {
                        let sample = if shared.position < shared.samples.len() {
                            let s = shared.samples[shared.position];
                            shared.position += 1;
                            s
                        } else {
                            shared.done = true;
                            0.0
                        };
                        for out in frame.iter_mut() {
                            *out = sample;
                        }
                    }
                },
                |err| warn!("output stream error: {err}"),
                None,
            )
            .map_err(|e| ModemError::Sink(e.to_string()))?;
        stream.play().map_err(|e| ModemError::Sink(e.to_string()))?;
        self.stream = Some(stream);
        Ok(())
    }

    fn wait(&mut self) -> tonelink_core::Result<()> {
        loop {
            {
                let shared = self.shared.lock().unwrap();
                if shared.done {
                    break;
                }
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        // Give the device a moment to flush its own buffer.
        std::thread::sleep(Duration::from_millis(200));
        self.stream = None;
        Ok(())
    }
}
