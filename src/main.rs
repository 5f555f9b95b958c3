mod audio;
mod cli;
mod config;
mod control;
mod driver;
mod error;
mod output;

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::fs::File;
use std::io::{BufWriter, Write};

use audio::decode::{decode_audio, DecodedSource};
use audio::mic::MicSource;
use audio::source::{parse_tones, AudioSource, PcmReader, ToneSource};
use cli::{Cli, Mode};
use config::Config;
use control::bands::Preset;
use driver::Driver;
use output::device::{DeviceSink, JsonLines};
use output::keys::KeystrokeSink;
use output::ControlSink;

const TONE_AMPLITUDE: i16 = 8000;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut cli = Cli::parse();

    if cli.list_presets {
        for preset in [Preset::Keys, Preset::Device] {
            println!("{}:", preset.name());
            for rule in preset.table().rules() {
                println!("  {:>6.1} .. {:>6.1} Hz  {:?}", rule.low_hz, rule.high_hz, rule.effect);
            }
        }
        return Ok(());
    }

    let config_path = cli.config.clone().or_else(config::find_config);
    let mut config = match config_path {
        Some(ref path) => match config::load_config(path) {
            Some(cfg) => {
                log::info!("Loaded config from {}", path.display());
                cfg
            }
            None => {
                log::warn!("Failed to load config from {}", path.display());
                Config::default()
            }
        },
        None => Config::default(),
    };

    // Merge: explicit CLI values win over the file
    if let Some(gate) = cli.gate {
        config.audio.noise_gate = gate;
    }
    if let Some(n) = cli.note_min {
        config.audio.note_min = n;
    }
    if let Some(n) = cli.note_max {
        config.audio.note_max = n;
    }
    if cli.sample_rate == 44100 {
        cli.sample_rate = config.audio.sample_rate;
    }
    let mode_preset = match cli.mode {
        Mode::Keys => Preset::Keys,
        Mode::Device => Preset::Device,
    };
    config.control.preset = cli.preset.or(config.control.preset).or(Some(mode_preset));
    config.validate()?;

    let mut source = open_source(&cli, &config)?;
    if source.sample_rate() != config.audio.sample_rate {
        log::warn!(
            "Source runs at {} Hz, not the configured {} Hz; analyzing at the source rate",
            source.sample_rate(),
            config.audio.sample_rate
        );
    }

    let out: Box<dyn Write> = match cli.output {
        Some(ref path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
        )),
        None => Box::new(std::io::stdout()),
    };
    let mut sink: Box<dyn ControlSink> = match cli.mode {
        Mode::Keys => Box::new(KeystrokeSink::new(out, config.keys.clone())),
        Mode::Device => Box::new(DeviceSink::new(JsonLines::new(out), config.control.max)),
    };

    log::info!(
        "tunedrive: mode {:?}, preset {}, notes {}..={}, gate {}",
        cli.mode,
        config.control.preset.unwrap_or(mode_preset).name(),
        config.audio.note_min,
        config.audio.note_max,
        config.audio.noise_gate
    );

    let mut driver = Driver::new(&config, source.sample_rate())?;
    let outcome = driver.run(source.as_mut(), sink.as_mut());

    let stats = driver.stats();
    log::info!(
        "Done: {} blocks, {} cycles ({} active), {} skipped",
        stats.blocks,
        stats.cycles,
        stats.active_cycles,
        stats.skipped
    );
    log::debug!("Final state: {}", driver.state());
    outcome?;
    Ok(())
}

fn open_source(cli: &Cli, config: &Config) -> Result<Box<dyn AudioSource>> {
    let frame_size = config.audio.frame_size;

    if cli.mic {
        return Ok(Box::new(MicSource::open(frame_size)?));
    }

    if let Some(ref script) = cli.tone {
        let tones = parse_tones(script)?;
        log::info!("Synthesizing {} tones", tones.len());
        return Ok(Box::new(ToneSource::new(
            tones,
            config.audio.sample_rate,
            frame_size,
            TONE_AMPLITUDE,
        )));
    }

    let Some(ref input) = cli.input else {
        bail!("No input: give an audio file, '-' for stdin, --mic, or --tone");
    };

    if input.as_os_str() == "-" {
        log::info!("Reading S16LE mono PCM from stdin at {} Hz", cli.sample_rate);
        return Ok(Box::new(PcmReader::new(std::io::stdin().lock(), cli.sample_rate, frame_size)));
    }

    if !input.exists() {
        bail!("Input file not found: {}", input.display());
    }
    let audio = decode_audio(input)?;
    Ok(Box::new(DecodedSource::new(audio, frame_size)))
}
