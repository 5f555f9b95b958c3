use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::control::bands::Preset;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Key-press strings on command changes
    Keys,
    /// Axis and button events every cycle, as JSON lines
    Device,
}

#[derive(Parser, Debug)]
#[command(name = "tunedrive", about = "Drive a game controller by playing notes into a microphone")]
pub struct Cli {
    /// Audio file to analyze, or '-' for raw S16LE mono PCM on stdin
    pub input: Option<PathBuf>,

    /// Capture from the default microphone
    #[arg(long, conflicts_with_all = ["input", "tone"])]
    pub mic: bool,

    /// Synthesize tones instead of reading input, e.g. "220:0.5,0:0.25,330:1"
    #[arg(long, conflicts_with = "input")]
    pub tone: Option<String>,

    /// Output mode
    #[arg(short, long, value_enum, default_value_t = Mode::Device)]
    pub mode: Mode,

    /// Band preset (defaults to the one matching --mode)
    #[arg(short, long, value_enum)]
    pub preset: Option<Preset>,

    /// Config file (default: ./tunedrive.toml or the user config dir)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Write output here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Noise gate: peak sample amplitude needed to count as playing
    #[arg(long)]
    pub gate: Option<u16>,

    /// Lowest note to track (MIDI number)
    #[arg(long)]
    pub note_min: Option<i32>,

    /// Highest note to track (MIDI number)
    #[arg(long)]
    pub note_max: Option<i32>,

    /// Sample rate of raw stdin PCM
    #[arg(long, default_value_t = 44100)]
    pub sample_rate: u32,

    /// Print the band presets and exit
    #[arg(long)]
    pub list_presets: bool,
}
