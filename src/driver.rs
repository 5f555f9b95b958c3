use std::fmt;

use crate::audio::pitch::Note;
use crate::audio::source::AudioSource;
use crate::audio::spectrum::SpectralEstimator;
use crate::audio::window::SampleWindow;
use crate::config::{BlockPolicy, Config};
use crate::control::engine::{ControlEngine, ControlState, Input};
use crate::error::{Result, TuneError};
use crate::output::ControlSink;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunStats {
    pub blocks: usize,
    pub skipped: usize,
    pub cycles: usize,
    pub active_cycles: usize,
}

/// Result of one completed analysis cycle.
#[derive(Clone, Copy, Debug)]
pub struct Cycle {
    /// `None` when the noise gate was closed.
    pub freq: Option<f32>,
    pub note: Option<Note>,
    pub state: ControlState,
}

impl Cycle {
    pub fn is_active(&self) -> bool {
        self.freq.is_some() && self.note.is_some()
    }
}

impl fmt::Display for Cycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.freq, self.note) {
            (Some(freq), Some(note)) => {
                write!(f, "freq: {:7.2} Hz  note: {}  | {}", freq, note, self.state)
            }
            _ => write!(f, "gated | {}", self.state),
        }
    }
}

/// Owns all per-run state: the sample window, the estimator and the engine.
pub struct Driver {
    window: SampleWindow,
    estimator: SpectralEstimator,
    engine: ControlEngine,
    noise_gate: u16,
    policy: BlockPolicy,
    stats: RunStats,
}

impl Driver {
    pub fn new(config: &Config, sample_rate: u32) -> Result<Self> {
        config.validate()?;
        let audio = &config.audio;
        let estimator = SpectralEstimator::new(
            sample_rate,
            audio.fft_size(),
            audio.note_min,
            audio.note_max,
        )?;

        log::info!(
            "Sampling at {} Hz, resolution {:.2} Hz, bins {:?}",
            sample_rate,
            estimator.resolution(),
            estimator.bins()
        );

        let engine = ControlEngine::new(config.control.tuning(), config.band_table());
        log::debug!("Tuning: {:?}", engine.tuning());

        Ok(Self {
            window: SampleWindow::new(audio.frame_size, audio.frames_per_fft),
            estimator,
            engine,
            noise_gate: audio.noise_gate,
            policy: audio.block_policy,
            stats: RunStats::default(),
        })
    }

    pub fn state(&self) -> &ControlState {
        self.engine.state()
    }

    pub fn stats(&self) -> RunStats {
        self.stats
    }

    /// Pull blocks until the source goes inactive.
    pub fn run(&mut self, source: &mut dyn AudioSource, sink: &mut dyn ControlSink) -> Result<RunStats> {
        let frame_size = self.window.frame_size();
        while source.is_active() {
            let block = source.read_block()?;
            if block.len() != frame_size && !source.is_active() {
                if !block.is_empty() {
                    log::debug!("Dropping final partial block of {} samples", block.len());
                }
                break;
            }

            match self.process_block(&block, sink) {
                Ok(_) => {}
                Err(e @ TuneError::InvalidInput { .. }) if self.policy == BlockPolicy::Skip => {
                    log::warn!("Skipping block: {}", e);
                    self.stats.skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(self.stats)
    }

    /// Feed one block; returns the cycle if the window is warm.
    pub fn process_block(&mut self, block: &[i16], sink: &mut dyn ControlSink) -> Result<Option<Cycle>> {
        self.window.push(block)?;
        self.stats.blocks += 1;
        if !self.window.is_warm() {
            return Ok(None);
        }

        let previous = *self.engine.state();
        let freq = if self.window.peak_amplitude() > self.noise_gate {
            Some(self.estimator.analyze_window(&self.window)).filter(|f| *f > 0.0)
        } else {
            None
        };
        let note = freq.and_then(|f| Note::from_freq(f).ok());

        let state = *self.engine.step(freq.map_or(Input::Silent, Input::Active));
        sink.emit(&state, &previous)?;

        let cycle = Cycle { freq, note, state };
        self.stats.cycles += 1;
        if cycle.is_active() {
            self.stats.active_cycles += 1;
            log::info!("{}", cycle);
        } else {
            log::debug!("{}", cycle);
        }

        Ok(Some(cycle))
    }
}
