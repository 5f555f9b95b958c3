use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig, StreamError};

use super::source::AudioSource;
use crate::error::{Result, TuneError};

/// Blocks held for the analysis loop before the oldest is discarded.
pub const QUEUE_BLOCKS: usize = 4;

/// How long `read_block` waits for the device before giving up.
const STALL_TIMEOUT: Duration = Duration::from_secs(2);

/// Bounded queue of fixed-size blocks between the capture callback and the
/// analysis loop. When full, the oldest block is dropped: latency stays
/// bounded and the reader always gets the freshest audio.
pub struct BlockQueue {
    inner: Mutex<Pending>,
    ready: Condvar,
    frame_size: usize,
    capacity: usize,
}

#[derive(Default)]
struct Pending {
    blocks: VecDeque<Vec<i16>>,
    partial: Vec<i16>,
    dropped: usize,
    closed: bool,
}

impl BlockQueue {
    pub fn new(frame_size: usize, capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Pending::default()),
            ready: Condvar::new(),
            frame_size,
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Pending> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append captured samples, cutting them into whole blocks.
    pub fn push_samples<I: IntoIterator<Item = i16>>(&self, samples: I) {
        let mut pending = self.lock();
        pending.partial.extend(samples);

        let mut queued = false;
        while pending.partial.len() >= self.frame_size {
            let block: Vec<i16> = pending.partial.drain(..self.frame_size).collect();
            if pending.blocks.len() == self.capacity {
                pending.blocks.pop_front();
                pending.dropped += 1;
            }
            pending.blocks.push_back(block);
            queued = true;
        }

        if queued {
            self.ready.notify_one();
        }
    }

    /// Oldest queued block, waiting up to `timeout` for one to arrive.
    /// `None` on timeout or once the queue is closed and drained.
    pub fn pop(&self, timeout: Duration) -> Option<Vec<i16>> {
        let mut pending = self.lock();
        loop {
            if let Some(block) = pending.blocks.pop_front() {
                return Some(block);
            }
            if pending.closed {
                return None;
            }
            let (guard, wait) = self
                .ready
                .wait_timeout(pending, timeout)
                .unwrap_or_else(PoisonError::into_inner);
            pending = guard;
            if wait.timed_out() && pending.blocks.is_empty() {
                return None;
            }
        }
    }

    pub fn close(&self) {
        self.lock().closed = true;
        self.ready.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Total blocks discarded because the reader fell behind.
    pub fn dropped(&self) -> usize {
        self.lock().dropped
    }
}

/// Live capture from the default input device.
pub struct MicSource {
    // Capture stops when the stream is dropped.
    _stream: Stream,
    queue: Arc<BlockQueue>,
    sample_rate: u32,
    dropped: usize,
}

impl MicSource {
    /// Opens the default input device in its default configuration, mixed
    /// down to mono.
    pub fn open(frame_size: usize) -> Result<Self> {
        let host = cpal::default_host();
        let device = host.default_input_device().ok_or_else(|| {
            TuneError::device(
                "microphone",
                io::Error::new(io::ErrorKind::NotFound, "no default input device"),
            )
        })?;
        let supported = device.default_input_config().map_err(mic_error)?;
        let format = supported.sample_format();
        let config: StreamConfig = supported.into();

        log::info!(
            "Microphone: {} ({} ch, {} Hz, {:?})",
            device.name().unwrap_or_else(|_| "unknown".into()),
            config.channels,
            config.sample_rate.0,
            format
        );

        let queue = Arc::new(BlockQueue::new(frame_size, QUEUE_BLOCKS));
        let stream = match format {
            SampleFormat::I16 => build_stream::<i16>(&device, &config, &queue),
            SampleFormat::U16 => build_stream::<u16>(&device, &config, &queue),
            SampleFormat::F32 => build_stream::<f32>(&device, &config, &queue),
            other => {
                return Err(TuneError::InvalidConfig(format!(
                    "unsupported microphone sample format {:?}",
                    other
                )))
            }
        }
        .map_err(mic_error)?;
        stream.play().map_err(mic_error)?;

        Ok(Self {
            _stream: stream,
            queue,
            sample_rate: config.sample_rate.0,
            dropped: 0,
        })
    }
}

impl AudioSource for MicSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn is_active(&self) -> bool {
        !self.queue.is_closed()
    }

    fn read_block(&mut self) -> Result<Vec<i16>> {
        let block = self.queue.pop(STALL_TIMEOUT);

        let dropped = self.queue.dropped();
        if dropped > self.dropped {
            log::warn!("Analysis fell behind, dropped {} stale blocks", dropped - self.dropped);
            self.dropped = dropped;
        }

        match block {
            Some(block) => Ok(block),
            // device went away; an empty block ends the run
            None if self.queue.is_closed() => Ok(Vec::new()),
            None => Err(TuneError::device(
                "microphone",
                io::Error::new(io::ErrorKind::TimedOut, "no audio from input device"),
            )),
        }
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    queue: &Arc<BlockQueue>,
) -> std::result::Result<Stream, cpal::BuildStreamError>
where
    T: SizedSample,
    i16: FromSample<T>,
{
    let channels = usize::from(config.channels.max(1));
    let data_queue = Arc::clone(queue);
    let err_queue = Arc::clone(queue);

    device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            data_queue.push_samples(downmix(data, channels));
        },
        move |err: StreamError| {
            log::error!("Microphone stream error: {}", err);
            if matches!(err, StreamError::DeviceNotAvailable) {
                err_queue.close();
            }
        },
        None,
    )
}

/// Average interleaved frames into mono i16.
fn downmix<T>(data: &[T], channels: usize) -> impl Iterator<Item = i16> + '_
where
    T: Sample,
    i16: FromSample<T>,
{
    data.chunks(channels).map(|frame| {
        let sum: i32 = frame.iter().map(|&s| i32::from(s.to_sample::<i16>())).sum();
        (sum / frame.len() as i32) as i16
    })
}

fn mic_error<E>(e: E) -> TuneError
where
    E: std::error::Error + Send + Sync + 'static,
{
    TuneError::device("microphone", io::Error::other(e))
}
