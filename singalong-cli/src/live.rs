//! Live monitoring: microphone against an optional reference, one frame every
//! 16 ms until the time limit.
//!
//! ## Architecture
//! - **Audio Thread**: owns the CPAL stream and keeps it alive until shutdown
//! - **Main Thread**: drains microphone chunks and runs one monitor frame per tick
//! - **Communication**: crossbeam channels for audio chunks, readiness and shutdown

use std::io::Write;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use cpal::traits::StreamTrait;
use crossbeam_channel::{Receiver, Sender};
use singalong_core::{EngineConfig, Monitor, audio};

use crate::render;
use crate::sources::{MicSource, Reference, ReferenceSpec};

const FRAME_INTERVAL: Duration = Duration::from_millis(16);
/// Chunks buffered between the device callback and the frame loop.
const CHUNK_BACKLOG: usize = 64;

/// Audio worker thread management.
struct AudioWorker {
    shutdown_tx: Sender<()>,
    thread_handle: Option<JoinHandle<()>>,
}

impl AudioWorker {
    /// Starts capture on a dedicated thread and waits for the device's
    /// sample rate.
    fn spawn(raw_audio_tx: Sender<Vec<f32>>) -> Result<(Self, u32)> {
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<u32, String>>(1);

        let thread_handle = thread::Builder::new()
            .name("audio".into())
            .spawn(move || {
                let stream = match audio::start_audio_capture(raw_audio_tx) {
                    Ok((stream, sample_rate)) => {
                        let _ = ready_tx.send(Ok(sample_rate));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(format!("{e:#}")));
                        return;
                    }
                };

                let _ = shutdown_rx.recv();
                tracing::debug!("audio thread received shutdown signal");
                if let Err(e) = stream.pause() {
                    tracing::warn!("error pausing stream: {}", e);
                }
                drop(stream);
            })
            .context("failed to spawn audio thread")?;

        let sample_rate = ready_rx
            .recv()
            .context("audio thread exited before starting capture")?
            .map_err(|e| anyhow!(e))
            .context("failed to start audio capture")?;

        Ok((
            Self {
                shutdown_tx,
                thread_handle: Some(thread_handle),
            },
            sample_rate,
        ))
    }

    fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(());
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                tracing::warn!("audio thread panicked");
            }
        }
    }
}

/// Runs live monitoring until `limit` elapses, or forever without one.
///
/// A tone reference is synthesized at the microphone's sample rate.
pub fn run(
    config: &EngineConfig,
    reference: Option<&ReferenceSpec>,
    limit: Option<Duration>,
) -> Result<()> {
    let mut monitor = Monitor::new(config)?;

    let (raw_audio_tx, raw_audio_rx) = crossbeam_channel::bounded::<Vec<f32>>(CHUNK_BACKLOG);
    let (worker, sample_rate) = AudioWorker::spawn(raw_audio_tx)?;

    let mut mic = MicSource::new(config.window_size, sample_rate);
    if config.singer.vocal_filter {
        mic = mic.with_vocal_filter(config.vocal_band);
    }
    let reference = reference
        .map(|spec| spec.open(sample_rate, config))
        .transpose()?;

    let result = frame_loop(&mut monitor, &mut mic, reference.as_ref(), &raw_audio_rx, limit);

    monitor.stop();
    worker.shutdown();
    println!();
    result
}

fn frame_loop(
    monitor: &mut Monitor,
    mic: &mut MicSource,
    reference: Option<&Reference>,
    raw_audio_rx: &Receiver<Vec<f32>>,
    limit: Option<Duration>,
) -> Result<()> {
    let ticker = crossbeam_channel::tick(FRAME_INTERVAL);
    let started = Instant::now();
    monitor.start(started);
    let mut stdout = std::io::stdout();

    loop {
        crossbeam_channel::select! {
            recv(raw_audio_rx) -> msg => match msg {
                Ok(chunk) => mic.push(chunk),
                Err(_) => {
                    tracing::warn!("audio channel closed");
                    return Ok(());
                }
            },
            recv(ticker) -> msg => {
                let now = msg.context("frame ticker stopped")?;
                let elapsed = now.saturating_duration_since(started);
                if limit.is_some_and(|limit| elapsed >= limit) {
                    return Ok(());
                }

                let singer = mic.block()?;
                let reference_block = match reference {
                    Some(source) => source.block_at(elapsed)?,
                    None => None,
                };

                match monitor.frame(singer.as_ref(), reference_block.as_ref(), now) {
                    Ok(Some(report)) => {
                        write!(stdout, "\r{}", render::status_line(&report))?;
                        stdout.flush()?;
                    }
                    Ok(None) => return Ok(()),
                    Err(e) => tracing::error!("frame aborted: {}", e),
                }
            },
        }
    }
}
