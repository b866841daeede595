use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Result};

use spin_sync::{spsc_queue, Barrier, MpmcQueue, QueueReader, QueueWriter, SpinBarrier};

use crate::cli_args::QueueKind;

const SAMPLE_RATE: f64 = 48000.0;
const TONE_HZ: f64 = 440.0;

const TWO: NonZeroUsize = match NonZeroUsize::new(2) {
    Some(x) => x,
    None => panic!("2 is not zero"),
};

#[derive(Clone, Debug)]
pub struct RelayConfig {
    pub queue: QueueKind,
    pub packets: u64,
    pub frames: NonZeroUsize,
    pub channels: NonZeroUsize,
    pub consumer_delay: Duration,
}

/// One block of interleaved audio.
#[derive(Debug)]
pub struct Packet {
    pub sequence: u64,
    pub samples: Vec<f32>,
}

#[derive(Debug)]
pub struct RelayReport {
    pub packets: u64,
    pub frames: u64,
    pub elapsed: Duration,

    /// The most packets ever seen waiting in the queue by playback.
    pub peak_backlog: usize,
}

impl std::fmt::Display for RelayReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "packets={} frames={} elapsed_ms={} peak_backlog={}",
            self.packets,
            self.frames,
            self.elapsed.as_millis(),
            self.peak_backlog
        )
    }
}

/// What capture produced, for playback's work to be checked against.
struct CaptureSummary {
    packets: u64,
    checksum: f64,
}

struct PlaybackSummary {
    packets: u64,
    frames: u64,
    checksum: f64,
    peak_backlog: usize,
}

/// Relay `config.packets` packets, raising `cancel` once capture has finished.
pub fn run(config: &RelayConfig, cancel: &AtomicBool) -> Result<RelayReport> {
    match config.queue {
        QueueKind::Spsc => {
            let (producer, consumer) = spsc_queue::<Packet>();
            relay(config, producer, consumer, cancel)
        }
        QueueKind::Mpmc => {
            let queue = MpmcQueue::<Packet>::new();
            relay(config, &queue, &queue, cancel)
        }
    }
}

fn relay<W, R>(
    config: &RelayConfig,
    writer: W,
    reader: R,
    cancel: &AtomicBool,
) -> Result<RelayReport>
where
    W: QueueWriter<Packet> + Send,
    R: QueueReader<Packet> + Send,
{
    let start_gate = SpinBarrier::new(TWO);
    let started = Instant::now();

    let (captured, played) = std::thread::scope(|s| {
        let capture = s.spawn(|| capture(config, writer, &start_gate));
        let playback = s.spawn(|| playback(config, reader, &start_gate, cancel));

        let captured = capture
            .join()
            .map_err(|_| anyhow!("The capture thread panicked"));

        // Everything capture pushed happens before this store, so playback sees it all once it sees the flag.
        cancel.store(true, Ordering::Release);

        let played = playback
            .join()
            .map_err(|_| anyhow!("The playback thread panicked"));
        (captured, played)
    });

    let captured = captured?;
    let played = played??;
    let elapsed = started.elapsed();

    if played.packets != captured.packets {
        bail!(
            "Capture produced {} packets but playback consumed {}",
            captured.packets,
            played.packets
        );
    }
    if played.checksum != captured.checksum {
        bail!(
            "Audio was altered in transit: checksum {} became {}",
            captured.checksum,
            played.checksum
        );
    }

    Ok(RelayReport {
        packets: played.packets,
        frames: played.frames,
        elapsed,
        peak_backlog: played.peak_backlog,
    })
}

fn capture<W: QueueWriter<Packet>>(
    config: &RelayConfig,
    mut writer: W,
    start_gate: &SpinBarrier,
) -> CaptureSummary {
    let channels = config.channels.get();
    let frames = config.frames.get();
    let step = TONE_HZ * std::f64::consts::TAU / SAMPLE_RATE;

    start_gate.wait();
    log::debug!("Capture started");

    let mut checksum = 0.0f64;
    let mut frame_index = 0u64;

    for sequence in 0..config.packets {
        let mut samples = Vec::with_capacity(frames * channels);
        for _ in 0..frames {
            let s = (frame_index as f64 * step).sin() as f32;
            samples.extend(std::iter::repeat(s).take(channels));
            frame_index += 1;
        }

        checksum += packet_sum(&samples);
        writer.push(Packet { sequence, samples });
    }

    log::debug!("Capture finished after {} packets", config.packets);
    CaptureSummary {
        packets: config.packets,
        checksum,
    }
}

/// Consume until cancelled.  Packets must arrive numbered 0, 1, 2, ... with the configured shape.
fn playback<R: QueueReader<Packet>>(
    config: &RelayConfig,
    mut reader: R,
    start_gate: &SpinBarrier,
    cancel: &AtomicBool,
) -> Result<PlaybackSummary> {
    let frames = config.frames.get();
    let channels = config.channels.get();
    let mut summary = PlaybackSummary {
        packets: 0,
        frames: 0,
        checksum: 0.0,
        peak_backlog: 0,
    };

    start_gate.wait();
    log::debug!("Playback started");

    loop {
        summary.peak_backlog = summary.peak_backlog.max(reader.len());

        let Some(packet) = reader.pop() else {
            if cancel.load(Ordering::Acquire) {
                // Capture is done; anything it pushed is visible now.
                let mut rest = vec![];
                reader.drain_into(&mut rest);
                for packet in rest {
                    play(&mut summary, packet, frames, channels)?;
                }
                break;
            }
            std::thread::yield_now();
            continue;
        };

        play(&mut summary, packet, frames, channels)?;
        if !config.consumer_delay.is_zero() {
            std::thread::sleep(config.consumer_delay);
        }
    }

    log::debug!("Playback stopped after {} packets", summary.packets);
    Ok(summary)
}

fn play(
    summary: &mut PlaybackSummary,
    packet: Packet,
    frames: usize,
    channels: usize,
) -> Result<()> {
    let expected_len = frames * channels;
    if packet.sequence != summary.packets {
        bail!(
            "Expected packet {} but got packet {}",
            summary.packets,
            packet.sequence
        );
    }
    if packet.samples.len() != expected_len {
        bail!(
            "Packet {} has {} samples, expected {}",
            packet.sequence,
            packet.samples.len(),
            expected_len
        );
    }

    summary.packets += 1;
    summary.frames += frames as u64;
    summary.checksum += packet_sum(&packet.samples);
    Ok(())
}

fn packet_sum(samples: &[f32]) -> f64 {
    samples.iter().map(|&s| s as f64).sum()
}
