//! Definition of the Clap command line.
use std::num::NonZeroUsize;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::relay::RelayConfig;

/// Stream synthetic audio packets from a capture thread to a playback thread through a spinning queue.
#[derive(Debug, Parser)]
pub struct CliArgs {
    /// Which queue carries the packets.
    #[arg(long, value_enum, default_value_t = QueueKind::Spsc)]
    pub queue: QueueKind,

    /// How many packets the capture thread produces before stopping.
    #[arg(long, default_value_t = 10_000)]
    pub packets: u64,

    /// Frames per packet.
    #[arg(long, default_value = "256")]
    pub frames: NonZeroUsize,

    /// Interleaved channels per frame.
    #[arg(long, default_value = "2")]
    pub channels: NonZeroUsize,

    /// Simulate a slow device by sleeping this many microseconds after playing each packet.
    #[arg(long, default_value_t = 0)]
    pub consumer_delay_us: u64,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum QueueKind {
    /// One producer handle, one consumer handle, no locks.
    Spsc,

    /// A shared queue with separate push and pop locks.
    Mpmc,
}

impl CliArgs {
    pub fn relay_config(&self) -> RelayConfig {
        RelayConfig {
            queue: self.queue,
            packets: self.packets,
            frames: self.frames,
            channels: self.channels,
            consumer_delay: Duration::from_micros(self.consumer_delay_us),
        }
    }
}
