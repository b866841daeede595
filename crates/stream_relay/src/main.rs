//! Move synthetic audio from a capture thread to a playback thread through `spin_sync`'s queues.
//!
//! This stands in for an audio device pair: capture produces fixed-size interleaved packets as fast as it can, and
//! playback consumes them, optionally slowly.  The run is stopped by a cancellation flag which belongs to `main`, not to
//! the queue: once capture is done, the flag is raised, and playback drains whatever is left and exits.  Playback
//! checks that packets arrived in order and that nothing was lost or altered.
//!
//! Set `RUST_LOG=info` to see the summary.
use std::sync::atomic::AtomicBool;

use anyhow::Result;
use clap::Parser;

mod cli_args;
mod relay;

fn main() -> Result<()> {
    env_logger::init();

    let args = cli_args::CliArgs::parse();
    let config = args.relay_config();
    log::info!("Starting relay: {:?}", config);

    let cancel = AtomicBool::new(false);
    let report = relay::run(&config, &cancel)?;

    let secs = report.elapsed.as_secs_f64();
    log::info!(
        "Relayed {} packets ({} frames) in {:.3}s, {:.0} frames/s, peak backlog {} packets",
        report.packets,
        report.frames,
        secs,
        report.frames as f64 / secs.max(f64::EPSILON),
        report.peak_backlog
    );

    println!("{}", report);
    Ok(())
}
