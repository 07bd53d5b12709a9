//! RAMBO command-line front end.
//!
//! Loads an iNES image, spawns the emulation runtime, and consumes frames.
//! Video/audio presentation backends attach through the mailboxes; this
//! binary runs headless and reports status to the terminal.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;

use rambo_core::{Cartridge, MachineConfig, Nes, Region, SCREEN_PIXELS};
use rambo_runtime::{Mailboxes, Runner, SpeedConfig, SpeedMode};

#[derive(Debug, Parser)]
#[command(name = "rambo", about = "Cycle-accurate NES emulator")]
struct Args {
    /// Path to an iNES ROM image.
    rom: PathBuf,

    /// Run without presentation backends (currently always the case).
    #[arg(long)]
    headless: bool,

    /// Emulate as fast as the host allows instead of real time.
    #[arg(long)]
    fast_forward: bool,

    /// Skip frame consumption entirely.
    #[arg(long)]
    no_video: bool,

    /// Use PAL timing instead of NTSC.
    #[arg(long)]
    pal: bool,

    /// Stop after this many frames (0 = run until killed).
    #[arg(long, default_value_t = 0)]
    frames: u64,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();

    let image = std::fs::read(&args.rom)
        .with_context(|| format!("reading ROM {}", args.rom.display()))?;
    let cartridge = Cartridge::from_ines(&image).context("parsing iNES image")?;
    tracing::info!(
        mapper = cartridge.header.mapper,
        prg = cartridge.header.prg_rom_size,
        chr = cartridge.header.chr_rom_size,
        "ROM loaded"
    );

    if !args.headless {
        tracing::info!("no presentation backend is linked in; running headless");
    }

    let region = if args.pal { Region::Pal } else { Region::Ntsc };
    let config = MachineConfig {
        region,
        ..MachineConfig::default()
    };
    let nes = Nes::new(cartridge, config);

    let speed = SpeedConfig {
        mode: if args.fast_forward {
            SpeedMode::FastForward
        } else {
            SpeedMode::Realtime
        },
        timing: region,
        multiplier: if args.fast_forward { 100.0 } else { 1.0 },
        hard_sync: !args.fast_forward,
        ..SpeedConfig::default()
    };

    let mailboxes = Arc::new(Mailboxes::default());
    let runner = Runner::spawn(nes, Arc::clone(&mailboxes), speed);

    let mut frame = vec![0u32; SCREEN_PIXELS];
    let mut frames_seen: u64 = 0;
    let started = Instant::now();

    while runner.running() {
        if !args.no_video && mailboxes.frames.drain(&mut frame) {
            frames_seen += 1;
        }
        if let Some(status) = mailboxes.emulation_status.take() {
            if let Some(error) = &status.error {
                tracing::warn!(%error, "emulation error");
            }
            tracing::info!(
                frames = status.frame_count,
                fps = format!("{:.1}", status.fps),
                dropped = status.dropped_frames,
                "status"
            );
            if args.frames != 0 && status.frame_count >= args.frames {
                break;
            }
        }
        std::thread::sleep(Duration::from_millis(2));
    }

    runner.shutdown();
    tracing::info!(
        frames_seen,
        elapsed = format!("{:.2}s", started.elapsed().as_secs_f64()),
        "done"
    );
    Ok(())
}
