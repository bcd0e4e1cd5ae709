//! Command-line front-end for the HID-I2C bootloader.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use clickboot::{Context, FirmwareImage, Operation, Target, PROBE_ATTEMPTS, PROBE_INTERVAL};

/// Programs a PIC microcontroller through the HID-I2C bootloader.
#[derive(Debug, Parser)]
#[command(name = "clickboot", version, about)]
struct Args {
    /// Probe for a connected board and exit (status 0 if one is present)
    #[arg(long)]
    check: bool,

    /// Firmware image in Intel HEX format
    #[arg(required_unless_present = "check")]
    hex: Option<PathBuf>,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    if args.check {
        return match Context::new() {
            Ok(context) if context.probe() => ExitCode::SUCCESS,
            _ => ExitCode::FAILURE,
        };
    }

    let hex = match args.hex {
        Some(hex) => hex,
        // clap enforces the operand unless --check is given.
        None => return ExitCode::FAILURE,
    };

    match run(&hex) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {}", error);
            ExitCode::FAILURE
        }
    }
}

fn run(hex: &Path) -> clickboot::Result<()> {
    let mut image = FirmwareImage::from_hex_file(hex)?;
    log::info!("{}: {} bytes defined", hex.display(), image.len());

    let context = Context::new()?;
    println!("Connecting (reset the board to enter its bootloader)...");
    let hid = context.wait_for_target(PROBE_ATTEMPTS, PROBE_INTERVAL)?;
    let mut target = Target::connect(hid)?;
    print!("{}", target.bootloader_info);

    let mut operation = target.program(&mut image);
    let bar = ProgressBar::new(operation.total() as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("[{bar:40.cyan/blue}] {pos}/{len} Programming")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    for progress in &mut operation {
        progress?;
        bar.inc(1);
    }
    bar.finish();

    target.reboot()?;
    println!("Done!");
    Ok(())
}
