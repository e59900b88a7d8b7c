//! stubnamer - names Objective-C message-send trampolines in arm64 binaries.

use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use stubnamer::view::find_region;
use stubnamer::{name_trampolines, BinaryFile, BinaryView, MachOView, ScanOptions};

/// Names Objective-C message-send trampolines in arm64 binaries.
#[derive(Parser, Debug)]
#[command(name = "stubnamer")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Find trampolines and print their names
    Scan {
        /// Path to the Mach-O binary (thin or universal)
        binary: PathBuf,

        /// Architecture slice to use from a universal binary (e.g., "arm64", "arm64e")
        #[arg(short, long)]
        arch: Option<String>,

        /// Marker of the section holding selector names
        #[arg(long, default_value = "__objc_methname")]
        names_section: String,

        /// Marker of the section holding the trampolines
        #[arg(long, default_value = "__objc_stubs")]
        stubs_section: String,

        /// Write the symbol map here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Verbosity level (0=quiet, 1=warnings, 2=info, 3=debug)
        #[arg(short, long, default_value = "1")]
        verbosity: u8,
    },

    /// List the sections of a binary
    Sections {
        /// Path to the Mach-O binary (thin or universal)
        binary: PathBuf,

        /// Architecture slice to use from a universal binary
        #[arg(short, long)]
        arch: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan {
            binary,
            arch,
            names_section,
            stubs_section,
            output,
            verbosity,
        } => {
            setup_logging(verbosity);
            let options = ScanOptions {
                name_section: names_section,
                stub_section: stubs_section,
            };
            cmd_scan(binary, arch, options, output)
        }
        Commands::Sections { binary, arch } => cmd_sections(binary, arch),
    }
}

fn setup_logging(verbosity: u8) {
    let level = match verbosity {
        0 => Level::ERROR,
        1 => Level::WARN,
        2 => Level::INFO,
        _ => Level::DEBUG,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .without_time()
        .with_writer(io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).ok();
}

fn cmd_scan(
    binary: PathBuf,
    arch: Option<String>,
    options: ScanOptions,
    output: Option<PathBuf>,
) -> Result<()> {
    let start = Instant::now();

    info!("Opening binary: {}", binary.display());
    let file = BinaryFile::open(&binary)
        .with_context(|| format!("Failed to open binary: {}", binary.display()))?;
    let image = file.arm64_image(arch.as_deref())?;

    let (report, functions) = name_trampolines(image, &options)
        .with_context(|| format!("Failed to scan: {}", binary.display()))?;

    match output {
        Some(path) => {
            functions.save_symbol_map(&path)?;
            info!("Wrote {} names to {}", report.trampoline_count, path.display());
        }
        None => {
            functions
                .write_symbol_map(io::stdout().lock())
                .context("Failed to write symbol map")?;
        }
    }

    println!("{report}");

    info!(
        "Scanned {} in {:.2}s",
        binary.display(),
        start.elapsed().as_secs_f64()
    );

    Ok(())
}

fn cmd_sections(binary: PathBuf, arch: Option<String>) -> Result<()> {
    let file = BinaryFile::open(&binary)
        .with_context(|| format!("Failed to open binary: {}", binary.display()))?;
    let image = file.arm64_image(arch.as_deref())?;
    let view = MachOView::new(image)
        .with_context(|| format!("Failed to parse: {}", binary.display()))?;

    let defaults = ScanOptions::default();
    let names = find_region(view.sections(), &defaults.name_section);
    let stubs = find_region(view.sections(), &defaults.stub_section);

    let mut out = io::stdout().lock();
    for (i, region) in view.sections().iter().enumerate() {
        let marker = if Some(region) == names {
            "[names]"
        } else if Some(region) == stubs {
            "[stubs]"
        } else {
            ""
        };
        writeln!(
            out,
            "  [{:2}] {:#018x} - {:#018x} ({:>8}) {} {}",
            i,
            region.start,
            region.end,
            format_size(region.len()),
            region.label,
            marker
        )?;
    }

    Ok(())
}

fn format_size(size: u64) -> String {
    if size >= 1024 * 1024 {
        format!("{:.1}M", size as f64 / 1024.0 / 1024.0)
    } else if size >= 1024 {
        format!("{:.1}K", size as f64 / 1024.0)
    } else {
        format!("{}B", size)
    }
}
