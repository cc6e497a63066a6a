//! disctoc - asynchronous cdrdao TOC extraction with progress supervision.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use disctoc::cdrdao::{self, ReadTocTask, TaskEvent};
use disctoc::{config, display};

#[derive(Parser)]
#[command(
    name = "disctoc",
    about = "Read a disc's table of contents with cdrdao",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to a config file (defaults to the platform config directory).
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read the TOC of the disc in a drive.
    ReadToc {
        /// Device path of the drive.
        #[arg(short, long)]
        device: String,
        /// Use cdrdao's quicker, less complete scan.
        #[arg(long)]
        fast_toc: bool,
        /// Also save the raw TOC artifact here (a .toc suffix is added).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Check whether the drive holds a writable (CD-R) medium.
    DiskInfo {
        /// Device path of the drive.
        #[arg(short, long)]
        device: String,
    },
    /// Print the detected cdrdao version.
    Version,
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match config::load(cli.config.as_deref()).await {
        Ok(config) => config,
        Err(err) => {
            display::print_error(&err.to_string());
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::ReadToc {
            device,
            fast_toc,
            output,
        } => read_toc(&config, device, fast_toc, output).await,
        Commands::DiskInfo { device } => {
            let writable = cdrdao::detect_cdr_with_binary(&config.binary, &device).await;
            if writable {
                println!("CD-R medium detected (or detection inconclusive)");
            } else {
                println!("no writable medium");
            }
            ExitCode::SUCCESS
        }
        Commands::Version => match cdrdao::version_with_binary(&config.binary).await {
            Some(version) => {
                println!("{version}");
                ExitCode::SUCCESS
            }
            None => {
                display::print_error("cdrdao version could not be detected");
                ExitCode::FAILURE
            }
        },
    }
}

async fn read_toc(
    config: &config::DisctocConfig,
    device: String,
    fast_toc: bool,
    output: Option<PathBuf>,
) -> ExitCode {
    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, cancelling read");
            ctrl_c_cancel.cancel();
        }
    });

    let (events_tx, mut events_rx) = tokio::sync::mpsc::unbounded_channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            match event {
                TaskEvent::Progress(progress) => display::print_progress(progress),
                TaskEvent::CrcErrors { track, count } => display::print_crc_errors(track, count),
            }
        }
    });

    let mut task = ReadTocTask::new(&device)
        .fast_toc(fast_toc || config.fast_toc)
        .with_binary(&config.binary)
        .max_crc_errors(config.max_crc_errors)
        .with_events(events_tx)
        .with_cancellation(cancel);
    if let Some(output) = output {
        task = task.toc_path(output);
    }

    let result = task.run().await;
    let _ = printer.await;

    match result {
        Ok(outcome) => {
            display::print_toc_summary(&outcome.toc, outcome.duration);
            ExitCode::SUCCESS
        }
        Err(err) => {
            println!();
            display::print_error(&err.to_string());
            ExitCode::FAILURE
        }
    }
}
