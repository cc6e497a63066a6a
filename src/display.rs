//! Colored CLI display utilities for read-toc output.

use std::io::{self, Write};
use std::time::Duration;

use owo_colors::OwoColorize;

use crate::toc::DiscToc;

/// Print a progress update, overwriting the current line.
pub fn print_progress(progress: f64) {
    let percent = (progress * 100.0).clamp(0.0, 100.0);
    print!("\r{} {percent:5.1}%", "[READ-TOC]".blue().bold());
    let _ = io::stdout().flush();
}

/// Print a per-track CRC error report.
pub fn print_crc_errors(track: Option<u32>, count: u32) {
    println!();
    match track {
        Some(track) => println!(
            "{} track {}: {} Q sub-channel CRC errors",
            "[QUALITY]".yellow().bold(),
            track.cyan(),
            count.yellow()
        ),
        None => println!(
            "{} {} Q sub-channel CRC errors before first track",
            "[QUALITY]".yellow().bold(),
            count.yellow()
        ),
    }
}

/// Print a summary of a decoded TOC.
pub fn print_toc_summary(toc: &DiscToc, duration: Duration) {
    println!();
    println!(
        "{} {} tracks, {} frames, read in {:.1}s",
        "[DONE]".green().bold(),
        toc.tracks.len().cyan(),
        toc.total_frames().cyan(),
        duration.as_secs_f64()
    );
    for track in &toc.tracks {
        println!(
            "  track {:>2}  start {:>8}  length {:>8}",
            track.number,
            track.start_frame.dimmed(),
            track.length_frames.dimmed()
        );
    }
}

/// Print an error message.
pub fn print_error(message: &str) {
    eprintln!("{} {}", "[ERROR]".red().bold(), message.red());
}
