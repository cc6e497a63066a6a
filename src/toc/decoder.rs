//! Decoding of cdrdao `.toc` files into structured TOCs.
//!
//! The decoder is a seam: the task only needs `decode(path)`, so callers
//! can swap in a richer implementation. The bundled one covers the subset
//! of the format `read-toc` emits: a session header, `TRACK AUDIO` blocks,
//! and `FILE`/`SILENCE` lengths. CD-TEXT and catalog data are skipped.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::types::{DiscToc, SessionType, TocTrack};

/// Error type for TOC decoding.
#[derive(thiserror::Error, Debug)]
pub enum TocDecodeError {
    /// The artifact could not be read.
    #[error("failed to read TOC file {path}: {source}")]
    Read {
        /// Path that was being read.
        path: PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },
    /// The artifact is not a well-formed TOC.
    #[error("TOC parse error at line {line}: {message}")]
    Parse {
        /// 1-based line number.
        line: usize,
        /// What went wrong.
        message: String,
    },
    /// A structurally valid file that declares no tracks.
    #[error("TOC file contains no tracks")]
    Empty,
}

/// Decodes a TOC artifact into a structured result.
#[async_trait]
pub trait TocDecoder: Send + Sync {
    /// Decode the artifact at `path`.
    ///
    /// # Errors
    ///
    /// Returns `TocDecodeError` if the file cannot be read or parsed.
    async fn decode(&self, path: &Path) -> Result<DiscToc, TocDecodeError>;
}

/// Decoder for the textual `.toc` format cdrdao emits.
#[derive(Debug, Clone, Copy, Default)]
pub struct CdrdaoTocDecoder;

#[async_trait]
impl TocDecoder for CdrdaoTocDecoder {
    async fn decode(&self, path: &Path) -> Result<DiscToc, TocDecodeError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| TocDecodeError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        parse_toc(&text)
    }
}

/// Parse the `.toc` text format.
pub fn parse_toc(text: &str) -> Result<DiscToc, TocDecodeError> {
    let mut session = None;
    let mut tracks: Vec<TocTrack> = Vec::new();
    let mut in_track = false;
    let mut position = 0_u32;

    for (index, raw) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with("//") {
            continue;
        }

        match line {
            "CD_DA" => session = Some(SessionType::CdDa),
            "CD_ROM" => session = Some(SessionType::CdRom),
            "CD_ROM_XA" => session = Some(SessionType::CdRomXa),
            _ if line.starts_with("TRACK ") => {
                let number = u32::try_from(tracks.len()).unwrap_or(u32::MAX) + 1;
                tracks.push(TocTrack {
                    number,
                    start_frame: position,
                    length_frames: 0,
                });
                in_track = true;
            }
            _ if line.starts_with("FILE ") || line.starts_with("AUDIOFILE ") => {
                if !in_track {
                    return Err(TocDecodeError::Parse {
                        line: line_no,
                        message: "FILE outside of a TRACK block".to_string(),
                    });
                }
                let length = parse_file_length(line).ok_or_else(|| TocDecodeError::Parse {
                    line: line_no,
                    message: format!("malformed FILE statement: {line}"),
                })?;
                extend_current_track(&mut tracks, &mut position, length);
            }
            _ if line.starts_with("SILENCE ") => {
                if !in_track {
                    return Err(TocDecodeError::Parse {
                        line: line_no,
                        message: "SILENCE outside of a TRACK block".to_string(),
                    });
                }
                let arg = line.trim_start_matches("SILENCE ").trim();
                let length = parse_timecode(arg).ok_or_else(|| TocDecodeError::Parse {
                    line: line_no,
                    message: format!("malformed SILENCE length: {arg}"),
                })?;
                extend_current_track(&mut tracks, &mut position, length);
            }
            // flags, CD-TEXT, ISRC and the rest carry nothing we need
            _ => {}
        }
    }

    let session = session.ok_or(TocDecodeError::Parse {
        line: 1,
        message: "missing session type header".to_string(),
    })?;
    if tracks.is_empty() {
        return Err(TocDecodeError::Empty);
    }
    Ok(DiscToc { session, tracks })
}

fn extend_current_track(tracks: &mut [TocTrack], position: &mut u32, length: u32) {
    if let Some(track) = tracks.last_mut() {
        track.length_frames = track.length_frames.saturating_add(length);
    }
    *position = position.saturating_add(length);
}

/// Extract the length argument from a `FILE "name" start length` statement.
fn parse_file_length(line: &str) -> Option<u32> {
    // the filename is quoted and may contain spaces; split after the
    // closing quote
    let close = line.rfind('"')?;
    let rest = line.get(close + 1..)?.trim();
    let mut fields = rest.split_whitespace();
    let _start = fields.next()?;
    let length = fields.next()?;
    parse_timecode(length)
}

/// Parse a `MM:SS:FF` timecode or a bare frame count into frames.
fn parse_timecode(value: &str) -> Option<u32> {
    if let Ok(frames) = value.parse::<u32>() {
        return Some(frames);
    }
    let mut parts = value.split(':');
    let minutes = parts.next()?.parse::<u32>().ok()?;
    let seconds = parts.next()?.parse::<u32>().ok()?;
    let frames = parts.next()?.parse::<u32>().ok()?;
    if parts.next().is_some() || seconds >= 60 || frames >= 75 {
        return None;
    }
    Some((minutes * 60 + seconds) * 75 + frames)
}
