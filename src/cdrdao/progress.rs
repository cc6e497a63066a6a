//! Parser for the cdrdao read-toc progress log.
//!
//! cdrdao prints a track table followed by per-track analysis lines on its
//! error stream. The parser recognizes the handful of patterns we care about
//! and keeps running counters; everything else is ignored.

use std::collections::BTreeMap;

use regex::Regex;

/// Diagnostic emitted when cdrdao reports Q sub-channel CRC errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrcErrorReport {
    /// Track being analyzed when the errors were reported, if known.
    pub track: Option<u32>,
    /// Number of Q sub-channels with CRC errors in this report.
    pub count: u32,
}

/// Stateful line parser for cdrdao output.
///
/// cdrdao never prints a total track count directly. The track table row
/// printed immediately before the `Leadout` marker starts with the last
/// track number, so that number is captured as the total. This depends on
/// the tool's output ordering and is a best-effort estimate, not a
/// guarantee; `total_tracks` stays `None` if the heuristic does not fire.
#[derive(Debug)]
pub struct ProgressParser {
    analyzing_re: Regex,
    crc_re: Regex,
    leadout_re: Regex,
    leading_number_re: Regex,
    current_track: Option<u32>,
    total_tracks: Option<u32>,
    previous_line: String,
    errors: u32,
    track_errors: BTreeMap<u32, u32>,
}

impl Default for ProgressParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressParser {
    /// Create a parser with its patterns compiled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            analyzing_re: Regex::new(
                r"^Analyzing track (?P<track>\d+) \(AUDIO\): start [\d:]+, length [\d:]+",
            )
            .expect("valid analyzing pattern"),
            crc_re: Regex::new(r"Found (?P<count>\d+) Q sub-channels with CRC errors")
                .expect("valid CRC pattern"),
            leadout_re: Regex::new(r"^Leadout\s+AUDIO").expect("valid leadout pattern"),
            leading_number_re: Regex::new(r"^\s*(?P<number>\d+)")
                .expect("valid leading number pattern"),
            current_track: None,
            total_tracks: None,
            previous_line: String::new(),
            errors: 0,
            track_errors: BTreeMap::new(),
        }
    }

    /// Parse one complete line, updating the running counters.
    ///
    /// Patterns are tested independently; a line may match more than one.
    /// Unrecognized lines are ignored. Returns a diagnostic when the line
    /// reported CRC errors.
    pub fn parse(&mut self, line: &str) -> Option<CrcErrorReport> {
        let mut report = None;

        if let Some(caps) = self.analyzing_re.captures(line) {
            if let Some(track) = caps.name("track").and_then(|m| m.as_str().parse().ok()) {
                tracing::debug!(track, "analyzing track");
                self.current_track = Some(track);
            }
        }

        if let Some(caps) = self.crc_re.captures(line) {
            if let Some(count) = caps.name("count").and_then(|m| m.as_str().parse::<u32>().ok()) {
                self.errors = self.errors.saturating_add(count);
                if let Some(track) = self.current_track {
                    *self.track_errors.entry(track).or_default() += count;
                }
                report = Some(CrcErrorReport {
                    track: self.current_track,
                    count,
                });
            }
        }

        if self.total_tracks.is_none() && self.leadout_re.is_match(line) {
            // the track table row right before the leadout starts with the
            // last track number
            if let Some(caps) = self.leading_number_re.captures(&self.previous_line) {
                if let Some(total) = caps.name("number").and_then(|m| m.as_str().parse().ok()) {
                    tracing::debug!(total, "leadout reached, last track number captured");
                    self.total_tracks = Some(total);
                }
            }
        }

        if is_section_divider(line) {
            // section markers carry no state, and must not shadow the track
            // table row the leadout heuristic reads
            tracing::debug!("section divider");
        } else {
            self.previous_line = line.to_string();
        }
        report
    }

    /// Track currently being analyzed, if any yet.
    #[must_use]
    pub fn current_track(&self) -> Option<u32> {
        self.current_track
    }

    /// Best-effort total track count, known once the leadout is seen.
    #[must_use]
    pub fn total_tracks(&self) -> Option<u32> {
        self.total_tracks
    }

    /// Cumulative CRC error count across all tracks.
    #[must_use]
    pub fn errors(&self) -> u32 {
        self.errors
    }

    /// CRC error counts per track, for quality reporting.
    #[must_use]
    pub fn track_errors(&self) -> &BTreeMap<u32, u32> {
        &self.track_errors
    }
}

fn is_section_divider(line: &str) -> bool {
    line.len() >= 10 && line.bytes().all(|b| b == b'-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analyzing_line_sets_current_track() {
        let mut parser = ProgressParser::new();
        parser.parse("Analyzing track 1 (AUDIO): start 00:00:00, length 00:05:00");
        assert_eq!(parser.current_track(), Some(1));
        assert_eq!(parser.total_tracks(), None);
    }

    #[test]
    fn test_leadout_captures_total_from_previous_line() {
        let mut parser = ProgressParser::new();
        for line in [
            "Analyzing track 1 (AUDIO): start 00:00:00, length 00:05:00",
            "3",
            "------------------------------------------------------------",
            "Leadout AUDIO  0 00:05:00(22500)",
        ] {
            parser.parse(line);
        }
        assert_eq!(parser.current_track(), Some(1));
        assert_eq!(parser.total_tracks(), Some(3));
    }

    #[test]
    fn test_leadout_with_track_table_row() {
        let mut parser = ProgressParser::new();
        parser.parse(" 15     AUDIO   0      55:01:20(247595)");
        parser.parse("Leadout AUDIO   0      57:45:30(259905)");
        assert_eq!(parser.total_tracks(), Some(15));
    }

    #[test]
    fn test_total_tracks_set_exactly_once() {
        let mut parser = ProgressParser::new();
        parser.parse("3");
        parser.parse("Leadout AUDIO  0 00:05:00(22500)");
        parser.parse("7");
        parser.parse("Leadout AUDIO  0 00:09:00(40500)");
        assert_eq!(parser.total_tracks(), Some(3));
    }

    #[test]
    fn test_crc_errors_tagged_with_current_track() {
        let mut parser = ProgressParser::new();
        parser.parse("Analyzing track 1 (AUDIO): start 00:00:00, length 00:05:00");
        let report = parser.parse("Found 02 Q sub-channels with CRC errors");

        assert_eq!(
            report,
            Some(CrcErrorReport {
                track: Some(1),
                count: 2
            })
        );
        assert_eq!(parser.current_track(), Some(1));
        assert_eq!(parser.total_tracks(), None);
        assert_eq!(parser.errors(), 2);
        assert_eq!(parser.track_errors().get(&1), Some(&2));
    }

    #[test]
    fn test_crc_errors_accumulate() {
        let mut parser = ProgressParser::new();
        parser.parse("Analyzing track 1 (AUDIO): start 00:00:00, length 00:05:00");
        parser.parse("Found 2 Q sub-channels with CRC errors.");
        parser.parse("Analyzing track 2 (AUDIO): start 00:05:00, length 00:03:00");
        parser.parse("Found 5 Q sub-channels with CRC errors.");

        assert_eq!(parser.errors(), 7);
        assert_eq!(parser.track_errors().get(&1), Some(&2));
        assert_eq!(parser.track_errors().get(&2), Some(&5));
    }

    #[test]
    fn test_unrecognized_lines_are_ignored() {
        let mut parser = ProgressParser::new();
        parser.parse("Cdrdao version 1.2.4 - (C) Andreas Mueller");
        parser.parse("Track   Mode    Flags  Start");
        parser.parse("");
        assert_eq!(parser.current_track(), None);
        assert_eq!(parser.total_tracks(), None);
        assert_eq!(parser.errors(), 0);
    }

    #[test]
    fn test_current_track_increases_across_run() {
        let mut parser = ProgressParser::new();
        parser.parse("Analyzing track 1 (AUDIO): start 00:00:00, length 00:05:00");
        parser.parse("Analyzing track 2 (AUDIO): start 00:05:00, length 00:04:00");
        parser.parse("Analyzing track 3 (AUDIO): start 00:09:00, length 00:02:30");
        assert_eq!(parser.current_track(), Some(3));
    }

    #[test]
    fn test_section_divider_detection() {
        assert!(is_section_divider(
            "------------------------------------------------------------"
        ));
        assert!(!is_section_divider("---"));
        assert!(!is_section_divider("-----------x----------"));
    }
}
