//! Structured table-of-contents types.

/// Session type declared at the top of a TOC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionType {
    /// Pure audio session.
    CdDa,
    /// Data or mixed-mode session.
    CdRom,
    /// Extended (XA) session.
    CdRomXa,
}

/// A single track in the table of contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TocTrack {
    /// Track number, starting at 1.
    pub number: u32,
    /// Absolute start offset in frames.
    pub start_frame: u32,
    /// Length in frames.
    pub length_frames: u32,
}

/// Structured table of contents produced by a decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscToc {
    /// Session type from the TOC header.
    pub session: SessionType,
    /// Tracks in disc order.
    pub tracks: Vec<TocTrack>,
}

impl DiscToc {
    /// Number of the first track.
    #[must_use]
    pub fn first_track(&self) -> Option<u32> {
        self.tracks.first().map(|t| t.number)
    }

    /// Number of the last track.
    #[must_use]
    pub fn last_track(&self) -> Option<u32> {
        self.tracks.last().map(|t| t.number)
    }

    /// Total audio length in frames.
    #[must_use]
    pub fn total_frames(&self) -> u64 {
        self.tracks
            .iter()
            .map(|t| u64::from(t.length_frames))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toc() -> DiscToc {
        DiscToc {
            session: SessionType::CdDa,
            tracks: vec![
                TocTrack {
                    number: 1,
                    start_frame: 0,
                    length_frames: 9000,
                },
                TocTrack {
                    number: 2,
                    start_frame: 9000,
                    length_frames: 13500,
                },
            ],
        }
    }

    #[test]
    fn test_track_bounds() {
        let toc = toc();
        assert_eq!(toc.first_track(), Some(1));
        assert_eq!(toc.last_track(), Some(2));
    }

    #[test]
    fn test_total_frames() {
        assert_eq!(toc().total_frames(), 22500);
    }

    #[test]
    fn test_empty_toc_has_no_bounds() {
        let toc = DiscToc {
            session: SessionType::CdDa,
            tracks: Vec::new(),
        };
        assert_eq!(toc.first_track(), None);
        assert_eq!(toc.last_track(), None);
        assert_eq!(toc.total_frames(), 0);
    }
}
