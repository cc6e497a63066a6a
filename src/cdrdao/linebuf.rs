//! Incremental line assembly for the cdrdao stderr stream.
//!
//! cdrdao writes its progress log in bursts that do not align with line
//! boundaries, so reads must be re-assembled into lines across chunks.

/// Accumulates raw stream chunks and yields complete lines.
///
/// The trailing fragment of an unterminated line is retained until a later
/// chunk completes it. No byte is dropped and no line is returned twice.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: String,
}

impl LineBuffer {
    /// Create an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return the complete lines it finished, in order.
    ///
    /// A chunk containing no newline yields nothing and grows the pending
    /// fragment.
    pub fn feed(&mut self, chunk: &str) -> Vec<String> {
        self.pending.push_str(chunk);
        if !self.pending.contains('\n') {
            return Vec::new();
        }

        let mut lines: Vec<String> = self.pending.split('\n').map(str::to_string).collect();
        // split leaves the text after the last newline in the final element;
        // it is empty when the buffer ended exactly on a newline
        self.pending = lines.pop().unwrap_or_default();
        lines
    }

    /// The unterminated fragment still waiting for its newline.
    #[must_use]
    pub fn pending(&self) -> &str {
        &self.pending
    }

    /// Take the trailing fragment at stream end, if non-empty.
    ///
    /// The stream is closed at this point, so the fragment is the final line
    /// even without its terminator.
    pub fn take_pending(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.pending))
        }
    }
}
