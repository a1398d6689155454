//! Bounded sink for script print output.
//!
//! [`OutputCapture`] is a cheap-to-clone handle; clones share one buffer.
//! Writes past the line budget are counted and dropped, and each line is cut
//! to the character budget. Captured text never reaches the host's tracing
//! subscriber.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Marker appended to lines cut at the character budget.
pub const TRUNCATION_MARKER: &str = "...";

#[derive(Debug)]
struct CaptureBuffer {
    lines: Vec<String>,
    dropped: usize,
    max_lines: usize,
    max_line_chars: usize,
}

/// Shared, bounded console capture.
///
/// # Examples
///
/// ```
/// use warden_runtime::OutputCapture;
///
/// let capture = OutputCapture::new(2, 5);
/// capture.write("hello world");
/// capture.write("second");
/// capture.write("third");
///
/// assert_eq!(capture.lines(), vec!["hello...".to_string(), "secon...".to_string()]);
/// assert_eq!(capture.dropped(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct OutputCapture {
    inner: Arc<Mutex<CaptureBuffer>>,
}

impl OutputCapture {
    /// Creates a capture keeping at most `max_lines` lines of at most
    /// `max_line_chars` characters each.
    #[must_use]
    pub fn new(max_lines: usize, max_line_chars: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CaptureBuffer {
                lines: Vec::new(),
                dropped: 0,
                max_lines,
                max_line_chars,
            })),
        }
    }

    fn buffer(&self) -> MutexGuard<'_, CaptureBuffer> {
        // a panicking writer cannot leave the buffer half-updated
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records one line of output.
    pub fn write(&self, text: &str) {
        let mut buffer = self.buffer();
        if buffer.lines.len() >= buffer.max_lines {
            buffer.dropped += 1;
            return;
        }

        let line = match text.char_indices().nth(buffer.max_line_chars) {
            Some((cut, _)) => format!("{}{TRUNCATION_MARKER}", &text[..cut]),
            None => text.to_string(),
        };
        buffer.lines.push(line);
    }

    /// Returns a snapshot of the captured lines, in write order.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.buffer().lines.clone()
    }

    /// Returns the number of lines dropped after the budget was reached.
    #[must_use]
    pub fn dropped(&self) -> usize {
        self.buffer().dropped
    }

    /// Returns the number of captured lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer().lines.len()
    }

    /// Returns `true` if nothing has been captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
