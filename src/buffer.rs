//! Snapshot buffer holding the fed text, cursor, and revision counter
//!
//! The buffer is replaced wholesale on every feed; the revision counter
//! increments only when the text actually changes, so cursor-only updates
//! never trigger analysis. All positions are character offsets.

/// Cursor-centered slice of the buffer handed to plugins
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    /// The sliced text
    pub text: String,

    /// Absolute character offset of the slice start in the full text
    pub offset: usize,
}

/// Current text, cursor position, and revision counter
#[derive(Debug, Default)]
pub struct Buffer {
    text: String,
    len_chars: usize,
    cursor: usize,
    revision: u64,
}

impl Buffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the buffer contents
    ///
    /// Returns whether the text changed. A missing cursor defaults to the
    /// end of the text; cursors beyond the text are clamped. Cursor-only
    /// updates leave the revision untouched.
    pub fn update(&mut self, text: &str, cursor: Option<usize>) -> bool {
        if text != self.text {
            self.text = text.to_string();
            self.len_chars = self.text.chars().count();
            self.cursor = cursor.unwrap_or(self.len_chars).min(self.len_chars);
            self.revision += 1;
            true
        } else {
            if let Some(cursor) = cursor {
                self.cursor = cursor.min(self.len_chars);
            }
            false
        }
    }

    /// Compute the cursor-centered analysis window
    ///
    /// The window has length `min(size, len)` whenever possible: when the
    /// half-window hits a buffer boundary the opposite side is extended so
    /// bounded-size documents still get full coverage near the edges.
    pub fn window(&self, size: usize) -> Window {
        let len = self.len_chars;
        let want = size.min(len);
        if want == 0 {
            return Window {
                text: String::new(),
                offset: 0,
            };
        }

        let half = size / 2;
        let start = self.cursor.saturating_sub(half).min(len - want);
        let text: String = self.text.chars().skip(start).take(want).collect();

        Window {
            text,
            offset: start,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Text length in characters
    pub fn len_chars(&self) -> usize {
        self.len_chars
    }

    /// Zero all state
    pub fn reset(&mut self) {
        self.text.clear();
        self.len_chars = 0;
        self.cursor = 0;
        self.revision = 0;
    }
}
