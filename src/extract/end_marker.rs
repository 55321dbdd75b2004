//! Content-end detection
//!
//! Sources append share buttons, author bios and calls-to-action after the
//! article body. Each source lists the strings that open that boilerplate.

/// Recognizes source-specific trailing boilerplate
#[derive(Debug, Clone, Default)]
pub struct ContentEndDetector {
    markers: Vec<String>,
}

impl ContentEndDetector {
    pub fn new(markers: Vec<String>) -> Self {
        Self {
            markers: markers.into_iter().filter(|m| !m.is_empty()).collect(),
        }
    }

    /// Returns true if a block opens with a marker; the walk stops before it
    pub fn starts_boilerplate(&self, text: &str) -> bool {
        let text = text.trim_start();
        self.markers.iter().any(|m| text.starts_with(m.as_str()))
    }

    /// Byte offset of the earliest marker inside `text`
    pub fn find(&self, text: &str) -> Option<usize> {
        self.markers.iter().filter_map(|m| text.find(m.as_str())).min()
    }

    /// Cuts `text` at the earliest marker
    ///
    /// # Returns
    ///
    /// The kept prefix (trailing whitespace trimmed) and whether a marker hit.
    pub fn truncate<'a>(&self, text: &'a str) -> (&'a str, bool) {
        match self.find(text) {
            Some(at) => (text[..at].trim_end(), true),
            None => (text, false),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }
}
