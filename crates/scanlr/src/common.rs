//! Source positions and location reporting
//!
//! Byte offsets are the canonical position representation throughout the
//! crate. Line/column pairs are derived on demand through a cached
//! [`LineIndex`] so that error construction stays O(log n) in the input
//! length.

/// A line/column pair derived from a byte offset.
///
/// Both components are zero-based. Columns count UTF-8 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LineCol {
    pub line: u32,
    pub column: u32,
}

impl LineCol {
    /// Create a new line/column position
    #[must_use]
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// Cached index of line start offsets for a given input.
///
/// Built once per parse; converts byte offsets to [`LineCol`] with a binary
/// search over the recorded line starts.
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<usize>,
    text_len: usize,
}

impl LineIndex {
    /// Scan the input once and record every line start.
    #[must_use]
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        let bytes = text.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                b'\n' => {
                    line_starts.push(i + 1);
                    i += 1;
                }
                b'\r' => {
                    if i + 1 < bytes.len() && bytes[i + 1] == b'\n' {
                        line_starts.push(i + 2);
                        i += 2;
                    } else {
                        line_starts.push(i + 1);
                        i += 1;
                    }
                }
                _ => i += 1,
            }
        }
        Self {
            line_starts,
            text_len: text.len(),
        }
    }

    /// Convert a byte offset to a line/column position.
    ///
    /// Offsets past the end of the input are clamped to the last position.
    #[must_use]
    pub fn line_col(&self, offset: usize) -> LineCol {
        let offset = offset.min(self.text_len);
        let line = match self.line_starts.binary_search(&offset) {
            Ok(idx) => idx,
            Err(idx) => idx.saturating_sub(1),
        };
        let column = offset - self.line_starts[line];
        LineCol {
            line: u32::try_from(line).unwrap_or(u32::MAX),
            column: u32::try_from(column).unwrap_or(u32::MAX),
        }
    }

    /// Number of lines in the indexed text.
    #[must_use]
    pub fn line_count(&self) -> u32 {
        u32::try_from(self.line_starts.len()).unwrap_or(u32::MAX)
    }
}

/// A position in the parsed input, carried by parse-time errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// File the input came from, if the caller provided one.
    pub file_name: Option<String>,
    /// Absolute byte offset of the error position.
    pub position: usize,
    /// Line/column of `position`, computed against the input.
    pub line_col: LineCol,
}

impl Location {
    #[must_use]
    pub fn new(file_name: Option<&str>, position: usize, index: &LineIndex) -> Self {
        Self {
            file_name: file_name.map(str::to_owned),
            position,
            line_col: index.line_col(position),
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(name) = &self.file_name {
            write!(f, "{name}:")?;
        }
        // 1-based in user-facing output
        write!(f, "{}:{}", self.line_col.line + 1, self.line_col.column + 1)
    }
}

/// Render a short window of the input around `position` for error messages.
#[must_use]
pub fn position_context(input: &str, position: usize) -> String {
    let position = position.min(input.len());
    let mut start = position.saturating_sub(15);
    while !input.is_char_boundary(start) {
        start -= 1;
    }
    let mut end = (position + 15).min(input.len());
    while !input.is_char_boundary(end) {
        end += 1;
    }
    let before = input[start..position].replace('\n', "\\n");
    let after = input[position..end].replace('\n', "\\n");
    format!("{before}*{after}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_col_unix_line_endings() {
        let index = LineIndex::new("line 1\nline 2\nline 3");
        assert_eq!(index.line_col(0), LineCol::new(0, 0));
        assert_eq!(index.line_col(6), LineCol::new(0, 6));
        assert_eq!(index.line_col(7), LineCol::new(1, 0));
        assert_eq!(index.line_col(14), LineCol::new(2, 0));
    }

    #[test]
    fn line_col_windows_line_endings() {
        let index = LineIndex::new("one\r\ntwo");
        assert_eq!(index.line_col(5), LineCol::new(1, 0));
        assert_eq!(index.line_count(), 2);
    }

    #[test]
    fn line_col_clamps_past_end() {
        let index = LineIndex::new("ab");
        assert_eq!(index.line_col(100), LineCol::new(0, 2));
    }

    #[test]
    fn context_window_marks_position() {
        let ctx = position_context("1 + 2 + 3", 4);
        assert_eq!(ctx, "1 + *2 + 3");
    }
}
