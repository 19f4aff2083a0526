//! Cursor-advancing regex matching over an append-only transcript.
//!
//! The transcript buffer only ever grows; a committed cursor separates output
//! already consumed by earlier matches from newly arrived output. Patterns
//! are searched against the new region only, so a later check can never pass
//! by re-matching a previous command's echo.

use regex::Regex;
use std::io::Write;
use thiserror::Error;

/// Errors from pattern compilation.
#[derive(Error, Debug)]
pub enum PatternError {
    #[error("invalid regex '{pattern}': {source}")]
    Invalid {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// A compiled expectation pattern.
///
/// Patterns are authored defensively for line-ending variability
/// (`\r?\n`, bare `\r`); the matcher does not normalize text.
#[derive(Debug, Clone)]
pub struct Pattern {
    regex: Regex,
    source: String,
}

impl Pattern {
    /// Compile a pattern.
    ///
    /// # Errors
    /// Returns `PatternError::Invalid` if the regex does not compile.
    pub fn new(pattern: &str) -> Result<Self, PatternError> {
        let regex = Regex::new(pattern).map_err(|source| PatternError::Invalid {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            regex,
            source: pattern.to_string(),
        })
    }

    /// The pattern as written in the grading spec.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Search the transcript's unconsumed tail. On a hit, commits the cursor
    /// past the match end and returns the matched text. The cursor never
    /// moves backwards, so consumed output cannot match twice.
    pub fn try_match(&self, transcript: &mut Transcript) -> Option<String> {
        let tail = &transcript.buf[transcript.cursor..];
        let found = self.regex.find(tail)?;
        let matched = found.as_str().to_string();
        transcript.cursor += found.end();
        Some(matched)
    }
}

/// The session's growing output buffer plus consumption state.
pub struct Transcript {
    buf: String,
    cursor: usize,
    eof: bool,
    sink: Option<Box<dyn Write + Send>>,
}

impl std::fmt::Debug for Transcript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transcript")
            .field("len", &self.buf.len())
            .field("cursor", &self.cursor)
            .field("eof", &self.eof)
            .finish_non_exhaustive()
    }
}

impl Transcript {
    #[must_use]
    pub fn new(sink: Option<Box<dyn Write + Send>>) -> Self {
        Self {
            buf: String::new(),
            cursor: 0,
            eof: false,
            sink,
        }
    }

    /// Append newly arrived output. Raw text is tee'd to the log sink first
    /// so a human can inspect exactly what the child printed; sink failures
    /// never interrupt grading.
    pub fn append(&mut self, chunk: &str) {
        if let Some(sink) = &mut self.sink {
            let _ = sink.write_all(chunk.as_bytes());
            let _ = sink.flush();
        }
        self.buf.push_str(chunk);
    }

    /// Mark that the child's output stream has closed.
    pub fn mark_eof(&mut self) {
        self.eof = true;
    }

    #[must_use]
    pub const fn eof(&self) -> bool {
        self.eof
    }

    /// Offset up to which output has been consumed by matches.
    #[must_use]
    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    /// Total output received so far, in bytes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.buf.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn test_match_advances_cursor() -> TestResult {
        let mut t = Transcript::new(None);
        t.append("booting...\nready> ");

        let prompt = Pattern::new(r"ready> ")?;
        let matched = prompt.try_match(&mut t);
        assert_eq!(matched.as_deref(), Some("ready> "));
        assert_eq!(t.cursor(), t.len());
        Ok(())
    }

    #[test]
    fn test_consumed_output_never_rematches() -> TestResult {
        let mut t = Transcript::new(None);
        t.append("hello\nready> ");

        let hello = Pattern::new(r"hello")?;
        assert!(hello.try_match(&mut t).is_some());
        // Same pattern against the same consumed region: the cursor is
        // already past it.
        assert!(hello.try_match(&mut t).is_none());

        t.append("hello again\n");
        assert!(hello.try_match(&mut t).is_some());
        Ok(())
    }

    #[test]
    fn test_cursor_monotone_across_patterns() -> TestResult {
        let mut t = Transcript::new(None);
        t.append("ready> hi\nready> ");

        let prompt = Pattern::new(r"ready> ")?;
        assert!(prompt.try_match(&mut t).is_some());
        let after_first = t.cursor();

        let hi = Pattern::new(r"hi\r?\n")?;
        assert!(hi.try_match(&mut t).is_some());
        assert!(t.cursor() > after_first);

        assert!(prompt.try_match(&mut t).is_some());
        assert_eq!(t.cursor(), t.len());
        Ok(())
    }

    #[test]
    fn test_no_match_leaves_cursor() -> TestResult {
        let mut t = Transcript::new(None);
        t.append("partial out");

        let p = Pattern::new(r"never printed")?;
        assert!(p.try_match(&mut t).is_none());
        assert_eq!(t.cursor(), 0);
        Ok(())
    }

    #[test]
    fn test_crlf_tolerant_pattern() -> TestResult {
        let mut t = Transcript::new(None);
        t.append("hello\r\nready> ");

        let p = Pattern::new(r"hello\r?\n")?;
        assert!(p.try_match(&mut t).is_some());
        Ok(())
    }

    #[test]
    fn test_bare_cr_pattern() -> TestResult {
        let mut t = Transcript::new(None);
        t.append("Hello\r");

        let p = Pattern::new(r"Hello(?:\r?\n|\r|$)")?;
        assert!(p.try_match(&mut t).is_some());
        Ok(())
    }

    #[test]
    fn test_invalid_regex_rejected() {
        let result = Pattern::new(r"[unclosed");
        assert!(matches!(result, Err(PatternError::Invalid { .. })));
    }

    #[test]
    fn test_sink_receives_raw_output() {
        use std::sync::{Arc, Mutex};

        #[derive(Clone)]
        struct Shared(Arc<Mutex<Vec<u8>>>);

        impl Write for Shared {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                if let Ok(mut inner) = self.0.lock() {
                    inner.extend_from_slice(buf);
                }
                Ok(buf.len())
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let captured = Shared(Arc::new(Mutex::new(Vec::new())));
        let mut t = Transcript::new(Some(Box::new(captured.clone())));
        t.append("ready> ");
        t.append("hi\n");

        let seen = captured.0.lock().map(|v| v.clone()).unwrap_or_default();
        assert_eq!(seen, b"ready> hi\n");
    }
}
