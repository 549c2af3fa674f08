//! Incremental line splitting for streamed HTTP bodies
//!
//! Network reads do not respect line boundaries, so the NDJSON research
//! stream buffers bytes here until a full line is available.

/// Buffers raw bytes and yields complete `\n`-terminated lines
#[derive(Debug, Default)]
pub struct LineDecoder {
    buf: Vec<u8>,
    /// Prefix of `buf` already known to hold no newline
    scanned: usize,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes, returning every line completed by it.
    ///
    /// Trailing `\r` is stripped and blank lines are skipped.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.buf[self.scanned..].iter().position(|b| *b == b'\n') {
            let end = self.scanned + offset;
            if let Some(line) = Self::decode(&self.buf[start..end]) {
                lines.push(line);
            }
            start = end + 1;
            self.scanned = start;
        }
        self.buf.drain(..start);
        self.scanned = self.buf.len();
        lines
    }

    /// Flush whatever is left once the body has ended
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buf);
        self.scanned = 0;
        Self::decode(&rest)
    }

    fn decode(raw: &[u8]) -> Option<String> {
        let text = String::from_utf8_lossy(raw);
        let text = text.trim_end_matches('\r');
        if text.trim().is_empty() {
            None
        } else {
            Some(text.to_string())
        }
    }
}
