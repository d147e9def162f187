//! Incremental JSON frame parser for streaming responses
//!
//! HTTP chunk boundaries do not line up with JSON object boundaries, so
//! bytes are buffered and complete top-level objects are cut out with a
//! single-pass bracket matcher that ignores braces inside strings.

use crate::errors::AgentError;
use serde_json::Value;

/// Maximum buffer size (1MB)
pub const MAX_BUFFER_SIZE: usize = 1_048_576;

/// Incremental JSON frame parser
#[derive(Debug)]
pub struct FrameParser {
    buffer: Vec<u8>,
    max_buffer_size: usize,
}

impl FrameParser {
    pub fn new() -> Self {
        Self::with_capacity(MAX_BUFFER_SIZE)
    }

    pub fn with_capacity(max_buffer_size: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(4096),
            max_buffer_size,
        }
    }

    /// Add bytes and return every object completed by them, in order.
    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<Value>, AgentError> {
        if self.buffer.len() + bytes.len() > self.max_buffer_size {
            return Err(AgentError::Protocol(format!(
                "Buffer overflow: {} bytes exceeds maximum {}",
                self.buffer.len() + bytes.len(),
                self.max_buffer_size
            )));
        }

        self.buffer.extend_from_slice(bytes);

        let mut frames = Vec::new();
        while let Some((start, end)) = self.find_complete_object()? {
            let frame: Value = serde_json::from_slice(&self.buffer[start..=end])?;
            self.buffer.drain(..=end);
            frames.push(frame);
        }
        Ok(frames)
    }

    /// Locate the first complete top-level object in the buffer.
    ///
    /// ```text
    /// depth ← 0, start ← None
    /// for each byte bᵢ outside a string literal:
    ///   '{' → if depth = 0 then start ← i; depth ← depth + 1
    ///   '}' → depth ← depth - 1; if depth = 0 then return (start, i)
    /// ```
    fn find_complete_object(&self) -> Result<Option<(usize, usize)>, AgentError> {
        let mut depth: i32 = 0;
        let mut start: Option<usize> = None;
        let mut in_string = false;
        let mut escape_next = false;

        for (i, &byte) in self.buffer.iter().enumerate() {
            if escape_next {
                escape_next = false;
                continue;
            }

            match byte {
                b'\\' if in_string => escape_next = true,
                b'"' => in_string = !in_string,
                _ if in_string => {}
                b'{' => {
                    if depth == 0 {
                        start = Some(i);
                    }
                    depth += 1;
                }
                b'}' => {
                    depth -= 1;
                    if depth < 0 {
                        return Err(AgentError::Protocol(
                            "Mismatched braces: too many closing braces".to_string(),
                        ));
                    }
                    if depth == 0 {
                        if let Some(start) = start {
                            return Ok(Some((start, i)));
                        }
                    }
                }
                _ => {}
            }
        }

        Ok(None)
    }

    /// True when only whitespace is left over.
    pub fn is_drained(&self) -> bool {
        self.buffer.iter().all(|b| b.is_ascii_whitespace())
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer.len()
    }
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}
