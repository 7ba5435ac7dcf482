//! Framed stdout payloads and the incremental parser that extracts them.

use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};

/// The literal marker preceding a framed JSON payload on stdout.
pub const FRAME_START: &str = "---NANOCLAW_OUTPUT_START---";
/// The literal marker following a framed JSON payload on stdout.
pub const FRAME_END: &str = "---NANOCLAW_OUTPUT_END---";

/// One framed payload emitted by the agent process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AgentOutput {
    /// An intermediate or final assistant turn.
    Success {
        /// Outbound text, or `None` for a silent intermediate step.
        result: Option<String>,
        /// A new session id, if the agent started or rotated one.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        new_session_id: Option<String>,
    },
    /// A terminal failure reported by the agent itself.
    Error {
        /// Always `None` on the error variant, kept for schema symmetry.
        #[serde(default)]
        result: Option<String>,
        /// The error message.
        error: String,
    },
}

impl AgentOutput {
    /// The outbound text, if this frame carries one.
    pub fn outbound_text(&self) -> Option<&str> {
        match self {
            AgentOutput::Success { result, .. } => result.as_deref(),
            AgentOutput::Error { .. } => None,
        }
    }

    /// `true` if this is a terminal error frame.
    pub fn is_error(&self) -> bool {
        matches!(self, AgentOutput::Error { .. })
    }
}

/// Incrementally scans raw stdout text for `FRAME_START`/`FRAME_END`
/// pairs, one line at a time, and parses each as an [`AgentOutput`].
///
/// Lines outside a frame (the agent's own diagnostic chatter) are
/// discarded.
#[derive(Default)]
pub struct FrameScanner {
    buffer: Option<String>,
}

impl FrameScanner {
    /// A scanner with no pending frame.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line of stdout. Returns `Some(frame)` when `line`
    /// completes a frame; malformed JSON inside a completed frame is
    /// surfaced as an error.
    pub fn feed_line(&mut self, line: &str) -> Option<Result<AgentOutput>> {
        let trimmed = line.trim();
        match &mut self.buffer {
            None => {
                if trimmed == FRAME_START {
                    self.buffer = Some(String::new());
                }
                None
            }
            Some(accum) => {
                if trimmed == FRAME_END {
                    let payload = self.buffer.take().unwrap_or_default();
                    Some(
                        serde_json::from_str::<AgentOutput>(&payload)
                            .map_err(|e| AgentError::MalformedFrame(e.to_string())),
                    )
                } else {
                    if !accum.is_empty() {
                        accum.push('\n');
                    }
                    accum.push_str(line);
                    None
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scanner_extracts_single_frame() {
        let mut scanner = FrameScanner::new();
        assert!(scanner.feed_line("some diagnostic chatter").is_none());
        assert!(scanner.feed_line(FRAME_START).is_none());
        assert!(scanner.feed_line(r#"{"status":"success","result":"hi"}"#).is_none());
        let frame = scanner.feed_line(FRAME_END).unwrap().unwrap();
        assert_eq!(frame.outbound_text(), Some("hi"));
    }

    #[test]
    fn scanner_handles_multiline_json_payload() {
        let mut scanner = FrameScanner::new();
        scanner.feed_line(FRAME_START);
        scanner.feed_line(r#"{"status":"success","#);
        scanner.feed_line(r#""result":"multi-line"}"#);
        let frame = scanner.feed_line(FRAME_END).unwrap().unwrap();
        assert_eq!(frame.outbound_text(), Some("multi-line"));
    }

    #[test]
    fn scanner_reports_malformed_frame() {
        let mut scanner = FrameScanner::new();
        scanner.feed_line(FRAME_START);
        scanner.feed_line("not json");
        let err = scanner.feed_line(FRAME_END).unwrap().unwrap_err();
        assert!(matches!(err, AgentError::MalformedFrame(_)));
    }

    #[test]
    fn scanner_extracts_error_frame() {
        let mut scanner = FrameScanner::new();
        scanner.feed_line(FRAME_START);
        scanner.feed_line(r#"{"status":"error","result":null,"error":"boom"}"#);
        let frame = scanner.feed_line(FRAME_END).unwrap().unwrap();
        assert!(frame.is_error());
    }

    #[test]
    fn scanner_extracts_consecutive_frames() {
        let mut scanner = FrameScanner::new();
        scanner.feed_line(FRAME_START);
        scanner.feed_line(r#"{"status":"success","result":"one"}"#);
        let first = scanner.feed_line(FRAME_END).unwrap().unwrap();
        assert_eq!(first.outbound_text(), Some("one"));

        scanner.feed_line(FRAME_START);
        scanner.feed_line(r#"{"status":"success","result":"two"}"#);
        let second = scanner.feed_line(FRAME_END).unwrap().unwrap();
        assert_eq!(second.outbound_text(), Some("two"));
    }
}
