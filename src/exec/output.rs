//! Bounded collection of child process output
//!
//! Each stream is drained on its own thread up to a byte cap; past the cap
//! the collector keeps reading and discarding so the child never blocks on
//! a full pipe while the captured prefix stays bounded.

use std::io::Read;
use std::process::{ChildStderr, ChildStdout};
use std::thread::{self, JoinHandle};

/// Line appended to a captured stream that hit its byte cap
pub const TRUNCATION_MARKER: &str = "... [output truncated]";

/// Byte caps for captured child output
#[derive(Debug, Clone)]
pub struct OutputLimits {
    /// Per-stream stdout cap (bytes)
    pub stdout_limit: usize,
    /// Per-stream stderr cap (bytes)
    pub stderr_limit: usize,
}

impl Default for OutputLimits {
    fn default() -> Self {
        OutputLimits {
            stdout_limit: 8 * 1024 * 1024, // 8 MB stdout
            stderr_limit: 2 * 1024 * 1024, // 2 MB stderr
        }
    }
}

/// One fully drained stream
#[derive(Debug)]
pub struct CollectedStream {
    pub data: Vec<u8>,
    pub truncated: bool,
}

impl CollectedStream {
    fn empty() -> Self {
        CollectedStream {
            data: Vec::new(),
            truncated: false,
        }
    }
}

/// Collector threads for one child's stdout and stderr
pub struct OutputCollector {
    stdout_handle: Option<JoinHandle<CollectedStream>>,
    stderr_handle: Option<JoinHandle<CollectedStream>>,
}

impl OutputCollector {
    /// Start draining both streams
    pub fn spawn(
        stdout: Option<ChildStdout>,
        stderr: Option<ChildStderr>,
        limits: &OutputLimits,
    ) -> Self {
        let stdout_limit = limits.stdout_limit;
        let stderr_limit = limits.stderr_limit;

        let stdout_handle =
            stdout.map(|s| thread::spawn(move || collect_stream(s, stdout_limit)));
        let stderr_handle =
            stderr.map(|s| thread::spawn(move || collect_stream(s, stderr_limit)));

        OutputCollector {
            stdout_handle,
            stderr_handle,
        }
    }

    /// Join both collectors. Returns once the child's pipe ends close, which
    /// is guaranteed after the child (and its group) has been reaped or
    /// killed.
    pub fn join(self) -> (CollectedStream, CollectedStream) {
        (
            join_stream(self.stdout_handle),
            join_stream(self.stderr_handle),
        )
    }
}

fn join_stream(handle: Option<JoinHandle<CollectedStream>>) -> CollectedStream {
    match handle {
        Some(h) => h.join().unwrap_or_else(|_| CollectedStream::empty()),
        None => CollectedStream::empty(),
    }
}

fn collect_stream<R: Read>(mut stream: R, limit: usize) -> CollectedStream {
    let mut data = Vec::new();
    let mut truncated = false;
    let mut buf = [0u8; 4096];

    loop {
        match stream.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                if data.len() < limit {
                    let take = n.min(limit - data.len());
                    data.extend_from_slice(&buf[..take]);
                    if take < n {
                        truncated = true;
                    }
                } else {
                    // Past the cap: discard but keep draining.
                    truncated = true;
                }
            }
            Err(_) => break,
        }
    }

    CollectedStream { data, truncated }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_collect_under_limit() {
        let collected = collect_stream(Cursor::new(b"hello".to_vec()), 1024);
        assert_eq!(collected.data, b"hello");
        assert!(!collected.truncated);
    }

    #[test]
    fn test_collect_truncates_at_limit() {
        let input = vec![b'x'; 10_000];
        let collected = collect_stream(Cursor::new(input), 4096);
        assert_eq!(collected.data.len(), 4096);
        assert!(collected.truncated);
    }

    #[test]
    fn test_collect_empty_stream() {
        let collected = collect_stream(Cursor::new(Vec::new()), 1024);
        assert!(collected.data.is_empty());
        assert!(!collected.truncated);
    }

    #[test]
    fn test_limit_boundary_is_exact() {
        let input = vec![b'y'; 4096];
        let collected = collect_stream(Cursor::new(input), 4096);
        assert_eq!(collected.data.len(), 4096);
        assert!(!collected.truncated);
    }
}
