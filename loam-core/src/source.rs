//! Input source adapter: buffer and pull variants behind one chunked
//! read contract.
//!
//! The grammar engine consumes input through fixed-size, NUL-terminated
//! chunks: it presents a buffer, the number of leftover bytes it has
//! already buffered at the front ("skip"), and the adapter fills in as
//! many previously-unread bytes as fit. A pull source may return fewer
//! bytes than requested (slow source), exactly zero (end of input), or
//! violate the contract - wrong length or a read failure - in which case
//! the error latch is set and the adapter reports the skip-only buffer
//! for the remainder of the read cycle.

use std::fmt;
use std::io::Read;

use thiserror::Error;

use crate::error::{ErrorLatch, LoadError};

/// Failure reported by a pull source's read operation.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{0}")]
pub struct SourceError(pub String);

impl SourceError {
    pub fn new(message: impl Into<String>) -> Self {
        SourceError(message.into())
    }
}

impl From<std::io::Error> for SourceError {
    fn from(err: std::io::Error) -> Self {
        SourceError(err.to_string())
    }
}

/// A caller-supplied incremental byte source.
pub trait PullSource {
    /// Produce at most `max_len` previously-unread bytes.
    ///
    /// Returning fewer bytes than requested signals a slow or partial
    /// source, not end of input. Returning an empty buffer signals end
    /// of input. Returning more than `max_len` bytes is a contract
    /// violation and aborts the parse.
    fn read(&mut self, max_len: usize) -> Result<Vec<u8>, SourceError>;
}

/// Pull adapter over any `std::io::Read`.
///
/// Reads directly into a buffer of the requested size, so it cannot
/// violate the length contract.
pub struct ReadSource<R> {
    inner: R,
}

impl<R: Read> ReadSource<R> {
    pub fn new(inner: R) -> Self {
        ReadSource { inner }
    }
}

impl<R: Read> PullSource for ReadSource<R> {
    fn read(&mut self, max_len: usize) -> Result<Vec<u8>, SourceError> {
        let mut buf = vec![0u8; max_len];
        let n = self.inner.read(&mut buf)?;
        buf.truncate(n);
        Ok(buf)
    }
}

/// Normalized input: a resident buffer or a pull source.
pub enum InputSource {
    /// Entire input already in memory; no reads ever occur.
    Buffer { data: Vec<u8>, pos: usize },
    /// Incremental pull-based source.
    Pull(Box<dyn PullSource>),
}

impl InputSource {
    pub fn buffer(data: impl Into<Vec<u8>>) -> Self {
        InputSource::Buffer {
            data: data.into(),
            pos: 0,
        }
    }

    pub fn pull(source: impl PullSource + 'static) -> Self {
        InputSource::Pull(Box::new(source))
    }

    /// Convenience: pull from any `std::io::Read`.
    pub fn reader(reader: impl Read + 'static) -> Self {
        InputSource::pull(ReadSource::new(reader))
    }

    /// Fill `buf` behind `skip` leftover bytes and NUL-terminate.
    ///
    /// Returns the total payload length (`skip` + newly supplied bytes),
    /// always at most `buf.len() - 1`; `buf[len]` is 0. A return equal
    /// to `skip` means no new bytes were available: end of input, or a
    /// latched violation.
    pub fn fill(&mut self, buf: &mut [u8], skip: usize, latch: &mut ErrorLatch) -> usize {
        debug_assert!(skip < buf.len());
        buf[skip] = 0;

        if latch.is_set() {
            return skip;
        }

        let max = buf.len() - 1 - skip;
        let supplied = match self {
            InputSource::Buffer { data, pos } => {
                let n = max.min(data.len() - *pos);
                buf[skip..skip + n].copy_from_slice(&data[*pos..*pos + n]);
                *pos += n;
                n
            }
            InputSource::Pull(source) => {
                let chunk = match source.read(max) {
                    Ok(chunk) => chunk,
                    Err(err) => {
                        latch.set(LoadError::source(err.to_string()));
                        return skip;
                    }
                };
                if chunk.len() > max {
                    latch.set(LoadError::source(format!(
                        "read returned {} bytes where at most {} were requested",
                        chunk.len(),
                        max
                    )));
                    return skip;
                }
                buf[skip..skip + chunk.len()].copy_from_slice(&chunk);
                chunk.len()
            }
        };

        let len = skip + supplied;
        buf[len] = 0;
        len
    }

    /// Release held input. Used on close; a released source supplies no
    /// further bytes.
    pub fn release(&mut self) {
        *self = InputSource::buffer(Vec::new());
    }
}

impl fmt::Debug for InputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputSource::Buffer { data, pos } => f
                .debug_struct("Buffer")
                .field("len", &data.len())
                .field("pos", pos)
                .finish(),
            InputSource::Pull(_) => f.debug_struct("Pull").finish_non_exhaustive(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scripted pull source: returns each canned result in turn, then
    /// empty (EOF).
    struct Script(Vec<Result<Vec<u8>, SourceError>>);

    impl PullSource for Script {
        fn read(&mut self, _max_len: usize) -> Result<Vec<u8>, SourceError> {
            if self.0.is_empty() {
                Ok(Vec::new())
            } else {
                self.0.remove(0)
            }
        }
    }

    #[test]
    fn buffer_fills_in_chunks() {
        let mut source = InputSource::buffer(&b"hello world"[..]);
        let mut latch = ErrorLatch::new();
        let mut buf = [0u8; 8];

        let len = source.fill(&mut buf, 0, &mut latch);
        assert_eq!(len, 7);
        assert_eq!(&buf[..7], b"hello w");
        assert_eq!(buf[7], 0);

        let len = source.fill(&mut buf, 0, &mut latch);
        assert_eq!(len, 4);
        assert_eq!(&buf[..4], b"orld");
        assert_eq!(buf[4], 0);

        // Exhausted: only the skip bytes remain.
        let len = source.fill(&mut buf, 0, &mut latch);
        assert_eq!(len, 0);
        assert!(!latch.is_set());
    }

    #[test]
    fn skip_bytes_are_preserved() {
        let mut source = InputSource::buffer(&b"abcdef"[..]);
        let mut latch = ErrorLatch::new();
        let mut buf = [0u8; 8];
        buf[..3].copy_from_slice(b"xyz");

        let len = source.fill(&mut buf, 3, &mut latch);
        assert_eq!(len, 7);
        assert_eq!(&buf[..7], b"xyzabcd");
        assert_eq!(buf[7], 0);
    }

    #[test]
    fn partial_reads_are_not_eof() {
        let mut source = InputSource::pull(Script(vec![Ok(b"ab".to_vec()), Ok(b"cd".to_vec())]));
        let mut latch = ErrorLatch::new();
        let mut buf = [0u8; 16];

        assert_eq!(source.fill(&mut buf, 0, &mut latch), 2);
        assert_eq!(&buf[..2], b"ab");
        assert_eq!(source.fill(&mut buf, 0, &mut latch), 2);
        assert_eq!(&buf[..2], b"cd");
        // Script drained: EOF.
        assert_eq!(source.fill(&mut buf, 0, &mut latch), 0);
        assert!(!latch.is_set());
    }

    #[test]
    fn oversized_read_latches_and_supplies_skip_only() {
        let mut source = InputSource::pull(Script(vec![Ok(vec![b'x'; 64])]));
        let mut latch = ErrorLatch::new();
        let mut buf = [0u8; 8];
        buf[..2].copy_from_slice(b"ok");

        let len = source.fill(&mut buf, 2, &mut latch);
        assert_eq!(len, 2);
        assert_eq!(buf[2], 0);
        assert!(matches!(latch.take(), Some(LoadError::Source { .. })));
    }

    #[test]
    fn read_failure_latches() {
        let mut source = InputSource::pull(Script(vec![Err(SourceError::new("disk on fire"))]));
        let mut latch = ErrorLatch::new();
        let mut buf = [0u8; 8];

        assert_eq!(source.fill(&mut buf, 0, &mut latch), 0);
        let err = latch.take().unwrap();
        assert_eq!(err, LoadError::source("disk on fire"));
    }

    #[test]
    fn latched_cycle_stops_supplying_data() {
        let mut source = InputSource::buffer(&b"more data"[..]);
        let mut latch = ErrorLatch::new();
        latch.set(LoadError::source("earlier failure"));
        let mut buf = [0u8; 8];
        buf[0] = b'k';

        // Skip-only report for the rest of the cycle.
        assert_eq!(source.fill(&mut buf, 1, &mut latch), 1);
        assert_eq!(buf[1], 0);
    }

    #[test]
    fn read_source_respects_max_len() {
        let mut source = InputSource::reader(std::io::Cursor::new(b"0123456789".to_vec()));
        let mut latch = ErrorLatch::new();
        let mut buf = [0u8; 5];

        assert_eq!(source.fill(&mut buf, 0, &mut latch), 4);
        assert_eq!(&buf[..4], b"0123");
        assert!(!latch.is_set());
    }

    #[test]
    fn release_supplies_nothing() {
        let mut source = InputSource::buffer(&b"data"[..]);
        source.release();
        let mut latch = ErrorLatch::new();
        let mut buf = [0u8; 8];
        assert_eq!(source.fill(&mut buf, 0, &mut latch), 0);
    }
}
