//! Sentence framing.
//!
//! Serial AIS receivers deliver sentences as a byte stream with no guarantee that a
//! read ends on a sentence boundary. [LineFramer] buffers partial data between reads and
//! splits off complete newline-terminated lines as [RawSentence]s.
use std::fmt::{Debug, Display};
use std::io::{ErrorKind, Read};

use tracing::{debug, trace};

use crate::{Error, Result};

/// Default line buffer capacity, the longest unterminated run of bytes that is retained.
pub const DEFAULT_CAPACITY: usize = 512;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum FramingError {
    #[error("{len} unterminated bytes exceeds line buffer capacity of {capacity}")]
    Overflow { len: usize, capacity: usize },
}

/// A single line of input with its line terminator removed.
///
/// Nothing about the content is validated; see [crate::sentence::validate].
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct RawSentence {
    data: Vec<u8>,
}

impl RawSentence {
    /// Create from line bytes. Any trailing `\r` or `\n` is removed.
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        let mut data = data.into();
        while matches!(data.last(), Some(b'\r' | b'\n')) {
            data.pop();
        }
        RawSentence { data }
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Sentence bytes terminated with `\r\n`, as expected by NMEA consumers.
    #[must_use]
    pub fn to_line(&self) -> Vec<u8> {
        let mut line = Vec::with_capacity(self.data.len() + 2);
        line.extend_from_slice(&self.data);
        line.extend_from_slice(b"\r\n");
        line
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

impl Display for RawSentence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.data))
    }
}

impl Debug for RawSentence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RawSentence({:?})", String::from_utf8_lossy(&self.data))
    }
}

impl From<&str> for RawSentence {
    fn from(value: &str) -> Self {
        RawSentence::new(value.as_bytes())
    }
}

impl From<&[u8]> for RawSentence {
    fn from(value: &[u8]) -> Self {
        RawSentence::new(value)
    }
}

impl From<Vec<u8>> for RawSentence {
    fn from(value: Vec<u8>) -> Self {
        RawSentence::new(value)
    }
}

/// Complete lines split off by a single [LineFramer::feed], in arrival order.
///
/// Lines are produced lazily. Cloning gives an independent iterator starting at the
/// same point, so a batch may be walked more than once. A line longer than the framer
/// capacity is produced as [FramingError::Overflow] in its place.
#[derive(Debug, Clone, Default)]
pub struct Sentences {
    data: Vec<u8>,
    pos: usize,
    capacity: usize,
    // first line is the tail of a line already reported as overflowed
    skip_first: bool,
    overflow: Option<FramingError>,
}

impl Iterator for Sentences {
    type Item = std::result::Result<RawSentence, FramingError>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.pos < self.data.len() {
            let rest = &self.data[self.pos..];
            let end = rest.iter().position(|&b| b == b'\n').unwrap_or(rest.len());
            let line = &rest[..end];
            self.pos += end + 1;
            if std::mem::take(&mut self.skip_first) {
                continue;
            }
            if line.len() > self.capacity {
                return Some(Err(FramingError::Overflow {
                    len: line.len(),
                    capacity: self.capacity,
                }));
            }
            let sentence = RawSentence::new(line);
            // blank lines, e.g., from \r\n\r\n, are not sentences
            if !sentence.is_empty() {
                return Some(Ok(sentence));
            }
        }
        self.overflow.take().map(Err)
    }
}

/// Accumulates stream bytes and splits off complete lines.
///
/// A framer owns the partial-line state of exactly one stream. No more than `capacity`
/// bytes are ever held. A line longer than that, counting any `\r` but not the `\n`, is
/// dropped and reported once, however the stream was chunked.
///
/// # Example
/// ```
/// use ais::LineFramer;
///
/// let mut framer = LineFramer::new();
/// assert_eq!(framer.feed(b"!AIVDM,1,1,,B,x").count(), 0);
///
/// let lines: Vec<_> = framer.feed(b"yz,0*4E\n").collect();
/// assert_eq!(lines.len(), 1);
/// assert_eq!(lines[0].as_ref().unwrap().as_bytes(), b"!AIVDM,1,1,,B,xyz,0*4E");
/// ```
#[derive(Debug, Clone)]
pub struct LineFramer {
    buf: Vec<u8>,
    capacity: usize,
    // dropping the rest of an overflowed line up to its terminator
    discarding: bool,
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new()
    }
}

impl LineFramer {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Framer that retains at most `capacity` unterminated bytes.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        LineFramer {
            buf: Vec::with_capacity(capacity),
            capacity,
            discarding: false,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of bytes currently held waiting for a line terminator.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Discard any partial line.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.discarding = false;
    }

    /// Append `bytes` and split off every complete line.
    ///
    /// Everything through the last `\n` is returned as [Sentences]; the remainder is kept
    /// for the next feed.
    ///
    /// When the unterminated remainder would exceed capacity it is cleared, the rest of
    /// that line is skipped when it arrives, and [FramingError::Overflow] is produced
    /// after the complete lines of this feed. The framer stays usable.
    pub fn feed(&mut self, bytes: &[u8]) -> Sentences {
        let mut sentences = Sentences {
            capacity: self.capacity,
            ..Sentences::default()
        };

        let rest = match bytes.iter().rposition(|&b| b == b'\n') {
            Some(last) => {
                let (complete, rest) = bytes.split_at(last + 1);
                let mut data = std::mem::take(&mut self.buf);
                data.extend_from_slice(complete);
                sentences.data = data;
                sentences.skip_first = std::mem::take(&mut self.discarding);
                rest
            }
            None => bytes,
        };

        if self.discarding {
            trace!(bytes = rest.len(), "discarding overflowed line");
            return sentences;
        }

        let len = self.buf.len() + rest.len();
        if len > self.capacity {
            self.buf.clear();
            self.discarding = true;
            sentences.overflow = Some(FramingError::Overflow {
                len,
                capacity: self.capacity,
            });
        } else {
            self.buf.extend_from_slice(rest);
        }

        trace!(
            bytes = sentences.data.len(),
            buffered = self.buf.len(),
            "split complete lines"
        );
        sentences
    }

    /// Take any buffered partial line, e.g., at the end of a finite stream.
    pub fn finish(&mut self) -> Option<RawSentence> {
        self.discarding = false;
        let sentence = RawSentence::new(std::mem::take(&mut self.buf));
        if sentence.is_empty() {
            None
        } else {
            Some(sentence)
        }
    }
}

/// Iterates over [RawSentence]s read from a byte source.
/// Created using [read_sentences].
pub struct SentenceReader<R>
where
    R: Read + Send,
{
    reader: R,
    framer: LineFramer,
    ready: Sentences,
    buf: Vec<u8>,
    done: bool,
}

impl<R> SentenceReader<R>
where
    R: Read + Send,
{
    pub fn new(reader: R, framer: LineFramer) -> Self {
        let buf = vec![0u8; framer.capacity().max(1)];
        SentenceReader {
            reader,
            framer,
            ready: Sentences::default(),
            buf,
            done: false,
        }
    }
}

impl<R> Iterator for SentenceReader<R>
where
    R: Read + Send,
{
    type Item = Result<RawSentence>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(zult) = self.ready.next() {
                return Some(zult.map_err(Error::Framing));
            }
            if self.done {
                return None;
            }
            match self.reader.read(&mut self.buf) {
                Ok(0) => {
                    self.done = true;
                    let sentence = self.framer.finish();
                    if sentence.is_some() {
                        debug!("unterminated line at end of stream");
                    }
                    return sentence.map(Ok);
                }
                Ok(n) => self.ready = self.framer.feed(&self.buf[..n]),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                // Let the consumer decide, e.g., a read timeout from a silent device
                Err(err) => return Some(Err(Error::Io(err))),
            }
        }
    }
}

/// Creates an iterator that produces the lines read from `reader`.
///
/// Reads are made in chunks of up to [DEFAULT_CAPACITY] bytes and may end anywhere
/// within a line. A final unterminated line at end of stream is produced as well.
///
/// # Errors
/// [Error::Framing] in place of a line that exceeds the buffer; iteration may continue. Any read error other than [ErrorKind::Interrupted] is passed
/// on as [Error::Io].
///
/// # Example
/// ```
/// let data: &[u8] = b"!AIVDM,1,1,,A,1,0*17\r\n!AIVDM,1,1,,B,,0*25\r\n";
/// let lines: Vec<_> = ais::read_sentences(data).filter_map(Result::ok).collect();
/// assert_eq!(lines.len(), 2);
/// ```
pub fn read_sentences<R>(reader: R) -> SentenceReader<R>
where
    R: Read + Send,
{
    SentenceReader::new(reader, LineFramer::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    /// Reader handing out at most `chunk` bytes per read.
    struct Chunked<'a> {
        data: &'a [u8],
        chunk: usize,
        interrupt: bool,
    }

    impl Read for Chunked<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.interrupt {
                self.interrupt = false;
                return Err(io::Error::from(ErrorKind::Interrupted));
            }
            let n = self.chunk.min(buf.len()).min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    fn lines(framer: &mut LineFramer, bytes: &[u8]) -> Vec<RawSentence> {
        framer.feed(bytes).map(|zult| zult.unwrap()).collect()
    }

    #[test]
    fn split_feed_produces_single_sentence() {
        let mut framer = LineFramer::new();

        assert!(lines(&mut framer, b"!AIVDM,1,1,,B,x").is_empty());
        assert_eq!(framer.buffered(), 15);

        let second = lines(&mut framer, b"yz,0*4E\n");
        assert_eq!(second, vec![RawSentence::from("!AIVDM,1,1,,B,xyz,0*4E")]);
        assert_eq!(framer.buffered(), 0);
    }

    #[test]
    fn keeps_remainder_after_last_newline() {
        let mut framer = LineFramer::new();

        let got = lines(&mut framer, b"!A\r\n!B\r\n!C");
        assert_eq!(got, vec![RawSentence::from("!A"), RawSentence::from("!B")]);
        assert_eq!(framer.buffered(), 2);

        let got = lines(&mut framer, b"\r\n");
        assert_eq!(got, vec![RawSentence::from("!C")]);
    }

    #[test]
    fn skips_blank_lines() {
        let mut framer = LineFramer::new();
        let got = lines(&mut framer, b"\r\n\n!A\r\n\r\n");
        assert_eq!(got, vec![RawSentence::from("!A")]);
    }

    #[test]
    fn sentences_can_be_restarted() {
        let mut framer = LineFramer::new();
        let sentences = framer.feed(b"!A\n!B\n");

        let again = sentences.clone();
        assert_eq!(sentences.count(), 2);
        assert_eq!(again.count(), 2);
        // but the framer itself never hands them out twice
        assert_eq!(framer.feed(b"").count(), 0);
    }

    #[test]
    fn overflow_without_newline_resets_buffer() {
        let mut framer = LineFramer::with_capacity(8);

        assert_eq!(framer.feed(b"!AIVDM").count(), 0);
        let got: Vec<_> = framer.feed(b",1,1,").collect();
        assert_eq!(
            got,
            vec![Err(FramingError::Overflow {
                len: 11,
                capacity: 8
            })]
        );
        assert_eq!(framer.buffered(), 0);

        // the rest of the long line is dropped, then framing resumes
        assert!(lines(&mut framer, b"1,,A").is_empty());
        assert_eq!(framer.buffered(), 0);
        assert_eq!(lines(&mut framer, b"*17\n!A\n"), vec![RawSentence::from("!A")]);
    }

    #[test]
    fn remainder_after_newline_is_bounded() {
        let mut framer = LineFramer::with_capacity(16);
        let mut data = b"!A\n".to_vec();
        data.extend_from_slice(&[b'x'; 100]);

        let got: Vec<_> = framer.feed(&data).collect();
        assert_eq!(
            got,
            vec![
                Ok(RawSentence::from("!A")),
                Err(FramingError::Overflow {
                    len: 100,
                    capacity: 16
                }),
            ]
        );
        assert_eq!(framer.buffered(), 0);

        assert!(lines(&mut framer, b"\n").is_empty());
        assert_eq!(lines(&mut framer, b"!B\n"), vec![RawSentence::from("!B")]);
    }

    #[test]
    fn complete_long_line_is_dropped_in_place() {
        let mut framer = LineFramer::with_capacity(16);
        let long = [b'x'; 40];
        let mut data = b"!A\n".to_vec();
        data.extend_from_slice(&long);
        data.extend_from_slice(b"\n!B\n");

        let got: Vec<_> = framer.feed(&data).collect();
        assert_eq!(
            got,
            vec![
                Ok(RawSentence::from("!A")),
                Err(FramingError::Overflow {
                    len: 40,
                    capacity: 16
                }),
                Ok(RawSentence::from("!B")),
            ]
        );

        // same outcome when the long line arrives in pieces
        let mut framer = LineFramer::with_capacity(16);
        let got: Vec<_> = data
            .chunks(20)
            .flat_map(|chunk| framer.feed(chunk))
            .map(|zult| zult.ok())
            .collect();
        assert_eq!(
            got,
            vec![Some(RawSentence::from("!A")), None, Some(RawSentence::from("!B"))]
        );
    }

    #[test]
    fn exactly_capacity_is_retained() {
        let mut framer = LineFramer::with_capacity(4);
        assert_eq!(framer.feed(b"!ABC").count(), 0);
        assert_eq!(framer.buffered(), 4);
        assert_eq!(lines(&mut framer, b"\n"), vec![RawSentence::from("!ABC")]);
    }

    #[test]
    fn reset_clears_discarding() {
        let mut framer = LineFramer::with_capacity(4);
        assert_eq!(framer.feed(b"!ABCDEF").count(), 1);
        framer.reset();
        assert_eq!(lines(&mut framer, b"!A\n"), vec![RawSentence::from("!A")]);
    }

    #[test]
    fn to_line_appends_crlf() {
        let sentence = RawSentence::from("!AIVDM\r\n");
        assert_eq!(sentence.as_bytes(), b"!AIVDM");
        assert_eq!(sentence.to_line(), b"!AIVDM\r\n");
    }

    #[test]
    fn read_sentences_over_small_chunks() {
        let data = b"!AIVDM,1,1,,A,1,0*17\r\n!AIVDM,1,1,,B,,0*25\r\n!AIVDM";
        let reader = Chunked {
            data,
            chunk: 3,
            interrupt: true,
        };

        let got: Vec<RawSentence> = SentenceReader::new(reader, LineFramer::new())
            .map(|zult| zult.unwrap())
            .collect();

        assert_eq!(
            got,
            vec![
                RawSentence::from("!AIVDM,1,1,,A,1,0*17"),
                RawSentence::from("!AIVDM,1,1,,B,,0*25"),
                RawSentence::from("!AIVDM"),
            ]
        );
    }

    #[test]
    fn read_sentences_reports_overflow_and_continues() {
        let data = b"0123456789abcdef\n!A\n";
        let reader = Chunked {
            data,
            chunk: 5,
            interrupt: false,
        };
        let mut iter = SentenceReader::new(reader, LineFramer::with_capacity(8));

        assert!(matches!(
            iter.next(),
            Some(Err(Error::Framing(FramingError::Overflow { .. })))
        ));
        let rest: Vec<RawSentence> = iter.map(|zult| zult.unwrap()).collect();
        assert_eq!(rest, vec![RawSentence::from("!A")]);
    }
}
