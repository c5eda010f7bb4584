//! Byte stream to decoded message processing.
//!
//! A [Pipeline] chains the [LineFramer], sentence validation, armor decoding and the
//! [FieldTable]. Bad sentences are logged and counted, never fatal, so one pipeline can
//! run for the life of a receiver connection.
use std::io::Read;

use tracing::{debug, trace, warn};

use crate::framing::{LineFramer, RawSentence, SentenceReader};
use crate::message::{DecodeError, DecodedMessage, FieldTable};
use crate::sentence::{validate, Header};
use crate::{Error, Result};

/// Outcome of running one validated sentence through the pipeline.
///
/// `sentence` is valid for relaying regardless of whether `message` decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub sentence: RawSentence,
    pub header: Header,
    pub message: std::result::Result<DecodedMessage, DecodeError>,
}

impl Report {
    #[must_use]
    pub fn is_decoded(&self) -> bool {
        self.message.is_ok()
    }
}

/// Running counts of what a pipeline has seen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PipelineStats {
    /// Complete lines taken from the framer.
    pub sentences: usize,
    /// Lines that validated and unarmored.
    pub valid: usize,
    /// Lines that were not AIS sentences.
    pub ignored: usize,
    /// Lines that failed validation or unarmoring.
    pub invalid: usize,
    /// Times the framer dropped an over-long line.
    pub overflows: usize,
    pub decoded: usize,
    pub unsupported: usize,
    /// Payloads too short for their layout, including those too short for a type.
    pub truncated: usize,
}

impl PipelineStats {
    /// Count the outcome of processing one complete line.
    pub fn record(&mut self, outcome: &Result<Report>) {
        self.sentences += 1;
        let report = match outcome {
            Ok(report) => report,
            Err(Error::Sentence(err)) if err.is_ignorable() => {
                self.ignored += 1;
                return;
            }
            Err(_) => {
                self.invalid += 1;
                return;
            }
        };

        self.valid += 1;
        match &report.message {
            Ok(_) => self.decoded += 1,
            Err(err) if err.is_unsupported() => self.unsupported += 1,
            Err(_) => self.truncated += 1,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Stage {
    table: FieldTable,
    stats: PipelineStats,
}

impl Stage {
    fn process(&self, sentence: RawSentence) -> Result<Report> {
        let envelope = validate(&sentence)?;
        let header = envelope.header;
        let payload = envelope.decode_payload()?;
        let message = self.table.decode(&payload);
        Ok(Report {
            sentence,
            header,
            message,
        })
    }

    fn accept(&mut self, sentence: RawSentence) -> Option<Report> {
        let outcome = self.process(sentence);
        self.stats.record(&outcome);
        match outcome {
            Ok(report) => {
                match &report.message {
                    Ok(msg) => trace!(message_type = msg.message_type, "decoded {}", msg.name),
                    Err(err) if err.is_unsupported() => {
                        debug!(message_type = err.message_type(), "unsupported message type");
                    }
                    Err(err) => {
                        debug!(error = %err, fragment = report.header.fragment_index, "undecodable payload");
                    }
                }
                Some(report)
            }
            Err(Error::Sentence(err)) if err.is_ignorable() => {
                trace!(error = %err, "ignoring sentence");
                None
            }
            Err(err) => {
                warn!(error = %err, "dropping sentence");
                None
            }
        }
    }

    fn overflow(&mut self, err: &Error) {
        self.stats.overflows += 1;
        warn!(error = %err, "dropping over-long line");
    }
}

/// Push-driven sentence decoder.
///
/// # Example
/// ```
/// use ais::Pipeline;
///
/// let mut pipeline = Pipeline::new();
/// assert!(pipeline.push(b"!AIVDM,1,1,,B,15NPOOPP00o?b=bD5N").is_empty());
///
/// let reports = pipeline.push(b"5oOj2D0000,0*64\r\n");
/// let msg = reports[0].message.as_ref().unwrap();
/// assert_eq!(msg.get("mmsi"), Some(367533950));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    framer: LineFramer,
    stage: Stage,
}

impl Pipeline {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Maximum unterminated line length; see [LineFramer::with_capacity].
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.framer = LineFramer::with_capacity(capacity);
        self
    }

    /// Decode messages with `table` rather than [FieldTable::standard].
    #[must_use]
    pub fn with_field_table(mut self, table: FieldTable) -> Self {
        self.stage.table = table;
        self
    }

    #[must_use]
    pub fn stats(&self) -> &PipelineStats {
        &self.stage.stats
    }

    /// Validate and decode a single sentence. Does not touch the framer or statistics.
    ///
    /// # Errors
    /// [Error::Sentence] if validation fails and [Error::Armor] if the payload cannot be
    /// unarmored. Message decode failures are reported in [Report::message].
    pub fn process(&self, sentence: RawSentence) -> Result<Report> {
        self.stage.process(sentence)
    }

    /// Feed received bytes and return a report for each valid sentence they complete.
    ///
    /// Lines that overflow the line buffer are logged, counted in
    /// [PipelineStats::overflows] and skipped.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Report> {
        let mut reports = Vec::new();
        for line in self.framer.feed(bytes) {
            match line {
                Ok(sentence) => reports.extend(self.stage.accept(sentence)),
                Err(err) => self.stage.overflow(&Error::Framing(err)),
            }
        }
        reports
    }

    /// Process any unterminated line left in the framer, e.g., at end of stream.
    pub fn finish(&mut self) -> Option<Report> {
        let sentence = self.framer.finish()?;
        self.stage.accept(sentence)
    }

    /// Consume this pipeline, decoding sentences read from `reader`.
    pub fn start<R>(self, reader: R) -> Reports<R>
    where
        R: Read + Send,
    {
        Reports {
            sentences: SentenceReader::new(reader, self.framer),
            stage: self.stage,
        }
    }
}

/// Iterates over [Report]s for sentences read from a byte source.
/// Created using [Pipeline::start] or [decode_sentences].
pub struct Reports<R>
where
    R: Read + Send,
{
    sentences: SentenceReader<R>,
    stage: Stage,
}

impl<R> Reports<R>
where
    R: Read + Send,
{
    #[must_use]
    pub fn stats(&self) -> &PipelineStats {
        &self.stage.stats
    }
}

impl<R> Iterator for Reports<R>
where
    R: Read + Send,
{
    type Item = Result<Report>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.sentences.next()? {
                Ok(sentence) => {
                    if let Some(report) = self.stage.accept(sentence) {
                        return Some(Ok(report));
                    }
                }
                Err(err) => {
                    if matches!(err, Error::Framing(_)) {
                        self.stage.overflow(&err);
                    }
                    return Some(Err(err));
                }
            }
        }
    }
}

/// Decode every AIS sentence read from `reader` using the standard field table.
///
/// Invalid sentences are logged and skipped.
///
/// # Errors
/// Items are [Error::Framing] when a line overflows the buffer and [Error::Io] for read
/// errors; iteration may continue after either.
///
/// # Example
/// ```
/// let data: &[u8] = b"!AIVDM,1,1,,A,403OviQuMGCqWrRO9>E6fE700@GO,0*4D\r\n$GPGLL,,*00\r\n";
/// let reports: Vec<_> = ais::decode_sentences(data).filter_map(Result::ok).collect();
/// assert_eq!(reports.len(), 1);
/// assert_eq!(reports[0].message.as_ref().unwrap().get("year"), Some(2007));
/// ```
pub fn decode_sentences<R>(reader: R) -> Reports<R>
where
    R: Read + Send,
{
    Pipeline::new().start(reader)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sentence::{Channel, SentenceError};

    const POSITION_REPORT: &str = "!AIVDM,1,1,,B,15NPOOPP00o?b=bD5N5oOj2D0000,0*64";

    #[test]
    fn split_feed_emits_once() {
        let mut pipeline = Pipeline::new();

        let reports = pipeline.push(b"!AIVDM,1,1,,B,15NPOOPP00o");
        assert!(reports.is_empty());
        assert_eq!(pipeline.stats().sentences, 0);

        let reports = pipeline.push(b"?b=bD5N5oOj2D0000,0*64\r\n");
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].sentence.to_string(), POSITION_REPORT);
        assert_eq!(pipeline.stats().sentences, 1);
    }

    #[test]
    fn decodes_stream_and_counts() {
        let mut pipeline = Pipeline::new();
        let input = format!(
            "{POSITION_REPORT}\r\n\
             !AIVDM,1,1,,B,15NPOOPP00o?b=bD5N5oOj2D0000,0*4E\r\n\
             $GPGGA,1,1,,A,15NPOOPP00o?b=bD5N5oOj2D0000,0*66\r\n\
             !AIVDM,1,1,,A,15NPOOPP00o?b=bD5N5oOj2D000X,0*0F\r\n\
             !AIVDM,1,1,,B,15NPOOPP00o?b=bD5N5oOj,0*12\r\n\
             !AIVDM,2,1,1,A,55?MbV02;H;s<HtKR20EHE:0@T4@Dn2222222216L961O5Gf0NSQEp6ClRp8,0*1C\r\n\
             !AIVDM,1,1,,B,,0*25\r\n"
        );

        let reports = pipeline.push(input.as_bytes());

        assert_eq!(reports.len(), 4);
        assert_eq!(reports[0].sentence.to_string(), POSITION_REPORT);
        assert_eq!(reports[0].header.channel, Channel::B);
        assert_eq!(
            reports[0].message.as_ref().unwrap().get("mmsi"),
            Some(367_533_950)
        );
        assert_eq!(reports[1].message, Err(DecodeError::Truncated(1)));
        assert_eq!(reports[2].message, Err(DecodeError::UnsupportedType(5)));
        assert_eq!(reports[3].message, Err(DecodeError::Empty));

        assert_eq!(
            *pipeline.stats(),
            PipelineStats {
                sentences: 7,
                valid: 4,
                ignored: 1,
                invalid: 2,
                overflows: 0,
                decoded: 1,
                unsupported: 1,
                truncated: 2,
            }
        );
    }

    #[test]
    fn process_reports_sentence_errors() {
        let pipeline = Pipeline::new();
        let err = pipeline
            .process(RawSentence::from(
                "!AIVDM,1,1,,B,15NPOOPP00o?b=bD5N5oOj2D0000,0*4E",
            ))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Sentence(SentenceError::ChecksumMismatch { .. })
        ));

        let err = pipeline
            .process(RawSentence::from(
                "!AIVDM,1,1,,A,15NPOOPP00o?b=bD5N5oOj2D000X,0*0F",
            ))
            .unwrap_err();
        assert!(matches!(err, Error::Armor(_)), "{err:?}");
    }

    #[test]
    fn overflow_is_counted_and_recoverable() {
        let mut pipeline = Pipeline::new().with_capacity(24);

        assert!(pipeline.push(&[b'x'; 32]).is_empty());
        assert_eq!(pipeline.stats().overflows, 1);

        let reports = pipeline.push(format!("\n{POSITION_REPORT}\n").as_bytes());
        assert!(reports.is_empty());
        assert_eq!(pipeline.stats().overflows, 2);

        let reports = pipeline.push(b"!AIVDM,1,1,,A,1,0*17\n");
        assert_eq!(reports.len(), 1);
        assert_eq!(pipeline.stats().sentences, 1);
    }

    #[test]
    fn finish_processes_unterminated_sentence() {
        let mut pipeline = Pipeline::new();
        assert!(pipeline.push(POSITION_REPORT.as_bytes()).is_empty());
        let report = pipeline.finish().unwrap();
        assert!(report.is_decoded());
        assert!(pipeline.finish().is_none());
    }

    #[test]
    fn custom_field_table() {
        let mut pipeline = Pipeline::new().with_field_table(FieldTable::empty());
        let reports = pipeline.push(format!("{POSITION_REPORT}\n").as_bytes());
        assert_eq!(reports[0].message, Err(DecodeError::UnsupportedType(1)));
        assert_eq!(pipeline.stats().unsupported, 1);
    }

    #[test]
    fn reader_driven_reports() {
        let data = format!("garbage\r\n{POSITION_REPORT}\r\n!AIVDM,2,2,1,A,88888888880,2*25");
        let mut reports = decode_sentences(data.as_bytes());

        let report = reports.next().unwrap().unwrap();
        assert!(report.is_decoded());
        let report = reports.next().unwrap().unwrap();
        assert_eq!(report.header.fragment_index, 2);
        assert_eq!(report.message, Err(DecodeError::UnsupportedType(8)));
        assert!(reports.next().is_none());

        let stats = reports.stats();
        assert_eq!(stats.sentences, 3);
        assert_eq!(stats.invalid, 1);
        assert_eq!(stats.valid, 2);
    }
}
