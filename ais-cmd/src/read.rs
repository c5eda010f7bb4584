use std::{
    fs::{self, File, OpenOptions},
    io::{self, stdin, ErrorKind, Read, Write},
    net::UdpSocket,
    path::{Path, PathBuf},
    thread,
    time::Duration,
};

use ais::{read_sentences, sentence::validate, Error, RawSentence};
use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime, Timelike};
use crossbeam::channel::{bounded, Receiver, RecvTimeoutError};
use tracing::{debug, info, warn};

const CHUNK_SIZE: usize = 512;

/// Reads a device on a worker thread so that a device that goes silent can be detected.
///
/// If no data arrives within the idle timeout, `read` fails with [ErrorKind::TimedOut].
pub struct Watchdog {
    chunks: Receiver<io::Result<Vec<u8>>>,
    pending: Vec<u8>,
    pos: usize,
    timeout: Option<Duration>,
}

impl Watchdog {
    /// Start reading `reader`. A `timeout` of `None` waits forever.
    pub fn new<R>(mut reader: R, timeout: Option<Duration>) -> Result<Self>
    where
        R: Read + Send + 'static,
    {
        let (chunks_tx, chunks_rx) = bounded(16);
        thread::Builder::new()
            .name("device_reader".into())
            .spawn(move || {
                let mut buf = vec![0u8; CHUNK_SIZE];
                loop {
                    let zult = match reader.read(&mut buf) {
                        Ok(0) => break,
                        Ok(n) => Ok(buf[..n].to_vec()),
                        Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                        Err(err) => Err(err),
                    };
                    let failed = zult.is_err();
                    if chunks_tx.send(zult).is_err() || failed {
                        break;
                    }
                }
                debug!("device reader finished");
            })
            .context("spawning device reader")?;

        Ok(Watchdog {
            chunks: chunks_rx,
            pending: Vec::default(),
            pos: 0,
            timeout,
        })
    }

    fn next_chunk(&self) -> io::Result<Option<Vec<u8>>> {
        let zult = match self.timeout {
            Some(timeout) => self.chunks.recv_timeout(timeout),
            None => self
                .chunks
                .recv()
                .map_err(|_| RecvTimeoutError::Disconnected),
        };
        match zult {
            Ok(chunk) => chunk.map(Some),
            Err(RecvTimeoutError::Timeout) => Err(io::Error::new(
                ErrorKind::TimedOut,
                format!("no data from device for {:?}", self.timeout.unwrap_or_default()),
            )),
            Err(RecvTimeoutError::Disconnected) => Ok(None),
        }
    }
}

impl Read for Watchdog {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.pending.len() {
            let Some(chunk) = self.next_chunk()? else {
                return Ok(0);
            };
            self.pending = chunk;
            self.pos = 0;
        }
        let n = buf.len().min(self.pending.len() - self.pos);
        buf[..n].copy_from_slice(&self.pending[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// Appends sentences to `<dir>/YYYYMMDD/aisHH.log`, opening a new file each hour.
pub struct HourlyLog {
    dir: PathBuf,
    current: Option<(PathBuf, File)>,
}

impl HourlyLog {
    pub fn new(dir: &Path) -> Self {
        HourlyLog {
            dir: dir.to_path_buf(),
            current: None,
        }
    }

    pub fn path_for(&self, now: &NaiveDateTime) -> PathBuf {
        self.dir
            .join(now.format("%Y%m%d").to_string())
            .join(format!("ais{:02}.log", now.hour()))
    }

    pub fn write(&mut self, now: &NaiveDateTime, sentence: &RawSentence) -> Result<()> {
        let path = self.path_for(now);
        let mut file = match self.current.take() {
            Some((cur, file)) if cur == path => file,
            _ => {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)
                        .with_context(|| format!("creating log directory {parent:?}"))?;
                }
                debug!("logging to {path:?}");
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .with_context(|| format!("opening log {path:?}"))?
            }
        };

        // drop the leading '!'
        let data = sentence.as_bytes().get(1..).unwrap_or_default();
        let mut line = now.format("%H:%M:%S:").to_string().into_bytes();
        line.extend_from_slice(data);
        line.push(b'\n');
        file.write_all(&line).context("writing log")?;
        file.flush().context("flushing log")?;
        self.current = Some((path, file));
        Ok(())
    }
}

/// Forward every valid sentence from `reader` to the connected `socket`, returning the
/// number of sentences sent.
pub fn forward<R>(reader: R, socket: &UdpSocket, mut log: Option<&mut HourlyLog>) -> Result<usize>
where
    R: Read + Send,
{
    let mut sent = 0;
    for zult in read_sentences(reader) {
        let sentence = match zult {
            Ok(sentence) => sentence,
            Err(Error::Io(err)) => return Err(err).context("reading device"),
            Err(err) => {
                warn!(error = %err, "skipping input");
                continue;
            }
        };

        match validate(&sentence) {
            Ok(_) => {}
            Err(err) if err.is_ignorable() => {
                debug!(error = %err, "ignoring {sentence}");
                continue;
            }
            Err(err) => {
                warn!(error = %err, "invalid sentence {sentence}");
                continue;
            }
        }

        socket
            .send(&sentence.to_line())
            .context("sending datagram")?;
        sent += 1;

        if let Some(log) = log.as_deref_mut() {
            log.write(&Local::now().naive_local(), &sentence)?;
        }
    }
    Ok(sent)
}

/// Forward sentences from `device` to `dest` until end of input.
///
/// The device must already be configured for the receiver's line speed and raw mode.
/// Fails if nothing is read for `idle_timeout`, so a supervisor can restart it.
pub fn read(
    device: &Path,
    dest: &str,
    data_dir: Option<&Path>,
    idle_timeout: Option<Duration>,
) -> Result<()> {
    let reader: Box<dyn Read + Send> = if device == Path::new("-") {
        Box::new(stdin())
    } else {
        Box::new(File::open(device).with_context(|| format!("opening device {device:?}"))?)
    };
    let reader = Watchdog::new(reader, idle_timeout)?;

    let socket = UdpSocket::bind("0.0.0.0:0").context("binding udp socket")?;
    socket
        .connect(dest)
        .with_context(|| format!("connecting to {dest}"))?;

    let mut log = data_dir.map(HourlyLog::new);
    info!(?idle_timeout, "forwarding {device:?} to {dest}");

    let sent = forward(reader, &socket, log.as_mut())?;
    info!(sent, "end of input");
    Ok(())
}
