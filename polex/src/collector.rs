use std::collections::HashSet;
use std::io::{BufRead, BufReader, ErrorKind};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::extraction::LaunchOutcome;
use crate::output::OutputWriter;
use crate::package::CleanupReport;
use crate::protocol::{Event, Frame, FrameAssembler};
use crate::settings::CollectorSettings;
use crate::utils::path_must_str;

const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long the collector waits for the harness. `None` waits forever.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timeouts {
    /// Until the harness connects
    pub accept: Option<Duration>,
    /// Between two reads once connected
    pub idle: Option<Duration>,
}

impl From<&CollectorSettings> for Timeouts {
    fn from(value: &CollectorSettings) -> Self {
        Self {
            accept: value.accept_timeout,
            idle: value.idle_timeout,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WrittenFile {
    pub identifier: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedFrame {
    pub identifier: String,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EndReason {
    /// The harness sent `OK`
    Sentinel,
    /// The connection closed before `OK`
    StreamClosed,
    /// The harness never connected, or went quiet for longer than the idle
    /// timeout
    TimedOut,
}

/// Everything that happened during one collector session
#[derive(Debug, Serialize)]
pub struct SessionSummary {
    pub peer: Option<String>,
    pub written: Vec<WrittenFile>,
    pub failed: Vec<FailedFrame>,
    pub violations: Vec<String>,
    /// Expected identifiers that never produced a frame
    pub missing: Vec<String>,
    pub end: EndReason,
    pub launcher: Option<LaunchOutcome>,
    pub cleanup: Option<CleanupReport>,
}

impl SessionSummary {
    fn new(peer: Option<SocketAddr>) -> Self {
        Self {
            peer: peer.map(|it| it.to_string()),
            written: Vec::new(),
            failed: Vec::new(),
            violations: Vec::new(),
            missing: Vec::new(),
            end: EndReason::StreamClosed,
            launcher: None,
            cleanup: None,
        }
    }

    /// True if the harness finished cleanly and every expected identifier
    /// was written
    pub fn is_complete(&self) -> bool {
        self.end == EndReason::Sentinel
            && self.failed.is_empty()
            && self.violations.is_empty()
            && self.missing.is_empty()
    }

    fn violation(&mut self, err: crate::Error) {
        log::warn!("{}", err);
        self.violations.push(err.to_string());
    }

    /// Keep what was collected so far and mark the session as timed out
    fn timed_out(&mut self, err: crate::Error) {
        log::warn!("{}, keeping {} result(s)", err, self.written.len());
        self.end = EndReason::TimedOut;
    }

    fn fill_missing(&mut self, expected: Option<&HashSet<String>>) {
        if let Some(expected) = expected {
            let mut missing = expected
                .iter()
                .filter(|it| !self.seen(it))
                .cloned()
                .collect::<Vec<String>>();
            missing.sort();
            self.missing = missing;
        }
    }

    fn seen(&self, identifier: &str) -> bool {
        self.written.iter().any(|it| it.identifier == identifier)
            || self.failed.iter().any(|it| it.identifier == identifier)
    }
}

/// Receives the harness results over TCP and writes them out.
///
/// A collector serves exactly one connection. The listener is bound on
/// construction so the port is open before the harness is launched, and
/// both sockets are closed when [ResultCollector::collect] returns.
pub struct ResultCollector {
    listener: TcpListener,
    writer: OutputWriter,
    timeouts: Timeouts,
    expected: Option<HashSet<String>>,
}

impl ResultCollector {
    pub fn bind<A: ToSocketAddrs>(
        addr: A,
        writer: OutputWriter,
        timeouts: Timeouts,
    ) -> crate::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        log::info!("result collector listening on {}", listener.local_addr()?);
        Ok(Self {
            listener,
            writer,
            timeouts,
            expected: None,
        })
    }

    /// Only accept frames for these identifiers, anything else is a protocol
    /// violation
    pub fn expecting<I, S>(mut self, identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expected = Some(identifiers.into_iter().map(Into::into).collect());
        self
    }

    pub fn local_addr(&self) -> crate::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept the harness connection and write a file for every frame until
    /// the sentinel or the end of the stream.
    ///
    /// Failing to write one identifier is recorded in the summary and the
    /// session continues. A timeout ends the session with
    /// [EndReason::TimedOut] and keeps everything written until then.
    pub fn collect(self) -> crate::Result<SessionSummary> {
        let (stream, peer) = match self.accept() {
            Ok(conn) => conn,
            Err(e @ crate::Error::Timeout(_)) => {
                let mut summary = SessionSummary::new(None);
                summary.timed_out(e);
                summary.fill_missing(self.expected.as_ref());
                return Ok(summary);
            }
            Err(e) => return Err(e),
        };
        log::info!("harness connected from {}", peer);
        stream.set_read_timeout(self.timeouts.idle)?;

        let mut summary = SessionSummary::new(Some(peer));
        let res = demux(
            BufReader::new(&stream),
            &self.writer,
            self.expected.as_ref(),
            &mut summary,
        );

        if let Err(e) = stream.shutdown(Shutdown::Both) {
            log::debug!("shutting down harness connection: {}", e);
        }
        log::info!("closing result collector");
        res?;

        summary.fill_missing(self.expected.as_ref());
        Ok(summary)
    }

    fn accept(&self) -> crate::Result<(TcpStream, SocketAddr)> {
        let timeout = match self.timeouts.accept {
            None => return Ok(self.listener.accept()?),
            Some(v) => v,
        };

        self.listener.set_nonblocking(true)?;
        let started = Instant::now();
        let (stream, peer) = loop {
            match self.listener.accept() {
                Ok(conn) => break conn,
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    if started.elapsed() >= timeout {
                        return Err(crate::Error::Timeout("a connection from the harness"));
                    }
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        };
        stream.set_nonblocking(false)?;
        Ok((stream, peer))
    }
}

fn is_timeout(kind: ErrorKind) -> bool {
    matches!(kind, ErrorKind::WouldBlock | ErrorKind::TimedOut)
}

fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

/// Feed the stream through a [FrameAssembler] and write every frame.
///
/// `summary.end` is set to how the stream ended. Only read errors other than
/// a timeout are returned.
fn demux<R: BufRead>(
    mut reader: R,
    writer: &OutputWriter,
    expected: Option<&HashSet<String>>,
    summary: &mut SessionSummary,
) -> crate::Result<()> {
    let mut assembler = FrameAssembler::new();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let n = match reader.read_until(b'\n', &mut buf) {
            Ok(n) => n,
            Err(e) if is_timeout(e.kind()) => {
                summary.timed_out(crate::Error::Timeout("data from the harness"));
                return Ok(());
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };

        if n == 0 {
            if let Some(frame) = assembler.finish() {
                summary.violation(crate::Error::Protocol(format!(
                    "stream closed inside the frame for {}, discarding {} line(s)",
                    frame.identifier,
                    frame.body.len()
                )));
            }
            log::warn!("harness closed the connection without sending the sentinel");
            summary.end = EndReason::StreamClosed;
            return Ok(());
        }

        let line = decode_line(&buf);
        log::trace!("harness: {}", line);

        match assembler.feed(&line) {
            Some(Event::Frame(frame)) => handle_frame(frame, writer, expected, summary),
            Some(Event::Sentinel { discarded }) => {
                if let Some(frame) = discarded {
                    summary.violation(crate::Error::Protocol(format!(
                        "sentinel inside the frame for {}, discarding {} line(s)",
                        frame.identifier,
                        frame.body.len()
                    )));
                }
                log::info!("harness sent the sentinel");
                summary.end = EndReason::Sentinel;
                return Ok(());
            }
            Some(Event::Violation(msg)) => summary.violation(crate::Error::Protocol(msg)),
            None => {}
        }
    }
}

fn handle_frame(
    frame: Frame,
    writer: &OutputWriter,
    expected: Option<&HashSet<String>>,
    summary: &mut SessionSummary,
) {
    if let Some(expected) = expected {
        if !expected.contains(&frame.identifier) {
            summary.violation(crate::Error::Protocol(format!(
                "frame for unexpected identifier {:?}, discarding {} line(s)",
                frame.identifier,
                frame.body.len()
            )));
            return;
        }
    }

    if summary.seen(&frame.identifier) {
        log::warn!("{} was sent more than once", frame.identifier);
    }

    match writer.write(&frame.identifier, &frame.body) {
        Ok(path) => {
            log::info!("{} -> {}", frame.identifier, path_must_str(&path));
            summary.written.push(WrittenFile {
                identifier: frame.identifier,
                path,
            });
        }
        Err(e) => {
            log::error!("failed to write result for {}: {}", frame.identifier, e);
            summary.failed.push(FailedFrame {
                identifier: frame.identifier,
                reason: e.to_string(),
            });
        }
    }
}
