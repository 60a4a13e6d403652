//! The line protocol the harness streams results over.
//!
//! For every identifier the harness sends
//!
//! ```text
//! <identifier>
//! <body line>
//! ...
//! ---
//! ```
//!
//! and once everything is processed it sends a blank line followed by `OK`.
//! Bodies may contain blank lines, only the exact control lines are special.

/// Line ending the session
pub const SENTINEL: &'static str = "OK";

/// Line ending one identifier's frame
pub const BOUNDARY: &'static str = "---";

/// A raw line tagged with what it means given the current frame state
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Line<'a> {
    Identifier(&'a str),
    Body(&'a str),
    Boundary,
    Sentinel,
    /// A blank line between frames, carries nothing
    Blank,
}

/// Turns raw lines into [Line]s.
///
/// Control lines are compared after trimming surrounding whitespace, body
/// lines are passed through untouched.
pub struct LineClassifier;

impl LineClassifier {
    pub fn classify(line: &str, frame_open: bool) -> Line<'_> {
        let trimmed = line.trim();
        if trimmed == SENTINEL {
            return Line::Sentinel;
        }
        if trimmed == BOUNDARY {
            return Line::Boundary;
        }
        if frame_open {
            Line::Body(line)
        } else if trimmed.is_empty() {
            Line::Blank
        } else {
            Line::Identifier(trimmed)
        }
    }
}

/// One identifier's result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub identifier: String,
    pub body: Vec<String>,
}

impl Frame {
    fn new(identifier: &str) -> Self {
        Self {
            identifier: identifier.into(),
            body: Vec::new(),
        }
    }

    /// The body lines joined back together
    pub fn text(&self) -> String {
        self.body.join("\n")
    }
}

/// What feeding a line into the [FrameAssembler] produced
#[derive(Debug, PartialEq, Eq)]
pub enum Event {
    /// A boundary closed a frame
    Frame(Frame),
    /// The session is over. A frame that was still open is handed back since
    /// it never saw its boundary.
    Sentinel { discarded: Option<Frame> },
    /// The line didn't fit the protocol and was dropped
    Violation(String),
}

/// Frame state machine, `AwaitingIdentifier` when no frame is open and
/// `AccumulatingBody` otherwise
#[derive(Default)]
pub struct FrameAssembler {
    current: Option<Frame>,
    finished: bool,
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_awaiting_identifier(&self) -> bool {
        self.current.is_none()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Feed one line, without its line terminator
    pub fn feed(&mut self, raw: &str) -> Option<Event> {
        if self.finished {
            return Some(Event::Violation(format!(
                "data after the session ended: {:?}",
                raw
            )));
        }

        match LineClassifier::classify(raw, self.current.is_some()) {
            Line::Sentinel => {
                self.finished = true;
                Some(Event::Sentinel {
                    discarded: self.current.take(),
                })
            }
            Line::Boundary => match self.current.take() {
                Some(frame) => Some(Event::Frame(frame)),
                None => Some(Event::Violation(String::from(
                    "boundary marker without an identifier",
                ))),
            },
            Line::Identifier(id) => {
                self.current = Some(Frame::new(id));
                None
            }
            Line::Body(line) => {
                if let Some(frame) = self.current.as_mut() {
                    frame.body.push(line.into());
                }
                None
            }
            Line::Blank => None,
        }
    }

    /// The stream ended, hand back whatever frame was still open
    pub fn finish(&mut self) -> Option<Frame> {
        self.finished = true;
        self.current.take()
    }
}
