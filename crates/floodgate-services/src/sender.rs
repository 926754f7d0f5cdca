//! Sender collaborators.
//!
//! `WriterSender` writes one command per line to any `io::Write`.
//! `MpscSender` hands commands to another task, typically the one that owns
//! the connection's write half.

use std::io::{self, Write};

use tokio::sync::mpsc;

use floodgate_core::{SendError, Sender};

pub struct WriterSender<W> {
    writer: W,
    line_ending: &'static str,
}

impl<W: Write> WriterSender<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            line_ending: "\n",
        }
    }

    /// IRC servers expect `"\r\n"`.
    pub fn with_line_ending(mut self, line_ending: &'static str) -> Self {
        self.line_ending = line_ending;
        self
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write, P: AsRef<str>> Sender<P> for WriterSender<W> {
    fn send(&mut self, payload: &P) -> Result<(), SendError> {
        let line = payload.as_ref();
        if line.contains(&['\r', '\n'][..]) {
            return Err(SendError::Rejected("command contains a line break".into()));
        }
        self.writer
            .write_all(line.as_bytes())
            .and_then(|()| self.writer.write_all(self.line_ending.as_bytes()))
            .and_then(|()| self.writer.flush())
            .map_err(|e| match e.kind() {
                io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset => {
                    SendError::Disconnected
                }
                _ => SendError::Io(e),
            })
    }
}

pub struct MpscSender<P> {
    tx: mpsc::UnboundedSender<P>,
}

impl<P> MpscSender<P> {
    pub fn new(tx: mpsc::UnboundedSender<P>) -> Self {
        Self { tx }
    }

    /// Sender plus the receiving end for the writer task.
    pub fn pair() -> (Self, mpsc::UnboundedReceiver<P>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl<P: Clone> Sender<P> for MpscSender<P> {
    fn send(&mut self, payload: &P) -> Result<(), SendError> {
        self.tx
            .send(payload.clone())
            .map_err(|_| SendError::Disconnected)
    }
}
