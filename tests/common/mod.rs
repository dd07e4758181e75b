#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};

use spinserve::poll::{PollOutcome, Pollable};

/// One scripted outcome of a read call.
pub enum Step {
    Data(Vec<u8>),
    WouldBlock,
    Fail(io::ErrorKind),
}

/// In-memory non-blocking transport.
///
/// Reads replay the script; once it is exhausted, reads return EOF (or
/// `WouldBlock` forever when `hold_open` is set). Everything written is
/// appended to a shared buffer the test can inspect afterwards.
pub struct ScriptedTransport {
    script: VecDeque<Step>,
    hold_open: bool,
    written: Arc<Mutex<Vec<u8>>>,
    /// Bytes accepted per write call.
    write_limit: usize,
    write_error: Option<io::ErrorKind>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<Step>) -> (Self, Arc<Mutex<Vec<u8>>>) {
        let written = Arc::new(Mutex::new(Vec::new()));
        let transport = Self {
            script: script.into(),
            hold_open: false,
            written: written.clone(),
            write_limit: usize::MAX,
            write_error: None,
        };
        (transport, written)
    }

    /// Convenience for a script that delivers `chunks` with a `WouldBlock`
    /// between each one.
    pub fn chunked(chunks: &[&[u8]]) -> (Self, Arc<Mutex<Vec<u8>>>) {
        let mut script = Vec::new();
        for chunk in chunks {
            script.push(Step::Data(chunk.to_vec()));
            script.push(Step::WouldBlock);
        }
        Self::new(script)
    }

    pub fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    pub fn write_limit(mut self, limit: usize) -> Self {
        self.write_limit = limit;
        self
    }

    pub fn fail_writes(mut self, kind: io::ErrorKind) -> Self {
        self.write_error = Some(kind);
        self
    }
}

impl Read for ScriptedTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.script.pop_front() {
            Some(Step::Data(mut data)) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                if n < data.len() {
                    self.script.push_front(Step::Data(data.split_off(n)));
                }
                Ok(n)
            }
            Some(Step::WouldBlock) => Err(io::ErrorKind::WouldBlock.into()),
            Some(Step::Fail(kind)) => Err(kind.into()),
            None if self.hold_open => Err(io::ErrorKind::WouldBlock.into()),
            None => Ok(0),
        }
    }
}

impl Write for ScriptedTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Some(kind) = self.write_error {
            return Err(kind.into());
        }
        let n = buf.len().min(self.write_limit);
        self.written.lock().unwrap().extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Polls `task` until it finishes or `max_polls` is exhausted.
pub fn drive<P: Pollable>(task: &mut P, max_polls: usize) -> Option<Result<P::Item, P::Error>> {
    for _ in 0..max_polls {
        match task.poll() {
            Ok(PollOutcome::Ready(v)) => return Some(Ok(v)),
            Ok(PollOutcome::NotReady) => {}
            Err(e) => return Some(Err(e)),
        }
    }
    None
}

pub fn output(written: &Arc<Mutex<Vec<u8>>>) -> String {
    String::from_utf8_lossy(&written.lock().unwrap()).into_owned()
}
