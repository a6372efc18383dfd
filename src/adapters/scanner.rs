//! Barcode scanner input.
//!
//! The scanner behaves like a keyboard: each barcode arrives as a run of
//! characters terminated by CR and/or LF.  A 0x03 byte (Ctrl+C in raw
//! terminal mode) requests shutdown.  End of input stops the reader only.

use std::io::{ErrorKind, Read};
use std::thread::{self, JoinHandle};

use heapless::Vec as HVec;
use log::{debug, info, warn};

use crate::events::{Event, EventSender, ShutdownReason};

/// Longest accepted scan line.  Longer lines are discarded whole.
pub const MAX_LINE: usize = 128;

const ETX: u8 = 0x03;

/// What a decoded byte completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanInput {
    /// One complete, non-empty line (not yet trimmed).
    Line(String),
    /// The operator pressed Ctrl+C.
    Interrupt,
}

/// Byte-at-a-time line assembler.
#[derive(Debug, Default)]
pub struct ScanLineDecoder {
    buf: HVec<u8, MAX_LINE>,
    overflowed: bool,
}

impl ScanLineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, byte: u8) -> Option<ScanInput> {
        match byte {
            ETX => {
                self.reset();
                Some(ScanInput::Interrupt)
            }
            b'\r' | b'\n' => self.finish(),
            _ => {
                if !self.overflowed && self.buf.push(byte).is_err() {
                    warn!("SCANNER: line longer than {} bytes discarded", MAX_LINE);
                    self.overflowed = true;
                }
                None
            }
        }
    }

    fn finish(&mut self) -> Option<ScanInput> {
        let line = if self.overflowed || self.buf.is_empty() {
            None
        } else {
            Some(ScanInput::Line(
                String::from_utf8_lossy(&self.buf).into_owned(),
            ))
        };
        self.reset();
        line
    }

    fn reset(&mut self) {
        self.buf.clear();
        self.overflowed = false;
    }
}

/// Read scans from `input` on a background thread.
///
/// The thread is not joined at shutdown: a blocking read on stdin cannot be
/// interrupted, and the process exits around it.
pub fn spawn_reader<R>(input: R, events: EventSender) -> std::io::Result<JoinHandle<()>>
where
    R: Read + Send + 'static,
{
    thread::Builder::new()
        .name("scanner".into())
        .spawn(move || read_scans(input, &events))
}

fn read_scans<R: Read>(mut input: R, events: &EventSender) {
    let mut decoder = ScanLineDecoder::new();
    let mut chunk = [0u8; 64];
    loop {
        let n = match input.read(&mut chunk) {
            Ok(0) => {
                info!("SCANNER: input closed");
                break;
            }
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!("SCANNER: read failed: {}", e);
                break;
            }
        };
        for &byte in &chunk[..n] {
            let event = match decoder.feed(byte) {
                Some(ScanInput::Line(line)) => Event::Scan(line),
                Some(ScanInput::Interrupt) => Event::Shutdown(ShutdownReason::Console),
                None => continue,
            };
            if !events.post(event) {
                debug!("SCANNER: queue closed, stopping");
                return;
            }
        }
    }
}
