//! Byte-oriented I/O channels for a machine instance.

use std::cell::RefCell;
use std::io::{self, Read, Write};
use std::rc::Rc;

/// The input/output channel pair owned by one machine.
///
/// Reads and writes move a single byte at a time; a read that hits the end of
/// the stream (or any I/O error) reports `None` and the caller treats it as
/// an immediate halt.
pub struct Channels {
    input: Box<dyn Read>,
    output: Box<dyn Write>,
}

impl Channels {
    pub fn from_parts(input: impl Read + 'static, output: impl Write + 'static) -> Self {
        Self {
            input: Box::new(input),
            output: Box::new(output),
        }
    }

    /// Channels wired to the process's stdin and stdout.
    pub fn stdio() -> Self {
        Self::from_parts(io::stdin(), io::stdout())
    }

    /// Reads one byte, or `None` on stream exhaustion or failure.
    pub fn read_byte(&mut self) -> Option<u8> {
        let mut buf = [0u8; 1];
        loop {
            match self.input.read(&mut buf) {
                Ok(0) => return None,
                Ok(_) => return Some(buf[0]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) => return None,
            }
        }
    }

    pub fn write_byte(&mut self, byte: u8) -> io::Result<()> {
        self.output.write_all(&[byte])
    }

    pub fn flush(&mut self) {
        let _ = self.output.flush();
    }
}

impl Default for Channels {
    fn default() -> Self {
        Self::stdio()
    }
}

/// A cloneable output sink that keeps what was written, for embedding a
/// machine and reading its output back afterwards.
#[derive(Clone, Default)]
pub struct SharedSink(Rc<RefCell<Vec<u8>>>);

impl SharedSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Vec<u8> {
        self.0.borrow().clone()
    }

    pub fn take(&self) -> Vec<u8> {
        std::mem::take(&mut self.0.borrow_mut())
    }
}

impl Write for SharedSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
