use std::cmp::min;
use std::io::{Error, ErrorKind, Read, Result, Write};

use crate::conn::Connection;

/// An in-memory stream for exercising [`crate::conn::TcpConnection`].
pub struct MockStream {
    read_buf: Vec<u8>,
    read_pos: usize,
    pub written_buf: Vec<u8>,
}

impl MockStream {
    pub fn new(read_buf: Vec<u8>) -> MockStream {
        MockStream {
            read_buf,
            read_pos: 0,
            written_buf: Vec::new(),
        }
    }
}

impl Read for MockStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.read_pos >= self.read_buf.len() {
            return Ok(0);
        }
        let n = min(buf.len(), self.read_buf.len() - self.read_pos);
        buf[..n].copy_from_slice(&self.read_buf[self.read_pos..self.read_pos + n]);
        self.read_pos += n;
        Ok(n)
    }
}

impl Write for MockStream {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.written_buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// A scripted [`Connection`] that records every line a job writes.
#[derive(Default)]
pub struct MockConnection {
    pub written: Vec<String>,
    err_on_write: bool,
}

impl MockConnection {
    pub fn new() -> MockConnection {
        MockConnection::default()
    }

    pub fn with_err(mut self) -> MockConnection {
        self.err_on_write = true;
        self
    }
}

impl Connection for MockConnection {
    fn write_line(&mut self, line: &str) -> crate::error::Result<()> {
        if self.err_on_write {
            return Err(Error::new(ErrorKind::Other, "MockConnection Error").into());
        }
        self.written.push(line.to_string());
        Ok(())
    }
}
