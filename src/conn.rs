//! The connection collaborator.
//!
//! Jobs never own the transport; they borrow something implementing
//! [`Connection`] for exactly as long as it takes to put a command line on
//! the wire. Reading is the pump loop's business: whoever drives the
//! connection reads lines and feeds them back into the outstanding job.

use std::io::{BufRead, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};

use bufstream::BufStream;

use crate::error::{Error, Result};

const CR: u8 = 0x0d;
const LF: u8 = 0x0a;

/// Something capable of writing one command line to the server.
///
/// Implementations append the wire line terminator (CRLF) themselves; the
/// line passed in carries none.
pub trait Connection {
    /// Write `line` followed by CRLF and flush it out.
    fn write_line(&mut self, line: &str) -> Result<()>;
}

/// A [`Connection`] over a buffered TCP stream.
#[derive(Debug)]
pub struct TcpConnection<T: Read + Write = TcpStream> {
    stream: BufStream<T>,
}

impl TcpConnection<TcpStream> {
    /// Connect to the given address.
    pub fn connect<A: ToSocketAddrs>(addr: A) -> Result<TcpConnection<TcpStream>> {
        let stream = TcpStream::connect(addr)?;
        Ok(TcpConnection::new(stream))
    }
}

impl<T: Read + Write> TcpConnection<T> {
    /// Wrap an existing stream.
    pub fn new(stream: T) -> TcpConnection<T> {
        TcpConnection {
            stream: BufStream::new(stream),
        }
    }

    /// Read one CRLF-terminated line into `into`, stripping the terminator.
    ///
    /// Blocks until a full line is available. An EOF before any data was
    /// read surfaces as [`Error::ConnectionLost`].
    pub fn read_line(&mut self, into: &mut String) -> Result<usize> {
        let mut buf = Vec::new();
        let read = self.stream.read_until(LF, &mut buf)?;
        if read == 0 {
            return Err(Error::ConnectionLost);
        }
        while buf.last() == Some(&LF) || buf.last() == Some(&CR) {
            buf.pop();
        }
        let line = String::from_utf8_lossy(&buf);
        log::trace!("S: {}", line);
        into.push_str(&line);
        Ok(read)
    }
}

impl<T: Read + Write> Connection for TcpConnection<T> {
    fn write_line(&mut self, line: &str) -> Result<()> {
        log::trace!("C: {}", line);
        self.stream.write_all(line.as_bytes())?;
        self.stream.write_all(&[CR, LF])?;
        self.stream.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_conn::MockStream;

    #[test]
    fn read_line_strips_terminator() {
        let mut conn = TcpConnection::new(MockStream::new(b"* OK ready.\r\n".to_vec()));
        let mut line = String::new();
        conn.read_line(&mut line).unwrap();
        assert_eq!(line, "* OK ready.");
    }

    #[test]
    fn read_line_eof() {
        let mut conn = TcpConnection::new(MockStream::new(Vec::new()));
        let mut line = String::new();
        match conn.read_line(&mut line) {
            Err(Error::ConnectionLost) => {}
            other => panic!("EOF read did not return connection lost: {:?}", other),
        }
    }

    #[test]
    fn write_line_appends_crlf() {
        let mut conn = TcpConnection::new(MockStream::new(Vec::new()));
        conn.write_line("a1 CAPABILITY").unwrap();
        assert_eq!(
            conn.stream.get_ref().written_buf,
            b"a1 CAPABILITY\r\n".to_vec()
        );
    }
}
