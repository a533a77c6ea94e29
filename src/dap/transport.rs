//! DAP transport: Content-Length framing over a TCP socket or over the stdio of a spawned
//! adapter process.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::path::Path;
use std::process::{Child, Command, Stdio};

use serde_json::Value;

use super::tracer::FileTracer;
use super::DapError;

/// Largest message body accepted from an adapter.
pub const MAX_CONTENT_LENGTH: usize = 64 * 1024 * 1024;

/// Read a single DAP message (with Content-Length framing).
pub fn read_message<R: BufRead + ?Sized>(reader: &mut R) -> Result<Value, DapError> {
    let mut content_length: Option<usize> = None;
    let mut seen_header = false;
    loop {
        let mut line = String::new();
        let read_n = reader.read_line(&mut line)?;
        if read_n == 0 {
            return Err(DapError::Closed);
        }
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            if !seen_header {
                // blank lines between messages are tolerated
                continue;
            }
            break;
        }
        seen_header = true;
        if let Some(v) = line.strip_prefix("Content-Length:") {
            let len: usize = v
                .trim()
                .parse()
                .map_err(|_| DapError::BadContentLength(v.trim().to_string()))?;
            if len > MAX_CONTENT_LENGTH {
                return Err(DapError::BadContentLength(format!(
                    "{len} exceeds {MAX_CONTENT_LENGTH} bytes"
                )));
            }
            content_length = Some(len);
        }
    }

    let len = content_length.ok_or(DapError::MissingContentLength)?;
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;
    Ok(serde_json::from_slice(&buf)?)
}

/// Write a single DAP message (with Content-Length framing).
pub fn write_message<W: Write + ?Sized>(writer: &mut W, message: &Value) -> Result<(), DapError> {
    let payload = serde_json::to_vec(message)?;
    write!(writer, "Content-Length: {}\r\n\r\n", payload.len())?;
    writer.write_all(&payload)?;
    writer.flush()?;
    Ok(())
}

/// Incoming half of a transport.
pub struct MessageReader {
    inner: Box<dyn BufRead + Send>,
    tracer: Option<FileTracer>,
}

impl MessageReader {
    pub fn read_message(&mut self) -> Result<Value, DapError> {
        let msg = read_message(&mut self.inner)?;
        if let Some(tracer) = &self.tracer {
            tracer.incoming(&msg);
        }
        Ok(msg)
    }
}

/// Outgoing half of a transport.
pub struct MessageWriter {
    inner: Box<dyn Write + Send>,
    tracer: Option<FileTracer>,
}

impl MessageWriter {
    pub fn write_message(&mut self, message: &Value) -> Result<(), DapError> {
        if let Some(tracer) = &self.tracer {
            tracer.outgoing(message);
        }
        write_message(&mut self.inner, message)
    }
}

/// A bidirectional byte channel to a debug adapter.
pub struct Transport {
    reader: Box<dyn BufRead + Send>,
    writer: Box<dyn Write + Send>,
    child: Option<Child>,
    tracer: Option<FileTracer>,
}

impl Transport {
    /// Connect to an adapter listening on a TCP socket (e.g. `debugpy --listen`).
    pub fn tcp(addr: SocketAddr) -> Result<Self, DapError> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        let reader = BufReader::new(stream.try_clone()?);
        Ok(Self::from_parts(reader, stream))
    }

    /// Spawn an adapter process and speak DAP over its stdin/stdout.
    pub fn spawn(program: &Path, args: &[String]) -> Result<Self, DapError> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;
        let stdin = child.stdin.take().ok_or(DapError::Closed)?;
        let stdout = child.stdout.take().ok_or(DapError::Closed)?;
        let mut transport = Self::from_parts(BufReader::new(stdout), stdin);
        transport.child = Some(child);
        Ok(transport)
    }

    pub fn from_parts(
        reader: impl BufRead + Send + 'static,
        writer: impl Write + Send + 'static,
    ) -> Self {
        Self {
            reader: Box::new(reader),
            writer: Box::new(writer),
            child: None,
            tracer: None,
        }
    }

    pub fn with_tracer(mut self, tracer: Option<FileTracer>) -> Self {
        self.tracer = tracer;
        self
    }

    pub fn split(self) -> (MessageReader, MessageWriter, Option<Child>) {
        (
            MessageReader {
                inner: self.reader,
                tracer: self.tracer.clone(),
            },
            MessageWriter {
                inner: self.writer,
                tracer: self.tracer,
            },
            self.child,
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;
    use std::io::Cursor;

    #[test]
    fn test_framing() {
        let mut buf = vec![];
        write_message(&mut buf, &json!({"seq": 1, "type": "request", "command": "threads"}))
            .unwrap();
        write_message(&mut buf, &json!({"seq": 2, "type": "event", "event": "stopped"})).unwrap();

        let mut reader = Cursor::new(buf);
        let first = read_message(&mut reader).unwrap();
        assert_eq!(first["command"], "threads");
        let second = read_message(&mut reader).unwrap();
        assert_eq!(second["event"], "stopped");
        assert!(matches!(read_message(&mut reader), Err(DapError::Closed)));
    }

    #[test]
    fn test_framing_extra_headers() {
        let body = r#"{"seq":7,"type":"response"}"#;
        let raw = format!(
            "Content-Type: application/vscode-jsonrpc\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        );
        let msg = read_message(&mut Cursor::new(raw.into_bytes())).unwrap();
        assert_eq!(msg["seq"], 7);
    }

    #[test]
    fn test_framing_errors() {
        let raw = "Content-Type: text\r\n\r\n{}";
        assert!(matches!(
            read_message(&mut Cursor::new(raw.as_bytes())),
            Err(DapError::MissingContentLength)
        ));

        let raw = "Content-Length: abc\r\n\r\n{}";
        assert!(matches!(
            read_message(&mut Cursor::new(raw.as_bytes())),
            Err(DapError::BadContentLength(_))
        ));
    }

    #[test]
    fn test_framing_oversized_body() {
        let raw = format!("Content-Length: {}\r\n\r\n{{}}", MAX_CONTENT_LENGTH + 1);
        assert!(matches!(
            read_message(&mut Cursor::new(raw.into_bytes())),
            Err(DapError::BadContentLength(_))
        ));

        let raw = "Content-Length: 18446744073709551615\r\n\r\n{}";
        assert!(matches!(
            read_message(&mut Cursor::new(raw.as_bytes())),
            Err(DapError::BadContentLength(_))
        ));
    }
}
