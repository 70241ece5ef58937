use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use super::FrameError;

/// Longest line either side is allowed to send. Anything bigger is not a
/// legitimate command or message.
const MAX_LINE: usize = 512;

pub fn from_socket(socket: TcpStream) -> (ConnectionTx, ConnectionRx) {
    let (read_stream, write_stream) = socket.into_split();

    (
        ConnectionTx {
            write_stream: BufWriter::new(write_stream),
        },
        ConnectionRx {
            read_stream: BufReader::new(read_stream),
            buffer: String::with_capacity(64),
        },
    )
}

#[derive(Debug)]
pub struct ConnectionTx {
    write_stream: BufWriter<OwnedWriteHalf>,
}

#[derive(Debug)]
pub struct ConnectionRx {
    read_stream: BufReader<OwnedReadHalf>,
    buffer: String,
}

impl ConnectionTx {
    /// Write one newline-terminated protocol line and flush it out.
    pub async fn write_line(&mut self, line: &str) -> Result<(), FrameError> {
        self.write_stream.write_all(line.as_bytes()).await?;
        self.write_stream.write_all(b"\n").await?;
        self.write_stream.flush().await?;
        Ok(())
    }
}

impl ConnectionRx {
    /// Read the next line, stripped of its terminator. `None` means the
    /// remote closed the connection.
    pub async fn read_line(&mut self) -> Result<Option<String>, FrameError> {
        self.buffer.clear();
        let n = self.read_stream.read_line(&mut self.buffer).await?;
        if n == 0 {
            return Ok(None);
        }
        if n > MAX_LINE {
            return Err(FrameError::LineLength);
        }
        Ok(Some(
            self.buffer.trim_end_matches(['\r', '\n']).to_owned(),
        ))
    }
}
