//! Trait abstraction for the byte-stream transport to enable testing

use async_trait::async_trait;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Read half of the transport
#[async_trait]
pub trait SerialPortRead: Send {
    /// Read whatever bytes are available, waiting at most one poll interval
    ///
    /// `Ok(0)` means nothing arrived in time, not end of stream. A closed
    /// stream is reported as [`io::ErrorKind::UnexpectedEof`].
    async fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// Write half of the transport
#[async_trait]
pub trait SerialPortIO: Send {
    /// Write all data to the port
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Flush the output buffer
    async fn flush(&mut self) -> io::Result<()>;
}

/// Adapter from any tokio reader to [`SerialPortRead`]
pub struct SerialReader<T> {
    inner: T,
    poll_interval: Duration,
}

impl<T> SerialReader<T> {
    pub fn new(inner: T, poll_interval: Duration) -> Self {
        Self {
            inner,
            poll_interval,
        }
    }
}

#[async_trait]
impl<T: AsyncRead + Unpin + Send> SerialPortRead for SerialReader<T> {
    async fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match tokio::time::timeout(self.poll_interval, self.inner.read(buf)).await {
            Err(_elapsed) => Ok(0),
            Ok(Ok(0)) if !buf.is_empty() => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "serial stream closed",
            )),
            Ok(result) => result,
        }
    }
}

/// Adapter from any tokio writer to [`SerialPortIO`]
pub struct SerialWriter<T> {
    inner: T,
}

impl<T> SerialWriter<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<T: AsyncWrite + Unpin + Send> SerialPortIO for SerialWriter<T> {
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.inner.write_all(data).await
    }

    async fn flush(&mut self) -> io::Result<()> {
        self.inner.flush().await
    }
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Mock serial port for testing the write path
    #[derive(Clone)]
    pub struct MockSerialPort {
        pub written_data: Arc<Mutex<Vec<Vec<u8>>>>,
        pub write_error: Arc<Mutex<Option<io::ErrorKind>>>,
        pub flush_error: Arc<Mutex<Option<io::ErrorKind>>>,
    }

    impl MockSerialPort {
        pub fn new() -> Self {
            Self {
                written_data: Arc::new(Mutex::new(Vec::new())),
                write_error: Arc::new(Mutex::new(None)),
                flush_error: Arc::new(Mutex::new(None)),
            }
        }

        pub fn get_written_data(&self) -> Vec<Vec<u8>> {
            self.written_data.lock().unwrap().clone()
        }

        pub fn set_write_error(&self, error: io::ErrorKind) {
            *self.write_error.lock().unwrap() = Some(error);
        }

        pub fn clear_write_error(&self) {
            *self.write_error.lock().unwrap() = None;
        }

        pub fn set_flush_error(&self, error: io::ErrorKind) {
            *self.flush_error.lock().unwrap() = Some(error);
        }
    }

    #[async_trait]
    impl SerialPortIO for MockSerialPort {
        async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
            if let Some(error) = *self.write_error.lock().unwrap() {
                return Err(io::Error::new(error, "Mock write error"));
            }
            self.written_data.lock().unwrap().push(data.to_vec());
            Ok(())
        }

        async fn flush(&mut self) -> io::Result<()> {
            if let Some(error) = *self.flush_error.lock().unwrap() {
                return Err(io::Error::new(error, "Mock flush error"));
            }
            Ok(())
        }
    }

    /// Scripted reads for testing the receive path
    pub enum ReadStep {
        Data(Vec<u8>),
        Idle,
        Fail(io::ErrorKind),
    }

    /// Mock serial port replaying a script, then reporting end of stream
    pub struct MockSerialReader {
        steps: VecDeque<ReadStep>,
    }

    impl MockSerialReader {
        pub fn new(steps: Vec<ReadStep>) -> Self {
            Self {
                steps: steps.into(),
            }
        }

        /// One read per chunk
        pub fn from_chunks<I: IntoIterator<Item = Vec<u8>>>(chunks: I) -> Self {
            Self::new(chunks.into_iter().map(ReadStep::Data).collect())
        }
    }

    #[async_trait]
    impl SerialPortRead for MockSerialReader {
        async fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.steps.pop_front() {
                Some(ReadStep::Data(mut data)) => {
                    let n = data.len().min(buf.len());
                    buf[..n].copy_from_slice(&data[..n]);
                    if n < data.len() {
                        self.steps.push_front(ReadStep::Data(data.split_off(n)));
                    }
                    Ok(n)
                }
                Some(ReadStep::Idle) => Ok(0),
                Some(ReadStep::Fail(kind)) => Err(io::Error::new(kind, "Mock read error")),
                None => Err(io::Error::new(io::ErrorKind::UnexpectedEof, "Mock stream closed")),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_serial_reader_passes_bytes_through() {
        let stream = tokio_test::io::Builder::new()
            .read(&[0xC8, 0x18])
            .read(&[0x16])
            .build();
        let mut reader = SerialReader::new(stream, Duration::from_millis(50));
        let mut buf = [0u8; 64];

        assert_eq!(reader.read_available(&mut buf).await.unwrap(), 2);
        assert_eq!(&buf[..2], &[0xC8, 0x18]);
        assert_eq!(reader.read_available(&mut buf).await.unwrap(), 1);
        assert_eq!(buf[0], 0x16);
    }

    #[tokio::test]
    async fn test_serial_reader_reports_eof() {
        let stream = tokio_test::io::Builder::new().build();
        let mut reader = SerialReader::new(stream, Duration::from_millis(50));
        let mut buf = [0u8; 8];

        let err = reader.read_available(&mut buf).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn test_serial_reader_times_out_with_zero() {
        let (_keep_open, stream) = tokio::io::duplex(64);
        let mut reader = SerialReader::new(stream, Duration::from_millis(10));
        let mut buf = [0u8; 8];

        assert_eq!(reader.read_available(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_serial_writer_writes_and_flushes() {
        let stream = tokio_test::io::Builder::new()
            .write(&[0xC8, 0x04, 0x09])
            .build();
        let mut writer = SerialWriter::new(stream);

        writer.write_all(&[0xC8, 0x04, 0x09]).await.unwrap();
        writer.flush().await.unwrap();
    }
}
