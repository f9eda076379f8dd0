//! Mock transport for testing

use super::Transport;
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// In-memory transport; clones share the same buffers
///
/// Reads are served chunk by chunk in injection order, so a test can place a
/// record boundary in the middle of a read. Injected errors are returned in
/// sequence with the data.
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

#[derive(Default)]
struct MockTransportInner {
    reads: VecDeque<MockRead>,
    write_buffer: Vec<u8>,
}

enum MockRead {
    Data(Vec<u8>),
    Error,
}

impl MockTransport {
    /// Create a new mock transport
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one chunk to be returned by a single `read`
    pub fn inject_read(&self, data: &[u8]) {
        self.inner
            .lock()
            .reads
            .push_back(MockRead::Data(data.to_vec()));
    }

    /// Queue a read failure
    pub fn inject_error(&self) {
        self.inner.lock().reads.push_back(MockRead::Error);
    }

    /// Chunks not yet consumed
    pub fn pending_reads(&self) -> usize {
        self.inner.lock().reads.len()
    }

    /// Get all written data
    pub fn get_written(&self) -> Vec<u8> {
        self.inner.lock().write_buffer.clone()
    }

    /// Written data split into lines
    pub fn written_lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.get_written())
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Clear written data
    pub fn clear_written(&self) {
        self.inner.lock().write_buffer.clear();
    }
}

impl Transport for MockTransport {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let mut inner = self.inner.lock();
        match inner.reads.pop_front() {
            None => Ok(0),
            Some(MockRead::Error) => Err(Error::Other("mock read failure".to_string())),
            Some(MockRead::Data(mut chunk)) => {
                let n = chunk.len().min(buffer.len());
                buffer[..n].copy_from_slice(&chunk[..n]);
                if n < chunk.len() {
                    inner.reads.push_front(MockRead::Data(chunk.split_off(n)));
                }
                Ok(n)
            }
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.inner.lock().write_buffer.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}
