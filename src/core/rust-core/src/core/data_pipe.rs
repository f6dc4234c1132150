use tokio::sync::mpsc;

use crate::core::catalog_container::CatalogItemRequest;
use crate::errors::{NexusError, Result};

/// A resolved request paired with the pipe its result bytes stream into.
pub struct CatalogItemRequestPipeWriter {
    /// The resolved request.
    pub request: CatalogItemRequest,

    /// The writing half of the output pipe.
    pub data_writer: DataPipeWriter,
}

/// Creates a bounded in-process byte pipe. Within one pipe, chunks arrive in
/// write order, so bytes appear in strictly increasing time order across
/// read chunks.
pub fn data_pipe(capacity: usize) -> (DataPipeWriter, DataPipeReader) {
    let (tx, rx) = mpsc::channel(capacity.max(1));

    (
        DataPipeWriter {
            tx,
            bytes_written: 0,
        },
        DataPipeReader { rx },
    )
}

/// The writing half of a byte pipe.
pub struct DataPipeWriter {
    tx: mpsc::Sender<Vec<u8>>,
    bytes_written: u64,
}

impl DataPipeWriter {
    /// Appends a chunk, waiting while the pipe is full.
    pub async fn write(&mut self, chunk: Vec<u8>) -> Result<()> {
        if chunk.is_empty() {
            return Ok(());
        }

        self.bytes_written += chunk.len() as u64;

        self.tx
            .send(chunk)
            .await
            .map_err(|_| NexusError::internal("the pipe consumer is gone"))
    }

    /// The number of bytes written so far.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Completes the pipe. The reader observes the end of the stream once
    /// all pending chunks are consumed.
    pub fn complete(self) {}
}

/// The reading half of a byte pipe.
pub struct DataPipeReader {
    rx: mpsc::Receiver<Vec<u8>>,
}

impl DataPipeReader {
    /// Receives the next chunk, or `None` once the writer completed.
    pub async fn read(&mut self) -> Option<Vec<u8>> {
        self.rx.recv().await
    }

    /// Drains the pipe into one buffer.
    pub async fn read_to_end(&mut self) -> Vec<u8> {
        let mut buffer = Vec::new();

        while let Some(chunk) = self.read().await {
            buffer.extend_from_slice(&chunk);
        }

        buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn preserves_write_order() {
        let (mut writer, mut reader) = data_pipe(4);

        writer.write(vec![1, 2]).await.unwrap();
        writer.write(vec![3]).await.unwrap();
        assert_eq!(writer.bytes_written(), 3);
        writer.complete();

        assert_eq!(reader.read_to_end().await, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn write_fails_once_reader_is_gone() {
        let (mut writer, reader) = data_pipe(1);
        drop(reader);

        assert!(writer.write(vec![0]).await.is_err());
    }
}
