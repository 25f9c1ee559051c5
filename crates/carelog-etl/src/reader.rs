//! Streaming CSV record reader
//!
//! Reads one record at a time from a header-keyed CSV source, so memory use
//! stays flat regardless of how many rows the extract holds. A stream can
//! only move forward; open the source again to start over.

use csv_async::{AsyncReader, AsyncReaderBuilder, StringRecord, Trim};
use futures::Stream;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::AsyncRead;

use crate::error::{EtlError, Result};

/// One source record, addressed by header name.
#[derive(Debug, Clone)]
pub struct RawRecord {
    columns: Arc<HashMap<String, usize>>,
    values: StringRecord,
}

impl RawRecord {
    /// Raw (trimmed) value of a column, `None` when the header lacks it.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns.get(column).and_then(|&idx| self.values.get(idx))
    }
}

/// Forward-only reader over a CSV source.
pub struct RecordStream<R> {
    path: PathBuf,
    reader: AsyncReader<R>,
    columns: Arc<HashMap<String, usize>>,
    records_read: u64,
}

impl RecordStream<File> {
    /// Open a CSV file and read its header row.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).await.map_err(|source| EtlError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(path, file).await
    }
}

impl<R> RecordStream<R>
where
    R: AsyncRead + Unpin + Send,
{
    /// Wrap an async byte source. `path` is only used in error messages.
    pub async fn from_reader(path: impl Into<PathBuf>, source: R) -> Result<Self> {
        let path = path.into();
        let mut reader = AsyncReaderBuilder::new()
            .trim(Trim::All)
            .has_headers(true)
            .create_reader(source);

        let headers = reader.headers().await.map_err(|source| EtlError::Parse {
            path: path.clone(),
            record: 0,
            source,
        })?;

        let mut columns = HashMap::with_capacity(headers.len());
        for (idx, name) in headers.iter().enumerate() {
            columns.entry(name.to_string()).or_insert(idx);
        }

        Ok(Self {
            path,
            reader,
            columns: Arc::new(columns),
            records_read: 0,
        })
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    /// Read the next record, `None` at end of input.
    ///
    /// A record whose field count differs from the header, or that is not
    /// valid UTF-8, is an error.
    pub async fn next_record(&mut self) -> Result<Option<RawRecord>> {
        let mut values = StringRecord::new();
        match self.reader.read_record(&mut values).await {
            Ok(true) => {
                self.records_read += 1;
                Ok(Some(RawRecord {
                    columns: Arc::clone(&self.columns),
                    values,
                }))
            },
            Ok(false) => Ok(None),
            Err(source) => Err(EtlError::Parse {
                path: self.path.clone(),
                record: self.records_read + 1,
                source,
            }),
        }
    }

    /// Consume the reader as a `Stream` of records.
    pub fn into_stream(self) -> impl Stream<Item = Result<RawRecord>> {
        futures::stream::try_unfold(self, |mut stream| async move {
            let next = stream.next_record().await?;
            Ok(next.map(|record| (record, stream)))
        })
    }
}
