//! File-backed log streams: one JSON record per line in
//! `<dir>/<stream>-YYYY-MM-DD.log` (UTC dates).

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_stream::wrappers::LinesStream;
use tracing_subscriber::fmt::MakeWriter;

use crate::error::AuditError;
use crate::sink::LogSink;
use crate::stream::{LogStream, RetentionPolicy};

// ---------------------------------------------------------------------------
// FileLogSink
// ---------------------------------------------------------------------------

/// Appends audit records to daily files under a directory.
pub struct FileLogSink {
    dir: PathBuf,
    /// Serializes appends within the process so lines never interleave.
    write_lock: tokio::sync::Mutex<()>,
}

impl FileLogSink {
    /// Create the sink, creating `dir` if needed.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, AuditError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            write_lock: tokio::sync::Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Delete every file whose stream retention has elapsed as of `today`.
    ///
    /// Returns the removed paths.
    pub async fn prune_expired(
        &self,
        policy: &RetentionPolicy,
        today: NaiveDate,
    ) -> Result<Vec<PathBuf>, AuditError> {
        let mut removed = Vec::new();
        for (stream, date, path) in list_files(&self.dir).await? {
            if policy.is_expired(stream, date, today) {
                tokio::fs::remove_file(&path).await?;
                tracing::info!(
                    path = %path.display(),
                    stream = %stream,
                    "Removed expired log file"
                );
                removed.push(path);
            }
        }
        Ok(removed)
    }
}

#[async_trait]
impl LogSink for FileLogSink {
    async fn write_line(&self, stream: LogStream, line: &str) -> Result<(), AuditError> {
        let path = self.dir.join(stream.file_name(Utc::now().date_naive()));
        let mut record = String::with_capacity(line.len() + 1);
        record.push_str(line);
        record.push('\n');

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(record.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    fn scan(&self, log: LogStream) -> BoxStream<'static, Result<String, AuditError>> {
        let dir = self.dir.clone();
        stream::once(async move { stream_files(&dir, log).await })
            .map_ok(|paths| stream::iter(paths.into_iter().map(Ok::<_, AuditError>)))
            .try_flatten()
            .and_then(|path| async move {
                let file = tokio::fs::File::open(&path).await?;
                Ok::<_, AuditError>(
                    LinesStream::new(BufReader::new(file).lines()).map_err(AuditError::from),
                )
            })
            .try_flatten()
            .boxed()
    }
}

/// Every `<stream>-<date>.log` file in `dir`. A missing directory is empty.
async fn list_files(dir: &Path) -> Result<Vec<(LogStream, NaiveDate, PathBuf)>, AuditError> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        if let Some((stream, date)) = name.to_str().and_then(LogStream::parse_file_name) {
            files.push((stream, date, entry.path()));
        }
    }
    Ok(files)
}

/// Files of one stream, oldest first.
async fn stream_files(dir: &Path, stream: LogStream) -> Result<Vec<PathBuf>, AuditError> {
    let mut files: Vec<(NaiveDate, PathBuf)> = list_files(dir)
        .await?
        .into_iter()
        .filter(|(s, _, _)| *s == stream)
        .map(|(_, date, path)| (date, path))
        .collect();
    files.sort();
    Ok(files.into_iter().map(|(_, path)| path).collect())
}

// ---------------------------------------------------------------------------
// DailyFileWriter
// ---------------------------------------------------------------------------

/// A `tracing-subscriber` writer that appends to `<stream>-YYYY-MM-DD.log`,
/// switching files when the UTC date changes. Feeds the `general` stream.
pub struct DailyFileWriter {
    dir: PathBuf,
    stream: LogStream,
    current: Mutex<Option<(NaiveDate, File)>>,
}

impl DailyFileWriter {
    pub fn new(dir: impl Into<PathBuf>, stream: LogStream) -> io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            stream,
            current: Mutex::new(None),
        })
    }

    fn open(&self, date: NaiveDate) -> io::Result<File> {
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.join(self.stream.file_name(date)))
    }
}

impl Write for &DailyFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let today = Utc::now().date_naive();
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        let stale = !matches!(current.as_ref(), Some((date, _)) if *date == today);
        if stale {
            *current = Some((today, self.open(today)?));
        }
        match current.as_mut() {
            Some((_, file)) => {
                file.write_all(buf)?;
                Ok(buf.len())
            }
            None => Err(io::Error::other("log file not open")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        match current.as_mut() {
            Some((_, file)) => file.flush(),
            None => Ok(()),
        }
    }
}

impl<'a> MakeWriter<'a> for DailyFileWriter {
    type Writer = &'a DailyFileWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self
    }
}
