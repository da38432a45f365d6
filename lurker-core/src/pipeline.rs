// Result delivery: many concurrent producers, one draining consumer

use crate::error::{CoreError, Result};
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, warn};

/// Append-only file of matched URLs, flushed after every line.
pub struct FileSink {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl FileSink {
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| CoreError::OutputFile {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_line(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.writer, "{}", line)?;
        self.writer.flush()
    }
}

struct SinkState {
    file: Option<FileSink>,
    /// Lines already appended to the file; only consulted in unique mode.
    persisted: HashSet<String>,
}

/// Producer half of the pipeline. Shared by every extraction callback.
pub struct ResultPipeline {
    sender: Mutex<Option<mpsc::Sender<String>>>,
    /// Never held across an await; writes are short and blocking.
    sink: StdMutex<SinkState>,
    unique: bool,
}

impl ResultPipeline {
    /// Create a pipeline whose queue holds at most `capacity` lines.
    pub fn new(
        capacity: usize,
        unique: bool,
        file: Option<FileSink>,
    ) -> (Arc<Self>, PipelineConsumer) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let pipeline = Arc::new(Self {
            sender: Mutex::new(Some(sender)),
            sink: StdMutex::new(SinkState {
                file,
                persisted: HashSet::new(),
            }),
            unique,
        });
        let consumer = PipelineConsumer { receiver, unique };
        (pipeline, consumer)
    }

    /// Hand one formatted line to both sinks.
    ///
    /// With `persist` set the line is appended to the file first. In unique
    /// mode the dedup check and the append happen under the same lock. The
    /// line is then queued for the consumer, waiting while the queue is full.
    /// Once the pipeline is closed this returns `PipelineClosed` and the line
    /// is dropped.
    pub async fn submit(&self, line: String, persist: bool) -> Result<()> {
        if persist {
            let mut state = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
            let state = &mut *state;
            if let Some(file) = state.file.as_mut() {
                let fresh = !self.unique || state.persisted.insert(line.clone());
                if fresh && let Err(e) = file.write_line(&line) {
                    warn!("Error writing URL to {}: {}", file.path().display(), e);
                }
            }
        }

        let sender = self.sender.lock().await.clone();
        match sender {
            Some(sender) => sender
                .send(line)
                .await
                .map_err(|_| CoreError::PipelineClosed),
            None => Err(CoreError::PipelineClosed),
        }
    }

    /// Stop accepting lines. The consumer finishes once queued lines drain.
    pub async fn close(&self) {
        if self.sender.lock().await.take().is_some() {
            debug!("Result pipeline closed");
        }
    }

    pub async fn is_closed(&self) -> bool {
        self.sender.lock().await.is_none()
    }
}

/// The single draining end of a [`ResultPipeline`].
pub struct PipelineConsumer {
    receiver: mpsc::Receiver<String>,
    unique: bool,
}

impl PipelineConsumer {
    /// Write queued lines to `out` until the pipeline is closed and empty.
    /// Returns the number of lines written.
    pub async fn drain<W: Write>(mut self, out: &mut W) -> io::Result<usize> {
        let mut printed = HashSet::new();
        let mut written = 0;

        while let Some(line) = self.receiver.recv().await {
            if self.unique && !printed.insert(line.clone()) {
                continue;
            }
            writeln!(out, "{}", line)?;
            out.flush()?;
            written += 1;
        }

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn spawn_drain(consumer: PipelineConsumer) -> tokio::task::JoinHandle<(Vec<u8>, usize)> {
        tokio::spawn(async move {
            let mut buf = Vec::new();
            let written = consumer.drain(&mut buf).await.unwrap();
            (buf, written)
        })
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_duplicates_emitted_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("matched_urls.txt");
        let sink = FileSink::open(&path).unwrap();

        let (pipeline, consumer) = ResultPipeline::new(2, true, Some(sink));
        let drain = spawn_drain(consumer);

        let producers: Vec<_> = (0..8)
            .map(|_| {
                let pipeline = pipeline.clone();
                tokio::spawn(async move {
                    pipeline
                        .submit("https://example.com/a".to_string(), true)
                        .await
                })
            })
            .collect();
        for producer in producers {
            producer.await.unwrap().unwrap();
        }

        pipeline.close().await;
        let (stdout, written) = drain.await.unwrap();

        assert_eq!(written, 1);
        assert_eq!(String::from_utf8(stdout).unwrap(), "https://example.com/a\n");
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "https://example.com/a\n"
        );
    }

    #[tokio::test]
    async fn test_non_unique_mode_keeps_everything() {
        let (pipeline, consumer) = ResultPipeline::new(4, false, None);
        let drain = spawn_drain(consumer);

        for _ in 0..3 {
            pipeline.submit("https://example.com/a".to_string(), true).await.unwrap();
        }
        pipeline.close().await;

        let (_, written) = drain.await.unwrap();
        assert_eq!(written, 3);
    }

    #[tokio::test]
    async fn test_unpersisted_lines_skip_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.txt");
        let (pipeline, consumer) =
            ResultPipeline::new(4, false, Some(FileSink::open(&path).unwrap()));
        let drain = spawn_drain(consumer);

        pipeline.submit("kept".to_string(), true).await.unwrap();
        pipeline.submit("printed-only".to_string(), false).await.unwrap();
        pipeline.close().await;

        let (stdout, _) = drain.await.unwrap();
        assert_eq!(String::from_utf8(stdout).unwrap(), "kept\nprinted-only\n");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "kept\n");
    }

    #[tokio::test]
    async fn test_submit_after_close_is_rejected() {
        let (pipeline, consumer) = ResultPipeline::new(1, false, None);
        let drain = spawn_drain(consumer);

        pipeline.close().await;
        assert!(pipeline.is_closed().await);

        let result = pipeline.submit("late".to_string(), true).await;
        assert!(matches!(result, Err(CoreError::PipelineClosed)));

        let (stdout, written) = drain.await.unwrap();
        assert_eq!(written, 0);
        assert!(stdout.is_empty());
    }

    #[tokio::test]
    async fn test_file_sink_appends() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.txt");
        std::fs::write(&path, "existing\n").unwrap();

        let (pipeline, consumer) =
            ResultPipeline::new(4, false, Some(FileSink::open(&path).unwrap()));
        let drain = spawn_drain(consumer);
        pipeline.submit("new".to_string(), true).await.unwrap();
        pipeline.close().await;
        drain.await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "existing\nnew\n");
    }
}
