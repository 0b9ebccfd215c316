//! FileQueue - a disk-backed FIFO that survives restarts.
//!
//! # Layout
//! One directory per queue under the configured root:
//!
//! ```text
//! <root>/<name>/tasks.<generation>.log   JSON Lines, one task per line
//! <root>/<name>/cursor                   "<generation> <consumed>"
//! ```
//!
//! `push` appends a line and fsyncs it before returning. `pop` advances
//! `consumed` and rewrites the cursor atomically (temp file, fsync, rename,
//! directory fsync). On open the log of the cursor's generation is replayed
//! and its first `consumed` lines are skipped.
//!
//! # Crash safety
//! - A torn final line (crash mid-append) is truncated on open.
//! - Compaction writes the pending tasks into `tasks.<generation+1>.log`,
//!   then moves the cursor to the new generation, then deletes the old log.
//!   Whichever generation the cursor names is authoritative; logs of any
//!   other generation are leftovers and are removed on open.
//! - A complete line that does not decode as a task is skipped with a
//!   warning but still counts as a consumed position.

use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::domain::Task;
use crate::ports::{QueueError, TaskQueue};

/// Consumed lines after which a compaction is considered.
pub const DEFAULT_COMPACT_THRESHOLD: u64 = 1024;

const CURSOR_FILE: &str = "cursor";
const CURSOR_TMP_FILE: &str = "cursor.tmp";

pub struct FileQueue {
    name: String,
    inner: Arc<Mutex<Inner>>,
}

struct Inner {
    name: String,
    dir: PathBuf,
    generation: u64,
    /// Lines of the current log already handed out.
    consumed: u64,
    /// Lines not yet handed out; `None` marks an undecodable line.
    pending: VecDeque<Option<Task>>,
    log: File,
    log_len: u64,
    compact_threshold: u64,
}

impl FileQueue {
    /// Opens (or creates) the queue `name` under `root`.
    pub fn open(root: impl AsRef<Path>, name: &str) -> Result<Self, QueueError> {
        Self::open_with_compaction(root, name, DEFAULT_COMPACT_THRESHOLD)
    }

    pub fn open_with_compaction(
        root: impl AsRef<Path>,
        name: &str,
        compact_threshold: u64,
    ) -> Result<Self, QueueError> {
        let inner = Inner::open(root.as_ref().join(name), name, compact_threshold.max(1))?;
        tracing::info!(
            queue = name,
            generation = inner.generation,
            pending = inner.pending.len(),
            "opened durable queue"
        );
        Ok(Self {
            name: name.to_string(),
            inner: Arc::new(Mutex::new(inner)),
        })
    }

    /// Runs `op` on the queue state off the async runtime.
    async fn with_inner<R, F>(&self, op: F) -> Result<R, QueueError>
    where
        R: Send + 'static,
        F: FnOnce(&mut Inner) -> Result<R, QueueError> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let name = self.name.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = inner.lock().map_err(|_| QueueError::Background {
                queue: name,
                message: "queue state poisoned".to_string(),
            })?;
            op(&mut guard)
        })
        .await
        .map_err(|e| QueueError::Background {
            queue: self.name.clone(),
            message: e.to_string(),
        })?
    }
}

#[async_trait]
impl TaskQueue for FileQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn push(&self, task: &Task) -> Result<(), QueueError> {
        let task = task.clone();
        self.with_inner(move |inner| inner.push(task)).await
    }

    async fn pop(&self) -> Result<Option<Task>, QueueError> {
        self.with_inner(|inner| inner.pop()).await
    }

    async fn len(&self) -> Result<usize, QueueError> {
        self.with_inner(|inner| Ok(inner.pending.iter().filter(|t| t.is_some()).count()))
            .await
    }
}

impl Inner {
    fn open(dir: PathBuf, name: &str, compact_threshold: u64) -> Result<Self, QueueError> {
        let io_err = |source| QueueError::Io {
            queue: name.to_string(),
            source,
        };

        fs::create_dir_all(&dir).map_err(io_err)?;
        remove_if_exists(&dir.join(CURSOR_TMP_FILE)).map_err(io_err)?;

        let (generation, consumed) = read_cursor(&dir, name)?;
        remove_other_generations(&dir, generation).map_err(io_err)?;

        let log_path = log_path(&dir, generation);
        let (entries, log_len) = replay(&log_path, name)?;

        let total = entries.len() as u64;
        if consumed > total {
            return Err(QueueError::Corrupt {
                queue: name.to_string(),
                message: format!("cursor at {consumed} but log has {total} entries"),
            });
        }
        let pending: VecDeque<Option<Task>> =
            entries.into_iter().skip(consumed as usize).collect();

        let log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .map_err(io_err)?;

        Ok(Self {
            name: name.to_string(),
            dir,
            generation,
            consumed,
            pending,
            log,
            log_len,
            compact_threshold,
        })
    }

    fn io(&self, source: io::Error) -> QueueError {
        QueueError::Io {
            queue: self.name.clone(),
            source,
        }
    }

    fn push(&mut self, task: Task) -> Result<(), QueueError> {
        let mut line = serde_json::to_string(&task).map_err(|source| QueueError::Encode {
            queue: self.name.clone(),
            source,
        })?;
        line.push('\n');

        let written = self
            .log
            .write_all(line.as_bytes())
            .and_then(|()| self.log.sync_data());
        if let Err(source) = written {
            // 途中まで書けた行を残すと次の append と混ざる
            let _ = self.log.set_len(self.log_len);
            return Err(self.io(source));
        }

        self.log_len += line.len() as u64;
        self.pending.push_back(Some(task));
        Ok(())
    }

    fn pop(&mut self) -> Result<Option<Task>, QueueError> {
        let mut taken = 0;
        let mut popped = None;
        while let Some(entry) = self.pending.pop_front() {
            taken += 1;
            match entry {
                Some(task) => {
                    popped = Some(task);
                    break;
                }
                None => {
                    tracing::warn!(queue = %self.name, "discarding undecodable queue entry");
                }
            }
        }
        if taken == 0 {
            return Ok(None);
        }

        if let Err(err) = write_cursor(&self.dir, self.generation, self.consumed + taken) {
            // Nothing was handed out: put the entry back where it was.
            if let Some(task) = popped {
                self.pending.push_front(Some(task));
            }
            return Err(self.io(err));
        }
        self.consumed += taken;

        if self.should_compact() {
            if let Err(err) = self.compact() {
                tracing::warn!(queue = %self.name, error = %err, "queue compaction failed");
            }
        }
        Ok(popped)
    }

    fn should_compact(&self) -> bool {
        self.consumed >= self.compact_threshold && self.consumed >= self.pending.len() as u64
    }

    /// Rewrites the pending entries into the next generation.
    fn compact(&mut self) -> Result<(), QueueError> {
        let next = self.generation + 1;
        let next_path = log_path(&self.dir, next);

        let mut len = 0u64;
        let written = (|| -> io::Result<File> {
            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&next_path)?;
            for task in self.pending.iter().flatten() {
                let mut line = serde_json::to_string(task).map_err(io::Error::other)?;
                line.push('\n');
                file.write_all(line.as_bytes())?;
                len += line.len() as u64;
            }
            file.sync_all()?;
            fsync_dir(&self.dir)?;
            write_cursor(&self.dir, next, 0)?;
            OpenOptions::new().append(true).open(&next_path)
        })();

        let log = match written {
            Ok(log) => log,
            Err(err) => {
                // The cursor may or may not have moved; only drop the new log
                // if it still points at the old generation.
                if matches!(read_cursor(&self.dir, &self.name), Ok((generation, _)) if generation == self.generation)
                {
                    let _ = remove_if_exists(&next_path);
                }
                return Err(self.io(err));
            }
        };

        let previous = log_path(&self.dir, self.generation);
        self.generation = next;
        self.consumed = 0;
        self.pending.retain(Option::is_some);
        self.log = log;
        self.log_len = len;

        remove_if_exists(&previous)
            .and_then(|()| fsync_dir(&self.dir))
            .map_err(|e| self.io(e))?;

        tracing::debug!(
            queue = %self.name,
            generation = self.generation,
            pending = self.pending.len(),
            "compacted queue log"
        );
        Ok(())
    }
}

fn log_path(dir: &Path, generation: u64) -> PathBuf {
    dir.join(format!("tasks.{generation}.log"))
}

fn read_cursor(dir: &Path, name: &str) -> Result<(u64, u64), QueueError> {
    let raw = match fs::read_to_string(dir.join(CURSOR_FILE)) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok((0, 0)),
        Err(source) => {
            return Err(QueueError::Io {
                queue: name.to_string(),
                source,
            });
        }
    };

    let corrupt = || QueueError::Corrupt {
        queue: name.to_string(),
        message: format!("unreadable cursor {:?}", raw.trim()),
    };
    let mut parts = raw.split_whitespace();
    let generation = parts.next().and_then(|p| p.parse().ok()).ok_or_else(corrupt)?;
    let consumed = parts.next().and_then(|p| p.parse().ok()).ok_or_else(corrupt)?;
    Ok((generation, consumed))
}

fn write_cursor(dir: &Path, generation: u64, consumed: u64) -> io::Result<()> {
    let tmp = dir.join(CURSOR_TMP_FILE);
    {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp)?;
        writeln!(file, "{generation} {consumed}")?;
        file.sync_all()?;
    }
    fs::rename(&tmp, dir.join(CURSOR_FILE))?;
    fsync_dir(dir)
}

/// Reads every complete line of the log.
///
/// Returns the decoded entries and the byte length of the valid prefix. An
/// unterminated last line is cut off the file.
fn replay(path: &Path, name: &str) -> Result<(Vec<Option<Task>>, u64), QueueError> {
    let io_err = |source| QueueError::Io {
        queue: name.to_string(),
        source,
    };

    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok((Vec::new(), 0)),
        Err(e) => return Err(io_err(e)),
    };
    let file_len = file.metadata().map_err(io_err)?.len();

    let mut reader = BufReader::new(file);
    let mut entries = Vec::new();
    let mut valid_len = 0u64;
    let mut line = String::new();
    loop {
        line.clear();
        let read = reader.read_line(&mut line).map_err(io_err)?;
        if read == 0 {
            break;
        }
        if !line.ends_with('\n') {
            break;
        }
        valid_len += read as u64;

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<Task>(trimmed) {
            Ok(task) => entries.push(Some(task)),
            Err(err) => {
                tracing::warn!(queue = name, error = %err, "undecodable line in queue log");
                entries.push(None);
            }
        }
    }

    if valid_len < file_len {
        tracing::warn!(
            queue = name,
            truncated_bytes = file_len - valid_len,
            "truncating torn tail of queue log"
        );
        let file = OpenOptions::new().write(true).open(path).map_err(io_err)?;
        file.set_len(valid_len).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
    }

    Ok((entries, valid_len))
}

fn remove_other_generations(dir: &Path, current: u64) -> io::Result<()> {
    let mut removed = false;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if let Some(generation) = name
            .strip_prefix("tasks.")
            .and_then(|s| s.strip_suffix(".log"))
            .and_then(|s| s.parse::<u64>().ok())
            && generation != current
        {
            fs::remove_file(entry.path())?;
            removed = true;
        }
    }
    if removed {
        fsync_dir(dir)?;
    }
    Ok(())
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Makes renames and deletions inside `dir` durable.
fn fsync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn names(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(Task::key).collect()
    }

    async fn drain(queue: &FileQueue) -> Vec<Task> {
        let mut out = Vec::new();
        while let Some(task) = queue.pop().await.unwrap() {
            out.push(task);
        }
        out
    }

    #[tokio::test]
    async fn pop_on_empty_queue_returns_none() {
        let dir = tempdir().unwrap();
        let queue = FileQueue::open(dir.path(), "followee.queue").unwrap();
        assert_eq!(queue.pop().await.unwrap(), None);
        assert!(queue.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn unpopped_tasks_survive_reopen_in_order() {
        let dir = tempdir().unwrap();
        {
            let queue = FileQueue::open(dir.path(), "followee.queue").unwrap();
            for name in ["alice", "bob", "carol", "dave"] {
                queue.push(&Task::followee(name)).await.unwrap();
            }
            assert_eq!(queue.pop().await.unwrap(), Some(Task::followee("alice")));
        }

        let queue = FileQueue::open(dir.path(), "followee.queue").unwrap();
        assert_eq!(queue.len().await.unwrap(), 3);
        let rest = drain(&queue).await;
        assert_eq!(names(&rest), vec!["bob", "carol", "dave"]);
    }

    #[tokio::test]
    async fn queues_with_different_names_are_independent() {
        let dir = tempdir().unwrap();
        let followees = FileQueue::open(dir.path(), "followee.queue").unwrap();
        let repos = FileQueue::open(dir.path(), "repository.queue").unwrap();

        followees.push(&Task::followee("alice")).await.unwrap();
        repos.push(&Task::repository("x/y")).await.unwrap();

        assert_eq!(repos.pop().await.unwrap(), Some(Task::repository("x/y")));
        assert_eq!(repos.pop().await.unwrap(), None);
        assert_eq!(followees.pop().await.unwrap(), Some(Task::followee("alice")));
    }

    #[tokio::test]
    async fn torn_tail_is_truncated_and_appends_continue() {
        let dir = tempdir().unwrap();
        {
            let queue = FileQueue::open(dir.path(), "q").unwrap();
            queue.push(&Task::followee("alice")).await.unwrap();
        }
        let log = dir.path().join("q").join("tasks.0.log");
        let mut file = OpenOptions::new().append(true).open(&log).unwrap();
        file.write_all(br#"{"stage":"followee","na"#).unwrap();
        drop(file);

        let queue = FileQueue::open(dir.path(), "q").unwrap();
        queue.push(&Task::followee("bob")).await.unwrap();
        drop(queue);

        let queue = FileQueue::open(dir.path(), "q").unwrap();
        assert_eq!(names(&drain(&queue).await), vec!["alice", "bob"]);
    }

    #[tokio::test]
    async fn undecodable_lines_are_skipped() {
        let dir = tempdir().unwrap();
        let qdir = dir.path().join("q");
        fs::create_dir_all(&qdir).unwrap();
        fs::write(
            qdir.join("tasks.0.log"),
            concat!(
                r#"{"stage":"followee","name":"alice"}"#,
                "\n",
                r#"{"stage":"unknown","name":"zed"}"#,
                "\n",
                r#"{"stage":"followee","name":"bob"}"#,
                "\n"
            ),
        )
        .unwrap();

        let queue = FileQueue::open(dir.path(), "q").unwrap();
        assert_eq!(queue.len().await.unwrap(), 2);
        assert_eq!(queue.pop().await.unwrap(), Some(Task::followee("alice")));
        assert_eq!(queue.pop().await.unwrap(), Some(Task::followee("bob")));
        drop(queue);

        // The skipped line counts as consumed.
        let queue = FileQueue::open(dir.path(), "q").unwrap();
        assert_eq!(queue.pop().await.unwrap(), None);
    }

    #[tokio::test]
    async fn compaction_moves_to_next_generation_and_keeps_order() {
        let dir = tempdir().unwrap();
        let queue = FileQueue::open_with_compaction(dir.path(), "q", 2).unwrap();
        for name in ["a", "b", "c", "d"] {
            queue.push(&Task::followee(name)).await.unwrap();
        }
        assert_eq!(queue.pop().await.unwrap(), Some(Task::followee("a")));
        assert_eq!(queue.pop().await.unwrap(), Some(Task::followee("b")));
        queue.push(&Task::followee("e")).await.unwrap();
        drop(queue);

        let qdir = dir.path().join("q");
        assert!(!qdir.join("tasks.0.log").exists());
        assert!(qdir.join("tasks.1.log").exists());
        assert_eq!(fs::read_to_string(qdir.join("cursor")).unwrap().trim(), "1 0");

        let queue = FileQueue::open_with_compaction(dir.path(), "q", 2).unwrap();
        assert_eq!(names(&drain(&queue).await), vec!["c", "d", "e"]);
    }

    #[tokio::test]
    async fn leftover_generation_from_interrupted_compaction_is_ignored() {
        let dir = tempdir().unwrap();
        {
            let queue = FileQueue::open(dir.path(), "q").unwrap();
            queue.push(&Task::followee("alice")).await.unwrap();
        }
        // Compaction crashed after writing the new log but before the cursor.
        let qdir = dir.path().join("q");
        fs::write(qdir.join("tasks.1.log"), "").unwrap();

        let queue = FileQueue::open(dir.path(), "q").unwrap();
        assert!(!qdir.join("tasks.1.log").exists());
        assert_eq!(queue.pop().await.unwrap(), Some(Task::followee("alice")));
    }

    #[tokio::test]
    async fn cursor_past_end_of_log_is_corrupt() {
        let dir = tempdir().unwrap();
        let qdir = dir.path().join("q");
        fs::create_dir_all(&qdir).unwrap();
        fs::write(qdir.join("cursor"), "0 5\n").unwrap();

        let result = FileQueue::open(dir.path(), "q");
        assert!(matches!(result, Err(QueueError::Corrupt { .. })));
    }
}
