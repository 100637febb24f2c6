use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{bounded, select, unbounded, Sender};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, warn};

/// Tracks one shader file and the text last handed to the preview.
pub struct FileWatcher {
    path: PathBuf,
    contents: String,
}

impl FileWatcher {
    /// Starts watching from the file's current contents.
    pub fn new(path: impl Into<PathBuf>, contents: String) -> Self {
        Self {
            path: path.into(),
            contents,
        }
    }

    /// Re-reads the file and returns its text when it differs from the last
    /// text seen.
    pub fn refresh(&mut self) -> io::Result<Option<String>> {
        let contents = fs::read_to_string(&self.path)?;
        if contents == self.contents {
            return Ok(None);
        }
        self.contents = contents.clone();
        Ok(Some(contents))
    }

    /// Watches the file's directory and hands each change to `sink`, which
    /// returns `false` once nobody is listening any more. Events arriving
    /// within `debounce` of each other collapse into one re-read.
    pub fn spawn<F>(mut self, debounce: Duration, mut sink: F) -> Result<WatchHandle>
    where
        F: FnMut(String) -> bool + Send + 'static,
    {
        let file_name = self
            .path
            .file_name()
            .map(OsString::from)
            .ok_or_else(|| anyhow!("{} does not name a file", self.path.display()))?;
        let directory = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let (event_tx, event_rx) = unbounded::<()>();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            match res {
                Ok(event) => {
                    // Atomic saves rename a temp file over ours, so watch the
                    // directory and match by name.
                    let relevant = matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_))
                        && event
                            .paths
                            .iter()
                            .any(|path| path.file_name() == Some(file_name.as_os_str()));
                    if relevant {
                        let _ = event_tx.send(());
                    }
                }
                Err(err) => warn!(error = %err, "file watch error"),
            }
        })
        .context("failed to create file watcher")?;
        watcher
            .watch(&directory, RecursiveMode::NonRecursive)
            .with_context(|| format!("failed to watch {}", directory.display()))?;

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let handle = thread::Builder::new()
            .name("vjmix-watch".into())
            .spawn(move || loop {
                select! {
                    recv(stop_rx) -> _ => break,
                    recv(event_rx) -> event => {
                        if event.is_err() {
                            break;
                        }
                        while event_rx.recv_timeout(debounce).is_ok() {}
                        if !self.forward(&mut sink) {
                            break;
                        }
                    }
                }
            })
            .context("failed to spawn file watcher thread")?;

        Ok(WatchHandle {
            stop: Some(stop_tx),
            join_handle: Some(handle),
            _watcher: watcher,
        })
    }

    fn forward<F>(&mut self, sink: &mut F) -> bool
    where
        F: FnMut(String) -> bool,
    {
        match self.refresh() {
            Ok(Some(contents)) => {
                debug!(path = %self.path.display(), bytes = contents.len(), "shader file changed");
                sink(contents)
            }
            Ok(None) => true,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "shader file missing; waiting for it to return");
                true
            }
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "failed to read shader file");
                true
            }
        }
    }
}

/// Stops the watcher thread and the OS watch when dropped.
pub struct WatchHandle {
    stop: Option<Sender<()>>,
    join_handle: Option<JoinHandle<()>>,
    _watcher: RecommendedWatcher,
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.try_send(());
        }
        if let Some(handle) = self.join_handle.take() {
            let _ = handle.join();
        }
    }
}
