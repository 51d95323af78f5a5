//! Debounced filesystem watcher. Each event arms a per-path debounce
//! timer; firing applies the change to the store through the indexer. A
//! secondary batch timer (twice the debounce) coalesces fired events into
//! grouped emissions for subscribers.

use crate::indexer::Indexer;
use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventKind {
    Add,
    Change,
    Delete,
}

#[derive(Debug, Clone)]
pub struct WatchEvent {
    pub path: PathBuf,
    pub kind: WatchEventKind,
}

#[derive(Debug, Clone)]
pub struct WatchBatch {
    pub events: Vec<WatchEvent>,
}

pub struct WatchHandle {
    stop: Sender<()>,
    thread: Option<thread::JoinHandle<()>>,
}

impl WatchHandle {
    pub fn stop(mut self) {
        let _ = self.stop.send(());
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        let _ = self.stop.send(());
    }
}

pub fn start(
    indexer: Arc<Indexer>,
    root: PathBuf,
    debounce: Duration,
    subscriber: Option<Sender<WatchBatch>>,
) -> Result<WatchHandle> {
    let (stop_tx, stop_rx) = mpsc::channel();
    let (event_tx, event_rx) = mpsc::channel();

    let mut watcher = RecommendedWatcher::new(
        move |result: notify::Result<Event>| {
            if let Ok(event) = result {
                let _ = event_tx.send(event);
            }
        },
        notify::Config::default(),
    )
    .context("create filesystem watcher")?;
    watcher
        .watch(&root, RecursiveMode::Recursive)
        .with_context(|| format!("watch {}", root.display()))?;

    let thread = thread::spawn(move || {
        // The watcher must stay alive inside the loop's thread.
        let _watcher = watcher;
        run_loop(indexer, root, debounce, stop_rx, event_rx, subscriber);
    });

    Ok(WatchHandle {
        stop: stop_tx,
        thread: Some(thread),
    })
}

fn run_loop(
    indexer: Arc<Indexer>,
    root: PathBuf,
    debounce: Duration,
    stop_rx: Receiver<()>,
    event_rx: Receiver<Event>,
    subscriber: Option<Sender<WatchBatch>>,
) {
    let batch_window = debounce * 2;
    let mut pending: HashMap<PathBuf, (WatchEventKind, Instant)> = HashMap::new();
    let mut batch: Vec<WatchEvent> = Vec::new();
    let mut batch_deadline: Option<Instant> = None;

    loop {
        if stop_rx.try_recv().is_ok() {
            break;
        }

        match event_rx.recv_timeout(POLL_INTERVAL) {
            Ok(event) => {
                let Some(kind) = classify(&event.kind) else {
                    continue;
                };
                let deadline = Instant::now() + debounce;
                for path in event.paths {
                    if !path.is_dir() {
                        pending.insert(path, (kind, deadline));
                    }
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        let now = Instant::now();
        let due: Vec<PathBuf> = pending
            .iter()
            .filter(|(_, (_, deadline))| *deadline <= now)
            .map(|(path, _)| path.clone())
            .collect();
        for path in due {
            let Some((kind, _)) = pending.remove(&path) else {
                continue;
            };
            if let Err(err) = indexer.sync_file(&root, &path) {
                eprintln!("symdex: watch sync {}: {err}", path.display());
                continue;
            }
            batch.push(WatchEvent { path, kind });
            if batch_deadline.is_none() {
                batch_deadline = Some(now + batch_window);
            }
        }

        if let Some(deadline) = batch_deadline {
            if deadline <= Instant::now() && !batch.is_empty() {
                if let Some(subscriber) = &subscriber {
                    let _ = subscriber.send(WatchBatch {
                        events: std::mem::take(&mut batch),
                    });
                } else {
                    batch.clear();
                }
                batch_deadline = None;
            }
        }
    }
}

fn classify(kind: &EventKind) -> Option<WatchEventKind> {
    match kind {
        EventKind::Create(_) => Some(WatchEventKind::Add),
        EventKind::Modify(_) => Some(WatchEventKind::Change),
        EventKind::Remove(_) => Some(WatchEventKind::Delete),
        _ => None,
    }
}
