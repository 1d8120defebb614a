//! Fixed-size worker pool draining two bounded queues.
//!
//! * Line queue: batches of freshly constructed lines whose layout is
//!   computed ahead of first use. Submission never blocks; a full queue drops
//!   the batch and the lines lay themselves out on demand instead.
//! * Row queue: per-row render jobs fanned out by [`WorkerPool::run_rows`],
//!   which blocks the caller until every row has reported back.
//!
//! Every worker selects over both queues, so a long line backlog does not
//! starve rendering entirely. No ordering is guaranteed between batches.

use core_config::WorkerConfig;
use core_events::{Event, EventSink, NoopEventSink};
use core_text::{Line, LineObserver};
use crossbeam_channel::{Receiver, Sender, TrySendError, never, select};
use std::cell::Cell;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;
use tracing::{debug, trace};

pub static BATCHES_ENQUEUED: AtomicU64 = AtomicU64::new(0);
pub static BATCHES_DROPPED: AtomicU64 = AtomicU64::new(0);
pub static LINES_INITIALIZED: AtomicU64 = AtomicU64::new(0);
pub static ROWS_RENDERED: AtomicU64 = AtomicU64::new(0);
pub static ROWS_INLINE: AtomicU64 = AtomicU64::new(0);

type RowJob = Box<dyn FnOnce() + Send + 'static>;

thread_local! {
    static ON_WORKER: Cell<bool> = const { Cell::new(false) };
}

/// Line observer splitting layouts by where they ran: on a pool worker
/// (batch init or a row job) or on demand on any other thread.
#[derive(Debug, Default)]
pub struct LayoutProgress {
    background: AtomicU64,
    on_demand: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutProgressSnapshot {
    pub background: u64,
    pub on_demand: u64,
}

impl LayoutProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> LayoutProgressSnapshot {
        LayoutProgressSnapshot {
            background: self.background.load(Ordering::Relaxed),
            on_demand: self.on_demand.load(Ordering::Relaxed),
        }
    }
}

impl LineObserver for LayoutProgress {
    fn line_initialized(&self, _line: &Line) {
        if ON_WORKER.with(Cell::get) {
            self.background.fetch_add(1, Ordering::Relaxed);
        } else {
            self.on_demand.fetch_add(1, Ordering::Relaxed);
        }
    }
}

pub struct WorkerPool {
    line_tx: Option<Sender<Vec<Arc<Line>>>>,
    row_tx: Option<Sender<RowJob>>,
    handles: Vec<JoinHandle<()>>,
    config: WorkerConfig,
}

impl WorkerPool {
    pub fn new(config: WorkerConfig) -> io::Result<Self> {
        Self::with_sink(config, Arc::new(NoopEventSink))
    }

    /// Pool that reports finished line batches to `sink`.
    pub fn with_sink(config: WorkerConfig, sink: Arc<dyn EventSink>) -> io::Result<Self> {
        let threads = config.threads.max(1);
        let (line_tx, line_rx) = crossbeam_channel::bounded(config.line_queue.max(1));
        let (row_tx, row_rx) = crossbeam_channel::bounded(config.row_queue.max(1));
        let mut handles = Vec::with_capacity(threads);
        for i in 0..threads {
            let line_rx = line_rx.clone();
            let row_rx = row_rx.clone();
            let sink = sink.clone();
            let handle = std::thread::Builder::new()
                .name(format!("quire-worker-{i}"))
                .spawn(move || worker_loop(line_rx, row_rx, sink))?;
            handles.push(handle);
        }
        debug!(
            target: "workers",
            threads,
            line_queue = config.line_queue,
            row_queue = config.row_queue,
            "pool_started"
        );
        Ok(Self {
            line_tx: Some(line_tx),
            row_tx: Some(row_tx),
            handles,
            config: WorkerConfig { threads, ..config },
        })
    }

    pub fn threads(&self) -> usize {
        self.config.threads
    }

    /// Best-effort enqueue of a batch for background layout. Returns whether
    /// the batch was accepted; empty batches are ignored.
    pub fn submit_lines(&self, lines: Vec<Arc<Line>>) -> bool {
        if lines.is_empty() {
            return false;
        }
        let Some(tx) = self.line_tx.as_ref() else {
            return false;
        };
        let count = lines.len();
        match tx.try_send(lines) {
            Ok(()) => {
                BATCHES_ENQUEUED.fetch_add(1, Ordering::Relaxed);
                trace!(target: "workers", lines = count, "batch_enqueued");
                true
            }
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                BATCHES_DROPPED.fetch_add(1, Ordering::Relaxed);
                debug!(target: "workers", lines = count, "batch_dropped");
                false
            }
        }
    }

    /// Compute `job(row)` for every row in `0..rows` and return the results in
    /// row order. Jobs run on pool workers when the row queue has room and
    /// inline on the calling thread otherwise. Returns once all rows are done.
    ///
    /// Must not be called from a pool worker.
    pub fn run_rows<T, F>(&self, rows: usize, job: F) -> Vec<T>
    where
        T: Send + 'static,
        F: Fn(usize) -> T + Send + Sync + 'static,
    {
        let job = Arc::new(job);
        let mut results: Vec<Option<T>> = (0..rows).map(|_| None).collect();
        let (done_tx, done_rx) = crossbeam_channel::bounded::<(usize, T)>(rows.max(1));
        let mut dispatched = 0usize;
        for row in 0..rows {
            let queued = match self.row_tx.as_ref() {
                Some(tx) => {
                    let job = job.clone();
                    let done_tx = done_tx.clone();
                    let task: RowJob = Box::new(move || {
                        let _ = done_tx.send((row, (*job)(row)));
                    });
                    tx.try_send(task).is_ok()
                }
                None => false,
            };
            if queued {
                dispatched += 1;
            } else {
                ROWS_INLINE.fetch_add(1, Ordering::Relaxed);
                results[row] = Some((*job)(row));
            }
        }
        drop(done_tx);
        // Completion barrier: every dispatched job either reports or, if it
        // panicked, drops its sender so the loop ends early.
        for _ in 0..dispatched {
            match done_rx.recv() {
                Ok((row, value)) => results[row] = Some(value),
                Err(_) => break,
            }
        }
        ROWS_RENDERED.fetch_add(rows as u64, Ordering::Relaxed);
        results
            .into_iter()
            .enumerate()
            .map(|(row, slot)| slot.unwrap_or_else(|| (*job)(row)))
            .collect()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.line_tx.take();
        self.row_tx.take();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
        debug!(target: "workers", "pool_stopped");
    }
}

fn worker_loop(line_rx: Receiver<Vec<Arc<Line>>>, row_rx: Receiver<RowJob>, sink: Arc<dyn EventSink>) {
    ON_WORKER.with(|flag| flag.set(true));
    let mut line_rx = line_rx;
    let mut row_rx = row_rx;
    let mut lines_open = true;
    let mut rows_open = true;
    while lines_open || rows_open {
        select! {
            recv(line_rx) -> msg => match msg {
                Ok(batch) => init_batch(&batch, sink.as_ref()),
                Err(_) => {
                    lines_open = false;
                    line_rx = never();
                }
            },
            recv(row_rx) -> msg => match msg {
                Ok(task) => task(),
                Err(_) => {
                    rows_open = false;
                    row_rx = never();
                }
            },
        }
    }
}

fn init_batch(batch: &[Arc<Line>], sink: &dyn EventSink) {
    // Tail first; the viewport usually lays out the head on demand.
    for line in batch.iter().rev() {
        line.init();
    }
    LINES_INITIALIZED.fetch_add(batch.len() as u64, Ordering::Relaxed);
    trace!(target: "workers", lines = batch.len(), "batch_initialized");
    sink.emit(Event::LinesReady { count: batch.len() });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerTelemetrySnapshot {
    pub batches_enqueued: u64,
    pub batches_dropped: u64,
    pub lines_initialized: u64,
    pub rows_rendered: u64,
    pub rows_inline: u64,
}

pub fn telemetry_snapshot() -> WorkerTelemetrySnapshot {
    WorkerTelemetrySnapshot {
        batches_enqueued: BATCHES_ENQUEUED.load(Ordering::Relaxed),
        batches_dropped: BATCHES_DROPPED.load(Ordering::Relaxed),
        lines_initialized: LINES_INITIALIZED.load(Ordering::Relaxed),
        rows_rendered: ROWS_RENDERED.load(Ordering::Relaxed),
        rows_inline: ROWS_INLINE.load(Ordering::Relaxed),
    }
}
