//! Generational cache of per-line annotations.
//!
//! Each collection cycle bumps the generation and runs every registered
//! `HintProvider` once, synchronously and in registration order. Providers
//! push `(moment, line, hints)` triples through a `HintSink`; the sink keeps
//! the index sorted by `(MomentId, line)` and:
//! - re-marks an existing entry whose hints are unchanged,
//! - replaces an entry whose hints differ,
//! - inserts a missing entry at its sorted position.
//!
//! After all providers ran, entries not marked with the current generation
//! are pruned. Any insert, replace or prune marks the cycle as changed, which
//! publishes a new snapshot and emits `HintsChanged` + `RenderRequested`.
//!
//! Readers only ever see published snapshots (`Arc<[LineHint]>`), so a slow
//! provider never blocks `snapshot()`.

use core_events::{Event, EventSink, NoopEventSink};
use core_state::MomentId;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, trace};

pub const DEFAULT_INITIAL_GENERATION: u64 = 42;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineHint {
    pub moment: MomentId,
    pub line: usize,
    pub hints: Vec<String>,
    mark: u64,
}

impl LineHint {
    /// Generation of the cycle that last confirmed this entry.
    pub fn generation(&self) -> u64 {
        self.mark
    }
}

/// Source of line hints, run once per collection cycle.
pub trait HintProvider: Send + Sync {
    fn collect(&self, sink: &mut HintSink<'_>);
}

/// Insertion handle passed to providers during a cycle.
pub struct HintSink<'a> {
    entries: &'a mut Vec<LineHint>,
    mark: u64,
    changed: bool,
}

impl HintSink<'_> {
    pub fn add(&mut self, moment: MomentId, line: usize, hints: Vec<String>) {
        let key = (moment, line);
        match self.entries.binary_search_by(|h| (h.moment, h.line).cmp(&key)) {
            Ok(i) => {
                let entry = &mut self.entries[i];
                if entry.hints == hints {
                    entry.mark = self.mark;
                } else {
                    *entry = LineHint {
                        moment,
                        line,
                        hints,
                        mark: self.mark,
                    };
                    self.changed = true;
                }
            }
            Err(i) => {
                self.entries.insert(
                    i,
                    LineHint {
                        moment,
                        line,
                        hints,
                        mark: self.mark,
                    },
                );
                self.changed = true;
            }
        }
    }

    pub fn generation(&self) -> u64 {
        self.mark
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub generation: u64,
    pub changed: bool,
    pub entries: usize,
    pub pruned: usize,
}

struct HintState {
    entries: Vec<LineHint>,
    generation: u64,
}

pub struct HintCache {
    state: Mutex<HintState>,
    published: RwLock<Arc<[LineHint]>>,
    providers: RwLock<Vec<Arc<dyn HintProvider>>>,
    events: Arc<dyn EventSink>,
}

impl Default for HintCache {
    fn default() -> Self {
        Self::new(DEFAULT_INITIAL_GENERATION, Arc::new(NoopEventSink))
    }
}

impl HintCache {
    pub fn new(initial_generation: u64, events: Arc<dyn EventSink>) -> Self {
        Self {
            state: Mutex::new(HintState {
                entries: Vec::new(),
                generation: initial_generation,
            }),
            published: RwLock::new(Arc::from(Vec::new())),
            providers: RwLock::new(Vec::new()),
            events,
        }
    }

    pub fn register(&self, provider: Arc<dyn HintProvider>) {
        self.providers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(provider);
    }

    pub fn generation(&self) -> u64 {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).generation
    }

    /// Last published index, sorted by `(moment, line)`.
    pub fn snapshot(&self) -> Arc<[LineHint]> {
        self.published
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Hints for one line from the last published snapshot.
    pub fn hints_for(&self, moment: MomentId, line: usize) -> Option<Vec<String>> {
        let snapshot = self.snapshot();
        snapshot
            .binary_search_by(|h| (h.moment, h.line).cmp(&(moment, line)))
            .ok()
            .map(|i| snapshot[i].hints.clone())
    }

    /// Run one collection cycle. Cycles are serialized.
    pub fn collect_cycle(&self) -> CycleReport {
        let providers: Vec<Arc<dyn HintProvider>> = self
            .providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.generation += 1;
        let mark = state.generation;

        let mut sink = HintSink {
            entries: &mut state.entries,
            mark,
            changed: false,
        };
        for provider in &providers {
            provider.collect(&mut sink);
        }
        let mut changed = sink.changed;

        let before = state.entries.len();
        state.entries.retain(|h| h.mark == mark);
        let pruned = before - state.entries.len();
        changed |= pruned > 0;

        let report = CycleReport {
            generation: mark,
            changed,
            entries: state.entries.len(),
            pruned,
        };
        if changed {
            let next: Arc<[LineHint]> = Arc::from(state.entries.clone());
            *self.published.write().unwrap_or_else(PoisonError::into_inner) = next;
        }
        drop(state);

        if changed {
            debug!(
                target: "hints",
                generation = report.generation,
                entries = report.entries,
                pruned = report.pruned,
                "hints_changed"
            );
            self.events.emit(Event::HintsChanged {
                generation: report.generation,
            });
            self.events.emit(Event::RenderRequested);
        } else {
            trace!(target: "hints", generation = report.generation, "hints_unchanged");
        }
        report
    }
}
