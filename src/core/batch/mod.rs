//! # Batch Module
//!
//! Runs a handler over a work list in fixed-size batches on a bounded
//! worker pool.
//!
//! ## Guarantees
//! - Batches run in order; within a batch up to `workers` items run at once
//! - A failing item is recorded and never stops the rest of the run
//! - Progress is reported once per finished batch, as a cumulative count
//! - Cancellation is checked between batches only
//!
//! ## Example
//! ```rust,ignore
//! let report = BatchRunner::new(50).workers(4).run(&items, |item| index(item));
//! for failure in &report.failures {
//!     eprintln!("item {} failed: {}", failure.index, failure.error);
//! }
//! ```

mod cancellation;

pub use cancellation::CancellationToken;

use crate::events::{BatchEvent, BatchProgress, Event, EventSender};
use rayon::prelude::*;
use rayon::ThreadPool;
use tracing::{debug, warn};

/// A handler failure, with the position of the item in the input
#[derive(Debug, Clone, PartialEq)]
pub struct ItemFailure<E> {
    pub index: usize,
    pub error: E,
}

/// Outcome of a batch run
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport<E> {
    /// Items in the input
    pub total: usize,
    /// Items handed to the handler
    pub processed: usize,
    /// Handlers that returned `Ok`
    pub succeeded: usize,
    /// Failed items, in input order
    pub failures: Vec<ItemFailure<E>>,
    /// Cumulative processed count after each batch
    pub progress: Vec<usize>,
    /// Run stopped early at a batch boundary
    pub cancelled: bool,
}

impl<E> BatchReport<E> {
    fn new(total: usize) -> Self {
        Self {
            total,
            processed: 0,
            succeeded: 0,
            failures: Vec::new(),
            progress: Vec::new(),
            cancelled: false,
        }
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

/// Bounded batch executor
pub struct BatchRunner {
    batch_size: usize,
    workers: usize,
    events: Option<EventSender>,
    cancellation: Option<CancellationToken>,
}

impl BatchRunner {
    /// Create a runner; a batch size of 0 is treated as 1
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            workers: 1,
            events: None,
            cancellation: None,
        }
    }

    /// Number of items processed concurrently (at least 1)
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn emit(&self, event: BatchEvent) {
        if let Some(sender) = &self.events {
            sender.send(Event::Batch(event));
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .map(CancellationToken::is_cancelled)
            .unwrap_or(false)
    }

    fn build_pool(&self) -> Option<ThreadPool> {
        if self.workers <= 1 {
            return None;
        }
        match rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("photo-index-worker-{}", i))
            .build()
        {
            Ok(pool) => Some(pool),
            Err(e) => {
                warn!("Could not start {} workers, running sequentially: {}", self.workers, e);
                None
            }
        }
    }

    /// Run `handler` over every item.
    ///
    /// Results are collected in input order regardless of which worker
    /// handled an item.
    pub fn run<T, E, F>(&self, items: &[T], handler: F) -> BatchReport<E>
    where
        T: Sync,
        E: Send,
        F: Fn(&T) -> Result<(), E> + Sync,
    {
        let mut report = BatchReport::new(items.len());
        self.emit(BatchEvent::Started {
            total: items.len(),
            batch_size: self.batch_size,
        });

        let pool = self.build_pool();

        for (batch_index, batch) in items.chunks(self.batch_size).enumerate() {
            if self.is_cancelled() {
                report.cancelled = true;
                debug!("Batch run cancelled after {} items", report.processed);
                self.emit(BatchEvent::Cancelled {
                    processed: report.processed,
                });
                return report;
            }

            let offset = batch_index * self.batch_size;
            let results: Vec<Result<(), E>> = match &pool {
                Some(pool) => pool.install(|| batch.par_iter().map(&handler).collect()),
                None => batch.iter().map(&handler).collect(),
            };

            for (position, result) in results.into_iter().enumerate() {
                match result {
                    Ok(()) => report.succeeded += 1,
                    Err(error) => report.failures.push(ItemFailure {
                        index: offset + position,
                        error,
                    }),
                }
            }

            report.processed += batch.len();
            report.progress.push(report.processed);
            self.emit(BatchEvent::Progress(BatchProgress {
                processed: report.processed,
                total: report.total,
                failed: report.failures.len(),
            }));
        }

        self.emit(BatchEvent::Completed {
            processed: report.processed,
            failed: report.failures.len(),
        });
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventChannel;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[test]
    fn reports_cumulative_progress_per_batch() {
        let items: Vec<usize> = (1..=120).collect();
        let report = BatchRunner::new(50).run(&items, |_| Ok::<(), String>(()));

        assert_eq!(report.progress, vec![50, 100, 120]);
        assert_eq!(report.processed, 120);
        assert_eq!(report.succeeded, 120);
        assert!(!report.cancelled);
    }

    #[test]
    fn failing_item_does_not_stop_the_run() {
        let items: Vec<usize> = (1..=120).collect();
        let seen = Mutex::new(HashSet::new());

        let report = BatchRunner::new(50).workers(4).run(&items, |item| {
            seen.lock().unwrap().insert(*item);
            if *item == 75 {
                Err(format!("item {} exploded", item))
            } else {
                Ok(())
            }
        });

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].index, 74);
        assert!(report.failures[0].error.contains("75"));
        assert_eq!(report.succeeded, 119);
        let seen = seen.into_inner().unwrap();
        assert!((76..=120).all(|i| seen.contains(&i)));
    }

    #[test]
    fn zero_batch_size_is_coerced() {
        let runner = BatchRunner::new(0);
        assert_eq!(runner.batch_size(), 1);

        let report = runner.run(&[1, 2, 3], |_| Ok::<(), ()>(()));
        assert_eq!(report.progress, vec![1, 2, 3]);
    }

    #[test]
    fn empty_input_reports_nothing() {
        let items: Vec<u8> = Vec::new();
        let report = BatchRunner::new(10).run(&items, |_| Ok::<(), ()>(()));
        assert!(report.progress.is_empty());
        assert_eq!(report.total, 0);
    }

    #[test]
    fn cancellation_stops_between_batches() {
        let items: Vec<usize> = (0..100).collect();
        let token = CancellationToken::new();
        let handled = AtomicUsize::new(0);

        let report = BatchRunner::new(10)
            .cancellation(token.clone())
            .run(&items, |item| {
                handled.fetch_add(1, Ordering::SeqCst);
                if *item == 25 {
                    token.cancel();
                }
                Ok::<(), ()>(())
            });

        assert!(report.cancelled);
        assert_eq!(handled.load(Ordering::SeqCst), 30);
        assert_eq!(report.progress, vec![10, 20, 30]);
    }

    #[test]
    fn parallel_workers_preserve_failure_order() {
        let items: Vec<usize> = (0..40).collect();
        let report = BatchRunner::new(16).workers(8).run(&items, |item| {
            if item % 7 == 0 {
                Err(*item)
            } else {
                Ok(())
            }
        });

        let indices: Vec<usize> = report.failures.iter().map(|f| f.index).collect();
        assert_eq!(indices, vec![0, 7, 14, 21, 28, 35]);
        let errors: Vec<usize> = report.failures.iter().map(|f| f.error).collect();
        assert_eq!(errors, indices);
    }

    #[test]
    fn emits_progress_events() {
        let (sender, receiver) = EventChannel::new();
        let items: Vec<usize> = (0..120).collect();

        BatchRunner::new(50)
            .events(sender)
            .run(&items, |_| Ok::<(), ()>(()));

        let progress: Vec<usize> = receiver
            .drain()
            .into_iter()
            .filter_map(|e| match e {
                Event::Batch(BatchEvent::Progress(p)) => Some(p.processed),
                _ => None,
            })
            .collect();
        assert_eq!(progress, vec![50, 100, 120]);
    }
}
