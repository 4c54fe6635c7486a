//! The optional asynchronous prefetch buffer (§5): a single background
//! worker thread filling a bounded, mutex-guarded ring of pre-generated
//! outputs.
//!
//! `Oneshot` fills the buffer once and the worker thread exits; `Refill`
//! parks the worker on a condvar whenever the buffer is full and wakes it
//! whenever a consumer pops a slot free. `VecDeque::pop_front` is the pop
//! primitive throughout, so a popped value is always a moved-out owned
//! value, never a live pointer into the backing storage.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use nanofuzz_core::prng::Prng;
use nanofuzz_vm::{Factory, Generator, Output};

use crate::error::{Error, Result};

/// How the prefetch worker keeps the ring buffer topped up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefetchMode {
    /// Fill the buffer once, then stop.
    Oneshot,
    /// Keep refilling as the consumer drains, for the lifetime of the
    /// context.
    Refill,
}

struct Shared {
    queue: Mutex<VecDeque<Output>>,
    not_full: Condvar,
    capacity: usize,
    stop: AtomicBool,
}

/// Owns the background thread and the shared ring buffer it fills.
pub struct PrefetchWorker {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl PrefetchWorker {
    pub fn spawn(factory: Arc<Factory>, buffer_capacity: u64, mut prng: Prng, capacity: usize, mode: PrefetchMode) -> Self {
        let shared = Arc::new(Shared {
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            not_full: Condvar::new(),
            capacity,
            stop: AtomicBool::new(false),
        });

        let worker_shared = shared.clone();
        let handle = std::thread::spawn(move || {
            tracing::debug!(capacity, ?mode, "prefetch worker starting");
            let mut generator = Generator::new(factory, buffer_capacity);

            loop {
                if worker_shared.stop.load(Ordering::Acquire) {
                    break;
                }

                {
                    let mut queue = worker_shared.queue.lock().unwrap();
                    while queue.len() >= worker_shared.capacity {
                        if worker_shared.stop.load(Ordering::Acquire) {
                            tracing::debug!("prefetch worker stopping");
                            return;
                        }
                        match mode {
                            PrefetchMode::Oneshot => {
                                tracing::debug!("prefetch worker finished one-shot fill");
                                return;
                            }
                            PrefetchMode::Refill => {
                                queue = worker_shared.not_full.wait(queue).unwrap();
                            }
                        }
                    }
                }

                if let Some(output) = generator.generate(&mut prng) {
                    let mut queue = worker_shared.queue.lock().unwrap();
                    queue.push_back(output);
                    tracing::trace!(queued = queue.len(), "prefetch worker filled one slot");
                }
            }
        });

        PrefetchWorker { shared, handle: Some(handle) }
    }

    /// Pop one pre-generated output, if any is ready.
    pub fn pop(&self) -> Option<Output> {
        let mut queue = self.shared.queue.lock().unwrap();
        let popped = queue.pop_front();
        drop(queue);
        if popped.is_some() {
            self.shared.not_full.notify_one();
        }
        popped
    }

    /// Signal the worker to stop and join it.
    pub fn stop(mut self) -> Result<()> {
        self.stop_inner()
    }

    fn stop_inner(&mut self) -> Result<()> {
        self.shared.stop.store(true, Ordering::Release);
        self.shared.not_full.notify_all();
        if let Some(handle) = self.handle.take() {
            handle.join().map_err(|_| Error::PrefetchWorkerPanicked)?;
        }
        Ok(())
    }
}

impl Drop for PrefetchWorker {
    fn drop(&mut self) {
        let _ = self.stop_inner();
    }
}
