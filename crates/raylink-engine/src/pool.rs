//! Worker-side thread pool.
//!
//! Each pool thread gets its own store and instance, all bound to the session's shared memory,
//! and then runs the module's `pool_worker` export. Threads are held back until all of them have
//! instantiated, so a pool either starts whole or not at all. The pool has no teardown: threads
//! live until their `pool_worker` call returns or the process exits.

use std::num::NonZeroUsize;
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};

use crate::host::InstanceRole;
use crate::loader::CompiledModule;
use crate::memory::SharedMemoryHandle;
use crate::EngineError;

/// Parallelism reported by the host, if any.
pub fn hardware_concurrency() -> Option<usize> {
    thread::available_parallelism().ok().map(NonZeroUsize::get)
}

/// Pool size for a parallelism hint. A hint of zero, or no hint at all, still yields one thread.
pub fn thread_count(hint: Option<usize>) -> NonZeroUsize {
    hint.and_then(NonZeroUsize::new).unwrap_or(NonZeroUsize::MIN)
}

enum Release {
    Run,
    Abort,
}

/// Tell every spawned thread to give up, then wait for all of them to exit.
fn abort(releases: Vec<mpsc::Sender<Release>>, threads: Vec<JoinHandle<()>>) {
    for release in releases {
        let _ = release.send(Release::Abort);
    }
    for thread in threads {
        if thread.join().is_err() {
            tracing::error!("pool thread panicked during aborted start");
        }
    }
}

pub struct ThreadPool {
    size: NonZeroUsize,
    threads: Vec<JoinHandle<()>>,
}

impl ThreadPool {
    /// Spawn `size` threads and instantiate the module on each.
    ///
    /// No thread enters `pool_worker` until every thread has instantiated. If any of them fails,
    /// none of them runs it: the others are released with an abort and joined before the error
    /// is returned.
    pub(crate) fn start(
        compiled: &CompiledModule,
        memory: &SharedMemoryHandle,
        options: &Arc<str>,
        size: NonZeroUsize,
    ) -> Result<Self, EngineError> {
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), EngineError>>();
        let mut threads = Vec::with_capacity(size.get());
        let mut releases = Vec::with_capacity(size.get());

        for index in 0..size.get() {
            let compiled = compiled.clone();
            let memory = memory.clone();
            let options = Arc::clone(options);
            let ready_tx = ready_tx.clone();
            let (release_tx, release_rx) = mpsc::channel::<Release>();

            let spawned = thread::Builder::new()
                .name(format!("raylink-pool-{index}"))
                .spawn(move || {
                    let span = tracing::info_span!("pool", index);
                    let _guard = span.enter();

                    let mut instance =
                        match compiled.instantiate(&memory, options, InstanceRole::Pool(index)) {
                            Ok(instance) => instance,
                            Err(err) => {
                                let _ = ready_tx.send(Err(err));
                                return;
                            }
                        };
                    let _ = ready_tx.send(Ok(()));
                    drop(ready_tx);

                    // A dropped sender means the pool was abandoned.
                    if !matches!(release_rx.recv(), Ok(Release::Run)) {
                        tracing::debug!("pool start aborted");
                        return;
                    }
                    match instance.pool_worker(index) {
                        Ok(()) => tracing::debug!("pool worker returned"),
                        Err(err) => tracing::error!("pool worker failed: {err}"),
                    }
                });
            match spawned {
                Ok(handle) => {
                    threads.push(handle);
                    releases.push(release_tx);
                }
                Err(err) => {
                    abort(releases, threads);
                    return Err(EngineError::SpawnThread(err));
                }
            }
        }
        drop(ready_tx);

        for ready in 0..size.get() {
            let failure = match ready_rx.recv() {
                Ok(Ok(())) => continue,
                Ok(Err(err)) => err,
                Err(_) => EngineError::PoolThreadLost {
                    ready,
                    expected: size.get(),
                },
            };
            abort(releases, threads);
            return Err(failure);
        }

        for release in releases {
            let _ = release.send(Release::Run);
        }
        tracing::info!(threads = size.get(), "thread pool initialised");
        Ok(Self { size, threads })
    }

    pub fn size(&self) -> NonZeroUsize {
        self.size
    }

    /// Number of pool threads whose `pool_worker` call has returned.
    pub fn finished_threads(&self) -> usize {
        self.threads
            .iter()
            .filter(|thread| thread.is_finished())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_count_never_returns_zero() {
        assert_eq!(thread_count(None).get(), 1);
        assert_eq!(thread_count(Some(0)).get(), 1);
        assert_eq!(thread_count(Some(1)).get(), 1);
        assert_eq!(thread_count(Some(12)).get(), 12);
    }

    #[test]
    fn hardware_concurrency_is_positive_when_reported() {
        if let Some(threads) = hardware_concurrency() {
            assert!(threads >= 1);
        }
    }
}
