use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex, MutexGuard, OnceLock,
};

use tessera_image::ImageError;

/// The estimated cost, in clock cycles, of starting one worker thread.
///
/// A framework only adds a thread for every `N_CLOCK_CYCLES_PER_THREAD` operations it expects
/// to perform.
pub const N_CLOCK_CYCLES_PER_THREAD: usize = 10_000;

/// Environment variable that overrides the default number of threads.
pub const NUM_THREADS_ENV: &str = "TESSERA_NUM_THREADS";

// zero means "use the default"
static NUM_THREADS: AtomicUsize = AtomicUsize::new(0);
static DEFAULT_NUM_THREADS: OnceLock<usize> = OnceLock::new();
static POOL: Mutex<Option<(usize, Arc<rayon::ThreadPool>)>> = Mutex::new(None);

/// The number of threads used when none was set explicitly.
///
/// Read once from `TESSERA_NUM_THREADS`, falling back to the available parallelism.
pub fn default_number_of_threads() -> usize {
    *DEFAULT_NUM_THREADS.get_or_init(|| {
        let from_env = std::env::var(NUM_THREADS_ENV)
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|&n| n > 0);
        match from_env {
            Some(n) => n,
            None => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    })
}

/// Sets the maximum number of threads the frameworks use. `0` restores the default.
pub fn set_number_of_threads(n: usize) {
    NUM_THREADS.store(n, Ordering::Relaxed);
}

/// The maximum number of threads the frameworks use.
pub fn get_number_of_threads() -> usize {
    match NUM_THREADS.load(Ordering::Relaxed) {
        0 => default_number_of_threads(),
        n => n,
    }
}

/// The number of threads worth starting for `operations` operations, at most `max_threads`.
pub fn threads_for_operations(max_threads: usize, operations: usize) -> usize {
    max_threads
        .min((operations / N_CLOCK_CYCLES_PER_THREAD).max(1))
        .max(1)
}

fn thread_pool(n_threads: usize) -> Option<Arc<rayon::ThreadPool>> {
    let mut guard = POOL.lock().unwrap_or_else(|e| e.into_inner());
    if let Some((n, pool)) = guard.as_ref() {
        if *n == n_threads {
            return Some(pool.clone());
        }
    }
    match rayon::ThreadPoolBuilder::new()
        .num_threads(n_threads)
        .thread_name(|ii| format!("tessera-worker-{ii}"))
        .build()
    {
        Ok(pool) => {
            let pool = Arc::new(pool);
            *guard = Some((n_threads, pool.clone()));
            Some(pool)
        }
        Err(e) => {
            log::warn!("failed to build a pool of {n_threads} threads ({e}), using the global one");
            None
        }
    }
}

/// A flag raised by the first worker that fails, polled by the others between lines.
#[derive(Debug, Default)]
pub struct StopFlag(AtomicBool);

impl StopFlag {
    /// True once a worker has failed.
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    fn set(&self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

/// Runs `work(thread, stop)` for `thread` in `0..n_threads` and waits for all of them.
///
/// With a single thread the work runs on the calling thread. Otherwise the workers run on a
/// cached rayon pool sized to [`get_number_of_threads`]. The first error is returned, the
/// other workers are expected to return early once `stop` is set.
pub fn run_workers<F>(n_threads: usize, work: F) -> Result<(), ImageError>
where
    F: Fn(usize, &StopFlag) -> Result<(), ImageError> + Sync,
{
    let stop = StopFlag::default();
    if n_threads <= 1 {
        return work(0, &stop);
    }
    let first_error: Mutex<Option<ImageError>> = Mutex::new(None);
    let spawn_all = || {
        rayon::scope(|s| {
            for thread in 0..n_threads {
                let (work, stop, first_error) = (&work, &stop, &first_error);
                s.spawn(move |_| {
                    if let Err(e) = work(thread, stop) {
                        stop.set();
                        let mut slot = first_error.lock().unwrap_or_else(|e| e.into_inner());
                        if slot.is_none() {
                            *slot = Some(e);
                        }
                    }
                });
            }
        })
    };
    match thread_pool(get_number_of_threads().max(n_threads)) {
        Some(pool) => pool.install(spawn_all),
        None => spawn_all(),
    }
    match first_error.into_inner().unwrap_or_else(|e| e.into_inner()) {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Per-thread state for line filters, one mutex-guarded slot per worker.
///
/// A filter resizes it in `set_number_of_threads` and locks `params.thread` inside `filter`.
/// Each slot is only ever locked by its own worker, so locking never contends.
#[derive(Debug, Default)]
pub struct PerThread<T> {
    slots: Vec<Mutex<T>>,
}

impl<T: Default> PerThread<T> {
    /// `n` default-initialized slots.
    pub fn new(n: usize) -> Self {
        let mut slots = Vec::with_capacity(n);
        slots.resize_with(n, || Mutex::new(T::default()));
        Self { slots }
    }

    /// Resets to `n` default-initialized slots.
    pub fn reset(&mut self, n: usize) {
        *self = Self::new(n);
    }
}

impl<T> PerThread<T> {
    /// The number of slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True without slots.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Locks the slot of `thread`.
    pub fn lock(&self, thread: usize) -> Result<MutexGuard<'_, T>, ImageError> {
        let slot = self.slots.get(thread).ok_or(ImageError::IndexOutOfRange)?;
        Ok(slot.lock().unwrap_or_else(|e| e.into_inner()))
    }

    /// Consumes the container, returning the slots in thread order.
    pub fn into_inner(self) -> Vec<T> {
        self.slots
            .into_iter()
            .map(|m| m.into_inner().unwrap_or_else(|e| e.into_inner()))
            .collect()
    }
}
