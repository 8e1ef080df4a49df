// ============================================================================
// PREVIEW SCHEDULER — debounced, coalescing background recompute
// ============================================================================
//
// Every parameter change calls `request()`. A single worker thread waits
// until no request has arrived for `delay`, then runs the job once with the
// newest parameters. Requests that arrive while a job runs collapse into one
// follow-up run. Results carry the generation token of the request they were
// computed for; anything older than the latest request is stale.
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Trailing-edge delay between the last change and the recompute.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(60);

/// One finished recompute.
#[derive(Debug)]
pub struct PreviewResult<R> {
    /// Generation of the request this result was computed for.
    pub token: u64,
    pub output: R,
}

pub struct RecomputeScheduler<P: Send + 'static, R: Send + 'static> {
    requests: Option<mpsc::Sender<(u64, P)>>,
    results: mpsc::Receiver<PreviewResult<R>>,
    /// Token of the newest request; results with any other token are stale.
    generation: Arc<AtomicU64>,
    worker: Option<JoinHandle<()>>,
    delay: Duration,
}

impl<P: Send + 'static, R: Send + 'static> RecomputeScheduler<P, R> {
    /// Start the worker thread with the default 60 ms debounce.
    pub fn new<F>(job: F) -> std::io::Result<Self>
    where
        F: FnMut(P) -> R + Send + 'static,
    {
        Self::with_delay(DEFAULT_DEBOUNCE, job)
    }

    pub fn with_delay<F>(delay: Duration, mut job: F) -> std::io::Result<Self>
    where
        F: FnMut(P) -> R + Send + 'static,
    {
        let (req_tx, req_rx) = mpsc::channel::<(u64, P)>();
        let (res_tx, res_rx) = mpsc::channel::<PreviewResult<R>>();

        let worker = std::thread::Builder::new()
            .name("liveryfe-preview".to_string())
            .spawn(move || {
                let mut pending: Option<(u64, P)> = None;
                loop {
                    let Some((token, params)) = pending.take() else {
                        match req_rx.recv() {
                            Ok(req) => pending = Some(req),
                            Err(_) => break,
                        }
                        continue;
                    };

                    // Any newer request restarts the quiet period
                    match req_rx.recv_timeout(delay) {
                        Ok(newer) => pending = Some(newer),
                        Err(RecvTimeoutError::Disconnected) => break,
                        Err(RecvTimeoutError::Timeout) => {
                            let run = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| job(params)));
                            match run {
                                Ok(output) => {
                                    if res_tx.send(PreviewResult { token, output }).is_err() {
                                        break;
                                    }
                                }
                                Err(_) => log_err!("Preview recompute {} panicked; result dropped", token),
                            }
                        }
                    }
                }
            })?;

        Ok(Self {
            requests: Some(req_tx),
            results: res_rx,
            generation: Arc::new(AtomicU64::new(0)),
            worker: Some(worker),
            delay,
        })
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Queue a recompute with `params`, superseding every earlier request.
    /// Returns the new generation token.
    pub fn request(&self, params: P) -> u64 {
        let token = self.generation.fetch_add(1, Ordering::SeqCst).wrapping_add(1);
        if let Some(tx) = &self.requests
            && tx.send((token, params)).is_err()
        {
            log_warn!("Preview worker is gone; request {} ignored", token);
        }
        token
    }

    pub fn latest_token(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// True if `token` belongs to the newest request.
    pub fn is_current(&self, token: u64) -> bool {
        token == self.latest_token()
    }

    /// Drain finished results without blocking and return the current one,
    /// if it has arrived. Stale results are discarded.
    pub fn try_result(&self) -> Option<PreviewResult<R>> {
        let mut latest = None;
        while let Ok(result) = self.results.try_recv() {
            if self.is_current(result.token) {
                latest = Some(result);
            }
        }
        latest
    }

    /// Block until the result for the newest request arrives or `timeout`
    /// passes.
    pub fn wait_result(&self, timeout: Duration) -> Option<PreviewResult<R>> {
        let deadline = Instant::now() + timeout;
        loop {
            let left = deadline.checked_duration_since(Instant::now())?;
            match self.results.recv_timeout(left) {
                Ok(result) if self.is_current(result.token) => return Some(result),
                Ok(_) => continue,
                Err(_) => return None,
            }
        }
    }
}

impl<P: Send + 'static, R: Send + 'static> Drop for RecomputeScheduler<P, R> {
    fn drop(&mut self) {
        // Closing the request channel ends the worker loop
        self.requests.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_scheduler(delay_ms: u64, work_ms: u64) -> (RecomputeScheduler<u32, u32>, Arc<AtomicUsize>) {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let sched = RecomputeScheduler::with_delay(Duration::from_millis(delay_ms), move |p: u32| {
            counter.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(work_ms));
            p * 10
        })
        .unwrap();
        (sched, runs)
    }

    #[test]
    fn burst_collapses_into_one_run() {
        let (sched, runs) = counting_scheduler(40, 0);
        let mut last = 0;
        for p in 1..=10 {
            last = sched.request(p);
        }
        let result = sched.wait_result(Duration::from_secs(5)).unwrap();
        assert_eq!(result.output, 100);
        assert_eq!(result.token, last);
        assert!(sched.is_current(result.token));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn nothing_runs_before_the_delay() {
        let (sched, runs) = counting_scheduler(300, 0);
        sched.request(1);
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert!(sched.try_result().is_none());
        assert!(sched.wait_result(Duration::from_secs(5)).is_some());
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn results_of_superseded_runs_are_stale() {
        let (sched, runs) = counting_scheduler(5, 150);
        let first = sched.request(1);
        // Let the first job start, then supersede it mid-run
        std::thread::sleep(Duration::from_millis(60));
        let second = sched.request(2);
        assert!(!sched.is_current(first));

        let result = sched.wait_result(Duration::from_secs(5)).unwrap();
        assert_eq!(result.token, second);
        assert_eq!(result.output, 20);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn tokens_increase() {
        let (sched, _) = counting_scheduler(1000, 0);
        let a = sched.request(1);
        let b = sched.request(2);
        assert!(b > a);
        assert_eq!(sched.latest_token(), b);
        assert_eq!(sched.delay(), Duration::from_millis(1000));
    }

    #[test]
    fn drop_stops_the_worker() {
        let (sched, runs) = counting_scheduler(10_000, 0);
        sched.request(1);
        let started = Instant::now();
        drop(sched);
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }
}
