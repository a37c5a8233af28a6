//! Device worker - owns one physical port on a dedicated thread.
//!
//! Callers never touch the port directly.  Each call is boxed into a job,
//! pushed through a bounded `embassy-sync` channel, and the caller waits for
//! the reply with a deadline:
//!
//! ```text
//!  caller thread                         worker thread
//!  ─────────────                         ─────────────
//!  call(f, timeout) ── Job::Run(f) ──▶  JOBS.receive().await
//!        │                                   f(&mut port)
//!        ▼                                   │
//!  or(reply.wait(), Timer::after(t)) ◀── reply.signal(r)
//! ```
//!
//! Jobs run one at a time, so the port is never driven concurrently.  If a
//! port call hangs, the caller gets [`WorkerError::Timeout`] and later jobs
//! queue behind the stuck one until the channel fills, after which callers
//! get [`WorkerError::Busy`].  A queued job whose caller has already timed
//! out is discarded unrun: a call that reports `Timeout` either never
//! touched the port or was the one already in flight.  A port call that panics kills the worker and
//! every later call resolves as [`WorkerError::Stopped`] or a timeout.

use core::time::Duration;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use log::{info, warn};

/// Pending jobs per worker.
const JOB_DEPTH: usize = 4;

type PortJob<P> = Box<dyn FnOnce(&mut P) + Send>;

/// A port call plus its claim flag.  The worker and a timed-out caller race
/// to set `claimed`; whoever sets it first decides whether the call runs.
struct Pending<P> {
    run: PortJob<P>,
    claimed: Arc<AtomicBool>,
}

enum Job<P> {
    Run(Pending<P>),
    Stop,
}

type JobChannel<P> = Channel<CriticalSectionRawMutex, Job<P>, JOB_DEPTH>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerError {
    /// No reply within the deadline.
    Timeout,
    /// Job queue is full (port stuck behind earlier jobs).
    Busy,
    /// The worker thread has exited.
    Stopped,
}

impl core::fmt::Display for WorkerError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Timeout => write!(f, "deadline expired"),
            Self::Busy => write!(f, "job queue full"),
            Self::Stopped => write!(f, "worker stopped"),
        }
    }
}

/// Handle to a port running on its own thread.
pub struct DeviceWorker<P: Send + 'static> {
    name: &'static str,
    jobs: Arc<JobChannel<P>>,
    thread: Option<JoinHandle<()>>,
}

impl<P: Send + 'static> DeviceWorker<P> {
    /// Move `port` onto a new named thread.
    pub fn spawn(name: &'static str, port: P) -> std::io::Result<Self> {
        let jobs: Arc<JobChannel<P>> = Arc::new(Channel::new());
        let rx = jobs.clone();
        let thread = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || futures_lite::future::block_on(serve(port, &rx)))?;
        info!("Worker '{}' started", name);
        Ok(Self {
            name,
            jobs,
            thread: Some(thread),
        })
    }

    /// Run `f` against the port and wait at most `timeout` for its result.
    pub fn call<R, F>(&self, timeout: Duration, f: F) -> Result<R, WorkerError>
    where
        R: Send + 'static,
        F: FnOnce(&mut P) -> R + Send + 'static,
    {
        if self.thread.as_ref().is_none_or(JoinHandle::is_finished) {
            return Err(WorkerError::Stopped);
        }

        let reply: Arc<Signal<CriticalSectionRawMutex, R>> = Arc::new(Signal::new());
        let tx = reply.clone();
        let claimed = Arc::new(AtomicBool::new(false));
        let job = Pending {
            run: Box::new(move |port| tx.signal(f(port))),
            claimed: claimed.clone(),
        };
        if self.jobs.try_send(Job::Run(job)).is_err() {
            warn!("Worker '{}': job queue full", self.name);
            return Err(WorkerError::Busy);
        }

        let result = futures_lite::future::block_on(futures_lite::future::or(
            async { Some(reply.wait().await) },
            async {
                async_io_mini::Timer::after(timeout).await;
                None
            },
        ));
        result.ok_or_else(|| {
            if claimed.swap(true, Ordering::AcqRel) {
                warn!("Worker '{}': no reply within {:?}", self.name, timeout);
            } else {
                warn!(
                    "Worker '{}': no reply within {:?}, queued call discarded",
                    self.name, timeout
                );
            }
            WorkerError::Timeout
        })
    }
}

impl<P: Send + 'static> Drop for DeviceWorker<P> {
    fn drop(&mut self) {
        if self.jobs.try_send(Job::Stop).is_err() {
            // Queue full means the port is wedged; leave the thread detached.
            warn!("Worker '{}': could not queue stop, detaching", self.name);
            return;
        }
        if let Some(thread) = self.thread.take() {
            if thread.is_finished() {
                let _ = thread.join();
            }
        }
    }
}

async fn serve<P>(mut port: P, jobs: &JobChannel<P>) {
    loop {
        match jobs.receive().await {
            Job::Run(job) => {
                if !job.claimed.swap(true, Ordering::AcqRel) {
                    (job.run)(&mut port);
                }
            }
            Job::Stop => break,
        }
    }
}
