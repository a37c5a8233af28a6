//! Dispense actuator adapter and single-resource arbitration.
//!
//! [`DispenseActuator`] is the adapter boundary: it owns the physical
//! [`ActuatorPort`] through a [`DeviceWorker`], applies the rotation
//! deadline, and translates everything (port errors, timeouts, a dead
//! worker) into [`ActuatorFault`].
//!
//! [`DispenseCoordinator`] guarantees at most one rotation in flight and
//! implements the manual-request slot:
//!
//! ```text
//!   request_manual()            actuator idle?  ── yes ──▶ rotate now
//!        │                           │ no
//!        ▼                           ▼
//!   ┌─────────────┐  newer request replaces it, older one → Superseded
//!   │ pending (1) │──────────────────────────────────────────────────────┐
//!   └─────────────┘                                                      │
//!        ▲ cancel(ticket) until taken                                    │
//!        └── taken by whoever finishes the in-flight rotation ◀──────────┘
//! ```
//!
//! Lock order is always actuator → queue for the thread holding the
//! actuator; a manual caller takes the queue lock and only *tries* the
//! actuator lock, so the two can never deadlock.  Releasing the actuator
//! happens while the queue lock is held, so a request cannot be parked in
//! the slot after the holder decided the slot was empty.

use core::time::Duration;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use log::{error, info, warn};

use crate::app::events::DispenseEvent;
use crate::app::ports::ActuatorPort;
use crate::drivers::worker::{DeviceWorker, WorkerError};
use crate::error::{ActuatorFault, DispenseError};

// ───────────────────────────────────────────────────────────────
// Actuator adapter
// ───────────────────────────────────────────────────────────────

/// Deadline-bounded access to the rotation mechanism.
pub struct DispenseActuator<A: ActuatorPort + Send + 'static> {
    worker: DeviceWorker<A>,
    timeout: Duration,
}

impl<A: ActuatorPort + Send + 'static> DispenseActuator<A> {
    pub fn new(port: A, timeout: Duration) -> std::io::Result<Self> {
        Ok(Self {
            worker: DeviceWorker::spawn("actuator", port)?,
            timeout,
        })
    }

    /// Rotate toward `target_grams`.  Never returns a raw transport error.
    pub fn rotate(&self, target_grams: u32) -> Result<u32, ActuatorFault> {
        match self
            .worker
            .call(self.timeout, move |port: &mut A| port.rotate(target_grams))
        {
            Ok(Ok(grams)) => Ok(grams),
            Ok(Err(e)) => {
                warn!("Actuator: rotation of {} g failed: {}", target_grams, e);
                Err(ActuatorFault::from(e))
            }
            Err(WorkerError::Timeout) => Err(ActuatorFault::Timeout),
            Err(e @ (WorkerError::Busy | WorkerError::Stopped)) => {
                warn!("Actuator: {}", e);
                Err(ActuatorFault::Unreachable)
            }
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Manual request slot
// ───────────────────────────────────────────────────────────────

/// Identifies one manual request for cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ManualTicket(pub u64);

/// How a manual request ended, as seen by the requester.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManualResult {
    /// The actuator ran and `event` was recorded for it.
    Completed {
        event: DispenseEvent,
        result: Result<u32, ActuatorFault>,
    },
    /// Never reached the actuator.
    Dropped(DispenseError),
}

type ManualReply = Signal<CriticalSectionRawMutex, ManualResult>;

struct PendingManual {
    ticket: ManualTicket,
    grams: u32,
    reply: Arc<ManualReply>,
}

#[derive(Default)]
struct ManualQueue {
    pending: Option<PendingManual>,
    next_ticket: u64,
}

/// A manual rotation that has run and still has to be recorded.
///
/// Whoever drove the rotation gets these back and must [`resolve`] each
/// one with the event it logged; that wakes the original requester.
///
/// [`resolve`]: CompletedManual::resolve
pub struct CompletedManual {
    pub ticket: ManualTicket,
    pub result: Result<u32, ActuatorFault>,
    reply: Option<Arc<ManualReply>>,
}

impl CompletedManual {
    pub fn resolve(mut self, event: DispenseEvent) {
        if let Some(reply) = self.reply.take() {
            reply.signal(ManualResult::Completed {
                event,
                result: self.result,
            });
        }
    }
}

impl Drop for CompletedManual {
    fn drop(&mut self) {
        if let Some(reply) = self.reply.take() {
            error!("Dispense: manual request {} finished unrecorded", self.ticket.0);
            reply.signal(ManualResult::Dropped(DispenseError::Cancelled));
        }
    }
}

/// Handle returned by [`DispenseCoordinator::request_manual`].
pub struct ManualRequest {
    ticket: ManualTicket,
    queued: bool,
    reply: Arc<ManualReply>,
}

impl ManualRequest {
    pub fn ticket(&self) -> ManualTicket {
        self.ticket
    }

    /// True if the request was parked behind an in-flight rotation.
    pub fn is_queued(&self) -> bool {
        self.queued
    }

    /// Block until the request is recorded or dropped.
    ///
    /// Bounded: the slot is drained by the thread finishing the in-flight
    /// rotation, and every rotation is itself deadline-bounded.
    pub fn wait(self) -> ManualResult {
        futures_lite::future::block_on(self.reply.wait())
    }
}

/// What `request_manual` did.
pub struct ManualSubmission {
    pub request: ManualRequest,
    /// The older queued request this one replaced, if any.
    pub superseded: Option<ManualTicket>,
    /// Rotations this call drove (its own first, then any drained).
    pub completed: Vec<CompletedManual>,
}

// ───────────────────────────────────────────────────────────────
// Coordinator
// ───────────────────────────────────────────────────────────────

pub struct DispenseCoordinator<A: ActuatorPort + Send + 'static> {
    actuator: Mutex<DispenseActuator<A>>,
    queue: Mutex<ManualQueue>,
}

impl<A: ActuatorPort + Send + 'static> DispenseCoordinator<A> {
    pub fn new(actuator: DispenseActuator<A>) -> Self {
        Self {
            actuator: Mutex::new(actuator),
            queue: Mutex::new(ManualQueue::default()),
        }
    }

    /// Exclusive rotation for the scheduler.
    ///
    /// Waits for an in-flight rotation to finish, runs, hands the result to
    /// `on_result` while still holding the actuator, then drains the manual
    /// slot.  Drained manual rotations are returned for recording.
    pub fn dispense_exclusive<T>(
        &self,
        grams: u32,
        on_result: impl FnOnce(Result<u32, ActuatorFault>) -> T,
    ) -> (T, Vec<CompletedManual>) {
        let guard = lock(&self.actuator);
        let out = on_result(guard.rotate(grams));
        let drained = self.release(guard);
        (out, drained)
    }

    /// Manual request: rotate now if idle, otherwise park in the slot.
    ///
    /// When the actuator is idle the rotation happens on the caller's thread
    /// before this returns, and the request is the first entry of
    /// `completed`.
    pub fn request_manual(&self, grams: u32) -> ManualSubmission {
        let mut queue = lock(&self.queue);
        queue.next_ticket += 1;
        let ticket = ManualTicket(queue.next_ticket);
        let reply = Arc::new(ManualReply::new());

        let guard = match self.actuator.try_lock() {
            Ok(guard) => Some(guard),
            Err(TryLockError::Poisoned(e)) => Some(e.into_inner()),
            Err(TryLockError::WouldBlock) => None,
        };

        let Some(guard) = guard else {
            let superseded = queue
                .pending
                .replace(PendingManual {
                    ticket,
                    grams,
                    reply: reply.clone(),
                })
                .map(|old| {
                    warn!(
                        "Dispense: manual request {} replaced by {}",
                        old.ticket.0, ticket.0
                    );
                    old.reply
                        .signal(ManualResult::Dropped(DispenseError::Superseded));
                    old.ticket
                });
            info!("Dispense: manual request {} queued", ticket.0);
            return ManualSubmission {
                request: ManualRequest {
                    ticket,
                    queued: true,
                    reply,
                },
                superseded,
                completed: Vec::new(),
            };
        };

        drop(queue);
        let own = CompletedManual {
            ticket,
            result: guard.rotate(grams),
            reply: Some(reply.clone()),
        };
        let mut completed = vec![own];
        completed.extend(self.release(guard));
        ManualSubmission {
            request: ManualRequest {
                ticket,
                queued: false,
                reply,
            },
            superseded: None,
            completed,
        }
    }

    /// Withdraw a queued manual request.  Returns `false` once it has been
    /// taken for rotation (or already finished).
    pub fn cancel(&self, ticket: ManualTicket) -> bool {
        let mut queue = lock(&self.queue);
        if !queue.pending.as_ref().is_some_and(|p| p.ticket == ticket) {
            return false;
        }
        if let Some(p) = queue.pending.take() {
            p.reply.signal(ManualResult::Dropped(DispenseError::Cancelled));
        }
        info!("Dispense: manual request {} cancelled", ticket.0);
        true
    }

    /// Whether a manual request is parked in the slot.
    pub fn has_pending(&self) -> bool {
        lock(&self.queue).pending.is_some()
    }

    /// Run every manual request that arrived while `guard` was held, then
    /// release the actuator.
    fn release(&self, guard: MutexGuard<'_, DispenseActuator<A>>) -> Vec<CompletedManual> {
        let mut drained = Vec::new();
        loop {
            let mut queue = lock(&self.queue);
            let Some(next) = queue.pending.take() else {
                // Unlock the actuator while the slot is still locked so no
                // request can be parked after the slot was seen empty.
                drop(guard);
                drop(queue);
                return drained;
            };
            drop(queue);
            info!("Dispense: running queued manual request {}", next.ticket.0);
            drained.push(CompletedManual {
                ticket: next.ticket,
                result: guard.rotate(next.grams),
                reply: Some(next.reply),
            });
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
