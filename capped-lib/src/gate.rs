//! Admission control for outgoing connections.
//!
//! An [`AdmissionGate`] hands out [`Slot`]s. A request holds its slot for as
//! long as its connection is open, so the number of live slots is the number
//! of open connections.
//!
//! - [`BoundedGate`]: at most `limit` slots, backed by a tokio [`Semaphore`]
//! - [`UnboundedGate`]: grants every request immediately
//!
//! Both gates keep track of current and peak occupancy.

use async_trait::async_trait;
use log::{debug, trace};
use std::fmt::Debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::{ErrorKind, GateStats, Result};

/// Current and peak number of held slots
#[derive(Debug, Default)]
struct Occupancy {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl Occupancy {
    fn enter(&self) -> usize {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        now
    }

    fn leave(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    fn current(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn reset_peak(&self) {
        self.peak.store(self.current(), Ordering::SeqCst);
        // An `enter` between the load and the store may have been overwritten
        self.peak.fetch_max(self.current(), Ordering::SeqCst);
    }
}

/// A granted admission.
///
/// The slot is given back exactly once, either through [`Slot::release`] or
/// when the value is dropped.
#[derive(Debug)]
#[must_use = "a slot is released as soon as it is dropped"]
pub struct Slot {
    occupancy: Option<Arc<Occupancy>>,
    permit: Option<OwnedSemaphorePermit>,
}

impl Slot {
    fn new(occupancy: Arc<Occupancy>, permit: Option<OwnedSemaphorePermit>) -> Self {
        let now = occupancy.enter();
        trace!("Admitted, {now} slot(s) in use");
        Self {
            occupancy: Some(occupancy),
            permit,
        }
    }

    /// Returns `true` until the slot has been released
    #[must_use]
    pub const fn is_held(&self) -> bool {
        self.occupancy.is_some()
    }

    /// Give the slot back to its gate. Releasing twice is a no-op.
    pub fn release(&mut self) {
        let Some(occupancy) = self.occupancy.take() else {
            return;
        };
        // Occupancy drops before the permit returns,
        // so observers never see more than `limit` slots in use.
        occupancy.leave();
        drop(self.permit.take());
        trace!("Released, {} slot(s) in use", occupancy.current());
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        self.release();
    }
}

/// Decides when a request may open its connection.
#[async_trait]
pub trait AdmissionGate: Debug + Send + Sync {
    /// Wait until a slot is available and take it.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::Cancelled`] if the gate has been closed.
    async fn acquire(&self) -> Result<Slot>;

    /// Maximum number of simultaneously held slots, `None` if unbounded
    fn limit(&self) -> Option<usize>;

    /// Slots that can be taken right now without waiting, `None` if unbounded
    fn available(&self) -> Option<usize>;

    /// Slots currently held
    fn in_flight(&self) -> usize;

    /// Highest number of slots held at the same time
    fn peak(&self) -> usize;

    /// Forget the recorded peak, starting over from the current occupancy
    fn reset_peak(&self);

    /// Refuse all pending and future acquisitions.
    /// Slots that are already held stay valid.
    fn close(&self);

    /// Returns `true` once [`AdmissionGate::close`] was called
    fn is_closed(&self) -> bool;

    /// Snapshot of the gate's occupancy
    fn stats(&self) -> GateStats {
        GateStats {
            limit: self.limit(),
            in_flight: self.in_flight(),
            peak: self.peak(),
        }
    }
}

/// Create the gate matching a configured limit.
///
/// `None` and `Some(0)` both mean "no limit".
#[must_use]
pub fn gate_for(limit: Option<usize>) -> Arc<dyn AdmissionGate> {
    match limit {
        Some(limit) if limit > 0 => Arc::new(BoundedGate::new(limit)),
        _ => Arc::new(UnboundedGate::default()),
    }
}

/// Admits at most `limit` requests at a time
#[derive(Debug)]
pub struct BoundedGate {
    limit: usize,
    semaphore: Arc<Semaphore>,
    occupancy: Arc<Occupancy>,
}

impl BoundedGate {
    /// Create a gate with `limit` slots.
    ///
    /// Limits above [`Semaphore::MAX_PERMITS`] are clamped.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        let limit = limit.min(Semaphore::MAX_PERMITS);
        Self {
            limit,
            semaphore: Arc::new(Semaphore::new(limit)),
            occupancy: Arc::default(),
        }
    }
}

#[async_trait]
impl AdmissionGate for BoundedGate {
    async fn acquire(&self) -> Result<Slot> {
        if self.semaphore.available_permits() == 0 {
            debug!(
                "All {} connection slots are taken, waiting for admission",
                self.limit
            );
        }
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ErrorKind::Cancelled)?;
        Ok(Slot::new(self.occupancy.clone(), Some(permit)))
    }

    fn limit(&self) -> Option<usize> {
        Some(self.limit)
    }

    fn available(&self) -> Option<usize> {
        Some(self.semaphore.available_permits())
    }

    fn in_flight(&self) -> usize {
        self.occupancy.current()
    }

    fn peak(&self) -> usize {
        self.occupancy.peak()
    }

    fn reset_peak(&self) {
        self.occupancy.reset_peak();
    }

    fn close(&self) {
        self.semaphore.close();
    }

    fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }
}

/// Admits every request immediately
#[derive(Debug, Default)]
pub struct UnboundedGate {
    closed: AtomicBool,
    occupancy: Arc<Occupancy>,
}

#[async_trait]
impl AdmissionGate for UnboundedGate {
    async fn acquire(&self) -> Result<Slot> {
        if self.is_closed() {
            return Err(ErrorKind::Cancelled);
        }
        Ok(Slot::new(self.occupancy.clone(), None))
    }

    fn limit(&self) -> Option<usize> {
        None
    }

    fn available(&self) -> Option<usize> {
        None
    }

    fn in_flight(&self) -> usize {
        self.occupancy.current()
    }

    fn peak(&self) -> usize {
        self.occupancy.peak()
    }

    fn reset_peak(&self) {
        self.occupancy.reset_peak();
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
