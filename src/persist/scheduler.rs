use std::time::{Duration, Instant};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Serializes saves.
///
/// At most one save is in flight. Requests arriving meanwhile collapse into
/// one pending payload (last writer wins), dispatched as soon as the
/// in-flight save completes. Bursts are debounced: each request restarts
/// the timer. A failed payload stays pending until the next request or an
/// explicit [`retry`](Self::retry).
#[derive(Debug)]
pub struct SaveQueue<T> {
    debounce: Duration,
    pending: Option<T>,
    due: Option<Instant>,
    in_flight: bool,
    failed: bool,
}

impl<T> Default for SaveQueue<T> {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

impl<T> SaveQueue<T> {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            pending: None,
            due: None,
            in_flight: false,
            failed: false,
        }
    }

    pub fn request(&mut self, payload: T, now: Instant) {
        self.pending = Some(payload);
        self.failed = false;
        if !self.in_flight {
            self.due = Some(now + self.debounce);
        }
    }

    /// The payload to save now, if one is due. The caller must report the
    /// outcome through [`complete`](Self::complete).
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        if self.in_flight {
            return None;
        }
        match self.due {
            Some(due) if due <= now => {}
            _ => return None,
        }
        let payload = self.pending.take()?;
        self.due = None;
        self.in_flight = true;
        Some(payload)
    }

    /// Finish the in-flight save. On failure the payload is handed back and
    /// kept unless a newer request superseded it.
    pub fn complete(&mut self, outcome: Result<(), T>, now: Instant) {
        if !self.in_flight {
            log::warn!("save completion reported with nothing in flight");
        }
        self.in_flight = false;
        let superseded = self.pending.is_some();
        match outcome {
            Ok(()) => {}
            Err(payload) => {
                if !superseded {
                    self.pending = Some(payload);
                    self.failed = true;
                }
            }
        }
        // Edits made during the save go out immediately
        self.due = if superseded { Some(now) } else { None };
    }

    /// Re-dispatch a failed payload without waiting for another edit.
    pub fn retry(&mut self, now: Instant) {
        if self.pending.is_some() && !self.in_flight {
            self.failed = false;
            self.due = Some(now);
        }
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    pub fn is_idle(&self) -> bool {
        !self.in_flight && self.pending.is_none()
    }

    pub fn next_due(&self) -> Option<Instant> {
        self.due
    }
}
