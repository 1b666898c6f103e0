//! Delayed transitions owned by the session
//!
//! Timers are plain deadlines polled by the session loop, so cancelling
//! them all is clearing a vector and no stray transition can fire later.

use std::time::Duration;

use tokio::time::Instant;

/// What happens when a timer expires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Thinking -> Speaking, speak the reply and record it
    Reply,
    /// Speaking -> Listening
    Resume,
    /// Farewell spoken, stop the session
    Deactivate,
}

#[derive(Debug, Clone, Copy)]
struct Scheduled {
    deadline: Instant,
    kind: TimerKind,
}

/// Pending timers, fired earliest first, ties in scheduling order
#[derive(Debug, Default)]
pub struct Timers {
    entries: Vec<Scheduled>,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, kind: TimerKind, delay: Duration) {
        self.schedule_at(kind, Instant::now() + delay);
    }

    pub fn schedule_at(&mut self, kind: TimerKind, deadline: Instant) {
        self.entries.push(Scheduled { deadline, kind });
    }

    /// Earliest pending deadline
    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries.iter().map(|e| e.deadline).min()
    }

    /// Remove and return the earliest timer due at `now`
    pub fn pop_due(&mut self, now: Instant) -> Option<TimerKind> {
        let (index, _) = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.deadline <= now)
            .min_by_key(|(i, e)| (e.deadline, *i))?;
        Some(self.entries.remove(index).kind)
    }

    #[cfg(test)]
    pub fn is_scheduled(&self, kind: TimerKind) -> bool {
        self.entries.iter().any(|e| e.kind == kind)
    }

    /// Drop every pending timer, returning how many were cancelled
    pub fn cancel_all(&mut self) -> usize {
        let cancelled = self.entries.len();
        self.entries.clear();
        cancelled
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
