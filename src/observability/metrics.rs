//! Thread-safe dispatch statistics
//!
//! Atomic counters tracking connection attempts, polls, received events and
//! handler invocations. Each dispatcher owns one [`DispatchStats`] that is
//! shared with the transport it manages.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Counters for one dispatcher, across all of its runs
#[derive(Debug, Default)]
pub struct DispatchStats {
    connected: AtomicBool,
    connect_attempts: AtomicU64,
    connections_established: AtomicU64,
    connection_failures: AtomicU64,
    connections_lost: AtomicU64,
    polls: AtomicU64,
    events_received: AtomicU64,
    handler_invocations: AtomicU64,
    handler_failures: AtomicU64,
    runs_started: AtomicU64,
    last_event_at: AtomicU64,
}

impl DispatchStats {
    pub fn new() -> Self {
        Self::default()
    }

    // Connection metrics
    pub fn connection_attempt(&self) {
        self.connect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_established(&self) {
        self.connections_established.fetch_add(1, Ordering::Relaxed);
        self.connected.store(true, Ordering::Relaxed);
    }

    pub fn connection_failed(&self) {
        self.connection_failures.fetch_add(1, Ordering::Relaxed);
        self.connected.store(false, Ordering::Relaxed);
    }

    pub fn connection_lost(&self) {
        self.connections_lost.fetch_add(1, Ordering::Relaxed);
        self.connected.store(false, Ordering::Relaxed);
    }

    // Event loop metrics
    pub fn run_started(&self) {
        self.runs_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn poll(&self) {
        self.polls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn events_received(&self, count: usize) {
        if count == 0 {
            return;
        }
        self.events_received
            .fetch_add(count as u64, Ordering::Relaxed);
        self.last_event_at
            .store(current_timestamp(), Ordering::Relaxed);
    }

    pub fn handler_invoked(&self) {
        self.handler_invocations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn handler_failed(&self) {
        self.handler_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> DispatchSnapshot {
        DispatchSnapshot {
            connected: self.connected.load(Ordering::Relaxed),
            connect_attempts: self.connect_attempts.load(Ordering::Relaxed),
            connections_established: self.connections_established.load(Ordering::Relaxed),
            connection_failures: self.connection_failures.load(Ordering::Relaxed),
            connections_lost: self.connections_lost.load(Ordering::Relaxed),
            polls: self.polls.load(Ordering::Relaxed),
            events_received: self.events_received.load(Ordering::Relaxed),
            handler_invocations: self.handler_invocations.load(Ordering::Relaxed),
            handler_failures: self.handler_failures.load(Ordering::Relaxed),
            runs_started: self.runs_started.load(Ordering::Relaxed),
            last_event_at: self.last_event_at.load(Ordering::Relaxed),
            timestamp: current_timestamp(),
        }
    }

    // Reset all counters (useful for testing)
    pub fn reset(&self) {
        self.connected.store(false, Ordering::Relaxed);
        for counter in [
            &self.connect_attempts,
            &self.connections_established,
            &self.connection_failures,
            &self.connections_lost,
            &self.polls,
            &self.events_received,
            &self.handler_invocations,
            &self.handler_failures,
            &self.runs_started,
            &self.last_event_at,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchSnapshot {
    pub connected: bool,
    pub connect_attempts: u64,
    pub connections_established: u64,
    pub connection_failures: u64,
    pub connections_lost: u64,
    pub polls: u64,
    pub events_received: u64,
    pub handler_invocations: u64,
    pub handler_failures: u64,
    pub runs_started: u64,
    /// Unix seconds of the last non-empty poll, 0 if none yet
    pub last_event_at: u64,
    pub timestamp: u64,
}

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
