//! One-shot location acquisition
//!
//! Location is the only asynchronous dependency of the pipeline. The
//! platform's location service is shared by every geofence evaluation in
//! flight, so concurrent requests are coalesced: one platform request
//! serves every waiter registered while it is outstanding, and each waiter
//! observes exactly one outcome (a fix, or `None` on timeout, missing
//! permission, or teardown).

use std::sync::Mutex;

use crossbeam_channel::{bounded, Receiver, Sender};
use log::debug;

use crate::geometry::LatLng;

/// A location sample from the platform
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LocationFix {
    pub point: LatLng,
    /// Radius of the fix's uncertainty, in meters
    pub accuracy_meters: f64,
}

impl LocationFix {
    pub fn new(lat: f64, lng: f64, accuracy_meters: f64) -> Self {
        Self {
            point: LatLng::new(lat, lng),
            accuracy_meters,
        }
    }
}

/// One-shot channel on which a waiter receives its outcome
pub type LocationTicket = Receiver<Option<LocationFix>>;

/// A platform location request the caller must forward
///
/// Returned by [`LocationArbiter::register`] when no request is currently
/// in flight. The platform is expected to answer within `max_wait_secs`
/// plus bounded scheduling slack.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LocationRequest {
    pub max_wait_secs: u32,
}

/// Coalesces one-shot location requests onto one in-flight platform query
///
/// The waiter map is the only shared-state lock in this crate: decoding
/// workers for both radio technologies register waiters while the platform
/// completes them from its own context.
#[derive(Debug, Default)]
pub struct LocationArbiter {
    state: Mutex<ArbiterState>,
}

#[derive(Debug, Default)]
struct ArbiterState {
    waiters: Vec<Sender<Option<LocationFix>>>,
    in_flight: bool,
}

impl LocationArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a waiter for the next location outcome
    ///
    /// Returns the waiter's ticket and, if no platform request is in
    /// flight, the request the caller must issue. Waiters registered while
    /// a request is outstanding coalesce onto it.
    pub fn register(&self, max_wait_secs: u32) -> (LocationTicket, Option<LocationRequest>) {
        let (tx, rx) = bounded(1);
        let mut state = self.state.lock().expect("arbiter lock");
        state.waiters.push(tx);
        if state.in_flight {
            debug!("location: coalescing onto in-flight request");
            (rx, None)
        } else {
            state.in_flight = true;
            (rx, Some(LocationRequest { max_wait_secs }))
        }
    }

    /// Complete the in-flight request, resolving every waiter exactly once
    ///
    /// `None` reports timeout or missing permission; waiters fail open.
    pub fn complete(&self, fix: Option<LocationFix>) {
        let waiters = {
            let mut state = self.state.lock().expect("arbiter lock");
            state.in_flight = false;
            std::mem::take(&mut state.waiters)
        };
        debug!("location: resolving {} waiter(s)", waiters.len());
        for waiter in waiters {
            // a dropped ticket is not an error; the waiter gave up
            let _ = waiter.send(fix);
        }
    }

    /// Tear down: release every waiter with a timeout outcome
    ///
    /// The outstanding platform request (if any) is considered cancelled;
    /// callers still apply their dispatch-on-timeout semantics.
    pub fn cancel_all(&self) {
        self.complete(None);
    }

    /// Is a platform request currently outstanding?
    pub fn is_in_flight(&self) -> bool {
        self.state.lock().expect("arbiter lock").in_flight
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_request_resolves() {
        let arbiter = LocationArbiter::new();
        let (ticket, request) = arbiter.register(30);
        assert_eq!(Some(LocationRequest { max_wait_secs: 30 }), request);
        assert!(arbiter.is_in_flight());

        arbiter.complete(Some(LocationFix::new(37.4, -122.0, 25.0)));
        let fix = ticket.try_recv().unwrap().unwrap();
        assert_eq!(25.0, fix.accuracy_meters);
        assert!(!arbiter.is_in_flight());
    }

    #[test]
    fn test_coalescing() {
        let arbiter = LocationArbiter::new();
        let (first, request) = arbiter.register(30);
        assert!(request.is_some());

        // second and third waiters coalesce: no new platform request
        let (second, request) = arbiter.register(10);
        assert_eq!(None, request);
        let (third, request) = arbiter.register(20);
        assert_eq!(None, request);

        arbiter.complete(Some(LocationFix::new(1.0, 2.0, 3.0)));
        for ticket in [first, second, third] {
            let fix = ticket.try_recv().unwrap().expect("waiter got the fix");
            assert_eq!(LatLng::new(1.0, 2.0), fix.point);
            // exactly once: the channel is empty afterwards
            assert!(ticket.try_recv().is_err());
        }
    }

    #[test]
    fn test_new_request_after_completion() {
        let arbiter = LocationArbiter::new();
        let (_t1, r1) = arbiter.register(30);
        arbiter.complete(None);
        let (_t2, r2) = arbiter.register(30);
        assert!(r1.is_some());
        assert!(r2.is_some());
    }

    #[test]
    fn test_cancel_releases_with_none() {
        let arbiter = LocationArbiter::new();
        let (ticket, _) = arbiter.register(30);
        arbiter.cancel_all();
        assert_eq!(Ok(None), ticket.try_recv());
        assert!(!arbiter.is_in_flight());
    }

    #[test]
    fn test_dropped_waiter_does_not_poison() {
        let arbiter = LocationArbiter::new();
        let (ticket, _) = arbiter.register(30);
        drop(ticket);
        let (kept, _) = arbiter.register(30);
        arbiter.complete(Some(LocationFix::new(0.0, 0.0, 1.0)));
        assert!(kept.try_recv().unwrap().is_some());
    }

    #[test]
    fn test_concurrent_registration() {
        use std::sync::Arc;

        let arbiter = Arc::new(LocationArbiter::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let arbiter = Arc::clone(&arbiter);
            handles.push(std::thread::spawn(move || {
                let (ticket, _) = arbiter.register(30);
                ticket.recv().unwrap()
            }));
        }
        // wait until every thread has registered
        while arbiter.state.lock().unwrap().waiters.len() < 8 {
            std::thread::yield_now();
        }
        arbiter.complete(Some(LocationFix::new(5.0, 6.0, 7.0)));
        for handle in handles {
            let fix = handle.join().unwrap().expect("fix delivered");
            assert_eq!(LatLng::new(5.0, 6.0), fix.point);
        }
    }
}
