//! Geofence send decisions
//!
//! A geofenced alert is only delivered if the device is plausibly inside
//! its target area. Location fixes come with an accuracy radius, so the
//! answer is rarely a clean yes/no; the [`SendDecisionCalculator`]
//! accumulates evidence across successive fixes and renders a verdict with
//! a deliberate bias: never re-alert a confident negative, but always
//! honor a late positive.

use log::debug;

use crate::geometry::{Geometry, LatLng};

/// Delivery verdict for a geofenced alert
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SendAction {
    /// No location fix has been evaluated yet
    NoCoordinates,
    /// The device is inside (or close enough to) a target area
    Send,
    /// The device is confidently outside every target area
    DontSend,
    /// The fix accuracy is too coarse to tell
    Ambiguous,
}

/// Accumulates geofencing evidence into a send verdict
///
/// Constructed per broadcast with the alert's target geometries and the
/// deployment's distance threshold. Each location fix is folded into the
/// persistent verdict with these rules, in priority order:
///
/// 1. `Send` is terminal: once reached, further fixes are ignored.
/// 2. A persistent `DontSend` is never downgraded to `Ambiguous` by a
///    later coarse fix; only a fresh `Send` can change it.
/// 3. An empty geometry list means "always send."
#[derive(Clone, Debug)]
pub struct SendDecisionCalculator {
    geometries: Vec<Geometry>,
    threshold_meters: f64,
    action: SendAction,
}

impl SendDecisionCalculator {
    /// New calculator for the given target areas and threshold
    pub fn new(geometries: Vec<Geometry>, threshold_meters: f64) -> Self {
        Self {
            geometries,
            threshold_meters,
            action: SendAction::NoCoordinates,
        }
    }

    /// The current verdict
    ///
    /// An empty fence reports `Send` by convention: a message with no
    /// target areas is delivered everywhere.
    pub fn action(&self) -> SendAction {
        if self.geometries.is_empty() {
            SendAction::Send
        } else {
            self.action
        }
    }

    /// Target geometries under evaluation
    pub fn geometries(&self) -> &[Geometry] {
        &self.geometries
    }

    /// Replace the target geometries, keeping the verdict state
    ///
    /// Used when a geo-fencing trigger merges warning areas across
    /// broadcasts.
    pub fn set_geometries(&mut self, geometries: Vec<Geometry>) {
        self.geometries = geometries;
    }

    /// Fold one location fix into the verdict
    pub fn add_coordinate(&mut self, point: LatLng, accuracy_meters: f64) {
        if self.geometries.is_empty() || self.action == SendAction::Send {
            return;
        }

        let combined = self.evaluate(point, accuracy_meters);
        let previous = self.action;
        self.action = match (self.action, combined) {
            (_, SendAction::Send) => SendAction::Send,
            (SendAction::NoCoordinates, new) => new,
            // confidently outside stays outside; ambiguity cannot reopen it
            (SendAction::DontSend, _) => SendAction::DontSend,
            (SendAction::Ambiguous, SendAction::DontSend) => SendAction::DontSend,
            (current, _) => current,
        };

        if previous != self.action {
            debug!(
                "geofence: {:?} -> {:?} at {} (accuracy {:.0}m)",
                previous, self.action, point, accuracy_meters
            );
        }
    }

    // Evaluate one fix against every geometry and combine: any Send wins,
    // then any Ambiguous, else DontSend
    fn evaluate(&self, point: LatLng, accuracy_meters: f64) -> SendAction {
        let mut combined = SendAction::DontSend;
        for geometry in &self.geometries {
            let verdict = if geometry.contains(&point) {
                SendAction::Send
            } else {
                let distance = geometry.distance(&point);
                if accuracy_meters <= self.threshold_meters && distance <= self.threshold_meters {
                    SendAction::Send
                } else if distance <= accuracy_meters {
                    SendAction::Ambiguous
                } else {
                    SendAction::DontSend
                }
            };
            match verdict {
                SendAction::Send => return SendAction::Send,
                SendAction::Ambiguous => combined = SendAction::Ambiguous,
                _ => {}
            }
        }
        combined
    }
}
