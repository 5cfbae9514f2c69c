//! Broadcast processing pipeline
//!
//! One [`BroadcastCoordinator`] runs per radio technology and processes
//! inbound messages in arrival order: decode, duplicate check, then either
//! immediate dispatch or a geofence evaluation gated on a location fix.
//!
//! The coordinator never blocks. A geofenced message joins the pending
//! list with a deadline; the caller forwards the returned
//! [`LocationRequest`](crate::location::LocationRequest) to the platform
//! and later feeds the outcome back through
//! [`on_location`](BroadcastCoordinator::on_location).
//! [`poll`](BroadcastCoordinator::poll) applies the fail-open rule: an
//! alert whose location never arrived is delivered, not silently
//! discarded.

use std::sync::Arc;

use arraydeque::ArrayDeque;
use chrono::{DateTime, Duration, Utc};
use crossbeam_channel::TryRecvError;
use log::{debug, info, warn};

use crate::decoder::{
    BearerDataDecoder, CodingError, DecodeContext, DecodeOutcome, Decoder, GeoFencingTrigger,
    GsmDecoder,
};
use crate::duplicate::DuplicateDetector;
use crate::geofence::{SendAction, SendDecisionCalculator};
use crate::location::{LocationArbiter, LocationFix, LocationRequest, LocationTicket};
use crate::message::{CbMessage, MessageFormat};

/// Messages retained in the in-memory duplicate window
const RECENT_WINDOW_CAPACITY: usize = 64;

/// Read-only source of previously-received messages
///
/// The duplicate window is conceptually owned by an external history
/// store; the coordinator only queries it. [`RecentWindow`] is a
/// self-contained in-memory implementation.
pub trait MessageHistory {
    /// Messages received at or after `since`
    fn query_recent(&self, since: DateTime<Utc>) -> Vec<CbMessage>;
}

/// Bounded in-memory window of recently-received messages
#[derive(Clone, Debug, Default)]
pub struct RecentWindow {
    messages: ArrayDeque<CbMessage, RECENT_WINDOW_CAPACITY, arraydeque::Wrapping>,
}

impl RecentWindow {
    pub fn push(&mut self, message: CbMessage) {
        self.messages.push_back(message);
    }

    pub fn iter(&self) -> impl Iterator<Item = &CbMessage> {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl MessageHistory for RecentWindow {
    fn query_recent(&self, since: DateTime<Utc>) -> Vec<CbMessage> {
        self.messages
            .iter()
            .filter(|m| m.received_at >= since)
            .cloned()
            .collect()
    }
}

/// Outcome of ingesting one raw PDU
#[derive(Debug)]
pub enum Intake {
    /// Decoded, new, and cleared for delivery
    Dispatch(CbMessage),
    /// Suppressed as a repeat of a recently-seen message
    Duplicate,
    /// A page of a multi-page message was stored; nothing to deliver yet
    Assembling,
    /// Held for geofencing; forward the request to the platform if `Some`
    AwaitingLocation(Option<LocationRequest>),
    /// A geo-fencing trigger was applied to held broadcasts
    TriggerApplied {
        matched: usize,
        request: Option<LocationRequest>,
    },
}

/// Final disposition of a message that was held for geofencing
#[derive(Clone, Debug, PartialEq)]
pub enum Resolution {
    /// Deliver the message
    Dispatch(CbMessage),
    /// Confidently outside the target area: drop, do not deliver
    Drop(CbMessage),
}

/// A geofenced message awaiting its location outcome
struct PendingGeofence {
    message: CbMessage,
    calculator: SendDecisionCalculator,
    deadline: DateTime<Utc>,
    ticket: LocationTicket,
}

/// Decoder for the coordinator's radio technology
enum TechnologyDecoder {
    Gsm(GsmDecoder),
    Cdma(BearerDataDecoder),
}

/// Per-technology broadcast pipeline
///
/// Built via [`CoordinatorBuilder`](crate::CoordinatorBuilder). All
/// methods take the current time explicitly, which keeps deadline
/// behavior deterministic under test.
pub struct BroadcastCoordinator {
    format: MessageFormat,
    decoder: TechnologyDecoder,
    detector: DuplicateDetector,
    window: RecentWindow,
    external_history: Option<Box<dyn MessageHistory>>,
    arbiter: Arc<LocationArbiter>,
    pending: Vec<PendingGeofence>,
    threshold_meters: f64,
    default_max_wait_secs: u32,
}

impl BroadcastCoordinator {
    pub(crate) fn assemble(
        format: MessageFormat,
        decoder_cdma: BearerDataDecoder,
        detector: DuplicateDetector,
        external_history: Option<Box<dyn MessageHistory>>,
        arbiter: Arc<LocationArbiter>,
        threshold_meters: f64,
        default_max_wait_secs: u32,
    ) -> Self {
        let decoder = match format {
            MessageFormat::Gsm => TechnologyDecoder::Gsm(GsmDecoder::new()),
            MessageFormat::Cdma => TechnologyDecoder::Cdma(decoder_cdma),
        };
        Self {
            format,
            decoder,
            detector,
            window: RecentWindow::default(),
            external_history,
            arbiter,
            pending: Vec::new(),
            threshold_meters,
            default_max_wait_secs,
        }
    }

    /// The radio technology this coordinator serves
    pub fn format(&self) -> MessageFormat {
        self.format
    }

    /// The shared location arbiter
    pub fn arbiter(&self) -> &Arc<LocationArbiter> {
        &self.arbiter
    }

    /// Geofence evaluations currently awaiting a location outcome
    pub fn pending_geofences(&self) -> usize {
        self.pending.len()
    }

    /// Ingest one raw PDU from the radio layer
    ///
    /// Decode failures are scoped to this message; the error is returned
    /// for telemetry and the pipeline stays healthy.
    pub fn handle_pdu(
        &mut self,
        pdu: &[u8],
        ctx: &DecodeContext,
        now: DateTime<Utc>,
    ) -> Result<Intake, CodingError> {
        let outcome = match &mut self.decoder {
            TechnologyDecoder::Gsm(decoder) => decoder.decode(pdu, ctx),
            TechnologyDecoder::Cdma(decoder) => decoder.decode(pdu, ctx),
        }?;

        match outcome {
            DecodeOutcome::Assembling => Ok(Intake::Assembling),
            DecodeOutcome::Trigger(trigger) => Ok(self.apply_trigger(&trigger, now)),
            DecodeOutcome::Complete(mut message) => {
                message.received_at = now;

                if self.is_duplicate(&message, now) {
                    info!("coordinator: suppressed duplicate {}", message);
                    return Ok(Intake::Duplicate);
                }

                if !message.needs_geofencing() {
                    self.window.push(message.clone());
                    return Ok(Intake::Dispatch(message));
                }

                let max_wait = message
                    .maximum_wait_secs
                    .unwrap_or(self.default_max_wait_secs);
                let calculator =
                    SendDecisionCalculator::new(message.geometries.clone(), self.threshold_meters);
                let (ticket, request) = self.arbiter.register(max_wait);
                // the message was received: it counts for duplicate
                // detection even while its geofence verdict is pending
                self.window.push(message.clone());
                debug!(
                    "coordinator: geofencing {} (wait {}s, new request: {})",
                    message,
                    max_wait,
                    request.is_some()
                );
                self.pending.push(PendingGeofence {
                    message,
                    calculator,
                    deadline: now + Duration::seconds(max_wait as i64),
                    ticket,
                });
                Ok(Intake::AwaitingLocation(request))
            }
        }
    }

    /// Feed a platform location outcome to every waiting evaluation
    ///
    /// `None` means timeout or missing permission; affected messages fail
    /// open and dispatch.
    pub fn on_location(&mut self, fix: Option<LocationFix>) -> Vec<Resolution> {
        self.arbiter.complete(fix);
        self.drain(Utc::now())
    }

    /// Resolve evaluations whose outcome arrived or whose wait expired
    ///
    /// Call periodically (or after another coordinator sharing the
    /// arbiter completed a request).
    pub fn poll(&mut self, now: DateTime<Utc>) -> Vec<Resolution> {
        self.drain(now)
    }

    /// Tear down: cancel the outstanding location request and fail open
    ///
    /// Every held message is resolved as if its wait expired.
    pub fn shutdown(&mut self) -> Vec<Resolution> {
        self.arbiter.cancel_all();
        let mut resolutions = Vec::new();
        for entry in self.pending.drain(..) {
            resolutions.push(Self::resolve(entry, None));
        }
        resolutions
    }

    // Duplicate check against the in-memory window plus the external store
    fn is_duplicate(&self, message: &CbMessage, now: DateTime<Utc>) -> bool {
        let external = self
            .external_history
            .as_ref()
            .map(|history| history.query_recent(self.detector.window_start(now)))
            .unwrap_or_default();
        self.detector
            .is_duplicate(message, self.window.iter().chain(external.iter()))
    }

    // Apply a geo-fencing trigger to the held broadcasts it references
    fn apply_trigger(&mut self, trigger: &GeoFencingTrigger, now: DateTime<Utc>) -> Intake {
        let referenced: Vec<usize> = self
            .pending
            .iter()
            .enumerate()
            .filter(|(_, entry)| {
                trigger.identifiers.iter().any(|id| {
                    id.message_id == entry.message.message_id
                        && id.serial_number == entry.message.serial_number
                })
            })
            .map(|(i, _)| i)
            .collect();

        if referenced.is_empty() {
            info!(
                "coordinator: trigger referenced {} broadcast(s), none held",
                trigger.identifiers.len()
            );
            return Intake::TriggerApplied {
                matched: 0,
                request: None,
            };
        }

        if trigger.should_share_broadcast_area() {
            // every referenced broadcast is evaluated against the union of
            // their warning areas
            let merged: Vec<_> = referenced
                .iter()
                .flat_map(|&i| self.pending[i].message.geometries.iter().cloned())
                .collect();
            for &i in &referenced {
                self.pending[i].calculator.set_geometries(merged.clone());
            }
        }

        // re-arm each referenced evaluation with a fresh waiter
        let mut request = None;
        for &i in &referenced {
            let (ticket, new_request) = self.arbiter.register(self.default_max_wait_secs);
            let entry = &mut self.pending[i];
            entry.ticket = ticket;
            entry.deadline = entry
                .deadline
                .max(now + Duration::seconds(self.default_max_wait_secs as i64));
            request = request.or(new_request);
        }

        debug!(
            "coordinator: trigger matched {} held broadcast(s)",
            referenced.len()
        );
        Intake::TriggerApplied {
            matched: referenced.len(),
            request,
        }
    }

    // Resolve entries whose ticket has an outcome or whose deadline passed
    fn drain(&mut self, now: DateTime<Utc>) -> Vec<Resolution> {
        let mut resolutions = Vec::new();
        let mut keep = Vec::with_capacity(self.pending.len());
        for entry in self.pending.drain(..) {
            match entry.ticket.try_recv() {
                Ok(outcome) => {
                    resolutions.push(Self::resolve(entry, outcome));
                }
                Err(TryRecvError::Empty) if entry.deadline > now => keep.push(entry),
                // deadline passed, or the arbiter vanished: fail open
                _ => {
                    warn!(
                        "coordinator: location wait expired for {}; dispatching",
                        entry.message
                    );
                    resolutions.push(Self::resolve(entry, None));
                }
            }
        }
        self.pending = keep;
        resolutions
    }

    // Fold the outcome into the calculator and decide. Anything except a
    // confident DontSend is delivered: over-alerting beats under-alerting
    // for public safety content.
    fn resolve(mut entry: PendingGeofence, outcome: Option<LocationFix>) -> Resolution {
        if let Some(fix) = outcome {
            entry
                .calculator
                .add_coordinate(fix.point, fix.accuracy_meters);
        }
        match entry.calculator.action() {
            SendAction::DontSend => {
                info!("coordinator: outside target area, dropping {}", entry.message);
                Resolution::Drop(entry.message)
            }
            action => {
                debug!("coordinator: dispatching {} ({:?})", entry.message, action);
                Resolution::Dispatch(entry.message)
            }
        }
    }
}
