//! Builds a broadcast coordinator
//!
//! All deployment-supplied policy lives here: the geofence distance
//! threshold, the duplicate retention window and body-comparison toggle,
//! the cross-technology category map, the default location wait, and the
//! charset used for octet-encoded payloads.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::charset::OctetEncoding;
use crate::coordinator::{BroadcastCoordinator, MessageHistory};
use crate::decoder::BearerDataDecoder;
use crate::duplicate::{DuplicateConfig, DuplicateDetector};
use crate::location::LocationArbiter;
use crate::message::MessageFormat;

/// Builds a [`BroadcastCoordinator`]
///
/// The builder comes with platform-typical defaults; only the radio
/// technology is mandatory. The defaults themselves are not part of the
/// API contract and may be revised; configure anything you depend on.
///
/// ```
/// use cbcast::{CoordinatorBuilder, MessageFormat, OctetEncoding};
///
/// let coordinator = CoordinatorBuilder::new(MessageFormat::Gsm)
///     .with_geofence_threshold(2000.0)
///     .with_default_max_wait(60)
///     .with_octet_encoding(OctetEncoding::Latin1)
///     .build();
/// assert_eq!(MessageFormat::Gsm, coordinator.format());
/// ```
pub struct CoordinatorBuilder {
    format: MessageFormat,
    threshold_meters: f64,
    default_max_wait_secs: u32,
    octet_encoding: OctetEncoding,
    duplicates: DuplicateConfig,
    arbiter: Option<Arc<LocationArbiter>>,
    history: Option<Box<dyn MessageHistory>>,
}

impl CoordinatorBuilder {
    /// New builder for the given radio technology
    pub fn new(format: MessageFormat) -> Self {
        Self {
            format,
            threshold_meters: 1000.0,
            default_max_wait_secs: 30,
            octet_encoding: OctetEncoding::default(),
            duplicates: DuplicateConfig::default(),
            arbiter: None,
            history: None,
        }
    }

    /// Geofence distance threshold, in meters
    ///
    /// A fix within this distance of a target area (and at least this
    /// accurate) counts as inside.
    pub fn with_geofence_threshold(&mut self, meters: f64) -> &mut Self {
        self.threshold_meters = f64::max(meters, 0.0);
        self
    }

    /// Default bound on the wait for a location fix, in seconds
    ///
    /// Used when a message does not declare its own maximum wait time.
    pub fn with_default_max_wait(&mut self, secs: u32) -> &mut Self {
        self.default_max_wait_secs = secs;
        self
    }

    /// Charset for octet-encoded payloads
    ///
    /// The octet encoding is not charset-signaled on the wire; this is a
    /// deployment decision.
    pub fn with_octet_encoding(&mut self, encoding: OctetEncoding) -> &mut Self {
        self.octet_encoding = encoding;
        self
    }

    /// How long previously-seen messages stay eligible for duplicate
    /// matching
    pub fn with_duplicate_retention(&mut self, retention: Duration) -> &mut Self {
        self.duplicates.retention = retention;
        self
    }

    /// Require identical body text for same-slot duplicate matches
    pub fn with_body_comparison(&mut self, enabled: bool) -> &mut Self {
        self.duplicates.compare_body = enabled;
        self
    }

    /// Replace the GSM↔CDMA category equivalence map
    pub fn with_category_cross_map(&mut self, map: HashMap<i32, i32>) -> &mut Self {
        self.duplicates.category_cross_map = map;
        self
    }

    /// Ignore messages received before the given radio reset instant
    pub fn with_radio_reset_at(&mut self, at: DateTime<Utc>) -> &mut Self {
        self.duplicates.last_radio_reset = Some(at);
        self
    }

    /// Share a location arbiter with other coordinators
    ///
    /// Coordinators for different radio technologies coalesce their
    /// location requests by sharing one arbiter.
    pub fn with_location_arbiter(&mut self, arbiter: Arc<LocationArbiter>) -> &mut Self {
        self.arbiter = Some(arbiter);
        self
    }

    /// Consult an external message history for duplicate detection
    pub fn with_history(&mut self, history: Box<dyn MessageHistory>) -> &mut Self {
        self.history = Some(history);
        self
    }

    /// Build the coordinator
    pub fn build(&mut self) -> BroadcastCoordinator {
        BroadcastCoordinator::assemble(
            self.format,
            BearerDataDecoder::new(self.octet_encoding),
            DuplicateDetector::new(self.duplicates.clone()),
            self.history.take(),
            self.arbiter
                .clone()
                .unwrap_or_else(|| Arc::new(LocationArbiter::new())),
            self.threshold_meters,
            self.default_max_wait_secs,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let coordinator = CoordinatorBuilder::new(MessageFormat::Cdma).build();
        assert_eq!(MessageFormat::Cdma, coordinator.format());
        assert_eq!(0, coordinator.pending_geofences());
    }

    #[test]
    fn test_shared_arbiter() {
        let arbiter = Arc::new(LocationArbiter::new());
        let gsm = CoordinatorBuilder::new(MessageFormat::Gsm)
            .with_location_arbiter(Arc::clone(&arbiter))
            .build();
        let cdma = CoordinatorBuilder::new(MessageFormat::Cdma)
            .with_location_arbiter(Arc::clone(&arbiter))
            .build();
        assert!(Arc::ptr_eq(gsm.arbiter(), cdma.arbiter()));
    }
}
