//! Duplicate broadcast detection
//!
//! Carriers re-broadcast alerts aggressively, and dual-SIM devices hear
//! the same alert on two radio paths at once. A duplicate must be
//! suppressed without ever suppressing a genuinely new alert, so matching
//! is deliberately conservative: every rule below has to hold before a
//! candidate is called a repeat.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use log::debug;

use crate::categories;
use crate::message::{CbMessage, GeographicalScope};

/// Duplicate detection policy
#[derive(Clone, Debug)]
pub struct DuplicateConfig {
    /// How long previously-seen messages stay eligible for matching
    pub retention: Duration,
    /// Require identical body text for same-slot matches
    pub compare_body: bool,
    /// GSM identifier → CDMA category equivalence, consulted both ways
    pub category_cross_map: HashMap<i32, i32>,
    /// Ignore messages received before the last radio reset, when set
    pub last_radio_reset: Option<DateTime<Utc>>,
}

impl Default for DuplicateConfig {
    fn default() -> Self {
        Self {
            retention: Duration::hours(24),
            compare_body: false,
            category_cross_map: categories::DEFAULT_CATEGORY_CROSS_MAP
                .entries()
                .map(|(gsm, cdma)| (*gsm as i32, *cdma))
                .collect(),
            last_radio_reset: None,
        }
    }
}

/// Compares inbound messages against a window of previously-seen ones
#[derive(Clone, Debug, Default)]
pub struct DuplicateDetector {
    config: DuplicateConfig,
}

impl DuplicateDetector {
    pub fn new(config: DuplicateConfig) -> Self {
        Self { config }
    }

    /// Earliest receive time still eligible for matching, as of `now`
    ///
    /// The retention window, further clipped to the last radio reset when
    /// that policy is active.
    pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let start = now - self.config.retention;
        match self.config.last_radio_reset {
            Some(reset) if reset > start => reset,
            _ => start,
        }
    }

    /// Is `candidate` a repeat of anything in `window`?
    pub fn is_duplicate<'a, I>(&self, candidate: &CbMessage, window: I) -> bool
    where
        I: IntoIterator<Item = &'a CbMessage>,
    {
        let since = self.window_start(candidate.received_at);
        for previous in window {
            if previous.received_at < since {
                continue;
            }
            if self.matches(candidate, previous) {
                debug!("duplicate: {} repeats {}", candidate, previous);
                return true;
            }
        }
        false
    }

    fn matches(&self, candidate: &CbMessage, previous: &CbMessage) -> bool {
        if candidate.slot_index != previous.slot_index {
            // a different radio path reports different locations and
            // serials for the same alert; only the body is comparable
            return candidate.body == previous.body;
        }

        if candidate.serial_number != previous.serial_number {
            return false;
        }

        // an ETWS primary notification is not a duplicate of its secondary
        if candidate.is_etws()
            && previous.is_etws()
            && candidate.is_etws_primary() != previous.is_etws_primary()
        {
            return false;
        }

        if !self.categories_match(candidate.service_category, previous.service_category) {
            return false;
        }

        if !locations_match(candidate, previous) {
            return false;
        }

        !self.config.compare_body || candidate.body == previous.body
    }

    // equal outright, or equivalent under the cross-technology map in
    // either direction
    fn categories_match(&self, a: i32, b: i32) -> bool {
        a == b
            || self.config.category_cross_map.get(&a) == Some(&b)
            || self.config.category_cross_map.get(&b) == Some(&a)
    }
}

// Location equality at the granularity the geographical scope defines.
// Differing scopes never match.
fn locations_match(a: &CbMessage, b: &CbMessage) -> bool {
    if a.geographical_scope != b.geographical_scope {
        return false;
    }
    let (la, lb) = (&a.location, &b.location);
    match a.geographical_scope {
        GeographicalScope::CellWideImmediate | GeographicalScope::CellWide => {
            la.plmn() == lb.plmn() && la.lac() == lb.lac() && la.cid() == lb.cid()
        }
        GeographicalScope::LocationAreaWide => {
            la.plmn() == lb.plmn() && la.lac() == lb.lac()
        }
        GeographicalScope::PlmnWide => !la.plmn().is_empty() && la.plmn() == lb.plmn(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::tests::test_message;
    use crate::message::{CbLocation, EtwsInfo, EtwsWarningType, MessageFormat};

    fn detector() -> DuplicateDetector {
        DuplicateDetector::default()
    }

    #[test]
    fn test_identical_message_is_duplicate() {
        let msg = test_message(0x2AA5);
        let window = vec![msg.clone()];
        assert!(detector().is_duplicate(&msg, &window));
    }

    #[test]
    fn test_idempotent_marking() {
        // the same message checked twice against a window containing the
        // first occurrence reports true both times
        let msg = test_message(0x2AA5);
        let window = vec![msg.clone()];
        assert!(detector().is_duplicate(&msg, &window));
        assert!(detector().is_duplicate(&msg, &window));
    }

    #[test]
    fn test_different_serial_not_duplicate() {
        let window = vec![test_message(1)];
        assert!(!detector().is_duplicate(&test_message(2), &window));
    }

    #[test]
    fn test_cross_slot_matches_on_body_only() {
        // different slots, different serials, identical body: duplicate
        let mut previous = test_message(1);
        previous.slot_index = 0;
        let mut candidate = test_message(2);
        candidate.slot_index = 1;
        let window = vec![previous.clone()];
        assert!(detector().is_duplicate(&candidate, &window));

        // different body text: not a duplicate
        candidate.body = "something else".to_owned();
        assert!(!detector().is_duplicate(&candidate, &window));
    }

    #[test]
    fn test_etws_primary_secondary_distinct() {
        let etws = |primary| EtwsInfo {
            warning_type: EtwsWarningType::Earthquake,
            emergency_user_alert: false,
            activate_popup: false,
            is_primary: primary,
        };
        let mut previous = test_message(7);
        previous.etws = Some(etws(true));
        let mut candidate = test_message(7);
        candidate.etws = Some(etws(false));

        let window = vec![previous];
        assert!(!detector().is_duplicate(&candidate, &window));
    }

    #[test]
    fn test_cross_technology_category_map() {
        // GSM presidential alert vs. CDMA presidential category
        let mut gsm = test_message(42);
        gsm.service_category = 0x1112;
        let mut cdma = test_message(42);
        cdma.format = MessageFormat::Cdma;
        cdma.service_category = 0x1000;

        let window = vec![gsm.clone()];
        assert!(detector().is_duplicate(&cdma, &window));

        // and the reverse direction
        let window = vec![cdma];
        assert!(detector().is_duplicate(&gsm, &window));
    }

    #[test]
    fn test_location_scope_rules() {
        // location-area scope ignores the cell id
        let mut previous = test_message(9);
        previous.geographical_scope = GeographicalScope::LocationAreaWide;
        previous.location = CbLocation::area_wide("310260", 1234);
        let mut candidate = previous.clone();
        candidate.location = CbLocation::area_wide("310260", 1234);
        assert!(detector().is_duplicate(&candidate, &[previous.clone()]));

        // differing LAC breaks the match
        candidate.location = CbLocation::area_wide("310260", 4321);
        assert!(!detector().is_duplicate(&candidate, &[previous.clone()]));

        // differing scopes never match, even with equal components
        candidate.location = CbLocation::area_wide("310260", 1234);
        candidate.geographical_scope = GeographicalScope::PlmnWide;
        assert!(!detector().is_duplicate(&candidate, &[previous]));
    }

    #[test]
    fn test_plmn_wide_requires_nonempty_plmn() {
        let mut previous = test_message(9);
        previous.geographical_scope = GeographicalScope::PlmnWide;
        previous.location = CbLocation::plmn_wide("");
        let candidate = previous.clone();
        assert!(!detector().is_duplicate(&candidate, &[previous]));
    }

    #[test]
    fn test_retention_window_expires() {
        let mut old = test_message(5);
        old.received_at = Utc::now() - Duration::hours(25);
        let candidate = test_message(5);
        assert!(!detector().is_duplicate(&candidate, &[old]));
    }

    #[test]
    fn test_radio_reset_clips_window() {
        let mut previous = test_message(5);
        previous.received_at = Utc::now() - Duration::hours(2);
        let candidate = test_message(5);

        // within retention: duplicate
        assert!(detector().is_duplicate(&candidate, &[previous.clone()]));

        // a radio reset one hour ago invalidates everything before it
        let config = DuplicateConfig {
            last_radio_reset: Some(Utc::now() - Duration::hours(1)),
            ..DuplicateConfig::default()
        };
        assert!(!DuplicateDetector::new(config).is_duplicate(&candidate, &[previous]));
    }

    #[test]
    fn test_compare_body_policy() {
        let mut previous = test_message(5);
        previous.body = "take shelter".to_owned();
        let mut candidate = test_message(5);
        candidate.body = "all clear".to_owned();

        // default policy: location + serial equality suffices
        assert!(detector().is_duplicate(&candidate, &[previous.clone()]));

        // body comparison enabled: differing text is a new message
        let config = DuplicateConfig {
            compare_body: true,
            ..DuplicateConfig::default()
        };
        assert!(!DuplicateDetector::new(config).is_duplicate(&candidate, &[previous]));
    }
}
