//! The normalized cell broadcast record
//!
//! Both radio technologies decode into one [`CbMessage`]. Everything
//! downstream of the decoders — duplicate detection, geofencing, dispatch —
//! operates on this record and never on raw PDU bytes.

use std::fmt;

use chrono::{DateTime, Utc};
use strum::EnumMessage;

use crate::categories;
use crate::geometry::Geometry;

/// Radio technology a broadcast arrived on
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum_macros::EnumMessage)]
pub enum MessageFormat {
    /// CDMA bearer data (3GPP2)
    #[strum(detailed_message = "cdma")]
    Cdma,
    /// GSM/UMTS SMS-CB (3GPP)
    #[strum(detailed_message = "gsm")]
    Gsm,
}

impl fmt::Display for MessageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.get_detailed_message().expect("missing definition").fmt(f)
    }
}

/// 3GPP geographical scope of a broadcast's identity
///
/// The scope governs how far the (serial number, location) pair uniquely
/// identifies a broadcast, and therefore how duplicate detection compares
/// locations. Wire values are the two high bits of the serial number field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GeographicalScope {
    /// Cell-wide, immediate display
    CellWideImmediate,
    /// Whole-PLMN scope
    PlmnWide,
    /// Location-area scope
    LocationAreaWide,
    /// Cell-wide, normal display
    CellWide,
}

impl GeographicalScope {
    /// Decode from the 2-bit wire value
    pub fn from_wire(value: u8) -> Self {
        match value & 0x3 {
            0 => GeographicalScope::CellWideImmediate,
            1 => GeographicalScope::PlmnWide,
            2 => GeographicalScope::LocationAreaWide,
            _ => GeographicalScope::CellWide,
        }
    }
}

/// Broadcast location identity, scoped to the serving cell
///
/// Components may be unset ("don't care") depending on the geographical
/// scope: a PLMN-wide broadcast carries no LAC or cell id.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CbLocation {
    plmn: String,
    lac: Option<i32>,
    cid: Option<i32>,
}

impl CbLocation {
    /// PLMN-only location (PLMN-wide scope)
    pub fn plmn_wide<S: Into<String>>(plmn: S) -> Self {
        Self {
            plmn: plmn.into(),
            lac: None,
            cid: None,
        }
    }

    /// PLMN + location area (location-area-wide scope)
    pub fn area_wide<S: Into<String>>(plmn: S, lac: i32) -> Self {
        Self {
            plmn: plmn.into(),
            lac: Some(lac),
            cid: None,
        }
    }

    /// Full PLMN + LAC + cell id (cell-wide scopes)
    pub fn cell_wide<S: Into<String>>(plmn: S, lac: i32, cid: i32) -> Self {
        Self {
            plmn: plmn.into(),
            lac: Some(lac),
            cid: Some(cid),
        }
    }

    /// Build the location appropriate for a geographical scope
    pub fn for_scope<S: Into<String>>(
        scope: GeographicalScope,
        plmn: S,
        lac: i32,
        cid: i32,
    ) -> Self {
        match scope {
            GeographicalScope::PlmnWide => Self::plmn_wide(plmn),
            GeographicalScope::LocationAreaWide => Self::area_wide(plmn, lac),
            GeographicalScope::CellWide | GeographicalScope::CellWideImmediate => {
                Self::cell_wide(plmn, lac, cid)
            }
        }
    }

    pub fn plmn(&self) -> &str {
        &self.plmn
    }

    pub fn lac(&self) -> Option<i32> {
        self.lac
    }

    pub fn cid(&self) -> Option<i32> {
        self.cid
    }

    /// Does this location cover the given serving cell?
    ///
    /// Unset components match anything; set components must be equal. Used
    /// to evict multi-page reassembly state when the device leaves the
    /// area a partial message belongs to.
    pub fn is_in_location_area(&self, plmn: &str, lac: i32, cid: i32) -> bool {
        if self.cid.is_some_and(|c| c != cid) {
            return false;
        }
        if self.lac.is_some_and(|l| l != lac) {
            return false;
        }
        self.plmn == plmn
    }
}

impl fmt::Display for CbLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.lac, self.cid) {
            (Some(lac), Some(cid)) => write!(f, "{}/{}/{}", self.plmn, lac, cid),
            (Some(lac), None) => write!(f, "{}/{}", self.plmn, lac),
            _ => self.plmn.fmt(f),
        }
    }
}

/// Broadcast delivery priority
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Normal,
    Interactive,
    Urgent,
    Emergency,
}

impl Priority {
    /// Decode the CDMA 2-bit priority indicator
    pub fn from_wire(value: u8) -> Self {
        match value & 0x3 {
            0 => Priority::Normal,
            1 => Priority::Interactive,
            2 => Priority::Urgent,
            _ => Priority::Emergency,
        }
    }
}

/// How the message body was encoded on the wire
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BodyEncoding {
    /// Raw octets; display charset is a deployment configuration choice
    Octet,
    /// IA5 / 7-bit ASCII
    Ia5,
    /// UTF-16BE (UCS-2)
    Unicode16,
    /// GSM 7-bit default alphabet, packed septets
    Gsm7,
    /// ISO 8859-1
    Latin,
    /// Shift-JIS
    ShiftJis,
    /// GSM data coding scheme carried inside CDMA user data
    GsmDcs,
}

/// CMAS (emergency alert profile) attributes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CmasInfo {
    pub message_class: CmasClass,
    pub category: CmasCategory,
    pub response_type: CmasResponseType,
    pub severity: CmasSeverity,
    pub urgency: CmasUrgency,
    pub certainty: CmasCertainty,
}

/// CMAS alert class
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum_macros::EnumMessage)]
pub enum CmasClass {
    #[strum(detailed_message = "Presidential alert")]
    PresidentialAlert,
    #[strum(detailed_message = "Extreme threat")]
    ExtremeThreat,
    #[strum(detailed_message = "Severe threat")]
    SevereThreat,
    #[strum(detailed_message = "Child abduction emergency")]
    ChildAbductionEmergency,
    #[strum(detailed_message = "Required monthly test")]
    RequiredMonthlyTest,
    #[strum(detailed_message = "CMAS exercise")]
    Exercise,
    #[strum(detailed_message = "Operator defined use")]
    OperatorDefined,
    #[strum(detailed_message = "Unknown class")]
    Unknown,
}

impl CmasClass {
    pub fn as_display_str(&self) -> &'static str {
        self.get_detailed_message().expect("missing definition")
    }
}

/// CMAS alert category (CMAE_category)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CmasCategory {
    Geophysical,
    Meteorological,
    Safety,
    Security,
    Rescue,
    Fire,
    Health,
    Environmental,
    Transportation,
    Infrastructure,
    Cbrne,
    Other,
    Unknown,
}

impl CmasCategory {
    pub fn from_wire(value: u32) -> Self {
        match value {
            0 => CmasCategory::Geophysical,
            1 => CmasCategory::Meteorological,
            2 => CmasCategory::Safety,
            3 => CmasCategory::Security,
            4 => CmasCategory::Rescue,
            5 => CmasCategory::Fire,
            6 => CmasCategory::Health,
            7 => CmasCategory::Environmental,
            8 => CmasCategory::Transportation,
            9 => CmasCategory::Infrastructure,
            10 => CmasCategory::Cbrne,
            11 => CmasCategory::Other,
            _ => CmasCategory::Unknown,
        }
    }
}

/// CMAS recommended response (CMAE_response_type)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CmasResponseType {
    Shelter,
    Evacuate,
    Prepare,
    Execute,
    Monitor,
    Avoid,
    Assess,
    AllClear,
    NoResponse,
    Unknown,
}

impl CmasResponseType {
    pub fn from_wire(value: u32) -> Self {
        match value {
            0 => CmasResponseType::Shelter,
            1 => CmasResponseType::Evacuate,
            2 => CmasResponseType::Prepare,
            3 => CmasResponseType::Execute,
            4 => CmasResponseType::Monitor,
            5 => CmasResponseType::Avoid,
            6 => CmasResponseType::Assess,
            7 => CmasResponseType::AllClear,
            8 => CmasResponseType::NoResponse,
            _ => CmasResponseType::Unknown,
        }
    }
}

/// CMAS severity (CMAE_severity)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CmasSeverity {
    Extreme,
    Severe,
    Unknown,
}

impl CmasSeverity {
    pub fn from_wire(value: u32) -> Self {
        match value {
            0 => CmasSeverity::Extreme,
            1 => CmasSeverity::Severe,
            _ => CmasSeverity::Unknown,
        }
    }
}

/// CMAS urgency (CMAE_urgency)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CmasUrgency {
    Immediate,
    Expected,
    Unknown,
}

impl CmasUrgency {
    pub fn from_wire(value: u32) -> Self {
        match value {
            0 => CmasUrgency::Immediate,
            1 => CmasUrgency::Expected,
            _ => CmasUrgency::Unknown,
        }
    }
}

/// CMAS certainty (CMAE_certainty)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CmasCertainty {
    Observed,
    Likely,
    Unknown,
}

impl CmasCertainty {
    pub fn from_wire(value: u32) -> Self {
        match value {
            0 => CmasCertainty::Observed,
            1 => CmasCertainty::Likely,
            _ => CmasCertainty::Unknown,
        }
    }
}

/// ETWS (earthquake/tsunami) warning attributes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EtwsInfo {
    pub warning_type: EtwsWarningType,
    /// Sound the emergency user alert tone
    pub emergency_user_alert: bool,
    /// Activate the warning popup immediately
    pub activate_popup: bool,
    /// Primary notification (short pre-alert) vs. secondary (full text)
    pub is_primary: bool,
}

/// ETWS warning type, from the message identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum_macros::EnumMessage)]
pub enum EtwsWarningType {
    #[strum(detailed_message = "Earthquake")]
    Earthquake,
    #[strum(detailed_message = "Tsunami")]
    Tsunami,
    #[strum(detailed_message = "Earthquake and tsunami")]
    EarthquakeAndTsunami,
    #[strum(detailed_message = "Test message")]
    TestMessage,
    #[strum(detailed_message = "Other emergency")]
    OtherEmergency,
    #[strum(detailed_message = "Unknown warning")]
    Unknown,
}

impl EtwsWarningType {
    /// Decode the ETWS warning type value (primary notification octet)
    pub fn from_wire(value: u8) -> Self {
        match value {
            0 => EtwsWarningType::Earthquake,
            1 => EtwsWarningType::Tsunami,
            2 => EtwsWarningType::EarthquakeAndTsunami,
            3 => EtwsWarningType::TestMessage,
            4 => EtwsWarningType::OtherEmergency,
            _ => EtwsWarningType::Unknown,
        }
    }

    /// Human-readable warning description
    pub fn as_display_str(&self) -> &'static str {
        self.get_detailed_message().expect("missing definition")
    }
}

/// A fully-decoded cell broadcast message
///
/// The canonical record produced by both decoders and consumed by duplicate
/// detection, geofencing and dispatch. Field semantics follow 3GPP TS 23.041
/// and 3GPP2 C.R1001 as interpreted by the decoders in
/// [`decoder`](crate::decoder).
#[derive(Clone, Debug, PartialEq)]
pub struct CbMessage {
    /// Radio technology the message arrived on
    pub format: MessageFormat,
    /// SIM slot / radio path index the message arrived through
    pub slot_index: i32,
    /// Scope over which (serial, location) identifies this broadcast
    pub geographical_scope: GeographicalScope,
    /// Per-broadcast sequence identifier (16 bits on the wire)
    pub serial_number: i32,
    /// Location identity, populated per the geographical scope
    pub location: CbLocation,
    /// GSM message identifier or CDMA service category
    pub service_category: i32,
    /// Message identifier (wraps modulo 65536)
    pub message_id: u16,
    /// ISO 639-1 language, when the carrier signaled one
    pub language: Option<String>,
    /// Wire encoding of the body; always set, even when the body is empty
    pub body_encoding: BodyEncoding,
    /// Decoded body text
    pub body: String,
    /// Delivery priority
    pub priority: Priority,
    /// A user data header was present in the payload
    pub has_user_data_header: bool,
    /// CMAS attributes, for commercial mobile alerts
    pub cmas: Option<CmasInfo>,
    /// ETWS attributes, for earthquake/tsunami warnings
    pub etws: Option<EtwsInfo>,
    /// Target areas for geofenced delivery; empty means deliver everywhere
    pub geometries: Vec<Geometry>,
    /// Carrier-declared bound on the wait for a location fix
    pub maximum_wait_secs: Option<u32>,
    /// When this device received the message
    pub received_at: DateTime<Utc>,
}

impl CbMessage {
    /// Whether delivery must be gated on a geofence evaluation
    ///
    /// True exactly when the message carries target geometries.
    pub fn needs_geofencing(&self) -> bool {
        !self.geometries.is_empty()
    }

    /// GSM message code field of the serial number
    pub fn message_code(&self) -> i32 {
        (self.serial_number & 0x3ff0) >> 4
    }

    /// GSM update number field of the serial number
    pub fn update_number(&self) -> i32 {
        self.serial_number & 0xf
    }

    /// Is this an ETWS broadcast?
    pub fn is_etws(&self) -> bool {
        self.etws.is_some()
    }

    /// Is this an ETWS primary notification?
    pub fn is_etws_primary(&self) -> bool {
        self.etws.is_some_and(|e| e.is_primary)
    }

    /// Is this a public warning system (emergency) broadcast?
    pub fn is_emergency(&self) -> bool {
        match self.format {
            MessageFormat::Gsm => categories::is_gsm_emergency_id(self.message_id),
            MessageFormat::Cdma => categories::is_cdma_cmas_category(self.service_category),
        }
    }
}

impl fmt::Display for CbMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} cat={:#x} serial={:#x} loc={} \"{}\"",
            self.format, self.service_category, self.serial_number, self.location, self.body
        )
    }
}
