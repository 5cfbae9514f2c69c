//! Broadcast payload decoders
//!
//! Two radio technologies, one contract: a [`Decoder`] takes raw payload
//! bytes plus the [`DecodeContext`] of the receiving radio and produces a
//! [`DecodeOutcome`]. Malformed input is a [`CodingError`] scoped to the one
//! message being decoded; it is never fatal to the processing pipeline.

use thiserror::Error;

use crate::bits::OutOfData;
use crate::message::CbMessage;

pub mod bearerdata;
pub mod gsmpdu;

pub use bearerdata::BearerDataDecoder;
pub use gsmpdu::GsmDecoder;

/// Decoding failed for this message
///
/// Every variant is scoped to the single inbound message: the message is
/// dropped and the error reported, but decoding of later messages
/// continues unaffected.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum CodingError {
    /// A field ran past the end of the payload
    #[error(transparent)]
    OutOfData(#[from] OutOfData),

    /// The payload is shorter than the minimum header
    #[error("PDU too short: {0} bytes")]
    TooShort(usize),

    /// The mandatory message identifier subparameter never appeared
    #[error("missing mandatory MESSAGE_IDENTIFIER subparameter")]
    MissingMessageIdentifier,

    /// A defined subparameter tag occurred twice in one payload
    #[error("duplicate subparameter {0:#04x}")]
    DuplicateSubparameter(u8),

    /// The CMAS record stream declares an unsupported protocol version
    #[error("unsupported CMAE protocol version {0}")]
    UnsupportedProtocolVersion(u8),

    /// The data coding scheme is reserved or unsupported
    #[error("unsupported data coding scheme {0:#04x}")]
    UnsupportedDcs(u8),

    /// The user data encoding value is not one this decoder handles
    #[error("unsupported user data encoding {0:#04x}")]
    UnsupportedEncoding(u8),

    /// A UMTS PDU declared a message type other than CBS data
    #[error("unsupported UMTS message type {0:#04x}")]
    UnsupportedMessageType(u8),

    /// A warning-area element type outside the defined set
    #[error("unsupported warning area geometry type {0}")]
    UnsupportedGeometry(u8),
}

/// What a decode pass produced
#[derive(Clone, Debug, PartialEq)]
pub enum DecodeOutcome {
    /// A complete normalized message
    Complete(CbMessage),
    /// A page of a multi-page message was stored; more pages are needed
    Assembling,
    /// A geo-fencing trigger referencing other broadcasts
    Trigger(GeoFencingTrigger),
}

/// Receiving-radio context a decode runs in
///
/// Carries the slot and serving-cell identity of the radio path the PDU
/// arrived on, and the service category for technologies that signal it
/// out of band.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodeContext {
    /// SIM slot / radio path index
    pub slot_index: i32,
    /// Serving network (MCC+MNC)
    pub plmn: String,
    /// Serving location area code
    pub lac: i32,
    /// Serving cell id
    pub cid: i32,
    /// Service category, for radios that deliver it alongside the payload
    pub service_category: Option<i32>,
}

impl DecodeContext {
    /// Context with only a serving PLMN (no cell registration)
    pub fn new<S: Into<String>>(slot_index: i32, plmn: S) -> Self {
        Self {
            slot_index,
            plmn: plmn.into(),
            lac: -1,
            cid: -1,
            service_category: None,
        }
    }
}

/// A payload decoder for one radio technology
pub trait Decoder {
    /// Decode one inbound payload
    ///
    /// Multi-page reassembly state, where a technology has it, lives in the
    /// decoder instance; hence `&mut self`.
    fn decode(&mut self, pdu: &[u8], ctx: &DecodeContext) -> Result<DecodeOutcome, CodingError>;
}

/// One broadcast identity referenced by a geo-fencing trigger
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CbIdentifier {
    pub message_id: u16,
    pub serial_number: i32,
}

/// A geo-fencing trigger message
///
/// Does not carry alert text; it references already-received broadcasts
/// that should now be geofence-evaluated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeoFencingTrigger {
    /// Trigger type from the wire
    pub trigger_type: u8,
    /// Broadcasts to evaluate
    pub identifiers: Vec<CbIdentifier>,
}

impl GeoFencingTrigger {
    /// Active-alert-with-shared-WAC type value
    const TYPE_ACTIVE_ALERT_SHARE_WAC: u8 = 2;

    /// Should the referenced broadcasts share one merged warning area?
    pub fn should_share_broadcast_area(&self) -> bool {
        self.trigger_type == Self::TYPE_ACTIVE_ALERT_SHARE_WAC
    }
}
