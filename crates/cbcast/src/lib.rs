//! # cbcast: Cell Broadcast Decode & Geofence Decisions
//!
//! This crate decodes carrier-broadcast emergency and public-safety
//! messages — CDMA "bearer data" and GSM/3GPP SMS-CB PDUs — into one
//! normalized record, and decides whether that record should be delivered
//! on this device: is it a repeat of something already seen, and if it is
//! geofenced, is the device plausibly inside the target area?
//!
//! ## Disclaimer
//!
//! This crate is dual-licensed MIT and Apache 2.0. Read these licenses
//! carefully as they may affect your rights.
//!
//! This crate has not been certified as part of any warning system. The
//! author **strongly discourages** its use in safety-critical
//! applications. Always have at least two methods available for receiving
//! emergency alerts.
//!
//! ## Example
//!
//! Raw PDU bytes come from a radio layer that is beyond the scope of this
//! crate. Feed them to a [`BroadcastCoordinator`] per radio technology:
//!
//! ```
//! use cbcast::{
//!     CoordinatorBuilder, DecodeContext, Intake, LocationFix, MessageFormat, Resolution,
//! };
//! use chrono::Utc;
//!
//! let mut rx = CoordinatorBuilder::new(MessageFormat::Gsm)
//!     .with_geofence_threshold(1000.0)  // "close enough" distance, meters
//!     .with_default_max_wait(30)        // location wait bound, seconds
//!     .build();
//!
//! // serving-cell context for the radio path the bytes arrived on
//! let ctx = DecodeContext {
//!     slot_index: 0,
//!     plmn: "310260".to_owned(),
//!     lac: 1234,
//!     cid: 5678,
//!     service_category: None,
//! };
//!
//! # let pdu_bytes = [0xC0u8, 0x00, 0x00, 0x32, 0x40, 0x11, 0x41, 0xD0, 0x71, 0xDA, 0x04, 0x91];
//! match rx.handle_pdu(&pdu_bytes, &ctx, Utc::now()) {
//!     Ok(Intake::Dispatch(msg)) => println!("deliver now: {}", msg),
//!     Ok(Intake::AwaitingLocation(Some(_request))) => {
//!         // ask the platform for a one-shot location fix, then feed the
//!         // outcome back:
//!         let fix = LocationFix::new(37.4, -122.0, 25.0);
//!         for decision in rx.on_location(Some(fix)) {
//!             match decision {
//!                 Resolution::Dispatch(msg) => println!("deliver now: {}", msg),
//!                 Resolution::Drop(msg) => println!("outside area: {}", msg),
//!             }
//!         }
//!     }
//!     Ok(_) => {}   // duplicate, partial multi-page message, ...
//!     Err(err) => eprintln!("undecodable broadcast: {}", err),
//! }
//! ```
//!
//! Messages that are not geofenced dispatch immediately. Geofenced
//! messages wait — bounded by the message's own declared wait time or the
//! configured default — and **fail open**: if no usable fix arrives, the
//! alert is delivered anyway. Public-safety content is biased toward
//! over-alerting; the only suppression paths are duplicate detection and
//! a confident "outside the area" verdict.
//!
//! ## Background
//!
//! Cell broadcast is the delivery layer behind CMAS/WEA commercial
//! mobile alerts and the ETWS earthquake/tsunami warning system. Alerts
//! are re-broadcast aggressively so that moving devices eventually hear
//! them, which makes duplicate suppression as important as decoding.
//! Newer alerts carry their target area with them (circles and polygons
//! in WGS-84), shifting the inside/outside decision onto the device.

#![allow(dead_code)]

mod bits;
mod builder;
mod categories;
mod charset;
mod coordinator;
mod decoder;
mod duplicate;
mod geofence;
mod geometry;
mod location;
mod message;

pub use bits::{BitReader, OutOfData};
pub use builder::CoordinatorBuilder;
pub use categories::DEFAULT_CATEGORY_CROSS_MAP;
pub use charset::OctetEncoding;
pub use coordinator::{BroadcastCoordinator, Intake, MessageHistory, RecentWindow, Resolution};
pub use decoder::{
    BearerDataDecoder, CbIdentifier, CodingError, DecodeContext, DecodeOutcome, Decoder,
    GeoFencingTrigger, GsmDecoder,
};
pub use duplicate::{DuplicateConfig, DuplicateDetector};
pub use geofence::{SendAction, SendDecisionCalculator};
pub use geometry::{Circle, Geometry, LatLng, Polygon};
pub use location::{LocationArbiter, LocationFix, LocationRequest, LocationTicket};
pub use message::{
    BodyEncoding, CbLocation, CbMessage, CmasCategory, CmasCertainty, CmasClass, CmasInfo,
    CmasResponseType, CmasSeverity, CmasUrgency, EtwsInfo, EtwsWarningType, GeographicalScope,
    MessageFormat, Priority,
};
