//! GSM/UMTS SMS-CB PDU decoding
//!
//! Three wire shapes share one entry point:
//!
//! * **GSM** (≤ 88 bytes): 6-byte header, then up to 82 bytes of body.
//!   Multi-page messages arrive as separate PDUs and are reassembled here,
//!   keyed by (serial number, location).
//! * **UMTS** (> 88 bytes): message-type byte, 5 header bytes, a page
//!   count, then `82 bytes + 1 length byte` per page, optionally followed
//!   by warning area coordinates.
//! * **ETWS primary** (≤ 56 bytes with an ETWS identifier): a short
//!   pre-alert with no text body of its own.
//!
//! A geo-fencing trigger is a header-identified message (`0x1130`) whose
//! payload is a list of broadcast identities rather than text.

use std::collections::HashMap;

use arrayvec::ArrayVec;
use chrono::Utc;
use log::{debug, warn};

use crate::bits::BitReader;
use crate::categories;
use crate::charset;
use crate::geometry::{Circle, Geometry, LatLng, Polygon};
use crate::message::{
    BodyEncoding, CbLocation, CbMessage, EtwsInfo, EtwsWarningType, GeographicalScope,
    MessageFormat, Priority,
};

use super::{CbIdentifier, CodingError, DecodeContext, DecodeOutcome, Decoder, GeoFencingTrigger};

const PDU_HEADER_LENGTH: usize = 6;
const PDU_LENGTH_GSM: usize = 88;
const PDU_LENGTH_ETWS_PRIMARY: usize = 56;
const MESSAGE_TYPE_CBS_DATA: u8 = 0x01;
const UMTS_PAGE_SIZE: usize = 82;

/// Maximum page count encodable in the 4-bit header field
const MAX_PAGES: usize = 15;

// Warning-area element types (ATIS-0700041)
const WAC_ELEMENT_MAXIMUM_WAIT_TIME: u32 = 1;
const WAC_ELEMENT_POLYGON: u32 = 2;
const WAC_ELEMENT_CIRCLE: u32 = 3;

/// Decoder for 3GPP SMS-CB PDUs
///
/// Owns the multi-page reassembly state for its radio technology. Partial
/// messages whose location no longer matches the serving cell are evicted
/// on every decode pass, bounding the map.
#[derive(Clone, Debug, Default)]
pub struct GsmDecoder {
    assembler: PageAssembler,
}

impl GsmDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Partial multi-page messages currently buffered
    pub fn pending_pages(&self) -> usize {
        self.assembler.len()
    }
}

impl Decoder for GsmDecoder {
    fn decode(&mut self, pdu: &[u8], ctx: &DecodeContext) -> Result<DecodeOutcome, CodingError> {
        let header = CbHeader::parse(pdu)?;

        if header.message_id == categories::MESSAGE_ID_GEO_FENCING_TRIGGER {
            return Ok(DecodeOutcome::Trigger(parse_geofencing_trigger(pdu)?));
        }

        let location =
            CbLocation::for_scope(header.geographical_scope, ctx.plmn.clone(), ctx.lac, ctx.cid);

        // drop partial messages from cells we are no longer in
        self.assembler.evict_out_of_area(&ctx.plmn, ctx.lac, ctx.cid);

        match header.format {
            PduFormat::EtwsPrimary => {
                let etws = header.etws.expect("primary header carries etws info");
                Ok(DecodeOutcome::Complete(build_message(
                    &header,
                    ctx,
                    location,
                    BodyEncoding::Gsm7,
                    etws.warning_type.as_display_str().to_owned(),
                    None,
                    Vec::new(),
                    None,
                )))
            }
            PduFormat::Umts => decode_umts(&header, pdu, ctx, location),
            PduFormat::Gsm => {
                if header.page_count > 1 {
                    let key = ConcatKey {
                        serial_number: header.serial_number,
                        location: location.clone(),
                    };
                    match self.assembler.insert(
                        key,
                        header.page_index,
                        header.page_count,
                        pdu.to_vec(),
                    ) {
                        None => Ok(DecodeOutcome::Assembling),
                        Some(pages) => {
                            let slices: Vec<&[u8]> =
                                pages.iter().map(|p| &p[PDU_HEADER_LENGTH..]).collect();
                            decode_pages(&header, ctx, location, &slices, Vec::new(), None)
                        }
                    }
                } else {
                    decode_pages(
                        &header,
                        ctx,
                        location,
                        &[&pdu[PDU_HEADER_LENGTH..]],
                        Vec::new(),
                        None,
                    )
                }
            }
        }
    }
}

/// Wire shape of a PDU
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PduFormat {
    Gsm,
    Umts,
    EtwsPrimary,
}

/// Parsed SMS-CB header fields
#[derive(Clone, Debug)]
struct CbHeader {
    format: PduFormat,
    geographical_scope: GeographicalScope,
    serial_number: i32,
    message_id: u16,
    dcs: u8,
    page_index: usize,
    page_count: usize,
    etws: Option<EtwsInfo>,
}

impl CbHeader {
    fn parse(pdu: &[u8]) -> Result<Self, CodingError> {
        if pdu.len() < PDU_HEADER_LENGTH {
            return Err(CodingError::TooShort(pdu.len()));
        }

        if pdu.len() <= PDU_LENGTH_GSM {
            let geographical_scope = GeographicalScope::from_wire(pdu[0] >> 6);
            let serial_number = ((pdu[0] as i32) << 8) | pdu[1] as i32;
            let message_id = u16::from_be_bytes([pdu[2], pdu[3]]);

            if categories::is_etws_id(message_id) && pdu.len() <= PDU_LENGTH_ETWS_PRIMARY {
                // ETWS primary notification: no DCS, no pages
                return Ok(Self {
                    format: PduFormat::EtwsPrimary,
                    geographical_scope,
                    serial_number,
                    message_id,
                    dcs: 0,
                    page_index: 1,
                    page_count: 1,
                    etws: Some(EtwsInfo {
                        warning_type: EtwsWarningType::from_wire((pdu[4] & 0xFE) >> 1),
                        emergency_user_alert: pdu[4] & 0x01 != 0,
                        activate_popup: pdu[5] & 0x80 != 0,
                        is_primary: true,
                    }),
                });
            }

            let mut page_index = (pdu[5] >> 4) as usize;
            let mut page_count = (pdu[5] & 0x0F) as usize;
            if page_index == 0 || page_count == 0 || page_index > page_count {
                page_index = 1;
                page_count = 1;
            }
            Ok(Self {
                format: PduFormat::Gsm,
                geographical_scope,
                serial_number,
                message_id,
                dcs: pdu[4],
                page_index,
                page_count,
                etws: etws_secondary_info(message_id),
            })
        } else {
            let message_type = pdu[0];
            if message_type != MESSAGE_TYPE_CBS_DATA {
                return Err(CodingError::UnsupportedMessageType(message_type));
            }
            let message_id = u16::from_be_bytes([pdu[1], pdu[2]]);
            Ok(Self {
                format: PduFormat::Umts,
                geographical_scope: GeographicalScope::from_wire(pdu[3] >> 6),
                serial_number: ((pdu[3] as i32) << 8) | pdu[4] as i32,
                message_id,
                dcs: pdu[5],
                page_index: 1,
                page_count: 1,
                etws: etws_secondary_info(message_id),
            })
        }
    }
}

fn etws_secondary_info(message_id: u16) -> Option<EtwsInfo> {
    if !categories::is_etws_id(message_id) {
        return None;
    }
    let warning_type = match message_id {
        categories::MESSAGE_ID_ETWS_EARTHQUAKE => EtwsWarningType::Earthquake,
        categories::MESSAGE_ID_ETWS_TSUNAMI => EtwsWarningType::Tsunami,
        categories::MESSAGE_ID_ETWS_EARTHQUAKE_AND_TSUNAMI => {
            EtwsWarningType::EarthquakeAndTsunami
        }
        categories::MESSAGE_ID_ETWS_TEST => EtwsWarningType::TestMessage,
        _ => EtwsWarningType::OtherEmergency,
    };
    Some(EtwsInfo {
        warning_type,
        emergency_user_alert: false,
        activate_popup: false,
        is_primary: false,
    })
}

// UMTS: all pages arrive in one PDU, optionally followed by the warning area
fn decode_umts(
    header: &CbHeader,
    pdu: &[u8],
    ctx: &DecodeContext,
    location: CbLocation,
) -> Result<DecodeOutcome, CodingError> {
    let page_count = pdu[PDU_HEADER_LENGTH] as usize;
    let pages_end = PDU_HEADER_LENGTH + 1 + page_count * (UMTS_PAGE_SIZE + 1);
    if page_count == 0 || pdu.len() < pages_end {
        return Err(CodingError::TooShort(pdu.len()));
    }

    let mut pages: Vec<&[u8]> = Vec::with_capacity(page_count);
    for i in 0..page_count {
        let start = PDU_HEADER_LENGTH + 1 + i * (UMTS_PAGE_SIZE + 1);
        let declared = pdu[start + UMTS_PAGE_SIZE] as usize;
        let len = usize::min(declared, UMTS_PAGE_SIZE);
        if len < declared {
            warn!("gsmpdu: page {} declares {} bytes; clamping", i + 1, declared);
        }
        pages.push(&pdu[start..start + len]);
    }

    let (maximum_wait, geometries) = if pdu.len() > pages_end {
        parse_warning_area(pdu, pages_end)?
    } else {
        (None, Vec::new())
    };

    decode_pages(header, ctx, location, &pages, geometries, maximum_wait)
}

// Decode each page body, concatenate, and build the normalized record
fn decode_pages(
    header: &CbHeader,
    ctx: &DecodeContext,
    location: CbLocation,
    pages: &[&[u8]],
    geometries: Vec<Geometry>,
    maximum_wait: Option<u32>,
) -> Result<DecodeOutcome, CodingError> {
    let dcs = DcsInfo::parse(header.dcs)?;

    let mut language = dcs.language.map(str::to_owned);
    let mut body = String::new();
    for page in pages {
        body.push_str(&decode_page_body(page, &dcs, &mut language));
    }

    let body_encoding = match dcs.charset {
        CbsCharset::Gsm7 => BodyEncoding::Gsm7,
        CbsCharset::EightBit => BodyEncoding::Octet,
        CbsCharset::Ucs2 => BodyEncoding::Unicode16,
    };

    debug!(
        "gsmpdu: id={:#06x} serial={:#06x} pages={} body_len={}",
        header.message_id,
        header.serial_number,
        pages.len(),
        body.len()
    );

    Ok(DecodeOutcome::Complete(build_message(
        header,
        ctx,
        location,
        body_encoding,
        body,
        language,
        geometries,
        maximum_wait,
    )))
}

#[allow(clippy::too_many_arguments)]
fn build_message(
    header: &CbHeader,
    ctx: &DecodeContext,
    location: CbLocation,
    body_encoding: BodyEncoding,
    body: String,
    language: Option<String>,
    geometries: Vec<Geometry>,
    maximum_wait_secs: Option<u32>,
) -> CbMessage {
    let cmas = if categories::is_cmas_id(header.message_id) {
        let mut info =
            categories::cmas_info_for_class(categories::cmas_class_for_gsm_id(header.message_id));
        info.severity = categories::cmas_severity_for_gsm_id(header.message_id);
        info.urgency = categories::cmas_urgency_for_gsm_id(header.message_id);
        info.certainty = categories::cmas_certainty_for_gsm_id(header.message_id);
        Some(info)
    } else {
        None
    };

    let priority = if categories::is_gsm_emergency_id(header.message_id) {
        Priority::Emergency
    } else {
        Priority::Normal
    };

    CbMessage {
        format: MessageFormat::Gsm,
        slot_index: ctx.slot_index,
        geographical_scope: header.geographical_scope,
        serial_number: header.serial_number,
        location,
        service_category: header.message_id as i32,
        message_id: header.message_id,
        language,
        body_encoding,
        body,
        priority,
        has_user_data_header: false,
        cmas,
        etws: header.etws,
        geometries,
        maximum_wait_secs,
        received_at: Utc::now(),
    }
}

/// CBS data coding scheme charset
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CbsCharset {
    Gsm7,
    EightBit,
    Ucs2,
}

/// Decoded CBS data coding scheme (TS 23.038 §5)
#[derive(Clone, Copy, Debug)]
struct DcsInfo {
    charset: CbsCharset,
    language: Option<&'static str>,
    language_in_body: bool,
}

impl DcsInfo {
    fn parse(dcs: u8) -> Result<Self, CodingError> {
        let group = dcs >> 4;
        let low = dcs & 0x0F;
        match group {
            0x0 => Ok(Self {
                charset: CbsCharset::Gsm7,
                language: categories::CBS_LANGUAGE_GROUP_0.get(&low).copied(),
                language_in_body: false,
            }),
            0x1 => match low {
                0x0 => Ok(Self {
                    charset: CbsCharset::Gsm7,
                    language: None,
                    language_in_body: true,
                }),
                0x1 => Ok(Self {
                    charset: CbsCharset::Ucs2,
                    language: None,
                    language_in_body: true,
                }),
                _ => Err(CodingError::UnsupportedDcs(dcs)),
            },
            0x2 => Ok(Self {
                charset: CbsCharset::Gsm7,
                language: categories::CBS_LANGUAGE_GROUP_2.get(&low).copied(),
                language_in_body: false,
            }),
            0x3 => Ok(Self {
                // reserved language group: decode as plain GSM 7-bit
                charset: CbsCharset::Gsm7,
                language: None,
                language_in_body: false,
            }),
            0x4..=0x7 => {
                if dcs & 0x20 != 0 {
                    // compressed text is not supported for broadcasts
                    return Err(CodingError::UnsupportedDcs(dcs));
                }
                Ok(Self {
                    charset: general_charset(dcs)?,
                    language: None,
                    language_in_body: false,
                })
            }
            0x9 => Ok(Self {
                charset: general_charset(dcs)?,
                language: None,
                language_in_body: false,
            }),
            0xF => Ok(Self {
                charset: if dcs & 0x04 == 0 {
                    CbsCharset::Gsm7
                } else {
                    CbsCharset::EightBit
                },
                language: None,
                language_in_body: false,
            }),
            _ => Err(CodingError::UnsupportedDcs(dcs)),
        }
    }
}

fn general_charset(dcs: u8) -> Result<CbsCharset, CodingError> {
    match (dcs >> 2) & 0x3 {
        0 => Ok(CbsCharset::Gsm7),
        1 => Ok(CbsCharset::EightBit),
        2 => Ok(CbsCharset::Ucs2),
        _ => Err(CodingError::UnsupportedDcs(dcs)),
    }
}

// Decode one page of body text, harvesting an in-body language indicator
// if the coding scheme declares one
fn decode_page_body(page: &[u8], dcs: &DcsInfo, language: &mut Option<String>) -> String {
    match dcs.charset {
        CbsCharset::Gsm7 => {
            let septets = page.len() * 8 / 7;
            let text = charset::decode_gsm7_packed(page, 0, septets);
            let text = if dcs.language_in_body {
                // first three septets: two language characters plus CR
                *language = Some(text.chars().take(2).collect());
                text.chars().skip(3).collect::<String>()
            } else {
                text
            };
            charset::strip_cr_padding(&text).to_owned()
        }
        CbsCharset::Ucs2 => {
            let mut offset = 0;
            if dcs.language_in_body && page.len() >= 2 {
                // two GSM 7-bit characters ahead of the UCS-2 text
                *language = Some(charset::decode_gsm7_packed(page, 0, 2));
                offset = 2;
            }
            let text = charset::decode_ucs2(&page[offset..]);
            charset::strip_cr_padding(&text).to_owned()
        }
        // 8-bit broadcast data carries no displayable text
        CbsCharset::EightBit => String::new(),
    }
}

// Warning area coordinates: u16 little-endian data length, then elements
// of (type:4, length:10, pad:2) headers with byte-aligned payloads
fn parse_warning_area(
    pdu: &[u8],
    offset: usize,
) -> Result<(Option<u32>, Vec<Geometry>), CodingError> {
    if pdu.len() < offset + 2 {
        return Err(CodingError::TooShort(pdu.len()));
    }
    let declared = (pdu[offset] as usize) | ((pdu[offset + 1] as usize) << 8);
    let end = offset + 2 + declared;
    let end = if end > pdu.len() {
        warn!(
            "gsmpdu: warning area declares {} bytes, {} present; clamping",
            declared,
            pdu.len() - offset - 2
        );
        pdu.len()
    } else {
        end
    };

    let mut rd = BitReader::starting_at(&pdu[..end], offset + 2);
    let mut maximum_wait = None;
    let mut geometries = Vec::new();

    while rd.available() >= 16 {
        let element_type = rd.read(4)?;
        let element_len = rd.read(10)? as usize;
        rd.align_to_byte();

        match element_type {
            WAC_ELEMENT_MAXIMUM_WAIT_TIME => {
                maximum_wait = Some(rd.read(8)?);
                rd.align_to_byte();
            }
            WAC_ELEMENT_POLYGON => {
                // each vertex is a 44-bit packed coordinate
                let count = element_len.saturating_sub(2) * 8 / 44;
                let mut vertices = Vec::with_capacity(count);
                for _ in 0..count {
                    vertices.push(read_latlng(&mut rd)?);
                }
                rd.align_to_byte();
                if vertices.len() < 3 {
                    warn!("gsmpdu: polygon with {} vertices", vertices.len());
                }
                geometries.push(Geometry::Polygon(Polygon::new(vertices)));
            }
            WAC_ELEMENT_CIRCLE => {
                let center = read_latlng(&mut rd)?;
                // radius on the wire is 1/64 km
                let radius = rd.read(20)? as f64 * 1000.0 / 64.0;
                geometries.push(Geometry::Circle(Circle::new(center, radius)));
            }
            other => return Err(CodingError::UnsupportedGeometry(other as u8)),
        }
    }

    Ok((maximum_wait, geometries))
}

fn read_latlng(rd: &mut BitReader<'_>) -> Result<LatLng, CodingError> {
    let lat = rd.read(22)? as f64 * 180.0 / (1 << 22) as f64 - 90.0;
    let lng = rd.read(22)? as f64 * 360.0 / (1 << 22) as f64 - 180.0;
    Ok(LatLng::new(lat, lng))
}

// Geo-fencing trigger payload: (type:4, length:7, pad), then packed pairs
// of (message identifier, serial number)
fn parse_geofencing_trigger(pdu: &[u8]) -> Result<GeoFencingTrigger, CodingError> {
    let mut rd = BitReader::starting_at(pdu, PDU_HEADER_LENGTH + 1);
    let trigger_type = rd.read(4)? as u8;
    let length = rd.read(7)? as usize;
    rd.align_to_byte();

    let count = length.saturating_sub(2) * 8 / 32;
    let mut identifiers = Vec::with_capacity(count);
    for _ in 0..count {
        let message_id = rd.read(16)? as u16;
        let serial_number = rd.read(16)? as i32;
        identifiers.push(CbIdentifier {
            message_id,
            serial_number,
        });
    }

    Ok(GeoFencingTrigger {
        trigger_type,
        identifiers,
    })
}

/// Identity a partial multi-page message is keyed by
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct ConcatKey {
    serial_number: i32,
    location: CbLocation,
}

/// Buffered pages of one logical message
#[derive(Clone, Debug)]
struct PageBuffer {
    pages: ArrayVec<Option<Vec<u8>>, MAX_PAGES>,
}

impl PageBuffer {
    fn with_count(page_count: usize) -> Self {
        Self {
            pages: (0..page_count).map(|_| None).collect(),
        }
    }
}

/// Reassembles multi-page GSM messages
///
/// Entries are removed when the last page lands, and evicted whenever
/// their location stops matching the serving cell, so the map cannot grow
/// without bound on messages that never complete.
#[derive(Clone, Debug, Default)]
struct PageAssembler {
    buffers: HashMap<ConcatKey, PageBuffer>,
}

impl PageAssembler {
    /// Store a page; returns all pages in index order once complete
    fn insert(
        &mut self,
        key: ConcatKey,
        page_index: usize,
        page_count: usize,
        pdu: Vec<u8>,
    ) -> Option<Vec<Vec<u8>>> {
        let page_count = usize::min(page_count, MAX_PAGES);
        let buffer = self.buffers.entry(key.clone()).or_insert_with(|| {
            debug!(
                "gsmpdu: assembling serial={:#06x}, {} pages",
                key.serial_number, page_count
            );
            PageBuffer::with_count(page_count)
        });
        if buffer.pages.len() != page_count {
            // page count changed mid-flight: start over with this page
            *buffer = PageBuffer::with_count(page_count);
        }
        buffer.pages[page_index - 1] = Some(pdu);

        if buffer.pages.iter().all(Option::is_some) {
            let buffer = self.buffers.remove(&key).expect("buffer just inserted");
            Some(buffer.pages.into_iter().flatten().collect())
        } else {
            None
        }
    }

    /// Drop partial messages whose location no longer matches the cell
    fn evict_out_of_area(&mut self, plmn: &str, lac: i32, cid: i32) {
        self.buffers.retain(|key, _| {
            let keep = key.location.is_in_location_area(plmn, lac, cid);
            if !keep {
                debug!(
                    "gsmpdu: evicting partial message serial={:#06x}",
                    key.serial_number
                );
            }
            keep
        });
    }

    fn len(&self) -> usize {
        self.buffers.len()
    }
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;

    use super::*;

    fn hex(s: &str) -> Vec<u8> {
        let clean: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        clean
            .as_bytes()
            .chunks(2)
            .map(|pair| u8::from_str_radix(std::str::from_utf8(pair).unwrap(), 16).unwrap())
            .collect()
    }

    fn ctx() -> DecodeContext {
        DecodeContext {
            slot_index: 0,
            plmn: "94040".to_owned(),
            lac: 1234,
            cid: 5678,
            service_category: None,
        }
    }

    fn decode_one(pdu: &[u8]) -> CbMessage {
        let mut decoder = GsmDecoder::new();
        match decoder.decode(pdu, &ctx()).expect("decode failed") {
            DecodeOutcome::Complete(msg) => msg,
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    // 88-byte GSM-format page, 7-bit body with carriage-return padding
    const GSM_7BIT: &str = "C00000324011 41D071DA0491CBE6709D4D0785D97074585CA683DAE5F93C7C2E\
                            83EE693A1A340ECBE5E9F0B90C9297E975B91B040F93C969F7B9D1 68341A8D46A3\
                            D168341A8D46A3D168341A8D46A3D168341A8D46A3D100";
    const GSM_7BIT_BODY: &str = "A GSM default alphabet message with carriage return padding";

    // same body wrapped in the UMTS page format
    const UMTS_7BIT: &str = "010032C00040 01 41D071DA0491CBE6709D4D0785D97074585CA683DAE5F93C7C2E\
                             83EE693A1A340ECBE5E9F0B90C9297E975B91B040F93C969F7B9D168341A8D46A3\
                             D168341A8D46A3D168341A8D46A3D168341A8D46A3D100 34";

    #[test]
    fn test_gsm_7bit_body() {
        let msg = decode_one(&hex(GSM_7BIT));
        assert_eq!(GSM_7BIT_BODY, msg.body);
        assert_eq!(BodyEncoding::Gsm7, msg.body_encoding);
        assert_eq!(GeographicalScope::CellWide, msg.geographical_scope);
        assert_eq!(0x0032, msg.message_id);
        assert!(!msg.needs_geofencing());
    }

    #[test]
    fn test_umts_7bit_body() {
        let msg = decode_one(&hex(UMTS_7BIT));
        assert_eq!(GSM_7BIT_BODY, msg.body);
        assert_eq!(GeographicalScope::CellWide, msg.geographical_scope);
        assert_eq!(0x0032, msg.message_id);
    }

    #[test]
    fn test_geographical_scope_values() {
        let mut pdu = hex(GSM_7BIT);
        for (byte, scope) in [
            (0x00u8, GeographicalScope::CellWideImmediate),
            (0x40, GeographicalScope::PlmnWide),
            (0x80, GeographicalScope::LocationAreaWide),
            (0xC0, GeographicalScope::CellWide),
        ] {
            pdu[0] = byte;
            assert_eq!(scope, decode_one(&pdu).geographical_scope);
        }
    }

    #[test]
    fn test_serial_number_code_and_update() {
        let mut pdu = hex(GSM_7BIT);
        pdu[0] = 0x2A;
        pdu[1] = 0xA5;
        let msg = decode_one(&pdu);
        assert_eq!(682, msg.message_code());
        assert_eq!(5, msg.update_number());
    }

    #[test]
    fn test_language_from_dcs() {
        let mut pdu = hex(GSM_7BIT);
        pdu[4] = 0x04; // coding group 0, language 4: spanish
        let msg = decode_one(&pdu);
        assert_eq!(Some("es".to_owned()), msg.language);
        assert_eq!(GSM_7BIT_BODY, msg.body);
    }

    // 7-bit body with the language indicator in the first three septets
    const GSM_7BIT_LANG_IN_BODY: &str =
        "C00000321011 737B23083A4E9B2072D91CAEB3E9A0301B8E0E8BCB7450BB3C9F87CF65D0\
         3D4D4783C661B93C1D3E9741F232BD2E7783E0613239ED3E371A8D46A3D168341A\
         8D46A3D168341A8D46A3D168341A8D46A3D100";

    #[test]
    fn test_language_in_body_gsm7() {
        let msg = decode_one(&hex(GSM_7BIT_LANG_IN_BODY));
        assert_eq!(Some("sv".to_owned()), msg.language);
        assert_eq!(GSM_7BIT_BODY, msg.body);
    }

    // UCS-2 body containing a Cyrillic character
    const GSM_UCS2: &str =
        "C000003248110041002000550043005300320020006D00650073007300610067\
         006500200063006F006E007400610069006E0069006E00670020006100200434\
         0020006300680061007200610063007400650072000D000D";

    #[test]
    fn test_ucs2_body() {
        let msg = decode_one(&hex(GSM_UCS2));
        assert_eq!("A UCS2 message containing a \u{0434} character", msg.body);
        assert_eq!(BodyEncoding::Unicode16, msg.body_encoding);
    }

    // UCS-2 with a packed GSM language prefix ("xx")
    const GSM_UCS2_LANG_IN_BODY: &str =
        "C00000321111783C0041002000550043005300320020006D0065007300730061\
         0067006500200063006F006E007400610069006E0069006E0067002000610020\
         04340020006300680061007200610063007400650072000D";

    #[test]
    fn test_ucs2_language_in_body() {
        let msg = decode_one(&hex(GSM_UCS2_LANG_IN_BODY));
        assert_eq!(Some("xx".to_owned()), msg.language);
        assert_eq!("A UCS2 message containing a \u{0434} character", msg.body);
    }

    #[test]
    fn test_8bit_body_is_empty() {
        let mut pdu = hex(GSM_7BIT);
        pdu[4] = 0x44; // general coding group, 8-bit charset
        let msg = decode_one(&pdu);
        assert_eq!("", msg.body);
        assert_eq!(BodyEncoding::Octet, msg.body_encoding);
    }

    // UMTS multipage: "First page+" and "Second page" with CR padding
    const UMTS_MULTIPAGE: &str =
        "010001C0004002C6B47C4E07C1C3E7F2AAD168341A8D46A3D168341A8D46A3D1\
         68341A8D46A3D168341A8D46A3D168341A8D46A3D168341A8D46A3D168341A8D\
         46A3D168341A8D46A3D168341A8D46A3D168341A8D46A3D1000AD3F2F8ED2683\
         E0E173B9D168341A8D46A3D168341A8D46A3D168341A8D46A3D168341A8D46A3\
         D168341A8D46A3D168341A8D46A3D168341A8D46A3D168341A8D46A3D168341A\
         8D46A3D168341A8D46A3D1000A";

    #[test]
    fn test_umts_multipage_concatenation() {
        let msg = decode_one(&hex(UMTS_MULTIPAGE));
        assert_eq!("First page+Second page", msg.body);
    }

    #[test]
    fn test_gsm_multipage_out_of_order() {
        // synthesize a two-page GSM message from the single-page fixture:
        // page 2 of 2 first, then page 1 of 2
        let mut page1 = hex(GSM_7BIT);
        page1[5] = 0x12;
        let mut page2 = hex(GSM_7BIT);
        page2[5] = 0x22;

        let mut decoder = GsmDecoder::new();
        assert_eq!(
            DecodeOutcome::Assembling,
            decoder.decode(&page2, &ctx()).unwrap()
        );
        assert_eq!(1, decoder.pending_pages());
        let out = decoder.decode(&page1, &ctx()).unwrap();
        match out {
            DecodeOutcome::Complete(msg) => {
                // both pages decode to the same body text here; order and
                // completeness are what matter
                assert_eq!(
                    format!("{}{}", GSM_7BIT_BODY, GSM_7BIT_BODY),
                    msg.body
                );
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(0, decoder.pending_pages());
    }

    #[test]
    fn test_gsm_multipage_arrival_order_invariant() {
        let mut page1 = hex(GSM_7BIT);
        page1[5] = 0x12;
        let mut page2 = hex(GSM_7BIT);
        page2[5] = 0x22;

        let mut forward = GsmDecoder::new();
        forward.decode(&page1, &ctx()).unwrap();
        let a = forward.decode(&page2, &ctx()).unwrap();

        let mut reverse = GsmDecoder::new();
        reverse.decode(&page2, &ctx()).unwrap();
        let b = reverse.decode(&page1, &ctx()).unwrap();

        // identical up to the receive timestamp
        match (a, b) {
            (DecodeOutcome::Complete(mut a), DecodeOutcome::Complete(b)) => {
                a.received_at = b.received_at;
                assert_eq!(a, b);
            }
            other => panic!("unexpected outcomes {:?}", other),
        }
    }

    #[test]
    fn test_page_eviction_on_cell_change() {
        let mut page1 = hex(GSM_7BIT);
        page1[5] = 0x12;
        let mut decoder = GsmDecoder::new();
        decoder.decode(&page1, &ctx()).unwrap();
        assert_eq!(1, decoder.pending_pages());

        // a new message from a different cell evicts the stale buffer
        let moved = DecodeContext {
            cid: 9999,
            ..ctx()
        };
        decoder.decode(&hex(GSM_7BIT), &moved).unwrap();
        assert_eq!(0, decoder.pending_pages());
    }

    // geofenced CMAS alert: extreme/immediate/observed with warning area
    const UMTS_GEOFENCE: &str = "0111130F6A0101C8329BFD06559BD429E8FE96B3C92C101D9D9\
        E83D27350B22E1C7EAFF234BDFCADB962AE9A6BCE06A1DCE57B0AD40241C3E73208147B81622E000\
        0000000000000000000000000000000000000000000000039EA013028B53640A4BF600063204C8FC\
        D063F341AF67167E683CF01215F1E40100C053028B53640A4BF600063204C8FCD063F341AF67167E\
        683CF01215F1E40100C053028B53640A4BF600063";

    #[test]
    fn test_umts_geofenced_cmas() {
        let msg = decode_one(&hex(UMTS_GEOFENCE));
        assert_eq!(3946, msg.serial_number);
        assert_eq!(0x1113, msg.message_id);
        assert_eq!(Some("en".to_owned()), msg.language);
        assert_eq!(Priority::Emergency, msg.priority);
        assert!(msg.body.starts_with("Hello UMTS world"));

        let cmas = msg.cmas.expect("CMAS id must yield cmas info");
        assert_eq!(
            crate::message::CmasClass::ExtremeThreat,
            cmas.message_class
        );
        assert_eq!(crate::message::CmasUrgency::Immediate, cmas.urgency);
        assert_eq!(crate::message::CmasCertainty::Observed, cmas.certainty);

        assert_eq!(Some(5), msg.maximum_wait_secs);
        assert!(msg.needs_geofencing());
        // truncated fixture still carries two full circle/polygon pairs
        assert!(msg.geometries.len() >= 3);
        match &msg.geometries[0] {
            Geometry::Circle(c) => {
                assert_approx_eq!(c.center().lat, 37.41462707519531, 1e-9);
                assert_approx_eq!(c.center().lng, -122.08093643188477, 1e-9);
                assert_approx_eq!(c.radius(), 1546.875, 1e-9);
            }
            other => panic!("expected circle, got {:?}", other),
        }
        match &msg.geometries[1] {
            Geometry::Polygon(p) => {
                assert_eq!(3, p.vertices().len());
                assert_approx_eq!(p.vertices()[0].lat, 11.109967231750488, 1e-9);
                assert_approx_eq!(p.vertices()[0].lng, 22.219934463500977, 1e-9);
            }
            other => panic!("expected polygon, got {:?}", other),
        }
    }

    #[test]
    fn test_geofencing_trigger() {
        let pdu = hex("0001113001010010C0111204D2");
        let mut decoder = GsmDecoder::new();
        match decoder.decode(&pdu, &ctx()).unwrap() {
            DecodeOutcome::Trigger(trigger) => {
                assert_eq!(1, trigger.trigger_type);
                assert!(!trigger.should_share_broadcast_area());
                assert_eq!(1, trigger.identifiers.len());
                assert_eq!(0x1112, trigger.identifiers[0].message_id);
                assert_eq!(1234, trigger.identifiers[0].serial_number);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    // ETWS earthquake warning, UCS-2 secondary notification
    const ETWS_EARTHQUAKE: &str = "000011001101\
        0D0A5BAE57CE770C531790E85C716CBF3044573065B930675730\
        9707767A751F30025F37304463FA308C306B5099304830664E0B30553044FF086C178C615E81FF09\
        0000000000000000000000000000";

    #[test]
    fn test_etws_secondary() {
        let msg = decode_one(&hex(ETWS_EARTHQUAKE));
        assert_eq!(
            GeographicalScope::CellWideImmediate,
            msg.geographical_scope
        );
        assert_eq!(0, msg.serial_number);
        assert_eq!(0x1100, msg.message_id);
        let etws = msg.etws.expect("ETWS id must yield etws info");
        assert_eq!(EtwsWarningType::Earthquake, etws.warning_type);
        assert!(!etws.is_primary);
        assert!(!msg.body.is_empty());
    }

    #[test]
    fn test_etws_primary() {
        // 56-byte primary notification: warning type tsunami (1),
        // emergency user alert, popup
        let mut pdu = vec![0u8; PDU_LENGTH_ETWS_PRIMARY];
        pdu[2] = 0x11;
        pdu[3] = 0x00;
        pdu[4] = (1 << 1) | 0x01;
        pdu[5] = 0x80;
        let msg = decode_one(&pdu);
        let etws = msg.etws.unwrap();
        assert!(etws.is_primary);
        assert!(etws.emergency_user_alert);
        assert!(etws.activate_popup);
        assert_eq!(EtwsWarningType::Tsunami, etws.warning_type);
        assert!(msg.is_etws_primary());
    }

    #[test]
    fn test_too_short_pdu() {
        let mut decoder = GsmDecoder::new();
        assert_eq!(
            Err(CodingError::TooShort(4)),
            decoder.decode(&[0u8; 4], &ctx())
        );
    }

    #[test]
    fn test_decoder_never_panics_on_noise() {
        // xorshift noise; the decoder may reject but must not panic
        let mut decoder = GsmDecoder::new();
        let mut state = 0x94040u32;
        for _ in 0..2000 {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            let len = (state % 140) as usize;
            let mut pdu = Vec::with_capacity(len);
            let mut b = state;
            for _ in 0..len {
                b = b.wrapping_mul(1664525).wrapping_add(1013904223);
                pdu.push((b >> 24) as u8);
            }
            let _ = decoder.decode(&pdu, &ctx());
        }
    }
}
