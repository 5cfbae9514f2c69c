//! CDMA bearer data decoding
//!
//! A bearer data payload is a sequence of tagged subparameters:
//! `(tag u8, length u8, payload length×8 bits)`. Only a handful of tags
//! matter to broadcast handling; everything else in the defined range is
//! reserved and skipped by its declared length so that payloads from newer
//! network revisions still decode. A duplicated *defined* tag is a hard
//! error. The MESSAGE_IDENTIFIER subparameter is mandatory.
//!
//! When the service category is a CMAS emergency category, the user data
//! payload is re-interpreted as a CMAS record stream (protocol version,
//! then `(record_type, record_len, payload)` triples). A malformed record
//! stream forfeits only the CMAS text: the message keeps its plain
//! user-data body and a class derived from the service category.

use chrono::Utc;
use log::{debug, warn};

use crate::bits::BitReader;
use crate::categories;
use crate::charset::{self, OctetEncoding};
use crate::message::{
    BodyEncoding, CbLocation, CbMessage, CmasCategory, CmasCertainty, CmasInfo, CmasResponseType,
    CmasSeverity, CmasUrgency, GeographicalScope, MessageFormat, Priority,
};

use super::{CodingError, DecodeContext, DecodeOutcome, Decoder};

// Subparameter tags (3GPP2 C.S0015 table 4.5-1)
const SUBPARAM_MESSAGE_IDENTIFIER: u8 = 0x00;
const SUBPARAM_USER_DATA: u8 = 0x01;
const SUBPARAM_PRIORITY_INDICATOR: u8 = 0x08;
const SUBPARAM_LANGUAGE_INDICATOR: u8 = 0x0D;
const SUBPARAM_LAST_DEFINED: u8 = 0x17;

// User data encodings (C.R1001 table 9.1-1)
const ENCODING_OCTET: u8 = 0x00;
const ENCODING_IS91: u8 = 0x01;
const ENCODING_IA5: u8 = 0x02;
const ENCODING_UNICODE_16: u8 = 0x04;
const ENCODING_SHIFT_JIS: u8 = 0x05;
const ENCODING_LATIN: u8 = 0x08;
const ENCODING_GSM_7BIT: u8 = 0x09;
const ENCODING_GSM_DCS: u8 = 0x0A;

/// Decoder for CDMA bearer data payloads
#[derive(Clone, Debug, Default)]
pub struct BearerDataDecoder {
    octet_encoding: OctetEncoding,
}

/// Raw user data subparameter, before text decoding
#[derive(Clone, Debug, Default)]
struct UserData {
    encoding: u8,
    msg_type: u8,
    num_fields: usize,
    payload: Vec<u8>,
}

impl BearerDataDecoder {
    /// New decoder with the given octet-payload charset policy
    pub fn new(octet_encoding: OctetEncoding) -> Self {
        Self { octet_encoding }
    }

    fn decode_text(&self, user_data: &UserData) -> Result<(BodyEncoding, String), CodingError> {
        let payload = user_data.payload.as_slice();
        let n = user_data.num_fields;
        let out = match user_data.encoding {
            ENCODING_OCTET => (
                BodyEncoding::Octet,
                charset::decode_octet(clamp_bytes(payload, n), self.octet_encoding),
            ),
            ENCODING_IA5 => (BodyEncoding::Ia5, charset::decode_ia5(payload, n)),
            ENCODING_UNICODE_16 => (
                BodyEncoding::Unicode16,
                charset::decode_ucs2(clamp_bytes(payload, n * 2)),
            ),
            ENCODING_SHIFT_JIS => (
                BodyEncoding::ShiftJis,
                charset::decode_shift_jis(clamp_bytes(payload, n)),
            ),
            ENCODING_LATIN => (
                BodyEncoding::Latin,
                charset::decode_latin(clamp_bytes(payload, n)),
            ),
            ENCODING_GSM_7BIT => (
                BodyEncoding::Gsm7,
                charset::decode_gsm7_packed(payload, 0, n),
            ),
            ENCODING_GSM_DCS => {
                // the embedded DCS selects the real charset
                let body = match (user_data.msg_type >> 2) & 0x3 {
                    0 => charset::decode_gsm7_packed(payload, 0, n),
                    1 => charset::decode_octet(clamp_bytes(payload, n), self.octet_encoding),
                    2 => charset::decode_ucs2(clamp_bytes(payload, n * 2)),
                    _ => return Err(CodingError::UnsupportedEncoding(user_data.encoding)),
                };
                (BodyEncoding::GsmDcs, body)
            }
            other => return Err(CodingError::UnsupportedEncoding(other)),
        };
        Ok(out)
    }
}

impl Decoder for BearerDataDecoder {
    fn decode(&mut self, pdu: &[u8], ctx: &DecodeContext) -> Result<DecodeOutcome, CodingError> {
        let service_category = ctx.service_category.unwrap_or(0);
        let mut rd = BitReader::new(pdu);

        let mut seen: u32 = 0;
        let mut message_id: Option<(u16, bool)> = None;
        let mut user_data: Option<UserData> = None;
        let mut priority: Option<Priority> = None;
        let mut language: Option<String> = None;

        while rd.available() >= 8 {
            let tag = rd.read(8)? as u8;
            if tag <= SUBPARAM_LAST_DEFINED {
                let bit = 1u32 << tag;
                if seen & bit != 0 {
                    return Err(CodingError::DuplicateSubparameter(tag));
                }
                seen |= bit;
            }

            let result = match tag {
                SUBPARAM_MESSAGE_IDENTIFIER => {
                    decode_message_id(&mut rd).map(|id| message_id = id)
                }
                SUBPARAM_USER_DATA => {
                    decode_user_data(&mut rd).map(|ud| user_data = Some(ud))
                }
                SUBPARAM_PRIORITY_INDICATOR => {
                    decode_priority(&mut rd).map(|p| priority = p)
                }
                SUBPARAM_LANGUAGE_INDICATOR => {
                    decode_language(&mut rd).map(|lang| language = lang)
                }
                _ => skip_subparameter(&mut rd, tag),
            };
            match result {
                Ok(()) => {}
                // a truncated subparameter forfeits its own contribution;
                // the rest of the message stands
                Err(CodingError::OutOfData(err)) => {
                    warn!("bearerdata: truncated subparameter {:#04x}: {}", tag, err);
                    break;
                }
                Err(other) => return Err(other),
            }
        }

        let (message_id, has_udh) = message_id.ok_or(CodingError::MissingMessageIdentifier)?;

        let mut body = String::new();
        let mut body_encoding = BodyEncoding::Octet;
        if let Some(ud) = &user_data {
            let (enc, text) = self.decode_text(ud)?;
            body_encoding = enc;
            body = text;
        }

        // emergency categories carry a CMAS record stream inside the user
        // data; a bad stream costs only the CMAS text, not the message
        let mut cmas = None;
        if categories::is_cdma_cmas_category(service_category) {
            let class = categories::cmas_class_for_cdma_category(service_category);
            let mut info = categories::cmas_info_for_class(class);
            if let Some(ud) = &user_data {
                match self.decode_cmas_records(&ud.payload, &mut info) {
                    Ok(Some(alert_text)) => {
                        body = alert_text.1;
                        body_encoding = alert_text.0;
                    }
                    Ok(None) => {}
                    Err(err) => {
                        warn!("bearerdata: CMAS record stream rejected: {}", err);
                    }
                }
            }
            cmas = Some(info);
        }

        let priority = priority.unwrap_or(if cmas.is_some() {
            Priority::Emergency
        } else {
            Priority::Normal
        });

        debug!(
            "bearerdata: id={} cat={:#x} encoding={:?} body_len={}",
            message_id,
            service_category,
            body_encoding,
            body.len()
        );

        Ok(DecodeOutcome::Complete(CbMessage {
            format: MessageFormat::Cdma,
            slot_index: ctx.slot_index,
            geographical_scope: GeographicalScope::PlmnWide,
            serial_number: message_id as i32,
            location: CbLocation::plmn_wide(ctx.plmn.clone()),
            service_category,
            message_id,
            language,
            body_encoding,
            body,
            priority,
            has_user_data_header: has_udh,
            cmas,
            etws: None,
            geometries: Vec::new(),
            maximum_wait_secs: None,
            received_at: Utc::now(),
        }))
    }
}

impl BearerDataDecoder {
    /// Parse the CMAS record stream carried in a user data payload
    ///
    /// Returns the re-encoded alert text from a type-0 record, if present.
    /// Type-1 records fill in the alert attributes. Unknown record types
    /// are skipped by their declared length.
    fn decode_cmas_records(
        &self,
        payload: &[u8],
        info: &mut CmasInfo,
    ) -> Result<Option<(BodyEncoding, String)>, CodingError> {
        let mut rd = BitReader::new(payload);
        let version = rd.read(8)? as u8;
        if version != 0 {
            return Err(CodingError::UnsupportedProtocolVersion(version));
        }

        let mut alert_text = None;
        while rd.available() >= 16 {
            let record_type = rd.read(8)? as u8;
            let record_len = rd.read(8)? as usize;
            let record_bits = record_len * 8;

            match record_type {
                0 => {
                    if record_bits < 5 {
                        rd.skip(usize::min(record_bits, rd.available()))?;
                        continue;
                    }
                    let encoding = rd.read(5)? as u8;
                    // text length in fields is implied by the record length
                    let num_fields = match encoding {
                        ENCODING_OCTET | ENCODING_LATIN | ENCODING_SHIFT_JIS => record_len - 1,
                        ENCODING_IA5 | ENCODING_GSM_7BIT => (record_bits - 5) / 7,
                        ENCODING_UNICODE_16 => (record_len - 1) / 2,
                        _ => 0,
                    };
                    let data_bits = clamp_bits(record_bits - 5, rd.available(), "CMAS text");
                    let record = UserData {
                        encoding,
                        msg_type: 0,
                        num_fields,
                        payload: rd.read_byte_array(data_bits)?,
                    };
                    alert_text = Some(self.decode_text(&record)?);
                }
                1 => {
                    if record_bits < 28 {
                        warn!("bearerdata: short CMAS type-1 record ({} bytes)", record_len);
                        rd.skip(usize::min(record_bits, rd.available()))?;
                        continue;
                    }
                    info.category = CmasCategory::from_wire(rd.read(8)?);
                    info.response_type = CmasResponseType::from_wire(rd.read(8)?);
                    info.severity = CmasSeverity::from_wire(rd.read(4)?);
                    info.urgency = CmasUrgency::from_wire(rd.read(4)?);
                    info.certainty = CmasCertainty::from_wire(rd.read(4)?);
                    rd.skip(clamp_bits(record_bits - 28, rd.available(), "CMAS record"))?;
                }
                other => {
                    debug!("bearerdata: skipping CMAS record type {}", other);
                    rd.skip(clamp_bits(record_bits, rd.available(), "CMAS record"))?;
                }
            }
        }
        Ok(alert_text)
    }
}

// MESSAGE_IDENTIFIER: type(4), id(16), udh(1), reserved(3)
fn decode_message_id(rd: &mut BitReader<'_>) -> Result<Option<(u16, bool)>, CodingError> {
    let mut bits = rd.read(8)? as usize * 8;
    if bits < 24 {
        warn!("bearerdata: runt MESSAGE_IDENTIFIER ({} bits)", bits);
        rd.skip(clamp_bits(bits, rd.available(), "MESSAGE_IDENTIFIER"))?;
        return Ok(None);
    }
    rd.skip(4)?; // message type
    let id = rd.read(16)? as u16;
    let has_udh = rd.read(1)? == 1;
    rd.skip(3)?;
    bits -= 24;
    rd.skip(clamp_bits(bits, rd.available(), "MESSAGE_IDENTIFIER"))?;
    Ok(Some((id, has_udh)))
}

// USER_DATA: encoding(5), [msg_type(8)], num_fields(8), payload
fn decode_user_data(rd: &mut BitReader<'_>) -> Result<UserData, CodingError> {
    let bits = rd.read(8)? as usize * 8;
    let mut consumed = 5;
    let encoding = rd.read(5)? as u8;
    let msg_type = if encoding == ENCODING_IS91 || encoding == ENCODING_GSM_DCS {
        consumed += 8;
        rd.read(8)? as u8
    } else {
        0
    };
    let num_fields = rd.read(8)? as usize;
    consumed += 8;

    let declared = bits.saturating_sub(consumed);
    let data_bits = clamp_bits(declared, rd.available(), "USER_DATA");
    Ok(UserData {
        encoding,
        msg_type,
        num_fields,
        payload: rd.read_byte_array(data_bits)?,
    })
}

// PRIORITY_INDICATOR: priority(2), reserved(6)
fn decode_priority(rd: &mut BitReader<'_>) -> Result<Option<Priority>, CodingError> {
    let bits = rd.read(8)? as usize * 8;
    if bits < 8 {
        rd.skip(clamp_bits(bits, rd.available(), "PRIORITY_INDICATOR"))?;
        return Ok(None);
    }
    let priority = Priority::from_wire(rd.read(2)? as u8);
    rd.skip(clamp_bits(bits - 2, rd.available(), "PRIORITY_INDICATOR"))?;
    Ok(Some(priority))
}

// LANGUAGE_INDICATOR: language(8)
fn decode_language(rd: &mut BitReader<'_>) -> Result<Option<String>, CodingError> {
    let bits = rd.read(8)? as usize * 8;
    if bits < 8 {
        rd.skip(clamp_bits(bits, rd.available(), "LANGUAGE_INDICATOR"))?;
        return Ok(None);
    }
    let code = rd.read(8)? as u8;
    rd.skip(clamp_bits(bits - 8, rd.available(), "LANGUAGE_INDICATOR"))?;
    Ok(categories::CDMA_LANGUAGES
        .get(&code)
        .map(|lang| (*lang).to_owned()))
}

// reserved tag: honor the declared length
fn skip_subparameter(rd: &mut BitReader<'_>, tag: u8) -> Result<(), CodingError> {
    let bits = rd.read(8)? as usize * 8;
    debug!("bearerdata: skipping subparameter {:#04x} ({} bits)", tag, bits);
    rd.skip(clamp_bits(bits, rd.available(), "reserved subparameter"))?;
    Ok(())
}

// clamp a declared bit count to what the buffer still holds
fn clamp_bits(declared: usize, available: usize, what: &str) -> usize {
    if declared > available {
        warn!(
            "bearerdata: {} declares {} bits, {} available; clamping",
            what, declared, available
        );
        available
    } else {
        declared
    }
}

// clamp a declared byte count to the slice
fn clamp_bytes(payload: &[u8], declared: usize) -> &[u8] {
    if declared > payload.len() {
        warn!(
            "bearerdata: {} bytes declared, {} present; clamping",
            declared,
            payload.len()
        );
        payload
    } else {
        &payload[..declared]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::CmasClass;

    /// MSB-first bit packer for building test payloads
    #[derive(Default)]
    struct BitWriter {
        bytes: Vec<u8>,
        bit: usize,
    }

    impl BitWriter {
        fn put(&mut self, value: u32, nbits: usize) -> &mut Self {
            for i in (0..nbits).rev() {
                if self.bit % 8 == 0 {
                    self.bytes.push(0);
                }
                let bit = (value >> i) & 1;
                let byte = self.bytes.last_mut().unwrap();
                *byte |= (bit as u8) << (7 - self.bit % 8);
                self.bit += 1;
            }
            self
        }

        fn finish(&mut self) -> Vec<u8> {
            std::mem::take(&mut self.bytes)
        }
    }

    fn message_id_subparam(id: u16, udh: bool) -> Vec<u8> {
        let mut w = BitWriter::default();
        w.put(SUBPARAM_MESSAGE_IDENTIFIER as u32, 8)
            .put(3, 8) // length in bytes
            .put(0, 4) // message type
            .put(id as u32, 16)
            .put(udh as u32, 1)
            .put(0, 3);
        w.finish()
    }

    fn ia5_user_data(text: &str) -> Vec<u8> {
        let bits = 5 + 8 + text.len() * 7;
        let len = (bits + 7) / 8;
        let mut w = BitWriter::default();
        w.put(SUBPARAM_USER_DATA as u32, 8)
            .put(len as u32, 8)
            .put(ENCODING_IA5 as u32, 5)
            .put(text.len() as u32, 8);
        for ch in text.bytes() {
            w.put(ch as u32, 7);
        }
        w.put(0, len * 8 - bits);
        w.finish()
    }

    fn decode(pdu: &[u8], category: Option<i32>) -> Result<CbMessage, CodingError> {
        let mut decoder = BearerDataDecoder::default();
        let ctx = DecodeContext {
            slot_index: 0,
            plmn: "310260".to_owned(),
            lac: -1,
            cid: -1,
            service_category: category,
        };
        match decoder.decode(pdu, &ctx)? {
            DecodeOutcome::Complete(msg) => Ok(msg),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_message_id_and_ia5_text() {
        let mut pdu = message_id_subparam(42, false);
        pdu.extend(ia5_user_data("TEST"));

        let msg = decode(&pdu, None).unwrap();
        assert_eq!(42, msg.message_id);
        assert_eq!("TEST", msg.body);
        assert_eq!(BodyEncoding::Ia5, msg.body_encoding);
        assert_eq!(MessageFormat::Cdma, msg.format);
        assert!(!msg.has_user_data_header);
        assert!(msg.cmas.is_none());
        assert!(!msg.needs_geofencing());
    }

    #[test]
    fn test_cmas_category_keeps_plain_body() {
        // the payload is not a valid CMAS record stream; the message keeps
        // its IA5 body and gains a class derived from the category
        let mut pdu = message_id_subparam(42, false);
        pdu.extend(ia5_user_data("TEST"));

        let msg = decode(&pdu, Some(categories::CATEGORY_CMAS_EXTREME_THREAT)).unwrap();
        assert_eq!(42, msg.message_id);
        assert_eq!("TEST", msg.body);
        let cmas = msg.cmas.expect("CMAS category must yield cmas info");
        assert_eq!(CmasClass::ExtremeThreat, cmas.message_class);
        assert_eq!(CmasSeverity::Unknown, cmas.severity);
        assert_eq!(Priority::Emergency, msg.priority);
    }

    #[test]
    fn test_cmas_record_stream() {
        // octet user data carrying: version 0, type-0 alert text (IA5 "HI"),
        // type-1 attribute record
        let mut records = BitWriter::default();
        records.put(0, 8); // protocol version
        records.put(0, 8).put(3, 8); // type 0, 3 bytes
        records.put(ENCODING_IA5 as u32, 5);
        records.put('H' as u32, 7).put('I' as u32, 7);
        records.put(0, 5); // pad to record length
        records.put(1, 8).put(4, 8); // type 1, 4 bytes
        records.put(2, 8); // category: safety
        records.put(1, 8); // response: evacuate
        records.put(0, 4).put(1, 4); // severity extreme, urgency expected
        records.put(0, 4).put(0, 4); // certainty observed + pad
        let records = records.finish();

        let bits = 5 + 8 + records.len() * 8;
        let len = (bits + 7) / 8;
        let mut w = BitWriter::default();
        w.put(SUBPARAM_USER_DATA as u32, 8)
            .put(len as u32, 8)
            .put(ENCODING_OCTET as u32, 5)
            .put(records.len() as u32, 8);
        for b in &records {
            w.put(*b as u32, 8);
        }
        w.put(0, len * 8 - bits);

        let mut pdu = message_id_subparam(7, false);
        pdu.extend(w.finish());

        let msg = decode(&pdu, Some(categories::CATEGORY_CMAS_SEVERE_THREAT)).unwrap();
        assert_eq!("HI", msg.body);
        assert_eq!(BodyEncoding::Ia5, msg.body_encoding);
        let cmas = msg.cmas.unwrap();
        assert_eq!(CmasClass::SevereThreat, cmas.message_class);
        assert_eq!(CmasCategory::Safety, cmas.category);
        assert_eq!(CmasResponseType::Evacuate, cmas.response_type);
        assert_eq!(CmasSeverity::Extreme, cmas.severity);
        assert_eq!(CmasUrgency::Expected, cmas.urgency);
        assert_eq!(CmasCertainty::Observed, cmas.certainty);
    }

    #[test]
    fn test_missing_message_identifier_is_fatal() {
        let pdu = ia5_user_data("TEST");
        assert_eq!(
            Err(CodingError::MissingMessageIdentifier),
            decode(&pdu, None)
        );
    }

    #[test]
    fn test_duplicate_defined_tag_is_fatal() {
        let mut pdu = message_id_subparam(1, false);
        pdu.extend(message_id_subparam(2, false));
        assert_eq!(
            Err(CodingError::DuplicateSubparameter(0x00)),
            decode(&pdu, None)
        );
    }

    #[test]
    fn test_reserved_tags_skipped_by_length() {
        // an unknown defined-range tag and a reserved tag both skip cleanly
        let mut pdu = message_id_subparam(9, true);
        pdu.extend([0x10, 0x02, 0xAA, 0xBB]); // defined-range, unhandled
        pdu.extend([0x40, 0x03, 0x01, 0x02, 0x03]); // reserved
        pdu.extend(ia5_user_data("OK"));

        let msg = decode(&pdu, None).unwrap();
        assert_eq!(9, msg.message_id);
        assert!(msg.has_user_data_header);
        assert_eq!("OK", msg.body);
    }

    #[test]
    fn test_priority_and_language_subparameters() {
        let mut pdu = message_id_subparam(5, false);
        pdu.extend([SUBPARAM_PRIORITY_INDICATOR, 0x01, 0b10_000000]); // urgent
        pdu.extend([SUBPARAM_LANGUAGE_INDICATOR, 0x01, 0x03]); // spanish
        pdu.extend(ia5_user_data("HOLA"));

        let msg = decode(&pdu, None).unwrap();
        assert_eq!(Priority::Urgent, msg.priority);
        assert_eq!(Some("es".to_owned()), msg.language);
    }

    #[test]
    fn test_truncated_user_data_clamps() {
        // declared length larger than the remaining payload: decode still
        // succeeds with however many fields fit
        let mut pdu = message_id_subparam(3, false);
        let mut ud = ia5_user_data("TESTING");
        ud[1] = 0x30; // inflate the declared subparameter length
        pdu.extend(ud);

        let msg = decode(&pdu, None).unwrap();
        assert_eq!("TESTING", msg.body);
    }

    #[test]
    fn test_truncated_trailing_subparameter_is_tolerated() {
        // a user data subparameter cut off mid-header loses only its own
        // contribution; the message identifier still stands
        let mut pdu = message_id_subparam(11, false);
        pdu.extend([SUBPARAM_USER_DATA, 0x20, 0x10]);

        let msg = decode(&pdu, None).unwrap();
        assert_eq!(11, msg.message_id);
        assert_eq!("", msg.body);
    }

    #[test]
    fn test_subparameter_round_trip_consumes_declared_bits() {
        // three reserved subparameters in a row, then the identifier: the
        // loop must land exactly on each tag boundary
        let mut pdu = Vec::new();
        pdu.extend([0x11u8, 0x01, 0xFF]);
        pdu.extend([0x12u8, 0x00]);
        pdu.extend([0x13u8, 0x04, 0xDE, 0xAD, 0xBE, 0xEF]);
        pdu.extend(message_id_subparam(0xFFFF, false));

        let msg = decode(&pdu, None).unwrap();
        assert_eq!(0xFFFF, msg.message_id);
        assert_eq!(0xFFFF, msg.serial_number);
    }
}
