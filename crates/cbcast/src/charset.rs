//! Broadcast text decoding
//!
//! Carrier payloads arrive in a zoo of encodings: packed GSM 7-bit septets,
//! IA5 7-bit ASCII, UTF-16BE, Latin-1, Shift-JIS, and raw octets whose
//! charset is a deployment choice rather than a wire-signaled fact. Decoding
//! here is deliberately forgiving: counts that overrun the payload are
//! clamped to what fits (with a log entry) and malformed sequences decode to
//! replacement characters. A slightly damaged alert is still an alert.

use log::warn;

use crate::bits::BitReader;

/// Charset used for `ENCODING_OCTET` payloads
///
/// The octet encoding does not signal its charset on the wire; deployments
/// configure it. Injected through the coordinator builder.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OctetEncoding {
    /// Decode octet payloads as UTF-8 (lossy)
    #[default]
    Utf8,
    /// Decode octet payloads as ISO 8859-1
    Latin1,
}

/// Decode an octet payload per the configured charset
pub fn decode_octet(payload: &[u8], encoding: OctetEncoding) -> String {
    match encoding {
        OctetEncoding::Utf8 => String::from_utf8_lossy(payload).into_owned(),
        OctetEncoding::Latin1 => encoding_rs::mem::decode_latin1(payload).into_owned(),
    }
}

/// Decode `num_fields` IA5 / 7-bit ASCII characters
///
/// Characters are seven bits each, MSB-first from the start of `payload`.
/// Unprintable codes other than CR/LF become spaces.
pub fn decode_ia5(payload: &[u8], num_fields: usize) -> String {
    let mut rd = BitReader::new(payload);
    let fit = rd.available() / 7;
    let count = if num_fields > fit {
        warn!("ia5: {} fields declared, {} fit; clamping", num_fields, fit);
        fit
    } else {
        num_fields
    };

    let mut out = String::with_capacity(count);
    for _ in 0..count {
        // count is bounded by available(), so this read cannot fail
        let code = rd.read(7).unwrap_or(0x20);
        match code {
            0x20..=0x7E => out.push(code as u8 as char),
            0x0A => out.push('\n'),
            0x0D => out.push('\r'),
            _ => out.push(' '),
        }
    }
    out
}

/// Decode `septet_count` packed GSM 7-bit septets starting at `byte_offset`
///
/// Septets are packed LSB-first per TS 23.038. The count is clamped to the
/// number of whole septets present in the buffer.
pub fn decode_gsm7_packed(data: &[u8], byte_offset: usize, septet_count: usize) -> String {
    let body = match data.get(byte_offset..) {
        Some(body) => body,
        None => return String::new(),
    };
    let fit = body.len() * 8 / 7;
    let count = if septet_count > fit {
        warn!(
            "gsm7: {} septets declared, {} fit; clamping",
            septet_count, fit
        );
        fit
    } else {
        septet_count
    };

    let mut out = String::with_capacity(count);
    let mut escaped = false;
    for i in 0..count {
        let bit_index = i * 7;
        let byte_index = bit_index / 8;
        let shift = bit_index % 8;
        let mut septet = (body[byte_index] >> shift) as u16;
        if shift > 1 {
            septet |= (*body.get(byte_index + 1).unwrap_or(&0) as u16) << (8 - shift);
        }
        let septet = (septet & 0x7F) as u8;

        if escaped {
            out.push(gsm7_extension_char(septet));
            escaped = false;
        } else if septet == GSM7_ESCAPE {
            escaped = true;
        } else {
            out.push(GSM7_BASIC[septet as usize]);
        }
    }
    out
}

/// Decode a UTF-16BE (UCS-2) payload
pub fn decode_ucs2(payload: &[u8]) -> String {
    // drop a trailing odd byte rather than failing the message
    let even = &payload[..payload.len() & !1];
    encoding_rs::UTF_16BE.decode(even).0.into_owned()
}

/// Decode an ISO 8859-1 payload
pub fn decode_latin(payload: &[u8]) -> String {
    encoding_rs::mem::decode_latin1(payload).into_owned()
}

/// Decode a Shift-JIS payload
pub fn decode_shift_jis(payload: &[u8]) -> String {
    encoding_rs::SHIFT_JIS.decode(payload).0.into_owned()
}

/// Strip the trailing carriage-return padding from a decoded page
pub fn strip_cr_padding(body: &str) -> &str {
    body.trim_end_matches('\r')
}

const GSM7_ESCAPE: u8 = 0x1B;

/// GSM 7-bit default alphabet, TS 23.038 table 6.2.1
const GSM7_BASIC: [char; 128] = [
    '@', '£', '$', '¥', 'è', 'é', 'ù', 'ì', 'ò', 'Ç', '\n', 'Ø', 'ø', '\r', 'Å', 'å', //
    'Δ', '_', 'Φ', 'Γ', 'Λ', 'Ω', 'Π', 'Ψ', 'Σ', 'Θ', 'Ξ', '\u{1B}', 'Æ', 'æ', 'ß', 'É', //
    ' ', '!', '"', '#', '¤', '%', '&', '\'', '(', ')', '*', '+', ',', '-', '.', '/', //
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', ':', ';', '<', '=', '>', '?', //
    '¡', 'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', //
    'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z', 'Ä', 'Ö', 'Ñ', 'Ü', '§', //
    '¿', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', //
    'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z', 'ä', 'ö', 'ñ', 'ü', 'à', //
];

/// Single-shift extension table (escape 0x1B prefix)
fn gsm7_extension_char(septet: u8) -> char {
    match septet {
        0x0A => '\u{0C}',
        0x14 => '^',
        0x28 => '{',
        0x29 => '}',
        0x2F => '\\',
        0x3C => '[',
        0x3D => '~',
        0x3E => ']',
        0x40 => '|',
        0x65 => '€',
        _ => ' ',
    }
}
