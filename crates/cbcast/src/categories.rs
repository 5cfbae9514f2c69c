//! Service category and message identifier databases
//!
//! # GSM message identifier ranges (3GPP TS 23.041)
//!
//! | Range             | Meaning                               |
//! |-------------------|---------------------------------------|
//! | `0x1100..=0x1107` | ETWS warnings                         |
//! | `0x1100..=0x18FF` | Public warning system (emergency)     |
//! | `0x1112..=0x112B` | CMAS alerts (incl. language variants) |
//! | `0x1130`          | Geo-fencing trigger                   |
//!
//! # CDMA service categories (3GPP2 C.R1001)
//!
//! | Value    | Meaning                    |
//! |----------|----------------------------|
//! | `0x1000` | CMAS presidential alert    |
//! | `0x1001` | CMAS extreme threat        |
//! | `0x1002` | CMAS severe threat         |
//! | `0x1003` | Child abduction emergency  |
//! | `0x1004` | CMAS test message          |

use phf::phf_map;

use crate::message::{
    CmasCategory, CmasCertainty, CmasClass, CmasResponseType, CmasSeverity, CmasUrgency,
};

// --- GSM message identifiers ---

pub const MESSAGE_ID_ETWS_EARTHQUAKE: u16 = 0x1100;
pub const MESSAGE_ID_ETWS_TSUNAMI: u16 = 0x1101;
pub const MESSAGE_ID_ETWS_EARTHQUAKE_AND_TSUNAMI: u16 = 0x1102;
pub const MESSAGE_ID_ETWS_TEST: u16 = 0x1103;
pub const MESSAGE_ID_ETWS_OTHER: u16 = 0x1104;
pub const MESSAGE_ID_ETWS_LAST: u16 = 0x1107;

pub const MESSAGE_ID_PWS_FIRST: u16 = 0x1100;
pub const MESSAGE_ID_PWS_LAST: u16 = 0x18FF;

pub const MESSAGE_ID_CMAS_PRESIDENTIAL: u16 = 0x1112;
pub const MESSAGE_ID_CMAS_EXTREME_IMMEDIATE_OBSERVED: u16 = 0x1113;
pub const MESSAGE_ID_CMAS_EXTREME_IMMEDIATE_LIKELY: u16 = 0x1114;
pub const MESSAGE_ID_CMAS_EXTREME_EXPECTED_OBSERVED: u16 = 0x1115;
pub const MESSAGE_ID_CMAS_EXTREME_EXPECTED_LIKELY: u16 = 0x1116;
pub const MESSAGE_ID_CMAS_SEVERE_FIRST: u16 = 0x1117;
pub const MESSAGE_ID_CMAS_SEVERE_LAST: u16 = 0x111A;
pub const MESSAGE_ID_CMAS_AMBER: u16 = 0x111B;
pub const MESSAGE_ID_CMAS_MONTHLY_TEST: u16 = 0x111C;
pub const MESSAGE_ID_CMAS_EXERCISE: u16 = 0x111D;
pub const MESSAGE_ID_CMAS_OPERATOR_DEFINED: u16 = 0x111E;
/// First of the additional-language repeats of `0x1112..=0x111E`
pub const MESSAGE_ID_CMAS_LANGUAGE_FIRST: u16 = 0x111F;
pub const MESSAGE_ID_CMAS_LAST: u16 = 0x112B;

pub const MESSAGE_ID_GEO_FENCING_TRIGGER: u16 = 0x1130;

// --- CDMA service categories ---

pub const CATEGORY_CMAS_PRESIDENTIAL: i32 = 0x1000;
pub const CATEGORY_CMAS_EXTREME_THREAT: i32 = 0x1001;
pub const CATEGORY_CMAS_SEVERE_THREAT: i32 = 0x1002;
pub const CATEGORY_CMAS_CHILD_ABDUCTION: i32 = 0x1003;
pub const CATEGORY_CMAS_TEST: i32 = 0x1004;
pub const CATEGORY_CMAS_LAST: i32 = 0x10FF;

/// Is this GSM message identifier an ETWS warning?
pub fn is_etws_id(id: u16) -> bool {
    (MESSAGE_ID_ETWS_EARTHQUAKE..=MESSAGE_ID_ETWS_LAST).contains(&id)
}

/// Is this GSM message identifier a CMAS alert?
pub fn is_cmas_id(id: u16) -> bool {
    (MESSAGE_ID_CMAS_PRESIDENTIAL..=MESSAGE_ID_CMAS_LAST).contains(&id)
}

/// Is this GSM message identifier in the public warning system range?
pub fn is_gsm_emergency_id(id: u16) -> bool {
    (MESSAGE_ID_PWS_FIRST..=MESSAGE_ID_PWS_LAST).contains(&id)
}

/// Is this CDMA service category a CMAS emergency category?
pub fn is_cdma_cmas_category(category: i32) -> bool {
    (CATEGORY_CMAS_PRESIDENTIAL..=CATEGORY_CMAS_LAST).contains(&category)
}

/// Fold a language-variant CMAS identifier onto its base identifier
fn cmas_base_id(id: u16) -> u16 {
    if (MESSAGE_ID_CMAS_LANGUAGE_FIRST..=MESSAGE_ID_CMAS_LAST).contains(&id) {
        id - (MESSAGE_ID_CMAS_LANGUAGE_FIRST - MESSAGE_ID_CMAS_PRESIDENTIAL)
    } else {
        id
    }
}

/// CMAS message class implied by a GSM message identifier
pub fn cmas_class_for_gsm_id(id: u16) -> CmasClass {
    match cmas_base_id(id) {
        MESSAGE_ID_CMAS_PRESIDENTIAL => CmasClass::PresidentialAlert,
        MESSAGE_ID_CMAS_EXTREME_IMMEDIATE_OBSERVED
        | MESSAGE_ID_CMAS_EXTREME_IMMEDIATE_LIKELY
        | MESSAGE_ID_CMAS_EXTREME_EXPECTED_OBSERVED
        | MESSAGE_ID_CMAS_EXTREME_EXPECTED_LIKELY => CmasClass::ExtremeThreat,
        MESSAGE_ID_CMAS_SEVERE_FIRST..=MESSAGE_ID_CMAS_SEVERE_LAST => CmasClass::SevereThreat,
        MESSAGE_ID_CMAS_AMBER => CmasClass::ChildAbductionEmergency,
        MESSAGE_ID_CMAS_MONTHLY_TEST => CmasClass::RequiredMonthlyTest,
        MESSAGE_ID_CMAS_EXERCISE => CmasClass::Exercise,
        MESSAGE_ID_CMAS_OPERATOR_DEFINED => CmasClass::OperatorDefined,
        _ => CmasClass::Unknown,
    }
}

/// CMAS severity implied by a GSM message identifier
///
/// Only the extreme/severe identifier block encodes severity; everything
/// else is unknown.
pub fn cmas_severity_for_gsm_id(id: u16) -> CmasSeverity {
    match cmas_base_id(id) {
        MESSAGE_ID_CMAS_EXTREME_IMMEDIATE_OBSERVED..=MESSAGE_ID_CMAS_EXTREME_EXPECTED_LIKELY => {
            CmasSeverity::Extreme
        }
        MESSAGE_ID_CMAS_SEVERE_FIRST..=MESSAGE_ID_CMAS_SEVERE_LAST => CmasSeverity::Severe,
        _ => CmasSeverity::Unknown,
    }
}

/// CMAS urgency implied by a GSM message identifier
pub fn cmas_urgency_for_gsm_id(id: u16) -> CmasUrgency {
    match cmas_base_id(id) {
        MESSAGE_ID_CMAS_EXTREME_IMMEDIATE_OBSERVED
        | MESSAGE_ID_CMAS_EXTREME_IMMEDIATE_LIKELY
        | 0x1117
        | 0x1118 => CmasUrgency::Immediate,
        MESSAGE_ID_CMAS_EXTREME_EXPECTED_OBSERVED
        | MESSAGE_ID_CMAS_EXTREME_EXPECTED_LIKELY
        | 0x1119
        | 0x111A => CmasUrgency::Expected,
        _ => CmasUrgency::Unknown,
    }
}

/// CMAS certainty implied by a GSM message identifier
pub fn cmas_certainty_for_gsm_id(id: u16) -> CmasCertainty {
    match cmas_base_id(id) {
        MESSAGE_ID_CMAS_EXTREME_IMMEDIATE_OBSERVED
        | MESSAGE_ID_CMAS_EXTREME_EXPECTED_OBSERVED
        | 0x1117
        | 0x1119 => CmasCertainty::Observed,
        MESSAGE_ID_CMAS_EXTREME_IMMEDIATE_LIKELY
        | MESSAGE_ID_CMAS_EXTREME_EXPECTED_LIKELY
        | 0x1118
        | 0x111A => CmasCertainty::Likely,
        _ => CmasCertainty::Unknown,
    }
}

/// CMAS message class implied by a CDMA service category
pub fn cmas_class_for_cdma_category(category: i32) -> CmasClass {
    match category {
        CATEGORY_CMAS_PRESIDENTIAL => CmasClass::PresidentialAlert,
        CATEGORY_CMAS_EXTREME_THREAT => CmasClass::ExtremeThreat,
        CATEGORY_CMAS_SEVERE_THREAT => CmasClass::SevereThreat,
        CATEGORY_CMAS_CHILD_ABDUCTION => CmasClass::ChildAbductionEmergency,
        CATEGORY_CMAS_TEST => CmasClass::RequiredMonthlyTest,
        _ => CmasClass::Unknown,
    }
}

/// Unknown-everything CMAS info for a class derived from an identifier
pub fn cmas_info_for_class(class: CmasClass) -> crate::message::CmasInfo {
    crate::message::CmasInfo {
        message_class: class,
        category: CmasCategory::Unknown,
        response_type: CmasResponseType::Unknown,
        severity: CmasSeverity::Unknown,
        urgency: CmasUrgency::Unknown,
        certainty: CmasCertainty::Unknown,
    }
}

/// Default GSM↔CDMA service category equivalence, GSM identifier → CDMA
/// category
///
/// The same logical alert is broadcast with a GSM CMAS identifier on one
/// path and a CDMA service category on the other; duplicate detection
/// consults this table in both directions. Deployments may override it.
pub static DEFAULT_CATEGORY_CROSS_MAP: phf::Map<u16, i32> = phf_map! {
    // presidential
    0x1112u16 => 0x1000,
    0x111Fu16 => 0x1000,
    // extreme, immediate
    0x1113u16 => 0x1001,
    0x1114u16 => 0x1001,
    0x1120u16 => 0x1001,
    0x1121u16 => 0x1001,
    // extreme-expected and severe fold onto the severe category
    0x1115u16 => 0x1002,
    0x1116u16 => 0x1002,
    0x1117u16 => 0x1002,
    0x1118u16 => 0x1002,
    0x1119u16 => 0x1002,
    0x111Au16 => 0x1002,
    0x1122u16 => 0x1002,
    0x1123u16 => 0x1002,
    0x1124u16 => 0x1002,
    0x1125u16 => 0x1002,
    0x1126u16 => 0x1002,
    0x1127u16 => 0x1002,
    // child abduction
    0x111Bu16 => 0x1003,
    0x1128u16 => 0x1003,
    // monthly test
    0x111Cu16 => 0x1004,
    0x1129u16 => 0x1004,
};

/// CBS data coding scheme languages, coding group 0000 (TS 23.038)
pub static CBS_LANGUAGE_GROUP_0: phf::Map<u8, &'static str> = phf_map! {
    0u8 => "de",
    1u8 => "en",
    2u8 => "it",
    3u8 => "fr",
    4u8 => "es",
    5u8 => "nl",
    6u8 => "sv",
    7u8 => "da",
    8u8 => "pt",
    9u8 => "fi",
    10u8 => "no",
    11u8 => "el",
    12u8 => "tr",
    13u8 => "hu",
    14u8 => "pl",
};

/// CBS data coding scheme languages, coding group 0010 (TS 23.038)
pub static CBS_LANGUAGE_GROUP_2: phf::Map<u8, &'static str> = phf_map! {
    0u8 => "cs",
    1u8 => "he",
    2u8 => "ar",
    3u8 => "ru",
    4u8 => "is",
};

/// CDMA language indicator values (IS-637)
pub static CDMA_LANGUAGES: phf::Map<u8, &'static str> = phf_map! {
    1u8 => "en",
    2u8 => "fr",
    3u8 => "es",
    4u8 => "ja",
    5u8 => "ko",
    6u8 => "zh",
    7u8 => "he",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_ranges() {
        assert!(is_etws_id(0x1100));
        assert!(is_etws_id(0x1103));
        assert!(!is_etws_id(0x1112));

        assert!(is_cmas_id(0x1112));
        assert!(is_cmas_id(0x112B));
        assert!(!is_cmas_id(0x1130));

        assert!(is_gsm_emergency_id(0x1130));
        assert!(!is_gsm_emergency_id(0x1900));

        assert!(is_cdma_cmas_category(0x1000));
        assert!(is_cdma_cmas_category(0x10FF));
        assert!(!is_cdma_cmas_category(0x0FFF));
    }

    #[test]
    fn test_cmas_derivation_from_gsm_id() {
        // 0x1113: extreme threat, immediate, observed
        assert_eq!(CmasClass::ExtremeThreat, cmas_class_for_gsm_id(0x1113));
        assert_eq!(CmasSeverity::Extreme, cmas_severity_for_gsm_id(0x1113));
        assert_eq!(CmasUrgency::Immediate, cmas_urgency_for_gsm_id(0x1113));
        assert_eq!(CmasCertainty::Observed, cmas_certainty_for_gsm_id(0x1113));

        // presidential alerts carry no severity/urgency/certainty
        assert_eq!(CmasClass::PresidentialAlert, cmas_class_for_gsm_id(0x1112));
        assert_eq!(CmasSeverity::Unknown, cmas_severity_for_gsm_id(0x1112));
    }

    #[test]
    fn test_language_variants_fold() {
        // 0x1120 is the additional-language repeat of 0x1113
        assert_eq!(
            cmas_class_for_gsm_id(0x1113),
            cmas_class_for_gsm_id(0x1120)
        );
        assert_eq!(
            cmas_certainty_for_gsm_id(0x1113),
            cmas_certainty_for_gsm_id(0x1120)
        );
    }

    #[test]
    fn test_cross_map() {
        assert_eq!(Some(&0x1000), DEFAULT_CATEGORY_CROSS_MAP.get(&0x1112));
        assert_eq!(Some(&0x1001), DEFAULT_CATEGORY_CROSS_MAP.get(&0x1113));
        assert_eq!(Some(&0x1003), DEFAULT_CATEGORY_CROSS_MAP.get(&0x111B));
        assert_eq!(None, DEFAULT_CATEGORY_CROSS_MAP.get(&0x1130));
    }
}
