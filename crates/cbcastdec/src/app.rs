//! Line-oriented decoding loop

use anyhow::{anyhow, Result};
use chrono::Utc;
use log::{info, warn};

use cbcast::{
    BroadcastCoordinator, DecodeContext, Intake, MessageFormat, Resolution,
};

use crate::cli::Args;

/// One parsed input line
struct InputLine {
    format: MessageFormat,
    service_category: Option<i32>,
    pdu: Vec<u8>,
}

/// Decode every input line and print the dispatch decision for each
///
/// Returns the number of undecodable lines.
pub fn run<I>(args: &Args, gsm: &mut BroadcastCoordinator, cdma: &mut BroadcastCoordinator, lines: I) -> usize
where
    I: IntoIterator<Item = String>,
{
    let mut rejects = 0;
    for (lineno, line) in lines.into_iter().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let parsed = match parse_line(line) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!("line {}: {}", lineno + 1, err);
                emit(args, &format!("REJECT {}", err));
                rejects += 1;
                continue;
            }
        };

        let ctx = DecodeContext {
            slot_index: args.slot,
            plmn: args.plmn.clone(),
            lac: args.lac,
            cid: args.cid,
            service_category: parsed.service_category,
        };
        let coordinator = match parsed.format {
            MessageFormat::Gsm => &mut *gsm,
            MessageFormat::Cdma => &mut *cdma,
        };

        match coordinator.handle_pdu(&parsed.pdu, &ctx, Utc::now()) {
            Ok(Intake::Dispatch(msg)) => emit(args, &format!("DISPATCH {}", msg)),
            Ok(Intake::Duplicate) => emit(args, "DUPLICATE"),
            Ok(Intake::Assembling) => emit(args, "ASSEMBLING"),
            Ok(Intake::AwaitingLocation(request)) => {
                if request.is_some() {
                    // answer the platform request with the fixed location,
                    // if one was configured
                    info!("line {}: requesting location", lineno + 1);
                    for decision in coordinator.on_location(args.fix()) {
                        emit_resolution(args, decision);
                    }
                }
            }
            Ok(Intake::TriggerApplied { matched, request }) => {
                info!("trigger matched {} held broadcast(s)", matched);
                if request.is_some() {
                    for decision in coordinator.on_location(args.fix()) {
                        emit_resolution(args, decision);
                    }
                }
            }
            Err(err) => {
                emit(args, &format!("REJECT {}", err));
                rejects += 1;
            }
        }
    }

    // input exhausted: anything still held fails open
    for coordinator in [gsm, cdma] {
        for decision in coordinator.shutdown() {
            emit_resolution(args, decision);
        }
    }
    rejects
}

fn emit(args: &Args, text: &str) {
    if !args.quiet {
        println!("{}", text);
    }
}

fn emit_resolution(args: &Args, decision: Resolution) {
    match decision {
        Resolution::Dispatch(msg) => emit(args, &format!("DISPATCH {}", msg)),
        Resolution::Drop(msg) => emit(args, &format!("DROP {}", msg)),
    }
}

// "gsm:<hex>", "cdma:<category-hex>:<hex>", or bare hex
fn parse_line(line: &str) -> Result<InputLine> {
    if let Some(rest) = line.strip_prefix("cdma:") {
        let (category, hex) = rest
            .split_once(':')
            .ok_or_else(|| anyhow!("cdma line needs a service category"))?;
        let category = i32::from_str_radix(category.trim_start_matches("0x"), 16)
            .map_err(|_| anyhow!("bad service category \"{}\"", category))?;
        Ok(InputLine {
            format: MessageFormat::Cdma,
            service_category: Some(category),
            pdu: parse_hex(hex)?,
        })
    } else {
        let hex = line.strip_prefix("gsm:").unwrap_or(line);
        Ok(InputLine {
            format: MessageFormat::Gsm,
            service_category: None,
            pdu: parse_hex(hex)?,
        })
    }
}

fn parse_hex(hex: &str) -> Result<Vec<u8>> {
    let clean: String = hex.chars().filter(|c| !c.is_whitespace()).collect();
    if !clean.is_ascii() {
        return Err(anyhow!("hex string contains non-ASCII characters"));
    }
    if clean.len() % 2 != 0 {
        return Err(anyhow!("odd-length hex string"));
    }
    clean
        .as_bytes()
        .chunks(2)
        .map(|pair| {
            let s = std::str::from_utf8(pair).expect("checked ASCII above");
            u8::from_str_radix(s, 16).map_err(|_| anyhow!("bad hex byte \"{}\"", s))
        })
        .collect()
}
