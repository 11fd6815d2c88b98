// src/decoder.rs
//! Transaction input (calldata) decoder.
//!
//! Turns the hex `input` of a transaction into something a person can read:
//! a known function with its parameters, an unrecognised selector, or a raw
//! byte summary. Decoding never fails outright; problems come back as
//! [`DecodeResult::DecodeError`].

use alloy::primitives::U256;
use serde::Serialize;
use thiserror::Error;

use crate::selectors;
use crate::units::format_ether;

/// One ABI slot (32 bytes) in hex characters.
const SLOT_HEX_LEN: usize = 64;
/// `0x` + 8 hex digits.
const MIN_CALL_LEN: usize = 10;
const SELECTOR_BYTES: usize = 4;

const CALL_CHUNKS: usize = 3;
const RAW_CHUNKS: usize = 5;
const RAW_HEX_PREVIEW: usize = 200;
const ASCII_PREVIEW: usize = 100;

#[derive(Debug, Error)]
pub enum DecodeFailure {
    #[error("input is not valid hex: unexpected character at byte {position}")]
    InvalidHexCharacter { position: usize },

    #[error("input is not valid hex: odd number of digits")]
    OddLength,

    #[error("parameter slot {index} is out of range ({len} hex chars of parameter data)")]
    SlotOutOfRange { index: usize, len: usize },

    #[error("parameter slot {index} is not a valid uint256")]
    BadInteger { index: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    Address,
    Uint256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedParam {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ParamKind,
    /// Display string; integers carry both raw and ether-scaled forms.
    pub value: String,
}

/// Diagnostics attached whenever a selector could be read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawAnalysis {
    pub selector: String,
    pub parameter_data: String,
    pub byte_length: usize,
    pub chunks: Vec<String>,
}

/// Input that is not a function call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawDataSummary {
    pub byte_length: usize,
    pub ascii_preview: String,
    pub chunks: Vec<String>,
    pub possible_types: Vec<String>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecodeResult {
    /// No input: a plain value transfer.
    EmptyTransfer,
    KnownCall {
        function_name: String,
        selector: String,
        parameters: Vec<DecodedParam>,
        text: Option<String>,
        analysis: RawAnalysis,
    },
    UnknownCall {
        label: String,
        text: Option<String>,
        analysis: RawAnalysis,
        raw_hex_preview: String,
    },
    RawData(RawDataSummary),
    DecodeError { message: String },
}

impl DecodeResult {
    /// One-line headline for list views.
    pub fn summary(&self) -> String {
        match self {
            DecodeResult::EmptyTransfer => "empty data (plain value transfer)".to_string(),
            DecodeResult::KnownCall { function_name, .. } => {
                format!("contract call: {}", function_name)
            }
            DecodeResult::UnknownCall { .. } => "unrecognised contract call".to_string(),
            DecodeResult::RawData(raw) => format!("raw data ({} bytes)", raw.byte_length),
            DecodeResult::DecodeError { message } => format!("decode failed: {}", message),
        }
    }
}

fn strip_hex_prefix(input: &str) -> &str {
    input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .unwrap_or(input)
}

/// Validate and decode a hex string with an optional `0x` prefix.
///
/// This is the one hex rule for every user-supplied payload: hex digits only,
/// even length.
/// Error positions are byte offsets into `input`, prefix included.
pub fn parse_hex(input: &str) -> Result<Vec<u8>, DecodeFailure> {
    let body = strip_hex_prefix(input);
    let prefix = input.len() - body.len();
    hex::decode(body).map_err(|e| match e {
        hex::FromHexError::InvalidHexCharacter { index, .. } => {
            DecodeFailure::InvalidHexCharacter {
                position: prefix + index,
            }
        }
        _ => DecodeFailure::OddLength,
    })
}

/// Decode transaction input data.
pub fn decode(calldata: &str) -> DecodeResult {
    if strip_hex_prefix(calldata).is_empty() {
        return DecodeResult::EmptyTransfer;
    }

    match try_decode(calldata) {
        Ok(result) => result,
        Err(e) => DecodeResult::DecodeError {
            message: e.to_string(),
        },
    }
}

fn try_decode(calldata: &str) -> Result<DecodeResult, DecodeFailure> {
    let body = strip_hex_prefix(calldata);
    let bytes = parse_hex(calldata)?;
    let text = utf8_text(&bytes);

    if bytes.len() < SELECTOR_BYTES || calldata.len() < MIN_CALL_LEN {
        return Ok(DecodeResult::RawData(raw_summary(body, &bytes, text)));
    }

    // body is validated ASCII hex, so byte offsets are char offsets
    let selector = format!("0x{}", &body[..SELECTOR_BYTES * 2]);
    let parameter_data = &body[SELECTOR_BYTES * 2..];

    let analysis = RawAnalysis {
        selector: selector.clone(),
        parameter_data: parameter_data.to_string(),
        byte_length: bytes.len(),
        chunks: hex_chunks(body, CALL_CHUNKS),
    };

    match selectors::lookup(&selector) {
        Some(signature) => Ok(DecodeResult::KnownCall {
            function_name: signature.to_string(),
            parameters: decode_parameters(&selector, parameter_data)?,
            selector,
            text,
            analysis,
        }),
        None => Ok(DecodeResult::UnknownCall {
            label: format!("unknown function ({})", selector),
            text,
            analysis,
            raw_hex_preview: body[..body.len().min(RAW_HEX_PREVIEW)].to_string(),
        }),
    }
}

/// Static parameter layouts for the calls we expand.
fn parameter_layout(selector: &str) -> &'static [(&'static str, ParamKind)] {
    match selector.to_ascii_lowercase().as_str() {
        selectors::TRANSFER => &[("to", ParamKind::Address), ("amount", ParamKind::Uint256)],
        selectors::APPROVE => &[
            ("spender", ParamKind::Address),
            ("amount", ParamKind::Uint256),
        ],
        selectors::TRANSFER_FROM => &[
            ("from", ParamKind::Address),
            ("to", ParamKind::Address),
            ("amount", ParamKind::Uint256),
        ],
        _ => &[],
    }
}

fn decode_parameters(selector: &str, data: &str) -> Result<Vec<DecodedParam>, DecodeFailure> {
    let layout = parameter_layout(selector);

    // too short for the full layout: report the name only
    if data.len() < layout.len() * SLOT_HEX_LEN {
        return Ok(Vec::new());
    }

    layout
        .iter()
        .enumerate()
        .map(|(index, (name, kind))| -> Result<DecodedParam, DecodeFailure> {
            let slot = slot(data, index)?;
            let value = match kind {
                ParamKind::Address => format!("0x{}", &slot[SLOT_HEX_LEN - 40..]),
                ParamKind::Uint256 => {
                    let amount = U256::from_str_radix(slot, 16)
                        .map_err(|_| DecodeFailure::BadInteger { index })?;
                    format!("{} ({} ETH)", amount, format_ether(amount))
                }
            };
            Ok(DecodedParam {
                name: name.to_string(),
                kind: *kind,
                value,
            })
        })
        .collect()
}

fn slot(data: &str, index: usize) -> Result<&str, DecodeFailure> {
    data.get(index * SLOT_HEX_LEN..(index + 1) * SLOT_HEX_LEN)
        .ok_or(DecodeFailure::SlotOutOfRange {
            index,
            len: data.len(),
        })
}

fn hex_chunks(hex: &str, limit: usize) -> Vec<String> {
    hex.as_bytes()
        .chunks(SLOT_HEX_LEN)
        .take(limit)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect()
}

/// UTF-8 with invalid sequences replaced and control characters removed.
fn utf8_text(bytes: &[u8]) -> Option<String> {
    let text: String = String::from_utf8_lossy(bytes)
        .chars()
        .filter(|c| !c.is_control())
        .collect();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Printable ASCII kept, everything else shown as `.`.
fn ascii_text(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| if (32..=126).contains(&b) { b as char } else { '.' })
        .collect()
}

fn possible_types(byte_length: usize) -> Vec<String> {
    let mut guesses = Vec::new();
    if byte_length == 32 {
        guesses.push("possibly uint256/bytes32".to_string());
    }
    if byte_length == 20 {
        guesses.push("possibly address".to_string());
    }
    if byte_length % 32 == 0 {
        guesses.push("possibly ABI-encoded data".to_string());
    }
    guesses
}

fn raw_summary(body: &str, bytes: &[u8], text: Option<String>) -> RawDataSummary {
    RawDataSummary {
        byte_length: bytes.len(),
        ascii_preview: ascii_text(bytes).chars().take(ASCII_PREVIEW).collect(),
        chunks: hex_chunks(body, RAW_CHUNKS),
        possible_types: possible_types(bytes.len()),
        text,
    }
}
