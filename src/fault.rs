//! Fault Classification
//!
//! Maps a failed call to one of three outcomes: suppressed (policy-declared
//! acceptable absence), retryable (transient service condition) or permanent.
//! Structured fault codes are authoritative; message text is only consulted
//! when the code is missing or unrecognised.

use crate::error::RpcError;
use serde::{de, Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Well-known service fault codes.
pub mod codes {
    /// The addressed record does not exist.
    pub const OBJECT_DOES_NOT_EXIST: i32 = 0x8004_0217_u32 as i32;
    /// Service protection: too many requests in the sliding window.
    pub const REQUEST_LIMIT_EXCEEDED: i32 = 0x8007_2322_u32 as i32;
    /// Service protection: combined execution time exceeded.
    pub const EXECUTION_TIME_LIMIT_EXCEEDED: i32 = 0x8007_2321_u32 as i32;
    /// Service protection: too many concurrent requests.
    pub const CONCURRENCY_LIMIT_EXCEEDED: i32 = 0x8007_2326_u32 as i32;

    pub const SERVICE_PROTECTION: [i32; 3] = [
        REQUEST_LIMIT_EXCEEDED,
        EXECUTION_TIME_LIMIT_EXCEEDED,
        CONCURRENCY_LIMIT_EXCEEDED,
    ];
}

/// Read a fault code written as a signed or unsigned 32-bit value. Codes
/// above `i32::MAX` keep their bit pattern, so `0x80040217` and
/// `-2147220969` name the same fault.
fn code_from_i64(value: i64) -> Option<i32> {
    i32::try_from(value)
        .ok()
        .or_else(|| u32::try_from(value).ok().map(|v| v as i32))
}

/// Parse a decimal or `0x`-prefixed hexadecimal fault code.
pub fn parse_code(text: &str) -> Option<i32> {
    let text = text.trim();
    let hex = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"));
    match hex {
        Some(digits) => u32::from_str_radix(&digits.replace('_', ""), 16)
            .ok()
            .map(|v| v as i32),
        None => text.parse::<i64>().ok().and_then(code_from_i64),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CodeRepr {
    Number(i64),
    Text(String),
}

/// Deserialize a list of fault codes given as integers or code strings.
pub fn deserialize_codes<'de, D>(deserializer: D) -> Result<Vec<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    Vec::<CodeRepr>::deserialize(deserializer)?
        .into_iter()
        .map(|repr| match repr {
            CodeRepr::Number(value) => code_from_i64(value).ok_or_else(|| {
                de::Error::custom(format!("fault code {} is not a 32-bit value", value))
            }),
            CodeRepr::Text(text) => parse_code(&text)
                .ok_or_else(|| de::Error::custom(format!("invalid fault code '{}'", text))),
        })
        .collect()
}

/// Structured failure returned by the service for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Fault {
    #[serde(rename = "ErrorCode", default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inner_fault: Option<Box<Fault>>,
}

impl Fault {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            inner_fault: None,
        }
    }

    pub fn with_inner(mut self, inner: Fault) -> Self {
        self.inner_fault = Some(Box::new(inner));
        self
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(codes::OBJECT_DOES_NOT_EXIST, message)
    }

    /// This fault and its inner faults, outermost first.
    pub fn chain(&self) -> impl Iterator<Item = &Fault> {
        std::iter::successors(Some(self), |fault| fault.inner_fault.as_deref())
    }

    /// Whether any fault in the chain says the record is missing.
    pub fn is_not_found(&self) -> bool {
        self.chain().any(|fault| {
            fault.code == codes::OBJECT_DOES_NOT_EXIST
                || (!is_known_code(fault.code) && message_says_not_found(&fault.message))
        })
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:08X})", self.message, self.code as u32)
    }
}

fn is_known_code(code: i32) -> bool {
    code == codes::OBJECT_DOES_NOT_EXIST || codes::SERVICE_PROTECTION.contains(&code)
}

fn message_says_not_found(message: &str) -> bool {
    message.to_ascii_lowercase().contains("does not exist")
}

fn message_says_transient(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    ["throttl", "timeout", "timed out", "try again", "rate limit"]
        .iter()
        .any(|needle| message.contains(needle))
}

/// Outcome of classifying a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultClass {
    /// Acceptable under caller policy; diagnostic only.
    Suppressed,
    /// Transient; eligible for backoff retry.
    Retryable,
    /// Never retried.
    Permanent,
}

/// Caller-declared additions to the built-in classification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultPolicy {
    /// Fault codes treated as acceptable absence for every operation.
    #[serde(default, deserialize_with = "deserialize_codes")]
    pub suppressed_codes: Vec<i32>,
    /// Extra fault codes treated as transient.
    #[serde(default, deserialize_with = "deserialize_codes")]
    pub retryable_codes: Vec<i32>,
}

/// Pure three-way classifier built from a [`FaultPolicy`].
#[derive(Debug, Clone, Default)]
pub struct FaultClassifier {
    suppressed: HashSet<i32>,
    retryable: HashSet<i32>,
}

impl FaultClassifier {
    pub fn new(policy: &FaultPolicy) -> Self {
        let mut retryable: HashSet<i32> = codes::SERVICE_PROTECTION.into_iter().collect();
        retryable.extend(policy.retryable_codes.iter().copied());
        Self {
            suppressed: policy.suppressed_codes.iter().copied().collect(),
            retryable,
        }
    }

    /// Classify any failed call. Transport-level failures are always retryable.
    pub fn classify(&self, error: &RpcError) -> FaultClass {
        match error {
            RpcError::Transport(_) | RpcError::Timeout(_) => FaultClass::Retryable,
            RpcError::InvalidResponse(_) => FaultClass::Permanent,
            RpcError::Fault(fault) => self.classify_fault(fault),
        }
    }

    /// Classify a structured fault, walking inner faults outermost first.
    pub fn classify_fault(&self, fault: &Fault) -> FaultClass {
        for link in fault.chain() {
            if self.suppressed.contains(&link.code) {
                return FaultClass::Suppressed;
            }
            if self.retryable.contains(&link.code) {
                return FaultClass::Retryable;
            }
        }
        // Codes we do not recognise fall back to message text.
        let unrecognised = fault
            .chain()
            .all(|link| link.code == 0 || !is_known_code(link.code));
        if unrecognised && fault.chain().any(|link| message_says_transient(&link.message)) {
            return FaultClass::Retryable;
        }
        FaultClass::Permanent
    }
}
