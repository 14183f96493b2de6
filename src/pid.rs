//! Prefixed identifiers (PIDs): `<prefix>-<payload>` strings that are the
//! only form in which entities cross the boundary into this service.

use std::fmt;
use thiserror::Error;

pub const PID_SEPARATOR: char = '-';

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PidError {
    #[error("prefixed id {0:?} has no separator")]
    MissingSeparator(String),
    #[error("prefixed id {0:?} has an empty prefix")]
    EmptyPrefix(String),
    #[error("prefixed id {0:?} has an empty payload")]
    EmptyPayload(String),
    #[error("prefixed id {0:?} has prefix {found:?}, expected {expected:?}")]
    PrefixMismatch {
        found: String,
        expected: String,
        #[allow(dead_code)]
        value: String,
    },
}

/// A parsed prefixed identifier, e.g. `tnntten-AAAA`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pid(String);

impl Pid {
    pub fn parse(raw: &str) -> Result<Self, PidError> {
        let idx = raw
            .find(PID_SEPARATOR)
            .ok_or_else(|| PidError::MissingSeparator(raw.to_string()))?;
        let (prefix, rest) = raw.split_at(idx);
        let payload = &rest[1..];
        if prefix.is_empty() {
            return Err(PidError::EmptyPrefix(raw.to_string()));
        }
        if payload.is_empty() {
            return Err(PidError::EmptyPayload(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn new(prefix: &str, payload: &str) -> Self {
        Self(format!("{prefix}{PID_SEPARATOR}{payload}"))
    }

    pub fn prefix(&self) -> &str {
        let idx = self.0.find(PID_SEPARATOR).expect("validated at parse");
        &self.0[..idx]
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn require_prefix(&self, expected: &str) -> Result<(), PidError> {
        if self.prefix() != expected {
            return Err(PidError::PrefixMismatch {
                found: self.prefix().to_string(),
                expected: expected.to_string(),
                value: self.0.clone(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Pid {
    type Error = PidError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Pid> for String {
    fn from(value: Pid) -> Self {
        value.0
    }
}

/// Well-known prefixes synthesized by the policy compiler.
pub const PREFIX_ROLE_V1: &str = "permrol";
pub const PREFIX_ROLE_V2: &str = "permrv2";
pub const PREFIX_ROLE_BINDING: &str = "permrbn";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_pid() {
        let pid = Pid::parse("tnntten-AAAA").unwrap();
        assert_eq!(pid.prefix(), "tnntten");
        assert_eq!(pid.as_str(), "tnntten-AAAA");
    }

    #[test]
    fn rejects_missing_separator() {
        assert_eq!(
            Pid::parse("tnnttenAAAA"),
            Err(PidError::MissingSeparator("tnnttenAAAA".to_string()))
        );
    }

    #[test]
    fn rejects_empty_payload() {
        assert_eq!(
            Pid::parse("tnntten-"),
            Err(PidError::EmptyPayload("tnntten-".to_string()))
        );
    }

    #[test]
    fn prefix_mismatch_is_detected() {
        let pid = Pid::parse("tnntten-AAAA").unwrap();
        assert!(pid.require_prefix("loadbal").is_err());
        assert!(pid.require_prefix("tnntten").is_ok());
    }
}
