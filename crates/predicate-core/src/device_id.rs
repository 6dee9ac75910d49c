//! Validation and normalisation of FDA submission numbers.
//!
//! Accepts the three identifier families a predicate citation can carry and
//! rejects everything else rather than coercing it.
//!
//! # Formats
//!
//! - 510(k): `K` + exactly 6 digits (`K241335`)
//! - PMA: `P` + exactly 6 digits, optionally followed by a supplement
//!   suffix `S` + 3 digits, with or without a `/` separator
//!   (`P990045`, `P990045S012`, `P990045/S012`)
//! - De Novo: `DEN` + one or more digits (`DEN200058`)
//!
//! Input is trimmed and upper-cased before matching, so `k241335` is accepted
//! and normalised to `K241335`. Supplements normalise to the slash-less form.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::ReviewError;

/// Regulatory pathway implied by the identifier prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SubmissionKind {
    /// `K` numbers.
    PremarketNotification,
    /// `P` numbers, including supplements.
    PremarketApproval,
    /// `DEN` numbers.
    DeNovo,
}

impl SubmissionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PremarketNotification => "510k",
            Self::PremarketApproval => "pma",
            Self::DeNovo => "de_novo",
        }
    }
}

/// A validated device identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId {
    normalized: String,
    kind: SubmissionKind,
    supplement: bool,
}

impl DeviceId {
    /// Parse and normalise an identifier.
    ///
    /// Returns [`ReviewError::MalformedDeviceId`] for anything outside the
    /// three accepted formats.
    pub fn parse(raw: &str) -> Result<Self, ReviewError> {
        let upper = raw.trim().to_ascii_uppercase();
        let malformed = || ReviewError::MalformedDeviceId(raw.to_string());

        if let Some(digits) = upper.strip_prefix("DEN") {
            if digits.is_empty() || !all_digits(digits) {
                return Err(malformed());
            }
            return Ok(Self {
                normalized: upper,
                kind: SubmissionKind::DeNovo,
                supplement: false,
            });
        }

        if let Some(rest) = upper.strip_prefix('K') {
            if rest.len() != 6 || !all_digits(rest) {
                return Err(malformed());
            }
            return Ok(Self {
                normalized: upper,
                kind: SubmissionKind::PremarketNotification,
                supplement: false,
            });
        }

        if let Some(rest) = upper.strip_prefix('P') {
            if rest.len() < 6 || !rest.is_char_boundary(6) || !all_digits(&rest[..6]) {
                return Err(malformed());
            }
            let base = &rest[..6];
            let suffix = &rest[6..];
            if suffix.is_empty() {
                return Ok(Self {
                    normalized: upper,
                    kind: SubmissionKind::PremarketApproval,
                    supplement: false,
                });
            }

            // Supplement: optional '/' then S + 3 digits.
            let suffix = suffix.strip_prefix('/').unwrap_or(suffix);
            let Some(number) = suffix.strip_prefix('S') else {
                return Err(malformed());
            };
            if number.len() != 3 || !all_digits(number) {
                return Err(malformed());
            }
            return Ok(Self {
                normalized: format!("P{base}S{number}"),
                kind: SubmissionKind::PremarketApproval,
                supplement: true,
            });
        }

        Err(malformed())
    }

    pub fn as_str(&self) -> &str {
        &self.normalized
    }

    pub fn kind(&self) -> SubmissionKind {
        self.kind
    }

    pub fn is_de_novo(&self) -> bool {
        self.kind == SubmissionKind::DeNovo
    }

    pub fn is_pma(&self) -> bool {
        self.kind == SubmissionKind::PremarketApproval
    }

    /// True for PMA supplements (`P123456S001`).
    pub fn is_supplement(&self) -> bool {
        self.supplement
    }
}

fn all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.normalized)
    }
}

impl std::str::FromStr for DeviceId {
    type Err = ReviewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for DeviceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.normalized)
    }
}

impl<'de> Deserialize<'de> for DeviceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
