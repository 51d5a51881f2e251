//! Institutional roll numbers.
//!
//! A roll number is ten characters: a two-digit admission year, the college
//! segment `891A` (regular entry) or `895A`/`895B` (lateral entry), a
//! two-character branch code and a two-character serial. Matching is
//! case-insensitive and the parsed form is always upper case.

use serde::Serialize;
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Branch names accepted on forms and the code they carry in a roll number.
pub const BRANCH_CODES: &[(&str, &str)] = &[
    ("CIVIL", "01"),
    ("EEE", "02"),
    ("MECH", "03"),
    ("ECE", "04"),
    ("CSE", "05"),
    ("IT", "12"),
    ("CSC", "62"),
    ("CSM", "66"),
    ("CSD", "67"),
];

const ROLL_NO_LEN: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RollNoError {
    #[error("invalid roll number format: {0}")]
    InvalidFormat(String),
    #[error("roll number branch code {code} does not match branch {branch}")]
    BranchMismatch { branch: String, code: String },
    #[error("unknown branch: {0}")]
    UnknownBranch(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Entry {
    Regular,
    Lateral,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RollNumber(String);

impl RollNumber {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Two-character code at offset 6..8.
    pub fn branch_code(&self) -> &str {
        &self.0[6..8]
    }

    pub fn admission_year(&self) -> u8 {
        // both bytes are ascii digits, checked in `from_str`
        let b = self.0.as_bytes();
        (b[0] - b'0') * 10 + (b[1] - b'0')
    }

    pub fn entry(&self) -> Entry {
        if &self.0[4..5] == "5" {
            Entry::Lateral
        } else {
            Entry::Regular
        }
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl FromStr for RollNumber {
    type Err = RollNoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        let b = upper.as_bytes();

        let well_formed = b.len() == ROLL_NO_LEN
            && b[..2].iter().all(u8::is_ascii_digit)
            && (&b[2..6] == b"891A" || &b[2..6] == b"895A" || &b[2..6] == b"895B")
            && b[6..].iter().all(u8::is_ascii_alphanumeric);

        if !well_formed {
            return Err(RollNoError::InvalidFormat(s.trim().to_string()));
        }
        Ok(RollNumber(upper))
    }
}

impl fmt::Display for RollNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Looks up the roll-number code for a branch name, ignoring case.
pub fn branch_code(branch: &str) -> Option<&'static str> {
    let branch = branch.trim();
    BRANCH_CODES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(branch))
        .map(|(_, code)| *code)
}

/// Parses `roll_no` and, when a branch is declared, checks that the code
/// embedded in the roll number belongs to it.
pub fn validate_roll_no(roll_no: &str, branch: Option<&str>) -> Result<RollNumber, RollNoError> {
    let roll: RollNumber = roll_no.parse()?;

    if let Some(branch) = branch {
        let expected =
            branch_code(branch).ok_or_else(|| RollNoError::UnknownBranch(branch.trim().to_string()))?;
        if roll.branch_code() != expected {
            return Err(RollNoError::BranchMismatch {
                branch: branch.trim().to_ascii_uppercase(),
                code: roll.branch_code().to_string(),
            });
        }
    }

    Ok(roll)
}
