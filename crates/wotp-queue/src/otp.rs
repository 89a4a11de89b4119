// SPDX-FileCopyrightText: 2026 WOTP Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-time code generation and message rendering.

use rand::Rng;
use strum::{Display, EnumString};
use wotp_core::WotpError;

/// Placeholder replaced by the code in OTP message templates.
pub const OTP_PLACEHOLDER: &str = "{{otp}}";

pub const MIN_LENGTH: usize = 4;
pub const MAX_LENGTH: usize = 12;

const DIGITS: &[u8] = b"0123456789";
const LETTERS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const ALPHANUMERIC: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Character set of a generated code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum OtpKind {
    Numeric,
    Alphanumeric,
    Alpha,
}

impl OtpKind {
    fn charset(self) -> &'static [u8] {
        match self {
            OtpKind::Numeric => DIGITS,
            OtpKind::Alphanumeric => ALPHANUMERIC,
            OtpKind::Alpha => LETTERS,
        }
    }
}

/// Generates a random code of `length` characters.
pub fn generate(length: usize, kind: OtpKind) -> Result<String, WotpError> {
    if !(MIN_LENGTH..=MAX_LENGTH).contains(&length) {
        return Err(WotpError::InvalidInput(format!(
            "otp length must be between {MIN_LENGTH} and {MAX_LENGTH}, got {length}"
        )));
    }
    let charset = kind.charset();
    let mut rng = rand::thread_rng();
    Ok((0..length)
        .map(|_| charset[rng.gen_range(0..charset.len())] as char)
        .collect())
}

/// Substitutes every placeholder in `template` with `code`.
pub fn render(template: &str, code: &str) -> String {
    template.replace(OTP_PLACEHOLDER, code)
}

/// Checks a caller-supplied template before it is queued.
pub fn validate_template(template: &str) -> Result<(), WotpError> {
    if template.contains(OTP_PLACEHOLDER) {
        Ok(())
    } else {
        Err(WotpError::InvalidInput(format!(
            "message template must contain {OTP_PLACEHOLDER}"
        )))
    }
}
