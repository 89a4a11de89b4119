// SPDX-FileCopyrightText: 2026 WOTP Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recipient addressing.

use wotp_core::WotpError;

/// Server part of individual user JIDs.
pub const USER_SERVER: &str = "s.whatsapp.net";

/// Normalizes a phone number in any common notation (`+1 (555) 010-2030`)
/// to a user JID by keeping its digits.
pub fn recipient_jid(phone: &str) -> Result<String, WotpError> {
    let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return Err(WotpError::InvalidInput(format!(
            "recipient `{phone}` contains no digits"
        )));
    }
    Ok(format!("{digits}@{USER_SERVER}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_formatting() {
        assert_eq!(
            recipient_jid("+1 (555) 010-2030").unwrap(),
            "15550102030@s.whatsapp.net"
        );
        assert_eq!(recipient_jid("919876543210").unwrap(), "919876543210@s.whatsapp.net");
    }

    #[test]
    fn rejects_digitless_input() {
        let err = recipient_jid("call me").unwrap_err();
        assert!(matches!(err, WotpError::InvalidInput(_)));
    }

    proptest::proptest! {
        #[test]
        fn output_is_digits_at_server(input in "\\PC{0,24}") {
            if let Ok(jid) = recipient_jid(&input) {
                let (user, server) = jid.split_once('@').unwrap();
                proptest::prop_assert_eq!(server, USER_SERVER);
                proptest::prop_assert!(!user.is_empty());
                proptest::prop_assert!(user.chars().all(|c| c.is_ascii_digit()));
            }
        }
    }
}
