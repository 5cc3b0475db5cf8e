//! Secure transaction identity encoding.
//!
//! Payment processors echo an opaque "custom" field back in asynchronous
//! callbacks. We encode the transaction primary key into that field together
//! with a keyed MAC, so a callback can reference an internal transaction
//! without exposing a guessable integer and without a server-side lookup
//! table. The MAC is the sole authentication against forged callbacks, so
//! comparison must be constant-time.
//!
//! Wire format: `"<realm> <pk> <lowercase-hex-mac>"`, space-delimited,
//! exactly 3 fields. The realm is a namespace prefix distinguishing this
//! deployment's transactions from others sharing a processor account.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::errors::BillingError;
use super::ids::TransactionId;

type HmacSha256 = Hmac<Sha256>;

/// Encoder/decoder for the processor-facing transaction identity string.
pub struct TransactionIdentity {
    realm: String,
    secret_key: SecretString,
}

impl TransactionIdentity {
    pub fn new(realm: impl Into<String>, secret_key: SecretString) -> Self {
        Self {
            realm: realm.into(),
            secret_key,
        }
    }

    /// Encodes a transaction primary key into an identity string.
    ///
    /// Only the holder of the secret key can produce a valid MAC, so a
    /// processor echoing this string back proves the transaction originated
    /// here.
    pub fn encode(&self, pk: TransactionId) -> String {
        let mac = self.compute_mac(pk);
        format!("{} {} {}", self.realm, pk, hex::encode(mac))
    }

    /// Decodes and authenticates an identity string from a callback.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::UnknownTransaction`] when the string does not
    /// have exactly 3 space-separated fields, the realm does not match, the
    /// pk field is not a non-negative integer, or the MAC does not verify.
    /// The MAC comparison is constant-time regardless of where the mismatch
    /// occurs.
    pub fn decode(&self, custom: &str) -> Result<TransactionId, BillingError> {
        let fields: Vec<&str> = custom.split(' ').collect();
        if fields.len() != 3 {
            return Err(BillingError::UnknownTransaction);
        }
        if fields[0] != self.realm {
            return Err(BillingError::UnknownTransaction);
        }

        let pk: u64 = fields[1]
            .parse()
            .map_err(|_| BillingError::UnknownTransaction)?;
        let pk = TransactionId::new(pk);

        let supplied = hex::decode(fields[2]).map_err(|_| BillingError::UnknownTransaction)?;
        let expected = self.compute_mac(pk);

        if !constant_time_compare(&expected, &supplied) {
            return Err(BillingError::UnknownTransaction);
        }

        Ok(pk)
    }

    /// HMAC-SHA256 over `"payid <pk>"` with the configured secret key.
    fn compute_mac(&self, pk: TransactionId) -> Vec<u8> {
        let mut mac = HmacSha256::new_from_slice(self.secret_key.expose_secret().as_bytes())
            .expect("HMAC accepts any key length");
        mac.update(format!("payid {}", pk).as_bytes());
        mac.finalize().into_bytes().to_vec()
    }
}

/// Constant-time comparison of two byte slices.
///
/// Prevents timing attacks that could leak information about the expected
/// MAC one byte at a time.
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const TEST_SECRET: &str = "test-mac-key-0123456789";

    fn identity() -> TransactionIdentity {
        TransactionIdentity::new("TESTREALM", SecretString::new(TEST_SECRET.to_string()))
    }

    #[test]
    fn encode_produces_three_space_separated_fields() {
        let encoded = identity().encode(TransactionId::new(42));
        let fields: Vec<&str> = encoded.split(' ').collect();

        assert_eq!(fields.len(), 3);
        assert_eq!(fields[0], "TESTREALM");
        assert_eq!(fields[1], "42");
        // HMAC-SHA256 is 32 bytes, 64 lowercase hex chars
        assert_eq!(fields[2].len(), 64);
        assert!(fields[2].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn decode_round_trips_encode() {
        let identity = identity();
        let encoded = identity.encode(TransactionId::new(42));

        assert_eq!(identity.decode(&encoded).unwrap(), TransactionId::new(42));
    }

    #[test]
    fn decode_rejects_wrong_field_count() {
        let identity = identity();
        assert!(matches!(
            identity.decode("TESTREALM 42"),
            Err(BillingError::UnknownTransaction)
        ));
        assert!(matches!(
            identity.decode("TESTREALM 42 abc def"),
            Err(BillingError::UnknownTransaction)
        ));
        assert!(matches!(
            identity.decode(""),
            Err(BillingError::UnknownTransaction)
        ));
    }

    #[test]
    fn decode_rejects_wrong_realm() {
        let identity = identity();
        let encoded = identity.encode(TransactionId::new(42));
        let foreign = encoded.replacen("TESTREALM", "OTHERREALM", 1);

        assert!(matches!(
            identity.decode(&foreign),
            Err(BillingError::UnknownTransaction)
        ));
    }

    #[test]
    fn decode_rejects_non_numeric_pk() {
        let identity = identity();
        let encoded = identity.encode(TransactionId::new(42));
        let mac = encoded.split(' ').nth(2).unwrap();

        let bad = format!("TESTREALM x42 {}", mac);
        assert!(matches!(
            identity.decode(&bad),
            Err(BillingError::UnknownTransaction)
        ));

        let negative = format!("TESTREALM -1 {}", mac);
        assert!(matches!(
            identity.decode(&negative),
            Err(BillingError::UnknownTransaction)
        ));
    }

    #[test]
    fn decode_rejects_tampered_mac() {
        let identity = identity();
        let encoded = identity.encode(TransactionId::new(42));

        // Flip one hex character of the MAC.
        let mut chars: Vec<char> = encoded.chars().collect();
        let last = chars.len() - 1;
        chars[last] = if chars[last] == '0' { '1' } else { '0' };
        let tampered: String = chars.into_iter().collect();

        assert!(matches!(
            identity.decode(&tampered),
            Err(BillingError::UnknownTransaction)
        ));
    }

    #[test]
    fn decode_rejects_all_zero_mac() {
        let identity = identity();
        let forged = format!("TESTREALM 42 {}", "0".repeat(64));

        assert!(matches!(
            identity.decode(&forged),
            Err(BillingError::UnknownTransaction)
        ));
    }

    #[test]
    fn decode_rejects_mac_from_other_key() {
        let identity = identity();
        let other =
            TransactionIdentity::new("TESTREALM", SecretString::new("other-key".to_string()));
        let encoded = other.encode(TransactionId::new(42));

        assert!(matches!(
            identity.decode(&encoded),
            Err(BillingError::UnknownTransaction)
        ));
    }

    #[test]
    fn decode_rejects_non_hex_mac() {
        let identity = identity();
        let bad = format!("TESTREALM 42 {}", "z".repeat(64));

        assert!(matches!(
            identity.decode(&bad),
            Err(BillingError::UnknownTransaction)
        ));
    }

    #[test]
    fn constant_time_compare_handles_length_mismatch() {
        assert!(!constant_time_compare(&[1, 2, 3], &[1, 2, 3, 4]));
        assert!(constant_time_compare(&[1, 2, 3], &[1, 2, 3]));
        assert!(constant_time_compare(&[], &[]));
    }

    proptest! {
        #[test]
        fn round_trip_holds_for_any_pk_realm_and_key(
            pk in any::<u64>(),
            realm in "[A-Za-z0-9_-]{1,24}",
            key in "[ -~]{8,64}",
        ) {
            let identity = TransactionIdentity::new(realm, SecretString::new(key));
            let encoded = identity.encode(TransactionId::new(pk));
            prop_assert_eq!(identity.decode(&encoded).unwrap(), TransactionId::new(pk));
        }
    }
}
