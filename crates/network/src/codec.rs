//! Message encoding and decoding for network transport.
//!
//! # Wire Format
//!
//! ```text
//! [version: u8][payload: bincode-encoded SignedTransaction]
//! ```
//!
//! Message type is determined by the tag the message arrived under, not by a
//! field in the payload; the transaction tag is the only one today.

use chainflow_types::SignedTransaction;
use thiserror::Error;

/// Current wire format version.
pub const WIRE_VERSION: u8 = 1;

/// Errors that can occur during message encoding/decoding.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("unknown wire version: {0}")]
    UnknownVersion(u8),

    #[error("message too short")]
    MessageTooShort,

    #[error("decode error: {0}")]
    Decode(String),

    #[error("encode error: {0}")]
    Encode(String),
}

/// Encode a signed transaction to wire format.
pub fn encode_transaction(txn: &SignedTransaction) -> Result<Vec<u8>, CodecError> {
    let payload = bincode::serialize(txn).map_err(|e| CodecError::Encode(e.to_string()))?;
    let mut bytes = Vec::with_capacity(1 + payload.len());
    bytes.push(WIRE_VERSION);
    bytes.extend(payload);
    Ok(bytes)
}

/// Decode a signed transaction from wire format.
pub fn decode_transaction(data: &[u8]) -> Result<SignedTransaction, CodecError> {
    if data.is_empty() {
        return Err(CodecError::MessageTooShort);
    }

    let version = data[0];
    if version != WIRE_VERSION {
        return Err(CodecError::UnknownVersion(version));
    }

    bincode::deserialize(&data[1..]).map_err(|e| CodecError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainflow_types::test_utils::{test_keypair, test_transaction};
    use chainflow_types::Hash;

    fn make_signed() -> SignedTransaction {
        let sender = test_keypair(1);
        let txn = test_transaction(
            &sender,
            &test_keypair(2),
            1,
            100,
            "testnet",
            Hash::digest(b"genesis"),
        );
        SignedTransaction::sign(txn, &sender)
    }

    #[test]
    fn encode_decode_round_trip() {
        let stx = make_signed();
        let bytes = encode_transaction(&stx).unwrap();
        assert_eq!(bytes[0], WIRE_VERSION);

        let decoded = decode_transaction(&bytes).unwrap();
        assert_eq!(decoded, stx);
        assert_eq!(decoded.id(), stx.id());
    }

    #[test]
    fn unknown_version_rejected() {
        let mut bytes = encode_transaction(&make_signed()).unwrap();
        bytes[0] = 99;
        assert!(matches!(
            decode_transaction(&bytes),
            Err(CodecError::UnknownVersion(99))
        ));
    }

    #[test]
    fn empty_message_rejected() {
        assert!(matches!(
            decode_transaction(&[]),
            Err(CodecError::MessageTooShort)
        ));
    }

    #[test]
    fn garbage_payload_rejected() {
        let bytes = [WIRE_VERSION, 0xde, 0xad, 0xbe, 0xef];
        assert!(matches!(
            decode_transaction(&bytes),
            Err(CodecError::Decode(_))
        ));
    }
}
