//! Connection tickets for the push socket.
//!
//! A client proves it owns the address it wants to listen on by signing
//! `"ws|{address}|{ts}"` with the key the address embeds. The ticket is
//! carried in the upgrade request's query string, so no message exchange
//! is needed before the socket is authenticated.

use relaynet_crypto::{decode_address, verify_signature};
use relaynet_messages::ws_ticket_string;
use relaynet_types::{Signature, SignerAddress, Timestamp};
use thiserror::Error;

/// Why a connection ticket was refused.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TicketError {
    /// The address does not decode to a public key.
    #[error("address is not a valid signer address")]
    UnknownAddress,
    /// The signature is not 64 hex-encoded bytes.
    #[error("signature is malformed")]
    MalformedSignature,
    /// The ticket timestamp is outside the accepted window.
    #[error("ticket timestamp is outside the accepted window")]
    StaleTimestamp,
    /// The signature does not verify against the address's key.
    #[error("signature does not match the address")]
    BadSignature,
}

/// Verify a connection ticket for `address`.
///
/// The timestamp must be within `skew_secs` of `now` in either direction;
/// a ticket from a badly skewed clock is rejected rather than replayed
/// indefinitely.
pub fn verify_ticket(
    address: &SignerAddress,
    timestamp: u64,
    signature_hex: &str,
    skew_secs: u64,
    now: Timestamp,
) -> Result<(), TicketError> {
    let public_key = decode_address(address.as_str()).ok_or(TicketError::UnknownAddress)?;
    let signature =
        Signature::from_hex(signature_hex).map_err(|_| TicketError::MalformedSignature)?;

    if now.as_secs().abs_diff(timestamp) > skew_secs {
        return Err(TicketError::StaleTimestamp);
    }

    let message = ws_ticket_string(address, timestamp);
    if !verify_signature(message.as_bytes(), &signature, &public_key) {
        return Err(TicketError::BadSignature);
    }
    Ok(())
}
