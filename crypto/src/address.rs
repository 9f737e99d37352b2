//! Signer address derivation from public keys.
//!
//! Address format: `rn_` + base32(public_key, 52 chars) + base32(checksum, 8 chars)
//!
//! Checksum: first 5 bytes of Blake2b-256(public_key).
//! Base32 alphabet: `13456789abcdefghijkmnopqrstuwxyz` (avoids ambiguous chars).
//! Total address length: 3 (prefix) + 52 + 8 = 63 characters.
//!
//! Because the address encodes the full public key, decoding an address is
//! enough to verify any signature its owner produced — the protocol never
//! needs a key directory.

use relaynet_types::{PublicKey, SignerAddress};

/// Base32 alphabet (32 chars, avoids visually ambiguous 0/O, 2/Z, l/I, v).
const BASE32_ALPHABET: &[u8; 32] = b"13456789abcdefghijkmnopqrstuwxyz";

/// Reverse lookup table: ASCII byte → 5-bit value (0xFF = invalid).
const BASE32_DECODE: [u8; 128] = {
    let mut table = [0xFFu8; 128];
    let alpha = BASE32_ALPHABET;
    let mut i = 0;
    while i < 32 {
        table[alpha[i] as usize] = i as u8;
        i += 1;
    }
    table
};

/// Expected length of the encoded part (after `rn_`): 52 pubkey + 8 checksum.
const ENCODED_LEN: usize = 60;
/// Prefix for all RelayNet addresses.
const PREFIX: &str = "rn_";
/// Number of base32 characters for the public key (256 bits → ceil(256/5) = 52).
const PUBKEY_CHARS: usize = 52;

/// Encode a byte slice as base32, 5 bits per character, MSB first. The
/// final character carries zero padding on the right when the bit count is
/// not a multiple of five.
fn encode_base32(bytes: &[u8]) -> String {
    let mut out = String::with_capacity((bytes.len() * 8).div_ceil(5));
    let mut acc: u32 = 0;
    let mut nbits: u32 = 0;

    for &b in bytes {
        acc = (acc << 8) | u32::from(b);
        nbits += 8;
        while nbits >= 5 {
            nbits -= 5;
            out.push(BASE32_ALPHABET[(acc >> nbits) as usize & 0x1F] as char);
        }
        // Keep only the unconsumed low bits so the accumulator stays small.
        acc &= (1 << nbits) - 1;
    }
    if nbits > 0 {
        out.push(BASE32_ALPHABET[(acc << (5 - nbits)) as usize & 0x1F] as char);
    }

    out
}

/// Decode a base32 string into exactly `N` bytes. `None` on a character
/// outside the alphabet or a length that does not map to `N` bytes.
fn decode_base32_fixed<const N: usize>(s: &str) -> Option<[u8; N]> {
    if s.len() != (N * 8).div_ceil(5) {
        return None;
    }

    let mut out = [0u8; N];
    let mut acc: u32 = 0;
    let mut nbits: u32 = 0;
    let mut filled = 0;

    for ch in s.bytes() {
        let val = *BASE32_DECODE.get(ch as usize)?;
        if val == 0xFF {
            return None;
        }
        acc = (acc << 5) | u32::from(val);
        nbits += 5;
        if nbits >= 8 {
            nbits -= 8;
            if filled < N {
                out[filled] = (acc >> nbits) as u8;
                filled += 1;
            }
            acc &= (1 << nbits) - 1;
        }
    }

    (filled == N).then_some(out)
}

/// Derive an `rn_`-prefixed signer address from a public key.
///
/// Process:
/// 1. Compute checksum = Blake2b-256(public_key)[0..5]
/// 2. Encode public_key as 52 base32 characters
/// 3. Encode checksum as 8 base32 characters
/// 4. Address = "rn_" + encoded_pubkey + encoded_checksum
pub fn derive_address(public_key: &PublicKey) -> SignerAddress {
    let pubkey_encoded = encode_base32(&public_key.0);
    let hash = crate::blake2b_256(&public_key.0);
    let checksum_encoded = encode_base32(&hash[..5]);
    let address = format!("{}{}{}", PREFIX, pubkey_encoded, checksum_encoded);
    SignerAddress::new(address)
}

/// Extract the public key from a valid RelayNet address.
///
/// Returns `None` if the address is malformed or has an invalid checksum.
pub fn decode_address(address: &str) -> Option<PublicKey> {
    if !address.starts_with(PREFIX) {
        return None;
    }
    let encoded = &address[PREFIX.len()..];
    if encoded.len() != ENCODED_LEN {
        return None;
    }

    let pubkey_encoded = &encoded[..PUBKEY_CHARS];
    let checksum_encoded = &encoded[PUBKEY_CHARS..];

    let pubkey_bytes: [u8; 32] = decode_base32_fixed(pubkey_encoded)?;
    let checksum_bytes: [u8; 5] = decode_base32_fixed(checksum_encoded)?;

    let expected_checksum = &crate::blake2b_256(&pubkey_bytes)[..5];
    if checksum_bytes != *expected_checksum {
        return None;
    }

    Some(PublicKey(pubkey_bytes))
}

/// Validate that an address string is well-formed and its checksum is correct.
pub fn validate_address(address: &str) -> bool {
    decode_address(address).is_some()
}
