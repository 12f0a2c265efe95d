//! SHA-256 digests and lowercase hex encoding, pooled where the input has
//! to be encoded into bytes first (spec.md §4.2).

use sha2::{Digest, Sha256};

use crate::pool::{shared, BufferPool};

/// `sha256_hex("")`, precomputed — used as the payload hash for GET/HEAD/
/// DELETE requests, which always carry an empty body.
pub const EMPTY_PAYLOAD_HASH: &str =
    "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// Appends the lowercase hex encoding of `bytes` to `out`. Two characters
/// per byte, no separators.
pub fn append_hex(out: &mut String, bytes: &[u8]) {
    out.reserve(bytes.len() * 2);
    for &b in bytes {
        out.push(HEX_DIGITS[(b >> 4) as usize] as char);
        out.push(HEX_DIGITS[(b & 0x0f) as usize] as char);
    }
}

pub fn hex_string(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    append_hex(&mut out, bytes);
    out
}

/// SHA-256 of a byte slice, as lowercase hex.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    hex_string(&digest)
}

/// SHA-256 of a UTF-8 string, as lowercase hex. Encodes into a pooled byte
/// buffer rather than allocating a fresh one, then returns it.
pub fn sha256_hex_str(s: &str) -> String {
    sha256_hex_str_with_pool(s, shared())
}

pub fn sha256_hex_str_with_pool(s: &str, pool: &dyn BufferPool) -> String {
    let mut buf = pool.rent(s.len());
    buf.extend_from_slice(s.as_bytes());
    let digest = Sha256::digest(&buf);
    let hex = hex_string(&digest);
    pool.return_buf(buf);
    hex
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_payload_hash_matches_sha256_of_empty_string() {
        assert_eq!(sha256_hex(b""), EMPTY_PAYLOAD_HASH);
        assert_eq!(sha256_hex_str(""), EMPTY_PAYLOAD_HASH);
    }

    #[test]
    fn hex_is_lowercase_and_double_length() {
        let bytes: Vec<u8> = (0..=255u16).map(|b| b as u8).collect();
        let hex = hex_string(&bytes);
        assert_eq!(hex.len(), bytes.len() * 2);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn known_vector() {
        // NIST test vector: sha256("abc")
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
