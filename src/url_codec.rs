//! Percent-encoding and canonical query-string construction (spec.md §4.3).
//!
//! The valid, never-encoded byte set for object keys is
//! `A-Za-z0-9-_.~/` — S3 key encoding is deliberately permissive about the
//! path separator, unlike the aggressive `AsciiSet`s `signing.rs` builds in
//! the teacher crate for its already-normalized `url::Url` input.

use std::borrow::Cow;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::pool::{shared, BufferPool};
use crate::strbuf::GrowableStringBuffer;

/// Everything that must be percent-encoded when building an object key:
/// all non-alphanumeric bytes except `- _ . ~ /`.
const KEY_UNSAFE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

fn byte_needs_encoding(b: u8) -> bool {
    !(b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~' | b'/'))
}

/// Percent-encodes `name` for use as an object key in a URL path. Returns
/// the original string unchanged (no allocation) when every byte is
/// already in the valid set.
pub fn encode_key(name: &str) -> Cow<'_, str> {
    if name.bytes().any(byte_needs_encoding) {
        Cow::Owned(utf8_percent_encode(name, KEY_UNSAFE).to_string())
    } else {
        Cow::Borrowed(name)
    }
}

/// Appends the percent-encoded form of `name` to `buf`, byte by byte,
/// rather than materializing an intermediate owned string.
pub fn append_encoded_key(buf: &mut GrowableStringBuffer<'_>, name: &str) {
    for chunk in utf8_percent_encode(name, KEY_UNSAFE) {
        buf.append_str(chunk);
    }
}

fn unescape_form_component(raw: &str, pool: &dyn BufferPool) -> String {
    let mut bytes = pool.rent(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '+' {
            bytes.push(b' ');
        } else {
            let mut tmp = [0u8; 4];
            bytes.extend_from_slice(c.encode_utf8(&mut tmp).as_bytes());
        }
    }
    let decoded = percent_decode_str(std::str::from_utf8(&bytes).unwrap_or(""))
        .decode_utf8_lossy()
        .into_owned();
    pool.return_buf(bytes);
    decoded
}

/// Canonicalizes a raw query string (optionally prefixed with `?`) into
/// `&`-joined, percent-encoded `key=value` pairs, emitted in the order they
/// appear in `raw_query`.
///
/// SigV4 mandates byte-sorted order; this client only ever canonicalizes a
/// query string it built itself (`list-type=2[&prefix=...]`), which is
/// already emitted in sorted order, so preserving input order is correct
/// by construction. A future caller that signs an arbitrary caller-supplied
/// query string would need to sort here first.
pub fn append_canonical_query(buf: &mut GrowableStringBuffer<'_>, raw_query: &str) {
    append_canonical_query_with_pool(buf, raw_query, shared())
}

pub fn append_canonical_query_with_pool(
    buf: &mut GrowableStringBuffer<'_>,
    raw_query: &str,
    pool: &dyn BufferPool,
) {
    let raw_query = raw_query.strip_prefix('?').unwrap_or(raw_query);
    if raw_query.is_empty() {
        return;
    }
    for pair in raw_query.split('&') {
        if pair.is_empty() {
            continue;
        }
        let (name, value) = match pair.split_once('=') {
            Some((n, v)) => (n, v),
            None => (pair, ""),
        };
        let name = name.trim_start();
        let name = unescape_form_component(name, pool);
        let value = unescape_form_component(value, pool);
        append_encoded_key(buf, &name);
        buf.append_char('=');
        append_encoded_key(buf, &value);
        buf.append_char('&');
    }
    buf.remove_last();
}

/// `{bucket_prefix}[/{encoded name}]`.
pub fn build_file_url(bucket_prefix: &str, file_name: Option<&str>) -> String {
    match file_name {
        None => bucket_prefix.to_string(),
        Some(name) => {
            let mut out = String::with_capacity(bucket_prefix.len() + name.len() + 1);
            out.push_str(bucket_prefix);
            out.push('/');
            out.push_str(&encode_key(name));
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::BucketedPool;

    #[test]
    fn unreserved_passthrough() {
        let s = "abcXYZ019-_.~/path";
        assert!(matches!(encode_key(s), Cow::Borrowed(_)));
        assert_eq!(encode_key(s), s);
    }

    #[test]
    fn encodes_space_and_parens() {
        assert_eq!(encode_key("a (b)"), "a%20%28b%29");
    }

    #[test]
    fn encodes_cyrillic() {
        let encoded = encode_key("при(ве)+т_как23дела.pdf");
        assert!(encoded.contains("%D0%BF%D1%80%D0%B8"));
        assert!(!encoded.contains(char::is_whitespace));
    }

    #[test]
    fn round_trips_through_percent_decode() {
        for s in ["hello world", "привет", "a/b/c", "100% done", "x=y&z"] {
            let encoded = encode_key(s);
            let decoded = percent_decode_str(&encoded).decode_utf8_lossy();
            assert_eq!(decoded, s);
        }
    }

    #[test]
    fn canonical_query_preserves_input_order_for_list_params() {
        let pool = BucketedPool::default();
        let mut buf = GrowableStringBuffer::new(&pool);
        append_canonical_query_with_pool(&mut buf, "list-type=2&prefix=foo/bar", &pool);
        assert_eq!(buf.as_str(), "list-type=2&prefix=foo%2Fbar");
    }

    #[test]
    fn canonical_query_handles_plus_as_space() {
        let pool = BucketedPool::default();
        let mut buf = GrowableStringBuffer::new(&pool);
        append_canonical_query_with_pool(&mut buf, "prefix=a+b", &pool);
        assert_eq!(buf.as_str(), "prefix=a%20b");
    }

    #[test]
    fn canonical_query_strips_leading_question_mark() {
        let pool = BucketedPool::default();
        let mut buf = GrowableStringBuffer::new(&pool);
        append_canonical_query_with_pool(&mut buf, "?list-type=2", &pool);
        assert_eq!(buf.as_str(), "list-type=2");
    }

    #[test]
    fn build_file_url_without_name() {
        assert_eq!(build_file_url("http://h/b", None), "http://h/b");
    }

    #[test]
    fn build_file_url_with_name() {
        assert_eq!(
            build_file_url("http://h/b", Some("a b.txt")),
            "http://h/b/a%20b.txt"
        );
    }
}
