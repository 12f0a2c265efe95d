//! Streaming single-pass scalar extraction from S3's XML responses (spec.md
//! §4.8). No full XML parser: S3's multipart/listing responses are
//! well-formed enough that `<Tag>value</Tag>` can be recognized with a
//! byte-at-a-time scanner that allocates nothing beyond the returned
//! `String` itself.

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::S3Error;

#[derive(PartialEq, Eq)]
enum State {
    Outside,
    OpeningTag { matched: usize },
    InsideValue,
}

/// Reads `reader` to its end searching for the first `<tag>...</tag>` and
/// returns its text content, or `""` if the stream ends without a match.
pub async fn scan_one<R: AsyncRead + Unpin>(reader: &mut R, tag: &str) -> Result<String, S3Error> {
    let tag_bytes = tag.as_bytes();
    let mut state = State::Outside;
    let mut value = Vec::new();
    let mut byte = [0u8; 1];

    loop {
        let n = reader.read(&mut byte).await?;
        if n == 0 {
            return Ok(String::new());
        }
        let b = byte[0];

        match state {
            State::Outside => {
                if b == b'<' {
                    state = State::OpeningTag { matched: 0 };
                }
            }
            State::OpeningTag { matched } => {
                if matched < tag_bytes.len() && b == tag_bytes[matched] {
                    state = State::OpeningTag {
                        matched: matched + 1,
                    };
                } else if matched == tag_bytes.len() && b == b'>' {
                    state = State::InsideValue;
                } else if b == b'<' {
                    state = State::OpeningTag { matched: 0 };
                } else {
                    state = State::Outside;
                }
            }
            State::InsideValue => {
                if b == b'<' {
                    return Ok(String::from_utf8_lossy(&value).into_owned());
                }
                value.push(b);
            }
        }
    }
}

/// Pull-based scanner for repeated elements of the same tag name (e.g. each
/// `<Key>` in a `ListBucketResult`). A small hand-rolled iterator rather
/// than a `futures::Stream` impl — `list()` just calls `.next().await` in a
/// loop, which is the only caller this type needs to serve. Owns its reader
/// so a caller can build one directly from a consumed `BodyStream`.
pub struct XmlKeyScanner<R> {
    reader: R,
    tag: String,
    done: bool,
}

impl<R: AsyncRead + Unpin> XmlKeyScanner<R> {
    pub fn new(reader: R, tag: impl Into<String>) -> Self {
        XmlKeyScanner {
            reader,
            tag: tag.into(),
            done: false,
        }
    }

    /// Returns the next matched element's value, or `None` once the stream
    /// is exhausted without a further match.
    pub async fn next(&mut self) -> Result<Option<String>, S3Error> {
        if self.done {
            return Ok(None);
        }
        let value = scan_one(&mut self.reader, &self.tag).await?;
        if value.is_empty() {
            self.done = true;
            return Ok(None);
        }
        Ok(Some(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn extracts_first_matching_element() {
        let xml = b"<Foo>ignored</Foo><UploadId>abc-123</UploadId><Other>x</Other>";
        let mut cursor = Cursor::new(&xml[..]);
        let value = scan_one(&mut cursor, "UploadId").await.unwrap();
        assert_eq!(value, "abc-123");
    }

    #[tokio::test]
    async fn returns_empty_when_tag_never_appears() {
        let xml = b"<Foo>bar</Foo>";
        let mut cursor = Cursor::new(&xml[..]);
        let value = scan_one(&mut cursor, "UploadId").await.unwrap();
        assert_eq!(value, "");
    }

    #[tokio::test]
    async fn handles_empty_element_value() {
        let xml = b"<Key></Key>";
        let mut cursor = Cursor::new(&xml[..]);
        let value = scan_one(&mut cursor, "Key").await.unwrap();
        assert_eq!(value, "");
    }

    #[tokio::test]
    async fn recovers_from_partial_prefix_match() {
        // "<Up" starts matching "UploadId" then diverges at 'x' - must reset
        // and still find the real tag later.
        let xml = b"<Upxyz>nope</Upxyz><UploadId>right</UploadId>";
        let mut cursor = Cursor::new(&xml[..]);
        let value = scan_one(&mut cursor, "UploadId").await.unwrap();
        assert_eq!(value, "right");
    }

    #[tokio::test]
    async fn scanner_yields_each_repeated_element_in_order() {
        let xml = b"<Key>a.txt</Key><Key>b.txt</Key><Key>c.txt</Key>";
        let cursor = Cursor::new(xml.to_vec());
        let mut scanner = XmlKeyScanner::new(cursor, "Key");
        assert_eq!(scanner.next().await.unwrap(), Some("a.txt".to_string()));
        assert_eq!(scanner.next().await.unwrap(), Some("b.txt".to_string()));
        assert_eq!(scanner.next().await.unwrap(), Some("c.txt".to_string()));
        assert_eq!(scanner.next().await.unwrap(), None);
    }

    #[tokio::test]
    async fn does_not_match_a_tag_with_extra_attributes() {
        // "<Key ..." should not match a bare "Key" search since '>' doesn't
        // immediately follow the matched name.
        let xml = b"<Key attr=\"x\">skipped</Key><Key>real</Key>";
        let mut cursor = Cursor::new(&xml[..]);
        let value = scan_one(&mut cursor, "Key").await.unwrap();
        assert_eq!(value, "real");
    }
}
