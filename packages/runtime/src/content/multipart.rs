//! `multipart/*` bodies with a byte-exact `Content-Length`.
//!
//! Wire layout, per part:
//!
//! ```text
//! --{boundary}\r\n
//! Content-Disposition: form-data; name="{name}"\r\n
//! Content-Type: {type}\r\n
//! Content-Length: {n}\r\n          (only when the part length is known)
//! \r\n
//! {body}\r\n
//! ```
//!
//! followed by `--{boundary}--\r\n`. Part heads are rendered once, at
//! construction, so the aggregate length and every write agree byte for byte.

use std::io::{self, Write};

use bytes::Bytes;
use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::request::OutgoingContent;
use crate::value::StreamSource;

const BOUNDARY_LEN: usize = 32;
const CRLF: &[u8] = b"\r\n";

/// The payload of one part.
#[derive(Debug, Clone)]
pub enum PartBody {
    Bytes(Bytes),
    Stream(StreamSource),
}

impl PartBody {
    fn length(&self) -> Option<u64> {
        match self {
            PartBody::Bytes(b) => Some(b.len() as u64),
            PartBody::Stream(s) => s.length(),
        }
    }

    fn write_to(&self, out: &mut dyn Write) -> io::Result<()> {
        match self {
            PartBody::Bytes(b) => out.write_all(b),
            PartBody::Stream(s) => s.copy_to(out).map(|_| ()),
        }
    }
}

/// One part before the boundary is known.
#[derive(Debug, Clone)]
pub struct Part {
    pub name: Option<String>,
    pub content_type: Option<String>,
    pub body: PartBody,
}

impl Part {
    pub fn new(name: Option<String>, content_type: Option<String>, body: PartBody) -> Self {
        Self {
            name,
            content_type,
            body,
        }
    }
}

#[derive(Debug, Clone)]
struct RenderedPart {
    head: Bytes,
    body: PartBody,
}

#[derive(Debug, Clone)]
pub struct MultipartContent {
    content_type: String,
    boundary: String,
    parts: Vec<RenderedPart>,
    length: Option<u64>,
}

impl MultipartContent {
    /// Draw a fresh random boundary, re-drawing while it occurs inside any
    /// in-memory part body.
    pub fn new(subtype: &str, parts: Vec<Part>) -> Self {
        let mut rng = rand::thread_rng();
        let boundary = loop {
            let candidate: String = (&mut rng)
                .sample_iter(&Alphanumeric)
                .take(BOUNDARY_LEN)
                .map(char::from)
                .collect();
            if !parts.iter().any(|p| contains(&p.body, candidate.as_bytes())) {
                break candidate;
            }
        };
        Self::with_boundary(subtype, boundary, parts)
    }

    /// Use a caller-chosen boundary. No collision check is made.
    pub fn with_boundary(subtype: &str, boundary: impl Into<String>, parts: Vec<Part>) -> Self {
        let boundary = boundary.into();
        let rendered: Vec<RenderedPart> = parts
            .into_iter()
            .map(|part| RenderedPart {
                head: render_head(&boundary, &part),
                body: part.body,
            })
            .collect();

        let closing = closing_len(&boundary);
        let length = rendered.iter().try_fold(closing, |acc, part| {
            let body = part.body.length()?;
            Some(acc + part.head.len() as u64 + body + CRLF.len() as u64)
        });

        Self {
            content_type: format!("multipart/{subtype}; boundary={boundary}"),
            boundary,
            parts: rendered,
            length,
        }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    pub fn part_count(&self) -> usize {
        self.parts.len()
    }
}

impl OutgoingContent for MultipartContent {
    fn content_type(&self) -> Option<&str> {
        Some(&self.content_type)
    }

    fn content_length(&self) -> Option<u64> {
        self.length
    }

    fn write_to(&self, out: &mut dyn Write) -> io::Result<()> {
        for part in &self.parts {
            out.write_all(&part.head)?;
            part.body.write_to(out)?;
            out.write_all(CRLF)?;
        }
        write!(out, "--{}--\r\n", self.boundary)
    }
}

fn render_head(boundary: &str, part: &Part) -> Bytes {
    let mut head = format!("--{boundary}\r\nContent-Disposition: form-data");
    if let Some(name) = &part.name {
        head.push_str(&format!("; name=\"{}\"", escape_quoted(name)));
    }
    head.push_str("\r\n");
    if let Some(ct) = &part.content_type {
        head.push_str(&format!("Content-Type: {ct}\r\n"));
    }
    if let Some(n) = part.body.length() {
        head.push_str(&format!("Content-Length: {n}\r\n"));
    }
    head.push_str("\r\n");
    Bytes::from(head)
}

fn closing_len(boundary: &str) -> u64 {
    // "--" boundary "--" CRLF
    (2 + boundary.len() + 2 + 2) as u64
}

/// Quote and line breaks would end the parameter early.
fn escape_quoted(name: &str) -> String {
    name.replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

fn contains(body: &PartBody, needle: &[u8]) -> bool {
    match body {
        PartBody::Bytes(b) => b.windows(needle.len()).any(|w| w == needle),
        PartBody::Stream(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(name: &str, body: &'static str) -> Part {
        Part::new(
            Some(name.to_string()),
            Some("text/plain".to_string()),
            PartBody::Bytes(Bytes::from_static(body.as_bytes())),
        )
    }

    #[test]
    fn exact_wire_format() {
        let content = MultipartContent::with_boundary(
            "form-data",
            "XyZ",
            vec![
                text("a", "1"),
                Part::new(None, None, PartBody::Bytes(Bytes::from_static(b"raw"))),
            ],
        );
        let written = content.to_bytes().unwrap();
        let expected = "--XyZ\r\n\
            Content-Disposition: form-data; name=\"a\"\r\n\
            Content-Type: text/plain\r\n\
            Content-Length: 1\r\n\
            \r\n\
            1\r\n\
            --XyZ\r\n\
            Content-Disposition: form-data\r\n\
            Content-Length: 3\r\n\
            \r\n\
            raw\r\n\
            --XyZ--\r\n";
        assert_eq!(std::str::from_utf8(&written).unwrap(), expected);
        assert_eq!(content.content_type(), Some("multipart/form-data; boundary=XyZ"));
    }

    #[test]
    fn declared_length_equals_written_bytes() {
        let content = MultipartContent::new(
            "mixed",
            vec![
                text("greeting", "héllo wörld"),
                text("empty", ""),
                Part::new(
                    Some("file".into()),
                    Some("application/octet-stream".into()),
                    PartBody::Stream(StreamSource::new(Some(4), || {
                        io::Cursor::new(vec![0u8, 1, 2, 3])
                    })),
                ),
            ],
        );
        let first = content.to_bytes().unwrap();
        let second = content.to_bytes().unwrap();
        assert_eq!(content.content_length(), Some(first.len() as u64));
        assert_eq!(first, second);
    }

    #[test]
    fn unknown_part_length_means_unknown_total() {
        let content = MultipartContent::new(
            "form-data",
            vec![
                text("a", "1"),
                Part::new(
                    Some("s".into()),
                    None,
                    PartBody::Stream(StreamSource::unsized_bytes(Bytes::from_static(b"abc"))),
                ),
            ],
        );
        assert_eq!(content.content_length(), None);
        let written = content.to_bytes().unwrap();
        let text = std::str::from_utf8(&written).unwrap();
        assert!(text.contains("name=\"s\"\r\n\r\nabc\r\n"));
    }

    #[test]
    fn part_stream_that_lies_about_its_length_fails_the_write() {
        let content = MultipartContent::with_boundary(
            "form-data",
            "b",
            vec![Part::new(
                Some("file".into()),
                None,
                PartBody::Stream(StreamSource::new(Some(10), || {
                    io::Cursor::new(b"short".to_vec())
                })),
            )],
        );
        assert!(content.content_length().is_some());
        let err = content.to_bytes().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);

        let content = MultipartContent::with_boundary(
            "form-data",
            "b",
            vec![Part::new(
                Some("file".into()),
                None,
                PartBody::Stream(StreamSource::new(Some(2), || {
                    io::Cursor::new(b"too long".to_vec())
                })),
            )],
        );
        assert!(content.to_bytes().is_err());
    }

    #[test]
    fn boundary_is_random_and_absent_from_bodies() {
        let a = MultipartContent::new("form-data", vec![text("a", "1")]);
        let b = MultipartContent::new("form-data", vec![text("a", "1")]);
        assert_eq!(a.boundary().len(), BOUNDARY_LEN);
        assert!(a.boundary().chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a.boundary(), b.boundary());
    }

    #[test]
    fn quotes_in_names_are_escaped() {
        let content = MultipartContent::with_boundary("form-data", "b", vec![text("x\"y", "1")]);
        let written = content.to_bytes().unwrap();
        assert!(std::str::from_utf8(&written)
            .unwrap()
            .contains("name=\"x%22y\""));
    }
}
