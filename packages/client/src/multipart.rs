//! Batch wire codec.
//!
//! A batch is one `POST /_api/batch` whose body carries every queued request
//! as a MIME-like part:
//!
//! ```text
//! --XXXsubpartXXX
//! Content-Type: application/x-c8-batchpart
//! Content-Id: {job id}
//!
//! {request as HTTP/1.1 text}
//! --XXXsubpartXXX--
//! ```
//!
//! The server answers with the same boundary, one part per request, each part
//! holding its `Content-Id` header and an embedded HTTP/1.1 response.

use std::collections::BTreeMap;

use crate::error::{Error, ErrorKind, Result};
use crate::request::{Method, Request};
use crate::response::Response;

pub const BOUNDARY: &str = "XXXsubpartXXX";

pub const PART_CONTENT_TYPE: &str = "application/x-c8-batchpart";

/// `Content-Type` header value for the batch request.
pub fn content_type() -> String {
    format!("multipart/form-data; boundary={}", BOUNDARY)
}

/// Encode `(content id, request)` pairs into a batch body.
pub fn encode<'a, I>(parts: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a Request)>,
{
    let mut lines = Vec::new();
    for (content_id, request) in parts {
        lines.push(format!("--{}", BOUNDARY));
        lines.push(format!("Content-Type: {}", PART_CONTENT_TYPE));
        lines.push(format!("Content-Id: {}", content_id));
        lines.push(format!("\r\n{}", request.stringify()));
    }
    lines.push(format!("--{}--", BOUNDARY));
    lines.join("\r\n")
}

/// One demultiplexed part of a batch response.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedPart {
    pub content_id: String,
    pub status: u16,
    pub status_text: String,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl DecodedPart {
    /// Build a response attributed to the request this part answers.
    pub fn into_response(self, method: Method, url: impl Into<String>) -> Response {
        Response::new(
            method,
            url,
            self.status,
            self.status_text,
            self.headers,
            self.body,
        )
    }
}

/// Split a batch response body into its parts, in server order.
pub fn decode(body: &str) -> Result<Vec<DecodedPart>> {
    let delimiter = format!("--{}", BOUNDARY);
    let pieces: Vec<&str> = body.split(delimiter.as_str()).collect();
    if pieces.len() < 2 {
        return Ok(Vec::new());
    }

    pieces[1..pieces.len() - 1]
        .iter()
        .map(|raw| decode_part(raw))
        .collect()
}

fn decode_part(raw: &str) -> Result<DecodedPart> {
    let raw = raw.trim_start_matches(['\r', '\n']);

    let (part_head, rest) = split_block(raw).ok_or_else(|| malformed("missing part headers"))?;
    let part_headers = parse_headers(part_head.lines().collect::<Vec<_>>().as_slice());
    let content_id = part_headers
        .get("content-id")
        .cloned()
        .ok_or_else(|| malformed("missing Content-Id"))?;

    let (response_head, body) = match split_block(rest) {
        Some((head, body)) => (head, body),
        None => (rest, ""),
    };
    let mut lines = response_head.lines();
    let status_line = lines.next().ok_or_else(|| malformed("missing status line"))?;
    let (status, status_text) = parse_status_line(status_line)?;
    let headers = parse_headers(lines.collect::<Vec<_>>().as_slice());

    Ok(DecodedPart {
        content_id,
        status,
        status_text,
        headers,
        body: body.trim_end_matches(['\r', '\n']).to_string(),
    })
}

/// Split at the first blank line.
fn split_block(text: &str) -> Option<(&str, &str)> {
    if let Some(idx) = text.find("\r\n\r\n") {
        return Some((&text[..idx], &text[idx + 4..]));
    }
    text.find("\n\n").map(|idx| (&text[..idx], &text[idx + 2..]))
}

fn parse_headers(lines: &[&str]) -> BTreeMap<String, String> {
    lines
        .iter()
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| (name.trim().to_ascii_lowercase(), value.trim().to_string()))
        .collect()
}

fn parse_status_line(line: &str) -> Result<(u16, String)> {
    let mut parts = line.trim().splitn(3, ' ');
    let _version = parts.next();
    let status = parts
        .next()
        .and_then(|code| code.parse().ok())
        .ok_or_else(|| malformed(&format!("bad status line '{}'", line.trim())))?;
    let status_text = parts.next().unwrap_or("").to_string();
    Ok((status, status_text))
}

fn malformed(message: &str) -> Error {
    Error::state(
        ErrorKind::BatchState,
        format!("malformed batch response part: {}", message),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response_part(id: &str, status: &str, body: &str) -> String {
        format!(
            "\r\nContent-Type: application/x-c8-batchpart\r\nContent-Id: {}\r\n\r\n\
             HTTP/1.1 {}\r\nContent-Type: application/json; charset=utf-8\r\n\
             Content-Length: {}\r\n\r\n{}\r\n",
            id,
            status,
            body.len(),
            body
        )
    }

    #[test]
    fn encodes_parts_with_content_ids() {
        let first = Request::get("/_api/collection/users/count");
        let second =
            Request::post("/_api/document/users").with_json_body(json!({"_key": "alice"}));

        let body = encode([("a1", &first), ("b2", &second)]);

        assert_eq!(
            body,
            "--XXXsubpartXXX\r\n\
             Content-Type: application/x-c8-batchpart\r\n\
             Content-Id: a1\r\n\
             \r\n\
             GET /_api/collection/users/count HTTP/1.1\r\n\
             --XXXsubpartXXX\r\n\
             Content-Type: application/x-c8-batchpart\r\n\
             Content-Id: b2\r\n\
             \r\n\
             POST /_api/document/users HTTP/1.1\r\n\r\n{\"_key\":\"alice\"}\r\n\
             --XXXsubpartXXX--"
        );
    }

    #[test]
    fn encodes_empty_queue_as_closing_boundary() {
        let body = encode(std::iter::empty());
        assert_eq!(body, "--XXXsubpartXXX--");
    }

    #[test]
    fn decodes_parts_in_order() {
        let body = format!(
            "--XXXsubpartXXX{}--XXXsubpartXXX{}--XXXsubpartXXX--\r\n",
            response_part("a1", "200 OK", r#"{"count":3}"#),
            response_part("b2", "409 Conflict", r#"{"error":true,"errorNum":1210}"#),
        );

        let parts = decode(&body).unwrap();
        assert_eq!(parts.len(), 2);

        assert_eq!(parts[0].content_id, "a1");
        assert_eq!(parts[0].status, 200);
        assert_eq!(parts[0].status_text, "OK");
        assert_eq!(parts[0].body, r#"{"count":3}"#);
        assert_eq!(
            parts[0].headers.get("content-type"),
            Some(&"application/json; charset=utf-8".to_string())
        );

        assert_eq!(parts[1].content_id, "b2");
        assert_eq!(parts[1].status, 409);
        assert_eq!(parts[1].status_text, "Conflict");
    }

    #[test]
    fn decoded_part_becomes_response() {
        let body = format!(
            "--XXXsubpartXXX{}--XXXsubpartXXX--",
            response_part("a1", "202 Accepted", r#"{"_key":"alice"}"#)
        );
        let part = decode(&body).unwrap().remove(0);
        let response = part.into_response(Method::POST, "/_api/document/users");

        assert_eq!(response.status(), 202);
        assert!(response.is_success());
        assert_eq!(response.body()["_key"], "alice");
        assert_eq!(response.method(), Method::POST);
    }

    #[test]
    fn body_without_boundary_has_no_parts() {
        assert!(decode("").unwrap().is_empty());
        assert!(decode("{\"error\":true}").unwrap().is_empty());
    }

    #[test]
    fn part_without_content_id_is_rejected() {
        let body = "--XXXsubpartXXX\r\nContent-Type: application/x-c8-batchpart\r\n\r\n\
                    HTTP/1.1 200 OK\r\n\r\n{}\r\n--XXXsubpartXXX--";
        let err = decode(body).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::BatchState));
    }

    #[test]
    fn part_with_bad_status_is_rejected() {
        let body = "--XXXsubpartXXX\r\nContent-Id: x\r\n\r\nHTTP/1.1 abc\r\n\r\n{}\r\n--XXXsubpartXXX--";
        assert!(decode(body).is_err());
    }

    #[test]
    fn content_type_names_boundary() {
        assert_eq!(content_type(), "multipart/form-data; boundary=XXXsubpartXXX");
    }
}
