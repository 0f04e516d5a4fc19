use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use hyper::HeaderMap;

use crate::error::ServerError;

/// Decompresses `body` when the request carries `Content-Encoding: gzip` (spec §6); otherwise
/// returns it unchanged. Grounded on the original's request-side acceptance of gzip bodies.
pub fn decode_request_body(headers: &HeaderMap, body: Vec<u8>) -> Result<Vec<u8>, ServerError> {
    let is_gzipped = headers
        .get(hyper::header::CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("gzip"))
        .unwrap_or(false);

    if !is_gzipped {
        return Ok(body);
    }

    let mut decoder = GzDecoder::new(body.as_slice());
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| ServerError::BadRequest(format!("invalid gzip body: {e}")))?;
    Ok(out)
}

/// Gzip-compresses `body` when the client's `Accept-Encoding` mentions gzip (spec §6),
/// matching the original's `GzipHandle` response-side negotiation. Returns the (possibly
/// compressed) body and whether compression was applied.
pub fn maybe_encode_response(headers: &HeaderMap, body: Vec<u8>) -> (Vec<u8>, bool) {
    let accepts_gzip = headers
        .get(hyper::header::ACCEPT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("gzip"))
        .unwrap_or(false);

    if !accepts_gzip {
        return (body, false);
    }

    let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
    if encoder.write_all(&body).is_err() {
        return (body, false);
    }
    match encoder.finish() {
        Ok(compressed) => (compressed, true),
        Err(_) => (body, false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::{HeaderValue, ACCEPT_ENCODING, CONTENT_ENCODING};

    #[test]
    fn round_trips_a_gzip_encoded_request_body() {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip"));

        let (compressed, used) = maybe_encode_response(&headers, b"hello".to_vec());
        assert!(used);

        let mut request_headers = HeaderMap::new();
        request_headers.insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
        let decoded = decode_request_body(&request_headers, compressed).unwrap();
        assert_eq!(decoded, b"hello");
    }

    #[test]
    fn passes_through_uncompressed_bodies() {
        let headers = HeaderMap::new();
        let decoded = decode_request_body(&headers, b"plain".to_vec()).unwrap();
        assert_eq!(decoded, b"plain");
    }
}
