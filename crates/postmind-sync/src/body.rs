//! Plain-text body extraction from raw RFC 822 messages.
//!
//! Walks the MIME tree for the first `text/plain` part and decodes its
//! transfer encoding and charset. Messages without a plain part yield an
//! empty body and are still published.

use mailparse::{parse_mail, ParsedMail};

/// Extract the `text/plain` body of a raw message.
///
/// Returns an empty string when the message has no plain part or cannot
/// be parsed at all.
pub fn extract_plain_text(raw: &[u8]) -> String {
    let Ok(parsed) = parse_mail(raw) else {
        return fallback_after_headers(raw);
    };

    find_plain_part(&parsed)
        .and_then(|part| part.get_body().ok())
        .unwrap_or_default()
}

fn find_plain_part<'a, 'b>(mail: &'a ParsedMail<'b>) -> Option<&'a ParsedMail<'b>> {
    if mail.ctype.mimetype.eq_ignore_ascii_case("text/plain") {
        return Some(mail);
    }
    mail.subparts.iter().find_map(find_plain_part)
}

/// Header-split fallback for unparseable input: the portion after the
/// first blank line, if the headers advertise text/plain.
fn fallback_after_headers(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    let Some((headers, body)) = text.split_once("\r\n\r\n") else {
        return String::new();
    };
    if headers.to_ascii_lowercase().contains("content-type: text/plain") {
        body.to_string()
    } else {
        String::new()
    }
}

/// Decode an RFC 2047 encoded header value (`=?utf-8?q?...?=`).
pub fn decode_header_value(input: &str) -> String {
    let fake_header = format!("X: {input}");
    match mailparse::parse_header(fake_header.as_bytes()) {
        Ok((header, _)) => header.get_value(),
        Err(_) => input.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_plain_message() {
        let raw = b"Content-Type: text/plain\r\nSubject: hi\r\n\r\nCall me back by Friday.\r\n";
        let body = extract_plain_text(raw);
        assert!(body.contains("Call me back by Friday."));
    }

    #[test]
    fn test_multipart_prefers_plain_part() {
        let raw = b"Content-Type: multipart/alternative; boundary=\"b\"\r\n\r\n\
--b\r\nContent-Type: text/html\r\n\r\n<p>html version</p>\r\n\
--b\r\nContent-Type: text/plain\r\n\r\nplain version\r\n\
--b--\r\n";
        let body = extract_plain_text(raw);
        assert!(body.contains("plain version"));
        assert!(!body.contains("html"));
    }

    #[test]
    fn test_html_only_message_yields_empty_body() {
        let raw = b"Content-Type: text/html\r\n\r\n<p>only html</p>\r\n";
        assert_eq!(extract_plain_text(raw), "");
    }

    #[test]
    fn test_quoted_printable_is_decoded() {
        let raw = b"Content-Type: text/plain; charset=utf-8\r\n\
Content-Transfer-Encoding: quoted-printable\r\n\r\n\
caf=C3=A9 deadline\r\n";
        let body = extract_plain_text(raw);
        assert!(body.contains("café deadline"), "{body}");
    }

    #[test]
    fn test_base64_is_decoded() {
        // base64("due tomorrow")
        let raw = b"Content-Type: text/plain\r\n\
Content-Transfer-Encoding: base64\r\n\r\n\
ZHVlIHRvbW9ycm93\r\n";
        let body = extract_plain_text(raw);
        assert!(body.contains("due tomorrow"), "{body}");
    }

    #[test]
    fn test_content_type_is_case_insensitive() {
        let raw = b"Content-Type: TEXT/PLAIN\r\n\r\nupper case type\r\n";
        assert!(extract_plain_text(raw).contains("upper case type"));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(extract_plain_text(b""), "");
    }

    #[test]
    fn test_decode_rfc2047_subject() {
        let decoded = decode_header_value("=?utf-8?q?Caf=C3=A9_meeting?=");
        assert_eq!(decoded, "Café meeting");
    }

    #[test]
    fn test_decode_plain_subject_passthrough() {
        assert_eq!(decode_header_value("Weekly report"), "Weekly report");
    }
}
