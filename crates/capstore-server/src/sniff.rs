//! Content type sniffing for uploads without a `Content-Type` header
//!
//! Looks at the first [`SNIFF_LEN`] bytes only. Recognizes the common
//! binary signatures and markup prefixes; anything else is plain text when
//! it decodes as UTF-8 without control bytes, and opaque binary otherwise.

/// Bytes of the body considered when sniffing
pub const SNIFF_LEN: usize = 512;

/// Fallback for text
pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// Fallback for everything else
pub const OCTET_STREAM: &str = "application/octet-stream";

const HTML: &str = "text/html; charset=utf-8";

/// Exact prefixes, checked in order
const MAGIC: &[(&[u8], &str)] = &[
    (b"%PDF-", "application/pdf"),
    (b"%!PS-Adobe-", "application/postscript"),
    (b"\xFE\xFF", "text/plain; charset=utf-16be"),
    (b"\xFF\xFE", "text/plain; charset=utf-16le"),
    (b"\xEF\xBB\xBF", TEXT_PLAIN),
    (b"GIF87a", "image/gif"),
    (b"GIF89a", "image/gif"),
    (b"\x89PNG\x0D\x0A\x1A\x0A", "image/png"),
    (b"\xFF\xD8\xFF", "image/jpeg"),
    (b"BM", "image/bmp"),
    (b"\x00\x00\x01\x00", "image/x-icon"),
    (b"\x00\x00\x02\x00", "image/x-icon"),
    (b"OggS\x00", "application/ogg"),
    (b"ID3", "audio/mpeg"),
    (b"\x1A\x45\xDF\xA3", "video/webm"),
    (b"PK\x03\x04", "application/zip"),
    (b"\x1F\x8B\x08", "application/x-gzip"),
    (b"Rar!\x1A\x07", "application/x-rar-compressed"),
    (b"\x00asm", "application/wasm"),
];

/// RIFF containers, matched on the form type at offset 8
const RIFF_FORMS: &[(&[u8], &str)] = &[
    (b"WEBPVP", "image/webp"),
    (b"WAVE", "audio/wave"),
    (b"AVI ", "video/avi"),
];

/// Markup openers matched case-insensitively after leading whitespace and
/// followed by a space or `>`
const HTML_TAGS: &[&[u8]] = &[
    b"<!DOCTYPE HTML",
    b"<HTML",
    b"<HEAD",
    b"<SCRIPT",
    b"<IFRAME",
    b"<H1",
    b"<DIV",
    b"<FONT",
    b"<TABLE",
    b"<A",
    b"<STYLE",
    b"<TITLE",
    b"<B",
    b"<BODY",
    b"<BR",
    b"<P",
    b"<!--",
];

/// Guess the media type of `data`
pub fn sniff_content_type(data: &[u8]) -> &'static str {
    let head = &data[..data.len().min(SNIFF_LEN)];

    if let Some(&(_, media_type)) = MAGIC.iter().find(|(magic, _)| head.starts_with(magic)) {
        return media_type;
    }
    if head.len() >= 12 && head.starts_with(b"RIFF") {
        if let Some(&(_, media_type)) = RIFF_FORMS
            .iter()
            .find(|(form, _)| head[8..].starts_with(form))
        {
            return media_type;
        }
    }

    let markup = trim_leading_whitespace(head);
    if HTML_TAGS.iter().any(|tag| is_html_tag(markup, tag)) {
        return HTML;
    }
    if markup.starts_with(b"<?xml") {
        return "text/xml; charset=utf-8";
    }

    if is_text(head, head.len() < data.len()) {
        TEXT_PLAIN
    } else {
        OCTET_STREAM
    }
}

fn trim_leading_whitespace(data: &[u8]) -> &[u8] {
    let start = data
        .iter()
        .position(|b| !matches!(b, b'\t' | b'\n' | b'\x0C' | b'\r' | b' '))
        .unwrap_or(data.len());
    &data[start..]
}

fn is_html_tag(data: &[u8], tag: &[u8]) -> bool {
    data.len() > tag.len()
        && data[..tag.len()].eq_ignore_ascii_case(tag)
        && matches!(data[tag.len()], b' ' | b'>')
}

/// UTF-8 without control bytes other than whitespace. A multi-byte sequence
/// cut off by the sniff window still counts as text.
fn is_text(head: &[u8], truncated: bool) -> bool {
    let text = match std::str::from_utf8(head) {
        Ok(text) => text,
        Err(e) if truncated && e.error_len().is_none() => {
            match std::str::from_utf8(&head[..e.valid_up_to()]) {
                Ok(text) => text,
                Err(_) => return false,
            }
        }
        Err(_) => return false,
    };
    !text
        .chars()
        .any(|c| c.is_control() && !matches!(c, '\t' | '\n' | '\r' | '\x0C'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_binary_signatures() {
        assert_eq!(sniff_content_type(b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR"), "image/png");
        assert_eq!(sniff_content_type(b"GIF89a\x01\x00"), "image/gif");
        assert_eq!(sniff_content_type(b"%PDF-1.7\n"), "application/pdf");
        assert_eq!(sniff_content_type(b"PK\x03\x04\x14\x00"), "application/zip");
        assert_eq!(sniff_content_type(b"RIFF\x24\x00\x00\x00WAVEfmt "), "audio/wave");
        assert_eq!(sniff_content_type(b"RIFF\x24\x00\x00\x00WEBPVP8 "), "image/webp");
    }

    #[test]
    fn recognizes_markup() {
        assert_eq!(sniff_content_type(b"  <!doctype html><p>hi"), HTML);
        assert_eq!(sniff_content_type(b"<html>\n<body>"), HTML);
        assert_eq!(sniff_content_type(b"<?xml version=\"1.0\"?>"), "text/xml; charset=utf-8");
        // `<abbr` is not `<a ` or `<a>`
        assert_eq!(sniff_content_type(b"<abbr>x</abbr>"), TEXT_PLAIN);
    }

    #[test]
    fn text_and_binary_fallbacks() {
        assert_eq!(sniff_content_type(b""), TEXT_PLAIN);
        assert_eq!(sniff_content_type(b"hunter2"), TEXT_PLAIN);
        assert_eq!(sniff_content_type("grüße\r\n\tok".as_bytes()), TEXT_PLAIN);
        assert_eq!(sniff_content_type(b"{\"a\": 1}"), TEXT_PLAIN);
        assert_eq!(sniff_content_type(b"abc\x00def"), OCTET_STREAM);
        assert_eq!(sniff_content_type(b"\xC3\x28"), OCTET_STREAM);
        assert_eq!(sniff_content_type(b"\x1b[31mred"), OCTET_STREAM);
    }

    #[test]
    fn multibyte_character_split_by_window_is_text() {
        let mut body = vec![b'a'; SNIFF_LEN - 1];
        body.extend_from_slice("é".as_bytes());
        assert_eq!(sniff_content_type(&body), TEXT_PLAIN);

        let mut short = vec![b'a'; 10];
        short.push(0xC3);
        assert_eq!(sniff_content_type(&short), OCTET_STREAM);
    }
}
