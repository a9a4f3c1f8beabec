//! Content sniffing for decrypted payloads.
//!
//! Decrypted bytes carry no filename or content type. [`classify`] looks at
//! leading magic bytes and returns the best-known MIME type together with a
//! file extension. The checks run in a fixed order and the first match wins.
//! Anything unrecognized falls back to a printable-text heuristic and then to
//! `application/octet-stream`.

/// Result of sniffing a byte buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Detected {
    /// MIME type, e.g. `image/png`.
    pub mime: &'static str,
    /// File extension without the dot, e.g. `png`.
    pub extension: &'static str,
}

impl Detected {
    const fn new(mime: &'static str, extension: &'static str) -> Self {
        Self { mime, extension }
    }

    /// Generic binary fallback.
    pub const BINARY: Self = Self::new("application/octet-stream", "bin");
    pub const PDF: Self = Self::new("application/pdf", "pdf");
    pub const PNG: Self = Self::new("image/png", "png");
    pub const JPEG: Self = Self::new("image/jpeg", "jpg");
    pub const GIF: Self = Self::new("image/gif", "gif");
    pub const WEBP: Self = Self::new("image/webp", "webp");
    /// Also covers docx/xlsx/pptx and other zip containers.
    pub const ZIP: Self = Self::new("application/zip", "zip");
    pub const TEXT: Self = Self::new("text/plain", "txt");

    /// Whether the type is an image a viewer can render inline.
    pub fn is_image(&self) -> bool {
        self.mime.starts_with("image/")
    }
}

const PDF_MAGIC: &[u8] = b"%PDF-";
const PNG_MAGIC: &[u8] = &[0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a];
const JPEG_MAGIC: &[u8] = &[0xff, 0xd8, 0xff];
const GIF87_MAGIC: &[u8] = b"GIF87a";
const GIF89_MAGIC: &[u8] = b"GIF89a";
const RIFF_MAGIC: &[u8] = b"RIFF";
const WEBP_TAG: &[u8] = b"WEBP";
const ZIP_MAGIC: &[u8] = &[0x50, 0x4b, 0x03, 0x04];

/// Number of leading bytes inspected by the text heuristic.
pub const TEXT_SAMPLE_LEN: usize = 64;

/// Classify a decrypted buffer by its leading bytes.
///
/// Total and deterministic: never panics, and buffers shorter than a
/// signature simply do not match it.
pub fn classify(bytes: &[u8]) -> Detected {
    if bytes.starts_with(PDF_MAGIC) {
        return Detected::PDF;
    }
    if bytes.starts_with(PNG_MAGIC) {
        return Detected::PNG;
    }
    if bytes.starts_with(JPEG_MAGIC) {
        return Detected::JPEG;
    }
    if bytes.starts_with(GIF87_MAGIC) || bytes.starts_with(GIF89_MAGIC) {
        return Detected::GIF;
    }
    if bytes.starts_with(RIFF_MAGIC) && bytes.get(8..12) == Some(WEBP_TAG) {
        return Detected::WEBP;
    }
    if bytes.starts_with(ZIP_MAGIC) {
        return Detected::ZIP;
    }
    if looks_like_text(bytes) {
        return Detected::TEXT;
    }
    Detected::BINARY
}

/// At least 90% of the sampled prefix is printable ASCII or tab/LF/CR.
fn looks_like_text(bytes: &[u8]) -> bool {
    let sample = &bytes[..bytes.len().min(TEXT_SAMPLE_LEN)];
    if sample.is_empty() {
        return false;
    }
    let printable = sample
        .iter()
        .filter(|&&b| matches!(b, 0x09 | 0x0a | 0x0d | 0x20..=0x7e))
        .count();
    printable * 10 >= sample.len() * 9
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_signatures() {
        assert_eq!(classify(b"%PDF-1.7\n..."), Detected::PDF);
        assert_eq!(
            classify(&[0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00]),
            Detected::PNG
        );
        assert_eq!(classify(&[0xff, 0xd8, 0xff, 0xe0]), Detected::JPEG);
        assert_eq!(classify(b"GIF87a\x01\x00"), Detected::GIF);
        assert_eq!(classify(b"GIF89a\x01\x00"), Detected::GIF);
        assert_eq!(classify(b"RIFF\x24\x00\x00\x00WEBPVP8 "), Detected::WEBP);
        assert_eq!(classify(&[0x50, 0x4b, 0x03, 0x04, 0x14, 0x00]), Detected::ZIP);
    }

    #[test]
    fn test_riff_without_webp_tag() {
        // WAVE audio shares the RIFF container; the trailing NULs keep it
        // below the text threshold.
        let wav = b"RIFF\x24\x00\x00\x00WAVEfmt \x00\x00\x00\x00";
        assert_eq!(classify(wav), Detected::BINARY);
    }

    #[test]
    fn test_truncated_signatures_do_not_match() {
        // 7 of the 8 PNG magic bytes
        assert_eq!(
            classify(&[0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a]),
            Detected::BINARY
        );
        assert_eq!(classify(&[0xff, 0xd8]), Detected::BINARY);
        // "%PDF" is printable, so the text heuristic claims it
        assert_eq!(classify(b"%PDF"), Detected::TEXT);
        assert_eq!(classify(b"RIFF\x00\x00\x00\x00WEB"), Detected::BINARY);
    }

    #[test]
    fn test_empty_is_binary() {
        assert_eq!(classify(&[]), Detected::BINARY);
    }

    #[test]
    fn test_text_threshold() {
        // 9 printable of 10: exactly 90%
        let mut at_threshold = b"abcdefghi".to_vec();
        at_threshold.push(0x00);
        assert_eq!(classify(&at_threshold), Detected::TEXT);

        // 8 printable of 10
        let mut below = b"abcdefgh".to_vec();
        below.extend_from_slice(&[0x00, 0x01]);
        assert_eq!(classify(&below), Detected::BINARY);

        assert_eq!(classify(b"line one\r\n\tline two\n"), Detected::TEXT);
    }

    #[test]
    fn test_text_sample_is_prefix_only() {
        let mut data = vec![b'a'; TEXT_SAMPLE_LEN];
        data.extend(std::iter::repeat(0u8).take(1024));
        assert_eq!(classify(&data), Detected::TEXT);
    }

    #[test]
    fn test_is_image() {
        assert!(Detected::PNG.is_image());
        assert!(Detected::WEBP.is_image());
        assert!(!Detected::PDF.is_image());
    }

    proptest! {
        #[test]
        fn classify_is_deterministic(data in prop::collection::vec(any::<u8>(), 0..256)) {
            prop_assert_eq!(classify(&data), classify(&data));
        }

        #[test]
        fn short_non_printable_is_binary(data in prop::collection::vec(0x80u8..=0xfe, 0..3)) {
            // No signature can match fewer than 3 bytes, and these bytes are
            // never printable.
            prop_assert_eq!(classify(&data), Detected::BINARY);
        }

        #[test]
        fn printable_ascii_is_text(s in "[ -~\t\r\n]{1,200}") {
            prop_assume!(
                !s.starts_with("%PDF-") && !s.starts_with("GIF8") && !s.starts_with("RIFF")
            );
            prop_assert_eq!(classify(s.as_bytes()), Detected::TEXT);
        }
    }
}
