//! Robot-check detection.
//!
//! The index substitutes an interstitial page when it suspects automated
//! traffic. Those pages share a few fixed phrases.

/// Phrases that only appear on interstitial/CAPTCHA pages.
pub const BLOCK_PHRASES: &[&str] = &["unusual traffic from your computer network", "not a robot"];

/// Returns true when the page looks like a robot check.
///
/// Bytes are decoded lossily so malformed encodings never fail detection.
pub fn is_blocked(page: &[u8]) -> bool {
    let text = String::from_utf8_lossy(page);
    BLOCK_PHRASES.iter().any(|phrase| text.contains(phrase))
}
