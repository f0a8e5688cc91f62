use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Fold a license identifier or name into its lookup key.
///
/// The key is lower-cased, canonically decomposed and stripped of combining
/// marks and whitespace, so `"MIT "`, `"mit"` and `"M I T"` share a key and
/// accented names match their unaccented spelling. Folding a key again yields
/// the same key.
#[must_use]
pub fn normalize_name(s: &str) -> String {
    s.to_lowercase()
        .nfd()
        .filter(|&c| !is_combining_mark(c) && !c.is_whitespace())
        .collect()
}
