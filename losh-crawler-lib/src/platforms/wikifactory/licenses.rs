/// Wikifactory license abbreviations and the SPDX ids they stand for.
const LICENSE_MAPPING: &[(&str, &str)] = &[
    ("CC-BY-4.0", "CC-BY-4.0"),
    ("CC0-1.0", "CC0-1.0"),
    ("MIT", "MIT"),
    ("BSD-2-Clause", "BSD-2-Clause"),
    ("CC-BY-SA-4.0", "CC-BY-SA-4.0"),
    ("GPL-3.0", "GPL-3.0-only"),
    ("OHL", "TAPR-OHL-1.0"),
    ("CERN OHL", "CERN-OHL-1.2"),
];

/// Translate a Wikifactory license abbreviation into an SPDX id.
///
/// The lookup ignores case and surrounding whitespace. Unknown abbreviations
/// are returned trimmed but otherwise unchanged.
#[must_use]
pub fn translate_license(abbreviation: &str) -> String {
    let abbreviation = abbreviation.trim();
    LICENSE_MAPPING
        .iter()
        .find(|(wf, _)| wf.eq_ignore_ascii_case(abbreviation))
        .map_or(abbreviation, |&(_, spdx)| spdx)
        .to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapped_abbreviations() {
        assert_eq!(translate_license("GPL-3.0"), "GPL-3.0-only");
        assert_eq!(translate_license(" cern ohl "), "CERN-OHL-1.2");
        assert_eq!(translate_license("ohl"), "TAPR-OHL-1.0");
        assert_eq!(translate_license("bsd-2-clause"), "BSD-2-Clause");
    }

    #[test]
    fn unknown_abbreviations_pass_through() {
        assert_eq!(translate_license(" Apache-2.0 "), "Apache-2.0");
        assert_eq!(translate_license(""), "");
    }

    #[test]
    fn translation_is_idempotent() {
        for (wf, _) in LICENSE_MAPPING {
            let once = translate_license(wf);
            assert_eq!(translate_license(&once), once);
        }
    }
}
