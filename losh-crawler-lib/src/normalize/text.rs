use scraper::{Html, Node};

const DEFAULT_LANGUAGE: &str = "en";

/// Reduce rich text to plain text.
///
/// Every tag is dropped, the contents of `script` and `style` elements
/// included, and entities are decoded. The result is trimmed.
#[must_use]
pub fn strip_html(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut text = String::with_capacity(html.len());

    for node in fragment.tree.root().descendants() {
        let Node::Text(chunk) = node.value() else {
            continue;
        };

        let hidden = node
            .ancestors()
            .any(|ancestor| ancestor.value().as_element().is_some_and(|e| matches!(e.name(), "script" | "style")));
        if !hidden {
            text.push_str(chunk);
        }
    }

    text.trim().to_owned()
}

/// Guess the ISO 639-1 code of the language a text is written in.
///
/// Falls back to English when the text is empty or the language cannot be told.
#[must_use]
pub fn detect_language(text: &str) -> String {
    if text.trim().is_empty() {
        return DEFAULT_LANGUAGE.to_owned();
    }

    whatlang::detect_lang(text)
        .and_then(|lang| iso_639_1(lang.code()))
        .unwrap_or(DEFAULT_LANGUAGE)
        .to_owned()
}

/// Two-letter codes of the languages the detector knows, keyed by their three-letter code.
fn iso_639_1(iso_639_3: &str) -> Option<&'static str> {
    let code = match iso_639_3 {
        "afr" => "af",
        "aka" => "ak",
        "amh" => "am",
        "ara" => "ar",
        "aze" => "az",
        "bel" => "be",
        "ben" => "bn",
        "bul" => "bg",
        "cat" => "ca",
        "ces" => "cs",
        "cmn" => "zh",
        "dan" => "da",
        "deu" => "de",
        "ell" => "el",
        "eng" => "en",
        "epo" => "eo",
        "est" => "et",
        "fin" => "fi",
        "fra" => "fr",
        "guj" => "gu",
        "heb" => "he",
        "hin" => "hi",
        "hrv" => "hr",
        "hun" => "hu",
        "hye" => "hy",
        "ind" => "id",
        "ita" => "it",
        "jav" => "jv",
        "jpn" => "ja",
        "kan" => "kn",
        "kat" => "ka",
        "khm" => "km",
        "kor" => "ko",
        "lat" => "la",
        "lav" => "lv",
        "lit" => "lt",
        "mal" => "ml",
        "mar" => "mr",
        "mkd" => "mk",
        "mya" => "my",
        "nep" => "ne",
        "nld" => "nl",
        "nob" => "nb",
        "ori" => "or",
        "pan" => "pa",
        "pes" => "fa",
        "pol" => "pl",
        "por" => "pt",
        "ron" => "ro",
        "rus" => "ru",
        "sin" => "si",
        "slk" => "sk",
        "slv" => "sl",
        "sna" => "sn",
        "spa" => "es",
        "srp" => "sr",
        "swe" => "sv",
        "tam" => "ta",
        "tel" => "te",
        "tgl" => "tl",
        "tha" => "th",
        "tuk" => "tk",
        "tur" => "tr",
        "ukr" => "uk",
        "urd" => "ur",
        "uzb" => "uz",
        "vie" => "vi",
        "yid" => "yi",
        "zul" => "zu",
        _ => return None,
    };
    Some(code)
}
