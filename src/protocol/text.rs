use once_cell::sync::Lazy;
use quick_xml::escape::{resolve_html5_entity, unescape_with};
use regex::{Captures, Regex};

static EMOJI_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<span class="emoji emoji([0-9a-fA-F]+)"></span>"#).expect("emoji regex")
});
static ENTITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(#?[0-9A-Za-z]+);").expect("entity regex"));

/// Longest hex run naming one code point; longer runs are flag pairs.
const EMOJI_CHUNK: usize = 5;

/// Replace `<span class="emoji emojiXXXX"></span>` with the code point(s).
/// Spans whose hex does not name a valid char are left untouched.
pub fn format_emoji(content: &str) -> String {
    if !content.contains("emoji") {
        return content.to_string();
    }
    EMOJI_RE
        .replace_all(content, |caps: &Captures| {
            decode_emoji_hex(&caps[1]).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn decode_emoji_hex(hex: &str) -> Option<String> {
    let chunks: Vec<&str> = if hex.len() > EMOJI_CHUNK {
        hex.as_bytes()
            .chunks(EMOJI_CHUNK)
            .map(|c| std::str::from_utf8(c).unwrap_or_default())
            .collect()
    } else {
        vec![hex]
    };
    chunks
        .into_iter()
        .map(|chunk| u32::from_str_radix(chunk, 16).ok().and_then(char::from_u32))
        .collect()
}

/// Unescape HTML entities (`&amp;`, `&lt;`, `&#39;`, `&nbsp;`...). Unknown
/// entities stay as written.
pub fn unescape_html(content: &str) -> String {
    if !content.contains('&') {
        return content.to_string();
    }
    ENTITY_RE
        .replace_all(content, |caps: &Captures| {
            let whole = &caps[0];
            match unescape_with(whole, resolve_html5_entity) {
                Ok(text) => text.into_owned(),
                Err(_) => whole.to_string(),
            }
        })
        .into_owned()
}

/// Line breaks, entities, then emoji spans.
pub fn normalize_content(content: &str) -> String {
    let content = content.replace("<br/>", "\n");
    let content = unescape_html(&content);
    format_emoji(&content)
}
