use regex::Regex;
use std::sync::OnceLock;

fn tag_regex() -> &'static Regex {
    static TAGS: OnceLock<Regex> = OnceLock::new();
    TAGS.get_or_init(|| Regex::new(r"(?s)<[^>]*>").expect("Invalid regex pattern"))
}

/// Strip markup and keep the first `max_words` words, appending `…` when cut.
pub fn trim_words(text: &str, max_words: usize) -> String {
    let plain = tag_regex().replace_all(text, " ");
    let words: Vec<&str> = plain.split_whitespace().collect();
    if words.len() <= max_words {
        return words.join(" ");
    }
    let mut out = words[..max_words].join(" ");
    out.push('…');
    out
}
