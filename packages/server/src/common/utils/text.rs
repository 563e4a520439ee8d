use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Separator characters users insert to dodge word lists, ASCII and full-width.
    static ref NOISE_REGEX: Regex =
        Regex::new(r"[.。,，!！?？;；:：\-_+*#@&%$]").unwrap();

    static ref WHITESPACE_REGEX: Regex = Regex::new(r"\s+").unwrap();
}

/// Normalize text before rule evaluation
///
/// Normalization rules:
/// - Convert to lowercase
/// - Remove separator punctuation (`. , ! ? ; : - _ + * # @ & % $` and full-width forms)
/// - Collapse whitespace runs into single spaces
/// - Trim leading/trailing whitespace
///
/// Punctuation is removed before whitespace is collapsed so that the result
/// is a fixed point: normalizing normalized text returns it unchanged.
pub fn normalize_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let lowered = text.to_lowercase();
    let stripped = NOISE_REGEX.replace_all(&lowered, "");
    let collapsed = WHITESPACE_REGEX.replace_all(&stripped, " ");

    collapsed.trim().to_string()
}

/// Reduce text to word characters and CJK ideographs only.
///
/// Used by fuzzy matching so "广 告" and "广-告" compare equal to "广告".
pub fn fuzzy_key(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || is_cjk_ideograph(*c))
        .collect()
}

fn is_cjk_ideograph(c: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&c)
}

/// True when the text has no visible content.
pub fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercases_and_collapses_whitespace() {
        assert_eq!(normalize_text("  Hello   WORLD\t\n"), "hello world");
    }

    #[test]
    fn test_strips_ascii_and_fullwidth_punctuation() {
        assert_eq!(normalize_text("加-群！快来，QQ@123"), "加群快来qq123");
    }

    #[test]
    fn test_punctuation_between_spaces_does_not_leave_double_space() {
        assert_eq!(normalize_text("a - b"), "a b");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let samples = [
            "垃圾 分类, 很重要!",
            "Buy   NOW -- limited * offer",
            "a - b . c",
            "   ",
            "广 告",
        ];
        for sample in samples {
            let once = normalize_text(sample);
            assert_eq!(normalize_text(&once), once, "not a fixed point: {sample:?}");
        }
    }

    #[test]
    fn test_fuzzy_key_drops_separators() {
        assert_eq!(fuzzy_key("广 告"), "广告");
        assert_eq!(fuzzy_key("广-告"), "广告");
        assert_eq!(fuzzy_key("广/告~"), "广告");
    }

    #[test]
    fn test_is_blank() {
        assert!(is_blank(""));
        assert!(is_blank(" \t\n"));
        assert!(!is_blank(" x "));
    }
}
