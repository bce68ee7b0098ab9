use std::sync::OnceLock;

use regex::Regex;

struct Tokenizer13a {
    punctuation: Regex,
    period_comma_after: Regex,
    period_comma_before: Regex,
    dash_after_digit: Regex,
}

fn tokenizer_13a() -> &'static Tokenizer13a {
    static TOKENIZER: OnceLock<Tokenizer13a> = OnceLock::new();
    TOKENIZER.get_or_init(|| Tokenizer13a {
        punctuation: Regex::new(r"([\x7B-\x7E\x5B-\x60\x20-\x26\x28-\x2B\x3A-\x40/])")
            .expect("static punctuation pattern"),
        period_comma_after: Regex::new(r"([^0-9])([.,])").expect("static pattern"),
        period_comma_before: Regex::new(r"([.,])([^0-9])").expect("static pattern"),
        dash_after_digit: Regex::new(r"([0-9])(-)").expect("static pattern"),
    })
}

/// Tokenizer used by corpus BLEU: splits punctuation off words, keeps decimals intact.
pub fn tokenize_13a(line: &str) -> Vec<String> {
    let tokenizer = tokenizer_13a();

    let mut text = line
        .replace("<skipped>", "")
        .replace("-\n", "")
        .replace('\n', " ");
    if text.contains('&') {
        text = text
            .replace("&quot;", "\"")
            .replace("&amp;", "&")
            .replace("&lt;", "<")
            .replace("&gt;", ">");
    }

    let text = format!(" {text} ");
    let text = tokenizer.punctuation.replace_all(&text, " ${1} ");
    let text = tokenizer.period_comma_after.replace_all(&text, "${1} ${2} ");
    let text = tokenizer.period_comma_before.replace_all(&text, " ${1} ${2}");
    let text = tokenizer.dash_after_digit.replace_all(&text, "${1} ${2} ");

    text.split_whitespace().map(ToOwned::to_owned).collect()
}

fn non_alphanumeric() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[^a-z0-9]+").expect("static pattern"))
}

/// Tokenizer used by ROUGE: lowercase ASCII alphanumerics only, no stemming.
pub fn tokenize_rouge(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    non_alphanumeric()
        .replace_all(&lowered, " ")
        .split_whitespace()
        .map(ToOwned::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_13a_splits_punctuation() {
        assert_eq!(
            tokenize_13a("Hello, world! (test)"),
            vec!["Hello", ",", "world", "!", "(", "test", ")"]
        );
    }

    #[test]
    fn tokenize_13a_keeps_decimal_numbers() {
        assert_eq!(tokenize_13a("pi is 3.14."), vec!["pi", "is", "3.14", "."]);
        assert_eq!(tokenize_13a("1,000 cats"), vec!["1,000", "cats"]);
    }

    #[test]
    fn tokenize_13a_unescapes_entities() {
        assert_eq!(tokenize_13a("a &amp; b"), vec!["a", "&", "b"]);
    }

    #[test]
    fn tokenize_rouge_lowercases_and_drops_symbols() {
        assert_eq!(
            tokenize_rouge("The Cat-sat, on THE mat!"),
            vec!["the", "cat", "sat", "on", "the", "mat"]
        );
        assert!(tokenize_rouge("!!! ---").is_empty());
    }
}
