//! Outbound message formatting helpers.
//!
//! Replies go out as plain text: rich markup is unreliable under the
//! plain-text fallback used here, so any markup an agent produced is
//! stripped before sending.

use teloxide::types::{ButtonRequest, KeyboardButton, KeyboardMarkup};

/// Strip markdown and HTML markup, leaving plain text.
pub fn strip_markup(text: &str) -> String {
    // Markdown links first: keep the label, drop the target.
    let links = regex::Regex::new(r"\[([^\]]*)\]\([^)]*\)");
    let text = match links {
        Ok(re) => re.replace_all(text, "$1").into_owned(),
        Err(_) => text.to_owned(),
    };

    // HTML tags.
    let tags = regex::Regex::new(r"</?[a-zA-Z][^>]*>");
    let text = match tags {
        Ok(re) => re.replace_all(&text, "").into_owned(),
        Err(_) => text,
    };

    // Inline markdown emphasis characters.
    text.chars().filter(|c| !matches!(c, '*' | '`' | '~')).collect()
}

/// Reply keyboard with a single contact-request button.
pub fn contact_keyboard() -> KeyboardMarkup {
    let button = KeyboardButton::new("📱 Share my contact").request(ButtonRequest::Contact);
    let mut markup = KeyboardMarkup::new(vec![vec![button]]);
    markup.one_time_keyboard = true;
    markup.resize_keyboard = true;
    markup
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_markdown_emphasis() {
        assert_eq!(strip_markup("*bold* and `code`"), "bold and code");
    }

    #[test]
    fn test_strip_links_keeps_label() {
        assert_eq!(
            strip_markup("see [the docs](https://example.com) now"),
            "see the docs now"
        );
    }

    #[test]
    fn test_strip_html_tags() {
        assert_eq!(strip_markup("<b>hi</b> <i>there</i>"), "hi there");
    }

    #[test]
    fn test_plain_text_untouched() {
        let text = "⚽ Active Players (2)\n• John Smith (JS1, midfielder)";
        assert_eq!(strip_markup(text), text);
    }
}
