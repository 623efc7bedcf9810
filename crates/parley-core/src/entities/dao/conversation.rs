use chrono::{DateTime, Utc};

use crate::locale::Locale;

/// Maximum number of characters kept when deriving a title from a message.
pub const TITLE_MAX_CHARS: usize = 50;

/// Appended to a derived title that was cut short.
pub const TITLE_ELLIPSIS: &str = "...";

/// A row in the `conversations` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub id: String,
    /// Opaque, unauthenticated client session key used to partition listings.
    pub session_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Title for a conversation started by `message`.
///
/// The first [`TITLE_MAX_CHARS`] characters, followed by [`TITLE_ELLIPSIS`]
/// only when something was cut.  Whitespace is kept as sent; only an empty
/// message falls back to the localized placeholder.
pub fn derive_title(message: &str, locale: Locale) -> String {
    if message.is_empty() {
        return locale.default_title().to_owned();
    }
    match message.char_indices().nth(TITLE_MAX_CHARS) {
        Some((cut, _)) => format!("{}{TITLE_ELLIPSIS}", &message[..cut]),
        None => message.to_owned(),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn short_message_is_used_verbatim() {
        assert_eq!(derive_title("Hello", Locale::En), "Hello");
    }

    #[test]
    fn exactly_fifty_chars_has_no_ellipsis() {
        let msg = "a".repeat(50);
        assert_eq!(derive_title(&msg, Locale::En), msg);
    }

    #[test]
    fn long_message_is_cut_at_fifty_chars() {
        let msg = "b".repeat(51);
        let title = derive_title(&msg, Locale::En);
        assert_eq!(title, format!("{}...", "b".repeat(50)));
    }

    #[test]
    fn multibyte_message_is_cut_on_char_boundary() {
        let msg = "会".repeat(60);
        let title = derive_title(&msg, Locale::Ja);
        assert_eq!(title.chars().count(), 53);
        assert!(title.starts_with(&"会".repeat(50)));
        assert!(title.ends_with("..."));
    }

    #[test]
    fn whitespace_message_is_used_verbatim() {
        assert_eq!(derive_title("   ", Locale::En), "   ");
        assert_eq!(derive_title(" \n", Locale::Ja), " \n");
    }

    #[test]
    fn empty_message_gets_placeholder() {
        assert_eq!(derive_title("", Locale::En), "New conversation");
        assert_eq!(derive_title("", Locale::Ja), "新しい会話");
    }
}
