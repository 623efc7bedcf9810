//! User-facing text.
//!
//! Everything a client may display verbatim goes through [`Locale`] so the
//! server, the relay and the terminal client agree on wording.  Internal error
//! detail never appears here.

use strum::{Display, EnumString};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Locale {
    #[default]
    En,
    Ja,
}

impl Locale {
    /// Placeholder title for a conversation with nothing to derive one from.
    pub fn default_title(self) -> &'static str {
        match self {
            Locale::En => "New conversation",
            Locale::Ja => "新しい会話",
        }
    }

    pub fn message_and_session_required(self) -> &'static str {
        match self {
            Locale::En => "message and sessionId are required",
            Locale::Ja => "message と sessionId は必須です",
        }
    }

    pub fn session_required(self) -> &'static str {
        match self {
            Locale::En => "sessionId is required",
            Locale::Ja => "sessionId は必須です",
        }
    }

    pub fn title_required(self) -> &'static str {
        match self {
            Locale::En => "title is required",
            Locale::Ja => "title は必須です",
        }
    }

    pub fn conversation_not_found(self) -> &'static str {
        match self {
            Locale::En => "conversation not found",
            Locale::Ja => "会話が見つかりません",
        }
    }

    pub fn invalid_body(self) -> &'static str {
        match self {
            Locale::En => "request body is not valid JSON",
            Locale::Ja => "リクエスト本文が不正な JSON です",
        }
    }

    /// Sent in the in-stream `error` frame.
    pub fn stream_failed(self) -> &'static str {
        match self {
            Locale::En => "an error occurred while streaming the response",
            Locale::Ja => "ストリーミング中にエラーが発生しました",
        }
    }

    /// Body of every 500 response.
    pub fn server_error(self) -> &'static str {
        match self {
            Locale::En => "internal server error",
            Locale::Ja => "サーバーエラーが発生しました",
        }
    }

    /// Shown by a client in place of the assistant turn that failed.
    pub fn retry_notice(self) -> &'static str {
        match self {
            Locale::En => "Something went wrong. Please try again.",
            Locale::Ja => "エラーが発生しました。もう一度お試しください。",
        }
    }
}
