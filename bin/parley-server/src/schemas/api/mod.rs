pub mod chat;
pub mod conversation;

use chrono::{DateTime, SecondsFormat, Utc};

/// Millisecond RFC 3339, the shape browsers produce for `Date` JSON.
pub(crate) fn timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}
