//! Normalized item model.
//!
//! Every field is always defined: absent source fields map to the defaults
//! below, so rendering and enrichment never deal with missing values.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Subject used when the source has none ("no subject").
pub const NO_SUBJECT: &str = "ללא נושא";

/// Sender used when the source has none ("unknown sender").
pub const UNKNOWN_SENDER: &str = "שולח לא ידוע";

/// A point in time as reported by the source.
///
/// Values that fail to parse are kept verbatim rather than dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Timestamp {
    Parsed(DateTime<Utc>),
    Raw(String),
}

impl Timestamp {
    /// Parse a source timestamp.
    ///
    /// Accepts RFC 3339 and offset-less `YYYY-MM-DDTHH:MM:SS[.fff]` (read as UTC).
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
            return Self::Parsed(dt.with_timezone(&Utc));
        }
        for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
                return Self::Parsed(naive.and_utc());
            }
        }
        Self::Raw(raw.to_string())
    }

    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Parsed(dt) => Some(*dt),
            Self::Raw(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Raw(s) if s.is_empty())
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::Raw(String::new())
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parsed(dt) => write!(f, "{}", dt.to_rfc3339()),
            Self::Raw(s) => write!(f, "{s}"),
        }
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.map(|s| Self::parse(&s)).unwrap_or_default())
    }
}

/// A mail message, decoupled from any source wire format.
///
/// Serializes in the shape the assistant service expects
/// (`subject`, `sender`, `body`, `dateReceived`, `isRead`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailItem {
    /// Source-channel-local id. May be empty.
    #[serde(default)]
    pub id: String,
    pub subject: String,
    pub sender: String,
    /// Body text; may contain markup.
    #[serde(rename = "body", default)]
    pub body_text: String,
    #[serde(rename = "dateReceived", default)]
    pub received_at: Timestamp,
    #[serde(default)]
    pub is_read: bool,
}

impl Default for MailItem {
    fn default() -> Self {
        Self {
            id: String::new(),
            subject: NO_SUBJECT.to_string(),
            sender: UNKNOWN_SENDER.to_string(),
            body_text: String::new(),
            received_at: Timestamp::default(),
            is_read: false,
        }
    }
}

impl MailItem {
    /// Markup-free body excerpt of at most `max_chars` characters.
    pub fn preview(&self, max_chars: usize) -> String {
        let text = strip_html(&self.body_text);
        if text.chars().count() <= max_chars {
            return text;
        }
        let mut cut: String = text.chars().take(max_chars).collect();
        cut.push('…');
        cut
    }
}

/// A calendar event, decoupled from any source wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    #[serde(default)]
    pub id: String,
    pub subject: String,
    #[serde(default)]
    pub start: Timestamp,
    #[serde(default)]
    pub end: Timestamp,
    pub organizer: String,
    #[serde(rename = "body", default)]
    pub body_text: String,
}

impl Default for CalendarEvent {
    fn default() -> Self {
        Self {
            id: String::new(),
            subject: NO_SUBJECT.to_string(),
            start: Timestamp::default(),
            end: Timestamp::default(),
            organizer: UNKNOWN_SENDER.to_string(),
            body_text: String::new(),
        }
    }
}

/// Use `value` unless it is blank, otherwise `default`.
pub(crate) fn or_default(value: Option<String>, default: &str) -> String {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Strip HTML tags and collapse whitespace.
pub fn strip_html(html: &str) -> String {
    let mut result = String::new();
    let mut tag: Option<String> = None;
    for ch in html.chars() {
        if let Some(name) = tag.as_mut() {
            if ch == '>' {
                if is_block_tag(name) {
                    result.push(' ');
                }
                tag = None;
            } else {
                name.push(ch);
            }
        } else if ch == '<' {
            tag = Some(String::new());
        } else {
            result.push(ch);
        }
    }
    result.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Tags that separate words when rendered. Inline tags such as `<b>` do not.
fn is_block_tag(tag: &str) -> bool {
    const BLOCK: &[&str] = &[
        "p", "br", "div", "li", "ul", "ol", "tr", "td", "th", "table", "h1", "h2", "h3", "h4",
        "h5", "h6", "hr", "blockquote",
    ];
    let name: String = tag
        .trim_start_matches('/')
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();
    BLOCK.contains(&name.as_str())
}

/// Subject for a reply: prefixes `Re: ` unless already present.
pub fn reply_subject(subject: &str) -> String {
    let trimmed = subject.trim();
    if trimmed
        .get(..3)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("re:"))
    {
        trimmed.to_string()
    } else {
        format!("Re: {trimmed}")
    }
}
