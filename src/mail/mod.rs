//! Mail and calendar items: the normalized model, payload parsing and legacy requests.

pub mod ews;
pub mod model;
pub mod parser;

pub use model::{CalendarEvent, MailItem, Timestamp, NO_SUBJECT, UNKNOWN_SENDER};
pub use parser::{Parsed, PayloadFormat, parse_calendar_events, parse_mail_items};
