//! Response parser for structured JSON and legacy XML payloads.
//!
//! Parsing never fails outright. Missing fields take their defaults; a payload
//! that cannot be read at all yields no items plus a `malformed` reason that
//! callers may log.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde_json::Value;

use super::model::{CalendarEvent, MailItem, Timestamp, NO_SUBJECT, UNKNOWN_SENDER, or_default};

/// Upper bound on mail items read from one legacy document.
pub const MAX_LEGACY_MAIL_ITEMS: usize = 50;

/// Upper bound on calendar events read from one legacy document.
pub const MAX_LEGACY_EVENTS: usize = 20;

/// Source payload format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadFormat {
    /// JSON records from the structured data API.
    Structured,
    /// SOAP/XML document from the legacy protocol.
    LegacyXml,
}

/// Outcome of parsing one payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parsed<T> {
    pub items: Vec<T>,
    /// Set when the payload as a whole could not be read.
    pub malformed: Option<String>,
}

impl<T> Parsed<T> {
    fn ok(items: Vec<T>) -> Self {
        Self {
            items,
            malformed: None,
        }
    }

    fn malformed(reason: impl Into<String>) -> Self {
        Self {
            items: Vec::new(),
            malformed: Some(reason.into()),
        }
    }

    pub fn is_malformed(&self) -> bool {
        self.malformed.is_some()
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }
}

/// Parse mail items from a payload.
pub fn parse_mail_items(payload: &str, format: PayloadFormat) -> Parsed<MailItem> {
    match format {
        PayloadFormat::Structured => match structured_records(payload) {
            Ok(records) => Parsed::ok(records.iter().filter_map(mail_item_from_record).collect()),
            Err(reason) => Parsed::malformed(reason),
        },
        PayloadFormat::LegacyXml => {
            match collect_elements(payload, "Message", MAX_LEGACY_MAIL_ITEMS) {
                Ok(elements) => Parsed::ok(elements.iter().map(mail_item_from_element).collect()),
                Err(reason) => Parsed::malformed(reason),
            }
        }
    }
}

/// Parse calendar events from a payload.
pub fn parse_calendar_events(payload: &str, format: PayloadFormat) -> Parsed<CalendarEvent> {
    match format {
        PayloadFormat::Structured => match structured_records(payload) {
            Ok(records) => Parsed::ok(records.iter().filter_map(event_from_record).collect()),
            Err(reason) => Parsed::malformed(reason),
        },
        PayloadFormat::LegacyXml => {
            match collect_elements(payload, "CalendarItem", MAX_LEGACY_EVENTS) {
                Ok(elements) => Parsed::ok(elements.iter().map(event_from_element).collect()),
                Err(reason) => Parsed::malformed(reason),
            }
        }
    }
}

// ── Structured (JSON) ───────────────────────────────────────────────

/// Accepts a bare array of records or a REST envelope with a `value` array.
fn structured_records(payload: &str) -> Result<Vec<Value>, String> {
    let value: Value =
        serde_json::from_str(payload).map_err(|e| format!("invalid JSON: {e}"))?;
    match value {
        Value::Array(records) => Ok(records),
        Value::Object(mut map) => match map.remove("value").or_else(|| map.remove("Value")) {
            Some(Value::Array(records)) => Ok(records),
            _ => Err("expected a `value` array in response object".to_string()),
        },
        _ => Err("expected an array of records".to_string()),
    }
}

/// Look up a field by its camelCase name, falling back to PascalCase.
fn field<'a>(record: &'a Value, name: &str) -> Option<&'a Value> {
    record.get(name).or_else(|| {
        let mut chars = name.chars();
        let first = chars.next()?;
        let pascal: String = first.to_uppercase().chain(chars).collect();
        record.get(pascal.as_str())
    })
}

fn path<'a>(record: &'a Value, segments: &[&str]) -> Option<&'a Value> {
    segments
        .iter()
        .try_fold(record, |current, segment| field(current, segment))
}

fn text_at(record: &Value, segments: &[&str]) -> Option<String> {
    path(record, segments)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn first_text(record: &Value, candidates: &[&[&str]]) -> Option<String> {
    candidates.iter().find_map(|segments| text_at(record, segments))
}

/// Start/end values are either plain strings or `{ "dateTime": ... }` objects.
fn time_at(record: &Value, names: &[&str]) -> Timestamp {
    names
        .iter()
        .find_map(|name| {
            let value = field(record, name)?;
            match value {
                Value::String(s) => Some(s.clone()),
                Value::Object(_) => text_at(value, &["dateTime"]),
                _ => None,
            }
        })
        .map(|raw| Timestamp::parse(&raw))
        .unwrap_or_default()
}

/// Map one structured record to a mail item. Non-object records are skipped.
pub(crate) fn mail_item_from_record(record: &Value) -> Option<MailItem> {
    if !record.is_object() {
        return None;
    }

    let sender = first_text(
        record,
        &[
            &["sender", "emailAddress", "name"],
            &["sender", "emailAddress", "address"],
            &["from", "emailAddress", "name"],
            &["from", "emailAddress", "address"],
            &["sender"],
            &["from"],
        ],
    );

    let body = path(record, &["body", "content"])
        .or_else(|| field(record, "body"))
        .or_else(|| field(record, "content"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Some(MailItem {
        id: text_at(record, &["id"]).unwrap_or_default(),
        subject: or_default(first_text(record, &[&["subject"], &["title"]]), NO_SUBJECT),
        sender: or_default(sender, UNKNOWN_SENDER),
        body_text: body,
        received_at: time_at(
            record,
            &[
                "dateTimeReceived",
                "receivedDateTime",
                "dateReceived",
                "received_time",
                "received",
            ],
        ),
        is_read: field(record, "isRead")
            .and_then(Value::as_bool)
            .unwrap_or(false),
    })
}

/// Map one structured record to a calendar event. Non-object records are skipped.
pub(crate) fn event_from_record(record: &Value) -> Option<CalendarEvent> {
    if !record.is_object() {
        return None;
    }

    let organizer = first_text(
        record,
        &[
            &["organizer", "emailAddress", "name"],
            &["organizer", "emailAddress", "address"],
            &["organizer"],
        ],
    );

    let body = path(record, &["body", "content"])
        .or_else(|| field(record, "body"))
        .or_else(|| field(record, "description"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Some(CalendarEvent {
        id: text_at(record, &["id"]).unwrap_or_default(),
        subject: or_default(first_text(record, &[&["subject"], &["title"]]), NO_SUBJECT),
        start: time_at(record, &["start", "start_time"]),
        end: time_at(record, &["end", "end_time"]),
        organizer: or_default(organizer, UNKNOWN_SENDER),
        body_text: body,
    })
}

// ── Legacy (XML) ────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct XmlElement {
    /// Local name, namespace prefix removed.
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<XmlNode>,
}

#[derive(Debug)]
enum XmlNode {
    Element(XmlElement),
    Text(String),
}

impl XmlElement {
    fn open(start: &BytesStart<'_>) -> Result<Self, String> {
        let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| format!("bad attribute on <{name}>: {e}"))?;
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|e| format!("bad attribute value on <{name}>: {e}"))?
                .into_owned();
            attributes.push((key, value));
        }
        Ok(Self {
            name,
            attributes,
            children: Vec::new(),
        })
    }

    /// First descendant with the given local name, depth-first in document order.
    fn find(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find_map(|child| match child {
            XmlNode::Element(element) if element.name == name => Some(element),
            XmlNode::Element(element) => element.find(name),
            XmlNode::Text(_) => None,
        })
    }

    /// Concatenated text of all descendants.
    fn text(&self) -> String {
        let mut out = String::new();
        self.push_text(&mut out);
        out
    }

    fn push_text(&self, out: &mut String) {
        for child in &self.children {
            match child {
                XmlNode::Element(element) => element.push_text(out),
                XmlNode::Text(text) => out.push_str(text),
            }
        }
    }

    fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn child_text(&self, name: &str) -> Option<String> {
        self.find(name).map(XmlElement::text)
    }

    /// Display name of a mailbox-valued child (`Sender`, `Organizer`, ...).
    fn mailbox_name(&self, name: &str) -> Option<String> {
        let element = self.find(name)?;
        let text = element
            .child_text("Name")
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| element.text());
        Some(text)
    }
}

/// Collect up to `cap` elements with local name `item_name`, in document order.
///
/// Errors describe why the document as a whole could not be read.
fn collect_elements(payload: &str, item_name: &str, cap: usize) -> Result<Vec<XmlElement>, String> {
    let mut reader = Reader::from_str(payload);
    let mut items = Vec::new();
    let mut open: Vec<XmlElement> = Vec::new();
    let mut depth = 0usize;
    let mut saw_root = false;

    if cap == 0 {
        return Ok(items);
    }

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                depth += 1;
                saw_root = true;
                if !open.is_empty() || start.local_name().as_ref() == item_name.as_bytes() {
                    open.push(XmlElement::open(&start)?);
                }
            }
            Ok(Event::Empty(start)) => {
                saw_root = true;
                if let Some(parent) = open.last_mut() {
                    parent.children.push(XmlNode::Element(XmlElement::open(&start)?));
                } else if start.local_name().as_ref() == item_name.as_bytes() {
                    items.push(XmlElement::open(&start)?);
                    if items.len() >= cap {
                        return Ok(items);
                    }
                }
            }
            Ok(Event::End(_)) => {
                depth = depth.saturating_sub(1);
                if let Some(element) = open.pop() {
                    match open.last_mut() {
                        Some(parent) => parent.children.push(XmlNode::Element(element)),
                        None => {
                            items.push(element);
                            if items.len() >= cap {
                                return Ok(items);
                            }
                        }
                    }
                }
            }
            Ok(Event::Text(text)) => {
                if let Some(current) = open.last_mut() {
                    let text = text
                        .unescape()
                        .map_err(|e| format!("bad text content: {e}"))?;
                    current.children.push(XmlNode::Text(text.into_owned()));
                }
            }
            Ok(Event::CData(data)) => {
                if let Some(current) = open.last_mut() {
                    let text = String::from_utf8_lossy(&data.into_inner()).into_owned();
                    current.children.push(XmlNode::Text(text));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(format!(
                    "XML error at byte {}: {e}",
                    reader.buffer_position()
                ));
            }
            _ => {}
        }
    }

    if !saw_root {
        return Err("document has no root element".to_string());
    }
    if depth != 0 {
        return Err("document ended with unclosed elements".to_string());
    }
    Ok(items)
}

fn mail_item_from_element(element: &XmlElement) -> MailItem {
    let sender = element
        .mailbox_name("Sender")
        .or_else(|| element.mailbox_name("From"))
        .or_else(|| element.child_text("Name"));

    MailItem {
        id: item_id(element),
        subject: or_default(element.child_text("Subject"), NO_SUBJECT),
        sender: or_default(sender, UNKNOWN_SENDER),
        body_text: element
            .child_text("Body")
            .map(|b| b.trim().to_string())
            .unwrap_or_default(),
        received_at: element
            .child_text("DateTimeReceived")
            .map(|raw| Timestamp::parse(raw.trim()))
            .unwrap_or_default(),
        is_read: element
            .child_text("IsRead")
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("true")),
    }
}

fn event_from_element(element: &XmlElement) -> CalendarEvent {
    CalendarEvent {
        id: item_id(element),
        subject: or_default(element.child_text("Subject"), NO_SUBJECT),
        start: element
            .child_text("Start")
            .map(|raw| Timestamp::parse(raw.trim()))
            .unwrap_or_default(),
        end: element
            .child_text("End")
            .map(|raw| Timestamp::parse(raw.trim()))
            .unwrap_or_default(),
        organizer: or_default(element.mailbox_name("Organizer"), UNKNOWN_SENDER),
        body_text: element
            .child_text("Body")
            .map(|b| b.trim().to_string())
            .unwrap_or_default(),
    }
}

/// `ItemId` carries its value in the `Id` attribute.
fn item_id(element: &XmlElement) -> String {
    element
        .find("ItemId")
        .and_then(|id| id.attribute("Id"))
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(items: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
  <s:Body>
    <m:FindItemResponse xmlns:m="http://schemas.microsoft.com/exchange/services/2006/messages"
                        xmlns:t="http://schemas.microsoft.com/exchange/services/2006/types">
      <m:ResponseMessages>
        <m:FindItemResponseMessage ResponseClass="Success">
          <m:ResponseCode>NoError</m:ResponseCode>
          <m:RootFolder TotalItemsInView="1" IncludesLastItemInRange="true">
            <t:Items>{items}</t:Items>
          </m:RootFolder>
        </m:FindItemResponseMessage>
      </m:ResponseMessages>
    </m:FindItemResponse>
  </s:Body>
</s:Envelope>"#
        )
    }

    fn message(id: &str, subject: &str, sender: &str, read: bool) -> String {
        format!(
            r#"<t:Message>
  <t:ItemId Id="{id}" ChangeKey="ck"/>
  <t:Subject>{subject}</t:Subject>
  <t:Body BodyType="HTML">&lt;p&gt;Body of {subject}&lt;/p&gt;</t:Body>
  <t:DateTimeReceived>2026-03-01T09:30:00Z</t:DateTimeReceived>
  <t:Sender><t:Mailbox><t:Name>{sender}</t:Name><t:EmailAddress>x@example.com</t:EmailAddress></t:Mailbox></t:Sender>
  <t:IsRead>{read}</t:IsRead>
</t:Message>"#
        )
    }

    // ── Structured ──────────────────────────────────────────────

    #[test]
    fn structured_rest_envelope() {
        let payload = r#"{"value": [{
            "Id": "AAMk1",
            "Subject": "Budget review",
            "Sender": {"EmailAddress": {"Name": "Dana", "Address": "dana@example.com"}},
            "Body": {"ContentType": "HTML", "Content": "<p>Numbers</p>"},
            "DateTimeReceived": "2026-03-01T09:30:00Z",
            "IsRead": false
        }]}"#;
        let parsed = parse_mail_items(payload, PayloadFormat::Structured);
        assert!(!parsed.is_malformed());
        assert_eq!(parsed.items.len(), 1);
        let item = &parsed.items[0];
        assert_eq!(item.id, "AAMk1");
        assert_eq!(item.subject, "Budget review");
        assert_eq!(item.sender, "Dana");
        assert_eq!(item.body_text, "<p>Numbers</p>");
        assert!(item.received_at.as_datetime().is_some());
        assert!(!item.is_read);
    }

    #[test]
    fn structured_camel_case_sender_address_fallback() {
        let payload = r#"[{"subject": "Hi", "sender": {"emailAddress": {"address": "a@b.com"}}, "isRead": true}]"#;
        let items = parse_mail_items(payload, PayloadFormat::Structured).into_items();
        assert_eq!(items[0].sender, "a@b.com");
        assert!(items[0].is_read);
    }

    #[test]
    fn structured_missing_fields_take_defaults() {
        let items = parse_mail_items("[{}]", PayloadFormat::Structured).into_items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0], MailItem::default());
    }

    #[test]
    fn structured_wrong_types_take_defaults() {
        let payload = r#"[{"subject": 42, "sender": null, "body": {"content": 7}, "isRead": "yes"}]"#;
        let items = parse_mail_items(payload, PayloadFormat::Structured).into_items();
        assert_eq!(items[0].subject, NO_SUBJECT);
        assert_eq!(items[0].sender, UNKNOWN_SENDER);
        assert_eq!(items[0].body_text, "");
        assert!(!items[0].is_read);
    }

    #[test]
    fn structured_blank_subject_takes_default() {
        let items =
            parse_mail_items(r#"[{"subject": "   "}]"#, PayloadFormat::Structured).into_items();
        assert_eq!(items[0].subject, NO_SUBJECT);
    }

    #[test]
    fn structured_skips_non_object_records() {
        let items =
            parse_mail_items(r#"[1, "x", {"subject": "kept"}]"#, PayloadFormat::Structured)
                .into_items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].subject, "kept");
    }

    #[test]
    fn structured_invalid_json_is_malformed_not_fatal() {
        let parsed = parse_mail_items("{not json", PayloadFormat::Structured);
        assert!(parsed.items.is_empty());
        assert!(parsed.malformed.unwrap().contains("invalid JSON"));
    }

    #[test]
    fn structured_events_with_datetime_objects() {
        let payload = r#"{"value": [{
            "Subject": "Standup",
            "Start": {"DateTime": "2026-03-02T08:00:00.0000000", "TimeZone": "UTC"},
            "End": {"DateTime": "2026-03-02T08:15:00.0000000", "TimeZone": "UTC"},
            "Organizer": {"EmailAddress": {"Name": "Noa"}}
        }]}"#;
        let events = parse_calendar_events(payload, PayloadFormat::Structured).into_items();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].subject, "Standup");
        assert_eq!(events[0].organizer, "Noa");
        assert!(events[0].start.as_datetime().is_some());
        assert!(events[0].end.as_datetime().is_some());
        assert_eq!(events[0].body_text, "");
    }

    // ── Legacy XML ──────────────────────────────────────────────

    #[test]
    fn legacy_parses_messages_in_order() {
        let xml = envelope(&format!(
            "{}{}",
            message("id-1", "First", "Avi", false),
            message("id-2", "Second", "Dana", true)
        ));
        let parsed = parse_mail_items(&xml, PayloadFormat::LegacyXml);
        assert!(!parsed.is_malformed());
        assert_eq!(parsed.items.len(), 2);

        let first = &parsed.items[0];
        assert_eq!(first.id, "id-1");
        assert_eq!(first.subject, "First");
        assert_eq!(first.sender, "Avi");
        assert_eq!(first.body_text, "<p>Body of First</p>");
        assert!(first.received_at.as_datetime().is_some());
        assert!(!first.is_read);

        assert_eq!(parsed.items[1].subject, "Second");
        assert!(parsed.items[1].is_read);
    }

    #[test]
    fn legacy_missing_sub_elements_take_defaults() {
        let xml = envelope("<t:Message></t:Message><t:Message/>");
        let items = parse_mail_items(&xml, PayloadFormat::LegacyXml).into_items();
        assert_eq!(items.len(), 2);
        for item in items {
            assert_eq!(item.id, "");
            assert_eq!(item.subject, NO_SUBJECT);
            assert_eq!(item.sender, UNKNOWN_SENDER);
            assert_eq!(item.body_text, "");
            assert!(item.received_at.is_empty());
            assert!(!item.is_read);
        }
    }

    #[test]
    fn legacy_zero_items_is_empty_not_error() {
        let parsed = parse_mail_items(&envelope(""), PayloadFormat::LegacyXml);
        assert!(parsed.items.is_empty());
        assert!(!parsed.is_malformed());
    }

    #[test]
    fn legacy_caps_mail_at_fifty_in_document_order() {
        let items: String = (0..100)
            .map(|i| message(&format!("id-{i}"), &format!("Subject {i}"), "Avi", false))
            .collect();
        let parsed = parse_mail_items(&envelope(&items), PayloadFormat::LegacyXml);
        assert_eq!(parsed.items.len(), MAX_LEGACY_MAIL_ITEMS);
        for (i, item) in parsed.items.iter().enumerate() {
            assert_eq!(item.subject, format!("Subject {i}"));
        }
    }

    #[test]
    fn legacy_caps_events_at_twenty() {
        let items: String = (0..30)
            .map(|i| format!("<t:CalendarItem><t:Subject>Event {i}</t:Subject></t:CalendarItem>"))
            .collect();
        let events = parse_calendar_events(&envelope(&items), PayloadFormat::LegacyXml).into_items();
        assert_eq!(events.len(), MAX_LEGACY_EVENTS);
        assert_eq!(events[19].subject, "Event 19");
    }

    #[test]
    fn legacy_event_fields() {
        let xml = envelope(
            r#"<t:CalendarItem>
                 <t:ItemId Id="ev-1"/>
                 <t:Subject>Planning</t:Subject>
                 <t:Start>2026-03-02T08:00:00Z</t:Start>
                 <t:End>2026-03-02T09:00:00Z</t:End>
                 <t:Organizer><t:Mailbox><t:Name>Noa</t:Name></t:Mailbox></t:Organizer>
               </t:CalendarItem>"#,
        );
        let events = parse_calendar_events(&xml, PayloadFormat::LegacyXml).into_items();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, "ev-1");
        assert_eq!(events[0].subject, "Planning");
        assert_eq!(events[0].organizer, "Noa");
        assert!(events[0].start.as_datetime().is_some());
        assert!(events[0].end.as_datetime().is_some());
    }

    #[test]
    fn legacy_sender_falls_back_to_from() {
        let xml = envelope(
            "<t:Message><t:From><t:Mailbox><t:Name>Ruth</t:Name></t:Mailbox></t:From></t:Message>",
        );
        let items = parse_mail_items(&xml, PayloadFormat::LegacyXml).into_items();
        assert_eq!(items[0].sender, "Ruth");
    }

    #[test]
    fn legacy_cdata_body() {
        let xml = envelope("<t:Message><t:Body><![CDATA[<b>bold</b>]]></t:Body></t:Message>");
        let items = parse_mail_items(&xml, PayloadFormat::LegacyXml).into_items();
        assert_eq!(items[0].body_text, "<b>bold</b>");
    }

    #[test]
    fn legacy_non_xml_is_malformed() {
        let parsed = parse_mail_items("Service Unavailable", PayloadFormat::LegacyXml);
        assert!(parsed.items.is_empty());
        assert!(parsed.is_malformed());
    }

    #[test]
    fn legacy_mismatched_tags_are_malformed() {
        let parsed = parse_mail_items(
            "<Envelope><t:Message><t:Subject>x</t:Body></t:Message></Envelope>",
            PayloadFormat::LegacyXml,
        );
        assert!(parsed.items.is_empty());
        assert!(parsed.is_malformed());
    }

    #[test]
    fn legacy_truncated_document_is_malformed() {
        let parsed = parse_mail_items(
            "<Envelope><t:Message><t:Subject>x</t:Subject></t:Message>",
            PayloadFormat::LegacyXml,
        );
        assert!(parsed.items.is_empty());
        assert!(parsed.is_malformed());
    }
}
