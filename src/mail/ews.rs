//! Legacy protocol (EWS) request builders.
//!
//! Only the FindItem shapes this crate consumes are built here.

use crate::host::Folder;

const ENVELOPE_OPEN: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<soap:Envelope xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
               xmlns:m="http://schemas.microsoft.com/exchange/services/2006/messages"
               xmlns:t="http://schemas.microsoft.com/exchange/services/2006/types"
               xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
  <soap:Header>
    <t:RequestServerVersion Version="Exchange2013" />
  </soap:Header>
  <soap:Body>"#;

const ENVELOPE_CLOSE: &str = r#"
  </soap:Body>
</soap:Envelope>"#;

/// Item properties requested for mail on top of the default shape.
const MAIL_PROPERTIES: &[&str] = &[
    "item:Subject",
    "message:Sender",
    "item:Body",
    "message:IsRead",
    "item:DateTimeReceived",
];

/// FindItem over `folder` for mail, newest first, without a read-state
/// restriction. Unread filtering happens on the parsed result.
pub fn find_mail(folder: &Folder, max_entries: usize) -> String {
    let properties: String = MAIL_PROPERTIES
        .iter()
        .map(|uri| format!("\n          <t:FieldURI FieldURI=\"{uri}\" />"))
        .collect();

    format!(
        r#"{ENVELOPE_OPEN}
    <m:FindItem Traversal="Shallow">
      <m:ItemShape>
        <t:BaseShape>Default</t:BaseShape>
        <t:AdditionalProperties>{properties}
        </t:AdditionalProperties>
      </m:ItemShape>
      <m:IndexedPageItemView MaxEntriesReturned="{max_entries}" Offset="0" BasePoint="Beginning" />
      <m:SortOrder>
        <t:FieldOrder Order="Descending">
          <t:FieldURI FieldURI="item:DateTimeReceived" />
        </t:FieldOrder>
      </m:SortOrder>
      <m:ParentFolderIds>
        {folder_id}
      </m:ParentFolderIds>
    </m:FindItem>{ENVELOPE_CLOSE}"#,
        folder_id = folder_id(folder),
    )
}

/// FindItem over the calendar folder with all properties.
pub fn find_events(max_entries: usize) -> String {
    format!(
        r#"{ENVELOPE_OPEN}
    <m:FindItem Traversal="Shallow">
      <m:ItemShape>
        <t:BaseShape>AllProperties</t:BaseShape>
      </m:ItemShape>
      <m:IndexedPageItemView MaxEntriesReturned="{max_entries}" Offset="0" BasePoint="Beginning" />
      <m:ParentFolderIds>
        {folder_id}
      </m:ParentFolderIds>
    </m:FindItem>{ENVELOPE_CLOSE}"#,
        folder_id = folder_id(&Folder::Calendar),
    )
}

fn folder_id(folder: &Folder) -> String {
    match folder {
        Folder::Inbox => r#"<t:DistinguishedFolderId Id="inbox" />"#.to_string(),
        Folder::Calendar => r#"<t:DistinguishedFolderId Id="calendar" />"#.to_string(),
        Folder::Other(id) => format!(r#"<t:FolderId Id="{}" />"#, escape_attr(id)),
    }
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
