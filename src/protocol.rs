//! Typed views of the Mirth Connect management API responses.
//!
//! The statuses and statistics endpoints return XML documents with a
//! `<list>` root envelope; the version endpoint returns plain text. Decoding
//! is strict about the envelope (a body that does not parse as the expected
//! tree is a [`DecodeError`]) but permissive about its contents: unknown
//! child elements are ignored and missing numeric fields decode as 0.0, so
//! partial data never aborts the surrounding record.

use quick_xml::events::Event;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed response: {0}")]
    Malformed(#[from] quick_xml::DeError),
    /// The body parsed as XML but is not the expected document. A login
    /// page served instead of the API response lands here.
    #[error("unexpected document root, expected <{0}>")]
    UnexpectedRoot(&'static str),
}

/// The serde layer does not validate the root element name, so a
/// wrong-but-well-formed document would silently decode as an empty list.
/// Peek at the first start tag instead. Anything other than a well-formed
/// wrong root is left for the serde pass to report properly.
fn check_root(body: &str, expected: &'static str) -> Result<(), DecodeError> {
    let mut reader = quick_xml::Reader::from_str(body);
    loop {
        match reader.read_event() {
            Ok(Event::Start(tag)) | Ok(Event::Empty(tag)) => {
                return if tag.name().as_ref() == expected.as_bytes() {
                    Ok(())
                } else {
                    Err(DecodeError::UnexpectedRoot(expected))
                };
            }
            // No root element, or not even XML.
            Ok(Event::Eof) | Err(_) => return Ok(()),
            // Declarations, comments and stray whitespace before the root.
            Ok(_) => continue,
        }
    }
}

/// One deployed channel as reported by `/api/channels/statuses`.
///
/// `state` is an open string set (STARTED, STOPPED, PAUSED, ...); values the
/// engine adds later are carried through literally rather than rejected.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStatus {
    pub channel_id: String,
    pub name: String,
    pub state: String,
    #[serde(default)]
    pub deployed_revision_delta: f64,
    #[serde(default)]
    pub statistics: StatusStatistics,
}

/// The per-status message counts nested under a channel status record.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct StatusStatistics {
    #[serde(rename = "entry", default)]
    pub entries: Vec<StatusEntry>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct StatusEntry {
    // Mirth serializes its status enum under the fully qualified Java
    // class name.
    #[serde(rename = "com.mirth.connect.donkey.model.message.Status")]
    pub status: String,
    #[serde(rename = "long", default)]
    pub count: f64,
}

/// One row of `/api/channels/statistics`: lifetime totals per channel, plus
/// the current queue depth, which no other endpoint reports.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStatistics {
    pub channel_id: String,
    #[serde(default)]
    pub received: f64,
    #[serde(default)]
    pub sent: f64,
    #[serde(default)]
    pub error: f64,
    #[serde(default)]
    pub filtered: f64,
    #[serde(default)]
    pub queued: f64,
}

#[derive(Debug, Deserialize)]
struct DashboardStatusList {
    #[serde(rename = "dashboardStatus", default)]
    channels: Vec<ChannelStatus>,
}

#[derive(Debug, Deserialize)]
struct ChannelStatisticsList {
    #[serde(rename = "channelStatistics", default)]
    channels: Vec<ChannelStatistics>,
}

/// Decodes the `<list>` of `<dashboardStatus>` records, in document order.
pub fn decode_channel_statuses(body: &str) -> Result<Vec<ChannelStatus>, DecodeError> {
    check_root(body, "list")?;
    let list: DashboardStatusList = quick_xml::de::from_str(body)?;
    Ok(list.channels)
}

/// Decodes the `<list>` of `<channelStatistics>` records.
pub fn decode_channel_statistics(body: &str) -> Result<Vec<ChannelStatistics>, DecodeError> {
    check_root(body, "list")?;
    let list: ChannelStatisticsList = quick_xml::de::from_str(body)?;
    Ok(list.channels)
}

/// The version endpoint returns plain text, surrounded by whatever
/// whitespace the servlet container felt like adding.
pub fn decode_version(body: &str) -> String {
    body.trim().to_string()
}
