//! Doc-comment convention for status error constants.
//!
//! Only the first line of a constant's documentation matters. A first line
//! starting with `@errTalk ` marks the message as talkable; everything after
//! the marker is the message. Any other first line is an internal-only
//! message taken verbatim.

/// Marker prefix for talkable messages, trailing space included
pub const TALK_MARKER: &str = "@errTalk ";

/// Parse documentation text into `(message, talkable)` using [`TALK_MARKER`].
pub fn parse_descriptor(doc: &str) -> (String, bool) {
    parse_descriptor_with(doc, TALK_MARKER)
}

/// Parse documentation text with a custom marker.
pub fn parse_descriptor_with(doc: &str, marker: &str) -> (String, bool) {
    let first_line = doc.trim().split('\n').next().unwrap_or_default();

    match first_line.strip_prefix(marker) {
        Some(message) => (message.to_string(), true),
        None => (first_line.to_string(), false),
    }
}
