//! Assembly of outgoing mail envelope headers.
//!
//! The message-submission step needs a small, well-formed header block
//! (`From`, `Subject`, `To`, `Cc`) in front of the payload it appends over
//! the wire protocol. Text that is not representable in 7-bit US-ASCII is
//! wrapped in an RFC 2047 base64 encoded-word; ASCII display names that
//! contain address specials are backslash-quoted instead. The two treatments
//! never mix within one field.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

// The specials that force a display name into a quoted string.
const SPECIALS: &[char] = &[
    '(', ')', '<', '>', ':', ';', '@', '\\', ',', '.', '"',
];

fn encoded_word(text: &str) -> String {
    format!("=?utf-8?b?{}?=", STANDARD.encode(text.as_bytes()))
}

/// Format a display name and address pair as a single address field value.
///
/// An empty display name yields the bare address. A display name containing
/// any non-ASCII code point is encoded-word wrapped; one containing address
/// specials is backslash-escaped and double-quoted; a plain name is used
/// verbatim. The address always follows in angle brackets when a display
/// name is present.
pub fn format_address(display_name: &str, address: &str) -> String {
    if display_name.is_empty() {
        return address.to_string();
    }
    let name = if !display_name.is_ascii() {
        encoded_word(display_name)
    } else if display_name.contains(SPECIALS) {
        format!(
            "\"{}\"",
            display_name.replace('\\', "\\\\").replace('"', "\\\"")
        )
    } else {
        display_name.to_string()
    };
    format!("{} <{}>", name, address)
}

/// Format a subject for transmission.
///
/// ASCII subjects pass through verbatim apart from embedded line breaks,
/// which are stripped so they cannot break header folding. Non-ASCII
/// subjects are encoded-word wrapped in full; there is no partial encoding.
pub fn format_subject(text: &str) -> String {
    if text.is_ascii() {
        text.replace(['\r', '\n'], "")
    } else {
        encoded_word(text)
    }
}

/// The envelope headers of one outgoing message.
///
/// Collects sender, recipients and subject as the dispatch protocol reaches
/// each of them, then renders the complete block once the sender is known.
#[derive(Clone, Debug, Default)]
pub struct MessageHeaders {
    from: Option<String>,
    to: Vec<String>,
    cc: Vec<String>,
    subject: String,
}

impl MessageHeaders {
    pub fn new() -> MessageHeaders {
        MessageHeaders::default()
    }

    /// Set the sender. `display_name` may be empty.
    pub fn set_from(&mut self, display_name: &str, address: &str) {
        self.from = Some(format_address(display_name, address));
    }

    /// Add one `To` recipient address.
    pub fn add_to(&mut self, address: &str) {
        self.to.push(address.to_string());
    }

    /// Add one `Cc` recipient address.
    pub fn add_cc(&mut self, address: &str) {
        self.cc.push(address.to_string());
    }

    /// Set the subject; encoding rules per [`format_subject`].
    pub fn set_subject(&mut self, text: &str) {
        self.subject = format_subject(text);
    }

    /// Render the CRLF-terminated header block, in the order From, Subject,
    /// To, Cc, with empty fields omitted.
    ///
    /// Returns `None` until a From address has been set: the protocol step
    /// that supplies the sender has to run before headers can be emitted.
    /// Recipient lists fold across lines with `",\r\n\t"`.
    pub fn header_fields(&self) -> Option<String> {
        let from = self.from.as_ref()?;
        let mut block = format!("From: {}\r\n", from);
        if !self.subject.is_empty() {
            block.push_str(&format!("Subject: {}\r\n", self.subject));
        }
        if !self.to.is_empty() {
            block.push_str(&format!("To: {}\r\n", self.to.join(",\r\n\t")));
        }
        if !self.cc.is_empty() {
            block.push_str(&format!("Cc: {}\r\n", self.cc.join(",\r\n\t")));
        }
        Some(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_bare() {
        assert_eq!(format_address("", "a@b.com"), "a@b.com");
    }

    #[test]
    fn address_plain_name() {
        assert_eq!(
            format_address("Marc Mutz", "mutz@kde.org"),
            "Marc Mutz <mutz@kde.org>"
        );
    }

    #[test]
    fn address_name_with_specials() {
        assert_eq!(
            format_address("Mutz, Marc", "mutz@kde.org"),
            "\"Mutz, Marc\" <mutz@kde.org>"
        );
    }

    #[test]
    fn address_name_with_quotes() {
        assert_eq!(
            format_address("Marc \"M.\" Mutz", "mutz@kde.org"),
            "\"Marc \\\"M.\\\" Mutz\" <mutz@kde.org>"
        );
    }

    #[test]
    fn address_non_ascii_name() {
        assert_eq!(
            format_address("Marc Mötz", "mutz@kde.org"),
            "=?utf-8?b?TWFyYyBNw7Z0eg==?= <mutz@kde.org>"
        );
    }

    #[test]
    fn subject_ascii_strips_newlines() {
        assert_eq!(format_subject("hello\r\nworld"), "helloworld");
        assert_eq!(format_subject("plain subject"), "plain subject");
    }

    #[test]
    fn subject_non_ascii_encoded_in_full() {
        assert_eq!(format_subject("grüße"), "=?utf-8?b?Z3LDvMOfZQ==?=");
    }

    #[test]
    fn no_fields_before_from() {
        let mut headers = MessageHeaders::new();
        headers.add_to("a@b.com");
        headers.set_subject("hi");
        assert_eq!(headers.header_fields(), None);
    }

    #[test]
    fn field_order_and_folding() {
        let mut headers = MessageHeaders::new();
        headers.set_from("Marc Mutz", "mutz@kde.org");
        headers.set_subject("status");
        headers.add_to("a@example.com");
        headers.add_to("b@example.com");
        headers.add_cc("c@example.com");
        assert_eq!(
            headers.header_fields().unwrap(),
            "From: Marc Mutz <mutz@kde.org>\r\n\
             Subject: status\r\n\
             To: a@example.com,\r\n\tb@example.com\r\n\
             Cc: c@example.com\r\n"
        );
    }

    #[test]
    fn from_without_subject_or_recipients() {
        let mut headers = MessageHeaders::new();
        headers.set_from("", "a@b.com");
        assert_eq!(headers.header_fields().unwrap(), "From: a@b.com\r\n");
    }
}
