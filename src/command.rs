//! Wire-format command assembly and completion tracking.
//!
//! Building a command is pure string work: the constructors here perform the
//! required quoting of free-text arguments and the ordering each command's
//! grammar demands, and nothing else. The correlation tag is *not* part of
//! the built text; the job layer prefixes it at send time, and the connection
//! appends the line terminator.

use chrono::{DateTime, FixedOffset};

use crate::error::{Error, Result, ValidateError};
use crate::types::{FetchDepth, Id, IdRange};
use crate::utils::iter_join;

macro_rules! quote {
    ($x:expr) => {
        format!("\"{}\"", $x.replace('\\', "\\\\").replace('"', "\\\""))
    };
}

/// Quote a free-text argument for the wire: backslash-escape `\` and `"`,
/// then wrap in double quotes.
pub fn quote(value: &str) -> String {
    quote!(value)
}

/// Undo [`quote`], recovering the original text.
///
/// Text that is not surrounded by double quotes is returned unchanged, since
/// the protocol also permits unquoted atoms.
pub fn unquote(value: &str) -> String {
    let inner = match value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) {
        Some(inner) => inner,
        None => return value.to_string(),
    };
    let mut out = String::with_capacity(inner.len());
    let mut escaped = false;
    for c in inner.chars() {
        if escaped {
            out.push(c);
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else {
            out.push(c);
        }
    }
    out
}

fn validate_str(value: &str) -> Result<String> {
    let quoted = quote!(value);
    if quoted.contains('\n') {
        return Err(Error::Validate(ValidateError('\n')));
    }
    if quoted.contains('\r') {
        return Err(Error::Validate(ValidateError('\r')));
    }
    Ok(quoted)
}

fn id_set(ids: &[Id]) -> String {
    iter_join(ids.iter(), ",")
}

fn depth_token(depth: FetchDepth) -> &'static str {
    match depth {
        FetchDepth::Base => "0",
        FetchDepth::FirstLevel => "1",
        FetchDepth::Recursive => "INF",
    }
}

/// The result status of a completed command.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ResultCode {
    /// No tagged completion has been seen yet.
    Pending,
    /// The server completed the command successfully.
    Ok,
    /// The server refused the command.
    No,
    /// The server could not parse the command.
    Bad,
    /// The transport failed before a tagged completion arrived.
    Error,
}

/// One outgoing protocol operation, from construction through its tagged
/// completion.
///
/// A command is created by one of the builder constructors below, transmitted
/// once, and then mutated only by the response-dispatch routine that matches
/// its tagged completion line.
#[derive(Clone, Debug)]
pub struct Command {
    verb: String,
    argument: String,
    tag: Option<String>,
    complete: bool,
    result: ResultCode,
    result_text: String,
}

impl Command {
    fn new(verb: &str, argument: String) -> Command {
        Command {
            verb: verb.to_string(),
            argument,
            tag: None,
            complete: false,
            result: ResultCode::Pending,
            result_text: String::new(),
        }
    }

    /// `SELECT "<path>"`
    pub fn select(path: &str) -> Result<Command> {
        Ok(Command::new("SELECT", validate_str(path)?))
    }

    /// `LIST <id-set> <depth> (<options>)`
    ///
    /// The options group carries `ANCESTORS` when the caller wants every
    /// listed collection returned with its full ancestor chain (the probe
    /// step of a multi-root recursive fetch); otherwise it is empty. An empty
    /// group still renders as `()`.
    pub fn list(ids: &[Id], depth: FetchDepth, ancestors: bool) -> Result<Command> {
        if ids.is_empty() {
            return Err(Error::InvalidTarget);
        }
        let options = if ancestors { "ANCESTORS" } else { "" };
        Ok(Command::new(
            "LIST",
            format!("{} {} ({})", id_set(ids), depth_token(depth), options),
        ))
    }

    /// `FETCH <range> (<fields>)`
    pub fn fetch(range: IdRange, fields: &[&str]) -> Command {
        Command::new("FETCH", format!("{} ({})", range, fields.join(" ")))
    }

    /// `STORE <range> FLAGS (<flags>)`
    pub fn store(range: IdRange, flags: &[&str]) -> Command {
        Command::new("STORE", format!("{} FLAGS ({})", range, flags.join(" ")))
    }

    /// `COPY <range> "<path>"`
    pub fn copy(range: IdRange, path: &str) -> Result<Command> {
        Ok(Command::new(
            "COPY",
            format!("{} {}", range, validate_str(path)?),
        ))
    }

    /// `APPEND "<path>" (<flags>) ["<internal date>"] {<size>}`
    pub fn append(
        path: &str,
        flags: &[&str],
        internal_date: Option<DateTime<FixedOffset>>,
        size: usize,
    ) -> Result<Command> {
        let mut argument = format!("{} ({})", validate_str(path)?, flags.join(" "));
        if let Some(date) = internal_date {
            argument.push_str(&format!(" \"{}\"", date.format("%d-%b-%Y %H:%M:%S %z")));
        }
        argument.push_str(&format!(" {{{}}}", size));
        Ok(Command::new("APPEND", argument))
    }

    /// `SETACL "<path>" "<identifier>" <rights>`
    pub fn setacl(path: &str, identifier: &str, rights: &str) -> Result<Command> {
        Ok(Command::new(
            "SETACL",
            format!(
                "{} {} {}",
                validate_str(path)?,
                validate_str(identifier)?,
                rights
            ),
        ))
    }

    /// `GETANNOTATION "<path>" "<entry>" "<attribute>"`
    pub fn getannotation(path: &str, entry: &str, attribute: &str) -> Result<Command> {
        Ok(Command::new(
            "GETANNOTATION",
            format!(
                "{} {} {}",
                validate_str(path)?,
                validate_str(entry)?,
                validate_str(attribute)?
            ),
        ))
    }

    /// `SETANNOTATION "<path>" "<entry>" ("<attribute>" "<value>")`
    pub fn setannotation(
        path: &str,
        entry: &str,
        attribute: &str,
        value: &str,
    ) -> Result<Command> {
        Ok(Command::new(
            "SETANNOTATION",
            format!(
                "{} {} ({} {})",
                validate_str(path)?,
                validate_str(entry)?,
                validate_str(attribute)?,
                validate_str(value)?
            ),
        ))
    }

    /// `SUBSCRIBE "<path>"`
    pub fn subscribe(path: &str) -> Result<Command> {
        Ok(Command::new("SUBSCRIBE", validate_str(path)?))
    }

    /// `UNSUBSCRIBE "<path>"`
    pub fn unsubscribe(path: &str) -> Result<Command> {
        Ok(Command::new("UNSUBSCRIBE", validate_str(path)?))
    }

    /// `CAPABILITY`
    pub fn capability() -> Command {
        Command::new("CAPABILITY", String::new())
    }

    /// `LOGOUT`
    pub fn logout() -> Command {
        Command::new("LOGOUT", String::new())
    }

    /// The operation verb, e.g. `FETCH`.
    pub fn verb(&self) -> &str {
        &self.verb
    }

    /// The pre-escaped argument blob, possibly empty.
    pub fn argument(&self) -> &str {
        &self.argument
    }

    /// The built wire text, without the leading tag and without the line
    /// terminator.
    pub fn wire(&self) -> String {
        if self.argument.is_empty() {
            self.verb.clone()
        } else {
            format!("{} {}", self.verb, self.argument)
        }
    }

    /// The correlation tag, once assigned.
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Assign the correlation tag, if none has been assigned yet.
    ///
    /// A no-op when a tag is already present, so a retried send cannot
    /// re-tag a command that is already outstanding.
    pub fn assign_tag(&mut self, tag: &str) {
        if self.tag.is_none() {
            self.tag = Some(tag.to_string());
        }
    }

    /// Record the tagged completion for this command.
    ///
    /// Returns whether this call performed the not-complete → complete
    /// transition; listeners must guard on that edge, not on the stored
    /// values, since a second call overwrites the result without being a new
    /// completion event.
    pub fn complete(&mut self, result: ResultCode, text: &str) -> bool {
        let edge = !self.complete;
        self.complete = true;
        self.result = result;
        self.result_text = text.to_string();
        edge
    }

    /// Whether a tagged completion has been recorded.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// The recorded result status.
    pub fn result(&self) -> ResultCode {
        self.result
    }

    /// The human-readable trailer of the tagged completion line.
    pub fn result_text(&self) -> &str {
        &self.result_text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn quote_backslash() {
        assert_eq!("\"test\\\\text\"", quote(r"test\text"));
    }

    #[test]
    fn quote_dquote() {
        assert_eq!("\"test\\\"text\"", quote("test\"text"));
    }

    #[test]
    fn quote_roundtrip() {
        for path in [
            "INBOX",
            "a/b/c",
            r"weird\path",
            "with \"quotes\" inside",
            "trailing space ",
            r#"mixed "\ / all"#,
        ] {
            assert_eq!(unquote(&quote(path)), path);
        }
    }

    #[test]
    fn unquote_bare_atom() {
        assert_eq!(unquote("INBOX"), "INBOX");
    }

    #[test]
    fn validate_newline() {
        match Command::select("test\nstring") {
            Err(Error::Validate(ValidateError('\n'))) => {}
            other => panic!("wrong result: {:?}", other),
        }
    }

    #[test]
    fn select_quotes_path() {
        let cmd = Command::select("Mail/In \"Box\"").unwrap();
        assert_eq!(cmd.wire(), "SELECT \"Mail/In \\\"Box\\\"\"");
    }

    #[test]
    fn list_wire_format() {
        let cmd = Command::list(&[1, 5, 9], FetchDepth::Recursive, true).unwrap();
        assert_eq!(cmd.wire(), "LIST 1,5,9 INF (ANCESTORS)");
        let cmd = Command::list(&[4], FetchDepth::FirstLevel, false).unwrap();
        assert_eq!(cmd.wire(), "LIST 4 1 ()");
    }

    #[test]
    fn list_empty_targets() {
        match Command::list(&[], FetchDepth::Base, false) {
            Err(Error::InvalidTarget) => {}
            other => panic!("wrong result: {:?}", other),
        }
    }

    #[test]
    fn fetch_empty_fields() {
        let cmd = Command::fetch(IdRange::new(5, 9), &[]);
        assert_eq!(cmd.wire(), "FETCH 5:9 ()");
    }

    #[test]
    fn store_flags() {
        let cmd = Command::store(IdRange::single(3), &["\\Seen", "\\Deleted"]);
        assert_eq!(cmd.wire(), "STORE 3 FLAGS (\\Seen \\Deleted)");
    }

    #[test]
    fn append_with_date() {
        let date = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2020, 7, 1, 12, 0, 0)
            .unwrap();
        let cmd = Command::append("Drafts", &["\\Draft"], Some(date), 42).unwrap();
        assert_eq!(
            cmd.wire(),
            "APPEND \"Drafts\" (\\Draft) \"01-Jul-2020 12:00:00 +0000\" {42}"
        );
    }

    #[test]
    fn append_empty_flags() {
        let cmd = Command::append("Sent", &[], None, 7).unwrap();
        assert_eq!(cmd.wire(), "APPEND \"Sent\" () {7}");
    }

    #[test]
    fn getannotation_wire_format() {
        let cmd = Command::getannotation("INBOX", "/comment", "value.shared").unwrap();
        assert_eq!(
            cmd.wire(),
            "GETANNOTATION \"INBOX\" \"/comment\" \"value.shared\""
        );
    }

    #[test]
    fn tag_assigned_once() {
        let mut cmd = Command::capability();
        assert_eq!(cmd.tag(), None);
        cmd.assign_tag("a1");
        cmd.assign_tag("a2");
        assert_eq!(cmd.tag(), Some("a1"));
    }

    #[test]
    fn completion_edge_fires_once() {
        let mut cmd = Command::logout();
        assert!(!cmd.is_complete());
        assert!(cmd.complete(ResultCode::Ok, "done"));
        assert!(cmd.is_complete());
        // overwrites the result but is not a new completion event
        assert!(!cmd.complete(ResultCode::No, "later"));
        assert_eq!(cmd.result(), ResultCode::No);
        assert_eq!(cmd.result_text(), "later");
    }
}
