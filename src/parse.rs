//! Parsing of server response lines.
//!
//! Every line the connection delivers is one of three shapes: an untagged
//! line (`* ...`) carrying data records, a tagged completion line
//! (`<tag> OK|NO|BAD [text]`) ending one outstanding command, or a
//! continuation request (`+ ...`). The shapes are modeled as a closed sum
//! type so that dispatch never falls back to string matching at the call
//! sites; record shapes the accumulator does not know about land in
//! [`UntaggedData::Unknown`] instead of being errors.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::{anychar, char, digit1, none_of, space1},
    combinator::{map, map_res, opt, recognize, rest},
    multi::{many0, separated_list0},
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};

use crate::command::ResultCode;
use crate::error::{ParseError, Result};
use crate::types::{FetchRecord, Id};

/// One parsed response line.
#[derive(Clone, Debug, PartialEq)]
pub enum Response {
    /// A server-pushed line not tied to one specific pending command.
    Untagged(UntaggedData),
    /// The final status line for a previously issued command.
    Tagged {
        /// The correlation tag echoed back by the server.
        tag: String,
        /// One of OK, NO or BAD.
        status: ResultCode,
        /// Free informational text, possibly empty.
        text: String,
    },
    /// A continuation request, e.g. before literal data may be sent.
    Continue(String),
}

/// The payload of an untagged response line.
#[derive(Clone, Debug, PartialEq)]
pub enum UntaggedData {
    /// A fetch record: `* <id> ITEM (PARENT <pid> ...)`.
    Record(FetchRecord),
    /// A capability advertisement: `* CAPABILITY ...`.
    Capability(String),
    /// Anything this layer does not interpret, kept for forward
    /// compatibility.
    Unknown(String),
}

fn tagged_parts(i: &str) -> IResult<&str, (&str, &str, Option<&str>)> {
    map(
        tuple((
            take_while1(|c: char| !c.is_whitespace()),
            space1,
            take_while1(|c: char| !c.is_whitespace()),
            opt(preceded(space1, rest)),
        )),
        |(tag, _, status, text)| (tag, status, text),
    )(i)
}

/// The body of a quoted string: any run of non-quote characters and
/// backslash-escaped pairs. The escapes are left in place; [`unescape`]
/// resolves them.
fn quoted_str(i: &str) -> IResult<&str, &str> {
    delimited(
        char('"'),
        recognize(many0(alt((
            recognize(pair(char('\\'), anychar)),
            recognize(none_of("\"\\")),
        )))),
        char('"'),
    )(i)
}

fn unescape(value: &str) -> String {
    crate::command::unquote(&format!("\"{}\"", value))
}

fn id_list(i: &str) -> IResult<&str, Vec<Id>> {
    delimited(
        char('('),
        separated_list0(space1, map_res(digit1, str::parse)),
        char(')'),
    )(i)
}

enum Attr<'a> {
    Parent(Id),
    Name(&'a str),
    RemoteId(&'a str),
    Ancestors(Vec<Id>),
}

fn attribute(i: &str) -> IResult<&str, Attr<'_>> {
    alt((
        map(
            preceded(tag("PARENT "), map_res(digit1, str::parse)),
            Attr::Parent,
        ),
        map(preceded(tag("NAME "), quoted_str), Attr::Name),
        map(preceded(tag("REMOTEID "), quoted_str), Attr::RemoteId),
        map(preceded(tag("ANCESTORS "), id_list), Attr::Ancestors),
    ))(i)
}

fn record_body(i: &str) -> IResult<&str, (Id, Vec<Attr<'_>>)> {
    map(
        tuple((
            map_res(digit1, str::parse),
            space1,
            tag("ITEM"),
            space1,
            delimited(char('('), separated_list0(space1, attribute), char(')')),
        )),
        |(id, _, _, _, attrs)| (id, attrs),
    )(i)
}

fn parse_record(line: &str, body: &str) -> Result<UntaggedData> {
    let (_, (id, attrs)) =
        record_body(body).map_err(|_| ParseError::Invalid(line.to_string()))?;
    let mut parent = None;
    let mut name = None;
    let mut remote_id = None;
    let mut ancestors = Vec::new();
    for attr in attrs {
        match attr {
            Attr::Parent(p) => parent = Some(p),
            Attr::Name(v) => name = Some(unescape(v)),
            Attr::RemoteId(v) => remote_id = Some(unescape(v)),
            Attr::Ancestors(ids) => ancestors = ids,
        }
    }
    let parent = parent.ok_or_else(|| ParseError::Invalid(line.to_string()))?;
    let mut record = FetchRecord::new(id, parent);
    record.name = name;
    record.remote_id = remote_id;
    record.ancestors = ancestors;
    Ok(UntaggedData::Record(record))
}

/// Parse one response line, with any trailing CRLF already permitted but not
/// required.
pub fn parse_response_line(line: &str) -> Result<Response> {
    let line = line.trim_end_matches(['\r', '\n']);
    if let Some(body) = line.strip_prefix("* ") {
        if body.chars().next().map(|c| c.is_ascii_digit()) == Some(true) {
            return parse_record(line, body).map(Response::Untagged);
        }
        if let Some(caps) = body.strip_prefix("CAPABILITY ") {
            return Ok(Response::Untagged(UntaggedData::Capability(
                caps.to_string(),
            )));
        }
        return Ok(Response::Untagged(UntaggedData::Unknown(body.to_string())));
    }
    if let Some(text) = line.strip_prefix('+') {
        return Ok(Response::Continue(text.trim_start().to_string()));
    }
    let (_, (tag, status, text)) =
        tagged_parts(line).map_err(|_| ParseError::Invalid(line.to_string()))?;
    let status = match status {
        "OK" => ResultCode::Ok,
        "NO" => ResultCode::No,
        "BAD" => ResultCode::Bad,
        other => return Err(ParseError::Status(other.to_string()).into()),
    };
    Ok(Response::Tagged {
        tag: tag.to_string(),
        status,
        text: text.unwrap_or("").to_string(),
    })
}
