//! Asynchronous request objects and the fetch pipeline.
//!
//! A job owns one command (or a small tree of sub-commands), drives the
//! send/receive cycle against a borrowed [`Connection`], and reports results
//! upward through callbacks. Nothing here blocks: the caller writes the
//! command by calling [`FetchJob::start`], then feeds every line the
//! transport delivers into [`FetchJob::process_line`] and pumps
//! [`FetchJob::tick`] to let the coalescing window expire. The job is done
//! when [`FetchJob::is_complete`] reports true.
//!
//! Untagged records are not handed to the caller one at a time. They collect
//! in a pending batch, and a short single-shot window (armed when a record
//! lands in an empty batch) bounds how long they may sit there; a tagged
//! completion always forces an immediate flush first. Connections that answer
//! record-per-line thus cost one callback per window, not one per record.

use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::command::{Command, ResultCode};
use crate::conn::Connection;
use crate::error::{Error, Result};
use crate::parse::{parse_response_line, Response, UntaggedData};
use crate::types::{FetchDepth, FetchRecord, Id};

static TAG_PREFIX: &str = "a";

/// How long records may sit in a pending batch before they are flushed.
pub const BATCH_WINDOW: Duration = Duration::from_millis(100);

/// Hands out correlation tags, unique for the lifetime of one connection.
#[derive(Debug, Default)]
pub struct TagGenerator {
    next: u32,
}

impl TagGenerator {
    pub fn new() -> TagGenerator {
        TagGenerator::default()
    }

    /// The next unused tag: `a1`, `a2`, ...
    pub fn next_tag(&mut self) -> String {
        self.next += 1;
        format!("{}{}", TAG_PREFIX, self.next)
    }
}

/// What a cascaded fetch does when one of its sub-fetches fails.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FailurePolicy {
    /// The first sub-fetch error fails the whole job; results from
    /// sub-fetches still in flight are discarded. The collection-fetch
    /// default.
    Strict,
    /// A failing sub-fetch is logged and skipped, and the job completes with
    /// whatever the surviving sub-fetches produced. Used by the
    /// tag-reconciliation flows, where a missing subtree is not fatal.
    Lenient,
}

/// Records awaiting flush to the caller.
#[derive(Debug, Default)]
struct PendingBatch {
    records: Vec<FetchRecord>,
    deadline: Option<Instant>,
}

impl PendingBatch {
    fn push(&mut self, record: FetchRecord, now: Instant) {
        if self.records.is_empty() {
            self.deadline = Some(now + BATCH_WINDOW);
        }
        self.records.push(record);
    }

    fn due(&self, now: Instant) -> bool {
        matches!(self.deadline, Some(d) if now >= d)
    }

    fn take(&mut self) -> Vec<FetchRecord> {
        self.deadline = None;
        std::mem::take(&mut self.records)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum State {
    Idle,
    /// The non-overlapping-roots probe is outstanding.
    Probe,
    /// One recursive sub-fetch per surviving root is outstanding.
    RootFetches,
    /// A single fetch command is outstanding.
    DirectFetch,
    Complete,
}

/// Drop every candidate root whose identifier appears in another candidate's
/// ancestor chain.
///
/// When both an ancestor and its descendant were requested, the descendant's
/// recursive fetch is the more specific one, so the ancestor is the redundant
/// entry; keeping it would deliver the overlap twice.
fn minimal_roots(candidates: &[FetchRecord]) -> Vec<Id> {
    candidates
        .iter()
        .filter(|c| {
            !candidates
                .iter()
                .any(|other| other.id() != c.id() && other.ancestors().contains(&c.id()))
        })
        .map(|c| c.id())
        .collect()
}

/// An asynchronous collection fetch.
///
/// Fetches one or more target collections at the requested depth. A recursive
/// fetch over multiple roots first probes the targets with full-ancestor
/// retrieval, trims the root set down to non-overlapping roots, and then
/// issues one recursive sub-fetch per surviving root, pipelined back to back;
/// their record streams merge into this job's batches.
pub struct FetchJob<'a> {
    targets: Vec<Id>,
    depth: FetchDepth,
    policy: FailurePolicy,
    state: State,
    probe: Option<Command>,
    probe_records: Vec<FetchRecord>,
    subfetches: Vec<Command>,
    outstanding: usize,
    batch: PendingBatch,
    results: Vec<FetchRecord>,
    on_batch: Option<Box<dyn FnMut(&[FetchRecord]) + 'a>>,
    error: Option<Error>,
}

impl<'a> FetchJob<'a> {
    /// Create a fetch over `targets` at the given depth, with the strict
    /// failure policy.
    pub fn new(targets: Vec<Id>, depth: FetchDepth) -> FetchJob<'a> {
        FetchJob {
            targets,
            depth,
            policy: FailurePolicy::Strict,
            state: State::Idle,
            probe: None,
            probe_records: Vec::new(),
            subfetches: Vec::new(),
            outstanding: 0,
            batch: PendingBatch::default(),
            results: Vec::new(),
            on_batch: None,
            error: None,
        }
    }

    /// Select the failure policy for cascaded sub-fetches.
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> FetchJob<'a> {
        self.policy = policy;
        self
    }

    /// Install a callback invoked with every flushed batch of records.
    pub fn on_batch<F: FnMut(&[FetchRecord]) + 'a>(mut self, f: F) -> FetchJob<'a> {
        self.on_batch = Some(Box::new(f));
        self
    }

    /// Transmit the initial command(s).
    ///
    /// Fails synchronously, without any wire traffic, when the target list is
    /// empty; the job is then already complete with that error.
    pub fn start(&mut self, conn: &mut dyn Connection, tags: &mut TagGenerator) -> Result<()> {
        debug_assert_eq!(self.state, State::Idle);
        if self.targets.is_empty() {
            self.state = State::Complete;
            self.error = Some(Error::InvalidTarget);
            return Err(Error::InvalidTarget);
        }
        if self.depth == FetchDepth::Recursive && self.targets.len() > 1 {
            // roots may overlap; probe them with their ancestor chains first
            let mut probe = Command::list(&self.targets, FetchDepth::Base, true)?;
            Self::send(conn, tags, &mut probe)?;
            self.probe = Some(probe);
            self.state = State::Probe;
        } else {
            let mut cmd = Command::list(&self.targets, self.depth, false)?;
            Self::send(conn, tags, &mut cmd)?;
            self.subfetches.push(cmd);
            self.outstanding = 1;
            self.state = State::DirectFetch;
        }
        Ok(())
    }

    fn send(
        conn: &mut dyn Connection,
        tags: &mut TagGenerator,
        cmd: &mut Command,
    ) -> Result<()> {
        cmd.assign_tag(&tags.next_tag());
        let tag = cmd.tag().unwrap();
        debug!("sending {} {}", tag, cmd.verb());
        conn.write_line(&format!("{} {}", tag, cmd.wire()))
    }

    /// Feed one response line delivered by the transport.
    ///
    /// `conn` is needed because completing the probe issues the per-root
    /// sub-fetches. `now` drives the coalescing window. Lines that fail to
    /// parse are logged and dropped; they never abort the operation.
    pub fn process_line(
        &mut self,
        conn: &mut dyn Connection,
        tags: &mut TagGenerator,
        line: &str,
        now: Instant,
    ) -> Result<()> {
        let response = match parse_response_line(line) {
            Ok(r) => r,
            Err(e) => {
                warn!("dropping malformed response line: {}", e);
                return Ok(());
            }
        };
        match response {
            Response::Untagged(UntaggedData::Record(record)) => match self.state {
                State::Probe => self.probe_records.push(record),
                State::RootFetches | State::DirectFetch => self.batch.push(record, now),
                // late records after completion (or before start) are discarded
                State::Idle | State::Complete => {}
            },
            Response::Untagged(_) | Response::Continue(_) => {}
            Response::Tagged { tag, status, text } => {
                self.tagged(conn, tags, &tag, status, &text)?;
            }
        }
        if self.batch.due(now) {
            self.flush();
        }
        Ok(())
    }

    /// Let the coalescing window expire; call this periodically (or with a
    /// synthetic instant) when no lines are arriving.
    pub fn tick(&mut self, now: Instant) {
        if self.batch.due(now) {
            self.flush();
        }
    }

    /// Report a transport-level failure (disconnect, timeout). Treated like a
    /// protocol NO/BAD: buffered records are flushed, then the job completes
    /// with the error.
    pub fn abort(&mut self, err: Error) {
        if self.state == State::Complete {
            return;
        }
        self.flush();
        self.error = Some(err);
        self.state = State::Complete;
    }

    fn tagged(
        &mut self,
        conn: &mut dyn Connection,
        tags: &mut TagGenerator,
        tag: &str,
        status: ResultCode,
        text: &str,
    ) -> Result<()> {
        if self.state == State::Probe {
            let probe = match self.probe.as_mut() {
                Some(p) if p.tag() == Some(tag) => p,
                _ => return Ok(()),
            };
            if !probe.complete(status, text) {
                return Ok(());
            }
            if status != ResultCode::Ok {
                self.fail(status, text);
                return Ok(());
            }
            return self.issue_root_fetches(conn, tags);
        }

        let cmd = match self
            .subfetches
            .iter_mut()
            .find(|c| c.tag() == Some(tag))
        {
            Some(cmd) => cmd,
            // a completion for a command we no longer track; never fatal
            None => return Ok(()),
        };
        if !cmd.complete(status, text) {
            return Ok(());
        }
        if self.state == State::Complete {
            // a sub-fetch finishing after a strict failure; results discarded
            return Ok(());
        }
        self.outstanding -= 1;
        if status != ResultCode::Ok {
            match self.policy {
                FailurePolicy::Strict => {
                    self.fail(status, text);
                    return Ok(());
                }
                FailurePolicy::Lenient => {
                    warn!("skipping failed sub-fetch {}: {} {:?}", tag, text, status);
                }
            }
        }
        if self.outstanding == 0 {
            self.flush();
            self.state = State::Complete;
        }
        Ok(())
    }

    fn issue_root_fetches(
        &mut self,
        conn: &mut dyn Connection,
        tags: &mut TagGenerator,
    ) -> Result<()> {
        let roots = minimal_roots(&self.probe_records);
        if roots.is_empty() {
            self.flush();
            self.state = State::Complete;
            return Ok(());
        }
        // pipelined: all sub-fetches go out back to back
        for root in roots {
            let mut cmd = Command::list(&[root], FetchDepth::Recursive, false)?;
            Self::send(conn, tags, &mut cmd)?;
            self.subfetches.push(cmd);
            self.outstanding += 1;
        }
        self.state = State::RootFetches;
        Ok(())
    }

    fn fail(&mut self, status: ResultCode, text: &str) {
        // callers may already hold partial results; deliver the rest too
        self.flush();
        self.error = Some(match status {
            ResultCode::No => Error::No(text.to_string()),
            ResultCode::Bad => Error::Bad(text.to_string()),
            _ => Error::SubOperation(text.to_string()),
        });
        self.state = State::Complete;
    }

    fn flush(&mut self) {
        let records = self.batch.take();
        if records.is_empty() {
            return;
        }
        if let Some(f) = self.on_batch.as_mut() {
            f(&records);
        }
        self.results.extend(records);
    }

    /// Whether the job has reached its final state.
    pub fn is_complete(&self) -> bool {
        self.state == State::Complete
    }

    /// The failure, if the job completed with one.
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// All records delivered so far.
    pub fn results(&self) -> &[FetchRecord] {
        &self.results
    }

    /// Consume the job and return its records.
    pub fn into_results(self) -> Vec<FetchRecord> {
        self.results
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum SubmitState {
    Idle,
    AwaitingContinue,
    AwaitingCompletion,
    Complete,
}

/// Dispatch of one queued message over the wire protocol.
///
/// Renders the envelope header block, appends it together with the body
/// payload, and completes on the tagged response. Refuses to start until the
/// sender is known, since headers cannot be emitted before the protocol step
/// that supplies the From address.
pub struct SubmitJob {
    folder: String,
    headers: crate::headers::MessageHeaders,
    body: String,
    payload: String,
    command: Option<Command>,
    state: SubmitState,
    error: Option<Error>,
}

impl SubmitJob {
    pub fn new(
        folder: &str,
        headers: crate::headers::MessageHeaders,
        body: &str,
    ) -> SubmitJob {
        SubmitJob {
            folder: folder.to_string(),
            headers,
            body: body.to_string(),
            payload: String::new(),
            command: None,
            state: SubmitState::Idle,
            error: None,
        }
    }

    /// Transmit the APPEND command announcing the payload size.
    ///
    /// Fails synchronously, without wire traffic, when no From address has
    /// been supplied.
    pub fn start(&mut self, conn: &mut dyn Connection, tags: &mut TagGenerator) -> Result<()> {
        debug_assert_eq!(self.state, SubmitState::Idle);
        let block = match self.headers.header_fields() {
            Some(block) => block,
            None => {
                self.state = SubmitState::Complete;
                self.error = Some(Error::InvalidTarget);
                return Err(Error::InvalidTarget);
            }
        };
        self.payload = format!("{}\r\n{}", block, self.body);
        let mut cmd = Command::append(&self.folder, &[], None, self.payload.len())?;
        cmd.assign_tag(&tags.next_tag());
        let tag = cmd.tag().unwrap();
        debug!("sending {} APPEND ({} bytes)", tag, self.payload.len());
        conn.write_line(&format!("{} {}", tag, cmd.wire()))?;
        self.command = Some(cmd);
        self.state = SubmitState::AwaitingContinue;
        Ok(())
    }

    /// Feed one response line delivered by the transport.
    pub fn process_line(&mut self, conn: &mut dyn Connection, line: &str) -> Result<()> {
        let response = match parse_response_line(line) {
            Ok(r) => r,
            Err(e) => {
                warn!("dropping malformed response line: {}", e);
                return Ok(());
            }
        };
        match response {
            Response::Continue(_) if self.state == SubmitState::AwaitingContinue => {
                for line in self.payload.split("\r\n") {
                    conn.write_line(line)?;
                }
                self.state = SubmitState::AwaitingCompletion;
            }
            Response::Tagged { tag, status, text } => {
                let cmd = match self.command.as_mut() {
                    Some(cmd) if cmd.tag() == Some(tag.as_str()) => cmd,
                    _ => return Ok(()),
                };
                if !cmd.complete(status, text.as_str()) {
                    return Ok(());
                }
                self.error = match status {
                    ResultCode::Ok => None,
                    ResultCode::No => Some(Error::No(text)),
                    ResultCode::Bad => Some(Error::Bad(text)),
                    _ => Some(Error::SubOperation(text)),
                };
                self.state = SubmitState::Complete;
            }
            _ => {}
        }
        Ok(())
    }

    /// Whether the job has reached its final state.
    pub fn is_complete(&self) -> bool {
        self.state == SubmitState::Complete
    }

    /// The failure, if the job completed with one.
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }
}
