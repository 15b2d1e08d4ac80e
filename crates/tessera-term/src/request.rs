// SPDX-License-Identifier: MIT
//
// Escape-sequence queries and their replies.
//
// Some things only the terminal knows: where the cursor is, what the
// device supports, how big a cell is in pixels. We ask with an escape
// sequence and the answer comes back on stdin, interleaved with keystrokes
// and mouse reports.
//
// Two ways to ask:
//
//   try_execute is synchronous. Mouse-move reporting and normal input
//   processing are paused, the request is written, and the transport reads
//   until the reply's final character or the timeout. Always resumes
//   input afterwards, success or not.
//
//   send / on_response are asynchronous. Requests queue up; each reply the
//   input parser diverts is matched to the OLDEST outstanding request whose
//   terminator ends in the reply's final character. `evict_stale` fails
//   requests nobody answered.
//
// Matching is on a single final character. Two outstanding queries with
// the same final character are answered strictly in send order, which is
// also the order terminators answer in. A synchronous query lets any
// older async query with its final character take the first such reply.
//
// Protocol failures are data: every request is consumed by exactly one
// `AnsiResponse`, which carries an error string instead of raising.

use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Error text for a request without a terminator.
pub const EMPTY_TERMINATOR: &str = "Terminator request is empty.";

/// Error text for a request nobody answered in time.
pub const TIMED_OUT: &str = "Request timed out.";

// ─── Request / Response ──────────────────────────────────────────────────────

/// Callback run once with the response.
pub type ResponseCallback = Box<dyn FnOnce(&AnsiResponse)>;

/// One escape-sequence query.
pub struct AnsiRequest {
    /// Bytes to send.
    pub request: String,
    /// Expected reply terminator; only its last character is matched.
    pub terminator: String,
    /// Expected first reply parameter, if the query has a fixed one.
    pub value: Option<String>,
    /// Run when the response is settled.
    pub callback: Option<ResponseCallback>,
}

impl AnsiRequest {
    /// A query with no expected value and no callback.
    #[must_use]
    pub fn new(request: impl Into<String>, terminator: impl Into<String>) -> Self {
        Self {
            request: request.into(),
            terminator: terminator.into(),
            value: None,
            callback: None,
        }
    }

    /// Set the expected first parameter.
    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Attach a response callback.
    #[must_use]
    pub fn with_callback(mut self, f: impl FnOnce(&AnsiResponse) + 'static) -> Self {
        self.callback = Some(Box::new(f));
        self
    }

    /// Cursor position report: `CSI 6 n` → `CSI row ; col R`.
    #[must_use]
    pub fn cursor_position() -> Self {
        Self::new("\x1b[6n", "R")
    }

    /// Primary device attributes: `CSI c` → `CSI ? … c`.
    #[must_use]
    pub fn device_attributes() -> Self {
        Self::new("\x1b[c", "c")
    }

    /// Text area size in characters: `CSI 18 t` → `CSI 8 ; rows ; cols t`.
    #[must_use]
    pub fn text_area_size() -> Self {
        Self::new("\x1b[18t", "t").with_value("8")
    }

    /// Sixel color register count (XTSMGRAPHICS read):
    /// `CSI ? 1 ; 1 ; 0 S` → `CSI ? 1 ; status ; n S`, status 0 on success.
    #[must_use]
    pub fn sixel_color_registers() -> Self {
        Self::new("\x1b[?1;1;0S", "S").with_value("1")
    }

    /// Character cell size in pixels: `CSI 16 t` → `CSI 6 ; h ; w t`.
    #[must_use]
    pub fn cell_size_pixels() -> Self {
        Self::new("\x1b[16t", "t").with_value("6")
    }

    fn final_char(&self) -> Option<char> {
        self.terminator.chars().last()
    }

    fn settle(self, response: &AnsiResponse) {
        if let Some(cb) = self.callback {
            cb(response);
        }
    }
}

impl fmt::Debug for AnsiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnsiRequest")
            .field("request", &self.request)
            .field("terminator", &self.terminator)
            .field("value", &self.value)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

/// The settled outcome of a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnsiResponse {
    /// The reply exactly as received.
    pub raw: String,
    /// The reply's first parameter. Compare it with the request's
    /// expected value to tell which report came back.
    pub value: Option<String>,
    /// Empty on success.
    pub error: String,
}

impl AnsiResponse {
    fn failed(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            ..Self::default()
        }
    }

    /// No error and a non-empty reply.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_empty() && !self.raw.is_empty()
    }

    /// The reply parsed into its parts.
    #[must_use]
    pub fn reply(&self) -> Option<AnsiReply> {
        AnsiReply::parse(&self.raw)
    }
}

// ─── Reply grammar ───────────────────────────────────────────────────────────

/// A reply split into introducer, private code, parameters and final.
///
/// ```
/// use tessera_term::request::AnsiReply;
///
/// let r = AnsiReply::parse("\x1b[?1;2c").unwrap();
/// assert_eq!(r.c1, "\x1b[");
/// assert_eq!(r.code, "?");
/// assert_eq!(r.values, ["1", "2"]);
/// assert_eq!(r.terminator, "c");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnsiReply {
    /// `ESC [`, `ESC ]`, `ESC P`, `ESC O`, or the 8-bit CSI.
    pub c1: String,
    /// Private-marker prefix such as `?` or `>`; may be empty.
    pub code: String,
    /// Semicolon-separated parameters.
    pub values: Vec<String>,
    /// Final character.
    pub terminator: String,
}

impl AnsiReply {
    /// Split `raw`; `None` if it is not an escape sequence with a final
    /// character.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let (c1, body) = if let Some(rest) = raw.strip_prefix('\u{9b}') {
            ("\u{9b}", rest)
        } else {
            let rest = raw.strip_prefix('\x1b')?;
            let intro = rest.chars().next().filter(|c| matches!(c, '[' | ']' | 'P' | 'O'))?;
            (&raw[..1 + intro.len_utf8()], &rest[intro.len_utf8()..])
        };

        let terminator = body.chars().last()?;
        let inner = &body[..body.len() - terminator.len_utf8()];
        let code_len = inner
            .find(|c: char| c.is_ascii_digit() || c == ';')
            .unwrap_or(inner.len());
        let (code, params) = inner.split_at(code_len);

        let values = if params.is_empty() {
            Vec::new()
        } else {
            params.split(';').map(str::to_owned).collect()
        };

        Some(Self {
            c1: c1.to_owned(),
            code: code.to_owned(),
            values,
            terminator: terminator.to_string(),
        })
    }

    /// Parameter `i` as a number.
    #[must_use]
    pub fn number(&self, i: usize) -> Option<u32> {
        self.values.get(i)?.parse().ok()
    }
}

// ─── Transport seam ──────────────────────────────────────────────────────────

/// What the correlator needs from a driver.
pub trait AnsiTransport {
    /// Write the query bytes and flush.
    ///
    /// # Errors
    ///
    /// I/O failure on the console.
    fn write_request(&mut self, request: &str) -> Result<()>;

    /// Read input until `terminator` or `timeout`.
    ///
    /// # Errors
    ///
    /// `Error::Io` with `ErrorKind::TimedOut` when nothing arrives in time.
    fn read_response(&mut self, terminator: char, timeout: Duration) -> Result<String>;

    /// Toggle any-motion mouse reports.
    ///
    /// # Errors
    ///
    /// I/O failure on the console.
    fn set_mouse_move_reporting(&mut self, on: bool) -> Result<()>;

    /// Pause or resume normal input decoding.
    fn set_input_suspended(&mut self, suspended: bool);
}

// ─── Correlator ──────────────────────────────────────────────────────────────

struct Outstanding {
    request: AnsiRequest,
    sent_at: Instant,
}

/// Request/response bookkeeping for one console.
pub struct AnsiCorrelator {
    response_timeout: Duration,
    stale_after: Duration,
    outstanding: VecDeque<Outstanding>,
}

impl AnsiCorrelator {
    /// Correlator with the given synchronous read timeout and async
    /// staleness limit.
    #[must_use]
    pub const fn new(response_timeout: Duration, stale_after: Duration) -> Self {
        Self {
            response_timeout,
            stale_after,
            outstanding: VecDeque::new(),
        }
    }

    /// Run one query synchronously. Returns `(success, response)`.
    pub fn try_execute(
        &self,
        transport: &mut impl AnsiTransport,
        request: AnsiRequest,
    ) -> (bool, AnsiResponse) {
        let Some(last) = request.final_char() else {
            let response = AnsiResponse::failed(EMPTY_TERMINATOR);
            request.settle(&response);
            return (false, response);
        };

        if let Err(err) = transport.set_mouse_move_reporting(false) {
            debug!(%err, "could not pause mouse-move reporting");
        }
        transport.set_input_suspended(true);

        let response = self.exchange(transport, &request, last);

        transport.set_input_suspended(false);
        if let Err(err) = transport.set_mouse_move_reporting(true) {
            debug!(%err, "could not resume mouse-move reporting");
        }

        debug!(request = ?request.request, raw = ?response.raw, error = %response.error, "query settled");
        request.settle(&response);
        (response.is_success(), response)
    }

    fn exchange(
        &self,
        transport: &mut impl AnsiTransport,
        request: &AnsiRequest,
        last: char,
    ) -> AnsiResponse {
        if let Err(err) = transport.write_request(&request.request) {
            return AnsiResponse::failed(err.to_string());
        }

        match transport.read_response(last, self.response_timeout) {
            Ok(raw) => build_response(request, raw),
            Err(Error::Io(err)) if err.kind() == std::io::ErrorKind::TimedOut => {
                AnsiResponse::failed(TIMED_OUT)
            }
            Err(err) => AnsiResponse::failed(err.to_string()),
        }
    }

    /// Queue a query and write it. Returns `false` (after settling the
    /// request with an error) if it could not be sent.
    pub fn send(
        &mut self,
        transport: &mut impl AnsiTransport,
        request: AnsiRequest,
        now: Instant,
    ) -> bool {
        let Some(last) = request.final_char() else {
            request.settle(&AnsiResponse::failed(EMPTY_TERMINATOR));
            return false;
        };

        if let Err(err) = transport.write_request(&request.request) {
            request.settle(&AnsiResponse::failed(err.to_string()));
            return false;
        }

        if self.outstanding.iter().any(|o| o.request.final_char() == Some(last)) {
            debug!(terminator = %last, "another query with this terminator is outstanding");
        }
        self.outstanding.push_back(Outstanding { request, sent_at: now });
        true
    }

    /// Match a reply to the oldest outstanding query with the same final
    /// character. Returns whether anything matched.
    pub fn on_response(&mut self, raw: &str) -> bool {
        let Some(last) = raw.chars().last() else {
            return false;
        };
        let Some(idx) = self
            .outstanding
            .iter()
            .position(|o| o.request.final_char() == Some(last))
        else {
            warn!(?raw, "reply with no outstanding query");
            return false;
        };
        let Some(Outstanding { request, .. }) = self.outstanding.remove(idx) else {
            return false;
        };

        let response = build_response(&request, raw.to_owned());
        debug!(request = ?request.request, ?raw, "reply matched");
        request.settle(&response);
        true
    }

    /// Fail every query older than the staleness limit. Returns how many.
    pub fn evict_stale(&mut self, now: Instant) -> usize {
        let limit = self.stale_after;
        let (stale, fresh): (VecDeque<_>, VecDeque<_>) = std::mem::take(&mut self.outstanding)
            .into_iter()
            .partition(|o| now.saturating_duration_since(o.sent_at) > limit);
        self.outstanding = fresh;

        let count = stale.len();
        for o in stale {
            warn!(request = ?o.request.request, "query timed out");
            o.request.settle(&AnsiResponse::failed(TIMED_OUT));
        }
        count
    }

    /// Whether an outstanding query would claim a reply ending in `last`.
    #[must_use]
    pub fn awaits(&self, last: char) -> bool {
        self.outstanding
            .iter()
            .any(|o| o.request.final_char() == Some(last))
    }

    /// Number of queries awaiting a reply.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.outstanding.len()
    }

    /// Final characters of outstanding queries, oldest first, no repeats.
    #[must_use]
    pub fn outstanding_terminators(&self) -> Vec<char> {
        let mut out = Vec::new();
        for c in self.outstanding.iter().filter_map(|o| o.request.final_char()) {
            if !out.contains(&c) {
                out.push(c);
            }
        }
        out
    }
}

impl Default for AnsiCorrelator {
    fn default() -> Self {
        Self::new(Duration::from_millis(500), Duration::from_secs(2))
    }
}

impl fmt::Debug for AnsiCorrelator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnsiCorrelator")
            .field("response_timeout", &self.response_timeout)
            .field("stale_after", &self.stale_after)
            .field("pending", &self.outstanding.len())
            .finish()
    }
}

fn build_response(request: &AnsiRequest, raw: String) -> AnsiResponse {
    let Some(last) = request.final_char() else {
        return AnsiResponse::failed(EMPTY_TERMINATOR);
    };
    if !raw.ends_with(last) {
        return AnsiResponse {
            raw,
            value: None,
            error: format!("Terminator doesn't end with: '{last}'"),
        };
    }

    // A matching expected value and the first parameter are the same
    // string, so the first parameter is always what gets reported.
    let value = AnsiReply::parse(&raw).and_then(|r| r.values.into_iter().next());

    AnsiResponse {
        raw,
        value,
        error: String::new(),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
