// SPDX-License-Identifier: MIT
//
// VT/xterm driver.
//
// Output is any `Write` sink. Each frame is encoded into one OutputBuffer
// and handed to the sink in a single write; the frame trailer hides the
// cursor, so every frame marks the tracked visibility stale and
// `update_screen` re-applies it.
//
// Input arrives as byte chunks on a channel (the stdin reader thread in
// production, a test sender otherwise). Chunks go through the ANSI parser;
// events queue up for `read_input`, query replies go to the correlator.
//
// A lone ESC is held by the parser until a tick passes with no new bytes,
// then flushed as the Escape key.

use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use super::{ConsoleDriver, clip_window};
use crate::ansi::{self, MouseMode};
use crate::buffer::Rect;
use crate::cell::Cell;
use crate::config::DriverConfig;
use crate::cursor::{CursorBackend, CursorTracker, CursorVisibility};
use crate::error::{Error, Result};
use crate::event::Event;
use crate::input::Parser;
use crate::output::{self, OutputBuffer};
use crate::reader::InputReader;
use crate::request::{AnsiCorrelator, AnsiRequest, AnsiResponse, AnsiTransport};
use crate::terminal::{self, Size, Terminal};

/// How long `read_input` waits for bytes; doubles as the ESC timeout.
const TICK: Duration = Duration::from_micros(8333);

/// Cursor control over a VT sink. Terminals cannot report cursor
/// visibility, so there is no initial value to capture.
struct VtCursor<'a, W: Write>(&'a mut W);

impl<W: Write> CursorBackend for VtCursor<'_, W> {
    fn can_apply(&self) -> bool {
        true
    }

    fn query(&mut self) -> Option<CursorVisibility> {
        None
    }

    fn apply(&mut self, vis: CursorVisibility) -> Result<()> {
        ansi::set_cursor_visibility(self.0, vis)?;
        self.0.flush()?;
        Ok(())
    }
}

/// Driver for VT-capable terminals.
///
/// ```no_run
/// use tessera_term::config::DriverConfig;
/// use tessera_term::driver::{AnsiDriver, ConsoleDriver};
///
/// let mut driver = AnsiDriver::stdout(DriverConfig::default())?;
/// while let Some(event) = driver.read_input()? {
///     eprintln!("{event:?}");
/// }
/// # Ok::<(), tessera_term::Error>(())
/// ```
pub struct AnsiDriver<W: Write> {
    out: W,
    frame: OutputBuffer,
    config: DriverConfig,
    size: Size,
    cursor: CursorTracker,
    parser: Parser,
    input: Option<Receiver<Vec<u8>>>,
    queued: VecDeque<Event>,
    queries: AnsiCorrelator,
    input_suspended: bool,
    // Drop order: the reader stops before the terminal is restored.
    reader: Option<InputReader>,
    terminal: Option<Terminal>,
}

impl AnsiDriver<io::Stdout> {
    /// Take over the process's terminal: raw mode, the alternate screen and
    /// mouse reporting per `config`, plus a stdin reader thread. Everything
    /// is undone when the driver is dropped.
    ///
    /// # Errors
    ///
    /// Fails if the terminal cannot be switched or the reader thread cannot
    /// be spawned.
    pub fn stdout(config: DriverConfig) -> Result<Self> {
        let mut term = Terminal::new(&config);
        term.enter()?;
        terminal::install_resize_handler();
        let (reader, rx) = InputReader::stdin()?;

        let cursor = config.cursor;
        let mut driver = Self::new(io::stdout(), term.size(), config).with_input(rx);
        driver.reader = Some(reader);
        driver.terminal = Some(term);
        driver.set_cursor_visibility(cursor);
        debug!(size = ?driver.size, "ansi driver started");
        Ok(driver)
    }
}

impl<W: Write> AnsiDriver<W> {
    /// Driver writing to `out`, with no input source.
    #[must_use]
    pub fn new(out: W, size: Size, config: DriverConfig) -> Self {
        let queries =
            AnsiCorrelator::new(config.response_timeout(), config.stale_request_timeout());
        Self {
            out,
            frame: OutputBuffer::new(),
            config,
            size,
            cursor: CursorTracker::new(),
            parser: Parser::new(),
            input: None,
            queued: VecDeque::new(),
            queries,
            input_suspended: false,
            reader: None,
            terminal: None,
        }
    }

    /// Read input bytes from `rx`.
    #[must_use]
    pub fn with_input(mut self, rx: Receiver<Vec<u8>>) -> Self {
        self.input = Some(rx);
        self
    }

    /// The output sink.
    #[must_use]
    pub const fn writer(&self) -> &W {
        &self.out
    }

    /// Mutable access to the output sink.
    pub const fn writer_mut(&mut self) -> &mut W {
        &mut self.out
    }

    /// Settings the driver runs with.
    #[must_use]
    pub const fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Record a new console size and report it as a resize event.
    pub fn resize(&mut self, size: Size) {
        if size != self.size {
            self.size = size;
            self.queued.push_back(Event::Resize(size));
        }
    }

    // ─── Queries ────────────────────────────────────────────────────────

    /// Run a query and wait for its reply. Input that arrives meanwhile is
    /// kept for `read_input`.
    pub fn query(&mut self, request: AnsiRequest) -> (bool, AnsiResponse) {
        let sync = AnsiCorrelator::new(
            self.config.response_timeout(),
            self.config.stale_request_timeout(),
        );
        sync.try_execute(self, request)
    }

    /// Send a query without waiting. The reply settles it from inside a
    /// later `read_input`.
    pub fn send_query(&mut self, request: AnsiRequest) -> bool {
        let mut queries = std::mem::take(&mut self.queries);
        let sent = queries.send(self, request, Instant::now());
        self.queries = queries;
        self.sync_expected();
        sent
    }

    /// Queries sent with `send_query` still waiting for a reply.
    #[must_use]
    pub fn pending_queries(&self) -> usize {
        self.queries.pending()
    }

    /// Ask the terminal where the cursor is, as 0-indexed `(x, y)`.
    pub fn cursor_position_report(&mut self) -> Option<(u16, u16)> {
        let (ok, response) = self.query(AnsiRequest::cursor_position());
        if !ok {
            return None;
        }
        let reply = response.reply()?;
        let row = u16::try_from(reply.number(0)?).ok()?;
        let col = u16::try_from(reply.number(1)?).ok()?;
        Some((col.saturating_sub(1), row.saturating_sub(1)))
    }

    // ─── Input plumbing ─────────────────────────────────────────────────

    fn feed(&mut self, bytes: &[u8]) {
        let events = self.parser.advance(bytes);
        self.queued.extend(events);
        for reply in self.parser.take_replies() {
            self.queries.on_response(&reply);
        }
        self.sync_expected();
    }

    /// Keep the parser diverting exactly the replies someone waits for.
    fn sync_expected(&mut self) {
        self.parser.clear_expected();
        for c in self.queries.outstanding_terminators() {
            self.parser.expect_reply(c);
        }
    }

    fn poll_resize(&mut self) {
        if let Some(term) = self.terminal.as_mut() {
            if terminal::take_resize() {
                let size = term.refresh_size();
                self.resize(size);
            }
        }
    }
}

impl<W: Write> ConsoleDriver for AnsiDriver<W> {
    fn size(&self) -> Size {
        self.size
    }

    fn force_16_colors(&self) -> bool {
        self.config.force_16_colors
    }

    fn write_to_console(
        &mut self,
        size: Size,
        cells: &[Cell],
        buffer_size: Size,
        window: Rect,
        force_16_colors: bool,
    ) -> Result<bool> {
        let window = clip_window(window, buffer_size);
        if size.cols == 0 || cells.is_empty() || window.is_empty() {
            return Ok(false);
        }

        self.frame.clear();
        output::encode_frame(&mut self.frame, size, cells, window, force_16_colors);
        let bytes = self.frame.len();
        self.frame.flush_to(&mut self.out)?;

        // The trailer hid the cursor.
        self.cursor.force_refresh();
        trace!(bytes, force_16_colors, "frame written");
        Ok(true)
    }

    fn set_cursor_position(&mut self, x: u16, y: u16) -> Result<()> {
        ansi::cursor_to(&mut self.out, x, y)?;
        self.out.flush()?;
        Ok(())
    }

    fn cursor_visibility(&mut self) -> Option<CursorVisibility> {
        self.cursor.get(&mut VtCursor(&mut self.out))
    }

    fn set_cursor_visibility(&mut self, vis: CursorVisibility) -> bool {
        self.cursor.set(&mut VtCursor(&mut self.out), vis)
    }

    fn ensure_cursor_visibility(&mut self) -> bool {
        self.cursor.ensure(&mut VtCursor(&mut self.out))
    }

    fn force_refresh_cursor_visibility(&mut self) {
        self.cursor.force_refresh();
    }

    fn read_input(&mut self) -> Result<Option<Event>> {
        self.poll_resize();
        if let Some(event) = self.queued.pop_front() {
            return Ok(Some(event));
        }
        if self.input_suspended {
            return Ok(None);
        }
        let Some(rx) = self.input.as_ref() else {
            return Ok(None);
        };

        match rx.recv_timeout(TICK) {
            Ok(bytes) => self.feed(&bytes),
            Err(RecvTimeoutError::Timeout) => {
                if self.parser.has_pending() {
                    let events = self.parser.flush();
                    self.queued.extend(events);
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                debug!("input source closed");
                self.input = None;
            }
        }

        let evicted = self.queries.evict_stale(Instant::now());
        if evicted > 0 {
            self.sync_expected();
        }
        Ok(self.queued.pop_front())
    }
}

impl<W: Write> AnsiTransport for AnsiDriver<W> {
    fn write_request(&mut self, request: &str) -> Result<()> {
        self.out.write_all(request.as_bytes())?;
        self.out.flush()?;
        Ok(())
    }

    fn read_response(&mut self, terminator: char, timeout: Duration) -> Result<String> {
        let Some(rx) = self.input.as_ref() else {
            return Err(Error::Unsupported("no input source for query replies"));
        };
        self.parser.expect_reply(terminator);
        let deadline = Instant::now() + timeout;

        let result = loop {
            // Replies arrive in request order, so an older async query with
            // the same final character claims the first one.
            let mut found = None;
            for reply in self.parser.take_replies() {
                if found.is_none()
                    && reply.ends_with(terminator)
                    && !self.queries.awaits(terminator)
                {
                    found = Some(reply);
                } else {
                    self.queries.on_response(&reply);
                }
            }
            if let Some(reply) = found {
                break Ok(reply);
            }

            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                break Err(Error::Io(io::ErrorKind::TimedOut.into()));
            }
            match rx.recv_timeout(left) {
                Ok(bytes) => {
                    let events = self.parser.advance(&bytes);
                    self.queued.extend(events);
                }
                Err(RecvTimeoutError::Timeout) => {
                    break Err(Error::Io(io::ErrorKind::TimedOut.into()));
                }
                Err(RecvTimeoutError::Disconnected) => {
                    break Err(Error::Io(io::ErrorKind::UnexpectedEof.into()));
                }
            }
        };

        self.sync_expected();
        result
    }

    fn set_mouse_move_reporting(&mut self, on: bool) -> Result<()> {
        if self.config.mouse == MouseMode::Motion {
            ansi::set_mouse_motion(&mut self.out, on)?;
            self.out.flush()?;
        }
        Ok(())
    }

    fn set_input_suspended(&mut self, suspended: bool) {
        self.input_suspended = suspended;
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::ScreenBuffer;
    use crate::event::{KeyCode, KeyEvent, Modifiers};
    use crate::request::TIMED_OUT;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::mpsc::{self, Sender};

    fn driver(config: DriverConfig) -> (AnsiDriver<Vec<u8>>, Sender<Vec<u8>>) {
        let (tx, rx) = mpsc::channel();
        let d = AnsiDriver::new(Vec::new(), Size { cols: 4, rows: 2 }, config).with_input(rx);
        (d, tx)
    }

    fn quick() -> DriverConfig {
        DriverConfig {
            response_timeout_ms: 20,
            stale_request_ms: 20,
            ..DriverConfig::default()
        }
    }

    fn written(d: &AnsiDriver<Vec<u8>>) -> String {
        String::from_utf8_lossy(d.writer()).into_owned()
    }

    fn key(c: char) -> Event {
        Event::Key(KeyEvent::new(KeyCode::Char(c), Modifiers::empty()))
    }

    // ── Frames ──────────────────────────────────────────────────────────

    #[test]
    fn frame_is_one_write_with_trailer() {
        let (mut d, _tx) = driver(quick());
        let mut buf = ScreenBuffer::new(4, 2);
        buf.add_str("hi");
        assert!(d.update_screen(&mut buf).unwrap());
        let out = written(&d);
        assert!(out.starts_with("\x1b7\x1b[1;1H"));
        assert!(out.contains("hi"));
        assert!(out.ends_with("\x1b[0m\x1b8\x1b[?25l"));
        assert!(!buf.any_dirty());
    }

    #[test]
    fn clean_buffer_writes_nothing() {
        let (mut d, _tx) = driver(quick());
        let mut buf = ScreenBuffer::new(4, 2);
        buf.clear_dirty();
        assert!(!d.update_screen(&mut buf).unwrap());
        assert!(d.writer().is_empty());
    }

    #[test]
    fn visibility_is_restored_after_each_frame() {
        let (mut d, _tx) = driver(quick());
        assert!(d.set_cursor_visibility(CursorVisibility::Vertical));
        d.writer_mut().clear();

        let mut buf = ScreenBuffer::new(4, 2);
        d.update_screen(&mut buf).unwrap();
        assert!(written(&d).ends_with("\x1b[?25l\x1b[5 q\x1b[?25h"));
    }

    #[test]
    fn repeated_visibility_is_not_rewritten() {
        let (mut d, _tx) = driver(quick());
        d.set_cursor_visibility(CursorVisibility::Invisible);
        d.set_cursor_visibility(CursorVisibility::Invisible);
        assert_eq!(written(&d), "\x1b[?25l");
        assert_eq!(d.cursor_visibility(), Some(CursorVisibility::Invisible));
    }

    #[test]
    fn unknown_visibility_before_any_set() {
        let (mut d, _tx) = driver(quick());
        assert_eq!(d.cursor_visibility(), None);
    }

    #[test]
    fn force_16_frames_use_named_codes() {
        let (mut d, _tx) = driver(DriverConfig {
            force_16_colors: true,
            ..quick()
        });
        let mut buf = ScreenBuffer::new(1, 1);
        d.update_screen(&mut buf).unwrap();
        assert!(!written(&d).contains("38;2;"));
    }

    #[test]
    fn cursor_position_is_one_based_on_the_wire() {
        let (mut d, _tx) = driver(quick());
        d.set_cursor_position(2, 0).unwrap();
        assert_eq!(written(&d), "\x1b[1;3H");
    }

    // ── Input ───────────────────────────────────────────────────────────

    #[test]
    fn keys_arrive_in_order() {
        let (mut d, tx) = driver(quick());
        tx.send(b"ab".to_vec()).unwrap();
        assert_eq!(d.read_input().unwrap(), Some(key('a')));
        assert_eq!(d.read_input().unwrap(), Some(key('b')));
        assert_eq!(d.read_input().unwrap(), None);
    }

    #[test]
    fn lone_escape_flushes_after_a_quiet_tick() {
        let (mut d, tx) = driver(quick());
        tx.send(vec![0x1b]).unwrap();
        assert_eq!(d.read_input().unwrap(), None);
        assert_eq!(
            d.read_input().unwrap(),
            Some(Event::Key(KeyEvent::new(KeyCode::Escape, Modifiers::empty())))
        );
    }

    #[test]
    fn closed_input_yields_nothing() {
        let (mut d, tx) = driver(quick());
        drop(tx);
        assert_eq!(d.read_input().unwrap(), None);
        assert_eq!(d.read_input().unwrap(), None);
    }

    #[test]
    fn resize_is_reported_once() {
        let (mut d, _tx) = driver(quick());
        d.resize(Size { cols: 10, rows: 3 });
        d.resize(Size { cols: 10, rows: 3 });
        assert_eq!(d.size(), Size { cols: 10, rows: 3 });
        assert_eq!(
            d.read_input().unwrap(),
            Some(Event::Resize(Size { cols: 10, rows: 3 }))
        );
        assert_eq!(d.read_input().unwrap(), None);
    }

    // ── Queries ─────────────────────────────────────────────────────────

    #[test]
    fn cursor_report_round_trip() {
        let (mut d, tx) = driver(quick());
        tx.send(b"x\x1b[5;10R".to_vec()).unwrap();
        assert_eq!(d.cursor_position_report(), Some((9, 4)));
        assert!(written(&d).contains("\x1b[6n"));
        // Typed ahead of the reply, still delivered.
        assert_eq!(d.read_input().unwrap(), Some(key('x')));
    }

    #[test]
    fn query_times_out() {
        let (mut d, _tx) = driver(quick());
        let (ok, resp) = d.query(AnsiRequest::device_attributes());
        assert!(!ok);
        assert_eq!(resp.error, TIMED_OUT);
    }

    #[test]
    fn query_without_input_is_an_error() {
        let mut d = AnsiDriver::new(Vec::new(), Size::default(), quick());
        let (ok, resp) = d.query(AnsiRequest::cursor_position());
        assert!(!ok);
        assert!(!resp.error.is_empty());
    }

    #[test]
    fn motion_reporting_paused_only_in_motion_mode() {
        let (mut d, tx) = driver(DriverConfig {
            mouse: MouseMode::Motion,
            ..quick()
        });
        tx.send(b"\x1b[1;1R".to_vec()).unwrap();
        d.query(AnsiRequest::cursor_position());
        assert_eq!(written(&d), "\x1b[?1003l\x1b[6n\x1b[?1003h");

        let (mut d, tx) = driver(quick());
        tx.send(b"\x1b[1;1R".to_vec()).unwrap();
        d.query(AnsiRequest::cursor_position());
        assert_eq!(written(&d), "\x1b[6n");
    }

    #[test]
    fn async_reply_settles_from_read_input() {
        let (mut d, tx) = driver(quick());
        let seen = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&seen);
        assert!(d.send_query(
            AnsiRequest::device_attributes()
                .with_callback(move |r| *sink.borrow_mut() = r.value.clone())
        ));
        assert_eq!(d.pending_queries(), 1);

        tx.send(b"\x1b[?62;4c".to_vec()).unwrap();
        assert_eq!(d.read_input().unwrap(), None);
        assert_eq!(d.pending_queries(), 0);
        assert_eq!(seen.borrow().as_deref(), Some("62"));
    }

    #[test]
    fn sync_query_waits_behind_older_async_query() {
        let (mut d, tx) = driver(quick());
        let seen = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&seen);
        assert!(d.send_query(
            AnsiRequest::cursor_position().with_callback(move |r| *sink.borrow_mut() = Some(r.raw.clone()))
        ));

        tx.send(b"\x1b[1;1R\x1b[2;2R".to_vec()).unwrap();
        let (ok, resp) = d.query(AnsiRequest::cursor_position());
        assert!(ok, "{}", resp.error);
        assert_eq!(resp.raw, "\x1b[2;2R");
        assert_eq!(d.pending_queries(), 0);
        assert_eq!(seen.borrow().as_deref(), Some("\x1b[1;1R"));
    }

    #[test]
    fn lone_reply_goes_to_the_older_async_query() {
        let (mut d, tx) = driver(quick());
        let seen = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&seen);
        d.send_query(
            AnsiRequest::cursor_position().with_callback(move |r| *sink.borrow_mut() = Some(r.raw.clone())),
        );

        tx.send(b"\x1b[5;7R".to_vec()).unwrap();
        let (ok, _) = d.query(AnsiRequest::cursor_position());
        assert!(!ok);
        assert_eq!(d.pending_queries(), 0);
        assert_eq!(seen.borrow().as_deref(), Some("\x1b[5;7R"));
    }

    #[test]
    fn unanswered_async_query_goes_stale() {
        let (mut d, _tx) = driver(quick());
        let failed = Rc::new(RefCell::new(String::new()));
        let sink = Rc::clone(&failed);
        d.send_query(
            AnsiRequest::cursor_position().with_callback(move |r| *sink.borrow_mut() = r.error.clone()),
        );
        std::thread::sleep(Duration::from_millis(40));
        d.read_input().unwrap();
        assert_eq!(d.pending_queries(), 0);
        assert_eq!(*failed.borrow(), TIMED_OUT);
    }
}
