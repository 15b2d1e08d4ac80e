// SPDX-License-Identifier: MIT
//
// ANSI input parser.
//
// Turns raw terminal bytes into `Event`s. Handles what `Terminal::enter`
// turns on:
//
// - Legacy CSI sequences (arrows, editing keys, function keys) with xterm
//   modifier parameters
// - SS3 sequences (F1–F4 and arrows in application mode)
// - SGR mouse reports (press / release / drag / motion / wheel)
// - Bracketed paste
// - Focus reports
// - Alt+key (ESC followed by a character)
// - UTF-8 multi-byte characters
//
// Replies to escape-sequence queries share the stream with keystrokes.
// `CSI ? … c` (device attributes), `CSI ? … S` (graphics attributes) and
// `CSI … t` (window reports) are never keys, so they are always diverted
// into the reply queue. `CSI row;col R`
// collides with modified F3, so it is treated as a reply only while a
// query expecting `R` is outstanding (`expect_reply`).
//
// Escape sequences can span reads: incomplete input stays buffered until
// the next `advance`. A lone ESC is ambiguous; call `flush` after a short
// quiet period to turn it into an Escape keypress.

use crate::event::{Event, KeyCode, KeyEvent, Modifiers, MouseEvent, MouseFlags};

// ─── Parser ──────────────────────────────────────────────────────────────────

const PASTE_START: &[u8] = b"\x1b[200~";
const PASTE_END: &[u8] = b"\x1b[201~";

/// Stateful ANSI input decoder.
pub struct Parser {
    buf: Vec<u8>,
    in_paste: bool,
    expected: Vec<u8>,
    replies: Vec<String>,
    /// Button and position of the last press, for click synthesis.
    pressed: Option<(u8, u16, u16)>,
}

impl Parser {
    /// Empty parser.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(64),
            in_paste: false,
            expected: Vec::new(),
            replies: Vec::new(),
            pressed: None,
        }
    }

    /// Treat CSI sequences ending in `terminator` as query replies until
    /// [`clear_expected`](Self::clear_expected).
    pub fn expect_reply(&mut self, terminator: char) {
        if let Ok(b) = u8::try_from(terminator) {
            if !self.expected.contains(&b) {
                self.expected.push(b);
            }
        }
    }

    /// Stop diverting the terminators registered with `expect_reply`.
    pub fn clear_expected(&mut self) {
        self.expected.clear();
    }

    /// Replies collected since the last call, oldest first.
    pub fn take_replies(&mut self) -> Vec<String> {
        std::mem::take(&mut self.replies)
    }

    /// Feed bytes, get every event they complete.
    pub fn advance(&mut self, data: &[u8]) -> Vec<Event> {
        self.buf.extend_from_slice(data);
        let mut events = Vec::new();
        let mut pos = 0;

        while pos < self.buf.len() {
            if self.in_paste {
                let remaining = &self.buf[pos..];
                if let Some(end) = find_subsequence(remaining, PASTE_END) {
                    let text = String::from_utf8_lossy(&remaining[..end]).into_owned();
                    events.push(Event::Paste(text));
                    pos += end + PASTE_END.len();
                    self.in_paste = false;
                    continue;
                }
                break;
            }

            let remaining = &self.buf[pos..];
            if remaining.starts_with(PASTE_START) {
                self.in_paste = true;
                pos += PASTE_START.len();
                continue;
            }
            if remaining.len() < PASTE_START.len()
                && remaining.len() > 2
                && PASTE_START.starts_with(remaining)
            {
                break;
            }

            match try_parse(remaining, &self.expected) {
                Parsed::Event(event, consumed) => {
                    events.push(self.synthesize_click(event));
                    pos += consumed;
                }
                Parsed::Reply(consumed) => {
                    let raw = String::from_utf8_lossy(&remaining[..consumed]).into_owned();
                    self.replies.push(raw);
                    pos += consumed;
                }
                Parsed::Incomplete => break,
                Parsed::Skip(n) => pos += n,
            }
        }

        if pos > 0 {
            self.buf.drain(..pos);
        }
        events
    }

    /// Whether bytes are waiting for the rest of a sequence.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.buf.is_empty()
    }

    /// Emit leftover bytes as literal keys (a lone ESC becomes Escape).
    pub fn flush(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        for &byte in &self.buf {
            let key = match byte {
                0x1B => KeyEvent::new(KeyCode::Escape, Modifiers::empty()),
                0x7F => KeyEvent::new(KeyCode::Backspace, Modifiers::empty()),
                b @ 0x01..=0x1A => KeyEvent::new(KeyCode::Char((b + b'a' - 1) as char), Modifiers::CTRL),
                b @ 0x20..=0x7E => KeyEvent::new(KeyCode::Char(b as char), Modifiers::empty()),
                _ => continue,
            };
            events.push(Event::Key(key));
        }
        self.buf.clear();
        self.in_paste = false;
        events
    }

    /// A release at the spot of the matching press also counts as a click.
    fn synthesize_click(&mut self, event: Event) -> Event {
        let Event::Mouse(mut me) = event else {
            return event;
        };
        for n in 1..=3 {
            if me.flags.contains(MouseFlags::pressed(n))
                && !me.flags.contains(MouseFlags::REPORT_MOUSE_POSITION)
            {
                self.pressed = Some((n, me.x, me.y));
            } else if me.flags.contains(MouseFlags::released(n)) {
                if self.pressed == Some((n, me.x, me.y)) {
                    me.flags |= MouseFlags::clicked(n);
                }
                self.pressed = None;
            }
        }
        if me.flags.contains(MouseFlags::REPORT_MOUSE_POSITION) {
            if let Some((_, px, py)) = self.pressed {
                if (px, py) != (me.x, me.y) {
                    self.pressed = None;
                }
            }
        }
        Event::Mouse(me)
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Stateless parsing ───────────────────────────────────────────────────────

enum Parsed {
    Event(Event, usize),
    Reply(usize),
    Incomplete,
    Skip(usize),
}

fn try_parse(buf: &[u8], expected: &[u8]) -> Parsed {
    match buf[0] {
        0x1B => parse_escape(buf, expected),
        0x00 => Parsed::Event(key(KeyCode::Char(' '), Modifiers::CTRL), 1),
        0x08 | 0x7F => Parsed::Event(key(KeyCode::Backspace, Modifiers::empty()), 1),
        0x09 => Parsed::Event(key(KeyCode::Tab, Modifiers::empty()), 1),
        0x0A | 0x0D => Parsed::Event(key(KeyCode::Enter, Modifiers::empty()), 1),
        b @ (0x01..=0x07 | 0x0B..=0x0C | 0x0E..=0x1A) => {
            Parsed::Event(key(KeyCode::Char((b + b'a' - 1) as char), Modifiers::CTRL), 1)
        }
        b @ 0x20..=0x7E => Parsed::Event(key(KeyCode::Char(b as char), Modifiers::empty()), 1),
        0xC0..=0xFF => parse_utf8(buf),
        _ => Parsed::Skip(1),
    }
}

// ── Escape sequences ────────────────────────────────────────────────────────

fn parse_escape(buf: &[u8], expected: &[u8]) -> Parsed {
    if buf.len() < 2 {
        return Parsed::Incomplete;
    }

    match buf[1] {
        b'[' => parse_csi(buf, expected),
        b'O' => parse_ss3(buf),
        0x1B => Parsed::Event(key(KeyCode::Escape, Modifiers::ALT), 2),
        b @ 0x20..=0x7E => Parsed::Event(key(KeyCode::Char(b as char), Modifiers::ALT), 2),
        b @ 0x01..=0x1A => Parsed::Event(
            key(KeyCode::Char((b + b'a' - 1) as char), Modifiers::ALT | Modifiers::CTRL),
            2,
        ),
        _ => Parsed::Event(key(KeyCode::Escape, Modifiers::empty()), 1),
    }
}

// ── CSI ─────────────────────────────────────────────────────────────────────

fn parse_csi(buf: &[u8], expected: &[u8]) -> Parsed {
    if buf.len() < 3 {
        return Parsed::Incomplete;
    }

    match buf[2] {
        b'<' => return parse_sgr_mouse(buf),
        b'I' => return Parsed::Event(Event::FocusGained, 3),
        b'O' => return Parsed::Event(Event::FocusLost, 3),
        _ => {}
    }

    // Parameters 0x30–0x3F, intermediates 0x20–0x2F, final 0x40–0x7E.
    let mut end = 2;
    while end < buf.len() {
        let b = buf[end];
        if (0x40..=0x7E).contains(&b) {
            break;
        }
        if !(0x20..=0x3F).contains(&b) {
            return Parsed::Skip(end + 1);
        }
        end += 1;
    }
    if end >= buf.len() {
        return Parsed::Incomplete;
    }

    let final_byte = buf[end];
    let params_raw = &buf[2..end];
    let consumed = end + 1;

    if is_reply(final_byte, params_raw, expected) {
        return Parsed::Reply(consumed);
    }

    let params = parse_params(params_raw);
    let modifiers = params.get(1).map_or(Modifiers::empty(), |&p| decode_modifiers(p));

    if final_byte == b'~' {
        let code = match params.first().copied().unwrap_or(0) {
            1 | 7 => KeyCode::Home,
            2 => KeyCode::Insert,
            3 => KeyCode::Delete,
            4 | 8 => KeyCode::End,
            5 => KeyCode::PageUp,
            6 => KeyCode::PageDown,
            11 => KeyCode::F(1),
            12 => KeyCode::F(2),
            13 => KeyCode::F(3),
            14 => KeyCode::F(4),
            15 => KeyCode::F(5),
            17 => KeyCode::F(6),
            18 => KeyCode::F(7),
            19 => KeyCode::F(8),
            20 => KeyCode::F(9),
            21 => KeyCode::F(10),
            23 => KeyCode::F(11),
            24 => KeyCode::F(12),
            _ => return Parsed::Skip(consumed),
        };
        return Parsed::Event(key(code, modifiers), consumed);
    }

    let code = match final_byte {
        b'A' => KeyCode::Up,
        b'B' => KeyCode::Down,
        b'C' => KeyCode::Right,
        b'D' => KeyCode::Left,
        b'H' => KeyCode::Home,
        b'F' => KeyCode::End,
        b'P' => KeyCode::F(1),
        b'Q' => KeyCode::F(2),
        b'R' => KeyCode::F(3),
        b'S' => KeyCode::F(4),
        b'Z' => return Parsed::Event(key(KeyCode::Tab, Modifiers::SHIFT), consumed),
        _ => return Parsed::Skip(consumed),
    };
    Parsed::Event(key(code, modifiers), consumed)
}

fn is_reply(final_byte: u8, params_raw: &[u8], expected: &[u8]) -> bool {
    let private = params_raw.first() == Some(&b'?');
    match final_byte {
        b'c' => private,
        b'S' => private || expected.contains(&b'S'),
        b't' => true,
        _ => expected.contains(&final_byte),
    }
}

// ── SS3 ─────────────────────────────────────────────────────────────────────

fn parse_ss3(buf: &[u8]) -> Parsed {
    if buf.len() < 3 {
        return Parsed::Incomplete;
    }

    let code = match buf[2] {
        b'A' => KeyCode::Up,
        b'B' => KeyCode::Down,
        b'C' => KeyCode::Right,
        b'D' => KeyCode::Left,
        b'H' => KeyCode::Home,
        b'F' => KeyCode::End,
        b'P' => KeyCode::F(1),
        b'Q' => KeyCode::F(2),
        b'R' => KeyCode::F(3),
        b'S' => KeyCode::F(4),
        _ => return Parsed::Skip(3),
    };
    Parsed::Event(key(code, Modifiers::empty()), 3)
}

// ── SGR mouse ───────────────────────────────────────────────────────────────

fn parse_sgr_mouse(buf: &[u8]) -> Parsed {
    // ESC [ < Pb ; Px ; Py M   press / motion
    // ESC [ < Pb ; Px ; Py m   release
    let start = 3;
    let mut end = start;
    while end < buf.len() {
        if buf[end] == b'M' || buf[end] == b'm' {
            break;
        }
        if !buf[end].is_ascii_digit() && buf[end] != b';' {
            return Parsed::Skip(end + 1);
        }
        end += 1;
    }
    if end >= buf.len() {
        return Parsed::Incomplete;
    }

    let is_release = buf[end] == b'm';
    let consumed = end + 1;

    let params = parse_params(&buf[start..end]);
    let cb = params.first().copied().unwrap_or(0);
    let x = params.get(1).copied().unwrap_or(1).saturating_sub(1);
    let y = params.get(2).copied().unwrap_or(1).saturating_sub(1);

    let mut flags = MouseFlags::empty();
    flags.set(MouseFlags::BUTTON_SHIFT, cb & 4 != 0);
    flags.set(MouseFlags::BUTTON_ALT, cb & 8 != 0);
    flags.set(MouseFlags::BUTTON_CTRL, cb & 16 != 0);

    let is_wheel = cb & 64 != 0;
    let is_motion = cb & 32 != 0;
    let base = cb & 3;

    // SGR button numbers: 0 left, 1 middle, 2 right.
    #[allow(clippy::cast_possible_truncation)]
    let button = base as u8 + 1;

    flags |= if is_wheel {
        match base {
            0 => MouseFlags::WHEELED_UP,
            1 => MouseFlags::WHEELED_DOWN,
            2 => MouseFlags::WHEELED_LEFT,
            _ => MouseFlags::WHEELED_RIGHT,
        }
    } else if is_motion {
        if base < 3 {
            MouseFlags::pressed(button) | MouseFlags::REPORT_MOUSE_POSITION
        } else {
            MouseFlags::REPORT_MOUSE_POSITION
        }
    } else if is_release {
        MouseFlags::released(button)
    } else {
        MouseFlags::pressed(button)
    };

    Parsed::Event(Event::Mouse(MouseEvent { x, y, flags }), consumed)
}

// ── UTF-8 ───────────────────────────────────────────────────────────────────

fn parse_utf8(buf: &[u8]) -> Parsed {
    let expected = utf8_char_len(buf[0]);
    if expected == 0 {
        return Parsed::Skip(1);
    }
    if buf.len() < expected {
        return Parsed::Incomplete;
    }
    if buf[1..expected].iter().any(|&b| b & 0xC0 != 0x80) {
        return Parsed::Skip(1);
    }

    std::str::from_utf8(&buf[..expected])
        .ok()
        .and_then(|s| s.chars().next())
        .map_or(Parsed::Skip(1), |ch| {
            Parsed::Event(key(KeyCode::Char(ch), Modifiers::empty()), expected)
        })
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

const fn key(code: KeyCode, modifiers: Modifiers) -> Event {
    Event::Key(KeyEvent::new(code, modifiers))
}

/// Semicolon-separated numbers; non-digit prefixes such as `?` are skipped.
fn parse_params(raw: &[u8]) -> Vec<u16> {
    raw.split(|&b| b == b';')
        .map(|part| {
            part.iter()
                .filter(|b| b.is_ascii_digit())
                .fold(0u16, |acc, d| acc.saturating_mul(10).saturating_add(u16::from(d - b'0')))
        })
        .collect()
}

/// xterm modifier parameter: `1 + mask`.
#[allow(clippy::cast_possible_truncation)]
const fn decode_modifiers(param: u16) -> Modifiers {
    let val = if param > 0 { param - 1 } else { 0 };
    Modifiers::from_bits_truncate(val as u8)
}

const fn utf8_char_len(lead: u8) -> usize {
    match lead {
        0x00..=0x7F => 1,
        0xC0..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF7 => 4,
        _ => 0,
    }
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
