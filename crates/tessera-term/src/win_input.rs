// SPDX-License-Identifier: MIT
//
// Windows console input decoding.
//
// `ReadConsoleInputW` hands out INPUT_RECORDs: key records with a virtual
// key code and a UTF-16 unit, mouse records with a button bitmask, and
// buffer-size records. The records are mirrored here as plain structs so
// the decoding logic compiles and is tested on every platform; the Windows
// driver only copies fields across.
//
// Mouse records carry the *current* button state, not transitions. The
// decoder remembers the previous state and derives pressed / released /
// clicked from the difference. A release counts as a click when the
// pointer has not moved since the press.

use crate::event::{Event, KeyCode, KeyEvent, Modifiers, MouseEvent, MouseFlags};
use crate::terminal::Size;

// ─── Constants ───────────────────────────────────────────────────────────────

/// Virtual-key codes.
pub mod vk {
    pub const BACK: u16 = 0x08;
    pub const TAB: u16 = 0x09;
    pub const RETURN: u16 = 0x0D;
    pub const ESCAPE: u16 = 0x1B;
    pub const PRIOR: u16 = 0x21;
    pub const NEXT: u16 = 0x22;
    pub const END: u16 = 0x23;
    pub const HOME: u16 = 0x24;
    pub const LEFT: u16 = 0x25;
    pub const UP: u16 = 0x26;
    pub const RIGHT: u16 = 0x27;
    pub const DOWN: u16 = 0x28;
    pub const INSERT: u16 = 0x2D;
    pub const DELETE: u16 = 0x2E;
    pub const F1: u16 = 0x70;
    pub const F24: u16 = 0x87;
}

/// `dwControlKeyState` bits.
pub mod control {
    pub const RIGHT_ALT: u32 = 0x0001;
    pub const LEFT_ALT: u32 = 0x0002;
    pub const RIGHT_CTRL: u32 = 0x0004;
    pub const LEFT_CTRL: u32 = 0x0008;
    pub const SHIFT: u32 = 0x0010;
}

/// `dwButtonState` bits.
pub mod button {
    pub const LEFTMOST: u32 = 0x0001;
    pub const RIGHTMOST: u32 = 0x0002;
    pub const FROM_LEFT_2ND: u32 = 0x0004;
}

/// `dwEventFlags` values.
pub mod flags {
    pub const MOUSE_MOVED: u32 = 0x0001;
    pub const DOUBLE_CLICK: u32 = 0x0002;
    pub const MOUSE_WHEELED: u32 = 0x0004;
    pub const MOUSE_HWHEELED: u32 = 0x0008;
}

/// Console button bit and curses button number, left to right.
const BUTTONS: [(u32, u8); 3] = [
    (button::LEFTMOST, 1),
    (button::FROM_LEFT_2ND, 2),
    (button::RIGHTMOST, 3),
];

// ─── Records ─────────────────────────────────────────────────────────────────

/// `KEY_EVENT_RECORD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyRecord {
    pub key_down: bool,
    pub repeat_count: u16,
    pub virtual_key: u16,
    pub unicode_char: u16,
    pub control_state: u32,
}

/// `MOUSE_EVENT_RECORD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MouseRecord {
    pub x: i16,
    pub y: i16,
    pub button_state: u32,
    pub control_state: u32,
    pub event_flags: u32,
}

/// The subset of `INPUT_RECORD` the driver cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputRecord {
    Key(KeyRecord),
    Mouse(MouseRecord),
    /// `WINDOW_BUFFER_SIZE_RECORD`.
    Resize { cols: i16, rows: i16 },
    /// `FOCUS_EVENT_RECORD`.
    Focus(bool),
    /// Menu events and anything else.
    Other,
}

// ─── Decoder ─────────────────────────────────────────────────────────────────

/// Stateful translator from console records to [`Event`]s.
#[derive(Debug, Default)]
pub struct WindowsInputDecoder {
    last_buttons: u32,
    press_origin: Option<(u16, u16)>,
    high_surrogate: Option<u16>,
}

impl WindowsInputDecoder {
    /// Decoder with no buttons held.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Translate one record. `None` for records that produce no event
    /// (key-up, lone high surrogate, mouse noise).
    pub fn decode(&mut self, record: &InputRecord) -> Option<Event> {
        match *record {
            InputRecord::Key(k) => self.decode_key(k).map(Event::Key),
            InputRecord::Mouse(m) => self.decode_mouse(m).map(Event::Mouse),
            InputRecord::Resize { cols, rows } => Some(Event::Resize(Size {
                cols: clamp_coord(cols),
                rows: clamp_coord(rows),
            })),
            InputRecord::Focus(true) => Some(Event::FocusGained),
            InputRecord::Focus(false) => Some(Event::FocusLost),
            InputRecord::Other => None,
        }
    }

    fn decode_key(&mut self, rec: KeyRecord) -> Option<KeyEvent> {
        if !rec.key_down {
            return None;
        }

        let mut modifiers = key_modifiers(rec.control_state);
        let named = match rec.virtual_key {
            vk::BACK => Some(KeyCode::Backspace),
            vk::TAB => Some(KeyCode::Tab),
            vk::RETURN => Some(KeyCode::Enter),
            vk::ESCAPE => Some(KeyCode::Escape),
            vk::PRIOR => Some(KeyCode::PageUp),
            vk::NEXT => Some(KeyCode::PageDown),
            vk::END => Some(KeyCode::End),
            vk::HOME => Some(KeyCode::Home),
            vk::LEFT => Some(KeyCode::Left),
            vk::UP => Some(KeyCode::Up),
            vk::RIGHT => Some(KeyCode::Right),
            vk::DOWN => Some(KeyCode::Down),
            vk::INSERT => Some(KeyCode::Insert),
            vk::DELETE => Some(KeyCode::Delete),
            // F1..=F24 fits in u8.
            #[allow(clippy::cast_possible_truncation)]
            v @ vk::F1..=vk::F24 => Some(KeyCode::F((v - vk::F1 + 1) as u8)),
            _ => None,
        };

        let code = match named {
            Some(code) => code,
            None => {
                let ch = self.decode_unit(rec.unicode_char)?;
                // Shift is already folded into the character.
                modifiers.remove(Modifiers::SHIFT);
                match ch {
                    // Ctrl+letter arrives as a C0 control code.
                    c @ '\u{1}'..='\u{1a}' => {
                        modifiers |= Modifiers::CTRL;
                        KeyCode::Char(u8::try_from(c).map_or(c, |b| char::from(b'a' + b - 1)))
                    }
                    c if c.is_control() => return None,
                    c => KeyCode::Char(c),
                }
            }
        };

        Some(KeyEvent {
            code,
            modifiers,
            repeat: rec.repeat_count.max(1),
        })
    }

    /// Join UTF-16 surrogate halves that arrive in separate records.
    fn decode_unit(&mut self, unit: u16) -> Option<char> {
        if unit == 0 {
            return None;
        }
        if (0xD800..=0xDBFF).contains(&unit) {
            self.high_surrogate = Some(unit);
            return None;
        }
        if (0xDC00..=0xDFFF).contains(&unit) {
            let high = self.high_surrogate.take()?;
            return char::decode_utf16([high, unit]).next()?.ok();
        }
        self.high_surrogate = None;
        char::from_u32(u32::from(unit))
    }

    fn decode_mouse(&mut self, rec: MouseRecord) -> Option<MouseEvent> {
        let x = clamp_coord(rec.x);
        let y = clamp_coord(rec.y);
        let mut out = MouseFlags::from_modifiers(key_modifiers(rec.control_state));

        match rec.event_flags {
            flags::MOUSE_WHEELED => {
                out |= if wheel_delta(rec.button_state) > 0 {
                    MouseFlags::WHEELED_UP
                } else {
                    MouseFlags::WHEELED_DOWN
                };
            }
            flags::MOUSE_HWHEELED => {
                out |= if wheel_delta(rec.button_state) > 0 {
                    MouseFlags::WHEELED_RIGHT
                } else {
                    MouseFlags::WHEELED_LEFT
                };
            }
            flags::MOUSE_MOVED => {
                out |= MouseFlags::REPORT_MOUSE_POSITION;
                for (bit, n) in BUTTONS {
                    if rec.button_state & bit != 0 {
                        out |= MouseFlags::pressed(n);
                    }
                }
                if self.press_origin.is_some_and(|o| o != (x, y)) {
                    self.press_origin = None;
                }
                self.last_buttons = rec.button_state & 0xFFFF;
            }
            ev => {
                let now = rec.button_state & 0xFFFF;
                let was = self.last_buttons;
                let double = ev & flags::DOUBLE_CLICK != 0;
                for (bit, n) in BUTTONS {
                    let down_now = now & bit != 0;
                    let down_before = was & bit != 0;
                    if down_now && !down_before {
                        if double {
                            out |= MouseFlags::double_clicked(n);
                        } else {
                            out |= MouseFlags::pressed(n);
                        }
                        self.press_origin = Some((x, y));
                    } else if !down_now && down_before {
                        out |= MouseFlags::released(n);
                        if self.press_origin == Some((x, y)) {
                            out |= MouseFlags::clicked(n);
                        }
                        self.press_origin = None;
                    }
                }
                self.last_buttons = now;
                if out.bits() & !modifier_bits() == 0 {
                    return None;
                }
            }
        }

        Some(MouseEvent { x, y, flags: out })
    }
}

fn modifier_bits() -> u32 {
    (MouseFlags::BUTTON_SHIFT | MouseFlags::BUTTON_CTRL | MouseFlags::BUTTON_ALT).bits()
}

/// Wheel delta: the signed high word of the button state.
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
const fn wheel_delta(button_state: u32) -> i16 {
    (button_state >> 16) as u16 as i16
}

#[allow(clippy::cast_sign_loss)]
fn clamp_coord(v: i16) -> u16 {
    v.max(0) as u16
}

fn key_modifiers(state: u32) -> Modifiers {
    let mut m = Modifiers::empty();
    m.set(Modifiers::SHIFT, state & control::SHIFT != 0);
    m.set(Modifiers::CTRL, state & (control::LEFT_CTRL | control::RIGHT_CTRL) != 0);
    m.set(Modifiers::ALT, state & (control::LEFT_ALT | control::RIGHT_ALT) != 0);
    m
}

// ─── Tests ───────────────────────────────────────────────────────────────────
