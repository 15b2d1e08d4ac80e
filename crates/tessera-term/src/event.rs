// SPDX-License-Identifier: MIT
//
// Driver-neutral input events.
//
// Every backend decodes its raw input (ANSI bytes, Windows input records,
// a test queue) into these types, so code above the driver never learns
// where a keystroke came from.
//
// Mouse state is a flag set rather than an enum: one Windows mouse record
// can carry a release, a click and a position report at once, and the
// curses-style consumers test individual bits.

use bitflags::bitflags;

use crate::terminal::Size;

/// One decoded input event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A key went down (or auto-repeated).
    Key(KeyEvent),
    /// Mouse buttons, wheel or motion.
    Mouse(MouseEvent),
    /// The console changed size.
    Resize(Size),
    /// Bracketed paste content, delivered whole.
    Paste(String),
    /// The terminal window gained focus.
    FocusGained,
    /// The terminal window lost focus.
    FocusLost,
}

/// A key with its modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    /// Which key.
    pub code: KeyCode,
    /// Modifier keys held.
    pub modifiers: Modifiers,
    /// How many times the key fired (Windows repeat count; 1 elsewhere).
    pub repeat: u16,
}

impl KeyEvent {
    /// A single press.
    #[inline]
    #[must_use]
    pub const fn new(code: KeyCode, modifiers: Modifiers) -> Self {
        Self {
            code,
            modifiers,
            repeat: 1,
        }
    }
}

/// Identity of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    /// A Unicode character.
    Char(char),
    Enter,
    Tab,
    Backspace,
    Escape,
    Delete,
    Insert,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    /// F1 through F24.
    F(u8),
}

bitflags! {
    /// Keyboard modifiers. Bit layout follows the xterm `1 + mask`
    /// parameter encoding.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0000_0001;
        const ALT   = 0b0000_0010;
        const CTRL  = 0b0000_0100;
        const SUPER = 0b0000_1000;
    }
}

bitflags! {
    /// Mouse state bits. Buttons are numbered curses-style:
    /// 1 = left, 2 = middle, 3 = right.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct MouseFlags: u32 {
        const BUTTON1_PRESSED        = 1 << 0;
        const BUTTON1_RELEASED       = 1 << 1;
        const BUTTON1_CLICKED        = 1 << 2;
        const BUTTON1_DOUBLE_CLICKED = 1 << 3;
        const BUTTON2_PRESSED        = 1 << 4;
        const BUTTON2_RELEASED       = 1 << 5;
        const BUTTON2_CLICKED        = 1 << 6;
        const BUTTON2_DOUBLE_CLICKED = 1 << 7;
        const BUTTON3_PRESSED        = 1 << 8;
        const BUTTON3_RELEASED       = 1 << 9;
        const BUTTON3_CLICKED        = 1 << 10;
        const BUTTON3_DOUBLE_CLICKED = 1 << 11;
        const WHEELED_UP             = 1 << 12;
        const WHEELED_DOWN           = 1 << 13;
        const WHEELED_LEFT           = 1 << 14;
        const WHEELED_RIGHT          = 1 << 15;
        const REPORT_MOUSE_POSITION  = 1 << 16;
        const BUTTON_SHIFT           = 1 << 17;
        const BUTTON_CTRL            = 1 << 18;
        const BUTTON_ALT             = 1 << 19;
    }
}

impl MouseFlags {
    /// `PRESSED` bit for button `n` (1–3).
    #[must_use]
    pub const fn pressed(n: u8) -> Self {
        Self::button_bit(n, 0)
    }

    /// `RELEASED` bit for button `n` (1–3).
    #[must_use]
    pub const fn released(n: u8) -> Self {
        Self::button_bit(n, 1)
    }

    /// `CLICKED` bit for button `n` (1–3).
    #[must_use]
    pub const fn clicked(n: u8) -> Self {
        Self::button_bit(n, 2)
    }

    /// `DOUBLE_CLICKED` bit for button `n` (1–3).
    #[must_use]
    pub const fn double_clicked(n: u8) -> Self {
        Self::button_bit(n, 3)
    }

    const fn button_bit(n: u8, offset: u32) -> Self {
        match n {
            1..=3 => Self::from_bits_truncate(1 << ((n as u32 - 1) * 4 + offset)),
            _ => Self::empty(),
        }
    }

    /// Modifier bits corresponding to keyboard modifiers.
    #[must_use]
    pub fn from_modifiers(m: Modifiers) -> Self {
        let mut flags = Self::empty();
        flags.set(Self::BUTTON_SHIFT, m.contains(Modifiers::SHIFT));
        flags.set(Self::BUTTON_CTRL, m.contains(Modifiers::CTRL));
        flags.set(Self::BUTTON_ALT, m.contains(Modifiers::ALT));
        flags
    }
}

/// A mouse report at a cell position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MouseEvent {
    /// 0-indexed column.
    pub x: u16,
    /// 0-indexed row.
    pub y: u16,
    /// What happened.
    pub flags: MouseFlags,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn button_bits_line_up_with_named_flags() {
        assert_eq!(MouseFlags::pressed(1), MouseFlags::BUTTON1_PRESSED);
        assert_eq!(MouseFlags::released(2), MouseFlags::BUTTON2_RELEASED);
        assert_eq!(MouseFlags::clicked(3), MouseFlags::BUTTON3_CLICKED);
        assert_eq!(MouseFlags::double_clicked(1), MouseFlags::BUTTON1_DOUBLE_CLICKED);
        assert_eq!(MouseFlags::pressed(0), MouseFlags::empty());
        assert_eq!(MouseFlags::pressed(4), MouseFlags::empty());
    }

    #[test]
    fn modifiers_translate() {
        let flags = MouseFlags::from_modifiers(Modifiers::SHIFT | Modifiers::ALT);
        assert_eq!(flags, MouseFlags::BUTTON_SHIFT | MouseFlags::BUTTON_ALT);
    }

    #[test]
    fn key_event_defaults_to_single_repeat() {
        assert_eq!(KeyEvent::new(KeyCode::Enter, Modifiers::empty()).repeat, 1);
    }
}
