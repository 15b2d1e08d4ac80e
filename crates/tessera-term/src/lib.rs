// SPDX-License-Identifier: MIT
//
// tessera-term: console driver layer for tessera.
//
// Everything between a grid of colored cells and the bytes (or console
// records) a terminal understands, and back again for input:
//
//   color / attribute / cell   the cell model and the 16-color fallback
//   buffer                     the screen grid widgets draw into
//   output                     frame encoding, ANSI and legacy
//   cursor                     cursor visibility state machine
//   input / win_input          ANSI bytes and console records to events
//   request                    escape-sequence queries and their replies
//   driver                     ConsoleDriver and its backends
//   terminal / reader          raw mode, RAII restore, the stdin thread
//
// No TUI framework underneath: output is direct escape sequences on unix
// and the console API on Windows.

pub mod ansi;
pub mod attribute;
pub mod buffer;
pub mod cell;
pub mod color;
pub mod config;
pub mod cursor;
pub mod driver;
pub mod error;
pub mod event;
pub mod input;
pub mod output;
pub mod reader;
pub mod request;
pub mod terminal;
pub mod win_input;

pub use attribute::Attribute;
pub use buffer::{Rect, ScreenBuffer};
pub use cell::Cell;
pub use color::{Color, ColorName16};
pub use config::DriverConfig;
pub use cursor::CursorVisibility;
pub use driver::ConsoleDriver;
pub use error::{Error, Result};
pub use event::{Event, KeyCode, KeyEvent, Modifiers, MouseEvent, MouseFlags};
pub use terminal::Size;
