// SPDX-License-Identifier: MIT
//
// Win32 console driver.
//
// Safety: every console call goes through windows-sys FFI. Handles are
// owned by the driver for its whole life; union fields of INPUT_RECORD
// and CHAR_INFO are read only after checking the record type.
#![allow(unsafe_code)]
//
// The driver renders into a screen buffer of its own, made active on
// construction and swapped back out on drop, so the user's scrollback is
// untouched. Two output paths:
//
//   VT      the console accepted ENABLE_VIRTUAL_TERMINAL_PROCESSING; the
//             frame is the same escape stream the ANSI driver produces,
//             written as UTF-16 with WriteConsoleW.
//   legacy  no VT, or 16 colors forced; cells become CHAR_INFO records
//             with console attribute words and go out in one
//             WriteConsoleOutputW call.
//
// Input is read one record at a time into a heap slot that is freed on
// every path, then decoded by the platform-neutral WindowsInputDecoder.

use std::ptr;
use std::time::Duration;

use tracing::{debug, trace, warn};
use windows_sys::Win32::Foundation::{CloseHandle, GetLastError, BOOL, HANDLE, INVALID_HANDLE_VALUE};
use windows_sys::Win32::Storage::FileSystem::{FILE_SHARE_READ, FILE_SHARE_WRITE};
use windows_sys::Win32::System::Console::{
    CreateConsoleScreenBuffer, GetConsoleCursorInfo, GetConsoleMode, GetConsoleScreenBufferInfo,
    GetNumberOfConsoleInputEvents, GetStdHandle, ReadConsoleInputW, SetConsoleActiveScreenBuffer,
    SetConsoleCursorInfo, SetConsoleCursorPosition, SetConsoleMode, WriteConsoleOutputW,
    WriteConsoleW, CHAR_INFO, CHAR_INFO_0, CONSOLE_CURSOR_INFO, CONSOLE_SCREEN_BUFFER_INFO,
    CONSOLE_TEXTMODE_BUFFER, COORD, ENABLE_EXTENDED_FLAGS, ENABLE_MOUSE_INPUT,
    ENABLE_PROCESSED_OUTPUT, ENABLE_VIRTUAL_TERMINAL_PROCESSING, ENABLE_WINDOW_INPUT, FOCUS_EVENT,
    INPUT_RECORD, KEY_EVENT, MOUSE_EVENT, SMALL_RECT, STD_INPUT_HANDLE, STD_OUTPUT_HANDLE,
    WINDOW_BUFFER_SIZE_EVENT,
};

use super::{ConsoleDriver, clip_window};
use crate::ansi;
use crate::buffer::Rect;
use crate::cell::Cell;
use crate::config::DriverConfig;
use crate::cursor::{CursorBackend, CursorTracker, CursorVisibility};
use crate::error::{Error, Result};
use crate::event::Event;
use crate::output::{self, OutputBuffer, legacy_grid};
use crate::terminal::Size;
use crate::win_input::{InputRecord, KeyRecord, MouseRecord, WindowsInputDecoder};

const GENERIC_READ: u32 = 0x8000_0000;
const GENERIC_WRITE: u32 = 0x4000_0000;

/// Idle wait when no input record is queued.
const TICK: Duration = Duration::from_micros(8333);

fn check(call: &'static str, ok: BOOL) -> Result<()> {
    if ok != 0 {
        Ok(())
    } else {
        Err(Error::Os {
            call,
            code: unsafe { GetLastError() },
        })
    }
}

fn valid(handle: HANDLE) -> bool {
    handle != 0 && handle != INVALID_HANDLE_VALUE
}

#[allow(clippy::cast_possible_wrap)]
const fn coord(x: u16, y: u16) -> COORD {
    // Console coordinates are i16; larger sizes do not exist.
    COORD {
        X: if x > i16::MAX as u16 { i16::MAX } else { x as i16 },
        Y: if y > i16::MAX as u16 { i16::MAX } else { y as i16 },
    }
}

fn write_wide(handle: HANDLE, bytes: &[u8]) -> Result<()> {
    let wide: Vec<u16> = String::from_utf8_lossy(bytes).encode_utf16().collect();
    let mut written = 0u32;
    let len = u32::try_from(wide.len()).map_err(|_| Error::Unsupported("frame too large"))?;
    check("WriteConsoleW", unsafe {
        WriteConsoleW(handle, wide.as_ptr().cast(), len, &mut written, ptr::null())
    })
}

// ─── Cursor ──────────────────────────────────────────────────────────────────

struct ConsoleCursor {
    handle: HANDLE,
    vt: bool,
}

impl CursorBackend for ConsoleCursor {
    fn can_apply(&self) -> bool {
        valid(self.handle)
    }

    fn query(&mut self) -> Option<CursorVisibility> {
        let mut info = CONSOLE_CURSOR_INFO {
            dwSize: 0,
            bVisible: 0,
        };
        let ok = unsafe { GetConsoleCursorInfo(self.handle, &mut info) };
        (ok != 0).then(|| CursorVisibility::from_console_info(info.dwSize, info.bVisible != 0))
    }

    fn apply(&mut self, vis: CursorVisibility) -> Result<()> {
        if self.vt {
            let mut seq = Vec::new();
            ansi::set_cursor_visibility(&mut seq, vis)?;
            return write_wide(self.handle, &seq);
        }
        let (size, visible) = vis.console_info();
        let info = CONSOLE_CURSOR_INFO {
            dwSize: size,
            bVisible: BOOL::from(visible),
        };
        check("SetConsoleCursorInfo", unsafe {
            SetConsoleCursorInfo(self.handle, &info)
        })
    }
}

// ─── Driver ──────────────────────────────────────────────────────────────────

/// Driver for the Windows console API.
pub struct WindowsConsole {
    input: HANDLE,
    stdout: HANDLE,
    original_input_mode: u32,
    hw_cursor: ConsoleCursor,
    config: DriverConfig,
    size: Size,
    cursor: CursorTracker,
    decoder: WindowsInputDecoder,
    frame: OutputBuffer,
}

impl WindowsConsole {
    /// Create and activate a private screen buffer and switch input to
    /// window and mouse records.
    ///
    /// # Errors
    ///
    /// `Error::Os` naming the console call that failed.
    pub fn new(config: DriverConfig) -> Result<Self> {
        let input = unsafe { GetStdHandle(STD_INPUT_HANDLE) };
        let stdout = unsafe { GetStdHandle(STD_OUTPUT_HANDLE) };
        if !valid(input) || !valid(stdout) {
            return Err(Error::Unsupported("no console attached"));
        }

        let mut original_input_mode = 0u32;
        check("GetConsoleMode", unsafe {
            GetConsoleMode(input, &mut original_input_mode)
        })?;
        check("SetConsoleMode", unsafe {
            SetConsoleMode(
                input,
                ENABLE_WINDOW_INPUT | ENABLE_MOUSE_INPUT | ENABLE_EXTENDED_FLAGS,
            )
        })?;

        let output = unsafe {
            CreateConsoleScreenBuffer(
                GENERIC_READ | GENERIC_WRITE,
                FILE_SHARE_READ | FILE_SHARE_WRITE,
                ptr::null(),
                CONSOLE_TEXTMODE_BUFFER,
                ptr::null(),
            )
        };
        if !valid(output) {
            let code = unsafe { GetLastError() };
            unsafe { SetConsoleMode(input, original_input_mode) };
            return Err(Error::Os {
                call: "CreateConsoleScreenBuffer",
                code,
            });
        }
        if let Err(err) = check("SetConsoleActiveScreenBuffer", unsafe {
            SetConsoleActiveScreenBuffer(output)
        }) {
            unsafe {
                CloseHandle(output);
                SetConsoleMode(input, original_input_mode);
            }
            return Err(err);
        }

        let vt = unsafe {
            SetConsoleMode(output, ENABLE_PROCESSED_OUTPUT | ENABLE_VIRTUAL_TERMINAL_PROCESSING)
        } != 0;

        let mut console = Self {
            input,
            stdout,
            original_input_mode,
            hw_cursor: ConsoleCursor { handle: output, vt },
            config,
            size: Size { cols: 80, rows: 25 },
            cursor: CursorTracker::new(),
            decoder: WindowsInputDecoder::new(),
            frame: OutputBuffer::new(),
        };
        if let Some(size) = console.query_size() {
            console.size = size;
        }
        let initial = console.config.cursor;
        console.set_cursor_visibility(initial);
        debug!(size = ?console.size, vt, "windows console started");
        Ok(console)
    }

    /// Whether the console takes VT escape sequences.
    #[must_use]
    pub const fn is_vt(&self) -> bool {
        self.hw_cursor.vt
    }

    fn output(&self) -> HANDLE {
        self.hw_cursor.handle
    }

    fn query_size(&self) -> Option<Size> {
        let mut info: CONSOLE_SCREEN_BUFFER_INFO = unsafe { std::mem::zeroed() };
        let ok = unsafe { GetConsoleScreenBufferInfo(self.output(), &mut info) };
        if ok == 0 {
            return None;
        }
        let w = info.srWindow;
        let cols = u16::try_from(i32::from(w.Right) - i32::from(w.Left) + 1).ok()?;
        let rows = u16::try_from(i32::from(w.Bottom) - i32::from(w.Top) + 1).ok()?;
        Some(Size { cols, rows })
    }

    fn write_legacy(&self, size: Size, cells: &[Cell], window: Rect) -> Result<()> {
        let records: Vec<CHAR_INFO> = legacy_grid(cells)
            .into_iter()
            .map(|c| CHAR_INFO {
                Char: CHAR_INFO_0 { UnicodeChar: c.ch },
                Attributes: c.attr,
            })
            .collect();
        let rows = u16::try_from(records.len() / usize::from(size.cols))
            .unwrap_or(u16::MAX)
            .min(size.rows);

        let left = i16::try_from(window.x).unwrap_or(i16::MAX);
        let top = i16::try_from(window.y).unwrap_or(i16::MAX);
        let extent = coord(window.width, window.height);
        let mut region = SMALL_RECT {
            Left: left,
            Top: top,
            Right: left.saturating_add(extent.X - 1),
            Bottom: top.saturating_add(extent.Y - 1),
        };
        check("WriteConsoleOutputW", unsafe {
            WriteConsoleOutputW(
                self.output(),
                records.as_ptr(),
                coord(size.cols, rows),
                COORD { X: 0, Y: 0 },
                &mut region,
            )
        })
    }
}

impl Drop for WindowsConsole {
    fn drop(&mut self) {
        unsafe {
            if SetConsoleActiveScreenBuffer(self.stdout) == 0 {
                warn!(code = GetLastError(), "could not restore the original screen buffer");
            }
            CloseHandle(self.output());
            SetConsoleMode(self.input, self.original_input_mode);
        }
    }
}

impl ConsoleDriver for WindowsConsole {
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

        if force_16_colors || !self.is_vt() {
            self.write_legacy(size, cells, window)?;
            trace!(cells = cells.len(), "legacy frame written");
        } else {
            self.frame.clear();
            output::encode_frame(&mut self.frame, size, cells, window, false);
            write_wide(self.output(), self.frame.as_bytes())?;
            self.cursor.force_refresh();
            trace!(bytes = self.frame.len(), "vt frame written");
        }
        Ok(true)
    }

    fn set_cursor_position(&mut self, x: u16, y: u16) -> Result<()> {
        check("SetConsoleCursorPosition", unsafe {
            SetConsoleCursorPosition(self.output(), coord(x, y))
        })
    }

    fn cursor_visibility(&mut self) -> Option<CursorVisibility> {
        self.cursor.get(&mut self.hw_cursor)
    }

    fn set_cursor_visibility(&mut self, vis: CursorVisibility) -> bool {
        self.cursor.set(&mut self.hw_cursor, vis)
    }

    fn ensure_cursor_visibility(&mut self) -> bool {
        self.cursor.ensure(&mut self.hw_cursor)
    }

    fn force_refresh_cursor_visibility(&mut self) {
        self.cursor.force_refresh();
    }

    fn read_input(&mut self) -> Result<Option<Event>> {
        let mut available = 0u32;
        check("GetNumberOfConsoleInputEvents", unsafe {
            GetNumberOfConsoleInputEvents(self.input, &mut available)
        })?;
        if available == 0 {
            std::thread::sleep(TICK);
            return Ok(None);
        }

        let mut slot: Box<INPUT_RECORD> = Box::new(unsafe { std::mem::zeroed() });
        let mut read = 0u32;
        check("ReadConsoleInputW", unsafe {
            ReadConsoleInputW(self.input, &mut *slot, 1, &mut read)
        })?;
        if read == 0 {
            return Ok(None);
        }

        let record = convert(&slot);
        let event = self.decoder.decode(&record);
        if let Some(Event::Resize(size)) = event {
            self.size = self.query_size().unwrap_or(size);
            return Ok(Some(Event::Resize(self.size)));
        }
        Ok(event)
    }
}

fn convert(raw: &INPUT_RECORD) -> InputRecord {
    let kind = u32::from(raw.EventType);
    unsafe {
        if kind == KEY_EVENT {
            let k = raw.Event.KeyEvent;
            InputRecord::Key(KeyRecord {
                key_down: k.bKeyDown != 0,
                repeat_count: k.wRepeatCount,
                virtual_key: k.wVirtualKeyCode,
                unicode_char: k.uChar.UnicodeChar,
                control_state: k.dwControlKeyState,
            })
        } else if kind == MOUSE_EVENT {
            let m = raw.Event.MouseEvent;
            InputRecord::Mouse(MouseRecord {
                x: m.dwMousePosition.X,
                y: m.dwMousePosition.Y,
                button_state: m.dwButtonState,
                control_state: m.dwControlKeyState,
                event_flags: m.dwEventFlags,
            })
        } else if kind == WINDOW_BUFFER_SIZE_EVENT {
            let s = raw.Event.WindowBufferSizeEvent.dwSize;
            InputRecord::Resize {
                cols: s.X,
                rows: s.Y,
            }
        } else if kind == FOCUS_EVENT {
            InputRecord::Focus(raw.Event.FocusEvent.bSetFocus != 0)
        } else {
            InputRecord::Other
        }
    }
}
