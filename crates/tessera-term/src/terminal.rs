// SPDX-License-Identifier: MIT
//
// Terminal control: raw mode, alternate screen, RAII cleanup.
//
// Safety: termios (tcgetattr, tcsetattr), ioctl (TIOCGWINSZ), isatty and
// the raw fd write in the panic path are plain POSIX calls with no safe
// wrapper in std. Each unsafe block is minimal.
#![allow(unsafe_code)]
//
// `Terminal::enter` puts stdin into raw mode, optionally switches to the
// alternate screen, and enables mouse, bracketed paste and focus reports
// according to the `DriverConfig`. Dropping the handle undoes all of it.
//
// A panic while raw mode is on would leave the user's shell without echo.
// The panic hook writes a pre-built restore sequence straight to fd 1
// (never through the stdout lock, which the panicking frame may hold),
// puts the saved termios back, then hands over to the previous hook.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, Once};

use crate::ansi::{self, MouseMode};
use crate::config::DriverConfig;

// ─── Size ────────────────────────────────────────────────────────────────────

/// Console dimensions in cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Size {
    /// Columns.
    pub cols: u16,
    /// Rows.
    pub rows: u16,
}

impl Size {
    /// `cols × rows`.
    #[inline]
    #[must_use]
    pub const fn area(self) -> u32 {
        self.cols as u32 * self.rows as u32
    }
}

// ─── Queries ─────────────────────────────────────────────────────────────────

/// Terminal size via `ioctl(TIOCGWINSZ)`. `None` when stdout is not a tty.
#[cfg(unix)]
#[must_use]
pub fn get_size() -> Option<Size> {
    let mut ws: libc::winsize = unsafe { std::mem::zeroed() };
    let result = unsafe { libc::ioctl(libc::STDOUT_FILENO, libc::TIOCGWINSZ, &mut ws) };

    if result == 0 && ws.ws_col > 0 && ws.ws_row > 0 {
        Some(Size {
            cols: ws.ws_col,
            rows: ws.ws_row,
        })
    } else {
        None
    }
}

#[cfg(not(unix))]
#[must_use]
pub fn get_size() -> Option<Size> {
    None
}

/// Whether stdin is a terminal.
#[cfg(unix)]
#[must_use]
pub fn is_tty() -> bool {
    unsafe { libc::isatty(libc::STDIN_FILENO) != 0 }
}

#[cfg(not(unix))]
#[must_use]
pub fn is_tty() -> bool {
    false
}

// ─── Resize signal ───────────────────────────────────────────────────────────

static RESIZED: AtomicBool = AtomicBool::new(false);
#[cfg(unix)]
static RESIZE_HANDLER_INSTALLED: Once = Once::new();

/// Route `SIGWINCH` into a flag read by [`take_resize`]. Idempotent; a
/// no-op off unix, where resizes arrive as input records instead.
pub fn install_resize_handler() {
    #[cfg(unix)]
    RESIZE_HANDLER_INSTALLED.call_once(|| unsafe {
        let mut sa: libc::sigaction = std::mem::zeroed();
        sa.sa_sigaction = on_sigwinch as *const () as usize;
        sa.sa_flags = libc::SA_RESTART;
        libc::sigemptyset(&raw mut sa.sa_mask);
        libc::sigaction(libc::SIGWINCH, &raw const sa, std::ptr::null_mut());
    });
}

#[cfg(unix)]
extern "C" fn on_sigwinch(_sig: libc::c_int) {
    RESIZED.store(true, Ordering::Relaxed);
}

/// Whether a resize was signalled since the last call.
pub fn take_resize() -> bool {
    RESIZED.swap(false, Ordering::Relaxed)
}

// ─── Panic-safe restore ──────────────────────────────────────────────────────

/// Termios saved by the active `Terminal`, for the panic hook.
#[cfg(unix)]
static SAVED_TERMIOS: Mutex<Option<libc::termios>> = Mutex::new(None);

/// Everything `leave` undoes, as one write. Alternate screen exit goes last
/// so the shell's content comes back clean.
#[rustfmt::skip]
const EMERGENCY_RESTORE: &[u8] = b"\
    \x1b[?1006l\x1b[?1003l\x1b[?1002l\x1b[?1000l\
    \x1b[?2004l\
    \x1b[?1004l\
    \x1b[0m\
    \x1b[0 q\
    \x1b[?25h\
    \x1b[?1049l";

static PANIC_HOOK: Once = Once::new();

fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            write_restore_sequence();
            #[cfg(unix)]
            if let Some(saved) = SAVED_TERMIOS.lock().ok().and_then(|g| *g) {
                let _ = tty::set(libc::STDIN_FILENO, &saved, libc::TCSANOW);
            }
            previous(info);
        }));
    });
}

fn write_restore_sequence() {
    #[cfg(unix)]
    unsafe {
        let _ = libc::write(
            libc::STDOUT_FILENO,
            EMERGENCY_RESTORE.as_ptr().cast::<libc::c_void>(),
            EMERGENCY_RESTORE.len(),
        );
    }

    #[cfg(not(unix))]
    {
        let mut out = io::stdout();
        let _ = out.write_all(EMERGENCY_RESTORE);
        let _ = out.flush();
    }
}

// ─── Raw mode ────────────────────────────────────────────────────────────────

#[cfg(unix)]
mod tty {
    use std::io;

    fn check(rc: libc::c_int) -> io::Result<()> {
        if rc == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    pub fn get(fd: libc::c_int) -> io::Result<libc::termios> {
        let mut t: libc::termios = unsafe { std::mem::zeroed() };
        check(unsafe { libc::tcgetattr(fd, &raw mut t) })?;
        Ok(t)
    }

    pub fn set(fd: libc::c_int, t: &libc::termios, when: libc::c_int) -> io::Result<()> {
        check(unsafe { libc::tcsetattr(fd, when, t) })
    }

    /// `cfmakeraw`, then blocking reads of at least one byte.
    pub fn make_raw(mut t: libc::termios) -> libc::termios {
        unsafe { libc::cfmakeraw(&raw mut t) };
        t.c_cc[libc::VMIN] = 1;
        t.c_cc[libc::VTIME] = 0;
        t
    }
}

// ─── Terminal ────────────────────────────────────────────────────────────────

/// Raw-mode terminal handle, restored on drop.
///
/// ```no_run
/// use tessera_term::config::DriverConfig;
/// use tessera_term::terminal::Terminal;
///
/// let mut term = Terminal::new(&DriverConfig::default());
/// term.enter()?;
/// // ... draw, read input ...
/// # Ok::<(), std::io::Error>(())
/// ```
pub struct Terminal {
    #[cfg(unix)]
    original_termios: Option<libc::termios>,
    size: Size,
    alternate_screen: bool,
    mouse: MouseMode,
    active: bool,
}

impl Terminal {
    /// A handle for the process's terminal. Does not touch it yet.
    ///
    /// Falls back to 80×24 when the size cannot be queried (pipes, CI).
    #[must_use]
    pub fn new(config: &DriverConfig) -> Self {
        Self {
            #[cfg(unix)]
            original_termios: None,
            size: get_size().unwrap_or(Size { cols: 80, rows: 24 }),
            alternate_screen: config.alternate_screen,
            mouse: config.mouse,
            active: false,
        }
    }

    /// Cached size.
    #[inline]
    #[must_use]
    pub const fn size(&self) -> Size {
        self.size
    }

    /// Re-query the size from the OS, keeping the old one on failure.
    pub fn refresh_size(&mut self) -> Size {
        if let Some(s) = get_size() {
            self.size = s;
        }
        self.size
    }

    /// Whether `enter` is in effect.
    #[inline]
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Mouse mode the terminal was entered with.
    #[inline]
    #[must_use]
    pub const fn mouse_mode(&self) -> MouseMode {
        self.mouse
    }

    /// Switch to TUI mode. Idempotent.
    ///
    /// # Errors
    ///
    /// Fails if termios or the terminal write fails.
    pub fn enter(&mut self) -> io::Result<()> {
        if self.active {
            return Ok(());
        }

        install_panic_hook();
        self.enable_raw_mode()?;

        let stdout = io::stdout();
        let mut lock = stdout.lock();
        if self.alternate_screen {
            ansi::enter_alt_screen(&mut lock)?;
        }
        ansi::cursor_hide(&mut lock)?;
        ansi::clear_screen(&mut lock)?;
        ansi::enable_mouse(&mut lock, self.mouse)?;
        ansi::enable_bracketed_paste(&mut lock)?;
        ansi::enable_focus_reporting(&mut lock)?;
        lock.flush()?;

        self.active = true;
        tracing::debug!(size = ?self.size, "terminal entered");
        Ok(())
    }

    /// Undo [`enter`](Self::enter). Idempotent.
    ///
    /// # Errors
    ///
    /// Fails if the terminal write or termios restore fails.
    pub fn leave(&mut self) -> io::Result<()> {
        if !self.active {
            return Ok(());
        }

        let stdout = io::stdout();
        let mut lock = stdout.lock();
        ansi::disable_focus_reporting(&mut lock)?;
        ansi::disable_bracketed_paste(&mut lock)?;
        ansi::disable_mouse(&mut lock)?;
        ansi::reset(&mut lock)?;
        ansi::set_cursor_visibility(&mut lock, crate::cursor::CursorVisibility::Default)?;
        if self.alternate_screen {
            ansi::exit_alt_screen(&mut lock)?;
        }
        lock.flush()?;
        drop(lock);

        self.disable_raw_mode()?;
        self.active = false;
        Ok(())
    }

    // ── termios ──

    #[cfg(unix)]
    fn enable_raw_mode(&mut self) -> io::Result<()> {
        if !is_tty() {
            return Ok(());
        }
        let fd = libc::STDIN_FILENO;
        let original = tty::get(fd)?;
        tty::set(fd, &tty::make_raw(original), libc::TCSAFLUSH)?;

        self.original_termios = Some(original);
        if let Ok(mut saved) = SAVED_TERMIOS.lock() {
            *saved = Some(original);
        }
        Ok(())
    }

    #[cfg(unix)]
    fn disable_raw_mode(&mut self) -> io::Result<()> {
        let Some(original) = self.original_termios.take() else {
            return Ok(());
        };
        if let Ok(mut saved) = SAVED_TERMIOS.lock() {
            *saved = None;
        }
        tty::set(libc::STDIN_FILENO, &original, libc::TCSAFLUSH)
    }

    #[cfg(not(unix))]
    fn enable_raw_mode(&mut self) -> io::Result<()> {
        Ok(())
    }

    #[cfg(not(unix))]
    fn disable_raw_mode(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        if self.active {
            let _ = self.leave();
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_area() {
        assert_eq!(Size { cols: 80, rows: 24 }.area(), 1920);
        assert_eq!(Size { cols: 0, rows: 24 }.area(), 0);
        assert_eq!(Size { cols: 500, rows: 200 }.area(), 100_000);
    }

    #[test]
    fn queries_do_not_panic() {
        let _ = get_size();
        let _ = is_tty();
    }

    #[test]
    fn resize_flag_is_consumed() {
        RESIZED.store(true, Ordering::Relaxed);
        assert!(take_resize());
        assert!(!take_resize());
    }

    #[test]
    fn emergency_restore_leaves_alt_screen_last() {
        let s = std::str::from_utf8(EMERGENCY_RESTORE).unwrap();
        assert!(s.ends_with("\x1b[?1049l"));
        assert!(s.contains("\x1b[?1000l"));
        assert!(s.contains("\x1b[?2004l"));
        assert!(s.contains("\x1b[?25h"));
    }

    #[test]
    fn new_reads_config() {
        let cfg = DriverConfig {
            mouse: MouseMode::Click,
            ..DriverConfig::default()
        };
        let term = Terminal::new(&cfg);
        assert!(!term.is_active());
        assert_eq!(term.mouse_mode(), MouseMode::Click);
        assert!(term.size().cols > 0 && term.size().rows > 0);
    }

    #[test]
    fn enter_leave_cycle_is_idempotent() {
        let mut term = Terminal::new(&DriverConfig {
            alternate_screen: false,
            ..DriverConfig::default()
        });
        term.leave().unwrap();
        term.enter().unwrap();
        term.enter().unwrap();
        assert!(term.is_active());
        term.leave().unwrap();
        term.leave().unwrap();
        assert!(!term.is_active());
    }
}
