// SPDX-License-Identifier: MIT
//
// Cursor visibility: what shape the hardware cursor has and whether the
// console has actually been told.
//
// Changing cursor visibility can fail or be impossible at the moment it is
// requested: the console handle may not be ready, a Windows call may fail,
// a headless sink has no cursor at all. The toolkit still wants "the last
// thing I asked for" to win eventually. `CursorTracker` keeps one slot:
//
//   Unknown      nothing requested yet
//   Applied(v)   v is on screen
//   Pending(v)   v was requested but could not be applied; retried by ensure
//   Stale(v)     v was applied, but the screen may have been reset under us
//                (resize, external program); re-applied by ensure
//
// The console's own visibility before we touched it is captured once, lazily,
// so `get` has something to report before the first `set`.
//
// The tracker never does I/O itself: every console interaction goes through
// the `CursorBackend` seam, so the same state machine drives the ANSI, the
// Windows and the fake console.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;

// ─── CursorVisibility ────────────────────────────────────────────────────────

/// Cursor appearance. `*Fix` variants do not blink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CursorVisibility {
    /// Whatever the terminal uses by default.
    #[default]
    Default,
    /// Hidden.
    Invisible,
    /// Blinking underline.
    Underline,
    /// Steady underline.
    UnderlineFix,
    /// Blinking vertical bar.
    Vertical,
    /// Steady vertical bar.
    VerticalFix,
    /// Blinking block.
    Box,
    /// Steady block.
    BoxFix,
}

impl CursorVisibility {
    /// DECSCUSR parameter, `None` when the cursor is hidden.
    #[must_use]
    pub const fn decscusr(self) -> Option<u8> {
        match self {
            Self::Invisible => None,
            Self::Default => Some(0),
            Self::Box => Some(1),
            Self::BoxFix => Some(2),
            Self::Underline => Some(3),
            Self::UnderlineFix => Some(4),
            Self::Vertical => Some(5),
            Self::VerticalFix => Some(6),
        }
    }

    /// Windows `CONSOLE_CURSOR_INFO` as `(size_percent, visible)`.
    ///
    /// The native console has no bar shape and no blink control; bars and
    /// underlines both map to the thin cursor.
    #[must_use]
    pub const fn console_info(self) -> (u32, bool) {
        match self {
            Self::Invisible => (25, false),
            Self::Box | Self::BoxFix => (100, true),
            Self::Default
            | Self::Underline
            | Self::UnderlineFix
            | Self::Vertical
            | Self::VerticalFix => (25, true),
        }
    }

    /// Inverse of [`console_info`](Self::console_info), as far as it goes.
    #[must_use]
    pub const fn from_console_info(size: u32, visible: bool) -> Self {
        if !visible {
            Self::Invisible
        } else if size >= 50 {
            Self::Box
        } else {
            Self::Default
        }
    }

    /// Whether this visibility shows the cursor at all.
    #[inline]
    #[must_use]
    pub const fn is_visible(self) -> bool {
        !matches!(self, Self::Invisible)
    }
}

// ─── Backend seam ────────────────────────────────────────────────────────────

/// Console operations the tracker needs.
pub trait CursorBackend {
    /// Whether the console can take a cursor change right now.
    fn can_apply(&self) -> bool;

    /// The console's current visibility, if it can be read back.
    fn query(&mut self) -> Option<CursorVisibility>;

    /// Push a visibility to the console.
    ///
    /// # Errors
    ///
    /// Whatever the underlying console call reports.
    fn apply(&mut self, vis: CursorVisibility) -> Result<()>;
}

// ─── Tracker ─────────────────────────────────────────────────────────────────

/// Where the last requested visibility stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorSlot {
    /// Nothing requested.
    #[default]
    Unknown,
    /// On screen.
    Applied(CursorVisibility),
    /// Requested, not yet applied.
    Pending(CursorVisibility),
    /// Applied once, needs re-applying.
    Stale(CursorVisibility),
}

impl CursorSlot {
    /// The visibility held by the slot, if any.
    #[must_use]
    pub const fn value(self) -> Option<CursorVisibility> {
        match self {
            Self::Unknown => None,
            Self::Applied(v) | Self::Pending(v) | Self::Stale(v) => Some(v),
        }
    }
}

/// Cursor visibility state machine.
#[derive(Debug, Clone, Default)]
pub struct CursorTracker {
    initial: Option<CursorVisibility>,
    captured: bool,
    slot: CursorSlot,
}

impl CursorTracker {
    /// A tracker that has seen nothing yet.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            initial: None,
            captured: false,
            slot: CursorSlot::Unknown,
        }
    }

    /// Current slot.
    #[inline]
    #[must_use]
    pub const fn slot(&self) -> CursorSlot {
        self.slot
    }

    /// The visibility the console had before the first change, if captured.
    #[inline]
    #[must_use]
    pub const fn initial(&self) -> Option<CursorVisibility> {
        self.initial
    }

    fn capture_initial(&mut self, backend: &mut impl CursorBackend) {
        if !self.captured {
            self.captured = true;
            self.initial = backend.query();
            debug!(initial = ?self.initial, "captured initial cursor visibility");
        }
    }

    /// Last requested visibility, else the console's initial one.
    pub fn get(&mut self, backend: &mut impl CursorBackend) -> Option<CursorVisibility> {
        self.capture_initial(backend);
        self.slot.value().or(self.initial)
    }

    /// Request `vis`. Returns whether it is on screen now.
    ///
    /// A request that cannot be applied is remembered as pending and
    /// retried by [`ensure`](Self::ensure).
    pub fn set(&mut self, backend: &mut impl CursorBackend, vis: CursorVisibility) -> bool {
        self.capture_initial(backend);

        if self.slot == CursorSlot::Applied(vis) {
            return true;
        }

        if !backend.can_apply() {
            warn!(?vis, "console not ready, cursor visibility deferred");
            self.slot = CursorSlot::Pending(vis);
            return false;
        }

        match backend.apply(vis) {
            Ok(()) => {
                self.slot = CursorSlot::Applied(vis);
                true
            }
            Err(err) => {
                warn!(?vis, %err, "cursor visibility deferred");
                self.slot = CursorSlot::Pending(vis);
                false
            }
        }
    }

    /// Re-apply a pending or stale visibility. Never fails; returns whether
    /// the slot is settled afterwards.
    pub fn ensure(&mut self, backend: &mut impl CursorBackend) -> bool {
        let vis = match self.slot {
            CursorSlot::Unknown | CursorSlot::Applied(_) => return true,
            CursorSlot::Pending(v) | CursorSlot::Stale(v) => v,
        };

        if !backend.can_apply() {
            return false;
        }

        match backend.apply(vis) {
            Ok(()) => {
                self.slot = CursorSlot::Applied(vis);
                true
            }
            Err(err) => {
                debug!(?vis, %err, "cursor visibility retry failed");
                false
            }
        }
    }

    /// Mark an applied visibility as needing re-application.
    pub fn force_refresh(&mut self) {
        if let CursorSlot::Applied(v) = self.slot {
            self.slot = CursorSlot::Stale(v);
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
