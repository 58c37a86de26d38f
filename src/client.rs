//! Per-window client callback surface.
//!
//! The coordinator never owns a transport; each window carries a boxed
//! callback object that the owning process (or a test harness) implements.
//! Dispatches are fire-and-forget: a dead client is detected through
//! [`WindowClient::is_alive`] at add time and otherwise ignored.

use crate::types::{Insets, Rect};

/// Callbacks delivered to the process owning a window.
///
/// All methods have no-op defaults so harnesses only implement what they
/// observe.
pub trait WindowClient: Send + Sync {
    /// The client connection is still usable. Checked once before a
    /// window is registered; a defunct client aborts the add.
    fn is_alive(&self) -> bool {
        true
    }

    /// Visibility flip for wallpaper surfaces. Dispatched exactly once
    /// per flip.
    fn dispatch_visibility(&self, _visible: bool) {}

    /// New wallpaper scroll offsets. When `sync` is set the coordinator
    /// blocks (bounded) until [`wallpaper offsets are acknowledged`]
    /// (crate::WindowCoordinator::wallpaper_offsets_complete).
    fn dispatch_wallpaper_offsets(&self, _x: f32, _y: f32, _x_step: f32, _y_step: f32, _sync: bool) {
    }

    /// Free-form command fan-out to wallpaper clients.
    fn dispatch_wallpaper_command(&self, _action: &str, _x: i32, _y: i32, _z: i32, _sync: bool) {}

    /// Frame or inset geometry changed.
    fn dispatch_resized(&self, _frame: Rect, _content_insets: Insets, _visible_insets: Insets) {}
}

/// Client that ignores every dispatch. Used by tests and detached
/// windows.
pub struct NullClient;

impl WindowClient for NullClient {}
