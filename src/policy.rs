//! Layout policy seam.
//!
//! Permission gating, inset hints and the per-type layering table are
//! policy decisions, not coordinator ones. The coordinator consults this
//! trait and never hard-codes type ordinals.

use crate::types::{Insets, Rect};
use crate::window::{WindowAttrs, WindowType};

/// Animation transit hints handed to the policy when a window is shown
/// or hidden. Curve selection happens outside this crate; the policy
/// only decides whether a transition exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transit {
    Enter,
    Exit,
    Show,
    /// A starting placeholder finished its preview.
    PreviewDone,
}

pub trait LayoutPolicy: Send + Sync {
    /// Gate on add. `false` rejects the window before any state is
    /// touched.
    fn check_add_permission(&self, _attrs: &WindowAttrs) -> bool {
        true
    }

    /// Policy may rewrite attributes before they are committed.
    fn adjust_window_attrs(&self, _attrs: &mut WindowAttrs) {}

    /// Expected content insets for a window that has not laid out yet.
    fn content_inset_hint(&self, attrs: &WindowAttrs, display: Rect) -> Insets;

    /// Screen is on; exit animations are skipped when it is not.
    fn is_screen_on(&self) -> bool;

    /// Layer ordinal for a window type. Multiplied out by the layer
    /// stage; higher ordinals stack above lower ones.
    fn window_type_layer(&self, kind: WindowType) -> i32;

    /// Sub-layer for a sub-window type, negative meaning below the
    /// attachment window.
    fn sub_window_layer(&self, kind: WindowType) -> i32;

    /// Highest layer ordinal the wallpaper may be placed beneath.
    fn max_wallpaper_layer(&self) -> i32;

    /// Whether a transition animation exists for this window and
    /// transit. Returning `false` makes hide/remove take effect
    /// immediately.
    fn has_transition_animation(&self, _attrs: &WindowAttrs, _transit: Transit) -> bool {
        true
    }
}

/// Stock policy: phone-style layering table, everything permitted,
/// screen always on.
#[derive(Debug, Default)]
pub struct DefaultPolicy;

impl DefaultPolicy {
    const APPLICATION_LAYER: i32 = 2;
    const SYSTEM_ALERT_LAYER: i32 = 9;
    const INPUT_METHOD_LAYER: i32 = 10;
    const INPUT_METHOD_DIALOG_LAYER: i32 = 12;
    const STATUS_BAR_LAYER: i32 = 14;
    const SYSTEM_OVERLAY_LAYER: i32 = 18;
}

impl LayoutPolicy for DefaultPolicy {
    fn content_inset_hint(&self, _attrs: &WindowAttrs, _display: Rect) -> Insets {
        Insets::default()
    }

    fn is_screen_on(&self) -> bool {
        true
    }

    fn window_type_layer(&self, kind: WindowType) -> i32 {
        match kind {
            WindowType::BaseApplication
            | WindowType::Application
            | WindowType::ApplicationStarting
            | WindowType::ApplicationPanel
            | WindowType::ApplicationMedia
            | WindowType::ApplicationSubPanel
            | WindowType::ApplicationAttachedDialog
            | WindowType::Wallpaper => Self::APPLICATION_LAYER,
            WindowType::SystemAlert => Self::SYSTEM_ALERT_LAYER,
            WindowType::InputMethod => Self::INPUT_METHOD_LAYER,
            WindowType::InputMethodDialog => Self::INPUT_METHOD_DIALOG_LAYER,
            WindowType::StatusBar => Self::STATUS_BAR_LAYER,
            WindowType::SystemOverlay => Self::SYSTEM_OVERLAY_LAYER,
        }
    }

    fn sub_window_layer(&self, kind: WindowType) -> i32 {
        match kind {
            WindowType::ApplicationPanel | WindowType::ApplicationAttachedDialog => 1,
            WindowType::ApplicationSubPanel => 2,
            WindowType::ApplicationMedia => -2,
            _ => 0,
        }
    }

    fn max_wallpaper_layer(&self) -> i32 {
        Self::STATUS_BAR_LAYER
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_ordering() {
        let policy = DefaultPolicy;
        let app = policy.window_type_layer(WindowType::Application);
        let ime = policy.window_type_layer(WindowType::InputMethod);
        let ime_dialog = policy.window_type_layer(WindowType::InputMethodDialog);
        let status = policy.window_type_layer(WindowType::StatusBar);

        assert!(app < ime);
        assert!(ime < ime_dialog);
        assert!(ime_dialog < status);
        assert!(policy.max_wallpaper_layer() > app);
    }

    #[test]
    fn test_sub_layers() {
        let policy = DefaultPolicy;
        assert!(policy.sub_window_layer(WindowType::ApplicationMedia) < 0);
        assert!(policy.sub_window_layer(WindowType::ApplicationPanel) > 0);
        assert!(
            policy.sub_window_layer(WindowType::ApplicationSubPanel)
                > policy.sub_window_layer(WindowType::ApplicationPanel)
        );
    }
}
