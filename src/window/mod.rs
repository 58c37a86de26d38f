//! Window records and attributes.
//!
//! A window is identified by a `u64` handle and stored in the coordinator's
//! registry. The record carries everything the stacking engine and the two
//! target trackers need: type, flags, base/sub-layer, attachment, lifecycle
//! flags and wallpaper scroll state. Numeric `layer`/`anim_layer` values are
//! written only by the layer-assignment stage, never by the placement engine.

pub mod token;

use std::sync::Arc;

use crate::client::WindowClient;
use crate::surface::SurfaceHandle;
use crate::types::{Insets, Rect};

/// Window type classification, mirroring the policy's layering classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowType {
    /// Base window of an application; forced beneath its siblings.
    BaseApplication,
    /// Regular application window.
    Application,
    /// Transient placeholder shown while an application starts.
    ApplicationStarting,
    /// Sub-window panel, above its attachment window.
    ApplicationPanel,
    /// Sub-window media layer, below its attachment window.
    ApplicationMedia,
    /// Sub-window panel above other panels.
    ApplicationSubPanel,
    /// Dialog attached to an application window.
    ApplicationAttachedDialog,
    /// Soft-input overlay.
    InputMethod,
    /// Dialog belonging to the soft-input overlay.
    InputMethodDialog,
    /// Background wallpaper surface.
    Wallpaper,
    /// System alert, above applications.
    SystemAlert,
    /// System overlay, above everything but the status bar.
    SystemOverlay,
    /// Status bar.
    StatusBar,
}

impl WindowType {
    /// Sub-windows attach to a parent and order by sub-layer.
    pub fn is_sub_window(self) -> bool {
        matches!(
            self,
            WindowType::ApplicationPanel
                | WindowType::ApplicationMedia
                | WindowType::ApplicationSubPanel
                | WindowType::ApplicationAttachedDialog
        )
    }

    /// Application windows require an application-kind group token.
    pub fn is_application_window(self) -> bool {
        matches!(
            self,
            WindowType::BaseApplication
                | WindowType::Application
                | WindowType::ApplicationStarting
        )
    }
}

/// Window flag bits (can be combined).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindowFlags {
    bits: u32,
}

impl WindowFlags {
    /// No flags set.
    pub const NONE: WindowFlags = WindowFlags { bits: 0 };
    /// Window never takes key focus.
    pub const NOT_FOCUSABLE: WindowFlags = WindowFlags { bits: 1 << 0 };
    /// Inverts the input-method eligibility rule of `NOT_FOCUSABLE`.
    pub const ALT_FOCUSABLE_IM: WindowFlags = WindowFlags { bits: 1 << 1 };
    /// Window asks for the wallpaper to be shown behind it.
    pub const SHOW_WALLPAPER: WindowFlags = WindowFlags { bits: 1 << 2 };
    /// Keep the surface alive while an exit animation runs.
    pub const KEEP_SURFACE_WHILE_ANIMATING: WindowFlags = WindowFlags { bits: 1 << 3 };
    /// Surface is scaled to the requested size.
    pub const SCALED: WindowFlags = WindowFlags { bits: 1 << 4 };

    pub fn contains(self, other: WindowFlags) -> bool {
        (self.bits & other.bits) == other.bits
    }

    pub fn intersects(self, other: WindowFlags) -> bool {
        (self.bits & other.bits) != 0
    }

    pub fn insert(&mut self, other: WindowFlags) {
        self.bits |= other.bits;
    }

    pub fn remove(&mut self, other: WindowFlags) {
        self.bits &= !other.bits;
    }

    pub fn bits(self) -> u32 {
        self.bits
    }
}

impl std::ops::BitOr for WindowFlags {
    type Output = WindowFlags;
    fn bitor(self, rhs: WindowFlags) -> WindowFlags {
        WindowFlags {
            bits: self.bits | rhs.bits,
        }
    }
}

impl std::ops::BitAnd for WindowFlags {
    type Output = WindowFlags;
    fn bitand(self, rhs: WindowFlags) -> WindowFlags {
        WindowFlags {
            bits: self.bits & rhs.bits,
        }
    }
}

impl std::ops::BitXor for WindowFlags {
    type Output = WindowFlags;
    fn bitxor(self, rhs: WindowFlags) -> WindowFlags {
        WindowFlags {
            bits: self.bits ^ rhs.bits,
        }
    }
}

/// Client-requested view visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Invisible,
    Gone,
}

/// Client-supplied window attributes.
#[derive(Debug, Clone)]
pub struct WindowAttrs {
    pub kind: WindowType,
    pub flags: WindowFlags,
    /// Size on screen; differs from the requested surface size for
    /// `SCALED` windows.
    pub width: i32,
    pub height: i32,
    /// Pixel format tag; changing it forces a surface rebuild.
    pub format: u32,
    pub title: String,
}

impl WindowAttrs {
    pub fn new(kind: WindowType, title: impl Into<String>) -> Self {
        Self {
            kind,
            flags: WindowFlags::NONE,
            width: 0,
            height: 0,
            format: 0,
            title: title.into(),
        }
    }

    pub fn with_flags(mut self, flags: WindowFlags) -> Self {
        self.flags = flags;
        self
    }
}

/// A window record in the coordinator registry.
pub struct WindowState {
    pub id: u64,
    /// Session that created the window; used to validate client calls.
    pub session: u64,
    pub attrs: WindowAttrs,
    /// Owning group token. For sub-windows this is the attachment
    /// window's token, so group member lists mix parents and children.
    pub token: u64,
    /// Application group, when the owning token is application-kind.
    pub app_token: Option<u64>,
    /// Attachment window, for sub-windows only.
    pub attached: Option<u64>,
    /// Attached sub-windows, in insertion order.
    pub children: Vec<u64>,
    /// Application group the input-method block is docked to.
    pub target_app_token: Option<u64>,

    pub base_layer: i32,
    pub sub_layer: i32,
    /// Assigned by the layer stage, not the placement engine.
    pub layer: i32,
    pub anim_layer: i32,

    pub visibility: Visibility,
    pub policy_visible: bool,
    pub attached_hidden: bool,
    pub relayout_called: bool,
    pub exiting: bool,
    pub removed: bool,
    pub destroying: bool,
    pub remove_on_exit: bool,
    /// A window animation is attached.
    pub animation: bool,
    /// Extra animating latch (set when hiding the wallpaper target so
    /// both sides change inside one transaction).
    pub animating: bool,
    pub enter_animation_pending: bool,
    pub draw_pending: bool,
    pub commit_draw_pending: bool,
    pub report_destroy_surface: bool,
    pub surface_pending_destroy: bool,
    pub obscured: bool,
    pub is_im_window: bool,

    pub surface: Option<SurfaceHandle>,

    pub requested_width: i32,
    pub requested_height: i32,
    pub h_scale: f32,
    pub v_scale: f32,
    pub global_scale: f32,
    pub frame: Rect,
    pub display_frame: Rect,
    pub content_insets: Insets,
    pub visible_insets: Insets,
    pub given_insets_pending: bool,
    pub given_content_insets: Insets,
    pub given_visible_insets: Insets,
    pub given_touchable_region: Rect,
    pub touchable_insets_mode: i32,

    /// Wallpaper scroll fraction in [0,1]; negative means unset.
    pub wallpaper_x: f32,
    pub wallpaper_y: f32,
    pub wallpaper_x_step: f32,
    pub wallpaper_y_step: f32,
    pub x_offset: i32,
    pub y_offset: i32,
    pub wallpaper_visible: bool,

    /// Configuration sequence last reported to the client.
    pub seen_config: u64,

    pub client: Arc<dyn WindowClient>,
}

impl std::fmt::Debug for WindowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowState")
            .field("id", &self.id)
            .field("title", &self.attrs.title)
            .field("kind", &self.attrs.kind)
            .field("token", &self.token)
            .field("attached", &self.attached)
            .field("sub_layer", &self.sub_layer)
            .field("exiting", &self.exiting)
            .field("removed", &self.removed)
            .finish()
    }
}

impl WindowState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: u64,
        session: u64,
        attrs: WindowAttrs,
        token: u64,
        app_token: Option<u64>,
        attached: Option<u64>,
        visibility: Visibility,
        base_layer: i32,
        sub_layer: i32,
        client: Arc<dyn WindowClient>,
    ) -> Self {
        let is_im_window = matches!(
            attrs.kind,
            WindowType::InputMethod | WindowType::InputMethodDialog
        );
        Self {
            id,
            session,
            attrs,
            token,
            app_token,
            attached,
            children: Vec::new(),
            target_app_token: None,
            base_layer,
            sub_layer,
            layer: 0,
            anim_layer: 0,
            visibility,
            policy_visible: true,
            attached_hidden: false,
            relayout_called: false,
            exiting: false,
            removed: false,
            destroying: false,
            remove_on_exit: false,
            animation: false,
            animating: false,
            enter_animation_pending: false,
            draw_pending: false,
            commit_draw_pending: false,
            report_destroy_surface: false,
            surface_pending_destroy: false,
            obscured: false,
            is_im_window,
            surface: None,
            requested_width: 0,
            requested_height: 0,
            h_scale: 1.0,
            v_scale: 1.0,
            global_scale: 1.0,
            frame: Rect::default(),
            display_frame: Rect::default(),
            content_insets: Insets::default(),
            visible_insets: Insets::default(),
            given_insets_pending: false,
            given_content_insets: Insets::default(),
            given_visible_insets: Insets::default(),
            given_touchable_region: Rect::default(),
            touchable_insets_mode: 0,
            wallpaper_x: -1.0,
            wallpaper_y: -1.0,
            wallpaper_x_step: -1.0,
            wallpaper_y_step: -1.0,
            x_offset: 0,
            y_offset: 0,
            wallpaper_visible: false,
            seen_config: 0,
            client,
        }
    }

    /// Surface exists and has completed its first draw.
    pub fn is_drawn(&self) -> bool {
        self.surface.is_some()
            && !self.destroying
            && !self.draw_pending
            && !self.commit_draw_pending
    }

    /// Visible on screen right now. `app_hidden_requested` is the
    /// owning application's hide request, false when there is none.
    pub fn is_visible(&self, app_hidden_requested: bool) -> bool {
        self.surface.is_some()
            && self.policy_visible
            && !self.attached_hidden
            && !app_hidden_requested
            && !self.exiting
            && !self.destroying
    }

    /// Like [`is_visible`](Self::is_visible) but still true while the
    /// owning application animates out.
    pub fn is_win_visible(&self, app_hidden_requested: bool, app_animating: bool) -> bool {
        self.surface.is_some()
            && self.policy_visible
            && !self.attached_hidden
            && (!app_hidden_requested || app_animating)
            && !self.exiting
            && !self.destroying
    }

    /// Visible, or in the process of being added (first relayout not
    /// yet called with a visible request).
    pub fn is_visible_or_adding(&self, app_hidden_requested: bool) -> bool {
        ((self.surface.is_some() && !self.report_destroy_surface)
            || (!self.relayout_called && self.visibility == Visibility::Visible))
            && self.policy_visible
            && !self.attached_hidden
            && !app_hidden_requested
            && !self.exiting
            && !self.destroying
    }

    /// Ready to be shown by the compositor: surface allocated and either
    /// requested visible or carried by an animation.
    pub fn is_ready_for_display(&self, app_animation: bool, group_hidden: bool) -> bool {
        self.surface.is_some()
            && self.policy_visible
            && !self.destroying
            && ((!self.attached_hidden
                && self.visibility == Visibility::Visible
                && !group_hidden)
                || self.animation
                || app_animation)
    }

    /// Actually displayed: drawn and not hidden, or animating out.
    pub fn is_displayed(&self, app_hidden_requested: bool) -> bool {
        self.is_drawn()
            && self.policy_visible
            && ((!self.attached_hidden && !app_hidden_requested) || self.animating)
    }

    /// Whether an animation is driving this window, directly or through
    /// its application group.
    pub fn is_animating(&self, app_animation: bool) -> bool {
        self.animation || app_animation
    }

    /// Eligible for key focus.
    pub fn can_receive_keys(&self, app_hidden_requested: bool) -> bool {
        self.is_visible_or_adding(app_hidden_requested)
            && self.visibility == Visibility::Visible
            && !self.attrs.flags.contains(WindowFlags::NOT_FOCUSABLE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::NullClient;
    use crate::surface::SurfaceHandle;

    fn window(kind: WindowType) -> WindowState {
        WindowState::new(
            1,
            1,
            WindowAttrs::new(kind, "test"),
            100,
            None,
            None,
            Visibility::Visible,
            21000,
            0,
            Arc::new(NullClient),
        )
    }

    #[test]
    fn test_flags_combine() {
        let mut flags = WindowFlags::NOT_FOCUSABLE | WindowFlags::SHOW_WALLPAPER;
        assert!(flags.contains(WindowFlags::NOT_FOCUSABLE));
        assert!(flags.contains(WindowFlags::SHOW_WALLPAPER));
        assert!(!flags.contains(WindowFlags::ALT_FOCUSABLE_IM));

        flags.remove(WindowFlags::NOT_FOCUSABLE);
        assert!(!flags.contains(WindowFlags::NOT_FOCUSABLE));

        flags.insert(WindowFlags::SCALED);
        assert!(flags.contains(WindowFlags::SCALED));
    }

    #[test]
    fn test_sub_window_classification() {
        assert!(WindowType::ApplicationPanel.is_sub_window());
        assert!(WindowType::ApplicationMedia.is_sub_window());
        assert!(!WindowType::BaseApplication.is_sub_window());
        assert!(!WindowType::InputMethodDialog.is_sub_window());

        assert!(WindowType::ApplicationStarting.is_application_window());
        assert!(!WindowType::Wallpaper.is_application_window());
    }

    #[test]
    fn test_visibility_predicates_track_surface() {
        let mut w = window(WindowType::Application);
        assert!(!w.is_visible(false));
        // Being added: no relayout yet, requested visible.
        assert!(w.is_visible_or_adding(false));

        w.surface = Some(SurfaceHandle(7));
        assert!(w.is_visible(false));
        assert!(!w.is_visible(true));

        w.exiting = true;
        assert!(!w.is_visible(false));
    }

    #[test]
    fn test_is_drawn_requires_committed_draw() {
        let mut w = window(WindowType::Application);
        w.surface = Some(SurfaceHandle(7));
        w.draw_pending = true;
        assert!(!w.is_drawn());
        w.draw_pending = false;
        assert!(w.is_drawn());
    }
}
