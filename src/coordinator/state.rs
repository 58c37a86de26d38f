//! Coordinator state: the single owner of registry, z-stack and tracker
//! slots. Mutated only through its own methods while the coordinator
//! lock is held.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::config::StratumConfig;
use crate::policy::LayoutPolicy;
use crate::surface::SurfaceComposer;
use crate::types::Rect;
use crate::window::token::{AppState, WindowToken};
use crate::window::WindowState;

pub struct CoordinatorState {
    /// Window handle → record registry.
    pub(crate) windows: HashMap<u64, WindowState>,
    /// Group token → record registry.
    pub(crate) tokens: HashMap<u64, WindowToken>,
    /// Z-ordered (bottom-most first) list of all windows; the single
    /// source of truth for display order.
    pub(crate) stack: Vec<u64>,
    /// Z-ordered (bottom-most first) list of application groups.
    pub(crate) app_order: Vec<u64>,
    /// Wallpaper-kind groups.
    pub(crate) wallpaper_tokens: Vec<u64>,
    /// Application groups whose starting placeholder is ready to be
    /// collected by the lifecycle collaborator.
    pub(crate) finished_starting: Vec<u64>,

    /// The stack has been reordered since the compositor last consumed
    /// it.
    pub(crate) windows_changed: bool,
    pub(crate) layout_needed: bool,
    pub(crate) focused_window: Option<u64>,
    pub(crate) in_touch_mode: bool,
    /// Bumped whenever display-wide configuration changes.
    pub(crate) config_seq: u64,
    pub(crate) display_width: i32,
    pub(crate) display_height: i32,

    /// An application transition has been scheduled but not executed;
    /// both target trackers hold their moves while this is set.
    pub(crate) transition_pending: bool,

    // Input-method slot.
    pub(crate) input_method_window: Option<u64>,
    pub(crate) input_method_dialogs: Vec<u64>,
    /// Window the overlay docks above; not necessarily where input
    /// goes.
    pub(crate) input_method_target: Option<u64>,
    pub(crate) input_method_target_waiting_anim: bool,
    pub(crate) input_method_adjustment: i32,

    // Wallpaper slot.
    pub(crate) wallpaper_target: Option<u64>,
    /// Lower half of a transition crossfade pair.
    pub(crate) lower_wallpaper_target: Option<u64>,
    /// Upper half of a transition crossfade pair.
    pub(crate) upper_wallpaper_target: Option<u64>,
    /// Window animating detached from the wallpaper; kept visible
    /// behind it in case the animation exposes it.
    pub(crate) detached_wallpaper: Option<u64>,
    pub(crate) wallpaper_adjustment: i32,
    pub(crate) last_wallpaper_x: f32,
    pub(crate) last_wallpaper_y: f32,
    pub(crate) last_wallpaper_x_step: f32,
    pub(crate) last_wallpaper_y_step: f32,
    /// Wallpaper window a synchronous offset dispatch is waiting on.
    pub(crate) waiting_on_wallpaper: Option<u64>,
    /// Last time a synchronous wait timed out; suppresses repeat waits
    /// for the recovery interval.
    pub(crate) last_wallpaper_timeout: Option<Instant>,

    pub(crate) policy: Arc<dyn LayoutPolicy>,
    pub(crate) composer: Arc<dyn SurfaceComposer>,
    pub(crate) config: StratumConfig,
}

impl CoordinatorState {
    pub(crate) fn new(
        config: StratumConfig,
        policy: Arc<dyn LayoutPolicy>,
        composer: Arc<dyn SurfaceComposer>,
    ) -> Self {
        Self {
            windows: HashMap::new(),
            tokens: HashMap::new(),
            stack: Vec::new(),
            app_order: Vec::new(),
            wallpaper_tokens: Vec::new(),
            finished_starting: Vec::new(),
            windows_changed: false,
            layout_needed: true,
            focused_window: None,
            in_touch_mode: true,
            config_seq: 1,
            display_width: config.display.width,
            display_height: config.display.height,
            transition_pending: false,
            input_method_window: None,
            input_method_dialogs: Vec::new(),
            input_method_target: None,
            input_method_target_waiting_anim: false,
            input_method_adjustment: 0,
            wallpaper_target: None,
            lower_wallpaper_target: None,
            upper_wallpaper_target: None,
            detached_wallpaper: None,
            wallpaper_adjustment: 0,
            last_wallpaper_x: -1.0,
            last_wallpaper_y: -1.0,
            last_wallpaper_x_step: -1.0,
            last_wallpaper_y_step: -1.0,
            waiting_on_wallpaper: None,
            last_wallpaper_timeout: None,
            policy,
            composer,
            config,
        }
    }

    pub(crate) fn win(&self, id: u64) -> Option<&WindowState> {
        self.windows.get(&id)
    }

    pub(crate) fn win_mut(&mut self, id: u64) -> Option<&mut WindowState> {
        self.windows.get_mut(&id)
    }

    pub(crate) fn token(&self, id: u64) -> Option<&WindowToken> {
        self.tokens.get(&id)
    }

    pub(crate) fn token_mut(&mut self, id: u64) -> Option<&mut WindowToken> {
        self.tokens.get_mut(&id)
    }

    pub(crate) fn app(&self, token: u64) -> Option<&AppState> {
        self.tokens.get(&token).and_then(|t| t.app())
    }

    pub(crate) fn app_mut(&mut self, token: u64) -> Option<&mut AppState> {
        self.tokens.get_mut(&token).and_then(|t| t.app_mut())
    }

    /// Owning application's state for a window, if it has one.
    pub(crate) fn app_of(&self, w: &WindowState) -> Option<&AppState> {
        w.app_token.and_then(|t| self.app(t))
    }

    pub(crate) fn app_hidden_requested(&self, w: &WindowState) -> bool {
        self.app_of(w).map(|a| a.hidden_requested).unwrap_or(false)
    }

    /// Application-level animation attached to the window's group.
    pub(crate) fn app_animation(&self, w: &WindowState) -> bool {
        self.app_of(w).map(|a| a.animation).unwrap_or(false)
    }

    pub(crate) fn win_is_visible(&self, w: &WindowState) -> bool {
        w.is_visible(self.app_hidden_requested(w))
    }

    pub(crate) fn win_is_win_visible(&self, w: &WindowState) -> bool {
        let animating = self.app_of(w).map(|a| a.animating).unwrap_or(false);
        w.is_win_visible(self.app_hidden_requested(w), animating)
    }

    pub(crate) fn win_is_visible_or_adding(&self, w: &WindowState) -> bool {
        w.is_visible_or_adding(self.app_hidden_requested(w))
    }

    pub(crate) fn win_is_ready_for_display(&self, w: &WindowState) -> bool {
        let group_hidden = self.token(w.token).map(|t| t.hidden).unwrap_or(false);
        w.is_ready_for_display(self.app_animation(w), group_hidden)
    }

    pub(crate) fn win_is_displayed(&self, w: &WindowState) -> bool {
        w.is_displayed(self.app_hidden_requested(w))
    }

    pub(crate) fn win_is_animating(&self, w: &WindowState) -> bool {
        w.is_animating(self.app_animation(w))
    }

    pub(crate) fn stack_index(&self, id: u64) -> Option<usize> {
        self.stack.iter().position(|&w| w == id)
    }

    pub(crate) fn display_rect(&self) -> Rect {
        Rect::from_size(self.display_width, self.display_height)
    }

    /// Groups whose starting placeholder is ready for collection.
    pub(crate) fn take_finished_starting(&mut self) -> Vec<u64> {
        std::mem::take(&mut self.finished_starting)
    }
}
