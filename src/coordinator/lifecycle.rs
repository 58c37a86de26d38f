//! Window and group lifecycle: add, remove, relayout and the token
//! operations. Everything here runs under the coordinator lock and is
//! surfaced through [`WindowCoordinator`](super::WindowCoordinator).

use std::sync::Arc;

use log::{debug, info, warn};

use crate::client::WindowClient;
use crate::coordinator::state::CoordinatorState;
use crate::coordinator::{AddWindowError, AddedWindow, RelayoutResult};
use crate::layers::{TYPE_LAYER_MULTIPLIER, TYPE_LAYER_OFFSET};
use crate::policy::Transit;
use crate::types::{Insets, Rect};
use crate::window::token::{AppState, TokenKind, WindowToken};
use crate::window::{Visibility, WindowAttrs, WindowFlags, WindowState, WindowType};

impl CoordinatorState {
    pub(crate) fn window_for_session(&self, session: u64, id: u64) -> Option<&WindowState> {
        self.win(id).filter(|w| w.session == session)
    }

    /// Attaches a window animation if policy and configuration allow
    /// one; hides and removals take effect immediately otherwise.
    pub(crate) fn apply_animation(&mut self, id: u64, transit: Transit) -> bool {
        let enabled = self.config.animations.enabled && self.config.animations.window_scale > 0.0;
        let allowed = enabled
            && self.policy.is_screen_on()
            && self
                .win(id)
                .map(|w| self.policy.has_transition_animation(&w.attrs, transit))
                .unwrap_or(false);
        if let Some(w) = self.win_mut(id) {
            w.animation = allowed;
        }
        allowed
    }

    pub(crate) fn add_window_locked(
        &mut self,
        session: u64,
        id: u64,
        mut attrs: WindowAttrs,
        token_id: u64,
        visibility: Visibility,
        client: Arc<dyn WindowClient>,
    ) -> Result<AddedWindow, AddWindowError> {
        if !self.policy.check_add_permission(&attrs) {
            return Err(AddWindowError::PermissionDenied);
        }

        if self.windows.contains_key(&id) {
            warn!("window {id} is already added");
            return Err(AddWindowError::Duplicate(id));
        }

        // Sub-windows name their attachment window as the group.
        let mut attached: Option<u64> = None;
        if attrs.kind.is_sub_window() {
            match self.win(token_id) {
                Some(p) if !p.attrs.kind.is_sub_window() => attached = Some(token_id),
                Some(_) => {
                    warn!("window {id}: attachment {token_id} is itself a sub-window");
                    return Err(AddWindowError::BadToken(token_id));
                }
                None => {
                    warn!("window {id}: attachment {token_id} is not a window");
                    return Err(AddWindowError::BadToken(token_id));
                }
            }
        }

        let mut create_token = false;
        match self.token(token_id) {
            None => {
                if attrs.kind.is_application_window()
                    || attrs.kind == WindowType::InputMethod
                    || attrs.kind == WindowType::Wallpaper
                {
                    warn!("window {id}: unknown group token {token_id}");
                    return Err(AddWindowError::BadToken(token_id));
                }
                create_token = true;
            }
            Some(tok) => {
                if attrs.kind.is_application_window() {
                    let app = tok
                        .app()
                        .ok_or(AddWindowError::NotApplicationToken(token_id))?;
                    if app.removed {
                        warn!("window {id}: application group {token_id} is exiting");
                        return Err(AddWindowError::ApplicationExiting(token_id));
                    }
                    if attrs.kind == WindowType::ApplicationStarting && app.first_window_drawn {
                        debug!("window {id}: starting placeholder no longer needed");
                        return Err(AddWindowError::StartingNotNeeded);
                    }
                } else if attrs.kind == WindowType::InputMethod {
                    if !matches!(tok.kind, TokenKind::InputMethod) {
                        return Err(AddWindowError::BadToken(token_id));
                    }
                } else if attrs.kind == WindowType::Wallpaper
                    && !matches!(tok.kind, TokenKind::Wallpaper)
                {
                    return Err(AddWindowError::BadToken(token_id));
                }
            }
        }

        if !client.is_alive() {
            warn!("window {id}: client is already dead");
            return Err(AddWindowError::ClientDefunct);
        }

        self.policy.adjust_window_attrs(&mut attrs);

        // From here on, no failures.

        let (base_layer, sub_layer, app_token) = match attached.and_then(|a| self.win(a)) {
            Some(parent) => (
                self.policy.window_type_layer(parent.attrs.kind) * TYPE_LAYER_MULTIPLIER
                    + TYPE_LAYER_OFFSET,
                self.policy.sub_window_layer(attrs.kind),
                parent.app_token,
            ),
            None => {
                let app = self
                    .token(token_id)
                    .filter(|t| t.kind.is_application())
                    .map(|t| t.id);
                (
                    self.policy.window_type_layer(attrs.kind) * TYPE_LAYER_MULTIPLIER
                        + TYPE_LAYER_OFFSET,
                    0,
                    app,
                )
            }
        };

        if create_token {
            self.tokens
                .insert(token_id, WindowToken::new(token_id, TokenKind::Plain, false));
        }

        let kind = attrs.kind;
        let flags = attrs.flags;
        let mut win = WindowState::new(
            id,
            session,
            attrs.clone(),
            token_id,
            app_token,
            attached,
            visibility,
            base_layer,
            sub_layer,
            client,
        );
        if let Some(parent) = attached.and_then(|a| self.win(a)) {
            // Sub-windows of the overlay count as part of its block.
            win.is_im_window = win.is_im_window || parent.is_im_window;
        }
        self.windows.insert(id, win);
        info!("add window {id} '{}' kind={kind:?} group={token_id}", attrs.title);

        if let Some(parent) = attached {
            // Children stay sorted by sub-layer, ties after.
            let at = {
                let siblings = self
                    .win(parent)
                    .map(|p| p.children.clone())
                    .unwrap_or_default();
                siblings
                    .iter()
                    .position(|&c| self.win(c).map(|w| w.sub_layer).unwrap_or(0) > sub_layer)
                    .unwrap_or(siblings.len())
            };
            if let Some(p) = self.win_mut(parent) {
                p.children.insert(at, id);
            }
        }

        if kind == WindowType::ApplicationStarting {
            if let Some(a) = app_token.and_then(|t| self.app_mut(t)) {
                a.starting_window = Some(id);
            }
        }

        let mut im_may_move = true;
        match kind {
            WindowType::InputMethod => {
                self.input_method_window = Some(id);
                self.add_input_method_window(id);
                im_may_move = false;
            }
            WindowType::InputMethodDialog => {
                self.input_method_dialogs.push(id);
                self.place_window_in_order(id, true);
                self.adjust_input_method_dialogs();
                im_may_move = false;
            }
            _ => {
                self.place_window_in_order(id, true);
                if kind == WindowType::Wallpaper {
                    self.last_wallpaper_timeout = None;
                    self.reconcile_wallpaper();
                } else if flags.contains(WindowFlags::SHOW_WALLPAPER) {
                    self.reconcile_wallpaper();
                }
            }
        }

        if let Some(w) = self.win_mut(id) {
            w.enter_animation_pending = true;
        }

        let content_insets = self.policy.content_inset_hint(&attrs, self.display_rect());
        let in_touch_mode = self.in_touch_mode;
        let app_visible = app_token
            .and_then(|t| self.app(t))
            .map(|a| !a.client_hidden)
            .unwrap_or(true);

        let mut focus_changed = false;
        let can_focus = self
            .win(id)
            .map(|w| w.can_receive_keys(self.app_hidden_requested(w)))
            .unwrap_or(false);
        if can_focus {
            focus_changed = self.update_focus();
            if focus_changed {
                im_may_move = false;
            }
        }

        if im_may_move {
            self.move_ime_windows_if_needed(false);
        }

        self.assign_layers();
        // Layout happens on the first relayout, not here.

        Ok(AddedWindow {
            content_insets,
            in_touch_mode,
            app_visible,
            focus_changed,
        })
    }

    pub(crate) fn remove_window_locked(&mut self, id: u64) {
        let (has_surface, kind) = match self.win(id) {
            Some(w) => (w.surface.is_some(), w.attrs.kind),
            None => return,
        };
        debug!("remove window {id}");

        // If an exit animation should run, hold the structural removal
        // until it finishes.
        if has_surface && self.policy.is_screen_on() {
            let was_visible = self
                .win(id)
                .map(|w| self.win_is_win_visible(w))
                .unwrap_or(false);
            if was_visible {
                let transit = if kind == WindowType::ApplicationStarting {
                    Transit::PreviewDone
                } else {
                    Transit::Exit
                };
                if self.apply_animation(id, transit) {
                    if let Some(w) = self.win_mut(id) {
                        w.exiting = true;
                    }
                }
            }
            let defer = self
                .win(id)
                .map(|w| w.exiting || self.win_is_animating(w))
                .unwrap_or(false);
            if defer {
                if let Some(w) = self.win_mut(id) {
                    w.exiting = true;
                    w.remove_on_exit = true;
                }
                self.layout_needed = true;
                self.update_focus();
                return;
            }
        }

        self.remove_window_inner(id);
        self.update_focus();
    }

    /// Unconditional structural removal: children first, then every
    /// registry, group and tracker reference.
    pub(crate) fn remove_window_inner(&mut self, id: u64) {
        let (kind, flags, token_id, app_token, attached, children, removed) = match self.win(id) {
            Some(w) => (
                w.attrs.kind,
                w.attrs.flags,
                w.token,
                w.app_token,
                w.attached,
                w.children.clone(),
                w.removed,
            ),
            None => return,
        };
        if removed {
            return;
        }

        for &child in children.iter().rev() {
            warn!("force-removing child window {child} of {id}");
            self.remove_window_inner(child);
        }

        if let Some(w) = self.win_mut(id) {
            w.removed = true;
        }

        if self.input_method_target == Some(id) {
            self.move_ime_windows_if_needed(false);
        }

        if let Some(s) = self.win(id).and_then(|w| w.surface) {
            self.composer.destroy_surface(s);
        }
        if let Some(w) = self.win_mut(id) {
            w.surface = None;
        }

        if let Some(pos) = self.stack_index(id) {
            self.stack.remove(pos);
            self.windows_changed = true;
        }

        if self.input_method_window == Some(id) {
            self.input_method_window = None;
        } else if kind == WindowType::InputMethodDialog {
            self.input_method_dialogs.retain(|&d| d != id);
        }

        if let Some(parent) = attached {
            if let Some(p) = self.win_mut(parent) {
                p.children.retain(|&c| c != id);
            }
        }

        let mut drop_token = false;
        let mut clear_first_drawn = false;
        if let Some(t) = self.token_mut(token_id) {
            t.windows.retain(|&w| w != id);
            if t.windows.is_empty() {
                if !t.explicit {
                    drop_token = true;
                } else if app_token == Some(token_id) {
                    clear_first_drawn = true;
                }
            }
        }
        if drop_token {
            debug!("dropping implicit group {token_id}");
            self.tokens.remove(&token_id);
        } else if clear_first_drawn {
            if let Some(a) = self.app_mut(token_id) {
                a.first_window_drawn = false;
            }
        }

        let mut starting_done: Option<u64> = None;
        if let Some(app) = app_token {
            if let Some(a) = self.app_mut(app) {
                a.all_windows.retain(|&w| w != id);
                if a.starting_window == Some(id) {
                    a.starting_window = None;
                } else if a.all_windows.len() == 1 && a.starting_window.is_some() {
                    // Only the placeholder is left; schedule its
                    // collection.
                    starting_done = Some(app);
                }
            }
        }
        if let Some(app) = starting_done {
            debug!("group {app}: last real window gone, placeholder can go");
            self.finished_starting.push(app);
        }

        if kind == WindowType::Wallpaper {
            self.last_wallpaper_timeout = None;
            self.reconcile_wallpaper();
        } else if flags.contains(WindowFlags::SHOW_WALLPAPER) {
            self.reconcile_wallpaper();
        }

        self.assign_layers();
        self.layout_needed = true;
        self.windows.remove(&id);
        info!("removed window {id}");
    }

    /// Collaborator signal: a window animation finished stepping.
    pub(crate) fn animation_finished_locked(&mut self, id: u64) {
        let (was_deferred, touches_wallpaper) = match self.win_mut(id) {
            Some(w) => {
                w.animation = false;
                w.animating = false;
                let deferred = w.exiting && w.remove_on_exit;
                let wp = w.attrs.kind == WindowType::Wallpaper
                    || w.attrs.flags.contains(WindowFlags::SHOW_WALLPAPER);
                (deferred, wp)
            }
            None => return,
        };
        let was_detached = self.detached_wallpaper == Some(id);
        if was_detached {
            self.detached_wallpaper = None;
        }

        if was_deferred {
            if let Some(w) = self.win_mut(id) {
                w.exiting = false;
                w.remove_on_exit = false;
            }
            self.remove_window_inner(id);
            self.update_focus();
            return;
        }

        if self.input_method_target_waiting_anim {
            // The overlay has been holding on a window whose application
            // was mid-animation; once that window settles, re-run the
            // move it was waiting for.
            let settled = self
                .input_method_target
                .and_then(|t| self.win(t))
                .map(|w| !self.win_is_animating(w))
                .unwrap_or(true);
            if settled {
                self.move_ime_windows_if_needed(false);
            }
        }

        if touches_wallpaper
            || was_detached
            || self.wallpaper_target == Some(id)
            || self.lower_wallpaper_target == Some(id)
            || self.upper_wallpaper_target == Some(id)
        {
            self.reconcile_wallpaper();
        }
        self.assign_layers();
        self.layout_needed = true;
    }

    /// Collaborator signal: a window animation started (or stopped)
    /// running detached from the wallpaper. While set, the wallpaper is
    /// kept in place beneath that window even without a regular target,
    /// in case the animation exposes it.
    pub(crate) fn set_detached_wallpaper_locked(&mut self, window: Option<u64>) {
        if self.detached_wallpaper == window {
            return;
        }
        debug!(
            "detached wallpaper window: {:?} -> {window:?}",
            self.detached_wallpaper
        );
        self.detached_wallpaper = window;
        if self.reconcile_wallpaper().any() {
            self.assign_layers();
            self.layout_needed = true;
        }
    }

    pub(crate) fn relayout_locked(
        &mut self,
        id: u64,
        attrs: Option<WindowAttrs>,
        requested_width: i32,
        requested_height: i32,
        visibility: Visibility,
        insets_pending: bool,
    ) -> RelayoutResult {
        let mut displayed = false;

        if let Some(w) = self.win_mut(id) {
            w.requested_width = requested_width;
            w.requested_height = requested_height;
        }

        let mut flag_changes = WindowFlags::NONE;
        let mut format_changed = false;
        if let Some(mut new_attrs) = attrs {
            self.policy.adjust_window_attrs(&mut new_attrs);
            if let Some(w) = self.win_mut(id) {
                flag_changes = w.attrs.flags ^ new_attrs.flags;
                format_changed = w.attrs.format != new_attrs.format;
                w.attrs = new_attrs;
            }
        }

        if let Some(w) = self.win_mut(id) {
            if w.attrs.flags.contains(WindowFlags::SCALED) {
                w.h_scale = if w.attrs.width != requested_width && requested_width != 0 {
                    w.attrs.width as f32 / requested_width as f32
                } else {
                    1.0
                };
                w.v_scale = if w.attrs.height != requested_height && requested_height != 0 {
                    w.attrs.height as f32 / requested_height as f32
                } else {
                    1.0
                };
            } else {
                w.h_scale = 1.0;
                w.v_scale = 1.0;
            }
        }

        let mut im_may_move = flag_changes
            .intersects(WindowFlags::ALT_FOCUSABLE_IM | WindowFlags::NOT_FOCUSABLE);

        let (old_vis, relayout_called, kind, win_flags) = match self.win(id) {
            Some(w) => (w.visibility, w.relayout_called, w.attrs.kind, w.attrs.flags),
            None => (Visibility::Gone, true, WindowType::Application, WindowFlags::NONE),
        };

        let mut focus_may_change = old_vis != visibility
            || flag_changes.contains(WindowFlags::NOT_FOCUSABLE)
            || !relayout_called;
        let wallpaper_may_move =
            old_vis != visibility && win_flags.contains(WindowFlags::SHOW_WALLPAPER);

        if let Some(w) = self.win_mut(id) {
            w.relayout_called = true;
            w.visibility = visibility;
        }

        let client_hidden = self
            .win(id)
            .and_then(|w| w.app_token)
            .and_then(|t| self.app(t))
            .map(|a| a.client_hidden)
            .unwrap_or(false);

        let mut out_surface: Option<crate::surface::SurfaceHandle> = None;
        let mut config_out = None;

        if visibility == Visibility::Visible && !client_hidden {
            displayed = !self
                .win(id)
                .map(|w| self.win_is_visible(w))
                .unwrap_or(false);

            if let Some(w) = self.win_mut(id) {
                if w.exiting {
                    w.exiting = false;
                    w.animation = false;
                }
                if w.destroying {
                    w.destroying = false;
                }
                if old_vis == Visibility::Gone {
                    w.enter_animation_pending = true;
                }
            }

            if displayed {
                let drawn_and_on = self
                    .win(id)
                    .map(|w| {
                        w.surface.is_some() && !w.draw_pending && !w.commit_draw_pending
                    })
                    .unwrap_or(false)
                    && self.policy.is_screen_on();
                if drawn_and_on {
                    // A full enter animation only on the first show;
                    // later un-hides get the lighter show transit.
                    let transit = match self.win_mut(id) {
                        Some(w) if w.enter_animation_pending => {
                            w.enter_animation_pending = false;
                            Transit::Enter
                        }
                        _ => Transit::Show,
                    };
                    self.apply_animation(id, transit);
                }
                let seq = self.config_seq;
                if let Some(w) = self.win_mut(id) {
                    if w.seen_config != seq {
                        w.seen_config = seq;
                        config_out = Some(seq);
                    }
                }
            }

            if format_changed {
                // Pixel format changed: rebuild the surface.
                debug!("window {id}: format change, rebuilding surface");
                if let Some(s) = self.win(id).and_then(|w| w.surface) {
                    self.composer.destroy_surface(s);
                }
                if let Some(w) = self.win_mut(id) {
                    w.surface = None;
                }
                displayed = true;
            }

            if self.win(id).map(|w| w.surface.is_none()).unwrap_or(false) {
                let attrs_now = match self.win(id) {
                    Some(w) => w.attrs.clone(),
                    None => WindowAttrs::new(kind, ""),
                };
                match self.composer.create_surface(
                    id,
                    &attrs_now,
                    requested_width.max(1),
                    requested_height.max(1),
                ) {
                    Ok(s) => {
                        if let Some(w) = self.win_mut(id) {
                            w.surface = Some(s);
                            w.draw_pending = true;
                            w.commit_draw_pending = false;
                        }
                    }
                    Err(e) => {
                        // Leave the caller with the same neutral state
                        // it would see before a first layout.
                        warn!("window {id}: surface creation failed: {e:#}");
                        return self.neutral_relayout_result(id, displayed);
                    }
                }
            }
            if let Some(w) = self.win_mut(id) {
                out_surface = w.surface;
                w.report_destroy_surface = false;
                w.surface_pending_destroy = false;
            }

            if displayed {
                focus_may_change = true;
            }
            if kind == WindowType::InputMethod && self.input_method_window.is_none() {
                self.input_method_window = Some(id);
                im_may_move = true;
            }

            // Degenerate layout: the requested size, pinned at the
            // origin, with the policy's inset hint.
            let display = self.display_rect();
            let hint = self
                .win(id)
                .map(|w| self.policy.content_inset_hint(&w.attrs, display))
                .unwrap_or_default();
            if let Some(w) = self.win_mut(id) {
                w.frame = Rect::from_size(requested_width, requested_height);
                w.display_frame = display;
                w.content_insets = hint;
            }
        } else {
            if let Some(w) = self.win_mut(id) {
                w.enter_animation_pending = false;
            }

            let has_surface = self.win(id).map(|w| w.surface.is_some()).unwrap_or(false);
            if has_surface {
                let (exiting, pending_destroy) = self
                    .win(id)
                    .map(|w| (w.exiting, w.surface_pending_destroy))
                    .unwrap_or((false, false));
                if !exiting || pending_destroy {
                    let transit = if kind == WindowType::ApplicationStarting {
                        Transit::PreviewDone
                    } else {
                        Transit::Exit
                    };
                    let win_visible = self
                        .win(id)
                        .map(|w| self.win_is_win_visible(w))
                        .unwrap_or(false);
                    if !pending_destroy && win_visible && self.apply_animation(id, transit) {
                        focus_may_change = true;
                        if let Some(w) = self.win_mut(id) {
                            w.exiting = true;
                        }
                    } else if self
                        .win(id)
                        .map(|w| self.win_is_animating(w))
                        .unwrap_or(false)
                    {
                        // A hide animation is running; turn it into an
                        // exit.
                        if let Some(w) = self.win_mut(id) {
                            w.exiting = true;
                        }
                    } else if self.wallpaper_target == Some(id) {
                        // The wallpaper sits behind this window; flip
                        // both inside one transaction to avoid
                        // artifacts.
                        if let Some(w) = self.win_mut(id) {
                            w.exiting = true;
                            w.animating = true;
                        }
                    } else {
                        if self.input_method_window == Some(id) {
                            self.input_method_window = None;
                        }
                        if let Some(s) = self.win(id).and_then(|w| w.surface) {
                            self.composer.destroy_surface(s);
                        }
                        if let Some(w) = self.win_mut(id) {
                            w.surface = None;
                        }
                    }
                }
            }

            let keep = self
                .win(id)
                .map(|w| {
                    w.surface.is_some()
                        && w.attrs.flags.contains(WindowFlags::KEEP_SURFACE_WHILE_ANIMATING)
                        && !w.surface_pending_destroy
                })
                .unwrap_or(false);
            if keep {
                if let Some(w) = self.win_mut(id) {
                    w.report_destroy_surface = true;
                    out_surface = w.surface;
                }
            } else if let Some(w) = self.win_mut(id) {
                w.surface_pending_destroy = false;
            }
        }

        if focus_may_change && self.update_focus() {
            im_may_move = false;
        }

        let mut assign = false;
        if im_may_move && (self.move_ime_windows_if_needed(false) || displayed) {
            // A hidden overlay may not actually move in the list but
            // still carries a stale layer.
            assign = true;
        }
        if wallpaper_may_move && self.reconcile_wallpaper().layers_changed {
            assign = true;
        }

        self.layout_needed = true;
        if let Some(w) = self.win_mut(id) {
            w.given_insets_pending = insets_pending;
        }
        if assign || displayed || focus_may_change {
            self.assign_layers();
        }

        if displayed && kind == WindowType::Wallpaper {
            let (dw, dh) = (self.display_width, self.display_height);
            self.update_wallpaper_offset(id, dw, dh, false);
        }

        let mut result = self.neutral_relayout_result(id, displayed);
        result.surface = out_surface;
        result.config_seq = config_out;
        result
    }

    fn neutral_relayout_result(&self, id: u64, first_layout: bool) -> RelayoutResult {
        let (frame, content_insets, visible_insets) = self
            .win(id)
            .map(|w| (w.frame, w.content_insets, w.visible_insets))
            .unwrap_or_default();
        RelayoutResult {
            frame,
            content_insets,
            visible_insets,
            surface: None,
            config_seq: None,
            in_touch_mode: self.in_touch_mode,
            first_layout,
        }
    }

    /// Marks the window's first draw committed. Returns true when the
    /// state changed.
    pub(crate) fn finish_drawing_locked(&mut self, id: u64) -> bool {
        let committed = match self.win_mut(id) {
            Some(w) => {
                if w.draw_pending {
                    w.draw_pending = false;
                    w.commit_draw_pending = false;
                    true
                } else {
                    false
                }
            }
            None => false,
        };
        if !committed {
            return false;
        }

        let (kind, flags, app_token) = match self.win(id) {
            Some(w) => (w.attrs.kind, w.attrs.flags, w.app_token),
            None => return true,
        };

        // The first real window finishing its draw retires any starting
        // placeholder for good.
        if kind.is_application_window() && kind != WindowType::ApplicationStarting {
            if let Some(a) = app_token.and_then(|t| self.app_mut(t)) {
                a.first_window_drawn = true;
            }
        }

        if flags.contains(WindowFlags::SHOW_WALLPAPER) {
            self.reconcile_wallpaper();
        }
        self.layout_needed = true;
        true
    }

    pub(crate) fn set_insets_locked(
        &mut self,
        id: u64,
        touchable_mode: i32,
        content: Insets,
        visible: Insets,
        region: Rect,
    ) {
        if let Some(w) = self.win_mut(id) {
            w.given_insets_pending = false;
            w.given_content_insets = content;
            w.given_visible_insets = visible;
            w.given_touchable_region = region;
            w.touchable_insets_mode = touchable_mode;
            if w.global_scale != 1.0 {
                w.given_content_insets.scale(w.global_scale);
                w.given_visible_insets.scale(w.global_scale);
            }
        }
        self.layout_needed = true;
    }

    /// The client ran out of memory: reclaim its own surface.
    pub(crate) fn reclaim_surface_locked(&mut self, id: u64) -> bool {
        let surface = self.win(id).and_then(|w| w.surface);
        match surface {
            Some(s) => {
                warn!("window {id}: reclaiming surface under memory pressure");
                self.composer.destroy_surface(s);
                if let Some(w) = self.win_mut(id) {
                    w.surface = None;
                    w.draw_pending = false;
                    w.commit_draw_pending = false;
                }
                self.layout_needed = true;
                true
            }
            None => false,
        }
    }

    pub(crate) fn set_wallpaper_position_locked(
        &mut self,
        id: u64,
        x: f32,
        y: f32,
        x_step: f32,
        y_step: f32,
    ) -> bool {
        let changed = self
            .win(id)
            .map(|w| w.wallpaper_x != x || w.wallpaper_y != y)
            .unwrap_or(false);
        if !changed {
            return false;
        }
        if let Some(w) = self.win_mut(id) {
            w.wallpaper_x = x;
            w.wallpaper_y = y;
            w.wallpaper_x_step = x_step;
            w.wallpaper_y_step = y_step;
        }
        self.update_wallpaper_offset_for_target(id, true)
    }

    // Group token operations.

    pub(crate) fn add_token_locked(&mut self, token: u64, kind: WindowType) {
        if self.tokens.contains_key(&token) {
            warn!("group token {token} already declared");
            return;
        }
        let tk = match kind {
            WindowType::InputMethod => TokenKind::InputMethod,
            WindowType::Wallpaper => TokenKind::Wallpaper,
            _ => TokenKind::Plain,
        };
        let is_wallpaper = matches!(tk, TokenKind::Wallpaper);
        self.tokens.insert(token, WindowToken::new(token, tk, true));
        if is_wallpaper {
            self.wallpaper_tokens.push(token);
        }
        debug!("declared group token {token} ({kind:?})");
    }

    pub(crate) fn add_app_token_locked(&mut self, index: usize, token: u64) {
        if self.tokens.contains_key(&token) {
            warn!("application group {token} already declared");
            return;
        }
        self.tokens.insert(
            token,
            WindowToken::new(token, TokenKind::Application(AppState::default()), true),
        );
        self.app_order.insert(index.min(self.app_order.len()), token);
        debug!("declared application group {token} at {index}");
    }

    /// Force-removes a group and every window in it.
    pub(crate) fn remove_token_locked(&mut self, token: u64) {
        let members = match self.token(token) {
            Some(t) => t.windows.clone(),
            None => {
                warn!("remove of unknown group token {token}");
                return;
            }
        };
        // Also catch application members that never joined the group
        // list (the overlay slots in directly).
        let extra: Vec<u64> = self
            .app(token)
            .map(|a| a.all_windows.clone())
            .unwrap_or_default();
        if let Some(a) = self.app_mut(token) {
            a.removed = true;
        }
        for &w in members.iter().rev() {
            self.remove_window_inner(w);
        }
        for &w in extra.iter().rev() {
            self.remove_window_inner(w);
        }
        self.tokens.remove(&token);
        self.wallpaper_tokens.retain(|&t| t != token);
        self.app_order.retain(|&t| t != token);
        self.update_focus();
        self.assign_layers();
        info!("removed group token {token}");
    }

    pub(crate) fn move_app_token_locked(&mut self, index: usize, token: u64) {
        if !self.app_order.contains(&token) {
            warn!("move of unknown application group {token}");
            return;
        }
        self.app_order.retain(|&t| t != token);
        self.app_order.insert(index.min(self.app_order.len()), token);
        self.layout_needed = true;
    }

    pub(crate) fn set_app_sending_to_bottom_locked(&mut self, token: u64, sending: bool) {
        if let Some(a) = self.app_mut(token) {
            a.sending_to_bottom = sending;
        }
    }

    pub(crate) fn set_app_animating_locked(&mut self, token: u64, animating: bool) {
        let known = match self.app_mut(token) {
            Some(a) => {
                a.animation = animating;
                a.animating = animating;
                true
            }
            None => false,
        };
        if known && !animating {
            // The transition carried this group; settle the trackers.
            self.reconcile_wallpaper();
            self.move_ime_windows_if_needed(false);
            self.update_focus();
            self.assign_layers();
        }
    }

    pub(crate) fn set_app_hidden_locked(&mut self, token: u64, hidden: bool) {
        let known = match self.app_mut(token) {
            Some(a) => {
                a.hidden_requested = hidden;
                a.hidden = hidden;
                true
            }
            None => false,
        };
        if known {
            self.reconcile_wallpaper();
            self.update_focus();
            self.assign_layers();
        }
    }

    pub(crate) fn set_app_layer_adjustment_locked(&mut self, token: u64, adj: i32) {
        if let Some(a) = self.app_mut(token) {
            a.anim_layer_adjustment = adj;
        } else {
            return;
        }
        let ime_docked = self
            .input_method_target
            .and_then(|t| self.win(t))
            .and_then(|w| w.app_token)
            == Some(token);
        if ime_docked {
            self.set_ime_adjustment(adj);
        }
        let wallpaper_docked = self
            .wallpaper_target
            .and_then(|t| self.win(t))
            .and_then(|w| w.app_token)
            == Some(token);
        if wallpaper_docked && self.lower_wallpaper_target.is_none() {
            self.set_wallpaper_adjustment(adj);
        }
        self.assign_layers();
    }

    pub(crate) fn prepare_app_transition_locked(&mut self) {
        debug!("application transition scheduled");
        self.transition_pending = true;
    }

    pub(crate) fn execute_app_transition_locked(&mut self) {
        debug!("application transition executing");
        self.transition_pending = false;
        self.move_ime_windows_if_needed(true);
        self.reconcile_wallpaper();
        self.update_focus();
        self.assign_layers();
    }

    /// Display geometry changed; bumps the configuration sequence.
    pub(crate) fn set_display_size_locked(&mut self, width: i32, height: i32) -> u64 {
        self.display_width = width;
        self.display_height = height;
        self.config_seq += 1;
        self.layout_needed = true;
        info!("display size {width}x{height}, config seq {}", self.config_seq);

        // Surfaced windows learn the new display geometry right away;
        // each client answers with a relayout carrying the new sequence.
        let display = self.display_rect();
        let ids = self.stack.clone();
        for id in ids {
            let hint = match self.win(id) {
                Some(w) if w.surface.is_some() => {
                    self.policy.content_inset_hint(&w.attrs, display)
                }
                _ => continue,
            };
            let notice = match self.win_mut(id) {
                Some(w) => {
                    w.display_frame = display;
                    w.content_insets = hint;
                    Some((w.client.clone(), w.frame, w.content_insets, w.visible_insets))
                }
                None => None,
            };
            if let Some((client, frame, content, visible)) = notice {
                client.dispatch_resized(frame, content, visible);
            }
        }

        self.config_seq
    }
}
