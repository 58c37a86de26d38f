//! Wallpaper target tracking.
//!
//! Wallpaper surfaces live in their own groups and are re-slotted
//! directly beneath whatever window currently asks to show the
//! wallpaper. During an application transition both the outgoing and
//! incoming window can be wallpaper targets at once (a crossfade pair),
//! with the wallpaper held beneath the lower of the two until one side
//! stops animating.

use log::{debug, trace};

use crate::coordinator::state::CoordinatorState;
use crate::layers::{TYPE_LAYER_MULTIPLIER, TYPE_LAYER_OFFSET};
use crate::window::{WindowFlags, WindowType};

/// What a reconciliation pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct WallpaperChanges {
    pub layers_changed: bool,
    pub visibility_changed: bool,
}

impl WallpaperChanges {
    pub(crate) fn any(self) -> bool {
        self.layers_changed || self.visibility_changed
    }
}

impl CoordinatorState {
    /// Whether wallpaper surfaces should be shown: the target is
    /// unobscured (or carried by an application animation), or a
    /// crossfade pair is active.
    pub(crate) fn is_wallpaper_visible(&self, target: Option<u64>) -> bool {
        let target_visible = target
            .and_then(|t| self.win(t))
            .map(|w| !w.obscured || self.app_animation(w))
            .unwrap_or(false);
        target_visible
            || self.upper_wallpaper_target.is_some()
            || self.lower_wallpaper_target.is_some()
    }

    /// Recomputes the wallpaper target and re-slots every wallpaper
    /// window beneath it, dispatching visibility flips along the way.
    pub(crate) fn reconcile_wallpaper(&mut self) -> WallpaperChanges {
        let mut changed = WallpaperChanges::default();
        let dw = self.display_width;
        let dh = self.display_height;

        // Top-down scan for the topmost window asking to sit on the
        // wallpaper; all wallpapers go behind it.
        let n = self.stack.len();
        let mut found: Option<u64> = None;
        let mut found_i: usize = 0;
        let mut top_cur: Option<(u64, usize)> = None;
        let mut detached_i: isize = -1;
        let mut last_seen: Option<u64> = None;
        let mut i = n;
        while i > 0 {
            i -= 1;
            let id = self.stack[i];
            let w = match self.win(id) {
                Some(w) => w,
                None => continue,
            };
            last_seen = Some(id);
            if w.attrs.kind == WindowType::Wallpaper {
                if top_cur.is_none() {
                    top_cur = Some((id, i));
                }
                continue;
            }
            top_cur = None;
            if Some(id) != self.detached_wallpaper && w.app_token.is_some() {
                // Hidden, non-animating applications are of no interest.
                let dormant = self
                    .app_of(w)
                    .map(|a| a.hidden && !a.animation)
                    .unwrap_or(false);
                if dormant {
                    continue;
                }
            }
            if w.attrs.flags.contains(WindowFlags::SHOW_WALLPAPER)
                && self.win_is_ready_for_display(w)
                && (self.wallpaper_target == Some(id)
                    || (!w.draw_pending && !w.commit_draw_pending))
            {
                found = Some(id);
                found_i = i;
                if self.wallpaper_target == Some(id) && (w.animation || self.app_animation(w)) {
                    // The current target is animating; look behind it
                    // for what is coming up.
                    continue;
                }
                break;
            } else if Some(id) == self.detached_wallpaper {
                detached_i = i as isize;
            }
        }

        if found.is_none() && detached_i >= 0 {
            debug!("wallpaper: falling back to detached-animation slot");
            found = last_seen;
            found_i = detached_i as usize;
        }

        if self.transition_pending {
            // A transition is about to reshuffle applications; hold the
            // wallpaper still if either end of the move is part of one.
            let cur_has_app = self
                .wallpaper_target
                .and_then(|t| self.win(t))
                .and_then(|w| w.app_token)
                .is_some();
            let found_has_app = found
                .and_then(|f| self.win(f))
                .and_then(|w| w.app_token)
                .is_some();
            if cur_has_app || found_has_app {
                trace!("wallpaper: holding for pending transition");
                return changed;
            }
        }

        if self.wallpaper_target != found {
            debug!(
                "wallpaper target: {:?} -> {:?}",
                self.wallpaper_target, found
            );
            self.lower_wallpaper_target = None;
            self.upper_wallpaper_target = None;

            let old = self.wallpaper_target;
            self.wallpaper_target = found;

            if let (Some(f), Some(o)) = (found, old) {
                let old_anim = self
                    .win(o)
                    .map(|w| w.animation || self.app_animation(w))
                    .unwrap_or(false);
                let new_anim = self
                    .win(f)
                    .map(|w| w.animation || self.app_animation(w))
                    .unwrap_or(false);
                if old_anim && new_anim {
                    if let Some(old_i) = self.stack_index(o) {
                        // Both ends animating: crossfade. The wallpaper
                        // tracks the lower window; the target reverts to
                        // the old one while the new one is still hidden.
                        let new_hidden = self
                            .win(f)
                            .map(|w| self.app_hidden_requested(w))
                            .unwrap_or(false);
                        if new_hidden {
                            self.wallpaper_target = Some(o);
                        }
                        if found_i > old_i {
                            self.upper_wallpaper_target = Some(f);
                            self.lower_wallpaper_target = Some(o);
                            found = Some(o);
                            found_i = old_i;
                        } else {
                            self.upper_wallpaper_target = Some(o);
                            self.lower_wallpaper_target = Some(f);
                        }
                    }
                }
            }
        } else if self.lower_wallpaper_target.is_some() {
            // Crossfade pair dissolves once either side stops animating.
            let still = |s: &Self, id: Option<u64>| {
                id.and_then(|w| s.win(w))
                    .map(|w| w.animation || s.app_animation(w))
                    .unwrap_or(false)
            };
            if !still(self, self.lower_wallpaper_target)
                || !still(self, self.upper_wallpaper_target)
            {
                debug!("wallpaper: crossfade finished");
                self.lower_wallpaper_target = None;
                self.upper_wallpaper_target = None;
            }
        }

        let mut visible = found.is_some();
        if let Some(mut anchor) = found {
            visible = self.is_wallpaper_visible(found);

            // Copy the target's animation layer adjustment unless we are
            // mid-crossfade between two targets.
            self.wallpaper_adjustment = if self.lower_wallpaper_target.is_none() {
                self.win(anchor)
                    .and_then(|w| w.app_token)
                    .and_then(|t| self.app(t))
                    .map(|a| a.anim_layer_adjustment)
                    .unwrap_or(0)
            } else {
                0
            };

            let max_layer =
                self.policy.max_wallpaper_layer() * TYPE_LAYER_MULTIPLIER + TYPE_LAYER_OFFSET;

            // Also get beneath any windows attached to the target, any
            // sharing its attachment, and any starting placeholder of
            // its group, staying below the policy ceiling.
            while found_i > 0 {
                let wb_id = self.stack[found_i - 1];
                let related = match (self.win(wb_id), self.win(anchor)) {
                    (Some(wb), Some(fw)) => {
                        !(wb.base_layer < max_layer
                            && wb.attached != Some(anchor)
                            && (fw.attached.is_none() || wb.attached != fw.attached)
                            && (wb.attrs.kind != WindowType::ApplicationStarting
                                || wb.token != fw.token))
                    }
                    _ => false,
                };
                if !related {
                    break;
                }
                anchor = wb_id;
                found_i -= 1;
            }
            found = Some(anchor);
        }

        // Window immediately below the wallpaper slot, used to walk the
        // re-slot loop.
        let mut below: Option<u64>;
        if found.is_none() {
            match top_cur {
                Some((tw, ti)) => {
                    // No target: wallpapers keep their place at the
                    // bottom.
                    below = Some(tw);
                    found_i = ti + 1;
                }
                None => {
                    below = None;
                    found_i = 0;
                }
            }
        } else {
            below = if found_i > 0 {
                Some(self.stack[found_i - 1])
            } else {
                None
            };
        }

        if visible {
            if let Some((wx, wx_step, wy, wy_step)) = self
                .wallpaper_target
                .and_then(|t| self.win(t))
                .map(|t| (t.wallpaper_x, t.wallpaper_x_step, t.wallpaper_y, t.wallpaper_y_step))
            {
                if wx >= 0.0 {
                    self.last_wallpaper_x = wx;
                    self.last_wallpaper_x_step = wx_step;
                }
                if wy >= 0.0 {
                    self.last_wallpaper_y = wy;
                    self.last_wallpaper_y_step = wy_step;
                }
            }
        }

        // Step backwards through every wallpaper window, making sure
        // each sits at the slot we just computed.
        let tokens = self.wallpaper_tokens.clone();
        for &tok_id in tokens.iter().rev() {
            let flip_group = self.token(tok_id).map(|t| t.hidden == visible).unwrap_or(false);
            if flip_group {
                changed.visibility_changed = true;
                if let Some(t) = self.token_mut(tok_id) {
                    t.hidden = !visible;
                }
                self.layout_needed = true;
            }

            let members = self.token(tok_id).map(|t| t.windows.clone()).unwrap_or_default();
            for &wallpaper in members.iter().rev() {
                if visible {
                    self.update_wallpaper_offset(wallpaper, dw, dh, false);
                }

                // Make sure the client has the current visibility state.
                let flip = self
                    .win(wallpaper)
                    .map(|w| w.wallpaper_visible != visible)
                    .unwrap_or(false);
                if flip {
                    let client = match self.win_mut(wallpaper) {
                        Some(w) => {
                            w.wallpaper_visible = visible;
                            Some(w.client.clone())
                        }
                        None => None,
                    };
                    if let Some(c) = client {
                        debug!("wallpaper {wallpaper}: visibility -> {visible}");
                        c.dispatch_visibility(visible);
                    }
                }

                let adj = self.wallpaper_adjustment;
                if let Some(w) = self.win_mut(wallpaper) {
                    w.anim_layer = w.layer + adj;
                }

                // Already at the expected slot?
                if Some(wallpaper) == below {
                    found_i = found_i.saturating_sub(1);
                    below = if found_i > 0 {
                        Some(self.stack[found_i - 1])
                    } else {
                        None
                    };
                    continue;
                }

                // Wrong place; pull it out and re-insert at the slot.
                if let Some(old_index) = self.stack_index(wallpaper) {
                    self.stack.remove(old_index);
                    self.windows_changed = true;
                    if old_index < found_i {
                        found_i -= 1;
                    }
                }
                trace!("wallpaper {wallpaper}: moving to {found_i}");
                self.stack.insert(found_i.min(self.stack.len()), wallpaper);
                self.windows_changed = true;
                changed.layers_changed = true;
            }
        }

        changed
    }

    /// Applies an animation-layer adjustment to every wallpaper window.
    pub(crate) fn set_wallpaper_adjustment(&mut self, adj: i32) {
        self.wallpaper_adjustment = adj;
        let tokens = self.wallpaper_tokens.clone();
        for tok_id in tokens {
            let wins = self.token(tok_id).map(|t| t.windows.clone()).unwrap_or_default();
            for w in wins {
                if let Some(ws) = self.win_mut(w) {
                    ws.anim_layer = ws.layer + adj;
                }
            }
        }
    }

    /// Recomputes one wallpaper window's pixel offsets from the shared
    /// scroll fractions and tells its client when the fractions changed.
    /// Returns true when the pixel offsets moved. With `sync` the
    /// dispatch arms the acknowledgement slot; the caller decides
    /// whether to block on it.
    pub(crate) fn update_wallpaper_offset(
        &mut self,
        wallpaper: u64,
        dw: i32,
        dh: i32,
        sync: bool,
    ) -> bool {
        let wpx = if self.last_wallpaper_x >= 0.0 { self.last_wallpaper_x } else { 0.5 };
        let wpxs = if self.last_wallpaper_x_step >= 0.0 { self.last_wallpaper_x_step } else { -1.0 };
        let wpy = if self.last_wallpaper_y >= 0.0 { self.last_wallpaper_y } else { 0.5 };
        let wpys = if self.last_wallpaper_y_step >= 0.0 { self.last_wallpaper_y_step } else { -1.0 };

        let mut changed = false;
        let mut raw_changed = false;
        let mut dispatch = None;

        if let Some(w) = self.win_mut(wallpaper) {
            let availw = w.frame.width() - dw;
            let offset = if availw > 0 {
                -((availw as f32 * wpx + 0.5) as i32)
            } else {
                0
            };
            if w.x_offset != offset {
                trace!("wallpaper {wallpaper}: x offset {offset}");
                changed = true;
                w.x_offset = offset;
            }
            if w.wallpaper_x != wpx || w.wallpaper_x_step != wpxs {
                w.wallpaper_x = wpx;
                w.wallpaper_x_step = wpxs;
                raw_changed = true;
            }

            let availh = w.frame.height() - dh;
            let offset = if availh > 0 {
                -((availh as f32 * wpy + 0.5) as i32)
            } else {
                0
            };
            if w.y_offset != offset {
                trace!("wallpaper {wallpaper}: y offset {offset}");
                changed = true;
                w.y_offset = offset;
            }
            if w.wallpaper_y != wpy || w.wallpaper_y_step != wpys {
                w.wallpaper_y = wpy;
                w.wallpaper_y_step = wpys;
                raw_changed = true;
            }

            if raw_changed {
                dispatch = Some((w.client.clone(), w.wallpaper_x, w.wallpaper_y,
                    w.wallpaper_x_step, w.wallpaper_y_step));
            }
        }

        if let Some((client, x, y, xs, ys)) = dispatch {
            if sync {
                self.waiting_on_wallpaper = Some(wallpaper);
            }
            client.dispatch_wallpaper_offsets(x, y, xs, ys, sync);
        }

        changed
    }

    /// Refreshes the shared scroll fractions from the target (falling
    /// back to the window whose position just changed) and pushes them
    /// to every wallpaper window. At most one wallpaper gets a
    /// synchronous dispatch.
    pub(crate) fn update_wallpaper_offset_for_target(
        &mut self,
        changing: u64,
        mut sync: bool,
    ) -> bool {
        let dw = self.display_width;
        let dh = self.display_height;

        if let Some(target) = self.wallpaper_target {
            let (tx, ty) = self
                .win(target)
                .map(|w| (w.wallpaper_x, w.wallpaper_y))
                .unwrap_or((-1.0, -1.0));
            let (cx, cy) = self
                .win(changing)
                .map(|w| (w.wallpaper_x, w.wallpaper_y))
                .unwrap_or((-1.0, -1.0));
            if tx >= 0.0 {
                self.last_wallpaper_x = tx;
            } else if cx >= 0.0 {
                self.last_wallpaper_x = cx;
            }
            if ty >= 0.0 {
                self.last_wallpaper_y = ty;
            } else if cy >= 0.0 {
                self.last_wallpaper_y = cy;
            }
        }

        let mut changed = false;
        let tokens = self.wallpaper_tokens.clone();
        for &tok_id in tokens.iter().rev() {
            let members = self.token(tok_id).map(|t| t.windows.clone()).unwrap_or_default();
            for &wallpaper in members.iter().rev() {
                if self.update_wallpaper_offset(wallpaper, dw, dh, sync) {
                    changed = true;
                    // Only stay synchronous with one wallpaper.
                    sync = false;
                }
            }
        }

        changed
    }

    /// Pushes the current visibility verdict to every wallpaper window
    /// without re-slotting anything.
    pub(crate) fn update_wallpaper_visibility(&mut self) {
        let visible = self.is_wallpaper_visible(self.wallpaper_target);
        let dw = self.display_width;
        let dh = self.display_height;

        let tokens = self.wallpaper_tokens.clone();
        for &tok_id in tokens.iter().rev() {
            let flip_group = self.token(tok_id).map(|t| t.hidden == visible).unwrap_or(false);
            if flip_group {
                if let Some(t) = self.token_mut(tok_id) {
                    t.hidden = !visible;
                }
                self.layout_needed = true;
            }

            let members = self.token(tok_id).map(|t| t.windows.clone()).unwrap_or_default();
            for &wallpaper in members.iter().rev() {
                if visible {
                    self.update_wallpaper_offset(wallpaper, dw, dh, false);
                }
                let flip = self
                    .win(wallpaper)
                    .map(|w| w.wallpaper_visible != visible)
                    .unwrap_or(false);
                if flip {
                    let client = match self.win_mut(wallpaper) {
                        Some(w) => {
                            w.wallpaper_visible = visible;
                            Some(w.client.clone())
                        }
                        None => None,
                    };
                    if let Some(c) = client {
                        debug!("wallpaper {wallpaper}: visibility -> {visible}");
                        c.dispatch_visibility(visible);
                    }
                }
            }
        }
    }

    /// Fans a free-form command out to every wallpaper client, provided
    /// the sender is one of the current targets.
    pub(crate) fn send_wallpaper_command(
        &mut self,
        sender: u64,
        action: &str,
        x: i32,
        y: i32,
        z: i32,
        sync: bool,
    ) {
        let from_target = self.wallpaper_target == Some(sender)
            || self.lower_wallpaper_target == Some(sender)
            || self.upper_wallpaper_target == Some(sender);
        if !from_target {
            return;
        }

        let tokens = self.wallpaper_tokens.clone();
        for &tok_id in tokens.iter().rev() {
            let members = self.token(tok_id).map(|t| t.windows.clone()).unwrap_or_default();
            for &wallpaper in members.iter().rev() {
                if let Some(client) = self.win(wallpaper).map(|w| w.client.clone()) {
                    client.dispatch_wallpaper_command(action, x, y, z, sync);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use crate::client::{NullClient, WindowClient};
    use crate::config::StratumConfig;
    use crate::coordinator::state::CoordinatorState;
    use crate::policy::{DefaultPolicy, LayoutPolicy};
    use crate::surface::{NullComposer, SurfaceHandle};
    use crate::types::Rect;
    use crate::window::token::{TokenKind, WindowToken};
    use crate::window::{Visibility, WindowAttrs, WindowFlags, WindowState, WindowType};
    use crate::{TYPE_LAYER_MULTIPLIER, TYPE_LAYER_OFFSET};

    #[derive(Default)]
    struct RecordingClient {
        visibility: Mutex<Vec<bool>>,
        offsets: Mutex<Vec<(f32, f32, bool)>>,
    }

    impl WindowClient for RecordingClient {
        fn dispatch_visibility(&self, visible: bool) {
            self.visibility.lock().unwrap().push(visible);
        }
        fn dispatch_wallpaper_offsets(&self, x: f32, y: f32, _xs: f32, _ys: f32, sync: bool) {
            self.offsets.lock().unwrap().push((x, y, sync));
        }
    }

    fn state() -> CoordinatorState {
        CoordinatorState::new(
            StratumConfig::default(),
            Arc::new(DefaultPolicy),
            Arc::new(NullComposer::default()),
        )
    }

    fn base_layer(kind: WindowType) -> i32 {
        DefaultPolicy.window_type_layer(kind) * TYPE_LAYER_MULTIPLIER + TYPE_LAYER_OFFSET
    }

    fn push_app(s: &mut CoordinatorState, id: u64, flags: WindowFlags) {
        let mut w = WindowState::new(
            id,
            1,
            WindowAttrs::new(WindowType::Application, format!("app{id}")).with_flags(flags),
            id,
            None,
            None,
            Visibility::Visible,
            base_layer(WindowType::Application),
            0,
            Arc::new(NullClient),
        );
        w.surface = Some(SurfaceHandle(id));
        w.relayout_called = true;
        s.windows.insert(id, w);
        s.stack.push(id);
    }

    fn add_wallpaper(s: &mut CoordinatorState, token: u64, id: u64) -> Arc<RecordingClient> {
        let client = Arc::new(RecordingClient::default());
        if !s.tokens.contains_key(&token) {
            s.tokens
                .insert(token, WindowToken::new(token, TokenKind::Wallpaper, true));
            s.wallpaper_tokens.push(token);
        }
        let mut w = WindowState::new(
            id,
            1,
            WindowAttrs::new(WindowType::Wallpaper, format!("wp{id}")),
            token,
            None,
            None,
            Visibility::Visible,
            base_layer(WindowType::Wallpaper),
            0,
            client.clone(),
        );
        w.surface = Some(SurfaceHandle(id));
        s.windows.insert(id, w);
        s.stack.insert(0, id);
        if let Some(t) = s.tokens.get_mut(&token) {
            t.windows.push(id);
        }
        client
    }

    #[test]
    fn test_wallpaper_slots_below_target() {
        let mut s = state();
        push_app(&mut s, 1, WindowFlags::NONE);
        push_app(&mut s, 2, WindowFlags::SHOW_WALLPAPER);
        push_app(&mut s, 3, WindowFlags::NONE);
        let client = add_wallpaper(&mut s, 100, 50);
        // Wallpaper starts at the very bottom: [50, 1, 2, 3].

        let changed = s.reconcile_wallpaper();
        assert_eq!(s.wallpaper_target, Some(2));
        assert_eq!(s.stack, vec![1, 50, 2, 3]);
        assert!(changed.layers_changed);
        assert!(changed.visibility_changed);
        assert_eq!(*client.visibility.lock().unwrap(), vec![true]);

        // Second pass: stable, no second dispatch.
        let changed = s.reconcile_wallpaper();
        assert!(!changed.any());
        assert_eq!(*client.visibility.lock().unwrap(), vec![true]);
    }

    #[test]
    fn test_no_target_leaves_wallpaper_hidden_at_bottom() {
        let mut s = state();
        push_app(&mut s, 1, WindowFlags::NONE);
        let client = add_wallpaper(&mut s, 100, 50);

        let changed = s.reconcile_wallpaper();
        assert_eq!(s.wallpaper_target, None);
        assert_eq!(s.stack, vec![50, 1]);
        assert!(!changed.layers_changed);
        assert!(client.visibility.lock().unwrap().is_empty());
        assert!(s.tokens[&100].hidden);
    }

    #[test]
    fn test_obscured_target_hides_wallpaper_once() {
        let mut s = state();
        push_app(&mut s, 2, WindowFlags::SHOW_WALLPAPER);
        let client = add_wallpaper(&mut s, 100, 50);
        s.reconcile_wallpaper();
        assert_eq!(*client.visibility.lock().unwrap(), vec![true]);

        s.windows.get_mut(&2).unwrap().obscured = true;
        s.update_wallpaper_visibility();
        s.update_wallpaper_visibility();
        assert_eq!(*client.visibility.lock().unwrap(), vec![true, false]);
    }

    #[test]
    fn test_pending_transition_holds_wallpaper() {
        let mut s = state();
        s.tokens.insert(
            200,
            WindowToken::new(
                200,
                TokenKind::Application(Default::default()),
                true,
            ),
        );
        push_app(&mut s, 2, WindowFlags::SHOW_WALLPAPER);
        s.windows.get_mut(&2).unwrap().app_token = Some(200);
        add_wallpaper(&mut s, 100, 50);

        s.transition_pending = true;
        let changed = s.reconcile_wallpaper();
        assert!(!changed.any());
        assert_eq!(s.wallpaper_target, None);
    }

    #[test]
    fn test_detached_animation_anchors_wallpaper() {
        let mut s = state();
        push_app(&mut s, 1, WindowFlags::NONE);
        push_app(&mut s, 2, WindowFlags::NONE);
        let client = add_wallpaper(&mut s, 100, 50);
        // No window asks for the wallpaper: [50, 1, 2].

        s.windows.get_mut(&2).unwrap().animation = true;
        s.set_detached_wallpaper_locked(Some(2));
        // The wallpaper is held beneath the detached window and shown.
        assert_eq!(s.stack, vec![1, 50, 2]);
        assert!(s.wallpaper_target.is_some());
        assert_eq!(*client.visibility.lock().unwrap(), vec![true]);

        // The animation finishing drops the slot and the wallpaper
        // falls back to the hidden bottom position.
        s.animation_finished_locked(2);
        assert_eq!(s.detached_wallpaper, None);
        assert_eq!(s.stack, vec![50, 1, 2]);
        assert_eq!(s.wallpaper_target, None);
        assert_eq!(*client.visibility.lock().unwrap(), vec![true, false]);
    }

    #[test]
    fn test_crossfade_pair_forms_and_dissolves() {
        let mut s = state();
        push_app(&mut s, 1, WindowFlags::SHOW_WALLPAPER);
        add_wallpaper(&mut s, 100, 50);
        s.reconcile_wallpaper();
        assert_eq!(s.wallpaper_target, Some(1));
        assert_eq!(s.stack, vec![50, 1]);

        // A second wallpaper window animates in over the first while
        // both are still animating: crossfade.
        push_app(&mut s, 2, WindowFlags::SHOW_WALLPAPER);
        s.windows.get_mut(&1).unwrap().animation = true;
        s.windows.get_mut(&2).unwrap().animation = true;
        s.reconcile_wallpaper();
        assert_eq!(s.wallpaper_target, Some(2));
        assert_eq!(s.lower_wallpaper_target, Some(1));
        assert_eq!(s.upper_wallpaper_target, Some(2));
        // The wallpaper stays anchored beneath the lower window.
        assert_eq!(s.stack, vec![50, 1, 2]);

        // Either side settling dissolves the pair and the wallpaper
        // re-docks under the surviving target.
        s.windows.get_mut(&2).unwrap().animation = false;
        s.reconcile_wallpaper();
        assert_eq!(s.lower_wallpaper_target, None);
        assert_eq!(s.upper_wallpaper_target, None);
        assert_eq!(s.wallpaper_target, Some(2));
        assert_eq!(s.stack, vec![1, 50, 2]);
    }

    #[test]
    fn test_crossfade_reverts_while_incoming_hidden() {
        let mut s = state();
        s.tokens.insert(
            200,
            WindowToken::new(200, TokenKind::Application(Default::default()), true),
        );
        push_app(&mut s, 1, WindowFlags::SHOW_WALLPAPER);
        add_wallpaper(&mut s, 100, 50);
        s.reconcile_wallpaper();
        assert_eq!(s.wallpaper_target, Some(1));

        // The incoming target's application still has a hide request
        // pending; the official target reverts to the outgoing window
        // for as long as that holds.
        push_app(&mut s, 2, WindowFlags::SHOW_WALLPAPER);
        s.windows.get_mut(&2).unwrap().app_token = Some(200);
        if let Some(a) = s.app_mut(200) {
            a.hidden_requested = true;
        }
        s.windows.get_mut(&1).unwrap().animation = true;
        s.windows.get_mut(&2).unwrap().animation = true;
        s.reconcile_wallpaper();
        assert_eq!(s.wallpaper_target, Some(1));
        assert_eq!(s.lower_wallpaper_target, Some(1));
        assert_eq!(s.upper_wallpaper_target, Some(2));
    }

    #[test]
    fn test_offset_computation() {
        let mut s = state();
        push_app(&mut s, 2, WindowFlags::SHOW_WALLPAPER);
        let client = add_wallpaper(&mut s, 100, 50);
        // Wallpaper twice the display width.
        let dw = s.display_width;
        s.windows.get_mut(&50).unwrap().frame = Rect::from_size(dw * 2, s.display_height);

        s.reconcile_wallpaper();
        let w = &s.windows[&50];
        // Default fraction 0.5 centers the surface.
        assert_eq!(w.x_offset, -((dw as f32 * 0.5 + 0.5) as i32));
        assert_eq!(w.y_offset, 0);
        // Fractions were pushed to the client exactly once.
        assert_eq!(client.offsets.lock().unwrap().len(), 1);
        assert_eq!(client.offsets.lock().unwrap()[0], (0.5, 0.5, false));
    }

    #[test]
    fn test_command_fans_out_only_from_target() {
        let mut s = state();
        push_app(&mut s, 1, WindowFlags::NONE);
        push_app(&mut s, 2, WindowFlags::SHOW_WALLPAPER);
        add_wallpaper(&mut s, 100, 50);
        s.reconcile_wallpaper();

        #[derive(Default)]
        struct CommandClient {
            commands: Mutex<Vec<String>>,
        }
        impl WindowClient for CommandClient {
            fn dispatch_wallpaper_command(&self, action: &str, _x: i32, _y: i32, _z: i32, _sync: bool) {
                self.commands.lock().unwrap().push(action.to_string());
            }
        }
        let cc = Arc::new(CommandClient::default());
        s.windows.get_mut(&50).unwrap().client = cc.clone();

        s.send_wallpaper_command(1, "tap", 0, 0, 0, false);
        assert!(cc.commands.lock().unwrap().is_empty());
        s.send_wallpaper_command(2, "tap", 10, 20, 0, false);
        assert_eq!(*cc.commands.lock().unwrap(), vec!["tap"]);
    }
}
