//! Input-method target tracking.
//!
//! The soft-input overlay (plus its dialogs) is kept stacked directly
//! above whatever window it is targeting. The target is the topmost
//! window eligible to take text input; moves are held back while a
//! transition animation could still reshuffle the windows underneath.

use log::{debug, warn};

use crate::coordinator::state::CoordinatorState;
use crate::window::{WindowFlags, WindowState, WindowType};

impl CoordinatorState {
    /// Eligibility for hosting the input-method overlay. Focusability
    /// flags must be unset or both set (`ALT_FOCUSABLE_IM` inverts the
    /// meaning of `NOT_FOCUSABLE`), with starting placeholders always
    /// passing the flag check.
    pub(crate) fn can_be_ime_target(&self, w: &WindowState) -> bool {
        let fl = w.attrs.flags & (WindowFlags::NOT_FOCUSABLE | WindowFlags::ALT_FOCUSABLE_IM);
        if fl == WindowFlags::NONE
            || fl == (WindowFlags::NOT_FOCUSABLE | WindowFlags::ALT_FOCUSABLE_IM)
            || w.attrs.kind == WindowType::ApplicationStarting
        {
            self.win_is_visible_or_adding(w)
        } else {
            false
        }
    }

    /// Finds the stack slot the input-method block belongs at (one above
    /// the desired target), or `None` when nothing can host it. With
    /// `will_move` the target slot is committed; without it the search
    /// is a read-only probe that also looks through starting
    /// placeholders for the real input destination.
    pub(crate) fn find_desired_ime_index(&mut self, will_move: bool) -> Option<usize> {
        let mut found: Option<(usize, u64)> = None;
        let mut i = self.stack.len();
        while i > 0 {
            i -= 1;
            let id = self.stack[i];
            let w = match self.win(id) {
                Some(w) => w,
                None => continue,
            };
            if self.can_be_ime_target(w) {
                let mut idx = i;
                let mut wid = id;
                // A starting placeholder is where the overlay stacks,
                // but not where input really goes; a probe looks below
                // it for the real window of the same application.
                if !will_move && w.attrs.kind == WindowType::ApplicationStarting && i > 0 {
                    if let Some(wb) = self.win(self.stack[i - 1]) {
                        if wb.app_token == w.app_token && self.can_be_ime_target(wb) {
                            idx = i - 1;
                            wid = wb.id;
                        }
                    }
                }
                found = Some((idx, wid));
                break;
            }
        }

        // If the previous target is still displayed while exiting above
        // the new one, stay on it so the overlay does not drop behind
        // the closing window.
        if let (Some(cur), Some((_, wid))) = (self.input_method_target, found) {
            let keep = match (self.win(cur), self.win(wid)) {
                (Some(c), Some(w)) => {
                    self.win_is_displayed(c) && c.exiting && c.anim_layer > w.anim_layer
                }
                _ => false,
            };
            if keep {
                if let Some(pos) = self.stack_index(cur) {
                    debug!("ime: holding exiting target {cur}");
                    found = Some((pos, cur));
                }
            }
        }

        if will_move {
            if let Some((_, wid)) = found {
                // The current target's application may be animating in a
                // way that reorders windows; find its highest surviving
                // window and hold the overlay there until the dust
                // settles.
                let cur_app = self
                    .input_method_target
                    .and_then(|c| self.win(c))
                    .and_then(|c| c.app_token);
                if let Some(app) = cur_app {
                    let animating = self
                        .app(app)
                        .map(|a| a.animating || a.animation)
                        .unwrap_or(false);
                    let mut highest: Option<(usize, u64, i32)> = None;
                    if animating {
                        if let Some(start) = self
                            .input_method_target
                            .and_then(|c| self.stack_index(c))
                        {
                            let mut pos = start as isize;
                            while pos >= 0 {
                                let win = match self.win(self.stack[pos as usize]) {
                                    Some(w) => w,
                                    None => break,
                                };
                                if win.app_token != Some(app) {
                                    break;
                                }
                                if !win.removed
                                    && highest
                                        .map(|(_, _, l)| win.anim_layer > l)
                                        .unwrap_or(true)
                                {
                                    highest = Some((pos as usize, win.id, win.anim_layer));
                                }
                                pos -= 1;
                            }
                        }
                    }

                    if let Some((hpos, hid, hlayer)) = highest {
                        let new_layer = self.win(wid).map(|w| w.anim_layer).unwrap_or(0);
                        let hold = if self.transition_pending {
                            true
                        } else {
                            hlayer > new_layer
                                && self
                                    .win(hid)
                                    .map(|h| self.win_is_animating(h))
                                    .unwrap_or(false)
                        };
                        if hold {
                            self.input_method_target_waiting_anim = true;
                            self.input_method_target = Some(hid);
                            return Some(hpos + 1);
                        }
                    }
                }
            }
        }

        match found {
            Some((idx, wid)) => {
                if will_move {
                    self.input_method_target = Some(wid);
                    self.input_method_target_waiting_anim = false;
                    let adj = self
                        .win(wid)
                        .and_then(|w| w.app_token)
                        .and_then(|t| self.app(t))
                        .map(|a| a.anim_layer_adjustment)
                        .unwrap_or(0);
                    self.set_ime_adjustment(adj);
                }
                Some(idx + 1)
            }
            None => {
                if will_move {
                    self.input_method_target = None;
                    self.set_ime_adjustment(0);
                }
                None
            }
        }
    }

    /// Applies an animation-layer adjustment to the overlay, its
    /// children and its dialogs.
    pub(crate) fn set_ime_adjustment(&mut self, adj: i32) {
        self.input_method_adjustment = adj;
        let mut targets: Vec<u64> = Vec::new();
        if let Some(im) = self.input_method_window {
            targets.push(im);
            if let Some(w) = self.win(im) {
                targets.extend(w.children.iter().copied());
            }
        }
        targets.extend(self.input_method_dialogs.iter().copied());
        for id in targets {
            if let Some(w) = self.win_mut(id) {
                w.anim_layer = w.layer + adj;
            }
        }
    }

    /// Slots a newly added input-method overlay above its target, or by
    /// base layer when there is none, then drags the dialogs along.
    pub(crate) fn add_input_method_window(&mut self, id: u64) {
        match self.find_desired_ime_index(true) {
            Some(pos) => {
                let target_app = self
                    .input_method_target
                    .and_then(|t| self.win(t))
                    .and_then(|w| w.app_token);
                if let Some(w) = self.win_mut(id) {
                    w.target_app_token = target_app;
                }
                self.stack.insert(pos.min(self.stack.len()), id);
                self.windows_changed = true;
                self.move_input_method_dialogs(pos as i32 + 1);
            }
            None => {
                if let Some(w) = self.win_mut(id) {
                    w.target_app_token = None;
                }
                self.place_window_in_order(id, true);
                self.move_input_method_dialogs(-1);
            }
        }
    }

    /// Moves every input-method dialog to `pos` (already adjusted for
    /// the overlay itself), or back to base-layer order when negative.
    pub(crate) fn move_input_method_dialogs(&mut self, pos: i32) {
        let dialogs = self.input_method_dialogs.clone();
        let mut pos = pos;
        for &d in &dialogs {
            pos = self.tmp_remove_window(pos, d);
        }

        if pos >= 0 {
            let target_app = self
                .input_method_target
                .and_then(|t| self.win(t))
                .and_then(|w| w.app_token);
            let mut p = pos as usize;
            if p < self.stack.len() && Some(self.stack[p]) == self.input_method_window {
                p += 1;
            }
            for &d in &dialogs {
                if let Some(w) = self.win_mut(d) {
                    w.target_app_token = target_app;
                }
                p = self.re_add_window(p, d);
            }
            return;
        }

        for &d in &dialogs {
            if let Some(w) = self.win_mut(d) {
                w.target_app_token = None;
            }
            self.re_add_window_in_order(d);
        }
    }

    /// Re-slots the input-method block above its desired target if it is
    /// not already there and contiguous. Returns true when the stack
    /// changed.
    pub(crate) fn move_ime_windows_if_needed(&mut self, need_assign_layers: bool) -> bool {
        let im_win = self.input_method_window;
        let dialog_count = self.input_method_dialogs.len();
        if im_win.is_none() && dialog_count == 0 {
            return false;
        }

        match self.find_desired_ime_index(true) {
            Some(im_pos) => {
                let n = self.stack.len();
                let first_im = if im_pos < n {
                    Some(self.stack[im_pos])
                } else {
                    None
                };

                // Bottom of the block: a negative sub-window of the
                // overlay if one exists, else the overlay (or the first
                // dialog when there is no overlay).
                let mut base_im = im_win.or_else(|| self.input_method_dialogs.first().copied());
                if let Some(b) = base_im {
                    if let Some(c) = self.win(b).and_then(|w| w.children.first().copied()) {
                        if self.win(c).map(|w| w.sub_layer).unwrap_or(0) < 0 {
                            base_im = Some(c);
                        }
                    }
                }

                if first_im.is_some() && first_im == base_im {
                    // The block starts in the right place; make sure it
                    // is contiguous with nothing above it.
                    let is_im = |s: &Self, pos: usize| {
                        s.win(s.stack[pos]).map(|w| w.is_im_window).unwrap_or(false)
                    };
                    let mut pos = im_pos + 1;
                    while pos < n && is_im(self, pos) {
                        pos += 1;
                    }
                    pos += 1;
                    while pos < n && !is_im(self, pos) {
                        pos += 1;
                    }
                    if pos >= n {
                        return false;
                    }
                }

                if let Some(imw) = im_win {
                    let new_pos = self.tmp_remove_window(im_pos as i32, imw);
                    let target_app = self
                        .input_method_target
                        .and_then(|t| self.win(t))
                        .and_then(|w| w.app_token);
                    if let Some(w) = self.win_mut(imw) {
                        w.target_app_token = target_app;
                    }
                    if new_pos < 0 {
                        warn!("ime: desired slot vanished while moving overlay {imw}");
                    }
                    let p = new_pos.max(0) as usize;
                    self.re_add_window(p, imw);
                    if dialog_count > 0 {
                        self.move_input_method_dialogs(p as i32 + 1);
                    }
                } else {
                    self.move_input_method_dialogs(im_pos as i32);
                }
            }
            None => {
                // No target: the block falls back to its fixed layer.
                if let Some(imw) = im_win {
                    self.tmp_remove_window(0, imw);
                    if let Some(w) = self.win_mut(imw) {
                        w.target_app_token = None;
                    }
                    self.re_add_window_in_order(imw);
                    if dialog_count > 0 {
                        self.move_input_method_dialogs(-1);
                    }
                } else {
                    self.move_input_method_dialogs(-1);
                }
            }
        }

        if need_assign_layers {
            self.assign_layers();
        }
        true
    }

    pub(crate) fn adjust_input_method_dialogs(&mut self) {
        let pos = self
            .find_desired_ime_index(true)
            .map(|p| p as i32)
            .unwrap_or(-1);
        self.move_input_method_dialogs(pos);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::client::NullClient;
    use crate::config::StratumConfig;
    use crate::coordinator::state::CoordinatorState;
    use crate::policy::{DefaultPolicy, LayoutPolicy};
    use crate::surface::NullComposer;
    use crate::window::token::{AppState, TokenKind, WindowToken};
    use crate::window::{Visibility, WindowAttrs, WindowFlags, WindowState, WindowType};
    use crate::{TYPE_LAYER_MULTIPLIER, TYPE_LAYER_OFFSET};

    fn state() -> CoordinatorState {
        CoordinatorState::new(
            StratumConfig::default(),
            Arc::new(DefaultPolicy),
            Arc::new(NullComposer::default()),
        )
    }

    fn make_window(id: u64, kind: WindowType, flags: WindowFlags, app: Option<u64>) -> WindowState {
        let base = DefaultPolicy.window_type_layer(kind) * TYPE_LAYER_MULTIPLIER + TYPE_LAYER_OFFSET;
        WindowState::new(
            id,
            1,
            WindowAttrs::new(kind, format!("w{id}")).with_flags(flags),
            app.unwrap_or(id),
            app,
            None,
            Visibility::Visible,
            base,
            0,
            Arc::new(NullClient),
        )
    }

    fn push(s: &mut CoordinatorState, id: u64, kind: WindowType, flags: WindowFlags, app: Option<u64>) {
        if let Some(a) = app {
            s.tokens
                .entry(a)
                .or_insert_with(|| WindowToken::new(a, TokenKind::Application(AppState::default()), true));
        }
        s.windows.insert(id, make_window(id, kind, flags, app));
        s.stack.push(id);
    }

    #[test]
    fn test_ime_eligibility_truth_table() {
        let s = state();
        let both = WindowFlags::NOT_FOCUSABLE | WindowFlags::ALT_FOCUSABLE_IM;
        let cases = [
            (WindowType::Application, WindowFlags::NONE, true),
            (WindowType::Application, WindowFlags::NOT_FOCUSABLE, false),
            (WindowType::Application, WindowFlags::ALT_FOCUSABLE_IM, false),
            (WindowType::Application, both, true),
            (WindowType::ApplicationStarting, WindowFlags::NOT_FOCUSABLE, true),
        ];
        for (kind, flags, expect) in cases {
            let w = make_window(1, kind, flags, None);
            assert_eq!(s.can_be_ime_target(&w), expect, "{kind:?} {flags:?}");
        }

        // Eligible flags but not visible-or-adding.
        let mut w = make_window(1, WindowType::Application, WindowFlags::NONE, None);
        w.exiting = true;
        assert!(!s.can_be_ime_target(&w));
    }

    #[test]
    fn test_find_targets_topmost_eligible() {
        let mut s = state();
        push(&mut s, 1, WindowType::Application, WindowFlags::NONE, None);
        push(&mut s, 2, WindowType::Application, WindowFlags::NONE, None);
        push(&mut s, 3, WindowType::Application, WindowFlags::NOT_FOCUSABLE, None);

        assert_eq!(s.find_desired_ime_index(true), Some(2));
        assert_eq!(s.input_method_target, Some(2));
    }

    #[test]
    fn test_probe_looks_below_starting_placeholder() {
        let mut s = state();
        push(&mut s, 1, WindowType::BaseApplication, WindowFlags::NONE, Some(100));
        push(&mut s, 2, WindowType::ApplicationStarting, WindowFlags::NONE, Some(100));

        // A probe targets the real window underneath.
        assert_eq!(s.find_desired_ime_index(false), Some(1));
        // A committing search stays on the placeholder.
        assert_eq!(s.find_desired_ime_index(true), Some(2));
        assert_eq!(s.input_method_target, Some(2));
    }

    #[test]
    fn test_no_eligible_target_clears_slot() {
        let mut s = state();
        push(&mut s, 1, WindowType::Application, WindowFlags::NOT_FOCUSABLE, None);
        s.input_method_target = Some(1);
        s.input_method_adjustment = 40;

        assert_eq!(s.find_desired_ime_index(true), None);
        assert_eq!(s.input_method_target, None);
        assert_eq!(s.input_method_adjustment, 0);
    }

    #[test]
    fn test_exiting_target_above_candidate_is_kept() {
        let mut s = state();
        push(&mut s, 1, WindowType::Application, WindowFlags::NONE, None);
        push(&mut s, 2, WindowType::Application, WindowFlags::NONE, None);
        {
            let w = s.windows.get_mut(&2).unwrap();
            w.surface = Some(crate::surface::SurfaceHandle(9));
            w.exiting = true;
            w.anim_layer = 500;
        }
        s.windows.get_mut(&1).unwrap().anim_layer = 100;
        s.input_method_target = Some(2);

        // Window 2 is exiting (so no longer eligible) but displayed and
        // above the fresh candidate; the slot holds on to it.
        assert_eq!(s.find_desired_ime_index(true), Some(2));
        assert_eq!(s.input_method_target, Some(2));
    }

    #[test]
    fn test_pending_transition_holds_move() {
        let mut s = state();
        push(&mut s, 1, WindowType::BaseApplication, WindowFlags::NONE, Some(100));
        push(&mut s, 2, WindowType::Application, WindowFlags::NONE, None);
        s.input_method_target = Some(1);
        if let Some(a) = s.app_mut(100) {
            a.animating = true;
        }
        s.transition_pending = true;

        // The candidate would be window 2, but the outgoing target's
        // application is mid-transition; hold at its highest window.
        assert_eq!(s.find_desired_ime_index(true), Some(1));
        assert_eq!(s.input_method_target, Some(1));
        assert!(s.input_method_target_waiting_anim);
    }

    #[test]
    fn test_held_target_released_when_animation_finishes() {
        let mut s = state();
        push(&mut s, 1, WindowType::BaseApplication, WindowFlags::NONE, Some(100));
        push(&mut s, 10, WindowType::InputMethod, WindowFlags::NOT_FOCUSABLE, None);
        push(&mut s, 2, WindowType::Application, WindowFlags::NONE, None);
        s.input_method_window = Some(10);
        s.input_method_target = Some(1);
        if let Some(a) = s.app_mut(100) {
            a.animating = true;
        }
        s.transition_pending = true;

        // The move is held at the outgoing application's window.
        s.move_ime_windows_if_needed(false);
        assert!(s.input_method_target_waiting_anim);
        assert_eq!(s.input_method_target, Some(1));

        // The held window's animation settling re-runs the move and the
        // overlay docks above the real candidate.
        s.transition_pending = false;
        s.animation_finished_locked(1);
        assert!(!s.input_method_target_waiting_anim);
        assert_eq!(s.input_method_target, Some(2));
        assert_eq!(s.stack, vec![1, 2, 10]);
    }

    #[test]
    fn test_move_keeps_block_contiguous_above_target() {
        let mut s = state();
        push(&mut s, 1, WindowType::Application, WindowFlags::NONE, None);
        push(&mut s, 10, WindowType::InputMethod, WindowFlags::NOT_FOCUSABLE, None);
        push(&mut s, 11, WindowType::InputMethodDialog, WindowFlags::NOT_FOCUSABLE, None);
        push(&mut s, 2, WindowType::Application, WindowFlags::NONE, None);
        s.input_method_window = Some(10);
        s.input_method_dialogs = vec![11];

        assert!(s.move_ime_windows_if_needed(false));
        assert_eq!(s.stack, vec![1, 2, 10, 11]);
        assert_eq!(s.input_method_target, Some(2));

        // Already in place: second call is a no-op.
        assert!(!s.move_ime_windows_if_needed(false));
    }

    #[test]
    fn test_dialogs_follow_without_overlay() {
        let mut s = state();
        push(&mut s, 1, WindowType::Application, WindowFlags::NONE, None);
        push(&mut s, 11, WindowType::InputMethodDialog, WindowFlags::NOT_FOCUSABLE, None);
        push(&mut s, 2, WindowType::Application, WindowFlags::NONE, None);
        s.input_method_dialogs = vec![11];

        assert!(s.move_ime_windows_if_needed(false));
        assert_eq!(s.stack, vec![1, 2, 11]);
    }
}
