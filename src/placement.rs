//! Z-order placement engine.
//!
//! Pure stack surgery: these routines decide where a window slots into
//! the bottom-to-top stack and keep group member lists in step. They
//! never touch numeric layers; that is the layer-assignment stage's job.
//!
//! Anchor search order for an unattached window with an application
//! group:
//!   1. the group already has windows on screen: slot relative to them
//!      (base windows forced to the bottom, everything else kept under a
//!      starting placeholder),
//!   2. otherwise walk the application order for a neighbor to anchor
//!      against,
//!   3. otherwise fall back to a base-layer scan.

use log::warn;

use crate::coordinator::state::CoordinatorState;
use crate::window::WindowType;

impl CoordinatorState {
    /// Inserts `win` directly below `pos` in the stack.
    pub(crate) fn place_before(&mut self, pos: u64, win: u64) {
        match self.stack_index(pos) {
            Some(i) => self.stack.insert(i, win),
            None => {
                warn!("place_before: anchor {pos} missing from stack, appending {win}");
                self.stack.push(win);
            }
        }
        self.windows_changed = true;
    }

    /// Inserts `win` directly above `pos` in the stack.
    pub(crate) fn place_after(&mut self, pos: u64, win: u64) {
        match self.stack_index(pos) {
            Some(i) => self.stack.insert(i + 1, win),
            None => {
                warn!("place_after: anchor {pos} missing from stack, appending {win}");
                self.stack.push(win);
            }
        }
        self.windows_changed = true;
    }

    /// Index of the topmost stack entry owned by `app`, if any.
    pub(crate) fn find_index_by_app(&self, app: u64) -> Option<usize> {
        for j in (0..self.stack.len()).rev() {
            if let Some(w) = self.win(self.stack[j]) {
                if w.app_token == Some(app) {
                    return Some(j);
                }
            }
        }
        None
    }

    /// Slots a freshly registered (or re-registered) window into the
    /// stack. With `add_to_token` the window also joins its group member
    /// list and application window list; re-add paths pass `false`
    /// because membership survived the temporary removal.
    pub(crate) fn place_window_in_order(&mut self, id: u64, add_to_token: bool) {
        let (kind, token_id, app_token, attached, sub_layer, base_layer) = match self.win(id) {
            Some(w) => (
                w.attrs.kind,
                w.token,
                w.app_token,
                w.attached,
                w.sub_layer,
                w.base_layer,
            ),
            None => return,
        };

        match attached {
            None => self.place_unattached(id, kind, token_id, app_token, base_layer, add_to_token),
            Some(parent) => self.place_attached(id, parent, token_id, sub_layer, add_to_token),
        }

        if add_to_token {
            if let Some(app) = app_token {
                if let Some(a) = self.app_mut(app) {
                    a.all_windows.push(id);
                }
            }
        }
    }

    fn place_unattached(
        &mut self,
        id: u64,
        kind: WindowType,
        token_id: u64,
        app_token: Option<u64>,
        base_layer: i32,
        add_to_token: bool,
    ) {
        let member_count = self.token(token_id).map(|t| t.windows.len()).unwrap_or(0);
        let mut token_pos = member_count;

        if let Some(app) = app_token {
            if member_count > 0 {
                // The group already has windows; place relative to them.
                let members = self
                    .token(token_id)
                    .map(|t| t.windows.clone())
                    .unwrap_or_default();
                let starting = self.app(app).and_then(|a| a.starting_window);
                if kind == WindowType::BaseApplication {
                    // Base windows go behind everything else in the group.
                    self.place_before(members[0], id);
                    token_pos = 0;
                } else if starting.is_some() && members.last().copied() == starting {
                    // Keep the starting placeholder on top.
                    let top = members[member_count - 1];
                    self.place_before(top, id);
                    token_pos = member_count - 1;
                } else {
                    match self.find_index_by_app(app) {
                        Some(idx) => {
                            self.stack.insert(idx + 1, id);
                            self.windows_changed = true;
                        }
                        None => {
                            // Group membership and the stack disagree;
                            // fall back to a base-layer slot.
                            warn!(
                                "window {id}: group {token_id} has members but none \
                                 are stacked, using base-layer placement"
                            );
                            self.place_by_base_layer_top_down(id, base_layer);
                        }
                    }
                }
            } else {
                self.place_by_app_order(id, app, base_layer);
            }
        } else {
            self.place_by_base_layer_top_down(id, base_layer);
        }

        if add_to_token {
            if let Some(t) = self.token_mut(token_id) {
                let pos = token_pos.min(t.windows.len());
                t.windows.insert(pos, id);
            }
        }
    }

    /// First window of an application group: anchor against neighboring
    /// groups in the application order.
    fn place_by_app_order(&mut self, id: u64, app: u64, base_layer: i32) {
        // Walk down to our group, remembering the bottom-most window of
        // the nearest anchorable group above us.
        let mut above: Option<u64> = None;
        let mut i = self.app_order.len() as isize - 1;
        while i >= 0 {
            let t = self.app_order[i as usize];
            if t == app {
                i -= 1;
                break;
            }
            if let Some(tok) = self.token(t) {
                let sending = tok.app().map(|a| a.sending_to_bottom).unwrap_or(false);
                if !sending && !tok.windows.is_empty() {
                    above = Some(tok.windows[0]);
                }
            }
            i -= 1;
        }

        if let Some(mut pos) = above {
            // Drop beneath any negative sub-windows hanging off the
            // anchor.
            if let Some(ct) = self.token(pos) {
                if let Some(&bottom) = ct.windows.first() {
                    if self.win(bottom).map(|w| w.sub_layer).unwrap_or(0) < 0 {
                        pos = bottom;
                    }
                }
            }
            self.place_before(pos, id);
            return;
        }

        // No anchor above; keep walking down for the first group with
        // windows and go in front of it.
        let mut below: Option<u64> = None;
        while i >= 0 {
            let t = self.app_order[i as usize];
            if let Some(tok) = self.token(t) {
                if let Some(&top) = tok.windows.last() {
                    below = Some(top);
                    break;
                }
            }
            i -= 1;
        }
        if let Some(mut pos) = below {
            // Climb above any positive sub-windows hanging off the
            // anchor.
            if let Some(ct) = self.token(pos) {
                if let Some(&top) = ct.windows.last() {
                    if self.win(top).map(|w| w.sub_layer).unwrap_or(-1) >= 0 {
                        pos = top;
                    }
                }
            }
            self.place_after(pos, id);
            return;
        }

        // Nothing to anchor against: first slot whose base layer is
        // above ours.
        let idx = {
            let mut idx = self.stack.len();
            for (j, &w) in self.stack.iter().enumerate() {
                if self.win(w).map(|ws| ws.base_layer).unwrap_or(i32::MIN) > base_layer {
                    idx = j;
                    break;
                }
            }
            idx
        };
        self.stack.insert(idx, id);
        self.windows_changed = true;
    }

    /// Non-application windows: scan from the top for the highest entry
    /// at or below our base layer and go above it, so later windows of
    /// equal layer stack on top of earlier ones.
    fn place_by_base_layer_top_down(&mut self, id: u64, base_layer: i32) {
        let mut idx = 0;
        for j in (0..self.stack.len()).rev() {
            let layer = self
                .win(self.stack[j])
                .map(|w| w.base_layer)
                .unwrap_or(i32::MAX);
            if layer <= base_layer {
                idx = j + 1;
                break;
            }
        }
        self.stack.insert(idx, id);
        self.windows_changed = true;
    }

    /// Sub-windows slot relative to their attachment window by
    /// sub-layer: negative beneath all members at or above their
    /// sub-layer, positive above all members at or below theirs.
    fn place_attached(
        &mut self,
        id: u64,
        attached: u64,
        token_id: u64,
        sub_layer: i32,
        add_to_token: bool,
    ) {
        let members: Vec<(u64, i32)> = self
            .token(token_id)
            .map(|t| {
                t.windows
                    .iter()
                    .map(|&w| (w, self.win(w).map(|ws| ws.sub_layer).unwrap_or(0)))
                    .collect()
            })
            .unwrap_or_default();

        let mut largest_sublayer = i32::MIN;
        let mut window_with_largest: Option<u64> = None;
        let mut placed_at: Option<usize> = None;

        for (i, &(wid, wsub)) in members.iter().enumerate() {
            if wsub >= largest_sublayer {
                largest_sublayer = wsub;
                window_with_largest = Some(wid);
            }
            if sub_layer < 0 {
                if wsub >= sub_layer {
                    let anchor = if wsub >= 0 { attached } else { wid };
                    self.place_before(anchor, id);
                    placed_at = Some(i);
                    break;
                }
            } else if wsub > sub_layer {
                self.place_before(wid, id);
                placed_at = Some(i);
                break;
            }
        }

        let token_pos = match placed_at {
            Some(i) => i,
            None => {
                if sub_layer < 0 {
                    self.place_before(attached, id);
                } else {
                    let anchor = if largest_sublayer >= 0 {
                        window_with_largest.unwrap_or(attached)
                    } else {
                        attached
                    };
                    self.place_after(anchor, id);
                }
                members.len()
            }
        };

        if add_to_token {
            if let Some(t) = self.token_mut(token_id) {
                let pos = token_pos.min(t.windows.len());
                t.windows.insert(pos, id);
            }
        }
    }

    /// Pulls a window and its attached children out of the stack,
    /// shrinking `interesting_pos` for every entry removed beneath it.
    /// Group membership is untouched; pair with a re-add.
    pub(crate) fn tmp_remove_window(&mut self, mut interesting_pos: i32, id: u64) -> i32 {
        if let Some(wpos) = self.stack_index(id) {
            if (wpos as i32) < interesting_pos {
                interesting_pos -= 1;
            }
            self.stack.remove(wpos);
            self.windows_changed = true;
            let children: Vec<u64> = self
                .win(id)
                .map(|w| w.children.clone())
                .unwrap_or_default();
            for &child in children.iter().rev() {
                if let Some(cpos) = self.stack_index(child) {
                    if (cpos as i32) < interesting_pos {
                        interesting_pos -= 1;
                    }
                    self.stack.remove(cpos);
                }
            }
        }
        interesting_pos
    }

    /// Re-inserts a window and its children as one block starting at
    /// `index`: negative sub-layer children first, then the window, then
    /// the rest. Returns the index just past the block.
    pub(crate) fn re_add_window(&mut self, mut index: usize, id: u64) -> usize {
        let children: Vec<u64> = self
            .win(id)
            .map(|w| w.children.clone())
            .unwrap_or_default();
        let mut win_added = false;
        for &child in &children {
            let csub = self.win(child).map(|w| w.sub_layer).unwrap_or(0);
            if !win_added && csub >= 0 {
                self.stack.insert(index.min(self.stack.len()), id);
                index += 1;
                win_added = true;
            }
            self.stack.insert(index.min(self.stack.len()), child);
            index += 1;
        }
        if !win_added {
            self.stack.insert(index.min(self.stack.len()), id);
            index += 1;
        }
        self.windows_changed = true;
        index
    }

    /// Re-slots a previously removed window through the normal placement
    /// rules, then rebuilds its child block around it.
    pub(crate) fn re_add_window_in_order(&mut self, id: u64) {
        self.place_window_in_order(id, false);
        if let Some(wpos) = self.stack_index(id) {
            self.stack.remove(wpos);
            self.windows_changed = true;
            self.re_add_window(wpos, id);
        }
    }
}
