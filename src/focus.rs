//! Focus bookkeeping.
//!
//! The coordinator only decides which window is the focus candidate;
//! actual input routing lives outside. The candidate is the topmost
//! stacked window that can receive keys.

use log::debug;

use crate::coordinator::state::CoordinatorState;

impl CoordinatorState {
    /// Recomputes the focused window. Returns true when it changed.
    pub(crate) fn update_focus(&mut self) -> bool {
        let mut new_focus = None;
        for &id in self.stack.iter().rev() {
            if let Some(w) = self.win(id) {
                if w.can_receive_keys(self.app_hidden_requested(w)) {
                    new_focus = Some(id);
                    break;
                }
            }
        }

        if new_focus != self.focused_window {
            debug!(
                "focus change: {:?} -> {:?}",
                self.focused_window, new_focus
            );
            self.focused_window = new_focus;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::client::NullClient;
    use crate::config::StratumConfig;
    use crate::coordinator::state::CoordinatorState;
    use crate::policy::DefaultPolicy;
    use crate::surface::{NullComposer, SurfaceHandle};
    use crate::window::{Visibility, WindowAttrs, WindowFlags, WindowState, WindowType};

    fn state() -> CoordinatorState {
        CoordinatorState::new(
            StratumConfig::default(),
            Arc::new(DefaultPolicy),
            Arc::new(NullComposer::default()),
        )
    }

    fn push(s: &mut CoordinatorState, id: u64, flags: WindowFlags) {
        let mut w = WindowState::new(
            id,
            1,
            WindowAttrs::new(WindowType::Application, format!("w{id}")).with_flags(flags),
            id,
            None,
            None,
            Visibility::Visible,
            21_000,
            0,
            Arc::new(NullClient),
        );
        w.surface = Some(SurfaceHandle(id));
        w.relayout_called = true;
        s.windows.insert(id, w);
        s.stack.push(id);
    }

    #[test]
    fn test_topmost_focusable_wins() {
        let mut s = state();
        push(&mut s, 1, WindowFlags::NONE);
        push(&mut s, 2, WindowFlags::NONE);
        push(&mut s, 3, WindowFlags::NOT_FOCUSABLE);

        assert!(s.update_focus());
        assert_eq!(s.focused_window, Some(2));
        // Unchanged on a second pass.
        assert!(!s.update_focus());
    }

    #[test]
    fn test_focus_clears_when_nothing_focusable() {
        let mut s = state();
        push(&mut s, 1, WindowFlags::NONE);
        assert!(s.update_focus());

        s.windows.get_mut(&1).unwrap().exiting = true;
        assert!(s.update_focus());
        assert_eq!(s.focused_window, None);
    }
}
