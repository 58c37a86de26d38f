//! Numeric layer assignment.
//!
//! The placement engine decides order; this stage walks the stack
//! bottom-up and turns order into compositor layer numbers. Windows
//! sharing a base layer step by a small increment so the stack order is
//! preserved inside a type band, and each window's animation layer is
//! the assigned layer plus whatever adjustment its application group or
//! target tracker carries.

use log::trace;

use crate::coordinator::state::CoordinatorState;
use crate::window::WindowType;

/// Spacing between window type bands.
pub const TYPE_LAYER_MULTIPLIER: i32 = 10_000;

/// Offset into a type band where windows of that type start.
pub const TYPE_LAYER_OFFSET: i32 = 1_000;

/// Increment between windows sharing a band.
pub const WINDOW_LAYER_MULTIPLIER: i32 = 5;

impl CoordinatorState {
    /// Recomputes `layer` and `anim_layer` for every stacked window.
    pub(crate) fn assign_layers(&mut self) {
        let stack = self.stack.clone();
        let mut cur_base_layer = 0;
        let mut cur_layer = 0;

        for (i, &id) in stack.iter().enumerate() {
            let (base, is_im, app_token, target_app, kind) = match self.win(id) {
                Some(w) => (
                    w.base_layer,
                    w.is_im_window,
                    w.app_token,
                    w.target_app_token,
                    w.attrs.kind,
                ),
                None => continue,
            };

            let prev_is_wallpaper = i > 0
                && self
                    .win(stack[i - 1])
                    .map(|w| w.attrs.kind == WindowType::Wallpaper)
                    .unwrap_or(false);

            // Re-slotted blocks (input method, wallpaper) keep stepping
            // inside the band they landed in rather than resetting it.
            if base == cur_base_layer || is_im || prev_is_wallpaper {
                cur_layer += WINDOW_LAYER_MULTIPLIER;
            } else {
                cur_base_layer = base;
                cur_layer = base;
            }

            let adjustment = if is_im || Some(id) == self.input_method_window {
                self.input_method_adjustment
            } else if kind == WindowType::Wallpaper {
                self.wallpaper_adjustment
            } else if let Some(t) = target_app {
                self.app(t).map(|a| a.anim_layer_adjustment).unwrap_or(0)
            } else if let Some(t) = app_token {
                self.app(t).map(|a| a.anim_layer_adjustment).unwrap_or(0)
            } else {
                0
            };

            if let Some(w) = self.win_mut(id) {
                w.layer = cur_layer;
                w.anim_layer = cur_layer + adjustment;
                trace!(
                    "assign_layers: {} '{}' layer={} anim={}",
                    id,
                    w.attrs.title,
                    w.layer,
                    w.anim_layer
                );
            }
        }
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
    use crate::window::{Visibility, WindowAttrs, WindowState, WindowType};

    use super::{TYPE_LAYER_MULTIPLIER, TYPE_LAYER_OFFSET, WINDOW_LAYER_MULTIPLIER};

    fn state() -> CoordinatorState {
        CoordinatorState::new(
            StratumConfig::default(),
            Arc::new(DefaultPolicy),
            Arc::new(NullComposer::default()),
        )
    }

    fn push_window(s: &mut CoordinatorState, id: u64, kind: WindowType, token: u64) {
        let base = DefaultPolicy.window_type_layer(kind) * TYPE_LAYER_MULTIPLIER + TYPE_LAYER_OFFSET;
        let app = s
            .tokens
            .get(&token)
            .map(|t| t.kind.is_application())
            .unwrap_or(false)
            .then_some(token);
        let w = WindowState::new(
            id,
            1,
            WindowAttrs::new(kind, format!("w{id}")),
            token,
            app,
            None,
            Visibility::Visible,
            base,
            0,
            Arc::new(NullClient),
        );
        s.windows.insert(id, w);
        s.stack.push(id);
    }

    #[test]
    fn test_same_band_steps_by_multiplier() {
        let mut s = state();
        push_window(&mut s, 1, WindowType::BaseApplication, 10);
        push_window(&mut s, 2, WindowType::Application, 10);
        push_window(&mut s, 3, WindowType::StatusBar, 20);
        s.assign_layers();

        let base = s.windows[&1].base_layer;
        assert_eq!(s.windows[&1].layer, base);
        assert_eq!(s.windows[&2].layer, base + WINDOW_LAYER_MULTIPLIER);
        assert_eq!(s.windows[&3].layer, s.windows[&3].base_layer);
    }

    #[test]
    fn test_app_adjustment_feeds_anim_layer() {
        let mut s = state();
        let mut token = WindowToken::new(10, TokenKind::Application(AppState::default()), true);
        token.kind = TokenKind::Application(AppState {
            anim_layer_adjustment: 1000,
            ..AppState::default()
        });
        s.tokens.insert(10, token);
        push_window(&mut s, 1, WindowType::BaseApplication, 10);
        s.assign_layers();

        assert_eq!(s.windows[&1].anim_layer, s.windows[&1].layer + 1000);
    }

    #[test]
    fn test_ime_window_keeps_stepping_in_band() {
        let mut s = state();
        push_window(&mut s, 1, WindowType::BaseApplication, 10);
        push_window(&mut s, 2, WindowType::InputMethod, 20);
        s.input_method_window = Some(2);
        s.input_method_adjustment = 300;
        s.assign_layers();

        // The overlay was slotted above an application window, so it
        // steps from that window's layer instead of resetting to its
        // own band.
        assert_eq!(
            s.windows[&2].layer,
            s.windows[&1].layer + WINDOW_LAYER_MULTIPLIER
        );
        assert_eq!(s.windows[&2].anim_layer, s.windows[&2].layer + 300);
    }
}
