//! The window coordinator service.
//!
//! [`WindowCoordinator`] wraps the mutable stacking state in a single
//! lock and exposes the client- and manager-facing operations. All
//! structural work (placement, the input-method and wallpaper trackers,
//! layer assignment, focus) happens on [`state::CoordinatorState`] while
//! the lock is held; the service layer adds session validation, the
//! synchronous wallpaper acknowledgement wait and configuration-change
//! fan-out.

pub mod state;

mod lifecycle;

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::warn;
use parking_lot::{Condvar, Mutex, MutexGuard};
use thiserror::Error;

use crate::client::WindowClient;
use crate::config::StratumConfig;
use crate::policy::LayoutPolicy;
use crate::surface::{SurfaceComposer, SurfaceHandle};
use crate::types::{Insets, Rect};
use crate::window::{Visibility, WindowAttrs, WindowType};

use state::CoordinatorState;

/// Why an add was refused.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddWindowError {
    #[error("window {0} is already added")]
    Duplicate(u64),
    #[error("unusable group token {0}")]
    BadToken(u64),
    #[error("token {0} is not an application group")]
    NotApplicationToken(u64),
    #[error("application group {0} is exiting")]
    ApplicationExiting(u64),
    #[error("starting placeholder is no longer needed")]
    StartingNotNeeded,
    #[error("client is not alive")]
    ClientDefunct,
    #[error("permission denied by policy")]
    PermissionDenied,
}

/// What a successful add reports back to the client.
#[derive(Debug, Clone, Copy)]
pub struct AddedWindow {
    /// Policy's guess at the content insets before the first layout.
    pub content_insets: Insets,
    pub in_touch_mode: bool,
    /// Whether the owning application currently wants its windows shown.
    pub app_visible: bool,
    pub focus_changed: bool,
}

/// What a relayout reports back to the client.
#[derive(Debug, Clone, Copy, Default)]
pub struct RelayoutResult {
    pub frame: Rect,
    pub content_insets: Insets,
    pub visible_insets: Insets,
    /// Surface to render into; `None` when the window is not (or no
    /// longer) visible and the surface was not kept.
    pub surface: Option<SurfaceHandle>,
    /// Configuration sequence the client has not seen yet, if any.
    pub config_seq: Option<u64>,
    pub in_touch_mode: bool,
    /// The window just became visible for the first time since hidden.
    pub first_layout: bool,
}

type ConfigObserver = Box<dyn Fn(u64) + Send + Sync>;

pub struct WindowCoordinator {
    state: Mutex<CoordinatorState>,
    wallpaper_ack: Condvar,
    config_observers: Mutex<Vec<ConfigObserver>>,
}

impl WindowCoordinator {
    pub fn new(
        config: StratumConfig,
        policy: Arc<dyn LayoutPolicy>,
        composer: Arc<dyn SurfaceComposer>,
    ) -> Self {
        Self {
            state: Mutex::new(CoordinatorState::new(config, policy, composer)),
            wallpaper_ack: Condvar::new(),
            config_observers: Mutex::new(Vec::new()),
        }
    }

    // Client-facing window operations.

    pub fn add_window(
        &self,
        session: u64,
        id: u64,
        attrs: WindowAttrs,
        token: u64,
        visibility: Visibility,
        client: Arc<dyn WindowClient>,
    ) -> Result<AddedWindow, AddWindowError> {
        self.state
            .lock()
            .add_window_locked(session, id, attrs, token, visibility, client)
    }

    pub fn remove_window(&self, session: u64, id: u64) {
        let mut s = self.state.lock();
        if s.window_for_session(session, id).is_none() {
            return;
        }
        s.remove_window_locked(id);
    }

    pub fn relayout_window(
        &self,
        session: u64,
        id: u64,
        attrs: Option<WindowAttrs>,
        requested_width: i32,
        requested_height: i32,
        visibility: Visibility,
        insets_pending: bool,
    ) -> anyhow::Result<RelayoutResult> {
        let mut s = self.state.lock();
        if s.window_for_session(session, id).is_none() {
            anyhow::bail!("relayout of unknown window {id}");
        }
        Ok(s.relayout_locked(
            id,
            attrs,
            requested_width,
            requested_height,
            visibility,
            insets_pending,
        ))
    }

    /// The client committed its first frame for the current surface.
    pub fn finish_drawing(&self, session: u64, id: u64) {
        let mut s = self.state.lock();
        if s.window_for_session(session, id).is_none() {
            return;
        }
        s.finish_drawing_locked(id);
    }

    pub fn set_insets(
        &self,
        session: u64,
        id: u64,
        touchable_mode: i32,
        content: Insets,
        visible: Insets,
        region: Rect,
    ) {
        let mut s = self.state.lock();
        if s.window_for_session(session, id).is_none() {
            return;
        }
        s.set_insets_locked(id, touchable_mode, content, visible, region);
    }

    pub fn get_window_display_frame(&self, session: u64, id: u64) -> Option<Rect> {
        let s = self.state.lock();
        s.window_for_session(session, id).map(|w| w.display_frame)
    }

    /// Drops the window's surface to relieve memory pressure. Returns
    /// true when a surface was reclaimed.
    pub fn reclaim_surface(&self, session: u64, id: u64) -> bool {
        let mut s = self.state.lock();
        if s.window_for_session(session, id).is_none() {
            return false;
        }
        s.reclaim_surface_locked(id)
    }

    // Wallpaper scroll plumbing.

    /// Updates the sender's wallpaper scroll position and pushes the
    /// resulting offsets to the wallpaper clients, waiting briefly for
    /// the first one to acknowledge so scrolling stays in step.
    pub fn set_window_wallpaper_position(
        &self,
        session: u64,
        id: u64,
        x: f32,
        y: f32,
        x_step: f32,
        y_step: f32,
    ) {
        let mut s = self.state.lock();
        if s.window_for_session(session, id).is_none() {
            return;
        }
        if s.set_wallpaper_position_locked(id, x, y, x_step, y_step) {
            self.wait_for_wallpaper_ack(&mut s);
        }
    }

    pub fn send_window_wallpaper_command(
        &self,
        session: u64,
        id: u64,
        action: &str,
        x: i32,
        y: i32,
        z: i32,
        sync: bool,
    ) {
        let mut s = self.state.lock();
        if s.window_for_session(session, id).is_none() {
            return;
        }
        s.send_wallpaper_command(id, action, x, y, z, sync);
    }

    /// Wallpaper client finished applying a synchronous offset change.
    pub fn wallpaper_offsets_complete(&self, id: u64) {
        let mut s = self.state.lock();
        if s.waiting_on_wallpaper == Some(id) {
            s.waiting_on_wallpaper = None;
            s.last_wallpaper_timeout = None;
            self.wallpaper_ack.notify_all();
        }
    }

    /// Wallpaper client finished applying a synchronous command.
    pub fn wallpaper_command_complete(&self, id: u64) {
        self.wallpaper_offsets_complete(id);
    }

    fn wait_for_wallpaper_ack(&self, s: &mut MutexGuard<'_, CoordinatorState>) {
        if s.waiting_on_wallpaper.is_none() {
            return;
        }
        // After a timeout, stop blocking callers for a while; a stuck
        // wallpaper must not make scrolling windows jank.
        let recovery = Duration::from_millis(s.config.wallpaper.timeout_recovery_ms);
        if let Some(last) = s.last_wallpaper_timeout {
            if last.elapsed() < recovery {
                s.waiting_on_wallpaper = None;
                return;
            }
        }
        let timeout = Duration::from_millis(s.config.wallpaper.offset_timeout_ms);
        while s.waiting_on_wallpaper.is_some() {
            if self.wallpaper_ack.wait_for(s, timeout).timed_out() {
                warn!("timeout waiting for wallpaper to acknowledge offsets");
                s.last_wallpaper_timeout = Some(Instant::now());
                s.waiting_on_wallpaper = None;
            }
        }
    }

    // Group token operations.

    pub fn add_token(&self, token: u64, kind: WindowType) {
        self.state.lock().add_token_locked(token, kind);
    }

    pub fn add_app_token(&self, index: usize, token: u64) {
        self.state.lock().add_app_token_locked(index, token);
    }

    pub fn remove_token(&self, token: u64) {
        self.state.lock().remove_token_locked(token);
    }

    pub fn move_app_token(&self, index: usize, token: u64) {
        self.state.lock().move_app_token_locked(index, token);
    }

    pub fn set_app_sending_to_bottom(&self, token: u64, sending: bool) {
        self.state
            .lock()
            .set_app_sending_to_bottom_locked(token, sending);
    }

    pub fn set_app_animating(&self, token: u64, animating: bool) {
        self.state.lock().set_app_animating_locked(token, animating);
    }

    pub fn set_app_hidden(&self, token: u64, hidden: bool) {
        self.state.lock().set_app_hidden_locked(token, hidden);
    }

    pub fn set_app_layer_adjustment(&self, token: u64, adj: i32) {
        self.state.lock().set_app_layer_adjustment_locked(token, adj);
    }

    // Transition control.

    pub fn prepare_app_transition(&self) {
        self.state.lock().prepare_app_transition_locked();
    }

    pub fn execute_app_transition(&self) {
        self.state.lock().execute_app_transition_locked();
    }

    /// A window animation finished stepping; settles any deferred
    /// removal and the trackers.
    pub fn animation_finished(&self, id: u64) {
        self.state.lock().animation_finished_locked(id);
    }

    /// The animation collaborator reports a window whose running
    /// animation is detached from the wallpaper, or `None` when that
    /// animation ends. While set, the wallpaper stays put beneath the
    /// window in case the animation exposes it.
    pub fn set_detached_wallpaper(&self, window: Option<u64>) {
        self.state.lock().set_detached_wallpaper_locked(window);
    }

    // Environment.

    pub fn set_in_touch_mode(&self, in_touch_mode: bool) {
        self.state.lock().in_touch_mode = in_touch_mode;
    }

    /// Applies a new display size and notifies configuration observers
    /// with the new sequence number.
    pub fn set_display_size(&self, width: i32, height: i32) {
        let seq = self.state.lock().set_display_size_locked(width, height);
        // Observers run without the state lock so they may call back in.
        let observers = self.config_observers.lock();
        for obs in observers.iter() {
            obs(seq);
        }
    }

    pub fn add_config_observer(&self, observer: ConfigObserver) {
        self.config_observers.lock().push(observer);
    }

    // Introspection.

    pub fn focused_window(&self) -> Option<u64> {
        self.state.lock().focused_window
    }

    pub fn input_method_target(&self) -> Option<u64> {
        self.state.lock().input_method_target
    }

    pub fn wallpaper_target(&self) -> Option<u64> {
        self.state.lock().wallpaper_target
    }

    /// Window handles bottom to top.
    pub fn window_order(&self) -> Vec<u64> {
        self.state.lock().stack.clone()
    }

    pub fn window_layer(&self, id: u64) -> Option<i32> {
        self.state.lock().win(id).map(|w| w.layer)
    }

    pub fn window_anim_layer(&self, id: u64) -> Option<i32> {
        self.state.lock().win(id).map(|w| w.anim_layer)
    }

    pub fn window_frame(&self, id: u64) -> Option<Rect> {
        self.state.lock().win(id).map(|w| w.frame)
    }

    /// Application groups whose starting placeholder is ready to be
    /// collected. Each group is reported once.
    pub fn take_finished_starting(&self) -> Vec<u64> {
        self.state.lock().take_finished_starting()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::NullClient;
    use crate::policy::DefaultPolicy;
    use crate::surface::NullComposer;
    use crate::window::WindowFlags;

    fn coordinator() -> WindowCoordinator {
        WindowCoordinator::new(
            StratumConfig::default(),
            Arc::new(DefaultPolicy),
            Arc::new(NullComposer::default()),
        )
    }

    fn app_attrs(title: &str) -> WindowAttrs {
        WindowAttrs::new(WindowType::BaseApplication, title)
    }

    #[test]
    fn test_add_then_relayout_produces_surface() {
        let c = coordinator();
        c.add_app_token(0, 100);
        let added = c
            .add_window(
                1,
                10,
                app_attrs("main"),
                100,
                Visibility::Visible,
                Arc::new(NullClient),
            )
            .unwrap();
        assert!(added.in_touch_mode);
        assert!(added.app_visible);

        let res = c
            .relayout_window(1, 10, None, 320, 480, Visibility::Visible, false)
            .unwrap();
        assert!(res.surface.is_some());
        assert!(res.first_layout);
        assert_eq!(res.frame, Rect::from_size(320, 480));
        assert_eq!(c.focused_window(), Some(10));
    }

    #[test]
    fn test_duplicate_add_refused() {
        let c = coordinator();
        c.add_app_token(0, 100);
        c.add_window(1, 10, app_attrs("a"), 100, Visibility::Visible, Arc::new(NullClient))
            .unwrap();
        let err = c
            .add_window(1, 10, app_attrs("b"), 100, Visibility::Visible, Arc::new(NullClient))
            .unwrap_err();
        assert_eq!(err, AddWindowError::Duplicate(10));
    }

    #[test]
    fn test_session_mismatch_is_ignored() {
        let c = coordinator();
        c.add_app_token(0, 100);
        c.add_window(1, 10, app_attrs("a"), 100, Visibility::Visible, Arc::new(NullClient))
            .unwrap();

        assert!(c
            .relayout_window(2, 10, None, 100, 100, Visibility::Visible, false)
            .is_err());
        c.remove_window(2, 10);
        assert_eq!(c.window_order(), vec![10]);
    }

    #[test]
    fn test_app_window_needs_declared_group() {
        let c = coordinator();
        let err = c
            .add_window(1, 10, app_attrs("a"), 999, Visibility::Visible, Arc::new(NullClient))
            .unwrap_err();
        assert_eq!(err, AddWindowError::BadToken(999));
    }

    #[test]
    fn test_config_observer_sees_display_change() {
        use std::sync::atomic::{AtomicU64, Ordering};
        let c = coordinator();
        let seen = Arc::new(AtomicU64::new(0));
        let seen2 = seen.clone();
        c.add_config_observer(Box::new(move |seq| {
            seen2.store(seq, Ordering::SeqCst);
        }));

        c.set_display_size(800, 600);
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_display_change_reports_new_geometry() {
        #[derive(Default)]
        struct ResizeClient {
            frames: Mutex<Vec<Rect>>,
        }
        impl WindowClient for ResizeClient {
            fn dispatch_resized(&self, frame: Rect, _content: Insets, _visible: Insets) {
                self.frames.lock().push(frame);
            }
        }

        let c = coordinator();
        let client = Arc::new(ResizeClient::default());
        c.add_app_token(0, 100);
        c.add_window(1, 10, app_attrs("a"), 100, Visibility::Visible, client.clone())
            .unwrap();

        // No surface yet: a display change is not reported.
        c.set_display_size(700, 500);
        assert!(client.frames.lock().is_empty());

        c.relayout_window(1, 10, None, 320, 480, Visibility::Visible, false)
            .unwrap();
        c.set_display_size(800, 600);
        assert_eq!(*client.frames.lock(), vec![Rect::from_size(320, 480)]);
        assert_eq!(
            c.get_window_display_frame(1, 10),
            Some(Rect::from_size(800, 600))
        );
    }

    #[test]
    fn test_first_show_enters_then_later_unhides_show() {
        use crate::policy::Transit;

        #[derive(Default)]
        struct TransitLog {
            seen: Mutex<Vec<Transit>>,
        }
        impl LayoutPolicy for TransitLog {
            fn content_inset_hint(&self, _attrs: &WindowAttrs, _display: Rect) -> Insets {
                Insets::default()
            }
            fn is_screen_on(&self) -> bool {
                true
            }
            fn window_type_layer(&self, kind: WindowType) -> i32 {
                DefaultPolicy.window_type_layer(kind)
            }
            fn sub_window_layer(&self, kind: WindowType) -> i32 {
                DefaultPolicy.sub_window_layer(kind)
            }
            fn max_wallpaper_layer(&self) -> i32 {
                DefaultPolicy.max_wallpaper_layer()
            }
            fn has_transition_animation(&self, _attrs: &WindowAttrs, transit: Transit) -> bool {
                self.seen.lock().push(transit);
                true
            }
        }

        let policy = Arc::new(TransitLog::default());
        let c = WindowCoordinator::new(
            StratumConfig::default(),
            policy.clone(),
            Arc::new(NullComposer::default()),
        );
        c.add_app_token(0, 100);
        c.add_window(1, 10, app_attrs("a"), 100, Visibility::Visible, Arc::new(NullClient))
            .unwrap();
        c.relayout_window(1, 10, None, 320, 480, Visibility::Visible, false)
            .unwrap();
        c.finish_drawing(1, 10);

        // Hide, then un-hide: only the lighter show transit.
        c.relayout_window(1, 10, None, 320, 480, Visibility::Invisible, false)
            .unwrap();
        c.relayout_window(1, 10, None, 320, 480, Visibility::Visible, false)
            .unwrap();
        // Gone and back: a fresh enter.
        c.relayout_window(1, 10, None, 320, 480, Visibility::Gone, false)
            .unwrap();
        c.relayout_window(1, 10, None, 320, 480, Visibility::Visible, false)
            .unwrap();

        assert_eq!(
            *policy.seen.lock(),
            vec![Transit::Exit, Transit::Show, Transit::Exit, Transit::Enter]
        );
    }

    #[test]
    fn test_wallpaper_ack_unblocks_position_change() {
        let c = Arc::new(coordinator());
        c.add_token(200, WindowType::Wallpaper);
        c.add_window(
            1,
            20,
            WindowAttrs::new(WindowType::Wallpaper, "wall"),
            200,
            Visibility::Visible,
            Arc::new(NullClient),
        )
        .unwrap();
        c.relayout_window(1, 20, None, 2160, 1920, Visibility::Visible, false)
            .unwrap();

        c.add_app_token(0, 100);
        c.add_window(
            1,
            10,
            app_attrs("home").with_flags(WindowFlags::SHOW_WALLPAPER),
            100,
            Visibility::Visible,
            Arc::new(NullClient),
        )
        .unwrap();
        c.relayout_window(1, 10, None, 1080, 1920, Visibility::Visible, false)
            .unwrap();
        c.finish_drawing(1, 10);
        assert_eq!(c.wallpaper_target(), Some(10));

        let acker = {
            let c = c.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(10));
                c.wallpaper_offsets_complete(20);
            })
        };
        let start = Instant::now();
        c.set_window_wallpaper_position(1, 10, 0.25, 0.0, 0.1, 0.0);
        acker.join().unwrap();
        // Unblocked by the ack, well before the timeout.
        assert!(start.elapsed() < Duration::from_millis(150));
    }
}
