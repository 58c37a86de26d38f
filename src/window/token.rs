//! Window-group tokens.
//!
//! Every window belongs to a group token. Plain groups come into existence
//! the first time an unknown token is referenced; application, input-method
//! and wallpaper groups must be declared up front. The behavioral differences
//! between the kinds are a handful of fields, so the kind is a tagged variant
//! rather than a trait hierarchy.

/// Extra state carried by application-kind groups.
#[derive(Debug, Clone, Default)]
pub struct AppState {
    /// Application-level animation currently attached (transition).
    pub animation: bool,
    /// Transition animation is actively stepping.
    pub animating: bool,
    /// The group is being reordered to the bottom of the application
    /// order; the placement engine skips it when anchoring.
    pub sending_to_bottom: bool,
    /// Transient starting placeholder window, if one is up.
    pub starting_window: Option<u64>,
    /// Set once the first real window has finished drawing; a starting
    /// placeholder is refused after this.
    pub first_window_drawn: bool,
    /// Per-group animation layer adjustment, copied onto member
    /// windows' anim layers.
    pub anim_layer_adjustment: i32,
    /// Application is hidden (all windows).
    pub hidden: bool,
    /// A hide has been requested but may still be animating.
    pub hidden_requested: bool,
    /// The client process asked for its windows to be hidden.
    pub client_hidden: bool,
    /// Application group has been removed; no new windows accepted.
    pub removed: bool,
    /// Every window whose owning group is this application, including
    /// sub-windows, in z order.
    pub all_windows: Vec<u64>,
}

/// Group kind discriminator.
#[derive(Debug, Clone)]
pub enum TokenKind {
    Plain,
    Application(AppState),
    InputMethod,
    Wallpaper,
}

impl TokenKind {
    pub fn is_application(&self) -> bool {
        matches!(self, TokenKind::Application(_))
    }
}

/// A window-group token record.
#[derive(Debug, Clone)]
pub struct WindowToken {
    pub id: u64,
    pub kind: TokenKind,
    /// Member windows, bottom to top. For groups with attached
    /// sub-windows this list interleaves parents and children ordered
    /// by sub-layer.
    pub windows: Vec<u64>,
    /// Declared through the token API rather than created implicitly;
    /// explicit tokens survive their member list going empty.
    pub explicit: bool,
    /// Group-wide hidden bit (used by wallpaper visibility tracking).
    pub hidden: bool,
}

impl WindowToken {
    pub fn new(id: u64, kind: TokenKind, explicit: bool) -> Self {
        // Wallpaper groups stay hidden until a target first shows them.
        let hidden = matches!(kind, TokenKind::Wallpaper);
        Self {
            id,
            kind,
            windows: Vec::new(),
            explicit,
            hidden,
        }
    }

    pub fn app(&self) -> Option<&AppState> {
        match &self.kind {
            TokenKind::Application(app) => Some(app),
            _ => None,
        }
    }

    pub fn app_mut(&mut self) -> Option<&mut AppState> {
        match &mut self.kind {
            TokenKind::Application(app) => Some(app),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_accessors() {
        let mut token = WindowToken::new(1, TokenKind::Application(AppState::default()), true);
        assert!(token.kind.is_application());
        assert!(token.app().is_some());
        token.app_mut().unwrap().sending_to_bottom = true;
        assert!(token.app().unwrap().sending_to_bottom);

        let plain = WindowToken::new(2, TokenKind::Plain, false);
        assert!(plain.app().is_none());
        assert!(!plain.explicit);
    }
}
