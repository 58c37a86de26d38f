//! # Stratum Window Coordinator Library
//!
//! A window stacking and compositing coordinator: it owns the z-order of
//! every on-screen window, keeps the input-method overlay and the
//! wallpaper docked to the right windows, assigns compositor layers and
//! tracks key focus.
//!
//! ## Architecture
//!
//! Stratum is built on a modular architecture:
//! - `coordinator`: The service wrapper and the locked stacking state
//! - `placement`: Z-order insertion rules for every window class
//! - `ime`: Input-method overlay target tracking and block moves
//! - `wallpaper`: Wallpaper target tracking, visibility and scrolling
//! - `layers`: Numeric layer assignment from stack order
//! - `focus`: Focus candidate bookkeeping
//! - `window`: Window records, attributes and group tokens
//! - `policy`: Layering table and permission seam
//! - `surface`: Compositor surface session seam
//! - `client`: Client callback seam
//! - `config`: Configuration parsing and management
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use stratum::{StratumConfig, WindowCoordinator};
//! use stratum::policy::DefaultPolicy;
//! use stratum::surface::NullComposer;
//!
//! let coordinator = WindowCoordinator::new(
//!     StratumConfig::default(),
//!     Arc::new(DefaultPolicy),
//!     Arc::new(NullComposer::default()),
//! );
//! let order = coordinator.window_order();
//! assert!(order.is_empty());
//! ```

pub mod client;
pub mod config;
pub mod coordinator;
pub mod policy;
pub mod surface;
pub mod types;
pub mod window;

mod focus;
mod ime;
mod layers;
mod placement;
mod wallpaper;

// Re-export main types for easy access
pub use client::{NullClient, WindowClient};
pub use config::StratumConfig;
pub use coordinator::{AddWindowError, AddedWindow, RelayoutResult, WindowCoordinator};
pub use layers::{TYPE_LAYER_MULTIPLIER, TYPE_LAYER_OFFSET, WINDOW_LAYER_MULTIPLIER};
pub use policy::{DefaultPolicy, LayoutPolicy, Transit};
pub use surface::{NullComposer, SurfaceComposer, SurfaceHandle};
pub use types::{Insets, Rect};
pub use window::{Visibility, WindowAttrs, WindowFlags, WindowType};

// Re-export common error types
pub use anyhow::{Context, Error, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
