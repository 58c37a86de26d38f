//! Compositor surface session.
//!
//! Surface allocation and transaction mechanics live outside this crate;
//! the coordinator drives them through this trait. Handles are opaque and
//! owned by the composer.

use anyhow::Result;

use crate::window::WindowAttrs;

/// Opaque handle to a compositor surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceHandle(pub u64);

/// Surface allocation and transaction API consumed by the coordinator.
pub trait SurfaceComposer: Send + Sync {
    /// Allocates a surface for a window. Failures are surfaced to the
    /// caller as a neutral "no surface" relayout result.
    fn create_surface(&self, window: u64, attrs: &WindowAttrs, width: i32, height: i32)
        -> Result<SurfaceHandle>;

    /// Releases a surface. Must tolerate handles already gone.
    fn destroy_surface(&self, surface: SurfaceHandle);

    /// Begins a batched transaction.
    fn open_transaction(&self) {}

    /// Commits the batched transaction.
    fn close_transaction(&self) {}
}

/// Composer that hands out sequential handles and forgets them. Tests
/// and headless runs use this.
#[derive(Default)]
pub struct NullComposer {
    next: std::sync::atomic::AtomicU64,
}

impl SurfaceComposer for NullComposer {
    fn create_surface(
        &self,
        _window: u64,
        _attrs: &WindowAttrs,
        _width: i32,
        _height: i32,
    ) -> Result<SurfaceHandle> {
        let id = self
            .next
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        Ok(SurfaceHandle(id + 1))
    }

    fn destroy_surface(&self, _surface: SurfaceHandle) {}
}
