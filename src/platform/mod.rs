//! Platform abstraction layer
//!
//! Handles browser/native differences for:
//! - Frame timing
//! - Visibility-gated render loop and debounced resize
//! - Shared pointer/touch input
//!
//! Everything except `web` is platform-neutral and tested natively.

pub mod attached;
pub mod clock;
pub mod input;
pub mod lifecycle;

#[cfg(target_arch = "wasm32")]
pub mod web;

pub use attached::{Attached, Detach, attach_all};
pub use clock::{FrameClock, FrameTime};
pub use input::{
    HitSurface, InputRouter, ListenerBinding, PointerHandler, PointerRegistration, PointerState, Rect,
    WeakInputRouter,
};
pub use lifecycle::{LifecycleOptions, RenderHooks, RenderLifecycle, SurfaceHost};
