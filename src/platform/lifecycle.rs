//! Render loop lifecycle
//!
//! The loop runs only while the surface intersects the viewport AND the
//! document is visible. Off-screen or backgrounded animations must not burn
//! GPU time: marketing pages host several of them at once.
//!
//! Platform work (frame requests, timers, measuring, listener teardown) goes
//! through [`SurfaceHost`] so the state machine runs the same in the browser
//! and in tests.

use glam::Vec3;

use super::clock::{FrameClock, FrameTime};
use crate::consts::{DEFAULT_MAX_PIXEL_RATIO, RESIZE_DEBOUNCE_MS};
use crate::renderer::camera::{PerspectiveCamera, View, ViewSize, fov_for_aspect};

/// Platform services needed by the render loop
pub trait SurfaceHost {
    /// Schedule one frame callback; `None` if the platform refused
    fn request_frame(&mut self) -> Option<i32>;
    fn cancel_frame(&mut self, handle: i32);
    /// Arm a one-shot timer that calls back into `on_resize_timeout`
    fn start_timeout(&mut self, delay_ms: i32) -> Option<i32>;
    fn clear_timeout(&mut self, handle: i32);
    fn device_pixel_ratio(&self) -> f64;
    /// Size of the element the surface fills, in CSS pixels
    fn container_size(&self) -> (f64, f64);
    /// Resize the backing buffer (and displayed size) of the surface
    fn resize_surface(&mut self, size: &ViewSize);
    /// Drop every listener/observer the host installed
    fn release(&mut self);
}

/// Callbacks around each frame and resize
pub trait RenderHooks {
    fn before_render(&mut self, _time: FrameTime, _view: &View) {}
    fn render(&mut self, view: &View);
    fn after_render(&mut self, _time: FrameTime, _view: &View) {}
    fn after_resize(&mut self, _view: &View) {}
}

/// Camera and surface sizing options
#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleOptions {
    /// Base vertical field of view (degrees)
    pub fov: f32,
    pub camera_position: Vec3,
    /// Below this aspect the fov is widened to keep horizontal extent
    pub min_aspect: Option<f32>,
    /// Above this aspect the fov is narrowed
    pub max_aspect: Option<f32>,
    pub max_fov: Option<f32>,
    pub min_pixel_ratio: f64,
    pub max_pixel_ratio: f64,
    /// Follow the parent element's size (element-size observation)
    pub track_parent: bool,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            fov: 50.0,
            camera_position: Vec3::new(0.0, 0.0, 25.0),
            min_aspect: None,
            max_aspect: None,
            max_fov: None,
            min_pixel_ratio: 1.0,
            max_pixel_ratio: DEFAULT_MAX_PIXEL_RATIO,
            track_parent: true,
        }
    }
}

/// Visibility-gated frame loop owning the camera and surface size
pub struct RenderLifecycle<H: SurfaceHost> {
    host: H,
    options: LifecycleOptions,
    view: View,
    clock: FrameClock,
    intersecting: bool,
    document_hidden: bool,
    running: bool,
    pending_frame: Option<i32>,
    pending_resize: Option<i32>,
    disposed: bool,
}

impl<H: SurfaceHost> RenderLifecycle<H> {
    pub fn new(host: H, options: LifecycleOptions) -> Self {
        let camera = PerspectiveCamera {
            position: options.camera_position,
            fov: options.fov,
            ..Default::default()
        };
        let mut lifecycle = Self {
            host,
            options,
            view: View {
                camera,
                size: ViewSize::default(),
            },
            clock: FrameClock::new(),
            intersecting: false,
            document_hidden: false,
            running: false,
            pending_frame: None,
            pending_resize: None,
            disposed: false,
        };
        lifecycle.measure();
        lifecycle
    }

    // === Visibility ===

    /// Viewport intersection changed
    pub fn set_intersecting(&mut self, intersecting: bool) {
        self.intersecting = intersecting;
        self.update_running();
    }

    /// Document visibility changed (tab switch, minimize)
    pub fn set_document_hidden(&mut self, hidden: bool) {
        self.document_hidden = hidden;
        if self.intersecting {
            self.update_running();
        }
    }

    fn update_running(&mut self) {
        if self.intersecting && !self.document_hidden {
            self.start();
        } else {
            self.stop();
        }
    }

    fn start(&mut self) {
        if self.running || self.disposed {
            return;
        }
        self.running = true;
        self.clock.start();
        self.pending_frame = self.host.request_frame();
        log::debug!("render loop started");
    }

    fn stop(&mut self) {
        if !self.running {
            return;
        }
        if let Some(handle) = self.pending_frame.take() {
            self.host.cancel_frame(handle);
        }
        self.clock.stop();
        self.running = false;
        log::debug!("render loop stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    // === Frame loop ===

    /// Frame callback from the platform at timestamp `now_ms`
    pub fn on_frame<R: RenderHooks>(&mut self, now_ms: f64, hooks: &mut R) {
        self.pending_frame = None;
        if !self.running || self.disposed {
            return;
        }

        let time = self.clock.tick(now_ms);
        hooks.before_render(time, &self.view);
        hooks.render(&self.view);
        hooks.after_render(time, &self.view);

        // Hooks may not stop the loop, but a dispose in between must win
        if self.running && !self.disposed {
            self.pending_frame = self.host.request_frame();
        }
    }

    // === Resize ===

    /// A resize signal arrived; coalesce bursts into one resize
    pub fn on_resize_signal(&mut self) {
        if self.disposed {
            return;
        }
        if let Some(handle) = self.pending_resize.take() {
            self.host.clear_timeout(handle);
        }
        self.pending_resize = self.host.start_timeout(RESIZE_DEBOUNCE_MS);
    }

    /// The debounce timer fired
    pub fn on_resize_timeout<R: RenderHooks>(&mut self, hooks: &mut R) {
        self.pending_resize = None;
        if !self.disposed {
            self.resize(hooks);
        }
    }

    pub fn has_pending_resize(&self) -> bool {
        self.pending_resize.is_some()
    }

    /// Re-measure the container and notify hooks
    pub fn resize<R: RenderHooks>(&mut self, hooks: &mut R) {
        self.measure();
        log::debug!(
            "resized to {}x{} @{} (world {:.2}x{:.2})",
            self.view.size.width,
            self.view.size.height,
            self.view.size.pixel_ratio,
            self.view.size.world_width,
            self.view.size.world_height
        );
        hooks.after_resize(&self.view);
    }

    fn measure(&mut self) {
        let (width, height) = self.host.container_size();
        let width = width.max(1.0) as f32;
        let height = height.max(1.0) as f32;

        let camera = &mut self.view.camera;
        camera.aspect = width / height;
        camera.fov = self.options.fov;
        if let Some(min) = self.options.min_aspect.filter(|&min| camera.aspect < min) {
            camera.fov = fov_for_aspect(self.options.fov, camera.aspect, min);
        } else if let Some(max) = self.options.max_aspect.filter(|&max| camera.aspect > max) {
            camera.fov = fov_for_aspect(self.options.fov, camera.aspect, max);
        }
        if let Some(max_fov) = self.options.max_fov {
            camera.fov = camera.fov.min(max_fov);
        }

        let world = camera.world_size();
        let pixel_ratio = self
            .host
            .device_pixel_ratio()
            .clamp(self.options.min_pixel_ratio, self.options.max_pixel_ratio);

        self.view.size = ViewSize {
            width,
            height,
            ratio: width / height,
            pixel_ratio: pixel_ratio as f32,
            world_width: world.x,
            world_height: world.y,
        };
        self.host.resize_surface(&self.view.size);
    }

    // === Teardown ===

    /// Stop the loop and release every listener; safe to call twice
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.stop();
        if let Some(handle) = self.pending_resize.take() {
            self.host.clear_timeout(handle);
        }
        self.host.release();
        self.disposed = true;
        log::debug!("render lifecycle disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    // === Accessors ===

    pub fn view(&self) -> &View {
        &self.view
    }

    pub fn camera(&self) -> &PerspectiveCamera {
        &self.view.camera
    }

    pub fn options(&self) -> &LifecycleOptions {
        &self.options
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// In-memory host recording every platform call
    #[derive(Debug, Default)]
    pub(crate) struct FakeHost {
        pub next_handle: i32,
        pub frame_requests: u32,
        pub pending_frames: Vec<i32>,
        pub cancelled_frames: Vec<i32>,
        pub timeouts: Vec<i32>,
        pub cleared_timeouts: Vec<i32>,
        pub dpr: f64,
        pub container: (f64, f64),
        pub surface_sizes: Vec<ViewSize>,
        pub released: u32,
    }

    impl FakeHost {
        pub(crate) fn new(width: f64, height: f64, dpr: f64) -> Self {
            Self {
                dpr,
                container: (width, height),
                ..Default::default()
            }
        }
    }

    impl SurfaceHost for FakeHost {
        fn request_frame(&mut self) -> Option<i32> {
            self.next_handle += 1;
            self.frame_requests += 1;
            self.pending_frames.push(self.next_handle);
            Some(self.next_handle)
        }

        fn cancel_frame(&mut self, handle: i32) {
            self.pending_frames.retain(|&h| h != handle);
            self.cancelled_frames.push(handle);
        }

        fn start_timeout(&mut self, _delay_ms: i32) -> Option<i32> {
            self.next_handle += 1;
            self.timeouts.push(self.next_handle);
            Some(self.next_handle)
        }

        fn clear_timeout(&mut self, handle: i32) {
            self.cleared_timeouts.push(handle);
        }

        fn device_pixel_ratio(&self) -> f64 {
            self.dpr
        }

        fn container_size(&self) -> (f64, f64) {
            self.container
        }

        fn resize_surface(&mut self, size: &ViewSize) {
            self.surface_sizes.push(*size);
        }

        fn release(&mut self) {
            self.released += 1;
        }
    }

    #[derive(Debug, Default)]
    struct CountingHooks {
        before: u32,
        renders: u32,
        after: u32,
        resizes: Vec<ViewSize>,
        last_time: FrameTime,
    }

    impl RenderHooks for CountingHooks {
        fn before_render(&mut self, time: FrameTime, _view: &View) {
            self.before += 1;
            self.last_time = time;
        }

        fn render(&mut self, _view: &View) {
            self.renders += 1;
        }

        fn after_render(&mut self, _time: FrameTime, _view: &View) {
            self.after += 1;
        }

        fn after_resize(&mut self, view: &View) {
            self.resizes.push(view.size);
        }
    }

    /// Fire every pending frame once, like one animation-frame turn
    fn pump(lifecycle: &mut RenderLifecycle<FakeHost>, hooks: &mut CountingHooks, now_ms: f64) {
        let pending = std::mem::take(&mut lifecycle.host_mut().pending_frames);
        for _ in pending {
            lifecycle.on_frame(now_ms, hooks);
        }
    }

    fn lifecycle() -> RenderLifecycle<FakeHost> {
        RenderLifecycle::new(FakeHost::new(800.0, 400.0, 1.0), LifecycleOptions::default())
    }

    #[test]
    fn test_never_intersecting_never_renders() {
        let mut lc = lifecycle();
        let mut hooks = CountingHooks::default();
        lc.set_document_hidden(false);
        for t in 0..10 {
            pump(&mut lc, &mut hooks, t as f64 * 16.0);
        }
        assert_eq!(lc.host().frame_requests, 0);
        assert_eq!(hooks.renders, 0);
        assert!(!lc.is_running());
    }

    #[test]
    fn test_intersecting_starts_loop() {
        let mut lc = lifecycle();
        let mut hooks = CountingHooks::default();
        lc.set_intersecting(true);
        assert!(lc.is_running());
        assert_eq!(lc.host().frame_requests, 1);

        pump(&mut lc, &mut hooks, 0.0);
        pump(&mut lc, &mut hooks, 16.0);
        assert_eq!(hooks.before, 2);
        assert_eq!(hooks.renders, 2);
        assert_eq!(hooks.after, 2);
        assert!((hooks.last_time.delta - 0.016).abs() < 1e-6);
        // The loop keeps one request in flight
        assert_eq!(lc.host().pending_frames.len(), 1);
    }

    #[test]
    fn test_leaving_viewport_cancels_pending_frame() {
        let mut lc = lifecycle();
        lc.set_intersecting(true);
        let pending = lc.host().pending_frames.clone();
        lc.set_intersecting(false);

        assert!(!lc.is_running());
        assert_eq!(lc.host().cancelled_frames, pending);
        assert!(lc.host().pending_frames.is_empty());
    }

    #[test]
    fn test_hidden_document_gates_loop() {
        let mut lc = lifecycle();
        lc.set_document_hidden(true);
        lc.set_intersecting(true);
        assert!(!lc.is_running());

        lc.set_document_hidden(false);
        assert!(lc.is_running());

        lc.set_document_hidden(true);
        assert!(!lc.is_running());
        assert_eq!(lc.host().cancelled_frames.len(), 1);
    }

    #[test]
    fn test_visibility_ignored_while_off_screen() {
        let mut lc = lifecycle();
        lc.set_document_hidden(false);
        lc.set_document_hidden(true);
        lc.set_document_hidden(false);
        assert!(!lc.is_running());
        assert_eq!(lc.host().frame_requests, 0);
    }

    #[test]
    fn test_restart_does_not_double_request() {
        let mut lc = lifecycle();
        lc.set_intersecting(true);
        lc.set_intersecting(true);
        assert_eq!(lc.host().frame_requests, 1);
    }

    #[test]
    fn test_stale_frame_after_stop_is_ignored() {
        let mut lc = lifecycle();
        let mut hooks = CountingHooks::default();
        lc.set_intersecting(true);
        lc.set_intersecting(false);
        lc.on_frame(16.0, &mut hooks);
        assert_eq!(hooks.renders, 0);
    }

    #[test]
    fn test_resize_debounce_coalesces_burst() {
        let mut lc = lifecycle();
        let mut hooks = CountingHooks::default();
        lc.on_resize_signal();
        lc.on_resize_signal();
        lc.on_resize_signal();

        let timeouts = lc.host().timeouts.clone();
        assert_eq!(timeouts.len(), 3);
        // Every timer but the last was cleared
        assert_eq!(lc.host().cleared_timeouts, timeouts[..2].to_vec());
        assert!(lc.has_pending_resize());

        lc.host_mut().container = (1000.0, 500.0);
        lc.on_resize_timeout(&mut hooks);
        assert_eq!(hooks.resizes.len(), 1);
        assert_eq!(hooks.resizes[0].width, 1000.0);
        assert!(!lc.has_pending_resize());
    }

    #[test]
    fn test_resize_updates_world_size_and_pixel_ratio() {
        let mut lc = RenderLifecycle::new(FakeHost::new(800.0, 400.0, 3.0), LifecycleOptions::default());
        let mut hooks = CountingHooks::default();
        lc.resize(&mut hooks);

        let size = hooks.resizes[0];
        assert_eq!(size.ratio, 2.0);
        // DPR 3 clamped to the default cap of 2
        assert_eq!(size.pixel_ratio, 2.0);
        let expected_h = 2.0 * (25f32.to_radians()).tan() * 25.0;
        assert!((size.world_height - expected_h).abs() < 1e-3);
        assert!((size.world_width - expected_h * 2.0).abs() < 1e-3);
        assert_eq!(lc.host().surface_sizes.last().unwrap().backing_size(), (1600, 800));
    }

    #[test]
    fn test_min_pixel_ratio_raises_low_dpr() {
        let options = LifecycleOptions {
            min_pixel_ratio: 1.5,
            ..Default::default()
        };
        let lc = RenderLifecycle::new(FakeHost::new(100.0, 100.0, 1.0), options);
        assert_eq!(lc.view().size.pixel_ratio, 1.5);
    }

    #[test]
    fn test_aspect_limits_adjust_fov() {
        let options = LifecycleOptions {
            min_aspect: Some(1.0),
            max_fov: Some(120.0),
            ..Default::default()
        };
        let lc = RenderLifecycle::new(FakeHost::new(400.0, 800.0, 1.0), options);
        assert!(lc.camera().fov > 50.0);
        assert!(lc.camera().fov <= 120.0);

        let wide = RenderLifecycle::new(FakeHost::new(800.0, 400.0, 1.0), LifecycleOptions::default());
        assert_eq!(wide.camera().fov, 50.0);
    }

    #[test]
    fn test_zero_sized_container_stays_finite() {
        let lc = RenderLifecycle::new(FakeHost::new(0.0, 0.0, 1.0), LifecycleOptions::default());
        assert!(lc.view().size.ratio.is_finite());
        assert!(lc.view().size.world_width.is_finite());
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let mut lc = lifecycle();
        let mut hooks = CountingHooks::default();
        lc.set_intersecting(true);
        lc.on_resize_signal();
        lc.dispose();
        lc.dispose();

        assert!(lc.is_disposed());
        assert!(!lc.is_running());
        assert_eq!(lc.host().released, 1);
        assert_eq!(lc.host().cancelled_frames.len(), 1);
        assert_eq!(lc.host().cleared_timeouts.len(), 1);

        // Nothing restarts a disposed loop
        lc.set_intersecting(true);
        pump(&mut lc, &mut hooks, 32.0);
        assert_eq!(hooks.renders, 0);
    }
}
