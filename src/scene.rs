//! Ballpit scene
//!
//! Wires one physics pit, its instance batch and a render target into a
//! visibility-gated render loop, and feeds it pointer input from the shared
//! router.

use std::cell::Cell;
use std::rc::Rc;

use glam::{Vec2, Vec3};

use crate::platform::{
    FrameTime, HitSurface, InputRouter, PointerHandler, PointerRegistration, PointerState, RenderHooks,
    RenderLifecycle, SurfaceHost,
};
use crate::renderer::{BodyInstances, InstanceTarget, View};
use crate::settings::BallpitConfig;
use crate::sim::Physics;

/// Latest pointer position (NDC) handed from input callbacks to the next frame
///
/// `None` while the pointer is outside the surface.
#[derive(Debug, Clone, Default)]
pub struct PointerTarget(Rc<Cell<Option<Vec2>>>);

impl PointerTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<Vec2> {
        self.0.get()
    }

    pub fn set(&self, ndc: Option<Vec2>) {
        self.0.set(ndc);
    }
}

impl PointerHandler for PointerTarget {
    fn on_move(&mut self, state: &PointerState) {
        self.set(Some(state.normalized));
    }

    fn on_leave(&mut self, _state: &PointerState) {
        self.set(None);
    }
}

/// Everything the frame hooks touch
struct SceneContent<T> {
    physics: Physics,
    instances: BodyInstances,
    target: T,
    pointer: PointerTarget,
}

impl<T: InstanceTarget> RenderHooks for SceneContent<T> {
    fn before_render(&mut self, time: FrameTime, view: &View) {
        match self.pointer.get() {
            Some(ndc) => {
                let ray = view.camera.unproject_ray(ndc);
                if let Some(point) = ray.intersect_plane(Vec3::Z, 0.0) {
                    self.physics.set_center(point);
                }
                self.physics.set_control(true);
            }
            None => self.physics.set_control(false),
        }
        self.physics.update(time);
        self.instances.update(&self.physics);
    }

    fn render(&mut self, view: &View) {
        self.instances.commit(&mut self.target);
        self.target.render(view);
    }

    fn after_resize(&mut self, view: &View) {
        self.physics
            .set_bounds(view.size.world_width / 2.0, view.size.world_height / 2.0);
        self.target.resize(view);
    }
}

/// One mounted ballpit
pub struct Ballpit<H: SurfaceHost, T: InstanceTarget> {
    lifecycle: RenderLifecycle<H>,
    content: SceneContent<T>,
    registration: PointerRegistration,
    disposed: bool,
}

impl<H: SurfaceHost, T: InstanceTarget> Ballpit<H, T> {
    /// Build the scene and register `surface` with the shared router
    ///
    /// The loop stays idle until the host reports the surface as intersecting.
    pub fn new(
        host: H,
        target: T,
        router: &InputRouter,
        surface: impl HitSurface + 'static,
        config: &BallpitConfig,
        seed: u64,
    ) -> Self {
        let sim = config.effective_sim();
        let count = sim.count;
        let physics = Physics::new(sim, seed);

        let mut instances = BodyInstances::new(count, config.follow_cursor, config.lighting.light_intensity);
        instances.set_colors(&config.color_ramp());
        instances.update(&physics);

        let pointer = PointerTarget::new();
        let registration = router.register(surface, pointer.clone());

        let mut scene = Self {
            lifecycle: RenderLifecycle::new(host, config.lifecycle_options()),
            content: SceneContent {
                physics,
                instances,
                target,
                pointer,
            },
            registration,
            disposed: false,
        };
        scene.lifecycle.resize(&mut scene.content);

        log::info!(
            "ballpit created: {} bodies, seed {}, {:?}",
            count,
            seed,
            config.sim.collision_model
        );
        scene
    }

    // === Platform callbacks ===

    pub fn on_frame(&mut self, now_ms: f64) {
        self.lifecycle.on_frame(now_ms, &mut self.content);
    }

    pub fn set_intersecting(&mut self, intersecting: bool) {
        self.lifecycle.set_intersecting(intersecting);
    }

    pub fn set_document_hidden(&mut self, hidden: bool) {
        self.lifecycle.set_document_hidden(hidden);
    }

    pub fn on_resize_signal(&mut self) {
        self.lifecycle.on_resize_signal();
    }

    pub fn on_resize_timeout(&mut self) {
        self.lifecycle.on_resize_timeout(&mut self.content);
    }

    /// Re-measure immediately, bypassing the debounce
    pub fn resize(&mut self) {
        if !self.disposed {
            self.lifecycle.resize(&mut self.content);
        }
    }

    /// Tear down input, loop and GPU target; safe to call twice
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.registration.dispose();
        self.lifecycle.dispose();
        self.content.target.release();
        self.disposed = true;
        log::info!("ballpit disposed");
    }

    // === Accessors ===

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }

    pub fn physics(&self) -> &Physics {
        &self.content.physics
    }

    pub fn physics_mut(&mut self) -> &mut Physics {
        &mut self.content.physics
    }

    pub fn instances(&self) -> &BodyInstances {
        &self.content.instances
    }

    pub fn target(&self) -> &T {
        &self.content.target
    }

    pub fn pointer(&self) -> &PointerTarget {
        &self.content.pointer
    }

    pub fn lifecycle(&self) -> &RenderLifecycle<H> {
        &self.lifecycle
    }

    pub fn view(&self) -> &View {
        self.lifecycle.view()
    }
}

impl<H: SurfaceHost, T: InstanceTarget> Drop for Ballpit<H, T> {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::Rect;
    use crate::platform::lifecycle::tests::FakeHost;
    use crate::renderer::{AccentLight, SphereInstance};
    use crate::sim::SimConfig;

    #[derive(Debug, Default)]
    struct FakeTarget {
        uploads: u32,
        last_batch: Vec<SphereInstance>,
        light: Option<AccentLight>,
        renders: u32,
        resizes: Vec<View>,
        released: u32,
    }

    impl InstanceTarget for FakeTarget {
        fn upload(&mut self, instances: &[SphereInstance]) {
            assert_eq!(self.released, 0, "upload after release");
            self.uploads += 1;
            self.last_batch = instances.to_vec();
        }

        fn set_accent_light(&mut self, light: &AccentLight) {
            self.light = Some(*light);
        }

        fn render(&mut self, _view: &View) {
            assert_eq!(self.released, 0, "draw after release");
            self.renders += 1;
        }

        fn resize(&mut self, view: &View) {
            assert_eq!(self.released, 0, "resize after release");
            self.resizes.push(*view);
        }

        fn release(&mut self) {
            self.released += 1;
        }
    }

    const SURFACE: Rect = Rect {
        left: 0.0,
        top: 0.0,
        width: 800.0,
        height: 400.0,
    };

    fn config() -> BallpitConfig {
        BallpitConfig {
            sim: SimConfig {
                count: 10,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn scene(router: &InputRouter) -> Ballpit<FakeHost, FakeTarget> {
        Ballpit::new(
            FakeHost::new(800.0, 400.0, 1.0),
            FakeTarget::default(),
            router,
            SURFACE,
            &config(),
            42,
        )
    }

    /// Fire the pending frame at `now_ms`
    fn frame(scene: &mut Ballpit<FakeHost, FakeTarget>, now_ms: f64) {
        scene.on_frame(now_ms);
    }

    #[test]
    fn test_new_sizes_bounds_from_view() {
        let router = InputRouter::new();
        let scene = scene(&router);
        let size = scene.view().size;
        let config = scene.physics().config();
        assert!((config.max_x - size.world_width / 2.0).abs() < 1e-5);
        assert!((config.max_y - size.world_height / 2.0).abs() < 1e-5);
        assert_eq!(scene.target().resizes.len(), 1);
        assert_eq!(router.len(), 1);
        assert_eq!(scene.instances().len(), 10);
    }

    #[test]
    fn test_idle_until_intersecting() {
        let router = InputRouter::new();
        let mut scene = scene(&router);
        for t in 0..5 {
            frame(&mut scene, t as f64 * 16.0);
        }
        assert_eq!(scene.target().renders, 0);
        assert!(!scene.is_running());

        scene.set_intersecting(true);
        frame(&mut scene, 100.0);
        frame(&mut scene, 116.0);
        assert_eq!(scene.target().renders, 2);
        assert_eq!(scene.target().last_batch.len(), 10);
        assert!(scene.target().light.is_some());
    }

    #[test]
    fn test_pointer_drives_controlled_sphere() {
        let router = InputRouter::new();
        let mut scene = scene(&router);
        scene.set_intersecting(true);

        // Upper-right quadrant center -> NDC (0.5, 0.5)
        router.pointer_moved(600.0, 100.0);
        assert_eq!(scene.pointer().get(), Some(Vec2::new(0.5, 0.5)));

        let start = scene.physics().position(0);
        frame(&mut scene, 0.0);
        assert!(scene.physics().is_controlled());

        let size = scene.view().size;
        let expected = Vec3::new(size.world_width / 4.0, size.world_height / 4.0, 0.0);
        assert!((scene.physics().center() - expected).length() < 1e-2);
        let moved = scene.physics().position(0);
        assert!((moved - start.lerp(expected, 0.1)).length() < 1e-2);
        assert_eq!(scene.physics().velocity(0), Vec3::ZERO);
    }

    #[test]
    fn test_pointer_leave_releases_control() {
        let router = InputRouter::new();
        let mut scene = scene(&router);
        scene.set_intersecting(true);

        router.pointer_moved(400.0, 200.0);
        frame(&mut scene, 0.0);
        assert!(scene.physics().is_controlled());

        router.pointer_moved(900.0, 200.0);
        assert_eq!(scene.pointer().get(), None);
        frame(&mut scene, 16.0);
        assert!(!scene.physics().is_controlled());
    }

    #[test]
    fn test_touch_end_releases_control() {
        let router = InputRouter::new();
        let mut scene = scene(&router);
        scene.set_intersecting(true);

        router.touch_started(100.0, 100.0);
        frame(&mut scene, 0.0);
        assert!(scene.physics().is_controlled());

        router.touch_ended();
        frame(&mut scene, 16.0);
        assert!(!scene.physics().is_controlled());
    }

    #[test]
    fn test_debounced_resize_updates_bounds() {
        let router = InputRouter::new();
        let mut scene = scene(&router);
        let before = scene.physics().config().max_x;

        scene.on_resize_signal();
        scene.on_resize_signal();
        // Container shrank to half width
        scene.lifecycle.host_mut().container = (400.0, 400.0);
        scene.on_resize_timeout();

        assert_eq!(scene.target().resizes.len(), 2);
        assert!((scene.physics().config().max_x - before / 2.0).abs() < 1e-4);
    }

    #[test]
    fn test_dispose_tears_everything_down_once() {
        let router = InputRouter::new();
        let mut scene = scene(&router);
        scene.set_intersecting(true);

        scene.dispose();
        scene.dispose();
        assert!(scene.is_disposed());
        assert!(router.is_empty());
        assert_eq!(scene.lifecycle().host().released, 1);
        assert_eq!(scene.target().released, 1);

        // A stale frame after disposal renders nothing
        frame(&mut scene, 16.0);
        assert_eq!(scene.target().renders, 0);
    }

    #[test]
    fn test_released_target_is_never_touched_again() {
        let router = InputRouter::new();
        let mut scene = scene(&router);
        scene.set_intersecting(true);
        frame(&mut scene, 0.0);
        let uploads = scene.target().uploads;
        let resizes = scene.target().resizes.len();

        scene.on_resize_signal();
        scene.dispose();
        // Late platform callbacks racing the teardown
        scene.on_resize_timeout();
        scene.resize();
        frame(&mut scene, 16.0);
        scene.set_intersecting(true);
        frame(&mut scene, 32.0);

        assert_eq!(scene.target().released, 1);
        assert_eq!(scene.target().uploads, uploads);
        assert_eq!(scene.target().renders, 1);
        assert_eq!(scene.target().resizes.len(), resizes);
    }

    #[test]
    fn test_drop_unregisters_pointer_surface() {
        let router = InputRouter::new();
        {
            let _scene = scene(&router);
            assert_eq!(router.len(), 1);
        }
        assert!(router.is_empty());
    }

    #[test]
    fn test_scenes_share_router() {
        let router = InputRouter::new();
        let mut left = scene(&router);
        let mut right = Ballpit::new(
            FakeHost::new(800.0, 400.0, 1.0),
            FakeTarget::default(),
            &router,
            Rect::new(1000.0, 0.0, 800.0, 400.0),
            &config(),
            7,
        );
        assert_eq!(router.len(), 2);

        router.pointer_moved(1400.0, 200.0);
        assert_eq!(left.pointer().get(), None);
        assert_eq!(right.pointer().get(), Some(Vec2::ZERO));

        left.dispose();
        assert_eq!(router.len(), 1);
        right.dispose();
        assert!(router.is_empty());
    }

    #[test]
    fn test_hidden_cursor_sphere_not_drawn() {
        let router = InputRouter::new();
        let config = BallpitConfig {
            follow_cursor: false,
            ..config()
        };
        let mut scene = Ballpit::new(
            FakeHost::new(800.0, 400.0, 1.0),
            FakeTarget::default(),
            &router,
            SURFACE,
            &config,
            1,
        );
        scene.set_intersecting(true);
        frame(&mut scene, 0.0);
        assert_eq!(scene.target().last_batch[0].scale, 0.0);
        assert!(scene.target().last_batch[1].scale > 0.0);
    }
}
