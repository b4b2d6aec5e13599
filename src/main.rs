//! Ballpit entry point
//!
//! On the web: mounts every `canvas[data-ballpit]` and `#ballpit-container`
//! on the page, and exports `BallpitApp` for explicit control from scripts.
//! Natively: runs a headless simulation and logs its stats.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
mod wasm_app {
    use std::cell::RefCell;

    use wasm_bindgen::prelude::*;
    use web_sys::HtmlCanvasElement;

    use ballpit::BallpitConfig;
    use ballpit::error::BallpitError;
    use ballpit::platform::InputRouter;
    use ballpit::platform::web::{self, MountedBallpit};

    /// Container the marketing pages place the hero animation in
    const CONTAINER_ID: &str = "ballpit-container";
    /// Canvases opting in with a JSON config
    const CANVAS_SELECTOR: &str = "canvas[data-ballpit]";

    thread_local! {
        static ROUTER: InputRouter = web::dom_input_router();
        /// Scenes mounted at startup live as long as the page
        static AUTO_MOUNTED: RefCell<Vec<MountedBallpit>> = const { RefCell::new(Vec::new()) };
    }

    pub fn router() -> InputRouter {
        ROUTER.with(|r| r.clone())
    }

    async fn mount_one(canvas: HtmlCanvasElement, config: BallpitConfig) {
        match web::mount(canvas, &router(), config).await {
            Ok(mounted) => AUTO_MOUNTED.with(|m| m.borrow_mut().push(mounted)),
            Err(e) => log::error!("Failed to mount ballpit: {}", e),
        }
    }

    pub async fn run() -> Result<(), BallpitError> {
        console_error_panic_hook::set_once();
        if console_log::init_with_level(log::Level::Info).is_err() {
            log::warn!("logger already initialised");
        }

        log::info!("Ballpit starting...");

        let document = web_sys::window()
            .and_then(|w| w.document())
            .ok_or(BallpitError::MissingGlobal("document"))?;

        // Opted-in canvases, each with its own config
        let nodes = document.query_selector_all(CANVAS_SELECTOR)?;
        for i in 0..nodes.length() {
            let Some(canvas) = nodes.get(i).and_then(|n| n.dyn_into::<HtmlCanvasElement>().ok()) else {
                continue;
            };
            let json = canvas.get_attribute("data-ballpit").unwrap_or_default();
            match BallpitConfig::from_json(&json) {
                Ok(config) => mount_one(canvas, config).await,
                Err(e) => log::error!("Skipping canvas: {}", e),
            }
        }

        // The hero container, if present
        if let Some(container) = document.get_element_by_id(CONTAINER_ID) {
            let canvas = web::canvas_in(&container)?;
            let json = container.get_attribute("data-ballpit").unwrap_or_default();
            match BallpitConfig::from_json(&json) {
                Ok(config) => mount_one(canvas, config).await,
                Err(e) => log::error!("Skipping #{}: {}", CONTAINER_ID, e),
            }
        }

        let count = AUTO_MOUNTED.with(|m| m.borrow().len());
        log::info!("Ballpit running ({} scene(s))", count);
        Ok(())
    }
}

/// Script-facing handle: `await BallpitApp.mount("#hero", '{"count": 80}')`
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub struct BallpitApp {
    mounted: ballpit::platform::web::MountedBallpit,
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
impl BallpitApp {
    /// Mount onto a canvas, or into a container element, matched by `selector`
    pub async fn mount(selector: String, config_json: Option<String>) -> Result<BallpitApp, JsValue> {
        let config = ballpit::BallpitConfig::from_json(config_json.as_deref().unwrap_or(""))?;
        let canvas = ballpit::platform::web::find_canvas(&selector)?;
        let mounted = ballpit::platform::web::mount(canvas, &wasm_app::router(), config).await?;
        Ok(BallpitApp { mounted })
    }

    pub fn dispose(&self) {
        self.mounted.dispose();
    }

    #[wasm_bindgen(getter)]
    pub fn disposed(&self) -> bool {
        self.mounted.is_disposed()
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub async fn wasm_main() -> Result<(), JsValue> {
    wasm_app::run().await.map_err(Into::into)
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    log::info!("Ballpit (native) starting...");
    log::info!("Rendering requires a browser - build for wasm32 and serve the page");

    println!("\nRunning headless simulation...");
    headless_demo();
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main, this is just to satisfy the compiler
}

/// Settle a pit under gravity with the cursor sweeping across it
#[cfg(not(target_arch = "wasm32"))]
fn headless_demo() {
    use ballpit::BallpitConfig;
    use ballpit::platform::FrameTime;
    use ballpit::sim::Physics;
    use glam::Vec3;

    let config = BallpitConfig::default();
    let mut physics = Physics::new(config.effective_sim(), 1);
    let frames = 600;
    let delta = 1.0 / 60.0;

    for frame in 0..frames {
        let t = frame as f32 * delta;
        physics.set_control(frame % 200 < 150);
        physics.set_center(Vec3::new((t * 0.8).sin() * 8.0, (t * 1.3).cos() * 4.0, 0.0));
        physics.update(FrameTime { elapsed: t, delta });
    }

    let config = physics.config();
    let escaped = (0..physics.count())
        .filter(|&i| {
            let p = physics.position(i);
            let r = physics.radius(i);
            p.x.abs() > config.max_x - r + 1e-3 || p.y < -config.max_y + r - 1e-3
        })
        .count();
    let mean_speed = (0..physics.count()).map(|i| physics.velocity(i).length()).sum::<f32>()
        / physics.count().max(1) as f32;

    log::info!(
        "{} bodies after {} frames: mean speed {:.4}, {} outside bounds",
        physics.count(),
        frames,
        mean_speed,
        escaped
    );
    println!("✓ Simulation settled ({} bodies, {} escaped)", physics.count(), escaped);
}
