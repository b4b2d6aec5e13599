//! Browser bindings (wasm32 only)
//!
//! - `CanvasHost`: animation frames, timers, sizing and observers for one canvas
//! - `DomListeners`: document-level pointer/touch listeners feeding an `InputRouter`
//! - `mount`: builds a complete ballpit on a canvas
//!
//! Every JS callback holds only a `Weak` to its scene, so listeners never keep
//! a disposed scene alive.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use wasm_bindgen::prelude::*;
use web_sys::{
    Element, EventTarget, HtmlCanvasElement, HtmlElement, IntersectionObserver, IntersectionObserverEntry,
    MouseEvent, ResizeObserver, TouchEvent, Window,
};

use super::attached::{Attached, Detach, attach_all};
use super::input::{HitSurface, InputRouter, ListenerBinding, Rect, WeakInputRouter};
use super::lifecycle::SurfaceHost;
use crate::error::BallpitError;
use crate::renderer::{InstanceTarget, SphereRenderState, SphereStyle, ViewSize};
use crate::scene::Ballpit;
use crate::settings::BallpitConfig;

/// Lifecycle entry points invoked from browser callbacks
pub trait LifecycleEvents {
    fn on_frame(&mut self, now_ms: f64);
    fn set_intersecting(&mut self, intersecting: bool);
    fn set_document_hidden(&mut self, hidden: bool);
    fn on_resize_signal(&mut self);
    fn on_resize_timeout(&mut self);
}

impl<H: SurfaceHost, T: InstanceTarget> LifecycleEvents for Ballpit<H, T> {
    fn on_frame(&mut self, now_ms: f64) {
        Ballpit::on_frame(self, now_ms);
    }

    fn set_intersecting(&mut self, intersecting: bool) {
        Ballpit::set_intersecting(self, intersecting);
    }

    fn set_document_hidden(&mut self, hidden: bool) {
        Ballpit::set_document_hidden(self, hidden);
    }

    fn on_resize_signal(&mut self) {
        Ballpit::on_resize_signal(self);
    }

    fn on_resize_timeout(&mut self) {
        Ballpit::on_resize_timeout(self);
    }
}

/// Slot filled with the scene once it exists
type SceneLink = Rc<RefCell<Option<Weak<RefCell<dyn LifecycleEvents>>>>>;

fn with_scene(link: &SceneLink, f: impl FnOnce(&mut dyn LifecycleEvents)) {
    let scene = link.borrow().as_ref().and_then(Weak::upgrade);
    if let Some(scene) = scene {
        match scene.try_borrow_mut() {
            Ok(mut scene) => f(&mut *scene),
            Err(_) => log::warn!("scene busy, dropping callback"),
        }
    }
}

impl HitSurface for Element {
    fn bounds(&self) -> Rect {
        let r = self.get_bounding_client_rect();
        Rect::new(r.left(), r.top(), r.width(), r.height())
    }
}

fn window() -> Result<Window, BallpitError> {
    web_sys::window().ok_or(BallpitError::MissingGlobal("window"))
}

type EventClosure = Closure<dyn FnMut(web_sys::Event)>;

struct Listener {
    target: EventTarget,
    event: &'static str,
    closure: EventClosure,
}

impl Listener {
    fn add(
        target: EventTarget,
        event: &'static str,
        closure: EventClosure,
    ) -> Result<Self, BallpitError> {
        target.add_event_listener_with_callback(event, closure.as_ref().unchecked_ref())?;
        Ok(Self { target, event, closure })
    }
}

impl Detach for Listener {
    fn detach(&mut self) {
        let _ = self
            .target
            .remove_event_listener_with_callback(self.event, self.closure.as_ref().unchecked_ref());
    }
}

/// Observer plus the callback it invokes
struct Watch<O> {
    observer: O,
    _closure: Closure<dyn FnMut(js_sys::Array)>,
}

impl Detach for Watch<IntersectionObserver> {
    fn detach(&mut self) {
        self.observer.disconnect();
    }
}

impl Detach for Watch<ResizeObserver> {
    fn detach(&mut self) {
        self.observer.disconnect();
    }
}

// ============================================================================
// CANVAS HOST
// ============================================================================

pub struct CanvasHost {
    window: Window,
    canvas: HtmlCanvasElement,
    track_parent: bool,
    link: SceneLink,
    frame_callback: Closure<dyn FnMut(f64)>,
    timeout_callback: Closure<dyn FnMut()>,
    listeners: Vec<Attached<Listener>>,
    intersection: Option<Attached<Watch<IntersectionObserver>>>,
    resize_observer: Option<Attached<Watch<ResizeObserver>>>,
}

impl CanvasHost {
    pub fn new(canvas: HtmlCanvasElement, track_parent: bool) -> Result<Self, BallpitError> {
        let link: SceneLink = Rc::new(RefCell::new(None));

        let frame_callback = {
            let link = link.clone();
            Closure::<dyn FnMut(f64)>::new(move |now_ms: f64| {
                with_scene(&link, |scene| scene.on_frame(now_ms));
            })
        };
        let timeout_callback = {
            let link = link.clone();
            Closure::<dyn FnMut()>::new(move || {
                with_scene(&link, |scene| scene.on_resize_timeout());
            })
        };

        Ok(Self {
            window: window()?,
            canvas,
            track_parent,
            link,
            frame_callback,
            timeout_callback,
            listeners: Vec::new(),
            intersection: None,
            resize_observer: None,
        })
    }

    fn link(&self) -> SceneLink {
        self.link.clone()
    }

    /// Install visibility and resize observation
    ///
    /// Returns `false` when viewport intersection cannot be observed; the
    /// caller should then treat the canvas as always intersecting.
    pub fn bind(&mut self) -> Result<bool, BallpitError> {
        let document = self
            .window
            .document()
            .ok_or(BallpitError::MissingGlobal("document"))?;

        // Tab visibility
        {
            let link = self.link();
            let doc = document.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
                let hidden = doc.hidden();
                with_scene(&link, |scene| scene.set_document_hidden(hidden));
            });
            let listener = Listener::add(document.into(), "visibilitychange", closure)?;
            self.listeners.push(Attached::new(listener));
        }

        // Window resize
        {
            let link = self.link();
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
                with_scene(&link, |scene| scene.on_resize_signal());
            });
            let listener = Listener::add(self.window.clone().into(), "resize", closure)?;
            self.listeners.push(Attached::new(listener));
        }

        // Parent element size
        if self.track_parent {
            if let Some(parent) = self.canvas.parent_element() {
                let link = self.link();
                let closure = Closure::<dyn FnMut(_)>::new(move |_entries: js_sys::Array| {
                    with_scene(&link, |scene| scene.on_resize_signal());
                });
                match ResizeObserver::new(closure.as_ref().unchecked_ref()) {
                    Ok(observer) => {
                        observer.observe(&parent);
                        self.resize_observer = Some(Attached::new(Watch {
                            observer,
                            _closure: closure,
                        }));
                    }
                    Err(e) => log::warn!("ResizeObserver unavailable, using window resize only: {:?}", e),
                }
            }
        }

        // Viewport intersection
        let link = self.link();
        let closure = Closure::<dyn FnMut(_)>::new(move |entries: js_sys::Array| {
            let latest = entries
                .iter()
                .filter_map(|e| e.dyn_into::<IntersectionObserverEntry>().ok())
                .last();
            if let Some(entry) = latest {
                let intersecting = entry.is_intersecting();
                with_scene(&link, |scene| scene.set_intersecting(intersecting));
            }
        });
        match IntersectionObserver::new(closure.as_ref().unchecked_ref()) {
            Ok(observer) => {
                observer.observe(&self.canvas);
                self.intersection = Some(Attached::new(Watch {
                    observer,
                    _closure: closure,
                }));
                Ok(true)
            }
            Err(e) => {
                log::warn!("IntersectionObserver unavailable, rendering unconditionally: {:?}", e);
                Ok(false)
            }
        }
    }

    fn window_size(&self) -> (f64, f64) {
        let w = self.window.inner_width().ok().and_then(|v| v.as_f64()).unwrap_or(0.0);
        let h = self.window.inner_height().ok().and_then(|v| v.as_f64()).unwrap_or(0.0);
        (w, h)
    }
}

impl SurfaceHost for CanvasHost {
    fn request_frame(&mut self) -> Option<i32> {
        self.window
            .request_animation_frame(self.frame_callback.as_ref().unchecked_ref())
            .ok()
    }

    fn cancel_frame(&mut self, handle: i32) {
        let _ = self.window.cancel_animation_frame(handle);
    }

    fn start_timeout(&mut self, delay_ms: i32) -> Option<i32> {
        self.window
            .set_timeout_with_callback_and_timeout_and_arguments_0(
                self.timeout_callback.as_ref().unchecked_ref(),
                delay_ms,
            )
            .ok()
    }

    fn clear_timeout(&mut self, handle: i32) {
        self.window.clear_timeout_with_handle(handle);
    }

    fn device_pixel_ratio(&self) -> f64 {
        self.window.device_pixel_ratio()
    }

    fn container_size(&self) -> (f64, f64) {
        if self.track_parent {
            let parent = self
                .canvas
                .parent_element()
                .and_then(|p| p.dyn_into::<HtmlElement>().ok());
            if let Some(parent) = parent {
                let size = (parent.offset_width() as f64, parent.offset_height() as f64);
                if size.0 > 0.0 && size.1 > 0.0 {
                    return size;
                }
            }
        }
        self.window_size()
    }

    fn resize_surface(&mut self, size: &ViewSize) {
        let (w, h) = size.backing_size();
        self.canvas.set_width(w);
        self.canvas.set_height(h);
        let style = self.canvas.style();
        let _ = style.set_property("width", &format!("{}px", size.width));
        let _ = style.set_property("height", &format!("{}px", size.height));
    }

    fn release(&mut self) {
        self.listeners.clear();
        self.intersection = None;
        self.resize_observer = None;
        log::debug!("canvas host released");
    }
}

// ============================================================================
// DOCUMENT POINTER LISTENERS
// ============================================================================

/// Pointer/touch listeners on `document.body`
///
/// Touch listeners stay passive (no `preventDefault`) so the page keeps
/// scrolling over the animation.
#[derive(Default)]
pub struct DomListeners {
    listeners: Vec<Attached<Listener>>,
}

impl DomListeners {
    pub fn new() -> Self {
        Self::default()
    }

    fn install(&mut self, router: WeakInputRouter) -> Result<(), BallpitError> {
        let body: EventTarget = window()?
            .document()
            .ok_or(BallpitError::MissingGlobal("document"))?
            .body()
            .ok_or(BallpitError::MissingGlobal("document.body"))?
            .into();

        let on_mouse = |router: WeakInputRouter, f: fn(&InputRouter, f64, f64)| {
            Closure::<dyn FnMut(_)>::new(move |event: web_sys::Event| {
                if let (Some(router), Some(event)) = (router.upgrade(), event.dyn_ref::<MouseEvent>()) {
                    f(&router, event.client_x() as f64, event.client_y() as f64);
                }
            })
        };
        let on_touch = |router: WeakInputRouter, f: fn(&InputRouter, f64, f64)| {
            Closure::<dyn FnMut(_)>::new(move |event: web_sys::Event| {
                let touch = event
                    .dyn_ref::<TouchEvent>()
                    .and_then(|e| e.touches().get(0));
                if let (Some(router), Some(touch)) = (router.upgrade(), touch) {
                    f(&router, touch.client_x() as f64, touch.client_y() as f64);
                }
            })
        };
        let on_plain = |router: WeakInputRouter, f: fn(&InputRouter)| {
            Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
                if let Some(router) = router.upgrade() {
                    f(&router);
                }
            })
        };

        let closures: [(&'static str, EventClosure); 6] = [
            ("pointermove", on_mouse(router.clone(), InputRouter::pointer_moved)),
            ("pointerleave", on_plain(router.clone(), InputRouter::pointer_left)),
            ("click", on_mouse(router.clone(), InputRouter::clicked)),
            ("touchstart", on_touch(router.clone(), InputRouter::touch_started)),
            ("touchmove", on_touch(router.clone(), InputRouter::touch_moved)),
            ("touchend", on_plain(router, InputRouter::touch_ended)),
        ];
        self.listeners = attach_all(closures, |(event, closure)| Listener::add(body.clone(), event, closure))?;
        Ok(())
    }
}

impl ListenerBinding for DomListeners {
    fn attach(&mut self, router: WeakInputRouter) {
        if let Err(e) = self.install(router) {
            log::error!("failed to attach pointer listeners: {}", e);
        } else {
            log::debug!("pointer listeners attached");
        }
    }

    fn detach(&mut self) {
        self.listeners.clear();
        log::debug!("pointer listeners detached");
    }
}

/// Router fed by `document.body` pointer/touch events
pub fn dom_input_router() -> InputRouter {
    InputRouter::with_binding(DomListeners::new())
}

// ============================================================================
// MOUNTING
// ============================================================================

/// Existing `<canvas>` inside `container`, or a new one appended to it
pub fn canvas_in(container: &Element) -> Result<HtmlCanvasElement, BallpitError> {
    if let Some(existing) = container.query_selector("canvas")? {
        return existing
            .dyn_into::<HtmlCanvasElement>()
            .map_err(|_| BallpitError::NotACanvas("canvas".into()));
    }

    let document = container
        .owner_document()
        .ok_or(BallpitError::MissingGlobal("document"))?;
    let canvas = document
        .create_element("canvas")?
        .dyn_into::<HtmlCanvasElement>()
        .map_err(|_| BallpitError::NotACanvas("canvas".into()))?;
    let style = canvas.style();
    style.set_property("display", "block")?;
    style.set_property("width", "100%")?;
    style.set_property("height", "100%")?;
    container.append_child(&canvas)?;
    Ok(canvas)
}

/// Resolve a selector to a canvas: the element itself or a canvas inside it
pub fn find_canvas(selector: &str) -> Result<HtmlCanvasElement, BallpitError> {
    let document = window()?
        .document()
        .ok_or(BallpitError::MissingGlobal("document"))?;
    let element = document
        .query_selector(selector)?
        .ok_or_else(|| BallpitError::MissingElement(selector.to_string()))?;
    match element.dyn_into::<HtmlCanvasElement>() {
        Ok(canvas) => Ok(canvas),
        Err(element) => canvas_in(&element),
    }
}

/// A ballpit running on a page canvas
///
/// Dropping it disposes the scene.
pub struct MountedBallpit {
    scene: Rc<RefCell<Ballpit<CanvasHost, SphereRenderState>>>,
}

impl MountedBallpit {
    pub fn dispose(&self) {
        self.scene.borrow_mut().dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.scene.borrow().is_disposed()
    }

    pub fn scene(&self) -> &Rc<RefCell<Ballpit<CanvasHost, SphereRenderState>>> {
        &self.scene
    }
}

/// Build a ballpit on `canvas`, register it with `router` and start observing
pub async fn mount(
    canvas: HtmlCanvasElement,
    router: &InputRouter,
    config: BallpitConfig,
) -> Result<MountedBallpit, BallpitError> {
    let options = config.lifecycle_options();
    let mut host = CanvasHost::new(canvas.clone(), options.track_parent)?;
    let link = host.link();

    let (css_w, css_h) = host.container_size();
    let dpr = host
        .device_pixel_ratio()
        .clamp(options.min_pixel_ratio, options.max_pixel_ratio);
    let lighting = &config.lighting;
    let style = SphereStyle {
        material: lighting.material_params,
        ambient: lighting.ambient_color.to_linear() * lighting.ambient_intensity,
        segments: config.quality.sphere_segments(),
    };
    let target = SphereRenderState::from_canvas(
        canvas.clone(),
        (css_w * dpr).round().max(1.0) as u32,
        (css_h * dpr).round().max(1.0) as u32,
        style,
    )
    .await?;

    let observing = host.bind()?;
    let seed = js_sys::Date::now() as u64;
    let surface: Element = canvas.into();
    let scene = Rc::new(RefCell::new(Ballpit::new(host, target, router, surface, &config, seed)));

    let events: Rc<RefCell<dyn LifecycleEvents>> = scene.clone();
    *link.borrow_mut() = Some(Rc::downgrade(&events));

    if !observing {
        scene.borrow_mut().set_intersecting(true);
    }

    log::info!("ballpit mounted ({} bodies)", scene.borrow().physics().count());
    Ok(MountedBallpit { scene })
}
