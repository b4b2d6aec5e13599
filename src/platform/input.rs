//! Shared pointer input
//!
//! One set of document-level listeners feeds every registered surface. Each
//! event is hit-tested against the current bounds of every surface, so
//! overlapping or scrolled canvases all see consistent enter/move/leave
//! sequences.
//!
//! Handlers run while the registry is borrowed: they must not register,
//! dispose or feed events back into the router.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use glam::Vec2;

/// Client-space rectangle in CSS pixels
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self { left, top, width, height }
    }

    /// Inclusive containment test
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.left && x <= self.left + self.width && y >= self.top && y <= self.top + self.height
    }
}

/// Anything that can report its on-screen bounds
pub trait HitSurface {
    fn bounds(&self) -> Rect;
}

impl HitSurface for Rect {
    fn bounds(&self) -> Rect {
        *self
    }
}

/// Per-surface pointer state
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PointerState {
    /// Position relative to the surface's top-left corner (px)
    pub position: Vec2,
    /// Normalized device coordinates, Y up, [-1, 1] inside the surface
    pub normalized: Vec2,
    pub hover: bool,
    pub touching: bool,
}

impl PointerState {
    fn track(&mut self, rect: &Rect, x: f64, y: f64) {
        let px = (x - rect.left) as f32;
        let py = (y - rect.top) as f32;
        let w = rect.width.max(f64::EPSILON) as f32;
        let h = rect.height.max(f64::EPSILON) as f32;
        self.position = Vec2::new(px, py);
        self.normalized = Vec2::new(px / w * 2.0 - 1.0, -py / h * 2.0 + 1.0);
    }
}

/// Callbacks for one registered surface
pub trait PointerHandler {
    fn on_enter(&mut self, _state: &PointerState) {}
    fn on_move(&mut self, _state: &PointerState) {}
    fn on_leave(&mut self, _state: &PointerState) {}
    fn on_click(&mut self, _state: &PointerState) {}
}

/// Installs and removes the global listeners feeding a router
pub trait ListenerBinding {
    fn attach(&mut self, router: WeakInputRouter);
    fn detach(&mut self);
}

struct Entry {
    id: u64,
    surface: Box<dyn HitSurface>,
    handler: Box<dyn PointerHandler>,
    state: PointerState,
}

#[derive(Default)]
struct RouterState {
    entries: Vec<Entry>,
    next_id: u64,
    binding: Option<Box<dyn ListenerBinding>>,
    attached: bool,
}

/// Cheaply cloneable handle to the shared registry
#[derive(Clone, Default)]
pub struct InputRouter {
    inner: Rc<RefCell<RouterState>>,
}

/// Non-owning router handle held by listener closures
#[derive(Clone, Default)]
pub struct WeakInputRouter {
    inner: Weak<RefCell<RouterState>>,
}

impl WeakInputRouter {
    pub fn upgrade(&self) -> Option<InputRouter> {
        self.inner.upgrade().map(|inner| InputRouter { inner })
    }
}

impl InputRouter {
    /// Router without global listeners; events are fed by hand
    pub fn new() -> Self {
        Self::default()
    }

    /// Router whose listeners are attached on first registration
    pub fn with_binding(binding: impl ListenerBinding + 'static) -> Self {
        let router = Self::new();
        router.inner.borrow_mut().binding = Some(Box::new(binding));
        router
    }

    pub fn downgrade(&self) -> WeakInputRouter {
        WeakInputRouter {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Add a surface; it receives events until the returned guard is disposed or dropped
    pub fn register(
        &self,
        surface: impl HitSurface + 'static,
        handler: impl PointerHandler + 'static,
    ) -> PointerRegistration {
        let id = {
            let mut state = self.inner.borrow_mut();
            let id = state.next_id;
            state.next_id += 1;
            state.entries.push(Entry {
                id,
                surface: Box::new(surface),
                handler: Box::new(handler),
                state: PointerState::default(),
            });
            id
        };
        self.sync_listeners();
        log::debug!("pointer surface {} registered", id);

        PointerRegistration {
            router: self.downgrade(),
            id,
            disposed: false,
        }
    }

    fn unregister(&self, id: u64) {
        self.inner.borrow_mut().entries.retain(|e| e.id != id);
        self.sync_listeners();
        log::debug!("pointer surface {} unregistered", id);
    }

    /// Attach listeners while anything is registered, detach once empty
    fn sync_listeners(&self) {
        let (want, binding) = {
            let mut state = self.inner.borrow_mut();
            let want = !state.entries.is_empty();
            if want == state.attached {
                return;
            }
            state.attached = want;
            (want, state.binding.take())
        };

        // Call out without holding the borrow
        if let Some(mut binding) = binding {
            if want {
                binding.attach(self.downgrade());
            } else {
                binding.detach();
            }
            self.inner.borrow_mut().binding = Some(binding);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Global listeners are installed
    pub fn is_listening(&self) -> bool {
        self.inner.borrow().attached
    }

    // === Events (client coordinates) ===

    pub fn pointer_moved(&self, x: f64, y: f64) {
        let mut state = self.inner.borrow_mut();
        for entry in &mut state.entries {
            let rect = entry.surface.bounds();
            if rect.contains(x, y) {
                entry.state.track(&rect, x, y);
                if !entry.state.hover {
                    entry.state.hover = true;
                    entry.handler.on_enter(&entry.state);
                }
                entry.handler.on_move(&entry.state);
            } else if entry.state.hover {
                entry.state.hover = false;
                entry.handler.on_leave(&entry.state);
            }
        }
    }

    /// The pointer left the document
    pub fn pointer_left(&self) {
        let mut state = self.inner.borrow_mut();
        for entry in &mut state.entries {
            if entry.state.hover {
                entry.state.hover = false;
                entry.handler.on_leave(&entry.state);
            }
        }
    }

    pub fn touch_started(&self, x: f64, y: f64) {
        let mut state = self.inner.borrow_mut();
        for entry in &mut state.entries {
            let rect = entry.surface.bounds();
            if !rect.contains(x, y) {
                continue;
            }
            entry.state.touching = true;
            entry.state.track(&rect, x, y);
            if !entry.state.hover {
                entry.state.hover = true;
                entry.handler.on_enter(&entry.state);
            }
            entry.handler.on_move(&entry.state);
        }
    }

    /// Like `pointer_moved`, but a drag that started on a surface keeps
    /// reporting moves after the finger leaves it
    pub fn touch_moved(&self, x: f64, y: f64) {
        let mut state = self.inner.borrow_mut();
        for entry in &mut state.entries {
            let rect = entry.surface.bounds();
            let inside = rect.contains(x, y);
            if inside || entry.state.touching {
                entry.state.track(&rect, x, y);
                if inside && !entry.state.hover {
                    entry.state.hover = true;
                    entry.handler.on_enter(&entry.state);
                }
                entry.handler.on_move(&entry.state);
            } else if entry.state.hover {
                entry.state.hover = false;
                entry.handler.on_leave(&entry.state);
            }
        }
    }

    pub fn touch_ended(&self) {
        let mut state = self.inner.borrow_mut();
        for entry in &mut state.entries {
            if !entry.state.touching {
                continue;
            }
            entry.state.touching = false;
            if entry.state.hover {
                entry.state.hover = false;
                entry.handler.on_leave(&entry.state);
            }
        }
    }

    pub fn clicked(&self, x: f64, y: f64) {
        let mut state = self.inner.borrow_mut();
        for entry in &mut state.entries {
            let rect = entry.surface.bounds();
            if rect.contains(x, y) {
                entry.state.track(&rect, x, y);
                entry.handler.on_click(&entry.state);
            }
        }
    }

    /// Snapshot of a registration's pointer state
    pub fn state_of(&self, registration: &PointerRegistration) -> Option<PointerState> {
        self.inner
            .borrow()
            .entries
            .iter()
            .find(|e| e.id == registration.id)
            .map(|e| e.state)
    }
}

/// Removes its surface from the router when disposed or dropped
#[must_use = "dropping the registration unregisters the surface"]
pub struct PointerRegistration {
    router: WeakInputRouter,
    id: u64,
    disposed: bool,
}

impl PointerRegistration {
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        if let Some(router) = self.router.upgrade() {
            router.unregister(self.id);
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

impl Drop for PointerRegistration {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Event {
        Enter,
        Move(Vec2),
        Leave,
        Click,
    }

    #[derive(Clone, Default)]
    struct Recorder(Rc<RefCell<Vec<Event>>>);

    impl Recorder {
        fn events(&self) -> Vec<Event> {
            self.0.borrow().clone()
        }

        fn clear(&self) {
            self.0.borrow_mut().clear();
        }
    }

    impl PointerHandler for Recorder {
        fn on_enter(&mut self, _state: &PointerState) {
            self.0.borrow_mut().push(Event::Enter);
        }

        fn on_move(&mut self, state: &PointerState) {
            self.0.borrow_mut().push(Event::Move(state.normalized));
        }

        fn on_leave(&mut self, _state: &PointerState) {
            self.0.borrow_mut().push(Event::Leave);
        }

        fn on_click(&mut self, _state: &PointerState) {
            self.0.borrow_mut().push(Event::Click);
        }
    }

    #[derive(Clone, Default)]
    struct CountingBinding {
        attached: Rc<Cell<u32>>,
        detached: Rc<Cell<u32>>,
    }

    impl ListenerBinding for CountingBinding {
        fn attach(&mut self, router: WeakInputRouter) {
            assert!(router.upgrade().is_some());
            self.attached.set(self.attached.get() + 1);
        }

        fn detach(&mut self) {
            self.detached.set(self.detached.get() + 1);
        }
    }

    const A: Rect = Rect {
        left: 0.0,
        top: 0.0,
        width: 100.0,
        height: 100.0,
    };
    const B: Rect = Rect {
        left: 200.0,
        top: 0.0,
        width: 100.0,
        height: 100.0,
    };

    #[test]
    fn test_rect_contains_inclusive() {
        assert!(A.contains(0.0, 0.0));
        assert!(A.contains(100.0, 100.0));
        assert!(!A.contains(100.1, 50.0));
        assert!(!A.contains(-0.1, 50.0));
    }

    #[test]
    fn test_hover_transitions_for_disjoint_surfaces() {
        let router = InputRouter::new();
        let (a, b) = (Recorder::default(), Recorder::default());
        let _ra = router.register(A, a.clone());
        let _rb = router.register(B, b.clone());

        router.pointer_moved(50.0, 50.0);
        assert_eq!(a.events(), vec![Event::Enter, Event::Move(Vec2::ZERO)]);
        assert!(b.events().is_empty());

        router.pointer_moved(500.0, 500.0);
        assert_eq!(a.events().last(), Some(&Event::Leave));
        assert!(b.events().is_empty());
    }

    #[test]
    fn test_enter_fires_once_per_hover() {
        let router = InputRouter::new();
        let a = Recorder::default();
        let _ra = router.register(A, a.clone());

        router.pointer_moved(10.0, 10.0);
        router.pointer_moved(20.0, 20.0);
        let enters = a.events().iter().filter(|e| **e == Event::Enter).count();
        assert_eq!(enters, 1);
    }

    #[test]
    fn test_normalized_coordinates_y_up() {
        let router = InputRouter::new();
        let a = Recorder::default();
        let reg = router.register(A, a.clone());

        router.pointer_moved(0.0, 0.0);
        let state = router.state_of(&reg).unwrap();
        assert_eq!(state.normalized, Vec2::new(-1.0, 1.0));
        assert_eq!(state.position, Vec2::ZERO);

        router.pointer_moved(100.0, 100.0);
        assert_eq!(router.state_of(&reg).unwrap().normalized, Vec2::new(1.0, -1.0));
    }

    #[test]
    fn test_pointer_left_document() {
        let router = InputRouter::new();
        let (a, b) = (Recorder::default(), Recorder::default());
        let _ra = router.register(A, a.clone());
        let _rb = router.register(B, b.clone());

        router.pointer_moved(50.0, 50.0);
        router.pointer_left();
        assert_eq!(a.events().last(), Some(&Event::Leave));
        // B was never hovered
        assert!(b.events().is_empty());
    }

    #[test]
    fn test_touch_drag_continues_outside_surface() {
        let router = InputRouter::new();
        let a = Recorder::default();
        let reg = router.register(A, a.clone());

        router.touch_started(50.0, 50.0);
        assert_eq!(a.events(), vec![Event::Enter, Event::Move(Vec2::ZERO)]);
        assert!(router.state_of(&reg).unwrap().touching);
        a.clear();

        router.touch_moved(150.0, 50.0);
        assert_eq!(a.events(), vec![Event::Move(Vec2::new(2.0, 0.0))]);

        router.touch_ended();
        assert_eq!(a.events().last(), Some(&Event::Leave));
        let state = router.state_of(&reg).unwrap();
        assert!(!state.touching);
        assert!(!state.hover);
    }

    #[test]
    fn test_touch_moved_without_touch_behaves_like_pointer() {
        let router = InputRouter::new();
        let a = Recorder::default();
        let _ra = router.register(A, a.clone());

        router.touch_moved(50.0, 50.0);
        router.touch_moved(150.0, 50.0);
        assert_eq!(a.events(), vec![Event::Enter, Event::Move(Vec2::ZERO), Event::Leave]);
    }

    #[test]
    fn test_touch_end_ignores_untouched_surfaces() {
        let router = InputRouter::new();
        let (a, b) = (Recorder::default(), Recorder::default());
        let _ra = router.register(A, a.clone());
        let _rb = router.register(B, b.clone());

        router.pointer_moved(250.0, 50.0);
        router.touch_started(50.0, 50.0);
        b.clear();
        router.touch_ended();
        assert_eq!(a.events().last(), Some(&Event::Leave));
        assert!(b.events().is_empty());
    }

    #[test]
    fn test_click_hits_only_intersected_surface() {
        let router = InputRouter::new();
        let (a, b) = (Recorder::default(), Recorder::default());
        let _ra = router.register(A, a.clone());
        let _rb = router.register(B, b.clone());

        router.clicked(250.0, 10.0);
        assert!(a.events().is_empty());
        assert_eq!(b.events(), vec![Event::Click]);
    }

    #[test]
    fn test_overlapping_surfaces_both_receive() {
        let router = InputRouter::new();
        let (a, b) = (Recorder::default(), Recorder::default());
        let _ra = router.register(A, a.clone());
        let _rb = router.register(Rect::new(50.0, 50.0, 100.0, 100.0), b.clone());

        router.pointer_moved(75.0, 75.0);
        assert_eq!(a.events()[0], Event::Enter);
        assert_eq!(b.events()[0], Event::Enter);
    }

    #[test]
    fn test_disposed_surface_gets_no_events() {
        let router = InputRouter::new();
        let a = Recorder::default();
        let mut reg = router.register(A, a.clone());
        reg.dispose();
        reg.dispose();

        router.pointer_moved(50.0, 50.0);
        assert!(a.events().is_empty());
        assert!(router.is_empty());
    }

    #[test]
    fn test_listeners_follow_registry_population() {
        let binding = CountingBinding::default();
        let router = InputRouter::with_binding(binding.clone());
        assert!(!router.is_listening());

        let ra = router.register(A, Recorder::default());
        let rb = router.register(B, Recorder::default());
        assert!(router.is_listening());
        assert_eq!(binding.attached.get(), 1);

        drop(ra);
        assert!(router.is_listening());
        drop(rb);
        assert!(!router.is_listening());
        assert_eq!(binding.detached.get(), 1);

        let _rc = router.register(A, Recorder::default());
        assert_eq!(binding.attached.get(), 2);
    }

    #[test]
    fn test_registration_outlives_router() {
        let router = InputRouter::new();
        let mut reg = router.register(A, Recorder::default());
        drop(router);
        reg.dispose();
        assert!(reg.is_disposed());
    }
}
