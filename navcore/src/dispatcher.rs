//! Single-subscriber notification channels
//!
//! Each channel holds at most one handler; registering a new one replaces the
//! previous. Dispatch is synchronous and happens inside the tracker call that
//! caused it. A channel without a handler drops the event.

use crate::geometry::Coordinate;
use crate::state::{NavigationState, StepInstruction};

pub type UpdateHandler = Box<dyn FnMut(&NavigationState)>;
pub type OffRouteHandler = Box<dyn FnMut(Coordinate)>;
pub type StepCompleteHandler = Box<dyn FnMut(usize, &StepInstruction)>;
pub type RouteCompleteHandler = Box<dyn FnMut()>;

#[derive(Default)]
pub struct EventDispatcher {
    on_update: Option<UpdateHandler>,
    on_off_route: Option<OffRouteHandler>,
    on_step_complete: Option<StepCompleteHandler>,
    on_route_complete: Option<RouteCompleteHandler>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_update<F>(&mut self, handler: F)
    where
        F: FnMut(&NavigationState) + 'static,
    {
        self.on_update = Some(Box::new(handler));
    }

    /// Receives the raw (unsnapped) coordinate of the fix that left the route.
    pub fn on_off_route<F>(&mut self, handler: F)
    where
        F: FnMut(Coordinate) + 'static,
    {
        self.on_off_route = Some(Box::new(handler));
    }

    pub fn on_step_complete<F>(&mut self, handler: F)
    where
        F: FnMut(usize, &StepInstruction) + 'static,
    {
        self.on_step_complete = Some(Box::new(handler));
    }

    pub fn on_route_complete<F>(&mut self, handler: F)
    where
        F: FnMut() + 'static,
    {
        self.on_route_complete = Some(Box::new(handler));
    }

    /// Drop every registered handler.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub(crate) fn emit_update(&mut self, state: &NavigationState) {
        if let Some(handler) = self.on_update.as_mut() {
            handler(state);
        }
    }

    pub(crate) fn emit_off_route(&mut self, coordinate: Coordinate) {
        if let Some(handler) = self.on_off_route.as_mut() {
            handler(coordinate);
        }
    }

    pub(crate) fn emit_step_complete(&mut self, step_index: usize, instruction: &StepInstruction) {
        if let Some(handler) = self.on_step_complete.as_mut() {
            handler(step_index, instruction);
        }
    }

    pub(crate) fn emit_route_complete(&mut self) {
        if let Some(handler) = self.on_route_complete.as_mut() {
            handler();
        }
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("on_update", &self.on_update.is_some())
            .field("on_off_route", &self.on_off_route.is_some())
            .field("on_step_complete", &self.on_step_complete.is_some())
            .field("on_route_complete", &self.on_route_complete.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_missing_handlers_are_silent() {
        let mut dispatcher = EventDispatcher::new();
        dispatcher.emit_update(&NavigationState::idle());
        dispatcher.emit_off_route(Coordinate::new(0.0, 0.0));
        dispatcher.emit_route_complete();
    }

    #[test]
    fn test_registration_replaces_previous_handler() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut dispatcher = EventDispatcher::new();

        let first = calls.clone();
        dispatcher.on_route_complete(move || first.borrow_mut().push("first"));
        let second = calls.clone();
        dispatcher.on_route_complete(move || second.borrow_mut().push("second"));

        dispatcher.emit_route_complete();
        assert_eq!(*calls.borrow(), vec!["second"]);
    }

    #[test]
    fn test_update_handler_receives_state() {
        let seen = Rc::new(RefCell::new(None));
        let mut dispatcher = EventDispatcher::new();
        let sink = seen.clone();
        dispatcher.on_update(move |state| *sink.borrow_mut() = Some(state.clone()));

        let mut state = NavigationState::idle();
        state.current_step_index = 3;
        dispatcher.emit_update(&state);

        assert_eq!(seen.borrow().as_ref().map(|s| s.current_step_index), Some(3));
    }

    #[test]
    fn test_clear_removes_handlers() {
        let count = Rc::new(RefCell::new(0));
        let mut dispatcher = EventDispatcher::new();
        let sink = count.clone();
        dispatcher.on_off_route(move |_| *sink.borrow_mut() += 1);

        dispatcher.clear();
        dispatcher.emit_off_route(Coordinate::new(0.0, 0.0));
        assert_eq!(*count.borrow(), 0);
        assert!(format!("{:?}", dispatcher).contains("on_off_route: false"));
    }
}
