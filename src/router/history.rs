use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::config::ViewConfig;
use crate::error::{Result, ViewError};
use crate::logging::{LogLevel, Logger, ROUTER_TARGET, json_kv, json_str};
use crate::metrics::SharedMetrics;

use super::route::RoutePattern;

pub type RouteCallback = Rc<dyn Fn(&str)>;

/// A pattern and the callback run when a fragment matches it.
#[derive(Clone)]
pub struct RouteHandler {
    pub pattern: RoutePattern,
    pub callback: RouteCallback,
}

impl RouteHandler {
    pub fn new(pattern: RoutePattern, callback: impl Fn(&str) + 'static) -> Self {
        Self {
            pattern,
            callback: Rc::new(callback),
        }
    }
}

impl fmt::Debug for RouteHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteHandler")
            .field("pattern", &self.pattern)
            .finish()
    }
}

struct HistoryInner {
    handlers: RefCell<Vec<RouteHandler>>,
    recorders: RefCell<Vec<Vec<RouteHandler>>>,
    location: RefCell<String>,
    fragment: RefCell<Option<String>>,
    started: Cell<bool>,
    config: RefCell<ViewConfig>,
}

/// In-memory URL fragment history.
///
/// Handlers are checked most recent first and only the first match runs.
/// Clones share state.
#[derive(Clone)]
pub struct History(Rc<HistoryInner>);

impl History {
    pub fn new() -> Self {
        Self(Rc::new(HistoryInner {
            handlers: RefCell::new(Vec::new()),
            recorders: RefCell::new(Vec::new()),
            location: RefCell::new(String::new()),
            fragment: RefCell::new(None),
            started: Cell::new(false),
            config: RefCell::new(ViewConfig::default()),
        }))
    }

    pub fn with_logger(self, logger: Logger) -> Self {
        self.0.config.borrow_mut().logger = Some(logger);
        self
    }

    pub fn with_metrics(self, metrics: SharedMetrics) -> Self {
        self.0.config.borrow_mut().metrics = Some(metrics);
        self
    }

    pub(crate) fn config(&self) -> ViewConfig {
        self.0.config.borrow().clone()
    }

    /// Registers a handler ahead of every existing one. While a [`History::capture`]
    /// is running the handler goes to the innermost capture instead.
    pub fn route(&self, pattern: RoutePattern, callback: impl Fn(&str) + 'static) {
        self.route_handler(RouteHandler::new(pattern, callback));
    }

    pub fn route_handler(&self, handler: RouteHandler) {
        {
            let mut recorders = self.0.recorders.borrow_mut();
            if let Some(recorder) = recorders.last_mut() {
                recorder.insert(0, handler);
                return;
            }
        }
        self.0.handlers.borrow_mut().insert(0, handler);
    }

    /// Runs `declare` and returns every handler it routed, in handler order,
    /// without binding any of them. Nested captures only see their own calls.
    pub fn capture<R>(&self, declare: impl FnOnce() -> R) -> (R, Vec<RouteHandler>) {
        let guard = CaptureGuard::push(self);
        let result = declare();
        (result, guard.finish())
    }

    pub fn handler_count(&self) -> usize {
        self.0.handlers.borrow().len()
    }

    pub fn is_started(&self) -> bool {
        self.0.started.get()
    }

    /// Begins listening. Unless `silent`, the current location is loaded.
    pub fn start(&self, silent: bool) -> Result<bool> {
        if self.0.started.replace(true) {
            return Err(ViewError::HistoryStarted);
        }
        let location = self.location();
        *self.0.fragment.borrow_mut() = Some(location.clone());
        if silent {
            return Ok(false);
        }
        Ok(self.load_url(Some(&location)))
    }

    pub fn stop(&self) {
        self.0.started.set(false);
    }

    pub fn location(&self) -> String {
        self.0.location.borrow().clone()
    }

    /// Last fragment loaded, if any.
    pub fn fragment(&self) -> Option<String> {
        self.0.fragment.borrow().clone()
    }

    /// Simulates the user changing the URL fragment.
    pub fn set_location(&self, fragment: &str) -> bool {
        *self.0.location.borrow_mut() = normalize(fragment).to_string();
        self.is_started() && self.check_url()
    }

    /// Loads the location if it differs from the last loaded fragment.
    pub fn check_url(&self) -> bool {
        let location = self.location();
        if self.0.fragment.borrow().as_deref() == Some(location.as_str()) {
            return false;
        }
        self.load_url(Some(&location))
    }

    /// Runs the first handler matching `fragment` (default: the location).
    pub fn load_url(&self, fragment: Option<&str>) -> bool {
        let fragment = match fragment {
            Some(fragment) => normalize(fragment).to_string(),
            None => self.location(),
        };
        *self.0.fragment.borrow_mut() = Some(fragment.clone());
        let handlers = self.0.handlers.borrow().clone();
        let matched = handlers
            .iter()
            .find(|handler| handler.pattern.is_match(&fragment));
        let config = self.config();
        config.record(|metrics| metrics.record_route(usize::from(matched.is_some())));
        config.log(
            LogLevel::Debug,
            ROUTER_TARGET,
            "loaded fragment",
            [
                json_str("fragment", fragment.as_str()),
                json_kv("matched", matched.is_some()),
            ],
        );
        match matched {
            Some(handler) => {
                (handler.callback)(&fragment);
                true
            }
            None => false,
        }
    }

    /// Moves to `fragment`; with `trigger`, its route runs too.
    pub fn navigate(&self, fragment: &str, trigger: bool) -> bool {
        if !self.is_started() {
            return false;
        }
        let fragment = normalize(fragment).to_string();
        if self.0.fragment.borrow().as_deref() == Some(fragment.as_str()) {
            return false;
        }
        *self.0.location.borrow_mut() = fragment.clone();
        *self.0.fragment.borrow_mut() = Some(fragment.clone());
        trigger && self.load_url(Some(&fragment))
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for History {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("History")
            .field("handlers", &self.handler_count())
            .field("location", &self.location())
            .field("started", &self.is_started())
            .finish()
    }
}

/// Pops its recorder on drop, so a panicking declaration leaves no capture behind.
struct CaptureGuard<'a> {
    history: &'a History,
    depth: usize,
}

impl<'a> CaptureGuard<'a> {
    fn push(history: &'a History) -> Self {
        let mut recorders = history.0.recorders.borrow_mut();
        let depth = recorders.len();
        recorders.push(Vec::new());
        Self { history, depth }
    }

    fn finish(self) -> Vec<RouteHandler> {
        let mut recorders = self.history.0.recorders.borrow_mut();
        recorders.truncate(self.depth + 1);
        recorders.pop().unwrap_or_default()
    }
}

impl Drop for CaptureGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut recorders) = self.history.0.recorders.try_borrow_mut() {
            recorders.truncate(self.depth);
        }
    }
}

/// Strips one leading `#` or `/`.
fn normalize(fragment: &str) -> &str {
    fragment
        .strip_prefix('#')
        .or_else(|| fragment.strip_prefix('/'))
        .unwrap_or(fragment)
}
