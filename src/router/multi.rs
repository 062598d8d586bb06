use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::{Rc, Weak};

use crate::error::Result;
use crate::identity::RouterId;
use crate::logging::{LogLevel, ROUTER_TARGET, json_kv, json_str};

use super::core::{RouteTable, Routable, Router};
use super::history::{History, RouteHandler};

struct Binding {
    router: RouterId,
    handlers: Vec<RouteHandler>,
}

struct MultiInner {
    bindings: RefCell<Vec<Binding>>,
    patterns: RefCell<HashSet<String>>,
}

/// Lets several routers share one history.
///
/// Routes declared through the multiplexer (its own or those of routers built
/// by [`MultiRouter::create_router`]) are captured instead of bound. On a
/// fragment change every router, in the order it was first bound, runs its
/// first matching handler, so one fragment can fire once per router.
pub struct MultiRouter {
    router: Router,
    inner: Rc<MultiInner>,
}

impl MultiRouter {
    pub fn new(history: &History) -> Self {
        Self {
            router: Router::new(history),
            inner: Rc::new(MultiInner {
                bindings: RefCell::new(Vec::new()),
                patterns: RefCell::new(HashSet::new()),
            }),
        }
    }

    pub fn history(&self) -> &History {
        self.router.history()
    }

    /// Declares a route on the multiplexer itself.
    pub fn route(
        &self,
        pattern: &str,
        name: &str,
        action: impl Fn(&[String]) + 'static,
    ) -> Result<&Self> {
        let (declared, handlers) = self
            .history()
            .capture(|| self.router.route(pattern, name, action));
        declared?;
        self.bind_handlers(self.router.id(), handlers);
        Ok(self)
    }

    pub fn bind_routes(&self, table: RouteTable) -> Result<&Self> {
        let (declared, handlers) = self
            .history()
            .capture(|| self.router.bind_routes(table));
        declared?;
        self.bind_handlers(self.router.id(), handlers);
        Ok(self)
    }

    /// Builds a router, capturing every route it declares while being built.
    pub fn create_router<R, F>(&self, build: F) -> Result<R>
    where
        R: Routable,
        F: FnOnce(&History) -> Result<R>,
    {
        let history = self.history().clone();
        let (built, handlers) = history.capture(|| build(&history));
        let router = built?;
        self.bind_handlers(router.router().id(), handlers);
        Ok(router)
    }

    /// Number of routers with bound handlers, the multiplexer included.
    pub fn router_count(&self) -> usize {
        self.inner.bindings.borrow().len()
    }

    /// Handler count per router, in firing order.
    pub fn handler_counts(&self) -> Vec<(RouterId, usize)> {
        self.inner
            .bindings
            .borrow()
            .iter()
            .map(|binding| (binding.router, binding.handlers.len()))
            .collect()
    }

    fn bind_handlers(&self, router: RouterId, handlers: Vec<RouteHandler>) {
        if handlers.is_empty() {
            return;
        }
        {
            let mut bindings = self.inner.bindings.borrow_mut();
            match bindings.iter_mut().find(|binding| binding.router == router) {
                Some(binding) => {
                    binding.handlers.splice(0..0, handlers.iter().cloned());
                }
                None => bindings.push(Binding {
                    router,
                    handlers: handlers.clone(),
                }),
            }
        }
        for handler in &handlers {
            self.share_pattern(handler);
        }
        let config = self.history().config();
        config.log(
            LogLevel::Debug,
            ROUTER_TARGET,
            "bound router handlers",
            [
                json_str("router", router.to_string()),
                json_kv("handlers", handlers.len()),
            ],
        );
    }

    /// Installs one history listener per distinct pattern.
    fn share_pattern(&self, handler: &RouteHandler) {
        let source = handler.pattern.source().to_string();
        if !self.inner.patterns.borrow_mut().insert(source) {
            return;
        }
        let inner = Rc::downgrade(&self.inner);
        let history = self.history().clone();
        self.history()
            .route(handler.pattern.clone(), move |fragment| {
                fan_out(&inner, &history, fragment);
            });
    }
}

impl Routable for MultiRouter {
    fn router(&self) -> &Router {
        &self.router
    }
}

fn fan_out(inner: &Weak<MultiInner>, history: &History, fragment: &str) {
    let Some(inner) = inner.upgrade() else {
        return;
    };
    let snapshot: Vec<Vec<RouteHandler>> = inner
        .bindings
        .borrow()
        .iter()
        .map(|binding| binding.handlers.clone())
        .collect();
    let mut fired = 0usize;
    for handlers in &snapshot {
        if let Some(handler) = handlers
            .iter()
            .find(|handler| handler.pattern.is_match(fragment))
        {
            (handler.callback)(fragment);
            fired += 1;
        }
    }
    history.config().log(
        LogLevel::Debug,
        ROUTER_TARGET,
        "fanned out fragment",
        [json_str("fragment", fragment), json_kv("fired", fired)],
    );
}
