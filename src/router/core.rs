use std::fmt;
use std::rc::Rc;

use crate::error::Result;
use crate::events::{ALL_EVENTS, EventHub, ListenerId};
use crate::identity::RouterId;

use super::history::History;
use super::route::RoutePattern;

pub type RouteAction = Rc<dyn Fn(&[String])>;

/// Emitted by a [`Router`] after one of its routes ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEvent {
    pub name: String,
    pub params: Vec<String>,
}

/// Routes declared together, in priority order.
#[derive(Clone, Default)]
pub struct RouteTable {
    entries: Vec<(String, String, RouteAction)>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(
        mut self,
        pattern: impl Into<String>,
        name: impl Into<String>,
        action: impl Fn(&[String]) + 'static,
    ) -> Self {
        self.entries
            .push((pattern.into(), name.into(), Rc::new(action)));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Anything that owns a [`Router`], so multiplexers can track it by id.
pub trait Routable {
    fn router(&self) -> &Router;
}

/// Maps fragment patterns to named actions on a shared [`History`].
#[derive(Clone)]
pub struct Router {
    id: RouterId,
    history: History,
    hub: Rc<EventHub<RouteEvent>>,
}

impl Router {
    pub fn new(history: &History) -> Self {
        Self {
            id: RouterId::next(),
            history: history.clone(),
            hub: Rc::new(EventHub::new()),
        }
    }

    pub fn id(&self) -> RouterId {
        self.id
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Registers one route. It is checked before every route registered earlier.
    pub fn route(
        &self,
        pattern: &str,
        name: &str,
        action: impl Fn(&[String]) + 'static,
    ) -> Result<()> {
        self.route_action(pattern, name, Rc::new(action))
    }

    fn route_action(&self, pattern: &str, name: &str, action: RouteAction) -> Result<()> {
        let compiled = RoutePattern::compile(pattern)?;
        let extractor = compiled.clone();
        let hub = Rc::clone(&self.hub);
        let name = name.to_string();
        self.history.route(compiled, move |fragment| {
            let params = extractor.extract(fragment).unwrap_or_default();
            action(&params);
            let event = RouteEvent {
                name: name.clone(),
                params,
            };
            hub.emit(&format!("route:{name}"), &event);
        });
        Ok(())
    }

    /// Registers a table so that its first entry has the highest priority.
    pub fn bind_routes(&self, table: RouteTable) -> Result<()> {
        for (pattern, name, action) in table.entries.into_iter().rev() {
            self.route_action(&pattern, &name, action)?;
        }
        Ok(())
    }

    pub fn navigate(&self, fragment: &str, trigger: bool) -> bool {
        self.history.navigate(fragment, trigger)
    }

    /// Observes one named route, or every route with `None`.
    pub fn on_route(
        &self,
        name: Option<&str>,
        callback: impl Fn(&RouteEvent) + 'static,
    ) -> ListenerId {
        let event = match name {
            Some(name) => format!("route:{name}"),
            None => ALL_EVENTS.to_string(),
        };
        self.hub.on(&event, None, callback)
    }

    pub fn off_route(&self, id: ListenerId) -> bool {
        self.hub.off(id)
    }
}

impl Routable for Router {
    fn router(&self) -> &Router {
        self
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router").field("id", &self.id).finish()
    }
}
