//! Fragment routing: patterns, history, routers and the multiplexer that lets
//! several routers share one history.

mod core;
mod history;
mod multi;
mod route;

pub use self::core::{RouteAction, RouteEvent, RouteTable, Routable, Router};
pub use history::{History, RouteCallback, RouteHandler};
pub use multi::MultiRouter;
pub use route::RoutePattern;
