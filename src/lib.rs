//! Composite views, collection-synchronized lists and multiplexed routing on
//! top of a small in-memory DOM.
//!
//! Everything is single-threaded: state lives behind `Rc`/`RefCell` and every
//! reaction (collection notifications, DOM events, fragment changes) completes
//! synchronously inside the callback that triggered it.

pub mod collection_view;
pub mod composite;
pub mod config;
pub mod dom;
pub mod error;
pub mod events;
pub mod identity;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod router;
pub mod view;

pub use collection_view::{ChildFactory, CollectionView, CollectionViewBuilder, EmptyContent};
pub use composite::{CompositeView, PlaceOptions, RegisterOptions};
pub use config::{
    DEFAULT_PLACEHOLDER_SELECTOR, PLACEHOLDER_TAG, ViewConfig, default_placeholder_selector,
    set_default_placeholder_selector,
};
pub use dom::{DomEvent, DomHandler, Element, Selector};
pub use error::{Result, ViewError};
pub use events::{ALL_EVENTS, EventHub, ListenerId};
pub use identity::{CID_ATTR, Cid, RouterId};
pub use logging::{
    FileSink, LogEvent, LogFields, LogLevel, LogSink, Logger, LoggingError, LoggingResult,
    MemorySink,
};
pub use metrics::{MetricSnapshot, SharedMetrics, ViewMetrics};
pub use model::{Collection, CollectionEvent, CollectionEventKind, Comparator, Model, ModelEvent};
pub use router::{
    History, MultiRouter, Routable, RouteAction, RouteCallback, RouteEvent, RouteHandler,
    RoutePattern, RouteTable, Router,
};
pub use view::{
    Component, EventMap, EventSpec, Handler, HandlerFn, ViewBase, ViewOptions, delegate_events,
    install,
};
