use std::hint::black_box;
use std::rc::Rc;

use criterion::{Criterion, criterion_group, criterion_main};
use room_views::logging::{LogEvent, LogSink};
use room_views::{
    Collection, CollectionView, Component, DomEvent, Element, EventSpec, Handler, History, Logger,
    LoggingResult, Model, MultiRouter, RouteTable, Router, ViewBase, ViewConfig, ViewOptions,
};
use serde_json::json;

#[derive(Clone, Default)]
struct NullSink;

impl LogSink for NullSink {
    fn log(&self, _event: &LogEvent) -> LoggingResult<()> {
        Ok(())
    }
}

struct Row {
    base: ViewBase,
}

impl Component for Row {
    fn view(&self) -> &ViewBase {
        &self.base
    }

    fn events(&self) -> EventSpec {
        EventSpec::from_pairs([("click .destroy", Handler::method("destroy"))])
    }

    fn render(&self) -> room_views::Result<()> {
        let value = self
            .base
            .model()
            .and_then(|model| model.get_str("value"))
            .unwrap_or_default();
        self.base.el().set_content([
            Element::new("span").with_text(value),
            Element::new("button").with_class("destroy"),
        ]);
        Ok(())
    }

    fn handle(&self, method: &str, _event: &mut DomEvent) -> bool {
        if method != "destroy" {
            return false;
        }
        if let Some(model) = self.base.model() {
            if let Some(collection) = model.collection() {
                collection.remove(&model);
            }
        }
        true
    }
}

fn row(value: i64) -> Model {
    Model::with_attributes(json!({ "value": value })).expect("row model")
}

fn build_list(collection: &Collection) -> Rc<CollectionView> {
    let config = ViewConfig::new().with_logger(Logger::new(NullSink));
    CollectionView::builder()
        .options(ViewOptions::new().tag_name("ul").config(config))
        .collection(collection.clone())
        .child_view(|model| Row {
            base: ViewBase::new(ViewOptions::new().tag_name("li").model(model)),
        })
        .delegation_selector("li")
        .empty_text("empty")
        .build()
        .expect("collection view")
}

fn collection_reconcile(c: &mut Criterion) {
    c.bench_function("collection_insert_remove_200", |b| {
        b.iter(|| {
            let collection = Collection::sorted_by("value");
            collection.reset((0..100).map(|value| row(value * 2)));
            let view = build_list(&collection);
            view.render().expect("render");
            for value in 0..100 {
                collection.add(row(value * 2 + 1));
            }
            while collection.remove_at(0).is_some() {}
            black_box(view.is_aligned());
        });
    });
}

fn collection_delegated_click(c: &mut Criterion) {
    let collection = Collection::sorted_by("value");
    let view = build_list(&collection);
    view.render().expect("render");
    c.bench_function("collection_destroy_click", |b| {
        b.iter(|| {
            collection.add(row(1));
            let buttons = view.view().query(".destroy").expect("query");
            for button in buttons {
                black_box(button.trigger("click"));
            }
        });
    });
}

fn multiplexed_dispatch(c: &mut Criterion) {
    let history = History::new().with_logger(Logger::new(NullSink));
    let multi = MultiRouter::new(&history);
    multi
        .bind_routes(RouteTable::new().route("app/:section", "section", |_| {}))
        .expect("multiplexer routes");
    for index in 0..8 {
        multi
            .create_router(|h| {
                let router = Router::new(h);
                router.bind_routes(
                    RouteTable::new()
                        .route(&format!("app/{index}/:id"), "detail", |params| {
                            black_box(params);
                        })
                        .route("app/*rest", "fallback", |params| {
                            black_box(params);
                        }),
                )?;
                Ok(router)
            })
            .expect("router");
    }
    history.start(true).expect("start");
    let fragments = ["app/3/42", "app/home", "app/7/x/y", "elsewhere"];
    c.bench_function("multi_router_fan_out", |b| {
        b.iter(|| {
            for fragment in fragments {
                black_box(history.set_location(black_box(fragment)));
            }
        });
    });
}

criterion_group!(
    benches,
    collection_reconcile,
    collection_delegated_click,
    multiplexed_dispatch
);
criterion_main!(benches);
