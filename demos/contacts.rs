//! Contacts demo: an app multiplexer with navigation and contacts routers, an
//! app composite with sections and a contact list kept in sync with a sorted
//! collection.

use std::cell::RefCell;
use std::rc::Rc;

use room_views::{
    CollectionView, Component, CompositeView, DomEvent, Element, EventSpec, Handler, History,
    LogLevel, Logger, MemorySink, Model, MultiRouter, PlaceOptions, RegisterOptions, Result,
    RouteTable, Router, ViewBase, ViewConfig, ViewMetrics, ViewOptions, install,
};
use room_views::{Collection, Routable};
use serde_json::json;

struct NavView {
    base: ViewBase,
}

impl NavView {
    fn new() -> Self {
        Self {
            base: ViewBase::new(ViewOptions::new().tag_name("ul").class_name("nav")),
        }
    }

    fn select_tab(&self, name: &str) -> Result<()> {
        for tab in self.base.query(".selected")? {
            tab.remove_class("selected");
        }
        for tab in self.base.query(&format!("[data-name={name}]"))? {
            tab.add_class("selected");
        }
        Ok(())
    }
}

impl Component for NavView {
    fn view(&self) -> &ViewBase {
        &self.base
    }

    fn render(&self) -> Result<()> {
        self.base.el().set_content([
            Element::new("li").with_attr("data-name", "home").with_text("Home"),
            Element::new("li")
                .with_attr("data-name", "contacts")
                .with_text("Contacts"),
        ]);
        Ok(())
    }
}

struct HomeView {
    base: ViewBase,
}

impl Component for HomeView {
    fn view(&self) -> &ViewBase {
        &self.base
    }

    fn render(&self) -> Result<()> {
        self.base
            .el()
            .set_content([Element::new("h1").with_text("Welcome")]);
        Ok(())
    }
}

struct ContactItem {
    base: ViewBase,
}

impl ContactItem {
    fn new(model: Model) -> Self {
        Self {
            base: ViewBase::new(
                ViewOptions::new()
                    .tag_name("li")
                    .class_name("contact")
                    .model(model),
            ),
        }
    }
}

impl Component for ContactItem {
    fn view(&self) -> &ViewBase {
        &self.base
    }

    fn events(&self) -> EventSpec {
        EventSpec::from_pairs([("click .destroy", Handler::method("destroy"))])
    }

    fn render(&self) -> Result<()> {
        let name = self
            .base
            .model()
            .and_then(|model| model.get_str("name"))
            .unwrap_or_default();
        self.base.el().set_content([
            Element::new("span").with_class("name").with_text(name),
            Element::new("button").with_class("destroy").with_text("x"),
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

struct ContactCard {
    base: ViewBase,
}

impl ContactCard {
    fn show_contact(&self, model: Model) -> Result<()> {
        self.base.set_model(Some(model));
        self.render()?;
        self.base.show();
        Ok(())
    }
}

impl Component for ContactCard {
    fn view(&self) -> &ViewBase {
        &self.base
    }

    fn render(&self) -> Result<()> {
        let Some(model) = self.base.model() else {
            self.base.clear();
            return Ok(());
        };
        let field = |key: &str| model.get_str(key).unwrap_or_default();
        self.base.el().set_content([
            Element::new("h2").with_text(field("name")),
            Element::new("p").with_class("phone").with_text(field("phone")),
            Element::new("p").with_class("email").with_text(field("email")),
        ]);
        Ok(())
    }
}

struct ContactForm {
    base: ViewBase,
    contacts: Collection,
    next_id: RefCell<u32>,
}

impl ContactForm {
    fn submit(&self) -> Result<Model> {
        let mut attributes = serde_json::Map::new();
        let id = {
            let mut next = self.next_id.borrow_mut();
            *next += 1;
            *next
        };
        attributes.insert("id".to_string(), json!(id.to_string()));
        for input in self.base.query("input")? {
            if let Some(name) = input.attr("name") {
                attributes.insert(name, json!(input.attr("value").unwrap_or_default()));
                input.set_attr("value", "");
            }
        }
        let model = Model::with_attributes(serde_json::Value::Object(attributes))?;
        self.contacts.add(model.clone());
        Ok(model)
    }
}

impl Component for ContactForm {
    fn view(&self) -> &ViewBase {
        &self.base
    }

    fn events(&self) -> EventSpec {
        EventSpec::from_pairs([("submit", Handler::method("submit"))])
    }

    fn render(&self) -> Result<()> {
        let input = |name: &str| Element::new("input").with_attr("name", name);
        self.base
            .el()
            .set_content([input("name"), input("phone"), input("email")]);
        Ok(())
    }

    fn handle(&self, method: &str, event: &mut DomEvent) -> bool {
        if method != "submit" {
            return false;
        }
        event.prevent_default();
        if let Err(err) = self.submit() {
            eprintln!("contact form: {err}");
        }
        true
    }
}

struct ContactsView {
    composite: CompositeView,
    list: Rc<CollectionView>,
    card: Rc<ContactCard>,
    form: Rc<ContactForm>,
    body: Element,
}

impl ContactsView {
    fn new(contacts: &Collection, body: &Element, config: &ViewConfig) -> Result<Self> {
        let composite = CompositeView::new(
            ViewOptions::new()
                .class_name("contacts-page")
                .config(config.clone()),
        );
        let list = CollectionView::builder()
            .options(
                ViewOptions::new()
                    .tag_name("ul")
                    .class_name("contacts")
                    .config(config.clone()),
            )
            .collection(contacts.clone())
            .child_view(ContactItem::new)
            .delegation_selector(".contact")
            .empty_text("No contacts yet")
            .build()?;
        let card = install(ContactCard {
            base: ViewBase::new(ViewOptions::new().class_name("contact-card")),
        })?;
        let form = install(ContactForm {
            base: ViewBase::new(ViewOptions::new().tag_name("form").class_name("contact-form")),
            contacts: contacts.clone(),
            next_id: RefCell::new(contacts.len() as u32),
        })?;
        Ok(Self {
            list: composite.register_child(list, RegisterOptions::new()),
            card: composite.register_child(card, RegisterOptions::new()),
            form: composite.register_child(form, RegisterOptions::new()),
            composite,
            body: body.clone(),
        })
    }
}

impl Component for ContactsView {
    fn view(&self) -> &ViewBase {
        self.composite.view()
    }

    fn composite(&self) -> Option<&CompositeView> {
        Some(&self.composite)
    }

    fn render(&self) -> Result<()> {
        // The card sits on the body like a modal; clearing this view detaches it.
        self.card.view().hide();
        self.body.append(&self.card.el());
        self.view().el().set_content([
            Element::new("h2").with_text("Contacts"),
            self.composite.placeholder_for(self.list.as_ref()),
            self.composite.placeholder_for(self.form.as_ref()),
        ]);
        self.composite.place_children(PlaceOptions { render: true })?;
        Ok(())
    }
}

struct AppView {
    composite: CompositeView,
    nav: Rc<NavView>,
    home: Rc<HomeView>,
    contacts: Rc<ContactsView>,
    current: RefCell<Option<Rc<dyn Component>>>,
}

impl AppView {
    fn new(contacts: &Collection, body: &Element, config: ViewConfig) -> Result<Self> {
        let composite = CompositeView::new(ViewOptions::new().id("app").config(config.clone()));
        let nav = install(NavView::new())?;
        let home = install(HomeView {
            base: ViewBase::new(ViewOptions::new().class_name("home-page")),
        })?;
        let contacts = install(ContactsView::new(contacts, body, &config)?)?;
        Ok(Self {
            nav: composite.register_child(nav, RegisterOptions::new()),
            home: composite.register_child(home, RegisterOptions::new()),
            contacts: composite.register_child(contacts, RegisterOptions::new()),
            composite,
            current: RefCell::new(None),
        })
    }

    fn show_section(&self, name: &str) -> Result<()> {
        let next: Rc<dyn Component> = match name {
            "home" => self.home.clone(),
            "contacts" => self.contacts.clone(),
            _ => return Ok(()),
        };
        let current = self.current.borrow().clone();
        if current.as_ref().is_some_and(|view| view.cid() == next.cid()) {
            return Ok(());
        }
        if let Some(view) = current {
            view.view().hide();
            view.clear();
        }
        next.view().show();
        next.render()?;
        *self.current.borrow_mut() = Some(next);
        Ok(())
    }
}

impl Component for AppView {
    fn view(&self) -> &ViewBase {
        self.composite.view()
    }

    fn composite(&self) -> Option<&CompositeView> {
        Some(&self.composite)
    }

    fn render(&self) -> Result<()> {
        self.view().el().set_content([
            Element::new("header").with_child(self.composite.placeholder_for(self.nav.as_ref())),
            Element::new("main")
                .with_child(self.composite.placeholder_for(self.home.as_ref()))
                .with_child(self.composite.placeholder_for(self.contacts.as_ref())),
        ]);
        self.composite.place_children(PlaceOptions::default())?;
        self.nav.render()
    }
}

fn report(context: &str, outcome: Result<()>) {
    if let Err(err) = outcome {
        eprintln!("{context}: {err}");
    }
}

struct NavRouter(Router);

impl Routable for NavRouter {
    fn router(&self) -> &Router {
        &self.0
    }
}

fn nav_router(history: &History, nav: Rc<NavView>) -> Result<NavRouter> {
    let router = Router::new(history);
    let (home, contacts) = (nav.clone(), nav);
    router.bind_routes(
        RouteTable::new()
            .route("", "index", move |_| report("nav", home.select_tab("home")))
            .route("contacts/*s", "contacts", move |_| {
                report("nav", contacts.select_tab("contacts"))
            }),
    )?;
    Ok(NavRouter(router))
}

fn contacts_router(
    history: &History,
    view: Rc<ContactsView>,
    contacts: Collection,
) -> Result<Router> {
    let router = Router::new(history);
    let index_view = view.clone();
    router.bind_routes(
        RouteTable::new()
            .route("contacts/", "index", move |_| index_view.card.view().hide())
            .route("contacts/:id", "contact", move |params| {
                let Some(id) = params.first() else {
                    return;
                };
                if let Some(contact) = contacts.get(&json!(id)) {
                    report("contact", view.card.show_contact(contact));
                }
            }),
    )?;
    Ok(router)
}

fn app_router(history: &History, app: &Rc<AppView>, contacts: &Collection) -> Result<MultiRouter> {
    let router = MultiRouter::new(history);
    let (index_app, section_app) = (app.clone(), app.clone());
    router.bind_routes(
        RouteTable::new()
            .route("", "index", move |_| report("app", index_app.show_section("home")))
            .route(":section/*s", "section", move |params| {
                if let Some(section) = params.first() {
                    report("app", section_app.show_section(section));
                }
            }),
    )?;
    let nav = app.nav.clone();
    router.create_router(|history| nav_router(history, nav))?;
    let view = app.contacts.clone();
    let contacts = contacts.clone();
    router.create_router(|history| contacts_router(history, view, contacts))?;
    Ok(router)
}

fn contact(id: &str, name: &str, phone: &str, email: &str) -> Result<Model> {
    Model::with_attributes(json!({ "id": id, "name": name, "phone": phone, "email": email }))
}

fn main() -> Result<()> {
    let sink = MemorySink::new();
    let logger = Logger::new(sink.clone()).with_min_level(LogLevel::Debug);
    let metrics = ViewMetrics::shared();
    let config = ViewConfig::new()
        .with_logger(logger.clone())
        .with_metrics(metrics.clone());

    let contacts = Collection::with_comparator(|a, b| {
        let name = |model: &Model| model.get_str("name").unwrap_or_default().to_lowercase();
        name(a).cmp(&name(b))
    });
    contacts.reset([
        contact("1", "Grace Hopper", "555-0101", "grace@example.com")?,
        contact("2", "Ada Lovelace", "555-0102", "ada@example.com")?,
        contact("3", "Linus Torvalds", "555-0103", "linus@example.com")?,
    ]);

    let body = Element::new("body");
    let app = install(AppView::new(&contacts, &body, config)?)?;
    body.append(&app.el());
    app.render()?;

    let history = History::new()
        .with_logger(logger)
        .with_metrics(metrics.clone());
    let _router = app_router(&history, &app, &contacts)?;
    history.start(false)?;
    println!("home:\n{}\n", body.outer_html());

    history.set_location("#contacts/");
    println!("contacts:\n{}\n", body.outer_html());

    let form = app.contacts.form.clone();
    for input in form.view().query("input")? {
        let value = match input.attr("name").as_deref() {
            Some("name") => "Barbara Liskov",
            Some("phone") => "555-0104",
            _ => "barbara@example.com",
        };
        input.set_attr("value", value);
    }
    form.el().trigger("submit");

    if let Some(button) = app.contacts.list.view().query(".destroy")?.into_iter().nth(2) {
        button.trigger("click");
    }
    println!("after edits:\n{}\n", app.contacts.list.el().outer_html());

    history.set_location("contacts/2");
    println!("card:\n{}\n", app.contacts.card.el().outer_html());

    if let Ok(guard) = metrics.lock() {
        println!("{}", serde_json::to_string(&guard.snapshot().to_log_event("demo"))?);
    }
    println!("{} log events recorded", sink.events().len());
    Ok(())
}
