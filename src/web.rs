//! Browser bindings: the page seams on top of `web-sys` and the entry points
//! the server templates call from their event attributes.

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{anyhow, Context as _};
use js_sys::{Array, Function, Object, Reflect};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tracing_web::MakeWebConsoleWriter;
use url::Url;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{
    Document, Element, Event, HtmlButtonElement, HtmlCollection, HtmlElement, HtmlFormElement,
    HtmlInputElement, HtmlLabelElement, HtmlScriptElement, HtmlSelectElement, HtmlTextAreaElement,
};

use crate::app::App;
use crate::components::{RefreshHook, Viewer, Viewers};
use crate::config::{LogLevel, ViewConfig};
use crate::context::ContextOptions;
use crate::dom::{Dom, ScriptSource, Window};
use crate::error::ViewError;
use crate::hooks::Hook;
use crate::request::ReqwestTransport;
use crate::types::{ContentType, RowKind};

type WebApp = App<WebDom, WebWindow, ReqwestTransport>;

thread_local! {
    static APP: RefCell<Option<Rc<WebApp>>> = const { RefCell::new(None) };
    static LOAD_HANDLER: RefCell<Option<Closure<dyn FnMut(Event)>>> = const { RefCell::new(None) };
}

fn js_error(err: JsValue) -> ViewError {
    ViewError::browser(format!("{err:?}"))
}

fn to_js(err: ViewError) -> JsValue {
    JsError::new(&err.to_string()).into()
}

fn collect(collection: &HtmlCollection) -> Vec<Element> {
    (0..collection.length())
        .filter_map(|index| collection.item(index))
        .collect()
}

/// The live document.
pub struct WebDom {
    document: Document,
}

impl WebDom {
    pub fn new(document: Document) -> Self {
        Self { document }
    }

    fn body(&self) -> Result<HtmlElement, ViewError> {
        self.document
            .body()
            .ok_or_else(|| ViewError::browser("document body is unavailable"))
    }
}

impl Dom for WebDom {
    type Node = Element;

    fn element_by_id(&self, id: &str) -> Option<Element> {
        self.document.get_element_by_id(id)
    }

    fn elements_by_class(&self, class: &str) -> Vec<Element> {
        collect(&self.document.get_elements_by_class_name(class))
    }

    fn children(&self, node: &Element) -> Vec<Element> {
        collect(&node.children())
    }

    fn parent(&self, node: &Element) -> Option<Element> {
        node.parent_element()
    }

    fn descendants_by_tag(&self, node: &Element, tag: &str) -> Vec<Element> {
        collect(&node.get_elements_by_tag_name(tag))
    }

    fn descendants_by_class(&self, node: &Element, class: &str) -> Vec<Element> {
        collect(&node.get_elements_by_class_name(class))
    }

    fn id(&self, node: &Element) -> String {
        node.id()
    }

    fn set_id(&self, node: &Element, id: &str) {
        node.set_id(id);
    }

    fn attribute(&self, node: &Element, name: &str) -> Option<String> {
        node.get_attribute(name)
    }

    fn set_attribute(&self, node: &Element, name: &str, value: &str) -> Result<(), ViewError> {
        node.set_attribute(name, value).map_err(js_error)
    }

    fn remove_attribute(&self, node: &Element, name: &str) {
        let _ = node.remove_attribute(name);
    }

    fn text_content(&self, node: &Element) -> String {
        node.text_content().unwrap_or_default()
    }

    fn has_class(&self, node: &Element, class: &str) -> bool {
        node.class_list().contains(class)
    }

    fn add_class(&self, node: &Element, class: &str) {
        let _ = node.class_list().add_1(class);
    }

    fn remove_class(&self, node: &Element, class: &str) {
        let _ = node.class_list().remove_1(class);
    }

    fn value(&self, node: &Element) -> Option<String> {
        if let Some(input) = node.dyn_ref::<HtmlInputElement>() {
            Some(input.value())
        } else if let Some(area) = node.dyn_ref::<HtmlTextAreaElement>() {
            Some(area.value())
        } else {
            node.dyn_ref::<HtmlSelectElement>().map(HtmlSelectElement::value)
        }
    }

    fn set_value(&self, node: &Element, value: &str) {
        if let Some(input) = node.dyn_ref::<HtmlInputElement>() {
            input.set_value(value);
        } else if let Some(area) = node.dyn_ref::<HtmlTextAreaElement>() {
            area.set_value(value);
        } else if let Some(select) = node.dyn_ref::<HtmlSelectElement>() {
            select.set_value(value);
        }
    }

    fn set_checked(&self, node: &Element, checked: bool) {
        if let Some(input) = node.dyn_ref::<HtmlInputElement>() {
            input.set_checked(checked);
        }
    }

    fn set_disabled(&self, node: &Element, disabled: bool) {
        if let Some(input) = node.dyn_ref::<HtmlInputElement>() {
            input.set_disabled(disabled);
        } else if let Some(button) = node.dyn_ref::<HtmlButtonElement>() {
            button.set_disabled(disabled);
        } else if disabled {
            let _ = node.set_attribute("disabled", "");
        } else {
            let _ = node.remove_attribute("disabled");
        }
    }

    fn clone_after(&self, node: &Element) -> Result<Element, ViewError> {
        let copy = node
            .clone_node_with_deep(true)
            .map_err(js_error)?
            .dyn_into::<Element>()
            .map_err(|_| ViewError::browser("cloned node is not an element"))?;
        node.insert_adjacent_element("afterend", &copy)
            .map_err(js_error)?;
        Ok(copy)
    }

    fn remove(&self, node: &Element) {
        node.remove();
    }

    fn form_fields(&self, form: &Element) -> Result<Vec<(String, String)>, ViewError> {
        let form = form
            .dyn_ref::<HtmlFormElement>()
            .ok_or_else(|| ViewError::browser("submit target is not a form"))?;
        let data = web_sys::FormData::new_with_form(form).map_err(js_error)?;
        let entries = js_sys::try_iter(&data)
            .map_err(js_error)?
            .ok_or_else(|| ViewError::browser("form data is not iterable"))?;

        let mut fields = Vec::new();
        for entry in entries {
            let pair: Array = entry.map_err(js_error)?.unchecked_into();
            // File entries have no string value and are not forwarded.
            if let (Some(name), Some(value)) = (pair.get(0).as_string(), pair.get(1).as_string()) {
                fields.push((name, value));
            }
        }
        Ok(fields)
    }

    fn replace_body(&self, html: &str) -> Result<(), ViewError> {
        self.body()?.set_inner_html(html);
        Ok(())
    }

    fn reload_scripts(&self) -> Result<Vec<ScriptSource>, ViewError> {
        let body = self.body()?;
        let found = body.query_selector_all("script").map_err(js_error)?;

        let mut scripts = Vec::new();
        for index in 0..found.length() {
            let Some(old) = found
                .item(index)
                .and_then(|node| node.dyn_into::<HtmlScriptElement>().ok())
            else {
                continue;
            };
            let fresh = self
                .document
                .create_element("script")
                .map_err(js_error)?;
            let names = old.get_attribute_names();
            for name in names.iter().filter_map(|name| name.as_string()) {
                if let Some(value) = old.get_attribute(&name) {
                    fresh.set_attribute(&name, &value).map_err(js_error)?;
                }
            }
            let source = match old.get_attribute("src") {
                Some(src) => ScriptSource::External(src),
                None => {
                    let text = old.text_content().unwrap_or_default();
                    fresh.set_text_content(Some(&text));
                    ScriptSource::Inline(text)
                }
            };
            body.append_child(&fresh).map_err(js_error)?;
            scripts.push(source);
        }
        Ok(scripts)
    }
}

/// Location, history and dialogs of the browser window.
pub struct WebWindow {
    window: web_sys::Window,
}

impl WebWindow {
    pub fn new(window: web_sys::Window) -> Self {
        Self { window }
    }
}

impl Window for WebWindow {
    fn location(&self) -> Result<Url, ViewError> {
        let href = self.window.location().href().map_err(js_error)?;
        Ok(Url::parse(&href)?)
    }

    fn push_state(&self, url: &Url) -> Result<(), ViewError> {
        self.window
            .history()
            .map_err(js_error)?
            .push_state_with_url(&JsValue::NULL, "", Some(url.as_str()))
            .map_err(js_error)
    }

    fn navigate(&self, url: &Url) -> Result<(), ViewError> {
        self.window.location().set_href(url.as_str()).map_err(js_error)
    }

    fn prompt(&self, message: &str) -> Option<String> {
        self.window.prompt_with_message(message).ok().flatten()
    }

    fn alert(&self, message: &str) {
        let _ = self.window.alert_with_message(message);
    }
}

/// Editor object the page exposes on `document` under a property name.
/// Looked up on every refresh since page scripts may create it late.
struct JsViewer {
    document: Document,
    property: &'static str,
}

impl Viewer for JsViewer {
    fn refresh(&self) -> Result<(), ViewError> {
        let missing = || ViewError::MissingViewer(self.property.to_string());
        let viewer = Reflect::get(&self.document, &JsValue::from_str(self.property)).map_err(js_error)?;
        if viewer.is_undefined() || viewer.is_null() {
            return Err(missing());
        }
        let refresh = Reflect::get(&viewer, &JsValue::from_str("refresh"))
            .map_err(js_error)?
            .dyn_into::<Function>()
            .map_err(|_| missing())?;
        refresh.call0(&viewer).map_err(js_error)?;
        Ok(())
    }
}

fn js_string(value: &JsValue) -> Option<String> {
    value
        .as_string()
        .or_else(|| value.as_f64().map(|number| number.to_string()))
        .or_else(|| value.as_bool().map(|flag| flag.to_string()))
}

/// Reads `{ paths, queries, clean }`. Falsy query values become empty and
/// are skipped when the context is applied.
fn context_options(value: &JsValue) -> Result<ContextOptions, ViewError> {
    let mut options = ContextOptions::new();
    if value.is_undefined() || value.is_null() {
        return Ok(options);
    }

    let paths = Reflect::get(value, &JsValue::from_str("paths")).map_err(js_error)?;
    if Array::is_array(&paths) {
        options.paths = Array::from(&paths)
            .iter()
            .filter_map(|segment| js_string(&segment))
            .collect();
    }

    let queries = Reflect::get(value, &JsValue::from_str("queries")).map_err(js_error)?;
    if queries.is_object() {
        for entry in Object::entries(queries.unchecked_ref::<Object>()).iter() {
            let pair = Array::from(&entry);
            let Some(key) = pair.get(0).as_string() else {
                continue;
            };
            let raw = pair.get(1);
            let value = if raw.is_falsy() {
                String::new()
            } else {
                js_string(&raw).unwrap_or_default()
            };
            options.queries.push((key, value));
        }
    }

    options.clean = Reflect::get(value, &JsValue::from_str("clean"))
        .map_err(js_error)?
        .is_truthy();
    Ok(options)
}

fn setup_tracing(level: LogLevel) {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .without_time()
        .with_writer(MakeWebConsoleWriter::new());

    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::filter::LevelFilter::from_level(level.into()))
        .with(fmt_layer)
        .try_init();

    std::panic::set_hook(Box::new(|info| {
        tracing::error!("panic occurred: {:?}", info);
        console_error_panic_hook::hook(info);
    }));
}

fn boot() -> anyhow::Result<()> {
    let window = web_sys::window().context("window is unavailable")?;
    let document = window.document().context("document is unavailable")?;

    let dom = WebDom::new(document.clone());
    let config = ViewConfig::load(&dom);
    setup_tracing(config.log_level);

    let viewer = |property| JsViewer {
        document: document.clone(),
        property,
    };
    let viewers = Viewers::new()
        .with(ContentType::Json, viewer("jsonViewer"))
        .with(ContentType::Text, viewer("textViewer"))
        .with(ContentType::Html, viewer("htmlViewer"));

    let app = App::new(
        dom,
        WebWindow::new(window.clone()),
        ReqwestTransport::new(),
        config,
        viewers,
    );
    APP.with(|slot| *slot.borrow_mut() = Some(Rc::new(app)));

    let ready_state = Reflect::get(&document, &JsValue::from_str("readyState"))
        .ok()
        .and_then(|state| state.as_string());
    if ready_state.as_deref() == Some("complete") {
        run_load();
    } else {
        let callback = Closure::<dyn FnMut(Event)>::wrap(Box::new(move |_event: Event| run_load()));
        window
            .add_event_listener_with_callback("load", callback.as_ref().unchecked_ref())
            .map_err(|err| anyhow!("failed to install load handler: {err:?}"))?;
        LOAD_HANDLER.with(|slot| *slot.borrow_mut() = Some(callback));
    }

    tracing::info!("view layer started");
    Ok(())
}

fn run_load() {
    match app() {
        Ok(app) => match app.load() {
            Ok(ran) => tracing::debug!(ran, "init hooks ran"),
            Err(err) => tracing::error!(%err, "init hooks failed"),
        },
        Err(_) => tracing::warn!("load fired before the view layer started"),
    }
}

fn app() -> Result<Rc<WebApp>, JsValue> {
    APP.with(|slot| slot.borrow().clone())
        .ok_or_else(|| JsValue::from_str("view layer is not started"))
}

fn event_element(event: &Event) -> Result<Element, JsValue> {
    event
        .target()
        .and_then(|target| target.dyn_into::<Element>().ok())
        .ok_or_else(|| JsValue::from_str("event has no element target"))
}

/// The radio behind a clicked label, or the clicked input itself.
fn selected_control(event: &Event) -> Option<HtmlInputElement> {
    let target = event.target()?;
    if let Some(label) = target.dyn_ref::<HtmlLabelElement>() {
        return label.control()?.dyn_into::<HtmlInputElement>().ok();
    }
    target.dyn_into::<HtmlInputElement>().ok()
}

fn row_kind(kind: &str) -> Result<RowKind, JsValue> {
    kind.parse().map_err(to_js)
}

#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    boot().map_err(|err| JsValue::from_str(&format!("{err:#}")))
}

#[wasm_bindgen(js_name = showForm)]
pub fn show_form(event: Event, parent: String, form: String) -> Result<(), JsValue> {
    let selection = selected_control(&event).map(|input| (input.name(), input.value()));
    app()?
        .show_form(
            &parent,
            &form,
            selection.as_ref().map(|(name, value)| (name.as_str(), value.as_str())),
        )
        .map(|_| ())
        .map_err(to_js)
}

#[wasm_bindgen(js_name = showAuthForm)]
pub fn show_auth_form(form: String) -> Result<(), JsValue> {
    app()?.show_auth_form(&form).map(|_| ()).map_err(to_js)
}

#[wasm_bindgen(js_name = showBodyForm)]
pub fn show_body_form(form: String) -> Result<(), JsValue> {
    app()?.show_body_form(&form).map(|_| ()).map_err(to_js)
}

#[wasm_bindgen(js_name = showContainer)]
pub fn show_container(form: String) -> Result<(), JsValue> {
    app()?.show_container(&form).map(|_| ()).map_err(to_js)
}

#[wasm_bindgen(js_name = newRow)]
pub fn new_row(kind: String) -> Result<(), JsValue> {
    app()?.new_row(row_kind(&kind)?).map(|_| ()).map_err(to_js)
}

#[wasm_bindgen(js_name = removeRow)]
pub fn remove_row(event: Event, kind: String) -> Result<(), JsValue> {
    let control = event_element(&event)?;
    app()?
        .remove_row(row_kind(&kind)?, &control)
        .map(|_| ())
        .map_err(to_js)
}

#[wasm_bindgen(js_name = newQueryRow)]
pub fn new_query_row() -> Result<(), JsValue> {
    new_row(RowKind::Query.as_str().to_string())
}

#[wasm_bindgen(js_name = removeQueryRow)]
pub fn remove_query_row(event: Event) -> Result<(), JsValue> {
    remove_row(event, RowKind::Query.as_str().to_string())
}

#[wasm_bindgen(js_name = newHeaderRow)]
pub fn new_header_row() -> Result<(), JsValue> {
    new_row(RowKind::Header.as_str().to_string())
}

#[wasm_bindgen(js_name = removeHeaderRow)]
pub fn remove_header_row(event: Event) -> Result<(), JsValue> {
    remove_row(event, RowKind::Header.as_str().to_string())
}

#[wasm_bindgen(js_name = newVariableRow)]
pub fn new_variable_row() -> Result<(), JsValue> {
    new_row(RowKind::Variable.as_str().to_string())
}

#[wasm_bindgen(js_name = removeVariableRow)]
pub fn remove_variable_row(event: Event) -> Result<(), JsValue> {
    remove_row(event, RowKind::Variable.as_str().to_string())
}

#[wasm_bindgen(js_name = synchronizeBodies)]
pub fn synchronize_bodies(event: Event) -> Result<(), JsValue> {
    let source = event_element(&event)?;
    app()?.synchronize_bodies(&source).map(|_| ()).map_err(to_js)
}

#[wasm_bindgen(js_name = refreshResponseBody)]
pub fn refresh_response_body(element: Element) -> Result<(), JsValue> {
    app()?.refresh_viewer(&element).map_err(to_js)
}

#[wasm_bindgen(js_name = applyContext)]
pub fn apply_context(base: String, options: JsValue) -> Result<String, JsValue> {
    let options = context_options(&options).map_err(to_js)?;
    app()?
        .apply_context(&base, &options)
        .map(String::from)
        .map_err(to_js)
}

#[wasm_bindgen(js_name = updateContext)]
pub fn update_context(name: String, value: String) -> Result<(), JsValue> {
    app()?.update_context(&name, &value).map(|_| ()).map_err(to_js)
}

#[wasm_bindgen]
pub fn goto(base: String, options: JsValue) -> Result<(), JsValue> {
    let options = context_options(&options).map_err(to_js)?;
    app()?.goto(&base, &options).map(|_| ()).map_err(to_js)
}

#[wasm_bindgen(js_name = submitForm)]
pub async fn submit_form(event: Event, options: JsValue) -> Result<(), JsValue> {
    event.prevent_default();
    let form = event_element(&event)?;
    let options = context_options(&options).map_err(to_js)?;
    let app = app()?;
    app.submit_form(&form, &options).await.map_err(to_js)
}

/// A dismissed prompt was already reported with an alert.
fn settle(result: Result<(), ViewError>) -> Result<(), JsValue> {
    match result {
        Err(ViewError::Cancelled(_)) => Ok(()),
        other => other.map_err(to_js),
    }
}

#[wasm_bindgen(js_name = removeRequest)]
pub async fn remove_request(id: String, kind: Option<String>) -> Result<(), JsValue> {
    let app = app()?;
    settle(app.remove_request(&id, kind.as_deref()).await)
}

#[wasm_bindgen(js_name = updateRequest)]
pub async fn update_request(id: String, kind: Option<String>, name: String) -> Result<(), JsValue> {
    let app = app()?;
    settle(app.rename_request(&id, kind.as_deref(), &name).await)
}

#[wasm_bindgen(js_name = saveRequest)]
pub async fn save_request(name_input: String, do_request_input: String) -> Result<(), JsValue> {
    let app = app()?;
    settle(app.save_request(&name_input, &do_request_input).await)
}

#[wasm_bindgen(js_name = registerOnLoad)]
pub fn register_on_load(key: String, callback: Function) -> Result<(), JsValue> {
    let hook_key = key.clone();
    let hook: Hook = Rc::new(move || {
        callback
            .call0(&JsValue::NULL)
            .map(|_| ())
            .map_err(|err| ViewError::Hook {
                key: hook_key.clone(),
                message: format!("{err:?}"),
            })
    });
    app()?.register_hook(&key, hook).map_err(to_js)
}

#[wasm_bindgen(js_name = registerRefresh)]
pub fn register_refresh(name: String, callback: Function) -> Result<(), JsValue> {
    let hook: RefreshHook<WebDom> = Rc::new(move |_dom: &WebDom, panel: &Element| {
        callback.call1(&JsValue::NULL, panel).map(|_| ()).map_err(js_error)
    });
    app()?.register_refresh(&name, hook);
    Ok(())
}
