use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use url::Url;

use crate::components::{FieldMirror, PanelSwitcher, RefreshHook, RowCloner, Viewers};
use crate::config::ViewConfig;
use crate::context::{self, ContextOptions};
use crate::dom::{Dom, Window};
use crate::error::ViewError;
use crate::forms::{saved_request_url, FormInterceptor};
use crate::hooks::{Hook, InitHooks};
use crate::request::{FormRequest, Transport};
use crate::types::{HttpMethod, RowKind};

/// Refresh hook names the server templates put in `refresh` attributes.
pub const RESPONSE_REFRESH_HOOK: &str = "refreshResponseBody";
pub const BODY_REFRESH_HOOK: &str = "refreshBody";

const SAVE_CANCELED: &str = "Save request";

/// Page controller: owns the page seams and every view component.
///
/// All methods take `&self` so the controller can be shared behind an `Rc`
/// and re-entered from hooks; nothing is borrowed across an `await`.
pub struct App<D: Dom, W: Window, T: Transport> {
    dom: D,
    window: W,
    config: ViewConfig,
    panels: PanelSwitcher<D>,
    rows: HashMap<RowKind, RowCloner>,
    mirror: FieldMirror,
    viewers: Rc<Viewers>,
    forms: FormInterceptor<T>,
    hooks: RefCell<InitHooks>,
}

impl<D: Dom + 'static, W: Window, T: Transport> App<D, W, T> {
    pub fn new(dom: D, window: W, transport: T, config: ViewConfig, viewers: Viewers) -> Self {
        let viewers = Rc::new(viewers);
        let panels = PanelSwitcher::new(config.visible_class.clone());
        for name in [RESPONSE_REFRESH_HOOK, BODY_REFRESH_HOOK] {
            let viewers = Rc::clone(&viewers);
            let hook: RefreshHook<D> = Rc::new(move |dom: &D, panel: &D::Node| {
                viewers.refresh_for(dom, panel).map(|_| ())
            });
            panels.register_refresh(name, hook);
        }

        let rows = RowKind::ALL
            .into_iter()
            .map(|kind| {
                let cloner = RowCloner::new(config.rows(kind).clone(), config.visible_class.clone());
                (kind, cloner)
            })
            .collect();

        Self {
            mirror: FieldMirror::new(config.mirror_class.clone()),
            forms: FormInterceptor::new(transport),
            hooks: RefCell::new(InitHooks::new()),
            dom,
            window,
            config,
            panels,
            rows,
            viewers,
        }
    }

    pub fn dom(&self) -> &D {
        &self.dom
    }

    pub fn window(&self) -> &W {
        &self.window
    }

    pub fn transport(&self) -> &T {
        self.forms.transport()
    }

    // Panels

    /// Switches `container` to `target` and records the selecting control's
    /// `name=value` in the address bar.
    pub fn show_form(
        &self,
        container: &str,
        target: &str,
        selection: Option<(&str, &str)>,
    ) -> Result<Option<D::Node>, ViewError> {
        let shown = self.panels.show(&self.dom, container, target)?;
        if shown.is_some() {
            if let Some((name, value)) = selection.filter(|(name, _)| !name.is_empty()) {
                context::update_context(&self.window, name, value)?;
            }
        }
        Ok(shown)
    }

    pub fn show_auth_form(&self, target: &str) -> Result<Option<D::Node>, ViewError> {
        self.panels.show(&self.dom, &self.config.auth_form, target)
    }

    pub fn show_body_form(&self, target: &str) -> Result<Option<D::Node>, ViewError> {
        self.panels.show(&self.dom, &self.config.body_form, target)
    }

    pub fn show_container(&self, target: &str) -> Result<Option<D::Node>, ViewError> {
        self.panels.show(&self.dom, &self.config.response_container, target)
    }

    pub fn register_refresh(&self, name: &str, hook: RefreshHook<D>) {
        self.panels.register_refresh(name, hook);
    }

    /// Refreshes the viewer named by the `target` attribute of `element`.
    pub fn refresh_viewer(&self, element: &D::Node) -> Result<(), ViewError> {
        self.viewers.refresh_for(&self.dom, element).map(|_| ())
    }

    // Rows

    fn cloner(&self, kind: RowKind) -> Result<&RowCloner, ViewError> {
        self.rows
            .get(&kind)
            .ok_or_else(|| ViewError::UnknownRowKind(kind.as_str().to_string()))
    }

    pub fn new_row(&self, kind: RowKind) -> Result<D::Node, ViewError> {
        self.cloner(kind)?.add_row(&self.dom)
    }

    pub fn remove_row(&self, kind: RowKind, control: &D::Node) -> Result<bool, ViewError> {
        Ok(self.cloner(kind)?.remove_row(&self.dom, control))
    }

    // Bodies

    /// Mirrors `source` into every body field, then refreshes the viewer its
    /// `target` attribute names.
    pub fn synchronize_bodies(&self, source: &D::Node) -> Result<usize, ViewError> {
        let written = self.mirror.propagate(&self.dom, source);
        self.refresh_viewer(source)?;
        Ok(written)
    }

    // Navigation context

    pub fn apply_context(&self, base: &str, options: &ContextOptions) -> Result<Url, ViewError> {
        context::apply_context(&self.window.location()?, base, options)
    }

    pub fn update_context(&self, name: &str, value: &str) -> Result<Url, ViewError> {
        context::update_context(&self.window, name, value)
    }

    pub fn goto(&self, base: &str, options: &ContextOptions) -> Result<Url, ViewError> {
        context::goto(&self.window, base, options)
    }

    // Submission

    pub async fn submit_form(&self, form: &D::Node, options: &ContextOptions) -> Result<(), ViewError> {
        let request = self.forms.prepare(&self.dom, &self.window, form, options)?;
        self.dispatch(request).await
    }

    pub async fn remove_request(&self, id: &str, kind: Option<&str>) -> Result<(), ViewError> {
        let url = saved_request_url(&self.window.location()?, &self.config.client_endpoint, id, kind)?;
        self.dispatch(FormRequest::new(HttpMethod::Delete, url)).await
    }

    /// Asks for a new name and renames the saved request. Dismissing the
    /// prompt aborts before anything is sent.
    pub async fn rename_request(&self, id: &str, kind: Option<&str>, name: &str) -> Result<(), ViewError> {
        let Some(new_name) = self.window.prompt(&format!("New request name for {name}:")) else {
            return Err(self.cancel());
        };
        let url = saved_request_url(&self.window.location()?, &self.config.client_endpoint, id, kind)?;
        self.dispatch(FormRequest::new(HttpMethod::Put, url).field("name", &new_name))
            .await
    }

    /// Saves the client form without executing it: the do-request flag is
    /// forced to `false` while the form is serialized, then restored.
    pub async fn save_request(&self, name_input: &str, do_request_input: &str) -> Result<(), ViewError> {
        let name_field = self.element(name_input)?;
        let do_request_field = self.element(do_request_input)?;
        let form = self.element(&self.config.client_form)?;

        let mut name = self.dom.value(&name_field).unwrap_or_default();
        if name.is_empty() {
            match self.window.prompt("Request name:") {
                Some(answer) => name = answer,
                None => return Err(self.cancel()),
            }
        }
        self.dom.set_value(&name_field, &name);

        let do_request = self.dom.value(&do_request_field).unwrap_or_default();
        self.dom.set_value(&do_request_field, "false");
        let request = self
            .forms
            .prepare(&self.dom, &self.window, &form, &ContextOptions::default());
        self.dom.set_value(&do_request_field, &do_request);

        self.dispatch(request?).await
    }

    fn element(&self, id: &str) -> Result<D::Node, ViewError> {
        self.dom
            .element_by_id(id)
            .ok_or_else(|| ViewError::MissingElement(id.to_string()))
    }

    fn cancel(&self) -> ViewError {
        let err = ViewError::Cancelled(SAVE_CANCELED);
        self.window.alert(&err.to_string());
        err
    }

    async fn dispatch(&self, request: FormRequest) -> Result<(), ViewError> {
        let method = request.method;
        let url = request.url.to_string();
        match self.forms.send(request).await {
            Ok(html) => self.swap_body(&html),
            Err(err) => {
                tracing::error!(%method, %url, %err, "Error sending request");
                Err(err)
            }
        }
    }

    /// Replaces the page body, re-runs its scripts and starts a fresh hook
    /// pass so the new fragments mount themselves.
    pub fn swap_body(&self, html: &str) -> Result<(), ViewError> {
        self.dom.replace_body(html)?;
        self.hooks.borrow_mut().reset();
        let scripts = self.dom.reload_scripts()?;
        tracing::debug!(scripts = scripts.len(), "body replaced");
        self.load().map(|_| ())
    }

    // Init hooks

    /// Registers an init hook. Once the current pass has loaded, the hook
    /// runs right away instead of waiting for a load that already happened.
    pub fn register_hook(&self, key: &str, hook: Hook) -> Result<(), ViewError> {
        let loaded = {
            let mut hooks = self.hooks.borrow_mut();
            hooks.register(key, Rc::clone(&hook));
            hooks.is_loaded()
        };
        if loaded {
            hook()?;
        }
        Ok(())
    }

    /// Runs the registered hooks once for the current pass.
    pub fn load(&self) -> Result<usize, ViewError> {
        let batch = self.hooks.borrow_mut().start_load();
        match batch {
            Some(batch) => batch.run(),
            None => Ok(0),
        }
    }

    pub fn hook_keys(&self) -> Vec<String> {
        self.hooks.borrow().keys().map(String::from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::ScriptSource;
    use crate::memory::{MemoryDom, MemoryTransport, MemoryWindow, NodeId};
    use crate::types::ContentType;
    use std::cell::Cell;

    type TestApp = App<MemoryDom, MemoryWindow, MemoryTransport>;

    struct Page {
        app: Rc<TestApp>,
        json_refreshes: Rc<Cell<u32>>,
    }

    fn page(location: &str) -> Page {
        let json_refreshes = Rc::new(Cell::new(0));
        let counter = Rc::clone(&json_refreshes);
        let viewers = Viewers::new().with(ContentType::Json, move || -> Result<(), ViewError> {
            counter.set(counter.get() + 1);
            Ok(())
        });
        let app = App::new(
            MemoryDom::new(),
            MemoryWindow::new(location).unwrap(),
            MemoryTransport::new(),
            ViewConfig::default(),
            viewers,
        );
        Page {
            app: Rc::new(app),
            json_refreshes,
        }
    }

    fn client_form(app: &TestApp) -> (NodeId, NodeId, NodeId) {
        let dom = app.dom();
        let form = dom.append(
            dom.body(),
            "form",
            &[("id", "client-form"), ("method", "post"), ("action", "/client")],
        );
        let name = dom.append(form, "input", &[("id", "name"), ("name", "name")]);
        let do_request = dom.append(
            form,
            "input",
            &[("id", "do-request"), ("name", "do-request"), ("value", "true")],
        );
        (form, name, do_request)
    }

    #[test]
    fn show_form_records_the_selection_in_the_url() {
        let page = page("http://localhost/client");
        let dom = page.app.dom();
        let container = dom.append(dom.body(), "div", &[("id", "body-type-form")]);
        dom.append(container, "div", &[("id", "body-none"), ("class", "show")]);
        let json = dom.append(
            container,
            "div",
            &[("id", "body-json"), ("refresh", RESPONSE_REFRESH_HOOK), ("target", "json")],
        );

        let shown = page
            .app
            .show_form("body-type-form", "body-json", Some(("body-type", "json")))
            .unwrap();

        assert_eq!(shown, Some(json));
        assert_eq!(page.json_refreshes.get(), 1);
        assert_eq!(
            page.app.window().history().last().map(Url::as_str),
            Some("http://localhost/client?body-type=json")
        );
    }

    #[test]
    fn convenience_switches_leave_the_url_alone() {
        let page = page("http://localhost/client");
        let dom = page.app.dom();
        let container = dom.append(dom.body(), "div", &[("id", "response-container")]);
        dom.append(container, "div", &[("id", "response-text"), ("class", "show")]);
        let html = dom.append(container, "div", &[("id", "response-html")]);

        assert_eq!(page.app.show_container("response-html").unwrap(), Some(html));
        assert!(page.app.window().history().is_empty());
    }

    #[test]
    fn rows_use_the_configured_templates() {
        let page = page("http://localhost/client");
        let dom = page.app.dom();
        let template = dom.append(dom.body(), "div", &[("id", "query-parameter-template")]);
        let label = dom.append(template, "label", &[("for", "query-key")]);
        dom.append(label, "input", &[("name", "query-key")]);
        dom.append(template, "button", &[("class", "query-remove-button")]);

        let row = page.app.new_row(RowKind::Query).unwrap();
        let input = dom.descendants_by_tag(&row, "input")[0];
        let name = dom.attribute(&input, "name").unwrap();
        assert_eq!(row, template);
        assert!(name.starts_with("query-key#"));

        let next = dom.element_by_id("query-parameter-template").unwrap();
        let template_button = dom.descendants_by_class(&next, "query-remove-button")[0];
        assert!(!page.app.remove_row(RowKind::Query, &template_button).unwrap());
        let row_button = dom.descendants_by_class(&row, "query-remove-button")[0];
        assert!(page.app.remove_row(RowKind::Query, &row_button).unwrap());
        assert!(!dom.is_attached(row));
        assert!(dom.is_attached(next));
    }

    #[test]
    fn synchronize_bodies_mirrors_and_refreshes() {
        let page = page("http://localhost/client");
        let dom = page.app.dom();
        let raw = dom.append(
            dom.body(),
            "textarea",
            &[("class", "body-parameter"), ("target", "JSON")],
        );
        let other = dom.append(dom.body(), "input", &[("class", "body-parameter")]);
        dom.set_value(&raw, "[1, 2]");

        assert_eq!(page.app.synchronize_bodies(&raw).unwrap(), 2);
        assert_eq!(dom.value(&other).as_deref(), Some("[1, 2]"));
        assert_eq!(page.json_refreshes.get(), 1);
    }

    #[tokio::test]
    async fn successful_submit_swaps_body_and_reruns_scripts() {
        let page = page("http://localhost/client");
        let (form, _, _) = client_form(&page.app);
        page.app
            .transport()
            .respond(200, "<main>done</main><script>registerOnLoad('x', f)</script>");

        page.app
            .submit_form(&form, &ContextOptions::new().query("tab", "headers"))
            .await
            .unwrap();

        let dom = page.app.dom();
        assert!(!dom.is_attached(form));
        assert_eq!(
            dom.body_html().as_deref(),
            Some("<main>done</main><script>registerOnLoad('x', f)</script>")
        );
        assert_eq!(
            dom.executed_scripts(),
            vec![ScriptSource::Inline("registerOnLoad('x', f)".to_string())]
        );
        let requests = page.app.transport().requests();
        let request = &requests[0];
        assert_eq!(request.url.as_str(), "http://localhost/client?tab=headers");
        assert_eq!(page.app.window().history(), vec![request.url.clone()]);
    }

    #[tokio::test]
    async fn failed_submit_never_touches_the_body() {
        let page = page("http://localhost/client");
        let (form, _, _) = client_form(&page.app);
        page.app.transport().respond(404, "<p>missing</p>");

        let err = page
            .app
            .submit_form(&form, &ContextOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ViewError::HttpStatus(404)));
        assert!(page.app.dom().is_attached(form));
        assert_eq!(page.app.dom().body_html(), None);
        assert!(page.app.dom().executed_scripts().is_empty());
    }

    #[tokio::test]
    async fn remove_request_deletes_by_id_and_kind() {
        let page = page("http://localhost/client/9");

        page.app.remove_request("9", Some("historic")).await.unwrap();
        page.app.remove_request("9", None).await.unwrap();

        let requests = page.app.transport().requests();
        assert_eq!(requests[0].method, HttpMethod::Delete);
        assert_eq!(requests[0].url.as_str(), "http://localhost/client/9?historic");
        assert_eq!(requests[1].url.as_str(), "http://localhost/client/9");
    }

    #[tokio::test]
    async fn rename_request_sends_the_new_name() {
        let page = page("http://localhost/client");
        page.app.window().answer_prompt(Some("Get users"));

        page.app
            .rename_request("4", Some("collection"), "Old name")
            .await
            .unwrap();

        assert_eq!(page.app.window().prompts(), vec!["New request name for Old name:"]);
        let requests = page.app.transport().requests();
        let request = &requests[0];
        assert_eq!(request.method, HttpMethod::Put);
        assert_eq!(request.url.as_str(), "http://localhost/client/4?collection");
        assert_eq!(request.fields, vec![("name".to_string(), "Get users".to_string())]);
    }

    #[tokio::test]
    async fn cancelled_rename_alerts_and_sends_nothing() {
        let page = page("http://localhost/client");
        page.app.window().answer_prompt(None);

        let err = page.app.rename_request("4", None, "Old").await.unwrap_err();

        assert!(matches!(err, ViewError::Cancelled(_)));
        assert_eq!(page.app.window().alerts(), vec!["Save request canceled."]);
        assert_eq!(page.app.transport().sent(), 0);
    }

    #[tokio::test]
    async fn save_request_prompts_for_a_name_and_restores_the_flag() {
        let page = page("http://localhost/client");
        let (_, name, do_request) = client_form(&page.app);
        page.app.window().answer_prompt(Some("Users"));

        page.app.save_request("name", "do-request").await.unwrap();

        let requests = page.app.transport().requests();
        let request = &requests[0];
        assert_eq!(
            request.fields,
            vec![
                ("name".to_string(), "Users".to_string()),
                ("do-request".to_string(), "false".to_string()),
            ]
        );
        assert_eq!(page.app.dom().value(&name).as_deref(), Some("Users"));
        assert_eq!(page.app.dom().value(&do_request).as_deref(), Some("true"));
    }

    #[tokio::test]
    async fn save_request_with_a_name_skips_the_prompt() {
        let page = page("http://localhost/client");
        let (_, name, _) = client_form(&page.app);
        page.app.dom().set_value(&name, "Existing");

        page.app.save_request("name", "do-request").await.unwrap();

        assert!(page.app.window().prompts().is_empty());
        assert_eq!(page.app.transport().sent(), 1);
    }

    #[tokio::test]
    async fn cancelled_save_alerts_and_sends_nothing() {
        let page = page("http://localhost/client");
        client_form(&page.app);

        let err = page.app.save_request("name", "do-request").await.unwrap_err();

        assert!(matches!(err, ViewError::Cancelled(_)));
        assert_eq!(page.app.window().alerts(), vec!["Save request canceled."]);
        assert_eq!(page.app.transport().sent(), 0);
    }

    #[test]
    fn load_runs_hooks_once_in_order() {
        let page = page("http://localhost/client");
        let log = Rc::new(RefCell::new(Vec::new()));
        for key in ["auth", "body"] {
            let log = Rc::clone(&log);
            page.app
                .register_hook(key, Rc::new(move || {
                    log.borrow_mut().push(key);
                    Ok(())
                }))
                .unwrap();
        }

        assert_eq!(page.app.load().unwrap(), 2);
        assert_eq!(page.app.load().unwrap(), 0);
        assert_eq!(*log.borrow(), vec!["auth", "body"]);
    }

    #[test]
    fn late_hooks_run_immediately_and_may_reenter_the_app() {
        let page = page("http://localhost/client");
        page.app.load().unwrap();
        let dom = page.app.dom();
        let container = dom.append(dom.body(), "div", &[("id", "auth-type-form")]);
        let basic = dom.append(container, "div", &[("id", "auth-basic")]);

        let app = Rc::clone(&page.app);
        page.app
            .register_hook("auth", Rc::new(move || {
                app.show_auth_form("auth-basic").map(|_| ())
            }))
            .unwrap();

        assert!(dom.has_class(&basic, "show"));
    }

    #[test]
    fn swap_body_drops_stale_hooks_and_starts_a_new_pass() {
        let page = page("http://localhost/client");
        let runs = Rc::new(Cell::new(0));
        let counter = Rc::clone(&runs);
        page.app
            .register_hook("stale", Rc::new(move || {
                counter.set(counter.get() + 1);
                Ok(())
            }))
            .unwrap();
        page.app.load().unwrap();

        page.app.swap_body("<p>fresh</p>").unwrap();

        assert_eq!(runs.get(), 1);
        assert!(page.app.hook_keys().is_empty());

        let counter = Rc::clone(&runs);
        page.app
            .register_hook("fresh", Rc::new(move || {
                counter.set(counter.get() + 10);
                Ok(())
            }))
            .unwrap();
        assert_eq!(runs.get(), 11);
    }

    #[test]
    fn hooks_registered_by_reloaded_scripts_run_once_in_the_fresh_pass() {
        let page = page("http://localhost/client");
        page.app.load().unwrap();

        let runs = Rc::new(Cell::new(0));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let app = Rc::downgrade(&page.app);
        let counter = Rc::clone(&runs);
        let scripts = Rc::clone(&seen);
        page.app.dom().on_script_reload(move |reloaded| {
            scripts.borrow_mut().extend(reloaded.iter().cloned());
            let Some(app) = app.upgrade() else {
                return;
            };
            let counter = Rc::clone(&counter);
            app.register_hook(
                "editor",
                Rc::new(move || {
                    counter.set(counter.get() + 1);
                    Ok(())
                }),
            )
            .unwrap();
        });

        page.app
            .swap_body(r#"<div id="editor"></div><script src="/static/editor.js"></script>"#)
            .unwrap();

        assert_eq!(runs.get(), 1);
        assert_eq!(
            *seen.borrow(),
            vec![ScriptSource::External("/static/editor.js".to_string())]
        );
        assert_eq!(page.app.hook_keys(), vec!["editor".to_string()]);
        assert_eq!(page.app.load().unwrap(), 0);
        assert_eq!(runs.get(), 1);
    }
}
