//! In-memory page: a small element tree, a window with scripted dialogs and a
//! transport with canned responses. Used by the tests and by anything that
//! wants to drive the view logic without a browser.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;
use std::sync::OnceLock;

use regex::Regex;
use url::Url;

use crate::dom::{Dom, ScriptSource, Window};
use crate::error::ViewError;
use crate::request::{FormRequest, HtmlResponse, Transport};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Clone, Debug, Default)]
struct Element {
    tag: String,
    attributes: BTreeMap<String, String>,
    classes: Vec<String>,
    value: Option<String>,
    checked: bool,
    disabled: bool,
    text: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Element {
    fn new(tag: &str) -> Self {
        let tag = tag.to_lowercase();
        let value = is_form_control(&tag).then(String::new);
        Self {
            tag,
            value,
            ..Default::default()
        }
    }
}

fn is_form_control(tag: &str) -> bool {
    matches!(tag, "input" | "textarea" | "select")
}

/// Element tree rooted at a `<body>`.
///
/// Markup passed to [`Dom::replace_body`] is kept opaque: the tree is emptied,
/// the markup is stored, and only its `<script>` tags are picked out so that
/// [`Dom::reload_scripts`] can report them.
pub struct MemoryDom {
    nodes: RefCell<Vec<Element>>,
    body: NodeId,
    body_html: RefCell<Option<String>>,
    markup_scripts: RefCell<Vec<ScriptSource>>,
    executed: RefCell<Vec<ScriptSource>>,
    on_reload: RefCell<Option<ScriptRunner>>,
}

/// Stands in for the reloaded scripts executing.
type ScriptRunner = Rc<dyn Fn(&[ScriptSource])>;

impl Default for MemoryDom {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDom {
    pub fn new() -> Self {
        Self {
            nodes: RefCell::new(vec![Element::new("body")]),
            body: NodeId(0),
            body_html: RefCell::new(None),
            markup_scripts: RefCell::new(Vec::new()),
            executed: RefCell::new(Vec::new()),
            on_reload: RefCell::new(None),
        }
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    /// Appends a new element to `parent`.
    ///
    /// `class` is split into classes, `value`/`checked`/`disabled` set the
    /// control state, everything else becomes a plain attribute.
    pub fn append(&self, parent: NodeId, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
        let mut element = Element::new(tag);
        for (name, value) in attrs {
            match *name {
                "class" => element.classes = value.split_whitespace().map(String::from).collect(),
                "value" => element.value = Some(value.to_string()),
                "checked" => element.checked = true,
                "disabled" => element.disabled = true,
                _ => {
                    element.attributes.insert(name.to_string(), value.to_string());
                }
            }
        }
        element.parent = Some(parent);

        let mut nodes = self.nodes.borrow_mut();
        let id = NodeId(nodes.len());
        nodes.push(element);
        nodes[parent.0].children.push(id);
        id
    }

    /// Runs `run` every time scripts are reloaded, after they are recorded.
    pub fn on_script_reload(&self, run: impl Fn(&[ScriptSource]) + 'static) {
        *self.on_reload.borrow_mut() = Some(Rc::new(run));
    }

    pub fn set_text(&self, node: NodeId, text: &str) {
        self.nodes.borrow_mut()[node.0].text = text.to_string();
    }

    pub fn is_checked(&self, node: NodeId) -> bool {
        self.nodes.borrow()[node.0].checked
    }

    pub fn is_disabled(&self, node: NodeId) -> bool {
        self.nodes.borrow()[node.0].disabled
    }

    /// Whether `node` is still reachable from the body.
    pub fn is_attached(&self, node: NodeId) -> bool {
        let nodes = self.nodes.borrow();
        let mut current = Some(node);
        while let Some(id) = current {
            if id == self.body {
                return true;
            }
            current = nodes[id.0].parent;
        }
        false
    }

    /// Markup of the last body replacement.
    pub fn body_html(&self) -> Option<String> {
        self.body_html.borrow().clone()
    }

    pub fn executed_scripts(&self) -> Vec<ScriptSource> {
        self.executed.borrow().clone()
    }

    fn walk(&self, root: NodeId, include_root: bool) -> Vec<NodeId> {
        let nodes = self.nodes.borrow();
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if id != root || include_root {
                out.push(id);
            }
            stack.extend(nodes[id.0].children.iter().rev().copied());
        }
        out
    }

    fn copy_subtree(&self, source: NodeId, parent: Option<NodeId>) -> NodeId {
        let (mut element, children) = {
            let nodes = self.nodes.borrow();
            let element = nodes[source.0].clone();
            let children = element.children.clone();
            (element, children)
        };
        element.parent = parent;
        element.children.clear();

        let id = {
            let mut nodes = self.nodes.borrow_mut();
            nodes.push(element);
            NodeId(nodes.len() - 1)
        };
        for child in children {
            let copy = self.copy_subtree(child, Some(id));
            self.nodes.borrow_mut()[id.0].children.push(copy);
        }
        id
    }

    fn detach(&self, node: NodeId) {
        let mut nodes = self.nodes.borrow_mut();
        if let Some(parent) = nodes[node.0].parent.take() {
            nodes[parent.0].children.retain(|child| *child != node);
        }
    }
}

fn script_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?is)<script\b([^>]*)>(.*?)</script\s*>").expect("script pattern is valid")
    })
}

fn src_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?i)\bsrc\s*=\s*["']([^"']*)["']"#).expect("src pattern is valid")
    })
}

/// Scripts in document order, external ones by `src`.
pub fn scripts_in_markup(html: &str) -> Vec<ScriptSource> {
    script_pattern()
        .captures_iter(html)
        .map(|captures| {
            let attributes = captures.get(1).map_or("", |m| m.as_str());
            match src_pattern().captures(attributes) {
                Some(src) => ScriptSource::External(src[1].to_string()),
                None => ScriptSource::Inline(captures[2].to_string()),
            }
        })
        .collect()
}

impl Dom for MemoryDom {
    type Node = NodeId;

    fn element_by_id(&self, id: &str) -> Option<NodeId> {
        if id.is_empty() {
            return None;
        }
        self.walk(self.body, false)
            .into_iter()
            .find(|node| self.id(node) == id)
    }

    fn elements_by_class(&self, class: &str) -> Vec<NodeId> {
        self.descendants_by_class(&self.body, class)
    }

    fn children(&self, node: &NodeId) -> Vec<NodeId> {
        self.nodes.borrow()[node.0].children.clone()
    }

    fn parent(&self, node: &NodeId) -> Option<NodeId> {
        self.nodes.borrow()[node.0].parent
    }

    fn descendants_by_tag(&self, node: &NodeId, tag: &str) -> Vec<NodeId> {
        let tag = tag.to_lowercase();
        self.walk(*node, false)
            .into_iter()
            .filter(|id| self.nodes.borrow()[id.0].tag == tag)
            .collect()
    }

    fn descendants_by_class(&self, node: &NodeId, class: &str) -> Vec<NodeId> {
        self.walk(*node, false)
            .into_iter()
            .filter(|id| self.has_class(id, class))
            .collect()
    }

    fn id(&self, node: &NodeId) -> String {
        self.attribute(node, "id").unwrap_or_default()
    }

    fn set_id(&self, node: &NodeId, id: &str) {
        self.nodes.borrow_mut()[node.0]
            .attributes
            .insert("id".to_string(), id.to_string());
    }

    fn attribute(&self, node: &NodeId, name: &str) -> Option<String> {
        self.nodes.borrow()[node.0].attributes.get(name).cloned()
    }

    fn set_attribute(&self, node: &NodeId, name: &str, value: &str) -> Result<(), ViewError> {
        self.nodes.borrow_mut()[node.0]
            .attributes
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn remove_attribute(&self, node: &NodeId, name: &str) {
        self.nodes.borrow_mut()[node.0].attributes.remove(name);
    }

    fn text_content(&self, node: &NodeId) -> String {
        let nodes = self.nodes.borrow();
        let mut text = nodes[node.0].text.clone();
        drop(nodes);
        for child in self.walk(*node, false) {
            text.push_str(&self.nodes.borrow()[child.0].text);
        }
        text
    }

    fn has_class(&self, node: &NodeId, class: &str) -> bool {
        self.nodes.borrow()[node.0]
            .classes
            .iter()
            .any(|c| c == class)
    }

    fn add_class(&self, node: &NodeId, class: &str) {
        if !self.has_class(node, class) {
            self.nodes.borrow_mut()[node.0].classes.push(class.to_string());
        }
    }

    fn remove_class(&self, node: &NodeId, class: &str) {
        self.nodes.borrow_mut()[node.0].classes.retain(|c| c != class);
    }

    fn value(&self, node: &NodeId) -> Option<String> {
        self.nodes.borrow()[node.0].value.clone()
    }

    fn set_value(&self, node: &NodeId, value: &str) {
        self.nodes.borrow_mut()[node.0].value = Some(value.to_string());
    }

    fn set_checked(&self, node: &NodeId, checked: bool) {
        self.nodes.borrow_mut()[node.0].checked = checked;
    }

    fn set_disabled(&self, node: &NodeId, disabled: bool) {
        self.nodes.borrow_mut()[node.0].disabled = disabled;
    }

    fn clone_after(&self, node: &NodeId) -> Result<NodeId, ViewError> {
        let parent = self
            .parent(node)
            .ok_or_else(|| ViewError::browser("cannot insert after a detached element"))?;
        let copy = self.copy_subtree(*node, Some(parent));

        let mut nodes = self.nodes.borrow_mut();
        let siblings = &mut nodes[parent.0].children;
        let position = siblings
            .iter()
            .position(|child| child == node)
            .map_or(siblings.len(), |index| index + 1);
        siblings.insert(position, copy);
        Ok(copy)
    }

    fn remove(&self, node: &NodeId) {
        self.detach(*node);
    }

    fn form_fields(&self, form: &NodeId) -> Result<Vec<(String, String)>, ViewError> {
        let mut fields = Vec::new();
        for id in self.walk(*form, false) {
            let nodes = self.nodes.borrow();
            let element = &nodes[id.0];
            if !is_form_control(&element.tag) || element.disabled {
                continue;
            }
            let Some(name) = element.attributes.get("name").filter(|n| !n.is_empty()) else {
                continue;
            };
            let kind = element
                .attributes
                .get("type")
                .map(|t| t.to_lowercase())
                .unwrap_or_default();
            match kind.as_str() {
                "checkbox" | "radio" if !element.checked => continue,
                "checkbox" | "radio" => {
                    let value = element.value.clone().filter(|v| !v.is_empty());
                    fields.push((name.clone(), value.unwrap_or_else(|| "on".to_string())));
                }
                "submit" | "button" | "reset" | "file" => continue,
                _ => fields.push((name.clone(), element.value.clone().unwrap_or_default())),
            }
        }
        Ok(fields)
    }

    fn replace_body(&self, html: &str) -> Result<(), ViewError> {
        for child in self.children(&self.body) {
            self.detach(child);
        }
        *self.body_html.borrow_mut() = Some(html.to_string());
        *self.markup_scripts.borrow_mut() = scripts_in_markup(html);
        Ok(())
    }

    fn reload_scripts(&self) -> Result<Vec<ScriptSource>, ViewError> {
        let mut scripts = self.markup_scripts.borrow().clone();
        for node in self.descendants_by_tag(&self.body, "script") {
            let script = match self.attribute(&node, "src") {
                Some(src) => ScriptSource::External(src),
                None => ScriptSource::Inline(self.text_content(&node)),
            };
            scripts.push(script);
        }
        self.executed.borrow_mut().extend(scripts.iter().cloned());

        let runner = self.on_reload.borrow().clone();
        if let Some(run) = runner {
            run(&scripts);
        }
        Ok(scripts)
    }
}

/// Location, history and dialogs without a browser.
pub struct MemoryWindow {
    location: RefCell<Url>,
    history: RefCell<Vec<Url>>,
    navigations: RefCell<Vec<Url>>,
    answers: RefCell<VecDeque<Option<String>>>,
    prompts: RefCell<Vec<String>>,
    alerts: RefCell<Vec<String>>,
}

impl MemoryWindow {
    pub fn new(location: &str) -> Result<Self, ViewError> {
        Ok(Self {
            location: RefCell::new(Url::parse(location)?),
            history: RefCell::new(Vec::new()),
            navigations: RefCell::new(Vec::new()),
            answers: RefCell::new(VecDeque::new()),
            prompts: RefCell::new(Vec::new()),
            alerts: RefCell::new(Vec::new()),
        })
    }

    /// Queues the answer for the next prompt; `None` dismisses it.
    /// Prompts with nothing queued are dismissed.
    pub fn answer_prompt(&self, answer: Option<&str>) {
        self.answers.borrow_mut().push_back(answer.map(String::from));
    }

    pub fn history(&self) -> Vec<Url> {
        self.history.borrow().clone()
    }

    pub fn navigations(&self) -> Vec<Url> {
        self.navigations.borrow().clone()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.borrow().clone()
    }

    pub fn alerts(&self) -> Vec<String> {
        self.alerts.borrow().clone()
    }
}

impl Window for MemoryWindow {
    fn location(&self) -> Result<Url, ViewError> {
        Ok(self.location.borrow().clone())
    }

    fn push_state(&self, url: &Url) -> Result<(), ViewError> {
        *self.location.borrow_mut() = url.clone();
        self.history.borrow_mut().push(url.clone());
        Ok(())
    }

    fn navigate(&self, url: &Url) -> Result<(), ViewError> {
        *self.location.borrow_mut() = url.clone();
        self.navigations.borrow_mut().push(url.clone());
        Ok(())
    }

    fn prompt(&self, message: &str) -> Option<String> {
        self.prompts.borrow_mut().push(message.to_string());
        self.answers.borrow_mut().pop_front().flatten()
    }

    fn alert(&self, message: &str) {
        self.alerts.borrow_mut().push(message.to_string());
    }
}

/// Transport answering from a queue of canned responses and recording every
/// request it was given. An empty queue answers `200` with an empty body.
#[derive(Default)]
pub struct MemoryTransport {
    responses: RefCell<VecDeque<HtmlResponse>>,
    requests: RefCell<Vec<FormRequest>>,
    sent: Cell<usize>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, status: u16, body: &str) {
        self.responses.borrow_mut().push_back(HtmlResponse {
            status,
            body: body.to_string(),
        });
    }

    pub fn requests(&self) -> Vec<FormRequest> {
        self.requests.borrow().clone()
    }

    pub fn sent(&self) -> usize {
        self.sent.get()
    }
}

impl Transport for MemoryTransport {
    async fn send(&self, request: FormRequest) -> Result<HtmlResponse, ViewError> {
        self.sent.set(self.sent.get() + 1);
        self.requests.borrow_mut().push(request);
        Ok(self
            .responses
            .borrow_mut()
            .pop_front()
            .unwrap_or(HtmlResponse {
                status: 200,
                body: String::new(),
            }))
    }
}
