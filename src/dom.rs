//! Seams between the view logic and the page it drives.
//!
//! [`Dom`] is the document, [`Window`] is location, history and the blocking
//! dialogs. Both take `&self`: the browser objects behind them are shared and
//! mutated through handles, and the in-memory versions mirror that.

use std::fmt;

use url::Url;

use crate::error::ViewError;

/// A script found in freshly inserted markup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScriptSource {
    External(String),
    Inline(String),
}

pub trait Dom {
    type Node: Clone + PartialEq + fmt::Debug;

    fn element_by_id(&self, id: &str) -> Option<Self::Node>;
    fn elements_by_class(&self, class: &str) -> Vec<Self::Node>;

    fn children(&self, node: &Self::Node) -> Vec<Self::Node>;
    fn parent(&self, node: &Self::Node) -> Option<Self::Node>;
    fn descendants_by_tag(&self, node: &Self::Node, tag: &str) -> Vec<Self::Node>;
    fn descendants_by_class(&self, node: &Self::Node, class: &str) -> Vec<Self::Node>;

    fn id(&self, node: &Self::Node) -> String;
    fn set_id(&self, node: &Self::Node, id: &str);
    fn attribute(&self, node: &Self::Node, name: &str) -> Option<String>;
    fn set_attribute(&self, node: &Self::Node, name: &str, value: &str) -> Result<(), ViewError>;
    fn remove_attribute(&self, node: &Self::Node, name: &str);
    fn text_content(&self, node: &Self::Node) -> String;

    fn has_class(&self, node: &Self::Node, class: &str) -> bool;
    fn add_class(&self, node: &Self::Node, class: &str);
    fn remove_class(&self, node: &Self::Node, class: &str);

    /// Current value of a form control, `None` for anything else.
    fn value(&self, node: &Self::Node) -> Option<String>;
    fn set_value(&self, node: &Self::Node, value: &str);
    fn set_checked(&self, node: &Self::Node, checked: bool);
    fn set_disabled(&self, node: &Self::Node, disabled: bool);

    /// Deep-clones `node` and inserts the copy right after it.
    fn clone_after(&self, node: &Self::Node) -> Result<Self::Node, ViewError>;
    fn remove(&self, node: &Self::Node);

    /// The name/value pairs a browser would submit for this form.
    fn form_fields(&self, form: &Self::Node) -> Result<Vec<(String, String)>, ViewError>;

    /// Replaces the whole body with `html`. Every node handle obtained
    /// before the call is stale afterwards.
    fn replace_body(&self, html: &str) -> Result<(), ViewError>;

    /// Re-creates every script in the body so it executes.
    fn reload_scripts(&self) -> Result<Vec<ScriptSource>, ViewError>;
}

pub trait Window {
    fn location(&self) -> Result<Url, ViewError>;
    fn push_state(&self, url: &Url) -> Result<(), ViewError>;
    fn navigate(&self, url: &Url) -> Result<(), ViewError>;

    /// Blocking prompt; `None` when dismissed.
    fn prompt(&self, message: &str) -> Option<String>;
    fn alert(&self, message: &str);
}
