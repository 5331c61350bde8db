use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::dom::Dom;
use crate::error::ViewError;

/// Invoked with the panel a switch just revealed.
pub type RefreshHook<D> = Rc<dyn Fn(&D, &<D as Dom>::Node) -> Result<(), ViewError>>;

/// Shows one child of a container and hides its siblings.
///
/// A revealed child may name a refresh hook in its `refresh` attribute; hooks
/// are registered up front by name instead of being looked up globally.
pub struct PanelSwitcher<D: Dom> {
    visible_class: String,
    hooks: RefCell<HashMap<String, RefreshHook<D>>>,
}

impl<D: Dom> PanelSwitcher<D> {
    pub fn new(visible_class: impl Into<String>) -> Self {
        Self {
            visible_class: visible_class.into(),
            hooks: RefCell::new(HashMap::new()),
        }
    }

    pub fn register_refresh(&self, name: impl Into<String>, hook: RefreshHook<D>) {
        self.hooks.borrow_mut().insert(name.into(), hook);
    }

    /// Shows the child of `container` whose id is `target` and returns it.
    /// When no child matches every child ends up hidden and `None` is returned.
    pub fn show(&self, dom: &D, container: &str, target: &str) -> Result<Option<D::Node>, ViewError> {
        let group = dom
            .element_by_id(container)
            .ok_or_else(|| ViewError::MissingElement(container.to_string()))?;

        let mut shown = None;
        for child in dom.children(&group) {
            if shown.is_none() && !target.is_empty() && dom.id(&child) == target {
                dom.add_class(&child, &self.visible_class);
                shown = Some(child);
            } else {
                dom.remove_class(&child, &self.visible_class);
            }
        }

        match &shown {
            Some(panel) => {
                tracing::debug!(container, target, "panel shown");
                self.refresh(dom, panel)?;
            }
            None => tracing::debug!(container, target, "no panel matched, group hidden"),
        }
        Ok(shown)
    }

    /// Children of `container` currently carrying the visible class.
    pub fn visible(&self, dom: &D, container: &str) -> Vec<D::Node> {
        dom.element_by_id(container)
            .map(|group| {
                dom.children(&group)
                    .into_iter()
                    .filter(|child| dom.has_class(child, &self.visible_class))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn refresh(&self, dom: &D, panel: &D::Node) -> Result<(), ViewError> {
        let Some(name) = dom.attribute(panel, "refresh").filter(|name| !name.is_empty()) else {
            return Ok(());
        };
        // Cloned out so a hook may register further hooks.
        let hook = self.hooks.borrow().get(&name).cloned();
        match hook {
            Some(hook) => hook(dom, panel),
            None => {
                tracing::warn!(%name, "no refresh hook registered");
                Ok(())
            }
        }
    }
}
