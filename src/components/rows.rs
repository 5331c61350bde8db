use crate::config::RowTemplate;
use crate::dom::Dom;
use crate::error::ViewError;

/// Source of the unique suffix given to each cloned row.
pub trait IdSource {
    fn next_id(&self) -> String;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct UuidSource;

impl IdSource for UuidSource {
    fn next_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Turns the template row into an independently submitted row and leaves a
/// pristine copy of it behind as the next template.
///
/// The row being typed into is the one that keeps the text, so it becomes
/// the new row: its names get a unique suffix, its `onkeydown` is dropped and
/// its controls are enabled. The untouched deep clone is inserted right after
/// it and takes over the template id, disabled and unremovable.
pub struct RowCloner<I = UuidSource> {
    template: RowTemplate,
    visible_class: String,
    ids: I,
}

impl RowCloner<UuidSource> {
    pub fn new(template: RowTemplate, visible_class: impl Into<String>) -> Self {
        Self::with_ids(template, visible_class, UuidSource)
    }
}

impl<I: IdSource> RowCloner<I> {
    pub fn with_ids(template: RowTemplate, visible_class: impl Into<String>, ids: I) -> Self {
        Self {
            template,
            visible_class: visible_class.into(),
            ids,
        }
    }

    /// Promotes the current template to a row and returns it.
    pub fn add_row<D: Dom>(&self, dom: &D) -> Result<D::Node, ViewError> {
        let template_id = &self.template.template_id;
        let row = dom
            .element_by_id(template_id)
            .ok_or_else(|| ViewError::MissingElement(template_id.clone()))?;

        let next_template = dom.clone_after(&row)?;
        dom.set_id(&row, "");
        dom.set_id(&next_template, template_id);

        let suffix = format!("{}{}", self.template.separator, self.ids.next_id());
        for label in dom.descendants_by_tag(&row, "label") {
            let target = dom.attribute(&label, "for").unwrap_or_default();
            dom.set_attribute(&label, "for", &format!("{target}{suffix}"))?;

            for input in dom.descendants_by_tag(&label, "input") {
                let is_checkbox = dom
                    .attribute(&input, "type")
                    .is_some_and(|kind| kind.eq_ignore_ascii_case("checkbox"));
                if is_checkbox {
                    dom.set_checked(&input, true);
                    dom.set_disabled(&input, false);
                }
                let name = dom.attribute(&input, "name").unwrap_or_default();
                dom.set_attribute(&input, "name", &format!("{name}{suffix}"))?;
                dom.remove_attribute(&input, "onkeydown");
            }
        }

        for button in dom.descendants_by_class(&row, &self.template.remove_button_class) {
            dom.add_class(&button, &self.visible_class);
            dom.set_disabled(&button, false);
        }

        tracing::debug!(template = %template_id, %suffix, "row added");
        Ok(row)
    }

    /// Removes the row owning `control`. The template is never removed.
    pub fn remove_row<D: Dom>(&self, dom: &D, control: &D::Node) -> bool {
        let Some(row) = dom.parent(control) else {
            return false;
        };
        if dom.id(&row) == self.template.template_id {
            tracing::debug!(template = %self.template.template_id, "refusing to remove template row");
            return false;
        }
        dom.remove(&row);
        true
    }
}
