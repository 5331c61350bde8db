use crate::dom::Dom;

/// Keeps every field sharing a class textually identical.
pub struct FieldMirror {
    class: String,
}

impl FieldMirror {
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
        }
    }

    /// Copies the value of `source` into every mirrored field and returns
    /// how many fields were written. Content is not validated.
    pub fn propagate<D: Dom>(&self, dom: &D, source: &D::Node) -> usize {
        let content = dom.value(source).unwrap_or_default();
        let fields = dom.elements_by_class(&self.class);
        for field in &fields {
            dom.set_value(field, &content);
        }
        tracing::trace!(class = %self.class, fields = fields.len(), "bodies synchronized");
        fields.len()
    }
}
