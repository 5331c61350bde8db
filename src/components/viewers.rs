use std::collections::HashMap;

use crate::dom::Dom;
use crate::error::ViewError;
use crate::types::ContentType;

/// An editor or viewer whose layout must be recomputed after it is shown.
pub trait Viewer {
    fn refresh(&self) -> Result<(), ViewError>;
}

impl<F> Viewer for F
where
    F: Fn() -> Result<(), ViewError>,
{
    fn refresh(&self) -> Result<(), ViewError> {
        self()
    }
}

/// Viewers keyed by the content type they render.
#[derive(Default)]
pub struct Viewers {
    viewers: HashMap<ContentType, Box<dyn Viewer>>,
}

impl Viewers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, content_type: ContentType, viewer: impl Viewer + 'static) -> Self {
        self.insert(content_type, viewer);
        self
    }

    pub fn insert(&mut self, content_type: ContentType, viewer: impl Viewer + 'static) {
        self.viewers.insert(content_type, Box::new(viewer));
    }

    /// Refreshes the viewer named by a `target` tag. Unknown tags and
    /// missing viewers are logged and skipped.
    pub fn refresh_tag(&self, tag: &str) -> Result<Option<ContentType>, ViewError> {
        let Some(content_type) = ContentType::from_tag(tag) else {
            tracing::warn!("Type {tag} not recognized.");
            return Ok(None);
        };
        match self.viewers.get(&content_type) {
            Some(viewer) => {
                viewer.refresh()?;
                Ok(Some(content_type))
            }
            None => {
                tracing::debug!(content_type = content_type.as_str(), "no viewer registered");
                Ok(None)
            }
        }
    }

    /// Refreshes the viewer named by the `target` attribute of `element`, if any.
    pub fn refresh_for<D: Dom>(&self, dom: &D, element: &D::Node) -> Result<Option<ContentType>, ViewError> {
        match dom.attribute(element, "target") {
            Some(tag) => self.refresh_tag(&tag),
            None => Ok(None),
        }
    }
}
