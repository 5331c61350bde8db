use serde::{Deserialize, Serialize};

use crate::dom::Dom;
use crate::error::ViewError;
use crate::types::RowKind;

/// Id of the `<script type="application/json">` element carrying the config.
pub const CONFIG_ELEMENT_ID: &str = "view-config";

/// The DOM contract shared with the server templates
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ViewConfig {
    /// Class marking the visible panel of a group and shown remove buttons
    pub visible_class: String,
    /// Class shared by every representation of the request body
    pub mirror_class: String,
    pub auth_form: String,
    pub body_form: String,
    pub response_container: String,
    pub client_form: String,
    /// Base path of the saved request endpoint
    pub client_endpoint: String,
    pub query_rows: RowTemplate,
    pub header_rows: RowTemplate,
    pub variable_rows: RowTemplate,
    pub log_level: LogLevel,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            visible_class: "show".to_string(),
            mirror_class: "body-parameter".to_string(),
            auth_form: "auth-type-form".to_string(),
            body_form: "body-type-form".to_string(),
            response_container: "response-container".to_string(),
            client_form: "client-form".to_string(),
            client_endpoint: "/client".to_string(),
            query_rows: RowTemplate::new("query-parameter-template", "query-remove-button", "#"),
            header_rows: RowTemplate::new(
                "header-parameter-template",
                "key-value-form-remove-button",
                "#",
            ),
            variable_rows: RowTemplate::new(
                "collection-variable-template",
                "key-value-form-remove-button",
                "#",
            ),
            log_level: LogLevel::default(),
        }
    }
}

/// Where a key/value editor keeps its template row and how clones are named
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RowTemplate {
    pub template_id: String,
    pub remove_button_class: String,
    pub separator: String,
}

impl RowTemplate {
    pub fn new(template_id: &str, remove_button_class: &str, separator: &str) -> Self {
        Self {
            template_id: template_id.to_string(),
            remove_button_class: remove_button_class.to_string(),
            separator: separator.to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(value: LogLevel) -> Self {
        match value {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

impl ViewConfig {
    pub fn from_json(content: &str) -> Result<Self, ViewError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Reads the config embedded in the page. A missing element means the
    /// defaults; a malformed one is reported and also falls back to them.
    pub fn load<D: Dom>(dom: &D) -> Self {
        let Some(element) = dom.element_by_id(CONFIG_ELEMENT_ID) else {
            return Self::default();
        };
        match Self::from_json(&dom.text_content(&element)) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(%err, "ignoring malformed view config");
                Self::default()
            }
        }
    }

    pub fn rows(&self, kind: RowKind) -> &RowTemplate {
        match kind {
            RowKind::Query => &self.query_rows,
            RowKind::Header => &self.header_rows,
            RowKind::Variable => &self.variable_rows,
        }
    }
}
