use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ViewError;

/// HTTP Methods a form or action may use
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
        }
    }

    /// Whether form fields travel in the request body rather than the query.
    pub fn has_body(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }
}

impl FromStr for HttpMethod {
    type Err = ViewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "" | "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            "PATCH" => Ok(HttpMethod::Patch),
            other => Err(ViewError::Method(other.to_string())),
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key/value editors backed by a template row
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowKind {
    Query,
    Header,
    Variable,
}

impl RowKind {
    pub const ALL: [RowKind; 3] = [RowKind::Query, RowKind::Header, RowKind::Variable];

    pub fn as_str(&self) -> &'static str {
        match self {
            RowKind::Query => "query",
            RowKind::Header => "header",
            RowKind::Variable => "variable",
        }
    }
}

impl FromStr for RowKind {
    type Err = ViewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "query" | "queries" => Ok(RowKind::Query),
            "header" | "headers" => Ok(RowKind::Header),
            "variable" | "variables" | "collection" => Ok(RowKind::Variable),
            _ => Err(ViewError::UnknownRowKind(s.to_string())),
        }
    }
}

/// Content type tag carried by body and response viewers in their `target` attribute
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContentType {
    Json,
    Text,
    Html,
}

impl ContentType {
    /// Parses a `target` tag, ignoring case. Unknown tags yield `None`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_uppercase().as_str() {
            "JSON" => Some(ContentType::Json),
            "TEXT" => Some(ContentType::Text),
            "HTML" => Some(ContentType::Html),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Json => "JSON",
            ContentType::Text => "TEXT",
            ContentType::Html => "HTML",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_parses_form_attribute_case_insensitively() {
        assert_eq!("post".parse::<HttpMethod>().unwrap(), HttpMethod::Post);
        assert_eq!("Delete".parse::<HttpMethod>().unwrap(), HttpMethod::Delete);
        assert_eq!("".parse::<HttpMethod>().unwrap(), HttpMethod::Get);
        assert!("TRACE".parse::<HttpMethod>().is_err());
    }

    #[test]
    fn only_post_put_patch_carry_a_body() {
        assert!(HttpMethod::Post.has_body());
        assert!(HttpMethod::Patch.has_body());
        assert!(!HttpMethod::Get.has_body());
        assert!(!HttpMethod::Delete.has_body());
    }

    #[test]
    fn content_type_tags_ignore_case() {
        assert_eq!(ContentType::from_tag("json"), Some(ContentType::Json));
        assert_eq!(ContentType::from_tag(" Html "), Some(ContentType::Html));
        assert_eq!(ContentType::from_tag("xml"), None);
    }

    #[test]
    fn row_kind_accepts_plural_names() {
        assert_eq!("headers".parse::<RowKind>().unwrap(), RowKind::Header);
        assert_eq!("collection".parse::<RowKind>().unwrap(), RowKind::Variable);
    }

    #[test]
    fn unknown_row_kind_is_reported_by_name() {
        assert!(matches!(
            "cookies".parse::<RowKind>(),
            Err(ViewError::UnknownRowKind(kind)) if kind == "cookies"
        ));
    }
}
