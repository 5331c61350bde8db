//! Shareable view state kept in the address bar.
//!
//! The navigation context is never stored: it is rebuilt from the current
//! location on every call.

use url::Url;

use crate::dom::Window;
use crate::error::ViewError;

/// Extra path segments and query overrides applied on top of a base path.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContextOptions {
    pub paths: Vec<String>,
    /// Overrides in insertion order. Empty values are skipped.
    pub queries: Vec<(String, String)>,
    /// Drop the current query string instead of carrying it over.
    pub clean: bool,
}

impl ContextOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(mut self, segment: impl Into<String>) -> Self {
        self.paths.push(segment.into());
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.queries.push((key.into(), value.into()));
        self
    }

    pub fn clean(mut self, clean: bool) -> Self {
        self.clean = clean;
        self
    }
}

/// Builds the target URL for `base` from the `current` location.
pub fn apply_context(current: &Url, base: &str, options: &ContextOptions) -> Result<Url, ViewError> {
    let origin = Url::parse(&current.origin().ascii_serialization())?;

    let path = std::iter::once(base)
        .chain(options.paths.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join("/");
    let mut target = origin.join(&path)?;

    if current.path().starts_with(base) && !options.clean {
        target.set_query(current.query().filter(|query| !query.is_empty()));
    }

    for (key, value) in &options.queries {
        if value.is_empty() {
            continue;
        }
        set_query_param(&mut target, key, value);
    }

    Ok(target)
}

/// `URLSearchParams.set`: replaces the first pair named `key`, drops the
/// other ones, or appends when there is none.
pub fn set_query_param(url: &mut Url, key: &str, value: &str) {
    let mut pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();

    match pairs.iter().position(|(name, _)| name == key) {
        Some(index) => {
            pairs[index].1 = value.to_string();
            let mut seen = false;
            pairs.retain(|(name, _)| {
                if name != key {
                    return true;
                }
                let keep = !seen;
                seen = true;
                keep
            });
        }
        None => pairs.push((key.to_string(), value.to_string())),
    }

    url.query_pairs_mut().clear().extend_pairs(pairs);
}

/// Sets one parameter on the current location and records it in history
/// without reloading.
pub fn update_context<W: Window>(window: &W, name: &str, value: &str) -> Result<Url, ViewError> {
    let mut url = window.location()?;
    set_query_param(&mut url, name, value);
    window.push_state(&url)?;
    tracing::debug!(%url, "context updated");
    Ok(url)
}

/// [`apply_context`] followed by a real navigation.
pub fn goto<W: Window>(window: &W, base: &str, options: &ContextOptions) -> Result<Url, ViewError> {
    let target = apply_context(&window.location()?, base, options)?;
    window.navigate(&target)?;
    Ok(target)
}
