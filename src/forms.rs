//! Background form submission.

use url::Url;

use crate::context::{apply_context, ContextOptions};
use crate::dom::{Dom, Window};
use crate::error::ViewError;
use crate::request::{FormRequest, Transport};
use crate::types::HttpMethod;

/// Turns form submissions into background requests whose HTML answer
/// replaces the page.
pub struct FormInterceptor<T> {
    transport: T,
}

impl<T: Transport> FormInterceptor<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Reads method, action and fields of `form`, rewrites the action
    /// through the navigation context and records it in history.
    pub fn prepare<D: Dom, W: Window>(
        &self,
        dom: &D,
        window: &W,
        form: &D::Node,
        options: &ContextOptions,
    ) -> Result<FormRequest, ViewError> {
        let method: HttpMethod = dom.attribute(form, "method").unwrap_or_default().parse()?;
        let location = window.location()?;
        let action = match dom.attribute(form, "action").filter(|action| !action.is_empty()) {
            Some(action) => location.join(&action)?,
            None => location.clone(),
        };

        let url = apply_context(&location, action.path(), options)?;
        window.push_state(&url)?;

        Ok(FormRequest {
            method,
            url,
            fields: dom.form_fields(form)?,
        })
    }

    /// Sends `request` and returns the markup to swap in. A non-2xx answer
    /// is an error and its body is discarded.
    pub async fn send(&self, request: FormRequest) -> Result<String, ViewError> {
        let response = self.transport.send(request).await?;
        if !response.is_success() {
            return Err(ViewError::HttpStatus(response.status));
        }
        Ok(response.body)
    }
}

/// `{endpoint}/{id}`, followed by `?{kind}` when a kind is given.
pub fn saved_request_url(
    location: &Url,
    endpoint: &str,
    id: &str,
    kind: Option<&str>,
) -> Result<Url, ViewError> {
    let origin = Url::parse(&location.origin().ascii_serialization())?;
    let mut url = origin.join(endpoint)?;
    url.path_segments_mut()
        .map_err(|_| ViewError::browser(format!("cannot append a path to {origin}")))?
        .pop_if_empty()
        .push(id);
    url.set_query(kind.filter(|kind| !kind.is_empty()));
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryDom, MemoryTransport, MemoryWindow};

    #[test]
    fn prepare_rewrites_the_action_and_pushes_history() {
        let dom = MemoryDom::new();
        let window = MemoryWindow::new("http://localhost/client/3?tab=body").unwrap();
        let form = dom.append(
            dom.body(),
            "form",
            &[("method", "post"), ("action", "/client/3")],
        );
        dom.append(form, "input", &[("name", "url"), ("value", "https://httpbin.org/get")]);
        let interceptor = FormInterceptor::new(MemoryTransport::new());

        let request = interceptor
            .prepare(&dom, &window, &form, &ContextOptions::new().query("do", "true"))
            .unwrap();

        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.url.as_str(), "http://localhost/client/3?tab=body&do=true");
        assert_eq!(
            request.fields,
            vec![("url".to_string(), "https://httpbin.org/get".to_string())]
        );
        assert_eq!(window.history(), vec![request.url.clone()]);
    }

    #[test]
    fn missing_action_submits_to_the_current_path() {
        let dom = MemoryDom::new();
        let window = MemoryWindow::new("http://localhost/collection?x=1").unwrap();
        let form = dom.append(dom.body(), "form", &[]);
        let interceptor = FormInterceptor::new(MemoryTransport::new());

        let request = interceptor
            .prepare(&dom, &window, &form, &ContextOptions::new().clean(true))
            .unwrap();

        assert_eq!(request.method, HttpMethod::Get);
        assert_eq!(request.url.as_str(), "http://localhost/collection");
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let transport = MemoryTransport::new();
        transport.respond(500, "<p>boom</p>");
        let interceptor = FormInterceptor::new(transport);
        let url = Url::parse("http://localhost/client").unwrap();

        let err = interceptor
            .send(FormRequest::new(HttpMethod::Post, url))
            .await
            .unwrap_err();

        assert!(matches!(err, ViewError::HttpStatus(500)));
    }

    #[test]
    fn saved_request_urls() {
        let location = Url::parse("http://localhost:7070/client?x=1").unwrap();

        let plain = saved_request_url(&location, "/client", "42", None).unwrap();
        let typed = saved_request_url(&location, "/client", "42", Some("historic")).unwrap();

        assert_eq!(plain.as_str(), "http://localhost:7070/client/42");
        assert_eq!(typed.as_str(), "http://localhost:7070/client/42?historic");
    }
}
