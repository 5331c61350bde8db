use url::Url;

use crate::error::ViewError;
use crate::types::HttpMethod;

/// A form submission ready to go over the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormRequest {
    pub method: HttpMethod,
    pub url: Url,
    pub fields: Vec<(String, String)>,
}

impl FormRequest {
    pub fn new(method: HttpMethod, url: Url) -> Self {
        Self {
            method,
            url,
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, name: &str, value: &str) -> Self {
        self.fields.push((name.to_string(), value.to_string()));
        self
    }
}

/// The server answers with renderable HTML, whatever the status.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HtmlResponse {
    pub status: u16,
    pub body: String,
}

impl HtmlResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends form submissions in the background.
#[allow(async_fn_in_trait)]
pub trait Transport {
    async fn send(&self, request: FormRequest) -> Result<HtmlResponse, ViewError>;
}

/// `reqwest`-backed transport; in the browser reqwest goes through `fetch`.
#[derive(Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReqwestTransport {
    /// Bodiless methods carry the fields in the query, like a GET form; the
    /// others send them as `multipart/form-data`.
    pub fn build(&self, request: FormRequest) -> reqwest::Result<reqwest::Request> {
        let FormRequest {
            method,
            mut url,
            fields,
        } = request;

        if !method.has_body() && !fields.is_empty() {
            url.query_pairs_mut().extend_pairs(fields.iter());
        }

        let mut builder = match method {
            HttpMethod::Get => self.client.get(url),
            HttpMethod::Post => self.client.post(url),
            HttpMethod::Put => self.client.put(url),
            HttpMethod::Delete => self.client.delete(url),
            HttpMethod::Patch => self.client.patch(url),
        };

        if method.has_body() {
            let form = fields
                .into_iter()
                .fold(reqwest::multipart::Form::new(), |form, (name, value)| {
                    form.text(name, value)
                });
            builder = builder.multipart(form);
        }

        builder.build()
    }
}

impl Transport for ReqwestTransport {
    async fn send(&self, request: FormRequest) -> Result<HtmlResponse, ViewError> {
        let method = request.method;
        let request = self.build(request)?;

        tracing::debug!(%method, url = %request.url(), "sending form request");
        let response = self.client.execute(request).await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(HtmlResponse { status, body })
    }
}
