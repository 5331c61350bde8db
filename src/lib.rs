//! View logic for the API client's server-rendered web frontend.
//!
//! The page is plain HTML produced by the server; this crate drives it:
//! tab-like panels, cloneable parameter rows, body mirroring, URL context,
//! background form submission with whole-body swaps and the init hooks that
//! re-mount widgets after each swap. Everything talks to the page through
//! the [`Dom`], [`Window`] and [`Transport`] seams, so the same controller
//! runs against `web-sys` in the browser and the in-memory page in tests.

pub mod app;
pub mod components;
pub mod config;
pub mod context;
pub mod dom;
pub mod error;
pub mod forms;
pub mod hooks;
pub mod memory;
pub mod request;
pub mod types;
#[cfg(target_arch = "wasm32")]
pub mod web;

pub use app::App;
pub use config::ViewConfig;
pub use context::ContextOptions;
pub use dom::{Dom, ScriptSource, Window};
pub use error::ViewError;
pub use request::{FormRequest, HtmlResponse, ReqwestTransport, Transport};
pub use types::{ContentType, HttpMethod, RowKind};
