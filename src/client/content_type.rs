//! Content-Type values commonly passed to [`request`](super::request).

pub const TEXT_XML: &str = "text/xml";
pub const HTML: &str = "text/html; charset=utf-8";
pub const TEXT_CSS: &str = "text/css; charset=utf-8";
pub const X_JAVASCRIPT: &str = "application/x-javascript";
pub const JAVASCRIPT: &str = "text/javascript";
pub const JSON: &str = "application/json; charset=utf-8";
pub const FORM: &str = "application/x-www-form-urlencoded";
pub const PNG: &str = "image/png";
