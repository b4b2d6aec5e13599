//! Error types
//!
//! Construction fails fast: a missing canvas, container or GPU context is a
//! host-integration bug and surfaces as an error instead of a silent no-op.
//! The physics engine itself has no error conditions.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BallpitError {
    /// No element matched the given id or selector
    #[error("element not found: {0}")]
    MissingElement(String),

    /// The element exists but is not a `<canvas>`
    #[error("element is not a canvas: {0}")]
    NotACanvas(String),

    /// A browser global (window, document, body) is unavailable
    #[error("browser API unavailable: {0}")]
    MissingGlobal(&'static str),

    /// The `data-ballpit` / config JSON did not parse
    #[error("invalid ballpit config: {0}")]
    Config(#[from] serde_json::Error),

    /// Parsed, but a value is out of range
    #[error("invalid ballpit config: {0}")]
    InvalidConfig(String),

    #[error("failed to create render surface: {0}")]
    Surface(String),

    #[error("no suitable GPU adapter: {0}")]
    Adapter(String),

    #[error("failed to create GPU device: {0}")]
    Device(String),

    /// A DOM call threw
    #[error("browser call failed: {0}")]
    Js(String),
}

#[cfg(target_arch = "wasm32")]
impl From<wasm_bindgen::JsValue> for BallpitError {
    fn from(value: wasm_bindgen::JsValue) -> Self {
        BallpitError::Js(format!("{:?}", value))
    }
}

#[cfg(target_arch = "wasm32")]
impl From<BallpitError> for wasm_bindgen::JsValue {
    fn from(err: BallpitError) -> Self {
        js_sys::Error::new(&err.to_string()).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_target() {
        let err = BallpitError::MissingElement("#ballpit-container".into());
        assert_eq!(err.to_string(), "element not found: #ballpit-container");
    }

    #[test]
    fn test_config_error_from_json() {
        let parse = serde_json::from_str::<serde_json::Value>("{not json");
        let err: BallpitError = parse.unwrap_err().into();
        assert!(matches!(err, BallpitError::Config(_)));
        assert!(err.to_string().starts_with("invalid ballpit config"));
    }
}
