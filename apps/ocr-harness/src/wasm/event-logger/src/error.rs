//! Errors surfaced to JavaScript callers

use harness_log::ExportFormatError;
use thiserror::Error;
use wasm_bindgen::JsValue;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Export(#[from] ExportFormatError),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_wasm_bindgen::Error> for ClientError {
    fn from(e: serde_wasm_bindgen::Error) -> Self {
        ClientError::Serialization(e.to_string())
    }
}

impl From<ClientError> for JsValue {
    fn from(e: ClientError) -> Self {
        js_sys::Error::new(&e.to_string()).into()
    }
}
