//! Privacy filtering and component labelling
//!
//! Every entry passes through [`sanitize`] before it is stored. There is no
//! opt-out: document contents and credentials must never reach the buffer,
//! the exports, or the error reports.

use crate::entry::{Details, UNKNOWN_COMPONENT};

/// Keys stripped from `details`, in both the browser (camelCase) and
/// server (snake_case) spellings.
pub const SENSITIVE_KEYS: &[&str] = &[
    "fileContent",
    "extractedText",
    "imageData",
    "password",
    "token",
    "apiKey",
    "secret",
    "file_content",
    "extracted_text",
    "image_data",
    "api_key",
];

pub fn is_sensitive_key(key: &str) -> bool {
    SENSITIVE_KEYS.contains(&key)
}

/// Remove sensitive top-level keys from `details`.
///
/// Returns a shallow copy with every denylisted key removed. Absent input,
/// empty input, and input holding only denylisted keys all yield `None`, so
/// sanitizing an already sanitized value never changes it.
pub fn sanitize(details: Option<&Details>) -> Option<Details> {
    let sanitized: Details = details?
        .iter()
        .filter(|(key, _)| !is_sensitive_key(key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    (!sanitized.is_empty()).then_some(sanitized)
}

/// Derive a component label from a source path.
///
/// `src/routes/logs.rs` becomes `logs`; module roots (`mod.rs`, `lib.rs`,
/// `main.rs`) take the name of their directory. Anything unparseable yields
/// `"Unknown"`.
pub fn component_from_path(path: &str) -> String {
    let mut segments = path
        .rsplit(['/', '\\'])
        .filter(|segment| !segment.is_empty());

    let Some(file) = segments.next() else {
        return UNKNOWN_COMPONENT.to_string();
    };

    let stem = file.strip_suffix(".rs").unwrap_or(file);
    let label = match stem {
        "mod" | "lib" | "main" => match segments.next() {
            Some("src") | None => segments.next().unwrap_or(stem),
            Some(dir) => dir,
        },
        _ => stem,
    };

    if label.is_empty() || label.starts_with('<') {
        UNKNOWN_COMPONENT.to_string()
    } else {
        label.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn details(value: serde_json::Value) -> Details {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_sanitize_absent_and_empty() {
        assert_eq!(sanitize(None), None);
        assert_eq!(sanitize(Some(&Details::new())), None);
    }

    #[test]
    fn test_sanitize_strips_each_sensitive_key() {
        for key in SENSITIVE_KEYS {
            let mut input = details(json!({ "filename": "scan.pdf" }));
            input.insert(key.to_string(), json!("sensitive"));

            let output = sanitize(Some(&input)).unwrap();
            assert!(!output.contains_key(*key), "{key} survived sanitization");
            assert_eq!(output.get("filename"), Some(&json!("scan.pdf")));
        }
    }

    #[test]
    fn test_sanitize_only_sensitive_is_absent() {
        let input = details(json!({ "password": "x", "apiKey": "sk-1" }));
        assert_eq!(sanitize(Some(&input)), None);
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        for input in [
            details(json!({ "password": "x" })),
            details(json!({ "token": "t", "pages": 3 })),
            Details::new(),
        ] {
            let once = sanitize(Some(&input));
            assert_eq!(sanitize(once.as_ref()), once);
        }
    }

    #[test]
    fn test_sanitize_is_shallow_copy() {
        let input = details(json!({
            "pages": 3,
            "nested": { "password": "kept-because-nested" }
        }));
        let output = sanitize(Some(&input)).unwrap();
        assert_eq!(output, input);
    }

    #[test]
    fn test_component_from_path() {
        assert_eq!(component_from_path("src/routes/logs.rs"), "logs");
        assert_eq!(component_from_path("apps/ocr-harness-server/src/routes/mod.rs"), "routes");
        assert_eq!(component_from_path("apps/harness-log/src/lib.rs"), "harness-log");
        assert_eq!(component_from_path("C:\\work\\src\\upload.rs"), "upload");
        assert_eq!(component_from_path("main.rs"), "main");
    }

    #[test]
    fn test_component_from_path_falls_back() {
        assert_eq!(component_from_path(""), UNKNOWN_COMPONENT);
        assert_eq!(component_from_path("///"), UNKNOWN_COMPONENT);
        assert_eq!(component_from_path("<anonymous>"), UNKNOWN_COMPONENT);
    }
}
