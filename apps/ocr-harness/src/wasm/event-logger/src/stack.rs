//! Component inference from JavaScript call stacks
//!
//! Browser stacks name the calling function on each frame. UI components in
//! the web client are PascalCase, so the first PascalCase frame that is not
//! a runtime builtin or the logger itself is taken as the component. Any
//! failure yields `None` and the caller falls back to "Unknown".

use std::sync::OnceLock;

use regex::Regex;

/// V8 (`at UploadPanel (...)`) and SpiderMonkey/JSC (`UploadPanel@...`) frames
const FRAME_PATTERN: &str = r"(?m)^\s*(?:at\s+(?:new\s+|async\s+)?([A-Z][A-Za-z0-9_$]*)|([A-Z][A-Za-z0-9_$]*)@)";

const IGNORED_FRAMES: &[&str] = &[
    "ClientLogger",
    "Error",
    "Object",
    "Module",
    "Promise",
    "Array",
    "Function",
    "Reflect",
    "HTMLDocument",
    "Window",
    "EventTarget",
];

fn frame_regex() -> Option<&'static Regex> {
    static FRAME: OnceLock<Option<Regex>> = OnceLock::new();
    FRAME.get_or_init(|| Regex::new(FRAME_PATTERN).ok()).as_ref()
}

/// First component-like frame name in `stack`
pub fn infer_component(stack: &str) -> Option<String> {
    frame_regex()?
        .captures_iter(stack)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|name| name.as_str())
        .find(|name| !IGNORED_FRAMES.contains(name) && !name.starts_with("__wbg"))
        .map(String::from)
}
