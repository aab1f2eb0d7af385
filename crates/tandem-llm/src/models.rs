//! Model capability lookup
//!
//! Function-calling support is a property of the model family, not something
//! the runtime reports, so this is a maintained lookup table. The orchestrator
//! only consumes the boolean to decide whether to attach tool schemas.

/// Model families on the local runtime known to support function calling.
///
/// Matched against the model name with its tag stripped (`qwen3:8b` → `qwen3`).
const TOOL_CAPABLE_FAMILIES: &[&str] = &[
    "command-r",
    "command-r-plus",
    "devstral",
    "firefunction-v2",
    "granite3-dense",
    "granite3.1-dense",
    "hermes3",
    "llama3.1",
    "llama3.2",
    "llama3.3",
    "llama4",
    "mistral",
    "mistral-large",
    "mistral-nemo",
    "mistral-small",
    "mixtral",
    "nemotron",
    "qwen2.5",
    "qwen2.5-coder",
    "qwen3",
    "qwq",
    "smollm2",
];

/// Whether the given model supports function calling.
pub fn supports_tools(model: &str) -> bool {
    let base = model
        .split(':')
        .next()
        .unwrap_or(model)
        .trim()
        .to_ascii_lowercase();
    TOOL_CAPABLE_FAMILIES.iter().any(|family| base == *family)
}
