use serde_json::Value;

/// Per-call generation context passed to every LlmBackend::generate invocation.
///
/// Bundles the per-request inputs so the LlmBackend trait signature stays
/// stable as new fields are added.
pub struct GenerateContext<'a> {
    /// Instruction text for the model.
    pub prompt: &'a str,
    /// JSON schema the reply must conform to.
    pub schema: &'a Value,
}
