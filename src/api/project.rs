//! Project info for credential verification.

use serde::{Deserialize, Serialize};

/// The project resource, used only to verify a credential pair.
///
/// `name` is the one field the `conf` check compares; the rest of the
/// response is carried through for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectInfo {
    /// Project name as the API knows it.
    #[serde(default)]
    pub name: String,
    /// All remaining fields, pass-through.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}
