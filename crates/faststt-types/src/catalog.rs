//! Selectable recognition models and language-label helpers.

/// A model the worker knows how to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelEntry {
    /// Identifier written to the worker's model message.
    pub id: &'static str,
    /// Human readable name.
    pub label: &'static str,
    pub multilingual: bool,
}

pub const MODEL_CATALOG: &[ModelEntry] = &[
    ModelEntry { id: "tiny.en", label: "Tiny (English-only)", multilingual: false },
    ModelEntry { id: "base.en", label: "Base (English-only)", multilingual: false },
    ModelEntry { id: "small.en", label: "Small (English-only)", multilingual: false },
    ModelEntry { id: "medium.en", label: "Medium (English-only)", multilingual: false },
    ModelEntry { id: "tiny", label: "Tiny (Multi-language)", multilingual: true },
    ModelEntry { id: "base", label: "Base (Multi-language)", multilingual: true },
    ModelEntry { id: "small", label: "Small (Multi-language)", multilingual: true },
    ModelEntry { id: "medium", label: "Medium (Multi-language)", multilingual: true },
    ModelEntry { id: "large-v1", label: "Large V1 (All languages)", multilingual: true },
    ModelEntry { id: "large-v2", label: "Large V2 (All languages)", multilingual: true },
    ModelEntry { id: "large-v3", label: "Large V3 (All languages)", multilingual: true },
];

/// Model picked when nothing is specified (the largest one).
pub fn default_model() -> &'static ModelEntry {
    &MODEL_CATALOG[MODEL_CATALOG.len() - 1]
}

/// Find a catalog entry by id or by display label, ignoring case.
pub fn resolve_model(query: &str) -> Option<&'static ModelEntry> {
    let query = query.trim();
    MODEL_CATALOG
        .iter()
        .find(|m| m.id.eq_ignore_ascii_case(query) || m.label.eq_ignore_ascii_case(query))
}

/// Extract the code from a label such as `"English (en)"`.
/// A bare code (`"en"`) is returned as is.
pub fn language_code_from_label(label: &str) -> Option<String> {
    let label = label.trim();
    if label.is_empty() {
        return None;
    }

    match (label.rfind('('), label.rfind(')')) {
        (Some(open), Some(close)) if open < close => {
            let code = label[open + 1..close].trim();
            (!code.is_empty()).then(|| code.to_lowercase())
        }
        (None, None) if !label.contains(char::is_whitespace) => Some(label.to_lowercase()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_model_by_id_and_label() {
        assert_eq!(resolve_model("small").map(|m| m.id), Some("small"));
        assert_eq!(resolve_model("Small (English-only)").map(|m| m.id), Some("small.en"));
        assert_eq!(resolve_model("LARGE-V2").map(|m| m.id), Some("large-v2"));
        assert!(resolve_model("huge").is_none());
    }

    #[test]
    fn test_default_model_is_largest() {
        assert_eq!(default_model().id, "large-v3");
    }

    #[test]
    fn test_language_code_from_label() {
        assert_eq!(language_code_from_label("English (en)").as_deref(), Some("en"));
        assert_eq!(language_code_from_label("Cantonese (yue)").as_deref(), Some("yue"));
        assert_eq!(language_code_from_label("de").as_deref(), Some("de"));
        assert_eq!(language_code_from_label("Haitian Creole"), None);
        assert_eq!(language_code_from_label("  "), None);
    }
}
