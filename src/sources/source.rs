use serde::Deserialize;

/// One `name:tag` pair reported by the local daemon or a registry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TagEntry {
    pub name: String,
    pub tag: String,
}

impl TagEntry {
    pub fn new(name: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag: tag.into(),
        }
    }
}
