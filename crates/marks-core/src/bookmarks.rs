use serde::{Deserialize, Deserializer, Serialize};

/// Ordered bookmark collection; insertion order is the display order.
pub type Collection = Vec<Bookmark>;

/// A single bookmark. Identity is the exact, case-sensitive `url`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Bookmark {
    pub url: String,
    /// Absent rather than empty; never serialized as `""`.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_description"
    )]
    description: Option<String>,
}

impl Bookmark {
    pub fn new(url: impl Into<String>, description: Option<String>) -> Self {
        Self {
            url: url.into(),
            description: normalize_description(description),
        }
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn set_description(&mut self, description: Option<String>) {
        self.description = normalize_description(description);
    }
}

/// Blank descriptions collapse to `None`.
pub fn normalize_description(description: Option<String>) -> Option<String> {
    description.filter(|d| !d.trim().is_empty())
}

fn deserialize_description<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(normalize_description(raw))
}

/// First bookmark whose url matches exactly.
pub fn find<'a>(collection: &'a [Bookmark], url: &str) -> Option<&'a Bookmark> {
    collection.iter().find(|b| b.url == url)
}
