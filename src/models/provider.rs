use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::fmt;

/// Marker substituted for the hidden part of a credential key.
pub const MASK: &str = "****";

/// Keys up to this length are fully masked.
const MASK_FULL_THRESHOLD: usize = 12;

const MASK_VISIBLE: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Provider {
    Sora,
    Veo,
    GeminiImage,
    Grok,
    GrokImage,
}

impl Provider {
    pub const ALL: [Self; 5] = [
        Self::Sora,
        Self::Veo,
        Self::GeminiImage,
        Self::Grok,
        Self::GrokImage,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sora => "sora",
            Self::Veo => "veo",
            Self::GeminiImage => "geminiImage",
            Self::Grok => "grok",
            Self::GrokImage => "grokImage",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == s)
    }

    /// Sora carries a second endpoint/key pair for character creation.
    #[must_use]
    pub const fn has_character_fields(self) -> bool {
        matches!(self, Self::Sora)
    }

    #[must_use]
    pub fn valid_names() -> String {
        Self::ALL
            .iter()
            .map(|p| p.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Endpoint and credential for one provider. An empty field means "unset".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderSettings {
    pub server: String,
    pub key: String,
    pub character_server: String,
    pub character_key: String,
}

impl ProviderSettings {
    /// Field-level merge: every non-empty field of `self` wins over `fallback`.
    #[must_use]
    pub fn merged_over(&self, fallback: &Self) -> Self {
        let pick = |own: &String, other: &String| {
            if own.is_empty() {
                other.clone()
            } else {
                own.clone()
            }
        };

        Self {
            server: pick(&self.server, &fallback.server),
            key: pick(&self.key, &fallback.key),
            character_server: pick(&self.character_server, &fallback.character_server),
            character_key: pick(&self.character_key, &fallback.character_key),
        }
    }

    /// Character endpoint, falling back to the main endpoint when unset.
    #[must_use]
    pub fn character_endpoint(&self) -> (&str, &str) {
        let server = if self.character_server.is_empty() {
            &self.server
        } else {
            &self.character_server
        };
        let key = if self.character_key.is_empty() {
            &self.key
        } else {
            &self.character_key
        };
        (server, key)
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.server.is_empty()
    }

    pub fn apply(&mut self, patch: &ProviderPatch) {
        if let Some(server) = &patch.server {
            self.server.clone_from(server);
        }
        if let Some(key) = &patch.key {
            self.key.clone_from(key);
        }
        if let Some(server) = &patch.character_server {
            self.character_server.clone_from(server);
        }
        if let Some(key) = &patch.character_key {
            self.character_key.clone_from(key);
        }
    }

    /// Client-facing JSON; keys are masked unless `reveal` is set.
    #[must_use]
    pub fn to_view(&self, provider: Provider, reveal: bool) -> Value {
        let show = |key: &str| {
            if reveal {
                key.to_string()
            } else {
                mask_key(key)
            }
        };

        let mut view = json!({
            "server": self.server,
            "key": show(&self.key),
        });

        if provider.has_character_fields()
            && let Some(obj) = view.as_object_mut()
        {
            obj.insert(
                "characterServer".to_string(),
                Value::String(self.character_server.clone()),
            );
            obj.insert(
                "characterKey".to_string(),
                Value::String(show(&self.character_key)),
            );
        }

        view
    }
}

/// Partial update for one provider. Absent fields are left alone, an empty
/// string clears the field.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderPatch {
    pub server: Option<String>,
    pub key: Option<String>,
    pub character_server: Option<String>,
    pub character_key: Option<String>,
}

impl ProviderPatch {
    /// Drops the character fields for providers that do not have them.
    #[must_use]
    pub fn for_provider(mut self, provider: Provider) -> Self {
        if !provider.has_character_fields() {
            self.character_server = None;
            self.character_key = None;
        }
        self
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.server.is_none()
            && self.key.is_none()
            && self.character_server.is_none()
            && self.character_key.is_none()
    }
}

/// Builds the `{provider: view}` object for every provider.
#[must_use]
pub fn config_view<F>(mut settings_for: F, reveal: bool) -> Value
where
    F: FnMut(Provider) -> ProviderSettings,
{
    let mut out = Map::new();
    for provider in Provider::ALL {
        out.insert(
            provider.as_str().to_string(),
            settings_for(provider).to_view(provider, reveal),
        );
    }
    Value::Object(out)
}

/// Redacts the middle of a credential key.
///
/// Empty stays empty, keys of twelve characters or fewer become [`MASK`],
/// longer keys keep their first and last six characters.
#[must_use]
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.is_empty() {
        return String::new();
    }
    if chars.len() <= MASK_FULL_THRESHOLD {
        return MASK.to_string();
    }

    let head: String = chars[..MASK_VISIBLE].iter().collect();
    let tail: String = chars[chars.len() - MASK_VISIBLE..].iter().collect();
    format!("{head}{MASK}{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_key() {
        assert_eq!(mask_key(""), "");
        assert_eq!(mask_key("short"), MASK);
        assert_eq!(mask_key("exactly12chr"), MASK);
        assert_eq!(mask_key("sk-1234567890abcdef"), "sk-123****abcdef");
        assert_eq!(mask_key("abcdefghijklm"), "abcdef****hijklm");
    }

    #[test]
    fn test_field_level_merge() {
        let global = ProviderSettings {
            server: "https://a".to_string(),
            key: "K1".to_string(),
            ..ProviderSettings::default()
        };
        let user = ProviderSettings {
            server: String::new(),
            key: "K2".to_string(),
            ..ProviderSettings::default()
        };

        let effective = user.merged_over(&global);
        assert_eq!(effective.server, "https://a");
        assert_eq!(effective.key, "K2");
    }

    #[test]
    fn test_patch_clears_with_empty_string() {
        let mut settings = ProviderSettings {
            server: "https://x".to_string(),
            key: "k".to_string(),
            ..ProviderSettings::default()
        };
        settings.apply(&ProviderPatch {
            key: Some(String::new()),
            ..ProviderPatch::default()
        });
        assert_eq!(settings.server, "https://x");
        assert_eq!(settings.key, "");
    }

    #[test]
    fn test_character_endpoint_fallback() {
        let settings = ProviderSettings {
            server: "https://sora".to_string(),
            key: "main".to_string(),
            character_server: String::new(),
            character_key: "char".to_string(),
        };
        assert_eq!(settings.character_endpoint(), ("https://sora", "char"));
    }

    #[test]
    fn test_view_masks_and_reveals() {
        let settings = ProviderSettings {
            server: "https://sora".to_string(),
            key: "sk-1234567890abcdef".to_string(),
            ..ProviderSettings::default()
        };

        let masked = settings.to_view(Provider::Sora, false);
        assert_eq!(masked["key"], "sk-123****abcdef");
        assert!(masked.get("characterKey").is_some());

        let full = settings.to_view(Provider::Veo, true);
        assert_eq!(full["key"], "sk-1234567890abcdef");
        assert!(full.get("characterKey").is_none());
    }

    #[test]
    fn test_provider_parse() {
        assert_eq!(Provider::parse("geminiImage"), Some(Provider::GeminiImage));
        assert_eq!(Provider::parse("gemini"), None);
    }
}
