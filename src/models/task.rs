use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Video providers that produce ledger entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Sora,
    Veo,
    Grok,
}

impl Platform {
    pub const ALL: [Self; 3] = [Self::Sora, Self::Veo, Self::Grok];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sora => "sora",
            Self::Veo => "veo",
            Self::Grok => "grok",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == s)
    }

    /// Maps a raw provider status string onto the ledger's states,
    /// case-insensitively. The video providers share one vocabulary.
    #[must_use]
    pub fn map_status(self, raw: &str) -> TaskStatus {
        let normalized = raw.trim().to_ascii_lowercase();
        let table: &[(&str, TaskStatus)] = match self {
            Self::Sora | Self::Veo | Self::Grok => VIDEO_STATUSES,
        };

        table
            .iter()
            .find(|(name, _)| *name == normalized)
            .map_or(TaskStatus::Unknown, |(_, status)| *status)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const VIDEO_STATUSES: &[(&str, TaskStatus)] = &[
    ("queued", TaskStatus::Queued),
    ("pending", TaskStatus::Queued),
    ("submitted", TaskStatus::Queued),
    ("processing", TaskStatus::Processing),
    ("in_progress", TaskStatus::Processing),
    ("running", TaskStatus::Processing),
    ("completed", TaskStatus::Completed),
    ("complete", TaskStatus::Completed),
    ("succeeded", TaskStatus::Completed),
    ("success", TaskStatus::Completed),
    ("failed", TaskStatus::Failed),
    ("error", TaskStatus::Failed),
    ("cancelled", TaskStatus::Failed),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Queued,
    Processing,
    Completed,
    Failed,
    /// The provider reported a status no table knows about.
    Unknown,
}

impl TaskStatus {
    pub const ALL: [Self; 5] = [
        Self::Queued,
        Self::Processing,
        Self::Completed,
        Self::Failed,
        Self::Unknown,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Unknown => "unknown",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|st| st.as_str() == s)
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// `queued -> processing -> {completed, failed}`. Terminal states are
    /// final, `processing` never falls back to `queued`, and `unknown` may
    /// move anywhere.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        match (self, next) {
            (Self::Completed | Self::Failed, _) => false,
            (Self::Processing, Self::Queued) => false,
            _ => true,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The parts of a provider task payload the ledger cares about.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderSnapshot {
    pub status: Option<TaskStatus>,
    pub progress: Option<i32>,
    pub video_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub error: Option<String>,
}

impl ProviderSnapshot {
    /// Reads the status vocabulary and result fields out of a raw provider
    /// response. A missing status yields `None`, an unrecognised one
    /// [`TaskStatus::Unknown`].
    #[must_use]
    pub fn from_response(platform: Platform, response: &Value) -> Self {
        let status = response
            .get("status")
            .and_then(Value::as_str)
            .map(|raw| platform.map_status(raw));

        let progress = response
            .get("progress")
            .and_then(|p| {
                p.as_f64()
                    .or_else(|| p.as_str().and_then(|s| s.trim_end_matches('%').parse().ok()))
            })
            .map(|p| clamp_progress(p.round()));

        let video_url = string_at(response, &["video_url"])
            .or_else(|| string_at(response, &["output", "video_url"]))
            .or_else(|| string_at(response, &["url"]));

        let thumbnail_url = string_at(response, &["thumbnail_url"])
            .or_else(|| string_at(response, &["output", "thumbnail_url"]));

        let error = response
            .get("error")
            .and_then(|e| {
                e.as_str()
                    .map(ToString::to_string)
                    .or_else(|| string_at(e, &["message"]))
            })
            .or_else(|| string_at(response, &["message"]));

        Self {
            status,
            progress,
            video_url,
            thumbnail_url,
            error,
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn clamp_progress(p: f64) -> i32 {
    p.clamp(0.0, 100.0) as i32
}

fn string_at(value: &Value, path: &[&str]) -> Option<String> {
    let mut current = value;
    for key in path {
        current = current.get(*key)?;
    }
    current
        .as_str()
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}
