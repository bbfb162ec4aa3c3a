use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::LoadError;

/// Category of a startup resource; selects the loading strategy and its
/// minimum-duration floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    Font,
    Image,
    Config,
    #[serde(alias = "live2d")]
    CharacterAsset,
    #[default]
    Generic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceStatus {
    Pending,
    Loading,
    Loaded,
    Error,
}

/// A unit of startup work tracked through its status lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub id: String,
    pub url: String,
    pub kind: ResourceKind,
    pub status: ResourceStatus,
    pub started_at: Option<Instant>,
    pub finished_at: Option<Instant>,
    pub size_hint: Option<String>,
    pub failure: Option<LoadError>,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 5] = [
        ResourceKind::Font,
        ResourceKind::Image,
        ResourceKind::Config,
        ResourceKind::CharacterAsset,
        ResourceKind::Generic,
    ];

    /// Lenient parse: anything unrecognized becomes `Generic`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "font" => ResourceKind::Font,
            "image" => ResourceKind::Image,
            "config" => ResourceKind::Config,
            "character-asset" | "character_asset" | "live2d" => ResourceKind::CharacterAsset,
            _ => ResourceKind::Generic,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ResourceKind::Font => "font",
            ResourceKind::Image => "image",
            ResourceKind::Config => "config",
            ResourceKind::CharacterAsset => "character-asset",
            ResourceKind::Generic => "generic",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ResourceKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl ResourceStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, ResourceStatus::Pending)
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, ResourceStatus::Loading)
    }

    /// Loaded and Error both count as settled.
    pub fn is_settled(&self) -> bool {
        matches!(self, ResourceStatus::Loaded | ResourceStatus::Error)
    }

    pub fn status_icon(&self) -> &'static str {
        match self {
            ResourceStatus::Pending => "⏳",
            ResourceStatus::Loading => "🔄",
            ResourceStatus::Loaded => "✅",
            ResourceStatus::Error => "❌",
        }
    }
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceStatus::Pending => "pending",
            ResourceStatus::Loading => "loading",
            ResourceStatus::Loaded => "loaded",
            ResourceStatus::Error => "error",
        };
        f.write_str(name)
    }
}

impl Resource {
    pub fn new(id: impl Into<String>, url: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            kind,
            status: ResourceStatus::Pending,
            started_at: None,
            finished_at: None,
            size_hint: None,
            failure: None,
        }
    }

    /// Pending -> Loading. Returns false (and changes nothing) from any other status.
    pub fn begin(&mut self) -> bool {
        if !self.status.is_pending() {
            return false;
        }
        self.status = ResourceStatus::Loading;
        self.started_at = Some(Instant::now());
        true
    }

    /// Loading -> Loaded, keeping the size hint when the strategy produced one.
    pub fn complete(&mut self, size_hint: Option<String>) -> bool {
        if !self.status.is_loading() {
            return false;
        }
        self.status = ResourceStatus::Loaded;
        self.finished_at = Some(Instant::now());
        if self.kind == ResourceKind::Image {
            self.size_hint = size_hint;
        }
        true
    }

    /// Loading -> Error with the captured failure.
    pub fn fail(&mut self, failure: LoadError) -> bool {
        if !self.status.is_loading() {
            return false;
        }
        self.status = ResourceStatus::Error;
        self.finished_at = Some(Instant::now());
        self.failure = Some(failure);
        true
    }

    pub fn duration(&self) -> Option<Duration> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some(end.saturating_duration_since(start)),
            (Some(start), None) => Some(start.elapsed()),
            _ => None,
        }
    }
}
