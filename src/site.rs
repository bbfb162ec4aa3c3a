//! Site configuration document, as far as the loading screen needs it
//!
//! The full document is produced by the localized configuration layer; only
//! the title and the ordered list of character lobbies are read here.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::startup::loader::ResourceLoader;
use crate::startup::resource::ResourceKind;

/// One character lobby: a skeleton and an atlas under a common path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LobbyDescriptor {
    #[serde(default)]
    pub name: Option<String>,
    pub path: String,
    pub skel: String,
    pub atlas: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteConfig {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, rename = "memorialLobbies", alias = "memorial_lobbies")]
    pub memorial_lobbies: Vec<LobbyDescriptor>,
}

impl LobbyDescriptor {
    pub fn skeleton_url(&self) -> String {
        format!("{}{}", self.path, self.skel)
    }

    pub fn atlas_url(&self) -> String {
        format!("{}{}", self.path, self.atlas)
    }
}

impl SiteConfig {
    /// Parse a document; TOML for `.toml` paths, JSON otherwise.
    pub fn parse(content: &str, is_toml: bool) -> Result<Self> {
        if is_toml {
            toml::from_str(content).context("Failed to parse site config as TOML")
        } else {
            serde_json::from_str(content).context("Failed to parse site config as JSON")
        }
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read site config {}", path.display()))?;

        let is_toml = path.extension().is_some_and(|ext| ext == "toml");
        Self::parse(&content, is_toml)
    }

    pub fn title_or_default(&self) -> &str {
        self.title.as_deref().unwrap_or("Home")
    }
}

/// Register a skeleton and an atlas resource per lobby.
///
/// Ids use the lobby's position, so lobbies sharing a path or name stay distinct.
pub async fn register_lobby_assets(loader: &ResourceLoader, lobbies: &[LobbyDescriptor]) -> usize {
    let mut added = 0;
    for (index, lobby) in lobbies.iter().enumerate() {
        let skeleton_id = format!("character_skeleton_{}", index);
        let atlas_id = format!("character_atlas_{}", index);

        if loader
            .add_resource(&skeleton_id, &lobby.skeleton_url(), ResourceKind::CharacterAsset)
            .await
        {
            added += 1;
        }
        if loader
            .add_resource(&atlas_id, &lobby.atlas_url(), ResourceKind::CharacterAsset)
            .await
        {
            added += 1;
        }
    }

    info!("Registered assets for {} character lobbies", lobbies.len());
    added
}
