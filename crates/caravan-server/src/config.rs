//! Server configuration, loaded from an optional `caravan.toml`.

use std::net::SocketAddr;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use caravan_engagement::Participant;

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    /// Participants seeded into the static roster. A real deployment reads
    /// the roster from the login collaborator instead.
    pub roster: Vec<RosterEntry>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RosterEntry {
    pub id: String,
    pub display_name: Option<String>,
    pub squad: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            roster: Vec::new(),
        }
    }
}

impl ServerConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = toml::from_str(&raw)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    pub fn participants(&self) -> Vec<Participant> {
        self.roster
            .iter()
            .map(|entry| Participant {
                id: entry.id.clone(),
                display_name: entry.display_name.clone().unwrap_or_else(|| entry.id.clone()),
                squad: entry.squad.clone(),
            })
            .collect()
    }
}
