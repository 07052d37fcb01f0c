use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use parley_core::participant::{MemoryParticipant, ParticipantBinding};

/// Participants to bind for a CLI session, keyed by role.
///
/// ```toml
/// [participants.player]
/// kind = "Hero"
///
/// [participants.player.variables]
/// gold = 12
/// has_pass = true
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct Cast {
    #[serde(default)]
    pub participants: BTreeMap<String, MemoryParticipant>,
}

impl Cast {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read cast file {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid cast file {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn into_binding(self) -> ParticipantBinding {
        let mut binding = ParticipantBinding::new();
        for (role, participant) in self.participants {
            binding.bind(role, participant);
        }
        binding
    }
}

/// Load the cast at `path`, or bind nobody.
pub fn load_binding(path: Option<&Path>) -> Result<ParticipantBinding> {
    match path {
        Some(p) => Ok(Cast::load(p)?.into_binding()),
        None => Ok(ParticipantBinding::new()),
    }
}
