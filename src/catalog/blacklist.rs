use super::CatalogError;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;
use teloxide::types::UserId;
use tracing::warn;

/// Senders denied the report flow, with how many times each was listed
#[derive(Debug, Clone, Default)]
pub struct Blacklist {
    offenses: HashMap<UserId, u32>,
}

impl Blacklist {
    /// Read a blacklist file. A missing file yields an empty blacklist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!(
                "Blacklist {} not found, starting with an empty blacklist",
                path.display()
            );
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read blacklist {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid blacklist {}", path.display()))
    }

    /// First line is the number of entries, each following line one user id.
    /// Repeated ids raise the offense count.
    pub fn parse(text: &str) -> Result<Self, CatalogError> {
        let mut lines = text
            .lines()
            .enumerate()
            .map(|(idx, line)| (idx + 1, line.trim()))
            .filter(|(_, line)| !line.is_empty());

        let Some((line, first)) = lines.next() else {
            return Ok(Self::default());
        };
        let expected: usize = first.parse().map_err(|_| CatalogError::BadCount {
            line,
            found: first.to_string(),
        })?;

        let mut offenses = HashMap::new();
        for found in 0..expected {
            let Some((line, raw)) = lines.next() else {
                return Err(CatalogError::TruncatedBlacklist { expected, found });
            };
            let id: u64 = raw.parse().map_err(|_| CatalogError::BadUserId {
                line,
                found: raw.to_string(),
            })?;
            *offenses.entry(UserId(id)).or_insert(0) += 1;
        }

        Ok(Self { offenses })
    }

    pub fn contains(&self, user: UserId) -> bool {
        self.offenses.contains_key(&user)
    }

    pub fn offenses(&self, user: UserId) -> u32 {
        self.offenses.get(&user).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.offenses.len()
    }
}

impl FromIterator<UserId> for Blacklist {
    fn from_iter<I: IntoIterator<Item = UserId>>(iter: I) -> Self {
        let mut offenses = HashMap::new();
        for user in iter {
            *offenses.entry(user).or_insert(0) += 1;
        }
        Self { offenses }
    }
}
