// Challenge catalog
// Static challenge content loaded from config/challenges.json

use crate::types::Challenge;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_CATALOG_PATH: &str = "config/challenges.json";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Challenge catalog not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read challenge catalog: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse challenge catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Duplicate challenge slug: {0}")]
    DuplicateSlug(String),

    #[error("Challenge '{0}' has no test cases")]
    NoTestCases(String),
}

#[derive(Debug, Serialize, Deserialize)]
struct ChallengesJson {
    challenges: Vec<Challenge>,
}

/// Read-only lookup of challenges by slug, in file order
#[derive(Debug, Clone)]
pub struct ChallengeCatalog {
    challenges: Vec<Challenge>,
    by_slug: HashMap<String, usize>,
}

impl ChallengeCatalog {
    /// Load challenges from a JSON file
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        if !path.exists() {
            return Err(CatalogError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let catalog = Self::from_json(&content)?;

        tracing::debug!(
            path = %path.display(),
            challenges = catalog.challenges.len(),
            "Loaded challenge catalog"
        );
        Ok(catalog)
    }

    /// Load with default path (config/challenges.json)
    pub fn load_default() -> Result<Self, CatalogError> {
        Self::load(Path::new(DEFAULT_CATALOG_PATH))
    }

    pub fn from_json(content: &str) -> Result<Self, CatalogError> {
        let parsed: ChallengesJson = serde_json::from_str(content)?;
        Self::from_challenges(parsed.challenges)
    }

    pub fn from_challenges(challenges: Vec<Challenge>) -> Result<Self, CatalogError> {
        let mut by_slug = HashMap::new();
        for (idx, challenge) in challenges.iter().enumerate() {
            if challenge.test_cases.is_empty() {
                return Err(CatalogError::NoTestCases(challenge.slug.clone()));
            }
            if by_slug.insert(challenge.slug.clone(), idx).is_some() {
                return Err(CatalogError::DuplicateSlug(challenge.slug.clone()));
            }
        }

        Ok(Self { challenges, by_slug })
    }

    pub fn get(&self, slug: &str) -> Option<&Challenge> {
        self.by_slug.get(slug).map(|&idx| &self.challenges[idx])
    }

    pub fn list(&self) -> &[Challenge] {
        &self.challenges
    }

    pub fn slugs(&self) -> Vec<&str> {
        self.challenges.iter().map(|c| c.slug.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.challenges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.challenges.is_empty()
    }
}
