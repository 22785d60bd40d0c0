//! Saved issuer identities, reusable across quotes.

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};

use crate::model::Sender;
use crate::store::{KvStore, StoreError};

pub const PROFILES_KEY: &str = "devis-generator-sender-profiles";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SenderProfile {
    pub id: String,
    pub name: String,
    pub sender: Sender,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A new, unsaved profile (empty id) holding a copy of `sender`.
pub fn profile_from_sender(sender: &Sender, name: &str) -> SenderProfile {
    let now = Utc::now();
    SenderProfile {
        id: String::new(),
        name: name.trim().to_string(),
        sender: sender.clone(),
        created_at: now,
        updated_at: now,
    }
}

fn generate_profile_id(now: DateTime<Utc>) -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(|b| (b as char).to_ascii_lowercase())
        .collect();
    format!("profile-{}-{}", now.timestamp_millis(), suffix)
}

/// All profiles live as one JSON array under [`PROFILES_KEY`].
pub struct ProfileStore<S: KvStore> {
    store: S,
}

impl<S: KvStore> ProfileStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Saved profiles in insertion order. Unreadable data counts as no profiles.
    pub fn list(&self) -> Result<Vec<SenderProfile>, StoreError> {
        let Some(raw) = self.store.get(PROFILES_KEY)? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str(&raw) {
            Ok(profiles) => Ok(profiles),
            Err(e) => {
                log::warn!("ignoring corrupt sender profiles: {}", e);
                Ok(Vec::new())
            }
        }
    }

    fn write(&self, profiles: &[SenderProfile]) -> Result<(), StoreError> {
        let raw = serde_json::to_string_pretty(profiles)?;
        self.store.set(PROFILES_KEY, &raw)
    }

    /// Inserts or updates by id and returns the stored version.
    pub fn save(&self, mut profile: SenderProfile) -> Result<SenderProfile, StoreError> {
        let mut profiles = self.list()?;
        let now = Utc::now();

        match profiles.iter_mut().find(|p| !profile.id.is_empty() && p.id == profile.id) {
            Some(existing) => {
                profile.created_at = existing.created_at;
                profile.updated_at = now;
                *existing = profile.clone();
                log::debug!("updated sender profile {}", profile.id);
            }
            None => {
                if profile.id.is_empty() {
                    profile.id = generate_profile_id(now);
                }
                profile.created_at = now;
                profile.updated_at = now;
                profiles.push(profile.clone());
                log::debug!("created sender profile {}", profile.id);
            }
        }

        self.write(&profiles)?;
        Ok(profile)
    }

    /// Returns whether a profile was removed.
    pub fn remove(&self, id: &str) -> Result<bool, StoreError> {
        let mut profiles = self.list()?;
        let before = profiles.len();
        profiles.retain(|p| p.id != id);
        if profiles.len() == before {
            return Ok(false);
        }
        self.write(&profiles)?;
        Ok(true)
    }

    pub fn get_by_id(&self, id: &str) -> Result<Option<SenderProfile>, StoreError> {
        Ok(self.list()?.into_iter().find(|p| p.id == id))
    }
}
