//! Topics and the topic store.
//!
//! Topics are created once (first-run seeding, migration or user action) and
//! are never deleted by the board. Names are unique and case-sensitive; the
//! uniqueness check runs here, before any remote write.

use crate::board::validation::validate_topic_name;
use crate::constants::{DEFAULT_TOPICS, LEGACY_TOPIC_RENAMES, REQUIRED_TOPICS};
use crate::error::{BoardError, Result};
use crate::remote::{SharedDocumentStore, SnapshotListener, Subscription};
use crate::types::RecordId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{error, info, instrument, warn};

/// A named discussion category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub id: RecordId,
    pub name: String,
    /// Server timestamp in milliseconds.
    pub created_at: u64,
}

/// Rename table and required-name list applied by [`TopicStore::migrate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationPlan {
    renames: Vec<(String, String)>,
    required: Vec<String>,
}

impl MigrationPlan {
    pub fn new(renames: Vec<(String, String)>, required: Vec<String>) -> Self {
        Self { renames, required }
    }

    /// The legacy rename table and the current required topic list.
    pub fn standard() -> Self {
        Self {
            renames: LEGACY_TOPIC_RENAMES
                .iter()
                .map(|(old, new)| (old.to_string(), new.to_string()))
                .collect(),
            required: REQUIRED_TOPICS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn renames(&self) -> &[(String, String)] {
        &self.renames
    }

    pub fn required(&self) -> &[String] {
        &self.required
    }
}

/// What a migration pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub renamed: usize,
    pub added: usize,
}

impl MigrationReport {
    /// True when the pass found nothing to do.
    pub fn is_noop(&self) -> bool {
        self.renamed == 0 && self.added == 0
    }
}

/// Maintains the topic collection.
#[derive(Clone)]
pub struct TopicStore {
    store: SharedDocumentStore,
}

impl TopicStore {
    pub fn new(store: SharedDocumentStore) -> Self {
        Self { store }
    }

    /// Seeds `seed` into an empty collection, then runs `migration` if given.
    ///
    /// Returns the number of seeded topics and the migration report.
    #[instrument(skip(self, seed, migration))]
    pub async fn initialize(
        &self,
        seed: &[&str],
        migration: Option<&MigrationPlan>,
    ) -> Result<(usize, MigrationReport)> {
        let existing = self.store.list_topics().await.map_err(|e| {
            error!("Failed to load topics: {}", e);
            e
        })?;

        let mut seeded = 0;
        if existing.is_empty() {
            for name in seed {
                self.store.insert_topic(name).await?;
                seeded += 1;
            }
            info!("Seeded {} default topics", seeded);
        }

        let report = match migration {
            Some(plan) => self.migrate(plan).await?,
            None => MigrationReport::default(),
        };
        Ok((seeded, report))
    }

    /// Seeds the default topic set and runs the standard migration.
    pub async fn initialize_defaults(&self, migrate: bool) -> Result<(usize, MigrationReport)> {
        let plan = MigrationPlan::standard();
        self.initialize(DEFAULT_TOPICS, migrate.then_some(&plan)).await
    }

    /// Renames legacy topics, then inserts any required name that is absent.
    ///
    /// Re-running against the result changes nothing. A rename whose target
    /// name already exists is skipped so names stay unique.
    #[instrument(skip(self, plan))]
    pub async fn migrate(&self, plan: &MigrationPlan) -> Result<MigrationReport> {
        let topics = self.store.list_topics().await?;
        let mut names: HashSet<String> = topics.iter().map(|t| t.name.clone()).collect();
        let mut report = MigrationReport::default();

        for topic in &topics {
            let Some((_, new_name)) = plan.renames.iter().find(|(old, _)| *old == topic.name)
            else {
                continue;
            };
            if names.contains(new_name) {
                warn!(
                    "Skipping rename {} -> {}: target already exists",
                    topic.name, new_name
                );
                continue;
            }
            self.store.rename_topic(&topic.id, new_name).await?;
            names.remove(&topic.name);
            names.insert(new_name.clone());
            report.renamed += 1;
        }

        for name in &plan.required {
            if !names.contains(name) {
                self.store.insert_topic(name).await?;
                names.insert(name.clone());
                report.added += 1;
            }
        }

        if !report.is_noop() {
            info!(
                "Topic migration: {} renamed, {} added",
                report.renamed, report.added
            );
        }
        Ok(report)
    }

    /// Creates a topic after trimming and checking the name.
    #[instrument(skip(self))]
    pub async fn add_topic(&self, name: &str) -> Result<Topic> {
        let name = name.trim();
        validate_topic_name(name)?;

        let topics = self.store.list_topics().await?;
        if topics.iter().any(|t| t.name == name) {
            return Err(BoardError::DuplicateTopic(name.to_string()));
        }

        let topic = self.store.insert_topic(name).await.map_err(|e| {
            error!("Error adding topic: {}", e);
            e
        })?;
        info!("Topic created: {}", topic.name);
        Ok(topic)
    }

    /// Current topics, creation time ascending.
    pub async fn topics(&self) -> Result<Vec<Topic>> {
        self.store.list_topics().await
    }

    /// Subscribes to the topic list.
    pub async fn watch(&self, listener: SnapshotListener<Topic>) -> Result<Subscription> {
        self.store.watch_topics(listener).await
    }
}
