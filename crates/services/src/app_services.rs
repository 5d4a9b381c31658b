use std::sync::Arc;

use storage::repository::Storage;

use crate::achievements::AchievementsService;
use crate::error::AppServicesError;
use crate::quiz::QuizService;
use crate::seed::{SeedDataset, SeedReport, seed_if_empty};

/// Assembles app-facing services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    storage: Storage,
    achievements: Arc<AchievementsService>,
    seeded: SeedReport,
}

impl AppServices {
    /// Build services backed by `SQLite` storage, seeding empty tables first.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization or seeding fails.
    pub async fn new_sqlite(db_url: &str, dataset: &SeedDataset) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Self::from_storage(storage, dataset).await
    }

    /// Build services over an already-open storage backend.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError::Seed` if seeding fails.
    pub async fn from_storage(
        storage: Storage,
        dataset: &SeedDataset,
    ) -> Result<Self, AppServicesError> {
        let seeded = seed_if_empty(
            storage.grammar_points.as_ref(),
            storage.questions.as_ref(),
            dataset,
        )
        .await?;
        let achievements = Arc::new(AchievementsService::new(
            Arc::clone(&storage.grammar_points),
            Arc::clone(&storage.mastery),
        ));

        Ok(Self {
            storage,
            achievements,
            seeded,
        })
    }

    /// A fresh quiz screen. Each call starts its own session.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    #[must_use]
    pub fn quiz(&self) -> QuizService {
        QuizService::start(
            self.storage.grammar_points.as_ref(),
            Arc::clone(&self.storage.questions),
        )
    }

    #[must_use]
    pub fn achievements(&self) -> Arc<AchievementsService> {
        Arc::clone(&self.achievements)
    }

    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// What the startup seed wrote.
    #[must_use]
    pub fn seeded(&self) -> SeedReport {
        self.seeded
    }
}
