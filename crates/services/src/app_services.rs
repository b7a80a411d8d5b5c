use std::path::PathBuf;
use std::sync::Arc;

use practice_core::model::PracticeSettings;
use storage::repository::Storage;

use crate::Clock;
use crate::error::AppServicesError;
use crate::progress_service::ProgressService;
use crate::repair_service::RepairService;

/// Assembles app-facing services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    settings: PracticeSettings,
    clock: Clock,
    progress: Arc<ProgressService>,
    repair: Arc<RepairService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        settings: PracticeSettings,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(&storage, clock, settings))
    }

    /// Build services backed by JSON files under `root`.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the directory cannot be prepared.
    pub async fn new_local(
        root: impl Into<PathBuf>,
        clock: Clock,
        settings: PracticeSettings,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::local(root).await?;
        Ok(Self::from_storage(&storage, clock, settings))
    }

    #[must_use]
    pub fn in_memory(clock: Clock, settings: PracticeSettings) -> Self {
        Self::from_storage(&Storage::in_memory(), clock, settings)
    }

    #[must_use]
    pub fn from_storage(storage: &Storage, clock: Clock, settings: PracticeSettings) -> Self {
        Self {
            settings,
            clock,
            progress: Arc::new(ProgressService::new(clock, Arc::clone(&storage.progress))),
            repair: Arc::new(RepairService::new(clock, Arc::clone(&storage.progress))),
        }
    }

    #[must_use]
    pub fn settings(&self) -> PracticeSettings {
        self.settings
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn repair(&self) -> Arc<RepairService> {
        Arc::clone(&self.repair)
    }
}
