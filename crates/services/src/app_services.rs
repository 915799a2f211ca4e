use std::sync::Arc;

use storage::repository::Storage;
use vision_core::vision::{Astigmatism, ColorVision, ContrastSensitivity, TumblingE, VisualAcuity};

use crate::Clock;
use crate::error::AppServicesError;
use crate::results_service::ResultsService;
use crate::vision_test_service::VisionTestService;

/// Assembles one service per test type plus the combined results view.
#[derive(Clone)]
pub struct AppServices {
    visual_acuity: Arc<VisionTestService<VisualAcuity>>,
    contrast_sensitivity: Arc<VisionTestService<ContrastSensitivity>>,
    color_vision: Arc<VisionTestService<ColorVision>>,
    astigmatism: Arc<VisionTestService<Astigmatism>>,
    tumbling_e: Arc<VisionTestService<TumblingE>>,
    results: Arc<ResultsService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(db_url: &str, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(&storage, clock))
    }

    /// Build services over a fresh in-memory store.
    #[must_use]
    pub fn in_memory(clock: Clock) -> Self {
        Self::from_storage(&Storage::in_memory(), clock)
    }

    #[must_use]
    pub fn from_storage(storage: &Storage, clock: Clock) -> Self {
        Self {
            visual_acuity: Arc::new(VisionTestService::new(clock, Arc::clone(&storage.sessions))),
            contrast_sensitivity: Arc::new(VisionTestService::new(
                clock,
                Arc::clone(&storage.sessions),
            )),
            color_vision: Arc::new(VisionTestService::new(clock, Arc::clone(&storage.sessions))),
            astigmatism: Arc::new(VisionTestService::new(clock, Arc::clone(&storage.sessions))),
            tumbling_e: Arc::new(VisionTestService::new(clock, Arc::clone(&storage.sessions))),
            results: Arc::new(ResultsService::new(Arc::clone(&storage.sessions))),
        }
    }

    #[must_use]
    pub fn visual_acuity(&self) -> Arc<VisionTestService<VisualAcuity>> {
        Arc::clone(&self.visual_acuity)
    }

    #[must_use]
    pub fn contrast_sensitivity(&self) -> Arc<VisionTestService<ContrastSensitivity>> {
        Arc::clone(&self.contrast_sensitivity)
    }

    #[must_use]
    pub fn color_vision(&self) -> Arc<VisionTestService<ColorVision>> {
        Arc::clone(&self.color_vision)
    }

    #[must_use]
    pub fn astigmatism(&self) -> Arc<VisionTestService<Astigmatism>> {
        Arc::clone(&self.astigmatism)
    }

    #[must_use]
    pub fn tumbling_e(&self) -> Arc<VisionTestService<TumblingE>> {
        Arc::clone(&self.tumbling_e)
    }

    #[must_use]
    pub fn results(&self) -> Arc<ResultsService> {
        Arc::clone(&self.results)
    }
}
