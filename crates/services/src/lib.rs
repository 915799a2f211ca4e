#![forbid(unsafe_code)]

pub mod app_services;
pub mod error;
pub mod results_service;
pub mod vision_test_service;

pub use vision_core::Clock;

pub use app_services::AppServices;
pub use error::{AppServicesError, TestServiceError};
pub use results_service::{AllResults, ResultsService};
pub use vision_test_service::{AnswerReceipt, VisionTestService};
