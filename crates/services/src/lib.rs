#![forbid(unsafe_code)]

pub mod achievements;
pub mod app_services;
pub mod error;
pub mod feed;
pub mod quiz;
pub mod seed;

pub use achievements::{AchievementsService, AchievementsUiState};
pub use app_services::AppServices;
pub use error::{AppServicesError, SeedError};
pub use feed::{CombineLatest, combine_latest};
pub use quiz::QuizService;
pub use seed::{SeedDataset, SeedReport, seed_if_empty};
