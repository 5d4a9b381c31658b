#![forbid(unsafe_code)]

pub mod feed;
pub mod repository;
pub mod sqlite;

pub use feed::{Feed, Observed};
pub use repository::{
    GrammarPointRepository, InMemoryRepository, MasteryRepository, QuestionRepository, Storage,
    StorageError,
};
