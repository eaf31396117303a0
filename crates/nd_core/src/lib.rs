pub mod config;
pub mod error;
pub mod pagination;
pub mod query;
pub mod storage;
pub mod types;

pub use error::{Error, Result};
pub use pagination::{Page, PAGE_SIZE};
pub use query::{ArticleFilter, SqlDialect, WhereClause};
pub use storage::ArticleStore;
pub use types::{Article, ArticleListing, AuthorCount, AuthorProfile, AuthorStats, DailyCount, Overview};
