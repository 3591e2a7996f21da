//! Core domain types for the content API.
//!
//! This module contains pure data types with no transport dependencies:
//! - The paginated list shape and its query parameters
//! - Articles, companies and locations

pub mod content;
pub mod page;

pub use content::{
    Article, ArticleCategory, Company, CompanyCategory, CompanyFeature, Location, parse_timestamp,
};
pub use page::{ListPage, ListParams};
