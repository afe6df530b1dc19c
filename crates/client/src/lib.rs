//! Client code for lookahead.
//!
//! This crate provides the HTTP transport behind the search cache: a GitHub
//! Search API client implementing `lookahead_core::SearchService`.

pub mod github;

pub use github::{GithubClient, GithubConfig, GithubError, SearchRequest, validate_query};
