//! Export crawled news articles as a sorted RSS 2.0 feed, optionally
//! mirroring them into CouchDB.

pub mod article;
pub mod config;
pub mod content;
pub mod feed;
pub mod pipeline;
pub mod storage;
pub mod util;
