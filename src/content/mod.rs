//! Enrichment of crawled articles with data fetched from the web.
//!
//! Runs on the producer side, before records reach the exporter.

mod image;

pub use image::{enrich_image_lengths, fetch_image_length, redirect_policy, ContentError};
