//! Utility functions for common operations.
//!
//! - **URL validation**: SSRF guard for URLs taken from crawled pages
//!
//! # Examples
//!
//! ```
//! use newsfeed::util::{check_url, UrlPolicy};
//!
//! assert!(check_url("https://img.example.com/a.jpg", UrlPolicy::PublicOnly).is_ok());
//! assert!(check_url("http://10.0.0.1/a.jpg", UrlPolicy::PublicOnly).is_err());
//! ```

mod url_validator;

pub use url_validator::{check_url, validate_url, UrlPolicy, UrlValidationError};
