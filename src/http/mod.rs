//! HTTP client module
//!
//! Provides the HTTP transport used to talk to the warehouse REST API.
//!
//! # Features
//!
//! - **Automatic Retries**: Configurable retry logic with backoff
//! - **Backoff Strategies**: Constant, linear, and exponential backoff
//! - **Authentication**: Integration with auth module

mod client;

pub use client::{backoff_delay, HttpClient, HttpClientConfig, RequestBody, RequestConfig};

#[cfg(test)]
mod tests;
