//! Network fetch client for the offshore caching agent.

pub mod fetch;

pub use fetch::{FetchClient, FetchConfig, FetchedResponse, Fetcher};
