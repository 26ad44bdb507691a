//! fedsearch-mediator
//!
//! Turns a `(resource, query)` pair into a ranked response, combining the
//! resource directory, the result cache and remote fetches.

pub mod http;
pub mod mediator;
pub mod response;

pub use http::HttpClient;
pub use mediator::{resource_id, Mediator};
pub use response::{QueryResponse, ResponseBody, Status};
