#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod config;
pub mod error;
pub mod hit;
pub mod resource;
pub mod sanitize;
pub mod traits;

pub use error::{Error, FetchError, Result};
pub use hit::{rank, FieldValue, Hit};
pub use resource::Resource;
pub use traits::{Fetcher, Suggester};
