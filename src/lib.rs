pub mod catalog;
pub mod domain;
pub mod error;
pub mod logging;
pub mod observability;
pub mod pipeline;
