// Pipeline ingestion: source registry, politeness controls, fetching, snapshots

pub mod crawler;
pub mod rate_limiter;
pub mod registry;
pub mod robots;
pub mod snapshot;
