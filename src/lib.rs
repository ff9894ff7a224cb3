//! webdown: convert web resources into annotated markdown documents.
//!
//! A single long-lived [`Converter`] owns one rendering engine, routes each
//! identifier to an extraction strategy, caches raw bodies, and annotates
//! results with YAML frontmatter. The [`IdleController`] closes the engine
//! after a period without requests.

pub mod browser;
pub mod cache;
pub mod config;
pub mod crawl;
pub mod error;
pub mod extract;
pub mod lifecycle;
pub mod llm;
pub mod metadata;
pub mod orchestrator;
pub mod ratelimit;
pub mod server;
pub mod utils;

pub use browser::{BrowserManager, ChromeLauncher, RenderingResource, ResourceManager};
pub use cache::{CacheAside, KvStore, MemoryKvStore};
pub use config::{ServiceConfig, ServiceConfigBuilder};
pub use crawl::{CrawlOutcome, crawl};
pub use error::{ExtractError, ServiceError};
pub use extract::{StrategyKind, route};
pub use lifecycle::{FileStateStore, IdleController, IdleState, MemoryStateStore, StateStore};
pub use metadata::annotate;
pub use orchestrator::{Caller, ConversionOptions, ConversionRequest, ConversionResult, Converter};
pub use server::{AppState, create_router};
