//! Quarry: answer natural-language questions over heterogeneous data sources.
//!
//! A bounded, tool-using language-model session explores relational
//! databases, OpenAPI-described services and document directories through a
//! fixed set of read-only tools, then coerces its final answer into a
//! caller-specified type.
//!
//! # Quick Start
//!
//! ```no_run
//! use quarry::prelude::*;
//! use quarry::datasource::DriverRegistry;
//!
//! # async fn example() -> quarry::error::Result<()> {
//! let config = QuarryConfig::load()?
//!     .with_source(SourceConfig::named("docs", "file:///srv/handbook"));
//! let quarry = Quarry::from_config(config, &DriverRegistry::new()).await?;
//! let answer = quarry
//!     .ask(AskRequest::new(
//!         "Which team owns the billing service?",
//!         TypeDescriptor::optional(TypeDescriptor::String),
//!     ))
//!     .await?;
//! println!("{answer}");
//! # Ok(())
//! # }
//! ```

pub mod agent_loop;
pub mod config;
pub mod datasource;
pub mod error;
pub mod learning;
pub mod models;
pub mod output;
pub mod prelude;
pub mod provider;
pub mod quarry;
pub mod search;
pub mod tools;
pub mod types;

pub use crate::quarry::{AskRequest, Quarry};
