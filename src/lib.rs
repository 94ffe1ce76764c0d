//! Status-error catalog builder
//!
//! Scans a Rust crate for the constants of a status error type and turns
//! them into a sorted catalog of [`ErrorDescriptor`]s: key, numeric code
//! (raw value plus the type's service code), message and talkable flag
//! taken from the constant's doc comment.
//!
//! ## Pipeline
//! Rust sources -> [`SourceLoader`] (syn) -> [`Program`] -> [`CatalogBuilder`]
//!
//! ## Quick Start
//!
//! ```rust
//! use status_catalog::{CatalogBuilder, SourceLoader, TargetType};
//!
//! let mut loader = SourceLoader::new();
//! loader.add_source(
//!     "crate::errors",
//!     r#"
//!     pub struct AppError(pub i32);
//!
//!     impl AppError {
//!         pub fn service_code(&self) -> i32 { 400 }
//!     }
//!
//!     /// @errTalk invalid request
//!     pub const INVALID: AppError = AppError(1);
//!     "#,
//! )?;
//!
//! let builder = CatalogBuilder::new(loader.build()?);
//! let catalog = builder.catalog_for(&TargetType::new("crate::errors", "AppError"));
//! assert_eq!(catalog[0].code, 401);
//! assert_eq!(catalog[0].message, "invalid request");
//! assert!(catalog[0].talkable);
//! # Ok::<(), status_catalog::LoadError>(())
//! ```

// Error types
pub mod error;

// Builder configuration
pub mod config;

// Doc comment conventions
pub mod doc;

// Program model and the queries the builder needs
pub mod program;

// syn-based loader producing a Program
pub mod frontend;

// Catalog builder with per-type cache
pub mod catalog;

pub use catalog::CatalogBuilder;
pub use config::CatalogConfig;
pub use doc::{parse_descriptor, parse_descriptor_with, TALK_MARKER};
pub use error::{CatalogError, LoadError};
pub use frontend::SourceLoader;
pub use program::{Program, ProgramQuery, TargetType};

pub use status_types::{status_code_from_code, ErrorDescriptor, ServiceCode, StatusError};
