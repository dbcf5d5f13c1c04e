//! # link-stdlib
//!
//! Turns Ruby standard library names (`String#upcase`, `YAML::load`,
//! `Math#sqrt`) into links to their pages on the official documentation site.
//!
//! ## Architecture
//!
//! - **version**: Ruby versions and RubyGems-style requirements
//! - **selector**: Choosing the Ruby version to link against
//! - **source**: Downloading and unpacking Ruby source trees
//! - **fetch**: HTTP transport and tar.gz extraction used by `source`
//! - **ruby**: The isolated RDoc extraction process
//! - **index**: Flattening RDoc output into persisted object maps
//! - **rules**: Alias and rewrite rules for names RDoc records differently
//! - **object_map**: Per-version map loading and name resolution
//! - **url**: Documentation URL composition
//! - **context**: The current map and the wiring around it
//! - **link**: The cross-reference hook
//! - **config**: Settings from flags, environment and defaults

pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod fetch;
pub mod index;
pub mod link;
pub mod object_map;
pub mod rules;
pub mod ruby;
pub mod selector;
pub mod source;
pub mod url;
pub mod version;
