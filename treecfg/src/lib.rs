//! Typed hierarchical configuration trees.
//!
//! `treecfg` keeps configuration in a canonical in-memory tree of typed
//! values. Heterogeneous sources (dynamic values, string-keyed maps, derived
//! records, other trees) normalize into the tree, trees merge recursively
//! with per-field strategies, and a tree materializes back into caller
//! types with coercion, defaults, validation, and redaction. Strings may
//! carry `${path}` references with default alternatives; they stay lazy in
//! the tree and resolve when values are read.
//!
//! ```
//! use serde_json::json;
//! use treecfg::{Config, Options};
//!
//! # fn main() -> treecfg::Result<()> {
//! let opts = Options::new().path_sep(".");
//! let cfg = Config::from_source(&json!({"server": {"port": 8080}}), &opts)?;
//! cfg.merge(&json!({"server": {"host": "localhost"}}), &opts)?;
//!
//! assert_eq!(cfg.get_int("server.port", None, &opts)?, 8080);
//! assert_eq!(cfg.get_str("server.host", None, &opts)?, "localhost");
//! # Ok(())
//! # }
//! ```
//!
//! Record types derive [`Config`](derive@Config) support, reading tag
//! modifiers from `#[config(...)]` attributes:
//!
//! ```
//! use serde_json::json;
//! use treecfg::{Config, Options};
//!
//! #[derive(Debug, Default, treecfg::Config)]
//! struct Server {
//!     host: String,
//!     #[config(default = 8080, validate = "min=1")]
//!     port: u64,
//! }
//!
//! # fn main() -> treecfg::Result<()> {
//! let cfg = Config::from_source(&json!({"host": "example.org"}), &Options::new())?;
//! let mut server = Server::default();
//! cfg.unpack(&mut server)?;
//! assert_eq!(server.host, "example.org");
//! assert_eq!(server.port, 8080);
//! # Ok(())
//! # }
//! ```

// Generated code refers to this crate as `treecfg`; the alias makes those
// paths resolve inside the crate itself.
extern crate self as treecfg;

mod config;
mod error;
mod fields;
mod merge;
mod normalize;
mod opts;
mod path;
mod reify;
pub mod validators;
mod value;
mod variables;

/// Derive macro wiring a record type into normalization and unpacking.
pub use treecfg_macros::Config;

pub use config::Config;
pub use error::{Class, Error, Reason, Result};
pub use fields::{FieldFlags, FieldSet};
pub use merge::MergeStrategy;
pub use normalize::{ToConfig, ToValue};
pub use opts::{Meta, Options, Resolver, DEFAULT_MAX_IDX};
pub use reify::{FromValue, InitDefaults, Unpack, Validate};
pub use value::Value;
