//! Shared data model of the Breeze IDL.
//!
//! [`types`] holds the recursive type grammar, [`schema`] the entities a
//! parsed file is made of. Both are plain data; parsing whole files and
//! driving backends lives in `breeze-compiler`.
//!
//! ```
//! use breeze_schema::*;
//!
//! let t = parse_type("map<string, array<pkg.User>>", false).unwrap();
//! assert_eq!(t.to_string(), "map<string,array<pkg.User>>");
//! assert!(!t.is_primitive());
//! ```

pub mod schema;
pub mod types;

pub use schema::*;
pub use types::*;
