//! # dbi
//!
//! Data access for RT Analytics: connect to MySQL, PostgreSQL, SQL Server
//! or SQLite, read tables and queries into [`Frame`]s, and load frames back
//! with append, replace or upsert semantics.
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use dbi::prelude::*;
//!
//! let db = Database::connect(&ConnectionSpec::from_env()?).await?;
//! let frame = Frame::read_csv("staff.csv")?;
//! db.upsert_frame(&frame, "rt_staff", &UpsertOptions::matching(["utln"])).await?;
//! println!("{} rows", db.record_count("rt_staff").await?);
//! ```
//!
//! ## Modules
//!
//! | Module        | Purpose                                        |
//! |---------------|------------------------------------------------|
//! | [`connect`]   | Connection parameters and URLs                 |
//! | [`engine`]    | Per-driver engines and transactions            |
//! | [`dialect`]   | Vendor-specific SQL generation                 |
//! | [`interface`] | Reads, writes and reflection on a database     |
//! | [`writer`]    | Batched transform-and-persist of records       |
//! | [`dump`]      | Table to CSV export                            |
//! | [`lookup`]    | Directory lookups (people, courses, tags)      |

pub mod config;
pub mod connect;
pub mod dialect;
pub mod dump;
pub mod engine;
pub mod error;
pub mod flavor;
pub mod frame;
pub mod interface;
pub mod lookup;
pub mod template;
pub mod value;
pub mod writer;

pub use connect::ConnectionSpec;
pub use error::{DbError, DbResult};
pub use flavor::Flavor;
pub use frame::Frame;
pub use interface::{Database, UpsertOptions};
pub use value::Value;

pub mod prelude {
    pub use crate::config::{DatabaseSettings, Settings};
    pub use crate::connect::ConnectionSpec;
    pub use crate::dialect::{OnConflict, SqlDialect};
    pub use crate::dump::{dump_from_env, dump_from_lookup, dump_table};
    pub use crate::engine::{Engine, Transaction};
    pub use crate::error::*;
    pub use crate::flavor::Flavor;
    pub use crate::frame::Frame;
    pub use crate::interface::{Database, UpsertOptions};
    pub use crate::lookup::{LookupClient, LookupConfig, LookupError};
    pub use crate::value::{Value, ValueKind};
    pub use crate::writer::{DbWriter, Record, RecordState, RecordWriter, Session};
}
