//! Collection relationships over a SQLite-backed spatiotemporal triple store.
//!
//! A [`CollectionEngine`] groups stored objects into collections through
//! weighted relations and answers membership, spatial intersection and
//! adjacency questions about them. Every operation runs in one store
//! transaction on a bounded worker pool; streaming results are delivered as
//! [`ResultStream`]s.
//!
//! ```rust,no_run
//! use futures::TryStreamExt;
//! use spatiograph::{CollectionEngine, EngineConfig};
//!
//! # async fn run() -> spatiograph::Result<()> {
//! let engine = CollectionEngine::open(EngineConfig::load()?)?;
//! let collections: Vec<String> = engine.collections().try_collect().await?;
//! # let _ = collections;
//! # Ok(())
//! # }
//! ```

pub mod collection;
pub mod config;
pub mod errors;
pub mod executor;
pub mod fault_injection;
pub mod iri;
pub mod literal;
pub mod object;
pub mod query;
pub mod schema;
pub mod spatial;
pub mod store;
pub mod temporal;
pub mod vocabulary;

pub use crate::collection::{CollectionEngine, CollectionRelationType};
pub use crate::config::{EngineConfig, PoolConfig, StoreConfig};
pub use crate::errors::{Result, SpatioGraphError};
pub use crate::executor::{ExecutorPool, ResultStream, RowSink};
pub use crate::fault_injection::{FaultInjector, FaultPoint};
pub use crate::iri::{Iri, parse_string_to_iri, relation_iri};
pub use crate::literal::{Datatype, Literal};
pub use crate::object::{ObjectMarshaller, ObjectRecord, TemporalObject};
pub use crate::query::QueryBuilder;
pub use crate::spatial::{BufferedGeometry, LengthUnit};
pub use crate::store::{
    GraphStore, ResultRow, SqliteStore, SqliteTransaction, StoreCapabilities, StoreTransaction,
    TransactionScope,
};
pub use crate::temporal::Temporal;
