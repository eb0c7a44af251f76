//! Collection relationship engine.
//!
//! Collections group individuals through reified relations. Each relation is
//! an individual of its own, linked to its member with `relation_of`, to its
//! collection with `related_to` (the store keeps the inverse `related_by`),
//! and weighted by a `relation_strength` value.
//!
//! Every public operation runs on the engine's [`ExecutorPool`] inside
//! exactly one store transaction, which commits when the operation succeeds
//! and aborts when any step fails.

mod directory;
mod membership;
mod spatial_query;

use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{
    config::EngineConfig,
    errors::Result,
    executor::{ExecutorPool, ResultStream, RowSink},
    iri::{Iri, parse_string_to_iri},
    object::ObjectMarshaller,
    query::QueryBuilder,
    store::{GraphStore, SqliteStore, StoreTransaction, TransactionScope},
    vocabulary::{self, term},
};

/// Why an individual belongs to a collection. Informational only; it does not
/// change how the relation is stored or queried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionRelationType {
    Spatial,
    Temporal,
    Semantic,
}

impl fmt::Display for CollectionRelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CollectionRelationType::Spatial => "spatial",
            CollectionRelationType::Temporal => "temporal",
            CollectionRelationType::Semantic => "semantic",
        };
        f.write_str(name)
    }
}

pub struct CollectionEngine<S: GraphStore> {
    store: Arc<S>,
    pool: ExecutorPool,
    marshaller: ObjectMarshaller,
    queries: QueryBuilder,
    prefix: String,
    auto_create_collections: bool,
}

impl CollectionEngine<SqliteStore> {
    /// Opens the SQLite store described by `config.store` and wraps it.
    pub fn open(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let store = SqliteStore::from_config(&config.store)?;
        Self::new(Arc::new(store), config)
    }
}

impl<S: GraphStore> CollectionEngine<S> {
    pub fn new(store: Arc<S>, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        {
            let mut txn = store.open_transaction(true)?;
            txn.declare_inverse(&term(vocabulary::RELATED_TO), &term(vocabulary::RELATED_BY))?;
            txn.commit()?;
        }
        let queries = QueryBuilder::new(store.capabilities());
        tracing::debug!(
            pool = %config.pool.name,
            size = config.pool.size,
            prefix = %config.prefix,
            "collection engine ready"
        );
        Ok(Self {
            store,
            pool: ExecutorPool::new(&config.pool),
            marshaller: ObjectMarshaller::new(config.prefix.clone()),
            queries,
            prefix: config.prefix,
            auto_create_collections: config.auto_create_collections,
        })
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn pool(&self) -> &ExecutorPool {
        &self.pool
    }

    pub fn marshaller(&self) -> &ObjectMarshaller {
        &self.marshaller
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn resolve(&self, id: &str) -> Iri {
        parse_string_to_iri(&self.prefix, id)
    }

    /// Runs `op` on the pool inside one transaction of its own.
    async fn in_transaction<R, F>(&self, writable: bool, op: F) -> Result<R>
    where
        R: Send + 'static,
        F: for<'t> FnOnce(&mut S::Transaction<'t>) -> Result<R> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        self.pool
            .run(move || {
                let mut scope = TransactionScope::owned(store.open_transaction(writable)?);
                let outcome = op(&mut *scope);
                scope.finish(outcome)
            })
            .await
    }

    /// Streams rows produced by `op` inside one read transaction. The
    /// transaction commits after the last row and aborts when the stream is
    /// dropped early.
    fn stream_in_transaction<T, F>(&self, op: F) -> ResultStream<T>
    where
        T: Send + 'static,
        F: for<'t> FnOnce(&mut S::Transaction<'t>, &RowSink<T>) -> Result<()> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        self.pool.stream(move |sink| {
            let mut scope = TransactionScope::owned(store.open_transaction(false)?);
            let outcome = op(&mut *scope, sink);
            scope.finish(outcome)
        })
    }
}

/// Removes a relation's edges and strength, then the relation itself, as a
/// scope joined to `parent`.
fn remove_relation<X: StoreTransaction>(parent: &mut X, relation: &Iri, collection: &Iri) -> Result<()> {
    let mut scope = TransactionScope::join(parent);
    let outcome = (|| {
        scope.remove_object_property(relation, &term(vocabulary::RELATED_TO), Some(collection))?;
        scope.remove_object_property(relation, &term(vocabulary::RELATION_OF), None)?;
        scope.remove_data_property(relation, &term(vocabulary::RELATION_STRENGTH), None)?;
        scope.remove_individual(relation)
    })();
    tracing::debug!(%relation, %collection, removed = outcome.is_ok(), "relation removal");
    scope.finish(outcome)
}
