//! Transactional graph store contract and its SQLite implementation.
//!
//! A [`GraphStore`] hands out exclusive [`StoreTransaction`]s. Every read and
//! write goes through a transaction; nothing is visible to other
//! transactions until [`StoreTransaction::commit`] succeeds, and a
//! transaction dropped without committing is rolled back.

pub mod functions;
mod scope;
mod sqlite;

pub use scope::TransactionScope;
pub use sqlite::{SqliteStore, SqliteTransaction};

use crate::{
    errors::{Result, SpatioGraphError},
    iri::Iri,
    literal::Literal,
};

/// Predicates the store's query layer is able to evaluate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreCapabilities {
    pub spatial: bool,
}

/// One row of a query result, addressed by binding (column) name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultRow {
    bindings: Vec<(String, Option<String>)>,
}

impl ResultRow {
    pub fn new(bindings: Vec<(String, Option<String>)>) -> Self {
        Self { bindings }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.bindings
            .iter()
            .find(|(binding, _)| binding == name)
            .and_then(|(_, value)| value.as_deref())
    }

    pub fn individual(&self, name: &str) -> Option<Iri> {
        self.get(name).map(Iri::from_absolute)
    }

    /// Like [`ResultRow::individual`], but a missing or null binding is a
    /// [`SpatioGraphError::MissingBinding`].
    pub fn unwrap_individual(&self, name: &str) -> Result<Iri> {
        self.individual(name)
            .ok_or_else(|| SpatioGraphError::missing_binding(format!("{name} is null")))
    }

    pub fn binding_names(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().map(|(name, _)| name.as_str())
    }
}

pub trait GraphStore: Send + Sync + 'static {
    type Transaction<'a>: StoreTransaction
    where
        Self: 'a;

    /// Opens a new top-level transaction. Blocks until the store can grant it.
    fn open_transaction(&self, writable: bool) -> Result<Self::Transaction<'_>>;

    fn capabilities(&self) -> StoreCapabilities;
}

pub trait StoreTransaction {
    fn id(&self) -> u64;

    fn is_writable(&self) -> bool;

    fn commit(self) -> Result<()>
    where
        Self: Sized;

    fn abort(self) -> Result<()>
    where
        Self: Sized;

    /// Forces the eventual commit to fail and roll back.
    fn mark_rollback_only(&mut self);

    fn is_rollback_only(&self) -> bool;

    fn create_individual(&mut self, class: &Iri, individual: &Iri) -> Result<()>;

    /// Removes the individual together with every property mentioning it.
    fn remove_individual(&mut self, individual: &Iri) -> Result<()>;

    fn individual_exists(&mut self, individual: &Iri) -> Result<bool>;

    fn write_object_property(&mut self, subject: &Iri, property: &Iri, object: &Iri) -> Result<()>;

    /// Removes one assertion, or every assertion of `property` when `object` is `None`.
    fn remove_object_property(
        &mut self,
        subject: &Iri,
        property: &Iri,
        object: Option<&Iri>,
    ) -> Result<()>;

    fn write_data_property(&mut self, subject: &Iri, property: &Iri, value: &Literal) -> Result<()>;

    fn remove_data_property(
        &mut self,
        subject: &Iri,
        property: &Iri,
        value: Option<&Literal>,
    ) -> Result<()>;

    fn get_object_property_values(&mut self, subject: &Iri, property: &Iri) -> Result<Vec<Iri>>;

    fn get_data_property_value(&mut self, subject: &Iri, property: &Iri) -> Result<Option<Literal>>;

    /// Visits every individual asserted to be of `class`. An error returned by
    /// `visit` stops the scan and is propagated.
    fn get_instances(
        &mut self,
        class: &Iri,
        visit: &mut dyn FnMut(Iri) -> Result<()>,
    ) -> Result<()>;

    /// Executes `query` and visits rows as the store produces them.
    fn execute_query(
        &mut self,
        query: &str,
        visit: &mut dyn FnMut(ResultRow) -> Result<()>,
    ) -> Result<()>;

    /// Declares `inverse` as the inverse of `property` (and vice versa).
    fn declare_inverse(&mut self, property: &Iri, inverse: &Iri) -> Result<()>;
}
