use crate::{
    errors::{Result, SpatioGraphError},
    iri::relation_iri,
    literal::Literal,
    object::TemporalObject,
    store::{GraphStore, StoreTransaction},
    vocabulary::{self, term},
};

use super::{CollectionEngine, CollectionRelationType, remove_relation};

impl<S: GraphStore> CollectionEngine<S> {
    /// Asserts `collection` as a collection. Asserting an existing one is a
    /// no-op.
    pub async fn create_collection(&self, collection: &str) -> Result<()> {
        let collection = self.resolve(collection);
        self.in_transaction(true, move |txn| {
            txn.create_individual(&term(vocabulary::COLLECTION_CLASS), &collection)?;
            tracing::debug!(%collection, "created collection");
            Ok(())
        })
        .await
    }

    /// Stores `object` and relates it to `collection` with `strength`.
    ///
    /// The object, the relation's type, its `relation_of` edge, its strength
    /// and its `related_to` edge are written in that order, followed by the
    /// collection itself when collections are created on demand. The first
    /// failing step aborts the whole write.
    pub async fn add_object_to_collection<T: TemporalObject>(
        &self,
        collection: &str,
        object: &T,
        relation_type: CollectionRelationType,
        strength: f64,
    ) -> Result<()> {
        if !strength.is_finite() {
            return Err(SpatioGraphError::invalid_input(format!(
                "relation strength must be finite, got {strength}"
            )));
        }
        let collection = self.resolve(collection);
        let record = self.marshaller.to_record(object)?;
        let relation = relation_iri(&self.prefix, &collection, &record.individual);
        let marshaller = self.marshaller.clone();
        let auto_create = self.auto_create_collections;

        self.in_transaction(true, move |txn| {
            if !auto_create && !txn.individual_exists(&collection)? {
                return Err(SpatioGraphError::not_found(format!("collection {collection}")));
            }
            marshaller.write_record(txn, &record)?;
            txn.create_individual(&term(vocabulary::RELATION_CLASS), &relation)?;
            txn.write_object_property(&relation, &term(vocabulary::RELATION_OF), &record.individual)?;
            txn.write_data_property(
                &relation,
                &term(vocabulary::RELATION_STRENGTH),
                &Literal::double(strength),
            )?;
            txn.write_object_property(&relation, &term(vocabulary::RELATED_TO), &collection)?;
            if auto_create {
                txn.create_individual(&term(vocabulary::COLLECTION_CLASS), &collection)?;
            }
            tracing::debug!(
                %collection,
                member = %record.individual,
                %relation,
                %relation_type,
                strength,
                "added object to collection"
            );
            Ok(())
        })
        .await
    }

    /// Removes the relation between `object` and `collection`. With
    /// `cascade_if_empty`, a collection left without members is removed too.
    pub async fn remove_object_from_collection<T: TemporalObject>(
        &self,
        collection: &str,
        object: &T,
        cascade_if_empty: bool,
    ) -> Result<()> {
        let collection = self.resolve(collection);
        let member = self.marshaller.resolve_identity(object);
        let relation = relation_iri(&self.prefix, &collection, &member);

        self.in_transaction(true, move |txn| {
            remove_relation(txn, &relation, &collection)?;
            if cascade_if_empty {
                let remaining = txn.get_object_property_values(&collection, &term(vocabulary::RELATED_BY))?;
                tracing::debug!(%collection, remaining = remaining.len(), "checked collection for cascade");
                if remaining.is_empty() {
                    txn.remove_individual(&collection)?;
                    tracing::debug!(%collection, "removed empty collection");
                }
            }
            Ok(())
        })
        .await
    }

    /// Removes `collection` together with every relation pointing at it.
    /// Members themselves are kept.
    pub async fn remove_collection(&self, collection: &str) -> Result<()> {
        let collection = self.resolve(collection);
        self.in_transaction(true, move |txn| {
            let relations = txn.get_object_property_values(&collection, &term(vocabulary::RELATED_BY))?;
            for relation in &relations {
                remove_relation(txn, relation, &collection)?;
            }
            txn.remove_individual(&collection)?;
            tracing::info!(%collection, relations = relations.len(), "removed collection");
            Ok(())
        })
        .await
    }
}
