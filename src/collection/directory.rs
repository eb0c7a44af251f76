use std::collections::HashMap;

use crate::{
    errors::Result,
    executor::ResultStream,
    store::{GraphStore, StoreTransaction},
    vocabulary::{self, term},
};

use super::CollectionEngine;

impl<S: GraphStore> CollectionEngine<S> {
    /// Every collection in the store, as full identifiers.
    pub fn collections(&self) -> ResultStream<String> {
        self.stream_in_transaction(|txn, sink| {
            txn.get_instances(&term(vocabulary::COLLECTION_CLASS), &mut |collection| {
                sink.send(String::from(collection))
            })
        })
    }

    /// The collections `individual` belongs to with at least `min_strength`,
    /// mapped to their members of at least that strength. `collection`
    /// narrows the result to a single collection.
    pub async fn related_collections(
        &self,
        individual: &str,
        collection: Option<&str>,
        min_strength: f64,
    ) -> Result<HashMap<String, Vec<String>>> {
        let individual = self.resolve(individual);
        let collection = collection.map(|id| self.resolve(id));
        let query = self.queries.build_collection_retrieval_query(
            &individual,
            collection.as_ref(),
            min_strength,
        )?;
        let related = self
            .in_transaction(false, move |txn| {
                let mut related: HashMap<String, Vec<String>> = HashMap::new();
                txn.execute_query(&query, &mut |row| {
                    let collection = row.unwrap_individual("collection")?;
                    let member = row.unwrap_individual("individual")?;
                    related
                        .entry(collection.into())
                        .or_default()
                        .push(member.into());
                    Ok(())
                })?;
                Ok(related)
            })
            .await?;
        tracing::debug!(
            %individual,
            collections = related.len(),
            min_strength,
            "resolved related collections"
        );
        Ok(related)
    }
}
