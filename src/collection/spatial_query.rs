use chrono::Utc;

use crate::{
    errors::{Result, SpatioGraphError},
    executor::ResultStream,
    iri::Iri,
    object::TemporalObject,
    spatial::{BufferedGeometry, LengthUnit},
    store::{GraphStore, StoreTransaction},
    temporal::{Temporal, adjusted_query_temporal},
};

use super::CollectionEngine;

impl<S: GraphStore> CollectionEngine<S> {
    /// Collections with a member intersecting `wkt` buffered by `buffer`
    /// metres. See [`Self::spatial_intersect_collections_with_unit`].
    pub fn spatial_intersect_collections(
        &self,
        wkt: &str,
        buffer: f64,
        min_strength: f64,
        valid_at: Option<Temporal>,
        as_of: Option<Temporal>,
    ) -> ResultStream<String> {
        self.spatial_intersect_collections_with_unit(
            wkt,
            buffer,
            LengthUnit::default(),
            min_strength,
            valid_at,
            as_of,
        )
    }

    /// Collections with a member of at least `min_strength` whose geometry
    /// intersects `wkt` buffered by `buffer` in `unit`.
    ///
    /// `valid_at` restricts members to those valid at that instant; without it
    /// validity is ignored. `as_of` selects members as recorded at that
    /// instant and defaults to now. Fails on the first item, without touching
    /// the store, when the store cannot evaluate spatial predicates.
    pub fn spatial_intersect_collections_with_unit(
        &self,
        wkt: &str,
        buffer: f64,
        unit: LengthUnit,
        min_strength: f64,
        valid_at: Option<Temporal>,
        as_of: Option<Temporal>,
    ) -> ResultStream<String> {
        let query = BufferedGeometry::new(wkt, buffer, unit).and_then(|geometry| {
            self.queries.build_temporal_spatial_collection_intersection(
                &geometry,
                min_strength,
                valid_at.map(|t| t.to_utc()),
                as_of.map_or_else(Utc::now, |t| t.to_utc()),
            )
        });
        let query = match query {
            Ok(query) => query,
            Err(err) => {
                tracing::error!(error = %err, "spatial intersection rejected");
                return ResultStream::failed(err);
            }
        };
        self.stream_in_transaction(move |txn, sink| {
            txn.execute_query(&query, &mut |row| {
                sink.send(String::from(row.unwrap_individual("collection")?))
            })
        })
    }

    /// Members of `collection` of type `T` with at least `min_strength`, read
    /// as they were at `temporal_instant` (default now). Each member's
    /// instant is clamped into its validity interval before it is read.
    /// `spatial_filter` keeps only members whose geometry intersects it.
    pub fn collection_members<T>(
        &self,
        collection: &str,
        min_strength: f64,
        spatial_filter: Option<&str>,
        temporal_instant: Option<Temporal>,
    ) -> ResultStream<T>
    where
        T: TemporalObject + Send + 'static,
    {
        let collection = self.resolve(collection);
        let class = self.marshaller.resolve_class::<T>();
        let query = spatial_filter
            .map(BufferedGeometry::unbuffered)
            .transpose()
            .and_then(|spatial| {
                self.queries.build_collection_object_retrieval(
                    &class,
                    &collection,
                    min_strength,
                    spatial.as_ref(),
                )
            });
        let query = match query {
            Ok(query) => query,
            Err(err) => {
                tracing::error!(%collection, error = %err, "member query rejected");
                return ResultStream::failed(err);
            }
        };
        let at = temporal_instant.map_or_else(Utc::now, |t| t.to_utc());
        let marshaller = self.marshaller.clone();
        self.stream_in_transaction(move |txn, sink| {
            // Object reads need the transaction the query runs on, so
            // only identifiers are gathered before reading.
            let mut members: Vec<Iri> = Vec::new();
            txn.execute_query(&query, &mut |row| {
                match row.individual("individual") {
                    Some(member) => members.push(member),
                    None => tracing::trace!("skipping row without individual binding"),
                }
                Ok(())
            })?;
            tracing::debug!(%collection, members = members.len(), "reading collection members");
            for member in &members {
                if sink.is_closed() {
                    return Err(SpatioGraphError::cancelled("member stream was dropped"));
                }
                let bound = adjusted_query_temporal(txn, member, at)?;
                let object = marshaller.read_object::<T, _>(txn, member, bound, None)?;
                sink.send(object)?;
            }
            Ok(())
        })
    }

    /// Whether a member of `a` touches or overlaps a member of `b`, following
    /// adjacency edges from `a`'s members only.
    pub async fn collections_are_adjacent(&self, a: &str, b: &str, min_strength: f64) -> Result<bool> {
        let a = self.resolve(a);
        let b = self.resolve(b);
        let query = self.queries.build_adjacent_collection_query(&a, min_strength)?;
        let target = b.clone();
        let adjacent = self
            .in_transaction(false, move |txn| {
                let mut adjacent = false;
                txn.execute_query(&query, &mut |row| {
                    if row.unwrap_individual("collection")? == target {
                        adjacent = true;
                    }
                    Ok(())
                })?;
                Ok(adjacent)
            })
            .await?;
        tracing::debug!(%a, %b, adjacent, "checked collection adjacency");
        Ok(adjacent)
    }
}
