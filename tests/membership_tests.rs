mod common;

use common::{engine, engine_with, full, object};
use futures::TryStreamExt;
use proptest::prelude::*;
use spatiograph::{
    CollectionRelationType, EngineConfig, FaultPoint, GraphStore, Iri, SpatioGraphError,
    StoreTransaction, relation_iri, vocabulary,
};

const PREFIX: &str = "http://example.org/regions#";

#[test]
fn test_relation_identity_is_stable() {
    let collection = Iri::new(PREFIX, "region-7");
    let individual = Iri::new(PREFIX, "geo-42");
    let first = relation_iri(PREFIX, &collection, &individual);
    let second = relation_iri(PREFIX, &collection, &individual);
    assert_eq!(first, second);
    assert_eq!(first.as_str(), "http://example.org/regions#relation:region-7:geo-42");
}

#[test]
fn test_relation_identity_separates_colon_names() {
    let a = relation_iri(PREFIX, &Iri::new(PREFIX, "a:b"), &Iri::new(PREFIX, "c"));
    let b = relation_iri(PREFIX, &Iri::new(PREFIX, "a"), &Iri::new(PREFIX, "b:c"));
    assert_ne!(a, b);
}

fn identifier() -> impl Strategy<Value = Iri> {
    prop_oneof![
        "[a-z:%~]{1,8}".prop_map(|local| Iri::new(PREFIX, &local)),
        ("[ab]", "[a-z:%~#/]{1,8}")
            .prop_map(|(ns, local)| Iri::from_absolute(format!("http://{ns}.org/x#{local}"))),
    ]
}

proptest! {
    #[test]
    fn test_relation_identity_is_injective(
        c1 in identifier(),
        i1 in identifier(),
        c2 in identifier(),
        i2 in identifier(),
    ) {
        let r1 = relation_iri(PREFIX, &c1, &i1);
        let r2 = relation_iri(PREFIX, &c2, &i2);
        prop_assert_eq!(r1 == r2, c1 == c2 && i1 == i2);
    }
}

#[tokio::test]
async fn test_add_creates_relation_and_collection() {
    let engine = engine();
    engine
        .add_object_to_collection("region-7", &object("geo-42"), CollectionRelationType::Spatial, 0.8)
        .await
        .unwrap();

    let collections: Vec<String> = engine.collections().try_collect().await.unwrap();
    assert_eq!(collections, vec![full(&engine, "region-7")]);

    let related = engine.related_collections("geo-42", None, 0.0).await.unwrap();
    assert_eq!(
        related.get(&full(&engine, "region-7")),
        Some(&vec![full(&engine, "geo-42")])
    );

    let relation = Iri::new(engine.prefix(), "relation:region-7:geo-42");
    let mut txn = engine.store().open_transaction(false).unwrap();
    assert!(txn.individual_exists(&relation).unwrap());
    let strength = txn
        .get_data_property_value(&relation, &vocabulary::term(vocabulary::RELATION_STRENGTH))
        .unwrap()
        .unwrap();
    assert_eq!(strength.as_f64().unwrap(), 0.8);
}

#[tokio::test]
async fn test_readding_overwrites_strength() {
    let engine = engine();
    let geo = object("geo-1");
    engine
        .add_object_to_collection("c", &geo, CollectionRelationType::Semantic, 0.3)
        .await
        .unwrap();
    engine
        .add_object_to_collection("c", &geo, CollectionRelationType::Semantic, 0.9)
        .await
        .unwrap();
    let related = engine.related_collections("geo-1", None, 0.5).await.unwrap();
    assert_eq!(related.get(&full(&engine, "c")).map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_fault_in_relation_write_aborts_everything() {
    let engine = engine();
    // the object itself carries only data properties, so the first object
    // property write is the relation's relation_of edge
    engine
        .store()
        .faults()
        .configure_after(FaultPoint::WriteObjectProperty, 0, 1);

    let err = engine
        .add_object_to_collection("region-7", &object("geo-42"), CollectionRelationType::Spatial, 0.8)
        .await
        .unwrap_err();
    assert!(matches!(err, SpatioGraphError::FaultInjected(_)));

    let mut txn = engine.store().open_transaction(false).unwrap();
    assert!(!txn.individual_exists(&Iri::new(engine.prefix(), "geo-42")).unwrap());
    assert!(
        !txn.individual_exists(&Iri::new(engine.prefix(), "relation:region-7:geo-42"))
            .unwrap()
    );
    drop(txn);

    let collections: Vec<String> = engine.collections().try_collect().await.unwrap();
    assert!(collections.is_empty());
    let related = engine.related_collections("geo-42", None, 0.0).await.unwrap();
    assert!(related.is_empty());

    // the fault fired once; the same write now succeeds
    engine
        .add_object_to_collection("region-7", &object("geo-42"), CollectionRelationType::Spatial, 0.8)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_non_finite_strength_is_rejected() {
    let engine = engine();
    let err = engine
        .add_object_to_collection("c", &object("a"), CollectionRelationType::Temporal, f64::NAN)
        .await
        .unwrap_err();
    assert!(matches!(err, SpatioGraphError::InvalidInput(_)));
}

#[tokio::test]
async fn test_missing_collection_without_auto_create() {
    let engine = engine_with(EngineConfig {
        auto_create_collections: false,
        ..EngineConfig::default()
    });
    let err = engine
        .add_object_to_collection("c", &object("a"), CollectionRelationType::Spatial, 0.5)
        .await
        .unwrap_err();
    assert!(matches!(err, SpatioGraphError::NotFound(_)));
    let mut txn = engine.store().open_transaction(false).unwrap();
    assert!(!txn.individual_exists(&Iri::new(engine.prefix(), "a")).unwrap());
    drop(txn);

    engine.create_collection("c").await.unwrap();
    engine.create_collection("c").await.unwrap();
    engine
        .add_object_to_collection("c", &object("a"), CollectionRelationType::Spatial, 0.5)
        .await
        .unwrap();
    let collections: Vec<String> = engine.collections().try_collect().await.unwrap();
    assert_eq!(collections, vec![full(&engine, "c")]);
}

#[tokio::test]
async fn test_cascade_removes_last_relation_and_collection() {
    let engine = engine();
    let geo = object("only");
    engine
        .add_object_to_collection("solo", &geo, CollectionRelationType::Spatial, 0.7)
        .await
        .unwrap();
    engine
        .remove_object_from_collection("solo", &geo, true)
        .await
        .unwrap();

    let collections: Vec<String> = engine.collections().try_collect().await.unwrap();
    assert!(collections.is_empty());
    let mut txn = engine.store().open_transaction(false).unwrap();
    assert!(!txn.individual_exists(&Iri::new(engine.prefix(), "relation:solo:only")).unwrap());
    // members outlive their relations
    assert!(txn.individual_exists(&Iri::new(engine.prefix(), "only")).unwrap());
}

#[tokio::test]
async fn test_cascade_keeps_collection_with_remaining_members() {
    let engine = engine();
    let first = object("first");
    let second = object("second");
    for member in [&first, &second] {
        engine
            .add_object_to_collection("pair", member, CollectionRelationType::Spatial, 0.7)
            .await
            .unwrap();
    }
    engine
        .remove_object_from_collection("pair", &first, true)
        .await
        .unwrap();

    let collections: Vec<String> = engine.collections().try_collect().await.unwrap();
    assert_eq!(collections, vec![full(&engine, "pair")]);
    let related = engine.related_collections("second", None, 0.0).await.unwrap();
    assert_eq!(
        related.get(&full(&engine, "pair")),
        Some(&vec![full(&engine, "second")])
    );
    assert!(engine.related_collections("first", None, 0.0).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_remove_without_cascade_keeps_empty_collection() {
    let engine = engine();
    let geo = object("geo");
    engine
        .add_object_to_collection("kept", &geo, CollectionRelationType::Spatial, 0.7)
        .await
        .unwrap();
    engine
        .remove_object_from_collection("kept", &geo, false)
        .await
        .unwrap();
    let collections: Vec<String> = engine.collections().try_collect().await.unwrap();
    assert_eq!(collections, vec![full(&engine, "kept")]);
}

#[tokio::test]
async fn test_removing_missing_relation_is_not_found() {
    let engine = engine();
    engine.create_collection("empty").await.unwrap();
    let err = engine
        .remove_object_from_collection("empty", &object("ghost"), true)
        .await
        .unwrap_err();
    assert!(matches!(err, SpatioGraphError::NotFound(_)));
    // the failed removal rolled back, so the collection is untouched
    let collections: Vec<String> = engine.collections().try_collect().await.unwrap();
    assert_eq!(collections, vec![full(&engine, "empty")]);
}

#[tokio::test]
async fn test_remove_collection_removes_every_relation() {
    let engine = engine();
    for id in ["a", "b", "c"] {
        engine
            .add_object_to_collection("doomed", &object(id), CollectionRelationType::Semantic, 0.6)
            .await
            .unwrap();
    }
    engine
        .add_object_to_collection("survivor", &object("a"), CollectionRelationType::Semantic, 0.6)
        .await
        .unwrap();

    engine.remove_collection("doomed").await.unwrap();

    let collections: Vec<String> = engine.collections().try_collect().await.unwrap();
    assert_eq!(collections, vec![full(&engine, "survivor")]);
    let related = engine.related_collections("a", None, 0.0).await.unwrap();
    assert_eq!(related.len(), 1);
    assert!(engine.related_collections("b", None, 0.0).await.unwrap().is_empty());

    let err = engine.remove_collection("doomed").await.unwrap_err();
    assert!(matches!(err, SpatioGraphError::NotFound(_)));
}

#[tokio::test]
async fn test_failed_cascade_step_rolls_back_collection_removal() {
    let engine = engine();
    for id in ["a", "b"] {
        engine
            .add_object_to_collection("atomic", &object(id), CollectionRelationType::Semantic, 0.6)
            .await
            .unwrap();
    }
    // second relation's strength removal fails
    engine
        .store()
        .faults()
        .configure_after(FaultPoint::RemoveDataProperty, 1, 1);
    let err = engine.remove_collection("atomic").await.unwrap_err();
    assert!(matches!(err, SpatioGraphError::FaultInjected(_)));

    let related = engine.related_collections("a", None, 0.0).await.unwrap();
    assert_eq!(related.get(&full(&engine, "atomic")).map(Vec::len), Some(2));
}

#[tokio::test]
async fn test_same_local_name_in_other_namespaces_stays_separate() {
    let engine = engine();
    let a = object("http://a.org/x#geo");
    let b = object("http://b.org/y#geo");
    for member in [&a, &b] {
        engine
            .add_object_to_collection("c", member, CollectionRelationType::Spatial, 0.7)
            .await
            .unwrap();
    }

    engine.remove_object_from_collection("c", &a, true).await.unwrap();

    let related = engine
        .related_collections("http://b.org/y#geo", None, 0.0)
        .await
        .unwrap();
    assert_eq!(
        related.get(&full(&engine, "c")),
        Some(&vec!["http://b.org/y#geo".to_string()])
    );
    let collections: Vec<String> = engine.collections().try_collect().await.unwrap();
    assert_eq!(collections, vec![full(&engine, "c")]);
}
