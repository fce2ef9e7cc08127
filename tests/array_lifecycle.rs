//! End-to-end array lifecycle through the public `tessera` API
//!
//! Covers the path a reader or maintenance job takes: create, open,
//! load enumerations, write metadata, close, and concurrent handles.

use std::sync::{Arc, Barrier, Once};
use std::thread;
use tessera::{
    Array, ArrayConfig, ArraySchema, ArrayState, ArrayType, ArrayUri, Attribute,
    ConsistencyController, Datatype, Dimension, Domain, EncryptionKey, Enumeration,
    MemoryDirectory, QueryType, Range, TesseraError,
};

static TRACING: Once = Once::new();

fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

fn weather_schema() -> ArraySchema {
    let domain = Domain::new(vec![
        Dimension::new("station", Datatype::StringAscii, None).unwrap(),
        Dimension::new("day", Datatype::UInt16, Some(Range::uint(1, 366))).unwrap(),
    ])
    .unwrap();
    let mut schema = ArraySchema::new(ArrayType::Sparse, domain);
    schema
        .add_enumeration(Arc::new(
            Enumeration::from_var_values(
                "sky",
                Datatype::StringUtf8,
                false,
                &["clear", "cloudy", "rain", "snow"],
            )
            .unwrap(),
        ))
        .unwrap();
    schema
        .add_enumeration(Arc::new(
            Enumeration::from_fixed_values("grade", true, &[1u8, 2, 3, 4, 5]).unwrap(),
        ))
        .unwrap();
    schema
        .add_attribute(
            Attribute::new("sky", Datatype::UInt8)
                .with_enumeration_name("sky")
                .unwrap(),
        )
        .unwrap();
    schema
        .add_attribute(
            Attribute::new("grade", Datatype::Int8)
                .with_enumeration_name("grade")
                .unwrap(),
        )
        .unwrap();
    schema
        .add_attribute(Attribute::new("temp", Datatype::Float32).with_nullable(true))
        .unwrap();
    schema
}

fn create(uri: &str) -> (Arc<MemoryDirectory>, ArrayUri) {
    init_tracing();
    let directory = Arc::new(MemoryDirectory::new());
    let uri = ArrayUri::new(uri);
    Array::create(
        directory.as_ref(),
        &uri,
        &weather_schema(),
        &EncryptionKey::none(),
        &ArrayConfig::default(),
    )
    .unwrap();
    (directory, uri)
}

#[test]
fn test_read_session() {
    let (directory, uri) = create("mem://weather/read");
    let array = Array::with_controller(uri, directory, Arc::new(ConsistencyController::new()));

    array.open(QueryType::Read, EncryptionKey::none()).unwrap();
    let schema = array.schema_latest().unwrap();
    assert_eq!(schema.attribute_num(), 3);
    assert!(schema.loaded_enumeration_names().is_empty());

    let enmrs = array.get_enumerations(&["sky", "grade"]).unwrap();
    assert_eq!(enmrs[0].index_of(b"rain"), 2);
    assert_eq!(enmrs[1].index_of(&[4u8]), 3);
    assert!(enmrs[1].ordered());

    // The schema captured before loading is unaffected.
    assert!(schema.loaded_enumeration_names().is_empty());
    assert_eq!(
        array.schema_latest().unwrap().loaded_enumeration_names(),
        vec!["grade".to_string(), "sky".to_string()]
    );

    array.close().unwrap();
    let err = array.get_enumeration("sky").unwrap_err();
    assert!(matches!(err, TesseraError::InvalidState { .. }));
}

#[test]
fn test_write_then_read_metadata() {
    let (directory, uri) = create("mem://weather/metadata");
    let controller = Arc::new(ConsistencyController::new());
    let writer = Array::with_controller(uri.clone(), directory.clone(), Arc::clone(&controller));
    let reader = Array::with_controller(uri, directory, Arc::clone(&controller));

    writer.open(QueryType::Write, EncryptionKey::none()).unwrap();
    writer
        .put_metadata("source", Datatype::StringUtf8, "noaa".as_bytes())
        .unwrap();

    reader.open(QueryType::Read, EncryptionKey::none()).unwrap();
    assert!(!reader.has_metadata_key("source").unwrap());
    reader.close().unwrap();

    writer.close().unwrap();
    reader.open(QueryType::Read, EncryptionKey::none()).unwrap();
    let value = reader.get_metadata("source").unwrap().unwrap();
    assert_eq!(value.bytes(), b"noaa");
    assert_eq!(value.datatype(), Datatype::StringUtf8);
}

#[test]
fn test_concurrent_enumeration_loading_shares_one_instance() {
    let (directory, uri) = create("mem://weather/concurrent");
    let array = Arc::new(Array::with_controller(
        uri,
        directory,
        Arc::new(ConsistencyController::new()),
    ));
    array.open(QueryType::Read, EncryptionKey::none()).unwrap();

    let barrier = Arc::new(Barrier::new(8));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let array = Arc::clone(&array);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                array.get_enumeration("sky").unwrap()
            })
        })
        .collect();
    let loaded: Vec<Arc<Enumeration>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let cached = array.get_enumeration("sky").unwrap();
    assert_eq!(cached.elem_count(), 4);
    // Every thread either loaded or observed a value equal to the cached one.
    assert!(loaded.iter().all(|e| **e == *cached));
    array.close().unwrap();
}

#[test]
fn test_open_close_from_many_threads() {
    let (directory, uri) = create("mem://weather/threads");
    let controller = Arc::new(ConsistencyController::new());

    let handles: Vec<_> = (0..6)
        .map(|i| {
            let directory = directory.clone();
            let controller = Arc::clone(&controller);
            let uri = uri.clone();
            thread::spawn(move || {
                let array = Array::with_controller(uri, directory, controller);
                let mode = if i % 2 == 0 {
                    QueryType::Read
                } else {
                    QueryType::Write
                };
                for _ in 0..20 {
                    array.open(mode, EncryptionKey::none()).unwrap();
                    assert_eq!(array.state(), ArrayState::Open(mode));
                    array.close().unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert!(controller.is_empty());
}

#[test]
fn test_exclusive_waits_for_readers() {
    let (directory, uri) = create("mem://weather/exclusive");
    let controller = Arc::new(ConsistencyController::new());
    let reader = Array::with_controller(uri.clone(), directory.clone(), Arc::clone(&controller));
    let admin = Array::with_controller(uri, directory, Arc::clone(&controller));

    reader.open(QueryType::Read, EncryptionKey::none()).unwrap();
    let snapshot = reader.opened_array().unwrap();
    assert!(admin
        .open(QueryType::ModifyExclusive, EncryptionKey::none())
        .unwrap_err()
        .is_conflict());

    reader.close().unwrap();
    admin
        .open(QueryType::ModifyExclusive, EncryptionKey::none())
        .unwrap();
    admin.delete_array().unwrap();
    admin.close().unwrap();

    // The reader's snapshot was taken before the delete and stays readable.
    assert_eq!(snapshot.schema_latest().attribute_num(), 3);
    assert!(reader.open(QueryType::Read, EncryptionKey::none()).is_err());
}
