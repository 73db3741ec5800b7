/// Storage-level tests for the store and index working side by side.
///
/// These cover:
/// - Append/read behavior of the store on a fresh file
/// - Index capacity and last-entry semantics
/// - Reopening both files after a clean close
/// - Reopening an index that already holds entries
///
/// The two components are sequenced by hand here, the way a segment does it.

use segment_log::config::{Config, SegmentConfig};
use segment_log::storage::encoding::encode_entry;
use segment_log::storage::index::{Index, LAST_ENTRY};
use segment_log::storage::store::Store;
use std::fs;
use tempfile::TempDir;

fn index_config(max_index_bytes: u64) -> Config {
    Config {
        segment: SegmentConfig {
            max_index_bytes,
            ..Default::default()
        },
    }
}

#[test]
fn test_append_hello_to_empty_store() {
    let dir = TempDir::new().unwrap();
    let store = Store::open(dir.path().join("s.store")).unwrap();

    let (n, pos) = store.append(b"hello").unwrap();
    assert_eq!((n, pos), (13, 0));
    assert_eq!(store.read(0).unwrap(), b"hello");
}

#[test]
fn test_second_append_starts_after_first_frame() {
    let dir = TempDir::new().unwrap();
    let store = Store::open(dir.path().join("s.store")).unwrap();

    store.append(b"hello").unwrap();
    let (_, pos) = store.append(b"world").unwrap();

    assert_eq!(pos, 13);
    assert_eq!(store.read(13).unwrap(), b"world");
    assert_eq!(store.read(0).unwrap(), b"hello");
}

#[test]
fn test_index_with_room_for_two_entries() {
    let dir = TempDir::new().unwrap();
    let mut index = Index::open(dir.path().join("s.index"), &index_config(24)).unwrap();

    index.write(0, 0).unwrap();
    index.write(1, 13).unwrap();

    let err = index.write(2, 26).unwrap_err();
    assert!(err.is_capacity_exceeded(), "expected capacity exceeded, got {:?}", err);
    assert_eq!(index.size(), 24);

    assert_eq!(index.read(LAST_ENTRY).unwrap(), (1, 13));
}

#[test]
fn test_reopen_index_holding_one_entry() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("s.index");

    fs::write(&path, encode_entry(0, 0)).unwrap();
    assert_eq!(fs::metadata(&path).unwrap().len(), 12);

    let index = Index::open(&path, &index_config(1024)).unwrap();

    // Grown to capacity, but the original entry is untouched.
    assert_eq!(fs::metadata(&path).unwrap().len(), 1024);
    assert_eq!(index.size(), 12);
    assert_eq!(index.read(0).unwrap(), (0, 0));
    assert_eq!(index.read(LAST_ENTRY).unwrap(), (0, 0));
}

#[test]
fn test_store_and_index_survive_close_and_reopen() {
    let dir = TempDir::new().unwrap();
    let store_path = dir.path().join("s.store");
    let index_path = dir.path().join("s.index");
    let config = index_config(1024);

    let payloads: Vec<Vec<u8>> = vec![
        b"first".to_vec(),
        Vec::new(),
        vec![0xAB; 4096],
        b"last".to_vec(),
    ];

    let mut before = Vec::new();
    {
        let store = Store::open(&store_path).unwrap();
        let mut index = Index::open(&index_path, &config).unwrap();

        for (i, payload) in payloads.iter().enumerate() {
            let (_, pos) = store.append(payload).unwrap();
            index.write(i as u32, pos).unwrap();
        }

        for i in 0..payloads.len() {
            let (off, pos) = index.read(i as i64).unwrap();
            before.push((off, pos, store.read(pos).unwrap()));
        }

        let logical_size = index.size();
        index.close().unwrap();
        store.close().unwrap();

        assert_eq!(fs::metadata(&index_path).unwrap().len(), logical_size);
    }

    let store = Store::open(&store_path).unwrap();
    let index = Index::open(&index_path, &config).unwrap();

    let mut after = Vec::new();
    for i in 0..payloads.len() {
        let (off, pos) = index.read(i as i64).unwrap();
        after.push((off, pos, store.read(pos).unwrap()));
    }

    assert_eq!(before, after);
    for (i, (_, _, payload)) in after.iter().enumerate() {
        assert_eq!(payload, &payloads[i]);
    }
}

#[test]
fn test_unwritten_entry_inside_capacity_is_end_of_data() {
    let dir = TempDir::new().unwrap();
    let mut index = Index::open(dir.path().join("s.index"), &index_config(120)).unwrap();

    index.write(0, 0).unwrap();
    index.write(1, 13).unwrap();

    for entry in 2..10 {
        let err = index.read(entry).unwrap_err();
        assert!(err.is_end_of_data(), "entry {} should be end of data", entry);
    }
}

#[test]
fn test_store_reader_copies_store_file() {
    use std::io::Read;

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("s.store");
    let store = Store::open(&path).unwrap();

    for i in 0..100u32 {
        store.append(&i.to_be_bytes()).unwrap();
    }

    let mut copy = Vec::new();
    store.reader().read_to_end(&mut copy).unwrap();
    store.close().unwrap();

    assert_eq!(copy, fs::read(&path).unwrap());
    assert_eq!(copy.len(), 100 * 12);
}
