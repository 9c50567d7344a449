//! Tests for the file store
//!
//! Corruption and disappearance of cached files, with and without a
//! reachable source to repair from.

#[cfg(test)]
mod file_store_tests {
    use crate::errors::CacheError;
    use crate::storage::{FileStore, LOCK_SUFFIX};
    use crate::Result;
    use std::fs;
    use std::io::Read;
    use tempfile::TempDir;

    fn setup() -> (TempDir, FileStore) {
        let temp = TempDir::new().unwrap();
        let store = FileStore::local(temp.path().join("files")).unwrap();
        (temp, store)
    }

    #[test]
    fn test_store_is_content_addressed() -> Result<()> {
        let (temp, store) = setup();
        let a = temp.path().join("a.txt");
        let b = temp.path().join("b.txt");
        fs::write(&a, "same").unwrap();
        fs::write(&b, "same").unwrap();

        let first = store.store(&a)?;
        let second = store.store(&b)?;
        assert_eq!(first, second);
        assert!(first.href.ends_with(&format!("{}.txt", first.checksum)));
        assert_eq!(first.file_type, "text/plain");
        assert_eq!(first.size, 4);

        let names: Vec<_> = store
            .backend()
            .list()
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names.len(), 1);
        assert!(!names[0].ends_with(LOCK_SUFFIX));
        Ok(())
    }

    #[test]
    fn test_describe_does_not_copy() -> Result<()> {
        let (temp, store) = setup();
        let source = temp.path().join("data.bin");
        fs::write(&source, [1u8, 2, 3]).unwrap();

        let descriptor = store.describe(&source)?;
        assert_eq!(descriptor.file_type, "application/octet-stream");
        assert!(store.backend().list().unwrap().is_empty());
        Ok(())
    }

    #[test]
    fn test_materialize_repairs_corrupted_file() -> Result<()> {
        let (temp, store) = setup();
        let source = temp.path().join("data.txt");
        fs::write(&source, "original").unwrap();
        let descriptor = store.store(&source)?;

        let cached = store.materialize(&descriptor, None)?;
        fs::write(&cached, "tampered").unwrap();

        let repaired = store.materialize(&descriptor, Some(&source))?;
        assert_eq!(fs::read_to_string(repaired).unwrap(), "original");
        Ok(())
    }

    #[test]
    fn test_mismatch_without_source_is_best_effort() -> Result<()> {
        let (temp, store) = setup();
        let source = temp.path().join("data.txt");
        fs::write(&source, "original").unwrap();
        let descriptor = store.store(&source)?;
        let cached = store.materialize(&descriptor, None)?;
        fs::write(&cached, "tampered").unwrap();
        fs::remove_file(&source).unwrap();

        let path = store.materialize(&descriptor, Some(&source))?;
        assert_eq!(fs::read_to_string(path).unwrap(), "tampered");
        Ok(())
    }

    #[test]
    fn test_missing_file_restored_or_decode_error() -> Result<()> {
        let (temp, store) = setup();
        let source = temp.path().join("data.txt");
        fs::write(&source, "original").unwrap();
        let descriptor = store.store(&source)?;
        assert!(store.delete(&descriptor.href)?);

        let restored = store.materialize(&descriptor, Some(&source))?;
        assert_eq!(fs::read_to_string(restored).unwrap(), "original");

        store.delete(&descriptor.href)?;
        fs::write(&source, "changed since").unwrap();
        let result = store.materialize(&descriptor, Some(&source));
        assert!(matches!(result, Err(CacheError::Decode { .. })));
        Ok(())
    }

    #[test]
    fn test_directories_round_trip() -> Result<()> {
        let (temp, store) = setup();
        let source = temp.path().join("tree");
        fs::create_dir_all(source.join("inner")).unwrap();
        fs::write(source.join("inner/leaf.txt"), "leaf").unwrap();

        let descriptor = store.store(&source)?;
        assert_eq!(descriptor.file_type, "inode/directory");
        let path = store.materialize(&descriptor, None)?;
        assert_eq!(
            fs::read_to_string(path.join("inner/leaf.txt")).unwrap(),
            "leaf"
        );

        assert!(store.delete(&descriptor.href)?);
        assert!(!path.exists());
        Ok(())
    }

    #[test]
    fn test_open_streams_content() -> Result<()> {
        let (temp, store) = setup();
        let source = temp.path().join("data.txt");
        fs::write(&source, "streamed").unwrap();
        let descriptor = store.store(&source)?;

        let mut content = String::new();
        store.open(&descriptor)?.read_to_string(&mut content).unwrap();
        assert_eq!(content, "streamed");
        Ok(())
    }

    #[test]
    fn test_delete_outside_area_is_refused() -> Result<()> {
        let (temp, store) = setup();
        let outside = temp.path().join("keep.txt");
        fs::write(&outside, "keep").unwrap();

        assert!(!store.delete(&outside.to_string_lossy())?);
        assert!(outside.exists());
        Ok(())
    }
}
