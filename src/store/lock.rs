use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::Path;

use crate::error::{Result, TickError};

/// Take the task file's advisory lock for `op` without waiting.
/// The lock is released when the returned `File` is dropped.
pub fn acquire_lock(op: &'static str, path: &Path) -> Result<File> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|e| TickError::persistence(op, path, e))?;

    file.try_lock_exclusive()
        .map_err(|_| TickError::Locked {
            op,
            path: path.to_path_buf(),
        })?;

    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn second_holder_fails_fast() {
        let dir = tempdir().unwrap();
        let lock_path = dir.path().join("tasks.lock");

        let file = acquire_lock("save", &lock_path).unwrap();
        assert!(matches!(acquire_lock("save", &lock_path), Err(TickError::Locked { op: "save", .. })));
        drop(file);
        let _file = acquire_lock("save", &lock_path).unwrap();
    }
}
