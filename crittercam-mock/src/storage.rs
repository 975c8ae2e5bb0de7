use std::io;
use std::path::PathBuf;

use crittercam_embedded::storage::LocalStorage;
use tokio::fs;

/// One file per key inside a data directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, key: &str) -> io::Result<PathBuf> {
        if key.is_empty() || key.contains(['/', '\\']) || key == ".." {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid storage key {key:?}"),
            ));
        }
        Ok(self.dir.join(key))
    }
}

fn missing_is_ok<T: Default>(result: io::Result<T>) -> io::Result<T> {
    match result {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(T::default()),
        other => other,
    }
}

impl LocalStorage for FileStorage {
    type Error = io::Error;

    async fn get_item(&self, key: &str) -> Result<Option<String>, Self::Error> {
        missing_is_ok(fs::read_to_string(self.path(key)?).await.map(Some))
    }

    async fn set_item(&mut self, key: &str, value: &str) -> Result<(), Self::Error> {
        let path = self.path(key)?;
        fs::create_dir_all(&self.dir).await?;
        fs::write(path, value).await
    }

    async fn remove_item(&mut self, key: &str) -> Result<(), Self::Error> {
        missing_is_ok(fs::remove_file(self.path(key)?).await)
    }

    async fn clear(&mut self) -> Result<(), Self::Error> {
        missing_is_ok(fs::remove_dir_all(&self.dir).await)
    }
}
