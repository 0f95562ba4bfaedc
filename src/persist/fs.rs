use std::path::PathBuf;

use futures::{future::BoxFuture, FutureExt};

use super::{PersistError, Persister};

/// Keeps the serialized tree in one JSON file.
#[derive(Debug, Clone)]
pub struct FilePersister {
    path: PathBuf,
}

impl FilePersister {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FilePersister { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl Persister for FilePersister {
    fn load(&self) -> BoxFuture<'_, Result<Option<String>, PersistError>> {
        async move {
            match tokio::fs::read_to_string(&self.path).await {
                Ok(contents) => Ok(Some(contents)),
                Err(e) => match e.kind() {
                    std::io::ErrorKind::NotFound => Ok(None),
                    _ => Err(e.into()),
                },
            }
        }
        .boxed()
    }

    fn save(&self, serialized: String) -> BoxFuture<'_, Result<(), PersistError>> {
        async move {
            if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await?;
            }

            let tmp = self.path.with_extension("tmp");
            tokio::fs::write(&tmp, serialized).await?;
            Ok(tokio::fs::rename(&tmp, &self.path).await?)
        }
        .boxed()
    }

    fn clear(&self) -> BoxFuture<'_, Result<(), PersistError>> {
        async move {
            match tokio::fs::remove_file(&self.path).await {
                Ok(()) => Ok(()),
                Err(e) => match e.kind() {
                    std::io::ErrorKind::NotFound => Ok(()),
                    _ => Err(e.into()),
                },
            }
        }
        .boxed()
    }
}
