//! Object listing and reads for the local engine's bulk copy.

use common::{Error, Result};
use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectMeta, ObjectStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// One object read from the source location.
#[derive(Debug, Clone)]
pub struct SourceObject {
    pub location: String,
    pub data: Vec<u8>,
}

enum Location {
    Store {
        store: Arc<dyn ObjectStore>,
        prefix: Option<ObjectPath>,
    },
    File(PathBuf),
}

/// Reads every object under `source`: an `s3://bucket/prefix` URL, a
/// `file://` URL, or a local file or directory path. Objects come back sorted
/// by location; hidden files are skipped.
pub async fn read_objects(source: &str, region: &str) -> Result<Vec<SourceObject>> {
    match resolve(source, region)? {
        Location::File(path) => {
            let data = tokio::fs::read(&path).await?;
            Ok(vec![SourceObject {
                location: path.to_string_lossy().into_owned(),
                data,
            }])
        }
        Location::Store { store, prefix } => {
            let mut listed: Vec<ObjectMeta> = store.list(prefix.as_ref()).try_collect().await?;
            listed.retain(|meta| !is_hidden(&meta.location));
            listed.sort_by(|a, b| a.location.cmp(&b.location));
            debug!(source, objects = listed.len(), "Listed source objects");

            let mut objects = Vec::with_capacity(listed.len());
            for meta in listed {
                let data = store.get(&meta.location).await?.bytes().await?;
                objects.push(SourceObject {
                    location: meta.location.to_string(),
                    data: data.to_vec(),
                });
            }
            Ok(objects)
        }
    }
}

fn resolve(source: &str, region: &str) -> Result<Location> {
    match Url::parse(source) {
        Ok(url) if url.scheme() == "s3" => {
            let bucket = url
                .host_str()
                .ok_or_else(|| Error::InvalidInput(format!("No bucket in {}", source)))?;
            let store = AmazonS3Builder::from_env()
                .with_bucket_name(bucket)
                .with_region(region)
                .build()?;
            let prefix = url.path().trim_matches('/');
            Ok(Location::Store {
                store: Arc::new(store),
                prefix: (!prefix.is_empty()).then(|| ObjectPath::from(prefix)),
            })
        }
        Ok(url) if url.scheme() == "file" => {
            let path = url
                .to_file_path()
                .map_err(|_| Error::InvalidInput(format!("Invalid file URL {}", source)))?;
            resolve_local(&path)
        }
        _ => resolve_local(Path::new(source)),
    }
}

fn resolve_local(path: &Path) -> Result<Location> {
    if path.is_file() {
        return Ok(Location::File(path.to_path_buf()));
    }
    if !path.is_dir() {
        return Err(Error::Engine(format!(
            "The specified source path does not exist: {}",
            path.display()
        )));
    }
    let store = LocalFileSystem::new_with_prefix(path)?;
    Ok(Location::Store {
        store: Arc::new(store),
        prefix: None,
    })
}

fn is_hidden(location: &ObjectPath) -> bool {
    location
        .filename()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}
