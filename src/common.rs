use async_trait::async_trait;
use object_store::{path::Path as ObjectPath, ObjectStore};
use std::{
    fs, io,
    ops::Range,
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{
    config::PipelineConfig,
    error::{Error, Result},
    frequency::FrequencyTable,
    oracles::NameOracle,
};

/// One line of the document, without its terminator.
pub type Line = String;
pub type NameToken = String;
/// Lines of the whole document, in order
pub type Input = Vec<Line>;

/// A run of consecutive lines merged into one string for the tagger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextUnit {
    /// 0-based batch number
    pub index: usize,
    /// indices of the member lines
    pub lines: Range<usize>,
    pub text: String,
}

/// Lines `first_index..first_index + lines.len()` of the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinePartition {
    pub first_index: usize,
    pub lines: Vec<Line>,
}

#[derive(Debug)]
pub enum Task {
    /// key every line of the partition by its batch
    Batch(LinePartition),
    /// tag one unit and split its names over the reducers
    Extract(TextUnit),
    /// sum the partial tables routed to one reducer
    Reduce(usize, Vec<FrequencyTable>),
}

#[derive(Debug)]
pub struct Output {
    pub table: FrequencyTable,
    pub units: usize,
    /// indices of units dropped under the skip policy
    pub skipped: Vec<usize>,
}

#[async_trait]
pub trait MapReduce {
    fn new(config: PipelineConfig, oracle: Arc<dyn NameOracle>) -> Self;
    async fn run(self, input: Input) -> Result<Output>;
}

pub fn read_lines(path: &Path) -> Result<Input> {
    let contents = fs::read_to_string(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => Error::InputNotFound(path.to_path_buf()),
        _ => Error::InputRead {
            path: path.to_path_buf(),
            source,
        },
    })?;
    Ok(contents.lines().map(str::to_string).collect())
}

/// Fetches `location` from `store`; `uri` names the object in errors.
pub async fn read_object(
    store: &dyn ObjectStore,
    location: &ObjectPath,
    uri: &str,
) -> Result<Input> {
    let fetched = match store.get(location).await {
        Ok(object) => object.bytes().await,
        Err(err) => Err(err),
    };
    let bytes = fetched.map_err(|source| match source {
        object_store::Error::NotFound { .. } => Error::InputNotFound(PathBuf::from(uri)),
        source => Error::ObjectStore {
            uri: uri.to_string(),
            source,
        },
    })?;
    let contents = String::from_utf8(bytes.to_vec()).map_err(|err| Error::InputRead {
        path: PathBuf::from(uri),
        source: io::Error::new(io::ErrorKind::InvalidData, err),
    })?;
    Ok(contents.lines().map(str::to_string).collect())
}
