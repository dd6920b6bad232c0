#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// Facility tag outside the known set. Aborts before any fetch.
    UnknownFacility(String),
    /// Persisted selection missing pieces or corrupt.
    StoreRead(String),
    /// Transport failure, non-2xx response or a body that is not a record array.
    Fetch(String),
    /// A single feed record without usable fields.
    MalformedRecord(String),
    /// A facility dataset could not be read at startup.
    CatalogLoad(String),
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::UnknownFacility(tag) => write!(f, "unknown facility: {tag}"),
            PipelineError::StoreRead(msg) => write!(f, "selection store read failed: {msg}"),
            PipelineError::Fetch(msg) => write!(f, "reservation fetch failed: {msg}"),
            PipelineError::MalformedRecord(msg) => write!(f, "malformed record: {msg}"),
            PipelineError::CatalogLoad(msg) => write!(f, "catalog load failed: {msg}"),
        }
    }
}

impl std::error::Error for PipelineError {}
