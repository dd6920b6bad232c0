use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use tracing::{debug, info};

use crate::model::ResourceId;
use crate::pipeline::PipelineError;

/// Facilities a selection may name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Facility {
    Agora,
    AgoraBlokRooms,
    AgoraFlexispace,
    AgoraRooms,
    ArenbergMain,
    ArenbergRest,
    ArenbergTulp,
    Ebib,
    Erasmus,
    Kulak,
}

impl Facility {
    pub const ALL: [Facility; 10] = [
        Facility::Agora,
        Facility::AgoraBlokRooms,
        Facility::AgoraFlexispace,
        Facility::AgoraRooms,
        Facility::ArenbergMain,
        Facility::ArenbergRest,
        Facility::ArenbergTulp,
        Facility::Ebib,
        Facility::Erasmus,
        Facility::Kulak,
    ];

    /// Tag used in the stored selection.
    pub fn as_str(self) -> &'static str {
        match self {
            Facility::Agora => "agora",
            Facility::AgoraBlokRooms => "agora-blok-rooms",
            Facility::AgoraFlexispace => "agora-flexispace",
            Facility::AgoraRooms => "agora-rooms",
            Facility::ArenbergMain => "arenberg-main",
            Facility::ArenbergRest => "arenberg-rest",
            Facility::ArenbergTulp => "arenberg-tulp",
            Facility::Ebib => "ebib",
            Facility::Erasmus => "erasmus",
            Facility::Kulak => "kulak",
        }
    }

    /// Human-readable name shown above the grid.
    pub fn label(self) -> &'static str {
        match self {
            Facility::Agora => "Silent Study",
            Facility::AgoraBlokRooms => "Seats in rooms (only during blokperiode)",
            Facility::AgoraFlexispace => "FlexiSpace (only during blokperiode)",
            Facility::AgoraRooms => "Meeting rooms (not during blokperiode)",
            Facility::ArenbergMain => "Boekenzaal/Leeszaal/DeLeVille",
            Facility::ArenbergRest => "Kelder/Zolder",
            Facility::ArenbergTulp => "Tulp 0/1",
            Facility::Ebib => "EBIB",
            Facility::Erasmus => "Artes Erasmushuis",
            Facility::Kulak => "Kulak",
        }
    }

    /// File holding this facility's dataset inside a catalog directory.
    pub fn file_name(self) -> String {
        format!("{}.json", self.as_str())
    }
}

impl FromStr for Facility {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Facility::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| PipelineError::UnknownFacility(s.to_string()))
    }
}

impl fmt::Display for Facility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered resource ids of one facility. Metadata in the datasets is not kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    facility: Facility,
    resources: Vec<ResourceId>,
}

impl Catalog {
    pub fn new(facility: Facility, mut resources: Vec<ResourceId>) -> Self {
        resources.sort();
        resources.dedup();
        Self {
            facility,
            resources,
        }
    }

    /// Parse a dataset: a JSON object keyed by resource id.
    pub fn parse(facility: Facility, json: &str) -> Result<Self, PipelineError> {
        let entries: BTreeMap<String, serde_json::Value> = serde_json::from_str(json)
            .map_err(|e| PipelineError::CatalogLoad(format!("{}: {e}", facility.file_name())))?;
        Ok(Self::new(facility, entries.into_keys().map(ResourceId::new).collect()))
    }

    pub fn facility(&self) -> Facility {
        self.facility
    }

    pub fn resources(&self) -> &[ResourceId] {
        &self.resources
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn contains(&self, id: &ResourceId) -> bool {
        self.resources.binary_search(id).is_ok()
    }

    /// Comma-joined ids for the feed's `ResourceIDList` parameter.
    pub fn resource_id_list(&self) -> String {
        self.resources
            .iter()
            .map(ResourceId::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Catalogs loaded at startup, one per facility that has a dataset.
#[derive(Debug, Default)]
pub struct CatalogSet {
    catalogs: HashMap<Facility, Arc<Catalog>>,
}

impl CatalogSet {
    pub fn new(catalogs: impl IntoIterator<Item = Catalog>) -> Self {
        Self {
            catalogs: catalogs
                .into_iter()
                .map(|c| (c.facility(), Arc::new(c)))
                .collect(),
        }
    }

    /// Read `<facility>.json` for every facility from `dir`. Facilities without
    /// a file are left out; a directory with no datasets at all is an error.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let dir = dir.as_ref();
        let mut catalogs = Vec::new();
        for facility in Facility::ALL {
            let path = dir.join(facility.file_name());
            let json = match std::fs::read_to_string(&path) {
                Ok(json) => json,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    debug!("no dataset for {facility} in {}", dir.display());
                    continue;
                }
                Err(e) => {
                    return Err(PipelineError::CatalogLoad(format!("{}: {e}", path.display())));
                }
            };
            let catalog = Catalog::parse(facility, &json)?;
            info!("catalog {facility}: {} resources", catalog.len());
            catalogs.push(catalog);
        }
        if catalogs.is_empty() {
            return Err(PipelineError::CatalogLoad(format!(
                "no facility datasets in {}",
                dir.display()
            )));
        }
        Ok(Self::new(catalogs))
    }

    pub fn len(&self) -> usize {
        self.catalogs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.catalogs.is_empty()
    }

    /// A facility without a loaded dataset is as unknown as a misspelled one.
    pub fn get(&self, facility: Facility) -> Result<&Arc<Catalog>, PipelineError> {
        self.catalogs
            .get(&facility)
            .ok_or_else(|| PipelineError::UnknownFacility(facility.as_str().to_string()))
    }

    /// Resolve a facility tag to its catalog.
    pub fn catalog(&self, facility_id: &str) -> Result<&Arc<Catalog>, PipelineError> {
        self.get(facility_id.parse()?)
    }

    /// The synthetic datasets under `tests/fixtures/catalogs`.
    #[cfg(test)]
    pub(crate) fn fixtures() -> Self {
        Self::load_dir(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/catalogs"))
            .expect("fixture catalogs load")
    }
}
