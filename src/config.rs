//! Track configuration: adapter locations, sample lists, reference override.
//!
//! Mirrors the configuration surface of the host track: one adapter kind
//! with its file locations, an ordered sample list that doubles as a display
//! filter, and an optional reference-assembly override consulted first
//! during reference-row resolution.

use std::path::PathBuf;

/// Where a file lives. Local paths are always available; HTTP locations
/// require the `network` feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// Local file path
    Local(PathBuf),

    /// HTTP/HTTPS URL
    #[cfg(feature = "network")]
    Http(String),
}

impl Location {
    /// Create a local location from a path.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Location::Local(path.into())
    }

    /// The local path, when this location is a local file.
    pub fn as_local(&self) -> Option<&std::path::Path> {
        match self {
            Location::Local(path) => Some(path),
            #[cfg(feature = "network")]
            Location::Http(_) => None,
        }
    }
}

/// One displayed sample: an assembly id plus optional presentation hints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleConfig {
    /// Assembly id as it appears in row source names (e.g. `hg38`)
    pub id: String,
    /// Display label; defaults to the id
    pub label: Option<String>,
    /// Display color hint, passed through to the renderer
    pub color: Option<String>,
}

impl SampleConfig {
    /// A sample with no presentation hints.
    pub fn new(id: impl Into<String>) -> Self {
        SampleConfig {
            id: id.into(),
            label: None,
            color: None,
        }
    }

    /// Label to display: the explicit label when set, else the id.
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.id)
    }
}

impl From<&str> for SampleConfig {
    fn from(id: &str) -> Self {
        SampleConfig::new(id)
    }
}

/// Which physical encoding backs the track, with its file locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterConfig {
    /// TAF: bgzip-compressed `.taf.gz` plus its `.tai` index
    Taf { taf_gz: Location, tai: Location },
    /// BigMaf: a BigBed file whose extra column carries MAF blocks
    BigMaf { big_bed: Location },
    /// MafTabix: bgzip-compressed BED plus its Tabix index
    MafTabix { bed_gz: Location, index: Location },
}

/// Complete track configuration.
#[derive(Debug, Clone)]
pub struct TrackConfig {
    /// Adapter kind and file locations
    pub adapter: AdapterConfig,
    /// Ordered sample list; also the display filter
    pub samples: Vec<SampleConfig>,
    /// Reference-assembly override, consulted first during reference
    /// resolution
    pub ref_assembly_name: Option<String>,
    /// Optional Newick tree location; carried for the host UI, never read
    /// by this crate
    pub nh_location: Option<Location>,
}

impl TrackConfig {
    /// Configuration with an adapter and no samples.
    pub fn new(adapter: AdapterConfig) -> Self {
        TrackConfig {
            adapter,
            samples: Vec::new(),
            ref_assembly_name: None,
            nh_location: None,
        }
    }

    /// Set the sample list from plain assembly ids.
    pub fn with_sample_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.samples = ids
            .into_iter()
            .map(|id| SampleConfig::new(id.into()))
            .collect();
        self
    }

    /// Set the reference-assembly override.
    pub fn with_ref_assembly(mut self, assembly: impl Into<String>) -> Self {
        self.ref_assembly_name = Some(assembly.into());
        self
    }
}
