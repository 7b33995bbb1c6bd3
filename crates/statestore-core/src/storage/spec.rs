use serde::{Deserialize, Serialize};

/// Whether persisted state is shared across user profiles/platforms or kept local
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoamingType {
    /// Shared across all installations of the same user
    #[default]
    PerUser,
    /// Shared only between installations on the same platform
    PerPlatform,
    /// Never leaves this machine
    Disabled,
}

/// Direction of a storage access, handed to routing and legacy lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateStorageOperation {
    Read,
    Write,
}

/// Per-target routing decision for a component write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resolution {
    /// Write the component state
    Write,
    /// Leave the target untouched
    Skip,
    /// Write an empty state, erasing what the target held
    Clear,
}

/// Opaque handle naming a host-supplied storage implementation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageClass(String);

impl StorageClass {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

/// Opaque handle naming the splitter of a directory storage
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SplitterHandle(String);

impl SplitterHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

/// Which kind of persistence medium a spec resolves to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StorageVariant {
    /// One file holding the state of every component declared against it
    #[default]
    FileBased,
    /// A directory whose files are produced by a state splitter
    DirectoryBased { splitter: SplitterHandle },
    /// Built by the component container from a host-supplied class
    Custom { class: StorageClass },
}

/// Declarative description of where a component's state lives.
///
/// `file` may embed `$TOKEN$` macros; they are expanded only when the storage
/// is built. Two specs share a storage instance iff their
/// [`resolution_key`](StorageSpec::resolution_key) is equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageSpec {
    pub file: String,
    #[serde(default)]
    pub variant: StorageVariant,
    #[serde(default)]
    pub roaming_type: RoamingType,
    #[serde(default)]
    pub deprecated: bool,
}

impl StorageSpec {
    /// A file-based spec with per-user roaming
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            file: path.into(),
            variant: StorageVariant::FileBased,
            roaming_type: RoamingType::default(),
            deprecated: false,
        }
    }

    pub fn directory(path: impl Into<String>, splitter: SplitterHandle) -> Self {
        Self {
            variant: StorageVariant::DirectoryBased { splitter },
            ..Self::file(path)
        }
    }

    pub fn custom(path: impl Into<String>, class: StorageClass) -> Self {
        Self {
            variant: StorageVariant::Custom { class },
            ..Self::file(path)
        }
    }

    pub fn with_roaming(mut self, roaming_type: RoamingType) -> Self {
        self.roaming_type = roaming_type;
        self
    }

    pub fn mark_deprecated(mut self) -> Self {
        self.deprecated = true;
        self
    }

    /// Cache index: the raw, unexpanded path template, or the class name of a
    /// custom storage.
    pub fn resolution_key(&self) -> &str {
        match &self.variant {
            StorageVariant::Custom { class } => class.name(),
            StorageVariant::FileBased | StorageVariant::DirectoryBased { .. } => &self.file,
        }
    }
}
