//! The closed catalog of content modules.
//!
//! Every loadable module is named by a [`ModuleKey`], a `(kind, identifier)` pair. The set of
//! valid keys is declared up front by a [`Manifest`], which also names the default module of
//! each kind that unknown identifiers fall back to.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::content::ContentShape;

/// The family a content module belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleKind {
    /// Lesson cards of one learning category.
    Category,
    /// A whole resource type, such as all notes or all quizzes.
    Resource,
    /// A topic filter, such as coding problems about arrays.
    Topic,
}

impl AsRef<str> for ModuleKind {
    fn as_ref(&self) -> &str {
        match self {
            Self::Category => "category",
            Self::Resource => "resource",
            Self::Topic => "topic",
        }
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl FromStr for ModuleKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "category" => Ok(Self::Category),
            "resource" => Ok(Self::Resource),
            "topic" => Ok(Self::Topic),
            _ => bail!("unknown module kind `{s}`"),
        }
    }
}

/// Names one loadable content module.
///
/// Keys are compared by value, and cheap to clone.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModuleKey {
    kind: ModuleKind,
    identifier: Arc<str>,
}

impl ModuleKey {
    pub fn new(kind: ModuleKind, identifier: impl Into<Arc<str>>) -> Self {
        Self {
            kind,
            identifier: identifier.into(),
        }
    }

    pub fn category(identifier: impl Into<Arc<str>>) -> Self {
        Self::new(ModuleKind::Category, identifier)
    }

    pub fn resource(identifier: impl Into<Arc<str>>) -> Self {
        Self::new(ModuleKind::Resource, identifier)
    }

    pub fn topic(identifier: impl Into<Arc<str>>) -> Self {
        Self::new(ModuleKind::Topic, identifier)
    }

    pub fn kind(&self) -> ModuleKind {
        self.kind
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }
}

impl fmt::Display for ModuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.identifier)
    }
}

/// Parses keys written as `kind/identifier`, e.g. `category/fundamentals`.
impl FromStr for ModuleKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let Some((kind, identifier)) = s.split_once('/') else {
            bail!("module key `{s}` is not of the form `kind/identifier`");
        };
        if identifier.is_empty() {
            bail!("module key `{s}` has an empty identifier");
        }
        Ok(Self::new(kind.parse()?, identifier))
    }
}

impl TryFrom<String> for ModuleKey {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ModuleKey> for String {
    fn from(key: ModuleKey) -> Self {
        key.to_string()
    }
}

/// Declares a single module of the catalog.
#[derive(Clone, Debug, Deserialize)]
pub struct ModuleDecl {
    pub kind: ModuleKind,
    pub id: String,
    /// Which item family the module decodes into.
    pub shape: ContentShape,
    /// Path of the module file, relative to the content directory.
    pub path: PathBuf,
}

impl ModuleDecl {
    pub fn key(&self) -> ModuleKey {
        ModuleKey::new(self.kind, self.id.as_str())
    }
}

/// Member lists of the aggregate accessors, in their declared order.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Aggregates {
    /// The lesson categories making up "all lessons".
    pub lessons: Vec<String>,
}

/// The configuration-declared catalog of content modules.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Manifest {
    /// All modules that can be loaded.
    pub modules: Vec<ModuleDecl>,
    /// Per kind, the identifier that unknown identifiers of that kind resolve to.
    pub fallbacks: BTreeMap<ModuleKind, String>,
    /// Member lists of aggregate accessors.
    pub aggregates: Aggregates,
    /// Modules that are loaded eagerly when the content service is initialized.
    pub preload: Vec<ModuleKey>,
}

impl Manifest {
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("failed to open manifest {}", path.display()))?;
        Self::from_reader(file)
    }

    pub fn from_reader(mut reader: impl std::io::Read) -> Result<Self> {
        let mut manifest = String::new();
        reader
            .read_to_string(&mut manifest)
            .context("failed reading manifest")?;
        if manifest.trim().is_empty() {
            bail!("manifest empty");
        }
        let manifest: Self =
            serde_yaml::from_str(&manifest).context("failed to parse manifest YAML")?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Returns the declared lesson categories as keys, in aggregate order.
    pub fn lesson_categories(&self) -> Vec<ModuleKey> {
        self.aggregates
            .lessons
            .iter()
            .map(|id| ModuleKey::category(id.as_str()))
            .collect()
    }

    /// Checks that the catalog is closed: keys are unique, and every fallback, aggregate
    /// member and preload entry names a declared module.
    pub fn validate(&self) -> Result<()> {
        let mut declared = BTreeSet::new();
        for module in &self.modules {
            if !declared.insert(module.key()) {
                bail!("module {} is declared more than once", module.key());
            }
        }

        for (kind, id) in &self.fallbacks {
            let key = ModuleKey::new(*kind, id.as_str());
            if !declared.contains(&key) {
                bail!("fallback {key} is not a declared module");
            }
        }

        let mut members = BTreeSet::new();
        for key in self.lesson_categories() {
            if !members.insert(key.clone()) {
                bail!("lesson aggregate member {key} is listed more than once");
            }
            match self.modules.iter().find(|module| module.key() == key) {
                None => bail!("lesson aggregate member {key} is not a declared module"),
                Some(module) if module.shape != ContentShape::Lessons => {
                    bail!("lesson aggregate member {key} does not hold lessons")
                }
                Some(_) => {}
            }
        }

        for key in &self.preload {
            if !declared.contains(key) {
                bail!("preloaded module {key} is not a declared module");
            }
        }

        Ok(())
    }
}
