/// Core domain types: source units, graph records, locators and query results.
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// A named, typed group of files analyzed as one piece by a toolchain.
/// Read-only to srcref; produced by the make step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceUnit {
    /// Commit the unit was built at.
    #[serde(default, rename = "CommitID")]
    pub commit_id: String,
    /// Directory of the unit, relative to the repository root.
    #[serde(default, rename = "Dir")]
    pub dir: String,
    /// Member files, relative to the repository root. Not necessarily clean.
    #[serde(default, deserialize_with = "null_as_default", rename = "Files")]
    pub files: Vec<String>,
    /// Unit name, e.g. a package import path.
    #[serde(rename = "Name")]
    pub name: String,
    /// Repository the unit belongs to.
    #[serde(default, rename = "Repo")]
    pub repo: String,
    /// Toolchain-specific unit type, e.g. `GoPackage` or `PipPackage`.
    #[serde(rename = "Type")]
    pub unit_type: String,
}

impl SourceUnit {
    /// Identifier combining name and type, unique within a commit.
    pub fn id(&self) -> String {
        return format!("{}@{}", self.name, self.unit_type);
    }
}

/// A byte span in one file that points at a definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ref {
    /// Commit of the referencing repository.
    #[serde(default, rename = "CommitID")]
    pub commit_id: String,
    /// Whether this ref is the definition site itself.
    #[serde(default, rename = "Def")]
    pub def: bool,
    /// Definition path within the target unit.
    #[serde(default, rename = "DefPath")]
    pub def_path: String,
    /// Target repository; empty means the referencing repository.
    #[serde(default, rename = "DefRepo")]
    pub def_repo: String,
    /// Target unit name; empty means the referencing unit.
    #[serde(default, rename = "DefUnit")]
    pub def_unit: String,
    /// Target unit type; empty means the referencing unit's type.
    #[serde(default, rename = "DefUnitType")]
    pub def_unit_type: String,
    /// End byte offset. `covers` treats it as inclusive.
    #[serde(default, rename = "End")]
    pub end: u32,
    /// File containing the ref, relative to the repository root.
    #[serde(default, rename = "File")]
    pub file: String,
    /// Referencing repository.
    #[serde(default, rename = "Repo")]
    pub repo: String,
    /// Start byte offset.
    #[serde(default, rename = "Start")]
    pub start: u32,
    /// Referencing unit name.
    #[serde(default, rename = "Unit")]
    pub unit: String,
    /// Referencing unit type.
    #[serde(default, rename = "UnitType")]
    pub unit_type: String,
}

impl Ref {
    /// Whether `offset` falls inside the ref. Both ends are inclusive.
    pub const fn covers(&self, offset: u32) -> bool {
        return self.start <= offset && offset <= self.end;
    }
}

/// A symbol declared inside a unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Def {
    /// Commit the def was built at.
    #[serde(default, rename = "CommitID")]
    pub commit_id: String,
    /// Opaque language-specific payload.
    #[serde(default, rename = "Data")]
    pub data: serde_json::Value,
    /// End byte of the declaration.
    #[serde(default, rename = "DefEnd")]
    pub def_end: u32,
    /// Start byte of the declaration.
    #[serde(default, rename = "DefStart")]
    pub def_start: u32,
    /// Whether the def is visible outside its unit.
    #[serde(default, rename = "Exported")]
    pub exported: bool,
    /// Declaring file. Repo-relative as stored, absolute once resolved locally.
    #[serde(default, rename = "File")]
    pub file: String,
    /// Kind tag, e.g. `func` or `type`.
    #[serde(default, rename = "Kind")]
    pub kind: String,
    /// Whether the def is local to a function body.
    #[serde(default, rename = "Local")]
    pub local: bool,
    /// Short display name.
    #[serde(default, rename = "Name")]
    pub name: String,
    /// Unit-scoped hierarchical path, unique within unit and type.
    #[serde(rename = "Path")]
    pub path: String,
    /// Repository of the def.
    #[serde(default, rename = "Repo")]
    pub repo: String,
    /// Whether the def lives in test code.
    #[serde(default, rename = "Test")]
    pub test: bool,
    /// Tree path used for display nesting.
    #[serde(default, rename = "TreePath")]
    pub tree_path: String,
    /// Unit name of the def.
    #[serde(default, rename = "Unit")]
    pub unit: String,
    /// Unit type of the def.
    #[serde(default, rename = "UnitType")]
    pub unit_type: String,
}

/// Rendered documentation attached to a def by path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Doc {
    /// Documentation body in `format`.
    #[serde(default, rename = "Data")]
    pub data: String,
    /// End byte of the doc comment.
    #[serde(default, rename = "End")]
    pub end: u32,
    /// File holding the doc comment.
    #[serde(default, rename = "File")]
    pub file: String,
    /// MIME type of `data`, e.g. `text/html`.
    #[serde(default, rename = "Format")]
    pub format: String,
    /// Path of the def this doc belongs to.
    #[serde(rename = "Path")]
    pub path: String,
    /// Repository of the def.
    #[serde(default, rename = "Repo")]
    pub repo: String,
    /// Start byte of the doc comment.
    #[serde(default, rename = "Start")]
    pub start: u32,
    /// Unit name of the def.
    #[serde(default, rename = "Unit")]
    pub unit: String,
    /// Unit type of the def.
    #[serde(default, rename = "UnitType")]
    pub unit_type: String,
}

/// Global key of a definition: repository, unit type, unit name, def path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct DefLocator {
    /// Unit-scoped def path.
    pub path: String,
    /// Repository identifier.
    pub repo: String,
    /// Unit name.
    pub unit: String,
    /// Unit type.
    pub unit_type: String,
}

impl fmt::Display for DefLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return write!(f, "{} {} {} {}", self.repo, self.unit_type, self.unit, self.path);
    }
}

/// A def as returned to the caller, with its rendered documentation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DescribedDef {
    /// The definition record.
    #[serde(flatten)]
    pub def: Def,
    /// Rendered documentation; empty when the def has none.
    #[serde(default, rename = "DocHTML")]
    pub doc_html: String,
}

/// One usage example fetched from the remote service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Example {
    /// Commit the example was taken from.
    #[serde(default, rename = "CommitID")]
    pub commit_id: String,
    /// End byte of the example ref.
    #[serde(default, rename = "End")]
    pub end: u32,
    /// Last line of the rendered snippet.
    #[serde(default, rename = "EndLine")]
    pub end_line: u32,
    /// Whether the service failed to render this example.
    #[serde(default, rename = "Error")]
    pub error: bool,
    /// File of the example ref.
    #[serde(default, rename = "File")]
    pub file: String,
    /// Repository of the example ref.
    #[serde(default, rename = "Repo")]
    pub repo: String,
    /// Rendered snippet markup.
    #[serde(default, rename = "SrcHTML")]
    pub src_html: String,
    /// Start byte of the example ref.
    #[serde(default, rename = "Start")]
    pub start: u32,
    /// First line of the rendered snippet.
    #[serde(default, rename = "StartLine")]
    pub start_line: u32,
    /// Unit name of the example ref.
    #[serde(default, rename = "Unit")]
    pub unit: String,
    /// Unit type of the example ref.
    #[serde(default, rename = "UnitType")]
    pub unit_type: String,
}

/// Result of `describe` once a ref was found under the cursor.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResolvedDescription {
    /// Resolved def, absent when neither local nor remote lookup found it.
    #[serde(rename = "Def")]
    pub def: Option<DescribedDef>,
    /// Usage examples; empty when suppressed or when the fetch failed.
    #[serde(rename = "Examples")]
    pub examples: Vec<Example>,
    /// Locator the ref resolved to, after defaulting.
    #[serde(skip)]
    pub locator: DefLocator,
}

/// Outcome of `describe`. `NoReference` serializes as `{}` so consumers can
/// tell "nothing under the cursor" from a crash.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Description {
    /// No ref covers the requested offset.
    NoReference {},
    /// A ref was found; its def and examples may still be absent.
    Resolved(ResolvedDescription),
}

/// Treat an explicit JSON `null` as the type's default. Producers emit `null`
/// for empty arrays.
///
/// # Errors
///
/// Returns the deserializer's error if the value is neither `null` nor a `T`.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    return Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default());
}
