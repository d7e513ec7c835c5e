// src/recipe/descriptor.rs

//! Typed resolution of the bundle declaration and metadata extraction
//!
//! Resolution ("preconfigure") converts the opaque bundle directive into a
//! typed handle purely from its static attributes and children. It never
//! runs anything and it is idempotent: resolving the same directive twice
//! yields the same handle. Children that do not map to a known element are
//! tolerated and left out of the typed view; the structural validator is
//! the one that decides whether the handle is acceptable.
//!
//! `extract` then flattens a handle into a `BundleDescriptor` - the
//! metadata callers use to verify bundle content before anything executes.

use crate::recipe::document::Directive;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Declared type of a configuration input property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    String,
    Boolean,
    Integer,
    Float,
    File,
    Directory,
}

impl PropertyType {
    /// Unknown type strings fall back to `String`
    fn parse(s: Option<&str>) -> Self {
        match s {
            Some("boolean") => Self::Boolean,
            Some("integer") => Self::Integer,
            Some("float") => Self::Float,
            Some("file") => Self::File,
            Some("directory") => Self::Directory,
            _ => Self::String,
        }
    }
}

/// One named, typed property in the bundle's configuration schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDef {
    pub name: String,
    pub description: Option<String>,
    pub required: bool,
    pub default_value: Option<String>,
    pub kind: PropertyType,
}

/// How the destination directory is reconciled with the bundle content
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComplianceMode {
    /// The whole destination directory is managed; foreign files are
    /// backed up and removed
    #[default]
    Full,
    /// Only files and directories named by the bundle are touched
    FilesAndDirectories,
}

impl ComplianceMode {
    fn parse(unit: &Directive) -> Self {
        if let Some(v) = unit.attr("compliance") {
            return match v {
                "filesAndDirectories" => Self::FilesAndDirectories,
                _ => Self::Full,
            };
        }
        // legacy spelling kept for drop-in compatibility
        match unit.attr("manageRootDir") {
            Some("false") => Self::FilesAndDirectories,
            _ => Self::Full,
        }
    }
}

/// Handover declaration attached to a file or archive entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoverDecl {
    pub action: Option<String>,
    pub fail_on_error: bool,
    pub params: Vec<(String, String)>,
}

/// A raw file the unit places on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Name of the file as found in the bundle distribution
    pub source: String,
    /// Where it lands; relative paths are resolved against the deploy dir
    pub destination: PathBuf,
    /// Whether template references inside the file are realized
    pub replace: bool,
    /// Remote origin, when the entry was declared by URL
    pub url: Option<String>,
    pub handover: Option<HandoverDecl>,
}

/// An archive the unit places on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveEntry {
    /// Name of the archive as found in the bundle distribution
    pub source: String,
    /// Destination directory; the deploy dir itself when absent
    pub destination_dir: Option<PathBuf>,
    /// Deploy unpacked rather than as the compressed archive
    pub exploded: bool,
    /// Pattern selecting members to realize with the template engine
    pub replace_pattern: Option<String>,
    /// Remote origin, when the entry was declared by URL
    pub url: Option<String>,
    pub handover: Option<HandoverDecl>,
}

/// An init-script service the unit installs and drives through phases
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemServiceDecl {
    pub name: String,
    pub script_file: String,
    pub config_file: Option<String>,
}

/// One deployment unit resolved from the bundle declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentUnitDecl {
    pub name: String,
    pub compliance: ComplianceMode,
    /// Named block to run before content placement
    pub preinstall_block: Option<String>,
    /// Named block to run after content placement
    pub postinstall_block: Option<String>,
    pub files: Vec<FileEntry>,
    pub archives: Vec<ArchiveEntry>,
    pub system_service: Option<SystemServiceDecl>,
}

impl DeploymentUnitDecl {
    /// Whether this unit declares any deployable content
    pub fn has_content(&self) -> bool {
        !self.files.is_empty() || !self.archives.is_empty()
    }
}

/// Typed, side-effect-free view of the single bundle declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleHandle {
    pub name: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
    pub config_schema: Vec<PropertyDef>,
    pub units: Vec<DeploymentUnitDecl>,
}

/// Resolve the bundle directive into its typed handle
///
/// Pure function of the directive's attributes and children. Unknown
/// children are tolerated and simply absent from the handle.
pub fn resolve(directive: &Directive) -> BundleHandle {
    let config_schema = directive
        .children_named("input-property")
        .map(|p| PropertyDef {
            name: p.attr("name").unwrap_or_default().to_string(),
            description: p.attr("description").map(str::to_string),
            required: p.attr("required") == Some("true"),
            default_value: p.attr("defaultValue").map(str::to_string),
            kind: PropertyType::parse(p.attr("type")),
        })
        .collect();

    let units = directive
        .children_named("deployment-unit")
        .map(resolve_unit)
        .collect();

    BundleHandle {
        name: directive.attr("name").map(str::to_string),
        version: directive.attr("version").map(str::to_string),
        description: directive.attr("description").map(str::to_string),
        config_schema,
        units,
    }
}

fn resolve_unit(unit: &Directive) -> DeploymentUnitDecl {
    let name = unit.attr("name").unwrap_or_default().to_string();
    let mut files = Vec::new();
    let mut archives = Vec::new();
    let mut system_service = None;

    for child in &unit.children {
        match child.local_name() {
            "file" => {
                if let Some(entry) = resolve_file(child, None) {
                    files.push(entry);
                }
            }
            "url-file" => {
                let url = child.attr("url").map(str::to_string);
                if let Some(entry) = resolve_file(child, url) {
                    files.push(entry);
                }
            }
            "archive" => {
                if let Some(entry) = resolve_archive(child, None) {
                    archives.push(entry);
                }
            }
            "url-archive" => {
                let url = child.attr("url").map(str::to_string);
                if let Some(entry) = resolve_archive(child, url) {
                    archives.push(entry);
                }
            }
            "system-service" => {
                if let Some(svc) = resolve_system_service(child) {
                    // the init script and its config deploy like raw files
                    files.push(FileEntry {
                        source: svc.script_file.clone(),
                        destination: Path::new("etc/init.d").join(&svc.name),
                        replace: false,
                        url: None,
                        handover: None,
                    });
                    if let Some(config) = &svc.config_file {
                        files.push(FileEntry {
                            source: config.clone(),
                            destination: Path::new("etc/sysconfig").join(&svc.name),
                            replace: true,
                            url: None,
                            handover: None,
                        });
                    }
                    system_service = Some(svc);
                }
            }
            // unresolved optional children are tolerated
            _ => {}
        }
    }

    DeploymentUnitDecl {
        name,
        compliance: ComplianceMode::parse(unit),
        preinstall_block: unit.attr("preinstallTarget").map(str::to_string),
        postinstall_block: unit.attr("postinstallTarget").map(str::to_string),
        files,
        archives,
        system_service,
    }
}

fn resolve_file(d: &Directive, url: Option<String>) -> Option<FileEntry> {
    let source = match (d.attr("name"), &url) {
        (Some(name), _) => name.to_string(),
        (None, Some(u)) => url_base_name(u)?,
        (None, None) => return None,
    };
    let destination = match (d.attr("destinationFile"), d.attr("destinationDir")) {
        (Some(file), _) => PathBuf::from(file),
        (None, Some(dir)) => Path::new(dir).join(base_name(&source)),
        // destination defaults to the file's own name under the deploy dir
        (None, None) => PathBuf::from(base_name(&source)),
    };
    Some(FileEntry {
        source,
        destination,
        replace: d.attr("replace") == Some("true"),
        url,
        handover: resolve_handover(d),
    })
}

fn resolve_archive(d: &Directive, url: Option<String>) -> Option<ArchiveEntry> {
    let source = match (d.attr("name"), &url) {
        (Some(name), _) => name.to_string(),
        (None, Some(u)) => url_base_name(u)?,
        (None, None) => return None,
    };
    Some(ArchiveEntry {
        source,
        destination_dir: d.attr("destinationDir").map(PathBuf::from),
        exploded: d.attr("exploded") != Some("false"),
        replace_pattern: d.attr("replacePattern").map(str::to_string),
        url,
        handover: resolve_handover(d),
    })
}

fn resolve_system_service(d: &Directive) -> Option<SystemServiceDecl> {
    Some(SystemServiceDecl {
        name: d.attr("name")?.to_string(),
        script_file: d.attr("scriptFile")?.to_string(),
        config_file: d.attr("configFile").map(str::to_string),
    })
}

fn resolve_handover(d: &Directive) -> Option<HandoverDecl> {
    let handover = d.children_named("handover").next()?;
    let params = handover
        .children_named("param")
        .filter_map(|p| Some((p.attr("name")?.to_string(), p.attr("value")?.to_string())))
        .collect();
    Some(HandoverDecl {
        action: handover.attr("action").map(str::to_string),
        fail_on_error: handover.attr("failonerror") != Some("false"),
        params,
    })
}

fn base_name(path: &str) -> String {
    path.rsplit('/').next().unwrap_or(path).to_string()
}

fn url_base_name(url: &str) -> Option<String> {
    let path = url.trim_end_matches('/');
    let name = path.rsplit('/').next()?;
    if name.is_empty() || name.contains("://") {
        None
    } else {
        Some(name.to_string())
    }
}

/// Extracted bundle metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleDescriptor {
    pub name: String,
    pub version: String,
    pub description: String,
    pub config_schema: Vec<PropertyDef>,
    pub units: Vec<DeploymentUnitDecl>,
}

impl BundleDescriptor {
    /// Distinct bundle-local names of every file and archive this
    /// deployment expects, in declaration order
    pub fn manifest(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for unit in &self.units {
            for file in &unit.files {
                if !names.iter().any(|n| n == &file.source) {
                    names.push(file.source.clone());
                }
            }
            for archive in &unit.archives {
                if !names.iter().any(|n| n == &archive.source) {
                    names.push(archive.source.clone());
                }
            }
        }
        names
    }
}

/// Flatten a resolved handle into the descriptor callers consume
///
/// Deterministic and pure; missing attributes become empty strings.
pub fn extract(handle: &BundleHandle) -> BundleDescriptor {
    BundleDescriptor {
        name: handle.name.clone().unwrap_or_default(),
        version: handle.version.clone().unwrap_or_default(),
        description: handle.description.clone().unwrap_or_default(),
        config_schema: handle.config_schema.clone(),
        units: handle.units.clone(),
    }
}
