// src/deployer.rs

//! Content placement boundary
//!
//! The engine never copies bundle content itself; it hands each
//! deployment unit to a `ContentDeployer`. Production installations plug
//! in their own file-management agent here. The crate ships `FsDeployer`,
//! a minimal filesystem implementation: plain copies with
//! backup-before-overwrite, `@@token@@` realization for files marked
//! `replace`, and a foreign-file sweep for fully managed destinations.
//! Archive explosion and content diffing are left to richer deployers.

use crate::error::Result;
use crate::phase::DeployDifferences;
use crate::recipe::descriptor::{ComplianceMode, DeploymentUnitDecl};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Directory under the deploy dir holding backed-up files
pub const BACKUP_DIR: &str = ".deploy-backup";

/// Everything a deployer needs to place one unit's content
pub struct DeploymentData<'a> {
    /// Local directory holding the bundle's files, keyed by manifest name
    pub bundle_files_dir: &'a Path,
    /// Deployment destination directory
    pub deploy_dir: &'a Path,
    pub unit: &'a DeploymentUnitDecl,
    /// Property bindings used to realize `replace` files
    pub properties: &'a BTreeMap<String, String>,
}

/// External collaborator that physically places unit content
pub trait ContentDeployer: Send + Sync {
    /// Place the unit's files and archives, recording what changed.
    /// With `dry_run` set, record what would change without touching disk.
    fn deploy(&self, data: &DeploymentData<'_>, diffs: &mut DeployDifferences, dry_run: bool)
        -> Result<()>;
}

/// Replace `@@name@@` references from the property table; unknown
/// references are left verbatim
pub fn realize_tokens(content: &str, properties: &BTreeMap<String, String>) -> String {
    let mut out = content.to_string();
    for (key, value) in properties {
        out = out.replace(&format!("@@{key}@@"), value);
    }
    out
}

/// Plain-filesystem deployer
#[derive(Debug, Default)]
pub struct FsDeployer;

impl FsDeployer {
    pub fn new() -> Self {
        FsDeployer
    }

    fn backup(&self, deploy_dir: &Path, dest: &Path, diffs: &mut DeployDifferences) -> Result<()> {
        let name = dest.file_name().map(PathBuf::from).unwrap_or_default();
        let backup_path = deploy_dir.join(BACKUP_DIR).join(name);
        if let Some(parent) = backup_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(dest, &backup_path)?;
        diffs.backed_up.push((
            dest.display().to_string(),
            backup_path.display().to_string(),
        ));
        Ok(())
    }

    /// Back up and remove files already present in a fully managed
    /// destination that the bundle does not own
    fn sweep_foreign_files(
        &self,
        data: &DeploymentData<'_>,
        diffs: &mut DeployDifferences,
        dry_run: bool,
    ) -> Result<()> {
        if !data.deploy_dir.exists() {
            return Ok(());
        }
        let mut owned: Vec<PathBuf> = data
            .unit
            .files
            .iter()
            .map(|f| resolve_destination(data.deploy_dir, &f.destination))
            .collect();
        for archive in &data.unit.archives {
            let base = Path::new(&archive.source)
                .file_name()
                .map(PathBuf::from)
                .unwrap_or_default();
            let dest_dir = match &archive.destination_dir {
                Some(dir) => resolve_destination(data.deploy_dir, dir),
                None => data.deploy_dir.to_path_buf(),
            };
            owned.push(dest_dir.join(base));
        }

        for entry in WalkDir::new(data.deploy_dir).into_iter().filter_map(|e| e.ok()) {
            let path = entry.path();
            if !entry.file_type().is_file() || path.starts_with(data.deploy_dir.join(BACKUP_DIR)) {
                continue;
            }
            if owned.iter().any(|o| o == path) {
                continue;
            }
            debug!("foreign file in managed destination: {}", path.display());
            if !dry_run {
                self.backup(data.deploy_dir, path, diffs)?;
                fs::remove_file(path)?;
            }
            diffs.deleted.push(path.display().to_string());
        }
        diffs.was_cleaned = true;
        Ok(())
    }

    fn place_file(
        &self,
        data: &DeploymentData<'_>,
        source: &Path,
        dest: &Path,
        realize: bool,
        diffs: &mut DeployDifferences,
        dry_run: bool,
    ) -> Result<()> {
        if !source.is_file() {
            let message = format!("bundle file not found: {}", source.display());
            diffs
                .errors
                .push((dest.display().to_string(), message.clone()));
            return Err(std::io::Error::new(std::io::ErrorKind::NotFound, message).into());
        }

        let existed = dest.exists();
        if existed {
            diffs.changed.push(dest.display().to_string());
        } else {
            diffs.added.push(dest.display().to_string());
        }
        if realize {
            diffs.realized.push(dest.display().to_string());
        }
        if dry_run {
            return Ok(());
        }

        if existed {
            self.backup(data.deploy_dir, dest, diffs)?;
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        if realize {
            let content = fs::read_to_string(source)?;
            fs::write(dest, realize_tokens(&content, data.properties))?;
        } else {
            fs::copy(source, dest)?;
        }
        Ok(())
    }
}

fn resolve_destination(deploy_dir: &Path, destination: &Path) -> PathBuf {
    if destination.is_absolute() {
        destination.to_path_buf()
    } else {
        deploy_dir.join(destination)
    }
}

impl ContentDeployer for FsDeployer {
    fn deploy(
        &self,
        data: &DeploymentData<'_>,
        diffs: &mut DeployDifferences,
        dry_run: bool,
    ) -> Result<()> {
        if data.unit.compliance == ComplianceMode::Full {
            self.sweep_foreign_files(data, diffs, dry_run)?;
        }
        if !dry_run {
            fs::create_dir_all(data.deploy_dir)?;
        }

        for file in &data.unit.files {
            if file.handover.is_some() {
                continue; // routed through the handover target by the engine
            }
            let source = data.bundle_files_dir.join(&file.source);
            let dest = resolve_destination(data.deploy_dir, &file.destination);
            self.place_file(data, &source, &dest, file.replace, diffs, dry_run)?;
        }

        for archive in &data.unit.archives {
            if archive.handover.is_some() {
                continue;
            }
            let source = data.bundle_files_dir.join(&archive.source);
            let base = source.file_name().map(PathBuf::from).unwrap_or_default();
            let dest_dir = match &archive.destination_dir {
                Some(dir) => resolve_destination(data.deploy_dir, dir),
                None => data.deploy_dir.to_path_buf(),
            };
            // archives are placed as-is; explosion belongs to richer deployers
            self.place_file(data, &source, &dest_dir.join(base), false, diffs, dry_run)?;
        }
        Ok(())
    }
}
