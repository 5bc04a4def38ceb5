//! Project descriptor parsing.
//!
//! A project links to its remote counterpart through
//! `.cloudbuild/project.kdl`:
//!
//! ```kdl
//! project "my-app" id="p-123"
//! ```

use crate::kdl_util::{get_first_string_arg, get_string_prop};
use crate::{ConfigError, ConfigResult};
use cloudbuild_core::ProjectId;
use kdl::{KdlDocument, KdlEntry, KdlNode};
use std::path::{Path, PathBuf};

pub const DESCRIPTOR_DIR: &str = ".cloudbuild";
pub const DESCRIPTOR_FILE: &str = "project.kdl";

/// Local metadata about a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectDescriptor {
    /// Human-readable project name.
    pub name: String,
    /// Remote project, once created.
    pub project_id: Option<ProjectId>,
}

impl ProjectDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            project_id: None,
        }
    }

    /// Path of the descriptor inside `project_dir`.
    pub fn path(project_dir: &Path) -> PathBuf {
        project_dir.join(DESCRIPTOR_DIR).join(DESCRIPTOR_FILE)
    }

    /// Load the descriptor of `project_dir`, if one exists.
    pub fn load(project_dir: &Path) -> ConfigResult<Option<Self>> {
        let path = Self::path(project_dir);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)?;
        parse_descriptor(&content).map(Some)
    }

    /// Write the descriptor into `project_dir`, creating the directory.
    pub fn save(&self, project_dir: &Path) -> ConfigResult<()> {
        let path = Self::path(project_dir);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, self.to_kdl())?;
        Ok(())
    }

    /// Render as KDL text.
    pub fn to_kdl(&self) -> String {
        let mut node = KdlNode::new("project");
        node.entries_mut().push(KdlEntry::new(self.name.clone()));
        if let Some(id) = &self.project_id {
            node.entries_mut()
                .push(KdlEntry::new_prop("id", id.as_str().to_string()));
        }

        let mut doc = KdlDocument::new();
        doc.nodes_mut().push(node);
        doc.autoformat();
        doc.to_string()
    }
}

/// Parse a project descriptor from KDL text.
pub fn parse_descriptor(kdl: &str) -> ConfigResult<ProjectDescriptor> {
    let doc: KdlDocument = kdl.parse()?;

    let node = doc
        .nodes()
        .iter()
        .find(|n| n.name().value() == "project")
        .ok_or_else(|| ConfigError::MissingField("project".to_string()))?;

    let name = get_first_string_arg(node)
        .ok_or_else(|| ConfigError::MissingField("project name".to_string()))?;

    let project_id = get_string_prop(node, "id")
        .filter(|id| !id.is_empty())
        .map(ProjectId::from);

    Ok(ProjectDescriptor { name, project_id })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_descriptor() {
        let descriptor = parse_descriptor(r#"project "my-app" id="p-123""#).unwrap();
        assert_eq!(descriptor.name, "my-app");
        assert_eq!(descriptor.project_id, Some(ProjectId::from("p-123")));
    }

    #[test]
    fn test_parse_descriptor_without_id() {
        let descriptor = parse_descriptor(r#"project "fresh""#).unwrap();
        assert_eq!(descriptor.name, "fresh");
        assert!(descriptor.project_id.is_none());
    }

    #[test]
    fn test_missing_project_node() {
        let result = parse_descriptor(r#"name "oops""#);
        assert!(matches!(result.unwrap_err(), ConfigError::MissingField(_)));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut descriptor = ProjectDescriptor::new("demo app");
        descriptor.project_id = Some(ProjectId::from("abc"));

        descriptor.save(dir.path()).unwrap();
        assert!(dir.path().join(".cloudbuild/project.kdl").exists());

        let loaded = ProjectDescriptor::load(dir.path()).unwrap();
        assert_eq!(loaded, Some(descriptor));
    }

    #[test]
    fn test_load_absent_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(ProjectDescriptor::load(dir.path()).unwrap(), None);
    }
}
