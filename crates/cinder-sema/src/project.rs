// project.rs
//
// Pre-resolved project metadata. The manifest format lives outside the core.

use std::path::PathBuf;

/// A dependency made visible as a root namespace of the same name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub name: String,
    pub source_root: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectInput {
    pub name: String,
    pub dependencies: Vec<Dependency>,
}

impl ProjectInput {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dependencies: Vec::new(),
        }
    }

    pub fn with_dependency(mut self, name: impl Into<String>, source_root: impl Into<PathBuf>) -> Self {
        self.dependencies.push(Dependency {
            name: name.into(),
            source_root: source_root.into(),
        });
        self
    }
}
