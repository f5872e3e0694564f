use serde::{Deserialize, Serialize};

/// A named container of disassemblies; carries an ordered list of
/// disassembly names so a client can enumerate what a project holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Name of the project.
    pub name: String,
    /// Names of the disassemblies belonging to this project, in creation
    /// order.
    pub disassembly_names: Vec<String>,
}

impl Project {
    /// Build a new, empty project.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), disassembly_names: Vec::new() }
    }

    /// Record that `disassembly_name` now belongs to this project. Does
    /// nothing if it is already present.
    pub fn push_disassembly(&mut self, disassembly_name: impl Into<String>) {
        let disassembly_name = disassembly_name.into();

        if !self.disassembly_names.contains(&disassembly_name) {
            self.disassembly_names.push(disassembly_name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_disassembly_is_idempotent() {
        let mut project = Project::new("workbench");
        project.push_disassembly("main");
        project.push_disassembly("main");

        assert_eq!(project.disassembly_names, vec!["main".to_string()]);
    }
}
