//! Tool registry: which binaries a pipeline needs and how to install them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::config::ToolOverride;

/// Placeholder substituted with the tool cache directory in commands.
pub const TOOLS_DIR_PLACEHOLDER: &str = "{tools_dir}";

/// Installation recipe for one external tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSpec {
    /// The tool name used by stages.
    pub name: String,
    /// The executable looked up on the search path.
    pub binary: String,
    /// Shell command that installs the tool.
    pub install: String,
    /// Optional shell command run after the tool is available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setup: Option<String>,
}

impl ToolSpec {
    /// Creates a tool whose binary has the same name as the tool.
    #[must_use]
    pub fn new(name: impl Into<String>, install: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            binary: name.clone(),
            name,
            install: install.into(),
            setup: None,
        }
    }

    /// Sets the executable name.
    #[must_use]
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Sets the post-install setup command.
    #[must_use]
    pub fn with_setup(mut self, setup: impl Into<String>) -> Self {
        self.setup = Some(setup.into());
        self
    }

    /// The install command with `{tools_dir}` substituted.
    #[must_use]
    pub fn install_command(&self, tools_dir: &Path) -> String {
        substitute_tools_dir(&self.install, tools_dir)
    }

    /// The setup command with `{tools_dir}` substituted.
    #[must_use]
    pub fn setup_command(&self, tools_dir: &Path) -> Option<String> {
        self.setup
            .as_deref()
            .map(|setup| substitute_tools_dir(setup, tools_dir))
    }

    fn apply(&mut self, overrides: &ToolOverride) {
        if let Some(ref install) = overrides.install {
            self.install.clone_from(install);
        }
        if let Some(ref binary) = overrides.binary {
            self.binary.clone_from(binary);
        }
        if let Some(ref setup) = overrides.setup {
            self.setup = Some(setup.clone());
        }
    }
}

/// Substitutes the directory as a single-quoted shell word.
fn substitute_tools_dir(command: &str, tools_dir: &Path) -> String {
    let quoted = format!("'{}'", tools_dir.display().to_string().replace('\'', r"'\''"));
    command.replace(TOOLS_DIR_PLACEHOLDER, &quoted)
}

/// Ordered, read-only table of tools.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolRegistry {
    tools: Vec<ToolSpec>,
}

impl ToolRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a tool, replacing any previous entry with the same name.
    #[must_use]
    pub fn with_tool(mut self, spec: ToolSpec) -> Self {
        self.register(spec);
        self
    }

    /// Adds a tool, replacing any previous entry with the same name.
    pub fn register(&mut self, spec: ToolSpec) {
        if let Some(existing) = self.tools.iter_mut().find(|t| t.name == spec.name) {
            *existing = spec;
        } else {
            self.tools.push(spec);
        }
    }

    /// Applies per-tool overrides. Overrides for unknown tools are ignored
    /// unless they carry an install command, in which case the tool is added.
    #[must_use]
    pub fn with_overrides(mut self, overrides: &BTreeMap<String, ToolOverride>) -> Self {
        for (name, tool_override) in overrides {
            if let Some(existing) = self.tools.iter_mut().find(|t| &t.name == name) {
                existing.apply(tool_override);
            } else if let Some(ref install) = tool_override.install {
                let mut spec = ToolSpec::new(name.clone(), install.clone());
                spec.apply(tool_override);
                self.tools.push(spec);
            }
        }
        self
    }

    /// Looks up a tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.iter().find(|t| t.name == name)
    }

    /// Iterates tools in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &ToolSpec> {
        self.tools.iter()
    }

    /// Returns the number of tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns true if the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn registry() -> ToolRegistry {
        ToolRegistry::new()
            .with_tool(ToolSpec::new("httpx", "go install httpx@latest"))
            .with_tool(
                ToolSpec::new("openredirex", "git clone x {tools_dir}/OpenRedireX")
                    .with_setup("ls {tools_dir}"),
            )
    }

    #[test]
    fn test_register_replaces_by_name() {
        let mut registry = registry();
        registry.register(ToolSpec::new("httpx", "pip install httpx"));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("httpx").unwrap().install, "pip install httpx");
    }

    #[test]
    fn test_tools_dir_substitution() {
        let registry = registry();
        let spec = registry.get("openredirex").unwrap();
        let dir = Path::new("/opt/cache");

        assert_eq!(spec.install_command(dir), "git clone x '/opt/cache'/OpenRedireX");
        assert_eq!(spec.setup_command(dir).as_deref(), Some("ls '/opt/cache'"));
        assert_eq!(registry.get("httpx").unwrap().setup_command(dir), None);
    }

    #[test]
    fn test_tools_dir_with_spaces_and_quotes_stays_one_word() {
        let spec = ToolSpec::new("x", "ls {tools_dir}/bin");

        assert_eq!(spec.install_command(Path::new("/home/j doe/tools")), "ls '/home/j doe/tools'/bin");
        assert_eq!(spec.install_command(Path::new("/it's")), r"ls '/it'\''s'/bin");
    }

    #[cfg(unix)]
    #[test]
    fn test_quoted_tools_dir_survives_the_shell() {
        let dir = tempfile::tempdir().unwrap();
        let tools_dir = dir.path().join("bounty tools");
        let spec = ToolSpec::new("x", "mkdir -p {tools_dir}/bin && touch {tools_dir}/bin/marker");

        let status = std::process::Command::new("sh")
            .arg("-c")
            .arg(spec.install_command(&tools_dir))
            .status()
            .unwrap();

        assert!(status.success());
        assert!(tools_dir.join("bin").join("marker").exists());
    }

    #[test]
    fn test_overrides() {
        let mut overrides = BTreeMap::new();
        overrides.insert(
            "httpx".to_string(),
            ToolOverride {
                binary: Some("httpx-toolkit".to_string()),
                ..ToolOverride::default()
            },
        );
        overrides.insert(
            "ffuf".to_string(),
            ToolOverride {
                install: Some("go install ffuf@latest".to_string()),
                ..ToolOverride::default()
            },
        );
        overrides.insert("ghost".to_string(), ToolOverride::default());

        let registry = registry().with_overrides(&overrides);

        assert_eq!(registry.get("httpx").unwrap().binary, "httpx-toolkit");
        assert_eq!(registry.get("httpx").unwrap().install, "go install httpx@latest");
        assert_eq!(registry.get("ffuf").unwrap().binary, "ffuf");
        assert!(registry.get("ghost").is_none());
        let names: Vec<_> = registry.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["httpx", "openredirex", "ffuf"]);
    }
}
