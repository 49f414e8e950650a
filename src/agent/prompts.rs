//! Prompt templates for agent sessions.
//!
//! Templates are configuration data: plain text with `$name` placeholders,
//! substituted in a single pass when a session starts. The defaults can be
//! overridden from a YAML file:
//!
//! ```yaml
//! editor: |
//!   You are a careful Go programmer.
//!   <assignment>
//!   $assignment
//!   </assignment>
//! assignments:
//!   refactor: split long functions into smaller ones
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::ConfigError;

/// File the editor keeps its change log in, at the workspace root.
pub const CHANGE_LOG_PATH: &str = ".toolbox.md";

/// Placeholder every template must contain.
pub const ASSIGNMENT_VAR: &str = "assignment";

/// Read-only session template.
pub const READER_TEMPLATE: &str = r#"
You are an expert programmer receiving an assignment.

- Use your workspace to complete the assignment
- Only read files, never make changes in the workspace

INPUTS:

1) Your assignment is:

<assignment>
$assignment
</assignment>

2) You have access to a simple workspace containing the sources to do your work.
Inside this workspace you can read files, list directories or walk the directory tree.
"#;

/// Read-write session template.
pub const EDITOR_TEMPLATE: &str = r#"
You are an expert programmer receiving an assignment.

- Use your workspace to complete the assignment
- Make the smallest possible changes
- Improve the code for readability
- Add comments when necessary to keep the code easy to understand
- Based on the language, use the appropriate builder to build and test the code: $builders
- Always write changes to the original files in the workspace
- Create the file $change_log if it doesn't exist
- Keep a log of all the changes made in $change_log, in markdown format: include explanations and before and after code to document

INPUTS:

1) Your assignment is:

<assignment>
$assignment
</assignment>

2) You have access to a workspace to do your work.
Inside this workspace you can read, write and rm files or walk the directory tree.
You can also run the tools copy_dir, rm_dir and list_dir for directory operations.
And you can build and test.
"#;

/// Assignment for `explain`.
pub const EXPLAIN: &str =
    "explain what the code does and why it does it in the most concise way possible";
/// Assignment for `find-bugs`.
pub const FIND_BUGS: &str =
    "find potential bugs in the existing code, explain them and propose alternative code to fix them";
/// Assignment for `add-comments`.
pub const ADD_COMMENTS: &str =
    "add comments to the existing code to improve readability and maintainability";
/// Assignment for `refactor`.
pub const REFACTOR: &str = "refactor the existing code to improve readability and maintainability";
/// Assignment for `bump-deps`.
pub const BUMP_DEPS: &str =
    "find dependencies and their version, find the latest version and update them";

/// Substitutes `$name` placeholders in `template`.
///
/// Placeholders without a value are left as written. Substituted values are
/// not scanned again, so an assignment containing `$builders` stays literal.
pub fn substitute(template: &str, vars: &BTreeMap<&str, &str>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        let len = after
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(after.len());
        let name = &after[..len];

        match vars.get(name) {
            Some(value) if !name.is_empty() => out.push_str(value),
            _ => {
                out.push('$');
                out.push_str(name);
            }
        }
        rest = &after[len..];
    }
    out.push_str(rest);
    out
}

/// Whether `template` references `$name` as a whole placeholder.
fn has_placeholder(template: &str, name: &str) -> bool {
    let needle = format!("${name}");
    template.match_indices(&needle).any(|(i, _)| {
        template[i + needle.len()..]
            .chars()
            .next()
            .map_or(true, |c| !(c.is_ascii_alphanumeric() || c == '_'))
    })
}

/// Partial prompt configuration as read from YAML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PromptOverrides {
    pub reader: Option<String>,
    pub editor: Option<String>,
    pub assignments: BTreeMap<String, String>,
}

/// Reader and editor templates plus the fixed assignments by operation name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptSet {
    pub reader: String,
    pub editor: String,
    pub assignments: BTreeMap<String, String>,
}

impl Default for PromptSet {
    fn default() -> Self {
        let assignments = [
            ("explain", EXPLAIN),
            ("find-bugs", FIND_BUGS),
            ("add-comments", ADD_COMMENTS),
            ("refactor", REFACTOR),
            ("bump-deps", BUMP_DEPS),
        ]
        .into_iter()
        .map(|(op, text)| (op.to_string(), text.to_string()))
        .collect();

        Self {
            reader: READER_TEMPLATE.to_string(),
            editor: EDITOR_TEMPLATE.to_string(),
            assignments,
        }
    }
}

impl PromptSet {
    /// Default templates with `overrides` applied on top.
    pub fn with_overrides(overrides: PromptOverrides) -> Result<Self, ConfigError> {
        let mut set = Self::default();
        if let Some(reader) = overrides.reader {
            set.reader = reader;
        }
        if let Some(editor) = overrides.editor {
            set.editor = editor;
        }
        set.assignments.extend(overrides.assignments);
        set.validate()?;
        Ok(set)
    }

    /// Parses overrides from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let overrides: PromptOverrides = serde_yaml::from_str(yaml)?;
        Self::with_overrides(overrides)
    }

    /// Loads overrides from a YAML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml(&yaml)
    }

    /// Checks that both templates take an assignment.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, template) in [("reader", &self.reader), ("editor", &self.editor)] {
            if !has_placeholder(template, ASSIGNMENT_VAR) {
                return Err(ConfigError::MissingPlaceholder {
                    template: name.to_string(),
                    placeholder: ASSIGNMENT_VAR.to_string(),
                });
            }
        }
        Ok(())
    }

    /// The fixed assignment for an operation, e.g. `find-bugs`.
    pub fn assignment(&self, operation: &str) -> Option<&str> {
        self.assignments.get(operation).map(String::as_str)
    }

    /// Renders the reader template.
    pub fn render_reader(&self, assignment: &str) -> Result<String, ConfigError> {
        render("reader", &self.reader, assignment, &[])
    }

    /// Renders the editor template, describing the available `builders`.
    pub fn render_editor(
        &self,
        assignment: &str,
        builders: &[&str],
    ) -> Result<String, ConfigError> {
        render("editor", &self.editor, assignment, builders)
    }
}

fn describe_builders(builders: &[&str]) -> String {
    match builders {
        [] => "use the build and test tools of the workspace".to_string(),
        [one] => format!("you have access to a {one} builder"),
        [init @ .., last] => format!(
            "you have access to a {} builder and a {} builder",
            init.join(" builder, a "),
            last
        ),
    }
}

fn render(
    name: &str,
    template: &str,
    assignment: &str,
    builders: &[&str],
) -> Result<String, ConfigError> {
    if !has_placeholder(template, ASSIGNMENT_VAR) {
        return Err(ConfigError::MissingPlaceholder {
            template: name.to_string(),
            placeholder: ASSIGNMENT_VAR.to_string(),
        });
    }

    let builders = describe_builders(builders);
    let vars = BTreeMap::from([
        (ASSIGNMENT_VAR, assignment),
        ("builders", builders.as_str()),
        ("change_log", CHANGE_LOG_PATH),
    ]);
    Ok(substitute(template, &vars).trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitute_known_and_unknown() {
        let vars = BTreeMap::from([("assignment", "fix it"), ("x", "1")]);
        assert_eq!(
            substitute("do: $assignment; cost $5; $missing $x.", &vars),
            "do: fix it; cost $5; $missing 1."
        );
    }

    #[test]
    fn test_substitute_is_single_pass() {
        let vars = BTreeMap::from([("assignment", "mention $builders"), ("builders", "maven")]);
        assert_eq!(substitute("$assignment", &vars), "mention $builders");
    }

    #[test]
    fn test_reader_render_contains_assignment() {
        let prompt = PromptSet::default().render_reader(EXPLAIN).unwrap();
        assert!(prompt.contains(&format!("<assignment>\n{EXPLAIN}\n</assignment>")));
        assert!(prompt.contains("never make changes"));
        assert!(!prompt.contains('$'));
    }

    #[test]
    fn test_editor_render_mentions_builders_and_log() {
        let prompt = PromptSet::default()
            .render_editor(ADD_COMMENTS, &["maven", "go"])
            .unwrap();
        assert!(prompt.contains("you have access to a maven builder and a go builder"));
        assert!(prompt.contains(".toolbox.md"));
        assert!(prompt.contains(ADD_COMMENTS));
        assert!(!prompt.contains("$change_log"));
    }

    #[test]
    fn test_describe_builders() {
        assert_eq!(describe_builders(&["maven"]), "you have access to a maven builder");
        assert_eq!(
            describe_builders(&["maven", "go", "cargo"]),
            "you have access to a maven builder, a go builder and a cargo builder"
        );
        assert!(describe_builders(&[]).contains("workspace"));
    }

    #[test]
    fn test_fixed_assignments() {
        let set = PromptSet::default();
        assert_eq!(set.assignment("explain"), Some(EXPLAIN));
        assert_eq!(set.assignment("find-bugs"), Some(FIND_BUGS));
        assert_eq!(set.assignment("add-comments"), Some(ADD_COMMENTS));
        assert_eq!(set.assignment("refactor"), Some(REFACTOR));
        assert_eq!(set.assignment("bump-deps"), Some(BUMP_DEPS));
        assert_eq!(set.assignment("do"), None);
    }

    #[test]
    fn test_missing_assignment_placeholder() {
        let set = PromptSet {
            reader: "no placeholder, only $assignments".to_string(),
            ..PromptSet::default()
        };
        assert!(matches!(
            set.render_reader("x"),
            Err(ConfigError::MissingPlaceholder { template, .. }) if template == "reader"
        ));
        assert!(set.validate().is_err());
    }

    #[test]
    fn test_yaml_overrides() {
        let yaml = "editor: |\n  Be brief.\n  $assignment\nassignments:\n  refactor: split long functions\n";
        let set = PromptSet::from_yaml(yaml).unwrap();

        assert_eq!(set.reader, READER_TEMPLATE);
        assert_eq!(set.render_editor("go", &[]).unwrap(), "Be brief.\ngo");
        assert_eq!(set.assignment("refactor"), Some("split long functions"));
        assert_eq!(set.assignment("explain"), Some(EXPLAIN));
    }

    #[test]
    fn test_yaml_template_without_placeholder_is_rejected() {
        let err = PromptSet::from_yaml("reader: just read\n").unwrap_err();
        assert!(matches!(err, ConfigError::MissingPlaceholder { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompts.yaml");
        std::fs::write(&path, "assignments:\n  explain: say it in one line\n").unwrap();

        let set = PromptSet::load(&path).unwrap();
        assert_eq!(set.assignment("explain"), Some("say it in one line"));
    }
}
