//! Structured command line as reported by the build tool.
//!
//! A command line is split into labelled sections. A section is either a raw
//! chunk list (executable name, residue) or a list of parsed options.

use serde::{Deserialize, Serialize};

/// The full structured command line of one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandLine {
    /// Which form of the command line this is (e.g. "original", "canonical").
    pub command_line_label: String,

    pub sections: Vec<CommandLineSection>,
}

impl CommandLine {
    /// Iterate every option across all option-list sections, in order.
    pub fn options(&self) -> impl Iterator<Item = &CommandLineOption> {
        self.sections
            .iter()
            .filter_map(|s| s.option_list())
            .flat_map(|list| list.option.iter())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandLineSection {
    pub section_label: String,

    pub section_type: Option<SectionType>,
}

impl CommandLineSection {
    pub fn option_list(&self) -> Option<&OptionList> {
        match &self.section_type {
            Some(SectionType::OptionList(list)) => Some(list),
            _ => None,
        }
    }

    pub fn option_list_mut(&mut self) -> Option<&mut OptionList> {
        match &mut self.section_type {
            Some(SectionType::OptionList(list)) => Some(list),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionType {
    ChunkList(ChunkList),
    OptionList(OptionList),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkList {
    pub chunk: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptionList {
    pub option: Vec<CommandLineOption>,
}

/// A single parsed command-line option.
///
/// For environment-carrying options (`--client_env`, `--action_env`, ...)
/// `option_value` has the shape `NAME=value`, and `combined_form` embeds the
/// same text (`--client_env=NAME=value`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandLineOption {
    /// The option exactly as it appeared, e.g. `--client_env=SHELL=/bin/bash`
    pub combined_form: String,

    /// Option name without leading dashes, e.g. `client_env`
    pub option_name: String,

    /// Option value, e.g. `SHELL=/bin/bash`
    pub option_value: String,
}

impl CommandLineOption {
    /// Build an option in its canonical `--name=value` combined form.
    pub fn new(option_name: impl Into<String>, option_value: impl Into<String>) -> Self {
        let option_name = option_name.into();
        let option_value = option_value.into();
        CommandLineOption {
            combined_form: format!("--{}={}", option_name, option_value),
            option_name,
            option_value,
        }
    }
}

impl CommandLine {
    /// A command line holding one option-list section.
    pub fn with_options(label: impl Into<String>, options: Vec<CommandLineOption>) -> Self {
        CommandLine {
            command_line_label: label.into(),
            sections: vec![CommandLineSection {
                section_label: "command options".to_string(),
                section_type: Some(SectionType::OptionList(OptionList { option: options })),
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_combined_form() {
        let opt = CommandLineOption::new("client_env", "SHELL=/bin/bash");
        assert_eq!(opt.combined_form, "--client_env=SHELL=/bin/bash");
        assert_eq!(opt.option_name, "client_env");
        assert_eq!(opt.option_value, "SHELL=/bin/bash");
    }

    #[test]
    fn test_options_skips_chunk_sections() {
        let mut cmd = CommandLine::with_options(
            "canonical",
            vec![
                CommandLineOption::new("client_env", "A=1"),
                CommandLineOption::new("jobs", "8"),
            ],
        );
        cmd.sections.insert(
            0,
            CommandLineSection {
                section_label: "executable".to_string(),
                section_type: Some(SectionType::ChunkList(ChunkList {
                    chunk: vec!["bazel".to_string()],
                })),
            },
        );

        let names: Vec<&str> = cmd.options().map(|o| o.option_name.as_str()).collect();
        assert_eq!(names, vec!["client_env", "jobs"]);
        assert!(cmd.sections[0].option_list().is_none());
    }

    #[test]
    fn test_section_type_wire_shape() {
        let json = r#"{"section_label":"x","section_type":{"option_list":{"option":[{"option_name":"jobs","option_value":"4"}]}}}"#;
        let section: CommandLineSection = serde_json::from_str(json).expect("deserialize");
        let list = section.option_list().expect("option list");
        assert_eq!(list.option[0].option_value, "4");
        assert_eq!(list.option[0].combined_form, "");
    }
}
