//! Renders example configuration files from a validated specification.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};

use crate::error::{Result, SpecError};
use crate::spec::{ConfigSpec, OptionKind, SpecLoader, SpecOption, ValueSpec, placeholder};

pub const DESCRIPTION_LINE_LENGTH_LIMIT: usize = 120;

const NESTED_INDENT: &str = "    ";

/// Rendered example per `example_name`: contents and rendering errors.
pub type RenderedFiles = BTreeMap<String, (String, Vec<String>)>;

/// Render every file of a loaded specification.
///
/// Fails when the loader recorded validation errors.
pub fn render(loader: &SpecLoader) -> Result<RenderedFiles> {
    match loader.spec() {
        Some(spec) if loader.errors().is_empty() => Ok(ExampleConsumer::new(spec).render()),
        _ => Err(SpecError::Invalid {
            count: loader.errors().len().max(1),
        }),
    }
}

pub struct ExampleConsumer<'a> {
    spec: &'a ConfigSpec,
}

impl<'a> ExampleConsumer<'a> {
    pub fn new(spec: &'a ConfigSpec) -> Self {
        Self { spec }
    }

    pub fn render(&self) -> RenderedFiles {
        self.spec
            .files
            .iter()
            .map(|file| {
                let mut writer = Writer::default();
                for (i, option) in visible(&file.options).into_iter().enumerate() {
                    if i > 0 {
                        writer.write("\n");
                    }
                    write_option(&mut writer, option, "", false);
                }
                (file.example_name.clone(), (writer.contents, writer.errors))
            })
            .collect()
    }
}

#[derive(Default)]
struct Writer {
    contents: String,
    errors: Vec<String>,
}

impl Writer {
    fn write(&mut self, text: &str) {
        self.contents.push_str(text);
    }
}

/// Options to render, highest display priority first.
fn visible(options: &[SpecOption]) -> Vec<&SpecOption> {
    let mut visible: Vec<_> = options.iter().filter(|option| !option.hidden).collect();
    visible.sort_by(|a, b| b.display_priority.cmp(&a.display_priority));
    visible
}

fn write_option(writer: &mut Writer, option: &SpecOption, indent: &str, start_list: bool) {
    match &option.kind {
        OptionKind::Value(value) => write_value(writer, option, value, indent, start_list),
        OptionKind::Section { multiple, options } => {
            write_description(writer, option, indent, "section");
            writer.write(&format!("{}#\n{}{}:\n", indent, indent, option.name));

            let nested = format!("{}{}", indent, NESTED_INDENT);
            for (i, child) in visible(options).into_iter().enumerate() {
                writer.write("\n");
                if i == 0 && *multiple {
                    if child.is_enabled() {
                        write_option(writer, child, &nested, true);
                    } else {
                        writer.write(&format!("{}  -\n", indent));
                        write_option(writer, child, &nested, false);
                    }
                } else {
                    write_option(writer, child, &nested, false);
                }
            }
        }
        OptionKind::Example(example) => {
            write_description(writer, option, indent, "section");
            writer.write(&format!("{}#\n", indent));
            write_yaml(writer, &option.name, example, indent, true, false);
        }
    }
}

fn write_value(
    writer: &mut Writer,
    option: &SpecOption,
    value: &ValueSpec,
    indent: &str,
    start_list: bool,
) {
    let example = value.example.clone().unwrap_or(Value::Null);

    let mut header = format!(
        "{}## {} - {} - {}",
        indent,
        option.name,
        value.type_label(),
        if option.required { "required" } else { "optional" }
    );
    if !option.required {
        if let Some(default) = default_display(&option.name, &example) {
            header.push_str(" - default: ");
            header.push_str(&default);
        }
    }
    header.push('\n');
    writer.write(&header);

    write_description(writer, option, indent, "option");
    writer.write(&format!("{}#\n", indent));

    let enabled = option.enabled || option.required;
    write_yaml(writer, &option.name, &example, indent, !enabled, start_list);
}

/// The example as shown after `default:`, for scalar examples.
fn default_display(name: &str, example: &Value) -> Option<String> {
    match example {
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Number(number) => Some(number.to_string()),
        Value::String(text) if *text != placeholder(name) => Some(text.clone()),
        _ => None,
    }
}

fn write_description(writer: &mut Writer, option: &SpecOption, indent: &str, kind: &str) {
    let mut description = option.description.clone();

    if !option.deprecation.is_empty() {
        description.push_str("\n\n<<< DEPRECATED >>>\n\n");
        for (key, info) in &option.deprecation {
            let key_part = format!("{}: ", key);
            let pad = " ".repeat(key_part.len());
            description.push_str(&key_part);
            for (i, line) in info.lines().enumerate() {
                if i > 0 {
                    description.push_str(&pad);
                }
                description.push_str(line);
                description.push('\n');
            }
        }
    }

    for line in description.lines() {
        if line.is_empty() {
            writer.write(&format!("{}##\n", indent));
            continue;
        }

        let line = format!("{}## {}", indent, line);
        let length = line.chars().count();
        if length > DESCRIPTION_LINE_LENGTH_LIMIT {
            let extra = length - DESCRIPTION_LINE_LENGTH_LIMIT;
            writer.errors.push(format!(
                "Description line length of {} `{}` was over the limit by {} character{}",
                kind,
                option.name,
                extra,
                if extra > 1 { "s" } else { "" }
            ));
        }
        writer.write(&line);
        writer.write("\n");
    }
}

/// Write `{name: example}` as YAML, commented out or starting a list item.
fn write_yaml(
    writer: &mut Writer,
    name: &str,
    example: &Value,
    indent: &str,
    comment: bool,
    start_list: bool,
) {
    let mut document = Mapping::new();
    document.insert(Value::String(name.to_string()), example.clone());

    let yaml = match serde_yaml::to_string(&document) {
        Ok(yaml) => yaml,
        Err(e) => {
            writer
                .errors
                .push(format!("Unable to render the example of `{}`: {}", name, e));
            return;
        }
    };

    let list_indent = indent.get(..indent.len().saturating_sub(2)).unwrap_or("");
    for (i, line) in yaml.lines().enumerate() {
        let prefix = match (comment, start_list && i == 0) {
            (true, _) => format!("{}# ", indent),
            (false, true) => format!("{}- ", list_indent),
            (false, false) => indent.to_string(),
        };
        writer.write(&prefix);
        writer.write(line);
        writer.write("\n");
    }
}

/// Write rendered files into `dir`, or compare with them when `check` is set.
///
/// Returns one message per problem: rendering errors, and in check mode the
/// files that differ from their rendering.
pub fn write_examples(files: &RenderedFiles, dir: &Path, check: bool) -> Result<Vec<String>> {
    let mut problems = Vec::new();

    for (example_name, (contents, errors)) in files {
        if !errors.is_empty() {
            problems.extend(errors.iter().map(|e| format!("{}: {}", example_name, e)));
            continue;
        }

        let path: PathBuf = dir.join(example_name);
        if check {
            let current = match std::fs::read_to_string(&path) {
                Ok(current) => Some(current),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
                Err(e) => return Err(e.into()),
            };
            if current.as_deref() != Some(contents.as_str()) {
                problems.push(format!("File `{}` is not in sync", path.display()));
            }
        } else {
            std::fs::create_dir_all(dir)?;
            std::fs::write(&path, contents)?;
            tracing::info!(path = %path.display(), "Rendered example");
        }
    }

    Ok(problems)
}
