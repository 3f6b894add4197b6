//! Configuration specifications: loading, template expansion and validation.
//!
//! A specification describes the files of an integration and their options:
//!
//! ```yaml
//! name: clickhouse
//! version: 1.0.0
//! files:
//! - name: clickhouse.yaml
//!   options:
//!   - template: init_config
//!     options:
//!     - template: init_config/default
//!   - template: instances
//!     options:
//!     - name: server
//!       required: true
//!       description: The hostname used to connect to the system.
//!       value:
//!         type: string
//! ```
//!
//! Validation never stops at the first problem; every error is collected on
//! the [`SpecLoader`].

use std::collections::HashMap;
use std::path::Path;

use serde_yaml::{Mapping, Value};

use crate::error::Result;
use crate::templates::TemplateLibrary;

/// Sections completed from the template of the same name.
const COMPLETED_SECTIONS: [&str; 3] = ["init_config", "instances", "logs"];

#[derive(Debug, Clone, PartialEq)]
pub struct ConfigSpec {
    pub name: String,
    pub version: String,
    pub files: Vec<SpecFile>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpecFile {
    pub name: String,
    /// File name of the rendered example.
    pub example_name: String,
    pub options: Vec<SpecOption>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpecOption {
    pub name: String,
    pub description: String,
    pub required: bool,
    pub hidden: bool,
    /// Rendered uncommented.
    pub enabled: bool,
    /// Higher values are rendered first.
    pub display_priority: i64,
    /// Deprecation notes in declaration order.
    pub deprecation: Vec<(String, String)>,
    pub kind: OptionKind,
}

impl SpecOption {
    pub fn is_enabled(&self) -> bool {
        matches!(self.kind, OptionKind::Value(_)) && (self.enabled || self.required)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OptionKind {
    /// A single setting.
    Value(ValueSpec),
    /// A nested group of options; `multiple` sections are lists.
    Section {
        multiple: bool,
        options: Vec<SpecOption>,
    },
    /// A section documented only by an example.
    Example(Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl ValueType {
    const NAMES: &'static str = "array, boolean, integer, number, object, string";

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "string" => Some(Self::String),
            "integer" => Some(Self::Integer),
            "number" => Some(Self::Number),
            "boolean" => Some(Self::Boolean),
            "array" => Some(Self::Array),
            "object" => Some(Self::Object),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }

    fn accepts(&self, example: &Value) -> bool {
        match self {
            Self::String => example.is_string(),
            Self::Integer => example.is_i64() || example.is_u64(),
            Self::Number => example.is_number(),
            Self::Boolean => example.is_bool(),
            Self::Array => example.is_sequence(),
            Self::Object => example.is_mapping(),
        }
    }

    fn expected(&self) -> &'static str {
        match self {
            Self::String => "a string",
            Self::Integer => "an integer",
            Self::Number => "a number",
            Self::Boolean => "true or false",
            Self::Array => "an array",
            Self::Object => "a mapping object",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValueSpec {
    pub value_type: ValueType,
    /// Element description of arrays.
    pub items: Option<Box<ValueSpec>>,
    /// Always set on option values; a placeholder is generated when absent.
    pub example: Option<Value>,
}

impl ValueSpec {
    /// Type as shown in rendered examples.
    pub fn type_label(&self) -> String {
        match self.value_type {
            ValueType::Object => "mapping".to_string(),
            ValueType::Array => match self.items.as_deref().map(|items| items.value_type) {
                Some(ValueType::Object) => "list of mappings".to_string(),
                Some(ValueType::Array) => "list of lists".to_string(),
                Some(item) => format!("list of {}s", item.as_str()),
                None => "list".to_string(),
            },
            other => other.as_str().to_string(),
        }
    }
}

/// Loads one specification and records its errors.
#[derive(Debug)]
pub struct SpecLoader {
    source: String,
    contents: String,
    templates: TemplateLibrary,
    errors: Vec<String>,
    spec: Option<ConfigSpec>,
}

impl SpecLoader {
    pub fn new(contents: impl Into<String>) -> Self {
        Self {
            source: "<spec>".to_string(),
            contents: contents.into(),
            templates: TemplateLibrary::new(),
            errors: Vec::new(),
            spec: None,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(Self::new(contents).with_source(path.display().to_string()))
    }

    /// Name prefixed to error messages.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_templates(mut self, templates: TemplateLibrary) -> Self {
        self.templates = templates;
        self
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Parse and validate, returning every error found.
    pub fn load(&mut self) -> &[String] {
        self.errors.clear();
        self.spec = None;

        match serde_yaml::from_str::<Value>(&self.contents) {
            Ok(document) => {
                let mut validator = Validator {
                    source: &self.source,
                    templates: &self.templates,
                    errors: &mut self.errors,
                };
                self.spec = validator.spec(&document);
            }
            Err(e) => self.errors.push(format!(
                "{}: Unable to parse the configuration specification: {}",
                self.source, e
            )),
        }

        tracing::debug!(source = %self.source, errors = self.errors.len(), "Loaded specification");
        &self.errors
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// The validated specification, once [`load`](Self::load) ran.
    pub fn spec(&self) -> Option<&ConfigSpec> {
        self.spec.as_ref()
    }
}

struct Validator<'a> {
    source: &'a str,
    templates: &'a TemplateLibrary,
    errors: &'a mut Vec<String>,
}

impl Validator<'_> {
    fn error(&mut self, message: String) {
        self.errors.push(message);
    }

    fn spec(&mut self, document: &Value) -> Option<ConfigSpec> {
        let Value::Mapping(spec) = document else {
            self.error(format!(
                "{}: Configuration specifications must be a mapping object",
                self.source
            ));
            return None;
        };

        let name = self.top_level_string(spec, "name");
        let version = self.top_level_string(spec, "version");

        let files = match spec.get("files") {
            None => {
                self.error(format!(
                    "{}: Configuration specifications must contain a top-level `files` attribute",
                    self.source
                ));
                None
            }
            Some(Value::Sequence(files)) => Some(self.files(files)),
            Some(_) => {
                self.error(format!(
                    "{}: The top-level `files` attribute must be an array",
                    self.source
                ));
                None
            }
        };

        Some(ConfigSpec {
            name: name?,
            version: version?,
            files: files?,
        })
    }

    fn top_level_string(&mut self, spec: &Mapping, key: &str) -> Option<String> {
        match spec.get(key) {
            None => {
                self.error(format!(
                    "{}: Configuration specifications must contain a top-level `{}` attribute",
                    self.source, key
                ));
                None
            }
            Some(Value::String(value)) => Some(value.clone()),
            Some(_) => {
                self.error(format!(
                    "{}: The top-level `{}` attribute must be a string",
                    self.source, key
                ));
                None
            }
        }
    }

    fn files(&mut self, files: &[Value]) -> Vec<SpecFile> {
        let mut seen: HashMap<String, usize> = HashMap::new();
        let mut result = Vec::new();

        for (index, file) in files.iter().enumerate() {
            let number = index + 1;
            let Value::Mapping(file) = file else {
                self.error(format!(
                    "{}, file #{}: File attribute must be a mapping object",
                    self.source, number
                ));
                continue;
            };

            let name = match file.get("name") {
                None => {
                    self.error(format!(
                        "{}, file #{}: Every file must contain a `name` attribute",
                        self.source, number
                    ));
                    continue;
                }
                Some(Value::String(name)) => name.clone(),
                Some(_) => {
                    self.error(format!(
                        "{}, file #{}: Attribute `name` must be a string",
                        self.source, number
                    ));
                    continue;
                }
            };

            if let Some(previous) = seen.get(&name) {
                self.error(format!(
                    "{}, file #{}: File name `{}` already used by file #{}",
                    self.source, number, name, previous
                ));
                continue;
            }
            seen.insert(name.clone(), number);

            let example_name = match file.get("example_name") {
                None if name == "auto_conf.yaml" => name.clone(),
                None => "conf.yaml.example".to_string(),
                Some(Value::String(example)) => example.clone(),
                Some(_) => {
                    self.error(format!(
                        "{}, {}: Attribute `example_name` must be a string",
                        self.source, name
                    ));
                    continue;
                }
            };

            let options = match file.get("options") {
                None => {
                    self.error(format!(
                        "{}, {}: Every file must contain an `options` attribute",
                        self.source, name
                    ));
                    continue;
                }
                Some(Value::Sequence(options)) => self.options(&name, &[], options),
                Some(_) => {
                    self.error(format!(
                        "{}, {}: The `options` attribute must be an array",
                        self.source, name
                    ));
                    continue;
                }
            };

            result.push(SpecFile {
                name,
                example_name,
                options,
            });
        }

        result
    }

    /// Replace `template` entries by the options they stand for.
    fn expand_templates(&mut self, prefix: &str, options: &[Value]) -> Vec<Value> {
        let mut pending: Vec<Value> = options.iter().rev().cloned().collect();
        let mut expanded = Vec::new();

        while let Some(option) = pending.pop() {
            let Some(Value::String(name)) = option.get("template") else {
                expanded.push(option);
                continue;
            };
            let name = name.clone();
            let number = expanded.len() + 1;

            let overrides = match option.get("overrides") {
                Some(Value::Mapping(overrides)) => overrides.clone(),
                Some(_) => {
                    self.error(format!(
                        "{}option #{}: Attribute `overrides` must be a mapping object",
                        prefix, number
                    ));
                    continue;
                }
                None => Mapping::new(),
            };

            match self.templates.load_with_overrides(&name, &overrides) {
                Ok(Value::Mapping(mut template)) => {
                    if let Value::Mapping(local) = &option {
                        for (key, value) in local {
                            if key.as_str() != Some("template") && key.as_str() != Some("overrides")
                            {
                                template.insert(key.clone(), value.clone());
                            }
                        }
                    }
                    expanded.push(Value::Mapping(template));
                }
                Ok(Value::Sequence(template)) => {
                    pending.extend(template.into_iter().rev());
                }
                Ok(_) => {}
                Err(e) => self.error(format!("{}option #{}: {}", prefix, number, e)),
            }
        }

        expanded
    }

    /// Fill the description and shape of the top-level sections.
    fn complete_section(&mut self, prefix: &str, option: &mut Mapping) {
        let Some(name) = option.get("name").and_then(Value::as_str).map(str::to_string) else {
            return;
        };
        if !COMPLETED_SECTIONS.contains(&name.as_str()) {
            return;
        }

        match self.templates.load(&name) {
            Ok(Value::Mapping(template)) => {
                for (key, value) in template {
                    if !option.contains_key(&key) {
                        option.insert(key, value);
                    }
                }
            }
            Ok(_) => {}
            Err(e) => self.error(format!("{}{}: {}", prefix, name, e)),
        }
    }

    fn options(&mut self, file: &str, sections: &[String], options: &[Value]) -> Vec<SpecOption> {
        let prefix = format!(
            "{}, {}, {}",
            self.source,
            file,
            sections
                .iter()
                .map(|section| format!("{}, ", section))
                .collect::<String>()
        );

        let mut seen: HashMap<String, usize> = HashMap::new();
        let mut result = Vec::new();

        for (index, option) in self.expand_templates(&prefix, options).into_iter().enumerate() {
            let number = index + 1;
            let Value::Mapping(mut option) = option else {
                self.error(format!(
                    "{}option #{}: Option attribute must be a mapping object",
                    prefix, number
                ));
                continue;
            };

            if sections.is_empty() {
                self.complete_section(&prefix, &mut option);
            }

            let name = match option.get("name") {
                None => {
                    self.error(format!(
                        "{}option #{}: Every option must contain a `name` attribute",
                        prefix, number
                    ));
                    continue;
                }
                Some(Value::String(name)) => name.clone(),
                Some(_) => {
                    self.error(format!(
                        "{}option #{}: Attribute `name` must be a string",
                        prefix, number
                    ));
                    continue;
                }
            };

            if let Some(previous) = seen.get(&name) {
                self.error(format!(
                    "{}option #{}: Option name `{}` already used by option #{}",
                    prefix, number, name, previous
                ));
                continue;
            }
            seen.insert(name.clone(), number);

            if let Some(option) = self.option(file, sections, &prefix, name, &option) {
                result.push(option);
            }
        }

        result
    }

    fn flag(&mut self, prefix: &str, name: &str, option: &Mapping, key: &str) -> bool {
        match option.get(key) {
            None => false,
            Some(Value::Bool(flag)) => *flag,
            Some(_) => {
                self.error(format!(
                    "{}{}: Attribute `{}` must be true or false",
                    prefix, name, key
                ));
                false
            }
        }
    }

    fn option(
        &mut self,
        file: &str,
        sections: &[String],
        prefix: &str,
        name: String,
        option: &Mapping,
    ) -> Option<SpecOption> {
        let description = match option.get("description") {
            None => {
                self.error(format!(
                    "{}{}: Every option must contain a `description` attribute",
                    prefix, name
                ));
                None
            }
            Some(Value::String(description)) => Some(description.clone()),
            Some(_) => {
                self.error(format!(
                    "{}{}: Attribute `description` must be a string",
                    prefix, name
                ));
                None
            }
        };

        let required = self.flag(prefix, &name, option, "required");
        let hidden = self.flag(prefix, &name, option, "hidden");
        let enabled = self.flag(prefix, &name, option, "enabled");

        let display_priority = match option.get("display_priority") {
            None => 0,
            Some(value) => value.as_i64().unwrap_or_else(|| {
                self.error(format!(
                    "{}{}: Attribute `display_priority` must be an integer",
                    prefix, name
                ));
                0
            }),
        };

        let deprecation = self.deprecation(prefix, &name, option.get("deprecation"));

        let kind = match (option.get("value"), option.get("options")) {
            (Some(_), Some(_)) => {
                self.error(format!(
                    "{}{}: An option cannot contain both `value` and `options` attributes",
                    prefix, name
                ));
                None
            }
            (Some(value), None) => self.value(prefix, &name, value, true).map(OptionKind::Value),
            (None, Some(Value::Sequence(nested))) => {
                let multiple = self.flag(prefix, &name, option, "multiple");
                let mut nested_sections = sections.to_vec();
                nested_sections.push(name.clone());
                Some(OptionKind::Section {
                    multiple,
                    options: self.options(file, &nested_sections, nested),
                })
            }
            (None, Some(_)) => {
                self.error(format!(
                    "{}{}: The `options` attribute must be an array",
                    prefix, name
                ));
                None
            }
            (None, None) => match option.get("example") {
                Some(example) => Some(OptionKind::Example(example.clone())),
                None => {
                    self.error(format!(
                        "{}{}: Every option must contain a `value`, `options` or `example` attribute",
                        prefix, name
                    ));
                    None
                }
            },
        };

        Some(SpecOption {
            name,
            description: description?,
            required,
            hidden,
            enabled,
            display_priority,
            deprecation,
            kind: kind?,
        })
    }

    fn deprecation(
        &mut self,
        prefix: &str,
        name: &str,
        deprecation: Option<&Value>,
    ) -> Vec<(String, String)> {
        let Some(deprecation) = deprecation else {
            return Vec::new();
        };
        let Value::Mapping(deprecation) = deprecation else {
            self.error(format!(
                "{}{}: Attribute `deprecation` must be a mapping object",
                prefix, name
            ));
            return Vec::new();
        };

        let mut notes = Vec::new();
        for (key, info) in deprecation {
            match (key.as_str(), info.as_str()) {
                (Some(key), Some(info)) => notes.push((key.to_string(), info.to_string())),
                (key, _) => self.error(format!(
                    "{}{}: Key `{}` for attribute `deprecation` must be a string",
                    prefix,
                    name,
                    key.unwrap_or("?")
                )),
            }
        }
        notes
    }

    fn value(&mut self, prefix: &str, name: &str, value: &Value, top: bool) -> Option<ValueSpec> {
        let Value::Mapping(value) = value else {
            self.error(format!(
                "{}{}: Attribute `value` must be a mapping object",
                prefix, name
            ));
            return None;
        };

        let value_type = match value.get("type") {
            None => {
                self.error(format!(
                    "{}{}: Every value must contain a `type` attribute",
                    prefix, name
                ));
                return None;
            }
            Some(Value::String(value_type)) => match ValueType::from_name(value_type) {
                Some(value_type) => value_type,
                None => {
                    self.error(format!(
                        "{}{}: Unknown type `{}`, valid types are {}",
                        prefix,
                        name,
                        value_type,
                        ValueType::NAMES
                    ));
                    return None;
                }
            },
            Some(_) => {
                self.error(format!(
                    "{}{}: Attribute `type` must be a string",
                    prefix, name
                ));
                return None;
            }
        };

        let items = if value_type == ValueType::Array {
            match value.get("items") {
                None => {
                    self.error(format!(
                        "{}{}: Every array must contain an `items` attribute",
                        prefix, name
                    ));
                    return None;
                }
                Some(items) => Some(Box::new(self.value(prefix, name, items, false)?)),
            }
        } else {
            None
        };

        let example = match value.get("example") {
            Some(example) if !value_type.accepts(example) => {
                self.error(format!(
                    "{}{}: Attribute `example` for `type` {} must be {}",
                    prefix,
                    name,
                    value_type.as_str(),
                    value_type.expected()
                ));
                return None;
            }
            Some(example) => Some(example.clone()),
            None if !top => None,
            None => match value_type {
                ValueType::Array => Some(Value::Sequence(Vec::new())),
                ValueType::Object => Some(Value::Mapping(Mapping::new())),
                ValueType::Boolean => {
                    self.error(format!(
                        "{}{}: Every boolean must contain a default `example` attribute",
                        prefix, name
                    ));
                    return None;
                }
                _ => Some(Value::String(placeholder(name))),
            },
        };

        Some(ValueSpec {
            value_type,
            items,
            example,
        })
    }
}

/// `<NAME>` stand-in for options without an example.
pub fn placeholder(name: &str) -> String {
    format!("<{}>", name.to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(yaml: &str) -> SpecLoader {
        let mut loader = SpecLoader::new(yaml);
        loader.load();
        loader
    }

    #[test]
    fn test_top_level_errors() {
        let loader = load("foo:\n- bar\n");
        assert_eq!(
            loader.errors(),
            [
                "<spec>: Configuration specifications must contain a top-level `name` attribute",
                "<spec>: Configuration specifications must contain a top-level `version` attribute",
                "<spec>: Configuration specifications must contain a top-level `files` attribute",
            ]
        );
        assert!(loader.spec().is_none());

        let loader = load("- just a list");
        assert_eq!(
            loader.errors(),
            ["<spec>: Configuration specifications must be a mapping object"]
        );
    }

    #[test]
    fn test_defaults() {
        let loader = load(
            r#"
name: foo
version: 0.0.0
files:
- name: foo.yaml
  options:
  - name: bar
    description: words
    value:
      type: string
"#,
        );
        assert!(loader.errors().is_empty(), "{:?}", loader.errors());

        let spec = loader.spec().unwrap();
        let file = &spec.files[0];
        assert_eq!(file.example_name, "conf.yaml.example");

        let option = &file.options[0];
        assert!(!option.required && !option.hidden && !option.enabled);
        assert_eq!(option.display_priority, 0);
        assert!(option.deprecation.is_empty());
        match &option.kind {
            OptionKind::Value(value) => {
                assert_eq!(value.example.as_ref().and_then(Value::as_str), Some("<BAR>"));
            }
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn test_auto_conf_example_name() {
        let loader = load(
            "name: foo\nversion: 0.0.0\nfiles:\n- name: auto_conf.yaml\n  options:\n  - template: init_config\n    options: []\n",
        );
        assert!(loader.errors().is_empty(), "{:?}", loader.errors());
        assert_eq!(loader.spec().unwrap().files[0].example_name, "auto_conf.yaml");
    }

    #[test]
    fn test_errors_are_collected() {
        let loader = load(
            r#"
name: foo
version: 0.0.0
files:
- name: foo.yaml
  options:
  - name: a
    value:
      type: string
  - name: a
    description: again
    value:
      type: string
  - name: b
    description: list
    value:
      type: array
  - name: c
    description: bad example
    value:
      type: integer
      example: lots
  - name: d
    description: nothing
  - template: does/not/exist
- name: foo.yaml
  options: []
"#,
        );

        let errors = loader.errors();
        assert_eq!(errors.len(), 7, "{:#?}", errors);
        assert!(errors.contains(
            &"<spec>, foo.yaml, a: Every option must contain a `description` attribute".to_string()
        ));
        assert!(errors.contains(
            &"<spec>, foo.yaml, option #2: Option name `a` already used by option #1".to_string()
        ));
        assert!(errors.contains(
            &"<spec>, foo.yaml, b: Every array must contain an `items` attribute".to_string()
        ));
        assert!(errors.contains(
            &"<spec>, foo.yaml, c: Attribute `example` for `type` integer must be an integer"
                .to_string()
        ));
        assert!(errors.contains(
            &"<spec>, foo.yaml, d: Every option must contain a `value`, `options` or `example` attribute"
                .to_string()
        ));
        assert!(errors.contains(
            &"<spec>, foo.yaml, option #6: Template `does/not/exist` does not exist".to_string()
        ));
        assert!(errors.contains(
            &"<spec>, file #2: File name `foo.yaml` already used by file #1".to_string()
        ));
    }

    #[test]
    fn test_nested_section_prefix() {
        let loader = load(
            r#"
name: foo
version: 0.0.0
files:
- name: foo.yaml
  options:
  - template: instances
    options:
    - name: bar
      description: words
      value:
        type: unknown
"#,
        );
        assert_eq!(
            loader.errors(),
            ["<spec>, foo.yaml, instances, bar: Unknown type `unknown`, valid types are array, boolean, integer, number, object, string"]
        );
    }

    #[test]
    fn test_list_template_expansion() {
        let loader = load(
            r#"
name: foo
version: 0.0.0
files:
- name: foo.yaml
  options:
  - template: instances
    options:
    - template: instances/default
      overrides:
        min_collection_interval.value.example: 60
"#,
        );
        assert!(loader.errors().is_empty(), "{:?}", loader.errors());

        let section = &loader.spec().unwrap().files[0].options[0];
        let OptionKind::Section { multiple, options } = &section.kind else {
            panic!("instances is not a section");
        };
        assert!(*multiple);
        let names: Vec<_> = options.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, ["tags", "service", "min_collection_interval"]);
    }

    #[test]
    fn test_type_labels() {
        let value = |value_type, items: Option<ValueType>| ValueSpec {
            value_type,
            items: items.map(|t| {
                Box::new(ValueSpec {
                    value_type: t,
                    items: None,
                    example: None,
                })
            }),
            example: None,
        };
        assert_eq!(value(ValueType::Object, None).type_label(), "mapping");
        assert_eq!(
            value(ValueType::Array, Some(ValueType::String)).type_label(),
            "list of strings"
        );
        assert_eq!(
            value(ValueType::Array, Some(ValueType::Object)).type_label(),
            "list of mappings"
        );
        assert_eq!(
            value(ValueType::Array, Some(ValueType::Array)).type_label(),
            "list of lists"
        );
        assert_eq!(value(ValueType::Boolean, None).type_label(), "boolean");
    }
}
