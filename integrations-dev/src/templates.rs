//! Reusable option templates.
//!
//! A template is a YAML file holding either one option mapping or a list of
//! options. Names are paths without the extension (`instances/global`).
//! Directories added with [`TemplateLibrary::with_directory`] are searched
//! before the built-in templates.

use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};

use crate::error::{Result, SpecError};

const BUILTIN: &[(&str, &str)] = &[
    ("init_config", include_str!("../templates/init_config.yaml")),
    ("init_config/default", include_str!("../templates/init_config/default.yaml")),
    ("init_config/global", include_str!("../templates/init_config/global.yaml")),
    ("instances", include_str!("../templates/instances.yaml")),
    ("instances/default", include_str!("../templates/instances/default.yaml")),
    ("instances/global", include_str!("../templates/instances/global.yaml")),
    ("instances/service", include_str!("../templates/instances/service.yaml")),
    ("instances/tags", include_str!("../templates/instances/tags.yaml")),
    ("logs", include_str!("../templates/logs.yaml")),
];

const MAX_NESTING: usize = 8;

#[derive(Debug, Clone, Default)]
pub struct TemplateLibrary {
    directories: Vec<PathBuf>,
}

impl TemplateLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Search `dir` before the built-in templates.
    pub fn with_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.directories.push(dir.into());
        self
    }

    /// Names of the built-in templates.
    pub fn builtin_names() -> impl Iterator<Item = &'static str> {
        BUILTIN.iter().map(|(name, _)| *name)
    }

    fn source(&self, name: &str) -> Result<String> {
        for dir in &self.directories {
            let path = template_path(dir, name);
            if path.is_file() {
                tracing::debug!(template = %name, path = %path.display(), "Loading template");
                return Ok(std::fs::read_to_string(path)?);
            }
        }

        BUILTIN
            .iter()
            .find(|(builtin, _)| *builtin == name)
            .map(|(_, contents)| contents.to_string())
            .ok_or_else(|| SpecError::UnknownTemplate(name.to_string()))
    }

    /// Load a template as an option mapping or a sequence of options.
    ///
    /// Templates referenced by the items of a list template are inlined.
    pub fn load(&self, name: &str) -> Result<Value> {
        self.load_nested(name, 0)
    }

    fn load_nested(&self, name: &str, depth: usize) -> Result<Value> {
        if depth > MAX_NESTING {
            return Err(SpecError::TemplateParse {
                name: name.to_string(),
                message: "templates are nested too deeply".to_string(),
            });
        }

        let contents = self.source(name)?;
        let template: Value =
            serde_yaml::from_str(&contents).map_err(|e| SpecError::TemplateParse {
                name: name.to_string(),
                message: e.to_string(),
            })?;

        match template {
            Value::Mapping(_) => Ok(template),
            Value::Sequence(items) => {
                let mut options = Vec::with_capacity(items.len());
                for item in items {
                    match item.get("template").and_then(Value::as_str) {
                        Some(nested) => match self.load_nested(nested, depth + 1)? {
                            Value::Sequence(nested) => options.extend(nested),
                            other => options.push(other),
                        },
                        None => options.push(item),
                    }
                }
                Ok(Value::Sequence(options))
            }
            _ => Err(SpecError::TemplateParse {
                name: name.to_string(),
                message: "a template must be an option or a list of options".to_string(),
            }),
        }
    }

    /// Load a template and apply dotted-path `overrides`.
    ///
    /// In a list template the first path segment names the option.
    pub fn load_with_overrides(&self, name: &str, overrides: &Mapping) -> Result<Value> {
        let mut template = self.load(name)?;
        for (path, value) in overrides {
            let path = match path {
                Value::String(path) => path.as_str(),
                other => {
                    return Err(SpecError::Override {
                        path: format!("{:?}", other),
                        segment: String::new(),
                    });
                }
            };
            apply_override(&mut template, path, value.clone())?;
        }
        Ok(template)
    }
}

fn template_path(dir: &Path, name: &str) -> PathBuf {
    let mut path = dir.to_path_buf();
    path.extend(name.split('/'));
    path.set_extension("yaml");
    path
}

fn apply_override(template: &mut Value, path: &str, value: Value) -> Result<()> {
    let missing = |segment: &str| SpecError::Override {
        path: path.to_string(),
        segment: segment.to_string(),
    };

    let mut segments: Vec<&str> = path.split('.').collect();
    let Some(last) = segments.pop() else {
        return Err(missing(path));
    };

    let mut target = template;
    let mut rest = segments.as_slice();

    if let Value::Sequence(options) = target {
        let Some((first, tail)) = rest.split_first() else {
            return Err(missing(last));
        };
        target = options
            .iter_mut()
            .find(|option| option.get("name").and_then(Value::as_str) == Some(*first))
            .ok_or_else(|| missing(*first))?;
        rest = tail;
    }

    for segment in rest {
        target = match target {
            Value::Mapping(map) => map.get_mut(*segment).ok_or_else(|| missing(*segment))?,
            _ => return Err(missing(*segment)),
        };
    }

    match target {
        Value::Mapping(map) => {
            map.insert(Value::String(last.to_string()), value);
            Ok(())
        }
        _ => Err(missing(last)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overrides(yaml: &str) -> Mapping {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_builtin_templates_parse() {
        let library = TemplateLibrary::new();
        for name in TemplateLibrary::builtin_names() {
            library.load(name).unwrap();
        }
    }

    #[test]
    fn test_unknown_template() {
        let err = TemplateLibrary::new().load("instances/nope").unwrap_err();
        assert_eq!(err.to_string(), "Template `instances/nope` does not exist");
    }

    #[test]
    fn test_override_mapping() {
        let template = TemplateLibrary::new()
            .load_with_overrides("instances/global", &overrides("value.example: 60"))
            .unwrap();
        assert_eq!(template["value"]["example"].as_i64(), Some(60));
    }

    #[test]
    fn test_override_list() {
        let template = TemplateLibrary::new()
            .load_with_overrides(
                "init_config/global",
                &overrides("service.description: Service tag."),
            )
            .unwrap();
        assert_eq!(template[0]["description"].as_str(), Some("Service tag."));

        let err = TemplateLibrary::new()
            .load_with_overrides("init_config/global", &overrides("nope.description: x"))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Template override `nope.description` has no named mapping `nope`"
        );
    }

    #[test]
    fn test_directory_takes_precedence() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("instances")).unwrap();
        std::fs::write(
            dir.path().join("instances").join("global.yaml"),
            "name: custom\ndescription: Custom.\nvalue:\n  type: string\n",
        )
        .unwrap();

        let library = TemplateLibrary::new().with_directory(dir.path());
        let template = library.load("instances/global").unwrap();
        assert_eq!(template["name"].as_str(), Some("custom"));
        // Built-ins remain reachable.
        assert!(library.load("instances/tags").is_ok());
    }

    #[test]
    fn test_nested_list_templates_are_inlined() {
        let template = TemplateLibrary::new().load("instances/default").unwrap();
        let names: Vec<_> = template
            .as_sequence()
            .unwrap()
            .iter()
            .filter_map(|option| option["name"].as_str())
            .collect();
        assert_eq!(names, ["tags", "service", "min_collection_interval"]);
    }
}
