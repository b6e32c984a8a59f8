// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Config-spec model: the typed UI fields a module exposes, and the
//! namespacing rules for option keys.

use crate::error::ModuleError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A build/config payload branch: fully-qualified option name → value.
pub type ConfigMap = serde_json::Map<String, Value>;

/// Caller-supplied submodule choices: fully-qualified slot name → module names.
pub type SelectionMap = BTreeMap<String, Vec<String>>;

/// UI value shape of a config option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UiType {
    String,
    StringList,
    StringStringDict,
    StringIntPairDict,
    StringDictStringStringDict,
}

impl UiType {
    /// Validate that `value` has this shape.
    pub fn validate(&self, option: &str, value: &Value) -> Result<(), ModuleError> {
        let ok = match self {
            UiType::String => value.is_string(),
            UiType::StringList => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_string)),
            UiType::StringStringDict => value
                .as_object()
                .is_some_and(|map| map.values().all(Value::is_string)),
            UiType::StringIntPairDict => value
                .as_object()
                .is_some_and(|map| map.values().all(Value::is_i64)),
            UiType::StringDictStringStringDict => value.as_object().is_some_and(|map| {
                map.values().all(|inner| {
                    inner
                        .as_object()
                        .is_some_and(|m| m.values().all(Value::is_string))
                })
            }),
        };

        if ok {
            Ok(())
        } else {
            Err(ModuleError::InvalidOption {
                option: option.to_string(),
                reason: format!("expected {self:?}"),
            })
        }
    }
}

ct_core::simple_display! {
    UiType {
        String => "String",
        StringList => "StringList",
        StringStringDict => "StringStringDict",
        StringIntPairDict => "StringIntPairDict",
        StringDictStringStringDict => "StringDictStringStringDict",
    }
}

/// One typed UI field exposed by a module's build or config spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigSpecElement {
    /// Fully-qualified once emitted through spec collection; bare option
    /// name as declared by the module builder.
    pub name: String,
    pub ui_type: UiType,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(default)]
    pub is_optional: bool,
}

impl ConfigSpecElement {
    pub fn required(name: impl Into<String>, ui_type: UiType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ui_type,
            description: description.into(),
            default_value: None,
            is_optional: false,
        }
    }

    pub fn optional(name: impl Into<String>, ui_type: UiType, description: impl Into<String>) -> Self {
        Self { is_optional: true, ..Self::required(name, ui_type, description) }
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    /// Re-key a bare element under the caller path of its owning module.
    pub fn qualified(mut self, prefix: &str, module_name: &str) -> Self {
        self.name = option_name(prefix, module_name, &self.name);
        self
    }
}

/// Fully-qualified slot name: `{submodule_type}.{prefix}.{variable}`,
/// omitting the prefix segment when empty.
pub fn slot_fq_name(submodule_type: &str, prefix: &str, variable: &str) -> String {
    if prefix.is_empty() {
        format!("{submodule_type}.{variable}")
    } else {
        format!("{submodule_type}.{prefix}.{variable}")
    }
}

/// The prefix a child module composes under: `{prefix}.{variable}`.
pub fn child_prefix(prefix: &str, variable: &str) -> String {
    if prefix.is_empty() {
        variable.to_string()
    } else {
        format!("{prefix}.{variable}")
    }
}

/// Fully-qualified option key: `{prefix}.{module_name}.{option}`.
pub fn option_name(prefix: &str, module_name: &str, option: &str) -> String {
    if prefix.is_empty() {
        format!("{module_name}.{option}")
    } else {
        format!("{prefix}.{module_name}.{option}")
    }
}

/// Validate a config branch against a collected spec.
///
/// Every required element without a declared default must be present;
/// every present element must match its UI type. The whole branch fails on
/// the first offending key, leaving the caller's state untouched.
pub fn validate_config(spec: &[ConfigSpecElement], config: &ConfigMap) -> Result<(), ModuleError> {
    for element in spec {
        match config.get(&element.name) {
            Some(value) => element.ui_type.validate(&element.name, value)?,
            None => {
                if !element.is_optional && element.default_value.is_none() {
                    return Err(ModuleError::MissingOption(element.name.clone()));
                }
            }
        }
    }
    Ok(())
}

/// View of one module's options inside a shared config branch.
///
/// Modules read their own options through this so the namespacing rule
/// lives in one place.
pub struct OptionReader<'a> {
    config: &'a ConfigMap,
    prefix: &'a str,
    module_name: &'a str,
}

impl<'a> OptionReader<'a> {
    pub fn new(config: &'a ConfigMap, prefix: &'a str, module_name: &'a str) -> Self {
        Self { config, prefix, module_name }
    }

    fn key(&self, option: &str) -> String {
        option_name(self.prefix, self.module_name, option)
    }

    pub fn get(&self, option: &str) -> Option<&'a Value> {
        self.config.get(&self.key(option))
    }

    pub fn str(&self, option: &str) -> Result<Option<&'a str>, ModuleError> {
        match self.get(option) {
            None => Ok(None),
            Some(value) => value.as_str().map(Some).ok_or_else(|| ModuleError::InvalidOption {
                option: self.key(option),
                reason: "expected String".to_string(),
            }),
        }
    }

    pub fn str_or(&self, option: &str, default: &'a str) -> Result<&'a str, ModuleError> {
        Ok(self.str(option)?.unwrap_or(default))
    }

    pub fn require_str(&self, option: &str) -> Result<&'a str, ModuleError> {
        self.str(option)?
            .ok_or_else(|| ModuleError::MissingOption(self.key(option)))
    }

    pub fn str_list(&self, option: &str) -> Result<Vec<String>, ModuleError> {
        let Some(value) = self.get(option) else {
            return Ok(Vec::new());
        };
        UiType::StringList.validate(&self.key(option), value)?;
        Ok(value
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default())
    }

    pub fn str_dict(&self, option: &str) -> Result<BTreeMap<String, String>, ModuleError> {
        let Some(value) = self.get(option) else {
            return Ok(BTreeMap::new());
        };
        UiType::StringStringDict.validate(&self.key(option), value)?;
        Ok(value
            .as_object()
            .map(|map| {
                map.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default())
    }

    pub fn int_dict(&self, option: &str) -> Result<BTreeMap<String, i64>, ModuleError> {
        let Some(value) = self.get(option) else {
            return Ok(BTreeMap::new());
        };
        UiType::StringIntPairDict.validate(&self.key(option), value)?;
        Ok(value
            .as_object()
            .map(|map| {
                map.iter()
                    .filter_map(|(k, v)| v.as_i64().map(|i| (k.clone(), i)))
                    .collect()
            })
            .unwrap_or_default())
    }

    pub fn require_int_dict(&self, option: &str) -> Result<BTreeMap<String, i64>, ModuleError> {
        if self.get(option).is_none() {
            return Err(ModuleError::MissingOption(self.key(option)));
        }
        self.int_dict(option)
    }
}

#[cfg(test)]
#[path = "spec_tests.rs"]
mod tests;
