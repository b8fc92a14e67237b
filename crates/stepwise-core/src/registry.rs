//! Variable and source registries.

use std::collections::{BTreeMap, HashSet};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::enums::VariableKind;
use crate::error::{CoreError, Result};
use crate::idgen::{prefixes, unique_id};
use crate::reference::ResolvedText;
use crate::source::{Source, SourceNickname};
use crate::variable::{Variable, VariableValue};

// ---------------------------------------------------------------------------
// Variables
// ---------------------------------------------------------------------------

/// Variables of one agent in creation order.
///
/// Names are unique. Ids of removed variables are remembered so the registry
/// never hands them out again.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Variable>", into = "Vec<Variable>")]
pub struct VariableRegistry {
    variables: Vec<Variable>,
    retired: HashSet<String>,
}

impl TryFrom<Vec<Variable>> for VariableRegistry {
    type Error = CoreError;

    /// Rebuilds a registry from stored variables, rejecting repeated ids and
    /// names.
    fn try_from(variables: Vec<Variable>) -> Result<Self> {
        let mut registry = Self::new();
        for variable in variables {
            registry.insert(variable)?;
        }
        Ok(registry)
    }
}

impl From<VariableRegistry> for Vec<Variable> {
    fn from(registry: VariableRegistry) -> Self {
        registry.variables
    }
}

impl VariableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn is_taken(&self, id: &str) -> bool {
        self.retired.contains(id) || self.variables.iter().any(|v| v.id == id)
    }

    /// Creates a variable with a fresh id and the kind's empty value.
    pub fn add_variable(&mut self, name: &str, kind: VariableKind) -> Result<&Variable> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CoreError::VariableNameRequired);
        }
        if self.by_name(name).is_some() {
            return Err(CoreError::DuplicateVariableName(name.to_owned()));
        }
        let id = unique_id(prefixes::VARIABLE, name, |c| self.is_taken(c))?;
        self.variables.push(Variable::new(id, name, kind));
        Ok(&self.variables[self.variables.len() - 1])
    }

    /// Inserts an already built variable, keeping its id.
    pub fn insert(&mut self, variable: Variable) -> Result<&Variable> {
        if self.is_taken(&variable.id) {
            return Err(CoreError::DuplicateVariableId(variable.id));
        }
        if self.by_name(&variable.name).is_some() {
            return Err(CoreError::DuplicateVariableName(variable.name));
        }
        self.variables.push(variable);
        Ok(&self.variables[self.variables.len() - 1])
    }

    /// Removes a variable; its id is retired.
    pub fn remove_variable(&mut self, id: &str) -> Result<Variable> {
        let idx = self
            .position(id)
            .ok_or_else(|| CoreError::VariableNotFound(id.to_owned()))?;
        let variable = self.variables.remove(idx);
        self.retired.insert(variable.id.clone());
        Ok(variable)
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.variables.iter().position(|v| v.id == id)
    }

    pub fn get(&self, id: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    pub fn by_name(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// Looks up by id first, then by name.
    pub fn find(&self, id_or_name: &str) -> Option<&Variable> {
        self.get(id_or_name).or_else(|| self.by_name(id_or_name))
    }

    pub fn set_value(&mut self, id: &str, value: VariableValue) -> Result<&Variable> {
        let idx = self
            .position(id)
            .ok_or_else(|| CoreError::VariableNotFound(id.to_owned()))?;
        let variable = &mut self.variables[idx];
        variable.value = Some(value);
        variable.updated_at = Utc::now();
        Ok(variable)
    }

    pub fn rename(&mut self, id: &str, new_name: &str) -> Result<&Variable> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(CoreError::VariableNameRequired);
        }
        let idx = self
            .position(id)
            .ok_or_else(|| CoreError::VariableNotFound(id.to_owned()))?;
        if let Some(other) = self.by_name(new_name) {
            if other.id != id {
                return Err(CoreError::DuplicateVariableName(new_name.to_owned()));
            }
        }
        let variable = &mut self.variables[idx];
        variable.name = new_name.to_owned();
        variable.updated_at = Utc::now();
        Ok(variable)
    }

    /// Sets `agent_id` on every variable.
    pub fn assign_agent(&mut self, agent_id: &str) {
        for v in &mut self.variables {
            v.agent_id = agent_id.to_owned();
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.variables.iter()
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

impl<'a> IntoIterator for &'a VariableRegistry {
    type Item = &'a Variable;
    type IntoIter = std::slice::Iter<'a, Variable>;

    fn into_iter(self) -> Self::IntoIter {
        self.variables.iter()
    }
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// A source reference found in resolved text, paired with its registry entry.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceBinding<'a> {
    pub token: &'a str,
    pub source: Option<&'a Source>,
}

/// Sources keyed by name, plus display nicknames keyed by the same name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceRegistry {
    sources: BTreeMap<String, Source>,
    #[serde(default)]
    nicknames: BTreeMap<String, SourceNickname>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a source, returning the one it replaced.
    pub fn add_source(&mut self, name: impl Into<String>, source: Source) -> Option<Source> {
        self.sources.insert(name.into(), source)
    }

    /// Removes a source and its cached nickname.
    ///
    /// Blocks whose text still mentions the name are not touched.
    pub fn remove_source(&mut self, name: &str) -> Option<Source> {
        self.nicknames.remove(name);
        self.sources.remove(name)
    }

    pub fn lookup_source(&self, name: &str) -> Option<&Source> {
        self.sources.get(name)
    }

    /// Like [`lookup_source`](Self::lookup_source) but fails when missing.
    pub fn require_source(&self, name: &str) -> Result<&Source> {
        self.lookup_source(name)
            .ok_or_else(|| CoreError::SourceNotFound(name.to_owned()))
    }

    pub fn set_nickname(&mut self, name: &str, nickname: SourceNickname) -> Result<()> {
        if !self.sources.contains_key(name) {
            return Err(CoreError::SourceNotFound(name.to_owned()));
        }
        self.nicknames.insert(name.to_owned(), nickname);
        Ok(())
    }

    pub fn nickname(&self, name: &str) -> Option<&SourceNickname> {
        self.nicknames.get(name)
    }

    /// Pairs every source token in `resolved` with its registered source.
    pub fn bind<'a>(&'a self, resolved: &'a ResolvedText) -> Vec<SourceBinding<'a>> {
        resolved
            .source_tokens()
            .map(|token| SourceBinding {
                token,
                source: self.lookup_source(token),
            })
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Source)> {
        self.sources.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::SourceKind;
    use crate::reference::ReferenceParser;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    #[test]
    fn add_and_lookup_variable() {
        let mut reg = VariableRegistry::new();
        let id = reg.add_variable(" leads ", VariableKind::Table).unwrap().id.clone();
        assert!(id.starts_with("var-"));
        assert_eq!(reg.by_name("leads").unwrap().id, id);
        assert_eq!(reg.get(&id).unwrap().value, Some(VariableValue::Table(vec![])));
        assert_eq!(reg.find("leads").unwrap().id, id);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut reg = VariableRegistry::new();
        reg.add_variable("x", VariableKind::Input).unwrap();
        let err = reg.add_variable("x", VariableKind::Table).unwrap_err();
        assert_eq!(err, CoreError::DuplicateVariableName("x".into()));
        assert_eq!(
            reg.add_variable("  ", VariableKind::Input).unwrap_err(),
            CoreError::VariableNameRequired
        );
    }

    #[test]
    fn removed_ids_are_never_reused() {
        let mut reg = VariableRegistry::new();
        let id = reg.add_variable("x", VariableKind::Input).unwrap().id.clone();
        reg.remove_variable(&id).unwrap();
        assert!(reg.get(&id).is_none());

        let again = reg.add_variable("x", VariableKind::Input).unwrap().id.clone();
        assert_ne!(again, id);

        let mut stale = Variable::new(id.clone(), "y", VariableKind::Input);
        stale.agent_id = "ag-1".into();
        assert_eq!(
            reg.insert(stale).unwrap_err(),
            CoreError::DuplicateVariableId(id)
        );
    }

    #[test]
    fn missing_variable_errors() {
        let mut reg = VariableRegistry::new();
        assert_eq!(
            reg.remove_variable("var-nope").unwrap_err(),
            CoreError::VariableNotFound("var-nope".into())
        );
        assert!(reg.set_value("var-nope", "x".into()).unwrap_err().is_not_found());
    }

    #[test]
    fn set_value_and_rename() {
        let mut reg = VariableRegistry::new();
        let a = reg.add_variable("a", VariableKind::Input).unwrap().id.clone();
        reg.add_variable("b", VariableKind::Input).unwrap();

        reg.set_value(&a, "hello".into()).unwrap();
        assert_eq!(reg.get(&a).unwrap().value, Some("hello".into()));

        assert_eq!(
            reg.rename(&a, "b").unwrap_err(),
            CoreError::DuplicateVariableName("b".into())
        );
        reg.rename(&a, "a").unwrap();
        reg.rename(&a, "c").unwrap();
        assert!(reg.by_name("c").is_some());
        assert!(reg.by_name("a").is_none());
    }

    #[test]
    fn registry_serializes_as_list() {
        let mut reg = VariableRegistry::new();
        reg.add_variable("a", VariableKind::Input).unwrap();
        let json = serde_json::to_value(&reg).unwrap();
        assert!(json.is_array());
        let back: VariableRegistry = serde_json::from_value(json).unwrap();
        assert_eq!(back.len(), 1);
    }

    #[test]
    fn loading_rejects_repeated_names_and_ids() {
        let a = Variable::new("var-a", "rows", VariableKind::Table);
        let b = Variable::new("var-b", "rows", VariableKind::Input);
        assert_eq!(
            VariableRegistry::try_from(vec![a.clone(), b]).unwrap_err(),
            CoreError::DuplicateVariableName("rows".into())
        );

        let twin = Variable::new("var-a", "other", VariableKind::Input);
        assert_eq!(
            VariableRegistry::try_from(vec![a.clone(), twin.clone()]).unwrap_err(),
            CoreError::DuplicateVariableId("var-a".into())
        );

        let json = serde_json::to_value(vec![a, twin]).unwrap();
        assert!(serde_json::from_value::<VariableRegistry>(json).is_err());
    }

    #[test]
    fn remove_source_drops_nickname() {
        let mut reg = SourceRegistry::new();
        reg.add_source("leads_csv", Source::new(SourceKind::Csv, "a,b"));
        reg.set_nickname(
            "leads_csv",
            SourceNickname {
                nickname: "Leads".into(),
                download_url: String::new(),
            },
        )
        .unwrap();
        assert_eq!(reg.nickname("leads_csv").unwrap().nickname, "Leads");

        assert!(reg.remove_source("leads_csv").is_some());
        assert!(reg.nickname("leads_csv").is_none());
        assert!(reg.lookup_source("leads_csv").is_none());
    }

    #[test]
    fn nickname_requires_source() {
        let mut reg = SourceRegistry::new();
        let err = reg
            .set_nickname(
                "ghost",
                SourceNickname {
                    nickname: "G".into(),
                    download_url: String::new(),
                },
            )
            .unwrap_err();
        assert_eq!(err, CoreError::SourceNotFound("ghost".into()));
    }

    #[test]
    fn bind_is_soft_for_missing_sources() {
        let mut reg = SourceRegistry::new();
        reg.add_source("known", Source::new(SourceKind::Pdf, "text"));
        let resolved = ReferenceParser::default().resolve_on(
            "@{known} and @{unknown}",
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
        );
        let bindings = reg.bind(&resolved);
        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings[0].token, "known");
        assert!(bindings[0].source.is_some());
        assert_eq!(bindings[1].token, "unknown");
        assert!(bindings[1].source.is_none());
    }
}
