//! State Diff Engine
//!
//! Compares two desired-state snapshots and reports, per resource, whether
//! it would be created, updated in place, replaced, or deleted.
//!
//! ## Rules
//!
//! - A URN only in the new snapshot is created; only in the old one, deleted.
//! - A changed property listed in the kind's `replace_on_changes` forces a
//!   replacement; any other changed property is an in-place update.
//! - A property that is computed in the new snapshot cannot be compared
//!   until its producers are realized. It only counts as changed when one
//!   of its producers is itself replaced.
//! - Identical declarations yield an empty report.

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ResourceState, StateSnapshot};
use crate::resource::{PropertyValue, ResourceKind};

/// Kind of change planned for a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    /// Resource will be created
    Create,
    /// Resource will be updated in place
    Update,
    /// Resource will be deleted and created again
    Replace,
    /// Resource will be deleted
    Delete,
}

impl ChangeType {
    /// Symbol used in plan output
    pub fn symbol(&self) -> &'static str {
        match self {
            ChangeType::Create => "+",
            ChangeType::Update => "~",
            ChangeType::Replace => "+-",
            ChangeType::Delete => "-",
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeType::Create => write!(f, "create"),
            ChangeType::Update => write!(f, "update"),
            ChangeType::Replace => write!(f, "replace"),
            ChangeType::Delete => write!(f, "delete"),
        }
    }
}

/// A single property change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyChange {
    /// Property name
    pub name: String,
    /// Previous value
    pub old: Option<PropertyValue>,
    /// New value
    pub new: Option<PropertyValue>,
    /// Whether this change alone forces a replacement
    pub forces_replacement: bool,
}

/// Planned change for one resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceChange {
    /// Resource URN
    pub urn: String,
    /// Resource kind
    pub kind: ResourceKind,
    /// Type of change
    pub change: ChangeType,
    /// Changed properties (empty for creates and deletes)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<PropertyChange>,
}

/// Summary counts of a diff report
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    /// Resources to create
    pub create: usize,
    /// Resources to update in place
    pub update: usize,
    /// Resources to replace
    pub replace: usize,
    /// Resources to delete
    pub delete: usize,
    /// Resources left untouched
    pub unchanged: usize,
}

impl DiffSummary {
    /// Total number of changed resources
    pub fn total_changes(&self) -> usize {
        self.create + self.update + self.replace + self.delete
    }
}

impl fmt::Display for DiffSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to create, {} to update, {} to replace, {} to delete, {} unchanged",
            self.create, self.update, self.replace, self.delete, self.unchanged
        )
    }
}

/// Result of comparing two snapshots
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffReport {
    /// When the report was generated
    pub generated_at: DateTime<Utc>,
    /// Per-resource changes, sorted by URN
    pub changes: Vec<ResourceChange>,
    /// Summary counts
    pub summary: DiffSummary,
}

impl DiffReport {
    /// Whether nothing would change
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Changes of one type
    pub fn changes_of(&self, change: ChangeType) -> impl Iterator<Item = &ResourceChange> {
        self.changes.iter().filter(move |c| c.change == change)
    }

    /// Change planned for one URN
    pub fn change_for(&self, urn: &str) -> Option<&ResourceChange> {
        self.changes.iter().find(|c| c.urn == urn)
    }
}

/// The diff engine for comparing state snapshots
#[derive(Debug, Clone, Default)]
pub struct DiffEngine {
    /// Report a change when only the dependency set differs
    compare_dependencies: bool,
}

impl DiffEngine {
    /// Create a new diff engine
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure whether dependency-only changes are reported as updates
    pub fn with_dependency_changes(mut self, compare: bool) -> Self {
        self.compare_dependencies = compare;
        self
    }

    /// Compare a previous snapshot (if any) with the new desired state
    pub fn diff(&self, old: Option<&StateSnapshot>, new: &StateSnapshot) -> DiffReport {
        let mut changes = Vec::new();
        let mut unchanged = 0;

        for (urn, new_state) in &new.resources {
            match old.and_then(|o| o.resources.get(urn)) {
                None => changes.push(ResourceChange {
                    urn: urn.clone(),
                    kind: new_state.kind.clone(),
                    change: ChangeType::Create,
                    properties: Vec::new(),
                }),
                Some(old_state) => match self.diff_resource(urn, old_state, new_state) {
                    Some(change) => changes.push(change),
                    None => unchanged += 1,
                },
            }
        }

        if let Some(old) = old {
            for (urn, old_state) in &old.resources {
                if !new.resources.contains_key(urn) {
                    changes.push(ResourceChange {
                        urn: urn.clone(),
                        kind: old_state.kind.clone(),
                        change: ChangeType::Delete,
                        properties: Vec::new(),
                    });
                }
            }
        }

        unchanged -= self.cascade_replacements(old, new, &mut changes);
        changes.sort_by(|a, b| a.urn.cmp(&b.urn));

        let mut summary = DiffSummary {
            unchanged,
            ..Default::default()
        };
        for change in &changes {
            match change.change {
                ChangeType::Create => summary.create += 1,
                ChangeType::Update => summary.update += 1,
                ChangeType::Replace => summary.replace += 1,
                ChangeType::Delete => summary.delete += 1,
            }
        }

        DiffReport {
            generated_at: Utc::now(),
            changes,
            summary,
        }
    }

    fn diff_resource(
        &self,
        urn: &str,
        old: &ResourceState,
        new: &ResourceState,
    ) -> Option<ResourceChange> {
        let replace_on = new.kind.replace_on_changes();
        let names: BTreeSet<&String> = old.inputs.keys().chain(new.inputs.keys()).collect();

        let mut properties = Vec::new();
        for name in names {
            let old_value = old.inputs.get(name);
            let new_value = new.inputs.get(name);
            if Self::property_differs(old_value, new_value) {
                properties.push(PropertyChange {
                    name: name.clone(),
                    old: old_value.cloned(),
                    new: new_value.cloned(),
                    forces_replacement: replace_on.contains(&name.as_str()),
                });
            }
        }

        let dependencies_changed =
            self.compare_dependencies && old.dependencies != new.dependencies;

        if properties.is_empty() && !dependencies_changed {
            return None;
        }

        let change = if properties.iter().any(|p| p.forces_replacement) {
            ChangeType::Replace
        } else {
            ChangeType::Update
        };

        Some(ResourceChange {
            urn: urn.to_string(),
            kind: new.kind.clone(),
            change,
            properties,
        })
    }

    fn property_differs(old: Option<&PropertyValue>, new: Option<&PropertyValue>) -> bool {
        match (old, new) {
            // Unknown until realized; judged by its producers instead.
            (Some(_), Some(PropertyValue::Computed { .. })) => false,
            (old, new) => old != new,
        }
    }

    /// Propagate replacements to consumers of the replaced resources'
    /// outputs. Returns how many previously unchanged resources now change.
    fn cascade_replacements(
        &self,
        old: Option<&StateSnapshot>,
        new: &StateSnapshot,
        changes: &mut Vec<ResourceChange>,
    ) -> usize {
        let Some(old) = old else {
            return 0;
        };

        let mut newly_changed = 0;
        let mut replaced: HashSet<String> = changes
            .iter()
            .filter(|c| c.change == ChangeType::Replace)
            .map(|c| c.urn.clone())
            .collect();

        loop {
            let mut progressed = false;

            for (urn, new_state) in &new.resources {
                let Some(old_state) = old.resources.get(urn) else {
                    continue;
                };
                if replaced.contains(urn) {
                    continue;
                }

                let replace_on = new_state.kind.replace_on_changes();
                let affected: Vec<PropertyChange> = new_state
                    .inputs
                    .iter()
                    .filter(|(_, value)| match value {
                        PropertyValue::Computed { computed_from } => {
                            computed_from.iter().any(|p| replaced.contains(p))
                        }
                        PropertyValue::Known(_) => false,
                    })
                    .map(|(name, value)| PropertyChange {
                        name: name.clone(),
                        old: old_state.inputs.get(name).cloned(),
                        new: Some(value.clone()),
                        forces_replacement: replace_on.contains(&name.as_str()),
                    })
                    .collect();
                if affected.is_empty() {
                    continue;
                }

                let forces = affected.iter().any(|p| p.forces_replacement);
                match changes.iter_mut().find(|c| &c.urn == urn) {
                    Some(existing) => {
                        let known: HashSet<String> =
                            existing.properties.iter().map(|p| p.name.clone()).collect();
                        let added: Vec<PropertyChange> = affected
                            .into_iter()
                            .filter(|p| !known.contains(&p.name))
                            .collect();
                        if added.is_empty() && !(forces && existing.change != ChangeType::Replace)
                        {
                            continue;
                        }
                        existing.properties.extend(added);
                        if forces {
                            existing.change = ChangeType::Replace;
                        }
                    }
                    None => {
                        newly_changed += 1;
                        changes.push(ResourceChange {
                            urn: urn.clone(),
                            kind: new_state.kind.clone(),
                            change: if forces {
                                ChangeType::Replace
                            } else {
                                ChangeType::Update
                            },
                            properties: affected,
                        });
                    }
                }

                if forces {
                    replaced.insert(urn.clone());
                }
                progressed = true;
            }

            if !progressed {
                break;
            }
        }

        newly_changed
    }
}
