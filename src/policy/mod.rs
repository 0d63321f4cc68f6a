// SPDX-License-Identifier: GPL-3.0-only
//! Field and row level access control.
//!
//! A [`PolicyEngine`] maps an (entity type, operation) pair to a [`Rule`].
//! Rules are predicates over a subject and the acting player, composed with
//! [`Rule::and`] and [`Rule::or`]. Callers check authorization explicitly
//! before mutating anything.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::registry::Player;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityType {
    MapVersion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Change of a single named field
    Update(&'static str),
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Update(field) => write!(f, "update {}", field),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("player {actor} may not {operation} on {entity:?} ({rule})")]
    Denied {
        actor: i64,
        entity: EntityType,
        operation: Operation,
        rule: String,
    },

    #[error("no rule for {operation} on {entity:?}")]
    NoRule {
        entity: EntityType,
        operation: Operation,
    },
}

type Predicate<S> = dyn Fn(&S, &Player) -> bool + Send + Sync;

/// A named predicate over a subject and the acting player
pub struct Rule<S> {
    name: String,
    check: Arc<Predicate<S>>,
}

impl<S> Clone for Rule<S> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            check: Arc::clone(&self.check),
        }
    }
}

impl<S: 'static> Rule<S> {
    pub fn new(name: impl Into<String>, check: impl Fn(&S, &Player) -> bool + Send + Sync + 'static) -> Self {
        Self {
            name: name.into(),
            check: Arc::new(check),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn allows(&self, subject: &S, actor: &Player) -> bool {
        (self.check)(subject, actor)
    }

    pub fn and(self, other: Rule<S>) -> Rule<S> {
        let name = format!("({} and {})", self.name, other.name);
        Rule::new(name, move |subject, actor| {
            self.allows(subject, actor) && other.allows(subject, actor)
        })
    }

    pub fn or(self, other: Rule<S>) -> Rule<S> {
        let name = format!("({} or {})", self.name, other.name);
        Rule::new(name, move |subject, actor| {
            self.allows(subject, actor) || other.allows(subject, actor)
        })
    }
}

/// Passes for administrators
pub fn is_admin<S: 'static>() -> Rule<S> {
    Rule::new("is admin", |_, actor: &Player| actor.is_admin)
}

pub struct PolicyEngine<S> {
    rules: HashMap<(EntityType, Operation), Rule<S>>,
}

impl<S: 'static> PolicyEngine<S> {
    pub fn new() -> Self {
        Self {
            rules: HashMap::new(),
        }
    }

    pub fn register(mut self, entity: EntityType, operation: Operation, rule: Rule<S>) -> Self {
        self.rules.insert((entity, operation), rule);
        self
    }

    /// Operations without a registered rule are denied
    pub fn authorize(
        &self,
        entity: EntityType,
        operation: Operation,
        subject: &S,
        actor: &Player,
    ) -> Result<(), PolicyError> {
        let rule = self
            .rules
            .get(&(entity, operation))
            .ok_or(PolicyError::NoRule { entity, operation })?;

        if rule.allows(subject, actor) {
            Ok(())
        } else {
            Err(PolicyError::Denied {
                actor: actor.id,
                entity,
                operation,
                rule: rule.name().to_string(),
            })
        }
    }
}

impl<S: 'static> Default for PolicyEngine<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Requested changes to a published map version
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
pub struct MapVersionChanges {
    pub description: Option<String>,
    pub ranked: Option<bool>,
    pub hidden: Option<bool>,
}

impl MapVersionChanges {
    pub fn is_empty(&self) -> bool {
        self.description.is_none() && self.ranked.is_none() && self.hidden.is_none()
    }
}

/// Subject of map version update rules
#[derive(Debug, Clone)]
pub struct MapVersionUpdate {
    pub map_author: Option<i64>,
    pub changes: MapVersionChanges,
}

pub const FIELD_DESCRIPTION: &str = "description";
pub const FIELD_RANKED: &str = "ranked";
pub const FIELD_HIDDEN: &str = "hidden";

pub fn is_map_owner() -> Rule<MapVersionUpdate> {
    Rule::new("is map owner", |subject: &MapVersionUpdate, actor: &Player| {
        subject.map_author == Some(actor.id)
    })
}

fn ranked_set_to(value: bool) -> Rule<MapVersionUpdate> {
    Rule::new(format!("ranked set to {}", value), move |subject: &MapVersionUpdate, _: &Player| {
        subject.changes.ranked == Some(value)
    })
}

fn hidden_set_to(value: bool) -> Rule<MapVersionUpdate> {
    Rule::new(format!("hidden set to {}", value), move |subject: &MapVersionUpdate, _: &Player| {
        subject.changes.hidden == Some(value)
    })
}

/// Rules for editing map versions
///
/// Owners may edit descriptions, unrank and hide their versions. Ranking
/// and unhiding is left to administrators.
pub fn map_version_policy() -> PolicyEngine<MapVersionUpdate> {
    PolicyEngine::new()
        .register(
            EntityType::MapVersion,
            Operation::Update(FIELD_DESCRIPTION),
            is_map_owner().or(is_admin()),
        )
        .register(
            EntityType::MapVersion,
            Operation::Update(FIELD_RANKED),
            is_admin().or(is_map_owner().and(ranked_set_to(false))),
        )
        .register(
            EntityType::MapVersion,
            Operation::Update(FIELD_HIDDEN),
            is_admin().or(is_map_owner().and(hidden_set_to(true))),
        )
}
