//! Resource dependency graph
//!
//! Every ordering constraint between resources is an explicit edge. The
//! engine never infers order from which values happen to be available.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::fmt;

use crate::error::GraphError;

/// Kind of a declared resource, in pipeline order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    /// Remote image registry
    Registry,
    /// Credential resolution gate for a registry
    Credentials,
    /// Pre-existing upstream image pulled for local use
    Pull,
    /// Local `docker tag` to the registry destination
    Retag,
    /// Build (pass-through) and push to the registry
    Push,
}

impl ResourceKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Registry => "registry",
            Self::Credentials => "credentials",
            Self::Pull => "pull",
            Self::Retag => "retag",
            Self::Push => "push",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Unique resource name (e.g., "service-retag")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(image: &str, kind: ResourceKind) -> Self {
        Self(format!("{}-{}", image, kind.name()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A declared resource and the resources it must wait for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub id: ResourceId,
    pub kind: ResourceKind,
    /// Logical image this resource belongs to
    pub image: String,
    pub depends_on: Vec<ResourceId>,
}

impl Resource {
    pub fn new(image: &str, kind: ResourceKind) -> Self {
        Self {
            id: ResourceId::new(image, kind),
            kind,
            image: image.to_string(),
            depends_on: Vec::new(),
        }
    }

    pub fn depends_on(mut self, dependency: &ResourceId) -> Self {
        if !self.depends_on.contains(dependency) {
            self.depends_on.push(dependency.clone());
        }
        self
    }
}

/// Declared resources in declaration order
#[derive(Debug, Clone, Default)]
pub struct ResourceGraph {
    resources: Vec<Resource>,
    index: HashMap<ResourceId, usize>,
}

impl ResourceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a resource. Dependencies may be declared later; `validate`
    /// checks that they all exist.
    pub fn declare(&mut self, resource: Resource) -> Result<&ResourceId, GraphError> {
        if self.index.contains_key(&resource.id) {
            return Err(GraphError::DuplicateResource {
                resource: resource.id.to_string(),
            });
        }
        let position = self.resources.len();
        self.index.insert(resource.id.clone(), position);
        self.resources.push(resource);
        Ok(&self.resources[position].id)
    }

    #[cfg(test)]
    pub fn get(&self, id: &ResourceId) -> Option<&Resource> {
        self.index.get(id).map(|&i| &self.resources[i])
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Check that every dependency exists and there are no cycles
    pub fn validate(&self) -> Result<(), GraphError> {
        for resource in &self.resources {
            for dependency in &resource.depends_on {
                if !self.index.contains_key(dependency) {
                    return Err(GraphError::UnknownDependency {
                        resource: resource.id.to_string(),
                        dependency: dependency.to_string(),
                    });
                }
            }
        }
        self.topological_order().map(|_| ())
    }

    /// Resources ordered so that every resource follows its dependencies
    ///
    /// Ties keep declaration order.
    pub fn topological_order(&self) -> Result<Vec<&Resource>, GraphError> {
        let mut remaining: Vec<usize> = self
            .resources
            .iter()
            .map(|r| {
                r.depends_on
                    .iter()
                    .filter(|d| self.index.contains_key(*d))
                    .count()
            })
            .collect();

        let mut queue: VecDeque<usize> = remaining
            .iter()
            .enumerate()
            .filter(|(_, &n)| n == 0)
            .map(|(i, _)| i)
            .collect();

        let mut ordered = Vec::with_capacity(self.resources.len());
        while let Some(i) = queue.pop_front() {
            let id = &self.resources[i].id;
            ordered.push(&self.resources[i]);
            for (j, resource) in self.resources.iter().enumerate() {
                if resource.depends_on.contains(id) {
                    remaining[j] -= 1;
                    if remaining[j] == 0 {
                        queue.push_back(j);
                    }
                }
            }
        }

        if ordered.len() != self.resources.len() {
            let resources = remaining
                .iter()
                .enumerate()
                .filter(|(_, &n)| n > 0)
                .map(|(i, _)| self.resources[i].id.to_string())
                .collect();
            return Err(GraphError::Cycle { resources });
        }

        Ok(ordered)
    }

    /// Every resource that directly or transitively depends on `id`
    pub fn dependents_of(&self, id: &ResourceId) -> BTreeSet<ResourceId> {
        let mut found = BTreeSet::new();
        let mut frontier = vec![id.clone()];
        while let Some(current) = frontier.pop() {
            for resource in &self.resources {
                if resource.depends_on.contains(&current) && found.insert(resource.id.clone()) {
                    frontier.push(resource.id.clone());
                }
            }
        }
        found
    }

    /// Whether `id` (transitively) depends on `dependency`
    #[cfg(test)]
    pub fn depends_transitively(&self, id: &ResourceId, dependency: &ResourceId) -> bool {
        self.dependents_of(dependency).contains(id)
    }
}
