//! Resource graph execution
//!
//! Resources start as soon as every dependency has succeeded, so independent
//! image chains overlap. All futures are polled on the calling task; nothing
//! is spawned. When a resource fails, everything that depends on it is
//! skipped and the rest of the graph keeps going.

use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::domain::graph::{Resource, ResourceGraph, ResourceId};
use crate::error::{GraphError, ProvisionError};

/// What applying a resource did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyStatus {
    Created,
    Updated,
    Unchanged,
    /// A command resource ran
    Ran,
    /// A command resource was skipped by its trigger
    NotTriggered,
}

impl ApplyStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Unchanged => "unchanged",
            Self::Ran => "ran",
            Self::NotTriggered => "not triggered",
        }
    }
}

/// Result for one resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Succeeded {
        status: ApplyStatus,
        duration: Duration,
    },
    Failed {
        error: String,
        duration: Duration,
    },
    Skipped {
        blocked_by: ResourceId,
    },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}

/// Applies a single resource
pub trait ResourceApplier {
    fn apply(
        &self,
        resource: &Resource,
    ) -> impl Future<Output = Result<ApplyStatus, ProvisionError>>;
}

/// Outcomes of one run, in the order resources settled
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub outcomes: Vec<(ResourceId, Outcome)>,
}

impl RunReport {
    #[cfg(test)]
    pub fn get(&self, id: &ResourceId) -> Option<&Outcome> {
        self.outcomes
            .iter()
            .find(|(resource, _)| resource == id)
            .map(|(_, outcome)| outcome)
    }

    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|(_, outcome)| outcome.is_success())
    }

    pub fn failed(&self) -> impl Iterator<Item = (&ResourceId, &str)> {
        self.outcomes.iter().filter_map(|(id, outcome)| match outcome {
            Outcome::Failed { error, .. } => Some((id, error.as_str())),
            _ => None,
        })
    }

    pub fn skipped_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, Outcome::Skipped { .. }))
            .count()
    }

    /// Position at which a resource settled
    #[cfg(test)]
    pub fn position(&self, id: &ResourceId) -> Option<usize> {
        self.outcomes.iter().position(|(resource, _)| resource == id)
    }
}

async fn apply_one<'a, A: ResourceApplier>(
    applier: &'a A,
    resource: &'a Resource,
) -> (ResourceId, Outcome) {
    info!("▶ {} ({})", resource.id, resource.kind);
    let start = Instant::now();
    let outcome = match applier.apply(resource).await {
        Ok(status) => {
            info!(
                "✓ {} {} in {:.1}s",
                resource.id,
                status.label(),
                start.elapsed().as_secs_f64()
            );
            Outcome::Succeeded {
                status,
                duration: start.elapsed(),
            }
        }
        Err(e) => {
            error!("✗ {} failed: {}", resource.id, e);
            Outcome::Failed {
                error: e.to_string(),
                duration: start.elapsed(),
            }
        }
    };
    (resource.id.clone(), outcome)
}

/// Apply every resource in the graph, honouring dependency edges
pub async fn run<A: ResourceApplier>(
    graph: &ResourceGraph,
    applier: &A,
) -> Result<RunReport, GraphError> {
    graph.validate()?;
    let order = graph.topological_order()?;

    let mut settled: HashMap<ResourceId, bool> = HashMap::new();
    let mut started: HashSet<ResourceId> = HashSet::new();
    let mut report = RunReport::default();
    let mut in_flight = FuturesUnordered::new();

    loop {
        // Skipping a resource can make its dependents decidable, so repeat
        // until nothing new is scheduled
        let mut progressed = true;
        while progressed {
            progressed = false;
            for resource in &order {
                if started.contains(&resource.id) {
                    continue;
                }

                let mut ready = true;
                let mut blocked_by = None;
                for dependency in &resource.depends_on {
                    match settled.get(dependency) {
                        None => {
                            ready = false;
                            break;
                        }
                        Some(false) if blocked_by.is_none() => {
                            blocked_by = Some(dependency.clone());
                        }
                        Some(_) => {}
                    }
                }
                if !ready {
                    continue;
                }

                started.insert(resource.id.clone());
                match blocked_by {
                    Some(dependency) => {
                        warn!("⏭ {} skipped: {} did not succeed", resource.id, dependency);
                        settled.insert(resource.id.clone(), false);
                        report.outcomes.push((
                            resource.id.clone(),
                            Outcome::Skipped {
                                blocked_by: dependency,
                            },
                        ));
                        progressed = true;
                    }
                    None => in_flight.push(apply_one(applier, *resource)),
                }
            }
        }

        match in_flight.next().await {
            Some((id, outcome)) => {
                if !outcome.is_success() {
                    let blocked = graph.dependents_of(&id);
                    if !blocked.is_empty() {
                        warn!(
                            "{} dependent resource(s) of {} will be skipped",
                            blocked.len(),
                            id
                        );
                    }
                }
                settled.insert(id.clone(), outcome.is_success());
                report.outcomes.push((id, outcome));
            }
            None => break,
        }
    }

    Ok(report)
}
