//! Stack service - orchestrates up, destroy and outputs for one stack
//!
//! Coordinates configuration, the resource plan, the engine and state
//! persistence. Provider and runtime are injected so the whole flow can be
//! exercised against in-memory fakes.

use std::collections::BTreeMap;
use tracing::{info, warn};

use super::engine::{self, RunReport};
use super::provisioner::Provisioner;
use crate::config::StackConfig;
use crate::domain::image::ImageReference;
use crate::domain::plan::{self, Plan};
use crate::error::{ProviderError, ProvisionError};
use crate::infrastructure::state::ImageOutputs;
use crate::infrastructure::{ContainerRuntime, RegistryProvider, StateStore};

/// Result of `up`
#[derive(Debug)]
pub struct UpReport {
    pub plan: Plan,
    pub run: RunReport,
    pub outputs: BTreeMap<String, ImageOutputs>,
}

/// Result of `destroy`
#[derive(Debug, Default)]
pub struct DestroyReport {
    /// Repositories deleted (or already gone)
    pub deleted: Vec<String>,
    /// Repositories that could not be deleted, with the error
    pub failed: Vec<(String, String)>,
}

pub struct StackService<P, C> {
    config: StackConfig,
    provider: P,
    runtime: C,
    store: StateStore,
}

impl<P: RegistryProvider, C: ContainerRuntime> StackService<P, C> {
    pub fn new(config: StackConfig, provider: P, runtime: C, store: StateStore) -> Self {
        Self {
            config,
            provider,
            runtime,
            store,
        }
    }

    pub fn config(&self) -> &StackConfig {
        &self.config
    }

    /// Provision every image chain and persist the resulting state
    ///
    /// Configuration errors abort before any resource is declared. Resource
    /// failures are reported in the returned `RunReport`; state is saved
    /// either way so partial progress is not lost.
    pub async fn up(&self) -> Result<UpReport, ProvisionError> {
        let plan = plan::declare(&self.config)?;
        let state = self.store.load().await?;

        info!(
            "Applying {} resources for stack {} at tag {}",
            plan.graph.len(),
            self.config.stack,
            plan.image_tag
        );

        let provisioner = Provisioner::new(
            &self.config,
            &plan.image_tag,
            &self.provider,
            &self.runtime,
            state,
        );
        let run = engine::run(&plan.graph, &provisioner).await?;
        let state = provisioner.into_state();
        self.store.save(&state).await?;

        Ok(UpReport {
            outputs: state.outputs(),
            plan,
            run,
        })
    }

    /// Delete every registry recorded in state
    ///
    /// Images are handled independently: one failed deletion does not stop
    /// the others. Entries that were deleted are removed from state; the
    /// state file is removed once nothing is left.
    pub async fn destroy(&self) -> Result<DestroyReport, ProvisionError> {
        let mut state = self.store.load().await?;
        let mut report = DestroyReport::default();

        let images: Vec<String> = state.registries.keys().cloned().collect();
        for image in images {
            let Some(record) = state.registries.get(&image).cloned() else {
                continue;
            };

            match self
                .provider
                .delete_registry(&record.repository, &record.registry_id)
                .await
            {
                Ok(existed) => {
                    if existed {
                        info!("Deleted registry {}", record.repository);
                    } else {
                        warn!("Registry {} was already gone", record.repository);
                    }

                    if let Some(tagged) = state.last_retag(&image).and_then(parse_reference) {
                        if let Err(e) = self.runtime.remove_image(&tagged).await {
                            warn!("Could not remove local image {}: {}", tagged, e);
                        }
                    }

                    state.forget(&image);
                    report.deleted.push(record.repository);
                }
                Err(e) => {
                    warn!("Failed to delete registry {}: {}", record.repository, e);
                    report.failed.push((record.repository, e.to_string()));
                }
            }
        }

        if state.is_empty() {
            self.store.clear().await?;
        } else {
            self.store.save(&state).await?;
        }

        Ok(report)
    }

    /// Outputs recorded by previous runs
    pub async fn outputs(&self) -> Result<BTreeMap<String, ImageOutputs>, ProvisionError> {
        Ok(self.store.load().await?.outputs())
    }
}

/// Split a rendered `name:tag` back into a reference
///
/// Splits on the last colon after the final `/`, so registry ports survive.
fn parse_reference(rendered: &str) -> Option<ImageReference> {
    let slash = rendered.rfind('/').map(|i| i + 1).unwrap_or(0);
    let colon = rendered[slash..].rfind(':')? + slash;
    Some(ImageReference::new(&rendered[..colon], &rendered[colon + 1..]))
}

/// Summarize a destroy report as an error when anything failed
pub fn destroy_failures(report: &DestroyReport) -> Option<ProviderError> {
    if report.failed.is_empty() {
        return None;
    }
    Some(ProviderError::UnexpectedResponse {
        command: "destroy".to_string(),
        message: report
            .failed
            .iter()
            .map(|(repo, err)| format!("{}: {}", repo, err))
            .collect::<Vec<_>>()
            .join("; "),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::graph::{ResourceId, ResourceKind};
    use crate::error::{ConfigError, CredentialsError};
    use crate::infrastructure::testing::{CallLog, FakeRegistry, FakeRuntime};
    use crate::services::engine::{ApplyStatus, Outcome};

    struct Harness {
        _dir: tempfile::TempDir,
        log: CallLog,
        service: StackService<FakeRegistry, FakeRuntime>,
    }

    fn harness_with(
        config: StackConfig,
        registry: impl FnOnce(CallLog) -> FakeRegistry,
        runtime: impl FnOnce(CallLog) -> FakeRuntime,
    ) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let log = CallLog::default();
        let store = StateStore::new(dir.path(), config.stack.clone());
        let service = StackService::new(config, registry(log.clone()), runtime(log.clone()), store);
        Harness {
            _dir: dir,
            log,
            service,
        }
    }

    fn harness(tag: Option<&str>) -> Harness {
        let config = StackConfig::default().with_image_tag(tag.map(str::to_string));
        harness_with(config, FakeRegistry::new, FakeRuntime::new)
    }

    fn url(repository: &str) -> String {
        FakeRegistry::repository_url(repository)
    }

    #[tokio::test]
    async fn test_missing_tag_has_no_side_effects() {
        let h = harness(None);
        let err = h.service.up().await.unwrap_err();
        assert!(matches!(
            err,
            ProvisionError::Config(ConfigError::MissingField { .. })
        ));
        assert!(h.log.calls().is_empty());
        assert!(!h.service.store.path().exists());
    }

    #[tokio::test]
    async fn test_service_scenario() {
        let h = harness(Some("1.2.3"));
        let report = h.service.up().await.unwrap();
        assert!(report.run.is_success());

        let destination = format!("{}:1.2.3", url("pulumi/service"));
        let calls = h.log.calls();
        assert!(calls.contains(&"ensure_registry pulumi/service".to_string()));
        assert!(calls.contains(&"pull pulumi/service:1.2.3".to_string()));
        assert!(calls.contains(&format!("tag pulumi/service:1.2.3 {}", destination)));
        assert!(calls.contains(&format!("push {}", destination)));

        let build_args = h.service.runtime.build_args.lock().unwrap().clone();
        assert!(build_args
            .iter()
            .any(|args| args.get("SOURCE_IMAGE") == Some(&destination)));

        assert_eq!(
            report.outputs["service"].image_name.as_deref(),
            Some(destination.as_str())
        );
        assert_eq!(report.outputs["service"].repository_url, url("pulumi/service"));
        assert_eq!(report.outputs.len(), 3);
    }

    #[tokio::test]
    async fn test_chain_order_per_image() {
        let h = harness(Some("1.2.3"));
        h.service.up().await.unwrap();

        for repository in ["pulumi/service", "pulumi/console", "pulumi/migrations"] {
            let destination = format!("{}:1.2.3", url(repository));
            let ensure = h.log.position(&format!("ensure_registry {}", repository)).unwrap();
            let pull = h.log.position(&format!("pull {}:1.2.3", repository)).unwrap();
            let tag = h.log.position(&format!("tag {}:1.2.3", repository)).unwrap();
            let build = h.log.position(&format!("build ./dummy_docker {}", destination)).unwrap();
            let push = h.log.position(&format!("push {}", destination)).unwrap();
            assert!(ensure < pull && pull < tag && tag < build && build < push);
        }
    }

    #[tokio::test]
    async fn test_push_resolves_credentials_again() {
        let h = harness(Some("1.2.3"));
        h.service.up().await.unwrap();
        // One resolution for the credentials gate, one for the push, per image
        assert_eq!(h.log.count("authorization_token"), 6);
        assert_eq!(h.service.runtime.logins.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_invalid_credentials_block_push() {
        let config = StackConfig::default().with_image_tag(Some("1.2.3".to_string()));
        let h = harness_with(
            config,
            |log| FakeRegistry::new(log).with_raw_token("robot$app:"),
            FakeRuntime::new,
        );
        let report = h.service.up().await.unwrap();

        assert!(!report.run.is_success());
        let failure = report
            .run
            .get(&ResourceId::new("service", ResourceKind::Credentials))
            .unwrap();
        match failure {
            Outcome::Failed { error, .. } => {
                assert!(error.contains(&CredentialsError::Invalid.to_string()))
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(h.log.count("pull"), 0);
        assert_eq!(h.log.count("tag"), 0);
        assert_eq!(h.log.count("push"), 0);
        assert!(report.outputs.values().all(|o| o.image_name.is_none()));
    }

    #[tokio::test]
    async fn test_running_twice_does_not_duplicate_registry() {
        let h = harness(Some("1.2.3"));
        h.service.up().await.unwrap();
        let second = h.service.up().await.unwrap();

        assert_eq!(h.service.provider.registry_count(), 3);
        assert_eq!(h.log.count("ensure_registry pulumi/service"), 2);
        assert!(matches!(
            second
                .run
                .get(&ResourceId::new("service", ResourceKind::Registry)),
            Some(Outcome::Succeeded {
                status: ApplyStatus::Unchanged,
                ..
            })
        ));
        // The image was pulled on the first run and is still present
        assert_eq!(h.log.count("pull pulumi/service"), 1);
        // Retag always re-runs by default
        assert_eq!(h.log.count("tag pulumi/service"), 2);

        let state = h.service.store.load().await.unwrap();
        assert_eq!(state.registries.len(), 3);
    }

    #[tokio::test]
    async fn test_failing_chain_does_not_stop_others() {
        let config = StackConfig::default().with_image_tag(Some("1.2.3".to_string()));
        let h = harness_with(config, FakeRegistry::new, |log| {
            FakeRuntime::new(log).failing_pull("pulumi/console:1.2.3")
        });
        let report = h.service.up().await.unwrap();

        assert!(!report.run.is_success());
        assert_eq!(report.run.failed().count(), 1);
        assert!(report
            .run
            .get(&ResourceId::new("service", ResourceKind::Push))
            .unwrap()
            .is_success());
        assert!(report
            .run
            .get(&ResourceId::new("migrations", ResourceKind::Push))
            .unwrap()
            .is_success());
        assert!(!report
            .run
            .get(&ResourceId::new("ui", ResourceKind::Push))
            .unwrap()
            .is_success());
        assert_eq!(h.log.count("push"), 2);

        // The ui registry was still provisioned and recorded
        assert!(report.outputs.contains_key("ui"));
        assert!(report.outputs["ui"].image_name.is_none());
    }

    #[tokio::test]
    async fn test_registry_failure_skips_chain() {
        let config = StackConfig::default().with_image_tag(Some("1.2.3".to_string()));
        let h = harness_with(
            config,
            |log| FakeRegistry::new(log).failing_create("pulumi/migrations"),
            FakeRuntime::new,
        );
        let report = h.service.up().await.unwrap();

        assert_eq!(report.run.skipped_count(), 4);
        assert_eq!(h.log.count("pull pulumi/migrations"), 0);
        assert!(!report.outputs.contains_key("migrations"));
    }

    #[tokio::test]
    async fn test_on_change_push_skips_second_run() {
        let mut config = StackConfig::default().with_image_tag(Some("1.2.3".to_string()));
        config.triggers.push = crate::domain::plan::Trigger::OnChange;
        let h = harness_with(config, FakeRegistry::new, FakeRuntime::new);

        h.service.up().await.unwrap();
        let second = h.service.up().await.unwrap();

        assert_eq!(h.log.count("push"), 3);
        assert!(matches!(
            second
                .run
                .get(&ResourceId::new("service", ResourceKind::Push)),
            Some(Outcome::Succeeded {
                status: ApplyStatus::NotTriggered,
                ..
            })
        ));
        // Outputs survive a run where nothing was pushed
        assert!(second.outputs["service"].image_name.is_some());
    }

    #[tokio::test]
    async fn test_destroy_removes_registries_and_state() {
        let h = harness(Some("1.2.3"));
        h.service.up().await.unwrap();

        let report = h.service.destroy().await.unwrap();
        assert_eq!(report.deleted.len(), 3);
        assert!(report.failed.is_empty());
        assert!(destroy_failures(&report).is_none());
        assert_eq!(h.service.provider.registry_count(), 0);
        assert_eq!(h.log.count("remove_image"), 3);
        assert!(!h.service.store.path().exists());
        assert!(h.service.outputs().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_destroy_keeps_state_for_failed_deletions() {
        let config = StackConfig::default().with_image_tag(Some("1.2.3".to_string()));
        let h = harness_with(
            config,
            |log| FakeRegistry::new(log).failing_delete("pulumi/console"),
            FakeRuntime::new,
        );
        h.service.up().await.unwrap();

        let report = h.service.destroy().await.unwrap();
        assert_eq!(report.deleted.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert!(destroy_failures(&report).is_some());

        let state = h.service.store.load().await.unwrap();
        assert!(!state.is_empty());
        let remaining: Vec<&str> = state.registries.keys().map(String::as_str).collect();
        assert_eq!(remaining, vec!["ui"]);
        assert!(state.pushed_image("ui").is_some());
        assert!(state.pushed_image("service").is_none());
    }

    #[tokio::test]
    async fn test_outputs_after_up() {
        let h = harness(Some("1.2.3"));
        h.service.up().await.unwrap();
        let outputs = h.service.outputs().await.unwrap();
        assert_eq!(outputs["ui"].repository_name, "pulumi/console");
        assert!(h.service.provider.has_registry("pulumi/console"));
    }

    #[test]
    fn test_parse_reference() {
        let reference = parse_reference("localhost:5000/pulumi/service:1.2.3").unwrap();
        assert_eq!(reference.repository, "localhost:5000/pulumi/service");
        assert_eq!(reference.tag, "1.2.3");
        assert!(parse_reference("localhost:5000/pulumi/service").is_none());
    }
}
