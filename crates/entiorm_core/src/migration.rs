//! Schema migration chain.
//!
//! Stores record their schema version under the `dbversion` config key.
//! A [`MigrationStep`] moves a store from one version to the next; the
//! [`MigrationChain`] follows steps from the stored version until no step
//! starts at the version reached.
//!
//! Migrations are:
//! - **Forward-only**: there is no rollback
//! - **Persisted per step**: `dbversion` is written after every successful
//!   step, so a failure leaves the earlier steps applied
//! - **Explicit**: steps are registered in code, one per source version
//!
//! ## Usage
//!
//! ```rust
//! use async_trait::async_trait;
//! use entiorm_core::{CoreResult, MigrationChain, MigrationStep};
//! use entiorm_storage::{InMemoryBackend, StorageBackend};
//!
//! struct AddEmail;
//!
//! #[async_trait]
//! impl MigrationStep for AddEmail {
//!     fn source_version(&self) -> &str { "1" }
//!     fn target_version(&self) -> &str { "2" }
//!     async fn perform(&self, _backend: &dyn StorageBackend) -> CoreResult<bool> {
//!         Ok(true)
//!     }
//! }
//!
//! let runtime = tokio::runtime::Runtime::new().unwrap();
//! runtime.block_on(async {
//!     let backend = InMemoryBackend::new();
//!     backend.connect().await.unwrap();
//!
//!     let mut chain = MigrationChain::new();
//!     chain.register(Box::new(AddEmail)).unwrap();
//!     let result = chain.run(&backend, "1").await.unwrap();
//!     assert_eq!(result.final_version, "2");
//! });
//! ```

use crate::error::{CoreError, CoreResult};
use async_trait::async_trait;
use entiorm_storage::{StorageBackend, DB_VERSION_KEY};
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, info, warn};

/// One step of the migration chain.
#[async_trait]
pub trait MigrationStep: Send + Sync {
    /// Version this step migrates from.
    fn source_version(&self) -> &str;

    /// Version this step migrates to.
    fn target_version(&self) -> &str;

    /// Returns an optional description.
    fn description(&self) -> Option<&str> {
        None
    }

    /// Applies the step. Returning false aborts the chain.
    async fn perform(&self, backend: &dyn StorageBackend) -> CoreResult<bool>;
}

/// Information about a registered step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationInfo {
    /// Version the step migrates from.
    pub source_version: String,
    /// Version the step migrates to.
    pub target_version: String,
    /// Description of what this step does.
    pub description: Option<String>,
}

/// Outcome of [`MigrationChain::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRunResult {
    /// Applied steps as `(source, target)`, in order.
    pub applied: Vec<(String, String)>,
    /// Version the store ended at.
    pub final_version: String,
}

impl MigrationRunResult {
    /// Number of steps applied.
    #[must_use]
    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }
}

/// Ordered set of migration steps, at most one per source version.
#[derive(Default)]
pub struct MigrationChain {
    steps: Vec<Box<dyn MigrationStep>>,
}

impl fmt::Debug for MigrationChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.list()).finish()
    }
}

impl MigrationChain {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a step.
    ///
    /// # Errors
    ///
    /// Returns an error if a step with the same source version exists.
    pub fn register(&mut self, step: Box<dyn MigrationStep>) -> CoreResult<()> {
        if let Some(existing) = self.find(step.source_version()) {
            return Err(CoreError::migration(
                step.source_version(),
                step.target_version(),
                format!(
                    "a step from {} to {} is already registered",
                    existing.source_version(),
                    existing.target_version()
                ),
            ));
        }
        debug!(
            from = step.source_version(),
            to = step.target_version(),
            "migration step registered"
        );
        self.steps.push(step);
        Ok(())
    }

    /// The step starting at `version`, if any.
    #[must_use]
    pub fn find(&self, version: &str) -> Option<&dyn MigrationStep> {
        self.steps
            .iter()
            .find(|s| s.source_version() == version)
            .map(AsRef::as_ref)
    }

    /// Returns the registered steps in registration order.
    #[must_use]
    pub fn list(&self) -> Vec<MigrationInfo> {
        self.steps
            .iter()
            .map(|s| MigrationInfo {
                source_version: s.source_version().to_string(),
                target_version: s.target_version().to_string(),
                description: s.description().map(String::from),
            })
            .collect()
    }

    /// Number of registered steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns true if no step is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Checks that the steps form one linear chain.
    ///
    /// Registration order does not matter: the chain is followed from the
    /// only source version that no step targets.
    ///
    /// # Errors
    ///
    /// Returns an error if a step targets its own source, if there is not
    /// exactly one starting version, if following the chain revisits a
    /// version, or if some step is not reachable from the start.
    pub fn validate(&self) -> CoreResult<()> {
        for step in &self.steps {
            if step.source_version() == step.target_version() {
                return Err(CoreError::migration(
                    step.source_version(),
                    step.target_version(),
                    "step does not change the version",
                ));
            }
        }

        let targets: HashSet<&str> = self.steps.iter().map(|s| s.target_version()).collect();
        let mut heads = self
            .steps
            .iter()
            .filter(|s| !targets.contains(s.source_version()));
        let Some(head) = heads.next() else {
            return match self.steps.first() {
                None => Ok(()),
                Some(step) => Err(CoreError::migration(
                    step.source_version(),
                    step.target_version(),
                    "migration chain has no starting version",
                )),
            };
        };
        if let Some(other) = heads.next() {
            return Err(CoreError::migration(
                head.source_version(),
                other.source_version(),
                "migration chain has more than one starting version",
            ));
        }

        let mut visited = HashSet::from([head.source_version()]);
        let mut reached = 1;
        let mut current = head.target_version();
        while let Some(step) = self.find(current) {
            if !visited.insert(current) {
                return Err(CoreError::migration(
                    current,
                    step.target_version(),
                    "migration chain revisits a version",
                ));
            }
            reached += 1;
            current = step.target_version();
        }
        if reached != self.steps.len() {
            return Err(CoreError::migration(
                head.source_version(),
                current,
                "migration chain has unreachable steps",
            ));
        }
        Ok(())
    }

    /// Runs every step reachable from `from`.
    ///
    /// After each successful step, its target version is persisted as
    /// `dbversion`. The run stops when no step starts at the version
    /// reached; with no step for `from` nothing happens.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Migration`] if a step reports failure or if the
    /// chain revisits a version. Steps applied before the failure stay
    /// applied.
    pub async fn run(
        &self,
        backend: &dyn StorageBackend,
        from: &str,
    ) -> CoreResult<MigrationRunResult> {
        let mut current = from.to_string();
        let mut visited = HashSet::from([current.clone()]);
        let mut applied = Vec::new();

        while let Some(step) = self.find(&current) {
            let target = step.target_version().to_string();
            if !visited.insert(target.clone()) {
                return Err(CoreError::migration(
                    &current,
                    &target,
                    "migration chain revisits a version",
                ));
            }

            info!(from = %current, to = %target, "running migration step");
            if !step.perform(backend).await? {
                warn!(from = %current, to = %target, "migration step reported failure");
                return Err(CoreError::migration(
                    &current,
                    &target,
                    "step reported failure",
                ));
            }
            backend.set_config(DB_VERSION_KEY, &target).await?;

            applied.push((current, target.clone()));
            current = target;
        }

        Ok(MigrationRunResult {
            applied,
            final_version: current,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use entiorm_storage::InMemoryBackend;
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct Step {
        from: &'static str,
        to: &'static str,
        outcome: bool,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Step {
        fn boxed(
            from: &'static str,
            to: &'static str,
            log: &Arc<Mutex<Vec<String>>>,
        ) -> Box<dyn MigrationStep> {
            Box::new(Self {
                from,
                to,
                outcome: true,
                log: Arc::clone(log),
            })
        }

        fn failing(
            from: &'static str,
            to: &'static str,
            log: &Arc<Mutex<Vec<String>>>,
        ) -> Box<dyn MigrationStep> {
            Box::new(Self {
                from,
                to,
                outcome: false,
                log: Arc::clone(log),
            })
        }
    }

    #[async_trait]
    impl MigrationStep for Step {
        fn source_version(&self) -> &str {
            self.from
        }

        fn target_version(&self) -> &str {
            self.to
        }

        async fn perform(&self, _backend: &dyn StorageBackend) -> CoreResult<bool> {
            self.log.lock().push(format!("{}->{}", self.from, self.to));
            Ok(self.outcome)
        }
    }

    async fn connected() -> InMemoryBackend {
        let backend = InMemoryBackend::new();
        backend.connect().await.unwrap();
        backend
    }

    async fn stored_version(backend: &InMemoryBackend) -> Option<String> {
        backend
            .get_config(DB_VERSION_KEY)
            .await
            .unwrap()
            .map(|e| e.value)
    }

    #[tokio::test]
    async fn cascade_runs_each_step_once_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = MigrationChain::new();
        // Registration order does not decide execution order.
        chain.register(Step::boxed("1", "2", &log)).unwrap();
        chain.register(Step::boxed("0", "1", &log)).unwrap();

        let backend = connected().await;
        let result = chain.run(&backend, "0").await.unwrap();

        assert_eq!(*log.lock(), vec!["0->1", "1->2"]);
        assert_eq!(result.final_version, "2");
        assert_eq!(result.applied_count(), 2);
        assert_eq!(stored_version(&backend).await.as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn failure_keeps_earlier_versions() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = MigrationChain::new();
        chain.register(Step::boxed("0", "1", &log)).unwrap();
        chain.register(Step::failing("1", "2", &log)).unwrap();
        chain.register(Step::boxed("2", "3", &log)).unwrap();

        let backend = connected().await;
        let err = chain.run(&backend, "0").await.unwrap_err();

        assert!(matches!(
            err,
            CoreError::Migration { ref source_version, ref target_version, .. }
                if source_version == "1" && target_version == "2"
        ));
        assert_eq!(*log.lock(), vec!["0->1", "1->2"]);
        assert_eq!(stored_version(&backend).await.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn cycle_is_detected_before_perform() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = MigrationChain::new();
        chain.register(Step::boxed("a", "b", &log)).unwrap();
        chain.register(Step::boxed("b", "a", &log)).unwrap();

        let backend = connected().await;
        let err = chain.run(&backend, "a").await.unwrap_err();

        assert!(matches!(err, CoreError::Migration { .. }));
        assert_eq!(*log.lock(), vec!["a->b"]);
        assert_eq!(stored_version(&backend).await.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn no_step_is_a_no_op() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = MigrationChain::new();
        chain.register(Step::boxed("0", "1", &log)).unwrap();

        let backend = connected().await;
        let result = chain.run(&backend, "5").await.unwrap();

        assert!(result.applied.is_empty());
        assert_eq!(result.final_version, "5");
        assert!(log.lock().is_empty());
        assert!(stored_version(&backend).await.is_none());
    }

    #[test]
    fn duplicate_source_is_rejected() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = MigrationChain::new();
        chain.register(Step::boxed("0", "1", &log)).unwrap();
        assert!(chain.register(Step::boxed("0", "9", &log)).is_err());
        assert_eq!(chain.len(), 1);
        assert_eq!(chain.find("0").map(|s| s.target_version()), Some("1"));
    }

    #[test]
    fn validate_linear_chain() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = MigrationChain::new();
        assert!(chain.validate().is_ok());

        chain.register(Step::boxed("0", "1", &log)).unwrap();
        chain.register(Step::boxed("1", "2", &log)).unwrap();
        assert!(chain.validate().is_ok());

        chain.register(Step::boxed("5", "6", &log)).unwrap();
        assert!(chain.validate().is_err());
    }

    #[test]
    fn validate_ignores_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = MigrationChain::new();
        chain.register(Step::boxed("2", "3", &log)).unwrap();
        chain.register(Step::boxed("0", "1", &log)).unwrap();
        chain.register(Step::boxed("1", "2", &log)).unwrap();
        assert!(chain.validate().is_ok());
    }

    #[test]
    fn validate_rejects_branches_and_loops() {
        let log = Arc::new(Mutex::new(Vec::new()));

        let mut merging = MigrationChain::new();
        merging.register(Step::boxed("0", "2", &log)).unwrap();
        merging.register(Step::boxed("1", "2", &log)).unwrap();
        assert!(merging.validate().is_err());

        let mut looping = MigrationChain::new();
        looping.register(Step::boxed("1", "2", &log)).unwrap();
        looping.register(Step::boxed("2", "1", &log)).unwrap();
        assert!(looping.validate().is_err());

        let mut tail_loop = MigrationChain::new();
        tail_loop.register(Step::boxed("0", "1", &log)).unwrap();
        tail_loop.register(Step::boxed("1", "2", &log)).unwrap();
        tail_loop.register(Step::boxed("2", "1", &log)).unwrap();
        assert!(matches!(
            tail_loop.validate(),
            Err(CoreError::Migration { .. })
        ));
    }

    #[test]
    fn validate_rejects_self_loop() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = MigrationChain::new();
        chain.register(Step::boxed("3", "3", &log)).unwrap();
        assert!(chain.validate().is_err());
    }

    #[test]
    fn list_keeps_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = MigrationChain::new();
        chain.register(Step::boxed("1", "2", &log)).unwrap();
        chain.register(Step::boxed("0", "1", &log)).unwrap();

        let sources: Vec<_> = chain
            .list()
            .into_iter()
            .map(|info| info.source_version)
            .collect();
        assert_eq!(sources, vec!["1", "0"]);
    }
}
