//! Post-commit reactions to challenge changes.
//!
//! Hooks run only after the transaction that produced the change has
//! committed. A failing hook is logged; the committed data stays.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::entity::{challenge, challenge_phase};

/// Values of the fields whose change requires evaluation workers to reload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchedFields {
    pub evaluation_script: Option<String>,
    /// Annotation hash per phase id.
    pub annotations: BTreeMap<i32, Option<String>>,
}

impl WatchedFields {
    pub fn capture(challenge: &challenge::Model, phases: &[challenge_phase::Model]) -> Self {
        Self {
            evaluation_script: Some(challenge.evaluation_script.clone()),
            annotations: phases
                .iter()
                .map(|p| (p.id, p.test_annotation.clone()))
                .collect(),
        }
    }
}

/// A committed challenge and what its watched fields were before the change.
///
/// `prior` is `None` for a challenge that did not exist before.
#[derive(Debug, Clone)]
pub struct ChallengeChange {
    pub challenge: challenge::Model,
    pub phases: Vec<challenge_phase::Model>,
    pub prior: Option<WatchedFields>,
}

impl ChallengeChange {
    pub fn created(challenge: challenge::Model, phases: Vec<challenge_phase::Model>) -> Self {
        Self {
            challenge,
            phases,
            prior: None,
        }
    }

    pub fn is_creation(&self) -> bool {
        self.prior.is_none()
    }

    pub fn evaluation_script_changed(&self) -> bool {
        self.prior.as_ref().is_some_and(|prior| {
            prior.evaluation_script.as_deref() != Some(self.challenge.evaluation_script.as_str())
        })
    }

    /// Ids of phases whose annotation file was replaced.
    pub fn changed_annotations(&self) -> Vec<i32> {
        let Some(prior) = &self.prior else {
            return Vec::new();
        };
        self.phases
            .iter()
            .filter(|p| prior.annotations.get(&p.id) != Some(&p.test_annotation))
            .map(|p| p.id)
            .collect()
    }

    pub fn watched_fields_changed(&self) -> bool {
        self.evaluation_script_changed() || !self.changed_annotations().is_empty()
    }
}

#[async_trait]
pub trait ChallengeHook: Send + Sync {
    fn name(&self) -> &'static str;

    async fn after_commit(&self, change: &ChallengeChange) -> anyhow::Result<()>;
}

#[derive(Clone, Default)]
pub struct HookRegistry {
    hooks: Vec<Arc<dyn ChallengeHook>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in hooks.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(WorkerRestartHook));
        registry
    }

    pub fn register(&mut self, hook: Arc<dyn ChallengeHook>) {
        self.hooks.push(hook);
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub async fn run(&self, change: &ChallengeChange) {
        for hook in &self.hooks {
            if let Err(e) = hook.after_commit(change).await {
                warn!(
                    hook = hook.name(),
                    challenge_id = change.challenge.id,
                    error = %e,
                    "Post-commit hook failed"
                );
            }
        }
    }
}

/// Asks the evaluation workers of a challenge's queue to reload when its
/// script or an annotation file changed.
pub struct WorkerRestartHook;

#[async_trait]
impl ChallengeHook for WorkerRestartHook {
    fn name(&self) -> &'static str {
        "worker_restart"
    }

    async fn after_commit(&self, change: &ChallengeChange) -> anyhow::Result<()> {
        if !change.watched_fields_changed() {
            return Ok(());
        }
        let queue = change
            .challenge
            .queue
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("challenge {} has no queue", change.challenge.id))?;
        info!(
            challenge_id = change.challenge.id,
            queue,
            script_changed = change.evaluation_script_changed(),
            phases = ?change.changed_annotations(),
            "Restarting evaluation workers"
        );
        Ok(())
    }
}
