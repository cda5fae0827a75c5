use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use crew_backup::BackupManager;
use crew_config::{CrewConfig, PermissionsConfig};
use crew_core::{CrewError, ProjectId, Role};
use crew_executor::{InvocationExecutor, StructuredResult};
use crew_memory::{
    BACKUP_FEATURE, BUG_HANDLING_FEATURE, FeatureRegistry, FeatureStatus, MemoryStore,
};
use crew_process::ProcessRegistry;
use tracing::debug;

use crate::compose::PromptBuilder;
use crate::prompts::RolePrompts;

pub(crate) const CONTEXT_SECTION: &str = "Contexte précédent";
pub(crate) const TASKS_SECTION: &str = "Tâches actuelles";
pub(crate) const FEATURES_SECTION: &str = "Features existantes";
pub(crate) const PM_REPLY_LABEL: &str = "Réponse du Chef de Projet";

/// The project an event chain works on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectScope {
    pub id: ProjectId,
    pub working_dir: PathBuf,
}

/// Everything an orchestration chain needs: storage, the tool executor and
/// the role prompt cache. Shared by reference across concurrent events.
pub struct Crew {
    store: MemoryStore,
    backups: BackupManager,
    features: FeatureRegistry,
    prompts: RolePrompts,
    executor: InvocationExecutor,
    registry: ProcessRegistry,
    permissions: PermissionsConfig,
    max_qa_attempts: u32,
}

impl Crew {
    pub fn from_config(config: &CrewConfig) -> Self {
        let registry = ProcessRegistry::new();
        let executor = InvocationExecutor::from_config(&config.tool, registry.clone());
        Self::with_executor(config, executor, registry)
    }

    /// Build a crew around a caller-supplied executor (custom transports).
    pub fn with_executor(
        config: &CrewConfig,
        executor: InvocationExecutor,
        registry: ProcessRegistry,
    ) -> Self {
        Self {
            store: MemoryStore::new(config.paths.tasks_dir()),
            backups: BackupManager::new(config.paths.backups_dir())
                .preserve(config.paths.data_dir()),
            features: FeatureRegistry::new(config.paths.features_file()),
            prompts: RolePrompts::new(config.paths.prompts_dir()),
            executor,
            registry,
            permissions: config.permissions.clone(),
            max_qa_attempts: config.qa.max_attempts,
        }
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    pub fn backups(&self) -> &BackupManager {
        &self.backups
    }

    pub fn features(&self) -> &FeatureRegistry {
        &self.features
    }

    pub fn max_qa_attempts(&self) -> u32 {
        self.max_qa_attempts
    }

    /// Stop every tool subprocess started through this crew.
    pub fn terminate_tools(&self) -> usize {
        self.registry.terminate_all()
    }

    pub fn validate_working_dir(&self, raw: &str) -> Result<PathBuf, CrewError> {
        crew_config::validate_working_dir(raw, &self.permissions)
    }

    pub(crate) fn template(&self, role: Role) -> Result<Arc<str>> {
        self.prompts.get(role)
    }

    /// Append `entry` to the role's memory, separated from earlier entries by
    /// a blank line.
    pub(crate) fn remember(&self, role: Role, project: &ProjectId, entry: &str) -> Result<()> {
        let prior = self.store.read_memory(role, project)?;
        if prior.is_empty() {
            self.store.append_memory(role, project, entry)
        } else {
            self.store
                .append_memory(role, project, &format!("\n\n{entry}"))
        }
    }

    /// Template, memory, task list and feature registry of `role`, ready for
    /// the request-specific blocks.
    pub(crate) fn briefing(&self, role: Role, project: &ProjectId) -> Result<PromptBuilder> {
        let template = self.template(role)?;
        let memory = self.store.read_memory(role, project)?;
        let tasks = self.store.read_tasks(role, project)?;
        Ok(PromptBuilder::new(&template)
            .section(CONTEXT_SECTION, &memory)
            .section(TASKS_SECTION, &tasks)
            .section(FEATURES_SECTION, &self.features.read()))
    }

    pub(crate) async fn ask(
        &self,
        scope: &ProjectScope,
        role: Role,
        prompt: &str,
    ) -> Result<StructuredResult> {
        debug!(project = %scope.id, %role, "Invoking role");
        self.executor.run(prompt, Some(&scope.working_dir)).await
    }

    /// Tell the project manager about `news` and return its reply.
    pub(crate) async fn notify_project_manager(
        &self,
        scope: &ProjectScope,
        news: &str,
    ) -> Result<String> {
        let role = Role::ProjectManager;
        let template = self.template(role)?;
        let memory = self.store.read_memory(role, &scope.id)?;
        let prompt = PromptBuilder::new(&template)
            .section(CONTEXT_SECTION, &memory)
            .section("Nouvelle information", news)
            .build();

        self.remember(role, &scope.id, news)?;
        let reply = self.ask(scope, role, &prompt).await?;
        self.remember(role, &scope.id, &format!("{PM_REPLY_LABEL}:\n{}", reply.text))?;
        Ok(reply.text)
    }

    /// Backup feature is marked working; bug handling gets `bug_handling`.
    pub(crate) fn mark_features(&self, bug_handling: FeatureStatus) -> Result<()> {
        let today = Utc::now().date_naive();
        self.features
            .set_feature_status(BACKUP_FEATURE, FeatureStatus::Working, today)?;
        self.features
            .set_feature_status(BUG_HANDLING_FEATURE, bug_handling, today)?;
        Ok(())
    }
}
