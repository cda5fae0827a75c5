//! Role routing: entry points for new projects and agent-to-agent events.
//!
//! An event is first delivered to its target role. The ordered rules in
//! [`decide`] then pick exactly one follow-up chain; every invocation in a
//! chain runs after the previous one has been recorded in memory.

use std::path::PathBuf;

use anyhow::Result;
use chrono::Utc;
use crew_core::{CrewError, ProjectId, Role};
use crew_memory::{FeatureStatus, ProjectMeta, ProjectStatus};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::compose::PromptBuilder;
use crate::context::{CONTEXT_SECTION, Crew, PM_REPLY_LABEL, ProjectScope, TASKS_SECTION};
use crate::intent::{Intent, reports_bug};
use crate::qa_loop::{BugCycleState, BugReport};

/// A message from one role to another within a project.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentEvent {
    pub from_role: Role,
    pub to_role: Role,
    pub project_id: ProjectId,
    pub message: String,
    /// Falls back to the directory recorded when the project was created.
    #[serde(default)]
    pub working_dir: Option<String>,
    /// Explicit tag; when absent the message is searched for marker phrases.
    #[serde(default)]
    pub intent: Option<Intent>,
    /// Correction attempts already made for the reported defect.
    #[serde(default)]
    pub qa_attempts: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteDecision {
    /// Developer finished a task: backup, QA recipe, then bug cycle or PM notice.
    TaskCompleted,
    /// QA reported a bug: bug cycle.
    BugReported,
    /// Product owner proposed a task: PM evaluates it.
    TaskProposed,
    /// A non-PM role answered: PM is told.
    SubordinateFinished,
    /// Reply only.
    Direct,
}

/// First matching rule wins.
pub fn decide(event: &AgentEvent) -> RouteDecision {
    let signalled = |intent: Intent| intent.signalled(&event.message, event.intent);

    if event.from_role.is_developer() && signalled(Intent::TaskCompleted) {
        RouteDecision::TaskCompleted
    } else if event.from_role == Role::Qa && signalled(Intent::BugDetected) {
        RouteDecision::BugReported
    } else if event.from_role == Role::ProductOwner && signalled(Intent::NewTask) {
        RouteDecision::TaskProposed
    } else if event.to_role != Role::ProjectManager {
        RouteDecision::SubordinateFinished
    } else {
        RouteDecision::Direct
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptOutcome {
    pub project_id: ProjectId,
    pub response: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventOutcome {
    pub project_id: ProjectId,
    pub decision: RouteDecision,
    /// Reply of the event's target role.
    pub response: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qa_response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_manager_response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub developer_response: Option<String>,
    /// Snapshot taken before the QA recipe.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_created: Option<PathBuf>,
    pub restored: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bug_cycle: Option<BugCycleState>,
    /// Counter to send with the next report on the same defect (zero once
    /// the work was restored).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qa_attempts: Option<u32>,
}

impl EventOutcome {
    fn new(project_id: ProjectId, decision: RouteDecision, response: String) -> Self {
        Self {
            project_id,
            decision,
            response,
            qa_response: None,
            project_manager_response: None,
            developer_response: None,
            backup_created: None,
            restored: false,
            bug_cycle: None,
            qa_attempts: None,
        }
    }
}

impl Crew {
    /// Start a project from a user request and hand it to the project manager.
    pub async fn submit_prompt(&self, prompt: &str, working_dir: &str) -> Result<PromptOutcome> {
        if prompt.trim().is_empty() {
            return Err(CrewError::Validation("Prompt is required".into()).into());
        }
        let working_dir = self.validate_working_dir(working_dir)?;

        let scope = ProjectScope {
            id: ProjectId::new(),
            working_dir,
        };
        self.store().save_project(&ProjectMeta {
            id: scope.id.clone(),
            working_dir: scope.working_dir.clone(),
            created_at: Utc::now(),
        })?;
        info!(project = %scope.id, working_dir = %scope.working_dir.display(), "Created project");

        let pm = Role::ProjectManager;
        let request = format!(
            "Nouveau projet (ID: {})\n\nDossier de travail: {}\n\nDemande de l'utilisateur:\n{prompt}",
            scope.id,
            scope.working_dir.display()
        );
        let full_prompt = PromptBuilder::new(&self.template(pm)?).text(&request).build();

        self.remember(pm, &scope.id, &request)?;
        let reply = self.ask(&scope, pm, &full_prompt).await?;
        self.remember(pm, &scope.id, &format!("{PM_REPLY_LABEL}:\n{}", reply.text))?;

        Ok(PromptOutcome {
            project_id: scope.id,
            response: reply.text,
        })
    }

    /// Deliver `event` to its target role and run the follow-up chain.
    pub async fn handle_event(&self, event: &AgentEvent) -> Result<EventOutcome> {
        if event.message.trim().is_empty() {
            return Err(CrewError::Validation("Message is required".into()).into());
        }
        let scope = self.resolve_scope(event)?;
        let decision = decide(event);
        info!(
            project = %scope.id,
            from = %event.from_role,
            to = %event.to_role,
            ?decision,
            "Routing event"
        );

        let to = event.to_role;
        let memory = self.store().read_memory(to, &scope.id)?;
        let outbound = format!("Message de {}:\n{}", event.from_role, event.message);
        let prompt = PromptBuilder::new(&self.template(to)?)
            .text(&outbound)
            .section(CONTEXT_SECTION, &memory)
            .build();

        self.remember(to, &scope.id, &outbound)?;
        let reply = self.ask(&scope, to, &prompt).await?;
        self.remember(to, &scope.id, &format!("Réponse de {to}:\n{}", reply.text))?;

        let mut outcome = EventOutcome::new(scope.id.clone(), decision, reply.text);
        match decision {
            RouteDecision::TaskCompleted => {
                self.after_task_completed(&scope, event.from_role, &mut outcome)
                    .await?;
            }
            RouteDecision::BugReported => {
                let report = BugReport::new(event.message.clone(), event.qa_attempts);
                self.run_bug_cycle(&scope, &report, &mut outcome).await?;
            }
            RouteDecision::TaskProposed => {
                let pm_reply = self.propose_task(&scope, &outcome.response).await?;
                outcome.project_manager_response = Some(pm_reply);
            }
            RouteDecision::SubordinateFinished => {
                let news = format!(
                    "L'agent {to} a terminé sa tâche et répond:\n{}",
                    outcome.response
                );
                outcome.project_manager_response =
                    Some(self.notify_project_manager(&scope, &news).await?);
            }
            RouteDecision::Direct => {}
        }
        Ok(outcome)
    }

    pub fn project_status(&self, project: &ProjectId) -> Result<ProjectStatus> {
        self.store().project_status(project)
    }

    fn resolve_scope(&self, event: &AgentEvent) -> Result<ProjectScope> {
        let raw = match event.working_dir.as_deref().filter(|dir| !dir.trim().is_empty()) {
            Some(dir) => dir.to_string(),
            None => self
                .store()
                .load_project(&event.project_id)?
                .map(|meta| meta.working_dir.to_string_lossy().into_owned())
                .ok_or_else(|| CrewError::Validation("Working directory is required".into()))?,
        };
        Ok(ProjectScope {
            id: event.project_id.clone(),
            working_dir: self.validate_working_dir(&raw)?,
        })
    }

    async fn after_task_completed(
        &self,
        scope: &ProjectScope,
        developer: Role,
        outcome: &mut EventOutcome,
    ) -> Result<()> {
        let snapshot = self
            .backups()
            .create_backup(&scope.id, developer, &scope.working_dir)?;
        outcome.backup_created = Some(snapshot.path);

        let completion = outcome.response.clone();
        let qa = Role::Qa;
        let prompt = self
            .briefing(qa, &scope.id)?
            .text(&format!(
                "Nouvelle tâche de recette:\n\
                 Le {developer} vient de terminer une tâche. Veuillez effectuer une recette complète qui inclut:\n\
                 1. Vérification de la nouvelle fonctionnalité\n\
                 2. Tests de régression sur toutes les features existantes\n\n\
                 Voici les détails de la tâche terminée:\n{completion}\n\n\
                 Veuillez tester le code et signaler tout bug trouvé en commençant votre message par \"Bug détecté :\". \
                 Si aucun bug n'est trouvé, signalez simplement que la recette est passée avec succès."
            ))
            .build();

        self.remember(
            qa,
            &scope.id,
            &format!("Nouvelle tâche de recette pour le {developer}:\n{completion}"),
        )?;
        let qa_reply = self.ask(scope, qa, &prompt).await?;
        self.remember(qa, &scope.id, &format!("Réponse du QA:\n{}", qa_reply.text))?;
        outcome.qa_response = Some(qa_reply.text.clone());

        if reports_bug(&qa_reply) {
            let report = BugReport::new(qa_reply.text, 0);
            return self.run_bug_cycle(scope, &report, outcome).await;
        }

        self.mark_features(FeatureStatus::Working)?;
        outcome.bug_cycle = Some(BugCycleState::Resolved);
        let news = format!("Le QA a validé le code du {developer}:\n{}", qa_reply.text);
        outcome.project_manager_response = Some(self.notify_project_manager(scope, &news).await?);
        Ok(())
    }

    async fn run_bug_cycle(
        &self,
        scope: &ProjectScope,
        report: &BugReport,
        outcome: &mut EventOutcome,
    ) -> Result<()> {
        let cycle = self.handle_bug_report(scope, report).await?;
        outcome.project_manager_response = Some(cycle.project_manager_response);
        outcome.developer_response = Some(cycle.developer_response);
        outcome.restored = cycle.restored;
        outcome.bug_cycle = Some(cycle.state);
        outcome.qa_attempts = Some(cycle.attempts);
        Ok(())
    }

    /// The project manager weighs a product-owner proposal; its reply becomes
    /// the new PM task list.
    async fn propose_task(&self, scope: &ProjectScope, proposal: &str) -> Result<String> {
        let pm = Role::ProjectManager;
        let template = self.template(pm)?;
        let memory = self.store().read_memory(pm, &scope.id)?;
        let tasks = self.store().read_tasks(pm, &scope.id)?;
        let prompt = PromptBuilder::new(&template)
            .section(CONTEXT_SECTION, &memory)
            .section(TASKS_SECTION, &tasks)
            .section("Nouvelle proposition de tâche du Product Owner", proposal)
            .text("Veuillez évaluer cette proposition et mettre à jour la liste des tâches si nécessaire.")
            .build();

        self.remember(
            pm,
            &scope.id,
            &format!("Proposition de tâche du Product Owner:\n{proposal}"),
        )?;
        let reply = self.ask(scope, pm, &prompt).await?;
        self.store().replace_tasks(pm, &scope.id, &reply.text)?;
        self.remember(pm, &scope.id, &format!("{PM_REPLY_LABEL}:\n{}", reply.text))?;
        Ok(reply.text)
    }
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
