//! Bug-fix cycle: a QA bug report is turned into correction tasks for the
//! project manager and one developer, until the attempt budget runs out and
//! the developer's work is rolled back to its latest backup.

use anyhow::Result;
use crew_backup::BackupSnapshot;
use crew_core::Role;
use crew_memory::FeatureStatus;
use serde::Serialize;
use tracing::{info, warn};

use crate::context::{Crew, PM_REPLY_LABEL, ProjectScope};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BugCycleState {
    /// Report received, not yet acted upon.
    Reported,
    /// Correction tasks handed to the project manager and developer.
    Dispatched,
    /// QA passed the work.
    Resolved,
    /// Budget exhausted; the developer's tree was restored.
    Escalated,
}

/// A bug report together with its position in the correction cycle.
#[derive(Debug, Clone)]
pub struct BugReport {
    pub text: String,
    /// Correction attempts already made for this defect.
    pub attempts: u32,
}

impl BugReport {
    pub fn new(text: impl Into<String>, attempts: u32) -> Self {
        Self {
            text: text.into(),
            attempts,
        }
    }

    /// Frontend developer when the report mentions "frontend", else backend.
    pub fn target_role(&self) -> Role {
        if self.text.to_lowercase().contains("frontend") {
            Role::FrontendDeveloper
        } else {
            Role::BackendDeveloper
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QaLoopOutcome {
    pub state: BugCycleState,
    pub target_role: Role,
    pub project_manager_response: String,
    pub developer_response: String,
    /// Counter to pass with the next report on the same defect; zero after a
    /// restore.
    pub attempts: u32,
    pub restored: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restored_snapshot: Option<BackupSnapshot>,
}

impl Crew {
    /// Advance the correction cycle for `report`.
    ///
    /// With `attempts >= max` the target developer's latest backup is
    /// restored, no tool is invoked and the counter resets to zero; a missing
    /// backup is an error.
    /// Otherwise the project manager and then the developer are each invoked
    /// once and the returned counter is `attempts + 1`.
    pub async fn handle_bug_report(
        &self,
        scope: &ProjectScope,
        report: &BugReport,
    ) -> Result<QaLoopOutcome> {
        let target = report.target_role();
        let max = self.max_qa_attempts();
        info!(
            project = %scope.id,
            %target,
            attempts = report.attempts,
            max,
            state = ?BugCycleState::Reported,
            "Bug report received"
        );

        if report.attempts >= max {
            return self.escalate(scope, report, target);
        }
        self.dispatch(scope, report, target).await
    }

    fn escalate(
        &self,
        scope: &ProjectScope,
        report: &BugReport,
        target: Role,
    ) -> Result<QaLoopOutcome> {
        let snapshot = self
            .backups()
            .restore_latest(&scope.id, target, &scope.working_dir)?;
        let message = format!(
            "Le code est devenu inutilisable après {} tentatives de correction. Restauration du backup {}.",
            report.attempts, snapshot.name
        );
        warn!(project = %scope.id, %target, snapshot = %snapshot.name, "Correction budget exhausted, work restored");

        self.remember(
            Role::ProjectManager,
            &scope.id,
            &format!("{message}\n\nSignalement de bug du QA:\n{}", report.text),
        )?;
        self.mark_features(FeatureStatus::Broken)?;

        Ok(QaLoopOutcome {
            state: BugCycleState::Escalated,
            target_role: target,
            project_manager_response: format!(
                "Le code a été restauré à son état précédent suite à des problèmes persistants. {message}"
            ),
            developer_response: "Votre code a été restauré à son état précédent. \
                 Veuillez reprendre le développement à partir de ce point."
                .to_string(),
            attempts: 0,
            restored: true,
            restored_snapshot: Some(snapshot),
        })
    }

    async fn dispatch(
        &self,
        scope: &ProjectScope,
        report: &BugReport,
        target: Role,
    ) -> Result<QaLoopOutcome> {
        let attempt = format!("tentative {}/{}", report.attempts + 1, self.max_qa_attempts());

        let pm = Role::ProjectManager;
        let prompt = self
            .briefing(pm, &scope.id)?
            .section(
                &format!("Signalement de bug du QA ({attempt})"),
                &report.text,
            )
            .text(&format!(
                "Veuillez créer une nouvelle tâche pour le {target} afin de corriger ce bug."
            ))
            .build();
        self.remember(pm, &scope.id, &format!("Signalement de bug du QA:\n{}", report.text))?;
        let pm_reply = self.ask(scope, pm, &prompt).await?;
        self.store().replace_tasks(pm, &scope.id, &pm_reply.text)?;
        self.remember(pm, &scope.id, &format!("{PM_REPLY_LABEL}:\n{}", pm_reply.text))?;

        let prompt = self
            .briefing(target, &scope.id)?
            .section(
                &format!("Nouvelle tâche de correction de bug ({attempt})"),
                &report.text,
            )
            .text("Veuillez mettre à jour votre liste de tâches avec cette nouvelle tâche de correction.")
            .build();
        self.remember(
            target,
            &scope.id,
            &format!("Nouvelle tâche de correction de bug:\n{}", report.text),
        )?;
        let dev_reply = self.ask(scope, target, &prompt).await?;
        self.store().replace_tasks(target, &scope.id, &dev_reply.text)?;
        self.remember(
            target,
            &scope.id,
            &format!("Réponse du développeur:\n{}", dev_reply.text),
        )?;

        info!(project = %scope.id, %target, attempt = %attempt, state = ?BugCycleState::Dispatched, "Correction dispatched");
        Ok(QaLoopOutcome {
            state: BugCycleState::Dispatched,
            target_role: target,
            project_manager_response: pm_reply.text,
            developer_response: dev_reply.text,
            attempts: report.attempts + 1,
            restored: false,
            restored_snapshot: None,
        })
    }
}

#[cfg(test)]
#[path = "qa_loop_tests.rs"]
mod tests;
