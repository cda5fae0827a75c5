//! Scripted tool transport and a sandboxed crew for orchestration tests.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use crew_config::CrewConfig;
use crew_core::{ProjectId, Role};
use crew_executor::{InvocationExecutor, RetryPolicy, Transport};
use crew_process::{ExecutionResult, ProcessRegistry};

use crate::Crew;

pub(crate) const FEATURES: &str = "# Features\n\n\
### [Backup et Restauration]\n\
- **Statut**: ❌ Cassée\n\
- **Dernière vérification**: 2000-01-01\n\n\
### [Gestion des Bugs]\n\
- **Statut**: ❌ Cassée\n\
- **Dernière vérification**: 2000-01-01\n";

type Responder = Box<dyn Fn(Role, &str) -> String + Send + Sync>;

/// Answers each prompt through `responder`, keyed by the role whose template
/// opens the prompt (`ROLE:<role>`). A reply starting with `[` is emitted as
/// raw tool output; anything else is wrapped as `[{"result": reply}]`.
pub(crate) struct ScriptedTransport {
    responder: Responder,
    calls: Mutex<Vec<(Role, String)>>,
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(
        &self,
        prompt: &str,
        _work_dir: Option<&Path>,
    ) -> anyhow::Result<ExecutionResult> {
        let role: Role = prompt
            .lines()
            .next()
            .and_then(|line| line.strip_prefix("ROLE:"))
            .ok_or_else(|| anyhow::anyhow!("prompt without role template"))?
            .trim()
            .parse()?;
        let reply = (self.responder)(role, prompt);
        self.calls.lock().unwrap().push((role, prompt.to_string()));

        let output = if reply.starts_with('[') {
            reply
        } else {
            serde_json::json!([{ "type": "result", "result": reply }]).to_string()
        };
        Ok(ExecutionResult {
            output,
            stderr_output: String::new(),
            exit_code: 0,
        })
    }
}

pub(crate) struct Harness {
    _dir: tempfile::TempDir,
    pub work: PathBuf,
    pub crew: Crew,
    transport: Arc<ScriptedTransport>,
}

impl Harness {
    pub fn new(responder: impl Fn(Role, &str) -> String + Send + Sync + 'static) -> Self {
        Self::build(responder, false)
    }

    /// Like [`Harness::new`], with the data dir inside the working tree.
    pub fn with_data_in_work(
        responder: impl Fn(Role, &str) -> String + Send + Sync + 'static,
    ) -> Self {
        Self::build(responder, true)
    }

    fn build(
        responder: impl Fn(Role, &str) -> String + Send + Sync + 'static,
        data_in_work: bool,
    ) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let work = dir.path().join("work");
        std::fs::create_dir_all(&work).unwrap();
        std::fs::write(work.join("app.js"), "v1").unwrap();

        let prompts = dir.path().join("prompts");
        std::fs::create_dir_all(&prompts).unwrap();
        for role in Role::ALL {
            std::fs::write(prompts.join(format!("{role}.md")), format!("ROLE:{role}")).unwrap();
        }
        let features = dir.path().join("features.md");
        std::fs::write(&features, FEATURES).unwrap();

        let mut config = CrewConfig::default();
        config.paths.data_dir = Some(if data_in_work {
            work.join(".agent-crew")
        } else {
            dir.path().join("data")
        });
        config.paths.prompts_dir = Some(prompts);
        config.paths.features_file = Some(features);

        let transport = Arc::new(ScriptedTransport {
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
        });
        let executor = InvocationExecutor::new(
            transport.clone(),
            RetryPolicy {
                max_retries: 0,
                backoff: Duration::ZERO,
            },
        );
        let crew = Crew::with_executor(&config, executor, ProcessRegistry::new());

        Self {
            _dir: dir,
            work,
            crew,
            transport,
        }
    }

    pub fn work_dir(&self) -> String {
        self.work.to_string_lossy().into_owned()
    }

    pub fn calls(&self) -> Vec<(Role, String)> {
        self.transport.calls.lock().unwrap().clone()
    }

    pub fn roles_called(&self) -> Vec<Role> {
        self.calls().into_iter().map(|(role, _)| role).collect()
    }

    pub fn memory(&self, role: Role, project: &ProjectId) -> String {
        self.crew.store().read_memory(role, project).unwrap()
    }

    pub fn tasks(&self, role: Role, project: &ProjectId) -> String {
        self.crew.store().read_tasks(role, project).unwrap()
    }

    pub fn features(&self) -> String {
        self.crew.features().read()
    }
}
