//! ProjectSupervisor: manages generated projects as child processes
//! (spec §4.10). Grounded on the subprocess spawn/graceful-kill shape used
//! elsewhere in this codebase for managed child processes.

use crate::error::{Result, SupervisorError};

use tokio::process::{Child, Command};
use tokio::sync::Mutex;

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

/// Grace period given to a project after a terminate signal before it's killed.
const STOP_GRACE: Duration = Duration::from_secs(5);
/// Total budget `stop_all` has to bring every running project down.
const STOP_ALL_BUDGET: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Generating,
    Ready,
    Running,
    Stopped,
    Failed,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ProjectHandle {
    pub name: String,
    pub schema_id: String,
    pub output_path: String,
    pub status: ProjectStatus,
    pub pid: Option<u32>,
    pub port: Option<u16>,
    pub url: Option<String>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
}

pub struct RunOptions {
    pub port: Option<u16>,
    pub env: HashMap<String, String>,
    pub build_first: bool,
}

struct RunningProject {
    handle: ProjectHandle,
    child: Option<Child>,
}

/// Tracks every generated project's child process by name behind a mutex
/// (spec §5's shared-resource policy).
pub struct ProjectSupervisor {
    projects: Mutex<HashMap<String, RunningProject>>,
}

impl ProjectSupervisor {
    pub fn new() -> Self {
        Self {
            projects: Mutex::new(HashMap::new()),
        }
    }

    /// Register a project that exists on disk but has no running process yet.
    pub async fn register(&self, name: &str, schema_id: &str, output_path: PathBuf) {
        let mut projects = self.projects.lock().await;
        projects.insert(
            name.to_string(),
            RunningProject {
                handle: ProjectHandle {
                    name: name.to_string(),
                    schema_id: schema_id.to_string(),
                    output_path: output_path.display().to_string(),
                    status: ProjectStatus::Ready,
                    pid: None,
                    port: None,
                    url: None,
                    started_at: None,
                },
                child: None,
            },
        );
    }

    /// Build (if requested) then launch a project's binary.
    pub async fn run(&self, name: &str, options: RunOptions) -> Result<ProjectHandle> {
        let mut projects = self.projects.lock().await;
        let entry = projects
            .get_mut(name)
            .ok_or_else(|| SupervisorError::UnknownProject(name.to_string()))?;

        if entry.handle.status == ProjectStatus::Running {
            return Err(SupervisorError::AlreadyRunning(name.to_string()).into());
        }

        let output_path = PathBuf::from(&entry.handle.output_path);

        if options.build_first {
            let status = Command::new("cargo")
                .arg("build")
                .arg("--release")
                .current_dir(&output_path)
                .stdout(Stdio::null())
                .stderr(Stdio::piped())
                .status()
                .await
                .map_err(|error| SupervisorError::BuildFailed(name.to_string(), error.to_string()))?;
            if !status.success() {
                entry.handle.status = ProjectStatus::Failed;
                return Err(SupervisorError::BuildFailed(name.to_string(), format!("exit status {status}")).into());
            }
        }

        let binary = output_path.join("target/release").join(&entry.handle.name);
        let mut command = Command::new(binary);
        command
            .current_dir(&output_path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in &options.env {
            command.env(key, value);
        }
        if let Some(port) = options.port {
            command.env("PORT", port.to_string());
        }

        let mut child = command
            .spawn()
            .map_err(|error| SupervisorError::SpawnFailed(name.to_string(), error.to_string()))?;

        let pid = child.id();
        capture_output_to_log(&mut child, name);

        entry.handle.status = ProjectStatus::Running;
        entry.handle.pid = pid;
        entry.handle.port = options.port;
        entry.handle.url = options.port.map(|port| format!("http://localhost:{port}"));
        entry.handle.started_at = Some(chrono::Utc::now());
        entry.child = Some(child);

        Ok(entry.handle.clone())
    }

    pub async fn status(&self, name: &str) -> Result<ProjectHandle> {
        let projects = self.projects.lock().await;
        projects
            .get(name)
            .map(|p| p.handle.clone())
            .ok_or_else(|| SupervisorError::UnknownProject(name.to_string()).into())
    }

    pub async fn list(&self) -> Vec<ProjectHandle> {
        self.projects.lock().await.values().map(|p| p.handle.clone()).collect()
    }

    /// Terminate then, if necessary, kill a running project's process.
    pub async fn stop(&self, name: &str) -> Result<ProjectHandle> {
        let mut projects = self.projects.lock().await;
        let entry = projects
            .get_mut(name)
            .ok_or_else(|| SupervisorError::UnknownProject(name.to_string()))?;

        if let Some(mut child) = entry.child.take() {
            terminate(&mut child).await;
        }
        entry.handle.status = ProjectStatus::Stopped;
        entry.handle.pid = None;
        Ok(entry.handle.clone())
    }

    /// Stop every running project; must complete within [`STOP_ALL_BUDGET`].
    pub async fn stop_all(&self) {
        let names: Vec<String> = {
            let projects = self.projects.lock().await;
            projects
                .iter()
                .filter(|(_, p)| p.handle.status == ProjectStatus::Running)
                .map(|(name, _)| name.clone())
                .collect()
        };

        let _ = tokio::time::timeout(STOP_ALL_BUDGET, async {
            for name in names {
                let _ = self.stop(&name).await;
            }
        })
        .await;
    }
}

impl Default for ProjectSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

async fn terminate(child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        unsafe {
            libc::kill(pid as i32, libc::SIGTERM);
        }
    }

    match tokio::time::timeout(STOP_GRACE, child.wait()).await {
        Ok(_) => {}
        Err(_) => {
            let _ = child.kill().await;
        }
    }
}

/// Capture a child's stdout/stderr into structured log lines tagged by
/// project name, keeping the JSON-RPC stdout channel (§4.7/§8) pure.
fn capture_output_to_log(child: &mut Child, project_name: &str) {
    use tokio::io::{AsyncBufReadExt, BufReader};

    if let Some(stdout) = child.stdout.take() {
        let name = project_name.to_string();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                tracing::info!(project = %name, "{line}");
            }
        });
    }
    if let Some(stderr) = child.stderr.take() {
        let name = project_name.to_string();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                tracing::warn!(project = %name, "{line}");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_unknown_project_errors() {
        let supervisor = ProjectSupervisor::new();
        let result = supervisor
            .run(
                "ghost",
                RunOptions {
                    port: None,
                    env: HashMap::new(),
                    build_first: false,
                },
            )
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn status_after_register_is_ready() {
        let supervisor = ProjectSupervisor::new();
        supervisor.register("blog_api", "post", PathBuf::from("/tmp/blog_api")).await;
        let handle = supervisor.status("blog_api").await.unwrap();
        assert_eq!(handle.status, ProjectStatus::Ready);
    }

    #[tokio::test]
    async fn stop_unknown_project_errors() {
        let supervisor = ProjectSupervisor::new();
        assert!(supervisor.stop("ghost").await.is_err());
    }

    #[tokio::test]
    async fn stop_all_with_no_running_projects_completes_immediately() {
        let supervisor = ProjectSupervisor::new();
        supervisor.register("blog_api", "post", PathBuf::from("/tmp/blog_api")).await;
        supervisor.stop_all().await;
        let handle = supervisor.status("blog_api").await.unwrap();
        assert_eq!(handle.status, ProjectStatus::Ready);
    }
}
