use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::errors::JournalError;
use crate::model::{RunLogLine, RunMeta, RunSummary, WorkflowEvent};
use nerova_privacy::redact_keys;

/// Owns the per-run artifact directory described in spec.md §4.5 and §6:
/// `$HOME/.nerovaagent/runs/<ISO-timestamp-with-colons-replaced-by-dash>/`.
pub struct RunJournal {
    dir: PathBuf,
    run_log: File,
    workflow_log: File,
}

impl RunJournal {
    /// Create a fresh run directory under `base_dir` (typically
    /// `$HOME/.nerovaagent/runs`), named from the current time.
    pub fn create(base_dir: &Path, now: chrono::DateTime<chrono::Utc>) -> Result<Self, JournalError> {
        let dir_name = now.to_rfc3339().replace(':', "-");
        let dir = base_dir.join(dir_name);
        fs::create_dir_all(&dir).map_err(|source| JournalError::CreateDir {
            path: dir.display().to_string(),
            source,
        })?;

        let run_log = open_append(&dir.join("run.log"))?;
        let workflow_log = open_append(&dir.join("workflow.log"))?;

        Ok(Self {
            dir,
            run_log,
            workflow_log,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn write_meta(&self, meta: &RunMeta) -> Result<(), JournalError> {
        self.write_json("meta.json", meta)
    }

    pub fn write_summary(&self, summary: &RunSummary) -> Result<(), JournalError> {
        self.write_json("summary.json", summary)
    }

    /// Append one ISO-timestamped line to `run.log`.
    pub fn log(&mut self, message: impl Into<String>) -> Result<(), JournalError> {
        let line = RunLogLine::new(message);
        writeln!(self.run_log, "{}", line.render()).map_err(|source| JournalError::Write {
            path: self.dir.join("run.log").display().to_string(),
            source,
        })
    }

    /// Append one JSON object to `workflow.log`, keyed by `stage`.
    pub fn log_stage(&mut self, stage: impl Into<String>, detail: Value) -> Result<(), JournalError> {
        let event = WorkflowEvent::new(stage, detail);
        let line = serde_json::to_string(&event)?;
        writeln!(self.workflow_log, "{line}").map_err(|source| JournalError::Write {
            path: self.dir.join("workflow.log").display().to_string(),
            source,
        })
    }

    /// Write a zero-padded step artifact as pretty JSON, redacting API keys
    /// first (spec.md §4.5).
    pub fn write_step_json(
        &self,
        step: u32,
        suffix: &str,
        mut value: Value,
    ) -> Result<(), JournalError> {
        redact_keys(&mut value);
        let name = format!("{:02}_{}.json", step, suffix);
        self.write_bytes(&name, serde_json::to_vec_pretty(&value)?.as_slice())
    }

    /// Write a step artifact's raw bytes (e.g. `NN_critic.png`).
    pub fn write_step_bytes(&self, step: u32, suffix: &str, bytes: &[u8]) -> Result<(), JournalError> {
        let name = format!("{:02}_{}", step, suffix);
        self.write_bytes(&name, bytes)
    }

    fn write_json<T: Serialize>(&self, name: &str, value: &T) -> Result<(), JournalError> {
        let mut json = serde_json::to_value(value)?;
        redact_keys(&mut json);
        self.write_bytes(name, serde_json::to_vec_pretty(&json)?.as_slice())
    }

    fn write_bytes(&self, name: &str, bytes: &[u8]) -> Result<(), JournalError> {
        let path = self.dir.join(name);
        fs::write(&path, bytes).map_err(|source| JournalError::Write {
            path: path.display().to_string(),
            source,
        })?;
        debug!(artifact = %path.display(), "wrote journal artifact");
        Ok(())
    }
}

fn open_append(path: &Path) -> Result<File, JournalError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| JournalError::Write {
            path: path.display().to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn writes_meta_summary_and_logs() {
        let tmp = tempfile::tempdir().unwrap();
        let mut journal = RunJournal::create(tmp.path(), chrono::Utc::now()).unwrap();

        journal
            .write_meta(&RunMeta {
                run_id: "r1".into(),
                base_prompt: "do a thing".into(),
                started_at: chrono::Utc::now(),
                max_steps: 10,
            })
            .unwrap();
        journal.log("run started").unwrap();
        journal.log_stage("bootstrap", json!({"attempt": 1})).unwrap();
        journal
            .write_step_json(0, "critic-input", json!({"criticKey": "sk-secret"}))
            .unwrap();
        journal
            .write_summary(&RunSummary {
                run_id: "r1".into(),
                status: "stop".into(),
                iterations: 3,
                complete_history: vec!["done".into()],
                finished_at: chrono::Utc::now(),
                error: None,
            })
            .unwrap();

        assert!(journal.dir().join("meta.json").exists());
        assert!(journal.dir().join("summary.json").exists());

        let run_log = fs::read_to_string(journal.dir().join("run.log")).unwrap();
        assert!(run_log.contains("run started"));

        let workflow_log = fs::read_to_string(journal.dir().join("workflow.log")).unwrap();
        assert!(workflow_log.contains("\"stage\":\"bootstrap\""));

        let step_input =
            fs::read_to_string(journal.dir().join("00_critic-input.json")).unwrap();
        assert!(step_input.contains("\"***\""));
        assert!(!step_input.contains("sk-secret"));
    }

    #[test]
    fn dir_name_replaces_colons() {
        let tmp = tempfile::tempdir().unwrap();
        let now = chrono::Utc::now();
        let journal = RunJournal::create(tmp.path(), now).unwrap();
        assert!(!journal
            .dir()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .contains(':'));
    }
}
