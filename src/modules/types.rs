use std::str::FromStr;

use derive_more::with_trait::Display;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Display, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    #[default]
    #[display("leetcode")]
    Leetcode,
    #[display("atcoder")]
    Atcoder,
    #[display("codeforces")]
    Codeforces,
    #[display("luogu")]
    Luogu,
}

impl Source {
    pub const ALL: [Source; 4] = [
        Source::Leetcode,
        Source::Atcoder,
        Source::Codeforces,
        Source::Luogu,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Leetcode => "leetcode",
            Source::Atcoder => "atcoder",
            Source::Codeforces => "codeforces",
            Source::Luogu => "luogu",
        }
    }
}

impl FromStr for Source {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Source::ALL
            .into_iter()
            .find(|source| source.as_str() == value)
            .ok_or_else(|| format!("unknown source: {value}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobTrigger {
    #[serde(alias = "admin")]
    #[display("manual")]
    Manual,
    #[serde(alias = "daily_fallback")]
    #[display("scheduled")]
    Scheduled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[display("running")]
    Running,
    #[serde(alias = "completed")]
    #[display("succeeded")]
    Succeeded,
    #[display("failed")]
    Failed,
    #[display("timed_out")]
    TimedOut,
}

/// Read-only projection of a crawler run owned by the backend.
#[derive(Debug, Clone, PartialEq, Display, Deserialize, Serialize)]
#[display("{job_id} [{source}] {status}")]
pub struct Job {
    pub job_id: String,
    pub source: Source,
    #[serde(default)]
    pub args: Vec<String>,
    pub trigger: JobTrigger,
    pub started_at: String,
    #[serde(default)]
    pub finished_at: Option<String>,
    pub status: JobStatus,
}

impl Job {
    /// `finished_at` is present exactly when the job is no longer running.
    pub fn is_consistent(&self) -> bool {
        (self.status == JobStatus::Running) == self.finished_at.is_none()
    }

    pub fn args_line(&self) -> String {
        self.args.join(" ")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct JobOutput {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub stdout: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub stderr: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StatusReport {
    pub running: bool,
    #[serde(default)]
    pub current_job: Option<Job>,
    #[serde(default)]
    pub last_job: Option<Job>,
    #[serde(default)]
    pub history: Vec<Job>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TriggerRequest {
    pub source: Source,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TriggerResponse {
    pub job_id: String,
}

/// Opaque catalog entry. Only its `(source, id)` identity is interpreted.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Record(pub Map<String, Value>);

impl Record {
    pub fn id(&self) -> Option<String> {
        self.text("id")
    }

    /// Scalar field as display text. Missing, null, empty strings and
    /// empty arrays all count as absent.
    pub fn text(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            Value::Null => None,
            Value::String(s) if s.trim().is_empty() => None,
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Array(items) if items.is_empty() => None,
            Value::Array(items) => Some(
                items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
            Value::Object(_) => None,
        }
    }

    pub fn tags(&self) -> Vec<String> {
        match self.0.get("tags") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ListMeta {
    pub total: u64,
    pub page: u32,
    #[serde(default)]
    pub per_page: Option<u32>,
    pub total_pages: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ListPage {
    #[serde(default)]
    pub data: Vec<Record>,
    pub meta: ListMeta,
}

#[derive(Debug, Clone, PartialEq, Display, Deserialize, Serialize)]
#[display("{} ({})", mask_token(token), label.as_deref().unwrap_or("-"))]
pub struct ApiToken {
    pub token: String,
    #[serde(default)]
    pub label: Option<String>,
    pub created_at: i64,
    #[serde(default)]
    pub last_used_at: Option<i64>,
    #[serde(default = "active_default")]
    pub is_active: i32,
}

fn active_default() -> i32 {
    1
}

/// `abcdefgh...stuvwxyz`; tokens too short to hide anything are fully masked.
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 16 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..8].iter().collect();
    let tail: String = chars[chars.len() - 8..].iter().collect();
    format!("{head}...{tail}")
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn job_accepts_backend_wire_names() {
        let job: Job = serde_json::from_value(json!({
            "job_id": "abc123",
            "source": "leetcode",
            "args": ["--daily"],
            "trigger": "admin",
            "started_at": "2024-01-01T00:00:00Z",
            "finished_at": "2024-01-01T00:05:00Z",
            "status": "completed"
        }))
        .unwrap();
        assert_eq!(job.trigger, JobTrigger::Manual);
        assert_eq!(job.status, JobStatus::Succeeded);
        assert!(job.is_consistent());
        assert_eq!(job.to_string(), "abc123 [leetcode] succeeded");
    }

    #[test]
    fn running_job_with_finish_time_is_inconsistent() {
        let job: Job = serde_json::from_value(json!({
            "job_id": "j",
            "source": "atcoder",
            "trigger": "scheduled",
            "started_at": "t0",
            "finished_at": "t1",
            "status": "running"
        }))
        .unwrap();
        assert!(!job.is_consistent());
    }

    #[test]
    fn output_treats_null_streams_as_empty() {
        let output: JobOutput =
            serde_json::from_value(json!({"stdout": "done", "stderr": null})).unwrap();
        assert_eq!(output.stdout, "done");
        assert_eq!(output.stderr, "");
    }

    #[test]
    fn record_text_skips_absent_values() {
        let record: Record = serde_json::from_value(json!({
            "id": "1",
            "source": "leetcode",
            "title": "Two Sum",
            "rating": 1200.5,
            "contest": null,
            "category": "",
            "tags": ["array", "hash-table"],
            "similar_questions": []
        }))
        .unwrap();
        assert_eq!(record.id().as_deref(), Some("1"));
        assert_eq!(record.text("rating").as_deref(), Some("1200.5"));
        assert_eq!(record.text("contest"), None);
        assert_eq!(record.text("category"), None);
        assert_eq!(record.text("similar_questions"), None);
        assert_eq!(record.text("tags").as_deref(), Some("array, hash-table"));
        assert_eq!(record.tags(), vec!["array", "hash-table"]);
    }

    #[test]
    fn tokens_are_masked() {
        let token = "0123456789abcdef0123456789abcdef";
        assert_eq!(mask_token(token), "01234567...89abcdef");
        assert_eq!(mask_token("short"), "*****");
    }

    #[test]
    fn source_parses_from_its_display_form() {
        for source in Source::ALL {
            assert_eq!(source.to_string().parse::<Source>(), Ok(source));
        }
        assert!("hackerrank".parse::<Source>().is_err());
    }
}
