use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Phase tag attached to every log entry. The labels are the user-facing
/// vocabulary of the director console.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogPhase {
    #[serde(rename = "初始化")]
    Init,
    #[serde(rename = "DNA分析")]
    DnaAnalysis,
    #[serde(rename = "锁定")]
    Lock,
    #[serde(rename = "策划")]
    Planning,
    #[serde(rename = "导演")]
    Directing,
    #[serde(rename = "渲染")]
    Render,
    #[serde(rename = "警告")]
    Warning,
    #[serde(rename = "产出")]
    Output,
    #[serde(rename = "失败")]
    Failure,
    #[serde(rename = "打包")]
    Packaging,
    #[serde(rename = "系统")]
    System,
    #[serde(rename = "错误")]
    Error,
}

impl LogPhase {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Init => "初始化",
            Self::DnaAnalysis => "DNA分析",
            Self::Lock => "锁定",
            Self::Planning => "策划",
            Self::Directing => "导演",
            Self::Render => "渲染",
            Self::Warning => "警告",
            Self::Output => "产出",
            Self::Failure => "失败",
            Self::Packaging => "打包",
            Self::System => "系统",
            Self::Error => "错误",
        }
    }
}

impl fmt::Display for LogPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One immutable line of the director log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: Uuid,
    pub phase: LogPhase,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Append-only log of the session. Entries are never mutated or removed;
/// the whole log is cleared when a run starts or the session resets.
#[derive(Debug, Default)]
pub struct DirectorConsole {
    entries: Vec<LogEntry>,
}

impl DirectorConsole {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry and mirror it as a tracing event.
    pub fn push(&mut self, phase: LogPhase, message: impl Into<String>) {
        let entry = LogEntry {
            id: Uuid::new_v4(),
            phase,
            message: message.into(),
            timestamp: Utc::now(),
        };
        tracing::info!(phase = %entry.phase, "{}", entry.message);
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Entries carrying the given phase tag.
    pub fn with_phase(&self, phase: LogPhase) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter().filter(move |e| e.phase == phase)
    }
}
