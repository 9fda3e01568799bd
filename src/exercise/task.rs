use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of speech exercise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskKind {
    /// Free speech on a prompt, time-boxed
    SpeechOnTopic,
    /// Reading a given text, no duration cap
    ReadAloud,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::SpeechOnTopic => write!(f, "speech on topic"),
            TaskKind::ReadAloud => write!(f, "read aloud"),
        }
    }
}

/// CEFR proficiency level shown next to the prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CefrLevel {
    A1,
    A2,
    B1,
    B2,
    C1,
    C2,
}

/// Display-only metadata attached to a task
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskMetadata {
    pub min_words: Option<u32>,
    pub min_sentences: Option<u32>,
    pub cefr_level: Option<CefrLevel>,
}

/// An assigned speech exercise
///
/// Supplied by the assignment list and never mutated by the recording core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub kind: TaskKind,
    pub prompt: String,
    #[serde(default)]
    pub max_duration_seconds: Option<u64>,
    #[serde(default)]
    pub metadata: TaskMetadata,
}

impl Task {
    /// Create a time-boxed topic task
    pub fn speech_on_topic(
        id: impl Into<String>,
        prompt: impl Into<String>,
        max_duration_seconds: u64,
    ) -> Self {
        Self {
            id: id.into(),
            kind: TaskKind::SpeechOnTopic,
            prompt: prompt.into(),
            max_duration_seconds: Some(max_duration_seconds),
            metadata: TaskMetadata::default(),
        }
    }

    /// Create a read-aloud task
    pub fn read_aloud(id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: TaskKind::ReadAloud,
            prompt: prompt.into(),
            max_duration_seconds: None,
            metadata: TaskMetadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: TaskMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Recording limit that triggers auto-pause
    ///
    /// Only topic tasks are time-boxed; a limit on a read-aloud task is
    /// ignored, as is a zero limit.
    pub fn duration_limit(&self) -> Option<u64> {
        match self.kind {
            TaskKind::SpeechOnTopic => self.max_duration_seconds.filter(|&max| max > 0),
            TaskKind::ReadAloud => None,
        }
    }

    pub fn is_topic(&self) -> bool {
        self.kind == TaskKind::SpeechOnTopic
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_aloud_ignores_limit() {
        let mut task = Task::read_aloud("t1", "Read this");
        task.max_duration_seconds = Some(30);
        assert_eq!(task.duration_limit(), None);
    }

    #[test]
    fn test_topic_limit() {
        let task = Task::speech_on_topic("t2", "Describe your town", 30);
        assert_eq!(task.duration_limit(), Some(30));
        assert!(task.is_topic());

        let zero = Task::speech_on_topic("t3", "Nothing", 0);
        assert_eq!(zero.duration_limit(), None);
    }

    #[test]
    fn test_deserialize_from_assignment_payload() {
        let json = r#"{
            "id": "task-7",
            "kind": "speechOnTopic",
            "prompt": "Talk about travel",
            "maxDurationSeconds": 45,
            "metadata": { "minWords": 50, "cefrLevel": "B1" }
        }"#;
        let task: Task = serde_json::from_str(json).unwrap();
        assert_eq!(task.kind, TaskKind::SpeechOnTopic);
        assert_eq!(task.duration_limit(), Some(45));
        assert_eq!(task.metadata.cefr_level, Some(CefrLevel::B1));
        assert_eq!(task.metadata.min_sentences, None);
    }
}
