//! Identifier definitions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{define_id, IdError, Ulid};

define_id!(StepId, "step");

/// Separator between the service, task name and ULID parts of a [`TaskId`].
pub const TASK_ID_SEPARATOR: &str = "__";

/// Cluster-manager task id: `<service>__<task name>__<ulid>`.
///
/// The service part is sanitized (`/` becomes `.`) so that folder-style
/// service names stay a single path segment.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaskId {
    service: String,
    task_name: String,
    ulid: Ulid,
}

impl TaskId {
    /// Mints a new id for a launch of `task_name` within `service`.
    pub fn new(service: &str, task_name: &str) -> Self {
        Self {
            service: sanitize_service_name(service),
            task_name: task_name.to_string(),
            ulid: Ulid::new(),
        }
    }

    /// Parses a task id from its text form.
    pub fn parse(s: &str) -> Result<Self, IdError> {
        if s.is_empty() {
            return Err(IdError::Empty);
        }
        let (head, tail) = s
            .rsplit_once(TASK_ID_SEPARATOR)
            .ok_or(IdError::MissingSeparator(TASK_ID_SEPARATOR))?;
        let (service, task_name) = head
            .split_once(TASK_ID_SEPARATOR)
            .ok_or(IdError::MissingSeparator(TASK_ID_SEPARATOR))?;
        if service.is_empty() || task_name.is_empty() {
            return Err(IdError::InvalidFormat {
                message: format!("task id '{s}' has an empty service or task name"),
            });
        }
        let ulid = tail
            .parse::<Ulid>()
            .map_err(|e| IdError::InvalidUlid(e.to_string()))?;
        Ok(Self {
            service: service.to_string(),
            task_name: task_name.to_string(),
            ulid,
        })
    }

    /// The sanitized service name embedded in the id.
    pub fn service_name(&self) -> &str {
        &self.service
    }

    /// The task name embedded in the id.
    pub fn task_name(&self) -> &str {
        &self.task_name
    }

    /// The per-launch ULID.
    pub fn ulid(&self) -> Ulid {
        self.ulid
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{sep}{}{sep}{}",
            self.service,
            self.task_name,
            self.ulid,
            sep = TASK_ID_SEPARATOR
        )
    }
}

impl FromStr for TaskId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TaskId {
    type Error = IdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<TaskId> for String {
    fn from(id: TaskId) -> Self {
        id.to_string()
    }
}

/// Replaces path separators so the name fits in a single id segment.
pub fn sanitize_service_name(service: &str) -> String {
    service.replace('/', ".")
}

/// Opaque id of the agent a task runs on.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AgentId(String);

impl AgentId {
    /// Wraps a non-empty agent id.
    pub fn new(id: impl Into<String>) -> Result<Self, IdError> {
        let id = id.into();
        if id.is_empty() {
            return Err(IdError::Empty);
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for AgentId {
    type Error = IdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<AgentId> for String {
    fn from(id: AgentId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_step_id_prefix() {
        let id = StepId::new();
        assert!(id.to_string().starts_with("step_"));
    }

    #[test]
    fn test_step_id_invalid_prefix() {
        let result: Result<StepId, _> = "task_01HV4Z2WQXKJNM8GPQY6VBKC3D".parse();
        assert!(matches!(
            result.unwrap_err(),
            IdError::InvalidPrefix { expected: "step", .. }
        ));
    }

    #[test]
    fn test_step_id_errors() {
        assert!("".parse::<StepId>().unwrap_err().is_empty());
        assert!(matches!(
            "step01HV4Z2WQXKJNM8GPQY6VBKC3D".parse::<StepId>(),
            Err(IdError::MissingSeparator(_))
        ));
        assert!(matches!(
            "step_nope".parse::<StepId>(),
            Err(IdError::InvalidUlid(_))
        ));
    }

    #[test]
    fn test_step_id_json_is_text() {
        let id = StepId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
        let parsed: StepId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_task_id_parts() {
        let id = TaskId::new("path/to/svc", "test-0-a");
        assert_eq!(id.service_name(), "path.to.svc");
        assert_eq!(id.task_name(), "test-0-a");

        let parsed = TaskId::parse(&id.to_string()).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_task_id_task_name_may_contain_separator() {
        let id = TaskId::new("svc", "odd__name");
        let parsed = TaskId::parse(&id.to_string()).unwrap();
        assert_eq!(parsed.service_name(), "svc");
        assert_eq!(parsed.task_name(), "odd__name");
    }

    #[test]
    fn test_task_id_rejects_malformed() {
        assert!(TaskId::parse("").unwrap_err().is_empty());
        assert!(matches!(
            TaskId::parse("svc-task"),
            Err(IdError::MissingSeparator(_))
        ));
        assert!(matches!(
            TaskId::parse("svc__01HV4Z2WQXKJNM8GPQY6VBKC3D"),
            Err(IdError::MissingSeparator(_))
        ));
        assert!(matches!(
            TaskId::parse("__a__01HV4Z2WQXKJNM8GPQY6VBKC3D"),
            Err(IdError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn test_launches_get_distinct_task_ids() {
        let first = TaskId::new("svc", "test-0-a");
        let second = TaskId::new("svc", "test-0-a");
        assert_ne!(first, second);
    }

    #[test]
    fn test_agent_id_non_empty() {
        assert!(AgentId::new("").is_err());
        assert_eq!(AgentId::new("agent-1").unwrap().as_str(), "agent-1");
    }

    proptest! {
        #[test]
        fn prop_task_id_parses_back(service in "[a-z][a-z0-9/-]{0,12}", task in "[a-z][a-z0-9-]{0,12}") {
            let id = TaskId::new(&service, &task);
            let parsed = TaskId::parse(&id.to_string()).unwrap();
            prop_assert_eq!(parsed.task_name(), task.as_str());
            let expected = service.replace('/', ".");
            prop_assert_eq!(parsed.service_name(), expected.as_str());
        }
    }
}
