//! Repository backend selection.
//!
//! Each record type picks its backend independently through an environment
//! variable: `WORKFLOW_EXECUTION_REPO_MODE` and
//! `WORKFLOW_NODE_EXECUTION_REPO_MODE`, either `sql` (default) or `memory`.

use crate::DbError;

/// Storage backend for one repository.
///
/// Parsing accepts `sql`, `db`, an empty value and `memory`.  Any other text
/// is a configuration error rather than a silent fallback to SQL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RepoMode {
    /// Postgres via the shared pool.
    #[default]
    Sql,
    /// Per-instance in-memory maps; nothing survives the process.
    Memory,
}

impl std::str::FromStr for RepoMode {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sql" | "db" | "" => Ok(Self::Sql),
            "memory" => Ok(Self::Memory),
            other => Err(DbError::Config(format!(
                "unknown repository mode '{other}', expected 'sql' or 'memory'"
            ))),
        }
    }
}

impl std::fmt::Display for RepoMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sql => write!(f, "sql"),
            Self::Memory => write!(f, "memory"),
        }
    }
}

/// Settings consumed by the repository factories and the pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryConfig {
    pub workflow_execution_repo_mode: RepoMode,
    pub workflow_node_execution_repo_mode: RepoMode,
    pub database_url: Option<String>,
    pub max_connections: u32,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            workflow_execution_repo_mode: RepoMode::Sql,
            workflow_node_execution_repo_mode: RepoMode::Sql,
            database_url: None,
            max_connections: 10,
        }
    }
}

impl RepositoryConfig {
    /// Both repositories in memory; no database needed.
    pub fn in_memory() -> Self {
        Self {
            workflow_execution_repo_mode: RepoMode::Memory,
            workflow_node_execution_repo_mode: RepoMode::Memory,
            ..Self::default()
        }
    }

    /// Create configuration from environment variables.
    pub fn from_env() -> Result<Self, DbError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, DbError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mode = |key: &str| -> Result<RepoMode, DbError> {
            lookup(key).unwrap_or_default().parse()
        };

        let max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            Some(raw) => raw.trim().parse().map_err(|_| {
                DbError::Config(format!("DATABASE_MAX_CONNECTIONS is not a number: '{raw}'"))
            })?,
            None => Self::default().max_connections,
        };

        Ok(Self {
            workflow_execution_repo_mode: mode("WORKFLOW_EXECUTION_REPO_MODE")?,
            workflow_node_execution_repo_mode: mode("WORKFLOW_NODE_EXECUTION_REPO_MODE")?,
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            max_connections,
        })
    }

    /// Whether either repository needs a Postgres pool.
    pub fn needs_database(&self) -> bool {
        self.workflow_execution_repo_mode == RepoMode::Sql
            || self.workflow_node_execution_repo_mode == RepoMode::Sql
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn modes_parse_case_insensitively() {
        assert_eq!("MEMORY".parse::<RepoMode>().unwrap(), RepoMode::Memory);
        assert_eq!("Sql".parse::<RepoMode>().unwrap(), RepoMode::Sql);
        assert_eq!("db".parse::<RepoMode>().unwrap(), RepoMode::Sql);
        assert!(matches!("redis".parse::<RepoMode>(), Err(DbError::Config(_))));
    }

    #[test]
    fn empty_environment_defaults_to_sql() {
        let config = RepositoryConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, RepositoryConfig::default());
        assert!(config.needs_database());
    }

    #[test]
    fn modes_are_chosen_per_record_type() {
        let config = RepositoryConfig::from_lookup(lookup(&[
            ("WORKFLOW_EXECUTION_REPO_MODE", "sql"),
            ("WORKFLOW_NODE_EXECUTION_REPO_MODE", "memory"),
            ("DATABASE_URL", "postgres://localhost/flowstore"),
            ("DATABASE_MAX_CONNECTIONS", "4"),
        ]))
        .unwrap();

        assert_eq!(config.workflow_execution_repo_mode, RepoMode::Sql);
        assert_eq!(config.workflow_node_execution_repo_mode, RepoMode::Memory);
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/flowstore"));
        assert_eq!(config.max_connections, 4);
    }

    #[test]
    fn bad_connection_count_is_rejected() {
        let result = RepositoryConfig::from_lookup(lookup(&[("DATABASE_MAX_CONNECTIONS", "many")]));
        assert!(matches!(result, Err(DbError::Config(msg)) if msg.contains("many")));
    }

    #[test]
    fn in_memory_config_needs_no_database() {
        assert!(!RepositoryConfig::in_memory().needs_database());
    }
}
