//! Knowledge tables backing the validation tools.
//!
//! The tables are markdown files under a single directory: `users.md`,
//! `training_completions.md` and `access_policies.md` hold pipe-delimited
//! rows, `training_requirements.md` holds one embedded JSON object keyed by
//! environment. Files are read fresh on every query; there is no cache and
//! no write path.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Read-only view over the knowledge table directory.
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    root: PathBuf,
}

impl KnowledgeBase {
    /// Create a knowledge base rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory the tables are read from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Verify a user against the central users table.
    ///
    /// A row matches when the user id and Dataiku id columns both match and
    /// the status column is `A` (active). An absent or inactive user is a
    /// negative result, not an error.
    pub fn verify_user(&self, user_id: &str, dataiku_id: &str) -> Result<bool> {
        debug!("verifying user_id={} dataiku_id={}", user_id, dataiku_id);

        let rows = self.table_rows("users.md")?;
        for row in rows {
            if row.len() >= 5
                && row[0] == user_id
                && row[2] == dataiku_id
                && row[4].to_uppercase() == "A"
            {
                return Ok(true);
            }
        }
        warn!("user verification failed, no match for user_id={}", user_id);
        Ok(false)
    }

    /// Training requirements for an environment.
    ///
    /// The requirements file carries one JSON object between its first `{`
    /// and last `}`, keyed by upper-case environment name. An unknown
    /// environment yields an empty object.
    pub fn training_requirements(&self, env: &str) -> Result<Value> {
        let env = env.to_uppercase();
        debug!("loading training requirements for env={}", env);

        let text = self.read_table("training_requirements.md")?;
        let data = extract_json(&text)?;
        Ok(data
            .get(&env)
            .cloned()
            .unwrap_or_else(|| Value::Object(Default::default())))
    }

    /// Check whether a user completed a training, matching on the provided
    /// certificate id.
    pub fn training_completed(
        &self,
        user_id: &str,
        training_name: &str,
        certificate_id: &str,
    ) -> Result<bool> {
        debug!(
            "checking completion for user={} training={}",
            user_id, training_name
        );

        let rows = self.table_rows("training_completions.md")?;
        for row in rows {
            if row.len() >= 4
                && row[0] == user_id
                && row[2] == training_name
                && row[3] == certificate_id
            {
                return Ok(true);
            }
        }
        warn!(
            "training completion not found for user={} training={}",
            user_id, training_name
        );
        Ok(false)
    }

    /// Check whether an access type is permitted for an environment under
    /// company policy. An absent (environment, access type) pair is a
    /// negative result.
    pub fn access_permitted(&self, env: &str, access_type: &str) -> Result<bool> {
        let env = env.to_uppercase();
        let access_type = capitalize(access_type);
        debug!("checking policy for env={} access={}", env, access_type);

        let rows = self.table_rows("access_policies.md")?;
        for row in rows {
            if row.len() >= 3
                && row[0].to_uppercase() == env
                && capitalize(&row[1]) == access_type
            {
                return Ok(row[2].to_lowercase() == "yes");
            }
        }
        Ok(false)
    }

    fn read_table(&self, name: &str) -> Result<String> {
        Ok(std::fs::read_to_string(self.root.join(name))?)
    }

    /// Parse a markdown table into rows of trimmed cells. Rows are the lines
    /// containing `|` with the first two (header + separator) skipped.
    fn table_rows(&self, name: &str) -> Result<Vec<Vec<String>>> {
        let text = self.read_table(name)?;
        Ok(text
            .lines()
            .map(str::trim)
            .filter(|line| line.contains('|'))
            .skip(2)
            .map(|line| {
                line.trim_matches('|')
                    .split('|')
                    .map(|cell| cell.trim().to_string())
                    .collect()
            })
            .collect())
    }
}

/// Extract the JSON object embedded in a markdown document: the text between
/// the first `{` and the last `}`.
fn extract_json(text: &str) -> Result<Value> {
    let start = text
        .find('{')
        .ok_or_else(|| Error::Table("no JSON object in requirements file".into()))?;
    let end = text
        .rfind('}')
        .filter(|end| *end >= start)
        .ok_or_else(|| Error::Table("unterminated JSON object in requirements file".into()))?;
    Ok(serde_json::from_str(&text[start..=end])?)
}

/// Python-style capitalize: first character upper-cased, the rest lowered.
/// Used to normalize access types ("read", "READ" -> "Read").
pub(crate) fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}
