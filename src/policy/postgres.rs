use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::Row;
use tracing::debug;

use super::PolicyLine;
use super::PolicyLoader;
use crate::ApplyError;

const LOAD_RULES: &str = "SELECT ptype, v0, v1, v2, v3, v4, v5 FROM casbin_rule";
const VALUE_COLUMNS: [&str; 6] = ["v0", "v1", "v2", "v3", "v4", "v5"];

/// Reads the `casbin_rule (ptype, v0..v5)` table written by the standard
/// Casbin SQL adapters.
#[derive(Clone, Debug)]
pub struct PgPolicyLoader {
    pool: PgPool,
}

impl PgPolicyLoader {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PolicyLoader for PgPolicyLoader {
    async fn load_rules(&self) -> Result<Vec<PolicyLine>, ApplyError> {
        let rows = sqlx::query(LOAD_RULES)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ApplyError::Reload(e.to_string()))?;

        let mut lines = Vec::with_capacity(rows.len());
        for row in rows {
            let ptype: String = row.try_get("ptype").map_err(|e| ApplyError::Reload(e.to_string()))?;

            let mut rule = Vec::with_capacity(VALUE_COLUMNS.len());
            for column in VALUE_COLUMNS {
                let value: Option<String> =
                    row.try_get(column).map_err(|e| ApplyError::Reload(e.to_string()))?;
                rule.push(value.unwrap_or_default());
            }
            // Adapters pad unused columns with empty strings.
            while rule.last().is_some_and(String::is_empty) {
                rule.pop();
            }

            lines.push(PolicyLine::new(ptype, rule));
        }

        debug!(rules = lines.len(), "loaded policy from casbin_rule");
        Ok(lines)
    }
}
