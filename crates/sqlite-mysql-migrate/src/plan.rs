//! Table ordering.
//!
//! Tables are copied in a hand-curated order instead of a topological sort
//! over declared foreign keys: the priority list first, exactly as
//! configured, then every other discovered table in discovery order. The
//! reverse of the same order is used for truncation.

use std::collections::HashSet;

use crate::config::MigrationConfig;

/// Ordered, duplicate-free list of tables processed by a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TablePlan {
    tables: Vec<String>,
}

impl TablePlan {
    /// Build a plan from a priority list and the tables found in the source.
    ///
    /// Priority tables are kept even when the source lacks them; the
    /// bookkeeping table never appears.
    pub fn build(priority: &[String], discovered: &[String], bookkeeping_table: &str) -> Self {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut tables = Vec::with_capacity(priority.len() + discovered.len());

        for name in priority.iter().chain(discovered) {
            if name == bookkeeping_table || !seen.insert(name.as_str()) {
                continue;
            }
            tables.push(name.clone());
        }

        Self { tables }
    }

    /// Build the plan a run uses for the given configuration.
    pub fn from_config(config: &MigrationConfig, discovered: &[String]) -> Self {
        if config.use_priority_plan {
            Self::build(&config.priority_tables, discovered, &config.bookkeeping_table)
        } else {
            Self::build(&[], discovered, &config.bookkeeping_table)
        }
    }

    /// Tables in insert order.
    pub fn tables(&self) -> &[String] {
        &self.tables
    }

    /// Tables in truncate order (reverse of insert order).
    pub fn truncate_order(&self) -> impl Iterator<Item = &String> {
        self.tables.iter().rev()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn contains(&self, table: &str) -> bool {
        self.tables.iter().any(|t| t == table)
    }

    /// Position of a table in insert order.
    pub fn position(&self, table: &str) -> Option<usize> {
        self.tables.iter().position(|t| t == table)
    }
}

impl<'a> IntoIterator for &'a TablePlan {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.tables.iter()
    }
}
