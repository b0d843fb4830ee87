//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use serde::Serialize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::catalog::ConfigPage;
use crate::deployment::{ActiveVersion, Comparison, DeployResult, RollbackResult};
use crate::diff::{Change, ChangeKind};
use crate::document::{Document, DocumentHasher};
use crate::ledger::VersionHistory;
use crate::store::{Config, Version};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Config row for table display.
#[derive(Tabled)]
struct ConfigRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Environments")]
    environments: String,
    #[tabled(rename = "Updated")]
    updated: String,
    #[tabled(rename = "Status")]
    status: String,
}

/// Version row for table display.
#[derive(Tabled)]
struct VersionRow {
    #[tabled(rename = "Version")]
    version: u64,
    #[tabled(rename = "Branch")]
    branch: String,
    #[tabled(rename = "Parent")]
    parent: String,
    #[tabled(rename = "Checksum")]
    checksum: String,
    #[tabled(rename = "Author")]
    author: String,
    #[tabled(rename = "Created")]
    created: String,
    #[tabled(rename = "Change log")]
    change_log: String,
}

/// Diff row for table display.
#[derive(Tabled)]
struct ChangeRow {
    #[tabled(rename = "Change")]
    kind: String,
    #[tabled(rename = "Path")]
    path: String,
    #[tabled(rename = "Old")]
    old: String,
    #[tabled(rename = "New")]
    new: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a single config.
    #[must_use]
    pub fn format_config(&self, config: &Config) -> String {
        match self.format {
            OutputFormat::Json => Self::json(config),
            OutputFormat::Text => Self::format_config_text(config),
        }
    }

    fn format_config_text(config: &Config) -> String {
        let mut output = String::new();

        let status = if config.is_archived {
            "archived".yellow()
        } else {
            "active".green()
        };
        let _ = writeln!(output, "\n{} ({status})", config.name.bold());
        let _ = writeln!(output, "   ID:          {}", config.id);
        let _ = writeln!(output, "   Tenant:      {}", config.tenant_id);
        if let Some(description) = &config.description {
            let _ = writeln!(output, "   Description: {description}");
        }
        if !config.tags.is_empty() {
            let _ = writeln!(output, "   Tags:        {}", config.tags.join(", "));
        }
        let _ = writeln!(
            output,
            "   Created:     {} by {}",
            config.created_at.format("%Y-%m-%d %H:%M:%S"),
            config.created_by
        );
        let _ = writeln!(
            output,
            "   Updated:     {}",
            config.updated_at.format("%Y-%m-%d %H:%M:%S")
        );

        let _ = writeln!(output, "\n   Environments:");
        for env in &config.environments {
            let active = match config.active_slot(env).flatten() {
                Some(version) => format!("v{version}").cyan().to_string(),
                None => "-".dimmed().to_string(),
            };
            let _ = writeln!(output, "     {env:<10} {active}");
        }

        output
    }

    /// Formats a list of configs.
    #[must_use]
    pub fn format_configs(&self, page: &ConfigPage) -> String {
        match self.format {
            OutputFormat::Json => Self::json(page),
            OutputFormat::Text => {
                if page.configs.is_empty() {
                    return String::from("No configs found.\n");
                }

                let rows: Vec<ConfigRow> = page
                    .configs
                    .iter()
                    .map(|c| ConfigRow {
                        id: c.id.to_string(),
                        name: c.name.clone(),
                        environments: c
                            .environments
                            .iter()
                            .map(|env| match c.active_slot(env).flatten() {
                                Some(v) => format!("{env}=v{v}"),
                                None => env.clone(),
                            })
                            .collect::<Vec<_>>()
                            .join(" "),
                        updated: c.updated_at.format("%Y-%m-%d %H:%M").to_string(),
                        status: if c.is_archived { "archived" } else { "active" }.to_string(),
                    })
                    .collect();

                format!(
                    "{}\n{}\n",
                    Table::new(rows),
                    format!(
                        "Page {} of {} ({} configs)",
                        page.page,
                        page.pages.max(1),
                        page.total
                    )
                    .dimmed()
                )
            }
        }
    }

    /// Formats a single version including its document.
    #[must_use]
    pub fn format_version(&self, version: &Version) -> String {
        match self.format {
            OutputFormat::Json => Self::json(version),
            OutputFormat::Text => {
                let mut output = String::new();
                let _ = writeln!(
                    output,
                    "\n{} {} on '{}'",
                    "Version".bold(),
                    version.version.to_string().cyan(),
                    version.branch
                );
                if let Some(parent) = version.parent_version {
                    let _ = writeln!(output, "   Parent:     v{parent}");
                }
                let _ = writeln!(output, "   Checksum:   {}", version.checksum);
                let _ = writeln!(
                    output,
                    "   Created:    {} by {}",
                    version.created_at.format("%Y-%m-%d %H:%M:%S"),
                    version.created_by
                );
                if let Some(change_log) = &version.change_log {
                    let _ = writeln!(output, "   Change log: {change_log}");
                }
                let _ = writeln!(output, "\n{}", Self::pretty_document(&version.data));
                output
            }
        }
    }

    /// Formats a page of version history.
    #[must_use]
    pub fn format_history(&self, history: &VersionHistory) -> String {
        match self.format {
            OutputFormat::Json => Self::json(history),
            OutputFormat::Text => {
                if history.versions.is_empty() {
                    return String::from("No versions found.\n");
                }

                let rows: Vec<VersionRow> = history
                    .versions
                    .iter()
                    .map(|v| VersionRow {
                        version: v.version,
                        branch: v.branch.clone(),
                        parent: v
                            .parent_version
                            .map_or_else(|| String::from("-"), |p| p.to_string()),
                        checksum: DocumentHasher::short_checksum(&v.checksum),
                        author: v.created_by.clone(),
                        created: v.created_at.format("%Y-%m-%d %H:%M").to_string(),
                        change_log: Self::truncate(v.change_log.as_deref().unwrap_or(""), 50),
                    })
                    .collect();

                format!(
                    "{}\nPage {} of {} ({} versions)\n",
                    Table::new(rows),
                    history.page,
                    history.pages.max(1),
                    history.total
                )
            }
        }
    }

    /// Formats the outcome of a deploy.
    #[must_use]
    pub fn format_deploy(&self, result: &DeployResult) -> String {
        match self.format {
            OutputFormat::Json => Self::json(result),
            OutputFormat::Text => format!(
                "{} Deployed v{} ({}) to '{}' (previous: {})\n",
                "✓".green(),
                result.deployed_version,
                result.branch,
                result.environment,
                Self::version_label(result.previous_version)
            ),
        }
    }

    /// Formats the outcome of a rollback.
    #[must_use]
    pub fn format_rollback(&self, result: &RollbackResult) -> String {
        match self.format {
            OutputFormat::Json => Self::json(result),
            OutputFormat::Text => {
                let mut output = format!(
                    "{} Rolled back '{}' from {} to v{}\n",
                    "↺".yellow(),
                    result.environment,
                    Self::version_label(result.previous_version),
                    result.current_version
                );
                if let Some(reason) = &result.reason {
                    let _ = writeln!(output, "   Reason: {reason}");
                }
                output
            }
        }
    }

    /// Formats the version active in an environment.
    #[must_use]
    pub fn format_active(&self, active: &ActiveVersion, data_only: bool) -> String {
        match (self.format, data_only) {
            (OutputFormat::Json, true) => Self::json(&active.data),
            (OutputFormat::Json, false) => Self::json(active),
            (OutputFormat::Text, true) => format!("{}\n", Self::pretty_document(&active.data)),
            (OutputFormat::Text, false) => format!(
                "\n'{}' is running v{}\n   Checksum: {}\n   Since:    {}\n\n{}\n",
                active.environment.bold(),
                active.version.to_string().cyan(),
                active.checksum,
                active.updated_at.format("%Y-%m-%d %H:%M:%S"),
                Self::pretty_document(&active.data)
            ),
        }
    }

    /// Formats a bare document or a value inside one.
    #[must_use]
    pub fn format_document(&self, document: &Document) -> String {
        match self.format {
            OutputFormat::Json => Self::json(document),
            OutputFormat::Text => format!("{}\n", Self::pretty_document(document)),
        }
    }

    /// Formats a comparison between two versions.
    #[must_use]
    pub fn format_comparison(&self, comparison: &Comparison) -> String {
        match self.format {
            OutputFormat::Json => Self::json(comparison),
            OutputFormat::Text => {
                let mut output = String::new();
                let _ = writeln!(
                    output,
                    "\nv{} ({}, {}) → v{} ({}, {})",
                    comparison.version1.version,
                    comparison.version1.branch,
                    DocumentHasher::short_checksum(&comparison.version1.checksum),
                    comparison.version2.version,
                    comparison.version2.branch,
                    DocumentHasher::short_checksum(&comparison.version2.checksum),
                );

                if !comparison.diff.has_changes {
                    let _ = writeln!(output, "{} Documents are identical", "✓".green());
                    return output;
                }

                let rows: Vec<ChangeRow> = comparison
                    .diff
                    .changes
                    .iter()
                    .map(|c| ChangeRow {
                        kind: Self::format_change_kind(c.kind()),
                        path: c.path().to_string(),
                        old: Self::change_value(c, Change::old_value),
                        new: Self::change_value(c, Change::new_value),
                    })
                    .collect();

                let _ = writeln!(output, "{}", Table::new(rows));
                let _ = writeln!(output, "\n{}", comparison.diff.summary);
                output
            }
        }
    }

    /// Formats a success message.
    #[must_use]
    pub fn success(&self, message: &str) -> String {
        match self.format {
            OutputFormat::Json => {
                Self::json(&serde_json::json!({ "status": "success", "message": message }))
            }
            OutputFormat::Text => format!("{} {message}\n", "✓".green()),
        }
    }

    /// Formats a warning message.
    #[must_use]
    pub fn warning(&self, message: &str) -> String {
        match self.format {
            OutputFormat::Json => {
                Self::json(&serde_json::json!({ "status": "warning", "message": message }))
            }
            OutputFormat::Text => format!("{} {message}\n", "⚠".yellow()),
        }
    }

    fn json<T: Serialize + ?Sized>(value: &T) -> String {
        let mut output = serde_json::to_string_pretty(value).unwrap_or_default();
        output.push('\n');
        output
    }

    fn pretty_document(data: &Document) -> String {
        serde_json::to_string_pretty(data).unwrap_or_else(|_| data.to_string())
    }

    fn format_change_kind(kind: ChangeKind) -> String {
        match kind {
            ChangeKind::Added => "+ added".green().to_string(),
            ChangeKind::Deleted => "- deleted".red().to_string(),
            ChangeKind::Modified => "~ modified".yellow().to_string(),
            ChangeKind::ArrayModified => "~ array".yellow().to_string(),
        }
    }

    fn change_value(
        change: &Change,
        pick: fn(&Change) -> Option<&Document>,
    ) -> String {
        pick(change).map_or_else(String::new, |v| Self::truncate(&v.to_string(), 40))
    }

    fn version_label(version: Option<u64>) -> String {
        version.map_or_else(|| String::from("none"), |v| format!("v{v}"))
    }

    /// Truncates a string to `max_len` characters.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{kept}...")
        }
    }
}
