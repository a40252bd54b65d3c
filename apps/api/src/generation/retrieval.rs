//! Customer retrieval: loads the static customer file and turns one record into
//! markdown documents the model can read.
//!
//! The file is JSONL, one customer object per line, keyed by `account.name`.
//! Key order inside each record is preserved so sections keep the file's order.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::llm_client::ChatMessage;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanySummary {
    pub name: String,
}

/// One top-level section of a customer record, rendered as markdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerDocument {
    pub id: String,
    pub section: String,
    pub content: String,
}

#[derive(Debug, Clone, Default)]
pub struct CustomerStore {
    customers: Vec<Value>,
}

impl CustomerStore {
    pub fn new(customers: Vec<Value>) -> Self {
        Self { customers }
    }

    /// Parses a JSONL file. Blank lines are skipped; a malformed line is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read customer data at {}", path.display()))?;

        let customers = raw
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| {
                serde_json::from_str::<Value>(line)
                    .with_context(|| format!("Invalid customer record on line {}", i + 1))
            })
            .collect::<Result<Vec<_>>>()?;

        info!("Loaded {} customers from {}", customers.len(), path.display());
        Ok(Self { customers })
    }

    /// Like [`CustomerStore::load`], but a missing file yields an empty store.
    pub fn load_or_empty(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(
                "Customer data not found at {}; company list will be empty",
                path.display()
            );
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn len(&self) -> usize {
        self.customers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.customers.is_empty()
    }

    /// All company names, sorted.
    pub fn companies(&self) -> Vec<CompanySummary> {
        let mut companies: Vec<CompanySummary> = self
            .customers
            .iter()
            .filter_map(account_name)
            .map(|name| CompanySummary {
                name: name.to_string(),
            })
            .collect();
        companies.sort_by(|a, b| a.name.cmp(&b.name));
        companies
    }

    pub fn find(&self, company_name: &str) -> Option<&Value> {
        self.customers
            .iter()
            .find(|c| account_name(c) == Some(company_name))
    }

    /// One document per top-level key of the customer's record.
    pub fn documents(&self, company_name: &str) -> Option<Vec<CustomerDocument>> {
        let record = self.find(company_name)?.as_object()?;
        Some(
            record
                .iter()
                .map(|(key, value)| CustomerDocument {
                    id: format!("{company_name}_{key}"),
                    section: key.clone(),
                    content: format_section_markdown(key, value),
                })
                .collect(),
        )
    }
}

fn account_name(customer: &Value) -> Option<&str> {
    customer.get("account")?.get("name")?.as_str()
}

/// System prompt plus one user message holding the customer documents and instructions.
pub fn build_messages(
    system_prompt: &str,
    documents: &[CustomerDocument],
    user_input: Option<&str>,
) -> Vec<ChatMessage> {
    let mut customer_info = documents
        .iter()
        .map(|doc| format!("{}:\n{}", title_case(&doc.section), doc.content))
        .collect::<Vec<_>>()
        .join("\n\n");

    if let Some(input) = user_input.filter(|s| !s.trim().is_empty()) {
        customer_info.push_str("\n\nUser Instructions:\n");
        customer_info.push_str(input);
    }

    vec![
        ChatMessage::system(system_prompt),
        ChatMessage::user(customer_info),
    ]
}

/// Renders a section as a `# Heading` followed by `**Key:** value` lines.
pub fn format_section_markdown(section: &str, value: &Value) -> String {
    let mut markdown = format!("# {}\n\n", title_case(section));
    format_value(value, 0, &mut markdown);
    markdown.trim().to_string()
}

fn format_value(value: &Value, level: usize, out: &mut String) {
    let indent = "  ".repeat(level);
    match value {
        Value::Object(map) => {
            for (key, v) in map {
                let key_name = title_case(key);
                if v.is_object() || v.is_array() {
                    out.push_str(&format!("{indent}**{key_name}:**\n"));
                    format_value(v, level + 1, out);
                    out.push('\n');
                } else {
                    out.push_str(&format!("{indent}**{key_name}:** {}\n\n", scalar(v)));
                }
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                if item.is_object() {
                    out.push_str(&format!("{indent}- Item {}:\n", i + 1));
                    format_value(item, level + 1, out);
                } else {
                    out.push_str(&format!("{indent}- {}\n", scalar(item)));
                }
            }
        }
        other => out.push_str(&format!("{indent}{}\n", scalar(other))),
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Null => "None".to_string(),
        other => other.to_string(),
    }
}

/// `least_used_features` -> `Least Used Features`.
pub fn title_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut previous_is_letter = false;
    for ch in key.chars().map(|c| if c == '_' { ' ' } else { c }) {
        if previous_is_letter {
            out.extend(ch.to_lowercase());
        } else {
            out.extend(ch.to_uppercase());
        }
        previous_is_letter = ch.is_alphabetic();
    }
    out
}
