use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry of a provider's execution trace. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    pub name: String,
    pub description: String,
    pub completed: bool,
    pub result: String,
    pub timestamp: DateTime<Utc>,
}

/// Append-only builder for a provider's steps.
#[derive(Debug, Clone, Default)]
pub struct StepTrace {
    prefix: String,
    steps: Vec<Step>,
}

impl StepTrace {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            steps: Vec::new(),
        }
    }

    pub fn record(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        completed: bool,
        result: impl Into<String>,
    ) {
        let id = format!("{}-step-{}", self.prefix, self.steps.len() + 1);
        self.steps.push(Step {
            id,
            name: name.into(),
            description: description.into(),
            completed,
            result: result.into(),
            timestamp: Utc::now(),
        });
    }

    pub fn into_steps(self) -> Vec<Step> {
        self.steps
    }
}

pub fn render_steps_markdown(steps: &[Step]) -> String {
    if steps.is_empty() {
        return "No steps recorded.".to_string();
    }
    let mut output = String::new();
    for (idx, step) in steps.iter().enumerate() {
        let mark = if step.completed { "x" } else { " " };
        let _ = writeln!(
            output,
            "{}. [{mark}] **{}** → {}",
            idx + 1,
            step.name,
            single_line(&step.result)
        );
    }
    output
}

fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
