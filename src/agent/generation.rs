//! # TemplateAgent — reference generation agent
//!
//! Produces a scaffold artifact from task requirements. The real
//! code-synthesis algorithm is an external collaborator; this agent stands
//! in for it the way an echo worker stands in for an inference backend:
//! deterministic, dependency-free, and good enough to exercise the whole
//! orchestration path.

use crate::agent::{Agent, AgentRole, Capability};
use crate::artifact::{Artifact, Language};
use crate::task::Task;
use crate::OrchestratorError;
use async_trait::async_trait;

/// Template-based generation agent.
pub struct TemplateAgent {
    name: String,
    capabilities: Vec<Capability>,
    /// Simulated synthesis latency in milliseconds.
    delay_ms: u64,
}

impl TemplateAgent {
    /// Create an agent covering the given languages.
    pub fn new(languages: Vec<Language>) -> Self {
        Self {
            name: "template-generation".to_string(),
            capabilities: vec![Capability::new("code-synthesis", languages)],
            delay_ms: 10,
        }
    }

    /// Override the simulated synthesis latency.
    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    fn scaffold(task: &Task) -> String {
        let prefix = task.language.comment_prefix();
        let mut out = String::new();
        out.push_str(&format!("{prefix} {}\n", task.title));
        out.push_str(&format!("{prefix} {}\n", task.description));
        for req in &task.requirements {
            out.push_str(&format!("{prefix} requirement: {req}\n"));
        }
        for constraint in &task.constraints {
            out.push_str(&format!("{prefix} constraint: {constraint}\n"));
        }
        out.push('\n');
        out.push_str(&body(task));
        out
    }
}

/// Language-specific scaffold body.
fn body(task: &Task) -> String {
    let slug = slugify(&task.title);
    match task.language {
        Language::Python => format!(
            "def {slug}():\n    result = \"{title}\"\n    return result\n\n\nif __name__ == \"__main__\":\n    print({slug}())\n",
            title = task.title,
        ),
        Language::JavaScript => format!(
            "function {slug}() {{\n    const result = \"{title}\";\n    return result;\n}}\n\nconsole.log({slug}());\n",
            title = task.title,
        ),
        Language::Rust => format!(
            "fn {slug}() -> String {{\n    String::from(\"{title}\")\n}}\n\nfn main() {{\n    println!(\"{{}}\", {slug}());\n}}\n",
            title = task.title,
        ),
        Language::Go => format!(
            "package main\n\nimport \"fmt\"\n\nfunc {slug}() string {{\n    return \"{title}\"\n}}\n\nfunc main() {{\n    fmt.Println({slug}())\n}}\n",
            title = task.title,
        ),
        Language::Shell => format!(
            "{slug}() {{\n    echo \"{title}\"\n}}\n\n{slug}\n",
            title = task.title,
        ),
    }
}

/// Reduce a title to an identifier-safe slug.
fn slugify(title: &str) -> String {
    let slug: String = title
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    let trimmed = slug.trim_matches('_');
    if trimmed.is_empty() {
        "solution".to_string()
    } else if trimmed.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        format!("task_{trimmed}")
    } else {
        trimmed.to_string()
    }
}

#[async_trait]
impl Agent for TemplateAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn role(&self) -> AgentRole {
        AgentRole::Generation
    }

    fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    async fn execute(
        &self,
        task: &Task,
        _existing: Option<&Artifact>,
    ) -> Result<Artifact, OrchestratorError> {
        // Simulate synthesis latency.
        tokio::time::sleep(tokio::time::Duration::from_millis(self.delay_ms)).await;

        let path = format!(
            "{}.{}",
            slugify(&task.title),
            task.language.file_extension()
        );
        let mut artifact = Artifact::new(path, Self::scaffold(task), task.language);
        artifact
            .metadata
            .insert("agent".to_string(), self.name.clone());
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent() -> TemplateAgent {
        TemplateAgent::new(vec![Language::Python, Language::Shell]).with_delay(1)
    }

    #[tokio::test]
    async fn test_execute_produces_artifact_in_task_language() {
        let task = Task::new("reverse string", "reverse a string", Language::Python);
        let artifact = agent().execute(&task, None).await.unwrap();
        assert_eq!(artifact.language, Language::Python);
        assert!(artifact.path.ends_with(".py"));
    }

    #[tokio::test]
    async fn test_scaffold_mentions_requirements() {
        let task = Task::new("parse csv", "parse a csv file", Language::Python)
            .with_requirements(vec!["handle quoted fields".to_string()]);
        let artifact = agent().execute(&task, None).await.unwrap();
        assert!(artifact.content.contains("handle quoted fields"));
    }

    #[tokio::test]
    async fn test_artifact_metadata_names_agent() {
        let task = Task::new("t", "d", Language::Shell);
        let artifact = agent().execute(&task, None).await.unwrap();
        assert_eq!(
            artifact.metadata.get("agent").map(String::as_str),
            Some("template-generation")
        );
    }

    #[tokio::test]
    async fn test_scaffold_is_nonempty_for_all_languages() {
        for lang in Language::all() {
            let agent = TemplateAgent::new(vec![*lang]).with_delay(1);
            let task = Task::new("demo task", "demo", *lang);
            let artifact = agent.execute(&task, None).await.unwrap();
            assert!(artifact.content.len() > 20, "empty scaffold for {lang}");
        }
    }

    #[test]
    fn test_can_handle_matches_capability() {
        let a = agent();
        assert!(a.can_handle(&Task::new("t", "d", Language::Python)));
        assert!(!a.can_handle(&Task::new("t", "d", Language::Go)));
    }

    #[test]
    fn test_role_is_generation() {
        assert_eq!(agent().role(), AgentRole::Generation);
    }

    #[test]
    fn test_slugify_handles_odd_titles() {
        assert_eq!(slugify("Reverse String!"), "reverse_string");
        assert_eq!(slugify("   "), "solution");
        assert_eq!(slugify("3sum"), "task_3sum");
    }
}
