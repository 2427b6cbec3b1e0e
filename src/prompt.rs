//! Task descriptions built from phase templates and issue metadata.
//!
//! Templates recognise the placeholders `{number}`, `{title}`, `{url}`,
//! `{body}`, `{slug}`, `{phase}` and `{repo}`. Substitution is a single pass
//! over the template: issue content that happens to contain a placeholder is
//! inserted verbatim and never expanded again. Any other `{...}` text is left
//! untouched.

use std::str::FromStr;

use crate::models::phase::Phase;

/// Maximum length of a generated slug.
const MAX_SLUG_LEN: usize = 50;

/// Issue identity every prompt needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueContext {
    /// Issue number.
    pub number: u64,
    /// Issue title.
    pub title: String,
    /// Issue URL.
    pub url: String,
}

/// Optional placeholder values; absent values render as empty text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptVariables {
    /// Issue body for `{body}`.
    pub body: Option<String>,
    /// Short identifier for `{slug}`.
    pub slug: Option<String>,
    /// Phase name for `{phase}`.
    pub phase: Option<String>,
    /// Repository full name for `{repo}`.
    pub repo: Option<String>,
}

/// Build the task description for an agent.
///
/// Without a template the fixed fallback `Issue #{number}: {title}\nURL: {url}`
/// is produced.
#[must_use]
pub fn build_prompt(
    issue: &IssueContext,
    template: Option<&str>,
    variables: &PromptVariables,
) -> String {
    match template {
        Some(template) => substitute(template, issue, variables),
        None => format!(
            "Issue #{}: {}\nURL: {}",
            issue.number, issue.title, issue.url
        ),
    }
}

/// Built-in template for a phase name, if the phase is recognised.
#[must_use]
pub fn default_template(phase: &str) -> Option<&'static str> {
    Phase::from_str(phase).ok().map(phase_template)
}

/// Built-in template for a phase.
#[must_use]
pub fn phase_template(phase: Phase) -> &'static str {
    match phase {
        Phase::Research => RESEARCH_TEMPLATE,
        Phase::Brainstorm => BRAINSTORM_TEMPLATE,
        Phase::Plan => PLAN_TEMPLATE,
        Phase::Implement => IMPLEMENT_TEMPLATE,
        Phase::Review => REVIEW_TEMPLATE,
        Phase::Compound => COMPOUND_TEMPLATE,
        Phase::CompletionCheck => COMPLETION_CHECK_TEMPLATE,
    }
}

/// Lowercase ASCII slug of a title, words joined by `-`.
#[must_use]
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len().min(MAX_SLUG_LEN));
    let mut pending_dash = false;
    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
        if slug.len() >= MAX_SLUG_LEN {
            break;
        }
    }
    slug.truncate(MAX_SLUG_LEN);
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

fn substitute(template: &str, issue: &IssueContext, variables: &PromptVariables) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let candidate = &rest[open + 1..];
        let resolved = candidate.find('}').and_then(|close| {
            resolve(&candidate[..close], issue, variables).map(|value| (value, close))
        });
        match resolved {
            Some((value, close)) => {
                out.push_str(&value);
                rest = &candidate[close + 1..];
            }
            None => {
                out.push('{');
                rest = candidate;
            }
        }
    }

    out.push_str(rest);
    out
}

fn resolve(name: &str, issue: &IssueContext, variables: &PromptVariables) -> Option<String> {
    let value = match name {
        "number" => issue.number.to_string(),
        "title" => issue.title.clone(),
        "url" => issue.url.clone(),
        "body" => variables.body.clone().unwrap_or_default(),
        "slug" => variables.slug.clone().unwrap_or_default(),
        "phase" => variables.phase.clone().unwrap_or_default(),
        "repo" => variables.repo.clone().unwrap_or_default(),
        _ => return None,
    };
    Some(value)
}

const RESEARCH_TEMPLATE: &str = "\
Research issue #{number} in {repo}: {title}
URL: {url}

{body}

Investigate the codebase and any linked context. Do not change code.
Write your findings to docs/research/{slug}.md: relevant files, current
behaviour, constraints, and open questions.";

const BRAINSTORM_TEMPLATE: &str = "\
Brainstorm approaches for issue #{number} in {repo}: {title}
URL: {url}

{body}

Propose at least two distinct approaches with trade-offs and a
recommendation. Write them to docs/brainstorm/{slug}.md. Do not change code.";

const PLAN_TEMPLATE: &str = "\
Plan the implementation of issue #{number} in {repo}: {title}
URL: {url}

{body}

Read docs/research/{slug}.md and docs/brainstorm/{slug}.md if present.
Write a step-by-step plan with the files to touch and the tests to add to
docs/plans/{slug}.md. Do not change code.";

const IMPLEMENT_TEMPLATE: &str = "\
Implement issue #{number} in {repo}: {title}
URL: {url}

{body}

Follow docs/plans/{slug}.md if present. Make the change, add or update
tests, and run them. Commit with a message referencing #{number}.";

const REVIEW_TEMPLATE: &str = "\
Review the changes made for issue #{number} in {repo}: {title}
URL: {url}

Check correctness, test coverage, and consistency with the codebase.
Fix clear defects directly; list anything needing a human decision in
docs/reviews/{slug}.md.";

const COMPOUND_TEMPLATE: &str = "\
Capture learnings from issue #{number} in {repo}: {title}
URL: {url}

Record patterns, pitfalls, and conventions discovered while working on
this issue in docs/learnings/{slug}.md so future {phase} runs benefit.";

const COMPLETION_CHECK_TEMPLATE: &str = "\
Check whether issue #{number} in {repo} is complete: {title}
URL: {url}

{body}

Compare the acceptance criteria against the current code and tests.
Report DONE or NOT DONE with the remaining gaps.";
