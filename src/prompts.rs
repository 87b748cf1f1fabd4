//! Static prompt registry: one system/user template pair per AI task.

use serde::Serialize;

use crate::error::AiError;
use crate::template::{validate, Template, TemplateVars};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptKind {
    StyleUpgrade,
    Readability,
    Seo,
    SeoFocused,
    Categories,
}

impl PromptKind {
    pub const ALL: [PromptKind; 5] = [
        PromptKind::StyleUpgrade,
        PromptKind::Readability,
        PromptKind::Seo,
        PromptKind::SeoFocused,
        PromptKind::Categories,
    ];

    pub fn label(self) -> &'static str {
        match self {
            PromptKind::StyleUpgrade => "style_upgrade",
            PromptKind::Readability => "readability",
            PromptKind::Seo => "seo",
            PromptKind::SeoFocused => "seo_focused",
            PromptKind::Categories => "categories",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PromptTemplate {
    pub system: Template,
    pub user: Template,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuiltPrompt {
    pub kind: PromptKind,
    pub system: String,
    pub user: String,
}

const STYLE_SYSTEM: &str = r#"You are an editor for a technical blog aimed at {{target_audience}}.
Rewrite posts so they read clearly while keeping every technical claim, code block and link intact.
Write in a {{tone}} tone. Keep the original {{content_type}} formatting.
Return a single JSON object and nothing else:
- enhanced_content (string, the full rewritten post)
- changes (array of 3-6 short strings describing what you changed)"#;

const STYLE_USER: &str = r#"Title: {{title}}

Post ({{content_type}}):
{{content}}"#;

const READABILITY_SYSTEM: &str = r#"You are a strict JSON-only reviewer of technical blog posts.
Score the post from 0 to 100 on each of these fields:
- title_structure (heading hierarchy and section titles)
- paragraph_length (paragraphs short enough to scan)
- code_quality (code blocks are annotated, minimal and correct)
- technical_clarity (concepts explained before they are used)
- overall_score
Also return suggestions: an array of 3-5 short, actionable strings.
Output JSON only, no markdown or commentary."#;

const READABILITY_USER: &str = r#"Post ({{content_type}}):
{{content}}"#;

const SEO_SYSTEM: &str = r#"You write search metadata for a technical blog read by {{target_audience}}.
Return a single JSON object and nothing else:
- meta_title (string, at most 60 characters)
- meta_description (string, at most 160 characters)
- keywords (array of at most {{max_keywords}} lowercase search phrases)
- slug (string, lowercase words joined by hyphens)"#;

const SEO_USER: &str = r#"Title: {{title}}

Post:
{{content}}"#;

const SEO_FOCUSED_USER: &str = r#"Title: {{title}}

The metadata must target these keywords, as a JSON array: {{focus_keywords}}

Post:
{{content}}"#;

const CATEGORY_SYSTEM: &str = r#"You assign categories to technical blog posts.
Only choose from the categories provided, identified by their id.
Return a single JSON object and nothing else:
- recommendations (array of at most {{max_categories}} objects with category_id, confidence between 0 and 1, and a one-sentence reason)
Use a confidence above 0.7 only when the post is clearly about that category."#;

const CATEGORY_USER: &str = r#"Available categories (JSON): {{categories}}

Title: {{title}}

Post:
{{content}}"#;

pub fn template(kind: PromptKind) -> PromptTemplate {
    let (system, user) = match kind {
        PromptKind::StyleUpgrade => (STYLE_SYSTEM, STYLE_USER),
        PromptKind::Readability => (READABILITY_SYSTEM, READABILITY_USER),
        PromptKind::Seo => (SEO_SYSTEM, SEO_USER),
        PromptKind::SeoFocused => (SEO_SYSTEM, SEO_FOCUSED_USER),
        PromptKind::Categories => (CATEGORY_SYSTEM, CATEGORY_USER),
    };
    PromptTemplate {
        system: Template::from_static(system),
        user: Template::from_static(user),
    }
}

/// Baseline values for the optional placeholders.
pub fn default_vars() -> TemplateVars {
    TemplateVars::new()
        .with("tone", "professional")
        .with("target_audience", "software developers")
        .with("max_keywords", 8usize)
        .with("max_categories", 3usize)
        .with("content_type", "markdown")
}

/// Validates `vars` (with defaults merged in) against both halves of the
/// template and renders them.
pub fn build_prompt(kind: PromptKind, vars: &TemplateVars) -> Result<BuiltPrompt, AiError> {
    let template = template(kind);
    let mut vars = vars.clone();
    vars.merge_defaults(&default_vars());

    let combined = format!("{}\n{}", template.system, template.user);
    validate(&combined, &vars).into_result()?;

    Ok(BuiltPrompt {
        kind,
        system: template.system.render(&vars).into_text(),
        user: template.user.render(&vars).into_text(),
    })
}
