//! Prompt templates for commit plan generation.

use crate::data::ProposalContext;

/// System prompt describing the task and the reply format.
pub const SYSTEM_PROMPT: &str = r#"You are an expert software engineer who splits a set of uncommitted changes into a sequence of small, coherent git commits.

You will receive the current branch, the latest commit subjects, and a numbered list of changes. Each change is one hunk of a modified file, or a whole added, deleted or renamed file.

Rules:
1. Group changes that belong to the same logical modification into one commit (a feature with its tests, a refactoring, a bug fix).
2. Order commits so that each one makes sense on top of the previous ones.
3. Refer to changes only by their numeric ids.
4. Never assign a change to more than one commit.
5. Adjacent hunks of one file may come from a single edit; keep them together unless they clearly serve different purposes.
6. Write commit messages in the style of the latest commits. Default to conventional commits (`feat: ...`, `fix: ...`, `refactor: ...`) in the imperative mood.

Reply with YAML only, in exactly this format:

```yaml
proposals:
  - message: "feat: short summary"
    unit_ids: [1, 4]
    rationale: "why these changes belong together"
```
"#;

/// Exclusion policy appended to the user prompt.
fn exclusion_policy(allow_exclusions: bool) -> &'static str {
    if allow_exclusions {
        "You MAY leave out changes that should not be committed yet (debug output, unrelated experiments). Omitted changes stay uncommitted."
    } else {
        "Every change id listed below MUST appear in exactly one commit. Do not leave any change out."
    }
}

/// Builds the user prompt for a proposal context.
pub fn generate_user_prompt(context: &ProposalContext) -> String {
    let ids = context
        .unit_ids
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "{}\n\nAvailable change ids: {}\n\n{}",
        exclusion_policy(context.allow_exclusions),
        ids,
        context.text
    )
}
