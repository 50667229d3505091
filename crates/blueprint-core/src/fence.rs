//! Markdown code-fence stripping.
//!
//! Pure text transform with one contract: return the first fenced block's
//! content, else the full trimmed text. Kept separate from the generator so
//! a stricter parser can replace it without touching orchestration.

use std::sync::LazyLock;

use regex::Regex;

/// Opening fence with an optional info string (`js`, ` javascript`,
/// `c++`, `html title=x`) that ends at the first newline, then the shortest
/// body up to the next closing fence.
static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"```[^\n`]*\r?\n([\s\S]*?)```").expect("FENCED_BLOCK regex should compile")
});

/// Strip a markdown fence from a model response.
///
/// - The first fenced block wins; later blocks are discarded.
/// - An unterminated fence is not a block.
/// - The result is always trimmed.
pub fn strip_code_fence(response: &str) -> String {
    let trimmed = response.trim();
    match FENCED_BLOCK.captures(trimmed).and_then(|c| c.get(1)) {
        Some(body) => body.as_str().trim().to_string(),
        None => trimmed.to_string(),
    }
}
