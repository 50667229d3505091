//! Fixed instruction text sent to the model.
//!
//! Treated as opaque configuration by the rest of the crate: only the
//! functions here know what the instructions say.

/// System instruction for the planning step.
pub const PLAN_SYSTEM_PROMPT: &str = r#"You are a senior software architect.

Write a high-level implementation plan for the application the user describes.
Use GitHub Markdown. Begin the plan with a YAML block listing every file that
will be created.

For each file, name and briefly describe the code it will contain: the
variables it exports, its data schemas, the id of every DOM element that
scripts will look up, message names, and function names.

Respond only with the plan in this format."#;

/// System instruction for the file-list extraction step.
pub const EXTRACT_SYSTEM_PROMPT: &str = "You extract a minimal and necessary list of files \
based on the app prompt and the architecture plan. Avoid unnecessary files.";

/// Name of the forced function used for file-list extraction.
pub const FILE_LIST_FUNCTION: &str = "file_paths";

/// Fallback application description used when none is supplied.
pub const DEFAULT_PROMPT: &str = "Create login/register page using HTML, CSS, and JavaScript.";

/// System instruction for generating one file.
pub fn code_system_prompt(file_path: &str) -> String {
    format!(
        r#"You are a senior software architect.
The application has been planned, and each file named in the plan is generated
on its own. The plan names the exports, data schemas, DOM element ids, message
names, and function names of every file.

Your job now is to write the code for exactly one file: {file_path}

Write only valid code for that path and file type. Return only the code, with
no explanation."#
    )
}

/// Closing user instruction for generating one file.
pub fn code_final_instruction(file_path: &str) -> String {
    format!(
        r#"Keep file names consistent with the plan whenever this file references
another generated file.

Three rules:
  - you are writing the code for {file_path}
  - do not invent files or names that are not in the plan we agreed on
  - every line you return must be valid code; do not wrap it in markdown
    code fences and do not add prose

Bad response (wrapped in a fence):
```javascript
console.log("hello world")
```

Good response (code only):
console.log("hello world")

Write the code now."#
    )
}
