//! Prompt construction for the two generation roles: the architect, which
//! turns a request into a file-level plan, and the developer, which emits
//! the content of one file per call.
//!
//! All builders are pure string rendering. The canonical reply format is a
//! raw JSON object with no markdown fence and no prose; the extractor
//! tolerates fenced replies anyway, so drift in either direction cannot
//! break the pipeline.

use crate::analyzer::ProjectAnalysis;

const OUTPUT_RULES: &str = "Return ONLY a valid JSON object. \
No markdown fences, no explanations, no text before or after the JSON.";

/// System-role context shared by every generation call.
pub fn system_context(analysis: &ProjectAnalysis) -> String {
    format!(
        "You are an expert assistant generating high-quality React/TypeScript code.\n\
         \n\
         CURRENT PROJECT:\n\
         {summary}\n\
         \n\
         GENERATION RULES:\n\
         1. Use TypeScript with React wherever possible\n\
         2. Use Tailwind CSS utility classes for styling\n\
         3. Follow the patterns already established in the project\n\
         4. Use functional components with hooks\n\
         5. Include every required import\n\
         6. Code must be complete, functional and ready to run\n\
         7. Use descriptive names and modern conventions\n\
         8. Consider mobile-first responsiveness\n\
         \n\
         AVAILABLE TECHNOLOGIES:\n\
         {technologies}\n\
         \n\
         {rules}",
        summary = analysis.summary,
        technologies = analysis.technologies.join(", "),
        rules = OUTPUT_RULES,
    )
}

/// Architect instruction: decompose the user's request into an ordered
/// file-level plan.
pub fn planning(analysis: &ProjectAnalysis, request: &str, extra_context: &str) -> String {
    let mut prompt = String::new();
    if !extra_context.is_empty() {
        prompt.push_str(extra_context);
        prompt.push_str("\n\n");
    }
    prompt.push_str(&format!(
        "PROJECT CONTEXT:\n\
         {summary}\n\
         Existing components: {components}\n\
         Existing pages: {pages}\n\
         \n\
         USER REQUEST:\n\
         {request}\n\
         \n\
         Act as a software architect. Break this request into an ordered list \
         of file-level tasks. Each task creates or modifies exactly one file \
         under the project source root, using a relative path. Order tasks so \
         that files other files depend on come first.\n\
         \n\
         Respond with a JSON object of this exact shape:\n\
         {{\n\
         \x20 \"plan\": [\n\
         \x20   {{ \"path\": \"components/Example.tsx\", \"action\": \"create\", \"instruction\": \"what to build in this file\" }}\n\
         \x20 ],\n\
         \x20 \"description\": \"one-sentence summary of the overall change\"\n\
         }}\n\
         \n\
         The \"action\" field must be \"create\" or \"modify\". {rules}",
        summary = analysis.summary,
        components = join_or_none(&analysis.components),
        pages = join_or_none(&analysis.pages),
        request = request,
        rules = OUTPUT_RULES,
    ));
    prompt
}

/// Developer instruction for a create task.
pub fn execute_create(path: &str, instruction: &str, analysis: &ProjectAnalysis) -> String {
    format!(
        "Create the file `{path}`.\n\
         \n\
         TASK:\n\
         {instruction}\n\
         \n\
         PROJECT CONTEXT:\n\
         {summary}\n\
         Available technologies: {technologies}\n\
         \n\
         {shape}",
        path = path,
        instruction = instruction,
        summary = analysis.summary,
        technologies = analysis.technologies.join(", "),
        shape = files_shape(path),
    )
}

/// Developer instruction for a modify task. The complete current file
/// content is inlined so the model rewrites the whole file rather than
/// emitting a fragment.
pub fn execute_modify(path: &str, instruction: &str, original_content: &str) -> String {
    format!(
        "Modify the file `{path}`.\n\
         \n\
         TASK:\n\
         {instruction}\n\
         \n\
         CURRENT CONTENT OF `{path}`:\n\
         {original}\n\
         \n\
         Return the complete updated file, not a diff or a fragment.\n\
         {shape}",
        path = path,
        instruction = instruction,
        original = original_content,
        shape = files_shape(path),
    )
}

fn files_shape(path: &str) -> String {
    format!(
        "Respond with a JSON object of this exact shape:\n\
         {{\n\
         \x20 \"files\": [\n\
         \x20   {{ \"path\": \"{path}\", \"content\": \"full file content with all imports\" }}\n\
         \x20 ],\n\
         \x20 \"description\": \"what was generated\"\n\
         }}\n\
         \n\
         {OUTPUT_RULES}"
    )
}

fn join_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}
