use crate::{attachment::ImageAttachment, AppError, AppResult};
use logicleap_sdk::{LanguageModelInput, Part};

/// Task label that switches the response format to a numbered walkthrough.
pub const STEP_BY_STEP_TASK_LABEL: &str = "Give solution step by step";
/// Language label that asks the model to choose the language itself.
pub const AUTO_DETECT_LANGUAGE: &str = "Auto-detect by AI";
pub const EMPTY_INPUT_PLACEHOLDER: &str = "No text prompt provided.";
pub const EMPTY_SUBMISSION_MESSAGE: &str =
    "Please describe your problem, provide a script, or upload an image.";

const AUTO_DETECT_GUIDANCE: &str = "Auto-detect the most suitable language based on the user's request. Ensure the code block includes the correct language identifier (e.g., ```powershell).";

const PROMPT_BASE: &str = r#"
You are "LogicLeap," an expert-level scripting, automation, and cybersecurity assistant. Your primary goal is to generate accurate, efficient, and **secure** code for system administrators, developers, and power users, covering 1st, 2nd, and 3rd line IT support roles.

**Core Instructions:**
- **Security First:** Every response must be viewed through a security lens. Prioritize secure coding practices, identify potential vulnerabilities, and offer hardening advice.
- **Tiered Support Mindset:** Understand the context of the request. A 1st line script might be simple and focused on a single user, while a 3rd line script might involve server infrastructure and automation at scale.
- **Clarity and Actionability:** Provide code that works, explanations that are easy to understand, and warnings that are clear.
- **Multimodal Analysis:** If an image is provided, it is crucial context. Analyze it in conjunction with the user's text input to provide the most relevant and accurate solution. The image could be a screenshot of code, an error message, a terminal window, or a diagram.

**IMPORTANT: The response format depends on the user's selected 'Task Type'.**
"#;

const PROMPT_STEP_BY_STEP_STRUCTURE: &str = r"
**Formatting Rule: The user has selected 'Give solution step by step'.**
- You MUST structure your entire response as a numbered list of steps.
- Each step must clearly explain one part of the process.
- If a step involves a command or code, include a small, relevant code snippet *within* that step's explanation.
- **Crucially, do NOT provide one single, large code block at the beginning or end of your response.**
- The goal is to walk the user through a process, not just give them a final script.
";

const PROMPT_SCRIPT_BLOCK_STRUCTURE: &str = r####"
**Formatting Rule: The user has selected a task that requires a script or code analysis.**
- You MUST structure your response in two distinct parts: 1. The Code Block, and 2. The Explanation Block.

---

**[Part 1: The Code Block]**
- The code must be clean, well-commented, and ready to run.
- If the primary task is a review or explanation, you may present an improved version of the user's code here.
- Always use a formatted markdown code block with the correct language identifier (e.g., ```powershell, ```bash, ```vba).
- Prioritize best practices: use variables, handle potential errors, and avoid hardcoding paths or credentials.

**[Part 2: The Explanation Block]**
- Start with the heading "### Explanation:".
- Provide a clear, step-by-step breakdown of what the script does.
- Explain the purpose of key commands, functions, or parameters.
- **When the task is 'Analyze for Security', you MUST include a "### Security Analysis:" section.** In this section, detail potential risks (e.g., injection, permissions), the security measures you've implemented (e.g., input sanitization), and recommendations for secure deployment. For other tasks, this section is optional but recommended if there are security implications.
- **When the task is 'Review Code', you MUST include a "### Code Review:" section.** In this section, provide a detailed analysis covering: code quality, adherence to best practices, potential bugs, style suggestions, and areas for improvement or refactoring.
- If there are prerequisites or other important warnings, state them clearly under a "⚠️ **Important Notes:**" section.
"####;

const PROMPT_USER_REQUEST_SUFFIX: &str = r"
---

**USER REQUEST DETAILS:**

**Task Type:** {task_type}
**Output Language:** {output_language}
**User Input:**
{user_input}
";

/// Response layout requested from the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptStructure {
    StepByStep,
    ScriptBlock,
}

impl PromptStructure {
    #[must_use]
    pub fn for_task_label(task_label: &str) -> Self {
        if task_label == STEP_BY_STEP_TASK_LABEL {
            Self::StepByStep
        } else {
            Self::ScriptBlock
        }
    }

    fn instructions(self) -> &'static str {
        match self {
            Self::StepByStep => PROMPT_STEP_BY_STEP_STRUCTURE,
            Self::ScriptBlock => PROMPT_SCRIPT_BLOCK_STRUCTURE,
        }
    }
}

/// One submission: what the user asked for and the prompt built from it.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSpec {
    pub task_label: String,
    pub target_language: String,
    pub user_text: String,
    pub image: Option<ImageAttachment>,
    prompt: String,
}

impl RequestSpec {
    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn structure(&self) -> PromptStructure {
        PromptStructure::for_task_label(&self.task_label)
    }

    /// Consume the request into a single-turn model input: the prompt text,
    /// followed by the image when one is attached.
    #[must_use]
    pub fn into_input(self) -> LanguageModelInput {
        let mut content = vec![Part::text(self.prompt)];
        if let Some(image) = self.image {
            content.push(image.into_part().into());
        }
        LanguageModelInput {
            content,
            ..LanguageModelInput::default()
        }
    }
}

/// A submission needs text or an image.
pub fn validate_submission(user_text: &str, image: Option<&ImageAttachment>) -> AppResult<()> {
    if user_text.trim().is_empty() && image.is_none() {
        return Err(AppError::Validation(EMPTY_SUBMISSION_MESSAGE.to_string()));
    }
    Ok(())
}

#[must_use]
pub fn compose(
    task_label: &str,
    target_language: &str,
    user_text: &str,
    image: Option<ImageAttachment>,
) -> RequestSpec {
    let language_instruction = if target_language == AUTO_DETECT_LANGUAGE {
        AUTO_DETECT_GUIDANCE
    } else {
        target_language
    };
    let user_input = if user_text.is_empty() {
        EMPTY_INPUT_PLACEHOLDER
    } else {
        user_text
    };

    let template = [
        PROMPT_BASE,
        PromptStructure::for_task_label(task_label).instructions(),
        PROMPT_USER_REQUEST_SUFFIX,
    ]
    .concat();

    let prompt = fill_placeholders(
        &template,
        &[
            ("{task_type}", task_label),
            ("{output_language}", language_instruction),
            ("{user_input}", user_input),
        ],
    );

    RequestSpec {
        task_label: task_label.to_string(),
        target_language: target_language.to_string(),
        user_text: user_text.to_string(),
        image,
        prompt,
    }
}

/// Replace the first occurrence of each placeholder in `template`. Values
/// are inserted verbatim and never scanned for further placeholders.
fn fill_placeholders(template: &str, substitutions: &[(&str, &str)]) -> String {
    let mut found: Vec<(usize, &str, &str)> = substitutions
        .iter()
        .filter_map(|(placeholder, value)| {
            template
                .find(placeholder)
                .map(|position| (position, *placeholder, *value))
        })
        .collect();
    found.sort_by_key(|(position, _, _)| *position);

    let mut output = String::with_capacity(template.len());
    let mut cursor = 0;
    for (position, placeholder, value) in found {
        output.push_str(&template[cursor..position]);
        output.push_str(value);
        cursor = position + placeholder.len();
    }
    output.push_str(&template[cursor..]);
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_block_prompt_carries_request_details() {
        let request = compose("Explain a script", "PowerShell", "Get-Process", None);
        let prompt = request.prompt();

        assert!(prompt.contains("**Task Type:** Explain a script"));
        assert!(prompt.contains("**Output Language:** PowerShell"));
        assert!(prompt.contains("**User Input:**\nGet-Process"));
        assert!(prompt.contains("[Part 1: The Code Block]"));
        assert!(prompt.contains("[Part 2: The Explanation Block]"));
        assert!(!prompt.contains("numbered list of steps"));
        assert!(!prompt.contains(STEP_BY_STEP_TASK_LABEL));
        assert_eq!(request.structure(), PromptStructure::ScriptBlock);
    }

    #[test]
    fn step_by_step_label_selects_walkthrough() {
        let request = compose(STEP_BY_STEP_TASK_LABEL, "Bash (for WSL)", "nginx", None);
        assert!(request.prompt().contains("numbered list of steps"));
        assert!(!request.prompt().contains("[Part 1: The Code Block]"));
        assert_eq!(request.structure(), PromptStructure::StepByStep);
    }

    #[test]
    fn auto_detect_is_replaced_by_guidance() {
        let request = compose("Create script", AUTO_DETECT_LANGUAGE, "list files", None);
        assert!(request
            .prompt()
            .contains("**Output Language:** Auto-detect the most suitable language"));
    }

    #[test]
    fn empty_text_uses_placeholder() {
        let request = compose("Create script", "Python", "", None);
        assert!(request.prompt().contains(EMPTY_INPUT_PLACEHOLDER));
    }

    #[test]
    fn values_are_inserted_verbatim() {
        let request = compose("Create script", "Python", "echo {task_type} $&", None);
        assert!(request
            .prompt()
            .contains("**User Input:**\necho {task_type} $&"));
        assert!(request.prompt().contains("**Task Type:** Create script"));
    }

    #[test]
    fn validation_requires_text_or_image() {
        let error = validate_submission("   ", None).unwrap_err();
        assert_eq!(error.display_message(), EMPTY_SUBMISSION_MESSAGE);

        let image = ImageAttachment::from_bytes(&[137, 80, 78, 71], "image/png").unwrap();
        assert!(validate_submission("", Some(&image)).is_ok());
        assert!(validate_submission("df -h", None).is_ok());
    }

    #[test]
    fn input_carries_prompt_then_image() {
        let image = ImageAttachment::from_bytes(b"png", "image/png").unwrap();
        let input = compose("Debug a script", "Python", "why?", Some(image)).into_input();
        assert_eq!(input.content.len(), 2);
        assert!(matches!(input.content[0], Part::Text(_)));
        assert!(matches!(input.content[1], Part::Image(_)));
    }
}
