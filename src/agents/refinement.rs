//! Iterative document refinement
//!
//! ```text
//! IterativeWritingPipeline (sequential)
//! ├── InitialWriterAgent           -> current_document
//! └── RefinementLoop (max 5)
//!     ├── CriticAgent              -> criticism
//!     └── RefinerAgent [exit_loop] -> current_document
//! ```
//!
//! Every stage sees only its instruction and the user's topic; the draft and
//! critique travel through session state.

use crate::orchestration::{IncludeContents, ModelStage, PlanNode};
use crate::provider::ModelProvider;
use crate::tools::ExitLoopTool;
use std::sync::Arc;

pub const PIPELINE_NAME: &str = "IterativeWritingPipeline";
pub const LOOP_NAME: &str = "RefinementLoop";
pub const WRITER_AGENT: &str = "InitialWriterAgent";
pub const CRITIC_AGENT: &str = "CriticAgent";
pub const REFINER_AGENT: &str = "RefinerAgent";

pub const CURRENT_DOC_KEY: &str = "current_document";
pub const CRITICISM_KEY: &str = "criticism";

/// Exact critique meaning the draft needs no further work
pub const COMPLETION_PHRASE: &str = "No major issues found.";

pub const DEFAULT_MAX_ITERATIONS: u32 = 5;

const WRITER_INSTRUCTION: &str = "You are a Creative Writing Assistant tasked with starting a story.
Write the *first draft* of a short story (aim for 2-4 sentences).
Base the content *only* on the topic provided by the user in their message. Try to introduce a specific element (like a character, a setting detail, or a starting action) to make it engaging.

Output *only* the story/document text. Do not add introductions or explanations.
";

fn critic_instruction() -> String {
    format!(
        "You are a Constructive Critic AI reviewing a short document draft (typically 2-6 sentences). Your goal is balanced feedback.

**Document to Review:**
```
{{current_document}}
```

**Task:**
Review the document for clarity, engagement, and basic coherence according to the initial topic (if known).

IF you identify 1-2 *clear and actionable* ways the document could be improved to better capture the topic or enhance reader engagement (e.g., \"Needs a stronger opening sentence\", \"Clarify the character's goal\"):
Provide these specific suggestions concisely. Output *only* the critique text.

ELSE IF the document is coherent, addresses the topic adequately for its length, and has no glaring errors or obvious omissions:
Respond *exactly* with the phrase \"{phrase}\" and nothing else. It doesn't need to be perfect, just functionally complete for this stage. Avoid suggesting purely subjective stylistic preferences if the core is sound.

Do not add explanations. Output only the critique OR the exact completion phrase.
",
        phrase = COMPLETION_PHRASE
    )
}

fn refiner_instruction() -> String {
    format!(
        "You are a Creative Writing Assistant refining a document based on feedback OR exiting the process.
**Current Document:**
```
{{current_document}}
```
**Critique/Suggestions:**
{{criticism}}

**Task:**
Analyze the 'Critique/Suggestions'.
IF the critique is *exactly* \"{phrase}\":
You MUST call the 'exit_loop' function. Do not output any text.
ELSE (the critique contains actionable feedback):
Carefully apply the suggestions to improve the 'Current Document'. Output *only* the refined document text.

Do not add explanations. Either output the refined document OR call the exit_loop function.
",
        phrase = COMPLETION_PHRASE
    )
}

pub fn writer_stage(model: Arc<dyn ModelProvider>) -> ModelStage {
    ModelStage::new(WRITER_AGENT, model)
        .with_description(
            "Writes the initial document draft based on the topic, aiming for some initial substance.",
        )
        .with_instruction(WRITER_INSTRUCTION)
        .with_include_contents(IncludeContents::None)
        .with_output_key(CURRENT_DOC_KEY)
}

pub fn critic_stage(model: Arc<dyn ModelProvider>) -> ModelStage {
    ModelStage::new(CRITIC_AGENT, model)
        .with_description(
            "Reviews the current draft, providing critique if clear improvements are needed, otherwise signals completion.",
        )
        .with_instruction(critic_instruction())
        .with_include_contents(IncludeContents::None)
        .with_output_key(CRITICISM_KEY)
}

pub fn refiner_stage(model: Arc<dyn ModelProvider>) -> ModelStage {
    ModelStage::new(REFINER_AGENT, model)
        .with_description(
            "Refines the document based on critique, or calls exit_loop if critique indicates completion.",
        )
        .with_instruction(refiner_instruction())
        .with_include_contents(IncludeContents::None)
        .with_tool(Arc::new(ExitLoopTool))
        .with_output_key(CURRENT_DOC_KEY)
}

/// Writer followed by a critic/refiner loop of at most `max_iterations` rounds
pub fn document_refinement_pipeline_with(
    model: Arc<dyn ModelProvider>,
    max_iterations: u32,
) -> PlanNode {
    let body = PlanNode::sequential(
        format!("{}Body", LOOP_NAME),
        vec![
            PlanNode::leaf(critic_stage(Arc::clone(&model))),
            PlanNode::leaf(refiner_stage(Arc::clone(&model))),
        ],
    );

    PlanNode::sequential(
        PIPELINE_NAME,
        vec![
            PlanNode::leaf(writer_stage(model)),
            PlanNode::looped(LOOP_NAME, body, max_iterations),
        ],
    )
}

pub fn document_refinement_pipeline(model: Arc<dyn ModelProvider>) -> PlanNode {
    document_refinement_pipeline_with(model, DEFAULT_MAX_ITERATIONS)
}
