//! The four document stages: input, generate, validate, output.
//!
//! Every stage implements [`crate::pipeline::Stage`] and is kind-agnostic;
//! per-kind behavior is looked up in [`crate::documents`].
mod generate;
mod input;
mod output;
mod validate;

pub use generate::GenerateStage;
pub use input::{InputSource, InputStage};
pub use output::OutputStage;
pub use validate::ValidateStage;

use crate::documents::{self, DocumentInput};
use crate::error::StageError;
use crate::lm::log::CallKind;
use crate::lm::{LmSession, PREVIEW_BYTES};
use crate::util::truncate_string;

/// Run the generation prompt for `input` and return the trimmed draft.
fn generate_draft(session: &LmSession<'_>, input: &DocumentInput) -> Result<String, StageError> {
    let kind = input.kind();
    let request = documents::generation_request(input);
    let draft = session
        .call(kind, CallKind::Generate, &request)
        .map_err(|failure| {
            StageError::Generation(format!("{} generation failed: {failure}", kind.noun()))
        })?;
    let draft = draft.trim().to_string();
    tracing::debug!(draft = %truncate_string(&draft, PREVIEW_BYTES), "draft generated");
    Ok(draft)
}
