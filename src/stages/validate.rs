use super::generate_draft;
use crate::documents;
use crate::error::StageError;
use crate::lm::log::CallKind;
use crate::lm::LmSession;
use crate::pipeline::Stage;
use crate::record::Record;

/// Self-review the draft and apply the structural check.
///
/// A failed check starts a new cycle: the draft is regenerated and reviewed
/// again, up to `max_cycles` cycles in total (the first cycle reuses the draft
/// from the generate stage). With self-review disabled the check runs on the
/// draft itself.
pub struct ValidateStage<'a> {
    session: &'a LmSession<'a>,
    max_cycles: u32,
    self_review: bool,
}

impl<'a> ValidateStage<'a> {
    pub fn new(session: &'a LmSession<'a>, max_cycles: u32, self_review: bool) -> Self {
        Self {
            session,
            max_cycles: max_cycles.max(1),
            self_review,
        }
    }
}

impl Stage for ValidateStage<'_> {
    fn name(&self) -> &'static str {
        "validate"
    }

    fn run(&mut self, record: &mut Record) -> Result<(), StageError> {
        let kind = record.kind;
        let Some(input) = record.input.as_ref() else {
            return Err(StageError::Validation("no input collected".to_string()));
        };
        record.validated.clear();

        let mut problems = Vec::new();
        for cycle in 1..=self.max_cycles {
            if cycle > 1 {
                tracing::warn!(
                    cycle,
                    max_cycles = self.max_cycles,
                    problems = %problems.join("; "),
                    "structural check failed; regenerating"
                );
                record.draft = generate_draft(self.session, input)?;
            }

            let candidate = if self.self_review {
                let request = documents::review_request(input, &record.draft);
                self.session
                    .call(kind, CallKind::SelfReview, &request)
                    .map_err(|failure| {
                        StageError::Validation(format!(
                            "{} self-review failed: {failure}",
                            kind.noun()
                        ))
                    })?
                    .trim()
                    .to_string()
            } else {
                record.draft.clone()
            };

            match documents::check_structure(kind, &candidate) {
                Ok(()) => {
                    tracing::info!(cycle, self_review = self.self_review, "structural check passed");
                    record.validated = candidate;
                    return Ok(());
                }
                Err(found) => problems = found,
            }
        }

        Err(StageError::Validation(format!(
            "{} failed the structural check after {} cycle(s): {}",
            kind.noun(),
            self.max_cycles,
            problems.join("; ")
        )))
    }
}
