use super::generate_draft;
use crate::error::StageError;
use crate::lm::LmSession;
use crate::pipeline::Stage;
use crate::record::Record;

/// Produce a draft from the collected input.
pub struct GenerateStage<'a> {
    session: &'a LmSession<'a>,
}

impl<'a> GenerateStage<'a> {
    pub fn new(session: &'a LmSession<'a>) -> Self {
        Self { session }
    }
}

impl Stage for GenerateStage<'_> {
    fn name(&self) -> &'static str {
        "generate"
    }

    fn run(&mut self, record: &mut Record) -> Result<(), StageError> {
        let Some(input) = record.input.as_ref() else {
            return Err(StageError::Generation("no input collected".to_string()));
        };
        record.draft = generate_draft(self.session, input)?;
        Ok(())
    }
}
