use crate::documents::brd::{self, BrdInput};
use crate::documents::user_stories::BrdDetails;
use crate::documents::{self, code_doc, DocumentInput, DocumentKind};
use crate::error::StageError;
use crate::pipeline::Stage;
use crate::record::Record;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

/// Where the input stage reads from.
pub enum InputSource<'a> {
    File(PathBuf),
    /// Terminal prompts; only BRD input can be collected this way.
    Interactive {
        reader: Box<dyn BufRead + 'a>,
        writer: Box<dyn Write + 'a>,
    },
}

impl InputSource<'static> {
    /// Prompts on stderr, answers from stdin.
    pub fn terminal() -> Self {
        InputSource::Interactive {
            reader: Box::new(io::stdin().lock()),
            writer: Box::new(io::stderr()),
        }
    }
}

pub struct InputStage<'a> {
    source: InputSource<'a>,
}

impl<'a> InputStage<'a> {
    pub fn new(source: InputSource<'a>) -> Self {
        Self { source }
    }

    fn collect(&mut self, kind: DocumentKind) -> anyhow::Result<DocumentInput> {
        let input = match (&mut self.source, kind) {
            (InputSource::File(path), DocumentKind::Brd) => {
                let input: BrdInput = documents::load_structured(path)?;
                DocumentInput::Brd(checked_brd(input.normalized())?)
            }
            (InputSource::Interactive { reader, writer }, DocumentKind::Brd) => {
                let input = brd::read_interactive(reader, writer)?;
                DocumentInput::Brd(checked_brd(input)?)
            }
            (InputSource::File(path), DocumentKind::CodeDoc) => {
                DocumentInput::CodeDoc(code_doc::load(path)?)
            }
            (InputSource::File(path), DocumentKind::UserStories) => {
                let details: BrdDetails = documents::load_structured(path)?;
                DocumentInput::UserStories(details.validated()?)
            }
            (InputSource::Interactive { .. }, other) => {
                return Err(anyhow::anyhow!(
                    "interactive input is only available for BRD, not {}",
                    other.noun()
                ));
            }
        };
        Ok(input)
    }
}

fn checked_brd(input: BrdInput) -> anyhow::Result<BrdInput> {
    let missing = input.missing_fields();
    if !missing.is_empty() {
        return Err(anyhow::anyhow!(
            "missing required fields: {}",
            missing.join(", ")
        ));
    }
    Ok(input)
}

impl Stage for InputStage<'_> {
    fn name(&self) -> &'static str {
        "input"
    }

    fn run(&mut self, record: &mut Record) -> Result<(), StageError> {
        let input = self
            .collect(record.kind)
            .map_err(|err| StageError::Input(format!("{err:#}")))?;
        tracing::info!(kind = %record.kind, label = %input.artifact_label(), "input collected");
        record.input = Some(input);
        Ok(())
    }
}
