//! Command entry points: resolve config, build the pipeline, report the result.
use crate::cli::Command;
use crate::config::Config;
use crate::documents::DocumentKind;
use crate::lm::log::LmLog;
use crate::lm::{self, LmSession};
use crate::paths::OutputPaths;
use crate::pipeline::Pipeline;
use crate::record::Record;
use crate::report::{append_history, RunReport, RunSettings};
use crate::stages::{GenerateStage, InputSource, InputStage, OutputStage, ValidateStage};
use crate::util::display_path;
use anyhow::{anyhow, Context, Result};
use std::time::Instant;

/// Run one document command end to end.
pub fn run(command: Command) -> Result<()> {
    let common = command.common().clone();
    let config = Config::resolve(common.config.as_deref(), &common.overrides(), |name| {
        std::env::var(name).ok()
    })?;
    let (kind, source) = match command {
        Command::Brd(args) => (
            DocumentKind::Brd,
            args.input
                .map(InputSource::File)
                .unwrap_or_else(InputSource::terminal),
        ),
        Command::CodeDoc(args) => (DocumentKind::CodeDoc, InputSource::File(args.code)),
        Command::UserStories(args) => (DocumentKind::UserStories, InputSource::File(args.brd)),
    };
    if !kind.supports_format(config.output.format) {
        return Err(anyhow!(
            "{} cannot be written as {}; use --format markdown or text",
            kind.noun(),
            config.output.format.extension()
        ));
    }

    let generator = lm::build_generator(&config.lm)?;
    let paths = OutputPaths::new(config.output.dir.clone());
    let session = LmSession::new(
        generator.as_ref(),
        config.retry_policy(),
        LmLog::open(paths.clone(), common.verbose),
    );
    let settings = RunSettings {
        format: config.output.format,
        backend: generator.describe(),
        self_review: config.validation.self_review,
    };

    let start = Instant::now();
    let record = run_document(kind, source, &session, &config);
    let report = RunReport::from_record(&record, &settings, start.elapsed().as_millis() as u64);
    if let Err(err) = append_history(&paths, &report) {
        tracing::warn!(error = %format!("{err:#}"), "history append failed");
    }

    if common.json {
        let text = serde_json::to_string_pretty(&report).context("serialize run report")?;
        println!("{text}");
    }
    let record = record.into_result()?;
    if !common.json {
        if let Some(artifact) = &record.artifact {
            let cwd = std::env::current_dir().ok();
            println!("wrote {}", display_path(artifact, cwd.as_deref()));
        }
    }
    Ok(())
}

/// Thread a fresh record through input, generate, validate and output.
pub fn run_document<'a>(
    kind: DocumentKind,
    source: InputSource<'a>,
    session: &'a LmSession<'a>,
    config: &Config,
) -> Record {
    let mut pipeline = Pipeline::new()
        .then(InputStage::new(source))
        .then(GenerateStage::new(session))
        .then(ValidateStage::new(
            session,
            config.validation.max_cycles,
            config.validation.self_review,
        ))
        .then(OutputStage::new(
            OutputPaths::new(config.output.dir.clone()),
            config.output.format,
        ));
    tracing::debug!(stages = ?pipeline.stage_names(), %kind, "pipeline ready");
    pipeline.run(Record::new(kind))
}
