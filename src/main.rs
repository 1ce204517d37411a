use anyhow::{Context, Result, bail};
use clap::Parser;
use class_modeler::builder::{BuildOptions, ModelBuilder, NeverCancel};
use class_modeler::cli::Cli;
use class_modeler::descriptor::ClassDescriptor;
use class_modeler::filter::{AcceptAll, Filter, PublicApiFilter};
use serde::Serialize;
use std::path::Path;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Serialize)]
struct RunSummary {
    output: String,
    complete: bool,
    skipped: Vec<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let contained = read_descriptors(&cli.classes)?;
    let classpath = match &cli.classpath {
        Some(path) => read_descriptors(path)?,
        None => Vec::new(),
    };

    let filter: Box<dyn Filter> = if cli.public_api {
        Box::new(PublicApiFilter)
    } else {
        Box::new(AcceptAll)
    };
    let options = BuildOptions {
        include_features: !cli.no_features,
        include_instruction_references: cli.instruction_refs,
        dependencies_only: cli.dependencies_only,
    };

    let mut inputs = vec![input_name(&cli.classes)];
    if let Some(path) = &cli.classpath {
        inputs.push(input_name(path));
    }

    let builder = ModelBuilder::new(&cli.name, filter.as_ref(), &NeverCancel, options);
    let outcome = builder.run(&contained, &classpath, &inputs)?;

    for name in &outcome.skipped {
        warn!(class = %name, "classpath descriptor never referenced");
    }
    if !outcome.complete {
        bail!("run did not complete; no model written");
    }

    let json = serde_json::to_string_pretty(&outcome.model.export())?;
    std::fs::write(&cli.output, json)
        .with_context(|| format!("failed to write model to {}", cli.output.display()))?;

    let summary = RunSummary {
        output: cli.output.display().to_string(),
        complete: outcome.complete,
        skipped: outcome.skipped,
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn read_descriptors(path: &Path) -> Result<Vec<ClassDescriptor>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read descriptors from {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse class descriptors in {}", path.display()))
}

fn input_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
