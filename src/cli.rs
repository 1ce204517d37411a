use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "class-modeler")]
#[command(about = "Build a class-diagram model from decoded Java class descriptors")]
pub struct Cli {
    /// JSON file holding the contained class descriptors.
    pub classes: PathBuf,

    /// JSON file holding classpath class descriptors, included only when
    /// referenced from the model.
    #[arg(long, value_name = "FILE")]
    pub classpath: Option<PathBuf>,

    #[arg(short = 'o', long, value_name = "FILE", default_value = "api.json")]
    pub output: PathBuf,

    /// Name of the output model root element.
    #[arg(long, value_name = "NAME", default_value = "api")]
    pub name: String,

    /// Keep only classifiers that participate in the dependency closure.
    #[arg(long)]
    pub dependencies_only: bool,

    /// Include elements that are only referred to by bytecode instructions.
    #[arg(long)]
    pub instruction_refs: bool,

    /// Skip classifier properties and operations.
    #[arg(long)]
    pub no_features: bool,

    /// Include only the named public/protected API.
    #[arg(long)]
    pub public_api: bool,
}
