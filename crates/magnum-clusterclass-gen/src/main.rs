//! Prints the ClusterClass composed out of all bundled features, optionally together with the
//! default templates it references.
use std::io::Write;

use clap::Parser;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::core::DynamicObject;
use magnum_clusterclass::{
    builder::{self, ClusterClassBuilder},
    crd::ClusterClass,
    features, templates,
};
use magnum_shared::yaml::{self, SerializeOptions, YamlDocument};
use serde::Serialize;
use snafu::{ResultExt, Snafu};
use tracing::info;

mod logging;

const APP_NAME: &str = "magnum-clusterclass-gen";
const DEFAULT_NAME: &str = concat!("magnum-v", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("failed to initialize logging"))]
    InitializeLogging { source: logging::Error },

    #[snafu(display("failed to build ClusterClass"))]
    BuildClusterClass { source: builder::Error },

    #[snafu(display("failed to serialize ClusterClass as YAML"))]
    SerializeClusterClass { source: yaml::Error },

    #[snafu(display("failed to serialize ClusterClass as JSON"))]
    SerializeClusterClassJson { source: serde_json::Error },

    #[snafu(display("failed to write documents to stdout"))]
    WriteOutput { source: std::io::Error },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum, strum::Display)]
#[strum(serialize_all = "lowercase")]
enum OutputFormat {
    #[default]
    Yaml,
    Json,
}

#[derive(Debug, Parser)]
#[command(version, about)]
struct Opts {
    /// Name of the ClusterClass and of every template it references.
    #[arg(long, env = "MAGNUM_CLUSTERCLASS_NAME", default_value = DEFAULT_NAME)]
    name: String,

    #[arg(long, env = "MAGNUM_CLUSTERCLASS_NAMESPACE", default_value = "magnum-system")]
    namespace: String,

    #[arg(long, env = "MAGNUM_CLUSTERCLASS_OUTPUT", value_enum, default_value_t)]
    output: OutputFormat,

    /// Also print the default templates referenced by the ClusterClass.
    #[arg(long)]
    with_templates: bool,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Document<'a> {
    ClusterClass(&'a ClusterClass),
    Template(&'a DynamicObject),
}

impl Opts {
    fn metadata(&self) -> ObjectMeta {
        ObjectMeta {
            name: Some(self.name.clone()),
            namespace: Some(self.namespace.clone()),
            ..ObjectMeta::default()
        }
    }
}

/// Renders all requested documents into a single string. Nothing is returned unless every
/// document serialized successfully.
fn render(opts: &Opts) -> Result<String, Error> {
    let registry = features::default_registry();
    let cluster_class = ClusterClassBuilder::from_registry(&registry)
        .build(opts.metadata())
        .context(BuildClusterClassSnafu)?;

    let templates = if opts.with_templates {
        templates::all(&cluster_class.metadata)
    } else {
        Vec::new()
    };

    let documents: Vec<_> = std::iter::once(Document::ClusterClass(&cluster_class))
        .chain(templates.iter().map(Document::Template))
        .collect();

    info!(
        name = opts.name.as_str(),
        namespace = opts.namespace.as_str(),
        features = registry.len(),
        documents = documents.len(),
        format = %opts.output,
        "rendering ClusterClass"
    );

    match opts.output {
        OutputFormat::Yaml => {
            let mut output = String::new();
            for document in &documents {
                output.push_str(
                    &document
                        .to_yaml_string(SerializeOptions::default())
                        .context(SerializeClusterClassSnafu)?,
                );
            }

            Ok(output)
        }
        OutputFormat::Json if opts.with_templates => {
            serde_json::to_string_pretty(&documents).context(SerializeClusterClassJsonSnafu)
        }
        OutputFormat::Json => {
            serde_json::to_string_pretty(&cluster_class).context(SerializeClusterClassJsonSnafu)
        }
    }
}

#[snafu::report]
fn main() -> Result<(), Error> {
    let opts = Opts::parse();
    logging::initialize_logging("MAGNUM_CLUSTERCLASS_LOG", APP_NAME)
        .context(InitializeLoggingSnafu)?;

    let mut output = render(&opts)?;
    if opts.output == OutputFormat::Json {
        output.push('\n');
    }

    std::io::stdout()
        .lock()
        .write_all(output.as_bytes())
        .context(WriteOutputSnafu)
}
