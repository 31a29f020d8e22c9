//! CDAP operator CLI - expands a CDAPMaster into Kubernetes manifests

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use kube::CustomResourceExt;

use cdap_common::crd::CDAPMaster;
use cdap_common::quantity;
use cdap_common::telemetry::{init_telemetry, LogFormat, TelemetryConfig};
use cdap_deployment::heap::{HeapSizing, DEFAULT_MIN_HEAP_RATIO};
use cdap_deployment::SpecBuilder;
use cdap_operator::{generate_manifests, ManifestRenderer};

/// CDAP operator - places the CDAP service catalog onto StatefulSets, Deployments and Services
#[derive(Parser, Debug)]
#[command(name = "cdap-operator", version, about, long_about = None)]
struct Cli {
    /// Print the CDAPMaster CRD manifest and exit
    #[arg(long)]
    crd: bool,

    /// Log output format: json or text
    #[arg(long, env = "CDAP_LOG_FORMAT", default_value_t = LogFormat::default(), global = true)]
    log_format: LogFormat,

    #[command(flatten)]
    heap: HeapArgs,

    /// Extra label added to every object, as key=value (repeatable)
    #[arg(
        long = "label",
        env = "CDAP_LABELS",
        value_delimiter = ',',
        value_parser = parse_label,
        global = true
    )]
    labels: Vec<(String, String)>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the intermediate spec bundle as YAML
    Build(InputArgs),

    /// Print rendered manifests as a multi-document YAML stream
    Render(InputArgs),
}

/// Input file arguments
#[derive(Args, Debug)]
struct InputArgs {
    /// Path to the CDAPMaster YAML
    #[arg(short = 'f', long = "file")]
    file: PathBuf,
}

/// JVM heap sizing
#[derive(Args, Debug)]
struct HeapArgs {
    /// Memory left to the JVM outside the heap (e.g. 768Mi)
    #[arg(
        long,
        env = "CDAP_HEAP_RESERVED_NON_HEAP",
        default_value = "768Mi",
        value_parser = parse_size,
        global = true
    )]
    heap_reserved_non_heap: u64,

    /// Minimum heap as a fraction of container memory
    #[arg(
        long,
        env = "CDAP_HEAP_MIN_RATIO",
        default_value_t = DEFAULT_MIN_HEAP_RATIO,
        value_parser = parse_ratio,
        global = true
    )]
    heap_min_ratio: f64,
}

impl From<&HeapArgs> for HeapSizing {
    fn from(args: &HeapArgs) -> Self {
        HeapSizing {
            reserved_non_heap: args.heap_reserved_non_heap,
            min_heap_ratio: args.heap_min_ratio,
        }
    }
}

fn parse_label(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("invalid label '{}': expected key=value", s)),
    }
}

fn parse_size(s: &str) -> Result<u64, String> {
    quantity::parse(s).map_err(|e| e.to_string())
}

fn parse_ratio(s: &str) -> Result<f64, String> {
    let ratio: f64 = s.parse().map_err(|e| format!("invalid ratio '{}': {}", s, e))?;
    if !(0.0..=1.0).contains(&ratio) {
        return Err(format!("ratio {} must be between 0 and 1", ratio));
    }
    Ok(ratio)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_telemetry(TelemetryConfig {
        format: cli.log_format,
        ..Default::default()
    })?;

    if cli.crd {
        let crd = serde_yaml::to_string(&CDAPMaster::crd())
            .map_err(|e| anyhow::anyhow!("Failed to serialize CRD: {}", e))?;
        println!("{crd}");
        return Ok(());
    }

    let labels: BTreeMap<String, String> = cli.labels.into_iter().collect();
    let builder = SpecBuilder::default().with_heap_sizing(HeapSizing::from(&cli.heap));

    match cli.command {
        Some(Commands::Build(args)) => run_build(&builder, &args.file, &labels),
        Some(Commands::Render(args)) => run_render(&builder, &args.file, &labels),
        None => anyhow::bail!("a subcommand is required unless --crd is given"),
    }
}

fn read_master(path: &Path) -> anyhow::Result<CDAPMaster> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read {:?}: {}", path, e))?;
    serde_yaml::from_str(&content)
        .map_err(|e| anyhow::anyhow!("Failed to parse CDAPMaster {:?}: {}", path, e))
}

/// Print the spec bundle
fn run_build(
    builder: &SpecBuilder<'_>,
    path: &Path,
    labels: &BTreeMap<String, String>,
) -> anyhow::Result<()> {
    let master = read_master(path)?;
    let app = master.metadata.name.clone().unwrap_or_default();
    let bundle = builder
        .build(&master, labels)
        .map_err(|e| e.into_error(app))?;
    print!("{}", serde_yaml::to_string(&bundle)?);
    Ok(())
}

/// Print rendered manifests
fn run_render(
    builder: &SpecBuilder<'_>,
    path: &Path,
    labels: &BTreeMap<String, String>,
) -> anyhow::Result<()> {
    let master = read_master(path)?;
    let objects = generate_manifests(builder, &ManifestRenderer::new(), &master, labels)?;
    if objects.is_empty() {
        tracing::warn!(
            file = %path.display(),
            "CDAPMaster status has no resolved images, nothing rendered"
        );
        return Ok(());
    }

    for object in &objects {
        print!("---\n{}", serde_yaml::to_string(object)?);
    }
    tracing::info!(objects = objects.len(), "rendered manifests");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_label() {
        assert_eq!(
            parse_label("team=data").unwrap(),
            ("team".to_string(), "data".to_string())
        );
        assert_eq!(
            parse_label("empty=").unwrap(),
            ("empty".to_string(), String::new())
        );
        assert!(parse_label("=x").is_err());
        assert!(parse_label("novalue").is_err());
    }

    #[test]
    fn test_parse_ratio_bounds() {
        assert_eq!(parse_ratio("0.75").unwrap(), 0.75);
        assert!(parse_ratio("1.5").is_err());
        assert!(parse_ratio("-0.1").is_err());
        assert!(parse_ratio("half").is_err());
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["cdap-operator", "render", "-f", "master.yaml"]).unwrap();
        let heap = HeapSizing::from(&cli.heap);
        assert_eq!(heap, HeapSizing::default());
        assert!(cli.labels.is_empty());
        assert!(matches!(cli.command, Some(Commands::Render(_))));
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::try_parse_from([
            "cdap-operator",
            "build",
            "-f",
            "master.yaml",
            "--heap-reserved-non-heap",
            "1Gi",
            "--heap-min-ratio",
            "0.5",
            "--label",
            "team=data",
            "--label",
            "env=dev",
            "--log-format",
            "text",
        ])
        .unwrap();
        assert_eq!(cli.heap.heap_reserved_non_heap, 1 << 30);
        assert_eq!(cli.heap.heap_min_ratio, 0.5);
        assert_eq!(cli.labels.len(), 2);
        assert_eq!(cli.log_format, LogFormat::Text);
    }

    #[test]
    fn test_cli_rejects_bad_size() {
        assert!(Cli::try_parse_from([
            "cdap-operator",
            "--heap-reserved-non-heap",
            "lots",
            "build",
            "-f",
            "m.yaml"
        ])
        .is_err());
    }
}
