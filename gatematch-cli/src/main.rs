use clap::Parser;
use gatematch::raster::io::load_gray_raster;
use gatematch::{
    IrregularGrid, LayerId, MatchingSession, MemoryModel, Orientation, Region, ScanPolicy,
    SessionOutcome, SessionParameters, TemplateEntry, TemplateId,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const EXAMPLE_JSON: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.example.json"));

#[derive(Parser, Debug)]
#[command(author, version, about = "Gate template matching (JSON config driven)")]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "config.json")]
    config: PathBuf,
    /// Print an example config and exit.
    #[arg(long)]
    print_example: bool,
    /// Enable tracing output for performance profiling.
    #[arg(long)]
    trace: bool,
}

#[derive(Debug, Deserialize)]
struct RegionConfig {
    min_x: usize,
    min_y: usize,
    max_x: usize,
    max_y: usize,
}

impl From<&RegionConfig> for Region {
    fn from(value: &RegionConfig) -> Self {
        Region::new(value.min_x, value.min_y, value.max_x, value.max_y)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum PolicyConfig {
    Free,
    GridRows,
    GridCols,
}

impl From<&PolicyConfig> for ScanPolicy {
    fn from(value: &PolicyConfig) -> Self {
        match value {
            PolicyConfig::Free => ScanPolicy::Free,
            PolicyConfig::GridRows => ScanPolicy::GridRows,
            PolicyConfig::GridCols => ScanPolicy::GridCols,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum OrientationConfig {
    Normal,
    FlippedUpDown,
    FlippedBoth,
    FlippedLeftRight,
}

impl From<&OrientationConfig> for Orientation {
    fn from(value: &OrientationConfig) -> Self {
        match value {
            OrientationConfig::Normal => Orientation::Normal,
            OrientationConfig::FlippedUpDown => Orientation::FlippedUpDown,
            OrientationConfig::FlippedBoth => Orientation::FlippedBoth,
            OrientationConfig::FlippedLeftRight => Orientation::FlippedLeftRight,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TemplateConfig {
    id: u64,
    bounds: RegionConfig,
    orientations: Option<Vec<OrientationConfig>>,
}

fn default_scale_down() -> usize {
    2
}

fn default_tau_hill_climb() -> f64 {
    0.45
}

fn default_tau_detect() -> f64 {
    0.7
}

fn default_max_step() -> usize {
    4
}

fn default_policy() -> PolicyConfig {
    PolicyConfig::Free
}

#[derive(Debug, Deserialize)]
struct RunConfig {
    master: PathBuf,
    /// Search region; the whole master raster when omitted.
    search: Option<RegionConfig>,
    #[serde(default)]
    layer: u32,
    #[serde(default = "default_scale_down")]
    scale_down: usize,
    #[serde(default = "default_tau_hill_climb")]
    tau_hill_climb: f64,
    #[serde(default = "default_tau_detect")]
    tau_detect: f64,
    #[serde(default = "default_max_step")]
    max_step: usize,
    #[serde(default = "default_policy")]
    policy: PolicyConfig,
    grid_offsets: Option<Vec<usize>>,
    templates: Vec<TemplateConfig>,
}

#[derive(Debug, Serialize)]
struct GateJson {
    id: u64,
    template: u64,
    orientation: &'static str,
    bounds: [usize; 4],
    score: f64,
}

#[derive(Debug, Serialize)]
struct ReportJson {
    outcome: &'static str,
    objects_found: u64,
    objects_added: u64,
    evaluations: u64,
    elapsed_ms: u128,
    gates: Vec<GateJson>,
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.print_example {
        println!("{EXAMPLE_JSON}");
        return Ok(());
    }

    if cli.trace {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
            .init();
    }

    let contents = fs::read_to_string(&cli.config)
        .map_err(|err| format!("failed to read {}: {err}", cli.config.display()))?;
    let config: RunConfig = serde_json::from_str(&contents)
        .map_err(|err| format!("failed to parse {}: {err}", cli.config.display()))?;

    let master = load_gray_raster(&config.master)?;
    let view = master.view();

    let search = config
        .search
        .as_ref()
        .map(Region::from)
        .unwrap_or_else(|| Region::new(0, 0, view.width(), view.height()));

    let mut params = SessionParameters::new(search, LayerId(config.layer));
    params.scale_down = config.scale_down;
    params.tau_hill_climb = config.tau_hill_climb;
    params.tau_detect = config.tau_detect;
    params.max_step = config.max_step;
    params.policy = ScanPolicy::from(&config.policy);
    params.grid = config.grid_offsets.map(IrregularGrid::new);

    let templates: Vec<TemplateEntry> = config
        .templates
        .iter()
        .map(|tpl| {
            let entry = TemplateEntry::new(TemplateId(tpl.id), Region::from(&tpl.bounds));
            match &tpl.orientations {
                Some(orientations) => {
                    entry.with_orientations(orientations.iter().map(Orientation::from).collect())
                }
                None => entry,
            }
        })
        .collect();

    let layer = params.layer;
    let session = MatchingSession::new(params, templates);
    let model = MemoryModel::new();
    let report = session.run(view, &model)?;

    let gates = model
        .gates(layer)
        .into_iter()
        .map(|(id, gate)| GateJson {
            id: id.0,
            template: gate.template.0,
            orientation: gate.orientation.as_str(),
            bounds: [
                gate.bounds.min_x,
                gate.bounds.min_y,
                gate.bounds.max_x,
                gate.bounds.max_y,
            ],
            score: gate.score,
        })
        .collect();

    let out = ReportJson {
        outcome: match report.outcome {
            SessionOutcome::Finished => "finished",
            SessionOutcome::Cancelled => "cancelled",
        },
        objects_found: report.stats.objects_found,
        objects_added: report.stats.objects_added,
        evaluations: report.stats.evaluations,
        elapsed_ms: report.stats.elapsed.as_millis(),
        gates,
    };
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
