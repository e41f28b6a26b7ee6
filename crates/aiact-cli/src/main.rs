use std::fs;
use std::path::{Path, PathBuf};

use aiact_api::{AssessRequest, AssessmentApi, ClassifyRequest};
use aiact_core::{DataType, RuleCatalog, RuleCategory, Sector, Stage};
use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

const CLI_CONTRACT_VERSION: &str = "cli.v1";
const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Debug, Parser)]
#[command(name = "aiact")]
#[command(about = "EU AI Act compliance self-assessment CLI")]
struct Cli {
    /// Start with an empty store instead of the two demonstration records.
    #[arg(long, global = true, default_value_t = false)]
    no_seed: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Rules {
        #[command(subcommand)]
        command: Box<RulesCommand>,
    },
    Classify(ClassifyArgs),
    Recommend(RecommendArgs),
    Assess(AssessArgs),
    Batch(BatchArgs),
    Records {
        #[command(subcommand)]
        command: Box<RecordsCommand>,
    },
}

#[derive(Debug, Subcommand)]
enum RulesCommand {
    List(RulesListArgs),
    Show(RuleShowArgs),
}

#[derive(Debug, Args)]
struct RulesListArgs {
    #[arg(long, value_enum)]
    category: Option<CategoryArg>,
}

#[derive(Debug, Args)]
struct RuleShowArgs {
    #[arg(long)]
    id: String,
}

#[derive(Debug, Args)]
struct ClassifyArgs {
    #[arg(long)]
    use_case: String,
    #[arg(long)]
    context: String,
    #[arg(long = "data-type", value_enum)]
    data_types: Vec<DataTypeArg>,
}

#[derive(Debug, Args)]
struct RecommendArgs {
    /// Tier label: unacceptable, high, limited or minimal.
    #[arg(long)]
    tier: String,
}

#[derive(Debug, Args)]
struct AssessArgs {
    #[arg(long = "name")]
    system_name: String,
    #[arg(long)]
    use_case: String,
    #[arg(long)]
    context: String,
    #[arg(long, value_enum)]
    sector: SectorArg,
    #[arg(long, value_enum)]
    stage: Option<StageArg>,
    #[arg(long = "data-type", value_enum)]
    data_types: Vec<DataTypeArg>,
    /// Also write the single-record JSON document here.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct BatchArgs {
    /// JSON array of assessment requests.
    #[arg(long = "in")]
    input: PathBuf,
    #[arg(long)]
    csv_out: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum RecordsCommand {
    List(RecordsListArgs),
    Summary,
    Show(RecordShowArgs),
    Export(RecordsExportArgs),
}

#[derive(Debug, Args)]
struct RecordsListArgs {
    /// Newest-first view limited to this many records.
    #[arg(long)]
    recent: Option<usize>,
}

#[derive(Debug, Args)]
struct RecordShowArgs {
    #[arg(long)]
    id: u64,
}

#[derive(Debug, Args)]
struct RecordsExportArgs {
    #[arg(long, value_enum)]
    format: ExportFormatArg,
    /// JSON format only: export this single record instead of all of them.
    #[arg(long)]
    id: Option<u64>,
    #[arg(long)]
    out: PathBuf,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CategoryArg {
    Prohibited,
    HighRisk,
    LimitedRisk,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DataTypeArg {
    PersonalData,
    BiometricData,
    SensitiveData,
    FinancialData,
    BehavioralData,
    TextData,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SectorArg {
    Employment,
    Healthcare,
    Education,
    FinancialServices,
    LawEnforcement,
    CustomerService,
    Other,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StageArg {
    Planning,
    Development,
    Testing,
    Production,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ExportFormatArg {
    Csv,
    Json,
}

impl From<CategoryArg> for RuleCategory {
    fn from(value: CategoryArg) -> Self {
        match value {
            CategoryArg::Prohibited => Self::Prohibited,
            CategoryArg::HighRisk => Self::HighRisk,
            CategoryArg::LimitedRisk => Self::LimitedRisk,
        }
    }
}

impl From<DataTypeArg> for DataType {
    fn from(value: DataTypeArg) -> Self {
        match value {
            DataTypeArg::PersonalData => Self::PersonalData,
            DataTypeArg::BiometricData => Self::BiometricData,
            DataTypeArg::SensitiveData => Self::SensitiveData,
            DataTypeArg::FinancialData => Self::FinancialData,
            DataTypeArg::BehavioralData => Self::BehavioralData,
            DataTypeArg::TextData => Self::TextData,
        }
    }
}

impl From<SectorArg> for Sector {
    fn from(value: SectorArg) -> Self {
        match value {
            SectorArg::Employment => Self::Employment,
            SectorArg::Healthcare => Self::Healthcare,
            SectorArg::Education => Self::Education,
            SectorArg::FinancialServices => Self::FinancialServices,
            SectorArg::LawEnforcement => Self::LawEnforcement,
            SectorArg::CustomerService => Self::CustomerService,
            SectorArg::Other => Self::Other,
        }
    }
}

impl From<StageArg> for Stage {
    fn from(value: StageArg) -> Self {
        match value {
            StageArg::Planning => Self::Planning,
            StageArg::Development => Self::Development,
            StageArg::Testing => Self::Testing,
            StageArg::Production => Self::Production,
        }
    }
}

fn with_contract_version(value: Value) -> Value {
    match value {
        Value::Object(mut object) => {
            object.insert(
                "contract_version".to_string(),
                Value::String(CLI_CONTRACT_VERSION.to_string()),
            );
            Value::Object(object)
        }
        other => serde_json::json!({
            "contract_version": CLI_CONTRACT_VERSION,
            "payload": other
        }),
    }
}

fn emit_json(value: Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&with_contract_version(value))?);
    Ok(())
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    // stdout carries the JSON contract, so logs go to stderr.
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let mut api = if cli.no_seed { AssessmentApi::empty() } else { AssessmentApi::new() };

    match cli.command {
        Command::Rules { command } => run_rules(*command, &api),
        Command::Classify(args) => run_classify(args, &api),
        Command::Recommend(args) => run_recommend(&args, &api),
        Command::Assess(args) => run_assess(args, &mut api),
        Command::Batch(args) => run_batch(&args, &mut api),
        Command::Records { command } => run_records(*command, &api),
    }
}

fn run_rules(command: RulesCommand, api: &AssessmentApi) -> Result<()> {
    match command {
        RulesCommand::List(args) => {
            let listing = api.rules(args.category.map(RuleCategory::from));
            emit_json(serde_json::to_value(listing)?)
        }
        RulesCommand::Show(args) => {
            let catalog: &RuleCatalog = api.catalog();
            let rule = catalog.find(&args.id).ok_or_else(|| anyhow!("rule not found: {}", args.id))?;
            emit_json(serde_json::json!({
                "ruleset_version": catalog.version(),
                "rule": rule
            }))
        }
    }
}

fn run_classify(args: ClassifyArgs, api: &AssessmentApi) -> Result<()> {
    let result = api.classify(&ClassifyRequest {
        use_case: args.use_case,
        context: args.context,
        data_types: args.data_types.into_iter().map(DataType::from).collect(),
    });
    emit_json(serde_json::to_value(result)?)
}

fn run_recommend(args: &RecommendArgs, api: &AssessmentApi) -> Result<()> {
    let list = api.recommend(&args.tier)?;
    emit_json(serde_json::to_value(list)?)
}

fn run_assess(args: AssessArgs, api: &mut AssessmentApi) -> Result<()> {
    let request = AssessRequest {
        system_name: args.system_name,
        use_case: args.use_case,
        context: args.context,
        sector: args.sector.into(),
        stage: args.stage.map(Stage::from),
        data_types: args.data_types.into_iter().map(DataType::from).collect(),
    };
    let record = api.assess(request)?;

    if let Some(out) = &args.out {
        write_file(out, &api.export_record(record.id)?)?;
    }
    emit_json(serde_json::to_value(record)?)
}

fn run_batch(args: &BatchArgs, api: &mut AssessmentApi) -> Result<()> {
    let body = fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read batch input {}", args.input.display()))?;
    let requests: Vec<AssessRequest> = serde_json::from_str(&body)
        .with_context(|| format!("failed to parse batch input {}", args.input.display()))?;

    let result = api.batch(requests);
    if let Some(csv_out) = &args.csv_out {
        write_file(csv_out, &api.export_csv()?)?;
    }

    emit_json(serde_json::json!({
        "accepted": result.accepted,
        "rejected": result.rejected,
        "summary": api.summary(),
        "csv_out": args.csv_out.as_ref().map(|path| path.display().to_string())
    }))
}

fn run_records(command: RecordsCommand, api: &AssessmentApi) -> Result<()> {
    match command {
        RecordsCommand::List(args) => {
            let records = match args.recent {
                Some(limit) => api.recent(limit),
                None => api.records().iter().collect(),
            };
            emit_json(serde_json::json!({
                "total": api.records().len(),
                "records": records
            }))
        }
        RecordsCommand::Summary => emit_json(serde_json::to_value(api.summary())?),
        RecordsCommand::Show(args) => {
            let record =
                api.record(args.id).ok_or_else(|| anyhow!("assessment not found: {}", args.id))?;
            emit_json(serde_json::to_value(record)?)
        }
        RecordsCommand::Export(args) => run_records_export(&args, api),
    }
}

fn run_records_export(args: &RecordsExportArgs, api: &AssessmentApi) -> Result<()> {
    let (body, exported) = match (args.format, args.id) {
        (ExportFormatArg::Csv, Some(_)) => {
            return Err(anyhow!("--id is only supported with --format json"));
        }
        (ExportFormatArg::Csv, None) => (api.export_csv()?, api.records().len()),
        (ExportFormatArg::Json, Some(id)) => (api.export_record(id)?, 1),
        (ExportFormatArg::Json, None) => (api.export_json()?, api.records().len()),
    };
    write_file(&args.out, &body)?;

    emit_json(serde_json::json!({
        "format": match args.format {
            ExportFormatArg::Csv => "csv",
            ExportFormatArg::Json => "json",
        },
        "out": args.out.display().to_string(),
        "exported_records": exported
    }))
}

fn write_file(path: &Path, body: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    fs::write(path, body).with_context(|| format!("failed to write {}", path.display()))
}
