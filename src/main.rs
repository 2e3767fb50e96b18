//! kafka-ops - declarative management of Kafka topics, ACLs and consumer groups

use clap::builder::FalseyValueParser;
use clap::{ArgGroup, CommandFactory, Parser};
use clap_complete::{generate, Shell};
use kafka_ops::spec::Connection;
use kafka_ops::{
    dump_cluster, render, ApplyOptions, ConnectionArgs, ConnectionConfig, DumpFormat, KafkaAdmin,
    OpsError, Reconciler, Result, Spec, SpecFormat, SpecLoader, TemplateVars,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli_context;
mod cli_output;

use crate::cli_context::CliContext;
use crate::cli_output::ConsoleReporter;

/// Exit code for failed runs and fatal errors
const FAILURE_EXIT_CODE: u8 = 2;

/// kafka-ops
#[derive(Parser, Debug)]
#[command(name = "kafka-ops")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Manage Kafka topics, ACLs and consumer groups from a spec manifest")]
#[command(long_about = r#"Manage Kafka topics, ACLs and consumer groups from a spec manifest

kafka-ops compares the manifest with the cluster and creates, alters or
deletes what differs. Topics are handled first, then consumer groups, then ACLs.

QUICK START:
    # Apply a manifest
    kafka-ops --apply --spec kafka.yaml

    # Export the cluster as a manifest
    kafka-ops --dump > kafka.yaml

    # Render the manifest as a template first
    kafka-ops --apply --spec kafka.yaml --template --var env=prod

ENVIRONMENT VARIABLES:
    KAFKA_BROKER            Bootstrap brokers, comma-separated
    KAFKA_SPEC_FILE         Spec manifest path
    KAFKA_USERNAME          SASL username
    KAFKA_PASSWORD          SASL password
    KAFKA_OPS_LOG_LEVEL     Log level when RUST_LOG is not set
    NO_COLOR                Disable colored output"#)]
#[command(group(
    ArgGroup::new("action")
        .required(true)
        .args(["apply", "dump", "completions"])
))]
pub(crate) struct Cli {
    /// Apply the spec manifest to the cluster
    #[arg(long)]
    apply: bool,

    /// Export topics and ACLs from the cluster
    #[arg(long)]
    pub(crate) dump: bool,

    /// Print a shell completion script
    #[arg(long, value_enum, value_name = "SHELL")]
    completions: Option<Shell>,

    /// Spec manifest to apply, or the file to dump into
    #[arg(long, env = "KAFKA_SPEC_FILE")]
    pub(crate) spec: Option<PathBuf>,

    /// Parse the manifest as YAML
    #[arg(long, conflicts_with = "json")]
    yaml: bool,

    /// Parse the manifest as JSON; dump as JSON
    #[arg(long)]
    json: bool,

    /// Render the manifest as a template before parsing
    #[arg(long)]
    template: bool,

    /// Template variable, may be repeated
    #[arg(long = "var", value_name = "KEY=VALUE")]
    vars: Vec<String>,

    /// Render undefined template variables as empty strings
    #[arg(long)]
    missingok: bool,

    /// Print each item as JSON after its result
    #[arg(long, short = 'v')]
    verbose: bool,

    /// Stop at the first failed item
    #[arg(long)]
    stop_on_error: bool,

    /// Bootstrap brokers, comma-separated
    #[arg(long, env = "KAFKA_BROKER")]
    broker: Option<String>,

    /// Security protocol: plaintext, ssl, sasl_plaintext or sasl_ssl
    #[arg(long)]
    protocol: Option<String>,

    /// SASL mechanism: scram-sha-256 or scram-sha-512
    #[arg(long)]
    mechanism: Option<String>,

    /// SASL username
    #[arg(long, env = "KAFKA_USERNAME")]
    username: Option<String>,

    /// SASL password
    #[arg(long, env = "KAFKA_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Disable colored output
    #[arg(long, env = "NO_COLOR", value_parser = FalseyValueParser::new())]
    pub(crate) no_color: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "KAFKA_OPS_LOG_LEVEL", default_value = "warn")]
    log_level: String,
}

impl Cli {
    fn connection_args(&self) -> ConnectionArgs {
        ConnectionArgs {
            broker: self.broker.clone(),
            protocol: self.protocol.as_deref().map(str::to_lowercase),
            mechanism: self.mechanism.as_deref().map(str::to_lowercase),
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }

    fn spec_format(&self) -> SpecFormat {
        if self.yaml {
            SpecFormat::Yaml
        } else if self.json {
            SpecFormat::Json
        } else {
            SpecFormat::Auto
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let ctx = CliContext::new(&cli);

    match run(&cli, &ctx) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(FAILURE_EXIT_CODE),
        Err(e) => {
            debug!(error = ?e, "Run failed");
            ctx.error(&e.message());
            ExitCode::from(FAILURE_EXIT_CODE)
        }
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Returns false when the run finished with failed items
fn run(cli: &Cli, ctx: &CliContext) -> Result<bool> {
    if let Some(shell) = cli.completions {
        generate_completions(shell);
        return Ok(true);
    }
    if cli.dump {
        dump(cli, ctx)?;
        return Ok(true);
    }
    apply(cli)
}

fn apply(cli: &Cli) -> Result<bool> {
    let path = cli
        .spec
        .as_deref()
        .ok_or_else(|| OpsError::Config("--spec is required with --apply".to_string()))?;
    let spec = load_spec(cli, path)?;

    let config = ConnectionConfig::resolve(&spec.connection, &cli.connection_args())?;
    let mut admin = KafkaAdmin::connect(config)?;

    let mut reporter =
        ConsoleReporter::new(std::io::stdout(), admin.bootstrap_address(), cli.verbose);
    let options = ApplyOptions {
        stop_on_error: cli.stop_on_error,
    };
    let summary = Reconciler::new(&mut admin, options).run(&spec, &mut reporter)?;
    if let Some(e) = reporter.take_write_error() {
        return Err(e.into());
    }

    Ok(summary.is_success())
}

fn load_spec(cli: &Cli, path: &Path) -> Result<Spec> {
    let mut loader = SpecLoader::new().with_format(cli.spec_format());
    if cli.template {
        let vars = TemplateVars::new()
            .with_pairs(std::env::vars())
            .with_assignments(&cli.vars);
        debug!(variables = vars.len(), "Rendering spec as template");
        loader = loader.with_template(vars, cli.missingok);
    }

    loader
        .load_file(path)
        .map_err(|e| OpsError::Parse(format!("Can't parse spec manifest: {}", e.message())))
}

fn dump(cli: &Cli, ctx: &CliContext) -> Result<()> {
    let config = ConnectionConfig::resolve(&Connection::default(), &cli.connection_args())?;
    let mut admin = KafkaAdmin::connect(config)?;

    let spec = dump_cluster(&mut admin)?;
    let format = if cli.json {
        DumpFormat::Json
    } else {
        DumpFormat::Yaml
    };
    ctx.write_output(&render(&spec, format)?)
}

/// Generate shell completions script
fn generate_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut std::io::stdout());
}
