use clap::Parser;
use iac_audit::engine::{CancelToken, DefaultVulnerabilityBuilder, Inspector};
use iac_audit::error::Result;
use iac_audit::parser::{JsonParser, ParserBuilder, YamlParser};
use iac_audit::query::FilesystemSource;
use iac_audit::report::{print_summary, write_json_file, Counters, Payload, Summary};
use iac_audit::service::ScanService;
use iac_audit::source::FileSystemSourceProvider;
use iac_audit::tracker::Tracker;
use iac_audit::Cli;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const SCAN_ID: &str = "console";

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(exit) => exit,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(2)
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode> {
    let tracker = Arc::new(Tracker::new());

    let query_source = FilesystemSource::new(&cli.queries_path);
    let inspector = Inspector::new(
        &query_source,
        Arc::new(DefaultVulnerabilityBuilder),
        Arc::clone(&tracker),
    )?;

    // The payload file must not end up scanning itself on a second run.
    let exclude = cli.payload_path.iter().cloned().collect();
    let provider = FileSystemSourceProvider::new(&cli.path, exclude)?;

    let parser = ParserBuilder::new()
        .add(Box::new(JsonParser::new()))
        .add(Box::new(YamlParser::new()))
        .build();

    let service = ScanService::new(provider, parser, inspector, Arc::clone(&tracker));
    let outcome = service.start_scan(SCAN_ID, &CancelToken::new())?;

    let summary = Summary::new(Counters::from_tracker(&tracker), &outcome.vulnerabilities);

    if let Some(payload_path) = &cli.payload_path {
        write_json_file(payload_path, &Payload::new(&outcome.documents))?;
    }
    if let Some(output_path) = &cli.output_path {
        write_json_file(output_path, &summary)?;
    }

    print_summary(&summary);

    if summary.has_findings_at(cli.fail_on) {
        Ok(ExitCode::from(1))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "iac_audit=debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}
