use std::io::{self, Write};

use fmv_adapters::sheets::GvizHttpSource;
use fmv_core::config::ViewerConfig;
use fmv_core::data_engine::{CompletionOutcome, DataEngine};
use fmv_core::fetch_runner::FetchRunner;
use fmv_core::fields::Field;
use fmv_core::row::Row;
use fmv_core::view_state::SortDirection;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseOutcome {
    Config,
    HelpRequested,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct DumpConfig {
    page: usize,
    page_size: Option<usize>,
    filters: Vec<(Field, String)>,
    sort: Option<(Field, SortDirection)>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = parse_args()?;
    init_logging();

    let mut config = ViewerConfig::load_default()?;
    if let Some(page_size) = args.page_size {
        config.page_size = page_size;
        config.validate()?;
    }

    let runner = FetchRunner::new(GvizHttpSource::from_config(&config)?);
    let mut engine = DataEngine::new(config.engine_settings())?;
    for (field, pattern) in &args.filters {
        let _ = engine.set_filter(*field, pattern.as_str());
    }
    if let Some((field, direction)) = args.sort {
        let _ = engine.set_sort(field, direction);
    }
    let request = engine
        .set_page(args.page)
        .unwrap_or_else(|| engine.mount());

    info!(
        dataset = %config.dataset_id,
        offset = request.descriptor.offset,
        limit = request.descriptor.limit,
        "dumping page"
    );
    let completion = runner.execute(request).await;
    if let CompletionOutcome::Failed = engine.complete(completion) {
        let detail = engine
            .failure()
            .map_or_else(String::new, ToString::to_string);
        return Err(io_other(format!(
            "{} ({detail})",
            engine.error().unwrap_or_default()
        ))
        .into());
    }

    let rows = engine.rows();
    let mut stdout = io::stdout().lock();
    stdout.write_all(render_tsv(&rows).as_bytes())?;
    stdout.flush()?;
    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn render_tsv(rows: &[&Row]) -> String {
    let mut output = Field::ALL
        .iter()
        .map(|field| field.label())
        .collect::<Vec<_>>()
        .join("\t");
    output.push('\n');

    for row in rows {
        let line = row
            .fields()
            .map(|(_, value)| tsv_cell(value))
            .collect::<Vec<_>>()
            .join("\t");
        output.push_str(&line);
        output.push('\n');
    }
    output
}

fn tsv_cell(value: &str) -> String {
    value.replace(['\t', '\n', '\r'], " ")
}

fn parse_args() -> io::Result<DumpConfig> {
    let mut config = DumpConfig::default();
    let outcome = parse_args_from(std::env::args().skip(1), &mut config)?;
    if outcome == ParseOutcome::HelpRequested {
        print_help();
        std::process::exit(0);
    }
    Ok(config)
}

fn parse_args_from(
    args: impl IntoIterator<Item = String>,
    config: &mut DumpConfig,
) -> io::Result<ParseOutcome> {
    let mut args = args.into_iter();

    while let Some(flag) = args.next() {
        match flag.as_str() {
            "-h" | "--help" => return Ok(ParseOutcome::HelpRequested),
            "--page" => {
                config.page = next_value(&mut args, "--page")?
                    .parse::<usize>()
                    .map_err(|error| io_other(format!("invalid --page value: {error}")))?;
            }
            "--page-size" => {
                let size = next_value(&mut args, "--page-size")?
                    .parse::<usize>()
                    .map_err(|error| io_other(format!("invalid --page-size value: {error}")))?;
                if size == 0 {
                    return Err(io_other("--page-size must be greater than 0"));
                }
                config.page_size = Some(size);
            }
            "--filter" => {
                let raw = next_value(&mut args, "--filter")?;
                let (field, pattern) = raw.split_once('=').ok_or_else(|| {
                    io_other(format!("invalid --filter value `{raw}`: expected field=pattern"))
                })?;
                config
                    .filters
                    .push((parse_field(field)?, pattern.to_string()));
            }
            "--sort" => {
                let raw = next_value(&mut args, "--sort")?;
                config.sort = Some(parse_sort(&raw)?);
            }
            _ => {
                return Err(io_other(format!("unknown argument `{flag}`")));
            }
        }
    }

    Ok(ParseOutcome::Config)
}

fn parse_field(raw: &str) -> io::Result<Field> {
    raw.trim().parse::<Field>().map_err(io_other)
}

fn parse_sort(raw: &str) -> io::Result<(Field, SortDirection)> {
    let (field, direction) = match raw.split_once(':') {
        Some((field, "asc")) => (field, SortDirection::Ascending),
        Some((field, "desc")) => (field, SortDirection::Descending),
        Some((_, other)) => {
            return Err(io_other(format!(
                "invalid sort direction `{other}`: expected asc or desc"
            )))
        }
        None => (raw, SortDirection::Ascending),
    };
    Ok((parse_field(field)?, direction))
}

fn next_value(args: &mut impl Iterator<Item = String>, flag: &str) -> io::Result<String> {
    args.next()
        .ok_or_else(|| io_other(format!("missing value for `{flag}`")))
}

fn print_help() {
    println!(
        "fmv page dump\n\n\
Usage:\n  cargo run -p fmv-app --bin fmv-dump -- [OPTIONS]\n\n\
Options:\n  --page <index>              Zero-based page to fetch (default: 0)\n  --page-size <rows>          Rows per page (default: from viewer.toml)\n  --filter <field=pattern>    Case-insensitive substring filter, repeatable\n  --sort <field[:asc|desc]>   Sort the fetched page by one field\n\n\
Environment:\n  FMV_DATASET_ID overrides the configured sheet.\n  RUST_LOG controls diagnostics written to stderr.\n"
    );
}

fn io_other(error: impl std::fmt::Display) -> io::Error {
    io::Error::other(error.to_string())
}
