mod commands;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use partsheet_core::output::OutputFormat;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "partsheet",
    version,
    about = "Parts catalog, invoice and inventory tooling"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// PDF text extraction backend.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Backend {
    /// Built-in content stream reader (text and ruling lines)
    Lopdf,
    /// poppler's pdftotext -bbox (text only)
    Pdftotext,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a parts catalog PDF into one combined spreadsheet
    Convert {
        /// Path to the catalog PDF
        input_file: PathBuf,

        /// Output file (default: input name with the format's extension)
        #[arg(short, long, value_name = "FILE")]
        out: Option<PathBuf>,

        /// Output format: xlsx (default), csv or json
        #[arg(short, long, default_value = "xlsx", value_parser = parse_format)]
        format: OutputFormat,

        #[arg(short, long, value_enum, default_value = "lopdf")]
        backend: Backend,

        /// Extra header alias file merged over the built-in aliases
        #[arg(long = "headers", value_name = "FILE")]
        headers: Option<PathBuf>,

        /// Write an annotated SVG per page into this directory
        #[arg(long, value_name = "DIR")]
        debug_dir: Option<PathBuf>,
    },
    /// Show how each page of a catalog is classified and what tables it holds
    Inspect {
        /// Path to the catalog PDF
        input_file: PathBuf,

        #[arg(short, long, value_enum, default_value = "lopdf")]
        backend: Backend,

        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table")]
        output: String,
    },
    /// Turn a supplier invoice PDF into a fillable receiving order
    ReceivingOrder {
        /// Path to the invoice PDF
        input_file: PathBuf,

        /// Output PDF (default: <input>_receiving_order.pdf)
        #[arg(short, long, value_name = "FILE")]
        out: Option<PathBuf>,

        #[arg(short, long, value_enum, default_value = "lopdf")]
        backend: Backend,
    },
    /// Push prices from an exported price list to the Sortly inventory
    PriceSync {
        /// Price list workbook with "Stock #" and "Value" columns
        sheet: PathBuf,

        /// Sortly API token
        #[arg(long, env = "SORTLY_API_TOKEN", hide_env_values = true)]
        token: String,

        /// Stock map cache file
        #[arg(long, value_name = "FILE", default_value = partsheet_core::inventory::cache::CACHE_FILE_NAME)]
        cache: PathBuf,

        /// Seconds a cached stock map stays valid
        #[arg(long, default_value_t = partsheet_core::inventory::cache::CACHE_LIFETIME.as_secs())]
        cache_lifetime: u64,

        /// Title rows above the header row
        #[arg(long, default_value_t = partsheet_core::inventory::sheet::SKIP_ROWS)]
        skip_rows: u32,

        /// Inventory API base URL
        #[arg(long, default_value = partsheet_core::inventory::sortly::API_BASE)]
        api_base: String,

        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table")]
        output: String,
    },
    /// Inspect and validate header alias tables
    Headers {
        #[command(subcommand)]
        action: HeadersAction,
    },
}

#[derive(Subcommand)]
enum HeadersAction {
    /// List the header aliases and the canonical columns they map to
    List {
        /// Alias file merged over the built-in aliases
        #[arg(long = "headers", value_name = "FILE")]
        headers: Option<PathBuf>,
    },
    /// Validate a header alias file
    Validate {
        /// Path to JSON alias file
        file: PathBuf,
    },
}

/// Log filter used when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "partsheet=info,partsheet_core=info";

fn parse_format(s: &str) -> Result<OutputFormat, String> {
    OutputFormat::from_str_loose(s)
        .ok_or_else(|| format!("unknown output format '{s}' (expected xlsx, csv or json)"))
}

fn main() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Convert {
            input_file,
            out,
            format,
            backend,
            headers,
            debug_dir,
        } => commands::convert::run(input_file, out, format, backend, headers, debug_dir),
        Commands::Inspect {
            input_file,
            backend,
            output,
        } => commands::inspect::run(input_file, backend, &output),
        Commands::ReceivingOrder {
            input_file,
            out,
            backend,
        } => commands::receiving_order::run(input_file, out, backend),
        Commands::PriceSync {
            sheet,
            token,
            cache,
            cache_lifetime,
            skip_rows,
            api_base,
            output,
        } => commands::price_sync::run(
            &sheet,
            &token,
            commands::price_sync::Settings {
                cache,
                cache_lifetime,
                skip_rows,
                api_base,
            },
            &output,
        ),
        Commands::Headers { action } => match action {
            HeadersAction::List { headers } => commands::headers::list(headers.as_deref()),
            HeadersAction::Validate { file } => commands::headers::validate(&file),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_convert_defaults() {
        let cli = Cli::parse_from(["partsheet", "convert", "catalog.pdf", "-f", "CSV"]);
        match cli.command {
            Commands::Convert {
                out,
                format,
                backend,
                ..
            } => {
                assert_eq!(out, None);
                assert_eq!(format, OutputFormat::Csv);
                assert!(matches!(backend, Backend::Lopdf));
            }
            _ => panic!("expected convert"),
        }
    }

    #[test]
    fn test_default_log_filter_names_crate_targets() {
        // The binary's crate (and tracing target) is named after the bin target.
        assert_eq!(module_path!(), "partsheet::tests");
        assert!(DEFAULT_LOG_FILTER.split(',').any(|d| d == "partsheet=info"));
        assert!(EnvFilter::try_new(DEFAULT_LOG_FILTER).is_ok());
    }

    #[test]
    fn test_unknown_format_rejected() {
        assert!(Cli::try_parse_from(["partsheet", "convert", "catalog.pdf", "-f", "pdf"]).is_err());
    }

    #[test]
    fn test_price_sync_token_flag() {
        let cli = Cli::parse_from(["partsheet", "price-sync", "prices.xlsx", "--token", "abc"]);
        match cli.command {
            Commands::PriceSync {
                token,
                skip_rows,
                cache_lifetime,
                ..
            } => {
                assert_eq!(token, "abc");
                assert_eq!(skip_rows, 4);
                assert_eq!(cache_lifetime, 3600);
            }
            _ => panic!("expected price-sync"),
        }
    }
}
