use clap::Parser;
use log::debug;
use scriptwise::cli::format;
use scriptwise::cli::toml_config::TomlConfig;
use scriptwise::cli::{Cli, OutputFormat};
use scriptwise::scan;
use std::process;
use std::time::Duration;

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    if cli.list_rules {
        format::print_rule_list();
        return;
    }

    let mut config = match TomlConfig::discover(cli.config.as_deref())
        .and_then(TomlConfig::into_check_config)
    {
        Ok(c) => c,
        Err(e) => {
            eprintln!("\x1b[31merror\x1b[0m: {}", e);
            process::exit(2);
        }
    };
    if let Some(jobs) = cli.jobs {
        config.jobs = jobs;
    }
    if let Some(ms) = cli.timeout_ms {
        config.timeout = Some(Duration::from_millis(ms));
    }
    config.only = cli.rule;
    debug!("effective config: {:?}", config);

    let result = match scan::run_scan(config, &cli.paths, cli.fix) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("\x1b[31merror\x1b[0m: {}", e);
            process::exit(2);
        }
    };

    match cli.format {
        OutputFormat::Text => format::print_text(&result),
        OutputFormat::Json => format::print_json(&result),
    }

    process::exit(result.exit_code());
}
