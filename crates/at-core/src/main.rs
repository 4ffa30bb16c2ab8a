use at_common::Error;
use at_config::resolve_config;
use at_core::cli::Cli;
use at_core::logging::init_logging;
use at_core::report::render_digest;
use at_core::{
    install_interrupt_handler, CancelToken, ExitCode, NightscoutClient, Pipeline, Toolbox,
};
use chrono::Local;
use clap::Parser;
use tracing::{error, info, warn};

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    let code = run(&cli);
    std::process::ExitCode::from(code.as_i32() as u8)
}

fn run(cli: &Cli) -> ExitCode {
    let today = Local::now().date_naive();
    let config = match resolve_config(&cli.to_overrides(), today) {
        Ok(config) => config,
        Err(e) => {
            let err: Error = e.into();
            eprintln!("autotune-dow: {err}");
            return ExitCode::for_error(&err);
        }
    };

    let tee_dir = config.terminal_log.then(|| config.autotune_dir());
    let log_file = match init_logging(cli.log_format, tee_dir.as_deref()) {
        Ok(path) => path,
        Err(e) => {
            eprintln!("autotune-dow: {e}");
            return ExitCode::for_error(&e);
        }
    };
    if let Some(path) = &log_file {
        info!(path = %path.display(), "logging to file");
    }
    if let Err(e) = install_interrupt_handler() {
        warn!(error = %e, "could not install interrupt handler");
    }

    let tools = Toolbox::from_config(&config);
    let source = NightscoutClient::new(&config.ns_host, &config.fetch);
    let cancel = CancelToken::new();

    match Pipeline::new(&config, &tools, &source, &cancel).run() {
        Ok(report) => {
            if let Some(digest) = &report.digest {
                let mut out = std::io::stdout().lock();
                if let Err(e) = render_digest(digest, &mut out) {
                    warn!(error = %e, "could not print recommendations");
                }
            }
            for outcome in report.weekdays.iter().filter(|w| !w.is_finalized()) {
                if let Some(e) = &outcome.error {
                    error!(
                        weekday = %outcome.weekday,
                        code = e.code(),
                        error = %e,
                        "weekday not tuned"
                    );
                }
            }
            if let Some(path) = &report.summary_path {
                info!(path = %path.display(), "summary written");
            }
            report.exit_code()
        }
        Err(e) => {
            error!(code = e.code(), error = %e, "autotune failed");
            ExitCode::for_error(&e)
        }
    }
}
