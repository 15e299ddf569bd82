//! `pidvisor` binary: parse flags, install logging, supervise, map the outcome to
//! an exit status.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use pidvisor::{LogWriter, Subscribe, Supervisor, cli::Cli, exit, logging};

const BUILD_DATE: &str = match option_env!("PIDVISOR_BUILD_DATE") {
    Some(date) => date,
    None => "unknown",
};

fn main() -> ExitCode {
    let parsed = Cli::try_parse();

    // The banner precedes the usage check, so the tag comes from the environment
    // when the flags did not parse.
    let tag = match &parsed {
        Ok(cli) => cli.log_tag.clone(),
        Err(_) => std::env::var("PIDVISOR_LOG_TAG")
            .unwrap_or_else(|_| logging::DEFAULT_TAG.to_string()),
    };
    if let Err(e) = logging::init(&tag) {
        eprintln!("{tag}: failed to install logger: {e}");
    }
    tracing::info!("pidvisor {} (built {BUILD_DATE})", env!("CARGO_PKG_VERSION"));

    let cli = match parsed {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(exit::USAGE)
            } else {
                ExitCode::from(exit::CLEAN)
            };
        }
    };
    tracing::info!("supervising {} services", cli.commands.len());

    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("failed to start runtime: {e}");
            return ExitCode::from(exit::ALLOCATION);
        }
    };

    let code = rt.block_on(async move {
        let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
        let sup = match Supervisor::builder(cli.to_config())
            .with_subscribers(subs)
            .build(cli.commands)
        {
            Ok(sup) => sup,
            Err(e) => {
                tracing::error!("{e} [{}]", e.as_label());
                return e.exit_code();
            }
        };

        match sup.run().await {
            Ok(()) => exit::CLEAN,
            Err(e) => {
                tracing::debug!("supervision ended: {e} [{}]", e.as_label());
                e.exit_code()
            }
        }
    });

    ExitCode::from(code)
}
