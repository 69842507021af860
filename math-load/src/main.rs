use std::process::ExitCode;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use math_load::report::Banner;
use math_load::{
    summarize, CliArgs, Dispatcher, HttpClient, LoadTestConfig, RequestExecutor, RunError,
};
use tracing::warn;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if matches!(e.downcast_ref::<RunError>(), Some(RunError::Interrupted)) => {
            println!("\nTest interrupted by user");
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: CliArgs) -> anyhow::Result<()> {
    let config = args.into_config()?;
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build runtime")?;
    rt.block_on(run_load_test(config))
}

async fn run_load_test(config: LoadTestConfig) -> anyhow::Result<()> {
    print!("{}", Banner(&config));
    let executor = RequestExecutor::new(HttpClient::new(), &config.base_url);
    let dispatcher = Dispatcher::new(executor, config.formulas.clone()).verbose(config.verbose);

    let start = Instant::now();
    let result = dispatcher
        .run_until(config.iterations, config.mode, shutdown_signal())
        .await?;
    let stats = summarize(&result, start.elapsed().as_secs_f64());
    print!("{stats}");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for ctrl-c, interrupts will not stop the run gracefully");
        std::future::pending::<()>().await;
    }
}
