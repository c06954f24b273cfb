use clap::Parser;

use log::{error, info};
use std::process::ExitCode;

use sensor2kitti::{run, Args, ConverterSet, LogNotifier};

fn main() -> ExitCode {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    info!("Starting the conversion process...");

    match run(&args, &ConverterSet::builtin(), &LogNotifier) {
        Ok(report) => {
            info!(
                "Converted {} sample(s): {} train, {} val, {} without objects",
                report.sample_count, report.splits.train, report.splits.val, report.empty_samples
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Conversion failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
