use std::sync::atomic::Ordering;

use capture_engine::{Args, CaptureLoop, CaptureSession, ReportGenerator};
use clap::Parser;
use log::{info, warn};
use tokio::signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    env_logger::init();

    let config = match args.to_configuration() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let open_args = config.open_args();
    let mut session = CaptureSession::open(&open_args)?;
    session.apply_settings(&config.capture.settings)?;

    let capture = CaptureLoop::new(config.poll_interval())
        .with_max_events(config.capture.max_events)
        .with_duration(config.capture_duration());

    let running = capture.stop_handle();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            println!("\nReceived Ctrl+C, exiting...");
            running.store(false, Ordering::Relaxed);
        }
    });

    let generator = ReportGenerator::new(
        session.engine().name(),
        session.versions(),
        session.num_cpus(),
    );

    session.start()?;
    info!("capturing with the {} engine", session.engine().name());
    let summary = capture.run(&mut session).await;
    session.stop()?;
    let summary = summary?;

    let stats = session
        .stats()
        .map_err(|e| warn!("stats unavailable: {}", e))
        .ok();
    let hits = session
        .tracepoint_hits()
        .map_err(|e| warn!("tracepoint hits unavailable: {}", e))
        .ok();

    let report = generator.finalize(summary, stats, hits);
    ReportGenerator::print_summary(&report);
    if let Some(path) = &args.output {
        ReportGenerator::save_json(&report, path)?;
        info!("report written to {}", path.display());
    }

    session.close()?;
    Ok(())
}
