use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::journal::Journal;
use crate::sink::ChannelSink;
use std::error::Error;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod account;
mod agents;
mod config;
mod engine;
mod errors;
mod journal;
mod sink;
mod transactions;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shared_account=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = EngineConfig::from_env()?;
    if let Some(audit_log) = std::env::args().nth(1) {
        config.audit_log = audit_log.into();
    }
    let audit = File::create(&config.audit_log)?;
    info!(audit_log = %config.audit_log.display(), "flagged transactions will be logged");

    let trace: Box<dyn Write + Send> = match &config.trace_log {
        Some(path) => {
            info!(trace_log = %path.display(), "transaction trace redirected");
            Box::new(BufWriter::new(File::create(path)?))
        }
        None => Box::new(std::io::stdout()),
    };

    let (sink, receiver) = ChannelSink::new();
    let journal = Journal::new(trace, audit);
    let writer = tokio::task::spawn_blocking(move || journal.drain(receiver));

    let summary = Engine::new(config, Arc::new(sink))?.run().await?;
    // the engine and every agent are gone, so the journal sees the stream end
    let written = writer.await??;
    info!(written, balanced = summary.is_balanced(), "simulation finished");
    println!("\n{}", summary);
    Ok(())
}
