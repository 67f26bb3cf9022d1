mod clock;
mod config;
mod driver;
mod emotion;
mod gate;
mod gesture;
mod mapper;
mod perception;
mod replay;
mod robot;
mod stats;
mod transport_udp;

use clap::Parser;
use clock::TokioClock;
use config::Config;
use driver::ControlLoop;
use gesture::{ GestureKind, GestureSequencer };
use perception::PerceptionSource;
use replay::ReplaySource;
use robot::{ Actuator, DryRunRobot, SpeechOutput };
use stats::{ SessionSummary, Stats };
use std::sync::Arc;
use std::time::Duration;
use tracing::{ error, info };
use transport_udp::{ UdpPerceptionSource, UdpRobotLink };

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber
        ::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter
                ::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_ansi(atty::is(atty::Stream::Stderr))
        .init();

    let config = Config::parse();

    info!(
        mode = ?config.mode,
        listen = config.perception_addr(),
        replay = ?config.replay,
        robot = config.robot_addr.as_deref().unwrap_or("dry-run"),
        emotions = !config.no_emotions,
        speech = ?config.speech,
        "🚀 reachy-behavior starting"
    );

    if let Some(kind) = config.perform {
        return match &config.robot_addr {
            Some(addr) => perform(kind, UdpRobotLink::connect(addr).await?, &config).await,
            None => perform(kind, DryRunRobot, &config).await,
        };
    }

    let stats = Stats::new();

    // Spawn stats reporter
    let stats_clone = stats.clone();
    let stats_interval = config.stats_interval_secs;
    tokio::spawn(async move {
        stats::stats_reporter(stats_clone, stats_interval).await;
    });

    let summary = match &config.replay {
        Some(path) => {
            let source = ReplaySource::open(path, Duration::from_millis(config.replay_interval_ms)).await?;
            drive(&config, source, stats).await?
        }
        None => {
            let source = UdpPerceptionSource::bind(
                &config.perception_addr(),
                config.recv_buf_size,
                config.sample_timeout(),
                config.detector_settings()
            ).await?;
            drive(&config, source, stats).await?
        }
    };

    summary.log();
    Ok(())
}

/// Pick the robot side and run the control loop on `source`.
async fn drive<S: PerceptionSource>(
    config: &Config,
    source: S,
    stats: Arc<Stats>
) -> anyhow::Result<SessionSummary> {
    let summary = match &config.robot_addr {
        Some(addr) => {
            let link = UdpRobotLink::connect(addr).await?;
            run_loop(config, source, link.clone(), link, stats).await
        }
        None => run_loop(config, source, DryRunRobot, DryRunRobot, stats).await,
    };
    Ok(summary)
}

async fn run_loop<S, A, P>(
    config: &Config,
    source: S,
    actuator: A,
    speech: P,
    stats: Arc<Stats>
) -> SessionSummary
    where S: PerceptionSource, A: Actuator, P: SpeechOutput
{
    let mut ctl = ControlLoop::new(
        config.behavior(),
        source,
        actuator,
        speech,
        TokioClock,
        stats
    ).with_min_face_size(config.min_face_size);

    info!("✅ All systems go, press Ctrl-C to stop");
    let summary = ctl.run(shutdown_signal()).await;
    if ctl.emotions().in_progress() {
        info!("stopped mid-gesture");
    }
    summary
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

/// One-shot: play a single gesture, recentre, exit. Ctrl-C cuts the gesture
/// short but still recentres.
async fn perform<A: Actuator>(kind: GestureKind, mut actuator: A, config: &Config) -> anyhow::Result<()> {
    info!(gesture = %kind, "🎭 performing");
    let outcome = GestureSequencer::new().perform(
        kind.spec(),
        &mut actuator,
        config.behavior().neutral_duration,
        shutdown_signal()
    ).await?;

    match outcome {
        Some(o) if o.aborted => {
            anyhow::bail!("gesture {kind} aborted after {} keyframes", o.keyframes_played);
        }
        Some(_) => info!(gesture = %kind, "done"),
        None => info!(gesture = %kind, "interrupted"),
    }
    Ok(())
}
