use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use stream_client::args::{get_log_level_filter, parse_args, player_config};
use stream_client::sink::FileSink;
use stream_player::{PlayerCallback, PlayerEvent, StreamPlayer};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, Layer};

fn log_event(event: PlayerEvent) {
    match event {
        PlayerEvent::QualitySwitch { track, old_bandwidth, new_bandwidth } => {
            info!("{} quality switch: {} -> {} bps", track, old_bandwidth, new_bandwidth);
        }
        PlayerEvent::TrackExhausted { track } => {
            info!("{} track fully buffered", track);
        }
        PlayerEvent::EndOfStream => {
            info!("End of stream");
        }
        PlayerEvent::KeySystemSelected { flavor, key_system, license_url, init_data } => {
            warn!(
                "Protected stream: {} ({}) via {}, {} bytes of init data. No license is requested, media stays encrypted",
                key_system,
                flavor,
                license_url,
                init_data.map(|d| d.len()).unwrap_or(0)
            );
        }
        PlayerEvent::Warning(msg) => {
            warn!("{}", msg);
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = parse_args();

    // Build the FmtSubscriber layer
    let fmt_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .with_filter(get_log_level_filter(&args));
    let subscriber = tracing_subscriber::registry().with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting stream client (headless)");
    info!("{:?}", args);

    let config = player_config(&args)?;
    let sink = FileSink::create(&args.output_dir)?;
    let callback: PlayerCallback = Arc::new(log_event);
    let mut player = StreamPlayer::new(config.clone(), Box::new(sink), callback).await?;
    let handle = player.handle();
    if !config.autoplay {
        handle.play();
    }
    info!("Player initialized");

    let cancel = CancellationToken::new();

    let stopper = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted");
            stopper.cancel();
        }
    });

    if let Some(limit) = args.max_duration {
        let handle = handle.clone();
        let stopper = cancel.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(250));
            while !stopper.is_cancelled() {
                ticker.tick().await;
                if handle.position() >= limit {
                    info!("Reached {:.3}s of playback", limit);
                    stopper.cancel();
                }
            }
        });
    }

    player.run(cancel.clone()).await?;
    cancel.cancel();
    info!("Stopped at {:.3}s", player.position());
    Ok(())
}
