mod args;

use std::path::Path;
use std::process;
use std::time::Duration;

use photoload::{
    HttpTransport, LoaderConfig, Photo, PhotoContent, PhotoLoadingState, PhotoPager,
    PhotosDataSource,
};
use tokio::runtime::Handle;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::args::Args;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

fn setup_logging(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("photoload=info,photoload_demo=info"));

    // Log to stdout (if you run with `RUST_LOG=debug`).
    let console_layer = fmt::layer().with_target(true).with_writer(std::io::stdout);

    let Some(log_dir) = log_dir else {
        tracing_subscriber::registry()
            .with(console_layer)
            .with(env_filter)
            .init();
        return None;
    };

    use tracing_appender::{
        non_blocking,
        rolling::{RollingFileAppender, Rotation},
    };

    let file_appender = RollingFileAppender::new(
        Rotation::DAILY,
        log_dir,
        format!("photoload-{}.log", env!("CARGO_PKG_VERSION")),
    );
    let (non_blocking_writer, guard) = non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_writer(non_blocking_writer);

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .with(env_filter)
        .init();

    Some(guard)
}

fn load_config(args: &Args) -> photoload::Result<LoaderConfig> {
    let mut config = match &args.config {
        Some(path) => LoaderConfig::load(path)?,
        None => LoaderConfig::default(),
    };

    if let Some(prefetch) = args.prefetch {
        config.prefetch = prefetch;
    }
    if args.raw {
        config.decode_stills = false;
    }

    config.validate()?;
    Ok(config)
}

fn describe(content: &PhotoContent) -> String {
    match content {
        PhotoContent::Bytes(bytes) => format!("{} raw bytes", bytes.len()),
        PhotoContent::Image(image) => format!("{}x{} image", image.width(), image.height()),
    }
}

fn log_page(pager: &PhotoPager, index: usize) {
    let Some(status) = pager.status(index) else {
        return;
    };

    match status.state {
        PhotoLoadingState::Loading => info!("page {index}: {:.0}%", status.progress * 100.0),
        PhotoLoadingState::Loaded => {
            let content = pager.photo(index).and_then(Photo::cached_content);
            match content {
                Some(content) => info!("page {index}: loaded {}", describe(&content)),
                None => info!("page {index}: loaded"),
            }
        }
        PhotoLoadingState::LoadingFailed => {
            if let Some(err) = &status.error {
                warn!("page {index}: failed: {err}");
            }
        }
        PhotoLoadingState::NotLoaded | PhotoLoadingState::LoadingCancelled => {}
    }
}

fn page_settled(pager: &PhotoPager, index: usize) -> bool {
    pager.status(index).is_some_and(|status| {
        matches!(
            status.state,
            PhotoLoadingState::Loaded | PhotoLoadingState::LoadingFailed
        )
    })
}

/// Wait for the visible page to settle, logging every change along the way.
async fn settle(pager: &mut PhotoPager, index: usize, timeout: Duration) -> bool {
    let mut interval = tokio::time::interval(POLL_INTERVAL);
    let deadline = tokio::time::Instant::now() + timeout;

    loop {
        interval.tick().await;

        for changed in pager.process_events() {
            log_page(pager, changed);
        }

        if page_settled(pager, index) {
            return true;
        }

        if tokio::time::Instant::now() >= deadline {
            return false;
        }
    }
}

async fn run(args: Args) -> photoload::Result<()> {
    let config = load_config(&args)?;

    let photos: Vec<Photo> = args
        .urls
        .iter()
        .cloned()
        .enumerate()
        .map(|(i, url)| Photo::from_url(url).with_title(format!("photo {i}")))
        .collect();

    if photos.is_empty() {
        warn!("no photo URLs given, nothing to do");
        return Ok(());
    }

    let start = args.start;
    let data_source = PhotosDataSource::new(photos, start, config.prefetch)?;
    let transport = HttpTransport::new(&config);
    let mut pager = PhotoPager::new(data_source, transport, &config, Handle::current())?;

    info!(
        "paging {} photos from {start}, prefetch {:?}",
        pager.data_source().len(),
        config.prefetch
    );

    for index in start..pager.data_source().len() {
        pager.show(index);

        if !settle(&mut pager, index, args.page_timeout).await {
            warn!(
                "page {index} did not load within {:?}, moving on",
                args.page_timeout
            );
        }
    }

    pager.cancel_all();
    Ok(())
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (args, unrecognized_args) = Args::parse(&args);

    // need guard to live for lifetime of program
    let _guard = setup_logging(args.log_dir.as_deref());

    for arg in unrecognized_args {
        warn!("unrecognized arg: {arg}");
    }

    if let Err(err) = run(args).await {
        error!("{err}");
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use photoload::image::DynamicImage;
    use photoload::PrefetchBehavior;

    fn args(raw: &[&str]) -> Args {
        let raw: Vec<String> = raw.iter().map(|s| s.to_string()).collect();
        Args::parse(&raw).0
    }

    #[test]
    fn command_line_overrides_config() {
        let config = load_config(&args(&["--prefetch", "conservative", "--raw"])).unwrap();
        assert_eq!(config.prefetch, PrefetchBehavior::Conservative);
        assert!(!config.decode_stills);
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let missing = std::env::temp_dir().join("photoload-demo-missing-config.json");
        let _ = std::fs::remove_file(&missing);
        let path = missing.to_string_lossy().into_owned();
        assert!(load_config(&args(&["--config", &path])).is_err());
    }

    #[test]
    fn describes_content() {
        let bytes = PhotoContent::Bytes(vec![0u8; 3].into());
        assert_eq!(describe(&bytes), "3 raw bytes");

        let image = PhotoContent::Image(DynamicImage::new_rgba8(4, 2).into());
        assert_eq!(describe(&image), "4x2 image");
    }
}
