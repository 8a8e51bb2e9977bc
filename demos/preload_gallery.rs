use studio_assets::{
    error_message, AppConfig, CacheOptions, FileStorage, HttpLoader, LoadingScreen,
    PreloadOptions, Preloader, ProjectsApi, VideoCache,
};
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::load()?;
    let api = ProjectsApi::new(&config)?;

    println!("=== API Connection ===");
    let status = api.check_connection().await;
    println!("{} (status: {:?})", status.message, status.status);

    println!("\n=== Gallery ===");
    let projects = match api.all_projects().await {
        Ok(projects) => projects,
        Err(e) => {
            // A failed fetch never reaches the preloader
            eprintln!("Could not load projects: {}", error_message(&e));
            return Ok(());
        }
    };
    println!("{} projects", projects.len());

    let images: Vec<String> = projects.iter().flat_map(|p| p.gallery_images()).collect();
    let videos: Vec<String> = projects
        .iter()
        .filter(|p| p.show_video.unwrap_or(false))
        .flat_map(|p| p.video_urls())
        .collect();

    let cache = Arc::new(VideoCache::new(
        FileStorage::new(&config.cache_dir),
        CacheOptions::new()
            .max_cache_age(config.max_cache_age())
            .on_cache_hit(|url| println!("  cached: {}", url)),
    ));
    cache.initialize(&videos).await;

    let preloader = Preloader::new(HttpLoader::from_config(&config)?).with_cache(cache.clone());

    let screen = Arc::new(Mutex::new(
        LoadingScreen::new().on_complete(|| println!("  -> showing gallery")),
    ));
    let screen_for_progress = screen.clone();

    println!("\n=== Preloading {} images, {} videos ===", images.len(), videos.len());
    let report = preloader
        .preload(
            &images,
            &videos,
            PreloadOptions::new()
                .full_preload(config.full_preload)
                .on_progress(move |progress| {
                    if let Ok(mut screen) = screen_for_progress.lock() {
                        screen.update(progress, progress < 100);
                        println!("  {:>3}% {}", screen.percent(), screen.stage());
                    }
                }),
        )
        .await;

    println!(
        "\nLoaded {}/{} assets ({} failed), {} videos now cached",
        report.state.loaded_count,
        report.state.total_assets,
        report.errored(),
        cache.cached_videos().len()
    );

    Ok(())
}
