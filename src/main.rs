mod apod;
mod apod_viewer;
mod app;
mod launch;
mod renderer;
mod viewer;

use std::sync::mpsc;

use anyhow::{anyhow, Result};

use crate::apod_viewer::ViewerSettings;
use crate::launch::LaunchRequest;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli_args = std::env::args().skip(1).collect::<Vec<_>>();
    let options = match launch::parse_launch_request_from_args(&cli_args)
        .map_err(|err| anyhow!("Launch args error: {err}\n\n{}", launch::USAGE))?
    {
        LaunchRequest::Run(options) => options,
        LaunchRequest::Help => {
            println!("{}", launch::USAGE);
            return Ok(());
        }
    };

    let api_key = launch::read_api_key(&options.key_file)?;
    let client = apod::ApodClient::new(api_key)?;
    let today = options
        .start_date
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    let settings = ViewerSettings {
        hd: options.hd,
        preload: options.preload,
    };
    log::info!(
        "Starting at {} with {} preloaded day(s)",
        apod::format_date(today),
        settings.preload
    );

    let [width, height] = viewer::WINDOW_SIZE;
    let native_options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default()
            .with_title(app::APP_TITLE)
            .with_inner_size([width as f32, height as f32])
            .with_resizable(false),
        ..Default::default()
    };

    let (fatal_tx, fatal_rx) = mpsc::channel();
    eframe::run_native(
        app::APP_TITLE,
        native_options,
        Box::new(move |cc| {
            Ok(Box::new(app::ApodViewerApp::new(
                &cc.egui_ctx,
                client,
                today,
                settings,
                fatal_tx,
            )))
        }),
    )
    .map_err(|err| anyhow!("Could not start the viewer window: {err}"))?;

    if let Ok(err) = fatal_rx.try_recv() {
        return Err(err.into());
    }
    Ok(())
}
