//! Camera Viewfinder - live camera preview with recording and an image
//! overlay for tracing.
//!
//! The library holds the device session, recording and overlay logic. The
//! `desktop` feature adds the Tauri application and its commands.

pub mod capture;
#[cfg(feature = "desktop")]
pub mod commands;
pub mod config;
pub mod overlay;
pub mod recorder;
pub mod utils;
pub mod viewfinder;

#[cfg(test)]
mod testing;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the tracing subscriber; `RUST_LOG` overrides the default filter
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "camera_viewfinder_lib=debug,tauri=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Run the desktop application
#[cfg(feature = "desktop")]
pub fn run() -> anyhow::Result<()> {
    use anyhow::Context;
    use commands::viewfinder::{self as cmd, ViewfinderState};
    use config::ViewfinderConfig;
    use tauri::Manager;

    init_tracing();
    tracing::info!("Starting Camera Viewfinder v{}", env!("CARGO_PKG_VERSION"));

    let config = ViewfinderConfig::from_env().context("failed to load configuration")?;

    tauri::Builder::default()
        .plugin(tauri_plugin_dialog::init())
        .setup(move |app| {
            let downloads_dir = match config.downloads_dir.clone() {
                Some(dir) => dir,
                None => app
                    .path()
                    .download_dir()
                    .context("no downloads directory available")?,
            };

            let state = ViewfinderState::new(&config, downloads_dir);
            let handle = app.handle().clone();
            tauri::async_runtime::block_on(state.forward_events(handle));
            app.manage(state);
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            // Lifecycle
            cmd::mount_viewfinder,
            cmd::unmount_viewfinder,
            cmd::retry_camera,
            cmd::refresh_camera,
            cmd::set_audio_enabled,
            cmd::dismiss_error,
            cmd::get_view_state,
            cmd::get_preview_frame,
            cmd::get_cameras,
            // Recording
            cmd::start_recording,
            cmd::stop_recording,
            cmd::retry_save_recording,
            cmd::toggle_pause,
            cmd::pause_recording,
            cmd::resume_recording,
            // Overlay
            cmd::pick_overlay_image,
            cmd::load_overlay_image,
            cmd::load_overlay_file,
            cmd::remove_overlay_image,
            cmd::overlay_pointer_down,
            cmd::overlay_pointer_move,
            cmd::overlay_pointer_up,
            cmd::overlay_wheel,
            cmd::overlay_zoom_in,
            cmd::overlay_zoom_out,
            cmd::reset_overlay_transform,
            cmd::set_overlay_opacity,
            cmd::list_overlay_filters,
            cmd::set_overlay_filter,
            cmd::set_strobe_enabled,
            cmd::set_strobe_interval,
            cmd::get_overlay_style,
        ])
        .run(tauri::generate_context!())
        .context("error while running tauri application")
}
