// Prevents additional console window on Windows in release
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

fn main() {
    if let Err(e) = camera_viewfinder_lib::run() {
        tracing::error!("{:#}", e);
        eprintln!("{e:#}");
        std::process::exit(1);
    }
}
