fn main() {
    // The Tauri context (config, icons, frontend assets) is only generated
    // for the desktop shell; the capture engine builds without it.
    #[cfg(feature = "desktop")]
    tauri_build::build();
}
