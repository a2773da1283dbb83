//! Info command - show FFmpeg and encoder information

use anyhow::Result;
use framecast_core::config::{ConfigFile, RuntimeConfig};
use framecast_core::encode;

/// Show FFmpeg version, JPEG support and the effective configuration
pub async fn info() -> Result<()> {
    println!("Framecast - System Information\n");

    println!("FFmpeg:");
    println!("  Version:         {}", encode::ffmpeg_version());
    let jpeg = encode::jpeg_available();
    println!("  MJPEG encoder:   {}", if jpeg { "yes" } else { "no" });

    if !jpeg {
        println!();
        println!("  Video feeds need FFmpeg built with the mjpeg encoder.");
    }

    println!();

    let path = ConfigFile::default_path();
    println!("Configuration:");
    println!(
        "  File:            {} ({})",
        path.display(),
        if path.exists() { "found" } else { "not found, using defaults" }
    );

    match ConfigFile::load_from(&path).and_then(|file| RuntimeConfig::from_file(&file)) {
        Ok(runtime) => {
            println!("  Listen address:  {}", runtime.bind);
            println!("  RTSP transport:  {}", runtime.capture.rtsp_transport);
            println!(
                "  Open timeout:    {} ms",
                runtime.capture.open_timeout.as_millis()
            );
            println!("  Frame queue:     {}", runtime.capture.frame_queue);
            println!("  Viewer queue:    {}", runtime.publisher.viewer_queue);
        }
        Err(e) => {
            println!("  Invalid: {}", e);
            if let Some(hint) = e.user_hint() {
                println!("  Hint: {}", hint);
            }
        }
    }

    Ok(())
}
