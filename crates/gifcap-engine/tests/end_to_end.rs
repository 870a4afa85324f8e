//! Full pipeline against a real display, ffmpeg and clipboard.
//!
//! Run with `cargo test -p gifcap-engine -- --ignored` on a desktop session
//! with ffmpeg on `PATH` (or `GIFCAP_FFMPEG` set).

use std::path::Path;
use std::process::Command;
use std::thread;
use std::time::Duration;

use gifcap_capture::enumerate_monitors;
use gifcap_encoder::locate_ffmpeg;
use gifcap_engine::{AppContext, Engine};
use gifcap_ipc::{event_channel, CaptureRegion, RecorderConfig, VideoFormat};

#[test]
#[ignore = "needs a display, ffmpeg and a clipboard"]
fn test_record_convert_publish() {
    assert!(!enumerate_monitors().unwrap().is_empty());
    let ffmpeg = locate_ffmpeg(None).expect("ffmpeg not found");

    let dir = tempfile::tempdir().unwrap();
    let config = RecorderConfig {
        video_format: VideoFormat::Mp4,
        ffmpeg_path: Some(ffmpeg.clone()),
        ..Default::default()
    };
    let context = AppContext::new(dir.path(), config).unwrap();
    let (event_tx, _events) = event_channel();
    let engine = Engine::new(context, event_tx);

    let session = engine
        .start_region(CaptureRegion::new(0, 0, 320, 240), 10, None)
        .expect("recording did not start");
    thread::sleep(Duration::from_millis(2200));
    let video = engine.stop_session().expect("no video produced");
    assert_eq!(video, session.output_path);

    let log = ffmpeg_log(&ffmpeg, &video);
    let frames = frame_count(&log);
    assert!((20..=24).contains(&frames), "frame count {}", frames);
    let seconds = duration_seconds(&log).expect("no duration reported");
    assert!((2.0..=2.4).contains(&seconds), "duration {}", seconds);

    let gif = engine.context().layout().gif_path();
    assert!(engine.convert(&video, &gif, 10));
    assert!(gif.is_file());
    assert!(engine.publish(&gif));
    #[cfg(windows)]
    assert!(clipboard_has_file_drop());
}

/// Stream-copy the video through ffmpeg and return its log.
fn ffmpeg_log(ffmpeg: &Path, video: &Path) -> String {
    let output = Command::new(ffmpeg)
        .args(["-hide_banner", "-i"])
        .arg(video)
        .args(["-map", "0:v:0", "-c", "copy", "-f", "null", "-"])
        .output()
        .unwrap();
    String::from_utf8_lossy(&output.stderr).into_owned()
}

/// Last `frame=` progress value.
fn frame_count(log: &str) -> u32 {
    log.rsplit("frame=")
        .next()
        .and_then(|tail| tail.split_whitespace().next())
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}

/// Container duration from `Duration: HH:MM:SS.ss,`.
fn duration_seconds(log: &str) -> Option<f64> {
    let tail = log.split("Duration: ").nth(1)?;
    let stamp = tail.split(',').next()?.trim();
    let mut parts = stamp.split(':');
    let hours: f64 = parts.next()?.parse().ok()?;
    let minutes: f64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

#[cfg(windows)]
fn clipboard_has_file_drop() -> bool {
    use gifcap_clipboard::CF_HDROP;
    use windows::Win32::Foundation::HWND;
    use windows::Win32::System::DataExchange::{CloseClipboard, GetClipboardData, OpenClipboard};

    unsafe {
        if OpenClipboard(HWND::default()).is_err() {
            return false;
        }
        let present = GetClipboardData(CF_HDROP).is_ok();
        let _ = CloseClipboard();
        present
    }
}

#[test]
fn test_duration_parsing() {
    let log = "Input #0, mov,mp4,m4a,3gp,3g2,mj2, from 'a.mp4':\n  Duration: 00:00:02.20, start: 0.000000, bitrate: 51 kb/s\nframe=   22 fps=0.0 q=-1.0 Lsize=N/A";
    assert_eq!(duration_seconds(log), Some(2.2));
    assert_eq!(frame_count(log), 22);
    assert_eq!(duration_seconds("no header"), None);
}
