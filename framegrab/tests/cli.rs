use std::fs;
use std::path::Path;
use std::process::{Command, Output};

fn framegrab(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_framegrab"))
        .current_dir(dir)
        .env_remove("RUST_LOG")
        .args(args)
        .output()
        .expect("run framegrab")
}

fn entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .expect("read temp dir")
        .map(|entry| entry.expect("dir entry").file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// One second of 8 kHz mono 16-bit silence.
fn write_silent_wav(path: &Path) {
    let samples = 8000u32;
    let data_len = samples * 2;
    let mut wav = Vec::new();
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_len).to_le_bytes());
    wav.extend_from_slice(b"WAVEfmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav.extend_from_slice(&1u16.to_le_bytes());
    wav.extend_from_slice(&8000u32.to_le_bytes());
    wav.extend_from_slice(&16000u32.to_le_bytes());
    wav.extend_from_slice(&2u16.to_le_bytes());
    wav.extend_from_slice(&16u16.to_le_bytes());
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_len.to_le_bytes());
    wav.resize(wav.len() + data_len as usize, 0);
    fs::write(path, wav).expect("write wav");
}

/// 4x2 raw 4:2:0 video with `frames` Y4M `FRAME` blocks.
fn write_y4m(path: &Path, frames: usize) {
    let mut y4m = b"YUV4MPEG2 W4 H2 F25:1 C420jpeg\n".to_vec();
    for n in 0..frames {
        y4m.extend_from_slice(b"FRAME\n");
        let luma = (16 + n * 16) as u8;
        y4m.extend_from_slice(&[luma; 8]);
        y4m.extend_from_slice(&[128, 128, 128, 128]);
    }
    fs::write(path, y4m).expect("write y4m");
}

fn assert_writes_first_frames(frames: usize) {
    let dir = tempfile::tempdir().unwrap();
    write_y4m(&dir.path().join("clip.y4m"), frames);

    let output = framegrab(dir.path(), &["clip.y4m"]);
    assert!(
        output.status.success(),
        "framegrab failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let written = frames.min(10);
    let mut expected: Vec<String> = (0..written).map(|n| format!("frame{n}.ppm")).collect();
    expected.push(String::from("clip.y4m"));
    expected.sort();
    assert_eq!(entries(dir.path()), expected);

    let header = b"P6\n4 2\n255\n";
    let first_run: Vec<Vec<u8>> = (0..written)
        .map(|n| fs::read(dir.path().join(format!("frame{n}.ppm"))).expect("read ppm"))
        .collect();
    for bytes in &first_run {
        assert_eq!(bytes.len(), header.len() + 4 * 2 * 3);
        assert_eq!(&bytes[..header.len()], header);
    }

    let output = framegrab(dir.path(), &["clip.y4m"]);
    assert!(output.status.success());
    assert_eq!(entries(dir.path()), expected);
    for (n, bytes) in first_run.iter().enumerate() {
        let again = fs::read(dir.path().join(format!("frame{n}.ppm"))).expect("read ppm");
        assert_eq!(&again, bytes, "frame{n}.ppm changed between runs");
    }
}

#[test]
fn short_clip_writes_every_frame() {
    assert_writes_first_frames(3);
}

#[test]
fn long_clip_stops_after_ten_frames() {
    assert_writes_first_frames(12);
}

#[test]
fn help_lists_flags() {
    let dir = tempfile::tempdir().unwrap();
    let output = framegrab(dir.path(), &["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for flag in ["--mode", "--frames", "--output-dir", "--image-format", "--option"] {
        assert!(stdout.contains(flag), "missing {flag} in help output");
    }
}

#[test]
fn missing_input_fails_without_writing_files() {
    let dir = tempfile::tempdir().unwrap();
    let output = framegrab(dir.path(), &["does-not-exist.mp4"]);

    assert_eq!(output.status.code(), Some(255));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("could not open"), "stderr: {stderr}");
    assert!(entries(dir.path()).is_empty());
}

#[test]
fn audio_only_input_has_no_video_stream() {
    let dir = tempfile::tempdir().unwrap();
    write_silent_wav(&dir.path().join("tone.wav"));
    let output = framegrab(dir.path(), &["tone.wav"]);

    assert_eq!(output.status.code(), Some(255));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no video stream"), "stderr: {stderr}");
    assert_eq!(entries(dir.path()), vec!["tone.wav"]);
}

#[test]
fn missing_config_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let output = framegrab(dir.path(), &["input.mp4", "--config", "missing.toml"]);

    assert_eq!(output.status.code(), Some(255));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid configuration"), "stderr: {stderr}");
}

#[test]
fn malformed_option_is_rejected_by_the_parser() {
    let dir = tempfile::tempdir().unwrap();
    let output = framegrab(dir.path(), &["input.mp4", "--option", "video_size"]);

    assert!(!output.status.success());
    assert_ne!(output.status.code(), Some(255));
    assert!(String::from_utf8_lossy(&output.stderr).contains("KEY=VALUE"));
}
