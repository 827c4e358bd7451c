// Configuration loading: TOML file plus environment overrides.

use std::io::Write;

use viva_coach::Config;

const SAMPLE: &str = r#"
[service]
name = "viva-coach"

[service.http]
bind = "127.0.0.1"
port = 3000

[live]
model = "gemini-2.5-flash-native-audio-preview-09-2025"
voice = "Fenrir"

[audio]
input_sample_rate = 16000
output_sample_rate = 24000
block_frames = 4096
"#;

fn write_config(dir: &tempfile::TempDir) -> String {
    let path = dir.path().join("viva-coach.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(SAMPLE.as_bytes()).unwrap();
    dir.path().join("viva-coach").to_string_lossy().into_owned()
}

#[test]
fn test_load_from_toml_file() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = Config::load(&write_config(&dir)).unwrap();

    assert_eq!(cfg.service.name, "viva-coach");
    assert_eq!(cfg.service.http.port, 3000);
    assert_eq!(cfg.live.voice, "Fenrir");
    assert_eq!(cfg.audio.input_sample_rate, 16_000);
    assert_eq!(cfg.audio.block_frames, 4096);
}

#[test]
fn test_environment_overrides_file_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir);

    // http.bind is not asserted by any other test in this binary, so
    // the temporary override cannot race a parallel test.
    std::env::set_var("VIVA__SERVICE__HTTP__BIND", "0.0.0.0");
    let cfg = Config::load(&path).unwrap();
    std::env::remove_var("VIVA__SERVICE__HTTP__BIND");

    assert_eq!(cfg.service.http.bind, "0.0.0.0");
    assert_eq!(cfg.live.model, "gemini-2.5-flash-native-audio-preview-09-2025");
}

#[test]
fn test_session_config_carries_audio_settings_and_key() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = Config::load(&write_config(&dir)).unwrap();

    let session = cfg.session_config("secret".into());
    assert_eq!(session.live.api_key, "secret");
    assert_eq!(session.input_sample_rate, 16_000);
    assert_eq!(session.output_sample_rate, 24_000);
    assert_eq!(session.block_frames, 4096);
    assert!(session.live.system_instruction.contains("3 parts"));
}

#[test]
fn test_missing_file_is_an_error() {
    assert!(Config::load("/nonexistent/viva-coach").is_err());
}
