//! Controller tests against voicebank directories on disk.

use std::f32::consts::TAU;
use std::path::Path;

use canto_formats::{load_wav_file, write_wav_file, CACHE_FILE_NAME};
use canto_engine::Alignment;
use canto_master::{Config, Controller, ControllerError, Waveform};

const SR: u32 = 16000;

fn sine(freq: f32, seconds: f32) -> Waveform {
    let len = (seconds * SR as f32) as usize;
    let samples = (0..len)
        .map(|i| 0.4 * (TAU * freq * i as f32 / SR as f32).sin())
        .collect();
    Waveform::new(samples, SR)
}

fn voicebank(dir: &Path) {
    std::fs::write(
        dir.join("oto.ini"),
        "a.wav=a,20,30,-250,15,0\n\
         a.wav=,20,30,-250,15,0\n\
         i.wav=i,10,20,30,10,0,A3\n",
    )
    .unwrap();
    write_wav_file(&dir.join("a.wav"), &sine(262.0, 0.35)).unwrap();
    write_wav_file(&dir.join("i.wav"), &sine(220.0, 0.3)).unwrap();
}

fn config() -> Config {
    let mut config = Config::default();
    config.render.sample_rate = SR;
    config
}

#[test]
fn renders_score_to_wav_and_caches_analyses() {
    let dir = tempfile::tempdir().unwrap();
    voicebank(dir.path());
    let score = dir.path().join("song.mml");
    std::fs::write(&score, "@lead t150 l8 o4\n## a i a\ncde r4 f\n").unwrap();
    let out = dir.path().join("song.wav");

    let mut controller = Controller::new(config());
    let index = controller.open_voicebank(dir.path()).unwrap();
    assert_eq!(index.syllables().collect::<Vec<_>>(), ["a", "i"]);

    let waveform = controller.render_to_file(&score, &out).unwrap();
    let written = load_wav_file(&out).unwrap();
    assert_eq!(written.len(), waveform.len());
    assert_eq!(written.sample_rate(), SR);
    // Four eighth notes and a quarter rest at 150 bpm.
    assert_eq!(waveform.len(), 4 * 3200 + 6400);
    assert!(waveform.peak() > 0.0);
    assert_eq!(controller.voicebank().unwrap().analyses_run(), 2);
    assert!(dir.path().join(CACHE_FILE_NAME).exists());

    // A second session reuses the persisted analyses.
    let mut again = Controller::new(config());
    again.open_voicebank(dir.path()).unwrap();
    let project = again.load_score(&score).unwrap();
    let second = again.render(&project).unwrap();
    assert_eq!(again.voicebank().unwrap().analyses_run(), 0);
    assert_eq!(second.len(), waveform.len());
}

#[test]
fn preutterance_alignment_keeps_score_length() {
    let dir = tempfile::tempdir().unwrap();
    voicebank(dir.path());
    let score = dir.path().join("song.mml");
    std::fs::write(&score, "@lead t150 l8 o4\n## a i a\ncde r4 f\n").unwrap();

    let mut config = config();
    config.render.alignment = Alignment::Preutterance;
    let mut controller = Controller::new(config);
    controller.open_voicebank(dir.path()).unwrap();
    let project = controller.load_score(&score).unwrap();
    let waveform = controller.render(&project).unwrap();
    assert_eq!(waveform.len(), 4 * 3200 + 6400);
    assert!(waveform.samples().iter().all(|s| s.is_finite() && s.abs() <= 1.0));

    // The last note reaches 15 ms back into the rest.
    let rest = &waveform.samples()[3 * 3200..3 * 3200 + 6400];
    assert!(rest[..6400 - 240].iter().all(|&s| s == 0.0));
    assert!(rest[6400 - 240..].iter().any(|&s| s != 0.0));
}

#[test]
fn changed_sample_is_analysed_again() {
    let dir = tempfile::tempdir().unwrap();
    voicebank(dir.path());

    let mut controller = Controller::new(config());
    controller.open_voicebank(dir.path()).unwrap();
    controller.voicebank().unwrap().resolve("a").unwrap();
    assert_eq!(controller.save_cache().unwrap(), 1);

    write_wav_file(&dir.path().join("a.wav"), &sine(262.0, 0.5)).unwrap();
    let mut again = Controller::new(config());
    again.open_voicebank(dir.path()).unwrap();
    again.voicebank().unwrap().resolve("a").unwrap();
    assert_eq!(again.voicebank().unwrap().analyses_run(), 1);
}

#[test]
fn disabled_cache_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    voicebank(dir.path());
    let mut config = config();
    config.analysis.cache = false;

    let mut controller = Controller::new(config);
    controller.open_voicebank(dir.path()).unwrap();
    controller.voicebank().unwrap().resolve("i").unwrap();
    assert_eq!(controller.save_cache().unwrap(), 0);
    assert!(!dir.path().join(CACHE_FILE_NAME).exists());
}

#[test]
fn missing_samples_are_reported_when_checked() {
    let dir = tempfile::tempdir().unwrap();
    voicebank(dir.path());
    std::fs::remove_file(dir.path().join("i.wav")).unwrap();

    let mut controller = Controller::new(config());
    match controller.open_voicebank(dir.path()) {
        Err(ControllerError::MissingSamples(missing)) => assert_eq!(missing, ["i.wav"]),
        Err(e) => panic!("unexpected error {}", e),
        Ok(_) => panic!("missing sample not reported"),
    }

    let mut config = config();
    config.voicebank.check_samples = false;
    let mut lenient = Controller::new(config);
    assert!(lenient.open_voicebank(dir.path()).is_ok());
    assert!(lenient.voicebank().unwrap().resolve("i").is_err());
}

#[test]
fn missing_oto_names_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut controller = Controller::new(config());
    let err = controller.open_voicebank(dir.path()).err().unwrap();
    assert!(matches!(err, ControllerError::Read { .. }));
    assert!(err.to_string().contains("oto.ini"));
}

#[test]
fn render_needs_a_voicebank() {
    let controller = Controller::new(config());
    let err = controller.render(&canto_master::Project::new()).unwrap_err();
    assert!(matches!(err, ControllerError::NoVoicebank));
}

#[test]
fn score_errors_pass_through() {
    let dir = tempfile::tempdir().unwrap();
    let score = dir.path().join("bad.mml");
    std::fs::write(&score, "cde\nt fast").unwrap();
    let err = Controller::new(config()).load_score(&score).unwrap_err();
    assert!(matches!(err, ControllerError::Score(_)));
    assert!(err.to_string().contains("tempo"));
}
