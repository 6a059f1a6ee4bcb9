use std::fs;
use std::process::{Command, Output};

fn pointswarm(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_pointswarm"))
        .args(["--backend", "cpu", "--width", "64", "--height", "48"])
        .args(args)
        .output()
        .expect("Failed to execute pointswarm")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn runs_requested_frames_on_cpu_backend() {
    let output = pointswarm(&[
        "--particle-count",
        "500",
        "--fps",
        "100",
        "--refresh-hz",
        "200",
        "--frames",
        "5",
    ]);

    assert!(output.status.success(), "pointswarm exited with error");
    let text = stdout(&output);
    assert!(
        text.contains("pointswarm: 500 particles at 100 fps (g=9, resistance=0.99)"),
        "unexpected header: {}",
        text
    );
    assert!(text.contains("Rendered 5 frames"), "unexpected summary: {}", text);
}

#[test]
fn invalid_values_fall_back_to_defaults() {
    let output = pointswarm(&[
        "--particle-count=-5",
        "--mobile",
        "--fps",
        "0",
        "-g",
        "abc",
        "--resistance",
        "",
        "--frames",
        "2",
    ]);

    assert!(output.status.success(), "fallback must not be an error");
    assert!(
        stdout(&output).contains("pointswarm: 100000 particles at 60 fps (g=9, resistance=0.99)"),
        "defaults not applied"
    );
}

#[test]
fn reads_config_file_and_command_line_wins() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("swarm.yaml");
    fs::write(&path, "particle_count: 300\nfps: 120\ng: 4.5\nresistance: \"0.95\"\n").unwrap();

    let output = pointswarm(&[
        "--config",
        path.to_str().unwrap(),
        "--fps",
        "200",
        "--refresh-hz",
        "400",
        "--frames",
        "3",
    ]);

    assert!(output.status.success(), "pointswarm exited with error");
    let text = stdout(&output);
    assert!(
        text.contains("pointswarm: 300 particles at 200 fps (g=4.5, resistance=0.95)"),
        "unexpected header: {}",
        text
    );
    assert!(text.contains("Rendered 3 frames"));
}

#[test]
fn missing_config_file_is_an_error() {
    let output = pointswarm(&["--config", "/nonexistent/swarm.yaml", "--frames", "1"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to load config"), "stderr: {}", stderr);
}

#[test]
fn time_limit_stops_the_loop() {
    let output = pointswarm(&["--particle-count", "100", "--seconds", "0.2"]);

    assert!(output.status.success());
    assert!(stdout(&output).contains("Rendered"));
}
