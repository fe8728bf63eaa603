use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::tempdir;

const REGISTRY: &str = "2018121243\tM1\tDRUG\t14\t3\t2\t5\t50\t25.3\n\
                        2018121244\tM2\tWATER\t14\t3\t0\t9\t0\t27.1\n";

// Minimal valid config for the sim backend; registry and logs live in `dir`
fn write_config(dir: &Path, extra: &str) -> PathBuf {
    fs::write(dir.join("mice.cfg"), REGISTRY).unwrap();
    let toml = format!(
        r#"
[pins]
# pins are unused in sim backend but must be present
presence = 27
scale_dat = 5
scale_clk = 6
touch_irq = 26
solenoid = 4
motor_step = 23
motor_dir = 24
motor_ms1 = 17
motor_ms2 = 18

[session]
grace_period_ms = 1000
poll_ms = 5

[weighing]
retare_attempts = 2

[paths]
registry = '{reg}'
data_dir = '{data}'
tare_log = '{tare}'
{extra}
"#,
        reg = dir.join("mice.cfg").display(),
        data = dir.join("data").display(),
        tare = dir.join("tare_weights.txt").display(),
    );
    let path = dir.join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn cage() -> Command {
    let mut cmd = Command::cargo_bin("cage_cli").unwrap();
    cmd.env_remove("CAGE_SIM_TAG").env_remove("RUST_LOG");
    cmd
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["self-check"], 0, "self-check ok: 2 animal(s)", "stdout")]
#[case(&["status"], 0, "M2\tWATER", "stdout")]
#[case(&["run", "--duration-ms", "50"], 0, "cage stopped", "stdout")]
#[case(&["frobnicate"], 2, "unrecognized subcommand", "stderr")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_config(dir.path(), "");

    let mut cmd = cage();
    cmd.arg("--config").arg(&cfg);
    for a in args {
        cmd.arg(a);
    }

    let assert = cmd.assert().code(exit_code);
    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

#[test]
fn run_with_animal_logs_entry_and_exit() {
    let dir = tempdir().unwrap();
    let cfg = write_config(dir.path(), "");

    cage()
        .env("CAGE_SIM_TAG", "2018121243")
        .arg("--config")
        .arg(&cfg)
        .args(["run", "--duration-ms", "300"])
        .assert()
        .success()
        .stdout(predicate::str::contains("cage stopped"));

    let events = fs::read_to_string(dir.path().join("data/M1/M1_data.txt")).unwrap();
    let codes: Vec<&str> = events
        .lines()
        .filter_map(|l| l.split('\t').nth(1))
        .collect();
    assert_eq!(codes, vec!["00", "99"]);

    let weights = fs::read_dir(dir.path().join("data/M1/Weights")).unwrap().count();
    assert_eq!(weights, 1);

    let table = fs::read_to_string(dir.path().join("mice.cfg")).unwrap();
    assert_eq!(table.lines().count(), 2);
    assert!(table.contains("2018121244\tM2\tWATER\t14\t3\t0\t9\t0\t27.1"));
}

#[test]
fn unknown_tags_exit_for_reboot() {
    let dir = tempdir().unwrap();
    let cfg = write_config(dir.path(), "\n[rfid]\nunknown_reboot_threshold = 1\n");

    cage()
        .env("CAGE_SIM_TAG", "99")
        .arg("--json")
        .arg("--config")
        .arg(&cfg)
        .args(["run", "--duration-ms", "5000"])
        .assert()
        .code(10)
        .stdout(predicate::str::contains(r#""outcome":"reboot_requested""#));
}

#[test]
fn missing_config_is_a_config_error() {
    let dir = tempdir().unwrap();
    cage()
        .arg("--config")
        .arg(dir.path().join("nope.toml"))
        .arg("status")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Invalid configuration"));
}

#[test]
fn invalid_config_names_the_field() {
    let dir = tempdir().unwrap();
    let cfg = write_config(dir.path(), "\n[dosing]\ndrug_drop_frequency = 0\n");
    cage()
        .arg("--config")
        .arg(&cfg)
        .arg("status")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("drug_drop_frequency"));
}

#[test]
fn short_registry_row_is_reported() {
    let dir = tempdir().unwrap();
    let cfg = write_config(dir.path(), "");
    let mut f = fs::OpenOptions::new()
        .append(true)
        .open(dir.path().join("mice.cfg"))
        .unwrap();
    writeln!(f, "77\tM3\tDRUG").unwrap();

    cage()
        .arg("--config")
        .arg(&cfg)
        .arg("status")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("line 3"));
}

#[test]
fn status_json_is_one_object_per_animal() {
    let dir = tempdir().unwrap();
    let cfg = write_config(dir.path(), "");
    let out = cage()
        .arg("--json")
        .arg("--config")
        .arg(&cfg)
        .arg("status")
        .output()
        .unwrap();
    assert!(out.status.success());
    let lines: Vec<serde_json::Value> = String::from_utf8(out.stdout)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["name"], "M1");
    assert_eq!(lines[0]["required_drug_drops_today"], 50);
    assert_eq!(lines[1]["treatment"], "WATER");
}

#[test]
fn bad_calibration_header_is_reported() {
    let dir = tempdir().unwrap();
    let cfg = write_config(dir.path(), "");

    let bad_csv = dir.path().join("calib.csv");
    let mut f = fs::File::create(&bad_csv).unwrap();
    writeln!(f, "raw,value").unwrap();
    writeln!(f, "100,0.0").unwrap();
    writeln!(f, "200,1.0").unwrap();

    cage()
        .arg("--config")
        .arg(&cfg)
        .arg("--calibration")
        .arg(&bad_csv)
        .arg("self-check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid headers"));
}
