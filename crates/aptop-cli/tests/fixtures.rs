//! Shared helpers for driving `aptop` against a scripted probe.

#![allow(dead_code)]

use std::fs;

use tempfile::TempDir;

/// Two complete sampling cycles followed by an unterminated third one.
pub const TWO_CYCLES: &str = r#"
printf "GPU HW active residency:  42.50%%\n"
printf "GPU Power: 120 mW\n"
printf "E-Cluster idle residency:  70.00%%\n"
printf "P-Cluster idle residency:  60.00%%\n"
printf "Combined Power (CPU + GPU + ANE): 1200 mW\n"
printf "GPU HW active residency:  12.00%%\n"
printf "E-Cluster idle residency:  20.00%%\n"
printf "P-Cluster idle residency:  40.00%%\n"
printf "Combined Power (CPU + GPU + ANE): 6400 mW\n"
printf "GPU HW active residency:  99.00%%\n"
"#;

/// Emits a frame every 50 ms forever and ignores SIGTERM.
pub const STUBBORN_LOOP: &str = r#"
trap '' TERM PIPE
while :; do
  printf "GPU HW active residency:  5.00%%\n"
  printf "Combined Power (CPU + GPU + ANE): 10 mW\n"
  sleep 0.05
done
"#;

/// Creates an APTOP_HOME whose config runs `script` through `sh` in place of
/// powermetrics.
pub fn home_with_script(script: &str, grace_period_ms: u64) -> TempDir {
    let home = TempDir::new().expect("create temp aptop home");
    let config = format!(
        "grace_period_ms = {grace_period_ms}\n\n[probe]\nprogram = \"sh\"\nargs = [\"-c\", '''{script}''', \"sh\"]\n"
    );
    fs::write(home.path().join("config.toml"), config).expect("write config");
    home
}

/// Creates an APTOP_HOME whose probe program does not exist.
pub fn home_with_missing_probe() -> TempDir {
    let home = TempDir::new().expect("create temp aptop home");
    fs::write(
        home.path().join("config.toml"),
        "[probe]\nprogram = \"/nonexistent/aptop-probe\"\n",
    )
    .expect("write config");
    home
}
