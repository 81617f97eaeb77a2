#![allow(dead_code)]

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::time::{SystemTime, UNIX_EPOCH};

use tempfile::TempDir;

use opsdeck::engine::controller::ModeController;
use opsdeck::model::catalog::MetricCatalog;
use opsdeck::model::mode::ModeState;

pub struct CmdResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub log_path: PathBuf,
}

/// Controller over the built-in airport catalog.
pub fn airport_controller(modes: ModeState) -> ModeController {
    ModeController::new(MetricCatalog::airport_default(), modes)
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis())
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn resolve_bin_path() -> PathBuf {
    if let Some(path) = option_env!("CARGO_BIN_EXE_opsdeck") {
        return PathBuf::from(path);
    }

    let exe_name = if cfg!(windows) { "opsdeck.exe" } else { "opsdeck" };
    let fallback = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from))
        .and_then(|deps| deps.parent().map(PathBuf::from))
        .map(|debug_dir| debug_dir.join(exe_name));

    match fallback {
        Some(path) if path.exists() => path,
        _ => panic!("unable to resolve opsdeck binary path for integration test"),
    }
}

/// One CLI invocation environment. `HOME` points at a private tempdir so
/// the default config lookup never reads the developer's own file.
pub struct CliCase {
    name: String,
    home: TempDir,
}

impl CliCase {
    pub fn new(name: &str) -> Self {
        Self {
            name: sanitize(name),
            home: tempfile::tempdir().expect("create isolated HOME"),
        }
    }

    pub fn home(&self) -> &Path {
        self.home.path()
    }

    /// Write `contents` where `Config::load(None)` looks for it.
    pub fn write_default_config(&self, contents: &str) -> PathBuf {
        let dir = self.home().join(".config").join("opsdeck");
        fs::create_dir_all(&dir).expect("create config dir");
        let path = dir.join("config.toml");
        fs::write(&path, contents).expect("write config");
        path
    }

    /// Run the binary with logging disabled and mode overrides cleared.
    pub fn run(&self, args: &[&str]) -> CmdResult {
        let bin_path = resolve_bin_path();
        let output = Command::new(&bin_path)
            .args(args)
            .env("HOME", self.home())
            .env("OPSDECK_LOGGING_ENABLED", "false")
            .env_remove("OPSDECK_MODES_EMERGENCY")
            .env_remove("OPSDECK_MODES_OPERATIONS_ALERT")
            .env_remove("OPSDECK_MODES_SYSTEM_OPTIMIZED")
            .env("RUST_BACKTRACE", "1")
            .output()
            .expect("execute opsdeck command");

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        let log_path = self.write_transcript(&bin_path, args, output.status, &stdout, &stderr);

        CmdResult {
            status: output.status,
            stdout,
            stderr,
            log_path,
        }
    }

    fn write_transcript(
        &self,
        bin_path: &Path,
        args: &[&str],
        status: ExitStatus,
        stdout: &str,
        stderr: &str,
    ) -> PathBuf {
        let root = std::env::temp_dir().join("opsdeck-test-logs");
        fs::create_dir_all(&root).expect("create transcript dir");
        let path = root.join(format!("{}-{}.log", self.name, now_millis()));

        let mut transcript = String::new();
        let _ = writeln!(transcript, "case={}", self.name);
        let _ = writeln!(transcript, "bin={}", bin_path.display());
        let _ = writeln!(transcript, "home={}", self.home().display());
        let _ = writeln!(transcript, "args={args:?}");
        let _ = writeln!(transcript, "status={status}");
        let _ = writeln!(transcript, "[stdout]\n{stdout}");
        let _ = writeln!(transcript, "[stderr]\n{stderr}");
        fs::write(&path, transcript).expect("write transcript");
        path
    }
}

/// Run the CLI once in a fresh isolated `HOME`.
pub fn run_cli_case(case_name: &str, args: &[&str]) -> CmdResult {
    CliCase::new(case_name).run(args)
}
