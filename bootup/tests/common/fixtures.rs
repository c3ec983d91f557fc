use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

pub const REQUIREMENTS: &str = "\
cluster:
  provider: gke
versionStream:
  url: https://github.com/jenkins-x/jenkins-x-versions.git
  ref: abc123
";

/// A throwaway GitOps working directory plus an isolated config home, so the
/// binary never reads the developer's own `~/.config/bootup`.
pub struct GitOpsDir {
    pub dir: TempDir,
    pub config_home: TempDir,
}

impl GitOpsDir {
    pub fn empty() -> Self {
        crate::test_log!("FIXTURE: Creating empty working directory");
        Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
            config_home: TempDir::new().expect("Failed to create config home"),
        }
    }

    pub fn with_requirements() -> Self {
        let fixture = Self::empty();
        fs::write(fixture.requirements_path(), REQUIREMENTS)
            .expect("Failed to write jx-requirements.yml");
        fixture
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn requirements_path(&self) -> PathBuf {
        self.dir.path().join("jx-requirements.yml")
    }

    pub fn write_config(&self, contents: &str) -> PathBuf {
        let path = self.config_home.path().join("config.toml");
        fs::write(&path, contents).expect("Failed to write config.toml");
        path
    }

    /// `bootup` with a scrubbed environment.
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_bootup"));
        for (key, _) in std::env::vars() {
            if key.starts_with("BOOTUP_") {
                cmd.env_remove(key);
            }
        }
        cmd.env("XDG_CONFIG_HOME", self.config_home.path())
            .env("HOME", self.config_home.path())
            .env("BOOTUP_LOG_LEVEL", "warn");
        cmd
    }

    pub fn run(&self, args: &[&str]) -> Output {
        let output = self.command().args(args).output().expect("Failed to run bootup");
        crate::test_log!(
            "bootup {:?} -> {:?}\nstdout: {}\nstderr: {}",
            args,
            output.status.code(),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        output
    }
}

pub fn git_available() -> bool {
    which::which("git").is_ok()
}
