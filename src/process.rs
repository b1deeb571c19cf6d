//! External process abstraction
//!
//! Every CDO, NCO, TRACK, `master` and TR2NC call goes through a
//! [`CommandRunner`]. A command carries its own working directory, environment,
//! stdin redirection and time limit, so nothing here touches the process-wide
//! current directory or environment.

use crate::config::{TrackConfig, TrackInstall};
use crate::errors::{Result, TrackError};
use async_trait::async_trait;
use log::debug;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;

/// One invocation of an external program
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalCommand {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, OsString)>,
    pub stdin: Option<PathBuf>,
    pub timeout: Option<Duration>,
    pub expected_status: i32,
}

impl ExternalCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
            stdin: None,
            timeout: None,
            expected_status: 0,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.display().to_string())
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn envs(mut self, vars: Vec<(String, OsString)>) -> Self {
        self.env.extend(vars);
        self
    }

    pub fn stdin_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdin = Some(path.into());
        self
    }

    pub fn timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    pub fn expect_status(mut self, status: i32) -> Self {
        self.expected_status = status;
        self
    }

    /// Short tool name for error messages, e.g. `track.linux`.
    pub fn tool_name(&self) -> String {
        Path::new(&self.program)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.clone())
    }

    /// Shell-like rendering for logs.
    pub fn display(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        if let Some(stdin) = &self.stdin {
            line.push_str(&format!(" < {}", stdin.display()));
        }
        line
    }

    /// Compare the exit status with the expected one.
    pub fn check(&self, output: CommandOutput) -> Result<CommandOutput> {
        if output.status == Some(self.expected_status) {
            return Ok(output);
        }
        let detail = output
            .stderr
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .unwrap_or("")
            .trim()
            .to_string();
        let status = match output.status {
            Some(code) => format!("exit status {}", code),
            None => "terminated by signal".to_string(),
        };
        Err(TrackError::external(
            self.tool_name(),
            if detail.is_empty() {
                status
            } else {
                format!("{}: {}", status, detail)
            },
        ))
    }
}

/// Captured result of a finished command
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandOutput {
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            status: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failure(status: i32, stderr: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

/// Execution backend for external commands
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a command to completion and check its exit status
    async fn run(&self, command: &ExternalCommand) -> Result<CommandOutput>;
}

/// Runs commands as real child processes
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, command: &ExternalCommand) -> Result<CommandOutput> {
        let tool = command.tool_name();
        let mut child = tokio::process::Command::new(&command.program);
        child
            .args(&command.args)
            .envs(command.env.iter().map(|(k, v)| (k.as_str(), v.as_os_str())))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &command.cwd {
            child.current_dir(dir);
        }
        match &command.stdin {
            Some(path) => {
                let file = std::fs::File::open(path)?;
                child.stdin(Stdio::from(file));
            }
            None => {
                child.stdin(Stdio::null());
            }
        }

        let child = child
            .spawn()
            .map_err(|e| TrackError::external(&tool, format!("cannot start: {}", e)))?;

        let output = match command.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| TrackError::Timeout {
                    tool: tool.clone(),
                    seconds: limit.as_secs(),
                })??,
            None => child.wait_with_output().await?,
        };

        command.check(CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

pub type CommandHandler = Box<dyn Fn(&ExternalCommand) -> Result<CommandOutput> + Send + Sync>;

/// Records every command and answers with a pluggable handler instead of
/// spawning processes.
pub struct RecordingRunner {
    calls: Mutex<Vec<ExternalCommand>>,
    handler: CommandHandler,
}

impl RecordingRunner {
    /// Runner where every command succeeds with empty output
    pub fn new() -> Self {
        Self::with_handler(|_| Ok(CommandOutput::success("")))
    }

    pub fn with_handler<F>(handler: F) -> Self
    where
        F: Fn(&ExternalCommand) -> Result<CommandOutput> + Send + Sync + 'static,
    {
        Self {
            calls: Mutex::new(Vec::new()),
            handler: Box::new(handler),
        }
    }

    /// Commands seen so far, in call order
    pub fn calls(&self) -> Vec<ExternalCommand> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Calls whose tool name matches `tool`
    pub fn calls_to(&self, tool: &str) -> Vec<ExternalCommand> {
        self.calls()
            .into_iter()
            .filter(|c| c.tool_name() == tool)
            .collect()
    }
}

impl Default for RecordingRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, command: &ExternalCommand) -> Result<CommandOutput> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(command.clone());
        let output = (self.handler)(command)?;
        command.check(output)
    }
}

/// Builds the concrete invocations of every external tool against one
/// TRACK installation.
pub struct Toolchain<'a> {
    runner: &'a dyn CommandRunner,
    config: &'a TrackConfig,
    install: TrackInstall,
}

impl<'a> Toolchain<'a> {
    /// Fails with a precondition error when the installation is missing.
    pub fn new(runner: &'a dyn CommandRunner, config: &'a TrackConfig) -> Result<Self> {
        Ok(Self::with_install(runner, config, config.install()?))
    }

    pub fn with_install(
        runner: &'a dyn CommandRunner,
        config: &'a TrackConfig,
        install: TrackInstall,
    ) -> Self {
        Self {
            runner,
            config,
            install,
        }
    }

    pub fn config(&self) -> &TrackConfig {
        self.config
    }

    pub fn install(&self) -> &TrackInstall {
        &self.install
    }

    pub async fn run(&self, command: ExternalCommand) -> Result<CommandOutput> {
        debug!("$ {}", command.display());
        self.runner.run(&command).await
    }

    fn tool(&self, program: &str) -> ExternalCommand {
        ExternalCommand::new(program)
            .current_dir(self.install.home())
            .timeout(self.config.tool_timeout())
    }

    /// `cdo griddes <file>`
    pub fn cdo_griddes(&self, input: &Path) -> ExternalCommand {
        self.tool(&self.config.cdo).arg("griddes").path_arg(input)
    }

    /// `cdo -s showyear <file>`
    pub fn cdo_showyear(&self, input: &Path) -> ExternalCommand {
        self.tool(&self.config.cdo)
            .args(["-s", "showyear"])
            .path_arg(input)
    }

    /// `cdo -O selyear,<year> <in> <out>`
    pub fn cdo_selyear(&self, year: i32, input: &Path, output: &Path) -> ExternalCommand {
        self.tool(&self.config.cdo)
            .arg("-O")
            .arg(format!("selyear,{}", year))
            .path_arg(input)
            .path_arg(output)
    }

    /// `cdo --no_history -O remapcon,<grid> <in> <out>`
    pub fn cdo_remapcon(&self, grid: &str, input: &Path, output: &Path) -> ExternalCommand {
        self.tool(&self.config.cdo)
            .args(["--no_history", "-O"])
            .arg(format!("remapcon,{}", grid))
            .path_arg(input)
            .path_arg(output)
    }

    /// `cdo -O merge <u> <v> <out>`
    pub fn cdo_merge(&self, u_file: &Path, v_file: &Path, output: &Path) -> ExternalCommand {
        self.tool(&self.config.cdo)
            .args(["-O", "merge"])
            .path_arg(u_file)
            .path_arg(v_file)
            .path_arg(output)
    }

    /// `ncks -h -C -O -x -v <vars> <in> <out>`
    pub fn ncks_exclude(&self, variables: &[&str], input: &Path, output: &Path) -> ExternalCommand {
        self.tool(&self.config.ncks)
            .args(["-h", "-C", "-O", "-x", "-v"])
            .arg(variables.join(","))
            .path_arg(input)
            .path_arg(output)
    }

    /// `ncatted -h -O -a _FillValue,,d,, -a missing_value,,d,, <in> <out>`
    ///
    /// `-h` here and in `ncks`, `--no_history` in CDO keep the global
    /// `history` attribute unchanged, so a re-run writes the same bytes.
    pub fn ncatted_strip_fill(&self, input: &Path, output: &Path) -> ExternalCommand {
        self.tool(&self.config.ncatted)
            .args(["-h", "-O", "-a", "_FillValue,,d,,", "-a", "missing_value,,d,,"])
            .path_arg(input)
            .path_arg(output)
    }

    /// `bin/track.linux -i <input> -f y<year> < <control>`, run from TRACK home.
    /// `input` is relative to `indat/`.
    pub fn track(&self, input: &str, year: i32, control: &Path) -> ExternalCommand {
        let binary = self.install.home().join(&self.config.track_binary);
        ExternalCommand::new(binary.display().to_string())
            .args(["-i", input, "-f"])
            .arg(format!("y{}", year))
            .stdin_file(control)
            .current_dir(self.install.home())
            .envs(self.config.track_env())
            .timeout(self.config.track_timeout())
    }

    /// Bare `master` invocation with TRACK's cwd, environment and time limit.
    pub fn master(&self) -> ExternalCommand {
        let local = self.install.home().join(&self.config.master_binary);
        let program = if local.is_file() {
            local.display().to_string()
        } else {
            self.config.master_binary.clone()
        };
        ExternalCommand::new(program)
            .current_dir(self.install.home())
            .envs(self.config.track_env())
            .timeout(self.config.track_timeout())
    }

    /// `tr2nc <ascii> s ../TR2NC/<meta>`, run from `utils/bin`.
    pub fn tr2nc(&self, ascii: &Path, meta: &str) -> ExternalCommand {
        let dir = self.install.home().join(&self.config.tr2nc_dir);
        ExternalCommand::new(dir.join(&self.config.tr2nc_binary).display().to_string())
            .path_arg(ascii)
            .arg("s")
            .arg(format!("../TR2NC/{}", meta))
            .current_dir(dir)
            .timeout(self.config.tool_timeout())
    }
}
