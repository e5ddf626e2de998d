//! Helper process lifecycle: command resolution, port negotiation, spawn

use std::ffi::OsString;
use std::fmt;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;

use tracing::{debug, error, info, warn};

use crate::config::PreviewConfig;
use crate::constants::{
    BUNDLED_INTERPRETER, HELPER_HOST, HELPER_PORT_ENV, HELPER_SCRIPT, PACKAGED_EXECUTABLE,
    SYSTEM_INTERPRETERS,
};
use crate::error::{PreviewError, PreviewResult};
use crate::helper::port::negotiate_port;

/// Supervisor states; a failed start falls back to `Stopped`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelperState {
    Stopped,
    Starting,
    Running,
}

/// Which kind of helper installation was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    BundledInterpreter,
    PackagedExecutable,
    SystemInterpreter,
}

/// A runnable helper command, without the port arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelperCommand {
    pub kind: CommandKind,
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl fmt::Display for HelperCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Resolve the helper command under `root` using the process `PATH`
pub fn resolve_command(root: &Path) -> PreviewResult<HelperCommand> {
    resolve_command_with_path(root, std::env::var_os("PATH"))
}

/// Resolve the helper command: bundled interpreter plus script, then the
/// packaged executable, then a system interpreter found on `search_path`
/// plus script.
pub fn resolve_command_with_path(
    root: &Path,
    search_path: Option<OsString>,
) -> PreviewResult<HelperCommand> {
    let script = root.join(HELPER_SCRIPT);
    let bundled = root.join(BUNDLED_INTERPRETER);
    if bundled.is_file() && script.is_file() {
        return Ok(HelperCommand {
            kind: CommandKind::BundledInterpreter,
            program: bundled,
            args: vec![script.into_os_string()],
        });
    }

    let packaged = root.join(PACKAGED_EXECUTABLE);
    if packaged.is_file() {
        return Ok(HelperCommand {
            kind: CommandKind::PackagedExecutable,
            program: packaged,
            args: Vec::new(),
        });
    }

    if script.is_file() {
        if let Some(interpreter) = search_path.as_ref().and_then(|p| find_interpreter(p)) {
            return Ok(HelperCommand {
                kind: CommandKind::SystemInterpreter,
                program: interpreter,
                args: vec![script.into_os_string()],
            });
        }
    }

    Err(PreviewError::HelperCommandNotFound {
        root: root.display().to_string(),
    })
}

fn find_interpreter(search_path: &OsString) -> Option<PathBuf> {
    std::env::split_paths(search_path).find_map(|dir| {
        SYSTEM_INTERPRETERS
            .iter()
            .map(|name| dir.join(name))
            .find(|candidate| candidate.is_file())
    })
}

/// Starts, watches and stops the helper process.
///
/// `Running` means the spawn succeeded, not that the helper answers; the
/// client polls readiness separately.
pub struct HelperProcessSupervisor {
    config: PreviewConfig,
    state: HelperState,
    child: Option<Child>,
    port: Option<u16>,
    root: Option<PathBuf>,
    restarts: u32,
}

impl HelperProcessSupervisor {
    pub fn new(config: PreviewConfig) -> Self {
        Self {
            config,
            state: HelperState::Stopped,
            child: None,
            port: None,
            root: None,
            restarts: 0,
        }
    }

    pub fn state(&self) -> HelperState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == HelperState::Running
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// `http://127.0.0.1:<port>` while running
    pub fn base_url(&self) -> Option<String> {
        self.port
            .filter(|_| self.is_running())
            .map(|port| format!("http://{}:{}", HELPER_HOST, port))
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn restarts(&self) -> u32 {
        self.restarts
    }

    /// Start the helper; `true` when it is running afterwards.
    ///
    /// Idempotent while running. Failures are logged and leave the
    /// supervisor `Stopped` so the caller may retry.
    pub fn start(&mut self, root_hint: Option<&Path>) -> bool {
        if self.is_running() {
            return true;
        }

        self.state = HelperState::Starting;
        match self.try_start(root_hint) {
            Ok(port) => {
                self.state = HelperState::Running;
                self.port = Some(port);
                info!("Font helper running on port {}", port);
                true
            }
            Err(e) => {
                warn!("Font helper not started: {}", e);
                self.state = HelperState::Stopped;
                self.port = None;
                false
            }
        }
    }

    fn try_start(&mut self, root_hint: Option<&Path>) -> PreviewResult<u16> {
        let root = root_hint
            .map(Path::to_path_buf)
            .or_else(|| self.config.helper_root.clone())
            .or_else(|| self.root.clone())
            .ok_or(PreviewError::HelperRootUnresolved)?;
        debug!("Using helper root {}", root.display());

        let command = resolve_command(&root)?;
        let port = negotiate_port(self.config.default_port, self.config.port_scan_span)?;
        info!("Launching font helper: {} --port {}", command, port);

        let child = spawn_detached(&command, &root, port)?;
        self.child = Some(child);
        self.root = Some(root);
        Ok(port)
    }

    /// Whether a spawned child has already exited
    pub fn has_exited(&mut self) -> bool {
        match self.child.as_mut().map(Child::try_wait) {
            Some(Ok(Some(status))) => {
                warn!("Font helper exited with {}", status);
                true
            }
            Some(Ok(None)) => false,
            Some(Err(e)) => {
                warn!("Cannot query font helper status: {}", e);
                false
            }
            None => false,
        }
    }

    /// Restart the helper if the restart budget allows it
    pub fn restart(&mut self) -> bool {
        if self.restarts >= self.config.max_restarts {
            warn!("Font helper restart budget of {} exhausted", self.config.max_restarts);
            return false;
        }
        self.restarts += 1;
        info!("Restarting font helper (attempt {})", self.restarts);
        let root = self.root.clone();
        self.stop();
        self.start(root.as_deref())
    }

    /// Best-effort terminate; always ends `Stopped` with no port
    pub fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill() {
                debug!("Font helper kill failed: {}", e);
            }
            // Reap off-thread so shutdown never waits on the child
            thread::spawn(move || {
                let _ = child.wait();
            });
            info!("Font helper stopped");
        }
        self.state = HelperState::Stopped;
        self.port = None;
    }
}

impl fmt::Debug for HelperProcessSupervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HelperProcessSupervisor")
            .field("state", &self.state)
            .field("port", &self.port)
            .field("root", &self.root)
            .field("restarts", &self.restarts)
            .finish()
    }
}

fn spawn_detached(command: &HelperCommand, root: &Path, port: u16) -> PreviewResult<Child> {
    let mut cmd = Command::new(&command.program);
    cmd.args(&command.args)
        .arg("--port")
        .arg(port.to_string())
        .env(HELPER_PORT_ENV, port.to_string())
        .current_dir(root)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
        const CREATE_NO_WINDOW: u32 = 0x0800_0000;
        cmd.creation_flags(CREATE_NEW_PROCESS_GROUP | CREATE_NO_WINDOW);
    }

    let mut child = cmd.spawn().map_err(|e| {
        error!("Failed to spawn font helper: {}", e);
        PreviewError::ProcessSpawnFailed {
            program: command.program.display().to_string(),
            message: e.to_string(),
        }
    })?;

    if let Some(stdout) = child.stdout.take() {
        drain_output(stdout, "stdout");
    }
    if let Some(stderr) = child.stderr.take() {
        drain_output(stderr, "stderr");
    }
    Ok(child)
}

/// Forward helper output to the log; never parsed
fn drain_output<R: Read + Send + 'static>(stream: R, name: &'static str) {
    let spawned = thread::Builder::new()
        .name(format!("font-helper-{}", name))
        .spawn(move || {
            for line in BufReader::new(stream).lines() {
                match line {
                    Ok(line) if name == "stderr" => warn!(target: "font_server", "{}", line),
                    Ok(line) => debug!(target: "font_server", "{}", line),
                    Err(_) => break,
                }
            }
        });
    if let Err(e) = spawned {
        warn!("Cannot drain helper {}: {}", name, e);
    }
}
