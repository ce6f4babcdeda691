//! Foreground plugin execution.
//!
//! The resolved plugin runs as a child process that shares the host's
//! stdin, stdout and stderr. The host waits for it, forwarding termination
//! signals it receives in the meantime, and then reproduces the child's exit
//! status as its own.

use std::ffi::OsString;
use std::process::{ExitStatus, Stdio};

use tokio::process::{Child, Command};
use tracing::{debug, info};

use crate::config::{Config, CONFIG_DIR_ENV};
use crate::error::{Result, ZeptoctlError};

use super::types::Plugin;
use super::{ENV_HOST_VERSION, ENV_ORIGINAL_CLI_COMMAND};

/// Interrupts after which a still-running plugin is killed outright.
#[cfg(unix)]
const FORCE_KILL_AFTER_INTERRUPTS: u32 = 3;

/// How a plugin process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginExit {
    /// Normal exit with a status code.
    Code(i32),
    /// Terminated by a signal (unix only).
    Signaled(i32),
}

impl PluginExit {
    pub fn from_status(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return PluginExit::Code(code);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return PluginExit::Signaled(signal);
            }
        }
        PluginExit::Code(1)
    }

    /// Shell-style status code (`128 + signal` for signals).
    pub fn code(&self) -> i32 {
        match *self {
            PluginExit::Code(code) => code,
            PluginExit::Signaled(signal) => 128 + signal,
        }
    }

    pub fn success(&self) -> bool {
        *self == PluginExit::Code(0)
    }
}

/// Runs plugins with the host's environment plus the protocol variables.
#[derive(Debug, Clone)]
pub struct Invoker {
    env: Vec<(String, OsString)>,
}

impl Invoker {
    /// Invoker for a host running with `config`.
    pub fn new(config: &Config) -> Self {
        let original = std::env::current_exe()
            .map(OsString::from)
            .ok()
            .or_else(|| std::env::args_os().next())
            .unwrap_or_else(|| OsString::from("zeptoctl"));

        Self {
            env: vec![
                (ENV_ORIGINAL_CLI_COMMAND.to_string(), original),
                (
                    ENV_HOST_VERSION.to_string(),
                    OsString::from(env!("CARGO_PKG_VERSION")),
                ),
                (CONFIG_DIR_ENV.to_string(), config.dir.clone().into_os_string()),
            ],
        }
    }

    /// Add or replace a variable passed to the plugin.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<OsString>) -> Self {
        let key = key.into();
        self.env.retain(|(k, _)| *k != key);
        self.env.push((key, value.into()));
        self
    }

    /// Variables set on top of the inherited environment.
    pub fn extra_env(&self) -> &[(String, OsString)] {
        &self.env
    }

    /// Run `plugin` with `args` (the arguments after the plugin name) and
    /// wait for it to finish.
    ///
    /// The child sees `argv = [<plugin name>, args...]`. Its exit status is
    /// returned, never turned into an error; only a failure to start it is.
    pub async fn run(&self, plugin: &Plugin, args: &[OsString]) -> Result<PluginExit> {
        let mut command = Command::new(&plugin.path);
        command
            .arg(&plugin.name)
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .envs(self.env.iter().map(|(k, v)| (k, v)));

        #[cfg(unix)]
        let mut forwarder = SignalForwarder::install()?;

        let mut child = command.spawn().map_err(|source| ZeptoctlError::Exec {
            path: plugin.path.clone(),
            source,
        })?;

        info!(
            plugin = %plugin.name,
            path = %plugin.path.display(),
            pid = child.id().unwrap_or_default(),
            "Running plugin"
        );

        #[cfg(unix)]
        let status = forwarder.wait(&mut child).await?;
        #[cfg(not(unix))]
        let status = wait_ignoring_ctrl_c(&mut child).await?;

        let exit = PluginExit::from_status(status);
        debug!(plugin = %plugin.name, ?exit, "Plugin finished");
        Ok(exit)
    }
}

/// Listens for termination signals sent to the host while a plugin runs.
///
/// SIGTERM and SIGHUP are re-sent to the plugin. SIGINT and SIGQUIT are
/// only counted; the third SIGINT kills the plugin.
#[cfg(unix)]
struct SignalForwarder {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
    hangup: tokio::signal::unix::Signal,
    quit: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl SignalForwarder {
    fn install() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};
        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
            hangup: signal(SignalKind::hangup())?,
            quit: signal(SignalKind::quit())?,
        })
    }

    async fn wait(&mut self, child: &mut Child) -> std::io::Result<ExitStatus> {
        use nix::sys::signal::Signal;
        use nix::unistd::Pid;

        let Some(pid) = child.id() else {
            return child.wait().await;
        };
        let pid = Pid::from_raw(pid as i32);
        let mut interrupts = 0u32;

        loop {
            let signal = tokio::select! {
                status = child.wait() => return status,
                Some(()) = self.interrupt.recv() => Signal::SIGINT,
                Some(()) = self.terminate.recv() => Signal::SIGTERM,
                Some(()) = self.hangup.recv() => Signal::SIGHUP,
                Some(()) = self.quit.recv() => Signal::SIGQUIT,
            };

            if signal == Signal::SIGINT {
                interrupts += 1;
            }
            match forward_action(signal, interrupts) {
                Forward::Send(signal) => send_signal(pid, signal),
                Forward::Kill => {
                    tracing::warn!(
                        pid = pid.as_raw(),
                        interrupts,
                        "Plugin ignored repeated interrupts, killing it"
                    );
                    send_signal(pid, Signal::SIGKILL);
                }
                Forward::Skip => {
                    debug!(pid = pid.as_raw(), ?signal, interrupts, "Plugin got signal from process group")
                }
            }
        }
    }
}

/// What the host does with a signal it received while a plugin runs.
#[cfg(unix)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Forward {
    Send(nix::sys::signal::Signal),
    Kill,
    Skip,
}

/// Terminal-generated signals reach the plugin directly, since it shares
/// the host's process group; only the others are re-sent. `interrupts`
/// counts the SIGINTs received so far, including this one.
#[cfg(unix)]
fn forward_action(signal: nix::sys::signal::Signal, interrupts: u32) -> Forward {
    use nix::sys::signal::Signal;

    match signal {
        Signal::SIGINT if interrupts >= FORCE_KILL_AFTER_INTERRUPTS => Forward::Kill,
        Signal::SIGINT | Signal::SIGQUIT => Forward::Skip,
        other => Forward::Send(other),
    }
}

#[cfg(unix)]
fn send_signal(pid: nix::unistd::Pid, signal: nix::sys::signal::Signal) {
    match nix::sys::signal::kill(pid, signal) {
        Ok(()) => debug!(pid = pid.as_raw(), ?signal, "Forwarded signal to plugin"),
        // Already exited; the wait branch picks it up next.
        Err(nix::errno::Errno::ESRCH) => {}
        Err(e) => tracing::warn!(pid = pid.as_raw(), ?signal, error = %e, "Failed to forward signal"),
    }
}

#[cfg(not(unix))]
async fn wait_ignoring_ctrl_c(child: &mut Child) -> std::io::Result<ExitStatus> {
    // The console delivers Ctrl-C to the plugin directly; the host only
    // has to stay alive until the plugin is done.
    loop {
        tokio::select! {
            status = child.wait() => return status,
            _ = tokio::signal::ctrl_c() => continue,
        }
    }
}

/// Terminate the host the way the plugin terminated.
///
/// Exits with the plugin's code, or re-raises the plugin's terminating
/// signal with its default disposition so the parent shell observes the same
/// signal. Falls back to exiting with `128 + signal`.
pub fn exit_with(exit: PluginExit) -> ! {
    match exit {
        PluginExit::Code(code) => std::process::exit(code),
        PluginExit::Signaled(signal) => {
            #[cfg(unix)]
            reraise(signal);
            std::process::exit(exit.code())
        }
    }
}

#[cfg(unix)]
fn reraise(signo: i32) {
    use nix::sys::signal::{self, SigHandler, Signal};

    let Ok(sig) = Signal::try_from(signo) else {
        return;
    };
    // SIGKILL and SIGSTOP cannot be caught, so their disposition is already
    // the default and `signal` would fail with EINVAL.
    if !matches!(sig, Signal::SIGKILL | Signal::SIGSTOP) {
        // SAFETY: installs the default disposition, no Rust handler is involved.
        if let Err(e) = unsafe { signal::signal(sig, SigHandler::SigDfl) } {
            debug!(signal = ?sig, error = %e, "Failed to restore default signal disposition");
            return;
        }
    }
    if let Err(e) = signal::raise(sig) {
        debug!(signal = ?sig, error = %e, "Failed to re-raise plugin signal");
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::plugins::testutil::write_plugin;
    use crate::plugins::types::Metadata;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn plugin_at(path: PathBuf, name: &str) -> Plugin {
        Plugin {
            name: name.to_string(),
            path,
            metadata: Metadata {
                schema_version: "0.1.0".into(),
                ..Default::default()
            },
            shadowed_paths: Vec::new(),
        }
    }

    fn script_plugin(dir: &Path, name: &str, body: &str) -> Plugin {
        let path = write_plugin(dir, name, r#"{"SchemaVersion":"0.1.0"}"#, body);
        plugin_at(path, name)
    }

    #[test]
    fn test_plugin_exit_codes() {
        assert!(PluginExit::Code(0).success());
        assert!(!PluginExit::Code(2).success());
        assert_eq!(PluginExit::Code(7).code(), 7);
        assert_eq!(PluginExit::Signaled(15).code(), 143);
        assert!(!PluginExit::Signaled(2).success());
    }

    #[test]
    fn test_invoker_env_replaces_existing_key() {
        let config = Config::with_dir("/cfg");
        let invoker = Invoker::new(&config).env(CONFIG_DIR_ENV, "/other");

        let values: Vec<&OsString> = invoker
            .extra_env()
            .iter()
            .filter(|(k, _)| k == CONFIG_DIR_ENV)
            .map(|(_, v)| v)
            .collect();
        assert_eq!(values, vec![&OsString::from("/other")]);
        assert!(invoker
            .extra_env()
            .iter()
            .any(|(k, _)| k == ENV_ORIGINAL_CLI_COMMAND));
    }

    #[test]
    fn test_forward_action() {
        use nix::sys::signal::Signal;

        assert_eq!(forward_action(Signal::SIGTERM, 0), Forward::Send(Signal::SIGTERM));
        assert_eq!(forward_action(Signal::SIGHUP, 2), Forward::Send(Signal::SIGHUP));
        assert_eq!(forward_action(Signal::SIGQUIT, 0), Forward::Skip);
        assert_eq!(forward_action(Signal::SIGINT, 1), Forward::Skip);
        assert_eq!(forward_action(Signal::SIGINT, 2), Forward::Skip);
        assert_eq!(forward_action(Signal::SIGINT, 3), Forward::Kill);
        assert_eq!(forward_action(Signal::SIGINT, 4), Forward::Kill);
    }

    #[tokio::test]
    async fn test_run_mirrors_exit_code() {
        let tmp = TempDir::new().unwrap();
        let plugin = script_plugin(tmp.path(), "three", "exit 3");

        let exit = Invoker::new(&Config::with_dir(tmp.path()))
            .run(&plugin, &[])
            .await
            .unwrap();
        assert_eq!(exit, PluginExit::Code(3));
    }

    #[tokio::test]
    async fn test_run_reports_signal_termination() {
        let tmp = TempDir::new().unwrap();
        let plugin = script_plugin(tmp.path(), "suicide", "kill -KILL $$");

        let exit = Invoker::new(&Config::with_dir(tmp.path()))
            .run(&plugin, &[])
            .await
            .unwrap();
        assert_eq!(exit, PluginExit::Signaled(9));
        assert_eq!(exit.code(), 137);
    }

    #[tokio::test]
    async fn test_run_passes_arguments_verbatim() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("args.txt");
        let plugin = script_plugin(tmp.path(), "echoargs", "printf '%s\\n' \"$@\" > \"$ARGS_OUT\"");

        let args: Vec<OsString> = ["build", "a b", "", "--flag=x"]
            .iter()
            .map(OsString::from)
            .collect();
        let exit = Invoker::new(&Config::with_dir(tmp.path()))
            .env("ARGS_OUT", out.as_os_str())
            .run(&plugin, &args)
            .await
            .unwrap();
        assert!(exit.success());

        let recorded = std::fs::read_to_string(&out).unwrap();
        assert_eq!(recorded, "echoargs\nbuild\na b\n\n--flag=x\n");
    }

    #[tokio::test]
    async fn test_run_sets_protocol_environment() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("env.txt");
        let plugin = script_plugin(
            tmp.path(),
            "envdump",
            &format!(
                "printf '%s\\n' \"${}\" \"${}\" \"${}\" > \"$ENV_OUT\"",
                ENV_HOST_VERSION, CONFIG_DIR_ENV, ENV_ORIGINAL_CLI_COMMAND
            ),
        );

        let config_dir = tmp.path().join("cfg");
        Invoker::new(&Config::with_dir(&config_dir))
            .env("ENV_OUT", out.as_os_str())
            .run(&plugin, &[])
            .await
            .unwrap();

        let recorded = std::fs::read_to_string(&out).unwrap();
        let lines: Vec<&str> = recorded.lines().collect();
        assert_eq!(lines[0], env!("CARGO_PKG_VERSION"));
        assert_eq!(lines[1], config_dir.display().to_string());
        assert!(!lines[2].is_empty());
    }

    #[tokio::test]
    async fn test_run_missing_binary_is_exec_error() {
        let tmp = TempDir::new().unwrap();
        let plugin = plugin_at(tmp.path().join("zeptoctl-gone"), "gone");

        let err = Invoker::new(&Config::with_dir(tmp.path()))
            .run(&plugin, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ZeptoctlError::Exec { .. }));
    }
}
