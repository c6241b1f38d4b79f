//! Hot-loading a compiled module into a running node
//!
//! A hidden helper node connects to the target, purges the old code and
//! loads the new binary over `rpc:call/5`. Every remote call carries an
//! explicit timeout and the helper itself is killed if it overruns.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::config::Settings;
use crate::process::{CommandSpec, ProcessRunner, SystemRunner};
use crate::term::{self, Term};

/// Distribution naming mode of the helper node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamingMode {
    /// `-sname`
    Short,
    /// `-name`
    Long,
}

impl NamingMode {
    fn flag(self) -> &'static str {
        match self {
            NamingMode::Short => "-sname",
            NamingMode::Long => "-name",
        }
    }
}

impl FromStr for NamingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "shortnames" | "sname" | "short" => Ok(NamingMode::Short),
            "longnames" | "name" | "long" => Ok(NamingMode::Long),
            other => Err(format!(
                "unknown naming mode '{other}', expected shortnames or longnames"
            )),
        }
    }
}

/// The node to load into and how to reach it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTarget {
    pub naming: NamingMode,
    /// Name for the helper node
    pub local_node: String,
    pub remote_node: String,
    pub cookie: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReloadError {
    #[error("No object code for module {module} at {}", path.display())]
    MissingObjectCode { module: String, path: PathBuf },

    #[error("Could not reach {node}: {reason}")]
    Transport { node: String, reason: String },

    #[error("{node} refused to load {module}: {reason}")]
    Remote {
        node: String,
        module: String,
        reason: String,
    },
}

/// Loads a module's fresh object code into a remote node.
pub trait Reloader {
    fn reload(&self, target: &RemoteTarget, module: &str, beam: &Path) -> Result<(), ReloadError>;
}

impl<T: Reloader + ?Sized> Reloader for &T {
    fn reload(&self, target: &RemoteTarget, module: &str, beam: &Path) -> Result<(), ReloadError> {
        (**self).reload(target, module, beam)
    }
}

/// [`Reloader`] that drives a hidden `erl` node.
#[derive(Debug, Clone)]
pub struct ErlReloader<R = SystemRunner> {
    runner: R,
    erl: PathBuf,
    rpc_timeout: Duration,
}

impl ErlReloader<SystemRunner> {
    pub fn new(settings: &Settings) -> Self {
        Self::with_runner(SystemRunner, settings)
    }
}

impl<R: ProcessRunner> ErlReloader<R> {
    pub fn with_runner(runner: R, settings: &Settings) -> Self {
        Self {
            runner,
            erl: settings.erl.clone(),
            rpc_timeout: settings.rpc_timeout(),
        }
    }

    /// Long enough for node startup plus both remote calls.
    fn deadline(&self) -> Duration {
        self.rpc_timeout * 2 + Duration::from_secs(10)
    }

    fn command(&self, target: &RemoteTarget, module: &str, beam: &Path) -> CommandSpec {
        let remote = Term::atom(target.remote_node.as_str());
        let set_cookie = target
            .cookie
            .as_ref()
            .map(|cookie| format!("erlang:set_cookie({remote}, {}), ", Term::atom(cookie.as_str())))
            .unwrap_or_default();

        let expr = format!(
            "Remote = {remote}, Module = {module}, File = {file}, Timeout = {timeout}, \
             {set_cookie}\
             Result = case file:read_file(File) of \
                 {{error, Reason}} -> {{missing, Reason}}; \
                 {{ok, Bin}} -> \
                     case rpc:call(Remote, code, purge, [Module], Timeout) of \
                         {{badrpc, Reason}} -> {{transport, Reason}}; \
                         _ -> \
                             case rpc:call(Remote, code, load_binary, [Module, File, Bin], Timeout) of \
                                 {{module, Module}} -> ok; \
                                 {{badrpc, Reason}} -> {{transport, Reason}}; \
                                 {{error, Reason}} -> {{remote, Reason}} \
                             end \
                     end \
             end, \
             io:format(\"~p.~n\", [Result]), \
             halt(0).",
            module = Term::atom(module),
            file = Term::string(beam.to_string_lossy()),
            timeout = self.rpc_timeout.as_millis(),
        );

        CommandSpec::new(&self.erl)
            .args(["-noshell", "-hidden", target.naming.flag(), target.local_node.as_str()])
            .arg("-eval")
            .arg(expr)
    }
}

impl<R: ProcessRunner> Reloader for ErlReloader<R> {
    fn reload(&self, target: &RemoteTarget, module: &str, beam: &Path) -> Result<(), ReloadError> {
        let transport = |reason: String| ReloadError::Transport {
            node: target.remote_node.clone(),
            reason,
        };

        let spec = self.command(target, module, beam);
        let output = self
            .runner
            .run(&spec, Some(self.deadline()))
            .map_err(|e| transport(e.to_string()))?;
        if output.timed_out {
            return Err(transport(format!(
                "helper node did not finish within {}s",
                self.deadline().as_secs()
            )));
        }
        if !output.success() {
            return Err(transport(format!(
                "helper node exited with {:?}: {}",
                output.code,
                output.combined().trim()
            )));
        }

        let result = term::parse_term(&output.stdout)
            .map_err(|e| transport(format!("unreadable helper output: {e}")))?;
        if result.as_atom() == Some("ok") {
            return Ok(());
        }
        match result.as_tuple() {
            Some([tag, reason]) => {
                let reason = reason.to_string();
                match tag.as_atom() {
                    Some("missing") => Err(ReloadError::MissingObjectCode {
                        module: module.to_string(),
                        path: beam.to_path_buf(),
                    }),
                    Some("remote") => Err(ReloadError::Remote {
                        node: target.remote_node.clone(),
                        module: module.to_string(),
                        reason,
                    }),
                    _ => Err(transport(reason)),
                }
            }
            _ => Err(transport(format!("unexpected helper output {result}"))),
        }
    }
}

impl fmt::Display for RemoteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (via {})", self.remote_node, self.local_node)
    }
}
