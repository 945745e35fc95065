//! Shell command execution with `{VARIABLE}` templates and timeouts

use indexmap::IndexMap;
use regex::Regex;
use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::LazyLock;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

static VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z_]+)\}").expect("valid regex"));
static SAFE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w/@%=:.,+-]*$").expect("valid regex"));

const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown variable {{{name}}} in command \"{template}\"")]
    UnknownVariable { name: String, template: String },

    #[error("failed to execute `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` timed out after {}s", .timeout.as_secs_f64())]
    Timeout { command: String, timeout: Duration },

    #[error("`{command}` failed ({status}){}", fmt_stderr(.stderr))]
    Failed {
        command: String,
        status: ExitStatus,
        stderr: String,
    },
}

fn fmt_stderr(stderr: &str) -> String {
    if stderr.trim().is_empty() {
        String::new()
    } else {
        format!(": {}", stderr.trim())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Template variable values, keyed by upper-case name
pub type Variables = IndexMap<String, String>;

/// A command line run through `/bin/sh -c`
#[derive(Debug, Clone)]
pub struct ShellOut {
    pub command: String,
    pub timeout: Option<Duration>,
}

impl ShellOut {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            timeout: None,
        }
    }

    /// Expand `{VAR}` placeholders in `template`, shell-escaping each value
    pub fn from_template(template: &str, vars: &Variables) -> Result<Self> {
        let mut out = String::with_capacity(template.len());
        let mut last = 0;
        for caps in VAR_RE.captures_iter(template) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let key = name.as_str().to_ascii_uppercase();
            let value = vars.get(&key).ok_or_else(|| Error::UnknownVariable {
                name: key.clone(),
                template: template.to_string(),
            })?;
            out.push_str(&template[last..whole.start()]);
            out.push_str(&escape_var_value(value));
            last = whole.end();
        }
        out.push_str(&template[last..]);
        Ok(Self::new(out))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Run and return stdout. A nonzero exit is an error carrying stderr.
    pub fn run_capture(&self) -> Result<String> {
        log::debug!("running: {}", self.command);
        let mut child = self.spawn(Stdio::piped())?;

        let stdout = child.stdout.take().map(|pipe| thread::spawn(move || drain(pipe)));
        let stderr = child.stderr.take().map(|pipe| thread::spawn(move || drain(pipe)));

        let status = self.wait(&mut child)?;
        let stdout = stdout.and_then(|h| h.join().ok()).unwrap_or_default();
        let stderr = stderr.and_then(|h| h.join().ok()).unwrap_or_default();

        if status.success() {
            Ok(stdout)
        } else {
            Err(Error::Failed {
                command: self.command.clone(),
                status,
                stderr,
            })
        }
    }

    /// Run with stdout inherited from this process
    pub fn run(&self) -> Result<()> {
        log::debug!("running: {}", self.command);
        let mut child = self.spawn(Stdio::inherit())?;
        let stderr = child.stderr.take().map(|pipe| thread::spawn(move || drain(pipe)));
        let status = self.wait(&mut child)?;
        let stderr = stderr.and_then(|h| h.join().ok()).unwrap_or_default();
        if status.success() {
            Ok(())
        } else {
            Err(Error::Failed {
                command: self.command.clone(),
                status,
                stderr,
            })
        }
    }

    fn spawn(&self, stdout: Stdio) -> Result<Child> {
        Command::new("/bin/sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| Error::Spawn {
                command: self.command.clone(),
                source,
            })
    }

    fn wait(&self, child: &mut Child) -> Result<ExitStatus> {
        let io_err = |source| Error::Spawn {
            command: self.command.clone(),
            source,
        };
        let Some(timeout) = self.timeout else {
            return child.wait().map_err(io_err);
        };

        let deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = child.try_wait().map_err(io_err)? {
                return Ok(status);
            }
            if Instant::now() >= deadline {
                // Already-exited races are harmless here
                let _ = child.kill();
                let _ = child.wait();
                return Err(Error::Timeout {
                    command: self.command.clone(),
                    timeout,
                });
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

fn drain(mut pipe: impl Read) -> String {
    let mut buf = Vec::new();
    let _ = pipe.read_to_end(&mut buf);
    String::from_utf8_lossy(&buf).into_owned()
}

/// Quote a value for safe interpolation into a `/bin/sh` command line.
///
/// Values made only of word characters and `/@%=:.,+-` pass through;
/// anything else is single-quoted.
pub fn escape_var_value(value: &str) -> String {
    if SAFE_RE.is_match(value) {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r#"'"'"'"#))
    }
}

/// Expand `template` with `vars` and return the command's stdout
pub fn run_templated_command(
    template: &str,
    vars: &Variables,
    timeout: Option<Duration>,
) -> Result<String> {
    let mut shell = ShellOut::from_template(template, vars)?;
    shell.timeout = timeout;
    shell.run_capture()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Variables {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_escape_var_value() {
        assert_eq!(escape_var_value("db-1.example.com:3306"), "db-1.example.com:3306");
        assert_eq!(escape_var_value("a,b/c@d%e=f+g"), "a,b/c@d%e=f+g");
        assert_eq!(escape_var_value(""), "");
        assert_eq!(escape_var_value("two words"), "'two words'");
        assert_eq!(escape_var_value("it's"), r#"'it'"'"'s'"#);
        assert_eq!(escape_var_value("$(rm -rf /)"), "'$(rm -rf /)'");
    }

    #[test]
    fn test_from_template() {
        let shell = ShellOut::from_template(
            "lookup --env {ENVIRONMENT} --dir {dirname} {HOST}",
            &vars(&[("ENVIRONMENT", "prod"), ("DIRNAME", "my dir"), ("HOST", "h")]),
        )
        .unwrap();
        assert_eq!(shell.command, "lookup --env prod --dir 'my dir' h");
    }

    #[test]
    fn test_unknown_variable() {
        let err = ShellOut::from_template("echo {INVALID_VAR}", &vars(&[("HOST", "x")])).unwrap_err();
        assert!(matches!(err, Error::UnknownVariable { ref name, .. } if name == "INVALID_VAR"));
    }

    #[cfg(unix)]
    #[test]
    fn test_run_capture() {
        let out = run_templated_command(
            "printf '%s\\n' {NAME}",
            &vars(&[("NAME", "it's here")]),
            Some(Duration::from_secs(10)),
        )
        .unwrap();
        assert_eq!(out, "it's here\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit() {
        let err = ShellOut::new("echo broken >&2; exit 3").run_capture().unwrap_err();
        match err {
            Error::Failed { status, stderr, .. } => {
                assert_eq!(status.code(), Some(3));
                assert_eq!(stderr.trim(), "broken");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(ShellOut::new("exit 1").run().is_err());
        assert!(ShellOut::new("true").run().is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout() {
        let started = Instant::now();
        let err = ShellOut::new("sleep 5")
            .with_timeout(Duration::from_millis(100))
            .run_capture()
            .unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }
}
