// src/exec/command.rs

//! Shell command elements.
//!
//! Nodes declared in a config file run a shell command. The command executes
//! synchronously on the worker thread that owns the node's chain; stdout and
//! stderr are captured and logged at debug level.

use std::process::Command;

use anyhow::{Context, Result, bail};
use tracing::{debug, info};

use crate::dag::Element;

#[derive(Debug, Clone)]
pub struct CommandElement {
    name: String,
    cmd: String,
}

impl CommandElement {
    pub fn new(name: impl Into<String>, cmd: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cmd: cmd.into(),
        }
    }
}

/// Build a shell command appropriate for the platform.
fn shell_command(cmd: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    }
}

impl Element for CommandElement {
    // Placeholders may carry an empty command, so it is only rejected when run.
    fn run(&self) -> Result<()> {
        if self.cmd.trim().is_empty() {
            bail!("node '{}' has an empty command", self.name);
        }
        info!(node = %self.name, cmd = %self.cmd, "starting node command");

        let output = shell_command(&self.cmd)
            .output()
            .with_context(|| format!("spawning process for node '{}'", self.name))?;

        for line in String::from_utf8_lossy(&output.stdout).lines() {
            debug!(node = %self.name, "stdout: {}", line);
        }
        for line in String::from_utf8_lossy(&output.stderr).lines() {
            debug!(node = %self.name, "stderr: {}", line);
        }

        let code = output.status.code().unwrap_or(-1);
        info!(
            node = %self.name,
            exit_code = code,
            success = output.status.success(),
            "node command exited"
        );

        if !output.status.success() {
            bail!("command for node '{}' exited with code {}", self.name, code);
        }
        Ok(())
    }
}
