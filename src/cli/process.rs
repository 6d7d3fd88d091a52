use std::{
    path::{Path, PathBuf},
    process::Stdio,
};

use anyhow::{anyhow, Result};
use sysinfo::{get_current_pid, Signal, System};
use tracing::info;

/// Stops every process started from `name`, except this one and its children.
pub fn kill_previous_servers(name: &Path) -> Result<usize> {
    let system = System::new_all();
    let current_id = get_current_pid().map_err(|e| anyhow!("Can't get own pid {e}"))?;
    let mut killed = 0;
    for (pid, process) in system.processes().iter() {
        if *pid == current_id {
            continue;
        }
        if matches!(process.parent(), Some(p) if p == current_id) {
            continue;
        }

        if process
            .exe()
            .filter(|v| v.exists())
            .filter(|v| name == *v)
            .is_some()
        {
            info!("Stopping daemon {pid}");
            if process.kill_with(Signal::Term).is_none() {
                process.kill();
            }
            process.wait();
            killed += 1;
        }
    }
    Ok(killed)
}

/// Stops running daemons and starts a new one. The daemon binary detaches by itself.
pub fn restart_server(daemon: &Path, dir: Option<PathBuf>) -> Result<()> {
    kill_previous_servers(daemon)?;
    let mut command = std::process::Command::new(daemon);
    if let Some(dir) = dir {
        command.arg("--dir").arg(dir);
    }
    command.stdin(Stdio::null());
    command.stdout(Stdio::null());

    info!("Spawning {daemon:?}");
    let status = command
        .status()
        .map_err(|e| anyhow!("Can't start {daemon:?}: {e}"))?;
    if !status.success() {
        return Err(anyhow!("Daemon exited with {status}"));
    }
    println!("Daemon started");
    Ok(())
}
