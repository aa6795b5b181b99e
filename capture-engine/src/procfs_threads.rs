//! Thread table and global pid lookups through the process filesystem
//!
//! Both helpers read `<host_root>/proc`, so a containerised agent can point
//! them at the host's proc mount.

use crate::errors::{EngineError, Result};
use log::debug;
use procfs::process::{all_processes_with_root, Process};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreadInfo {
    pub tid: i64,
    pub pid: i64,
    pub ptid: i64,
    pub comm: String,
    pub exe: Option<PathBuf>,
    pub uid: u32,
    pub gid: u32,
}

fn proc_root(host_root: &Path) -> PathBuf {
    host_root.join("proc")
}

/// Every thread of every process visible under `<host_root>/proc`.
///
/// Processes and threads that exit while the table is being built are
/// skipped.
pub fn get_threadlist(host_root: &Path) -> Result<Vec<ThreadInfo>> {
    let processes = all_processes_with_root(proc_root(host_root))
        .map_err(|e| EngineError::ProcfsFailed { source: e.into() })?;

    let mut threads = Vec::new();
    for process in processes.flatten() {
        threads.extend(process_threads(&process));
    }
    debug!("collected {} threads", threads.len());
    Ok(threads)
}

fn process_threads(process: &Process) -> Vec<ThreadInfo> {
    let Ok(tasks) = process.tasks() else {
        return Vec::new();
    };
    let exe = process.exe().ok();

    tasks
        .flatten()
        .filter_map(|task| {
            let stat = task.stat().ok()?;
            let (uid, gid) = task
                .status()
                .map(|status| (status.ruid, status.rgid))
                .unwrap_or_default();
            Some(ThreadInfo {
                tid: i64::from(task.tid),
                pid: i64::from(task.pid),
                ptid: i64::from(stat.ppid),
                comm: stat.comm,
                exe: exe.clone(),
                uid,
                gid,
            })
        })
        .collect()
}

/// Pid of the calling process in the pid namespace of `<host_root>/proc`.
pub fn getpid_global(host_root: &Path) -> Result<i64> {
    let link = proc_root(host_root).join("self");
    let target = fs::read_link(&link)
        .map_err(|e| EngineError::ProcfsFailed { source: e.into() })?;

    target
        .to_string_lossy()
        .parse::<i64>()
        .map_err(|e| EngineError::ProcfsFailed {
            source: anyhow::anyhow!("{} points at {}: {}", link.display(), target.display(), e),
        })
}
