//! Zero-signal process liveness probe.

/// Outcome of probing a process id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// The process exists and we may signal it.
    Alive,
    /// No such process, or the id can never name one.
    Dead,
    /// The process exists but belongs to another user.
    NotPermitted,
}

/// Probe `pid` by sending it the null signal.
#[cfg(unix)]
#[must_use]
pub fn probe_process(pid: u32) -> Liveness {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    // 0 would address our own process group.
    let Some(raw) = i32::try_from(pid).ok().filter(|raw| *raw > 0) else {
        return Liveness::Dead;
    };

    match kill(Pid::from_raw(raw), None) {
        Ok(()) => Liveness::Alive,
        Err(Errno::EPERM) => Liveness::NotPermitted,
        Err(_) => Liveness::Dead,
    }
}

/// Probe `pid`; unsupported on this platform, so always dead.
#[cfg(not(unix))]
#[must_use]
pub fn probe_process(_pid: u32) -> Liveness {
    Liveness::Dead
}

/// Whether `pid` names a live process we can signal.
///
/// A permission-denied probe counts as not alive, which understates
/// liveness for processes owned by another user. Reconciliation relies on
/// this; use [`probe_process`] to tell the cases apart.
#[must_use]
pub fn is_process_alive(pid: u32) -> bool {
    probe_process(pid) == Liveness::Alive
}
