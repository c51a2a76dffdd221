//! Privilege dropping for the proxy child.
//!
//! The launcher itself stays privileged (it must run the rule helpers at
//! shutdown). Only the forked child gives up its identity: the switch runs
//! as a pre-exec hook, after `fork()` and before `exec()`, so the proxy
//! binary never executes with the launcher's uid.
//!
//! Everything called from the hook must be async-signal-safe: no
//! allocation, no locks, no logging.

mod error;

use std::fmt;
use std::sync::Arc;

use nix::errno::Errno;
use nix::unistd::{Gid, Uid, getegid, geteuid, getgid, getuid, setgid, setgroups, setuid};
use tracing::debug;

pub use error::PrivilegeError;

/// Changes the identity of the calling process.
///
/// Implementations run inside the pre-exec hook and must restrict
/// themselves to async-signal-safe system calls.
pub trait IdentitySwitch: Send + Sync + 'static {
    /// Switch the calling process to `uid` with primary group `gid`.
    fn switch_to(&self, uid: Uid, gid: Gid) -> nix::Result<()>;
}

/// Switch with `setuid(2)` and verify that it took effect.
///
/// When running as root the supplementary groups are cleared and the
/// primary group is set first, so the child keeps none of root's groups.
/// An unprivileged caller cannot change groups and only switches uid.
#[derive(Debug, Default, Clone, Copy)]
pub struct SetUid;

impl IdentitySwitch for SetUid {
    fn switch_to(&self, uid: Uid, gid: Gid) -> nix::Result<()> {
        let drop_groups = geteuid().is_root();
        if drop_groups {
            setgroups(&[gid])?;
            setgid(gid)?;
        }
        setuid(uid)?;
        if getuid() != uid || geteuid() != uid {
            return Err(Errno::EPERM);
        }
        if drop_groups && (getgid() != gid || getegid() != gid) {
            return Err(Errno::EPERM);
        }
        Ok(())
    }
}

/// Drops the proxy child to a fixed uid.
///
/// The primary group has the same number as the uid, which is how proxy
/// identities are provisioned in sidecar images.
#[derive(Clone)]
pub struct PrivilegeDropper {
    uid: Uid,
    gid: Gid,
    switch: Arc<dyn IdentitySwitch>,
}

impl fmt::Debug for PrivilegeDropper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivilegeDropper")
            .field("uid", &self.uid)
            .field("gid", &self.gid)
            .finish_non_exhaustive()
    }
}

impl PrivilegeDropper {
    /// Dropper using `setuid(2)`.
    pub fn new(uid: u32) -> Self {
        Self::with_switch(uid, Arc::new(SetUid))
    }

    /// Dropper using a custom identity switch.
    pub fn with_switch(uid: u32, switch: Arc<dyn IdentitySwitch>) -> Self {
        Self {
            uid: Uid::from_raw(uid),
            gid: Gid::from_raw(uid),
            switch,
        }
    }

    /// The uid the child is dropped to.
    pub fn target_uid(&self) -> u32 {
        self.uid.as_raw()
    }

    /// Switch the calling process to the target uid.
    pub fn drop_privileges(&self) -> Result<(), PrivilegeError> {
        self.switch
            .switch_to(self.uid, self.gid)
            .map_err(|errno| PrivilegeError::Switch {
                uid: self.uid.as_raw(),
                source: errno.into(),
            })
    }

    /// Attach the switch to `command` as its pre-exec hook.
    ///
    /// If the switch fails, the hook's errno is returned from `spawn()` and
    /// the program is never executed.
    pub fn install(&self, command: &mut tokio::process::Command) {
        debug!("Installing privilege drop to uid {}", self.uid);

        let (uid, gid) = (self.uid, self.gid);
        let switch = Arc::clone(&self.switch);

        // SAFETY: the hook only calls the identity switch, whose contract
        // restricts it to async-signal-safe syscalls. Converting an Errno
        // into io::Error does not allocate.
        unsafe {
            command.pre_exec(move || switch.switch_to(uid, gid).map_err(std::io::Error::from));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Read;
    use std::os::fd::{AsRawFd, RawFd};

    /// Appends each requested uid to a file descriptor with a raw write(2).
    struct RecordingSwitch {
        fd: RawFd,
    }

    impl IdentitySwitch for RecordingSwitch {
        fn switch_to(&self, uid: Uid, _gid: Gid) -> nix::Result<()> {
            let bytes = uid.as_raw().to_ne_bytes();
            let written = unsafe { libc::write(self.fd, bytes.as_ptr().cast(), bytes.len()) };
            if written == bytes.len() as isize {
                Ok(())
            } else {
                Err(Errno::last())
            }
        }
    }

    struct FailingSwitch;

    impl IdentitySwitch for FailingSwitch {
        fn switch_to(&self, _uid: Uid, _gid: Gid) -> nix::Result<()> {
            Err(Errno::EPERM)
        }
    }

    fn recorded_uids(path: &std::path::Path) -> Vec<u32> {
        let mut raw = Vec::new();
        File::open(path).unwrap().read_to_end(&mut raw).unwrap();
        raw.chunks_exact(4)
            .map(|c| u32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    #[test]
    fn test_default_dropper_target() {
        let dropper = PrivilegeDropper::new(1337);
        assert_eq!(dropper.target_uid(), 1337);
    }

    #[test]
    fn test_drop_privileges_failure() {
        let dropper = PrivilegeDropper::with_switch(1337, Arc::new(FailingSwitch));
        match dropper.drop_privileges() {
            Err(PrivilegeError::Switch { uid, source }) => {
                assert_eq!(uid, 1337);
                assert_eq!(source.raw_os_error(), Some(libc::EPERM));
            }
            Ok(()) => panic!("Expected privilege error"),
        }
    }

    #[tokio::test]
    async fn test_hook_runs_once_per_launch() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("switches");
        let log = File::create(&log_path).unwrap();
        let dropper =
            PrivilegeDropper::with_switch(1337, Arc::new(RecordingSwitch { fd: log.as_raw_fd() }));

        for launch in 1..=2 {
            let mut cmd = tokio::process::Command::new("true");
            dropper.install(&mut cmd);
            let status = cmd.status().await.unwrap();
            assert!(status.success());
            assert_eq!(recorded_uids(&log_path), vec![1337; launch]);
        }
    }

    #[tokio::test]
    async fn test_failing_hook_prevents_exec() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("ran");

        let mut cmd = tokio::process::Command::new("touch");
        cmd.arg(&marker);
        PrivilegeDropper::with_switch(1337, Arc::new(FailingSwitch)).install(&mut cmd);

        let err = cmd.spawn().unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EPERM));
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn test_root_drop_clears_supplementary_groups() {
        if !geteuid().is_root() {
            return;
        }
        let mut cmd = tokio::process::Command::new("sh");
        cmd.args(["-c", "id -u; id -g; id -G"]);
        PrivilegeDropper::new(65534).install(&mut cmd);

        let output = cmd.output().await.unwrap();
        assert!(output.status.success());
        assert_eq!(String::from_utf8(output.stdout).unwrap(), "65534\n65534\n65534\n");
    }

    #[tokio::test]
    async fn test_invalid_uid_fails_even_as_root() {
        let dropper = PrivilegeDropper::new(u32::MAX);
        let mut cmd = tokio::process::Command::new("true");
        dropper.install(&mut cmd);

        let err = cmd.spawn().unwrap_err();
        assert!(matches!(err.raw_os_error(), Some(libc::EINVAL) | Some(libc::EPERM)));
    }

    #[tokio::test]
    async fn test_setuid_to_current_uid() {
        let mut cmd = tokio::process::Command::new("true");
        PrivilegeDropper::new(getuid().as_raw()).install(&mut cmd);

        let status = cmd.status().await.unwrap();
        assert!(status.success());
    }
}
