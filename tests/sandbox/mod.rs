//! Runs test bodies inside a bubblewrap sandbox whose name lookups are
//! answered by a [`MockDns`] server on the loopback interface.

// Shared test infrastructure: not every test binary uses every item.
#![allow(dead_code)]

use std::{
    ffi::OsString,
    io::{stderr, stdout, Write},
    path::Path,
    process::{Command, Stdio},
};

/// Minimal mock DNS server answering address queries for a fixed set of hosts.
pub mod dns;

use dns::MockDns;

/// Capabilities the mock DNS server needs inside the sandbox.
const CAPABILITIES: [&str; 2] = [
    // Bringing up the loopback interface
    "CAP_NET_ADMIN",
    // Binding port 53
    "CAP_NET_BIND_SERVICE",
];

/// A sandbox in which `getaddrinfo` and hickory resolve through a [`MockDns`].
pub struct Sandbox {
    dns: MockDns,
    bwrap: OsString,
    skip_unavailable: bool,
}

impl Sandbox {
    /// Environment variable set within the sandboxed child process.
    const INSIDE_SANDBOX: &str = "HOSTADDR_RS_SANDBOX";

    /// Environment variable turning "bubblewrap cannot run" from a test
    /// failure into a skip.
    pub const SKIP_UNAVAILABLE: &str = "HOSTADDR_RS_SKIP_SANDBOX";

    /// Create a sandbox resolving names through `dns`.
    pub fn new(dns: MockDns) -> Self {
        Self {
            dns,
            bwrap: OsString::from("bwrap"),
            skip_unavailable: std::env::var_os(Self::SKIP_UNAVAILABLE).is_some(),
        }
    }

    /// Use another bubblewrap executable.
    pub fn bwrap(mut self, program: impl Into<OsString>) -> Self {
        self.bwrap = program.into();
        self
    }

    /// Set whether the test passes without running when bubblewrap cannot
    /// create the sandbox. Defaults to whether [`Self::SKIP_UNAVAILABLE`] is set.
    pub fn skip_unavailable(mut self, skip: bool) -> Self {
        self.skip_unavailable = skip;
        self
    }

    /// Execute the given test body within the sandbox.
    pub fn run(self, test_body: impl FnOnce()) {
        if std::env::var_os(Self::INSIDE_SANDBOX).is_some() {
            // Child: serve DNS for as long as the test body runs
            let _server = self.dns.spawn().expect("failed to start mock DNS server");
            test_body();
        } else {
            // Parent: execute the test binary in the sandbox
            self.execute_in_sandbox();
        }
    }

    /// Execute the given test body within the sandbox using a Tokio runtime.
    pub fn run_with_tokio<F: std::future::Future<Output = ()>>(
        self,
        test_body: impl FnOnce() -> F,
    ) {
        self.run(|| {
            tokio::runtime::Runtime::new()
                .expect("failed to create Tokio runtime")
                .block_on(test_body());
        });
    }

    /// Re-run the current test inside the sandbox, with the mock DNS
    /// server's resolver configuration mounted over `/etc`.
    fn execute_in_sandbox(self) {
        let test_name = std::thread::current()
            .name()
            .expect("sandbox must be run from within a #[test] function")
            .to_string();

        if !self.bwrap_usable() {
            if self.skip_unavailable {
                eprintln!("skipping `{test_name}`: bubblewrap cannot create the sandbox");
                return;
            }
            panic!(
                "bubblewrap ({:?}) cannot create the sandbox for `{test_name}`; \
                 set {}=1 to skip sandboxed tests",
                self.bwrap,
                Self::SKIP_UNAVAILABLE
            );
        }

        let self_exe = std::env::current_exe().expect("failed to determine test binary path");
        let tempdir = tempfile::tempdir().expect("failed to create tempdir for sandbox");
        let mut mounts: Vec<OsString> = Vec::new();
        for (name, contents) in MockDns::resolver_files() {
            let host_path = tempdir.path().join(name);
            std::fs::write(&host_path, contents).expect("failed to write resolver file to tempdir");
            mounts.push(OsString::from("--ro-bind"));
            mounts.push(host_path.into_os_string());
            mounts.push(Path::new("/etc").join(name).into_os_string());
        }

        let output = Command::new(&self.bwrap)
            .arg("--unshare-all") // Own network namespace, so port 53 is free
            .args(["--dev-bind", "/", "/"])
            .arg("--die-with-parent")
            .args(capability_args())
            .args(&mounts)
            .arg("--")
            .arg(&self_exe)
            .args([test_name.as_str(), "--exact", "--nocapture"])
            .env(Self::INSIDE_SANDBOX, "1")
            .output()
            .expect("failed to execute bwrap");

        // Forward test output and success/failure to the Rust test harness
        let _ = stdout().write_all(&output.stdout);
        let _ = stderr().write_all(&output.stderr);
        assert!(
            output.status.success(),
            "test `{test_name}` failed inside sandbox (exit code: {:?})",
            output.status.code()
        );
    }

    /// Determines if bubblewrap is installed and allowed to grant the
    /// capabilities the DNS server needs.
    fn bwrap_usable(&self) -> bool {
        Command::new(&self.bwrap)
            .args(["--unshare-all", "--dev-bind", "/", "/"])
            .args(capability_args())
            .args(["--", "true"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }
}

fn capability_args() -> impl Iterator<Item = &'static str> {
    CAPABILITIES.into_iter().flat_map(|cap| ["--cap-add", cap])
}
