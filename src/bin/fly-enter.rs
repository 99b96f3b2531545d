//! fly-enter - enter a running pod in fly mode
//!
//! Resolves the pod root of `--pid`, restores the environment of
//! `--appname` from the pod directory (the current working directory),
//! chroots into the pod and execs the trailing command.
//!
//! ## Usage
//!
//! ```sh
//! cd /var/lib/rkt/pods/run/<uuid>
//! fly-enter --pid 1234 --appname nginx -- /usr/sbin/nginx -g 'daemon off;'
//! ```
//!
//! ## Exit Statuses
//!
//! - `1`: failed before exec (bad flags, pod gone, env file missing, chroot denied)
//! - `254`: chroot succeeded but the command could not be executed

// =============================================================================
// Non-Linux Stub
// =============================================================================

#[cfg(not(target_os = "linux"))]
fn main() -> std::process::ExitCode {
    eprintln!("fly-enter is only available on Linux");
    std::process::ExitCode::from(flyenter::EXIT_SETUP_FAILED)
}

// =============================================================================
// Linux Implementation
// =============================================================================

#[cfg(target_os = "linux")]
fn main() -> std::process::ExitCode {
    linux::main()
}

#[cfg(target_os = "linux")]
mod linux {
    use std::process::ExitCode;

    use clap::Parser;
    use tracing::error;

    use flyenter::{
        AppName, ContainerEntry, DEBUG_ENV_VAR, EXIT_SETUP_FAILED, EntryRequest, Error, logging,
    };

    /// Enter a running pod and execute an app command inside its root.
    #[derive(Debug, Parser)]
    #[command(name = "fly-enter", version, about)]
    struct Args {
        /// Run in debug mode
        #[arg(long, env = DEBUG_ENV_VAR)]
        debug: bool,

        /// Pod PID
        #[arg(long)]
        pid: String,

        /// Application name
        #[arg(long)]
        appname: AppName,

        /// Command to execute, followed by its arguments
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    }

    pub fn main() -> ExitCode {
        let args = match Args::try_parse() {
            Ok(args) => args,
            Err(e) => {
                let _ = e.print();
                return if e.use_stderr() {
                    ExitCode::from(EXIT_SETUP_FAILED)
                } else {
                    ExitCode::SUCCESS
                };
            }
        };

        if logging::init(args.debug).is_err() {
            eprintln!("Failed to set tracing subscriber");
            return ExitCode::from(EXIT_SETUP_FAILED);
        }

        let request = match EntryRequest::new(args.pid, args.appname, args.command) {
            Ok(request) => request,
            Err(e) => {
                error!(error = %e, "invalid entry request");
                return ExitCode::from(e.exit_code());
            }
        };

        let err = ContainerEntry::host().enter(&request);
        match &err {
            Error::Exec { .. } => error!(error = %err, "exec failed"),
            _ => error!(error = %err, "fly entry failed"),
        }
        ExitCode::from(err.exit_code())
    }
}
