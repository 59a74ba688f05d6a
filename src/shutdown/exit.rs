//! Process exit codes.
//!
//! A stable, machine-readable contract between the application and its
//! execution environment (OS, containers, orchestrators, supervisors):
//!
//! - `0`: successful termination
//! - `1..=63`: generic / application-defined errors
//! - `64..=78`: sysexits (BSD / POSIX de-facto standard)
//! - `128 + N`: terminated by Unix signal `N`

/// Normal, graceful termination.
pub const EXIT_OK: i32 = 0;

/// Unclassified failure; prefer a more specific code when one exists.
pub const EXIT_GENERAL_ERROR: i32 = 1;

/// The application terminated due to a recovered panic.
pub const EXIT_PANIC: i32 = 10;

/// Graceful shutdown was attempted but a handler failed or timed out.
pub const EXIT_SHUTDOWN_ERROR: i32 = 20;

/// Incorrect command usage: invalid arguments or missing flags.
pub const EXIT_USAGE: i32 = 64;

/// Malformed or semantically invalid input data.
pub const EXIT_DATA_ERROR: i32 = 65;

/// A required input (file, stdin) is missing or unreadable.
pub const EXIT_NO_INPUT: i32 = 66;

/// A required external service (database, broker, API) is unreachable.
pub const EXIT_UNAVAILABLE: i32 = 69;

/// Internal invariant violation; a bug was detected without panicking.
pub const EXIT_SOFTWARE: i32 = 70;

/// OS-level failure (syscalls, OS resources).
pub const EXIT_OS_ERROR: i32 = 71;

/// Low-level I/O failure (disk, sockets).
pub const EXIT_IO_ERROR: i32 = 74;

/// Transient failure; the operation can be retried.
pub const EXIT_TEMP_FAIL: i32 = 75;

/// Insufficient permissions (filesystem, secrets, security constraints).
pub const EXIT_NO_PERMISSION: i32 = 77;

/// Invalid configuration: missing variables, malformed files, failed
/// validation.
pub const EXIT_CONFIG_ERROR: i32 = 78;

/// Base for signal-triggered termination; the actual code is
/// `EXIT_SIGNAL_BASE + signal number` (SIGINT → 130, SIGTERM → 143).
/// Never return this manually.
pub const EXIT_SIGNAL_BASE: i32 = 128;
