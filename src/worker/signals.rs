use std::sync::atomic::{AtomicBool, Ordering};

use nix::sys::signal::{self, SigHandler, Signal};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Route SIGINT and SIGTERM to a flag polled with [`take_interrupt`].
///
/// The process is no longer terminated by these signals; the caller is
/// expected to poll and cancel the running operation.
pub fn install_interrupt_handler() -> nix::Result<()> {
    unsafe {
        signal::signal(Signal::SIGINT, SigHandler::Handler(handle_interrupt))?;
        signal::signal(Signal::SIGTERM, SigHandler::Handler(handle_interrupt))?;
    }
    Ok(())
}

extern "C" fn handle_interrupt(_: i32) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// Check and clear the interrupt flag
pub fn take_interrupt() -> bool {
    INTERRUPTED.swap(false, Ordering::SeqCst)
}
