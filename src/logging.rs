use std::sync::atomic::{AtomicBool, Ordering};

static VERBOSE: AtomicBool = AtomicBool::new(false);
static PROGRESS_TO_STDERR: AtomicBool = AtomicBool::new(false);

/// `progress_to_stderr` keeps stdout free for machine-readable output.
pub fn init(verbose: bool, progress_to_stderr: bool) {
    VERBOSE.store(verbose, Ordering::Relaxed);
    PROGRESS_TO_STDERR.store(progress_to_stderr, Ordering::Relaxed);
}

pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::Relaxed)
}

/// Progress line printed only in verbose mode.
pub fn verbose(message: impl AsRef<str>) {
    if !is_verbose() {
        return;
    }
    if PROGRESS_TO_STDERR.load(Ordering::Relaxed) {
        eprintln!("{}", message.as_ref());
    } else {
        println!("{}", message.as_ref());
    }
}

pub fn error(message: impl AsRef<str>) {
    eprintln!("error: {}", message.as_ref());
}
