use std::time::Instant;

/// Runs `f`, logging how long it took (only with the `metrics` feature).
pub fn measure<T>(label: &str, f: impl FnOnce() -> T) -> T {
    let tt = Instant::now();
    let result = f();

    log_elapsed(label, tt);

    result
}

#[cfg(feature = "metrics")]
fn log_elapsed(label: &str, tt: Instant) {
    log::info!(
        "{label}: {}",
        humantime::format_duration(tt.elapsed()).to_string(),
    );
}

#[cfg(not(feature = "metrics"))]
fn log_elapsed(label: &str, tt: Instant) {
    log::trace!("{label}: {:?}", tt.elapsed());
}
