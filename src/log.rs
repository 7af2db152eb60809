use std::io::Write;

use env_logger::Builder;

/// Install the process logger, reading the filter from `RUST_LOG`.
///
/// Calling it more than once is harmless, so every test can call it in
/// its setup.
pub fn init_log() {
    let mut builder = Builder::from_default_env();
    let _ = builder
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] [{}:{}] {}",
                record.level(),
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .is_test(cfg!(test))
        .try_init();
}
