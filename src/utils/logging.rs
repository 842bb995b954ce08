use chrono::Local;
use env_logger::{Builder, Env};
use log::info;
use std::io::Write;
use std::sync::Once;

static INIT: Once = Once::new();

/// Initialize the logging system. Level comes from `LOG_LEVEL`; safe to
/// call more than once.
pub fn init_logger(default_level: &str) {
    let default_level = default_level.to_string();
    INIT.call_once(move || {
        let env = Env::default().filter_or("LOG_LEVEL", default_level);

        let mut builder = Builder::from_env(env);
        builder
            .format(|buf, record| {
                writeln!(
                    buf,
                    "{} [{}] - {}: {}",
                    Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                    record.level(),
                    record.target(),
                    record.args()
                )
            })
            .init();

        info!("logging initialized");
    });
}
