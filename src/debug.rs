// stderr is unusable under the alternate screen, so SHEETFEED_DEBUG_LOG
// can point the sink at a file instead.

use std::fs::{File, OpenOptions};
use std::io::Write;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;

pub const DEBUG_ENV: &str = "SHEETFEED_DEBUG";
pub const DEBUG_LOG_ENV: &str = "SHEETFEED_DEBUG_LOG";

fn enabled() -> bool {
    static FLAG: OnceCell<bool> = OnceCell::new();
    *FLAG.get_or_init(|| {
        std::env::var(DEBUG_ENV)
            .map(|val| {
                let trimmed = val.trim();
                !(trimmed.is_empty()
                    || trimmed.eq_ignore_ascii_case("0")
                    || trimmed.eq_ignore_ascii_case("false")
                    || trimmed.eq_ignore_ascii_case("no")
                    || trimmed.eq_ignore_ascii_case("off"))
            })
            .unwrap_or(false)
    })
}

fn writer() -> Option<&'static Mutex<File>> {
    static WRITER: OnceCell<Option<Mutex<File>>> = OnceCell::new();
    WRITER
        .get_or_init(|| {
            std::env::var(DEBUG_LOG_ENV).ok().and_then(|path| {
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map(Mutex::new)
                    .ok()
            })
        })
        .as_ref()
}

pub fn log(message: impl AsRef<str>) {
    if !enabled() {
        return;
    }
    if let Some(writer) = writer() {
        let mut file = writer.lock();
        let _ = writeln!(file, "{}", message.as_ref());
        return;
    }
    eprintln!("{}", message.as_ref());
}
