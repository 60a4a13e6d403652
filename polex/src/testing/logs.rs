use std::cell::RefCell;
use std::sync::Once;

use log::{Level, LevelFilter, Log, Metadata, Record};

thread_local! {
    static RECORDS: RefCell<Vec<(Level, String)>> = RefCell::new(Vec::new());
}

/// Keeps every record on the thread that logged it, so tests running in
/// parallel don't see each other's logs
struct CaptureLogger;

impl Log for CaptureLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        RECORDS.with(|it| {
            it.borrow_mut()
                .push((record.level(), record.args().to_string()))
        });
    }

    fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger;
static INIT: Once = Once::new();

/// Run `f` and return its result along with the messages it logged at
/// `level` on the current thread
pub fn capture_logs<T, F: FnOnce() -> T>(level: Level, f: F) -> (T, Vec<String>) {
    INIT.call_once(|| {
        if log::set_logger(&LOGGER).is_ok() {
            log::set_max_level(LevelFilter::Trace);
        }
    });
    RECORDS.with(|it| it.borrow_mut().clear());
    let res = f();
    let logged = RECORDS.with(|it| {
        it.borrow_mut()
            .drain(..)
            .filter(|(lvl, _)| *lvl == level)
            .map(|(_, msg)| msg)
            .collect()
    });
    (res, logged)
}
