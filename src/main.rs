//! Content-script entry point.

fn main() {
    console_error_panic_hook::set_once();
    let level = if cfg!(debug_assertions) {
        log::Level::Debug
    } else {
        log::Level::Info
    };
    if console_log::init_with_level(level).is_err() {
        log::warn!("Focus Reader: logger already installed");
    }
    focus_bracket::web::run();
}
