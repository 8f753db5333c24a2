#![forbid(unsafe_code)]

use std::process;

fn main() {
    let result = sntpd::daemon_main();
    if let Err(e) = result {
        eprintln!("sntp-clock: {e}");
        process::exit(1);
    }
}
