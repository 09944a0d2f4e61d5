mod driver;
mod gemini;

use std::ffi::OsString;

use anyhow::Context;

fn main() {
    let args: Vec<OsString> = std::env::args_os().collect();
    if let Err(err) = run(args) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run(args: Vec<OsString>) -> anyhow::Result<()> {
    let board = bubbleboard_core::bootstrap(args)?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed building async runtime")?;
    runtime.block_on(driver::run(board))
}
