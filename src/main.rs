//! testforge CLI binary
//!
//! Minimal entrypoint: all logic lives in the library, and cli::run()
//! handles every piece of output including errors.

fn main() {
    if let Err(code) = testforge::cli::run() {
        std::process::exit(code.as_i32());
    }
}
