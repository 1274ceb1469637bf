use std::io::{self, Read, Write};
use std::process;

/// Batch driver: SPL source on stdin (terminated by a NUL byte or EOF),
/// NASM assembly or a one-line diagnostic on stdout. Exit status 0 on
/// success, 1 on any compilation error.
fn main() {
  env_logger::init();

  let mut source = Vec::new();
  if let Err(err) = io::stdin().read_to_end(&mut source) {
    eprintln!("error: failed to read stdin: {err}");
    process::exit(1);
  }

  match splc::compile(&source) {
    Ok(asm) => print!("{asm}"),
    Err(err) => {
      println!("{err}");
      let _ = io::stdout().flush();
      process::exit(1);
    }
  }
}
