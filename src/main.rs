use std::env;
use std::io::{self, Write};
use std::process;

use tracing_subscriber::EnvFilter;

fn init_logging() {
  // stdout carries the assembly, so diagnostics go to stderr.
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(io::stderr)
    .with_target(false)
    .init();
}

fn main() {
  init_logging();

  let mut args = env::args_os();
  let program = args
    .next()
    .map(|arg| arg.to_string_lossy().into_owned())
    .unwrap_or_else(|| "minicc".to_string());
  let (Some(source), None) = (args.next(), args.next()) else {
    eprintln!("usage: {program} <program>");
    process::exit(1);
  };

  match minicc::source_from_arg(source).and_then(|source| minicc::generate_assembly(&source)) {
    Ok(asm) => {
      let mut stdout = io::stdout().lock();
      if let Err(err) = stdout.write_all(asm.as_bytes()).and_then(|()| stdout.flush()) {
        tracing::error!(%err, "failed to write assembly");
        process::exit(1);
      }
    }
    Err(err) => {
      eprintln!("{err}");
      process::exit(1);
    }
  }
}
