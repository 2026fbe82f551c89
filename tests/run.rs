//! Round-trip tests: compile, assemble and link with the system `cc`, then
//! check the exit status of the resulting program.
#![cfg(all(target_arch = "x86_64", target_os = "linux"))]

use assert_cmd::Command;
use std::{
  fs,
  path::Path,
  process::{Command as StdCommand, Stdio},
};

const HELPERS: &str = r#"
long ret3(void) { return 3; }
long add2(long a, long b) { return a + b; }
long sub2(long a, long b) { return a - b; }
long add6(long a, long b, long c, long d, long e, long f) {
  return a + b + c + d + e + f;
}
/* 1 only if the caller kept %rsp 16-byte aligned at the call. */
long aligned(void) {
  return (long)__builtin_frame_address(0) % 16 == 0;
}
"#;

fn have_cc() -> bool {
  StdCommand::new("cc")
    .arg("--version")
    .stdout(Stdio::null())
    .stderr(Stdio::null())
    .status()
    .is_ok_and(|status| status.success())
}

fn compile_asm(src: &str) -> String {
  let output = Command::new(env!("CARGO_BIN_EXE_minicc"))
    .arg(src)
    .output()
    .expect("run minicc");
  assert!(
    output.status.success(),
    "{src:?} failed to compile:\n{}",
    String::from_utf8_lossy(&output.stderr)
  );
  String::from_utf8_lossy(&output.stdout).to_string()
}

fn link(dir: &Path, asm: &str) -> std::path::PathBuf {
  let asm_path = dir.join("out.s");
  let helper_path = dir.join("helpers.c");
  let exe = dir.join("out");
  fs::write(&asm_path, asm).expect("write asm");
  fs::write(&helper_path, HELPERS).expect("write helpers");

  let output = StdCommand::new("cc")
    .arg("-static")
    .arg("-o")
    .arg(&exe)
    .arg(&asm_path)
    .arg(&helper_path)
    .output()
    .expect("run cc");
  if !output.status.success() {
    // Some toolchains ship without static libc; fall back to a dynamic link.
    let output = StdCommand::new("cc")
      .arg("-o")
      .arg(&exe)
      .arg(&asm_path)
      .arg(&helper_path)
      .output()
      .expect("run cc");
    assert!(
      output.status.success(),
      "link failed:\n{}\n{asm}",
      String::from_utf8_lossy(&output.stderr)
    );
  }
  exe
}

/// Exit status of the compiled program, or `None` when no `cc` is available.
fn exit_status(src: &str) -> Option<i32> {
  if !have_cc() {
    eprintln!("skipping {src:?}: no cc on PATH");
    return None;
  }
  let asm = compile_asm(src);
  let dir = tempfile::tempdir().expect("tempdir");
  let exe = link(dir.path(), &asm);
  let status = StdCommand::new(&exe).status().expect("run program");
  Some(status.code().expect("program exited by signal"))
}

fn assert_exit(expected: i64, src: &str) {
  if let Some(status) = exit_status(src) {
    // Exit statuses are reported modulo 256.
    assert_eq!(
      i64::from(status),
      expected.rem_euclid(256),
      "{src:?} => {status}, expected {expected}"
    );
  }
}

#[test]
fn arithmetic() {
  assert_exit(0, "0;");
  assert_exit(42, "42;");
  assert_exit(21, "5+20-4;");
  assert_exit(7, "1+2*3;");
  assert_exit(9, "(1+2)*3;");
  assert_exit(47, "5+6*7;");
  assert_exit(10, "-10+20;");
  assert_exit(10, "0- -10;");
}

#[test]
fn division_truncates_toward_zero() {
  assert_exit(3, "return 7/2;");
  assert_exit(-3, "return -7/2;");
  assert_exit(-3, "return 7/-2;");
}

#[test]
fn comparisons() {
  assert_exit(1, "0==0;");
  assert_exit(0, "42!=42;");
  assert_exit(1, "0<1;");
  assert_exit(0, "1<=0;");
  assert_exit(1, "return 5>3;");
  assert_exit(0, "a=3; b=5; return a>b;");
  assert_exit(1, "1>=1;");
}

#[test]
fn variables() {
  assert_exit(8, "a=3; b=5; return a+b;");
  assert_exit(6, "foo=1; bar=2+3; return foo+bar;");
  assert_exit(3, "a=b=3; return a;");
  assert_exit(14, "a=3; z=5; a=a*z-1; return a;");
}

#[test]
fn return_stops_execution() {
  assert_exit(10, "a=1; if (a==1) return 10; return 20;");
  assert_exit(5, "return 5; return 8;");
}

#[test]
fn control_flow() {
  assert_exit(3, "if (0) return 2; return 3;");
  assert_exit(2, "if (1-1) return 1; else return 2;");
  assert_exit(10, "i=0; while (i<10) i=i+1; return i;");
  assert_exit(10, "i=0; j=0; for (i=0; i<5; i=i+1) j=j+i; return j;");
  assert_exit(3, "for (;;) return 3; return 5;");
  assert_exit(55, "i=0; j=0; while (i<=10) { j=i+j; i=i+1; } return j;");
  assert_exit(3, "{1; {2;} return 3;}");
}

#[test]
fn calls() {
  assert_exit(3, "return ret3();");
  assert_exit(8, "return add2(3, 5);");
  assert_exit(2, "return sub2(5, 3);");
  assert_exit(21, "return add6(1,2,3,4,5,6);");
  assert_exit(63, "a=10; return add6(1,2,a,add2(a,4),5,add6(1,2,3,4,5,6)) + a;");
}

#[test]
fn calls_are_stack_aligned() {
  assert_exit(1, "return aligned();");
  assert_exit(1, "a=1; return aligned();");
  assert_exit(2, "a=1; b=2; return a + aligned();");
  assert_exit(2, "return add2(aligned(), aligned());");
}
