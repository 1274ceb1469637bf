//! End-to-end pipeline tests: SPL source in, NASM text (or a one-line
//! diagnostic) out. Assertions are made against the emitted assembly
//! rather than by running it, so the suite needs neither nasm nor a
//! linked runtime.

use splc::compile;

fn compile_ok(src: &str) -> String {
  match compile(src.as_bytes()) {
    Ok(asm) => asm,
    Err(err) => panic!("compilation failed: {err}\nsource: {src}"),
  }
}

fn compile_err(src: &str) -> String {
  match compile(src.as_bytes()) {
    Ok(asm) => panic!("compilation unexpectedly succeeded:\n{asm}"),
    Err(err) => err.to_string(),
  }
}

/// Position of `needle` as a whole trimmed line, after line `from`.
fn line_after(asm: &str, from: usize, needle: &str) -> usize {
  asm
    .lines()
    .enumerate()
    .skip(from)
    .find(|(_, line)| line.trim() == needle)
    .map(|(i, _)| i)
    .unwrap_or_else(|| panic!("line '{needle}' not found after line {from} in:\n{asm}"))
}

#[test]
fn empty_main_gets_label_prologue_and_epilogue() {
  let asm = compile_ok("proc main() { }");
  let label = line_after(&asm, 0, "main:");
  let push = line_after(&asm, label, "push rbp");
  let enter = line_after(&asm, push, "mov rbp, rsp");
  let leave = line_after(&asm, enter, "mov rsp, rbp");
  let pop = line_after(&asm, leave, "pop rbp");
  line_after(&asm, pop, "ret");
  assert!(asm.contains("global main"), "{asm}");
}

#[test]
fn arithmetic_and_print() {
  let asm = compile_ok("proc main() { var x: int; x := 2 + 3; printi(x); }");
  let add = line_after(&asm, 0, "add rax, rcx");
  let store = line_after(&asm, add, "mov [rcx], rax");
  let arg = line_after(&asm, store, "pop rdi");
  line_after(&asm, arg, "call printi");
  assert!(asm.contains("extern printi"), "{asm}");
}

#[test]
fn array_alias_with_stores_and_loads() {
  let asm = compile_ok(
    "type A = array [4] of int; \
     proc main() { var a: A; a[0] := 7; a[3] := 9; printi(a[0]); printi(a[3]); } ",
  );
  // Frame holds the 32-byte array; every access goes through one
  // bounds check against the declared length.
  assert!(asm.contains("sub rsp, 32"), "{asm}");
  assert_eq!(asm.matches("mov rcx, 4").count(), 4, "{asm}");
  assert_eq!(asm.matches("call exit").count(), 4, "{asm}");
  // The failure path realigns RSP before calling into the runtime.
  assert_eq!(asm.matches("and rsp, -16").count(), 4, "{asm}");
  assert_eq!(asm.matches("lea rax, [rcx+rax*8]").count(), 4, "{asm}");
}

#[test]
fn ref_parameter_increments_the_caller_variable() {
  let asm = compile_ok(
    "proc inc(ref x: int) { x := x + 1; } \
     proc main() { var v: int; v := 10; inc(v); printi(v); }",
  );
  // Callee side: pointer spilled, then dereferenced on both sides of
  // the assignment.
  let inc = line_after(&asm, 0, "inc:");
  let spill = line_after(&asm, inc, "mov [rbp-8], rdi");
  let addr = line_after(&asm, spill, "mov rax, [rbp-8]");
  line_after(&asm, addr, "push rax");
  // Caller side: the argument is the address of v.
  let main = line_after(&asm, 0, "main:");
  let lea = line_after(&asm, main, "lea rax, [rbp-8]");
  let arg = line_after(&asm, lea, "pop rdi");
  line_after(&asm, arg, "call inc");
}

#[test]
fn aliases_of_int_assign_across_each_other() {
  // Both aliases resolve to the primitive before comparison.
  compile_ok("type T1 = int; type T2 = int; proc main() { var a: T1; var b: T2; a := b; }");
}

#[test]
fn distinct_array_types_do_not_mix() {
  let err = compile_err(
    "type A = array [4] of int; type B = array [4] of int; \
     proc f(ref a: A) { } \
     proc main() { var b: B; f(b); }",
  );
  assert!(err.starts_with("Error:"), "{err}");
}

#[test]
fn nine_arguments_use_a_24_byte_outgoing_area() {
  let asm = compile_ok(
    "proc f(a: int, b: int, c: int, d: int, e: int, g: int, h: int, i: int, j: int) { \
       printi(a); printi(j); \
     } \
     proc main() { f(1, 2, 3, 4, 5, 6, 7, 8, 9); }",
  );
  // Caller: 24 bytes of outgoing area rounded up to a 16-byte frame.
  let main = line_after(&asm, 0, "main:");
  line_after(&asm, main, "sub rsp, 32");
  assert_eq!(asm.matches("mov [rsp+16], rax").count(), 3, "{asm}");
  // Callee: the stack parameters sit above the return address.
  let f = line_after(&asm, 0, "f:");
  let j = line_after(&asm, f, "mov rax, [rbp+32]");
  assert!(j > f, "{asm}");
}

#[test]
fn six_arguments_need_no_outgoing_area() {
  let asm = compile_ok(
    "proc f(a: int, b: int, c: int, d: int, e: int, g: int) { } \
     proc main() { f(1, 2, 3, 4, 5, 6); }",
  );
  let main = line_after(&asm, 0, "main:");
  // main has no locals and no outgoing area: no frame at all.
  let next_sub = asm
    .lines()
    .skip(main)
    .find(|line| line.trim().starts_with("sub rsp"));
  assert!(next_sub.is_none(), "{asm}");
  line_after(&asm, main, "pop r9");
}

#[test]
fn deep_alias_chain_resolves() {
  compile_ok(
    "type A = int; type B = A; type C = B; type D = C; \
     proc main() { var x: D; var y: int; x := 1; y := x; }",
  );
}

#[test]
fn every_user_procedure_is_exported() {
  let asm = compile_ok("proc helper() { } proc main() { helper(); }");
  assert!(asm.contains("global helper"), "{asm}");
  assert!(asm.contains("global main"), "{asm}");
  line_after(&asm, 0, "call helper");
}

#[test]
fn all_builtins_are_declared_extern() {
  let asm = compile_ok("proc main() { }");
  for name in ["printi", "printc", "readi", "readc", "exit", "time_"] {
    assert!(asm.contains(&format!("extern {name}")), "{asm}");
  }
}

#[test]
fn char_literals_compile_to_their_byte_values() {
  let asm = compile_ok("proc main() { printc('A'); printc('\\n'); }");
  line_after(&asm, 0, "mov rax, 65");
  line_after(&asm, 0, "mov rax, 10");
}

#[test]
fn lexical_errors_carry_the_error_prefix() {
  let err = compile_err("proc main() { var x: int; x := 1 @ 2; }");
  assert!(err.starts_with("Error:"), "{err}");

  let err = compile_err("proc main() { var x: int; x := 99999999999999999999; }");
  assert!(err.starts_with("Error:"), "{err}");
}

#[test]
fn syntactic_errors_name_the_unexpected_token() {
  let err = compile_err("proc main() { var x: int; x := ; }");
  assert!(err.starts_with("Error:"), "{err}");
  assert!(err.contains("';'"), "{err}");
}

#[test]
fn semantic_errors_are_fatal_with_the_error_prefix() {
  for src in [
    "proc main() { y := 1; }",
    "proc main() { nope(); }",
    "proc main() { printi(1, 2); }",
    "type A = array [2] of int; proc f(a: A) { } proc main() { }",
  ] {
    let err = compile_err(src);
    assert!(err.starts_with("Error:"), "{src} -> {err}");
  }
}
