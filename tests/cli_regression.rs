// Regression tests for the `sugarlisp` binary: forms on stdout, miette
// diagnostics on stderr.
// Requires: assert_cmd, predicates crates in [dev-dependencies]

use assert_cmd::Command;
use predicates::{prelude::PredicateBooleanExt, str::contains};

fn sugarlisp() -> Command {
    Command::cargo_bin("sugarlisp").unwrap()
}

#[test]
fn read_prints_operator_forms() {
    sugarlisp()
        .args(["read", "tests/fixtures/arith.sl"])
        .assert()
        .success()
        .stdout(contains("(= total (+ (* price count) 1))"));
}

#[test]
fn read_prints_json_on_request() {
    sugarlisp()
        .args(["read", "--json", "tests/fixtures/arith.sl"])
        .assert()
        .success()
        .stdout(contains("\"price\"").and(contains("\"total\"")));
}

#[test]
fn read_accepts_standard_input() {
    sugarlisp()
        .args(["read", "--use", "plus", "-"])
        .write_stdin("x = 1 + 2")
        .assert()
        .success()
        .stdout(contains("(= x (+ 1 2))"));
}

#[test]
fn config_file_sets_the_base_dialect() {
    sugarlisp()
        .args(["read", "--config", "tests/fixtures/reader.yaml", "-"])
        .write_stdin("a * b")
        .assert()
        .success()
        .stdout(contains("(* a b)"));
}

#[test]
fn read_errors_render_as_diagnostics() {
    sugarlisp()
        .args(["read", "tests/fixtures/unterminated.sl"])
        .assert()
        .failure()
        .stderr(contains("sugarlisp::read").or(contains("unterminated")));
}

#[test]
fn deep_input_fails_with_a_diagnostic() {
    let deep = format!("{}x{}", "(".repeat(300), ")".repeat(300));
    sugarlisp()
        .args(["read", "-"])
        .write_stdin(deep)
        .assert()
        .code(1)
        .stderr(contains("nested deeper").or(contains("depth_limit")));
}

#[test]
fn warnings_go_to_stderr() {
    sugarlisp()
        .args(["read", "--use", "reactive", "tests/fixtures/undeclared.sl"])
        .assert()
        .success()
        .stdout(contains("(show (cell-ref missing))"))
        .stderr(contains("never declared"));
}

#[test]
fn missing_files_fail() {
    sugarlisp()
        .args(["read", "tests/fixtures/no-such-file.sl"])
        .assert()
        .failure()
        .stderr(contains("no-such-file.sl"));
}

#[test]
fn dialects_lists_the_builtins() {
    sugarlisp()
        .arg("dialects")
        .assert()
        .success()
        .stdout(contains("core").and(contains("plus")).and(contains("reactive")));
}
