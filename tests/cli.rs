use std::io::Write;
use std::process::{Command, Output, Stdio};

fn lpd() -> Command {
    Command::new(env!("CARGO_BIN_EXE_lpd"))
}

fn source_file(src: &str) -> tempfile::NamedTempFile {
    let mut f = tempfile::Builder::new().suffix(".lpd").tempfile().expect("temp file");
    f.write_all(src.as_bytes()).expect("write source");
    f
}

/// Runs `lpd` with `args` and the path of a file holding `src`, feeding `stdin`.
fn run_with(src: &str, args: &[&str], stdin: &str) -> Output {
    let file = source_file(src);
    let mut child = lpd()
        .args(args)
        .arg(file.path())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to run lpd");
    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(stdin.as_bytes())
        .expect("write stdin");
    child.wait_with_output().expect("wait for lpd")
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).into_owned()
}

fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).into_owned()
}

const SUM: &str = "\
programa soma;
var a, b: inteiro;
inicio
  leia(a);
  leia(b);
  a := a + b;
  escreva(a)
fim.
";

// --- Compiling ---

#[test]
fn compiles_to_object_text_on_stdout() {
    let out = run_with(SUM, &[], "");
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    let text = stdout(&out);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.first().map(|l| l.trim()), Some("START"));
    assert_eq!(lines.last().map(|l| l.trim()), Some("HLT"));
    assert!(text.contains("    ALLOC   0,8"), "got:\n{text}");
}

#[test]
fn output_flag_writes_file() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("soma.obj");
    let out = run_with(SUM, &["-o", target.to_str().unwrap()], "");
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert!(stdout(&out).is_empty());
    let written = std::fs::read_to_string(&target).unwrap();
    assert!(written.starts_with("    START\n"));
}

#[test]
fn object_file_runs_back() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("soma.obj");
    let out = run_with(SUM, &["-o", target.to_str().unwrap()], "");
    assert!(out.status.success());

    let mut child = lpd()
        .arg("--object")
        .arg(&target)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child.stdin.take().unwrap().write_all(b"20\n22\n").unwrap();
    let out = child.wait_with_output().unwrap();
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert_eq!(stdout(&out).trim(), "42");
}

// --- Running ---

#[test]
fn run_reads_and_writes_integers() {
    let out = run_with(SUM, &["--run"], "3\n4\n");
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert_eq!(stdout(&out), "7\n");
}

#[test]
fn run_loop_with_step() {
    let src = "programa t; var i: inteiro; \
               inicio para i := 10 enquanto i > 0 passo -3 faca escreva(i) fim.";
    let out = run_with(src, &["-r"], "");
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert_eq!(stdout(&out), "10\n7\n4\n1\n");
}

#[test]
fn runtime_fault_is_reported() {
    let src = "programa t; var a: inteiro; inicio a := 1 div a; escreva(a) fim.";
    let out = run_with(src, &["-r"], "");
    assert_eq!(out.status.code(), Some(1));
    let err = stderr(&out);
    assert!(err.contains("error[LPD-R001]: division by zero"), "stderr: {err}");
    assert!(err.contains("DIVI"), "stderr: {err}");
    assert!(stdout(&out).is_empty());
}

#[test]
fn exhausted_input_is_reported() {
    let out = run_with(SUM, &["-r"], "5\n");
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("LPD-R007"));
}

#[test]
fn trace_goes_to_stderr() {
    let out = run_with("programa t; inicio fim.", &["-r", "--trace"], "");
    assert!(out.status.success());
    let err = stderr(&out);
    assert!(err.contains("START"), "stderr: {err}");
    assert!(err.contains("HLT"), "stderr: {err}");
    assert!(stdout(&out).is_empty());
}

// --- Errors ---

#[test]
fn semantic_error_has_location_and_exit_code() {
    let src = "programa t;\nvar a: inteiro;\ninicio\n  a := verdadeiro\nfim.\n";
    let out = run_with(src, &[], "");
    assert_eq!(out.status.code(), Some(1));
    let err = stderr(&out);
    assert!(err.contains("error[LPD-S004]"), "stderr: {err}");
    assert!(err.contains("--> 4:5"), "stderr: {err}");
    assert!(err.contains("a := verdadeiro"), "stderr: {err}");
    assert!(stdout(&out).is_empty());
}

#[test]
fn json_diagnostics() {
    let out = run_with("programa t; inicio x := 1 fim.", &["--json"], "");
    assert_eq!(out.status.code(), Some(1));
    let v: serde_json::Value = serde_json::from_str(stderr(&out).trim()).expect("json on stderr");
    assert_eq!(v["severity"], "error");
    assert_eq!(v["code"], "LPD-S002");
    assert_eq!(v["labels"][0]["line"], 1);
    assert_eq!(v["labels"][0]["col"], 20);
}

#[test]
fn lexical_and_grammar_errors() {
    let out = run_with("programa t; inicio ? fim.", &[], "");
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("LPD-L001"));

    let out = run_with("programa t; inicio escreva(x fim.", &[], "");
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("LPD-P001"));
}

#[test]
fn missing_file_fails() {
    let out = lpd().arg("/definitely/not/here.lpd").output().unwrap();
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("cannot read"));
}

#[test]
fn unknown_object_instruction_warns_but_runs() {
    let file = source_file("    START\n    LDC     5\n    FROB\n    PRN\n    HLT\n");
    let out = lpd().arg("--object").arg(file.path()).output().unwrap();
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert_eq!(stdout(&out), "5\n");
    assert!(stderr(&out).contains("warning[LPD-O006]"));
}

// --- Dumps and flags ---

#[test]
fn explain_prints_registry_entry() {
    let out = lpd().args(["--explain", "LPD-S004"]).output().unwrap();
    assert!(out.status.success());
    assert!(stdout(&out).starts_with("## LPD-S004: type mismatch"));

    let out = lpd().args(["--explain", "LPD-Z999"]).output().unwrap();
    assert_eq!(out.status.code(), Some(1));
}

#[test]
fn show_symbols_lists_scopes() {
    let src = "programa t; var g: inteiro; procedimento p; var l: booleano; inicio l := verdadeiro fim; \
               inicio p fim.";
    let out = run_with(src, &["-S", "-o", "/dev/null"], "");
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    let text = stdout(&out);
    assert!(text.contains("scope p (base 4)"), "got:\n{text}");
    assert!(text.contains("addr=0 size=1"), "got:\n{text}");
    assert!(text.contains("label=L1"), "got:\n{text}");
}

#[test]
fn show_ast_is_dot() {
    let out = run_with(SUM, &["-A", "-o", "/dev/null"], "");
    let text = stdout(&out);
    assert!(text.starts_with("digraph ast {"), "got:\n{text}");
    assert!(text.contains("Program\\nsoma"));
}

#[test]
fn ast_json_parses() {
    let out = run_with(SUM, &["--ast-json", "-o", "/dev/null"], "");
    let v: serde_json::Value = serde_json::from_str(&stdout(&out)).expect("AST JSON");
    assert_eq!(v["kind"], "Program");
    assert_eq!(v["payload"], "soma");
}

#[test]
fn pretty_print_lists_tokens() {
    let out = run_with(SUM, &["-P", "-o", "/dev/null"], "");
    let text = stdout(&out);
    assert!(text.contains("MainBegin"), "got:\n{text}");
    assert!(!text.contains("Dot"), "got:\n{text}");
}

#[test]
fn opt_level_folds_constants() {
    let src = "programa t; var a: inteiro; inicio a := 6 * 7; escreva(a) fim.";
    let out = run_with(src, &["-O", "1"], "");
    assert!(out.status.success());
    assert!(stdout(&out).contains("LDC     42"));

    let out = run_with(src, &["-O", "2"], "");
    assert!(!out.status.success());
}

#[test]
fn show_time_reports_stages() {
    let out = run_with(SUM, &["-t", "-o", "/dev/null"], "");
    assert!(out.status.success());
    let err = stderr(&out);
    for stage in ["lex", "grammar", "semantic", "optimize", "codegen"] {
        assert!(err.contains(stage), "missing {stage} in:\n{err}");
    }
    let total = err.lines().find(|l| l.trim_start().starts_with("total")).expect("total row");
    assert!(total.trim_end().ends_with('%'), "got: {total}");
}
