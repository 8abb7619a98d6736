use lpd::compiler::{Error, Options, compile};
use lpd::vm::{BufferConsole, Instruction, StackMachine, VmError, object_load};

fn machine(src: &str, input: &[&str]) -> StackMachine<BufferConsole> {
    let compiled = match compile(src, &Options::default()) {
        Ok(c) => c,
        Err(e) => panic!("compile failed: {e}"),
    };
    let mut vm = StackMachine::new(BufferConsole::with_input(input.iter().copied()));
    vm.load(compiled.program).expect("link");
    vm
}

fn run(src: &str, input: &[&str]) -> Vec<i32> {
    let mut vm = machine(src, input);
    vm.run().expect("run");
    vm.console().output.clone()
}

#[test]
fn sum_of_two_inputs() {
    let src = "programa soma; var a, b: inteiro; \
               inicio leia(a); leia(b); a := a + b; escreva(a) fim.";
    assert_eq!(run(src, &["3", "4"]), vec![7]);
}

#[test]
fn unassigned_variable_prints_zero() {
    assert_eq!(run("programa t; var x: inteiro; inicio escreva(x) fim.", &[]), vec![0]);
}

#[test]
fn factorial_with_while() {
    let src = "programa fat; var n, r: inteiro; \
               inicio \
                 leia(n); r := 1; \
                 enquanto n > 1 faca inicio r := r * n; n := n - 1 fim; \
                 escreva(r) \
               fim.";
    assert_eq!(run(src, &["5"]), vec![120]);
    assert_eq!(run(src, &["0"]), vec![1]);
}

#[test]
fn if_else_and_boolean_variables() {
    let src = "programa t; var a: inteiro; par: booleano; \
               inicio \
                 leia(a); \
                 par := (a div 2) * 2 = a; \
                 se par e nao (a = 0) entao escreva(a) senao inicio a := -a; escreva(a) fim \
               fim.";
    assert_eq!(run(src, &["8"]), vec![8]);
    assert_eq!(run(src, &["7"]), vec![-7]);
    assert_eq!(run(src, &["0"]), vec![0]);
}

#[test]
fn for_loop_default_and_explicit_step() {
    let src = "programa t; var i, s: inteiro; \
               inicio \
                 para i := 1 enquanto i <= 4 faca s := s + i; \
                 escreva(s); \
                 para i := 0 enquanto i < 10 passo 5 faca escreva(i) \
               fim.";
    assert_eq!(run(src, &[]), vec![10, 0, 5]);
}

#[test]
fn procedures_and_functions_nest() {
    let src = "programa t; var total: inteiro; \
               procedimento acumula; var k: inteiro; \
                 funcao quadrado: inteiro; inicio quadrado := k * k fim; \
               inicio \
                 k := 1; \
                 enquanto k <= 3 faca inicio total := total + quadrado; k := k + 1 fim \
               fim; \
               inicio acumula; escreva(total) fim.";
    assert_eq!(run(src, &[]), vec![14]);
}

#[test]
fn function_returns_early() {
    let src = "programa t; var x, r: inteiro; \
               funcao sinal: inteiro; \
               inicio \
                 se x < 0 entao sinal := -1; \
                 se x = 0 entao sinal := 0; \
                 sinal := 1 \
               fim; \
               inicio leia(x); r := sinal; escreva(r) fim.";
    assert_eq!(run(src, &["-9"]), vec![-1]);
    assert_eq!(run(src, &["0"]), vec![0]);
    assert_eq!(run(src, &["42"]), vec![1]);
}

#[test]
fn boolean_function_in_condition() {
    let src = "programa t; var n: inteiro; \
               funcao positivo: booleano; inicio positivo := n > 0 fim; \
               inicio leia(n); se positivo entao escreva(n) fim.";
    assert_eq!(run(src, &["3"]), vec![3]);
    assert_eq!(run(src, &["-3"]), Vec::<i32>::new());
}

#[test]
fn local_shadows_global_only_inside() {
    let src = "programa t; var x: inteiro; \
               procedimento p; var x: inteiro; inicio x := 99; escreva(x) fim; \
               inicio x := 1; p; escreva(x) fim.";
    assert_eq!(run(src, &[]), vec![99, 1]);
}

#[test]
fn calls_and_returns_balance() {
    let src = "programa t; var n: inteiro; \
               procedimento inc; inicio n := n + 1 fim; \
               funcao dobro: inteiro; inicio inc; dobro := n * 2 fim; \
               inicio inc; n := dobro + dobro; escreva(n) fim.";
    let mut vm = machine(src, &[]);
    vm.run().unwrap();
    assert_eq!(vm.console().output, vec![10]);
    let stats = vm.stats();
    assert_eq!(stats.calls, 5);
    assert_eq!(stats.calls, stats.returns);
    assert_eq!(vm.stack_top(), -1);
}

#[test]
fn division_by_zero_stops_on_divi() {
    let src = "programa t; var a, b: inteiro; inicio leia(a); b := a div 0; escreva(b) fim.";
    let mut vm = machine(src, &["10"]);
    assert_eq!(vm.run(), Err(VmError::DivisionByZero));
    let pos = vm.fault_position().unwrap();
    assert_eq!(vm.program().instructions()[pos], Instruction::Divi);
    assert!(vm.console().output.is_empty());
    assert!(!vm.is_running());
}

#[test]
fn folding_preserves_behaviour() {
    let src = "programa t; var a: inteiro; p: booleano; \
               inicio a := (7 - 2) * 3 div 2; p := (1 < 2) e (3 > 4); \
               se p entao escreva(a) senao inicio a := a + 100; escreva(a) fim fim.";
    let plain = run(src, &[]);
    let compiled = compile(src, &Options { opt_level: 1 }).unwrap();
    let mut vm = StackMachine::new(BufferConsole::default());
    vm.load(compiled.program).unwrap();
    vm.run().unwrap();
    assert_eq!(vm.console().output, plain);
    assert_eq!(plain, vec![107]);
}

#[test]
fn object_text_round_trips_through_loader() {
    let src = "programa t; var a: inteiro; \
               procedimento p; inicio a := a * 2 fim; \
               inicio leia(a); p; p; escreva(a) fim.";
    let compiled = compile(src, &Options::default()).unwrap();
    let text = compiled.program.to_object_text();
    let (loaded, warnings) = object_load(&text).unwrap();
    assert!(warnings.is_empty());
    let mut vm = StackMachine::new(BufferConsole::with_input(["5"]));
    vm.load(loaded).unwrap();
    vm.run().unwrap();
    assert_eq!(vm.console().output, vec![20]);
}

#[test]
fn semantic_errors_use_stable_format() {
    let cases = [
        ("programa t; var a, a: inteiro; inicio fim.", "line 1, column 20, near 'a': duplicate symbol"),
        ("programa t; inicio y := 1 fim.", "line 1, column 20, near 'y': undefined symbol 'y'"),
        (
            "programa t; var b: booleano; inicio b := 1 + verdadeiro fim.",
            "line 1, column 44, near '+': type mismatch",
        ),
    ];
    for (src, expected) in cases {
        match compile(src, &Options::default()) {
            Err(e @ Error::Semantic(_)) => {
                let msg = e.to_string();
                assert!(msg.starts_with(expected), "{msg:?} does not start with {expected:?}");
            }
            other => panic!("expected a semantic error for {src:?}, got {other:?}"),
        }
    }
}
