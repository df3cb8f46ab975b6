// Integration tests for the Mila compiler: compile, then run with the reference executor

use std::rc::Rc;

use mila::codegen::{SemanticError, Translator};
use mila::diagnostics::{CompileError, ErrorClass};
use mila::ir::ModuleBuilder;
use mila::runtime::{Console, ExecLimits, Machine};
use mila::{compile, parse};

fn run_program(source: &str, input: &[i32]) -> (i32, Vec<String>) {
    let module = compile(source).expect("Compilation failed");
    let console = Console::with_input(input.iter().copied());
    let mut machine = Machine::new(&module, ExecLimits::default(), console);
    let status = machine.run().expect("Execution failed");
    let lines = machine
        .console()
        .lines()
        .into_iter()
        .map(str::to_string)
        .collect();
    (status, lines)
}

fn semantic_error(source: &str) -> SemanticError {
    match compile(source) {
        Err(CompileError::Semantic(err)) => err,
        other => panic!("expected a semantic error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_for_to_and_downto() {
    let source = r#"
        program counting;
        var i: integer;
        begin
            for i := 1 to 3 do
                writeln(i);
            for i := 3 downto 1 do
                writeln(i)
        end.
    "#;

    let (status, output) = run_program(source, &[]);
    assert_eq!(status, 0);
    assert_eq!(output, ["1", "2", "3", "3", "2", "1"]);
}

#[test]
fn test_for_loop_has_one_condition_and_exit_block() {
    let source = r#"
        var i: integer;
        begin
            for i := 1 to 3 do
                writeln(i)
        end.
    "#;

    let dump = compile(source).expect("Compilation failed").to_string();
    assert_eq!(dump.matches("\ncondblock:").count(), 1);
    assert_eq!(dump.matches("\nafterloop:").count(), 1);
}

#[test]
fn test_break_leaves_innermost_loop() {
    let source = r#"
        var i, j: integer;
        begin
            for i := 1 to 2 do
            begin
                j := 0;
                while 1 do
                begin
                    j := j + 1;
                    if j > 2 then break;
                end;
                writeln(i * 10 + j)
            end
        end.
    "#;

    let (_, output) = run_program(source, &[]);
    assert_eq!(output, ["13", "23"]);
}

#[test]
fn test_exit_skips_rest_of_function() {
    let source = r#"
        function f(): integer;
        begin
            f := 1;
            exit;
            f := 2
        end;

        begin
            writeln(f)
        end.
    "#;

    let (_, output) = run_program(source, &[]);
    assert_eq!(output, ["1"]);
}

#[test]
fn test_recursion() {
    let source = r#"
        function fact(n: integer): integer;
        begin
            if n <= 1 then
                fact := 1
            else
                fact := n * fact(n - 1)
        end;

        begin
            writeln(fact(5))
        end.
    "#;

    let (_, output) = run_program(source, &[]);
    assert_eq!(output, ["120"]);
}

#[test]
fn test_forward_declaration_allows_mutual_recursion() {
    let source = r#"
        function isodd(n: integer): integer; forward;

        function iseven(n: integer): integer;
        begin
            if n = 0 then iseven := 1 else iseven := isodd(n - 1)
        end;

        function isodd(n: integer): integer;
        begin
            if n = 0 then isodd := 0 else isodd := iseven(n - 1)
        end;

        begin
            writeln(iseven(10));
            writeln(isodd(7))
        end.
    "#;

    let (_, output) = run_program(source, &[]);
    assert_eq!(output, ["1", "1"]);
}

#[test]
fn test_arrays_with_constant_bounds() {
    let source = r#"
        const n = 5;
        var a: array [1 .. n] of integer;
            i, sum: integer;
        begin
            for i := 1 to n do
                a[i] := i * i;
            sum := 0;
            for i := n downto 1 do
                sum := sum + a[i];
            writeln(sum)
        end.
    "#;

    let (_, output) = run_program(source, &[]);
    assert_eq!(output, ["55"]);
}

#[test]
fn test_readln_and_write() {
    let source = r#"
        var x, y: integer;
        begin
            readln(x);
            readln(y);
            write('sum ');
            writeln(x + y)
        end.
    "#;

    let (_, output) = run_program(source, &[3, 4]);
    assert_eq!(output, ["sum 7"]);
}

#[test]
fn test_dec_and_while() {
    let source = r#"
        var n: integer;
        begin
            n := 3;
            while n > 0 do
            begin
                writeln(n);
                dec(n)
            end
        end.
    "#;

    let (_, output) = run_program(source, &[]);
    assert_eq!(output, ["3", "2", "1"]);
}

#[test]
fn test_main_result() {
    let (status, _) = run_program("begin end.", &[]);
    assert_eq!(status, 0);

    let (status, _) = run_program("begin main := 3 end.", &[]);
    assert_eq!(status, 3);
}

#[test]
fn test_local_shadows_global() {
    let source = r#"
        var x: integer;

        procedure p();
        var x: integer;
        begin
            x := 5;
            writeln(x)
        end;

        begin
            x := 1;
            p();
            writeln(x)
        end.
    "#;

    let (_, output) = run_program(source, &[]);
    assert_eq!(output, ["5", "1"]);
}

#[test]
fn test_redeclaration() {
    let err = semantic_error("var x: integer; x: integer; begin end.");
    assert!(matches!(err, SemanticError::Redeclared { ref name, .. } if name == "x"));

    let err = semantic_error(
        "procedure p(a: integer); var a: integer; begin end; begin p(1) end.",
    );
    assert!(matches!(err, SemanticError::Redeclared { .. }));
}

#[test]
fn test_invalid_array_bounds() {
    let err = semantic_error("var a: array [5 .. 1] of integer; begin end.");
    assert!(matches!(
        err,
        SemanticError::InvalidArrayBounds { from: 5, to: 1, .. }
    ));

    let err = semantic_error("var n: integer; a: array [1 .. n] of integer; begin end.");
    assert!(matches!(err, SemanticError::NotConstant { .. }));
}

#[test]
fn test_chained_declaration_shares_object() {
    let unit = parse("var a, b: integer; c: integer; begin end.").expect("Parsing failed");
    let mut builder = ModuleBuilder::new("test");
    let mut translator = Translator::new(&mut builder).expect("Builtins declared");
    translator
        .translate_statements(&unit.statements)
        .expect("Translation failed");

    let symbols = translator.symbols();
    let a = symbols.get("a").expect("a declared");
    let b = symbols.get("b").expect("b declared");
    let c = symbols.get("c").expect("c declared");
    assert!(Rc::ptr_eq(&a.object, &b.object));
    assert!(!Rc::ptr_eq(&a.object, &c.object));
}

fn assert_reprint_behaves_the_same(source: &str, input: &[i32]) {
    let printed = parse(source).expect("Parsing failed").to_string();
    let reprinted = parse(&printed).expect("Reprint does not parse").to_string();
    assert_eq!(printed, reprinted);

    assert_eq!(run_program(source, input), run_program(&printed, input));
}

#[test]
fn test_reprinted_program_behaves_the_same() {
    let source = r#"
        const limit = 4;
        var i, total: integer;
        function twice(v: integer): integer;
        begin
            twice := v * 2
        end;
        begin
            total := 0;
            for i := 1 to limit do
                if i mod 2 = 0 then total := total + twice(i) else total := total - 1;
            writeln(total)
        end.
    "#;

    assert_reprint_behaves_the_same(source, &[]);
}

#[test]
fn test_reprinted_forward_and_blocks_behave_the_same() {
    let source = r#"
        var k: integer;
        function countdown(n: integer): integer; forward;

        procedure show(v: integer);
        begin
            if v > 2 then
            begin
                write('big ');
                writeln(v)
            end
            else
            begin
                write('small ');
                writeln(v)
            end
        end;

        function countdown(n: integer): integer;
        var i: integer;
        begin
            countdown := 0;
            for i := n downto 1 do
            begin
                show(i);
                countdown := countdown + i;
                if i = 2 then break
            end
        end;

        begin
            readln(k);
            writeln(countdown(k))
        end.
    "#;

    let (_, output) = run_program(source, &[4]);
    assert_eq!(output, ["big 4", "big 3", "small 2", "9"]);
    assert_reprint_behaves_the_same(source, &[4]);
}

#[test]
fn test_huge_global_array_runs() {
    let source = r#"
        var a: array [0 .. 2000000000] of integer;
        begin
            a[0] := 1;
            a[2000000000] := 2;
            writeln(a[0] + a[2000000000] + a[1000])
        end.
    "#;

    let (_, output) = run_program(source, &[]);
    assert_eq!(output, ["3"]);
}

#[test]
fn test_errors_stop_compilation() {
    let err = compile("begin x := 1 end.").unwrap_err();
    assert_eq!(err.class(), ErrorClass::Semantic);

    let err = compile("begin x := 1 end. extra").unwrap_err();
    assert_eq!(err.class(), ErrorClass::Syntax);

    let err = compile("begin write('oops) end.").unwrap_err();
    assert_eq!(err.class(), ErrorClass::Lex);
}
