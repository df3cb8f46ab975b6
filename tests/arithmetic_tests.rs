// Expression and literal tests, run end to end

use mila::compile;
use mila::runtime::{Console, ExecError, ExecLimits, Machine};
use rstest::rstest;

fn eval(expression: &str) -> Result<String, ExecError> {
    let source = format!("var zero: integer; begin writeln({}) end.", expression);
    let module = compile(&source).expect("Compilation failed");
    let mut machine = Machine::new(&module, ExecLimits::default(), Console::new());
    machine.run()?;
    Ok(machine.console().output().trim_end().to_string())
}

#[rstest]
#[case("2 + 3 * 4", "14")]
#[case("(2 + 3) * 4", "20")]
#[case("10 - 4 - 3", "3")]
#[case("-2 * 3", "-6")]
#[case("7 div 2", "3")]
#[case("-7 div 2", "-3")]
#[case("7 mod 3", "1")]
#[case("-7 mod 2", "-1")]
#[case("$1F + &17", "46")]
#[case("0x10 - 042", "-18")]
#[case("2147483647 + 1", "-2147483648")]
fn test_expression_values(#[case] expression: &str, #[case] expected: &str) {
    assert_eq!(eval(expression).unwrap(), expected);
}

#[test]
fn test_division_by_zero_at_run_time() {
    assert!(matches!(
        eval("1 div zero"),
        Err(ExecError::DivisionByZero { .. })
    ));
    assert!(matches!(
        eval("1 mod zero"),
        Err(ExecError::DivisionByZero { .. })
    ));
}

#[test]
fn test_conditions() {
    let source = r#"
        var a, b: integer;
        begin
            a := 3;
            b := 5;
            if (a < b) and not (a = b) then writeln(1) else writeln(0);
            if (a > b) or (b >= 5) then writeln(1) else writeln(0);
            if a <> 3 then writeln(1) else writeln(0)
        end.
    "#;
    let module = compile(source).expect("Compilation failed");
    let mut machine = Machine::new(&module, ExecLimits::default(), Console::new());
    machine.run().expect("Execution failed");
    assert_eq!(machine.console().lines(), ["1", "1", "0"]);
}
