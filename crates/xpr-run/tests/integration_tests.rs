use assert_cmd::cargo;
use rstest::rstest;

#[rstest]
#[case::precedence(vec!["1 + 2 * 3"], "7\n")]
#[case::fraction(vec!["1 / 4"], "0.25\n")]
#[case::defines(vec!["-D", "width=320", "--define", "left=8", "width / 2 + left"], "168\n")]
#[case::bool(vec!["--bool", "2 > 1 ? 10 : 20"], "10\n")]
#[case::print(vec!["--print", "-D", "x=4", "x * 2 + y"], "8 + y\n")]
#[case::print_without_folding(vec!["--print", "--no-optimize", "2+3*4"], "2 + 3 * 4\n")]
#[case::symbols(vec!["--symbols", "--no-cache", "y + x"], "variable x\nvariable y\ninfix operator +\n")]
#[case::any_concatenation(vec!["--any", "'a' + 1"], "a1\n")]
#[case::any_defines(vec!["--any", "-D", "name=world", "'Hello, ' + name"], "Hello, world\n")]
#[case::any_print(vec!["--any", "--print", "'a' + 'b'"], "'ab'\n")]
fn test_cli_run_with_args(#[case] args: Vec<&str>, #[case] expected_output: &str) {
    let mut cmd = cargo::cargo_bin_cmd!("xpr");
    let assert = cmd.args(args).assert();
    assert.success().code(0).stdout(expected_output.to_string());
}

#[rstest]
#[case::lines("1 + 1\n\n2 * 3\n", vec![], "2\n6\n")]
#[case::defines("x\nx * x\n", vec!["-D", "x=3"], "3\n9\n")]
#[case::any("'x' + 1\n", vec!["--any"], "x1\n")]
fn test_cli_run_with_stdin(#[case] input: &str, #[case] args: Vec<&str>, #[case] expected_output: &str) {
    let mut cmd = cargo::cargo_bin_cmd!("xpr");
    let assert = cmd.args(args).write_stdin(input).assert();
    assert.success().code(0).stdout(expected_output.to_string());
}

#[rstest]
#[case::undefined(vec!["x + 1"])]
#[case::missing_paren(vec!["(1 + 2"])]
#[case::string_in_numeric_mode(vec!["-D", "name=ann", "name"])]
#[case::invalid_define(vec!["-D", "width", "1"])]
#[case::type_mismatch(vec!["--any", "'a' * 2"])]
fn test_cli_run_with_error(#[case] args: Vec<&str>) {
    let mut cmd = cargo::cargo_bin_cmd!("xpr");
    cmd.args(args).assert().failure();
}

#[test]
fn test_cli_stdin_keeps_going_after_errors() {
    let mut cmd = cargo::cargo_bin_cmd!("xpr");
    cmd.write_stdin("1 + 1\nnope\n3\n")
        .assert()
        .failure()
        .stdout("2\n3\n".to_string());
}
