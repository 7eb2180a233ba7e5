//! End-to-end scenario tests: one-line-ish source snippets checked against the expected set of
//! diagnostic categories (§8's testable scenarios), run through the public [`pytype_checker::check_source`]
//! entry point rather than any internal module, the way a consumer of the crate would use it.

use std::path::PathBuf;

use pytype_checker::check_source;
use pytype_checker::diagnostics::DiagnosticCategory;
use test_case::test_case;

fn categories(source: &str) -> Vec<DiagnosticCategory> {
    let result = check_source(&PathBuf::from("scenario.py"), source).expect("source parses");
    result.diagnostics.iter().map(|d| d.category).collect()
}

#[test_case("x: int = 1\n", &[]; "matching annotation produces no diagnostic")]
#[test_case("x: str = 1\n", &[DiagnosticCategory::TypeError]; "mismatched literal annotation")]
#[test_case("x: int = 'a'\n", &[DiagnosticCategory::TypeError]; "string assigned to int annotation")]
#[test_case("def f() -> int:\n    return 'a'\n", &[DiagnosticCategory::TypeError]; "wrong declared return type")]
#[test_case("def f() -> int:\n    return 1\n", &[]; "correct declared return type")]
#[test_case("import nonexistent_module_xyz\n", &[DiagnosticCategory::ImportFailed]; "unresolved import")]
#[test_case(
    "def f(x: int):\n    return x\nf('s')\n",
    &[DiagnosticCategory::TypeError];
    "argument type disagrees with declared parameter type"
)]
#[test_case(
    "def f(x: int):\n    return x\nf(1)\n",
    &[];
    "argument type agrees with declared parameter type"
)]
#[test_case(
    "def f(x, y):\n    return x\nf(1)\n",
    &[DiagnosticCategory::MissingArgument];
    "call is missing a required argument"
)]
#[test_case(
    "def f(x):\n    return x\nf(1, 2, 3)\n",
    &[DiagnosticCategory::TooManyArguments];
    "call passes too many positional arguments"
)]
fn scenario(source: &str, expected: &[DiagnosticCategory]) {
    assert_eq!(categories(source), expected);
}

#[test]
fn narrowing_through_if_none_check_removes_maybe() {
    let source = "\
def f(x):
    if x is None:
        y = 1
    else:
        y = x
    return y
";
    let result = check_source(&PathBuf::from("scenario.py"), source).unwrap();
    assert!(result.diagnostics.is_empty());
}

#[test]
fn unification_across_if_else_branches_is_a_union() {
    let source = "\
if True:
    v = 1
else:
    v = 'a'
";
    let result = check_source(&PathBuf::from("scenario.py"), source).unwrap();
    let v = result.module_scope.get("v").unwrap();
    match &v.type_ {
        pytype_checker::types::Type::Union(alts) => assert_eq!(alts.len(), 2),
        other => panic!("expected a union, got {other:?}"),
    }
}

#[test]
fn recursive_function_does_not_hang() {
    let source = "\
def fact(n):
    if n <= 1:
        return 1
    return n * fact(n - 1)
";
    // The important assertion is that this terminates at all; the recursion guard in
    // FunctionEvaluator is what prevents infinite regress here.
    let result = check_source(&PathBuf::from("scenario.py"), source);
    assert!(result.is_ok());
}

#[test]
fn class_instantiation_types_as_instance() {
    let source = "\
class Point:
    def __init__(self, x):
        self.x = x

p = Point(1)
";
    let result = check_source(&PathBuf::from("scenario.py"), source).unwrap();
    match &result.module_scope.get("p").unwrap().type_ {
        pytype_checker::types::Type::Instance(instance) => assert_eq!(instance.class_name, "Point"),
        other => panic!("expected instance, got {other:?}"),
    }
}

#[test]
fn for_loop_body_does_not_leak_into_enclosing_scope() {
    // The loop's own scope is discarded wholesale when the `for` ends, so a rebinding inside the
    // body (`total = n`) never reaches the name's pre-loop value.
    let source = "\
total = 0
for n in [1, 2, 3]:
    total = n
";
    let result = check_source(&PathBuf::from("scenario.py"), source).unwrap();
    assert_eq!(
        result.module_scope.get("total").unwrap().type_,
        pytype_checker::types::Type::Num
    );
}

#[test]
fn for_loop_target_is_undefined_after_the_loop() {
    let source = "\
for i in [1, 2, 3]:
    j = i
";
    let result = check_source(&PathBuf::from("scenario.py"), source).unwrap();
    assert!(result.module_scope.get("i").is_none());
    assert!(result.module_scope.get("j").is_none());
}
