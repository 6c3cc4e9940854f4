mod compile;

/// The `pass` tests in `tests/pass/` are compiled and run as standalone
/// crates, which checks that the generated impls do not depend on anything
/// imported at the derive site.
#[cfg_attr(miri, ignore = "incompatible with miri")]
#[test]
fn test_compile_pass() {
    let t = trybuild::TestCases::new();
    t.pass("tests/pass/*.rs");
}
