//! Behavioural tests for locale validation and fallback resolution.

use std::cell::RefCell;

use compass_core::{Locale, UnknownVariant, fallback_chain};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

#[derive(Debug, Default)]
struct LocaleWorld {
    requested: RefCell<String>,
    outcome: RefCell<Option<Result<Vec<Locale>, UnknownVariant>>>,
}

#[fixture]
fn world() -> LocaleWorld {
    LocaleWorld::default()
}

#[given("the requested locale code {code:word}")]
fn given_code(world: &LocaleWorld, code: String) {
    world.requested.replace(code.trim_matches('"').to_owned());
}

#[when("the fallback chain is resolved")]
fn when_resolved(world: &LocaleWorld) {
    let outcome = Locale::parse(&world.requested.borrow())
        .map(|locale| fallback_chain(locale).iter().collect());
    world.outcome.replace(Some(outcome));
}

#[then("the chain is {expected:word}")]
fn then_chain(world: &LocaleWorld, expected: String) {
    let binding = world.outcome.borrow();
    let chain = binding
        .as_ref()
        .expect("resolution should have run")
        .as_ref()
        .expect("locale should be supported");
    let codes: Vec<&str> = chain.iter().map(|locale| locale.as_str()).collect();
    assert_eq!(codes.join(","), expected.trim_matches('"'));
}

#[then("the locale is reported as unsupported")]
fn then_unsupported(world: &LocaleWorld) {
    let binding = world.outcome.borrow();
    let outcome = binding.as_ref().expect("resolution should have run");
    let err = outcome.as_ref().expect_err("pt is not a supported locale");
    assert_eq!(err.value, "pt");
}

#[scenario(path = "tests/features/locale_fallback.feature", index = 0)]
fn arabic_chain(world: LocaleWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/locale_fallback.feature", index = 1)]
fn german_chain(world: LocaleWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/locale_fallback.feature", index = 2)]
fn english_chain(world: LocaleWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/locale_fallback.feature", index = 3)]
fn unsupported_tag(world: LocaleWorld) {
    let _ = world;
}
