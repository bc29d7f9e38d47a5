//! Support framework.
//!
//! This module contains various utilities used by the test framework and
//! macros.

use failure::{Error, Fail};

/// Only types implementing this trait can be returned from test functions.
pub trait TestResult {
    /// Convert this value into a test result.
    fn into_result(self) -> Result<(), Error>;
}

impl<T, E> TestResult for Result<T, E>
where
    Error: From<E>,
{
    fn into_result(self) -> Result<(), Error> {
        self.map(|_| ()).map_err(From::from)
    }
}

impl TestResult for () {
    fn into_result(self) -> Result<(), Error> {
        Ok(self)
    }
}

/// Returned by [`Fixture::make`] when a fixture can't be created in this
/// environment. Tests using it are skipped instead of failed.
#[derive(Debug, Fail)]
#[fail(display = "{}", _0)]
pub struct Skip(pub &'static str);

/// Common trait implemented by test fixtures.
///
/// Test functions can take arguments of types implementing this trait. Each
/// test gets its own fresh instances.
pub trait Fixture: Sized {
    fn make() -> Result<Self, Error>;
}

/// Common trait implemented by all tests.
pub trait Test<Args: Fixture> {
    /// Result of running this test.
    type Result: TestResult;

    /// Run the test.
    fn run(&self, args: Args) -> Self::Result;
}

/// Run a test case.
pub fn run_test<A, T>(test: T)
where
    A: Fixture,
    T: Test<A>,
{
    let _ = env_logger::builder().is_test(true).try_init();

    let fixtures = match A::make() {
        Ok(fixtures) => fixtures,
        Err(err) => match err.downcast::<Skip>() {
            Ok(skip) => {
                eprintln!("skipped: {}", skip);
                return;
            }
            Err(err) => panic!("{}", err),
        },
    };

    if let Err(err) = test.run(fixtures).into_result() {
        panic!("{}", err);
    }
}

impl Fixture for () {
    fn make() -> Result<Self, Error> {
        Ok(())
    }
}

impl<R, F> Test<()> for F
where
    R: TestResult,
    F: Fn() -> R,
{
    type Result = R;

    fn run(&self, (): ()) -> R {
        self()
    }
}

macro_rules! impl_test {
    {
        $( $($id:ident),+ );+ $(;)?
    } => {
        $(
            impl<$($id),+> Fixture for ($($id,)+)
            where
                $($id: Fixture,)+
            {
                fn make() -> Result<Self, Error> {
                    Ok((
                        $(<$id as Fixture>::make()?,)+
                    ))
                }
            }

            impl<$($id,)+ R, Func> Test<($($id,)+)> for Func
            where
                $($id: Fixture,)+
                R: TestResult,
                Func: Fn($($id),+) -> R,
            {
                type Result = R;

                #[allow(non_snake_case)]
                fn run(&self, ($($id,)+): ($($id,)+)) -> Self::Result {
                    self($($id),+)
                }
            }
        )+
    }
}

impl_test! {
    A;
    A, B;
}
