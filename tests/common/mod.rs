mod db;
mod env;
mod support;

pub use self::{
    db::PgEnv,
    env::{ARTICLE, EDITOR, Env, OUTSIDER, PAGE, REPORTER},
    support::{Fixture, TestResult, run_test},
};
