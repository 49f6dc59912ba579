//! Built-in function dispatch table for `$<name args>` references.
//!
//! The table is a plain `HashMap` built once; adding a built-in means
//! registering a new entry here, not touching the evaluator's resolution
//! loop.

use std::sync::OnceLock;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

/// Serializes built-in calls that touch the process environment so two
/// periodic workers calling `setenv`/`getenv` concurrently cannot race.
static ENV_LOCK: Mutex<()> = Mutex::new(());

pub type BuiltinFn = fn(args: &str) -> Result<String, String>;

fn table() -> &'static FxHashMap<&'static str, BuiltinFn> {
    static TABLE: OnceLock<FxHashMap<&'static str, BuiltinFn>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut m: FxHashMap<&'static str, BuiltinFn> = FxHashMap::default();
        m.insert("setenv", bi_setenv);
        m.insert("getenv", bi_getenv);
        m
    })
}

pub fn lookup(name: &str) -> Option<BuiltinFn> {
    table().get(name).copied()
}

fn bi_setenv(args: &str) -> Result<String, String> {
    let (name, value) = args
        .split_once('=')
        .ok_or_else(|| format!("setenv: expected NAME=VALUE, got '{args}'"))?;
    let name = name.trim();
    let value = value.trim();
    if name.is_empty() {
        return Err("setenv: empty variable name".to_string());
    }
    let _guard = ENV_LOCK.lock();
    // SAFETY: serialized by ENV_LOCK; no other thread in this process
    // mutates the environment outside this function.
    unsafe {
        std::env::set_var(name, value);
    }
    Ok(value.to_string())
}

fn bi_getenv(args: &str) -> Result<String, String> {
    let name = args.trim();
    let _guard = ENV_LOCK.lock();
    Ok(std::env::var(name).unwrap_or_default())
}
