/// Sandboxed Evaluator - runs transpiled solutions on V8
///
/// **Isolation:**
/// Every evaluation gets a fresh isolate and context. Beyond the JavaScript
/// builtins (`Date`, `Math`, `JSON`, `Promise`, ...) the program only sees
/// the names the prelude passes in: `console`, `readline` and the timer
/// functions. There is no filesystem, network or host object surface.
/// This is not a hardened security boundary.
///
/// **Event loop:**
/// The program body runs as an async function. Microtasks are drained from
/// Rust; when the program is still pending and no microtask is left, the
/// earliest due timer fires on a virtual clock. Timers still scheduled once
/// the program settles are dropped.

use crate::transpiler;
use dojo_common::config::SandboxConfig;
use dojo_common::types::{ExecutionError, ExecutionResult};
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::time::Instant;
use tracing::{debug, info};
use v8::{Context, ContextScope, HandleScope, Script};

static V8_PLATFORM: Lazy<()> = Lazy::new(|| {
    let platform = v8::new_default_platform(0, false).make_shared();
    v8::V8::initialize_platform(platform);
    v8::V8::initialize();
    info!("V8 platform initialized");
});

/// Evaluates to a function taking `(source, input)` and returning
/// `{ done, tick, logs }`. `source` is compiled with the AsyncFunction
/// constructor, so it cannot see any of the prelude's locals.
const PRELUDE: &str = r#"
(function (source, input) {
  const lines = input.split('\n').map((line) => (line.endsWith('\r') ? line.slice(0, -1) : line));
  let cursor = 0;
  const readline = () => (cursor < lines.length ? lines[cursor++] : '');

  const logs = [];
  const format = (value) => {
    if (typeof value === 'string') return value;
    if (value === undefined) return 'undefined';
    if (value === null) return 'null';
    try {
      const json = JSON.stringify(value);
      return json === undefined ? String(value) : json;
    } catch (_) {
      return String(value);
    }
  };
  const writer = (prefix) => (...args) => {
    logs.push(prefix + args.map(format).join(' '));
  };
  const console = Object.freeze({
    log: writer(''),
    info: writer(''),
    debug: writer(''),
    warn: writer('[warn] '),
    error: writer('[error] '),
  });

  const timers = new Map();
  let nextId = 1;
  let order = 0;
  let now = 0;
  let timerFailed = false;
  let timerError;
  const schedule = (callback, delay, args, repeat) => {
    if (typeof callback !== 'function') {
      throw new TypeError('Timer callback must be a function');
    }
    const ms = Math.max(0, Number(delay) || 0);
    const id = nextId++;
    timers.set(id, { callback, args, due: now + ms, every: repeat ? Math.max(1, ms) : 0, order: order++ });
    return id;
  };
  const setTimeout = (callback, delay, ...args) => schedule(callback, delay, args, false);
  const setInterval = (callback, delay, ...args) => schedule(callback, delay, args, true);
  const clearTimeout = (id) => {
    timers.delete(id);
  };
  const clearInterval = clearTimeout;

  const tick = () => {
    let nextKey;
    let next;
    for (const [id, timer] of timers) {
      if (next === undefined || timer.due < next.due || (timer.due === next.due && timer.order < next.order)) {
        nextKey = id;
        next = timer;
      }
    }
    if (next === undefined) return false;

    now = Math.max(now, next.due);
    if (next.every > 0) {
      next.due = now + next.every;
      next.order = order++;
    } else {
      timers.delete(nextKey);
    }
    try {
      next.callback(...next.args);
    } catch (err) {
      if (!timerFailed) {
        timerFailed = true;
        timerError = err;
      }
    }
    return true;
  };

  const describe = (err) => {
    if (err !== null && typeof err === 'object' && typeof err.message === 'string' && err.message !== '') {
      return err.message;
    }
    try {
      return String(err);
    } catch (_) {
      return 'Unknown error';
    }
  };

  const AsyncFunction = Object.getPrototypeOf(async function () {}).constructor;
  const done = (async () => {
    let error = null;
    try {
      const program = new AsyncFunction(
        'console', 'readline', 'setTimeout', 'clearTimeout', 'setInterval', 'clearInterval',
        source,
      );
      await program(console, readline, setTimeout, clearTimeout, setInterval, clearInterval);
    } catch (err) {
      error = describe(err);
    }
    if (error === null && timerFailed) {
      error = describe(timerError);
    }
    return { logs: logs.slice(), error };
  })();

  return { done, tick, logs };
})
"#;

#[derive(Debug, Deserialize)]
struct SandboxReport {
    logs: Vec<String>,
    error: Option<String>,
}

impl SandboxReport {
    fn into_result(self) -> ExecutionResult {
        ExecutionResult {
            logs: self.logs,
            error: self.error.map(ExecutionError::Runtime),
        }
    }
}

fn sandbox_failure(what: &str) -> ExecutionError {
    ExecutionError::Runtime(format!("Sandbox failure: {}", what))
}

/// In-process evaluator for transpiled TypeScript
#[derive(Debug, Clone)]
pub struct Sandbox {
    config: SandboxConfig,
}

impl Sandbox {
    pub fn new(config: SandboxConfig) -> Self {
        Lazy::force(&V8_PLATFORM);
        Self { config }
    }

    /// Transpile then evaluate. A compile error is returned without
    /// ever creating an isolate.
    pub async fn run_typescript(&self, source: &str, input: &str) -> ExecutionResult {
        let source = source.to_string();
        let input = input.to_string();
        let config = self.config.clone();

        Self::blocking(move || match transpiler::transpile(&source) {
            Ok(code) => Self::evaluate_sync(&code, &input, &config),
            Err(error) => {
                debug!(error = %error, "Transpilation failed");
                ExecutionResult::failed(Vec::new(), error)
            }
        })
        .await
    }

    /// Evaluate already transpiled JavaScript
    pub async fn evaluate(&self, code: &str, input: &str) -> ExecutionResult {
        let code = code.to_string();
        let input = input.to_string();
        let config = self.config.clone();

        Self::blocking(move || Self::evaluate_sync(&code, &input, &config)).await
    }

    async fn blocking<F>(job: F) -> ExecutionResult
    where
        F: FnOnce() -> ExecutionResult + Send + 'static,
    {
        tokio::task::spawn_blocking(job).await.unwrap_or_else(|e| {
            ExecutionResult::failed(
                Vec::new(),
                ExecutionError::Runtime(format!("Sandbox task failed: {}", e)),
            )
        })
    }

    fn evaluate_sync(code: &str, input: &str, config: &SandboxConfig) -> ExecutionResult {
        Lazy::force(&V8_PLATFORM);
        let start = Instant::now();

        macro_rules! require {
            ($value:expr, $what:literal) => {
                match $value {
                    Some(value) => value,
                    None => return ExecutionResult::failed(Vec::new(), sandbox_failure($what)),
                }
            };
        }

        let isolate = &mut v8::Isolate::new(v8::CreateParams::default());
        let scope = std::pin::pin!(HandleScope::new(isolate));
        let scope = &mut scope.init();
        let v8_context = Context::new(scope, Default::default());
        let scope = &mut ContextScope::new(scope, v8_context);

        let prelude = require!(v8::String::new(scope, PRELUDE), "cannot allocate prelude");
        let prelude = require!(Script::compile(scope, prelude, None), "prelude does not compile");
        let prelude = require!(prelude.run(scope), "prelude did not evaluate");
        let prelude = require!(
            v8::Local::<v8::Function>::try_from(prelude).ok(),
            "prelude is not a function"
        );

        let source_arg = require!(v8::String::new(scope, code), "cannot allocate source");
        let input_arg = require!(v8::String::new(scope, input), "cannot allocate input");
        let undefined: v8::Local<v8::Value> = v8::undefined(scope).into();

        let handle = require!(
            prelude.call(scope, undefined, &[source_arg.into(), input_arg.into()]),
            "prelude call failed"
        );
        let handle = require!(
            v8::Local::<v8::Object>::try_from(handle).ok(),
            "prelude returned no handle"
        );

        let key = require!(v8::String::new(scope, "done"), "cannot allocate key");
        let done = require!(handle.get(scope, key.into()), "missing completion promise");
        let done = require!(
            v8::Local::<v8::Promise>::try_from(done).ok(),
            "completion is not a promise"
        );
        let key = require!(v8::String::new(scope, "tick"), "cannot allocate key");
        let tick = require!(handle.get(scope, key.into()), "missing timer driver");
        let tick = require!(
            v8::Local::<v8::Function>::try_from(tick).ok(),
            "timer driver is not a function"
        );
        let key = require!(v8::String::new(scope, "logs"), "cannot allocate key");
        let logs = require!(handle.get(scope, key.into()), "missing log buffer");

        // Logs captured so far, for failures that happen while the program is still pending
        macro_rules! partial_logs {
            () => {{
                let json = v8::json::stringify(scope, logs);
                json.map(|s| s.to_rust_string_lossy(scope))
                    .and_then(|s| serde_json::from_str::<Vec<String>>(&s).ok())
                    .unwrap_or_default()
            }};
        }

        let mut fired: u32 = 0;
        loop {
            scope.perform_microtask_checkpoint();
            if done.state() != v8::PromiseState::Pending {
                break;
            }

            if fired >= config.max_timer_callbacks {
                return ExecutionResult::failed(
                    partial_logs!(),
                    ExecutionError::Runtime(format!(
                        "Execution stopped after {} timer callbacks without finishing",
                        fired
                    )),
                );
            }

            let ran = tick
                .call(scope, undefined, &[])
                .map(|value| value.is_true())
                .unwrap_or(false);
            if !ran {
                return ExecutionResult::failed(
                    partial_logs!(),
                    ExecutionError::Runtime(
                        "Execution never settled: the program is waiting on a promise that nothing can resolve"
                            .to_string(),
                    ),
                );
            }
            fired += 1;
        }

        let outcome = done.result(scope);
        if done.state() == v8::PromiseState::Rejected {
            let reason = outcome
                .to_string(scope)
                .map(|s| s.to_rust_string_lossy(scope))
                .unwrap_or_else(|| "Unknown error".to_string());
            return ExecutionResult::failed(partial_logs!(), ExecutionError::Runtime(reason));
        }

        let json = require!(v8::json::stringify(scope, outcome), "cannot serialize report");
        let json = json.to_rust_string_lossy(scope);
        let result = match serde_json::from_str::<SandboxReport>(&json) {
            Ok(report) => report.into_result(),
            Err(e) => ExecutionResult::failed(
                Vec::new(),
                sandbox_failure(&format!("malformed report: {}", e)),
            ),
        };

        debug!(
            lines = result.logs.len(),
            timer_callbacks = fired,
            failed = result.error.is_some(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Sandbox evaluation finished"
        );
        result
    }
}

impl Default for Sandbox {
    fn default() -> Self {
        Self::new(SandboxConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(code: &str, input: &str) -> ExecutionResult {
        Sandbox::evaluate_sync(code, input, &SandboxConfig::default())
    }

    fn runtime_message(result: &ExecutionResult) -> &str {
        match &result.error {
            Some(ExecutionError::Runtime(msg)) => msg,
            other => panic!("expected runtime error, got {:?}", other),
        }
    }

    #[test]
    fn test_readline_exhaustion() {
        let result = eval(
            "console.log(readline()); console.log(readline()); console.log(JSON.stringify(readline()));",
            "1\n2",
        );
        assert!(result.is_ok());
        assert_eq!(result.logs, vec!["1", "2", "\"\""]);
    }

    #[test]
    fn test_readline_strips_carriage_returns() {
        let result = eval("console.log(JSON.stringify([readline(), readline()]));", "a\r\nb");
        assert_eq!(result.logs, vec![r#"["a","b"]"#]);
    }

    #[test]
    fn test_log_formatting() {
        let code = r#"
            console.log(undefined);
            console.log({ a: 1 });
            console.log("x", 5);
            console.log(null);
            console.log([1, "two"], true);
            console.info("info");
            console.warn("careful");
            console.error("bad", { code: 2 });
        "#;
        let result = eval(code, "");
        assert!(result.is_ok());
        assert_eq!(
            result.logs,
            vec![
                "undefined",
                r#"{"a":1}"#,
                "x 5",
                "null",
                r#"[1,"two"] true"#,
                "info",
                "[warn] careful",
                r#"[error] bad {"code":2}"#,
            ]
        );
    }

    #[test]
    fn test_unserializable_values_fall_back_to_string() {
        let code = r#"
            const cyclic = {}; cyclic.self = cyclic;
            console.log(10n);
            console.log(cyclic);
            console.log(() => 1);
        "#;
        let result = eval(code, "");
        assert!(result.is_ok());
        assert_eq!(result.logs, vec!["10", "[object Object]", "() => 1"]);
    }

    #[test]
    fn test_runtime_error_keeps_partial_logs() {
        let result = eval("console.log('before'); throw new Error('boom'); console.log('after');", "");
        assert_eq!(result.logs, vec!["before"]);
        assert_eq!(runtime_message(&result), "boom");
    }

    #[test]
    fn test_thrown_value_without_message() {
        let result = eval("throw 'plain failure';", "");
        assert_eq!(runtime_message(&result), "plain failure");
    }

    #[test]
    fn test_rejected_await_is_captured() {
        let result = eval("await Promise.reject(new Error('nope'));", "");
        assert_eq!(runtime_message(&result), "nope");
    }

    #[test]
    fn test_awaits_timers() {
        let code = r#"
            await new Promise((resolve) => setTimeout(resolve, 50));
            console.log("after");
        "#;
        let result = eval(code, "");
        assert!(result.is_ok());
        assert_eq!(result.logs, vec!["after"]);
    }

    #[test]
    fn test_timers_fire_in_due_order() {
        let code = r#"
            setTimeout(() => console.log("b"), 20);
            setTimeout(() => console.log("a"), 10);
            setTimeout(() => console.log("a2"), 10);
            const cancelled = setTimeout(() => console.log("never"), 5);
            clearTimeout(cancelled);
            await new Promise((resolve) => setTimeout(resolve, 30));
        "#;
        let result = eval(code, "");
        assert_eq!(result.logs, vec!["a", "a2", "b"]);
    }

    #[test]
    fn test_interval_until_cleared() {
        let code = r#"
            let n = 0;
            await new Promise((resolve) => {
                const id = setInterval(() => {
                    n++;
                    if (n === 3) { clearInterval(id); resolve(); }
                }, 5);
            });
            console.log(n);
        "#;
        let result = eval(code, "");
        assert!(result.is_ok());
        assert_eq!(result.logs, vec!["3"]);
    }

    #[test]
    fn test_timer_callback_error_is_reported() {
        let code = r#"
            setTimeout(() => { throw new Error("late failure"); }, 1);
            await new Promise((resolve) => setTimeout(resolve, 5));
            console.log("finished");
        "#;
        let result = eval(code, "");
        assert_eq!(result.logs, vec!["finished"]);
        assert_eq!(runtime_message(&result), "late failure");
    }

    #[test]
    fn test_never_settling_program() {
        let result = eval("console.log('waiting'); await new Promise(() => {});", "");
        assert_eq!(result.logs, vec!["waiting"]);
        assert!(runtime_message(&result).contains("never settled"));
    }

    #[test]
    fn test_endless_interval_is_capped() {
        let config = SandboxConfig {
            max_timer_callbacks: 50,
        };
        let result = Sandbox::evaluate_sync(
            "setInterval(() => {}, 1); await new Promise(() => {});",
            "",
            &config,
        );
        assert!(runtime_message(&result).contains("50 timer callbacks"));
    }

    #[test]
    fn test_no_access_to_prelude_or_host() {
        let code = r#"
            console.log([typeof source, typeof input, typeof logs, typeof tick, typeof require, typeof process].join(","));
        "#;
        let result = eval(code, "");
        assert_eq!(
            result.logs,
            vec!["undefined,undefined,undefined,undefined,undefined,undefined"]
        );
    }

    #[test]
    fn test_builtins_available() {
        let result = eval(
            "console.log(typeof Date.now(), Math.max(1, 2), JSON.parse('{\"a\":3}').a);",
            "",
        );
        assert_eq!(result.logs, vec!["number 2 3"]);
    }

    #[test]
    fn test_fresh_scope_per_evaluation() {
        let first = eval("globalThis.leaked = 1; console.log(typeof leaked);", "");
        assert_eq!(first.logs, vec!["number"]);

        let second = eval("console.log(typeof leaked);", "");
        assert_eq!(second.logs, vec!["undefined"]);
    }

    #[tokio::test]
    async fn test_run_typescript_end_to_end() {
        let sandbox = Sandbox::default();
        let source = r#"
            const a: number = Number(readline());
            const b: number = Number(readline());
            console.log(a + b);
        "#;
        let result = sandbox.run_typescript(source, "3\n4").await;
        assert!(result.is_ok());
        assert_eq!(result.logs, vec!["7"]);
    }

    #[tokio::test]
    async fn test_evaluate_plain_javascript() {
        let sandbox = Sandbox::new(SandboxConfig::default());
        let result = sandbox
            .evaluate("console.log(readline().split(' ').reverse().join(' '));", "a b c")
            .await;
        assert_eq!(result.logs, vec!["c b a"]);
    }

    #[tokio::test]
    async fn test_compile_error_never_reaches_evaluator() {
        let sandbox = Sandbox::default();
        let result = sandbox
            .run_typescript("console.log('should not print');\nconst = ;", "")
            .await;
        assert!(result.logs.is_empty());
        assert!(matches!(result.error, Some(ExecutionError::Compile(_))));
    }
}
