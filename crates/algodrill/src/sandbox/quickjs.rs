//! Default loader: an embedded QuickJS engine through rquickjs
//!
//! Every load gets its own runtime and context, so nothing survives from one
//! run to the next. The runtime's interrupt handler polls the kill switch and
//! charges the step budget; an interrupt raises an exception the submission
//! cannot catch.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use rquickjs::context::EvalOptions;
use rquickjs::function::Rest;
use rquickjs::{CatchResultExt, CaughtError, Coerced, Context, Ctx, Function, Object, Persistent, Runtime, Value};
use serde_json::Value as Json;
use tracing::{debug, instrument};

use crate::compiler::CompiledUnit;
use crate::compiler::scan::is_word_char;
use crate::sandbox::{
    Callable, CodeLoader, ConsoleLevel, ConsoleSink, Interruption, Invocation, InvokeError, KillSwitch, LoadContext,
    LoadError, inspect,
};
use crate::types::ExecutionLimits;

/// File name submissions are evaluated under
const SCRIPT_NAME: &str = "submission.js";

type Halted = Rc<Cell<Option<Interruption>>>;

/// Loads submissions into a fresh QuickJS runtime per run
#[derive(Debug, Clone, Copy, Default)]
pub struct QuickJsLoader;

impl CodeLoader for QuickJsLoader {
    #[instrument(skip_all, fields(entry = %entry))]
    fn load(&self, unit: &CompiledUnit, entry: &str, ctx: LoadContext) -> Result<Box<dyn Callable>, LoadError> {
        let LoadContext { limits, kill, console } = ctx;

        let runtime = Runtime::new().map_err(engine_error)?;
        runtime.set_max_stack_size(limits.engine_stack_bytes());
        runtime.set_memory_limit(limits.memory_limit_bytes());
        let halted = Halted::default();
        runtime.set_interrupt_handler(Some(interrupt_handler(kill, limits.max_steps, halted.clone())));
        let context = Context::full(&runtime).map_err(engine_error)?;

        let writer = Rc::new(RefCell::new(ConsoleWriter {
            sink: console,
            written: 0,
            max: limits.console_lines(),
        }));
        let function = context.with(|ctx| {
            install_console(&ctx, &writer).map_err(engine_error)?;

            let mut options = EvalOptions::default();
            options.filename = Some(SCRIPT_NAME.to_string());
            ctx.eval_with_options::<Value, _>(unit.script(), options)
                .catch(&ctx)
                .map_err(|caught| match halted.get() {
                    Some(reason) => LoadError::Interrupted(reason),
                    None => LoadError::TopLevel(describe(caught)),
                })?;

            let value = lookup(&ctx, entry)
                .catch(&ctx)
                .map_err(|caught| LoadError::TopLevel(describe(caught)))?;
            if value.is_undefined() {
                return Err(LoadError::EntryPointMissing(entry.to_string()));
            }
            let function = value
                .into_function()
                .ok_or_else(|| LoadError::NotCallable(entry.to_string()))?;
            Ok(Persistent::save(&ctx, function))
        })?;

        debug!("submission loaded");
        Ok(Box::new(QuickJsCallable {
            function,
            context,
            halted,
        }))
    }
}

fn engine_error(e: rquickjs::Error) -> LoadError {
    LoadError::Engine(e.to_string())
}

/// Interrupt callback: runs every [`ExecutionLimits::STEPS_PER_CHECK`] steps
fn interrupt_handler(kill: KillSwitch, max_steps: Option<u64>, halted: Halted) -> Box<dyn FnMut() -> bool> {
    let mut steps = 0u64;
    Box::new(move || {
        steps = steps.saturating_add(ExecutionLimits::STEPS_PER_CHECK);
        let reason = if kill.is_tripped() {
            Some(Interruption::Killed)
        } else if max_steps.is_some_and(|max| steps >= max) {
            Some(Interruption::StepBudgetExhausted)
        } else {
            None
        };
        if reason.is_some() {
            halted.set(reason);
        }
        reason.is_some()
    })
}

/// Value bound to `entry` after the script ran
///
/// Function declarations land on the global object; `let`/`const`/`class`
/// bindings do not, so those are read back by name.
fn lookup<'js>(ctx: &Ctx<'js>, entry: &str) -> rquickjs::Result<Value<'js>> {
    let global: Value = ctx.globals().get(entry)?;
    let identifier =
        entry.chars().all(is_word_char) && entry.chars().next().is_some_and(|c| !c.is_ascii_digit());
    if !global.is_undefined() || !identifier {
        return Ok(global);
    }
    ctx.eval(format!("typeof {entry} === 'undefined' ? undefined : {entry}"))
}

/// Message a learner sees for a thrown value
fn describe(caught: CaughtError<'_>) -> String {
    match caught {
        CaughtError::Exception(exception) => exception
            .message()
            .unwrap_or_else(|| inspect::format_argument(exception.as_value())),
        CaughtError::Value(value) => value
            .as_object()
            .and_then(|object| object.get::<_, Option<Coerced<String>>>("message").ok().flatten())
            .map_or_else(|| inspect::format_argument(&value), |message| message.0),
        CaughtError::Error(e) => e.to_string(),
    }
}

struct ConsoleWriter {
    sink: Box<dyn ConsoleSink>,
    written: usize,
    max: usize,
}

impl ConsoleWriter {
    fn write(&mut self, level: ConsoleLevel, line: String) {
        if self.written >= self.max {
            return;
        }
        self.written += 1;
        self.sink.write(level, line);
    }
}

fn install_console<'js>(ctx: &Ctx<'js>, writer: &Rc<RefCell<ConsoleWriter>>) -> rquickjs::Result<()> {
    let console = Object::new(ctx.clone())?;
    for (name, level) in [
        ("log", ConsoleLevel::Log),
        ("info", ConsoleLevel::Log),
        ("debug", ConsoleLevel::Log),
        ("warn", ConsoleLevel::Warn),
        ("error", ConsoleLevel::Error),
    ] {
        let writer = Rc::clone(writer);
        let function = Function::new(ctx.clone(), move |args: Rest<Value<'js>>| {
            let line = args
                .0
                .iter()
                .map(inspect::format_argument)
                .collect::<Vec<_>>()
                .join(" ");
            writer.borrow_mut().write(level, line);
        })?;
        console.set(name, function)?;
    }
    ctx.globals().set("console", console)
}

/// A resolved entry point and the engine that owns it
///
/// Field order matters: the persistent handle must be released before the
/// context and runtime it belongs to.
struct QuickJsCallable {
    function: Persistent<Function<'static>>,
    context: Context,
    halted: Halted,
}

impl QuickJsCallable {
    fn fail(&self, caught: CaughtError<'_>) -> InvokeError {
        match self.halted.get() {
            Some(reason) => InvokeError::Interrupted(reason),
            None => InvokeError::Thrown(describe(caught)),
        }
    }
}

impl Callable for QuickJsCallable {
    fn invoke(&mut self, args: &[Json]) -> Result<Invocation, InvokeError> {
        if let Some(reason) = self.halted.get() {
            return Err(InvokeError::Interrupted(reason));
        }
        let encoded = serde_json::to_string(args).map_err(|e| InvokeError::Thrown(e.to_string()))?;

        self.context.with(|ctx| {
            let function = self
                .function
                .clone()
                .restore(&ctx)
                .map_err(|e| InvokeError::Thrown(e.to_string()))?;

            // Fresh engine values for every call; nothing is shared with the
            // stored test case or an earlier invocation
            let parsed = ctx.json_parse(encoded).catch(&ctx).map_err(|c| self.fail(c))?;
            let values = match parsed.as_array() {
                Some(array) => array
                    .iter::<Value>()
                    .collect::<rquickjs::Result<Vec<_>>>()
                    .catch(&ctx)
                    .map_err(|c| self.fail(c))?,
                None => Vec::new(),
            };
            let first = values.first().cloned();

            let returned: Value = function
                .call((Rest(values),))
                .catch(&ctx)
                .map_err(|c| self.fail(c))?;

            let first_argument = match first {
                Some(first) if returned.is_undefined() => self.export(&ctx, first)?,
                _ => None,
            };
            let returned = self.export(&ctx, returned)?;
            Ok(Invocation {
                returned,
                first_argument,
            })
        })
    }
}

impl QuickJsCallable {
    /// JSON form of `value` as `JSON.stringify` produces it; `None` for
    /// `undefined` and functions
    fn export<'js>(&self, ctx: &Ctx<'js>, value: Value<'js>) -> Result<Option<Json>, InvokeError> {
        let Some(text) = ctx.json_stringify(value).catch(ctx).map_err(|c| self.fail(c))? else {
            return Ok(None);
        };
        let text = text.to_string().catch(ctx).map_err(|c| self.fail(c))?;
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| InvokeError::Thrown(format!("Cannot compare the result: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::compiler::compile;
    use crate::sandbox::{ConsoleCapture, KillSwitch};

    fn load(source: &str, entry: &str) -> Result<Box<dyn Callable>, LoadError> {
        load_with(source, entry, ExecutionLimits::default(), KillSwitch::new())
    }

    fn load_with(
        source: &str,
        entry: &str,
        limits: ExecutionLimits,
        kill: KillSwitch,
    ) -> Result<Box<dyn Callable>, LoadError> {
        let unit = compile(source).unwrap();
        QuickJsLoader.load(
            &unit,
            entry,
            LoadContext {
                limits,
                kill,
                console: Box::new(ConsoleCapture::new()),
            },
        )
    }

    /// Limits small enough for a test thread's stack
    fn small_limits() -> ExecutionLimits {
        ExecutionLimits::default()
            .with_stack_size_kb(ExecutionLimits::MB)
            .with_memory_limit_kb(64 * ExecutionLimits::MB)
    }

    #[test]
    fn invokes_with_positional_arguments() {
        let mut f = load("function add(a: number, b: number): number { return a + b; }", "add").unwrap();
        let result = f.invoke(&[json!(1), json!(2)]).unwrap();
        assert_eq!(result.returned, Some(json!(3)));
        assert_eq!(result.first_argument, None);
    }

    #[test]
    fn void_calls_report_the_mutated_first_argument() {
        let mut f = load("function rev(a: number[]): void { a.reverse(); }", "rev").unwrap();
        let result = f.invoke(&[json!([1, 2, 3])]).unwrap();
        assert_eq!(result.returned, None);
        assert_eq!(result.first_argument, Some(json!([3, 2, 1])));
    }

    #[test]
    fn inputs_are_fresh_per_invocation() {
        let mut f = load("function push(a) { a.push(9); return a.length; }", "push").unwrap();
        let input = [json!([1])];
        assert_eq!(f.invoke(&input).unwrap().returned, Some(json!(2)));
        assert_eq!(f.invoke(&input).unwrap().returned, Some(json!(2)));
    }

    #[test]
    fn results_follow_json_stringify() {
        let mut f = load(
            "function f() { return { a: undefined, b: [undefined, () => 1, NaN], c: new Map([[1, 2]]) }; }",
            "f",
        )
        .unwrap();
        assert_eq!(
            f.invoke(&[]).unwrap().returned,
            Some(json!({ "b": [null, null, null], "c": {} }))
        );
    }

    #[test]
    fn thrown_errors_carry_their_message() {
        let mut f = load("function f() { throw new Error('bad'); }", "f").unwrap();
        assert_eq!(f.invoke(&[]), Err(InvokeError::Thrown("bad".to_string())));

        let mut g = load("function g() { throw 'plain'; }", "g").unwrap();
        assert_eq!(g.invoke(&[]), Err(InvokeError::Thrown("plain".to_string())));
    }

    #[test]
    fn top_level_failures_are_load_errors() {
        match load("function f() {}\nnull.x;", "f").err() {
            Some(LoadError::TopLevel(message)) => assert!(message.contains("null"), "{message}"),
            other => panic!("expected a top-level error, got {other:?}"),
        }
        assert_eq!(
            load("const f = 1;", "f").err(),
            Some(LoadError::NotCallable("f".to_string()))
        );
        assert_eq!(
            load("function g() {}", "f").err(),
            Some(LoadError::EntryPointMissing("f".to_string()))
        );
    }

    #[test]
    fn tripped_kill_switch_interrupts() {
        let kill = KillSwitch::new();
        let mut f =
            load_with("function spin() { while (true) {} }", "spin", ExecutionLimits::default(), kill.clone()).unwrap();
        kill.trip();
        assert_eq!(f.invoke(&[]), Err(InvokeError::Interrupted(Interruption::Killed)));
        // the engine stays halted
        assert_eq!(f.invoke(&[]), Err(InvokeError::Interrupted(Interruption::Killed)));
    }

    #[test]
    fn interrupts_cannot_be_caught() {
        let kill = KillSwitch::new();
        let source = "function spin() { for (;;) { try { while (true) {} } catch (e) {} } }";
        let mut f = load_with(source, "spin", ExecutionLimits::default(), kill.clone()).unwrap();
        kill.trip();
        assert_eq!(f.invoke(&[]), Err(InvokeError::Interrupted(Interruption::Killed)));
    }

    #[test]
    fn step_budget_interrupts() {
        let limits = ExecutionLimits::default().with_max_steps(10_000);
        let mut f = load_with("function spin() { for (;;) {} }", "spin", limits, KillSwitch::new()).unwrap();
        assert_eq!(
            f.invoke(&[]),
            Err(InvokeError::Interrupted(Interruption::StepBudgetExhausted))
        );
    }

    #[test]
    fn sorting_is_interruptible() {
        let source = "function sortForever(n) {\n  const a = [];\n  for (let i = 0; i < n; i++) a.push(n - i);\n  for (;;) { a.sort(); a.sort((x, y) => y - x); }\n}";
        let limits = small_limits().with_max_steps(1_000_000);
        let mut f = load_with(source, "sortForever", limits, KillSwitch::new()).unwrap();
        assert_eq!(
            f.invoke(&[json!(10_000)]),
            Err(InvokeError::Interrupted(Interruption::StepBudgetExhausted))
        );

        let kill = KillSwitch::new();
        let mut g = load_with(source, "sortForever", small_limits(), kill.clone()).unwrap();
        kill.trip();
        assert_eq!(g.invoke(&[json!(10_000)]), Err(InvokeError::Interrupted(Interruption::Killed)));
    }

    #[test]
    fn runaway_recursion_is_a_catchable_range_error() {
        let source = "function depth(n) { return n === 0 ? 0 : 1 + depth(n - 1); }\nfunction guarded(n) { try { return depth(n); } catch (e) { return e instanceof RangeError; } }";
        let mut f = load_with(source, "depth", small_limits(), KillSwitch::new()).unwrap();
        assert_eq!(
            f.invoke(&[json!(10_000_000)]),
            Err(InvokeError::Thrown("Maximum call stack size exceeded".to_string()))
        );
        assert_eq!(f.invoke(&[json!(100)]).unwrap().returned, Some(json!(100)));

        let mut g = load_with(source, "guarded", small_limits(), KillSwitch::new()).unwrap();
        assert_eq!(g.invoke(&[json!(10_000_000)]).unwrap().returned, Some(json!(true)));
    }

    #[test]
    fn deep_object_chains_do_not_crash_the_host() {
        let source = "function chain(n) {\n  let head = null;\n  for (let i = 0; i < n; i++) head = { next: head };\n  return head;\n}\nfunction text(n) { return String(chain(n)).length + JSON.stringify(chain(50)).length; }";
        let mut f = load_with(source, "chain", small_limits(), KillSwitch::new()).unwrap();
        assert!(matches!(f.invoke(&[json!(1_000_000)]), Err(InvokeError::Thrown(_))));
        // shallow results still export
        assert_eq!(
            f.invoke(&[json!(2)]).unwrap().returned,
            Some(json!({ "next": { "next": null } }))
        );

        let mut g = load_with(source, "text", small_limits(), KillSwitch::new()).unwrap();
        assert!(g.invoke(&[json!(1_000_000)]).unwrap().returned.is_some());
    }

    #[test]
    fn allocation_heavy_loops_stay_within_the_memory_limit() {
        let source = "function churn(n) {\n  let total = 0;\n  for (let i = 0; i < n; i++) { const scratch = [i, { i }]; total += scratch.length; }\n  return total;\n}\nfunction hoard() { const keep = []; for (;;) keep.push(new Array(1024).fill(0)); }";
        let mut f = load_with(source, "churn", small_limits(), KillSwitch::new()).unwrap();
        assert_eq!(f.invoke(&[json!(500_000)]).unwrap().returned, Some(json!(1_000_000)));

        let mut g = load_with(source, "hoard", small_limits(), KillSwitch::new()).unwrap();
        match g.invoke(&[]) {
            Err(InvokeError::Thrown(message)) => assert!(message.contains("out of memory"), "{message}"),
            other => panic!("expected an out-of-memory error, got {other:?}"),
        }
    }

    #[test]
    fn console_output_is_captured() {
        let capture = ConsoleCapture::new();
        let unit = compile("function f(x) { console.log('x is', x); console.error({ x }); return x; }").unwrap();
        let mut f = QuickJsLoader
            .load(
                &unit,
                "f",
                LoadContext {
                    limits: ExecutionLimits::default(),
                    kill: KillSwitch::new(),
                    console: Box::new(capture.clone()),
                },
            )
            .unwrap();
        f.invoke(&[json!(5)]).unwrap();
        let lines = capture.take();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "x is 5");
        assert_eq!(lines[1].level, ConsoleLevel::Error);
        assert_eq!(lines[1].text, "{ x: 5 }");
    }

    #[test]
    fn console_lines_are_bounded() {
        let capture = ConsoleCapture::new();
        let unit = compile("function f() { for (let i = 0; i < 10; i++) console.log(i); }").unwrap();
        let mut f = QuickJsLoader
            .load(
                &unit,
                "f",
                LoadContext {
                    limits: ExecutionLimits::default().with_max_console_lines(3),
                    kill: KillSwitch::new(),
                    console: Box::new(capture.clone()),
                },
            )
            .unwrap();
        f.invoke(&[]).unwrap();
        let texts: Vec<String> = capture.take().into_iter().map(|line| line.text).collect();
        assert_eq!(texts, ["0", "1", "2"]);
    }
}
