//! End-to-end dispatch scenarios, built directly as [`CodeUnit`] fixtures
//! since there is no compiler front end in this crate (§6 "External
//! Interfaces" — the engine only ever consumes already-compiled IR).
//!
//! Each scenario is hand-assembled the way a compiler would emit it: a flat,
//! never-resliced command list plus a jump table keyed by the source index
//! of each block-opening command.

use std::{cell::RefCell, collections::HashMap, rc::Rc};

use pretty_assertions::assert_eq;
use script_vm::{
    Argument, Command, CodeUnit, Engine, ErrorKind, FunctionRegistry, JumpTable, Keyword, Literal,
    Request, RequestOptions, Tracer, TypeRegistry, register_builtin_types,
};

fn lit_int(v: i64) -> Argument {
    Argument::literal(Literal::Int(v))
}

fn lit_str(s: &str) -> Argument {
    Argument::literal(Literal::String(Rc::from(s)))
}

fn lit_null() -> Argument {
    Argument::null()
}

fn ident(name: &str) -> Argument {
    Argument::literal(Literal::Identifier(Rc::from(name)))
}

fn obj(name: &str) -> Argument {
    Argument::object_stack(name)
}

fn rs() -> Argument {
    Argument::return_stack()
}

fn cmd(source_index: usize, request: Request, args: Vec<Argument>) -> Command {
    Command { request, source_index, options: RequestOptions::default(), args }
}

fn cmd_opts(source_index: usize, request: Request, args: Vec<Argument>, options: RequestOptions) -> Command {
    Command { request, source_index, options, args }
}

fn kw(k: Keyword) -> Request {
    Request::Command(k)
}

fn call(id: &str) -> Request {
    Request::Ext { id: Rc::from(id), domain: None }
}

fn block(nest: usize, nest_end: usize) -> RequestOptions {
    RequestOptions { nest: Some(nest), nest_end: Some(nest_end), ..Default::default() }
}

fn void(mut options: RequestOptions) -> RequestOptions {
    options.void_call = true;
    options
}

fn unit(commands: Vec<Command>, jump_table: HashMap<usize, Vec<usize>>) -> Rc<CodeUnit> {
    Rc::new(CodeUnit { commands, jump_table: JumpTable(jump_table) })
}

fn engine() -> Engine {
    let mut types = TypeRegistry::new();
    let mut functions = FunctionRegistry::new();
    register_builtin_types(&mut types, &mut functions);
    Engine::new(types, functions)
}

/// `x = 2 * 3 + 4; return [x, typeid(x)]`
#[test]
fn arithmetic_binds_and_reports_its_own_type() {
    let code = unit(
        vec![
            cmd(0, kw(Keyword::Mul), vec![lit_int(2), lit_int(3)]),
            cmd(1, kw(Keyword::Add), vec![rs(), lit_int(4)]),
            cmd_opts(2, kw(Keyword::Bind), vec![ident("x"), rs()], void(RequestOptions::default())),
            cmd(3, kw(Keyword::TypeId), vec![obj("x")]),
            cmd(4, kw(Keyword::Return), vec![obj("x"), rs()]),
        ],
        HashMap::new(),
    );

    let result = engine().run(code).expect("arithmetic scenario should not error");
    let slots = result.array_slots().expect("return of 2 values yields an array");
    let slots = slots.borrow();
    assert_eq!(slots[0].borrow().as_int(), Some(10));
    assert_eq!(slots[1].borrow().as_str().as_deref(), Some("int"));
}

/// Records the maximum frame-stack depth observed via `on_call`.
#[derive(Clone, Default)]
struct DepthTracer {
    max_depth: Rc<RefCell<usize>>,
}

impl Tracer for DepthTracer {
    fn on_call(&mut self, _function_name: &str, depth: usize) {
        let mut max = self.max_depth.borrow_mut();
        if depth > *max {
            *max = depth;
        }
    }
}

/// A tail-recursive `fact_acc(n, acc)`, called once as a regular call; every
/// further recursive step must reuse that same frame (§4.4, §8 "call-stack
/// depth never exceeds its pre-call value + 1").
///
/// ```text
/// fn fact_acc(n, acc)
///     if n <= 1
///         return acc
///     end
///     return fact_acc(n - 1, n * acc)
/// end
/// result = fact_acc(5, 1)
/// return result
/// ```
#[test]
fn tail_recursive_factorial_reuses_its_frame() {
    let code = unit(
        vec![
            /* 0  fn fact_acc(n, acc) */ cmd_opts(0, kw(Keyword::Fn), vec![ident("fact_acc"), ident("n"), ident("acc")], block(0, 9)),
            /* 1  n <= 1 */ cmd(1, kw(Keyword::Le), vec![obj("n"), lit_int(1)]),
            /* 2  if */ cmd_opts(2, kw(Keyword::If), vec![rs()], block(2, 4)),
            /* 3  return acc */ cmd(3, kw(Keyword::Return), vec![obj("acc")]),
            /* 4  end if */ cmd(4, kw(Keyword::EndIf), vec![]),
            /* 5  n - 1 */ cmd(5, kw(Keyword::Sub), vec![obj("n"), lit_int(1)]),
            /* 6  n * acc */ cmd(6, kw(Keyword::Mul), vec![obj("n"), obj("acc")]),
            /* 7  fact_acc(n-1, n*acc), tail position */ cmd(7, call("fact_acc"), vec![rs(), rs()]),
            /* 8  return <call result> */ cmd(8, kw(Keyword::Return), vec![rs()]),
            /* 9  end fn */ cmd(9, kw(Keyword::EndFn), vec![]),
            /* 10 fact_acc(5, 1), regular call */ cmd(10, call("fact_acc"), vec![lit_int(5), lit_int(1)]),
            /* 11 result = <call result> */ cmd_opts(11, kw(Keyword::Bind), vec![ident("result"), rs()], void(RequestOptions::default())),
            /* 12 return result */ cmd(12, kw(Keyword::Return), vec![obj("result")]),
        ],
        HashMap::new(),
    );

    let max_depth = Rc::new(RefCell::new(0usize));
    let mut engine = engine();
    engine.set_tracer(Box::new(DepthTracer { max_depth: Rc::clone(&max_depth) }));

    let result = engine.run(code).expect("factorial scenario should not error");
    assert_eq!(result.as_int(), Some(120));
    assert!(*max_depth.borrow() <= 2, "tail recursion must not grow the frame stack past depth 2, got {}", *max_depth.borrow());
}

/// `s = ""; for c in "abc" do s = s + c end; return s` — foreach over a
/// string's characters, exercising the `head`/`tail`/`obj`/`step_forward`
/// iterator protocol and `__iterator` surviving scope-clear on re-entry.
#[test]
fn foreach_concatenates_a_strings_characters() {
    let code = unit(
        vec![
            /* 0 s = "" */ cmd(0, kw(Keyword::Bind), vec![ident("s"), lit_str("")]),
            /* 1 for c in "abc" */ cmd_opts(1, kw(Keyword::For), vec![lit_str("abc"), ident("c")], block(1, 4)),
            /* 2 s + c */ cmd(2, kw(Keyword::Add), vec![obj("s"), obj("c")]),
            /* 3 s = <result> */ cmd(3, kw(Keyword::Bind), vec![ident("s"), rs()]),
            /* 4 end for */ cmd_opts(4, kw(Keyword::EndFor), vec![], RequestOptions { nest: Some(1), ..Default::default() }),
            /* 5 return s */ cmd(5, kw(Keyword::Return), vec![obj("s")]),
        ],
        HashMap::new(),
    );

    let result = engine().run(code).expect("foreach scenario should not error");
    assert_eq!(result.as_str().as_deref(), Some("abc"));
}

/// ```text
/// result = null
/// case 2
///     when 1: result = "a"
///     when 2, 3: result = "b"
///     else: result = "c"
/// end
/// return result
/// ```
/// `when 2, 3` matches, so the arm body runs and the later arms (including
/// `else`) are skipped via the matched-branch fallthrough jump.
#[test]
fn case_when_matches_the_first_satisfied_arm() {
    let code = unit(
        vec![
            /* 0 result = null */ cmd(0, kw(Keyword::Bind), vec![ident("result"), lit_null()]),
            /* 1 case 2 */ cmd_opts(1, kw(Keyword::Case), vec![lit_int(2)], block(1, 8)),
            /* 2 when 1 */ cmd(2, kw(Keyword::When), vec![lit_int(1)]),
            /* 3 result = "a" */ cmd(3, kw(Keyword::Bind), vec![ident("result"), lit_str("a")]),
            /* 4 when 2, 3 */ cmd(4, kw(Keyword::When), vec![lit_int(2), lit_int(3)]),
            /* 5 result = "b" */ cmd(5, kw(Keyword::Bind), vec![ident("result"), lit_str("b")]),
            /* 6 else */ cmd(6, kw(Keyword::Else), vec![]),
            /* 7 result = "c" */ cmd(7, kw(Keyword::Bind), vec![ident("result"), lit_str("c")]),
            /* 8 end case */ cmd(8, kw(Keyword::EndCase), vec![]),
            /* 9 return result */ cmd(9, kw(Keyword::Return), vec![obj("result")]),
        ],
        HashMap::from([(1, vec![2, 4, 6])]),
    );

    let result = engine().run(code).expect("case/when scenario should not error");
    assert_eq!(result.as_str().as_deref(), Some("b"));
}

/// ```text
/// fn make(n)
///     fn closure_fn(x)
///         return x + n
///     end
///     n = 999
///     return closure_fn
/// end
/// add5 = make(5)
/// result = add5(7)
/// return result
/// ```
/// `closure_fn` captures `n`'s value (5) at definition time; `make`'s later
/// mutation of its own `n` must not reach the already-bound closure (§4.6).
#[test]
fn closure_capture_is_independent_of_later_mutation() {
    let code = unit(
        vec![
            /* 0  fn make(n) */ cmd_opts(0, kw(Keyword::Fn), vec![ident("make"), ident("n")], block(0, 7)),
            /* 1  fn closure_fn(x) */ cmd_opts(1, kw(Keyword::Fn), vec![ident("closure_fn"), ident("x")], block(1, 4)),
            /* 2  x + n */ cmd(2, kw(Keyword::Add), vec![obj("x"), obj("n")]),
            /* 3  return <result> */ cmd(3, kw(Keyword::Return), vec![rs()]),
            /* 4  end fn (closure_fn) */ cmd(4, kw(Keyword::EndFn), vec![]),
            /* 5  n = 999 */ cmd(5, kw(Keyword::Bind), vec![ident("n"), lit_int(999)]),
            /* 6  return closure_fn */ cmd(6, kw(Keyword::Return), vec![obj("closure_fn")]),
            /* 7  end fn (make) */ cmd(7, kw(Keyword::EndFn), vec![]),
            /* 8  make(5) */ cmd(8, call("make"), vec![lit_int(5)]),
            /* 9  add5 = <result> */ cmd_opts(9, kw(Keyword::Bind), vec![ident("add5"), rs()], void(RequestOptions::default())),
            /* 10 add5(7) */ cmd(10, call("add5"), vec![lit_int(7)]),
            /* 11 result = <result> */ cmd_opts(11, kw(Keyword::Bind), vec![ident("result"), rs()], void(RequestOptions::default())),
            /* 12 return result */ cmd(12, kw(Keyword::Return), vec![obj("result")]),
        ],
        HashMap::new(),
    );

    let result = engine().run(code).expect("closure scenario should not error");
    assert_eq!(result.as_int(), Some(12));
}

/// Calling a 2-parameter `Normal` function with 3 arguments raises a
/// `TypeOrArity` error tagged at the offending call's own source index.
#[test]
fn calling_with_too_many_arguments_is_a_type_or_arity_error() {
    let code = unit(
        vec![
            /* 0 fn add2(a, b) */ cmd_opts(0, kw(Keyword::Fn), vec![ident("add2"), ident("a"), ident("b")], block(0, 3)),
            /* 1 a + b */ cmd(1, kw(Keyword::Add), vec![obj("a"), obj("b")]),
            /* 2 return <result> */ cmd(2, kw(Keyword::Return), vec![rs()]),
            /* 3 end fn */ cmd(3, kw(Keyword::EndFn), vec![]),
            /* 4 add2(1, 2, 3) */ cmd(4, call("add2"), vec![lit_int(1), lit_int(2), lit_int(3)]),
        ],
        HashMap::new(),
    );

    let err = engine().run(code).expect_err("too many arguments must be rejected");
    assert_eq!(err.kind, ErrorKind::TypeOrArity);
    assert_eq!(err.source_index, Some(4));
    assert!(err.message.contains("too many"), "unexpected message: {}", err.message);
}

/// A non-tail-position call to a function whose body falls off the end
/// without an explicit `return` must pop exactly that function's own frame
/// (bounded by its `body_end`, not the whole never-resliced code unit), not
/// keep decoding the caller's trailing top-level commands inside the
/// callee's frame (§4.1 step 3: "if idx == code.size and depth > 1, pop the
/// frame... and continue").
///
/// ```text
/// fn noop(n)
///     n + 1
/// end
/// result = noop(5)
/// return result
/// ```
/// `noop`'s body never reaches a `return`, so falling off its end must
/// yield `null` and unwind back to depth 1.
#[test]
fn falling_off_a_called_functions_body_returns_null_and_unwinds_one_frame() {
    let code = unit(
        vec![
            /* 0 fn noop(n) */ cmd_opts(0, kw(Keyword::Fn), vec![ident("noop"), ident("n")], block(0, 2)),
            /* 1 n + 1 */ cmd(1, kw(Keyword::Add), vec![obj("n"), lit_int(1)]),
            /* 2 end fn */ cmd(2, kw(Keyword::EndFn), vec![]),
            /* 3 noop(5), regular (non-tail) call */ cmd(3, call("noop"), vec![lit_int(5)]),
            /* 4 result = <call result> */ cmd_opts(4, kw(Keyword::Bind), vec![ident("result"), rs()], void(RequestOptions::default())),
            /* 5 return result */ cmd(5, kw(Keyword::Return), vec![obj("result")]),
        ],
        HashMap::new(),
    );

    let result = engine().run(code).expect("falling off a function body should not error");
    assert!(result.is_null(), "expected null from a function that never executed `return`, got {result:?}");
}

/// Ordering comparisons on strings (`<`/`<=`/`>`/`>=`) yield `null` rather
/// than an error: only `+`/`==`/`!=` are legal string operators (§4.5), and
/// "other operators return null" for the plain-string case, the same rule
/// `exec_arith` already applies to `-`/`*`/`/` on strings.
#[test]
fn ordering_comparison_on_strings_yields_null_not_an_error() {
    let code = unit(
        vec![
            /* 0 "a" < "b" */ cmd(0, kw(Keyword::Lt), vec![lit_str("a"), lit_str("b")]),
            /* 1 return <result> */ cmd(1, kw(Keyword::Return), vec![rs()]),
        ],
        HashMap::new(),
    );

    let result = engine().run(code).expect("string ordering comparison should not error");
    assert!(result.is_null(), "expected null for a string ordering comparison, got {result:?}");
}
