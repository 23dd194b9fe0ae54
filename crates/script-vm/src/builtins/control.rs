//! Control-flow built-ins (§4.5): `if/elif/else/end`, `while/end`,
//! `for/end` (foreach), `case/when/else/end`, `continue`, `break`.

use crate::{
    bytecode::Command,
    engine::Engine,
    error::{EngineError, EngineResult},
    frame::RuntimeFrame,
    limits::ResourceTracker,
    object::Object,
    registry::ArgMap,
    stack::{CASE_NAME, ITERATOR_NAME},
};

pub(crate) fn goto(frame: &mut RuntimeFrame, target: usize) {
    frame.idx = target.saturating_sub(frame.jump_offset);
    frame.disable_step = true;
}

/// Consumes the next branch target (elif/when/else) off the innermost
/// `branch_jump_stack` entry, falling back to the block's `end` (the top of
/// `jump_stack`) once the list is exhausted.
fn next_branch_or_end(frame: &mut RuntimeFrame) -> usize {
    if let Some(targets) = frame.branch_jump_stack.last_mut() {
        if !targets.is_empty() {
            return targets.remove(0);
        }
    }
    *frame.jump_stack.last().expect("branch keyword with no enclosing block")
}

fn require_bool(value: &Object, what: &str) -> EngineResult<bool> {
    value.as_bool().ok_or_else(|| EngineError::type_or_arity(format!("{what} requires a boolean")))
}

pub(crate) fn exec_if<R: ResourceTracker>(engine: &mut Engine<R>, command: &Command) -> EngineResult<()> {
    let condition = require_bool(&engine.eval_argument(&command.args[0], false)?, "if")?;

    let nest_end = command.options.nest_end.expect("if command missing nest_end");
    let branch_targets = engine.frames.last().unwrap().code.jump_table.targets(command.source_index).to_vec();

    let frame = engine.frames.last_mut().expect("if with no active frame");
    frame.jump_stack.push(nest_end);
    frame.branch_jump_stack.push(branch_targets);
    frame.scope_stack.push(false);
    frame.condition_stack.push(condition);

    if !condition {
        let target = next_branch_or_end(frame);
        goto(frame, target);
    }
    Ok(())
}

pub(crate) fn exec_elif<R: ResourceTracker>(engine: &mut Engine<R>, command: &Command) -> EngineResult<()> {
    let already_matched = *engine.frames.last().unwrap().condition_stack.last().expect("elif outside if/case");
    if already_matched {
        let frame = engine.frames.last_mut().unwrap();
        let target = *frame.jump_stack.last().expect("elif with no enclosing block");
        goto(frame, target);
        return Ok(());
    }

    let condition = require_bool(&engine.eval_argument(&command.args[0], false)?, "elif")?;
    let frame = engine.frames.last_mut().unwrap();
    *frame.condition_stack.last_mut().unwrap() = condition;
    if !condition {
        let target = next_branch_or_end(frame);
        goto(frame, target);
    }
    Ok(())
}

pub(crate) fn exec_else<R: ResourceTracker>(engine: &mut Engine<R>, _command: &Command) -> EngineResult<()> {
    let frame = engine.frames.last_mut().expect("else with no active frame");
    let already_matched = *frame.condition_stack.last().expect("else outside if/case");
    if already_matched {
        let target = *frame.jump_stack.last().expect("else with no enclosing block");
        goto(frame, target);
    } else {
        *frame.condition_stack.last_mut().unwrap() = true;
    }
    Ok(())
}

pub(crate) fn exec_end_if<R: ResourceTracker>(engine: &mut Engine<R>, _command: &Command) -> EngineResult<()> {
    let frame = engine.frames.last_mut().expect("end with no active frame");
    frame.jump_stack.pop();
    frame.branch_jump_stack.pop();
    frame.condition_stack.pop();
    if frame.scope_stack.pop() == Some(true) {
        engine.objects.pop();
    }
    Ok(())
}

pub(crate) fn exec_while<R: ResourceTracker>(engine: &mut Engine<R>, command: &Command) -> EngineResult<()> {
    let nest_end = command.options.nest_end.expect("while command missing nest_end");
    let branch_targets = engine.frames.last().unwrap().code.jump_table.targets(command.source_index).to_vec();

    let reentry = engine.frames.last().unwrap().jump_from_end;
    if reentry {
        engine.frames.last_mut().unwrap().jump_from_end = false;
    } else {
        engine.objects.push();
    }

    let condition = require_bool(&engine.eval_argument(&command.args[0], false)?, "while")?;

    let frame = engine.frames.last_mut().unwrap();
    frame.jump_stack.push(nest_end);
    frame.branch_jump_stack.push(branch_targets);
    frame.condition_stack.push(false);
    frame.scope_stack.push(true);

    if !condition {
        frame.final_cycle = true;
        goto(frame, nest_end);
    }
    Ok(())
}

pub(crate) fn exec_end_while<R: ResourceTracker>(engine: &mut Engine<R>, command: &Command) -> EngineResult<()> {
    let nest = command.options.nest.expect("end-while command missing nest");
    end_loop(engine, nest, |_| {})
}

/// Shared `end`-of-loop logic for `while`/`for` (§4.5 "End of loop"):
/// terminates the loop (dropping its scope) when `final_cycle` or
/// `activated_break` is set, otherwise clears the scope and jumps back to
/// the block's opening keyword (`nest`) for another iteration.
fn end_loop<R: ResourceTracker>(
    engine: &mut Engine<R>,
    nest: usize,
    on_continue: impl FnOnce(&mut Engine<R>),
) -> EngineResult<()> {
    let frame = engine.frames.last_mut().expect("end with no active frame");
    frame.jump_stack.pop();
    frame.branch_jump_stack.pop();
    frame.condition_stack.pop();
    let owns_scope = frame.scope_stack.pop() == Some(true);
    let terminate = frame.final_cycle || frame.activated_break;

    if terminate {
        frame.final_cycle = false;
        frame.activated_break = false;
        if owns_scope {
            engine.objects.pop();
        }
    } else {
        frame.activated_continue = false;
        frame.jump_from_end = true;
        on_continue(engine);
        let frame = engine.frames.last_mut().unwrap();
        goto(frame, nest);
    }
    Ok(())
}

pub(crate) fn exec_for<R: ResourceTracker>(engine: &mut Engine<R>, command: &Command) -> EngineResult<()> {
    let nest_end = command.options.nest_end.expect("for command missing nest_end");
    let branch_targets = engine.frames.last().unwrap().code.jump_table.targets(command.source_index).to_vec();
    let var_name = engine
        .eval_argument(&command.args[1], false)?
        .as_str()
        .ok_or_else(|| EngineError::invariant("for-loop variable must be an identifier"))?;
    let container = engine.eval_argument(&command.args[0], false)?;
    let type_id = container.unpacked_type_id();

    let reentry = engine.frames.last().unwrap().jump_from_end;
    if reentry {
        engine.frames.last_mut().unwrap().jump_from_end = false;
        let step_forward = engine.fetch_function_impl("step_forward", "iterator")?;
        let iterator = engine.objects.find(ITERATOR_NAME).cloned().expect("__iterator missing on for re-entry");
        let mut args = ArgMap::default();
        args.insert("me".into(), iterator);
        engine.invoke(step_forward, args)?;
    } else {
        engine.objects.push();
        let head = engine.fetch_function_impl("head", &type_id)?;
        let mut args = ArgMap::default();
        args.insert("me".into(), container.clone());
        let iterator = engine.invoke(head, args)?;
        engine.objects.create_object(ITERATOR_NAME, iterator);
    }

    let frame = engine.frames.last_mut().unwrap();
    frame.jump_stack.push(nest_end);
    frame.branch_jump_stack.push(branch_targets);
    frame.condition_stack.push(false);
    frame.scope_stack.push(true);

    let tail = engine.fetch_function_impl("tail", &type_id)?;
    let mut tail_args = ArgMap::default();
    tail_args.insert("me".into(), container);
    let tail_value = engine.invoke(tail, tail_args)?;

    let iterator = engine.objects.find(ITERATOR_NAME).cloned().expect("__iterator missing");
    let compare = engine.fetch_function_impl("compare", "iterator")?;
    let mut cmp_args = ArgMap::default();
    cmp_args.insert("me".into(), iterator.clone());
    cmp_args.insert("other".into(), tail_value);
    let exhausted = engine.invoke(compare, cmp_args)?.as_bool().unwrap_or(false);

    let frame = engine.frames.last_mut().unwrap();
    if exhausted {
        frame.final_cycle = true;
        goto(frame, nest_end);
    } else {
        let obj = engine.fetch_function_impl("obj", "iterator")?;
        let mut obj_args = ArgMap::default();
        obj_args.insert("me".into(), iterator);
        let element = engine.invoke(obj, obj_args)?;
        engine.objects.create_object(var_name, element);
    }
    Ok(())
}

pub(crate) fn exec_end_for<R: ResourceTracker>(engine: &mut Engine<R>, command: &Command) -> EngineResult<()> {
    let nest = command.options.nest.expect("end-for command missing nest");
    end_loop(engine, nest, |engine| {
        engine.objects.clear_current_except(ITERATOR_NAME);
    })
}

pub(crate) fn exec_case<R: ResourceTracker>(engine: &mut Engine<R>, command: &Command) -> EngineResult<()> {
    let scrutinee = engine.eval_argument(&command.args[0], false)?;
    if !scrutinee.is_plain() {
        return Err(EngineError::type_or_arity("case scrutinee must be a plain type"));
    }

    let nest_end = command.options.nest_end.expect("case command missing nest_end");
    let branch_targets = engine.frames.last().unwrap().code.jump_table.targets(command.source_index).to_vec();

    engine.objects.push();
    engine.objects.create_object(CASE_NAME, scrutinee.copy());

    let frame = engine.frames.last_mut().unwrap();
    frame.jump_stack.push(nest_end);
    frame.branch_jump_stack.push(branch_targets);
    frame.condition_stack.push(false);
    frame.scope_stack.push(true);

    let target = next_branch_or_end(frame);
    goto(frame, target);
    Ok(())
}

pub(crate) fn exec_when<R: ResourceTracker>(engine: &mut Engine<R>, command: &Command) -> EngineResult<()> {
    let already_matched = *engine.frames.last().unwrap().condition_stack.last().expect("when outside case");
    if already_matched {
        let frame = engine.frames.last_mut().unwrap();
        let target = *frame.jump_stack.last().expect("when with no enclosing case");
        goto(frame, target);
        return Ok(());
    }

    let case_value = engine.objects.find(CASE_NAME).cloned().expect("__case missing inside case block");
    let mut matched = false;
    for arg in &command.args {
        let value = engine.eval_argument(arg, false)?;
        if !value.is_plain() {
            return Err(EngineError::type_or_arity("when arm must be a plain type"));
        }
        if value.plain_eq(&case_value) {
            matched = true;
        }
    }

    let frame = engine.frames.last_mut().unwrap();
    if matched {
        *frame.condition_stack.last_mut().unwrap() = true;
    } else {
        let target = next_branch_or_end(frame);
        goto(frame, target);
    }
    Ok(())
}

pub(crate) fn exec_end_case<R: ResourceTracker>(engine: &mut Engine<R>, _command: &Command) -> EngineResult<()> {
    let frame = engine.frames.last_mut().expect("end with no active frame");
    frame.jump_stack.pop();
    frame.branch_jump_stack.pop();
    frame.condition_stack.pop();
    if frame.scope_stack.pop() == Some(true) {
        engine.objects.pop();
    }
    Ok(())
}

pub(crate) fn exec_continue<R: ResourceTracker>(engine: &mut Engine<R>, command: &Command) -> EngineResult<()> {
    escape(engine, command, false)
}

pub(crate) fn exec_break<R: ResourceTracker>(engine: &mut Engine<R>, command: &Command) -> EngineResult<()> {
    escape(engine, command, true)
}

/// `continue`/`break` (§4.5): pops `escape_depth` enclosing `{condition,
/// jump, scope}` triples (the blocks between this keyword and the loop it
/// escapes, e.g. an enclosing `if`), then jumps to the now-exposed loop's
/// `end`.
fn escape<R: ResourceTracker>(engine: &mut Engine<R>, command: &Command, is_break: bool) -> EngineResult<()> {
    let frame = engine.frames.last_mut().expect("continue/break with no active frame");
    for _ in 0..command.options.escape_depth {
        frame.jump_stack.pop();
        frame.branch_jump_stack.pop();
        frame.condition_stack.pop();
        if frame.scope_stack.pop() == Some(true) {
            engine.objects.pop();
        }
    }
    let frame = engine.frames.last_mut().unwrap();
    let target = *frame.jump_stack.last().expect("continue/break outside a loop");
    goto(frame, target);
    if is_break {
        frame.activated_break = true;
    } else {
        frame.activated_continue = true;
    }
    Ok(())
}
