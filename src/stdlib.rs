//! Built-in native functions, installed into every fresh namespace.

use std::io::{self, BufRead, Write};
use std::rc::Rc;

use indexmap::IndexMap;

use crate::{
    diagnostics::{ErrorKind, NativeError},
    runtime::Runtime,
    value::{Event, NativeCallback, NativeFn, Value},
};

type NativeResult = std::result::Result<Value, NativeError>;

pub fn install(bindings: &mut IndexMap<String, Value>) {
    let natives: &[(&'static str, Option<usize>, NativeCallback)] = &[
        ("print", None, native_print),
        ("input", Some(1), native_input),
        ("len", Some(1), native_len),
        ("keys", Some(1), native_keys),
        ("has", Some(2), native_has),
        ("push", Some(2), native_push),
        ("pop", Some(1), native_pop),
        ("str", Some(1), native_str),
        ("num", Some(1), native_num),
        ("floor", Some(1), native_floor),
        ("abs", Some(1), native_abs),
        ("min", Some(2), native_min),
        ("max", Some(2), native_max),
        ("clamp", Some(3), native_clamp),
        ("rng_seed", Some(1), native_rng_seed),
        ("rng_int", Some(2), native_rng_int),
        ("rng_float", Some(0), native_rng_float),
        ("rng_choice", Some(1), native_rng_choice),
        ("emit_event", Some(2), native_emit_event),
        ("debug", Some(1), native_debug),
    ];
    for &(name, arity, callback) in natives {
        bindings.insert(
            name.to_string(),
            Value::Native(Rc::new(NativeFn {
                name,
                arity,
                callback,
            })),
        );
    }
}

fn type_error(message: impl Into<String>) -> NativeError {
    NativeError::new(ErrorKind::Type, message)
}

fn expect_number(name: &str, value: &Value) -> std::result::Result<f64, NativeError> {
    value
        .as_number()
        .ok_or_else(|| type_error(format!("{name}() requires a number, got {}", value.type_name())))
}

fn join_args(args: &[Value]) -> String {
    args.iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

fn native_print(_rt: &mut Runtime, args: &[Value]) -> NativeResult {
    println!("{}", join_args(args));
    Ok(Value::Null)
}

fn native_input(_rt: &mut Runtime, args: &[Value]) -> NativeResult {
    print!("{}", args[0]);
    let mut line = String::new();
    io::stdout()
        .flush()
        .and_then(|_| io::stdin().lock().read_line(&mut line))
        .map_err(|err| NativeError::new(ErrorKind::Range, format!("stdin read failed: {err}")))?;
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    Ok(Value::string(line))
}

fn native_len(_rt: &mut Runtime, args: &[Value]) -> NativeResult {
    let n = match &args[0] {
        Value::Str(s) => s.chars().count(),
        Value::List(items) => items.borrow().len(),
        Value::Map(entries) => entries.borrow().len(),
        other => {
            return Err(type_error(format!(
                "len() requires string, list, or map, got {}",
                other.type_name()
            )))
        }
    };
    Ok(Value::Int(n as i64))
}

fn native_keys(_rt: &mut Runtime, args: &[Value]) -> NativeResult {
    let Value::Map(entries) = &args[0] else {
        return Err(type_error(format!(
            "keys() requires a map, got {}",
            args[0].type_name()
        )));
    };
    let keys = entries
        .borrow()
        .keys()
        .map(|k| Value::string(k.clone()))
        .collect();
    Ok(Value::list(keys))
}

fn native_has(_rt: &mut Runtime, args: &[Value]) -> NativeResult {
    let Value::Map(entries) = &args[0] else {
        return Err(type_error(format!(
            "has() requires a map, got {}",
            args[0].type_name()
        )));
    };
    // Only string keys can exist, so any other key type is simply absent.
    let Value::Str(key) = &args[1] else {
        return Ok(Value::Bool(false));
    };
    Ok(Value::Bool(entries.borrow().contains_key(key.as_ref())))
}

fn native_push(_rt: &mut Runtime, args: &[Value]) -> NativeResult {
    let Value::List(items) = &args[0] else {
        return Err(type_error(format!(
            "push() requires a list, got {}",
            args[0].type_name()
        )));
    };
    items.borrow_mut().push(args[1].clone());
    Ok(Value::Null)
}

fn native_pop(_rt: &mut Runtime, args: &[Value]) -> NativeResult {
    let Value::List(items) = &args[0] else {
        return Err(type_error(format!(
            "pop() requires a list, got {}",
            args[0].type_name()
        )));
    };
    let popped = items.borrow_mut().pop();
    Ok(popped.unwrap_or(Value::Null))
}

fn native_str(_rt: &mut Runtime, args: &[Value]) -> NativeResult {
    Ok(Value::string(args[0].to_string()))
}

fn native_num(_rt: &mut Runtime, args: &[Value]) -> NativeResult {
    match &args[0] {
        Value::Int(n) => Ok(Value::Int(*n)),
        Value::Float(f) => Ok(Value::Float(*f)),
        Value::Str(s) => {
            let text = s.trim();
            // A decimal point or exponent marker selects float parsing;
            // everything else must be a plain integer.
            if text.contains(['.', 'e', 'E']) {
                text.parse::<f64>()
                    .map(Value::Float)
                    .map_err(|_| type_error(format!("num() could not parse '{text}'")))
            } else {
                text.parse::<i64>()
                    .map(Value::Int)
                    .map_err(|_| type_error(format!("num() could not parse '{text}'")))
            }
        }
        other => Err(type_error(format!(
            "num() requires string or number, got {}",
            other.type_name()
        ))),
    }
}

fn native_floor(_rt: &mut Runtime, args: &[Value]) -> NativeResult {
    let n = expect_number("floor", &args[0])?;
    Ok(Value::Int(n.floor() as i64))
}

fn native_abs(_rt: &mut Runtime, args: &[Value]) -> NativeResult {
    match &args[0] {
        Value::Int(n) => Ok(Value::Int(n.wrapping_abs())),
        Value::Float(f) => Ok(Value::Float(f.abs())),
        other => Err(type_error(format!(
            "abs() requires a number, got {}",
            other.type_name()
        ))),
    }
}

/// `min`/`max` return one of the original operands rather than a coerced
/// number, so `min(1, 2.5)` stays `1`.
fn pick(name: &str, args: &[Value], want_less: bool) -> NativeResult {
    let ordering = match (&args[0], &args[1]) {
        (Value::Str(a), Value::Str(b)) => a.cmp(b),
        _ => {
            let a = expect_number(name, &args[0])?;
            let b = expect_number(name, &args[1])?;
            a.partial_cmp(&b).unwrap_or(std::cmp::Ordering::Equal)
        }
    };
    // Ties pick the second operand, so `min(1, 1.0)` is the float.
    let first = if want_less {
        ordering == std::cmp::Ordering::Less
    } else {
        ordering == std::cmp::Ordering::Greater
    };
    Ok(if first { args[0].clone() } else { args[1].clone() })
}

fn native_min(_rt: &mut Runtime, args: &[Value]) -> NativeResult {
    pick("min", args, true)
}

fn native_max(_rt: &mut Runtime, args: &[Value]) -> NativeResult {
    pick("max", args, false)
}

fn native_clamp(_rt: &mut Runtime, args: &[Value]) -> NativeResult {
    let x = expect_number("clamp", &args[0])?;
    let lo = expect_number("clamp", &args[1])?;
    let hi = expect_number("clamp", &args[2])?;
    if x < lo {
        Ok(args[1].clone())
    } else if x > hi {
        Ok(args[2].clone())
    } else {
        Ok(args[0].clone())
    }
}

fn native_rng_seed(rt: &mut Runtime, args: &[Value]) -> NativeResult {
    let seed = expect_number("rng_seed", &args[0])? as i64;
    rt.rng_mut().seed(seed);
    Ok(Value::Null)
}

fn native_rng_int(rt: &mut Runtime, args: &[Value]) -> NativeResult {
    let lo = expect_number("rng_int", &args[0])? as i64;
    let hi = expect_number("rng_int", &args[1])? as i64;
    if lo > hi {
        return Err(NativeError::new(
            ErrorKind::Range,
            format!("rng_int() empty range {lo}..{hi}"),
        ));
    }
    Ok(Value::Int(rt.rng_mut().int_in(lo, hi)))
}

fn native_rng_float(rt: &mut Runtime, _args: &[Value]) -> NativeResult {
    Ok(Value::Float(rt.rng_mut().next_float()))
}

fn native_rng_choice(rt: &mut Runtime, args: &[Value]) -> NativeResult {
    let Value::List(items) = &args[0] else {
        return Ok(Value::Null);
    };
    let items = items.borrow();
    if items.is_empty() {
        return Ok(Value::Null);
    }
    let idx = rt.rng_mut().index_in(items.len());
    Ok(items[idx].clone())
}

fn native_emit_event(rt: &mut Runtime, args: &[Value]) -> NativeResult {
    let tag = match &args[0] {
        Value::Str(s) => s.to_string(),
        other => other.to_string(),
    };
    rt.push_event(Event {
        tag,
        payload: args[1].clone(),
    });
    Ok(Value::Null)
}

fn native_debug(rt: &mut Runtime, args: &[Value]) -> NativeResult {
    if rt.debug_enabled() {
        eprintln!("[DEBUG] {}", args[0]);
    }
    Ok(Value::Null)
}
