//! Builtin node library.
//!
//! | Name                     | Behaviour  | Sockets                                   |
//! |--------------------------|------------|-------------------------------------------|
//! | `value.{int,float,...}`  | expression | `value` -> `value`                        |
//! | `int.add`, `int.multiply`| expression | `a`, `b` -> `result`                      |
//! | `int.divmod`             | eager      | `a`, `b` -> `quotient`, `remainder`       |
//! | `math.add` ... `divide`  | expression | `a`, `b` -> `result`                      |
//! | `math.sum`               | eager      | `values` (multi) -> `sum`                 |
//! | `logic.compare`          | expression | `a`, `b` -> `greater`                     |
//! | `logic.switch`           | lazy       | `switch`, `false`, `true` -> `output`     |
//! | `text.format`            | eager      | `prefix`, `value` -> `text`               |
//! | `output.{int,float,...}` | sink       | `value`                                   |
//! | `reroute.{int,float,...}`| reroute    | `input` -> `output`                       |

use super::{BuiltinTypes, DataType, Value};
use crate::registry::{NodeBehavior, NodeRegistry, NodeType, SocketDecl};

type Decl = SocketDecl<BuiltinTypes>;
type Behavior = NodeBehavior<BuiltinTypes>;

const VALUE_TYPES: [(&str, DataType); 4] = [
    ("int", DataType::Int),
    ("float", DataType::Float),
    ("bool", DataType::Bool),
    ("text", DataType::Text),
];

/// A registry holding every builtin node type.
#[must_use]
pub fn builtin_registry() -> NodeRegistry<BuiltinTypes> {
    let mut registry = NodeRegistry::new();
    register_builtin_nodes(&mut registry);
    registry
}

/// Add the builtin node types to `registry`.
pub fn register_builtin_nodes(registry: &mut NodeRegistry<BuiltinTypes>) {
    for (suffix, data_type) in VALUE_TYPES {
        registry.register(NodeType::new(
            format!("value.{suffix}"),
            vec![Decl::new("value", data_type)],
            vec![Decl::new("value", data_type)],
            Behavior::expression(|inputs| inputs),
        ));
        registry.register(NodeType::new(
            format!("output.{suffix}"),
            vec![Decl::new("value", data_type)],
            vec![],
            // Never executed: a node without outputs has nothing to compute.
            Behavior::eager(|_| {}),
        ));
        registry.register(NodeType::reroute(format!("reroute.{suffix}"), data_type));
    }

    registry.register(int_binary("int.add", i64::wrapping_add));
    registry.register(int_binary("int.multiply", i64::wrapping_mul));
    registry.register(int_divmod());

    registry.register(float_binary("math.add", |a, b| a + b));
    registry.register(float_binary("math.subtract", |a, b| a - b));
    registry.register(float_binary("math.multiply", |a, b| a * b));
    registry.register(float_binary("math.divide", |a, b| if b == 0.0 { 0.0 } else { a / b }));
    registry.register(math_sum());

    registry.register(logic_compare());
    registry.register(logic_switch());
    registry.register(text_format());
}

fn int_binary(name: &str, op: fn(i64, i64) -> i64) -> NodeType<BuiltinTypes> {
    NodeType::new(
        name,
        vec![Decl::new("a", DataType::Int), Decl::new("b", DataType::Int)],
        vec![Decl::new("result", DataType::Int)],
        Behavior::expression(move |inputs| {
            let [a, b] = ints(&inputs);
            vec![Value::Int(op(a, b))]
        }),
    )
}

fn float_binary(name: &str, op: fn(f64, f64) -> f64) -> NodeType<BuiltinTypes> {
    NodeType::new(
        name,
        vec![Decl::new("a", DataType::Float), Decl::new("b", DataType::Float)],
        vec![Decl::new("result", DataType::Float)],
        Behavior::expression(move |inputs| {
            let [a, b] = floats(&inputs);
            vec![Value::Float(op(a, b))]
        }),
    )
}

/// Two outputs; each is only computed when something consumes it.
fn int_divmod() -> NodeType<BuiltinTypes> {
    NodeType::new(
        "int.divmod",
        vec![
            Decl::new("a", DataType::Int),
            Decl::new("b", DataType::Int).with_default(Value::Int(1)),
        ],
        vec![
            Decl::new("quotient", DataType::Int),
            Decl::new("remainder", DataType::Int),
        ],
        Behavior::eager(|params| {
            let a = params.extract_input(0).and_then(|v| v.as_int()).unwrap_or(0);
            let b = params.extract_input(1).and_then(|v| v.as_int()).unwrap_or(0);
            if params.output_is_required(0) {
                params.set_output(0, Value::Int(a.checked_div(b).unwrap_or(0)));
            }
            if params.output_is_required(1) {
                params.set_output(1, Value::Int(a.checked_rem(b).unwrap_or(0)));
            }
        }),
    )
}

fn math_sum() -> NodeType<BuiltinTypes> {
    NodeType::new(
        "math.sum",
        vec![Decl::new("values", DataType::Float).multi()],
        vec![Decl::new("sum", DataType::Float)],
        Behavior::eager(|params| {
            let sum = params
                .extract_multi_input(0)
                .iter()
                .filter_map(Value::as_float)
                .sum();
            params.set_output(0, Value::Float(sum));
        }),
    )
}

fn logic_compare() -> NodeType<BuiltinTypes> {
    NodeType::new(
        "logic.compare",
        vec![Decl::new("a", DataType::Float), Decl::new("b", DataType::Float)],
        vec![Decl::new("greater", DataType::Bool)],
        Behavior::expression(|inputs| {
            let [a, b] = floats(&inputs);
            vec![Value::Bool(a > b)]
        }),
    )
}

/// Reads the switch first, then only the chosen branch.
fn logic_switch() -> NodeType<BuiltinTypes> {
    NodeType::new(
        "logic.switch",
        vec![
            Decl::new("switch", DataType::Bool),
            Decl::new("false", DataType::Float),
            Decl::new("true", DataType::Float),
        ],
        vec![Decl::new("output", DataType::Float)],
        Behavior::lazy(|params| {
            if params.require_input(0) {
                return;
            }
            let condition = params.get_input(0).and_then(Value::as_bool).unwrap_or(false);
            let branch = if condition { 2 } else { 1 };
            if params.require_input(branch) {
                return;
            }
            let value = params.extract_input(branch).unwrap_or(Value::Float(0.0));
            params.set_output(0, value);
        }),
    )
}

fn text_format() -> NodeType<BuiltinTypes> {
    NodeType::new(
        "text.format",
        vec![
            Decl::new("prefix", DataType::Text),
            Decl::new("value", DataType::Float),
        ],
        vec![Decl::new("text", DataType::Text)],
        Behavior::eager(|params| {
            let prefix = params.extract_input(0).unwrap_or(Value::Text(String::new()));
            let value = params.extract_input(1).unwrap_or(Value::Float(0.0));
            params.set_output(0, Value::Text(format!("{prefix}{value}")));
        }),
    )
}

fn ints(inputs: &[Value]) -> [i64; 2] {
    let get = |i: usize| inputs.get(i).and_then(Value::as_int).unwrap_or(0);
    [get(0), get(1)]
}

fn floats(inputs: &[Value]) -> [f64; 2] {
    let get = |i: usize| inputs.get(i).and_then(Value::as_float).unwrap_or(0.0);
    [get(0), get(1)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_contains_every_family() {
        let registry = builtin_registry();
        for name in [
            "value.int",
            "output.text",
            "reroute.bool",
            "int.divmod",
            "math.divide",
            "math.sum",
            "logic.switch",
            "text.format",
        ] {
            assert!(registry.get(name).is_ok(), "missing {name}");
        }
    }

    #[test]
    fn switch_is_the_only_lazy_node() {
        let registry = builtin_registry();
        let lazy: Vec<&str> = registry
            .iter()
            .filter(|t| t.behavior.is_lazy())
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(lazy, vec!["logic.switch"]);
    }

    #[test]
    fn sum_input_is_multi() -> Result<(), crate::types::NodalError> {
        let sum = builtin_registry().get("math.sum")?;
        assert!(sum.inputs[0].multi_input);
        Ok(())
    }
}
