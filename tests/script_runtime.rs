use std::collections::BTreeMap;
use std::convert::Infallible;

use graphtrace::graph::{Graph, codec};
use graphtrace::script::{Interpreter, RunError, ScriptError, StepContext, StepHook, Value, compile};
use serde_json::json;

#[derive(Default)]
struct Steps {
    lines: Vec<u32>,
    last: BTreeMap<String, Value>,
}

impl StepHook for Steps {
    type Error = Infallible;

    fn on_step(&mut self, step: &StepContext<'_>) -> Result<(), Self::Error> {
        self.lines.push(step.line);
        self.last = step.bindings.clone();
        Ok(())
    }
}

fn triangle() -> Graph {
    codec::decode(&json!({
        "elements": {
            "nodes": [{"data": {"id": "a"}}, {"data": {"id": "b"}}, {"data": {"id": "c"}}],
            "edges": [
                {"data": {"id": "ab", "source": "a", "target": "b"}},
                {"data": {"id": "bc", "source": "b", "target": "c"}},
                {"data": {"id": "ca", "source": "c", "target": "a"}}
            ]
        }
    }))
    .unwrap()
}

fn run(source: &str, graph: &mut Graph) -> (Steps, Result<(), RunError<Infallible>>) {
    let program = compile(source).unwrap();
    let mut steps = Steps::default();
    let result = Interpreter::new(&program, graph, &mut steps).run();
    (steps, result)
}

#[test]
fn breadth_first_search_visits_every_node() {
    let mut graph = triangle();
    let source = r#"
(define queue (list (node "a")))
(define seen (list "a"))
(while (> (len queue) 0)
  (define current (first queue))
  (set! queue (rest queue))
  (for next (neighbors current)
    (if (not (contains? seen (id next)))
      (begin
        (set! seen (push seen (id next)))
        (set! queue (push queue next))))))
"#;
    let (steps, result) = run(source, &mut graph);
    result.unwrap();
    assert_eq!(
        steps.last.get("seen"),
        Some(&Value::List(vec![
            Value::String("a".into()),
            Value::String("b".into()),
            Value::String("c".into()),
        ]))
    );
    assert!(steps.lines.len() > 3);
}

#[test]
fn property_updates_are_visible_to_later_steps() {
    let mut graph = triangle();
    let source = "(set-prop! (node \"a\") \"dist\" 0)\n(define d (get (node \"a\") \"dist\"))";
    let (steps, result) = run(source, &mut graph);
    result.unwrap();
    assert_eq!(steps.last.get("d"), Some(&Value::Integer(0)));
    assert_eq!(graph.get_node("a").unwrap().property("dist"), Some(&json!(0)));
}

#[test]
fn functions_are_hoisted() {
    let mut graph = Graph::new();
    let (steps, result) = run(
        "(define x (double 21))\n(defn double (n) (return (* n 2)))",
        &mut graph,
    );
    result.unwrap();
    assert_eq!(steps.last.get("x"), Some(&Value::Integer(42)));
}

#[test]
fn raise_after_three_steps_keeps_the_steps() {
    let mut graph = Graph::new();
    let (steps, result) = run(
        "(define a 1)\n(define b 2)\n(define c 3)\n(raise \"boom\")",
        &mut graph,
    );
    assert_eq!(steps.lines, vec![1, 2, 3]);
    match result {
        Err(RunError::Script(err)) => assert_eq!(err.to_string(), "boom"),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn compile_errors_carry_lines() {
    let err = compile("(define a 1)\n(break)").unwrap_err();
    assert!(err.is_compile_error());
    assert_eq!(err.line(), 2);

    let err = compile("(define a (+ 1 2)").unwrap_err();
    assert!(matches!(err, ScriptError::Syntax { .. }));
}

#[test]
fn integer_overflow_is_a_runtime_error() {
    let mut graph = Graph::new();
    let (_, result) = run("(define big (* 9223372036854775807 2))", &mut graph);
    assert!(matches!(
        result,
        Err(RunError::Script(ScriptError::Runtime { line: 1, .. }))
    ));
}
