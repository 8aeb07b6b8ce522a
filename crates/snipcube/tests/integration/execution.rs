use snipcube::types::{ExecutionOutcome, Limits};

use super::engine_with;

#[tokio::test]
async fn test_arithmetic_value_is_printed() {
    let engine = engine_with(Limits::default());

    let outcome = engine.execute(engine.request("1+1", None)).await;

    assert_eq!(
        outcome,
        ExecutionOutcome::Completed {
            output: b"2".to_vec(),
            truncated: false
        }
    );
    assert_eq!(outcome.to_string(), "2");
}

#[tokio::test]
async fn test_unit_value_prints_nothing() {
    let engine = engine_with(Limits::default());

    let outcome = engine.execute(engine.request("let x = 40 + 2;", None)).await;

    assert!(outcome.is_success());
    assert_eq!(outcome.output(), Some(&b""[..]));
    assert_eq!(outcome.to_string(), "(no output)");
}

#[tokio::test]
async fn test_multiline_output_is_summarized() {
    let engine = engine_with(Limits::default());

    let outcome = engine
        .execute(engine.request(r#"print("hello"); print("world"); print("!")"#, None))
        .await;

    assert_eq!(outcome.to_string(), "hello (+2 more lines)");
}

#[tokio::test]
async fn test_input_is_readable() {
    let engine = engine_with(Limits::default());

    let outcome = engine
        .execute(engine.request("input().len()", Some("four".to_string())))
        .await;

    assert_eq!(outcome.to_string(), "4");
}

#[tokio::test]
async fn test_unknown_variable_is_runtime_error() {
    let engine = engine_with(Limits::default());

    let outcome = engine.execute(engine.request("missing + 1", None)).await;

    match outcome {
        ExecutionOutcome::RuntimeError { message } => {
            assert!(message.contains("missing"), "message: {message}");
        }
        other => panic!("expected a runtime error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_thrown_error_is_runtime_error() {
    let engine = engine_with(Limits::default());

    let outcome = engine
        .execute(engine.request(r#"print("before"); throw "boom""#, None))
        .await;

    match outcome {
        ExecutionOutcome::RuntimeError { message } => {
            assert!(message.contains("boom"), "message: {message}");
        }
        other => panic!("expected a runtime error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_syntax_error_is_runtime_error() {
    let engine = engine_with(Limits::default());

    let outcome = engine.execute(engine.request("let = ;", None)).await;

    assert!(matches!(outcome, ExecutionOutcome::RuntimeError { .. }));
    assert!(outcome.to_string().starts_with("error: `"));
}

#[tokio::test]
async fn test_long_value_is_truncated_to_cap() {
    let engine = engine_with(Limits::new().with_max_output_bytes(400));
    let snippet = r#"let s = ""; for i in 0..5000 { s += "x"; } s"#;

    let outcome = engine.execute(engine.request(snippet, None)).await;

    match outcome {
        ExecutionOutcome::Completed { output, truncated } => {
            assert!(truncated);
            assert_eq!(output.len(), 400);
            assert!(output.iter().all(|&b| b == b'x'));
        }
        other => panic!("expected truncated completion, got {other:?}"),
    }
}

#[tokio::test]
async fn test_endless_printing_stops_at_cap() {
    let engine = engine_with(Limits::new().with_max_output_bytes(100));

    let outcome = engine
        .execute(engine.request(r#"loop { print("spam"); }"#, None))
        .await;

    match outcome {
        ExecutionOutcome::Completed { output, truncated } => {
            assert!(truncated);
            assert!(output.starts_with(b"spam"));
        }
        other => panic!("expected truncated completion, got {other:?}"),
    }
}
