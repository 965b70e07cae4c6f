//! Blocking API tests
//!
//! These run on plain threads; the invoker drives its futures on the shared
//! runtime.

mod common;

use common::{DATABASE, MockDriver, RecordingDiagnostics, invoker, json_rows};
use pretty_assertions::assert_eq;
use procall_core::ProcedureOutcome;
use procall_invoke::{CallOptions, ParameterBuilder, ProcallError, RowSet, Value, runtime};
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, PartialEq, Deserialize)]
struct Flag {
    name: String,
    enabled: bool,
}

#[test]
fn blocking_reader_operations() {
    let set = RowSet::from_values(&["Total"], vec![vec![Value::Int32(12)]]);
    let driver = MockDriver::new()
        .with_result_sets(vec![set.clone()])
        .with_result_sets(vec![set.clone(), set])
        .with_result_sets(vec![RowSet::from_values(&["Total"], vec![vec![Value::Int32(12)]])]);
    let diagnostics = RecordingDiagnostics::new();
    let invoker = invoker(&driver, &diagnostics);
    let mut params = ParameterBuilder::new();

    let table = invoker
        .execute_datatable_blocking("dbo.Totals", &mut params, DATABASE, CallOptions::new())
        .unwrap();
    assert_eq!(table.row_count(), 1);

    let data = invoker
        .execute_dataset_blocking("dbo.Totals", &mut params, DATABASE, CallOptions::new())
        .unwrap();
    assert_eq!(data.len(), 2);

    let total: i64 = invoker
        .execute_scalar_blocking("dbo.Totals", &mut params, DATABASE, CallOptions::new())
        .unwrap();
    assert_eq!(total, 12);
    assert_eq!(diagnostics.error_count(), 0);
    assert_eq!(driver.close_count(), 3);
}

#[test]
fn blocking_output_operations() {
    let driver = MockDriver::new()
        .with_outcome(ProcedureOutcome::with_rows_affected(4))
        .with_outcome(ProcedureOutcome::default().output("@Status", "ok"))
        .with_outcome(ProcedureOutcome::default().output("@Status", "done"))
        .with_outcome(
            ProcedureOutcome::default().output("@Status", r#"{"name":"beta","enabled":true}"#),
        );
    let diagnostics = RecordingDiagnostics::new();
    let invoker = invoker(&driver, &diagnostics);
    let mut params = ParameterBuilder::new();
    params.add_output("@Status", "").unwrap();

    let rows = invoker
        .execute_non_query_blocking("dbo.Touch", &mut params, DATABASE, CallOptions::new())
        .unwrap();
    assert_eq!(rows, 4);

    let status: String = invoker
        .execute_with_return_param_blocking(
            "dbo.Status",
            &mut params,
            "@Status",
            DATABASE,
            CallOptions::new(),
        )
        .unwrap();
    assert_eq!(status, "ok");

    let returned = invoker
        .execute_with_param_returns_blocking("dbo.Status", &mut params, DATABASE, CallOptions::new())
        .unwrap();
    assert_eq!(returned[0].value, Value::String("done".into()));

    let flag: Option<Flag> = invoker
        .execute_object_json_blocking(
            "dbo.Flag",
            &mut params,
            "@Status",
            DATABASE,
            CallOptions::propagate(),
        )
        .unwrap();
    assert_eq!(
        flag,
        Some(Flag {
            name: "beta".into(),
            enabled: true
        })
    );
}

#[test]
fn blocking_json_operations() {
    let driver = MockDriver::new()
        .with_result_sets(vec![json_rows(&[r#"{"a":1,"#, r#""b":2}"#])])
        .with_result_sets(vec![json_rows(&[r#"{"a":1,"#, r#""b":2}"#])]);
    let diagnostics = RecordingDiagnostics::new();
    let invoker = invoker(&driver, &diagnostics);
    let mut params = ParameterBuilder::new();

    let text = invoker
        .execute_json_string_blocking("dbo.Json", &mut params, DATABASE, CallOptions::new())
        .unwrap();
    assert_eq!(text, r#"{"a":1,"b":2}"#);

    let map: Option<HashMap<String, i32>> = invoker
        .execute_json_object_blocking("dbo.Json", &mut params, DATABASE, CallOptions::propagate())
        .unwrap();
    let map = map.unwrap();
    assert_eq!(map["a"], 1);
    assert_eq!(map["b"], 2);
}

#[test]
fn blocking_propagates_errors() {
    let driver = MockDriver::new().with_call_error("boom");
    let diagnostics = RecordingDiagnostics::new();
    let invoker = invoker(&driver, &diagnostics);

    let err = invoker
        .execute_datatable_blocking(
            "dbo.Totals",
            &mut ParameterBuilder::new(),
            DATABASE,
            CallOptions::propagate(),
        )
        .unwrap_err();
    assert!(matches!(err, ProcallError::ExecutionFailed(_)));
    assert_eq!(diagnostics.error_count(), 1);
}

#[test]
fn spawn_non_query_outside_runtime() {
    let driver = MockDriver::new();
    let diagnostics = RecordingDiagnostics::new();
    let invoker = invoker(&driver, &diagnostics);

    let handle = invoker.spawn_non_query("dbo.Audit", ParameterBuilder::new(), DATABASE, false);
    runtime::block_on(handle).unwrap();

    assert_eq!(driver.calls().len(), 1);
    assert_eq!(diagnostics.error_count(), 0);
}
