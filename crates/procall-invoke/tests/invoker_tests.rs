//! Integration tests for ProcedureInvoker
//!
//! Runs every operation against the scripted MockDriver and checks result
//! shaping, output write-back, timeouts and the error policy.

mod common;

use common::{CONNECTION_STRING, DATABASE, MockDriver, RecordingDiagnostics, invoker, json_rows};
use pretty_assertions::assert_eq;
use procall_core::{ExecuteMode, ProcedureOutcome};
use procall_invoke::{
    CallOptions, DbType, Direction, ErrorPolicy, InvokerSettings, ParameterBuilder, ProcallError,
    RowSet, Value,
};
use serde::Deserialize;
use std::time::Duration;

fn customers() -> RowSet {
    RowSet::from_values(
        &["Id", "Name"],
        vec![
            vec![Value::Int64(1), Value::String("Alice".into())],
            vec![Value::Int64(2), Value::String("Bob".into())],
        ],
    )
}

fn params_with_id(id: i64) -> ParameterBuilder {
    let mut params = ParameterBuilder::new();
    params.add("@Id", id).unwrap();
    params
}

// ============ execute_datatable ============

#[tokio::test]
async fn datatable_returns_first_result_set() {
    let driver = MockDriver::new().with_result_sets(vec![customers(), RowSet::empty()]);
    let diagnostics = RecordingDiagnostics::new();
    let invoker = invoker(&driver, &diagnostics);
    let mut params = params_with_id(1);

    let table = invoker
        .execute_datatable("dbo.GetCustomers", &mut params, DATABASE, CallOptions::new())
        .await
        .unwrap();

    assert_eq!(table.row_count(), 2);
    assert_eq!(table.column_names(), vec!["Id", "Name"]);
    assert_eq!(table.rows[1].get_by_name("Name"), Some(&Value::String("Bob".into())));

    let call = driver.last_call();
    assert_eq!(call.procedure, "dbo.GetCustomers");
    assert_eq!(call.mode, ExecuteMode::Reader);
    assert_eq!(call.parameters.len(), 1);
    assert_eq!(call.parameters[0].db_type, DbType::BigInt);
    assert_eq!(driver.connects()[0].0, CONNECTION_STRING);
    assert_eq!(driver.close_count(), 1);
    assert_eq!(diagnostics.error_count(), 0);
}

#[tokio::test]
async fn datatable_without_result_sets_is_empty() {
    let driver = MockDriver::new();
    let diagnostics = RecordingDiagnostics::new();
    let invoker = invoker(&driver, &diagnostics);

    let table = invoker
        .execute_datatable("dbo.Nothing", &mut ParameterBuilder::new(), DATABASE, CallOptions::propagate())
        .await
        .unwrap();

    assert_eq!(table, RowSet::empty());
    assert!(driver.last_call().parameters.is_empty());
}

#[tokio::test]
async fn swallowed_failure_logs_once_and_returns_empty() {
    let driver = MockDriver::new().with_call_error("deadlock victim");
    let diagnostics = RecordingDiagnostics::new();
    let invoker = invoker(&driver, &diagnostics);

    let table = invoker
        .execute_datatable("dbo.GetCustomers", &mut params_with_id(1), DATABASE, CallOptions::new())
        .await
        .unwrap();

    assert_eq!(table, RowSet::empty());
    assert_eq!(
        diagnostics.errors(),
        vec![("execute_datatable".to_string(), "execution_failed".to_string())]
    );
    assert_eq!(driver.close_count(), 1);
}

#[tokio::test]
async fn propagated_failure_logs_once_and_returns_error() {
    let driver = MockDriver::new().with_call_error("deadlock victim");
    let diagnostics = RecordingDiagnostics::new();
    let invoker = invoker(&driver, &diagnostics);

    let err = invoker
        .execute_datatable("dbo.GetCustomers", &mut params_with_id(1), DATABASE, CallOptions::propagate())
        .await
        .unwrap_err();

    assert!(matches!(err, ProcallError::ExecutionFailed(ref msg) if msg == "deadlock victim"));
    assert_eq!(diagnostics.error_count(), 1);
    assert_eq!(driver.close_count(), 1);
}

#[tokio::test]
async fn unknown_database_fails_resolution_without_connecting() {
    let driver = MockDriver::new();
    let diagnostics = RecordingDiagnostics::new();
    let invoker = invoker(&driver, &diagnostics);

    let err = invoker
        .execute_non_query("dbo.Anything", &mut ParameterBuilder::new(), "Billing", CallOptions::propagate())
        .await
        .unwrap_err();

    assert!(matches!(err, ProcallError::ConnectionResolutionFailed(ref name) if name == "Billing"));
    assert_eq!(driver.connect_count(), 0);
    assert_eq!(
        diagnostics.errors(),
        vec![(
            "execute_non_query".to_string(),
            "connection_resolution_failed".to_string()
        )]
    );

    let swallowed = invoker
        .execute_non_query("dbo.Anything", &mut ParameterBuilder::new(), "Billing", CallOptions::new())
        .await
        .unwrap();
    assert_eq!(swallowed, 0);
    assert_eq!(diagnostics.error_count(), 2);
}

#[tokio::test]
async fn connect_failure_is_reported_once() {
    let driver = MockDriver::new().with_connect_error("login failed");
    let diagnostics = RecordingDiagnostics::new();
    let invoker = invoker(&driver, &diagnostics);

    let rows = invoker
        .execute_non_query("dbo.Touch", &mut ParameterBuilder::new(), DATABASE, CallOptions::new())
        .await
        .unwrap();

    assert_eq!(rows, 0);
    assert_eq!(diagnostics.error_count(), 1);
    assert_eq!(driver.close_count(), 0);
    assert!(driver.calls().is_empty());
}

// ============ execute_dataset / execute_non_query ============

#[tokio::test]
async fn dataset_returns_all_result_sets() {
    let driver = MockDriver::new().with_result_sets(vec![customers(), json_rows(&["x"])]);
    let diagnostics = RecordingDiagnostics::new();
    let invoker = invoker(&driver, &diagnostics);

    let data = invoker
        .execute_dataset("dbo.Report", &mut ParameterBuilder::new(), DATABASE, CallOptions::new())
        .await
        .unwrap();

    assert_eq!(data.len(), 2);
    assert_eq!(data.tables[0].row_count(), 2);
    assert_eq!(data.tables[1].row_count(), 1);
}

#[tokio::test]
async fn dataset_swallowed_failure_is_empty() {
    let driver = MockDriver::new().with_call_error("boom");
    let diagnostics = RecordingDiagnostics::new();
    let invoker = invoker(&driver, &diagnostics);

    let data = invoker
        .execute_dataset("dbo.Report", &mut ParameterBuilder::new(), DATABASE, CallOptions::new())
        .await
        .unwrap();

    assert!(data.is_empty());
    assert_eq!(diagnostics.error_count(), 1);
}

#[tokio::test]
async fn non_query_returns_rows_affected() {
    let driver = MockDriver::new().with_outcome(ProcedureOutcome::with_rows_affected(3));
    let diagnostics = RecordingDiagnostics::new();
    let invoker = invoker(&driver, &diagnostics);

    let rows = invoker
        .execute_non_query("dbo.Archive", &mut params_with_id(9), DATABASE, CallOptions::new())
        .await
        .unwrap();

    assert_eq!(rows, 3);
    assert_eq!(driver.last_call().mode, ExecuteMode::NonQuery);
}

// ============ execute_scalar ============

#[tokio::test]
async fn scalar_coerces_first_value() {
    let driver = MockDriver::new().with_result_sets(vec![customers()]);
    let diagnostics = RecordingDiagnostics::new();
    let invoker = invoker(&driver, &diagnostics);

    let id: i32 = invoker
        .execute_scalar("dbo.FirstId", &mut ParameterBuilder::new(), DATABASE, CallOptions::new())
        .await
        .unwrap();
    assert_eq!(id, 1);
}

#[tokio::test]
async fn scalar_of_empty_result() {
    let driver = MockDriver::new()
        .with_result_sets(vec![RowSet::from_values(&["Id"], vec![])])
        .with_result_sets(vec![])
        .with_result_sets(vec![]);
    let diagnostics = RecordingDiagnostics::new();
    let invoker = invoker(&driver, &diagnostics);

    let maybe: Option<i32> = invoker
        .execute_scalar("dbo.FirstId", &mut ParameterBuilder::new(), DATABASE, CallOptions::propagate())
        .await
        .unwrap();
    assert_eq!(maybe, None);
    assert_eq!(diagnostics.error_count(), 0);

    let swallowed: i32 = invoker
        .execute_scalar("dbo.FirstId", &mut ParameterBuilder::new(), DATABASE, CallOptions::new())
        .await
        .unwrap();
    assert_eq!(swallowed, 0);
    assert_eq!(diagnostics.error_count(), 1);

    let err = invoker
        .execute_scalar::<i32>("dbo.FirstId", &mut ParameterBuilder::new(), DATABASE, CallOptions::propagate())
        .await
        .unwrap_err();
    assert!(matches!(err, ProcallError::CoercionFailed { to: "i32", .. }));
    assert_eq!(diagnostics.error_count(), 2);
}

#[tokio::test]
async fn scalar_coercion_failure_follows_policy() {
    let text = RowSet::from_values(&["Value"], vec![vec![Value::String("abc".into())]]);
    let driver = MockDriver::new()
        .with_result_sets(vec![text.clone()])
        .with_result_sets(vec![text]);
    let diagnostics = RecordingDiagnostics::new();
    let invoker = invoker(&driver, &diagnostics);

    let swallowed: i64 = invoker
        .execute_scalar("dbo.Value", &mut ParameterBuilder::new(), DATABASE, CallOptions::new())
        .await
        .unwrap();
    assert_eq!(swallowed, 0);

    let err = invoker
        .execute_scalar::<i64>("dbo.Value", &mut ParameterBuilder::new(), DATABASE, CallOptions::propagate())
        .await
        .unwrap_err();
    assert!(matches!(err, ProcallError::CoercionFailed { .. }));
    assert_eq!(
        diagnostics.errors(),
        vec![
            ("execute_scalar".to_string(), "coercion_failed".to_string()),
            ("execute_scalar".to_string(), "coercion_failed".to_string()),
        ]
    );
}

// ============ output parameters ============

#[tokio::test]
async fn return_param_reads_output_value() {
    let driver = MockDriver::new().with_outcome(ProcedureOutcome::default().output("@Count", 42i32));
    let diagnostics = RecordingDiagnostics::new();
    let invoker = invoker(&driver, &diagnostics);
    let mut params = ParameterBuilder::new();
    params.add("@CustomerId", 7i64).unwrap();
    params.add_output("@Count", 0i32).unwrap();

    let count: i32 = invoker
        .execute_with_return_param("dbo.CountOrders", &mut params, "@Count", DATABASE, CallOptions::propagate())
        .await
        .unwrap();

    assert_eq!(count, 42);
    assert_eq!(params.get_value_typed::<i32>("@Count"), 42);
    assert_eq!(driver.last_call().mode, ExecuteMode::NonQuery);
}

#[tokio::test]
async fn return_param_missing_is_default_even_when_propagating() {
    let driver = MockDriver::new();
    let diagnostics = RecordingDiagnostics::new();
    let invoker = invoker(&driver, &diagnostics);
    let mut params = params_with_id(1);

    let value: i32 = invoker
        .execute_with_return_param("dbo.P", &mut params, "@NotThere", DATABASE, CallOptions::propagate())
        .await
        .unwrap();

    assert_eq!(value, 0);
    assert_eq!(diagnostics.error_count(), 0);
    assert_eq!(driver.calls().len(), 1);
}

#[tokio::test]
async fn return_param_execution_failure_follows_policy() {
    let driver = MockDriver::new().with_call_error("boom").with_call_error("boom");
    let diagnostics = RecordingDiagnostics::new();
    let invoker = invoker(&driver, &diagnostics);
    let mut params = ParameterBuilder::new();
    params.add_output("@Count", 0i32).unwrap();

    let swallowed: i32 = invoker
        .execute_with_return_param("dbo.P", &mut params, "@Count", DATABASE, CallOptions::new())
        .await
        .unwrap();
    assert_eq!(swallowed, 0);

    let propagated = invoker
        .execute_with_return_param::<i32>("dbo.P", &mut params, "@Count", DATABASE, CallOptions::propagate())
        .await;
    assert!(propagated.is_err());
    assert_eq!(diagnostics.error_count(), 2);
}

#[tokio::test]
async fn return_value_parameter_is_written_back() {
    let driver = MockDriver::new().with_outcome(
        ProcedureOutcome::default()
            .output("@Total", Value::Decimal(rust_decimal::Decimal::new(1050, 2)))
            .output("@RETURN_VALUE", 0i32),
    );
    let diagnostics = RecordingDiagnostics::new();
    let invoker = invoker(&driver, &diagnostics);
    let mut params = ParameterBuilder::new();
    params
        .add_typed("@Total", DbType::Decimal, 0, 18, 2, Direction::Output, None)
        .unwrap();
    params
        .add_typed("@RETURN_VALUE", DbType::Int, 0, 0, 0, Direction::ReturnValue, None)
        .unwrap();

    let returned = invoker
        .execute_with_param_returns("dbo.Total", &mut params, DATABASE, CallOptions::new())
        .await
        .unwrap();

    assert_eq!(returned.len(), 2);
    assert_eq!(returned[0].value, Value::Decimal(rust_decimal::Decimal::new(1050, 2)));
    assert_eq!(returned[1].value, Value::Int32(0));
    assert_eq!(params.get_value_typed::<f64>("@Total"), 10.5);
}

#[tokio::test]
async fn param_returns_on_failure_are_parameters_as_they_stand() {
    let driver = MockDriver::new().with_call_error("boom");
    let diagnostics = RecordingDiagnostics::new();
    let invoker = invoker(&driver, &diagnostics);
    let mut params = params_with_id(5);
    params.add_output("@Count", 0i32).unwrap();

    let returned = invoker
        .execute_with_param_returns("dbo.P", &mut params, DATABASE, CallOptions::new())
        .await
        .unwrap();

    assert_eq!(returned, params.to_vec());
    assert_eq!(returned[1].value, Value::Int32(0));
    assert_eq!(diagnostics.error_count(), 1);
}

// ============ JSON ============

#[derive(Debug, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Order {
    order_id: i64,
    total: f64,
}

#[tokio::test]
async fn json_string_of_no_rows_is_empty_array() {
    let driver = MockDriver::new()
        .with_result_sets(vec![json_rows(&[])])
        .with_result_sets(vec![]);
    let diagnostics = RecordingDiagnostics::new();
    let invoker = invoker(&driver, &diagnostics);

    for _ in 0..2 {
        let text = invoker
            .execute_json_string("dbo.OrdersJson", &mut ParameterBuilder::new(), DATABASE, CallOptions::new())
            .await
            .unwrap();
        assert_eq!(text, "[]");
    }
}

#[tokio::test]
async fn json_string_concatenates_rows_verbatim() {
    let driver = MockDriver::new().with_result_sets(vec![json_rows(&[r#"{"a":1}"#, r#"{"a":2}"#])]);
    let diagnostics = RecordingDiagnostics::new();
    let invoker = invoker(&driver, &diagnostics);

    let text = invoker
        .execute_json_string("dbo.OrdersJson", &mut ParameterBuilder::new(), DATABASE, CallOptions::new())
        .await
        .unwrap();

    assert_eq!(text, r#"{"a":1}{"a":2}"#);
}

#[tokio::test]
async fn json_string_swallowed_failure_is_empty_string() {
    let driver = MockDriver::new().with_call_error("boom");
    let diagnostics = RecordingDiagnostics::new();
    let invoker = invoker(&driver, &diagnostics);

    let text = invoker
        .execute_json_string("dbo.OrdersJson", &mut ParameterBuilder::new(), DATABASE, CallOptions::new())
        .await
        .unwrap();

    assert_eq!(text, "");
    assert_eq!(diagnostics.error_count(), 1);
}

#[tokio::test]
async fn json_object_decodes_split_fragments() {
    let driver = MockDriver::new().with_result_sets(vec![json_rows(&[
        r#"[{"orderId":1,"total":9.5},"#,
        r#"{"ORDERID":2,"Total":20}]"#,
    ])]);
    let diagnostics = RecordingDiagnostics::new();
    let invoker = invoker(&driver, &diagnostics);

    let orders: Vec<Order> = invoker
        .execute_json_object("dbo.OrdersJson", &mut ParameterBuilder::new(), DATABASE, CallOptions::propagate())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(
        orders,
        vec![
            Order { order_id: 1, total: 9.5 },
            Order { order_id: 2, total: 20.0 },
        ]
    );
}

#[tokio::test]
async fn json_object_of_no_rows_is_empty_collection() {
    let driver = MockDriver::new().with_result_sets(vec![json_rows(&[])]);
    let diagnostics = RecordingDiagnostics::new();
    let invoker = invoker(&driver, &diagnostics);

    let orders: Option<Vec<Order>> = invoker
        .execute_json_object("dbo.OrdersJson", &mut ParameterBuilder::new(), DATABASE, CallOptions::propagate())
        .await
        .unwrap();

    assert_eq!(orders, Some(vec![]));
}

#[tokio::test]
async fn json_object_blank_text_is_none() {
    let driver = MockDriver::new().with_result_sets(vec![json_rows(&[""])]);
    let diagnostics = RecordingDiagnostics::new();
    let invoker = invoker(&driver, &diagnostics);

    let order: Option<Order> = invoker
        .execute_json_object("dbo.OrderJson", &mut ParameterBuilder::new(), DATABASE, CallOptions::propagate())
        .await
        .unwrap();

    assert_eq!(order, None);
}

#[tokio::test]
async fn json_object_decode_failure_follows_policy() {
    let driver = MockDriver::new()
        .with_result_sets(vec![json_rows(&["{broken"])])
        .with_result_sets(vec![json_rows(&["{broken"])]);
    let diagnostics = RecordingDiagnostics::new();
    let invoker = invoker(&driver, &diagnostics);

    let swallowed: Option<Order> = invoker
        .execute_json_object("dbo.OrderJson", &mut ParameterBuilder::new(), DATABASE, CallOptions::new())
        .await
        .unwrap();
    assert_eq!(swallowed, None);

    let err = invoker
        .execute_json_object::<Order>("dbo.OrderJson", &mut ParameterBuilder::new(), DATABASE, CallOptions::propagate())
        .await
        .unwrap_err();
    assert!(matches!(err, ProcallError::DecodeFailed(_)));
    assert_eq!(
        diagnostics.errors(),
        vec![
            ("execute_json_object".to_string(), "decode_failed".to_string()),
            ("execute_json_object".to_string(), "decode_failed".to_string()),
        ]
    );
}

#[tokio::test]
async fn object_json_decodes_output_parameter() {
    let driver = MockDriver::new().with_outcome(
        ProcedureOutcome::default().output("@Json", r#"{"OrderId":7,"Total":1.25}"#),
    );
    let diagnostics = RecordingDiagnostics::new();
    let invoker = invoker(&driver, &diagnostics);
    let mut params = ParameterBuilder::new();
    params
        .add_typed("@Json", DbType::NVarChar, -1, 0, 0, Direction::Output, None)
        .unwrap();

    let order: Option<Order> = invoker
        .execute_object_json("dbo.OrderAsJson", &mut params, "@Json", DATABASE, CallOptions::propagate())
        .await
        .unwrap();

    assert_eq!(order, Some(Order { order_id: 7, total: 1.25 }));
}

#[tokio::test]
async fn object_json_missing_or_null_output_is_none() {
    let driver = MockDriver::new();
    let diagnostics = RecordingDiagnostics::new();
    let invoker = invoker(&driver, &diagnostics);
    let mut params = ParameterBuilder::new();
    params
        .add_typed("@Json", DbType::NVarChar, -1, 0, 0, Direction::Output, None)
        .unwrap();

    let missing: Option<Order> = invoker
        .execute_object_json("dbo.OrderAsJson", &mut params, "@Other", DATABASE, CallOptions::propagate())
        .await
        .unwrap();
    let null: Option<Order> = invoker
        .execute_object_json("dbo.OrderAsJson", &mut params, "@Json", DATABASE, CallOptions::propagate())
        .await
        .unwrap();

    assert_eq!(missing, None);
    assert_eq!(null, None);
    assert_eq!(diagnostics.error_count(), 0);
}

#[tokio::test]
async fn object_json_execution_failure_is_logged_under_both_policies() {
    let driver = MockDriver::new().with_call_error("boom").with_call_error("boom");
    let diagnostics = RecordingDiagnostics::new();
    let invoker = invoker(&driver, &diagnostics);
    let mut params = ParameterBuilder::new();
    params.add_output("@Json", "").unwrap();

    let swallowed: Option<Order> = invoker
        .execute_object_json("dbo.OrderAsJson", &mut params, "@Json", DATABASE, CallOptions::new())
        .await
        .unwrap();
    assert_eq!(swallowed, None);

    let propagated = invoker
        .execute_object_json::<Order>("dbo.OrderAsJson", &mut params, "@Json", DATABASE, CallOptions::propagate())
        .await;
    assert!(matches!(propagated, Err(ProcallError::ExecutionFailed(_))));
    assert_eq!(diagnostics.error_count(), 2);
}

// ============ timeouts and diagnostics ============

#[tokio::test]
async fn command_timeout_defaults_and_overrides() {
    let driver = MockDriver::new();
    let diagnostics = RecordingDiagnostics::new();
    let invoker = invoker(&driver, &diagnostics);

    for (secs, expected) in [(0, 30), (-1, 30), (90, 90)] {
        invoker
            .execute_non_query(
                "dbo.P",
                &mut ParameterBuilder::new(),
                DATABASE,
                CallOptions::new().with_timeout_secs(secs),
            )
            .await
            .unwrap();
        assert_eq!(driver.last_call().timeout, Some(Duration::from_secs(expected)));
    }
    assert_eq!(
        driver.connects()[0].1.connect_timeout,
        Some(Duration::from_secs(15))
    );
}

#[tokio::test]
async fn settings_change_the_default_timeout() {
    let driver = MockDriver::new();
    let diagnostics = RecordingDiagnostics::new();
    let invoker = invoker(&driver, &diagnostics).with_settings(InvokerSettings {
        default_command_timeout_secs: 0,
        ..InvokerSettings::default()
    });

    invoker
        .execute_non_query("dbo.P", &mut ParameterBuilder::new(), DATABASE, CallOptions::new())
        .await
        .unwrap();
    assert_eq!(driver.last_call().timeout, None);
}

#[tokio::test]
async fn debug_diagnostics_only_when_requested() {
    let driver = MockDriver::new();
    let diagnostics = RecordingDiagnostics::new();
    let invoker = invoker(&driver, &diagnostics);

    invoker
        .execute_non_query("dbo.P", &mut ParameterBuilder::new(), DATABASE, CallOptions::new())
        .await
        .unwrap();
    assert_eq!(diagnostics.debug_count(), 0);

    invoker
        .execute_non_query(
            "dbo.P",
            &mut ParameterBuilder::new(),
            DATABASE,
            CallOptions::new().with_debug(true),
        )
        .await
        .unwrap();
    assert_eq!(diagnostics.debug_count(), 2);
}

#[tokio::test]
async fn explicit_error_policy_builder() {
    let driver = MockDriver::new().with_call_error("boom");
    let diagnostics = RecordingDiagnostics::new();
    let invoker = invoker(&driver, &diagnostics);

    let options = CallOptions::new().with_error_policy(ErrorPolicy::Propagate);
    let result = invoker
        .execute_non_query("dbo.P", &mut ParameterBuilder::new(), DATABASE, options)
        .await;
    assert!(result.is_err());
}

// ============ spawn_non_query ============

#[tokio::test]
async fn spawn_non_query_uses_fire_and_forget_connect_timeout() {
    let driver = MockDriver::new().with_outcome(ProcedureOutcome::with_rows_affected(1));
    let diagnostics = RecordingDiagnostics::new();
    let invoker = invoker(&driver, &diagnostics);

    invoker
        .spawn_non_query("dbo.Audit", params_with_id(3), DATABASE, false)
        .await
        .unwrap();

    let call = driver.last_call();
    assert_eq!(call.procedure, "dbo.Audit");
    assert_eq!(call.mode, ExecuteMode::NonQuery);
    assert_eq!(call.timeout, Some(Duration::from_secs(30)));
    assert_eq!(
        driver.connects()[0].1.connect_timeout,
        Some(Duration::from_secs(4000))
    );
    assert_eq!(diagnostics.error_count(), 0);
}

#[tokio::test]
async fn spawn_non_query_failure_is_only_logged() {
    let driver = MockDriver::new().with_call_error("boom");
    let diagnostics = RecordingDiagnostics::new();
    let invoker = invoker(&driver, &diagnostics);

    invoker
        .spawn_non_query("dbo.Audit", ParameterBuilder::new(), DATABASE, false)
        .await
        .unwrap();

    assert_eq!(
        diagnostics.errors(),
        vec![("spawn_non_query".to_string(), "execution_failed".to_string())]
    );
    assert_eq!(driver.close_count(), 1);
}
