//! Stored-procedure invocation
//!
//! Every operation follows the same path: resolve the connection string,
//! connect, execute the call, close the connection, write output values back
//! into the caller's `ParameterBuilder`, shape the result and apply the
//! error policy. Each failure is reported to `Diagnostics::error` exactly
//! once, whichever policy is in force.

use crate::config::{AppSettings, InvokerSettings};
use crate::options::{CallOptions, ErrorPolicy};
use crate::resolver::{ConnectionResolver, EnvConfigResolver};
use crate::runtime;
use procall_core::{
    ConnectOptions, DataSet, Diagnostics, ExecuteMode, FromValue, JsonCodec, LogContext,
    Parameter, ParameterBuilder, ProcallError, ProcedureCall, ProcedureDriver, ProcedureOutcome,
    Result, RowSet, SerdeJsonCodec, TracingDiagnostics, Value, coerce, decode_json,
};
use procall_driver_mssql::MssqlDriver;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Text returned by the JSON-text operation when the result has no rows
pub const EMPTY_JSON_ARRAY: &str = "[]";

/// Invokes stored procedures through a driver.
///
/// Cheap to clone; clones share the driver, resolver, diagnostics and codec.
#[derive(Clone)]
pub struct ProcedureInvoker {
    driver: Arc<dyn ProcedureDriver>,
    resolver: Arc<dyn ConnectionResolver>,
    diagnostics: Arc<dyn Diagnostics>,
    codec: Arc<dyn JsonCodec>,
    settings: InvokerSettings,
}

/// Resolved parameters of one call
struct CallPlan<'a> {
    procedure: &'a str,
    database: &'a str,
    mode: ExecuteMode,
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    log_debug: bool,
}

impl ProcedureInvoker {
    /// Invoker with tracing diagnostics, the case-insensitive serde_json
    /// codec and default settings
    pub fn new(
        driver: impl ProcedureDriver + 'static,
        resolver: impl ConnectionResolver + 'static,
    ) -> Self {
        Self {
            driver: Arc::new(driver),
            resolver: Arc::new(resolver),
            diagnostics: Arc::new(TracingDiagnostics),
            codec: Arc::new(SerdeJsonCodec::case_insensitive()),
            settings: InvokerSettings::default(),
        }
    }

    /// SQL Server invoker resolving connection strings from the environment
    /// and `settings`
    pub fn sql_server(settings: &AppSettings) -> Self {
        Self::new(MssqlDriver::new(), EnvConfigResolver::new(settings))
            .with_settings(settings.procall)
    }

    pub fn with_diagnostics(mut self, diagnostics: impl Diagnostics + 'static) -> Self {
        self.diagnostics = Arc::new(diagnostics);
        self
    }

    pub fn with_codec(mut self, codec: impl JsonCodec + 'static) -> Self {
        self.codec = Arc::new(codec);
        self
    }

    pub fn with_settings(mut self, settings: InvokerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &InvokerSettings {
        &self.settings
    }

    pub fn driver_name(&self) -> &'static str {
        self.driver.name()
    }

    /// First result set of the call
    pub async fn execute_datatable(
        &self,
        procedure: &str,
        params: &mut ParameterBuilder,
        database: &str,
        options: CallOptions,
    ) -> Result<RowSet> {
        let ctx = LogContext::new("execute_datatable", procedure);
        let plan = self.plan(procedure, database, &options, ExecuteMode::Reader);
        let result = self
            .invoke(&plan, params, &ctx)
            .await
            .map(|outcome| outcome.result_sets.into_iter().next().unwrap_or_default());
        self.settle(&ctx, options.error_policy, result, RowSet::empty)
    }

    /// All result sets of the call
    pub async fn execute_dataset(
        &self,
        procedure: &str,
        params: &mut ParameterBuilder,
        database: &str,
        options: CallOptions,
    ) -> Result<DataSet> {
        let ctx = LogContext::new("execute_dataset", procedure);
        let plan = self.plan(procedure, database, &options, ExecuteMode::Reader);
        let result = self
            .invoke(&plan, params, &ctx)
            .await
            .map(|outcome| DataSet::new(outcome.result_sets));
        self.settle(&ctx, options.error_policy, result, DataSet::default)
    }

    /// Rows affected by the call
    pub async fn execute_non_query(
        &self,
        procedure: &str,
        params: &mut ParameterBuilder,
        database: &str,
        options: CallOptions,
    ) -> Result<u64> {
        let ctx = LogContext::new("execute_non_query", procedure);
        let plan = self.plan(procedure, database, &options, ExecuteMode::NonQuery);
        let result = self
            .invoke(&plan, params, &ctx)
            .await
            .map(|outcome| outcome.rows_affected);
        self.settle(&ctx, options.error_policy, result, || 0)
    }

    /// First column of the first row, coerced to `T`.
    ///
    /// An empty result reads as NULL, so it gives `None` for `Option<T>`
    /// and a coercion failure otherwise.
    pub async fn execute_scalar<T>(
        &self,
        procedure: &str,
        params: &mut ParameterBuilder,
        database: &str,
        options: CallOptions,
    ) -> Result<T>
    where
        T: FromValue + Default,
    {
        let ctx = LogContext::new("execute_scalar", procedure).with_type(T::TYPE_NAME);
        let plan = self.plan(procedure, database, &options, ExecuteMode::Reader);
        let result = self.invoke(&plan, params, &ctx).await.and_then(|outcome| {
            let first = outcome
                .result_sets
                .first()
                .and_then(RowSet::first_value)
                .unwrap_or(&Value::Null);
            coerce::<T>(first)
        });
        self.settle(&ctx, options.error_policy, result, T::default)
    }

    /// Value of the output parameter `output_param`, coerced to `T`.
    ///
    /// A parameter that is not in the builder gives `T::default()` under
    /// either policy.
    pub async fn execute_with_return_param<T>(
        &self,
        procedure: &str,
        params: &mut ParameterBuilder,
        output_param: &str,
        database: &str,
        options: CallOptions,
    ) -> Result<T>
    where
        T: FromValue + Default,
    {
        let ctx = LogContext::new("execute_with_return_param", procedure).with_type(T::TYPE_NAME);
        let plan = self.plan(procedure, database, &options, ExecuteMode::NonQuery);
        let result = match self.invoke(&plan, params, &ctx).await {
            Ok(_) => match params.get(output_param) {
                Some(parameter) => coerce::<T>(&parameter.value),
                None => {
                    self.note_missing_output(&plan, &ctx, output_param);
                    Ok(T::default())
                }
            },
            Err(err) => Err(err),
        };
        self.settle(&ctx, options.error_policy, result, T::default)
    }

    /// Every parameter as it stands after the call
    pub async fn execute_with_param_returns(
        &self,
        procedure: &str,
        params: &mut ParameterBuilder,
        database: &str,
        options: CallOptions,
    ) -> Result<Vec<Parameter>> {
        let ctx = LogContext::new("execute_with_param_returns", procedure);
        let plan = self.plan(procedure, database, &options, ExecuteMode::NonQuery);
        let result = self.invoke(&plan, params, &ctx).await.map(|_| params.to_vec());
        self.settle(&ctx, options.error_policy, result, || params.to_vec())
    }

    /// JSON text produced by a `FOR JSON` procedure.
    ///
    /// Column 0 of every row is concatenated as is; no rows gives `[]`.
    pub async fn execute_json_string(
        &self,
        procedure: &str,
        params: &mut ParameterBuilder,
        database: &str,
        options: CallOptions,
    ) -> Result<String> {
        let ctx = LogContext::new("execute_json_string", procedure);
        let plan = self.plan(procedure, database, &options, ExecuteMode::Reader);
        let result = self.json_text(&plan, params, &ctx).await;
        self.settle(&ctx, options.error_policy, result, String::new)
    }

    /// JSON text decoded into `T`; blank text gives `None`
    pub async fn execute_json_object<T>(
        &self,
        procedure: &str,
        params: &mut ParameterBuilder,
        database: &str,
        options: CallOptions,
    ) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        let ctx = LogContext::new("execute_json_object", procedure)
            .with_type(std::any::type_name::<T>());
        let plan = self.plan(procedure, database, &options, ExecuteMode::Reader);
        let result = self
            .json_text(&plan, params, &ctx)
            .await
            .and_then(|text| self.decode::<T>(&text));
        self.settle(&ctx, options.error_policy, result, || None)
    }

    /// The string value of output parameter `output_param`, decoded into `T`.
    ///
    /// A missing or NULL parameter gives `None` under either policy.
    pub async fn execute_object_json<T>(
        &self,
        procedure: &str,
        params: &mut ParameterBuilder,
        output_param: &str,
        database: &str,
        options: CallOptions,
    ) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        let ctx = LogContext::new("execute_object_json", procedure)
            .with_type(std::any::type_name::<T>());
        let plan = self.plan(procedure, database, &options, ExecuteMode::NonQuery);
        let result = match self.invoke(&plan, params, &ctx).await {
            Ok(_) => match params.get_value(output_param) {
                Some(value) => coerce::<String>(value).and_then(|text| self.decode::<T>(&text)),
                None => {
                    self.note_missing_output(&plan, &ctx, output_param);
                    Ok(None)
                }
            },
            Err(err) => Err(err),
        };
        self.settle(&ctx, options.error_policy, result, || None)
    }

    /// Run a non-query in the background.
    ///
    /// Uses the fire-and-forget connect timeout and the default command
    /// timeout. Failures are only logged. Spawns on the current runtime when
    /// called from one, else on the shared runtime.
    pub fn spawn_non_query(
        &self,
        procedure: impl Into<String>,
        params: ParameterBuilder,
        database: impl Into<String>,
        log_debug: bool,
    ) -> JoinHandle<()> {
        let invoker = self.clone();
        let procedure = procedure.into();
        let database = database.into();
        runtime::spawn(async move {
            let mut params = params;
            let ctx = LogContext::new("spawn_non_query", &procedure);
            let plan = CallPlan {
                procedure: &procedure,
                database: &database,
                mode: ExecuteMode::NonQuery,
                timeout: invoker.settings.command_timeout(),
                connect_timeout: invoker.settings.fire_and_forget_connect_timeout(),
                log_debug,
            };
            if let Err(err) = invoker.invoke(&plan, &mut params, &ctx).await {
                invoker.diagnostics.error(&ctx, &err);
            }
        })
    }

    pub fn execute_datatable_blocking(
        &self,
        procedure: &str,
        params: &mut ParameterBuilder,
        database: &str,
        options: CallOptions,
    ) -> Result<RowSet> {
        runtime::block_on(self.execute_datatable(procedure, params, database, options))
    }

    pub fn execute_dataset_blocking(
        &self,
        procedure: &str,
        params: &mut ParameterBuilder,
        database: &str,
        options: CallOptions,
    ) -> Result<DataSet> {
        runtime::block_on(self.execute_dataset(procedure, params, database, options))
    }

    pub fn execute_non_query_blocking(
        &self,
        procedure: &str,
        params: &mut ParameterBuilder,
        database: &str,
        options: CallOptions,
    ) -> Result<u64> {
        runtime::block_on(self.execute_non_query(procedure, params, database, options))
    }

    pub fn execute_scalar_blocking<T>(
        &self,
        procedure: &str,
        params: &mut ParameterBuilder,
        database: &str,
        options: CallOptions,
    ) -> Result<T>
    where
        T: FromValue + Default,
    {
        runtime::block_on(self.execute_scalar(procedure, params, database, options))
    }

    pub fn execute_with_return_param_blocking<T>(
        &self,
        procedure: &str,
        params: &mut ParameterBuilder,
        output_param: &str,
        database: &str,
        options: CallOptions,
    ) -> Result<T>
    where
        T: FromValue + Default,
    {
        runtime::block_on(self.execute_with_return_param(
            procedure,
            params,
            output_param,
            database,
            options,
        ))
    }

    pub fn execute_with_param_returns_blocking(
        &self,
        procedure: &str,
        params: &mut ParameterBuilder,
        database: &str,
        options: CallOptions,
    ) -> Result<Vec<Parameter>> {
        runtime::block_on(self.execute_with_param_returns(procedure, params, database, options))
    }

    pub fn execute_json_string_blocking(
        &self,
        procedure: &str,
        params: &mut ParameterBuilder,
        database: &str,
        options: CallOptions,
    ) -> Result<String> {
        runtime::block_on(self.execute_json_string(procedure, params, database, options))
    }

    pub fn execute_json_object_blocking<T>(
        &self,
        procedure: &str,
        params: &mut ParameterBuilder,
        database: &str,
        options: CallOptions,
    ) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        runtime::block_on(self.execute_json_object(procedure, params, database, options))
    }

    pub fn execute_object_json_blocking<T>(
        &self,
        procedure: &str,
        params: &mut ParameterBuilder,
        output_param: &str,
        database: &str,
        options: CallOptions,
    ) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        runtime::block_on(self.execute_object_json(
            procedure,
            params,
            output_param,
            database,
            options,
        ))
    }

    fn plan<'a>(
        &self,
        procedure: &'a str,
        database: &'a str,
        options: &CallOptions,
        mode: ExecuteMode,
    ) -> CallPlan<'a> {
        CallPlan {
            procedure,
            database,
            mode,
            timeout: options.effective_timeout(self.settings.command_timeout()),
            connect_timeout: self.settings.connect_timeout(),
            log_debug: options.log_debug,
        }
    }

    /// Resolve, connect, call, close and write outputs back
    async fn invoke(
        &self,
        plan: &CallPlan<'_>,
        params: &mut ParameterBuilder,
        ctx: &LogContext<'_>,
    ) -> Result<ProcedureOutcome> {
        let connection_string = self.resolver.resolve(plan.database);
        if connection_string.trim().is_empty() {
            return Err(ProcallError::ConnectionResolutionFailed(
                plan.database.to_string(),
            ));
        }

        if plan.log_debug {
            self.diagnostics.debug(
                ctx,
                &format!(
                    "calling {} on '{}' with {} parameter(s), timeout {:?}",
                    plan.procedure,
                    plan.database,
                    params.len(),
                    plan.timeout
                ),
            );
        }

        let connect_options = ConnectOptions {
            connect_timeout: plan.connect_timeout,
        };
        let mut connection = self
            .driver
            .connect(&connection_string, &connect_options)
            .await?;

        let call = ProcedureCall {
            procedure: plan.procedure,
            parameters: params,
            timeout: plan.timeout,
            mode: plan.mode,
        };
        let result = connection.call(&call).await;

        if let Err(err) = connection.close().await {
            self.diagnostics
                .debug(ctx, &format!("closing connection failed: {err}"));
        }

        let outcome = result?;
        let applied = outcome.apply_outputs(params);

        if plan.log_debug {
            self.diagnostics.debug(
                ctx,
                &format!(
                    "{} returned {} result set(s), {} row(s) affected, {} output value(s)",
                    plan.procedure,
                    outcome.result_sets.len(),
                    outcome.rows_affected,
                    applied
                ),
            );
        }
        Ok(outcome)
    }

    async fn json_text(
        &self,
        plan: &CallPlan<'_>,
        params: &mut ParameterBuilder,
        ctx: &LogContext<'_>,
    ) -> Result<String> {
        let outcome = self.invoke(plan, params, ctx).await?;
        let Some(rows) = outcome.result_sets.first().filter(|set| set.has_rows()) else {
            return Ok(EMPTY_JSON_ARRAY.to_string());
        };
        Ok(rows
            .rows
            .iter()
            .map(|row| row.get(0).map(Value::to_text).unwrap_or_default())
            .collect())
    }

    fn decode<T: DeserializeOwned>(&self, text: &str) -> Result<Option<T>> {
        if text.trim().is_empty() {
            return Ok(None);
        }
        decode_json::<T>(self.codec.as_ref(), text).map(Some)
    }

    fn note_missing_output(&self, plan: &CallPlan<'_>, ctx: &LogContext<'_>, name: &str) {
        if plan.log_debug {
            self.diagnostics
                .debug(ctx, &format!("output parameter {name} is not in the builder"));
        }
    }

    /// Log a failure once and apply the error policy
    fn settle<T>(
        &self,
        ctx: &LogContext<'_>,
        policy: ErrorPolicy,
        result: Result<T>,
        fallback: impl FnOnce() -> T,
    ) -> Result<T> {
        match result {
            Ok(value) => Ok(value),
            Err(err) => {
                self.diagnostics.error(ctx, &err);
                match policy {
                    ErrorPolicy::Swallow => Ok(fallback()),
                    ErrorPolicy::Propagate => Err(err),
                }
            }
        }
    }
}

impl std::fmt::Debug for ProcedureInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcedureInvoker")
            .field("driver", &self.driver.name())
            .field("settings", &self.settings)
            .finish()
    }
}
