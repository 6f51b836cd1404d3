//! Tracing hooks.
//!
//! Enable the `tracing` feature (on by default) to emit events via the
//! `tracing` crate. The macros expand to nothing when the feature is off, so
//! call sites carry no `#[cfg]`.

/// Debug event after a plan compiled.
macro_rules! trace_compile {
    ($resource:expr, $plan:expr) => {
        #[cfg(feature = "tracing")]
        tracing::debug!(
            resource = %$resource,
            shape = ?$plan.shape,
            filtered = $plan.predicate.is_some(),
            sort = $plan.sort.len(),
            limit = ?$plan.limit,
            expand = %$plan.eager_expression().unwrap_or_default(),
            count = $plan.want_count,
            "restq.compile"
        );
        #[cfg(not(feature = "tracing"))]
        let _ = (&$resource, &$plan);
    };
}

/// Debug event when a request is rejected.
macro_rules! trace_reject {
    ($resource:expr, $err:expr) => {
        #[cfg(feature = "tracing")]
        tracing::debug!(
            resource = %$resource,
            code = $err.code(),
            param = %$err.param(),
            error = %$err,
            "restq.reject"
        );
        #[cfg(not(feature = "tracing"))]
        let _ = (&$resource, &$err);
    };
}

/// Debug event with the SQL text and parameter count of an executed statement.
macro_rules! trace_query {
    ($dialect:expr, $sql:expr, $param_count:expr) => {
        #[cfg(feature = "tracing")]
        tracing::debug!(dialect = $dialect, sql = %$sql, params = $param_count, "restq.query");
        #[cfg(not(feature = "tracing"))]
        let _ = (&$dialect, &$sql, &$param_count);
    };
}

pub(crate) use {trace_compile, trace_query, trace_reject};
