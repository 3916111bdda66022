//! Fault responses.
//!
//! # Responsibilities
//! - Give business handlers a fault type they can return with `?`
//! - Turn captured panics into the same fault shape
//! - Build the client-facing JSON bodies for 500 and 404
//!
//! # Design Decisions
//! - Handlers never render fault bodies themselves: a fault travels to the
//!   error boundary as a response extension, and the boundary decides what
//!   the client sees
//! - Stack information stays server-side

use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error as StdError;
use std::fmt;

use axum::{
    body::Body,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Fault details carried from the failure site to the error boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnhandledFault {
    pub message: String,
    pub stack: Option<String>,
}

/// Error returned by a business handler that could not complete.
///
/// Converts from any `std::error::Error`, so handlers can use `?`.
pub struct RequestFault {
    message: String,
    stack: Option<String>,
}

impl RequestFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: captured_backtrace(),
        }
    }

    /// Build from an error, keeping its source chain as the stack.
    pub fn from_error(err: &(dyn StdError + 'static)) -> Self {
        let mut chain = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            chain.push(format!("caused by: {}", cause));
            source = cause.source();
        }
        if let Some(backtrace) = captured_backtrace() {
            chain.push(backtrace);
        }

        Self {
            message: err.to_string(),
            stack: if chain.is_empty() {
                None
            } else {
                Some(chain.join("\n"))
            },
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn stack(&self) -> Option<&str> {
        self.stack.as_deref()
    }
}

impl fmt::Debug for RequestFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestFault")
            .field("message", &self.message)
            .finish()
    }
}

impl<E> From<E> for RequestFault
where
    E: StdError + Send + Sync + 'static,
{
    fn from(err: E) -> Self {
        RequestFault::from_error(&err)
    }
}

impl IntoResponse for RequestFault {
    fn into_response(self) -> Response {
        fault_response(UnhandledFault {
            message: self.message,
            stack: self.stack,
        })
    }
}

/// Placeholder 500 carrying `fault` for the error boundary.
pub fn fault_response(fault: UnhandledFault) -> Response {
    let mut response = StatusCode::INTERNAL_SERVER_ERROR.into_response();
    response.extensions_mut().insert(fault);
    response
}

/// Panic hook for `CatchPanicLayer`: the panic becomes an ordinary fault.
pub fn panic_fault(payload: Box<dyn Any + Send + 'static>) -> Response<Body> {
    let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    };

    fault_response(UnhandledFault {
        message,
        stack: None,
    })
}

/// JSON body of a 500 response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

/// 500 response; `detail` is only exposed outside production.
pub fn internal_error(detail: &str, production: bool) -> Response {
    let message = if production {
        "Something went wrong".to_string()
    } else {
        detail.to_string()
    };
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody {
            error: "Internal server error",
            message,
        }),
    )
        .into_response()
}

/// 404 response for unmatched routes.
pub fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": "Route not found" })),
    )
        .into_response()
}

fn captured_backtrace() -> Option<String> {
    let backtrace = Backtrace::capture();
    match backtrace.status() {
        BacktraceStatus::Captured => Some(backtrace.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[derive(Debug)]
    struct Outer(io::Error);

    impl fmt::Display for Outer {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "booking lookup failed")
        }
    }

    impl StdError for Outer {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn test_fault_from_error_keeps_source_chain() {
        let fault: RequestFault = Outer(io::Error::new(io::ErrorKind::TimedOut, "db timeout")).into();
        assert_eq!(fault.message(), "booking lookup failed");
        assert!(fault.stack().unwrap().contains("caused by: db timeout"));
    }

    #[test]
    fn test_fault_response_carries_extension() {
        let response = RequestFault::new("boom").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let fault = response.extensions().get::<UnhandledFault>().unwrap();
        assert_eq!(fault.message, "boom");
    }

    #[test]
    fn test_panic_payloads() {
        let response = panic_fault(Box::new("static str"));
        assert_eq!(
            response.extensions().get::<UnhandledFault>().unwrap().message,
            "static str"
        );

        let response = panic_fault(Box::new(String::from("owned")));
        assert_eq!(
            response.extensions().get::<UnhandledFault>().unwrap().message,
            "owned"
        );

        let response = panic_fault(Box::new(42u32));
        assert_eq!(
            response.extensions().get::<UnhandledFault>().unwrap().message,
            "handler panicked"
        );
    }
}
