use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::call::ToolkitCall;
use crate::error::TaskInvocationError;
use crate::marshal;
use crate::task::{TaskKind, TaskRequest, TaskResult};

/// What a toolkit function returned, decoded from JSON.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CallReturn {
    pub value: Value,
}

impl CallReturn {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self {
            value: Value::String(value.into()),
        }
    }

    fn artifact(self) -> Option<String> {
        match self.value {
            Value::Null => None,
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        }
    }
}

/// The toolkit raised, or could not be reached at all. The message is kept
/// as reported.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ToolkitFailure {
    pub message: String,
}

impl ToolkitFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The external task library. Calls block until the function returns.
pub trait Toolkit {
    fn call(&self, call: &ToolkitCall) -> Result<CallReturn, ToolkitFailure>;
}

impl<T: Toolkit + ?Sized> Toolkit for &T {
    fn call(&self, call: &ToolkitCall) -> Result<CallReturn, ToolkitFailure> {
        (**self).call(call)
    }
}

impl<T: Toolkit + ?Sized> Toolkit for Box<T> {
    fn call(&self, call: &ToolkitCall) -> Result<CallReturn, ToolkitFailure> {
        (**self).call(call)
    }
}

impl<T: Toolkit + ?Sized> Toolkit for Arc<T> {
    fn call(&self, call: &ToolkitCall) -> Result<CallReturn, ToolkitFailure> {
        (**self).call(call)
    }
}

#[derive(Debug)]
pub struct TaskInvoker<T> {
    toolkit: T,
}

impl<T: Toolkit> TaskInvoker<T> {
    pub fn new(toolkit: T) -> Self {
        Self { toolkit }
    }

    pub fn toolkit(&self) -> &T {
        &self.toolkit
    }

    /// Runs the request's chain, one toolkit call per step. The first failure
    /// ends the chain and is reported as is; nothing is retried.
    pub fn invoke(&self, request: &TaskRequest) -> TaskResult {
        let task = request.task();
        let calls = match marshal::plan(request) {
            Ok(calls) => calls,
            Err(err) => {
                tracing::warn!(%task, "not invoking: {err}");
                return TaskResult::failed(task, err, Vec::new());
            }
        };

        let mut completed = Vec::with_capacity(calls.len());
        let mut artifact = None;
        for call in &calls {
            tracing::info!(step = %call.task, "calling {}", call.function);
            match self.toolkit.call(call) {
                Ok(ret) => {
                    if call.task == TaskKind::Analyze {
                        artifact = ret.artifact();
                    }
                    completed.push(call.task);
                }
                Err(failure) => {
                    tracing::error!(step = %call.task, "toolkit call failed: {failure}");
                    let err = TaskInvocationError {
                        task: call.task,
                        message: failure.message,
                    };
                    return TaskResult::failed(task, err, completed);
                }
            }
        }
        tracing::info!(%task, steps = completed.len(), "task finished");
        TaskResult::succeeded(task, artifact, completed)
    }
}
