pub mod call;
pub mod catalog;
pub mod context;
pub mod error;
pub mod field;
pub mod invoker;
pub mod marshal;
pub mod notice;
pub mod page;
pub mod param;
pub mod project;
pub mod task;
pub mod value;

pub use call::{ArgValue, ToolkitCall};
pub use catalog::{all_pages, fields, page_def, PageDef, PageId};
pub use context::AppContext;
pub use error::{
    IncompleteConfigurationError, ProjectConfigError, SubmitError, TaskError, TaskInvocationError,
    UnsupportedFeatureError, ValidationError,
};
pub use field::{FormField, ListenerId};
pub use invoker::{CallReturn, TaskInvoker, Toolkit, ToolkitFailure};
pub use notice::{Notice, NoticeLevel};
pub use page::PageState;
pub use param::{BoolStyle, Condition, Constraint, ParameterSpec};
pub use project::{CropBounds, ProjectConfig};
pub use task::{TaskKind, TaskRequest, TaskResult};
pub use value::{ParamKind, ParamValue, PathSet};
