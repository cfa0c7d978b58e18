//! 专家层：Planner、Validator、Executor、Reflector

pub mod executor;
pub mod planner;
pub mod reflector;
pub mod validator;

pub use executor::{ExecutionDecision, Executor, ExecutorOutput, ExecutorStep};
pub use planner::{Planner, PlannerFailure, PlannerOutput};
pub use reflector::{Reflection, Reflector, Route};
pub use validator::{ConstraintReview, ReviewOutcome, Validator, EMPTY_PLAN_FEEDBACK};
