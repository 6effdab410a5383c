//! Parameterized SELECT assembly.

pub mod builder;
pub mod filter;
pub mod period;
pub mod plan;

pub use builder::{QueryBuilder, SortOrder, SortWhitelist};
pub use filter::{parse_date, resolve_limit, CompareOp, Condition, DateFilter, FilterRequest, TimeOperator};
pub use period::Period;
pub use plan::{BindValue, QueryPlan};
