//! CLI domain: parse, route, output, and presentation only.
//! Pipeline orchestration lives in the library; the route table only wires it up.

mod output;
mod parse;
mod presentation;
mod route;

pub use output::map_error;
pub use parse::{Cli, Commands, PlanFormat};
pub use presentation::{
    format_generate_summary, format_plan_json, format_plan_text, format_validation_result,
};
pub use route::RunContext;
