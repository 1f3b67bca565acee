//! Request mapping, parameter aliasing, time tokens, and the transform
//! expression evaluator (spec §4.2-§4.5).

pub mod expr;
pub mod mapper;
pub mod param_names;
pub mod time_tokens;
pub mod validator;

pub use mapper::{apply_headers, apply_query_params, build_request_body, build_url, dot_get, extract_pagination_info, set_nested_value, transform_response};
pub use param_names::{alias, unalias};
pub use validator::{validate_endpoint, validate_parameters};
