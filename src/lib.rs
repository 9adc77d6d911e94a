pub mod model;
pub mod validator;

pub use model::expression::Expr;
pub use model::plan::{ActionInstance, PartialOrderPlan};
pub use model::problem::Problem;
pub use validator::{check, check_with, validate, Error, Execution, Options};
