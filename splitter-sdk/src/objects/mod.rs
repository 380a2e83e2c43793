pub mod resources;
pub mod status;
pub mod stream;

pub use resources::{
    Category, Currency, Expense, ExpenseCategoryRelation, ExpenseStake, Group, Person,
};
pub use status::{ErrorBody, ErrorInfo, ErrorReason, StatusCode};
pub use stream::{
    ExchangeRateUpdate, IdSetUpdate, ResourceUpdate, StreamCloseCode, StreamTermination,
};
