pub mod order;

pub use order::{Delivery, Order, OrderItem, Payment, ValidationError};
