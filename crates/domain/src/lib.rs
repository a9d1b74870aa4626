pub mod aggregates;
pub mod commands;
pub mod errors;

pub use aggregates::order::{Delivery, Item, Order, Payment};
pub use commands::order_commands::{
    CreateOrderCommand, CreateOrderItem, DeleteOrderCommand, DeliveryDetails, DeliveryPatch,
    PaymentDetails, PaymentPatch, UpdateOrderCommand,
};
pub use errors::DomainError;
