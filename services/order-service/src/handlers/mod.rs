pub mod create_order;
pub mod delete_order;
pub mod get_order;
pub mod health;
pub mod list_orders;
pub mod responses;
pub mod update_order;
