pub mod health;
pub mod import;
pub mod purchase_orders;
