pub mod cart_items;
pub mod customers;
pub mod order_items;
pub mod orders;
pub mod products;
pub mod tracking;
pub mod tracking_events;

pub use cart_items::Entity as CartItems;
pub use customers::Entity as Customers;
pub use order_items::Entity as OrderItems;
pub use orders::Entity as Orders;
pub use products::Entity as Products;
pub use tracking::Entity as Tracking;
pub use tracking_events::Entity as TrackingEvents;
