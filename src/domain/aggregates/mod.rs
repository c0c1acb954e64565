//! Aggregates module
pub mod product;
pub mod order;
pub mod cart;
pub mod user;

pub use product::{Category, NewProduct, Occasion, Product, ProductError};
pub use order::{Order, OrderDraft, OrderError, OrderItem, OrderStatus, PaymentMethod, PaymentStatus, ShippingAddress, ShippingMethod};
pub use cart::{Cart, CartError, PricedCart};
pub use user::{Role, User};
