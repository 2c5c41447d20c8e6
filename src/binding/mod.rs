//! Binding Module
//!
//! Per-consumer bindings that turn cache entry changes into a reactive view.

mod subscription;
mod view;

pub use subscription::SubscriptionBinding;
pub use view::BindingView;
