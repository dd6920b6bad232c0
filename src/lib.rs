pub mod aggregate;
pub mod catalog;
pub mod detector;
pub mod feed;
pub mod model;
pub mod notify;
pub mod observability;
pub mod pipeline;
pub mod presenter;
pub mod store;
