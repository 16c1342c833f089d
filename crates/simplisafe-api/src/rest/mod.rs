// REST client modules
//
// Hand-written client for the SimpliSafe mobile REST surface. Bearer-token
// authenticated, JSON in and out. Endpoint groups live in separate files as
// inherent methods on `ApiClient`.

pub mod client;
pub mod devices;
pub mod events;
pub mod models;
pub mod pins;
pub mod subscriptions;
pub mod system;

pub use client::ApiClient;
