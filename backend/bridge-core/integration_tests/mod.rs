mod contracts;
mod helpers;

mod batch;
mod binding;
mod cancellation;
mod engine;
mod middleware;
mod proxy;
mod streaming;
mod websocket;
