mod arguments;
mod binder;
mod channel;
mod config;
mod enumerator;
mod envelope;
mod middleware;
mod naming;
