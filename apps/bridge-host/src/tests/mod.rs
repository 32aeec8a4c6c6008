mod error;
mod host;
mod logger;
mod services;
