mod allocation;
mod common;
mod store;
