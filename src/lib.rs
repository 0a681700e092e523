pub mod app;
pub mod db;
pub mod events;
pub mod mcp;
pub mod paths;
pub mod render;

#[cfg(test)]
mod testing;
