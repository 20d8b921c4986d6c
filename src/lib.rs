pub mod config;
pub mod ctrl;
pub mod net;
pub mod probe;
pub mod scenario;
pub mod topo;

#[cfg(test)]
mod test;
