mod config;
mod scenario;
mod topology;
mod util;
